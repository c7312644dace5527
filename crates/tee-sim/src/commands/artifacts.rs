use std::error::Error;
use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;
use tee_exp::{ArtifactRecord, ArtifactRegistry};

use super::{print_json, resolve_registry};

#[derive(Args, Debug)]
pub struct ArtifactsArgs {
    /// Artifact catalog YAML; the built-in Keystone catalog is used when absent.
    #[arg(long)]
    pub catalog: Option<PathBuf>,
    /// Check that every artifact path exists below `--root`.
    #[arg(long)]
    pub check: bool,
    /// Root the artifact paths are relative to.
    #[arg(long, default_value = ".")]
    pub root: PathBuf,
}

#[derive(Debug, Serialize)]
struct ArtifactCheck {
    name: String,
    ok: bool,
    detail: String,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    status: String,
    catalog_hash: String,
    checks: Vec<ArtifactCheck>,
}

pub fn run(args: &ArtifactsArgs) -> Result<(), Box<dyn Error>> {
    let registry = resolve_registry(args.catalog.as_deref())?;
    if !args.check {
        let records: Vec<&ArtifactRecord> = registry.iter().collect();
        return print_json(&records);
    }
    let report = check(&registry, &args.root)?;
    print_json(&report)?;
    if report.status != "ok" {
        return Err("one or more artifacts are missing".into());
    }
    Ok(())
}

fn check(registry: &ArtifactRegistry, root: &Path) -> Result<CheckReport, Box<dyn Error>> {
    let checks: Vec<ArtifactCheck> = registry
        .iter()
        .map(|record| {
            let path = root.join(&record.path);
            if path.exists() {
                ArtifactCheck {
                    name: record.name.clone(),
                    ok: true,
                    detail: path.display().to_string(),
                }
            } else {
                ArtifactCheck {
                    name: record.name.clone(),
                    ok: false,
                    detail: format!("missing {}", record.path),
                }
            }
        })
        .collect();
    let status = if checks.iter().all(|check| check.ok) {
        "ok"
    } else {
        "needs-attention"
    };
    Ok(CheckReport {
        status: status.into(),
        catalog_hash: registry.catalog_hash()?,
        checks,
    })
}
