use std::fs::{self, OpenOptions};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tee_core::errors::{ErrorInfo, TeeError};

use crate::launch::LaunchManifest;

const COLUMNS: [&str; 9] = [
    "date",
    "plan_hash",
    "run_hash",
    "label",
    "security",
    "cpu",
    "cores",
    "benchmark",
    "outdir",
];
const SECURITY_COLUMN: usize = 4;

/// Supported ledger backends.
#[derive(Debug, Clone, PartialEq)]
pub enum Ledger {
    Csv(PathBuf),
    Sqlite(PathBuf),
}

impl Ledger {
    /// Construct a ledger handle from a filesystem path.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("sqlite") | Some("db") => Ledger::Sqlite(path),
            _ => Ledger::Csv(path),
        }
    }
}

/// Query descriptor for ledger lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Query {
    #[serde(default)]
    pub security: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Table representation returned from ledger queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Append every run of a launch manifest to the ledger.
pub fn ledger_append(ledger: &Ledger, manifest: &LaunchManifest) -> Result<(), TeeError> {
    let rows = manifest_rows(manifest);
    match ledger {
        Ledger::Csv(path) => append_csv(path, &rows),
        Ledger::Sqlite(path) => append_sqlite(path, &rows),
    }?;
    log::info!("recorded {} run(s) in ledger {:?}", rows.len(), ledger);
    Ok(())
}

/// Query the ledger returning a structured table.
pub fn ledger_query(ledger: &Ledger, query: &Query) -> Result<Table, TeeError> {
    match ledger {
        Ledger::Csv(path) => query_csv(path, query),
        Ledger::Sqlite(path) => query_sqlite(path, query),
    }
}

fn manifest_rows(manifest: &LaunchManifest) -> Vec<[String; 9]> {
    manifest
        .runs
        .iter()
        .map(|run| {
            [
                manifest.provenance.created_at.clone(),
                manifest.provenance.plan_hash.clone(),
                run.run_hash.clone(),
                run.label.clone(),
                run.params.security.clone(),
                run.params.cpu.clone(),
                run.params.cores.to_string(),
                run.params.benchmark.clone(),
                run.outdir.clone(),
            ]
        })
        .collect()
}

fn append_csv(path: &Path, rows: &[[String; 9]]) -> Result<(), TeeError> {
    ensure_parent(path)?;
    let file_exists = path.exists();
    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .map_err(|err| {
            TeeError::Ledger(
                ErrorInfo::new("ledger-open", "failed to open CSV ledger")
                    .with_context("path", path.display().to_string())
                    .with_hint(err.to_string()),
            )
        })?;
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(BufWriter::new(file));
    if !file_exists {
        writer
            .write_record(COLUMNS)
            .map_err(|err| wrap_csv("ledger-write-header", err))?;
    }
    for row in rows {
        writer
            .write_record(row)
            .map_err(|err| wrap_csv("ledger-write-row", err))?;
    }
    writer
        .flush()
        .map_err(|err| wrap_csv("ledger-flush", err.into()))?;
    Ok(())
}

fn append_sqlite(path: &Path, rows: &[[String; 9]]) -> Result<(), TeeError> {
    ensure_parent(path)?;
    let mut conn = Connection::open(path).map_err(|err| {
        TeeError::Ledger(
            ErrorInfo::new("ledger-sqlite-open", "failed to open sqlite ledger")
                .with_context("path", path.display().to_string())
                .with_hint(err.to_string()),
        )
    })?;
    conn.execute_batch(
        r#"CREATE TABLE IF NOT EXISTS runs (
            date TEXT NOT NULL,
            plan_hash TEXT NOT NULL,
            run_hash TEXT NOT NULL,
            label TEXT NOT NULL,
            security TEXT NOT NULL,
            cpu TEXT NOT NULL,
            cores TEXT NOT NULL,
            benchmark TEXT NOT NULL,
            outdir TEXT NOT NULL
        );"#,
    )
    .map_err(|err| wrap_sqlite("ledger-sqlite-schema", "failed to ensure ledger schema", err))?;
    let tx = conn
        .transaction()
        .map_err(|err| wrap_sqlite("ledger-sqlite-transaction", "failed to start transaction", err))?;
    for row in rows {
        tx.execute(
            r#"INSERT INTO runs (date, plan_hash, run_hash, label, security, cpu, cores, benchmark, outdir)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
            params![row[0], row[1], row[2], row[3], row[4], row[5], row[6], row[7], row[8]],
        )
        .map_err(|err| wrap_sqlite("ledger-sqlite-insert", "failed to append ledger row", err))?;
    }
    tx.commit()
        .map_err(|err| wrap_sqlite("ledger-sqlite-commit", "failed to commit ledger rows", err))?;
    Ok(())
}

fn query_csv(path: &Path, query: &Query) -> Result<Table, TeeError> {
    if !path.exists() {
        return Ok(empty_table());
    }
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|err| wrap_csv("ledger-read", err))?;
    let mut rows = Vec::new();
    for result in reader.records() {
        if query.limit.is_some_and(|limit| rows.len() >= limit) {
            break;
        }
        let record = result.map_err(|err| wrap_csv("ledger-record", err))?;
        if let Some(security) = &query.security {
            if record.get(SECURITY_COLUMN) != Some(security.as_str()) {
                continue;
            }
        }
        rows.push(record.iter().map(|s| s.to_string()).collect::<Vec<_>>());
    }
    Ok(Table {
        columns: table_columns(),
        rows,
    })
}

fn query_sqlite(path: &Path, query: &Query) -> Result<Table, TeeError> {
    if !path.exists() {
        return Ok(empty_table());
    }
    let conn = Connection::open(path).map_err(|err| {
        wrap_sqlite("ledger-sqlite-open", "failed to open sqlite ledger", err)
    })?;
    let mut sql = format!("SELECT {} FROM runs", COLUMNS.join(", "));
    if query.security.is_some() {
        sql.push_str(" WHERE security = ?1");
    }
    sql.push_str(" ORDER BY rowid");
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|err| wrap_sqlite("ledger-sqlite-prepare", "failed to prepare ledger query", err))?;
    let mut rows_iter = if let Some(security) = &query.security {
        stmt.query([security])
    } else {
        stmt.query([])
    }
    .map_err(|err| wrap_sqlite("ledger-sqlite-query", "failed to execute ledger query", err))?;
    let mut rows = Vec::new();
    while let Some(row) = rows_iter
        .next()
        .map_err(|err| wrap_sqlite("ledger-sqlite-row", "failed to fetch ledger row", err))?
    {
        let mut result = Vec::with_capacity(COLUMNS.len());
        for idx in 0..COLUMNS.len() {
            let value: String = row
                .get(idx)
                .map_err(|err| wrap_sqlite("ledger-sqlite-get", "failed to read column", err))?;
            result.push(value);
        }
        rows.push(result);
    }
    Ok(Table {
        columns: table_columns(),
        rows,
    })
}

fn ensure_parent(path: &Path) -> Result<(), TeeError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            TeeError::Ledger(
                ErrorInfo::new("ledger-create", "failed to create ledger directory")
                    .with_context("path", parent.display().to_string())
                    .with_hint(err.to_string()),
            )
        })?
    }
    Ok(())
}

fn table_columns() -> Vec<String> {
    COLUMNS.iter().map(|c| c.to_string()).collect()
}

fn empty_table() -> Table {
    Table {
        columns: table_columns(),
        rows: Vec::new(),
    }
}

fn wrap_csv(code: &str, err: csv::Error) -> TeeError {
    TeeError::Ledger(ErrorInfo::new(code, "CSV ledger failure").with_hint(err.to_string()))
}

fn wrap_sqlite(code: &str, message: &str, err: rusqlite::Error) -> TeeError {
    TeeError::Ledger(ErrorInfo::new(code, message).with_hint(err.to_string()))
}
