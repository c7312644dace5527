use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tee_core::errors::{ErrorInfo, TeeError};

use crate::artifact::{ArtifactId, ArtifactKind, ArtifactRecord, ArtifactRef, ArtifactSpec};
use crate::hash::stable_hash_string;

/// Registration-ordered collection of artifact records.
///
/// Records are appended once and never mutated. Because an input must already
/// be registered, registration order is a topological order of the
/// dependency graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtifactRegistry {
    records: Vec<ArtifactRecord>,
    by_name: BTreeMap<String, ArtifactId>,
}

#[derive(Serialize)]
struct HashInput<'a> {
    name: &'a str,
    kind: ArtifactKind,
    command: &'a str,
    path: &'a str,
    cwd: &'a str,
    documentation: &'a str,
    inputs: Vec<&'a str>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an artifact declaration and returns its handle.
    pub fn register(&mut self, spec: ArtifactSpec) -> Result<ArtifactId, TeeError> {
        require_field(&spec.name, "name", &spec.name)?;
        require_field(&spec.command, "command", &spec.name)?;
        require_field(&spec.path, "path", &spec.name)?;
        if self.by_name.contains_key(&spec.name) {
            return Err(TeeError::Artifact(
                ErrorInfo::new("artifact-duplicate", "artifact name already registered")
                    .with_context("name", spec.name.clone()),
            ));
        }
        let mut seen = BTreeSet::new();
        let mut input_hashes = Vec::with_capacity(spec.inputs.len());
        for input in &spec.inputs {
            let record = self.records.get(input.index()).ok_or_else(|| {
                TeeError::Artifact(
                    ErrorInfo::new("artifact-unknown-input", "input is not a registered artifact")
                        .with_context("name", spec.name.clone())
                        .with_context("input", input.to_string())
                        .with_hint("register inputs before the artifacts that depend on them"),
                )
            })?;
            if !seen.insert(*input) {
                return Err(TeeError::Artifact(
                    ErrorInfo::new("artifact-duplicate-input", "input listed more than once")
                        .with_context("name", spec.name.clone())
                        .with_context("input", record.name.clone()),
                ));
            }
            input_hashes.push(record.hash.as_str());
        }
        let hash = stable_hash_string(&HashInput {
            name: &spec.name,
            kind: spec.kind,
            command: &spec.command,
            path: &spec.path,
            cwd: &spec.cwd,
            documentation: &spec.documentation,
            inputs: input_hashes,
        })?;

        let id = ArtifactId::from_index(self.records.len());
        log::debug!("registered {} '{}' as {}", spec.kind, spec.name, id);
        self.by_name.insert(spec.name.clone(), id);
        self.records.push(ArtifactRecord {
            id,
            name: spec.name,
            kind: spec.kind,
            command: spec.command,
            path: spec.path,
            cwd: spec.cwd,
            inputs: spec.inputs,
            documentation: spec.documentation,
            hash,
        });
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: ArtifactId) -> Option<&ArtifactRecord> {
        self.records.get(id.index())
    }

    pub fn find(&self, name: &str) -> Option<&ArtifactRecord> {
        self.by_name.get(name).and_then(|id| self.get(*id))
    }

    /// Records in registration order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &ArtifactRecord> + '_ {
        self.records.iter()
    }

    /// Snapshot reference for embedding in run requests.
    pub fn reference(&self, id: ArtifactId) -> Result<ArtifactRef, TeeError> {
        self.get(id).map(ArtifactRef::from).ok_or_else(|| {
            TeeError::Artifact(
                ErrorInfo::new("artifact-unknown", "handle does not belong to this registry")
                    .with_context("id", id.to_string()),
            )
        })
    }

    /// Transitive inputs of `id`, in registration order, excluding `id` itself.
    pub fn dependencies(&self, id: ArtifactId) -> Result<Vec<ArtifactId>, TeeError> {
        let root = self.reference(id)?;
        let mut closure = BTreeSet::new();
        let mut stack = vec![root.id];
        while let Some(next) = stack.pop() {
            if let Some(record) = self.get(next) {
                for input in &record.inputs {
                    if closure.insert(*input) {
                        stack.push(*input);
                    }
                }
            }
        }
        Ok(closure.into_iter().collect())
    }

    /// Hash over every record hash, in registration order.
    pub fn catalog_hash(&self) -> Result<String, TeeError> {
        let hashes: Vec<&str> = self.records.iter().map(|r| r.hash.as_str()).collect();
        stable_hash_string(&hashes)
    }
}

fn require_field(value: &str, field: &str, name: &str) -> Result<(), TeeError> {
    if value.trim().is_empty() {
        return Err(TeeError::Artifact(
            ErrorInfo::new("artifact-missing-field", "required artifact field is empty")
                .with_context("field", field)
                .with_context("name", name),
        ));
    }
    Ok(())
}
