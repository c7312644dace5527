use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of build output an artifact record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    /// Source checkout.
    #[serde(rename = "git repo")]
    GitRepo,
    /// Compiled simulator binary.
    #[serde(rename = "gem5 binary")]
    SimulatorBinary,
    /// Any other compiled binary (kernel, firmware, runtime, driver).
    #[serde(rename = "binary")]
    Binary,
    /// Root filesystem image mounted by the simulated system.
    #[serde(rename = "disk image")]
    DiskImage,
}

impl ArtifactKind {
    /// Label used when the kind is rendered in manifests and ledgers.
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::GitRepo => "git repo",
            ArtifactKind::SimulatorBinary => "gem5 binary",
            ArtifactKind::Binary => "binary",
            ArtifactKind::DiskImage => "disk image",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed handle to a record held by an [`ArtifactRegistry`](crate::ArtifactRegistry).
///
/// Handles are only minted by the registry and always point at a record that
/// was registered before any record that lists it as an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(u32);

impl ArtifactId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    /// Position of the record in registration order.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "artifact#{}", self.0)
    }
}

/// Declaration handed to [`ArtifactRegistry::register`](crate::ArtifactRegistry::register).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSpec {
    pub name: String,
    pub kind: ArtifactKind,
    /// Opaque build command, never executed by the launcher.
    pub command: String,
    pub path: String,
    pub cwd: String,
    pub inputs: Vec<ArtifactId>,
    pub documentation: String,
}

impl ArtifactSpec {
    /// Starts a declaration with the required fields; `cwd` defaults to `./`.
    pub fn new(
        name: impl Into<String>,
        kind: ArtifactKind,
        command: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            command: command.into(),
            path: path.into(),
            cwd: "./".to_string(),
            inputs: Vec::new(),
            documentation: String::new(),
        }
    }

    pub fn cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn inputs(mut self, inputs: impl IntoIterator<Item = ArtifactId>) -> Self {
        self.inputs = inputs.into_iter().collect();
        self
    }

    pub fn documentation(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = documentation.into();
        self
    }
}

/// Immutable provenance record for one reproducible build output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub id: ArtifactId,
    pub name: String,
    pub kind: ArtifactKind,
    pub command: String,
    pub path: String,
    pub cwd: String,
    pub inputs: Vec<ArtifactId>,
    pub documentation: String,
    /// Fingerprint over the declared metadata and the hashes of all inputs.
    pub hash: String,
}

/// Lightweight snapshot of a record carried by run requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub id: ArtifactId,
    pub name: String,
    pub kind: ArtifactKind,
    pub hash: String,
}

impl From<&ArtifactRecord> for ArtifactRef {
    fn from(record: &ArtifactRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            kind: record.kind,
            hash: record.hash.clone(),
        }
    }
}
