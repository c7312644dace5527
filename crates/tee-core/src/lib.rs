#![deny(missing_docs)]
#![doc = "Core error and provenance types for the Keystone experiment launcher."]

pub mod errors;
pub mod provenance;

pub use errors::{ErrorInfo, TeeError};
pub use provenance::{LaunchProvenance, SchemaVersion};
