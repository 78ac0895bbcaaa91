//! Error taxonomy for the reconciliation core.
//!
//! Every variant names the resource it concerns (domain, upstream or
//! document path) so callers can point the operator at the file to fix.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// A malformed entity: bad routing combination, weights, missing field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{resource}: invalid `{field}`: {message}")]
pub struct ValidationError {
    pub resource: String,
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(
        resource: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            resource: resource.into(),
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{resource}: cannot resolve {kind} `{reference}`")]
    Resolution {
        resource: String,
        kind: &'static str,
        reference: String,
    },

    #[error("{resource}: failed to {action} {}: {source}", path.display())]
    Persistence {
        resource: String,
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: malformed document: {source}", path.display())]
    Document {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{resource}: could not parse actual config {}", path.display())]
    DriftComparison { resource: String, path: PathBuf },

    #[error("{resource}: failed to render config: {source}")]
    Render {
        resource: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl Error {
    pub fn unresolved_upstream(resource: impl Into<String>, reference: impl Into<String>) -> Self {
        Error::Resolution {
            resource: resource.into(),
            kind: "upstream",
            reference: reference.into(),
        }
    }

    pub fn unresolved_provider(resource: impl Into<String>, reference: impl Into<String>) -> Self {
        Error::Resolution {
            resource: resource.into(),
            kind: "provider",
            reference: reference.into(),
        }
    }

    pub(crate) fn io(
        resource: impl Into<String>,
        action: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Error::Persistence {
            resource: resource.into(),
            action,
            path: path.into(),
            source,
        }
    }

    /// Identifier of the resource the error is about.
    pub fn resource(&self) -> String {
        match self {
            Error::Validation(e) => e.resource.clone(),
            Error::Resolution { resource, .. }
            | Error::Persistence { resource, .. }
            | Error::DriftComparison { resource, .. }
            | Error::Render { resource, .. } => resource.clone(),
            Error::Document { path, .. } => path.display().to_string(),
        }
    }
}
