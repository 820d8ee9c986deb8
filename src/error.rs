use crate::models::LibraryType;

/// Errors surfaced by the compliance core.
///
/// Enrichment failures are not part of this type: they stay inside the
/// pipeline (see [`crate::pipeline::StepError`]).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{entity} {key} already exists")]
    Duplicate { entity: &'static str, key: String },

    #[error("{entity} {key} does not exist")]
    NotFound { entity: &'static str, key: String },

    #[error("{entity} {key} is still referenced by {by}")]
    StillReferenced {
        entity: &'static str,
        key: String,
        by: String,
    },

    #[error("invalid {entity}: {reason}")]
    Invalid { entity: &'static str, reason: String },

    #[error(transparent)]
    Query(#[from] crate::query::Error),

    #[error("no enrichment step registered for library type '{0}'")]
    NoStepRegistered(LibraryType),

    #[error("transaction aborted: {0}")]
    Transaction(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn duplicate(entity: &'static str, key: impl std::fmt::Display) -> Self {
        Error::Duplicate {
            entity,
            key: key.to_string(),
        }
    }

    pub(crate) fn not_found(entity: &'static str, key: impl std::fmt::Display) -> Self {
        Error::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub(crate) fn invalid(entity: &'static str, reason: impl Into<String>) -> Self {
        Error::Invalid {
            entity,
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
