use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GsiError {
    /// A position/forward string that does not hold exactly three numbers.
    #[error("malformed vector in '{field}' ({value:?}): {reason}")]
    MalformedVector {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to decode telemetry payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to access '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid identity file '{}': {reason}", path.display())]
    Identity { path: PathBuf, reason: String },
}

impl GsiError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_malformed_vector(&self) -> bool {
        matches!(self, Self::MalformedVector { .. })
    }
}
