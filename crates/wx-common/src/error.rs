//! Error types for forecast-run resolution.

use thiserror::Error;

use crate::endpoint::RetrievalAttempt;
use crate::family::ModelFamily;

/// Result type alias using ResolveError.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Primary error type for run resolution and retrieval.
#[derive(Debug, Error)]
pub enum ResolveError {
    // === Resolution Errors ===
    /// Every candidate run was tried and none yielded a complete dataset.
    #[error("No complete {family} run found after {} attempt(s)", attempts.len())]
    StaleData {
        family: ModelFamily,
        attempts: Vec<RetrievalAttempt>,
    },

    /// The region slice left one of the horizontal axes empty.
    #[error("Region slice is empty ({lon_points} lon x {lat_points} lat points): {message}")]
    EmptyRegion {
        lon_points: usize,
        lat_points: usize,
        message: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to decode payload: {0}")]
    Decode(String),

    #[error("Resolution cancelled after {} attempt(s)", attempts.len())]
    Cancelled { attempts: Vec<RetrievalAttempt> },

    // === Infrastructure Errors ===
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ResolveError {
    pub fn invalid_input(msg: impl ToString) -> Self {
        ResolveError::InvalidInput(msg.to_string())
    }

    pub fn decode(msg: impl ToString) -> Self {
        ResolveError::Decode(msg.to_string())
    }

    /// Attempts recorded before the failure, if the error carries them.
    pub fn attempts(&self) -> &[RetrievalAttempt] {
        match self {
            ResolveError::StaleData { attempts, .. } | ResolveError::Cancelled { attempts } => {
                attempts
            }
            _ => &[],
        }
    }

    /// Short machine-readable kind, used as a metrics label and in CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveError::StaleData { .. } => "stale_data",
            ResolveError::EmptyRegion { .. } => "empty_region",
            ResolveError::InvalidInput(_) => "invalid_input",
            ResolveError::Decode(_) => "decode",
            ResolveError::Cancelled { .. } => "cancelled",
            ResolveError::Transport(_) => "transport",
            ResolveError::Config(_) => "config",
            ResolveError::Io(_) => "io",
        }
    }
}

impl From<serde_json::Error> for ResolveError {
    fn from(err: serde_json::Error) -> Self {
        ResolveError::Config(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(ResolveError::invalid_input("x").kind(), "invalid_input");
        assert_eq!(ResolveError::decode("x").kind(), "decode");
        let stale = ResolveError::StaleData {
            family: ModelFamily::Gfs,
            attempts: Vec::new(),
        };
        assert_eq!(stale.kind(), "stale_data");
        assert!(stale.attempts().is_empty());
        assert!(stale.to_string().contains("gfs"));
    }
}
