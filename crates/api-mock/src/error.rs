use std::path::PathBuf;

use api_mock_mockserver::MockServerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistrarError {
    #[error("instance id must be a non-empty string")]
    EmptyInstanceId,

    #[error("failed to read fixture {}", path.display())]
    Fixture {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    MockServer(#[from] MockServerError),

    #[error("failed to register {} rule(s): {}", failed.len(), failed.join(", "))]
    Registration {
        failed: Vec<String>,
        #[source]
        source: Box<RegistrarError>,
    },

    #[error("expected {expected} active expectations, found {actual} (missing: {})", missing.join(", "))]
    Verification {
        expected: usize,
        actual: usize,
        missing: Vec<String>,
    },

    #[error("probe of {path} failed: {reason}")]
    ProbeMismatch { path: String, reason: String },
}

pub type RegistrarResult<T> = Result<T, RegistrarError>;
