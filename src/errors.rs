pub type RecResult<T> = std::result::Result<T, RecError>;

#[derive(thiserror::Error, Debug)]
pub enum RecError {
    #[error("error: no users or items in the training partition of `{0}`")]
    InsufficientData(String),
    #[error("error: no trained model for `{0}`")]
    MissingArtifact(String),
    #[error("error: user `{0}` not found in trained index")]
    ColdUser(String),
    #[error("error: singular system while solving {side} factors, row {row}")]
    Convergence { side: &'static str, row: usize },
    #[error("error: invalid parameter, {0}")]
    InvalidParam(String),
    #[error("error: artifact io error, {0}")]
    Io(#[from] std::io::Error),
    #[error("error: failed to (de)serialize artifact, {0}")]
    Serialization(#[from] bincode::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RecError {
    /// Data-availability problems that serving recovers from by falling back to popularity.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RecError::MissingArtifact(_) | RecError::ColdUser(_))
    }
}

#[cfg(feature = "python")]
impl From<RecError> for pyo3::PyErr {
    fn from(e: RecError) -> Self {
        use pyo3::exceptions::{PyIOError, PyValueError};
        match e {
            RecError::Io(_) | RecError::Serialization(_) | RecError::Json(_) => {
                PyIOError::new_err(e.to_string())
            }
            _ => PyValueError::new_err(e.to_string()),
        }
    }
}
