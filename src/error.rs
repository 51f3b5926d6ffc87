//! Error types for the demo uploader

use thiserror::Error;

/// No async runtime was available to run background uploads on
pub const INIT_NO_RUNTIME: i32 = 1;

/// The HTTP client could not be constructed
pub const INIT_CLIENT_BUILD: i32 = 2;

/// Demo upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("HTTP client initialization failed with code {code}: {reason}")]
    Initialization { code: i32, reason: String },

    #[error("Demo upload module is already initialized")]
    AlreadyInitialized,

    #[error("Demo upload module is not running")]
    NotRunning,

    #[error("Demo file path is empty")]
    EmptyPath,

    #[error("Failed to create upload request: {0}")]
    HandleCreation(String),

    #[error("Upload request failed: {0}")]
    RequestExecution(String),
}

impl UploadError {
    /// Numeric failure code, only meaningful for initialization failures
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Initialization { code, .. } => Some(*code),
            _ => None,
        }
    }
}
