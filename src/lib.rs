//! demo-upload library - background upload of recorded demos to an HTTP endpoint

pub mod config;
pub mod error;
pub mod host;
pub mod http_logger;
pub mod upload;

// Re-export commonly used types
pub use config::{Config, ConfigOptions};
pub use error::UploadError;
pub use host::{ModuleState, OperatorLog, TracingLog};
pub use upload::{Dispatch, UploadOutcome, UploadTaskArgs, Uploader};
