//! Demo upload pipeline - client setup, dispatch and background tasks

pub mod client;
pub mod task;
pub mod uploader;

pub use client::{ClientFactory, ReqwestClientFactory};
pub use task::{
    run_upload_task, with_default_scheme, UploadOutcome, UploadTaskArgs, FILE_PART_NAME,
    PAYLOAD_PART_NAME,
};
pub use uploader::{Dispatch, Uploader};
