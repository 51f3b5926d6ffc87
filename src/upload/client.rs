//! HTTP client construction
//!
//! The client is the uploader's shared library state: built once at module
//! init, cloned into every task, dropped at shutdown.

use std::time::Duration;

use reqwest::{redirect, Client};

use crate::config::Config;
use crate::error::{UploadError, INIT_CLIENT_BUILD};

/// User-Agent header value
pub const USER_AGENT: &str = concat!("demo-upload/", env!("CARGO_PKG_VERSION"));

/// Builds the HTTP client used by all uploads
pub trait ClientFactory: Send + Sync {
    fn create(&self, config: &Config) -> Result<Client, UploadError>;
}

/// Default factory backed by reqwest's builder
#[derive(Debug, Default, Clone, Copy)]
pub struct ReqwestClientFactory;

impl ClientFactory for ReqwestClientFactory {
    fn create(&self, config: &Config) -> Result<Client, UploadError> {
        Client::builder()
            .user_agent(USER_AGENT)
            // Redirects are followed per upload so the POST body can be re-sent
            .redirect(redirect::Policy::none())
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| UploadError::Initialization {
                code: INIT_CLIENT_BUILD,
                reason: e.to_string(),
            })
    }
}
