//! Configuration module - destination URL and transfer settings

use std::sync::Arc;

/// Environment variable holding the default push URL
pub const ENV_DEMO_UPLOAD_URL: &str = "DEMO_UPLOAD_URL";

/// Size of the destination buffer, terminator included
pub const MAX_DESTINATION_LEN: usize = 1024;

/// Optional configuration parameters for Config::new()
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    pub request_timeout: Option<u64>,
    pub connect_timeout: Option<u64>,
    pub max_redirects: Option<usize>,
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct Config {
    pub destination: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub max_redirects: usize,
}

impl Config {
    /// Create a new Config with an initial destination (may be empty)
    pub fn new(destination: String, options: ConfigOptions) -> Arc<Self> {
        Arc::new(Self {
            destination: bound_destination(&destination),
            request_timeout_secs: options.request_timeout.unwrap_or(300),
            connect_timeout_secs: options.connect_timeout.unwrap_or(30),
            max_redirects: options.max_redirects.unwrap_or(10),
        })
    }

    /// Read the destination from the environment, ignoring blank values
    pub fn destination_from_env() -> Option<String> {
        std::env::var(ENV_DEMO_UPLOAD_URL)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            destination: String::new(),
            request_timeout_secs: 300,
            connect_timeout_secs: 30,
            max_redirects: 10,
        }
    }
}

/// Truncate a destination URL so it fits the destination buffer.
///
/// At most `MAX_DESTINATION_LEN - 1` bytes are kept, cut back to the last
/// UTF-8 character boundary.
pub fn bound_destination(url: &str) -> String {
    let max_len = MAX_DESTINATION_LEN - 1;
    if url.len() <= max_len {
        return url.to_string();
    }

    let mut end = max_len;
    while end > 0 && !url.is_char_boundary(end) {
        end -= 1;
    }
    url[..end].to_string()
}
