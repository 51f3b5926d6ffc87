//! HTTP Upload Logger
//!
//! Appends a trace of every demo upload to a file when enabled via
//! environment variable. Set `DEMO_UPLOAD_HTTP_LOG=1` or
//! `DEMO_UPLOAD_HTTP_LOG=true` to enable.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use chrono::Local;
use tracing::warn;

/// Environment variable to control HTTP logging
const ENV_HTTP_LOG: &str = "DEMO_UPLOAD_HTTP_LOG";

/// Log file name, created in the working directory
pub const LOG_FILE_NAME: &str = "demo_upload_http.log";

/// Maximum body size to log (10KB)
const MAX_BODY_SIZE: usize = 10000;

/// Path segments shorter than this are never masked
const MIN_SECRET_LEN: usize = 16;

/// Global mutex for thread-safe log writing
static LOG_MUTEX: Mutex<()> = Mutex::new(());

/// Check if HTTP logging is enabled
pub fn is_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| {
        std::env::var(ENV_HTTP_LOG)
            .map(|v| parse_flag(&v))
            .unwrap_or(false)
    })
}

/// Interpret an on/off environment value
pub fn parse_flag(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "1" || v == "true" || v == "yes" || v == "on"
}

/// Outgoing upload request
pub struct UploadRequestLog {
    pub method: String,
    pub url: String,
    /// Multipart parts as (field name, summary)
    pub parts: Vec<(String, String)>,
}

/// HTTP response log entry
pub struct HttpResponseLog {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// Log an upload request and its response or error
pub fn log_upload(
    request: &UploadRequestLog,
    response: Option<&HttpResponseLog>,
    duration_ms: u64,
    error: Option<&str>,
) {
    if !is_enabled() {
        return;
    }

    let entry = format_entry(request, response, duration_ms, error);
    if let Err(e) = write_log(Path::new(LOG_FILE_NAME), &entry) {
        warn!("Failed to write HTTP log: {}", e);
    }
}

/// Render one log block
pub fn format_entry(
    request: &UploadRequestLog,
    response: Option<&HttpResponseLog>,
    duration_ms: u64,
    error: Option<&str>,
) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
    let separator = "=".repeat(80);

    let mut log_content = String::new();
    log_content.push_str(&format!(
        "\n{}\n[{}] {} {}\n{}\n",
        separator,
        timestamp,
        request.method,
        mask_url(&request.url),
        separator
    ));

    log_content.push_str("\n--- Multipart Parts ---\n");
    for (name, summary) in &request.parts {
        log_content.push_str(&format!("{}: {}\n", name, summary));
    }

    if let Some(resp) = response {
        log_content.push_str(&format!("\n--- Response ({}ms) ---\n", duration_ms));
        log_content.push_str(&format!("Status: {}\n", resp.status));

        log_content.push_str("\n--- Response Headers ---\n");
        for (name, value) in &resp.headers {
            log_content.push_str(&format!("{}: {}\n", name, value));
        }

        if let Some(body) = &resp.body {
            log_content.push_str("\n--- Response Body ---\n");
            log_content.push_str(&truncate_utf8_safe(body, MAX_BODY_SIZE));
            log_content.push('\n');
        }
    }

    if let Some(err) = error {
        log_content.push_str(&format!("\n--- Error ({}ms) ---\n", duration_ms));
        log_content.push_str(err);
        log_content.push('\n');
    }

    log_content.push_str(&format!("\n{}\n", separator));
    log_content
}

/// Write log content to file (thread-safe)
fn write_log(path: &Path, content: &str) -> std::io::Result<()> {
    // Concurrent uploads must not interleave their blocks
    let _guard = LOG_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

/// Mask the last path segment of a URL when it looks like a secret.
///
/// Webhook URLs carry their token as the final segment.
pub fn mask_url(url: &str) -> String {
    let (base, query) = match url.split_once('?') {
        Some((base, _)) => (base, "?****"),
        None => (url, ""),
    };

    match base.rsplit_once('/') {
        Some((head, last)) if last.chars().count() >= MIN_SECRET_LEN && !head.ends_with('/') => {
            format!("{}/{}{}", head, mask_token(last), query)
        }
        _ => format!("{}{}", base, query),
    }
}

/// Keep the first and last four characters of a token
pub fn mask_token(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() > 8 {
        let prefix: String = chars[..4].iter().collect();
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", prefix, suffix)
    } else {
        "****".to_string()
    }
}

/// Truncate string at UTF-8 character boundary (safe for multi-byte chars)
pub fn truncate_utf8_safe(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }

    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}...\n[truncated, total {} bytes]", &s[..end], s.len())
}

/// Extract headers from reqwest Response
pub fn extract_response_headers(response: &reqwest::Response) -> Vec<(String, String)> {
    response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                value.to_str().unwrap_or("<binary>").to_string(),
            )
        })
        .collect()
}
