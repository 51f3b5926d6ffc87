//! Background upload task
//!
//! One task per dispatched demo. The task owns a snapshot of its arguments,
//! sends a multipart POST (re-sent on every redirect hop) and reports the
//! outcome to the operator log.
//! Nothing is handed back to the dispatcher.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use reqwest::header::LOCATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Response, StatusCode, Url};
use tokio::fs::File;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::UploadError;
use crate::host::OperatorLog;
use crate::http_logger::{self, HttpResponseLog, UploadRequestLog};

/// Multipart field carrying the demo file
pub const FILE_PART_NAME: &str = "files[0]";

/// Multipart field carrying the JSON message
pub const PAYLOAD_PART_NAME: &str = "payload_json";

/// Message posted alongside every demo
pub const DEMO_RECORDED_MESSAGE: &str = "A demo has been recorded.";

/// Scheme assumed when the destination has none
const DEFAULT_SCHEME: &str = "https";

const FILE_MIME: &str = "application/octet-stream";

/// Redirect limit used when none is configured
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Statuses whose `Location` is followed, always re-sending the POST
const REDIRECT_STATUSES: [StatusCode; 5] = [
    StatusCode::MOVED_PERMANENTLY,
    StatusCode::FOUND,
    StatusCode::SEE_OTHER,
    StatusCode::TEMPORARY_REDIRECT,
    StatusCode::PERMANENT_REDIRECT,
];

/// Arguments of one upload, captured at dispatch time
#[derive(Debug, Clone)]
pub struct UploadTaskArgs {
    upload_id: Uuid,
    demo_file_path: PathBuf,
    push_url: String,
    max_redirects: usize,
}

impl UploadTaskArgs {
    /// Copy the path and the current destination into an owned bundle
    pub fn snapshot(demo_file_path: &Path, push_url: &str) -> Self {
        Self {
            upload_id: Uuid::new_v4(),
            demo_file_path: demo_file_path.to_path_buf(),
            push_url: push_url.to_string(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }

    /// Limit the number of redirects this upload follows
    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn upload_id(&self) -> Uuid {
        self.upload_id
    }

    pub fn demo_file_path(&self) -> &Path {
        &self.demo_file_path
    }

    pub fn push_url(&self) -> &str {
        &self.push_url
    }

    pub fn max_redirects(&self) -> usize {
        self.max_redirects
    }
}

/// How a single upload ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Endpoint answered with a 2xx status
    Delivered { status: u16 },
    /// Endpoint answered with a non-success status
    Rejected { status: u16 },
    /// Transport failure or unreadable demo file
    RequestFailed(String),
    /// The request could not be built; nothing was sent
    HandleCreationFailed(String),
}

impl UploadOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

impl fmt::Display for UploadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delivered { status } => write!(f, "finished with HTTP {}", status),
            Self::Rejected { status } => write!(f, "failed: HTTP {}", status),
            Self::RequestFailed(reason) => write!(f, "failed: {}", reason),
            Self::HandleCreationFailed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// The fixed JSON message part
pub fn payload_json() -> String {
    serde_json::json!({ "content": DEMO_RECORDED_MESSAGE }).to_string()
}

/// Prefix `https://` when the URL carries no scheme.
///
/// Only the text before the first `/`, `?` or `#` may hold the scheme, so a
/// `://` inside a path or query does not count.
pub fn with_default_scheme(url: &str) -> String {
    if has_scheme(url) {
        url.to_string()
    } else {
        format!("{}://{}", DEFAULT_SCHEME, url)
    }
}

fn has_scheme(url: &str) -> bool {
    let head_end = url
        .find(|c: char| matches!(c, '/' | '?' | '#'))
        .unwrap_or(url.len());
    let Some(scheme) = url[..head_end].strip_suffix(':') else {
        return false;
    };
    url[head_end..].starts_with("//")
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Run one upload to completion.
///
/// Consumes the argument bundle; it is dropped when the task ends, whatever
/// the outcome.
pub async fn run_upload_task(
    client: Client,
    args: UploadTaskArgs,
    log: &dyn OperatorLog,
) -> UploadOutcome {
    let upload_id = args.upload_id();
    debug!(%upload_id, path = %args.demo_file_path().display(), "Upload task created");

    let outcome = match perform_upload(&client, &args).await {
        Ok(status) if (200..300).contains(&status) => UploadOutcome::Delivered { status },
        Ok(status) => UploadOutcome::Rejected { status },
        Err(UploadError::HandleCreation(reason)) => UploadOutcome::HandleCreationFailed(reason),
        Err(UploadError::RequestExecution(reason)) => UploadOutcome::RequestFailed(reason),
        Err(e) => UploadOutcome::RequestFailed(e.to_string()),
    };

    if outcome.is_delivered() {
        info!(%upload_id, "Demo upload {}", outcome);
    } else {
        warn!(%upload_id, "Demo upload {}", outcome);
    }
    log.print(&format!(
        "Demo upload of {} {}",
        args.demo_file_path().display(),
        outcome
    ));

    debug!(%upload_id, "Upload task cleaned up");
    outcome
}

/// Build and send the multipart request, following redirects by hand.
///
/// Every hop re-sends a POST with a freshly opened file part. Returns the
/// status of the last response.
async fn perform_upload(client: &Client, args: &UploadTaskArgs) -> Result<u16, UploadError> {
    let mut url = Url::parse(&with_default_scheme(args.push_url()))
        .map_err(|e| UploadError::HandleCreation(format!("invalid push URL: {}", e)))?;
    let mut redirects = 0;

    loop {
        let (status, location) = send_upload(client, args, &url).await?;

        let Some(next) = location else {
            return Ok(status);
        };
        if redirects >= args.max_redirects() {
            warn!(upload_id = %args.upload_id(), redirects, "Too many redirects");
            return Ok(status);
        }
        redirects += 1;
        debug!(upload_id = %args.upload_id(), from = %url, to = %next, status, "Following redirect");
        url = next;
    }
}

/// Send one POST to `url`.
///
/// Returns the status and, for redirect responses, the resolved target.
async fn send_upload(
    client: &Client,
    args: &UploadTaskArgs,
    url: &Url,
) -> Result<(u16, Option<Url>), UploadError> {
    debug!(upload_id = %args.upload_id(), "Configuring upload request");
    let (form, file_size) = build_form(args.demo_file_path()).await?;

    let request = client
        .post(url.clone())
        .multipart(form)
        .build()
        .map_err(|e| UploadError::HandleCreation(e.to_string()))?;

    let request_log = if http_logger::is_enabled() {
        Some(UploadRequestLog {
            method: "POST".to_string(),
            url: url.to_string(),
            parts: vec![
                (
                    FILE_PART_NAME.to_string(),
                    format!(
                        "{} ({} bytes)",
                        args.demo_file_path().display(),
                        file_size
                    ),
                ),
                (PAYLOAD_PART_NAME.to_string(), payload_json()),
            ],
        })
    } else {
        None
    };

    debug!(upload_id = %args.upload_id(), %url, file_size, "Executing upload request");
    let start_time = Instant::now();
    let response = client.execute(request).await;
    let duration_ms = start_time.elapsed().as_millis() as u64;

    match response {
        Ok(resp) => {
            let status = resp.status().as_u16();
            let location = redirect_target(url, &resp);
            if let Some(ref req_log) = request_log {
                let response_headers = http_logger::extract_response_headers(&resp);
                let body_text = resp.text().await.unwrap_or_default();
                let response_log = HttpResponseLog {
                    status,
                    headers: response_headers,
                    body: Some(body_text),
                };
                http_logger::log_upload(req_log, Some(&response_log), duration_ms, None);
            }
            Ok((status, location))
        }
        Err(e) => {
            let error_msg = e.to_string();
            if let Some(ref req_log) = request_log {
                http_logger::log_upload(req_log, None, duration_ms, Some(&error_msg));
            }
            Err(UploadError::RequestExecution(error_msg))
        }
    }
}

/// Open the demo and build the two-part form, streaming the file
async fn build_form(demo_file_path: &Path) -> Result<(Form, u64), UploadError> {
    let read_error = |e: std::io::Error| {
        UploadError::RequestExecution(format!(
            "cannot read {}: {}",
            demo_file_path.display(),
            e
        ))
    };
    let file = File::open(demo_file_path).await.map_err(read_error)?;
    let file_size = file.metadata().await.map_err(read_error)?.len();

    let file_part = Part::stream_with_length(Body::from(file), file_size)
        .file_name(remote_file_name(demo_file_path))
        .mime_str(FILE_MIME)
        .map_err(|e| UploadError::HandleCreation(e.to_string()))?;
    let form = Form::new()
        .part(FILE_PART_NAME, file_part)
        .text(PAYLOAD_PART_NAME, payload_json());
    Ok((form, file_size))
}

/// Resolve the `Location` of a redirect response against the current URL
fn redirect_target(current: &Url, response: &Response) -> Option<Url> {
    if !REDIRECT_STATUSES.contains(&response.status()) {
        return None;
    }
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    current.join(location).ok()
}

/// File name announced in the multipart part
fn remote_file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "demo.dem".to_string())
}
