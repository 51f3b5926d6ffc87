//! Tests for the background upload task
//! Uses wiremock to stand in for the push endpoint

use std::path::{Path, PathBuf};

use demo_upload::config::Config;
use demo_upload::host::MemoryLog;
use demo_upload::upload::{
    run_upload_task, ClientFactory, ReqwestClientFactory, UploadOutcome, UploadTaskArgs,
};
use reqwest::Client;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DEMO_BYTES: &[u8] = b"HLDEMO\0\0demo-bytes-for-upload";

fn write_demo(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn create_test_client() -> Client {
    ReqwestClientFactory.create(&Config::default()).unwrap()
}

/// Count the requests that reached `route` with the given method and body marker
async fn count_posts_with_body(server: &MockServer, route: &str, marker: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|request| {
            request.method.as_str() == "POST"
                && request.url.path() == route
                && String::from_utf8_lossy(&request.body).contains(marker)
        })
        .count()
}

async fn run(push_url: &str, demo: &Path, log: &MemoryLog) -> UploadOutcome {
    let args = UploadTaskArgs::snapshot(demo, push_url);
    run_upload_task(create_test_client(), args, log).await
}

#[tokio::test]
async fn test_upload_sends_multipart_post() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let demo = write_demo(&dir, "demo1.dem", DEMO_BYTES);
    let log = MemoryLog::new();

    let outcome = run(&format!("{}/hook", mock_server.uri()), &demo, &log).await;
    assert_eq!(outcome, UploadOutcome::Delivered { status: 200 });

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];

    let content_type = request
        .headers
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("multipart/form-data; boundary="));

    let body = String::from_utf8_lossy(&request.body).to_string();
    let file_part = body.find(r#"name="files[0]""#).unwrap();
    let payload_part = body.find(r#"name="payload_json""#).unwrap();
    assert!(file_part < payload_part, "file part must come first");
    assert!(body.contains(r#"filename="demo1.dem""#));
    assert!(body.contains("demo-bytes-for-upload"));
    assert!(body.contains(r#"{"content":"A demo has been recorded."}"#));
    assert_eq!(body.matches("Content-Disposition: form-data").count(), 2);
}

#[tokio::test]
async fn test_upload_logs_success_line() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let demo = write_demo(&dir, "demo1.dem", DEMO_BYTES);
    let log = MemoryLog::new();

    let outcome = run(&format!("{}/hook", mock_server.uri()), &demo, &log).await;
    assert_eq!(outcome, UploadOutcome::Delivered { status: 204 });
    assert_eq!(
        log.lines(),
        vec![format!(
            "Demo upload of {} finished with HTTP 204",
            demo.display()
        )]
    );
}

#[tokio::test]
async fn test_upload_server_error_is_rejected() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let demo = write_demo(&dir, "demo1.dem", DEMO_BYTES);
    let log = MemoryLog::new();

    let outcome = run(&format!("{}/hook", mock_server.uri()), &demo, &log).await;
    assert_eq!(outcome, UploadOutcome::Rejected { status: 500 });
    assert_eq!(log.count_starting_with("Demo upload of"), 1);
    assert!(log.lines()[0].ends_with("failed: HTTP 500"));
}

async fn mount_redirect(server: &MockServer, from: &str, status: u16, to: &str) {
    Mock::given(method("POST"))
        .and(path(from))
        .respond_with(
            ResponseTemplate::new(status)
                .insert_header("location", format!("{}{}", server.uri(), to).as_str()),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_upload_follows_temporary_redirect_with_body() {
    let mock_server = MockServer::start().await;
    mount_redirect(&mock_server, "/old", 307, "/new").await;
    Mock::given(method("POST"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let demo = write_demo(&dir, "demo1.dem", DEMO_BYTES);
    let log = MemoryLog::new();

    let outcome = run(&format!("{}/old", mock_server.uri()), &demo, &log).await;
    assert_eq!(outcome, UploadOutcome::Delivered { status: 200 });
    assert_eq!(
        count_posts_with_body(&mock_server, "/new", "demo-bytes-for-upload").await,
        1
    );
}

#[tokio::test]
async fn test_upload_found_redirect_keeps_post_and_body() {
    let mock_server = MockServer::start().await;
    mount_redirect(&mock_server, "/old", 302, "/new").await;
    Mock::given(method("POST"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let demo = write_demo(&dir, "demo1.dem", DEMO_BYTES);
    let log = MemoryLog::new();

    let outcome = run(&format!("{}/old", mock_server.uri()), &demo, &log).await;
    assert_eq!(outcome, UploadOutcome::Delivered { status: 200 });

    let requests = mock_server.received_requests().await.unwrap();
    let last = requests.last().unwrap();
    assert_eq!(last.method.as_str(), "POST");
    let body = String::from_utf8_lossy(&last.body).to_string();
    assert!(body.contains(r#"name="files[0]""#));
    assert!(body.contains("demo-bytes-for-upload"));
    assert!(body.contains(r#"{"content":"A demo has been recorded."}"#));
}

#[tokio::test]
async fn test_upload_follows_redirect_chain() {
    let mock_server = MockServer::start().await;
    mount_redirect(&mock_server, "/a", 308, "/b").await;
    mount_redirect(&mock_server, "/b", 301, "/c").await;
    Mock::given(method("POST"))
        .and(path("/c"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let demo = write_demo(&dir, "demo1.dem", DEMO_BYTES);
    let log = MemoryLog::new();

    let outcome = run(&format!("{}/a", mock_server.uri()), &demo, &log).await;
    assert_eq!(outcome, UploadOutcome::Delivered { status: 201 });
    assert_eq!(
        count_posts_with_body(&mock_server, "/c", "demo-bytes-for-upload").await,
        1
    );
}

#[tokio::test]
async fn test_upload_stops_after_redirect_limit() {
    let mock_server = MockServer::start().await;
    mount_redirect(&mock_server, "/loop", 307, "/loop").await;

    let dir = TempDir::new().unwrap();
    let demo = write_demo(&dir, "demo1.dem", DEMO_BYTES);
    let log = MemoryLog::new();

    let args = UploadTaskArgs::snapshot(&demo, &format!("{}/loop", mock_server.uri()))
        .with_max_redirects(2);
    let outcome = run_upload_task(create_test_client(), args, &log).await;

    assert_eq!(outcome, UploadOutcome::Rejected { status: 307 });
    // The original request plus two followed hops
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_redirect_without_location_is_rejected() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(302))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let demo = write_demo(&dir, "demo1.dem", DEMO_BYTES);
    let log = MemoryLog::new();

    let outcome = run(&format!("{}/hook", mock_server.uri()), &demo, &log).await;
    assert_eq!(outcome, UploadOutcome::Rejected { status: 302 });
}

#[tokio::test]
async fn test_upload_sends_full_file_length() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let contents: Vec<u8> = (0..256 * 1024).map(|i| b'a' + (i % 26) as u8).collect();
    let demo = write_demo(&dir, "big.dem", &contents);
    let log = MemoryLog::new();

    let outcome = run(&format!("{}/hook", mock_server.uri()), &demo, &log).await;
    assert_eq!(outcome, UploadOutcome::Delivered { status: 200 });

    let requests = mock_server.received_requests().await.unwrap();
    let body = &requests[0].body;
    assert!(body.windows(contents.len()).any(|window| window == contents.as_slice()));
}

#[tokio::test]
async fn test_missing_file_sends_nothing() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.dem");
    let log = MemoryLog::new();

    let outcome = run(&format!("{}/hook", mock_server.uri()), &missing, &log).await;
    match outcome {
        UploadOutcome::RequestFailed(reason) => assert!(reason.contains("missing.dem")),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(log.lines()[0].contains("failed: "));
}

#[tokio::test]
async fn test_invalid_url_fails_handle_creation() {
    let dir = TempDir::new().unwrap();
    let demo = write_demo(&dir, "demo1.dem", DEMO_BYTES);
    let log = MemoryLog::new();

    let outcome = run("http://[::1", &demo, &log).await;
    assert!(matches!(outcome, UploadOutcome::HandleCreationFailed(_)));
    assert_eq!(log.count_starting_with("Demo upload of"), 1);
    // The demo stays on disk
    assert!(demo.exists());
}

#[tokio::test]
async fn test_unreachable_endpoint_is_request_failure() {
    // Bind then drop a listener so the port is closed
    let uri = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };

    let dir = TempDir::new().unwrap();
    let demo = write_demo(&dir, "demo1.dem", DEMO_BYTES);
    let log = MemoryLog::new();

    let outcome = run(&format!("{}/hook", uri), &demo, &log).await;
    assert!(matches!(outcome, UploadOutcome::RequestFailed(_)));
}
