//! Tests for the HTTP transport against a throwaway local server

use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use unifypdf::{
    CandidateFile, CollaboratorError, HttpTransport, Limits, MergeRequest, MergeTransport,
    OrchestrationStatus, QueueStore, Session, TempFileHost, Validator,
};

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Read one full HTTP request (headers plus body)
async fn read_request(socket: &mut TcpStream) -> Vec<u8> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = socket.read(&mut chunk).await.expect("Failed to read request");
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);

        let Some(header_end) = find(&buffer, b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&buffer[..header_end]).to_lowercase();
        let content_length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok());
        match content_length {
            Some(len) if buffer.len() >= header_end + 4 + len => break,
            Some(_) => {}
            None if buffer.ends_with(b"\r\n0\r\n\r\n") => break,
            None => {}
        }
    }
    buffer
}

/// Serve exactly one request with the given status line and body
async fn serve_once(status_line: &'static str, body: &'static [u8]) -> (String, JoinHandle<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind");
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("Failed to accept");
        let request = read_request(&mut socket).await;

        let head = format!(
            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status_line,
            body.len()
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(body).await.unwrap();
        let _ = socket.shutdown().await;
        request
    });

    (format!("http://{}", addr), handle)
}

fn request(names: &[&str]) -> MergeRequest {
    let mut queue = QueueStore::new(Validator::default(), Vec::new());
    queue.append(
        names
            .iter()
            .map(|n| CandidateFile::new(*n, None, format!("%PDF-1.7 {}", n).into_bytes()))
            .collect(),
    );
    MergeRequest::from_snapshot(&queue.snapshot())
}

fn transport(base_url: &str) -> HttpTransport {
    HttpTransport::new(base_url, Duration::from_secs(10)).expect("Failed to build transport")
}

#[tokio::test]
async fn test_posts_multipart_parts_in_queue_order() {
    let (base_url, server) = serve_once("200 OK", b"%PDF-merged").await;

    let merged = transport(&base_url)
        .merge(request(&["A.pdf", "B.pdf", "C.pdf"]))
        .await
        .expect("merge should succeed");
    assert_eq!(merged, b"%PDF-merged");

    let raw = server.await.unwrap();
    let text = String::from_utf8_lossy(&raw);
    assert!(text.starts_with("POST /pdf/merge HTTP/1.1"), "unexpected request line: {}", text);
    assert!(text.to_lowercase().contains("content-type: multipart/form-data"));
    assert_eq!(text.matches("name=\"files\"").count(), 3);

    let positions: Vec<usize> = ["A.pdf", "B.pdf", "C.pdf"]
        .iter()
        .map(|n| {
            find(&raw, format!("filename=\"{}\"", n).as_bytes())
                .unwrap_or_else(|| panic!("part for {} missing", n))
        })
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "parts out of order: {:?}", positions);
    assert!(text.contains("%PDF-1.7 B.pdf"));
}

#[tokio::test]
async fn test_error_body_is_used_verbatim() {
    let (base_url, server) = serve_once("500 Internal Server Error", b"decrypt failed").await;

    let result = transport(&base_url).merge(request(&["A.pdf", "B.pdf"])).await;
    assert_eq!(
        result,
        Err(CollaboratorError::Rejected {
            status: 500,
            message: "decrypt failed".to_string(),
        })
    );
    server.await.unwrap();
}

#[tokio::test]
async fn test_empty_error_body_uses_status() {
    let (base_url, server) = serve_once("503 Service Unavailable", b"").await;

    let result = transport(&base_url).merge(request(&["A.pdf", "B.pdf"])).await;
    let err = result.expect_err("503 should fail");
    assert_eq!(err.to_string(), "Merge failed with status 503");
    server.await.unwrap();
}

#[tokio::test]
async fn test_unreachable_service_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = transport(&format!("http://{}", addr))
        .merge(request(&["A.pdf", "B.pdf"]))
        .await;
    assert!(matches!(result, Err(CollaboratorError::Transport(_))), "got {:?}", result);
}

#[tokio::test]
async fn test_session_over_http_previews_result_in_temp_file() {
    let (base_url, server) = serve_once("200 OK", b"%PDF-merged").await;
    let preview_dir = TempDir::new().expect("Failed to create temp directory");
    let session = Session::new(
        Limits::default(),
        transport(&base_url),
        TempFileHost::in_dir(preview_dir.path()),
    );

    session.append(vec![
        CandidateFile::new("one.pdf", None, b"%PDF-1".to_vec()),
        CandidateFile::new("two.pdf", None, b"%PDF-2".to_vec()),
    ]);
    assert_eq!(session.submit().await.unwrap(), OrchestrationStatus::Succeeded);
    server.await.unwrap();

    let preview_path = session.current().unwrap().handle().to_path_buf();
    assert_eq!(std::fs::read(&preview_path).unwrap(), b"%PDF-merged");

    session.clear();
    assert!(session.current().is_none());
    assert!(!preview_path.exists(), "preview file should be released on clear");
}
