//! Integration tests for the camera-facing HTTP endpoint

use lot_hub::io::camera::{CameraListener, FAIL_BODY, SUCCESS_BODY};
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;

async fn start_listener(read_timeout: Duration) -> (SocketAddr, watch::Sender<bool>) {
    let listener = CameraListener::bind("127.0.0.1", 0).await.unwrap().with_read_timeout(read_timeout);
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(listener.run(shutdown_rx));
    (addr, shutdown_tx)
}

/// Read one HTTP/1.1 response with a Content-Length body
async fn read_response(stream: &mut TcpStream) -> (String, String, String) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8(buf[..end].to_vec()).unwrap();
            let content_length = head
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse::<usize>().unwrap())
                })
                .unwrap_or(0);
            let body_start = end + 4;
            while buf.len() < body_start + content_length {
                let n = stream.read(&mut chunk).await.unwrap();
                assert!(n > 0, "connection closed mid-body");
                buf.extend_from_slice(&chunk[..n]);
            }
            let body = String::from_utf8(buf[body_start..body_start + content_length].to_vec()).unwrap();
            let mut lines = head.lines();
            let status_line = lines.next().unwrap().to_string();
            let headers = lines.collect::<Vec<_>>().join("\n").to_ascii_lowercase();
            return (status_line, headers, body);
        }
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before response");
        buf.extend_from_slice(&chunk[..n]);
    }
}

#[tokio::test]
async fn test_post_returns_success() {
    let (addr, _shutdown) = start_listener(Duration::from_secs(30)).await;
    let client = reqwest::Client::new();

    for body in ["", "{}", r#"{"plate":"ABC123","lot":"A12"}"#, "not json at all"] {
        let response = client
            .post(format!("http://{addr}/notify"))
            .body(body.to_string())
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["content-type"], "application/json");
        assert_eq!(response.text().await.unwrap(), SUCCESS_BODY);
    }
}

#[tokio::test]
async fn test_other_methods_return_fail() {
    let (addr, _shutdown) = start_listener(Duration::from_secs(30)).await;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/notify");

    for request in [client.get(&url), client.put(&url), client.delete(&url), client.patch(&url)] {
        let response = request.send().await.unwrap();
        assert_eq!(response.status(), 400);
        assert_eq!(response.headers()["content-type"], "application/json");
        assert_eq!(response.text().await.unwrap(), FAIL_BODY);
    }
}

#[tokio::test]
async fn test_keep_alive_serves_several_requests() {
    let listener = CameraListener::bind("127.0.0.1", 0).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let stats = listener.stats();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(listener.run(shutdown_rx));

    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"POST /a HTTP/1.1\r\nHost: hub\r\nContent-Length: 2\r\n\r\n{}")
        .await
        .unwrap();
    let (status, _, body) = read_response(&mut stream).await;
    assert!(status.starts_with("HTTP/1.1 200"), "{status}");
    assert_eq!(body, SUCCESS_BODY);

    stream.write_all(b"GET /b HTTP/1.1\r\nHost: hub\r\n\r\n").await.unwrap();
    let (status, _, body) = read_response(&mut stream).await;
    assert!(status.starts_with("HTTP/1.1 400"), "{status}");
    assert_eq!(body, FAIL_BODY);

    assert_eq!(stats.sessions.load(Ordering::Relaxed), 1);
    assert_eq!(stats.requests.load(Ordering::Relaxed), 2);
    assert_eq!(stats.rejected.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_connection_close_is_echoed_and_closes() {
    let (addr, _shutdown) = start_listener(Duration::from_secs(30)).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"POST / HTTP/1.1\r\nHost: hub\r\nConnection: close\r\nContent-Length: 0\r\n\r\n")
        .await
        .unwrap();
    let (status, headers, body) = read_response(&mut stream).await;
    assert!(status.starts_with("HTTP/1.1 200"), "{status}");
    assert!(headers.contains("connection: close"), "{headers}");
    assert_eq!(body, SUCCESS_BODY);

    // Server shuts down its send side after the response
    let mut rest = [0u8; 16];
    let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut rest)).await.unwrap().unwrap();
    assert_eq!(n, 0);
}

#[tokio::test]
async fn test_http10_keep_alive_is_echoed() {
    let (addr, _shutdown) = start_listener(Duration::from_secs(30)).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"POST / HTTP/1.0\r\nConnection: keep-alive\r\nContent-Length: 0\r\n\r\n")
        .await
        .unwrap();
    let (_, headers, body) = read_response(&mut stream).await;
    assert!(headers.contains("connection: keep-alive"), "{headers}");
    assert_eq!(body, SUCCESS_BODY);
}

#[tokio::test]
async fn test_stalled_request_times_out() {
    let (addr, _shutdown) = start_listener(Duration::from_millis(300)).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    // Headers never finish
    stream.write_all(b"POST / HTTP/1.1\r\nHost: hub\r\n").await.unwrap();

    let mut rest = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut rest)).await;
    assert!(read.is_ok(), "session was not dropped after the read timeout");
    let text = String::from_utf8_lossy(&rest);
    assert!(!text.contains(SUCCESS_BODY));
}

#[tokio::test]
async fn test_short_body_gets_no_response() {
    let listener = CameraListener::bind("127.0.0.1", 0)
        .await
        .unwrap()
        .with_read_timeout(Duration::from_millis(300));
    let addr = listener.local_addr().unwrap();
    let stats = listener.stats();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(listener.run(shutdown_rx));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    // Promises 100 bytes, sends 4
    stream
        .write_all(b"POST / HTTP/1.1\r\nHost: hub\r\nContent-Length: 100\r\n\r\n{\"a\"")
        .await
        .unwrap();

    let mut rest = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut rest)).await;
    assert!(read.is_ok(), "session was not dropped after the body timeout");
    let text = String::from_utf8_lossy(&rest);
    assert!(!text.contains(SUCCESS_BODY), "{text}");
    assert!(!text.starts_with("HTTP/1.1 200"), "{text}");
    assert_eq!(stats.requests.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn test_unparseable_request_gets_bare_400_and_close() {
    let (addr, _shutdown) = start_listener(Duration::from_secs(30)).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream.write_all(b"GARBAGE GARBAGE\x01\r\n\r\n").await.unwrap();

    let mut rest = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut rest))
        .await
        .unwrap()
        .unwrap();
    let text = String::from_utf8_lossy(&rest);
    assert!(text.starts_with("HTTP/1.1 400"), "{text}");
    assert!(!text.contains(SUCCESS_BODY), "{text}");
    assert!(!text.contains(FAIL_BODY), "{text}");
}

#[tokio::test]
async fn test_listener_stops_on_shutdown() {
    let listener = CameraListener::bind("127.0.0.1", 0).await.unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(listener.run(shutdown_rx));

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
}
