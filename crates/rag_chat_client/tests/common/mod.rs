//! Minimal in-process HTTP/1.1 server for integration tests. Answers every
//! request with one canned reply and records what it received. No mocks.
//!
//! Only what the client sends is understood: request bodies must carry a
//! `Content-Length` (chunked requests are read as empty), and every
//! connection is closed after one reply. Statuses missing from [`reason`]
//! go out with the reason phrase `Status`; reqwest ignores the phrase.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: String,
    /// Wait this long after reading the request before answering.
    pub delay: Duration,
    /// Wait this long between the response head and the body.
    pub body_delay: Duration,
}

impl Reply {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
            body_delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn body_delayed(mut self, delay: Duration) -> Self {
        self.body_delay = delay;
        self
    }
}

pub type RequestLog = Arc<Mutex<Vec<Recorded>>>;

pub struct TestServer {
    pub base_url: String,
    pub requests: RequestLog,
}

impl TestServer {
    pub fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

/// Pick a free port by binding to :0 and extracting the assigned port.
/// Nothing listens there afterwards.
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Base URL where nothing is listening.
pub fn dead_base_url() -> String {
    format!("http://127.0.0.1:{}", free_port())
}

/// Spawn the server on the current Tokio runtime.
pub async fn spawn_http_server(reply: Reply) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests: RequestLog = Arc::new(Mutex::new(Vec::new()));
    tokio::spawn(accept_loop(listener, reply, requests.clone()));
    TestServer {
        base_url: format!("http://{}", addr),
        requests,
    }
}

/// Spawn the server on its own thread and runtime, for tests that run the
/// binary as a subprocess.
pub fn spawn_http_server_thread(reply: Reply) -> TestServer {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    std_listener.set_nonblocking(true).unwrap();
    let addr = std_listener.local_addr().unwrap();
    let requests: RequestLog = Arc::new(Mutex::new(Vec::new()));
    let log = requests.clone();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let listener = TcpListener::from_std(std_listener).unwrap();
            accept_loop(listener, reply, log).await;
        });
    });
    TestServer {
        base_url: format!("http://{}", addr),
        requests,
    }
}

async fn accept_loop(listener: TcpListener, reply: Reply, requests: RequestLog) {
    while let Ok((stream, _)) = listener.accept().await {
        tokio::spawn(serve(stream, reply.clone(), requests.clone()));
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

async fn serve(mut stream: TcpStream, reply: Reply, requests: RequestLog) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = find_header_end(&buf) {
            break end;
        }
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let wanted = header_end + content_length(&head);
    while buf.len() < wanted {
        let n = match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);
    }

    let mut request_line = head.split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();
    let body = String::from_utf8_lossy(&buf[header_end..wanted]).to_string();
    requests.lock().unwrap().push(Recorded { method, path, body });

    tokio::time::sleep(reply.delay).await;

    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        reply.status,
        reason(reply.status),
        reply.body.len(),
    );
    if stream.write_all(head.as_bytes()).await.is_err() || stream.flush().await.is_err() {
        return;
    }
    tokio::time::sleep(reply.body_delay).await;
    let _ = stream.write_all(reply.body.as_bytes()).await;
    let _ = stream.shutdown().await;
}

/// Poll `cond` every 10 ms until it holds or `limit` elapses.
pub async fn eventually(limit: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
