//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// How the mock backend treats each connection.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Answer every request and keep the connection open.
    KeepAlive,
    /// Answer with `Connection: close` and hang up.
    Close,
    /// Answer normally, then hang up without saying so.
    DropAfterResponse,
    /// Hold each response for the given time, then keep the connection open.
    Delay(Duration),
    /// Read the request and hang up without answering.
    HangUp,
}

/// Counters shared with a running mock backend.
#[derive(Debug, Default)]
pub struct Counters {
    pub accepted: AtomicUsize,
    pub requests: AtomicUsize,
    pub open: AtomicUsize,
    pub max_open: AtomicUsize,
}

pub struct MockBackend {
    pub addr: SocketAddr,
    pub counters: Arc<Counters>,
}

impl MockBackend {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn accepted(&self) -> usize {
        self.counters.accepted.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> usize {
        self.counters.requests.load(Ordering::SeqCst)
    }

    pub fn max_open(&self) -> usize {
        self.counters.max_open.load(Ordering::SeqCst)
    }
}

/// Start an HTTP/1.1 backend on an ephemeral port answering `body`.
pub async fn start_mock_backend(behavior: Behavior, body: &'static str) -> MockBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let counters = Arc::new(Counters::default());

    let shared = Arc::clone(&counters);
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    shared.accepted.fetch_add(1, Ordering::SeqCst);
                    let open = shared.open.fetch_add(1, Ordering::SeqCst) + 1;
                    shared.max_open.fetch_max(open, Ordering::SeqCst);

                    let counters = Arc::clone(&shared);
                    tokio::spawn(async move {
                        serve(socket, behavior, body, &counters).await;
                        counters.open.fetch_sub(1, Ordering::SeqCst);
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockBackend { addr, counters }
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

async fn serve(mut socket: TcpStream, behavior: Behavior, body: &'static str, counters: &Counters) {
    let mut buf = Vec::new();
    while read_request(&mut socket, &mut buf).await {
        counters.requests.fetch_add(1, Ordering::SeqCst);

        let connection = match behavior {
            Behavior::HangUp => return,
            Behavior::Close => "Connection: close\r\n",
            Behavior::Delay(delay) => {
                tokio::time::sleep(delay).await;
                "Keep-Alive: timeout=30\r\n"
            }
            Behavior::KeepAlive | Behavior::DropAfterResponse => "Keep-Alive: timeout=30\r\n",
        };
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{}\r\n{}",
            body.len(),
            connection,
            body
        );
        if socket.write_all(response.as_bytes()).await.is_err() {
            return;
        }
        if matches!(behavior, Behavior::Close | Behavior::DropAfterResponse) {
            let _ = socket.shutdown().await;
            return;
        }
    }
}

/// Read one request head (and its body, if any) into `buf`. Returns `false`
/// once the peer closes.
async fn read_request(socket: &mut TcpStream, buf: &mut Vec<u8>) -> bool {
    let mut chunk = [0u8; 4096];
    loop {
        if let Some(end) = find_head_end(buf) {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let body_len = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + body_len {
                buf.drain(..end + body_len);
                return true;
            }
        }
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return false,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|pos| pos + 4)
}
