//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, Response, StatusCode},
    routing::any,
    Router,
};
use relay_proxy::config::ProxyConfig;
use relay_proxy::{HttpServer, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Proxy config pointing at `upstream`, allowing loopback clients.
pub fn base_config(upstream: SocketAddr) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.base_url = format!("http://{}", upstream);
    config.access.allowed_networks = vec!["127.0.0.0/8".into()];
    config.timeouts.connect_secs = 2;
    config.timeouts.request_secs = 5;
    config
}

/// Running proxy; dropping it stops the server.
pub struct TestProxy {
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn spawn_proxy(config: ProxyConfig) -> TestProxy {
    let server = HttpServer::new(config).expect("valid test config");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestProxy { addr, shutdown }
}

/// Client that talks to the proxy directly and never follows redirects.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Raw backend that counts accepted connections and answers a fixed response.
pub async fn start_counting_backend(response: &'static str) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = connections.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                read_request_head(&mut socket).await;
                let response_str = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    response.len(),
                    response
                );
                let _ = socket.write_all(response_str.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, connections)
}

/// Raw backend that writes `raw` verbatim after reading the request head.
pub async fn start_raw_backend(raw: &'static [u8]) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                read_request_head(&mut socket).await;
                let _ = socket.write_all(raw).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Backend that reads the request and never answers. `released` flips once
/// the proxy closes the connection.
pub async fn start_stalled_backend(released: Arc<AtomicBool>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let released = released.clone();
            tokio::spawn(async move {
                read_request_head(&mut socket).await;
                let mut buf = [0u8; 1024];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => {
                            released.store(true, Ordering::SeqCst);
                            break;
                        }
                        Ok(_) => continue,
                    }
                }
            });
        }
    });

    addr
}

/// Backend that answers with a chunked body and keeps sending a chunk
/// every 50ms until the write fails, then flips `released`.
pub async fn start_trickling_backend(released: Arc<AtomicBool>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let released = released.clone();
            tokio::spawn(async move {
                read_request_head(&mut socket).await;
                let head = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n";
                if socket.write_all(head).await.is_err() {
                    released.store(true, Ordering::SeqCst);
                    return;
                }
                loop {
                    if socket.write_all(b"5\r\nchunk\r\n").await.is_err() {
                        released.store(true, Ordering::SeqCst);
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            });
        }
    });

    addr
}

/// Poll `flag` for up to `within`.
pub async fn wait_for(flag: &AtomicBool, within: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while !flag.load(Ordering::SeqCst) {
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    true
}

async fn read_request_head(socket: &mut TcpStream) {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
}

pub const ECHO_PREFIX: &str = "x-echo-";

/// Axum backend that mirrors the request:
/// - every request header comes back as `x-echo-<name>` (repeated values kept)
/// - `x-echo-uri` carries the path and query it received
/// - the body is returned byte for byte
/// - `x-delay-ms` delays the answer, `x-status` picks the status code
/// - `/redirect` answers 302 with a Location header
pub async fn start_echo_backend() -> SocketAddr {
    let app = Router::new()
        .route("/redirect", any(redirect))
        .route("/{*path}", any(echo))
        .route("/", any(echo));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn redirect() -> Response<Body> {
    Response::builder()
        .status(StatusCode::FOUND)
        .header("location", "/web/index.html")
        .body(Body::empty())
        .unwrap()
}

async fn echo(request: Request<Body>) -> Response<Body> {
    let (parts, body) = request.into_parts();

    if let Some(ms) = parts
        .headers
        .get("x-delay-ms")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
    {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    let status = parts
        .headers
        .get("x-status")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u16>().ok())
        .and_then(|v| StatusCode::from_u16(v).ok())
        .unwrap_or(StatusCode::OK);

    let mut response = Response::builder().status(status);
    let headers = response.headers_mut().unwrap();
    for (name, value) in &parts.headers {
        let echoed = HeaderName::from_bytes(format!("{}{}", ECHO_PREFIX, name).as_bytes()).unwrap();
        headers.append(echoed, value.clone());
    }
    let uri = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    headers.insert("x-echo-uri", HeaderValue::from_str(uri).unwrap());
    headers.insert(
        "x-echo-method",
        HeaderValue::from_str(parts.method.as_str()).unwrap(),
    );

    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    response.body(Body::from(bytes)).unwrap()
}
