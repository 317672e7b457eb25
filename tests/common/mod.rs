#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tubegrab::config::Config;

/// What a [`ConversionServer`] saw while serving one queued conversion.
#[derive(Debug, Default)]
pub struct ServerLog {
    pub convert_body: Option<String>,
    pub push_path: Option<String>,
    pub client_closed: bool,
}

/// A conversion server answering `/api/json/convert` over plain HTTP and
/// `/sub/<job>` over WebSocket on the same port, like the real ones do.
pub struct ConversionServer {
    pub url: String,
    handle: JoinHandle<ServerLog>,
}

impl ConversionServer {
    pub async fn start(convert_reply: Value, push_messages: Vec<Value>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let mut log = ServerLog::default();
            loop {
                let (mut tcp, _) = listener.accept().await.unwrap();
                if is_upgrade(&tcp).await {
                    serve_push(tcp, &push_messages, &mut log).await;
                    return log;
                }
                log.convert_body = Some(serve_convert(&mut tcp, &convert_reply).await);
            }
        });

        Self { url, handle }
    }

    pub async fn finish(self) -> ServerLog {
        self.handle.await.unwrap()
    }
}

async fn is_upgrade(tcp: &TcpStream) -> bool {
    let mut head = [0u8; 4];
    loop {
        let n = tcp.peek(&mut head).await.unwrap();
        if n >= head.len() {
            return &head == b"GET ";
        }
        tokio::task::yield_now().await;
    }
}

async fn serve_convert(tcp: &mut TcpStream, reply: &Value) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = tcp.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client hung up mid-request");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
    let content_length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = tcp.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client hung up mid-body");
        buf.extend_from_slice(&chunk[..n]);
    }

    let body = reply.to_string();
    let response = format!(
        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    tcp.write_all(response.as_bytes()).await.unwrap();
    let _ = tcp.shutdown().await;

    String::from_utf8_lossy(&buf[header_end..header_end + content_length]).into_owned()
}

async fn serve_push(tcp: TcpStream, messages: &[Value], log: &mut ServerLog) {
    let mut path = None;
    let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        path = Some(req.uri().to_string());
        Ok(resp)
    };
    let mut ws = tokio_tungstenite::accept_hdr_async(tcp, callback)
        .await
        .unwrap();
    log.push_path = path;

    for msg in messages {
        ws.send(Message::text(msg.to_string())).await.unwrap();
    }

    while let Some(Ok(msg)) = ws.next().await {
        if msg.is_close() {
            log.client_closed = true;
            break;
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Config pointing both backends at local mock servers.
pub fn config_for(base_url: &str) -> Config {
    let mut config = Config::default();
    config.y2mate.base_url = base_url.to_string();
    config.yt5s.home_url = format!("{}/en32", base_url);
    config.http.timeout_secs = 5;
    config.push.timeout_secs = 5;
    config
}
