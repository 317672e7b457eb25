//! Push channel used by yt5s conversion servers for queued jobs.
//!
//! A queued job is watched over a WebSocket at `<ws|wss>://<host>/sub/<job>`.
//! The server pushes JSON messages with an `action` field until it reports
//! `success` (carrying the `url`) or `error`. Anything else is progress noise.

use super::headers::{USER_AGENT, YT5S_CLIENT, YT5S_ORIGIN};
use super::types::DownloadLink;
use crate::error::{Error, Result};
use futures_util::StreamExt;
use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::{timeout_at, Instant};
use tokio_tungstenite::tungstenite::{client::IntoClientRequest, http::HeaderValue, Message};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

/// Derives the subscription URL for `job_id` from the conversion server URL.
pub fn subscription_url(server: &str, job_id: &str) -> Result<String> {
    let parsed = url::Url::parse(server)
        .map_err(|e| Error::validation(format!("invalid conversion server {server}: {e}")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| Error::validation(format!("conversion server {server} has no host")))?;

    let scheme = if parsed.scheme().to_ascii_lowercase().contains("https") {
        "wss"
    } else {
        "ws"
    };
    let authority = match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    Ok(format!("{scheme}://{authority}/sub/{job_id}?fname={YT5S_CLIENT}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Resolving,
    Done,
    Failed,
}

/// Single-shot state machine for one queued job.
///
/// Leaves `Resolving` at most once; messages observed afterwards are ignored.
#[derive(Debug)]
pub struct JobWatch {
    job_id: String,
    phase: JobPhase,
}

impl JobWatch {
    pub fn new(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            phase: JobPhase::Resolving,
        }
    }

    pub fn phase(&self) -> JobPhase {
        self.phase
    }

    /// Feeds one text frame. Returns the terminal outcome the first time one arrives.
    pub fn observe(&mut self, text: &str) -> Option<Result<DownloadLink>> {
        if self.phase != JobPhase::Resolving {
            return None;
        }

        let outcome = match serde_json::from_str::<Value>(text) {
            Ok(msg) if msg.is_object() => {
                match msg.get("action").and_then(|a| a.as_str()) {
                    Some("success") => match msg.get("url").and_then(|u| u.as_str()) {
                        Some(url) => Ok(DownloadLink::new(url)),
                        None => Err(Error::validation(format!(
                            "job {} succeeded without a url",
                            self.job_id
                        ))),
                    },
                    Some("error") => Err(Error::Backend(msg)),
                    other => {
                        debug!("job {}: ignoring action {:?}", self.job_id, other);
                        return None;
                    }
                }
            }
            Ok(_) => Err(Error::validation(format!(
                "job {} sent a non-object message",
                self.job_id
            ))),
            Err(e) => Err(Error::validation(format!(
                "job {} sent malformed JSON: {e}",
                self.job_id
            ))),
        };

        self.phase = if outcome.is_ok() {
            JobPhase::Done
        } else {
            JobPhase::Failed
        };
        Some(outcome)
    }
}

/// Subscribes to `job_id` on `server` and waits for its terminal message.
///
/// `timeout` bounds the handshake and the wait together. Once connected, the
/// channel is closed before returning, whatever the outcome.
pub async fn await_job(server: &str, job_id: &str, timeout: Duration) -> Result<DownloadLink> {
    let ws_url = subscription_url(server, job_id)?;
    let mut request = ws_url.as_str().into_client_request()?;
    let headers = request.headers_mut();
    headers.insert("Origin", HeaderValue::from_static(YT5S_ORIGIN));
    headers.insert("User-Agent", HeaderValue::from_static(USER_AGENT));

    info!("Waiting for job {} on {}", job_id, ws_url);
    let deadline = Instant::now() + timeout;
    let timed_out = || {
        warn!("Job {} timed out after {:?}", job_id, timeout);
        Error::Timeout {
            job_id: job_id.to_string(),
            secs: timeout.as_secs(),
        }
    };

    let connect = tokio_tungstenite::connect_async(request);
    let (mut stream, _) = match timeout_at(deadline, connect).await {
        Ok(connected) => connected?,
        Err(_) => return Err(timed_out()),
    };

    let mut watch = JobWatch::new(job_id);
    let outcome = timeout_at(deadline, wait_terminal(&mut stream, &mut watch))
        .await
        .unwrap_or_else(|_| Err(timed_out()));

    if let Err(e) = stream.close(None).await {
        debug!("Closing push channel for job {}: {}", job_id, e);
    }

    outcome
}

async fn wait_terminal<S>(
    stream: &mut WebSocketStream<S>,
    watch: &mut JobWatch,
) -> Result<DownloadLink>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(message) = stream.next().await {
        match message? {
            Message::Text(text) => {
                if let Some(outcome) = watch.observe(text.as_str()) {
                    return outcome;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    Err(Error::ChannelClosed {
        job_id: watch.job_id.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::SinkExt;
    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

    type HandshakeResult = std::result::Result<Response, ErrorResponse>;

    struct Served {
        path: Option<String>,
        saw_close: bool,
    }

    /// Accepts one subscription, pushes `messages`, then reads until the client closes.
    async fn push_server(messages: Vec<String>, close_after: bool) -> (String, JoinHandle<Served>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut path = None;
            let callback = |req: &Request, resp: Response| -> HandshakeResult {
                path = Some(req.uri().to_string());
                Ok(resp)
            };
            let mut ws = tokio_tungstenite::accept_hdr_async(tcp, callback)
                .await
                .unwrap();

            for msg in messages {
                ws.send(Message::text(msg)).await.unwrap();
            }
            if close_after {
                let _ = ws.close(None).await;
            }

            let mut saw_close = false;
            while let Some(Ok(msg)) = ws.next().await {
                if msg.is_close() {
                    saw_close = true;
                    break;
                }
            }
            Served { path, saw_close }
        });

        (format!("http://{addr}"), handle)
    }

    #[test]
    fn test_subscription_url() {
        assert_eq!(
            subscription_url("https://conv1.example.com", "J1").unwrap(),
            "wss://conv1.example.com/sub/J1?fname=yt5s.com"
        );
        assert_eq!(
            subscription_url("http://127.0.0.1:8080/api", "J2").unwrap(),
            "ws://127.0.0.1:8080/sub/J2?fname=yt5s.com"
        );
        assert_eq!(
            subscription_url("HTTPS://Conv.Example.com:443", "J3").unwrap(),
            "wss://conv.example.com/sub/J3?fname=yt5s.com"
        );
        assert!(matches!(
            subscription_url("not a url", "J4"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_watch_success_settles_once() {
        let mut watch = JobWatch::new("J1");
        assert!(watch.observe(r#"{"action":"progress","value":40}"#).is_none());
        assert_eq!(watch.phase(), JobPhase::Resolving);

        let outcome = watch
            .observe(r#"{"action":"success","url":"https://x/file.mp4"}"#)
            .unwrap();
        assert_eq!(outcome.unwrap().as_str(), "https://x/file.mp4");
        assert_eq!(watch.phase(), JobPhase::Done);

        assert!(watch.observe(r#"{"action":"error","reason":"late"}"#).is_none());
        assert_eq!(watch.phase(), JobPhase::Done);
    }

    #[test]
    fn test_watch_error_keeps_payload() {
        let mut watch = JobWatch::new("J1");
        let outcome = watch
            .observe(r#"{"action":"error","reason":"expired"}"#)
            .unwrap();
        match outcome {
            Err(Error::Backend(payload)) => {
                assert_eq!(payload, json!({"action": "error", "reason": "expired"}))
            }
            other => panic!("expected backend error, got {other:?}"),
        }
        assert_eq!(watch.phase(), JobPhase::Failed);
        assert!(watch
            .observe(r#"{"action":"success","url":"https://x/file.mp4"}"#)
            .is_none());
    }

    #[test]
    fn test_watch_malformed_message_fails() {
        let mut watch = JobWatch::new("J1");
        assert!(matches!(
            watch.observe("not json"),
            Some(Err(Error::Validation(_)))
        ));
        assert_eq!(watch.phase(), JobPhase::Failed);

        let mut watch = JobWatch::new("J2");
        assert!(matches!(watch.observe("[1,2]"), Some(Err(Error::Validation(_)))));
    }

    #[test]
    fn test_watch_success_without_url_fails() {
        let mut watch = JobWatch::new("J1");
        assert!(matches!(
            watch.observe(r#"{"action":"success"}"#),
            Some(Err(Error::Validation(_)))
        ));
        assert_eq!(watch.phase(), JobPhase::Failed);
    }

    #[tokio::test]
    async fn test_await_job_times_out_on_stalled_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (_tcp, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let result = tokio::time::timeout(
            Duration::from_secs(3),
            await_job(&server, "J7", Duration::from_millis(200)),
        )
        .await
        .expect("await_job should honour its own timeout");
        assert!(matches!(result, Err(Error::Timeout { ref job_id, .. }) if job_id == "J7"));
        handle.abort();
    }

    #[tokio::test]
    async fn test_await_job_success_closes_channel() {
        let (server, handle) = push_server(
            vec![
                json!({"action": "progress", "value": 50}).to_string(),
                json!({"action": "success", "url": "https://x/file.mp4"}).to_string(),
            ],
            false,
        )
        .await;

        let link = await_job(&server, "J1", Duration::from_secs(5)).await.unwrap();
        assert_eq!(link.as_str(), "https://x/file.mp4");

        let served = handle.await.unwrap();
        assert_eq!(served.path.as_deref(), Some("/sub/J1?fname=yt5s.com"));
        assert!(served.saw_close);
    }

    #[tokio::test]
    async fn test_await_job_error_closes_channel() {
        let (server, handle) = push_server(
            vec![json!({"action": "error", "reason": "expired"}).to_string()],
            false,
        )
        .await;

        let err = await_job(&server, "J1", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(
            err.backend_payload(),
            Some(&json!({"action": "error", "reason": "expired"}))
        );
        assert!(handle.await.unwrap().saw_close);
    }

    #[tokio::test]
    async fn test_await_job_timeout_closes_channel() {
        let (server, handle) = push_server(
            vec![json!({"action": "progress", "value": 1}).to_string()],
            false,
        )
        .await;

        let err = await_job(&server, "J9", Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { ref job_id, .. } if job_id == "J9"));
        assert!(handle.await.unwrap().saw_close);
    }

    #[tokio::test]
    async fn test_await_job_server_closes_first() {
        let (server, handle) = push_server(vec![], true).await;

        let err = await_job(&server, "J1", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ChannelClosed { .. } | Error::Channel(_)
        ));
        let _ = handle.await;
    }
}
