//! HTTP transport for the avatar service's session REST contract.
//!
//! Session create/close/message are plain authenticated POSTs. The create
//! response already carries the playback URL, so the stream-ready event is
//! synthesized from it; afterwards a background task polls the session
//! detail endpoint and reports a remote-initiated drop as a disconnect.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::auth::AccessToken;
use crate::error::SessionError;
use crate::session::transport::{
    AvatarTransport, EventStream, StartRequest, TransportEvent, TransportFactory,
};

/// Application-level code the service returns on success.
const SUCCESS_CODE: i64 = 1000;

/// How often the detail endpoint is polled for remote drops.
const POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Transport bound to one bootstrap attempt's bearer token.
pub struct HttpTransport {
    http: reqwest::Client,
    base: String,
    token: AccessToken,
    session_id: RwLock<Option<String>>,
}

impl HttpTransport {
    pub fn new(http: reqwest::Client, api_base: &str, token: AccessToken) -> Self {
        Self {
            http,
            base: format!("{}/liveAvatar/session", api_base.trim_end_matches('/')),
            token,
            session_id: RwLock::new(None),
        }
    }

    fn endpoint(&self, op: &str) -> String {
        format!("{}/{op}", self.base)
    }

    /// POST to a session endpoint; errors come back as a reason string for
    /// the caller to wrap in its own failure kind.
    async fn post(&self, op: &str, body: &Value) -> Result<Value, String> {
        let resp = self
            .http
            .post(self.endpoint(op))
            .bearer_auth(self.token.as_str())
            .json(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("{op} returned {status}: {body}"));
        }

        resp.json()
            .await
            .map_err(|e| format!("unreadable {op} response: {e}"))
    }
}

#[async_trait]
impl AvatarTransport for HttpTransport {
    async fn open(&self, req: &StartRequest) -> Result<EventStream, SessionError> {
        let resp = self
            .http
            .post(self.endpoint("create"))
            .bearer_auth(self.token.as_str())
            .json(&req.to_body())
            .send()
            .await
            .map_err(|e| SessionError::StartFailed {
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(SessionError::StartFailed {
                reason: format!("create returned {status}: {body}"),
            });
        }

        let data: Value = resp.json().await.map_err(|e| SessionError::StartFailed {
            reason: format!("unreadable create response: {e}"),
        })?;
        let (session_id, stream_url) = parse_create_response(&data)?;

        tracing::info!(%session_id, "Streaming session created");
        *self.session_id.write().await = Some(session_id.clone());

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        // The create response already names the playback URL.
        let _ = tx.send(TransportEvent::StreamReady { url: stream_url });

        // Watch for remote-initiated drops. The task ends when the receiver
        // side is dropped or the session closes.
        let http = self.http.clone();
        let detail_url = self.endpoint("detail");
        let token = self.token.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(POLL_INTERVAL).await;

                let resp = http
                    .post(&detail_url)
                    .bearer_auth(token.as_str())
                    .json(&serde_json::json!({ "session_id": session_id }))
                    .send()
                    .await;

                let body: Option<Value> = match resp {
                    Ok(r) if r.status().is_success() => r.json().await.ok(),
                    Ok(r) => {
                        tracing::warn!(status = %r.status(), "Session detail poll rejected");
                        None
                    }
                    Err(e) => {
                        tracing::warn!("Session detail poll error: {e}");
                        None
                    }
                };

                let Some(body) = body else { continue };
                match session_status(&body).as_deref() {
                    Some("closed") | Some("stopped") => {
                        let _ = tx.send(TransportEvent::Disconnected);
                        return;
                    }
                    Some(_) | None => {}
                }

                if tx.is_closed() {
                    return;
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|ev| (ev, rx))
        });
        Ok(Box::pin(stream))
    }

    async fn stop(&self) -> Result<(), SessionError> {
        let Some(session_id) = self.session_id.write().await.take() else {
            return Ok(());
        };

        let body = self
            .post("close", &serde_json::json!({ "session_id": session_id }))
            .await
            .map_err(|reason| SessionError::StopFailed { reason })?;

        let code = body.get("code").and_then(Value::as_i64).unwrap_or(-1);
        if code != SUCCESS_CODE {
            return Err(SessionError::StopFailed {
                reason: format!("close rejected with code {code}"),
            });
        }

        tracing::info!(%session_id, "Streaming session closed");
        Ok(())
    }

    async fn send_message(&self, text: &str) -> Result<(), SessionError> {
        let session_id = self
            .session_id
            .read()
            .await
            .clone()
            .ok_or(SessionError::NotStreaming)?;

        let body = self
            .post(
                "message",
                &serde_json::json!({ "session_id": session_id, "message": text }),
            )
            .await
            .map_err(|reason| SessionError::SendFailed { reason })?;

        let code = body.get("code").and_then(Value::as_i64).unwrap_or(-1);
        if code != SUCCESS_CODE {
            return Err(SessionError::SendFailed {
                reason: format!("message rejected with code {code}"),
            });
        }
        Ok(())
    }
}

/// Factory handed to the bootstrap so each attempt gets a transport bound
/// to that attempt's token.
pub struct HttpTransportFactory {
    http: reqwest::Client,
    api_base: String,
}

impl HttpTransportFactory {
    pub fn new(http: reqwest::Client, api_base: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into(),
        }
    }
}

impl TransportFactory for HttpTransportFactory {
    fn for_token(&self, token: AccessToken) -> Arc<dyn AvatarTransport> {
        Arc::new(HttpTransport::new(self.http.clone(), &self.api_base, token))
    }
}

/// Extract session id and playback URL from a create response.
fn parse_create_response(body: &Value) -> Result<(String, String), SessionError> {
    let code = body.get("code").and_then(Value::as_i64).unwrap_or(-1);
    if code != SUCCESS_CODE {
        let message = body
            .get("msg")
            .and_then(Value::as_str)
            .unwrap_or("no message");
        return Err(SessionError::StartFailed {
            reason: format!("create rejected (code {code}): {message}"),
        });
    }

    let data = body.get("data").unwrap_or(&Value::Null);
    let session_id = data
        .get("_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| SessionError::StartFailed {
            reason: format!("no session id in create response: {body}"),
        })?;

    // Like the token, the URL has moved between field names across API
    // revisions.
    let stream_url = data
        .get("stream_url")
        .and_then(Value::as_str)
        .or_else(|| data.get("url").and_then(Value::as_str))
        .filter(|u| !u.is_empty())
        .ok_or_else(|| SessionError::StartFailed {
            reason: format!("no stream url in create response: {body}"),
        })?;

    Ok((session_id.to_string(), stream_url.to_string()))
}

/// Session status string from a detail response, if present.
fn session_status(body: &Value) -> Option<String> {
    body.get("data")
        .and_then(|d| d.get("status"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
