//! Session controller — owns the state machine, playback URL, and chat log,
//! and drives them from transport events.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::session::chat::ChatMessage;
use crate::session::state::SessionState;
use crate::session::transport::{AvatarTransport, EventStream, StartRequest, TransportEvent};

struct Inner {
    state: SessionState,
    stream_url: Option<String>,
    last_error: Option<String>,
    messages: Vec<ChatMessage>,
    transport: Option<Arc<dyn AvatarTransport>>,
    event_task: Option<JoinHandle<()>>,
}

/// Controls one streaming session at a time.
pub struct SessionController {
    inner: Arc<RwLock<Inner>>,
}

impl SessionController {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Arc::new(RwLock::new(Inner {
                state: SessionState::Idle,
                stream_url: None,
                last_error: None,
                messages: Vec::new(),
                transport: None,
                event_task: None,
            })),
        })
    }

    /// Open a streaming session over `transport`.
    ///
    /// A start while a session is `Connecting` or `Streaming` is an
    /// idempotent no-op, not an error. A failed transport open moves the
    /// machine to `Failed` and surfaces the reason; there is no automatic
    /// retry.
    pub async fn start(
        &self,
        transport: Arc<dyn AvatarTransport>,
        req: StartRequest,
    ) -> Result<(), SessionError> {
        {
            let mut inner = self.inner.write().await;
            if inner.state.is_active() {
                debug!(state = %inner.state, "Start ignored; session already in flight");
                return Ok(());
            }
            // Claimed before the first await so a concurrent start sees an
            // active session and backs off.
            inner.state = SessionState::Connecting;
            inner.last_error = None;
        }

        info!(avatar_id = %req.avatar_id, "Opening streaming session");

        match transport.open(&req).await {
            Ok(stream) => {
                let mut inner = self.inner.write().await;
                inner.transport = Some(transport);
                inner.event_task = Some(tokio::spawn(drive_events(self.inner.clone(), stream)));
                Ok(())
            }
            Err(e) => {
                let mut inner = self.inner.write().await;
                inner.state = SessionState::Failed(e.to_string());
                warn!("Session start failed: {e}");
                Err(e)
            }
        }
    }

    /// Tear the session down.
    ///
    /// Shutdown errors from the transport are logged and swallowed; the
    /// machine always lands in `Idle` with the playback URL and chat
    /// history cleared.
    pub async fn stop(&self) {
        let (transport, task) = {
            let mut inner = self.inner.write().await;
            (inner.transport.take(), inner.event_task.take())
        };

        if let Some(task) = task {
            task.abort();
        }

        if let Some(transport) = transport {
            if let Err(e) = transport.stop().await {
                warn!("Session stop reported an error (ignored): {e}");
            }
        }

        let mut inner = self.inner.write().await;
        inner.state = SessionState::Idle;
        inner.stream_url = None;
        inner.last_error = None;
        inner.messages.clear();
        info!("Session stopped");
    }

    /// Forward a user chat line to the avatar.
    ///
    /// Valid only while `Streaming`. The line is appended to the local chat
    /// log optimistically; a forwarding failure is logged, not surfaced,
    /// and the append is not rolled back.
    pub async fn send_message(&self, text: &str) -> Result<(), SessionError> {
        let transport = {
            let mut inner = self.inner.write().await;
            if inner.state != SessionState::Streaming {
                return Err(SessionError::NotStreaming);
            }
            inner.messages.push(ChatMessage::user(text));
            inner.transport.clone()
        };

        if let Some(transport) = transport {
            if let Err(e) = transport.send_message(text).await {
                warn!("Message forward failed: {e}");
            }
        }
        Ok(())
    }

    pub async fn state(&self) -> SessionState {
        self.inner.read().await.state.clone()
    }

    pub async fn stream_url(&self) -> Option<String> {
        self.inner.read().await.stream_url.clone()
    }

    pub async fn last_error(&self) -> Option<String> {
        self.inner.read().await.last_error.clone()
    }

    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.inner.read().await.messages.clone()
    }
}

/// Apply transport events to the shared session state until the stream ends.
async fn drive_events(inner: Arc<RwLock<Inner>>, mut stream: EventStream) {
    while let Some(event) = stream.next().await {
        let mut inner = inner.write().await;
        match event {
            TransportEvent::StreamReady { url } => {
                info!(%url, "Stream ready");
                inner.stream_url = Some(url);
                inner.state = SessionState::Streaming;
            }
            TransportEvent::Disconnected => {
                info!("Session disconnected by remote");
                inner.state = SessionState::Disconnected;
                inner.stream_url = None;
            }
            TransportEvent::Error { message } => {
                // The service may keep recovering internally; record the
                // reason without ending the session.
                warn!("Transport error: {message}");
                inner.last_error = Some(message);
            }
        }
    }
}
