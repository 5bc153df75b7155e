//! Integration tests for the session bootstrap flow.
//!
//! Each test wires the real bootstrap/resolver/controller against in-memory
//! collaborators (token source, knowledge creator, transport) and exercises
//! the whole credential → knowledge → session sequence.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use secrecy::SecretString;
use tokio::sync::{Mutex, RwLock};

use avatar_assist::auth::{AccessToken, TokenSource};
use avatar_assist::bootstrap::Bootstrapper;
use avatar_assist::cache::{KNOWLEDGE_ID_KEY, KnowledgeCache, MemoryCache};
use avatar_assist::config::ClientConfig;
use avatar_assist::error::{AuthError, Error, KnowledgeError, SessionError};
use avatar_assist::knowledge::{KnowledgeCreator, KnowledgeProfile, KnowledgeResolver};
use avatar_assist::roster::{AvatarPatch, Roster};
use avatar_assist::session::{
    AvatarQuality, AvatarTransport, EventStream, SessionController, SessionState, StartRequest,
    TransportEvent, TransportFactory, VoiceEmotion,
};

/// Token source that hands out a fixed token, or refuses.
struct StaticTokens {
    fail: bool,
    exchanges: AtomicUsize,
}

impl StaticTokens {
    fn ok() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            exchanges: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            exchanges: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TokenSource for StaticTokens {
    async fn exchange(&self) -> Result<AccessToken, AuthError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(AuthError::TokenMissing { body: "{}".into() })
        } else {
            Ok(AccessToken::new("test-token"))
        }
    }
}

/// Knowledge creator returning a fixed id, or refusing.
struct FakeCreator {
    fail: bool,
    creates: AtomicUsize,
}

impl FakeCreator {
    fn ok() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            creates: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            creates: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl KnowledgeCreator for FakeCreator {
    async fn create(
        &self,
        _token: &AccessToken,
        _profile: &KnowledgeProfile,
    ) -> Result<String, KnowledgeError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(KnowledgeError::Rejected {
                code: 1101,
                message: "rejected".into(),
            })
        } else {
            Ok("KBnew".to_string())
        }
    }
}

/// Transport that immediately reports the stream as ready and records every
/// start request it sees.
struct RecordingTransport {
    opens: AtomicUsize,
    requests: Mutex<Vec<StartRequest>>,
}

#[async_trait]
impl AvatarTransport for RecordingTransport {
    async fn open(&self, req: &StartRequest) -> Result<EventStream, SessionError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(req.clone());
        Ok(Box::pin(stream::iter(vec![TransportEvent::StreamReady {
            url: "https://cdn.example.com/live.m3u8".into(),
        }])))
    }

    async fn stop(&self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn send_message(&self, _text: &str) -> Result<(), SessionError> {
        Ok(())
    }
}

struct RecordingFactory {
    transport: Arc<RecordingTransport>,
}

impl RecordingFactory {
    fn new() -> Self {
        Self {
            transport: Arc::new(RecordingTransport {
                opens: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }),
        }
    }
}

impl TransportFactory for RecordingFactory {
    fn for_token(&self, _token: AccessToken) -> Arc<dyn AvatarTransport> {
        self.transport.clone()
    }
}

fn test_config(strict: bool) -> ClientConfig {
    ClientConfig {
        client_id: "client-id".into(),
        client_secret: SecretString::from("client-secret"),
        auth_url: "http://127.0.0.1:1/getToken".into(),
        api_base: "http://127.0.0.1:1/api".into(),
        avatar_id: "A1".into(),
        voice_id: "V1".into(),
        quality: AvatarQuality::High,
        emotion: VoiceEmotion::Happy,
        strict_knowledge: strict,
        request_timeout: Duration::from_secs(5),
        data_dir: PathBuf::from("."),
    }
}

struct Harness {
    bootstrapper: Bootstrapper,
    cache: Arc<MemoryCache>,
    tokens: Arc<StaticTokens>,
    creator: Arc<FakeCreator>,
    transport: Arc<RecordingTransport>,
}

fn harness(
    strict: bool,
    cache: Arc<MemoryCache>,
    roster: Roster,
    tokens: Arc<StaticTokens>,
    creator: Arc<FakeCreator>,
) -> Harness {
    let resolver = Arc::new(KnowledgeResolver::new(
        cache.clone(),
        Arc::new(RwLock::new(roster)),
        creator.clone(),
        KnowledgeProfile::default(),
    ));
    let factory = RecordingFactory::new();
    let transport = factory.transport.clone();
    let bootstrapper = Bootstrapper::new(
        test_config(strict),
        tokens.clone(),
        resolver,
        Arc::new(factory),
        SessionController::new(),
    );
    Harness {
        bootstrapper,
        cache,
        tokens,
        creator,
        transport,
    }
}

async fn wait_for_state(controller: &SessionController, target: SessionState) {
    for _ in 0..100 {
        if controller.state().await == target {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "state never reached {target}, still {}",
        controller.state().await
    );
}

#[tokio::test]
async fn bootstrap_creates_and_attaches_knowledge_base() {
    let h = harness(
        false,
        Arc::new(MemoryCache::new()),
        Roster::new(),
        StaticTokens::ok(),
        FakeCreator::ok(),
    );

    h.bootstrapper.run().await.unwrap();
    let controller = h.bootstrapper.controller();
    wait_for_state(&controller, SessionState::Streaming).await;

    assert_eq!(h.creator.creates.load(Ordering::SeqCst), 1);
    let requests = h.transport.requests.lock().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].knowledge_id.as_deref(), Some("KBnew"));

    // The fresh id is durably cached for the next run.
    assert_eq!(
        h.cache.get(KNOWLEDGE_ID_KEY).await.unwrap().as_deref(),
        Some("KBnew")
    );
}

#[tokio::test]
async fn bootstrap_reuses_cached_id_without_creating() {
    let cache = Arc::new(MemoryCache::new());
    cache.put(KNOWLEDGE_ID_KEY, "KBcached").await.unwrap();

    let h = harness(
        false,
        cache,
        Roster::new(),
        StaticTokens::ok(),
        FakeCreator::ok(),
    );

    h.bootstrapper.run().await.unwrap();

    assert_eq!(h.creator.creates.load(Ordering::SeqCst), 0);
    let requests = h.transport.requests.lock().await;
    assert_eq!(requests[0].knowledge_id.as_deref(), Some("KBcached"));
}

#[tokio::test]
async fn bootstrap_uses_roster_id_when_cache_is_empty() {
    let mut roster = Roster::new();
    roster.upsert("A1", AvatarPatch::knowledge("KBroster"));

    let h = harness(
        false,
        Arc::new(MemoryCache::new()),
        roster,
        StaticTokens::ok(),
        FakeCreator::ok(),
    );

    h.bootstrapper.run().await.unwrap();

    assert_eq!(h.creator.creates.load(Ordering::SeqCst), 0);
    let requests = h.transport.requests.lock().await;
    assert_eq!(requests[0].knowledge_id.as_deref(), Some("KBroster"));
}

#[tokio::test]
async fn lenient_mode_degrades_to_plain_conversation() {
    let h = harness(
        false,
        Arc::new(MemoryCache::new()),
        Roster::new(),
        StaticTokens::ok(),
        FakeCreator::failing(),
    );

    h.bootstrapper.run().await.unwrap();
    let controller = h.bootstrapper.controller();
    wait_for_state(&controller, SessionState::Streaming).await;

    let requests = h.transport.requests.lock().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].knowledge_id, None);
}

#[tokio::test]
async fn strict_mode_aborts_on_knowledge_failure() {
    let h = harness(
        true,
        Arc::new(MemoryCache::new()),
        Roster::new(),
        StaticTokens::ok(),
        FakeCreator::failing(),
    );

    let err = h.bootstrapper.run().await.unwrap_err();
    assert!(matches!(err, Error::Knowledge(_)));
    assert_eq!(h.transport.opens.load(Ordering::SeqCst), 0);
    assert_eq!(
        h.bootstrapper.controller().state().await,
        SessionState::Idle
    );
}

#[tokio::test]
async fn auth_failure_aborts_before_any_other_stage() {
    let h = harness(
        false,
        Arc::new(MemoryCache::new()),
        Roster::new(),
        StaticTokens::failing(),
        FakeCreator::ok(),
    );

    let err = h.bootstrapper.run().await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
    assert_eq!(h.creator.creates.load(Ordering::SeqCst), 0);
    assert_eq!(h.transport.opens.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn rerun_while_streaming_is_a_no_op() {
    let h = harness(
        false,
        Arc::new(MemoryCache::new()),
        Roster::new(),
        StaticTokens::ok(),
        FakeCreator::ok(),
    );

    h.bootstrapper.run().await.unwrap();
    let controller = h.bootstrapper.controller();
    wait_for_state(&controller, SessionState::Streaming).await;

    h.bootstrapper.run().await.unwrap();

    assert_eq!(h.tokens.exchanges.load(Ordering::SeqCst), 1);
    assert_eq!(h.transport.opens.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stop_then_restart_reuses_cached_knowledge_id() {
    let h = harness(
        false,
        Arc::new(MemoryCache::new()),
        Roster::new(),
        StaticTokens::ok(),
        FakeCreator::ok(),
    );
    let controller = h.bootstrapper.controller();

    h.bootstrapper.run().await.unwrap();
    wait_for_state(&controller, SessionState::Streaming).await;

    controller.stop().await;
    assert_eq!(controller.state().await, SessionState::Idle);

    h.bootstrapper.run().await.unwrap();
    wait_for_state(&controller, SessionState::Streaming).await;

    // Two sessions, one knowledge creation: the second run resolved the id
    // from the cache.
    assert_eq!(h.transport.opens.load(Ordering::SeqCst), 2);
    assert_eq!(h.creator.creates.load(Ordering::SeqCst), 1);
    let requests = h.transport.requests.lock().await;
    assert_eq!(requests[1].knowledge_id.as_deref(), Some("KBnew"));
}

#[tokio::test]
async fn chat_history_lives_and_dies_with_the_session() {
    let h = harness(
        false,
        Arc::new(MemoryCache::new()),
        Roster::new(),
        StaticTokens::ok(),
        FakeCreator::ok(),
    );
    let controller = h.bootstrapper.controller();

    h.bootstrapper.run().await.unwrap();
    wait_for_state(&controller, SessionState::Streaming).await;

    controller.send_message("hello there").await.unwrap();
    controller.send_message("what can you do?").await.unwrap();
    assert_eq!(controller.messages().await.len(), 2);

    controller.stop().await;
    assert!(controller.messages().await.is_empty());
}
