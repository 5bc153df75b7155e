//! End-to-end session bootstrap.
//!
//! Three strictly sequential stages per attempt: exchange the fixed client
//! credentials for a bearer token, resolve a knowledge-base id, then open
//! the streaming session. A knowledge failure degrades to a plain
//! conversation unless strict mode is on; auth and start failures abort the
//! attempt and leave the controller in a re-triggerable state.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::auth::TokenSource;
use crate::config::ClientConfig;
use crate::error::Error;
use crate::knowledge::KnowledgeResolver;
use crate::session::{SessionController, StartRequest, TransportFactory};

/// Wires the bootstrap stages together.
pub struct Bootstrapper {
    config: ClientConfig,
    tokens: Arc<dyn TokenSource>,
    resolver: Arc<KnowledgeResolver>,
    transports: Arc<dyn TransportFactory>,
    controller: Arc<SessionController>,
}

impl Bootstrapper {
    pub fn new(
        config: ClientConfig,
        tokens: Arc<dyn TokenSource>,
        resolver: Arc<KnowledgeResolver>,
        transports: Arc<dyn TransportFactory>,
        controller: Arc<SessionController>,
    ) -> Self {
        Self {
            config,
            tokens,
            resolver,
            transports,
            controller,
        }
    }

    pub fn controller(&self) -> Arc<SessionController> {
        self.controller.clone()
    }

    /// Run one bootstrap attempt. A no-op while a session is already in
    /// flight.
    pub async fn run(&self) -> Result<(), Error> {
        if self.controller.state().await.is_active() {
            debug!("Bootstrap ignored; session already in flight");
            return Ok(());
        }

        // 1. Credential exchange.
        let token = self.tokens.exchange().await?;
        info!("Credential exchange complete");

        // 2. Knowledge resolution.
        let knowledge_id = match self
            .resolver
            .resolve(&token, &self.config.avatar_id)
            .await
        {
            Ok(id) => id,
            Err(e) if !self.config.strict_knowledge => {
                warn!("Knowledge resolution failed, continuing without it: {e}");
                None
            }
            Err(e) => return Err(e.into()),
        };
        match &knowledge_id {
            Some(id) => info!(knowledge_id = %id, "Knowledge base attached"),
            None => info!("No knowledge base; plain conversation mode"),
        }

        // 3. Session establishment.
        let request = StartRequest {
            avatar_id: self.config.avatar_id.clone(),
            voice_id: self.config.voice_id.clone(),
            quality: self.config.quality,
            emotion: self.config.emotion,
            knowledge_id,
        };
        let transport = self.transports.for_token(token);
        self.controller.start(transport, request).await?;
        Ok(())
    }
}
