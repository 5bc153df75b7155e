//! Knowledge-base id resolution.
//!
//! Resolution order is durable cache, then roster, then remote creation —
//! first match wins, so a remote create only happens when neither local
//! source knows an id. A freshly created id is written back to both local
//! sources, which makes repeated resolution idempotent.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use crate::auth::AccessToken;
use crate::cache::{KNOWLEDGE_ID_KEY, KnowledgeCache};
use crate::error::KnowledgeError;
use crate::knowledge::remote::{KnowledgeCreator, KnowledgeProfile};
use crate::roster::{AvatarPatch, Roster};

/// Resolves the knowledge-base id to attach to an upcoming session.
pub struct KnowledgeResolver {
    cache: Arc<dyn KnowledgeCache>,
    roster: Arc<RwLock<Roster>>,
    creator: Arc<dyn KnowledgeCreator>,
    profile: KnowledgeProfile,
    /// One-shot latch: remote creation is attempted at most once per
    /// resolver instance, which also keeps concurrent resolutions from
    /// racing into duplicate creations.
    creation_attempted: AtomicBool,
}

impl KnowledgeResolver {
    pub fn new(
        cache: Arc<dyn KnowledgeCache>,
        roster: Arc<RwLock<Roster>>,
        creator: Arc<dyn KnowledgeCreator>,
        profile: KnowledgeProfile,
    ) -> Self {
        Self {
            cache,
            roster,
            creator,
            profile,
            creation_attempted: AtomicBool::new(false),
        }
    }

    /// Resolve the knowledge id for `avatar_id`.
    ///
    /// `Ok(None)` means no id is available and the session should run as a
    /// plain conversation. `Err` is only returned when remote creation was
    /// actually attempted and failed; the caller chooses whether that is
    /// fatal (strict mode) or a downgrade.
    pub async fn resolve(
        &self,
        token: &AccessToken,
        avatar_id: &str,
    ) -> Result<Option<String>, KnowledgeError> {
        // 1. Durable cache.
        match self.cache.get(KNOWLEDGE_ID_KEY).await {
            Ok(Some(id)) => {
                tracing::debug!(knowledge_id = %id, "Resolved knowledge id from cache");
                return Ok(Some(id));
            }
            Ok(None) => {}
            Err(e) => {
                // A broken cache downgrades to a miss; it must not block
                // the bootstrap.
                tracing::warn!("Knowledge cache read failed: {e}");
            }
        }

        // 2. Roster.
        if let Some(id) = self.roster.read().await.knowledge_for(avatar_id) {
            tracing::debug!(knowledge_id = %id, %avatar_id, "Resolved knowledge id from roster");
            return Ok(Some(id));
        }

        // 3. Remote creation, at most once per resolver lifetime. The latch
        // is set before the first await of the creation path.
        if self.creation_attempted.swap(true, Ordering::SeqCst) {
            tracing::warn!(
                %avatar_id,
                "Knowledge creation already attempted; continuing without a knowledge base"
            );
            return Ok(None);
        }

        let id = self.creator.create(token, &self.profile).await?;

        if let Err(e) = self.cache.put(KNOWLEDGE_ID_KEY, &id).await {
            tracing::warn!("Failed to persist knowledge id: {e}");
        }
        self.roster
            .write()
            .await
            .upsert(avatar_id, AvatarPatch::knowledge(&id));

        Ok(Some(id))
    }
}
