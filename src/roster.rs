//! In-memory avatar roster.
//!
//! An ordered collection of the avatars known to the client, keyed by the
//! service-assigned avatar id. All mutation goes through [`Roster::upsert`]
//! so every call site gets the same last-write-wins merge semantics.

use serde::{Deserialize, Serialize};

/// Whether an avatar is a stock offering or a user-created one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvatarOrigin {
    Official,
    Custom,
}

impl Default for AvatarOrigin {
    fn default() -> Self {
        Self::Official
    }
}

/// A selectable avatar exposed by the streaming service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarDescriptor {
    /// Stable, externally assigned id.
    pub avatar_id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Preview/playback URL for the selector UI.
    #[serde(default)]
    pub preview_url: String,
    /// Whether the avatar is currently available for sessions.
    #[serde(default = "default_available")]
    pub available: bool,
    #[serde(default)]
    pub origin: AvatarOrigin,
    /// Knowledge base currently associated with this avatar, if any.
    #[serde(default)]
    pub knowledge_id: Option<String>,
}

fn default_available() -> bool {
    true
}

impl AvatarDescriptor {
    /// A bare descriptor for an id we have no metadata for yet.
    pub fn bare(avatar_id: impl Into<String>) -> Self {
        Self {
            avatar_id: avatar_id.into(),
            name: String::new(),
            preview_url: String::new(),
            available: true,
            origin: AvatarOrigin::default(),
            knowledge_id: None,
        }
    }
}

/// Field-wise patch applied by [`Roster::upsert`]. `None` leaves the
/// existing value untouched.
#[derive(Debug, Clone, Default)]
pub struct AvatarPatch {
    pub name: Option<String>,
    pub preview_url: Option<String>,
    pub available: Option<bool>,
    pub origin: Option<AvatarOrigin>,
    pub knowledge_id: Option<String>,
}

impl AvatarPatch {
    /// Patch that only attaches a knowledge id.
    pub fn knowledge(id: impl Into<String>) -> Self {
        Self {
            knowledge_id: Some(id.into()),
            ..Self::default()
        }
    }
}

/// Ordered avatar collection keyed by avatar id.
#[derive(Debug, Default)]
pub struct Roster {
    entries: Vec<AvatarDescriptor>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a roster from descriptors, collapsing duplicate ids
    /// (last write wins).
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = AvatarDescriptor>) -> Self {
        let mut roster = Self::new();
        for d in descriptors {
            let patch = AvatarPatch {
                name: Some(d.name),
                preview_url: Some(d.preview_url),
                available: Some(d.available),
                origin: Some(d.origin),
                knowledge_id: d.knowledge_id,
            };
            roster.upsert(&d.avatar_id, patch);
        }
        roster
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, avatar_id: &str) -> Option<&AvatarDescriptor> {
        self.entries.iter().find(|a| a.avatar_id == avatar_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AvatarDescriptor> {
        self.entries.iter()
    }

    /// Insert or update the entry for `avatar_id`, applying `patch` with
    /// last-write-wins semantics. Returns the resulting entry.
    pub fn upsert(&mut self, avatar_id: &str, patch: AvatarPatch) -> &AvatarDescriptor {
        let idx = match self.entries.iter().position(|a| a.avatar_id == avatar_id) {
            Some(idx) => idx,
            None => {
                self.entries.push(AvatarDescriptor::bare(avatar_id));
                self.entries.len() - 1
            }
        };

        let entry = &mut self.entries[idx];
        if let Some(name) = patch.name {
            entry.name = name;
        }
        if let Some(preview_url) = patch.preview_url {
            entry.preview_url = preview_url;
        }
        if let Some(available) = patch.available {
            entry.available = available;
        }
        if let Some(origin) = patch.origin {
            entry.origin = origin;
        }
        if let Some(knowledge_id) = patch.knowledge_id {
            entry.knowledge_id = Some(knowledge_id);
        }
        &self.entries[idx]
    }

    /// Knowledge id already attached to `avatar_id`, if any.
    pub fn knowledge_for(&self, avatar_id: &str) -> Option<String> {
        self.get(avatar_id).and_then(|a| a.knowledge_id.clone())
    }
}
