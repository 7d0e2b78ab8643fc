//! Per-entity push behaviour: endpoint, page preparation, flush policy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ProfileOverrides;
use crate::models::EntityType;
use crate::remote::Endpoint;
use crate::{Error, Result};

/// Maximum number of operations sent in one page.
pub const PAGE_SIZE: usize = 100;

/// How a fetched page is transformed before transmission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PagePreparation {
    /// Send entries as recorded
    #[default]
    PassThrough,
    /// Upload on-device product images and substitute their URLs
    ResolveProductMedia,
}

/// Whether a fetched page is transmitted or held back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlushPolicy {
    /// Transmit every non-empty page
    #[default]
    Always,
    /// Transmit only pages that reached the full page size.
    ///
    /// A trailing partial page is never sent and its request stays `pending`.
    /// When resumed, that request claims entries recorded since, until its
    /// pages fill.
    FullPagesOnly,
}

impl FlushPolicy {
    /// Whether a resumed request takes over entries recorded after it was created.
    #[must_use]
    pub const fn absorbs_new_entries(self) -> bool {
        matches!(self, Self::FullPagesOnly)
    }

    #[must_use]
    pub const fn should_flush(self, page_len: usize, page_size: usize) -> bool {
        match self {
            Self::Always => page_len > 0,
            Self::FullPagesOnly => page_len > 0 && page_len >= page_size,
        }
    }
}

/// Push settings for one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityProfile {
    pub endpoint: Endpoint,
    pub preparation: PagePreparation,
    pub flush: FlushPolicy,
}

impl EntityProfile {
    /// Built-in profile for an entity type.
    #[must_use]
    pub fn for_entity(entity: EntityType) -> Self {
        let preparation = match entity {
            EntityType::Products => PagePreparation::ResolveProductMedia,
            _ => PagePreparation::PassThrough,
        };
        let flush = match entity {
            EntityType::AdsReport => FlushPolicy::FullPagesOnly,
            _ => FlushPolicy::Always,
        };

        Self {
            endpoint: Endpoint::default_for(entity),
            preparation,
            flush,
        }
    }
}

/// Entity type to profile table handed to the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncProfiles {
    profiles: BTreeMap<EntityType, EntityProfile>,
}

impl SyncProfiles {
    /// A table with no entity configured.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Built-in profiles for every entity type.
    #[must_use]
    pub fn defaults() -> Self {
        let profiles = EntityType::ALL
            .into_iter()
            .map(|entity| (entity, EntityProfile::for_entity(entity)))
            .collect();
        Self { profiles }
    }

    #[must_use]
    pub fn with_profile(mut self, entity: EntityType, profile: EntityProfile) -> Self {
        self.profiles.insert(entity, profile);
        self
    }

    /// Profile for `entity`, or `UnknownEndpoint` when none is configured.
    pub fn get(&self, entity: EntityType) -> Result<&EntityProfile> {
        self.profiles
            .get(&entity)
            .ok_or_else(|| Error::UnknownEndpoint(entity.to_string()))
    }

    /// Configured entity types in push order.
    pub fn entities(&self) -> impl Iterator<Item = EntityType> + '_ {
        self.profiles.keys().copied()
    }

    /// Merge file-provided overrides into the table.
    pub fn apply_overrides(&mut self, overrides: &ProfileOverrides) {
        for (entity, entry) in &overrides.entities {
            let profile = self
                .profiles
                .entry(*entity)
                .or_insert_with(|| EntityProfile::for_entity(*entity));
            if let Some(path) = &entry.path {
                profile.endpoint.path.clone_from(path);
            }
            if let Some(method) = &entry.method {
                profile.endpoint.method = method.trim().to_ascii_uppercase();
            }
            if let Some(flush) = entry.flush {
                profile.flush = flush;
            }
            tracing::debug!(%entity, ?profile, "Applied profile override");
        }
    }
}
