//! Push orchestrator: resolves outstanding requests, claims pending
//! mutations, and transmits them page by page.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use tokio::time::MissedTickBehavior;

use crate::media::{MediaUploadResolver, MediaUploader};
use crate::models::{EntityType, MutationLogEntry, RecordId};
use crate::remote::{is_accepted_by_server, PushRequest, SyncApi};
use crate::services::SyncStore;
use crate::{Error, Result};

use super::profile::{EntityProfile, PagePreparation, SyncProfiles, PAGE_SIZE};

/// What happened to one sync request during a push cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// No request was created: nothing was unclaimed, or the outstanding
    /// request is still held back
    NothingToPush,
    /// The server already had the request; it was finalized without resending
    AlreadyAccepted {
        request_id: RecordId,
        operations: usize,
    },
    /// Every page was accepted and the request is `success`
    Pushed {
        request_id: RecordId,
        pages: usize,
        operations: usize,
    },
    /// A partial page was held back by the flush policy; the request stays `pending`
    HeldBack {
        request_id: RecordId,
        pages: usize,
        operations: usize,
        held: usize,
    },
}

impl PushOutcome {
    /// Whether the cycle left nothing behind for this request.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        !matches!(self, Self::HeldBack { .. })
    }
}

/// Result of one `push_entity` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushSummary {
    pub entity: EntityType,
    /// Outstanding request found at the start of the cycle, if any
    pub resumed: Option<PushOutcome>,
    /// Request created for mutations pending after the resume step
    pub fresh: PushOutcome,
}

impl PushSummary {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.fresh.is_complete()
            && self
                .resumed
                .as_ref()
                .map_or(true, PushOutcome::is_complete)
    }
}

/// Per-entity result of a `prepare_for_update` pass.
#[derive(Debug)]
pub struct EntityPushReport {
    pub entity: EntityType,
    pub result: Result<PushSummary>,
}

impl EntityPushReport {
    /// Pushed means the cycle succeeded and nothing was held back.
    #[must_use]
    pub fn is_pushed(&self) -> bool {
        self.result.as_ref().is_ok_and(PushSummary::is_complete)
    }
}

/// Drives push cycles for entity types against a `SyncApi`.
pub struct PushOrchestrator<A, U> {
    store: SyncStore,
    api: A,
    resolver: MediaUploadResolver<U>,
    profiles: SyncProfiles,
    page_size: usize,
    in_flight: InFlight,
}

impl<A: SyncApi, U: MediaUploader> PushOrchestrator<A, U> {
    pub fn new(store: SyncStore, api: A, uploader: U, profiles: SyncProfiles) -> Self {
        Self {
            store,
            api,
            resolver: MediaUploadResolver::new(uploader),
            profiles,
            page_size: PAGE_SIZE,
            in_flight: InFlight::default(),
        }
    }

    /// Override the number of operations per page.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub const fn store(&self) -> &SyncStore {
        &self.store
    }

    pub const fn api(&self) -> &A {
        &self.api
    }

    pub const fn profiles(&self) -> &SyncProfiles {
        &self.profiles
    }

    /// Run one push cycle for `entity`.
    ///
    /// The latest outstanding request is resolved first. Unless it is still
    /// held back, unclaimed mutations are then claimed by a new request and
    /// transmitted. On error the
    /// requests are left as they are so the next cycle resumes them.
    pub async fn push_entity(&self, entity: EntityType) -> Result<PushSummary> {
        let result = self.push_entity_inner(entity).await;
        match &result {
            Ok(summary) => tracing::info!(%entity, ?summary, "Push cycle finished"),
            Err(error) => tracing::error!(%entity, %error, "Push cycle failed"),
        }
        result
    }

    async fn push_entity_inner(&self, entity: EntityType) -> Result<PushSummary> {
        let profile = self.profiles.get(entity)?;
        let _guard = self.in_flight.acquire(entity)?;

        let resumed = self.resolve_outstanding(entity, profile).await?;
        let fresh = match &resumed {
            Some(PushOutcome::HeldBack { .. }) => PushOutcome::NothingToPush,
            _ => self.push_new(entity, profile).await?,
        };

        Ok(PushSummary {
            entity,
            resumed,
            fresh,
        })
    }

    /// Push every entity in `entities` concurrently and report each result.
    pub async fn prepare_for_update(&self, entities: &[EntityType]) -> Vec<EntityPushReport> {
        join_all(entities.iter().map(|&entity| async move {
            EntityPushReport {
                entity,
                result: self.push_entity(entity).await,
            }
        }))
        .await
    }

    /// Push every configured entity each `interval` until `shutdown` resolves.
    ///
    /// A cycle that has started runs to completion before shutdown is observed.
    pub async fn run_periodic(
        &self,
        interval: Duration,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        if interval.is_zero() {
            return Err(Error::InvalidInput(
                "Push interval must be greater than zero".to_string(),
            ));
        }

        let entities: Vec<EntityType> = self.profiles.entities().collect();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(interval_secs = interval.as_secs_f64(), "Periodic push started");
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => {
                    let reports = self.prepare_for_update(&entities).await;
                    let failed = reports.iter().filter(|report| report.result.is_err()).count();
                    tracing::debug!(entities = reports.len(), failed, "Periodic push cycle done");
                }
            }
        }
        tracing::info!("Periodic push stopped");
        Ok(())
    }

    async fn resolve_outstanding(
        &self,
        entity: EntityType,
        profile: &EntityProfile,
    ) -> Result<Option<PushOutcome>> {
        let Some(request) = self.store.find_latest_outstanding(entity).await? else {
            return Ok(None);
        };

        if is_accepted_by_server(&self.api, &request.id).await {
            let operations = self.store.mark_success(&request.id).await?;
            tracing::info!(
                %entity,
                request_id = %request.id,
                operations,
                "Server already accepted outstanding request"
            );
            return Ok(Some(PushOutcome::AlreadyAccepted {
                request_id: request.id,
                operations,
            }));
        }

        tracing::info!(
            %entity,
            request_id = %request.id,
            status = %request.status,
            "Resuming outstanding request"
        );
        self.store.reopen_request(&request.id).await?;
        if profile.flush.absorbs_new_entries() {
            let claimed = self.store.claim_pending(entity, &request.id).await?;
            tracing::debug!(
                %entity,
                request_id = %request.id,
                claimed,
                "Outstanding request claimed pending mutations"
            );
        }
        self.transmit(entity, profile, request.id).await.map(Some)
    }

    async fn push_new(&self, entity: EntityType, profile: &EntityProfile) -> Result<PushOutcome> {
        if self.store.unclaimed_count(entity).await? == 0 {
            return Ok(PushOutcome::NothingToPush);
        }

        let request = self.store.create_request(entity).await?;
        let claimed = self.store.claim_pending(entity, &request.id).await?;
        tracing::debug!(%entity, request_id = %request.id, claimed, "Claimed pending mutations");

        self.transmit(entity, profile, request.id).await
    }

    /// Page through the entries claimed by `request_id` and send them.
    ///
    /// Entries stay `pending` until the final `mark_success`, so pages are
    /// addressed by offset.
    async fn transmit(
        &self,
        entity: EntityType,
        profile: &EntityProfile,
        request_id: RecordId,
    ) -> Result<PushOutcome> {
        let mut pages = 0;
        let mut operations = 0;

        loop {
            let page = self
                .store
                .claimed_page(entity, request_id, operations, self.page_size)
                .await?;
            if page.is_empty() {
                break;
            }

            let len = page.len();
            if !profile.flush.should_flush(len, self.page_size) {
                tracing::info!(
                    %entity,
                    %request_id,
                    held = len,
                    "Holding back partial page"
                );
                return Ok(PushOutcome::HeldBack {
                    request_id,
                    pages,
                    operations,
                    held: len,
                });
            }

            let page = self.prepare_page(entity, profile, page).await?;
            self.send_page(entity, profile, request_id, page).await?;
            pages += 1;
            operations += len;
            tracing::debug!(%entity, %request_id, page = pages, len, "Page accepted");

            if len < self.page_size {
                break;
            }
        }

        self.store.mark_success(&request_id).await?;
        Ok(PushOutcome::Pushed {
            request_id,
            pages,
            operations,
        })
    }

    async fn prepare_page(
        &self,
        entity: EntityType,
        profile: &EntityProfile,
        page: Vec<MutationLogEntry>,
    ) -> Result<Vec<MutationLogEntry>> {
        match profile.preparation {
            PagePreparation::PassThrough => Ok(page),
            PagePreparation::ResolveProductMedia => self.resolver.resolve_page(entity, page).await,
        }
    }

    async fn send_page(
        &self,
        entity: EntityType,
        profile: &EntityProfile,
        request_id: RecordId,
        operations: Vec<MutationLogEntry>,
    ) -> Result<()> {
        let request = PushRequest {
            request_id,
            operations,
        };
        let response = self.api.push(&profile.endpoint, &request).await?;
        if response.is_accepted() {
            return Ok(());
        }

        self.store.mark_failed(&request_id).await?;
        Err(Error::Rejected {
            entity: entity.to_string(),
            request_id: request_id.to_string(),
            message: response
                .message
                .unwrap_or_else(|| "no message".to_string()),
        })
    }
}

/// Entity types with a push cycle currently running in this process.
#[derive(Debug, Default)]
struct InFlight(Mutex<HashSet<EntityType>>);

impl InFlight {
    fn acquire(&self, entity: EntityType) -> Result<InFlightGuard<'_>> {
        let mut running = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if !running.insert(entity) {
            return Err(Error::SyncInProgress(entity.to_string()));
        }
        Ok(InFlightGuard {
            in_flight: self,
            entity,
        })
    }
}

struct InFlightGuard<'a> {
    in_flight: &'a InFlight,
    entity: EntityType,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.entity);
    }
}
