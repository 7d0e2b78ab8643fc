//! Push pipeline: per-entity profiles and the orchestrator that drives them.

mod orchestrator;
mod profile;

pub use orchestrator::{EntityPushReport, PushOrchestrator, PushOutcome, PushSummary};
pub use profile::{EntityProfile, FlushPolicy, PagePreparation, SyncProfiles, PAGE_SIZE};
