//! Video-generation reconciliation flow.
//!
//! Three collaborators around one persisted job record:
//! - `dispatcher` submits new jobs to the provider (or relays them through
//!   the messaging channel) and persists the record,
//! - `reconciler` re-fetches authoritative status and decides delivery,
//! - the `MessagingChannel` pushes results to the recipient.
//!
//! Each pass is stateless apart from the job record; the delivery flag in
//! storage is what makes repeated passes idempotent.

pub mod dispatcher;
pub mod reconciler;
pub mod scheduler;

pub use dispatcher::{dispatch_generation, relay_generation, GenerationRequest, InputType};
pub use reconciler::{
    credit_cost, reconcile_single, run_pass, run_polling_pass, Disposition, JobOutcome,
};

use std::sync::Arc;

use crate::provider::VideoProvider;
use crate::storage::db::DbPool;
use crate::telegram::MessagingChannel;

/// Explicitly constructed dependencies shared by the dispatcher and the
/// reconciler, so every component can be tested with fakes.
pub struct ServiceDeps {
    pub db: Arc<DbPool>,
    pub provider: Arc<dyn VideoProvider>,
    pub channel: Arc<dyn MessagingChannel>,
}
