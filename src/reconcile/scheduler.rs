//! Background scheduler that periodically reconciles undelivered jobs.
//!
//! Runs as a `tokio::spawn`ed task. Each tick is one full polling pass; a
//! failed pass is logged and the next tick starts fresh. There is no overlap
//! guard between ticks — the delivery flag's conditional update in storage
//! is what prevents duplicate sends if a pass ever outlives the interval.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::core::config;
use crate::reconcile::{reconciler, ServiceDeps};

/// Start the reconciliation scheduler background task.
pub fn start_scheduler(deps: Arc<ServiceDeps>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(config::reconcile::check_interval());

        log::info!(
            "Reconcile scheduler started (interval: {}s)",
            *config::reconcile::CHECK_INTERVAL_SECS
        );

        loop {
            ticker.tick().await;

            match reconciler::run_polling_pass(&deps).await {
                Ok(outcomes) => {
                    if !outcomes.is_empty() {
                        log::debug!("Scheduler pass processed {} job(s)", outcomes.len());
                    }
                }
                Err(e) => {
                    log::error!("Scheduled reconcile pass failed: {}", e);
                }
            }
        }
    })
}
