//! Status reconciler.
//!
//! Re-fetches authoritative status from the provider for undelivered jobs,
//! updates the persisted record, and hands terminal outcomes to the
//! messaging channel. Order of side effects is "send, then mark delivered":
//! a crash between the two repeats the send on the next pass, never loses it.

use crate::core::config;
use crate::core::error::AppResult;
use crate::provider::types::VideoStatus;
use crate::storage::db::{self, StatusUpdate, VideoGeneration};
use crate::storage::get_connection;
use crate::telegram::captions;

use serde::Serialize;

use super::ServiceDeps;

/// What a reconciliation pass did with one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Finished video pushed to the recipient, delivery flag set
    Sent,
    /// Terminal outcome could not be pushed through the channel; retried
    /// next pass
    SendFailed,
    /// Failure notice pushed, delivery flag set
    FailureNotified,
    /// Non-terminal status persisted, nothing to deliver yet
    InProgress,
    /// Job already delivered, untouched
    Skipped,
    /// Provider fetch failed; no fields were overwritten
    Error,
}

/// Per-job outcome entry of a pass.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub video_id: String,
    pub disposition: Disposition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Credits consumed by a render of the given duration.
///
/// One credit per started minute, minimum one; missing duration defaults to
/// one. Test-mode renders are free regardless of duration.
pub fn credit_cost(duration_secs: Option<f64>, test_mode: bool) -> i64 {
    if test_mode {
        return 0;
    }
    match duration_secs {
        Some(d) => ((d / config::credits::SECONDS_PER_CREDIT).ceil() as i64).max(1),
        None => 1,
    }
}

/// Reconcile all eligible jobs: completed, undelivered, result URL present.
pub async fn run_pass(deps: &ServiceDeps) -> AppResult<Vec<JobOutcome>> {
    let jobs = {
        let conn = get_connection(&deps.db)?;
        db::list_unsent_completed(&conn)?
    };
    Ok(process_batch(deps, &jobs).await)
}

/// Polling variant for the background scheduler: also advances jobs the
/// provider still reports as pending/processing.
pub async fn run_polling_pass(deps: &ServiceDeps) -> AppResult<Vec<JobOutcome>> {
    let jobs = {
        let conn = get_connection(&deps.db)?;
        db::list_undelivered_active(&conn)?
    };
    Ok(process_batch(deps, &jobs).await)
}

/// On-demand check of a single job by provider id.
///
/// Returns `None` when no such job is tracked locally.
pub async fn reconcile_single(
    deps: &ServiceDeps,
    video_id: &str,
) -> AppResult<Option<JobOutcome>> {
    let job = {
        let conn = get_connection(&deps.db)?;
        db::get_video_generation(&conn, video_id)?
    };
    let Some(job) = job else {
        return Ok(None);
    };
    Ok(Some(process_one(deps, &job).await))
}

/// Process a batch, isolating failures: one job's provider error never
/// aborts the rest of the pass.
async fn process_batch(deps: &ServiceDeps, jobs: &[VideoGeneration]) -> Vec<JobOutcome> {
    let mut outcomes = Vec::with_capacity(jobs.len());
    for job in jobs {
        outcomes.push(process_one(deps, job).await);
    }
    if !outcomes.is_empty() {
        log::info!(
            "Reconcile pass: {} job(s), {} sent, {} failure notice(s), {} error(s)",
            outcomes.len(),
            outcomes.iter().filter(|o| o.disposition == Disposition::Sent).count(),
            outcomes
                .iter()
                .filter(|o| o.disposition == Disposition::FailureNotified)
                .count(),
            outcomes.iter().filter(|o| o.disposition == Disposition::Error).count(),
        );
    }
    outcomes
}

async fn process_one(deps: &ServiceDeps, job: &VideoGeneration) -> JobOutcome {
    match reconcile_job(deps, job).await {
        Ok(disposition) => JobOutcome {
            video_id: job.video_id.clone(),
            disposition,
            error: None,
        },
        Err(e) => {
            log::warn!("Reconcile failed for video {}: {}", job.video_id, e);
            JobOutcome {
                video_id: job.video_id.clone(),
                disposition: Disposition::Error,
                error: Some(e.to_string()),
            }
        }
    }
}

async fn reconcile_job(deps: &ServiceDeps, job: &VideoGeneration) -> AppResult<Disposition> {
    // Delivered jobs are terminal; re-invocation must be a no-op.
    if job.sent_to_telegram {
        return Ok(Disposition::Skipped);
    }

    let status = deps.provider.get_job_status(&job.video_id).await?;
    let credits = credit_cost(status.duration, job.test_mode);

    // Status is monotonic: an unrecognized provider status, or a non-terminal
    // one reported after the job already reached a terminal state, leaves the
    // persisted status unchanged.
    let regressed = job.status.is_terminal() && !status.status.is_terminal();
    if regressed {
        log::warn!(
            "Provider reports {} for video {} already recorded as {}, ignoring",
            status.status,
            job.video_id,
            job.status
        );
    }

    let update = StatusUpdate {
        status: (status.status != VideoStatus::Unknown && !regressed).then_some(status.status),
        video_url: status.video_url.clone(),
        thumbnail_url: status.thumbnail_url.clone(),
        credits_used: (status.status == VideoStatus::Completed).then_some(credits),
        error_message: status.error.clone(),
    };

    {
        let conn = get_connection(&deps.db)?;
        db::update_video_generation(&conn, &job.video_id, &update)?;
        // Credits accrue once: a retried send must not re-charge the user
        if status.status == VideoStatus::Completed && credits > 0 && job.credits_used == 0 {
            db::update_credit_tracking(&conn, job.telegram_id, credits)?;
        }
    }

    match (status.status, status.video_url.as_deref()) {
        (VideoStatus::Completed, Some(url)) => {
            let caption = captions::ready_caption(job, credits);
            if deps.channel.send_asset(job.telegram_id, url, &caption).await {
                let conn = get_connection(&deps.db)?;
                db::mark_delivered(&conn, &job.video_id)?;
                Ok(Disposition::Sent)
            } else {
                Ok(Disposition::SendFailed)
            }
        }
        (VideoStatus::Failed, _) => {
            let text = captions::failure_text(status.error.as_deref());
            if deps.channel.send_text(job.telegram_id, &text).await {
                // Delivered notices are not repeated
                let conn = get_connection(&deps.db)?;
                db::mark_delivered(&conn, &job.video_id)?;
                Ok(Disposition::FailureNotified)
            } else {
                log::warn!(
                    "Failure notice for video {} could not be delivered to chat {}, will retry",
                    job.video_id,
                    job.telegram_id
                );
                Ok(Disposition::SendFailed)
            }
        }
        _ => Ok(Disposition::InProgress),
    }
}
