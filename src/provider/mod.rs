//! External video-generation provider integration.
//!
//! The `VideoProvider` trait is the seam between the reconciliation core and
//! the HTTP client: production wires in `HeyGenClient`, tests wire in fakes.

pub mod heygen;
pub mod types;

pub use heygen::HeyGenClient;
pub use types::{Background, JobSpec, Quota, VideoStatus, VideoStatusData};

use async_trait::async_trait;

use crate::core::error::AppResult;

/// Provider operations the dispatcher and reconciler depend on.
///
/// All methods are `&self` — implementations should be stateless or use
/// interior mutability.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Submit a text-driven generation job, returning the provider job id.
    async fn submit_text_job(
        &self,
        spec: &JobSpec,
        voice_id: &str,
        text: &str,
    ) -> AppResult<String>;

    /// Submit an audio-driven generation job, returning the provider job id.
    async fn submit_audio_job(&self, spec: &JobSpec, audio_url: &str) -> AppResult<String>;

    /// Fetch authoritative status for a previously submitted job.
    async fn get_job_status(&self, video_id: &str) -> AppResult<VideoStatusData>;

    /// Remaining account quota in credits. `None` when the provider does not
    /// expose quota for this account tier.
    async fn remaining_quota(&self) -> AppResult<Option<Quota>>;
}
