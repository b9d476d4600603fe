//! Types shared with the video-generation provider.
//!
//! The status vocabulary {pending, processing, completed, failed} is the one
//! fixed contract the reconciliation state machine depends on. Anything else
//! the provider sends maps to `Unknown`, which callers treat as "leave the
//! persisted status alone".

use serde::{Deserialize, Serialize};

/// Provider-reported job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    /// Any unrecognized status string. Never persisted — the reconciler
    /// keeps the last known status when it sees this.
    #[serde(other)]
    Unknown,
}

impl VideoStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VideoStatus::Pending => "pending",
            VideoStatus::Processing => "processing",
            VideoStatus::Completed => "completed",
            VideoStatus::Failed => "failed",
            VideoStatus::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => VideoStatus::Pending,
            "processing" => VideoStatus::Processing,
            "completed" => VideoStatus::Completed,
            "failed" => VideoStatus::Failed,
            _ => VideoStatus::Unknown,
        }
    }

    /// True once the provider will never change the status again.
    pub fn is_terminal(self) -> bool {
        matches!(self, VideoStatus::Completed | VideoStatus::Failed)
    }
}

impl std::fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Background specification for a rendered video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Background {
    /// "color", "image" or "video"
    #[serde(rename = "type")]
    pub kind: String,
    /// Color hex code or asset URL, depending on `kind`
    pub value: String,
}

/// Rendering parameters shared by text and audio submissions.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub avatar_id: String,
    pub avatar_style: String,
    pub aspect_ratio: String,
    pub background: Option<Background>,
    /// Free/watermarked render; affects credit accounting only.
    pub test_mode: bool,
}

/// Authoritative status payload returned by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoStatusData {
    pub video_id: String,
    pub status: VideoStatus,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    /// Rendered duration in seconds, present once rendering finished.
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Remaining account quota, already converted to credits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quota {
    pub remaining: i64,
    pub used: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for s in ["pending", "processing", "completed", "failed"] {
            assert_eq!(VideoStatus::parse(s).as_str(), s);
        }
    }

    #[test]
    fn test_unexpected_status_maps_to_unknown() {
        assert_eq!(VideoStatus::parse("rendering"), VideoStatus::Unknown);
        assert_eq!(VideoStatus::parse(""), VideoStatus::Unknown);

        let data: VideoStatusData = serde_json::from_str(
            r#"{"video_id": "v1", "status": "waiting_for_gpu"}"#,
        )
        .unwrap();
        assert_eq!(data.status, VideoStatus::Unknown);
    }

    #[test]
    fn test_status_data_deserializes_optional_fields() {
        let data: VideoStatusData = serde_json::from_str(
            r#"{"video_id": "v1", "status": "completed", "video_url": "https://x/v.mp4", "duration": 61.0}"#,
        )
        .unwrap();
        assert_eq!(data.status, VideoStatus::Completed);
        assert_eq!(data.video_url.as_deref(), Some("https://x/v.mp4"));
        assert_eq!(data.duration, Some(61.0));
        assert!(data.error.is_none());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(VideoStatus::Completed.is_terminal());
        assert!(VideoStatus::Failed.is_terminal());
        assert!(!VideoStatus::Pending.is_terminal());
        assert!(!VideoStatus::Processing.is_terminal());
        assert!(!VideoStatus::Unknown.is_terminal());
    }
}
