//! HeyGen API client.
//!
//! Thin reqwest wrapper over the endpoints the service needs:
//! - POST /v2/video/generate (text or audio input)
//! - GET  /v1/video_status.get?video_id=...
//! - GET  /v2/user/remaining_quota
//!
//! Every response carries an `{ error, data }` envelope; a non-null `error`
//! in a 2xx body is surfaced as `AppError::Provider`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::provider::types::{Background, JobSpec, Quota, VideoStatus, VideoStatusData};
use crate::provider::VideoProvider;

/// HTTP client for the HeyGen API.
pub struct HeyGenClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// Response envelope used by all HeyGen endpoints.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    error: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateData {
    video_id: String,
}

#[derive(Debug, Deserialize)]
struct QuotaData {
    remaining_quota: f64,
    used_quota: f64,
}

#[derive(Debug, Serialize)]
struct GeneratePayload {
    video_inputs: Vec<VideoInput>,
    aspect_ratio: String,
    test: bool,
}

#[derive(Debug, Serialize)]
struct VideoInput {
    character: Character,
    voice: VoiceInput,
    #[serde(skip_serializing_if = "Option::is_none")]
    background: Option<Background>,
}

#[derive(Debug, Serialize)]
struct Character {
    #[serde(rename = "type")]
    kind: &'static str,
    avatar_id: String,
    avatar_style: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum VoiceInput {
    Text { input_text: String, voice_id: String },
    Audio { audio_url: String },
}

impl HeyGenClient {
    /// Creates a client for the given API endpoint.
    ///
    /// A missing API key is a configuration error and fails immediately
    /// rather than on the first provider call.
    pub fn new(base_url: &str, api_key: &str) -> AppResult<Self> {
        if api_key.is_empty() {
            return Err(AppError::Validation(
                "HEYGEN_API_KEY is not configured".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(config::network::provider_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Creates a client from HEYGEN_API_KEY / HEYGEN_API_BASE_URL.
    pub fn from_env() -> AppResult<Self> {
        Self::new(&config::HEYGEN_API_BASE_URL, &config::HEYGEN_API_KEY)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> AppResult<T> {
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.or(body.message));
            return Err(match message {
                Some(m) => AppError::Provider(m),
                None => AppError::HttpStatus(status),
            });
        }

        let envelope: Envelope<T> = response.json().await?;
        if let Some(error) = envelope.error {
            return Err(AppError::Provider(error));
        }
        envelope
            .data
            .ok_or_else(|| AppError::Provider("response has no data".to_string()))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> AppResult<T> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header("accept", "application/json")
            .header("x-api-key", &self.api_key)
            .query(query)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> AppResult<T> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .header("accept", "application/json")
            .header("x-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn generate(&self, spec: &JobSpec, voice: VoiceInput) -> AppResult<String> {
        let payload = GeneratePayload {
            video_inputs: vec![VideoInput {
                character: Character {
                    kind: "avatar",
                    avatar_id: spec.avatar_id.clone(),
                    avatar_style: spec.avatar_style.clone(),
                },
                voice,
                background: spec.background.clone(),
            }],
            aspect_ratio: spec.aspect_ratio.clone(),
            test: spec.test_mode,
        };

        let data: GenerateData = self.post_json("/v2/video/generate", &payload).await?;
        Ok(data.video_id)
    }
}

#[async_trait]
impl VideoProvider for HeyGenClient {
    async fn submit_text_job(
        &self,
        spec: &JobSpec,
        voice_id: &str,
        text: &str,
    ) -> AppResult<String> {
        self.generate(
            spec,
            VoiceInput::Text {
                input_text: text.to_string(),
                voice_id: voice_id.to_string(),
            },
        )
        .await
    }

    async fn submit_audio_job(&self, spec: &JobSpec, audio_url: &str) -> AppResult<String> {
        self.generate(
            spec,
            VoiceInput::Audio {
                audio_url: audio_url.to_string(),
            },
        )
        .await
    }

    async fn get_job_status(&self, video_id: &str) -> AppResult<VideoStatusData> {
        let data: VideoStatusData = self
            .get_json("/v1/video_status.get", &[("video_id", video_id)])
            .await?;

        if data.status == VideoStatus::Unknown {
            log::warn!(
                "Provider returned unrecognized status for video {}, keeping last known",
                video_id
            );
        }
        Ok(data)
    }

    /// Quota units are seconds of rendered video; HeyGen answers 404 on
    /// account tiers without the endpoint.
    async fn remaining_quota(&self) -> AppResult<Option<Quota>> {
        match self
            .get_json::<QuotaData>("/v2/user/remaining_quota", &[])
            .await
        {
            Ok(data) => Ok(Some(Quota {
                remaining: (data.remaining_quota / 60.0).floor() as i64,
                used: (data.used_quota / 60.0).floor() as i64,
            })),
            Err(AppError::HttpStatus(status)) if status == reqwest::StatusCode::NOT_FOUND => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_api_key_is_a_configuration_error() {
        let result = HeyGenClient::new("https://api.heygen.com", "");
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_text_payload_shape() {
        let spec = JobSpec {
            avatar_id: "av1".to_string(),
            avatar_style: "normal".to_string(),
            aspect_ratio: "16:9".to_string(),
            background: None,
            test_mode: false,
        };
        let payload = GeneratePayload {
            video_inputs: vec![VideoInput {
                character: Character {
                    kind: "avatar",
                    avatar_id: spec.avatar_id.clone(),
                    avatar_style: spec.avatar_style.clone(),
                },
                voice: VoiceInput::Text {
                    input_text: "hello".to_string(),
                    voice_id: "v1".to_string(),
                },
                background: None,
            }],
            aspect_ratio: spec.aspect_ratio.clone(),
            test: spec.test_mode,
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["aspect_ratio"], "16:9");
        assert_eq!(json["test"], false);
        assert_eq!(json["video_inputs"][0]["character"]["type"], "avatar");
        assert_eq!(json["video_inputs"][0]["voice"]["type"], "text");
        assert_eq!(json["video_inputs"][0]["voice"]["input_text"], "hello");
        assert_eq!(json["video_inputs"][0]["voice"]["voice_id"], "v1");
        // Absent background must not serialize at all
        assert!(json["video_inputs"][0].get("background").is_none());
    }

    #[test]
    fn test_audio_payload_shape() {
        let voice = VoiceInput::Audio {
            audio_url: "https://x/a.mp3".to_string(),
        };
        let json = serde_json::to_value(&voice).unwrap();
        assert_eq!(json["type"], "audio");
        assert_eq!(json["audio_url"], "https://x/a.mp3");
    }

    #[test]
    fn test_envelope_error_detection() {
        let envelope: Envelope<GenerateData> =
            serde_json::from_str(r#"{"error": "quota exceeded", "data": null}"#).unwrap();
        assert_eq!(envelope.error.as_deref(), Some("quota exceeded"));

        let envelope: Envelope<GenerateData> =
            serde_json::from_str(r#"{"error": null, "data": {"video_id": "vid-1"}}"#).unwrap();
        assert!(envelope.error.is_none());
        assert_eq!(envelope.data.unwrap().video_id, "vid-1");
    }
}
