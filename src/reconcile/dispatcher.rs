//! Generation request dispatcher.
//!
//! Validates a user's avatar/voice/text-or-audio selection and either submits
//! it to the provider directly (persisting a pending job record) or relays it
//! as a tagged message through the bot channel for out-of-band handling.

use serde::{Deserialize, Serialize};

use crate::core::config::defaults;
use crate::core::error::{AppError, AppResult};
use crate::provider::types::{Background, JobSpec};
use crate::storage::db::{self, NewVideoGeneration, VideoGeneration};
use crate::storage::get_connection;
use crate::telegram::MessagingChannel;

use super::ServiceDeps;

/// Input mode for a generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Text,
    Audio,
}

impl InputType {
    pub fn as_str(self) -> &'static str {
        match self {
            InputType::Text => "text",
            InputType::Audio => "audio",
        }
    }
}

/// A user's generation request as it arrives from the web surface or the
/// mini-app relay. Field names mirror the JSON contract of the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub telegram_id: i64,
    pub avatar_id: String,
    #[serde(default)]
    pub avatar_name: Option<String>,
    pub input_type: InputType,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub voice_id: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub avatar_style: Option<String>,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub background: Option<Background>,
    #[serde(default)]
    pub test: bool,
}

impl GenerationRequest {
    fn avatar_style(&self) -> &str {
        self.avatar_style.as_deref().unwrap_or(defaults::AVATAR_STYLE)
    }

    fn aspect_ratio(&self) -> &str {
        self.aspect_ratio.as_deref().unwrap_or(defaults::ASPECT_RATIO)
    }

    fn job_spec(&self) -> JobSpec {
        JobSpec {
            avatar_id: self.avatar_id.clone(),
            avatar_style: self.avatar_style().to_string(),
            aspect_ratio: self.aspect_ratio().to_string(),
            background: self.background.clone(),
            test_mode: self.test,
        }
    }
}

/// Validate a request, naming the first missing field.
pub fn validate(request: &GenerationRequest) -> AppResult<()> {
    if request.telegram_id == 0 {
        return Err(AppError::Validation("telegramId is required".to_string()));
    }
    if request.avatar_id.is_empty() {
        return Err(AppError::Validation("avatarId is required".to_string()));
    }
    match request.input_type {
        InputType::Text => {
            if request.text.as_deref().unwrap_or("").is_empty() {
                return Err(AppError::Validation(
                    "text is required for text input".to_string(),
                ));
            }
            if request.voice_id.as_deref().unwrap_or("").is_empty() {
                return Err(AppError::Validation(
                    "voiceId is required for text input".to_string(),
                ));
            }
        }
        InputType::Audio => {
            if request.audio_url.as_deref().unwrap_or("").is_empty() {
                return Err(AppError::Validation(
                    "audioUrl is required for audio input".to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// Submit a generation request to the provider and persist the job record.
///
/// One outbound provider call, one persistence write. When the write fails
/// after a successful provider call the dispatch still succeeds: the job
/// exists at the provider but is not tracked locally, which is logged loudly
/// and accepted (the alternative would double-submit on retry).
pub async fn dispatch_generation(
    deps: &ServiceDeps,
    request: &GenerationRequest,
) -> AppResult<VideoGeneration> {
    validate(request)?;

    let spec = request.job_spec();
    let video_id = match request.input_type {
        InputType::Text => {
            let voice_id = request.voice_id.as_deref().unwrap_or("");
            let text = request.text.as_deref().unwrap_or("");
            deps.provider.submit_text_job(&spec, voice_id, text).await?
        }
        InputType::Audio => {
            let audio_url = request.audio_url.as_deref().unwrap_or("");
            deps.provider.submit_audio_job(&spec, audio_url).await?
        }
    };

    log::info!(
        "Dispatched {} job {} for chat {} (avatar {})",
        request.input_type.as_str(),
        video_id,
        request.telegram_id,
        request.avatar_id
    );

    let new = NewVideoGeneration {
        telegram_id: request.telegram_id,
        video_id: video_id.clone(),
        input_type: request.input_type.as_str().to_string(),
        avatar_id: request.avatar_id.clone(),
        avatar_name: request.avatar_name.clone(),
        voice_id: request.voice_id.clone(),
        input_text: request.text.clone(),
        audio_url: request.audio_url.clone(),
        aspect_ratio: request.aspect_ratio().to_string(),
        avatar_style: request.avatar_style().to_string(),
        test_mode: request.test,
    };

    let persisted = get_connection(&deps.db)
        .map_err(AppError::from)
        .and_then(|conn| db::create_video_generation(&conn, &new).map_err(AppError::from));

    match persisted {
        Ok(record) => Ok(record),
        Err(e) => {
            log::error!(
                "Job {} submitted to provider but NOT tracked locally: {}",
                video_id,
                e
            );
            Ok(untracked_record(new))
        }
    }
}

/// Relay a generation request through the messaging channel instead of
/// calling the provider, for handling by an external automation consumer.
///
/// The payload is a best-effort, versionless contract: a human-readable line
/// followed by a tagged JSON envelope the consumer parses out of the message.
pub async fn relay_generation(
    channel: &dyn MessagingChannel,
    request: &GenerationRequest,
) -> bool {
    let message = format!(
        "Генерация отправлена ✅\n\n{}",
        relay_envelope(request)
    );
    channel.send_text(request.telegram_id, &message).await
}

fn relay_envelope(request: &GenerationRequest) -> serde_json::Value {
    serde_json::json!({
        "type": "video_generation",
        "avatarId": request.avatar_id,
        "avatarName": request.avatar_name,
        "voiceId": request.voice_id,
        "text": request.text,
        "audioUrl": request.audio_url,
        "inputType": request.input_type,
        "avatarStyle": request.avatar_style(),
        "aspectRatio": request.aspect_ratio(),
        "background": request.background,
        "test": request.test,
    })
}

fn untracked_record(new: NewVideoGeneration) -> VideoGeneration {
    VideoGeneration {
        id: 0,
        telegram_id: new.telegram_id,
        video_id: new.video_id,
        status: crate::provider::VideoStatus::Pending,
        video_url: None,
        thumbnail_url: None,
        credits_used: 0,
        input_type: new.input_type,
        avatar_id: new.avatar_id,
        avatar_name: new.avatar_name,
        voice_id: new.voice_id,
        input_text: new.input_text,
        audio_url: new.audio_url,
        aspect_ratio: new.aspect_ratio,
        avatar_style: new.avatar_style,
        test_mode: new.test_mode,
        sent_to_telegram: false,
        error_message: None,
        created_at: chrono::Utc::now().to_rfc3339(),
        completed_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text_request() -> GenerationRequest {
        GenerationRequest {
            telegram_id: 1001,
            avatar_id: "av1".to_string(),
            avatar_name: Some("Anna".to_string()),
            input_type: InputType::Text,
            text: Some("hello".to_string()),
            voice_id: Some("v1".to_string()),
            audio_url: None,
            avatar_style: None,
            aspect_ratio: None,
            background: None,
            test: false,
        }
    }

    #[test]
    fn test_valid_text_request_passes() {
        assert!(validate(&text_request()).is_ok());
    }

    #[test]
    fn test_validation_names_the_missing_field() {
        let mut request = text_request();
        request.voice_id = None;
        let err = validate(&request).unwrap_err();
        assert!(err.to_string().contains("voiceId"));

        let mut request = text_request();
        request.text = Some(String::new());
        let err = validate(&request).unwrap_err();
        assert!(err.to_string().contains("text"));

        let mut request = text_request();
        request.input_type = InputType::Audio;
        let err = validate(&request).unwrap_err();
        assert!(err.to_string().contains("audioUrl"));

        let mut request = text_request();
        request.avatar_id = String::new();
        let err = validate(&request).unwrap_err();
        assert!(err.to_string().contains("avatarId"));

        let mut request = text_request();
        request.telegram_id = 0;
        let err = validate(&request).unwrap_err();
        assert!(err.to_string().contains("telegramId"));
    }

    #[test]
    fn test_audio_request_does_not_need_voice() {
        let request = GenerationRequest {
            input_type: InputType::Audio,
            text: None,
            voice_id: None,
            audio_url: Some("https://x/a.mp3".to_string()),
            ..text_request()
        };
        assert!(validate(&request).is_ok());
    }

    #[test]
    fn test_request_deserializes_from_ui_json() {
        let request: GenerationRequest = serde_json::from_str(
            r#"{"telegramId": 1001, "avatarId": "av1", "inputType": "text",
                "text": "hello", "voiceId": "v1", "test": true}"#,
        )
        .unwrap();
        assert_eq!(request.input_type, InputType::Text);
        assert_eq!(request.voice_id.as_deref(), Some("v1"));
        assert!(request.test);
        assert!(request.background.is_none());
    }

    #[test]
    fn test_relay_envelope_is_tagged_and_carries_defaults() {
        let envelope = relay_envelope(&text_request());
        assert_eq!(envelope["type"], "video_generation");
        assert_eq!(envelope["inputType"], "text");
        assert_eq!(envelope["avatarId"], "av1");
        assert_eq!(envelope["avatarStyle"], "normal");
        assert_eq!(envelope["aspectRatio"], "16:9");
        assert_eq!(envelope["test"], false);
    }
}
