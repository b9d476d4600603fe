//! End-to-end flow test: dispatch a job, poll it through the provider
//! lifecycle, and verify exactly-once delivery through the channel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;

use avagen::core::error::{AppError, AppResult};
use avagen::provider::types::{JobSpec, Quota, VideoStatus, VideoStatusData};
use avagen::provider::VideoProvider;
use avagen::reconcile::{
    self, dispatcher, Disposition, GenerationRequest, InputType, ServiceDeps,
};
use avagen::storage::db;
use avagen::storage::{create_pool, get_connection};
use avagen::telegram::MessagingChannel;

/// Scripted provider: submissions hand out fixed ids, status calls replay
/// whatever the test staged last.
struct ScriptedProvider {
    next_id: Mutex<String>,
    statuses: Mutex<HashMap<String, VideoStatusData>>,
}

impl ScriptedProvider {
    fn new(next_id: &str) -> Self {
        Self {
            next_id: Mutex::new(next_id.to_string()),
            statuses: Mutex::new(HashMap::new()),
        }
    }

    fn report(&self, video_id: &str, status: VideoStatus, video_url: Option<&str>) {
        self.statuses.lock().unwrap().insert(
            video_id.to_string(),
            VideoStatusData {
                video_id: video_id.to_string(),
                status,
                video_url: video_url.map(str::to_string),
                thumbnail_url: None,
                duration: Some(45.0),
                error: None,
            },
        );
    }
}

#[async_trait]
impl VideoProvider for ScriptedProvider {
    async fn submit_text_job(
        &self,
        spec: &JobSpec,
        voice_id: &str,
        text: &str,
    ) -> AppResult<String> {
        assert!(!spec.avatar_id.is_empty());
        assert!(!voice_id.is_empty());
        assert!(!text.is_empty());
        Ok(self.next_id.lock().unwrap().clone())
    }

    async fn submit_audio_job(&self, _spec: &JobSpec, audio_url: &str) -> AppResult<String> {
        assert!(!audio_url.is_empty());
        Ok(self.next_id.lock().unwrap().clone())
    }

    async fn get_job_status(&self, video_id: &str) -> AppResult<VideoStatusData> {
        self.statuses
            .lock()
            .unwrap()
            .get(video_id)
            .cloned()
            .ok_or_else(|| AppError::Provider("unknown video".to_string()))
    }

    async fn remaining_quota(&self) -> AppResult<Option<Quota>> {
        Ok(Some(Quota {
            remaining: 100,
            used: 0,
        }))
    }
}

#[derive(Default)]
struct CountingChannel {
    assets: Mutex<Vec<(i64, String, String)>>,
    texts: Mutex<Vec<(i64, String)>>,
}

#[async_trait]
impl MessagingChannel for CountingChannel {
    async fn send_asset(&self, recipient: i64, asset_url: &str, caption: &str) -> bool {
        self.assets.lock().unwrap().push((
            recipient,
            asset_url.to_string(),
            caption.to_string(),
        ));
        true
    }

    async fn send_text(&self, recipient: i64, text: &str) -> bool {
        self.texts.lock().unwrap().push((recipient, text.to_string()));
        true
    }
}

struct Flow {
    deps: ServiceDeps,
    provider: Arc<ScriptedProvider>,
    channel: Arc<CountingChannel>,
    _db_file: NamedTempFile,
}

fn flow(next_id: &str) -> Flow {
    let db_file = NamedTempFile::new().unwrap();
    let pool = Arc::new(create_pool(db_file.path().to_str().unwrap()).unwrap());
    let provider = Arc::new(ScriptedProvider::new(next_id));
    let channel = Arc::new(CountingChannel::default());
    Flow {
        deps: ServiceDeps {
            db: pool,
            provider: Arc::clone(&provider) as Arc<dyn VideoProvider>,
            channel: Arc::clone(&channel) as Arc<dyn MessagingChannel>,
        },
        provider,
        channel,
        _db_file: db_file,
    }
}

fn text_request() -> GenerationRequest {
    GenerationRequest {
        telegram_id: 7001,
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

#[tokio::test]
async fn dispatch_then_poll_to_delivery() {
    let f = flow("vid-100");

    // Dispatch: record lands as pending/undelivered
    let record = dispatcher::dispatch_generation(&f.deps, &text_request())
        .await
        .unwrap();
    assert_eq!(record.video_id, "vid-100");
    assert_eq!(record.status, VideoStatus::Pending);
    assert!(!record.sent_to_telegram);
    assert_eq!(record.input_type, "text");

    // Provider still rendering: pass persists the status, sends nothing
    f.provider.report("vid-100", VideoStatus::Processing, None);
    let outcomes = reconcile::run_polling_pass(&f.deps).await.unwrap();
    assert_eq!(outcomes[0].disposition, Disposition::InProgress);
    assert!(f.channel.assets.lock().unwrap().is_empty());

    // Provider finishes: exactly one send, flag set
    f.provider
        .report("vid-100", VideoStatus::Completed, Some("https://x/video.mp4"));
    let outcomes = reconcile::run_polling_pass(&f.deps).await.unwrap();
    assert_eq!(outcomes[0].disposition, Disposition::Sent);
    {
        let sends = f.channel.assets.lock().unwrap();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].0, 7001);
        assert_eq!(sends[0].1, "https://x/video.mp4");
    }

    let conn = get_connection(&f.deps.db).unwrap();
    let record = db::get_video_generation(&conn, "vid-100").unwrap().unwrap();
    assert!(record.sent_to_telegram);
    assert_eq!(record.status, VideoStatus::Completed);
    assert_eq!(record.credits_used, 1); // 45s rounds up to one credit
    drop(conn);

    // Idempotence: repeated passes never send again
    let outcomes = reconcile::run_polling_pass(&f.deps).await.unwrap();
    assert!(outcomes.is_empty());
    let outcomes = reconcile::run_pass(&f.deps).await.unwrap();
    assert!(outcomes.is_empty());
    assert_eq!(f.channel.assets.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn failed_render_reports_once() {
    let f = flow("vid-200");

    dispatcher::dispatch_generation(&f.deps, &text_request())
        .await
        .unwrap();

    f.provider.statuses.lock().unwrap().insert(
        "vid-200".to_string(),
        VideoStatusData {
            video_id: "vid-200".to_string(),
            status: VideoStatus::Failed,
            video_url: None,
            thumbnail_url: None,
            duration: None,
            error: Some("render error".to_string()),
        },
    );

    let outcomes = reconcile::run_polling_pass(&f.deps).await.unwrap();
    assert_eq!(outcomes[0].disposition, Disposition::FailureNotified);

    let texts = f.channel.texts.lock().unwrap();
    assert_eq!(texts.len(), 1);
    assert_eq!(texts[0].0, 7001);
    assert!(texts[0].1.contains("render error"));
    drop(texts);

    // The notice is not repeated
    let outcomes = reconcile::run_polling_pass(&f.deps).await.unwrap();
    assert!(outcomes.is_empty());
    assert_eq!(f.channel.texts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn relay_mode_hands_envelope_to_channel() {
    let f = flow("unused");

    let ok = dispatcher::relay_generation(f.channel.as_ref(), &text_request()).await;
    assert!(ok);

    let texts = f.channel.texts.lock().unwrap();
    assert_eq!(texts.len(), 1);
    let (recipient, message) = &texts[0];
    assert_eq!(*recipient, 7001);

    // Envelope is the JSON tail of the message
    let json_part = message.split("\n\n").nth(1).unwrap();
    let envelope: serde_json::Value = serde_json::from_str(json_part).unwrap();
    assert_eq!(envelope["type"], "video_generation");
    assert_eq!(envelope["avatarId"], "av1");
    assert_eq!(envelope["inputType"], "text");

    // Nothing was persisted: relay is a pure handoff
    let conn = get_connection(&f.deps.db).unwrap();
    assert!(db::list_undelivered_active(&conn).unwrap().is_empty());
}
