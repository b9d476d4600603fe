//! User-facing message texts for delivery notifications.
//!
//! Presentation only — nothing here is a correctness contract beyond
//! "readable string describing the outcome".

use crate::storage::db::VideoGeneration;

/// Caption attached to a finished video.
pub fn ready_caption(job: &VideoGeneration, credits_used: i64) -> String {
    let avatar = job.avatar_name.as_deref().unwrap_or(&job.avatar_id);
    let input = if job.input_type == "text" {
        "Текст"
    } else {
        "Аудио"
    };

    let mut caption = format!(
        "🎬 Ваше видео готово!\n\nАватар: {}\nТип: {}\nФормат: {}\n",
        avatar, input, job.aspect_ratio
    );
    if job.test_mode {
        caption.push_str("⚠️ Тестовый режим (бесплатно)\n");
    } else {
        caption.push_str(&format!("💳 Использовано кредитов: {}\n", credits_used));
    }
    caption
}

/// Failure notice sent when generation did not succeed.
pub fn failure_text(error: Option<&str>) -> String {
    format!(
        "❌ К сожалению, генерация видео не удалась.\n\nОшибка: {}",
        error.unwrap_or("Неизвестная ошибка")
    )
}
