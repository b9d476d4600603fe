//! SQLite persistence for video-generation job records.
//!
//! The `video_generations` table is the sole coordination point between the
//! dispatcher, the reconciler and the delivery path. `credit_tracking` keeps
//! per-user consumed-credit totals.

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Result, Row};

use crate::provider::types::VideoStatus;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// One video-generation job tracked from submission to delivery.
/// Serializes in camelCase for the history endpoint.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGeneration {
    /// Local row id
    pub id: i64,
    /// Recipient Telegram chat/user id
    pub telegram_id: i64,
    /// Opaque job id assigned by the provider at submission
    pub video_id: String,
    /// Last known provider status
    pub status: VideoStatus,
    /// Result asset URL, trusted only once status = completed
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    /// Consumed credits, written at completion
    pub credits_used: i64,
    /// "text" or "audio"
    pub input_type: String,
    pub avatar_id: String,
    pub avatar_name: Option<String>,
    pub voice_id: Option<String>,
    pub input_text: Option<String>,
    pub audio_url: Option<String>,
    pub aspect_ratio: String,
    pub avatar_style: String,
    /// Free/watermarked render, affects credit accounting only
    pub test_mode: bool,
    /// At-most-once delivery flag: set once, never unset
    pub sent_to_telegram: bool,
    pub error_message: Option<String>,
    pub created_at: String,
    pub completed_at: Option<String>,
}

/// Fields for a freshly dispatched job (status=pending, not delivered).
#[derive(Debug, Clone)]
pub struct NewVideoGeneration {
    pub telegram_id: i64,
    pub video_id: String,
    pub input_type: String,
    pub avatar_id: String,
    pub avatar_name: Option<String>,
    pub voice_id: Option<String>,
    pub input_text: Option<String>,
    pub audio_url: Option<String>,
    pub aspect_ratio: String,
    pub avatar_style: String,
    pub test_mode: bool,
}

/// Partial update written by a reconciliation pass.
///
/// `None` fields are left untouched, so a failed provider fetch (which
/// produces no update at all) can never corrupt persisted state.
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    pub status: Option<VideoStatus>,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub credits_used: Option<i64>,
    pub error_message: Option<String>,
}

/// Aggregate per-user generation statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditStats {
    pub total_credits_used: i64,
    pub total_generations: i64,
    pub completed_generations: i64,
    pub failed_generations: i64,
}

const GENERATION_COLUMNS: &str = "id, telegram_id, video_id, status, video_url, thumbnail_url, \
     credits_used, input_type, avatar_id, avatar_name, voice_id, input_text, audio_url, \
     aspect_ratio, avatar_style, test_mode, sent_to_telegram, error_message, created_at, \
     completed_at";

/// Create a new database connection pool
///
/// Initializes a connection pool with up to 10 connections and runs schema
/// migrations on the first connection.
pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    let pool = Pool::builder().max_size(10).build(manager)?;

    let conn = pool.get()?;
    if let Err(e) = migrate_schema(&conn) {
        log::warn!("Failed to migrate schema: {}", e);
    }

    Ok(pool)
}

/// Get a connection from the pool
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

/// Migrate database schema to ensure all required tables and columns exist.
/// Missing columns are added in place so old databases keep working.
pub fn migrate_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS video_generations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            telegram_id INTEGER NOT NULL,
            video_id TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL DEFAULT 'pending',
            video_url TEXT,
            thumbnail_url TEXT,
            credits_used INTEGER NOT NULL DEFAULT 0,
            input_type TEXT NOT NULL,
            avatar_id TEXT NOT NULL,
            avatar_name TEXT,
            voice_id TEXT,
            input_text TEXT,
            audio_url TEXT,
            aspect_ratio TEXT NOT NULL DEFAULT '16:9',
            avatar_style TEXT NOT NULL DEFAULT 'normal',
            test_mode INTEGER NOT NULL DEFAULT 0,
            sent_to_telegram INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            completed_at DATETIME
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_video_generations_undelivered
         ON video_generations(sent_to_telegram, status)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS credit_tracking (
            telegram_id INTEGER PRIMARY KEY,
            total_credits_used INTEGER NOT NULL DEFAULT 0,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // Columns added after the initial release; bring old databases up to date
    let mut stmt = conn.prepare("PRAGMA table_info(video_generations)")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;

    let mut columns = Vec::new();
    for row in rows {
        columns.push(row?);
    }

    if !columns.contains(&"error_message".to_string()) {
        log::info!("Adding missing column: error_message to video_generations table");
        if let Err(e) = conn.execute(
            "ALTER TABLE video_generations ADD COLUMN error_message TEXT DEFAULT NULL",
            [],
        ) {
            log::warn!("Failed to add error_message column: {}", e);
        }
    }

    if !columns.contains(&"completed_at".to_string()) {
        log::info!("Adding missing column: completed_at to video_generations table");
        if let Err(e) = conn.execute(
            "ALTER TABLE video_generations ADD COLUMN completed_at DATETIME DEFAULT NULL",
            [],
        ) {
            log::warn!("Failed to add completed_at column: {}", e);
        }
    }

    Ok(())
}

fn row_to_generation(row: &Row<'_>) -> Result<VideoGeneration> {
    Ok(VideoGeneration {
        id: row.get(0)?,
        telegram_id: row.get(1)?,
        video_id: row.get(2)?,
        status: VideoStatus::parse(&row.get::<_, String>(3)?),
        video_url: row.get(4)?,
        thumbnail_url: row.get(5)?,
        credits_used: row.get(6)?,
        input_type: row.get(7)?,
        avatar_id: row.get(8)?,
        avatar_name: row.get(9)?,
        voice_id: row.get(10)?,
        input_text: row.get(11)?,
        audio_url: row.get(12)?,
        aspect_ratio: row.get(13)?,
        avatar_style: row.get(14)?,
        test_mode: row.get::<_, i64>(15)? != 0,
        sent_to_telegram: row.get::<_, i64>(16)? != 0,
        error_message: row.get(17)?,
        created_at: row.get(18)?,
        completed_at: row.get(19)?,
    })
}

/// Insert a new job record with status=pending and delivery flag unset.
pub fn create_video_generation(
    conn: &Connection,
    new: &NewVideoGeneration,
) -> Result<VideoGeneration> {
    conn.execute(
        "INSERT INTO video_generations (
            telegram_id, video_id, status, input_type, avatar_id, avatar_name,
            voice_id, input_text, audio_url, aspect_ratio, avatar_style,
            test_mode, credits_used, sent_to_telegram
        ) VALUES (?1, ?2, 'pending', ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, 0)",
        params![
            new.telegram_id,
            new.video_id,
            new.input_type,
            new.avatar_id,
            new.avatar_name,
            new.voice_id,
            new.input_text,
            new.audio_url,
            new.aspect_ratio,
            new.avatar_style,
            new.test_mode as i64,
        ],
    )?;

    get_video_generation(conn, &new.video_id)?
        .ok_or(rusqlite::Error::QueryReturnedNoRows)
}

/// Fetch a job record by provider job id.
pub fn get_video_generation(conn: &Connection, video_id: &str) -> Result<Option<VideoGeneration>> {
    conn.query_row(
        &format!("SELECT {GENERATION_COLUMNS} FROM video_generations WHERE video_id = ?1"),
        params![video_id],
        row_to_generation,
    )
    .optional()
}

/// Apply a partial update from a reconciliation pass.
///
/// When the update carries a terminal status, `completed_at` is stamped with
/// the current time. Returns true when a row was changed.
pub fn update_video_generation(
    conn: &Connection,
    video_id: &str,
    update: &StatusUpdate,
) -> Result<bool> {
    let mut sets: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(status) = update.status {
        values.push(Box::new(status.as_str().to_string()));
        sets.push(format!("status = ?{}", values.len()));
        if status.is_terminal() {
            // First terminal report wins; re-reports must not move the stamp
            values.push(Box::new(chrono::Utc::now().to_rfc3339()));
            sets.push(format!("completed_at = COALESCE(completed_at, ?{})", values.len()));
        }
    }
    if let Some(ref url) = update.video_url {
        values.push(Box::new(url.clone()));
        sets.push(format!("video_url = ?{}", values.len()));
    }
    if let Some(ref url) = update.thumbnail_url {
        values.push(Box::new(url.clone()));
        sets.push(format!("thumbnail_url = ?{}", values.len()));
    }
    if let Some(credits) = update.credits_used {
        values.push(Box::new(credits));
        sets.push(format!("credits_used = ?{}", values.len()));
    }
    if let Some(ref message) = update.error_message {
        values.push(Box::new(message.clone()));
        sets.push(format!("error_message = ?{}", values.len()));
    }

    if sets.is_empty() {
        return Ok(false);
    }

    values.push(Box::new(video_id.to_string()));
    let sql = format!(
        "UPDATE video_generations SET {} WHERE video_id = ?{}",
        sets.join(", "),
        values.len()
    );

    let changed = conn.execute(&sql, rusqlite::params_from_iter(values.iter()))?;
    Ok(changed > 0)
}

/// Candidate jobs for a delivery pass: completed, not yet delivered, with a
/// result URL, oldest completion first for fairness.
pub fn list_unsent_completed(conn: &Connection) -> Result<Vec<VideoGeneration>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {GENERATION_COLUMNS} FROM video_generations
         WHERE status = 'completed' AND sent_to_telegram = 0 AND video_url IS NOT NULL
         ORDER BY completed_at ASC, id ASC"
    ))?;
    let rows = stmt.query_map([], row_to_generation)?;
    rows.collect()
}

/// Polling variant: every undelivered job, including pending/processing ones
/// that have no result URL yet and failed ones whose notice is still owed.
pub fn list_undelivered_active(conn: &Connection) -> Result<Vec<VideoGeneration>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {GENERATION_COLUMNS} FROM video_generations
         WHERE sent_to_telegram = 0
           AND status IN ('pending', 'processing', 'completed', 'failed')
         ORDER BY created_at ASC, id ASC"
    ))?;
    let rows = stmt.query_map([], row_to_generation)?;
    rows.collect()
}

/// Set the delivery flag, exactly once.
///
/// Conditional update: only flips rows where the flag is still unset and
/// reports whether this call actually changed the row. Callers that get
/// `false` lost the race (or repeated themselves) and must not send again.
pub fn mark_delivered(conn: &Connection, video_id: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE video_generations SET sent_to_telegram = 1
         WHERE video_id = ?1 AND sent_to_telegram = 0",
        params![video_id],
    )?;
    Ok(changed > 0)
}

/// Add consumed credits to a user's running total.
pub fn update_credit_tracking(conn: &Connection, telegram_id: i64, credits: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO credit_tracking (telegram_id, total_credits_used, updated_at)
         VALUES (?1, ?2, CURRENT_TIMESTAMP)
         ON CONFLICT(telegram_id) DO UPDATE SET
            total_credits_used = total_credits_used + excluded.total_credits_used,
            updated_at = CURRENT_TIMESTAMP",
        params![telegram_id, credits],
    )?;
    Ok(())
}

/// A user's generation history, newest first.
pub fn list_user_history(
    conn: &Connection,
    telegram_id: i64,
    limit: u32,
) -> Result<Vec<VideoGeneration>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {GENERATION_COLUMNS} FROM video_generations
         WHERE telegram_id = ?1 ORDER BY created_at DESC LIMIT ?2"
    ))?;
    let rows = stmt.query_map(params![telegram_id, limit], row_to_generation)?;
    rows.collect()
}

/// Aggregate credit and generation statistics for a user.
pub fn get_user_credit_stats(conn: &Connection, telegram_id: i64) -> Result<CreditStats> {
    let total_credits_used: i64 = conn
        .query_row(
            "SELECT total_credits_used FROM credit_tracking WHERE telegram_id = ?1",
            params![telegram_id],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0);

    let (total, completed, failed): (i64, i64, i64) = conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(status = 'completed'), 0),
                COALESCE(SUM(status = 'failed'), 0)
         FROM video_generations WHERE telegram_id = ?1",
        params![telegram_id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    Ok(CreditStats {
        total_credits_used,
        total_generations: total,
        completed_generations: completed,
        failed_generations: failed,
    })
}
