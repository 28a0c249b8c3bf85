//! Database migrations for StudySync

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Run all migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        migrate_v1(conn)?;
    }

    if current_version < SCHEMA_VERSION {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Initial schema (v1): one table per entity family
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Chat sessions. session_id is the client-chosen stable identifier;
        -- UNIQUE so a retried create surfaces as a constraint error instead
        -- of a duplicate row.
        CREATE TABLE IF NOT EXISTS chat_sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id TEXT NOT NULL,
            session_id TEXT NOT NULL UNIQUE,
            title TEXT,
            subject TEXT,
            message_count INTEGER NOT NULL DEFAULT 0,
            started_at TEXT NOT NULL,
            last_message_at TEXT NOT NULL,
            ended_at TEXT,
            total_tokens INTEGER NOT NULL DEFAULT 0,
            summary TEXT,
            tags TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            last_synced_at TEXT NOT NULL
        );

        -- Chat messages; cascade from sessions is an explicit two-step
        -- delete in the store, not a foreign key action.
        CREATE TABLE IF NOT EXISTS chat_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id TEXT NOT NULL,
            session_id TEXT NOT NULL,
            message_id TEXT NOT NULL UNIQUE,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            metadata TEXT,
            tokens TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            last_synced_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS schedule_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            subject TEXT,
            due_date TEXT,
            start_time TEXT,
            end_time TEXT,
            duration_minutes INTEGER,
            priority TEXT NOT NULL DEFAULT 'medium',
            priority_rank INTEGER NOT NULL DEFAULT 1,
            status TEXT NOT NULL DEFAULT 'pending',
            tags TEXT NOT NULL DEFAULT '[]',
            reminder TEXT,
            recurrence TEXT,
            completed_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            last_synced_at TEXT NOT NULL
        );

        -- One settings row per owner
        CREATE TABLE IF NOT EXISTS voice_settings (
            owner_id TEXT PRIMARY KEY,
            enabled INTEGER NOT NULL DEFAULT 1,
            volume REAL NOT NULL DEFAULT 0.8,
            rate INTEGER NOT NULL DEFAULT 150,
            voice TEXT,
            language TEXT NOT NULL DEFAULT 'en-US',
            activation_keyword TEXT NOT NULL DEFAULT 'hey study helper',
            wake_word_sensitivity REAL NOT NULL DEFAULT 0.7,
            noise_reduction INTEGER NOT NULL DEFAULT 1,
            auto_transcription INTEGER NOT NULL DEFAULT 1,
            confidence_threshold REAL NOT NULL DEFAULT 0.4,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            last_synced_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS voice_commands (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id TEXT NOT NULL,
            session_id TEXT,
            command TEXT NOT NULL,
            transcription TEXT NOT NULL,
            confidence REAL NOT NULL,
            intent TEXT,
            response TEXT,
            executed_at TEXT NOT NULL,
            response_time_ms INTEGER,
            successful INTEGER NOT NULL DEFAULT 1,
            error_message TEXT,
            context TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            last_synced_at TEXT NOT NULL
        );

        -- Query-path indexes
        CREATE INDEX IF NOT EXISTS idx_chat_sessions_owner_started
            ON chat_sessions(owner_id, started_at DESC);
        CREATE INDEX IF NOT EXISTS idx_chat_sessions_owner_subject
            ON chat_sessions(owner_id, subject);
        CREATE INDEX IF NOT EXISTS idx_chat_messages_owner_session
            ON chat_messages(owner_id, session_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_schedule_items_owner_status
            ON schedule_items(owner_id, status);
        CREATE INDEX IF NOT EXISTS idx_schedule_items_owner_due
            ON schedule_items(owner_id, due_date);
        CREATE INDEX IF NOT EXISTS idx_schedule_items_owner_priority
            ON schedule_items(owner_id, priority);
        CREATE INDEX IF NOT EXISTS idx_voice_commands_owner_executed
            ON voice_commands(owner_id, executed_at DESC);
        CREATE INDEX IF NOT EXISTS idx_voice_commands_owner_successful
            ON voice_commands(owner_id, successful);
        "#,
    )?;

    conn.execute("INSERT INTO schema_version (version) VALUES (1)", [])?;

    Ok(())
}

/// v2: watermark indexes for incremental sync reads
fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE INDEX IF NOT EXISTS idx_chat_sessions_owner_synced
            ON chat_sessions(owner_id, last_synced_at);
        CREATE INDEX IF NOT EXISTS idx_chat_messages_owner_synced
            ON chat_messages(owner_id, last_synced_at);
        CREATE INDEX IF NOT EXISTS idx_schedule_items_owner_synced
            ON schedule_items(owner_id, last_synced_at);
        CREATE INDEX IF NOT EXISTS idx_voice_commands_owner_synced
            ON voice_commands(owner_id, last_synced_at);
        "#,
    )?;

    conn.execute("INSERT INTO schema_version (version) VALUES (2)", [])?;

    Ok(())
}
