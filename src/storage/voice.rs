//! Voice settings and command queries
//!
//! Settings are a per-owner singleton created with defaults on first read.
//! Commands are append-heavy history rows with retention deletes.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{push_window, ts};
use crate::error::{Result, SyncError};
use crate::types::{
    CommandFilter, CommandSelector, ItemId, NewVoiceCommand, VoiceCommand, VoiceCommandPatch,
    VoiceSettings, VoiceSettingsPatch,
};

const SETTINGS_COLUMNS: &str = "owner_id, enabled, volume, rate, voice, language,
        activation_keyword, wake_word_sensitivity, noise_reduction, auto_transcription,
        confidence_threshold, created_at, updated_at, last_synced_at";

const COMMAND_COLUMNS: &str = "id, owner_id, session_id, command, transcription, confidence,
        intent, response, executed_at, response_time_ms, successful, error_message,
        context, created_at, updated_at, last_synced_at";

fn settings_from_row(row: &Row) -> rusqlite::Result<VoiceSettings> {
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let last_synced_at: String = row.get("last_synced_at")?;

    Ok(VoiceSettings {
        owner_id: row.get("owner_id")?,
        enabled: row.get("enabled")?,
        volume: row.get("volume")?,
        rate: row.get("rate")?,
        voice: row.get("voice")?,
        language: row.get("language")?,
        activation_keyword: row.get("activation_keyword")?,
        wake_word_sensitivity: row.get("wake_word_sensitivity")?,
        noise_reduction: row.get("noise_reduction")?,
        auto_transcription: row.get("auto_transcription")?,
        confidence_threshold: row.get("confidence_threshold")?,
        created_at: ts(&created_at),
        updated_at: ts(&updated_at),
        last_synced_at: ts(&last_synced_at),
    })
}

fn command_from_row(row: &Row) -> rusqlite::Result<VoiceCommand> {
    let context_json: Option<String> = row.get("context")?;
    let executed_at: String = row.get("executed_at")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let last_synced_at: String = row.get("last_synced_at")?;

    Ok(VoiceCommand {
        id: row.get("id")?,
        owner_id: row.get("owner_id")?,
        session_id: row.get("session_id")?,
        command: row.get("command")?,
        transcription: row.get("transcription")?,
        confidence: row.get("confidence")?,
        intent: row.get("intent")?,
        response: row.get("response")?,
        executed_at: ts(&executed_at),
        response_time: row.get("response_time_ms")?,
        successful: row.get("successful")?,
        error_message: row.get("error_message")?,
        context: context_json.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: ts(&created_at),
        updated_at: ts(&updated_at),
        last_synced_at: ts(&last_synced_at),
    })
}

/// Get the owner's settings row, if one exists
pub fn get_settings(conn: &Connection, owner_id: &str) -> Result<Option<VoiceSettings>> {
    let sql = format!(
        "SELECT {} FROM voice_settings WHERE owner_id = ?",
        SETTINGS_COLUMNS
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    Ok(stmt
        .query_row(params![owner_id], settings_from_row)
        .optional()?)
}

/// Get the owner's settings, inserting defaults on first read
///
/// Returns the settings and whether this call created them.
pub fn get_or_create_settings(
    conn: &Connection,
    owner_id: &str,
) -> Result<(VoiceSettings, bool)> {
    if let Some(settings) = get_settings(conn, owner_id)? {
        return Ok((settings, false));
    }

    let defaults = VoiceSettings::defaults(owner_id, Utc::now());
    insert_settings(conn, &defaults)?;
    Ok((defaults, true))
}

fn insert_settings(conn: &Connection, settings: &VoiceSettings) -> Result<()> {
    conn.execute(
        "INSERT INTO voice_settings
            (owner_id, enabled, volume, rate, voice, language, activation_keyword,
             wake_word_sensitivity, noise_reduction, auto_transcription,
             confidence_threshold, created_at, updated_at, last_synced_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            settings.owner_id,
            settings.enabled,
            settings.volume,
            settings.rate,
            settings.voice,
            settings.language,
            settings.activation_keyword,
            settings.wake_word_sensitivity,
            settings.noise_reduction,
            settings.auto_transcription,
            settings.confidence_threshold,
            settings.created_at.to_rfc3339(),
            settings.updated_at.to_rfc3339(),
            settings.last_synced_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Apply a sparse patch to the owner's settings, creating defaults first if
/// the row does not exist yet (upsert semantics)
pub fn upsert_settings(
    conn: &Connection,
    owner_id: &str,
    patch: &VoiceSettingsPatch,
) -> Result<VoiceSettings> {
    patch.validate()?;

    let (_, _created) = get_or_create_settings(conn, owner_id)?;

    let now = Utc::now().to_rfc3339();
    let mut updates = vec![
        "updated_at = ?".to_string(),
        "last_synced_at = ?".to_string(),
    ];
    let mut values: Vec<Box<dyn rusqlite::ToSql>> =
        vec![Box::new(now.clone()), Box::new(now)];

    if let Some(enabled) = patch.enabled {
        updates.push("enabled = ?".to_string());
        values.push(Box::new(enabled));
    }
    if let Some(volume) = patch.volume {
        updates.push("volume = ?".to_string());
        values.push(Box::new(volume));
    }
    if let Some(rate) = patch.rate {
        updates.push("rate = ?".to_string());
        values.push(Box::new(rate));
    }
    if let Some(ref voice) = patch.voice {
        updates.push("voice = ?".to_string());
        values.push(Box::new(voice.clone()));
    }
    if let Some(ref language) = patch.language {
        updates.push("language = ?".to_string());
        values.push(Box::new(language.clone()));
    }
    if let Some(ref keyword) = patch.activation_keyword {
        // Keyword matching is case-insensitive on the client; store lowercase
        updates.push("activation_keyword = ?".to_string());
        values.push(Box::new(keyword.trim().to_lowercase()));
    }
    if let Some(sensitivity) = patch.wake_word_sensitivity {
        updates.push("wake_word_sensitivity = ?".to_string());
        values.push(Box::new(sensitivity));
    }
    if let Some(noise_reduction) = patch.noise_reduction {
        updates.push("noise_reduction = ?".to_string());
        values.push(Box::new(noise_reduction));
    }
    if let Some(auto_transcription) = patch.auto_transcription {
        updates.push("auto_transcription = ?".to_string());
        values.push(Box::new(auto_transcription));
    }
    if let Some(threshold) = patch.confidence_threshold {
        updates.push("confidence_threshold = ?".to_string());
        values.push(Box::new(threshold));
    }

    let sql = format!(
        "UPDATE voice_settings SET {} WHERE owner_id = ?",
        updates.join(", ")
    );
    values.push(Box::new(owner_id.to_string()));

    let param_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|b| b.as_ref()).collect();
    conn.execute(&sql, param_refs.as_slice())?;

    get_settings(conn, owner_id)?
        .ok_or_else(|| SyncError::not_found("voice settings", owner_id.to_string()))
}

/// Insert one voice command, stamping the watermark
pub fn create_command(
    conn: &Connection,
    owner_id: &str,
    input: &NewVoiceCommand,
) -> Result<VoiceCommand> {
    input.validate()?;

    let now = Utc::now();
    let now_str = now.to_rfc3339();
    let executed_at = input.executed_at.unwrap_or(now).to_rfc3339();
    let context_json = input
        .context
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO voice_commands
            (owner_id, session_id, command, transcription, confidence, intent,
             response, executed_at, response_time_ms, successful, error_message,
             context, created_at, updated_at, last_synced_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            owner_id,
            input.session_id,
            input.command,
            input.transcription,
            input.confidence,
            input.intent,
            input.response,
            executed_at,
            input.response_time,
            input.successful.unwrap_or(true),
            input.error_message,
            context_json,
            now_str,
            now_str,
            now_str,
        ],
    )?;

    let id = conn.last_insert_rowid();
    get_command(conn, owner_id, id)?
        .ok_or_else(|| SyncError::not_found("voice command", id.to_string()))
}

/// Get a command by id, scoped to the owner
pub fn get_command(conn: &Connection, owner_id: &str, id: ItemId) -> Result<Option<VoiceCommand>> {
    let sql = format!(
        "SELECT {} FROM voice_commands WHERE owner_id = ? AND id = ?",
        COMMAND_COLUMNS
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    Ok(stmt
        .query_row(params![owner_id, id], command_from_row)
        .optional()?)
}

/// Apply a sparse patch to a voice command
pub fn update_command(
    conn: &Connection,
    owner_id: &str,
    patch: &VoiceCommandPatch,
) -> Result<VoiceCommand> {
    patch.validate()?;

    let now = Utc::now().to_rfc3339();
    let mut updates = vec![
        "updated_at = ?".to_string(),
        "last_synced_at = ?".to_string(),
    ];
    let mut values: Vec<Box<dyn rusqlite::ToSql>> =
        vec![Box::new(now.clone()), Box::new(now)];

    if let Some(ref intent) = patch.intent {
        updates.push("intent = ?".to_string());
        values.push(Box::new(intent.clone()));
    }
    if let Some(ref response) = patch.response {
        updates.push("response = ?".to_string());
        values.push(Box::new(response.clone()));
    }
    if let Some(response_time) = patch.response_time {
        updates.push("response_time_ms = ?".to_string());
        values.push(Box::new(response_time));
    }
    if let Some(successful) = patch.successful {
        updates.push("successful = ?".to_string());
        values.push(Box::new(successful));
    }
    if let Some(ref error_message) = patch.error_message {
        updates.push("error_message = ?".to_string());
        values.push(Box::new(error_message.clone()));
    }
    if let Some(ref context) = patch.context {
        updates.push("context = ?".to_string());
        values.push(Box::new(serde_json::to_string(context)?));
    }

    let sql = format!(
        "UPDATE voice_commands SET {} WHERE owner_id = ? AND id = ?",
        updates.join(", ")
    );
    values.push(Box::new(owner_id.to_string()));
    values.push(Box::new(patch.id));

    let param_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|b| b.as_ref()).collect();
    let affected = conn.execute(&sql, param_refs.as_slice())?;

    if affected == 0 {
        return Err(SyncError::not_found("voice command", patch.id.to_string()));
    }

    get_command(conn, owner_id, patch.id)?
        .ok_or_else(|| SyncError::not_found("voice command", patch.id.to_string()))
}

/// List voice commands with filters, watermark, and pagination
pub fn list_commands(
    conn: &Connection,
    owner_id: &str,
    filter: &CommandFilter,
    limit: i64,
    offset: i64,
) -> Result<(Vec<VoiceCommand>, i64)> {
    let mut conditions = vec!["owner_id = ?".to_string()];
    let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(owner_id.to_string())];

    if let Some(ref session_id) = filter.session_id {
        conditions.push("session_id = ?".to_string());
        params_vec.push(Box::new(session_id.clone()));
    }
    if let Some(successful) = filter.successful {
        conditions.push("successful = ?".to_string());
        params_vec.push(Box::new(successful));
    }
    if let Some(after) = filter.executed_after {
        conditions.push("executed_at >= ?".to_string());
        params_vec.push(Box::new(after.to_rfc3339()));
    }
    if let Some(before) = filter.executed_before {
        conditions.push("executed_at <= ?".to_string());
        params_vec.push(Box::new(before.to_rfc3339()));
    }
    if let Some(since) = filter.since {
        conditions.push("last_synced_at > ?".to_string());
        params_vec.push(Box::new(since.to_rfc3339()));
    }

    let where_clause = conditions.join(" AND ");

    let total: i64 = {
        let sql = format!("SELECT COUNT(*) FROM voice_commands WHERE {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|b| b.as_ref()).collect();
        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))?
    };

    let mut sql = format!(
        "SELECT {} FROM voice_commands WHERE {} ORDER BY executed_at DESC, id DESC",
        COMMAND_COLUMNS, where_clause
    );
    push_window(&mut sql, &mut params_vec, limit, offset);

    let param_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let commands = stmt
        .query_map(param_refs.as_slice(), command_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok((commands, total))
}

/// Delete commands by id, session, or age; returns the number removed
///
/// Idempotent: zero matches is a count of zero, not an error.
pub fn delete_commands(
    conn: &Connection,
    owner_id: &str,
    selector: &CommandSelector,
) -> Result<i64> {
    let deleted = match selector {
        CommandSelector::ById(id) => conn.execute(
            "DELETE FROM voice_commands WHERE owner_id = ? AND id = ?",
            params![owner_id, id],
        )?,
        CommandSelector::BySession(session_id) => conn.execute(
            "DELETE FROM voice_commands WHERE owner_id = ? AND session_id = ?",
            params![owner_id, session_id],
        )?,
        CommandSelector::OlderThan(cutoff) => conn.execute(
            "DELETE FROM voice_commands WHERE owner_id = ? AND executed_at < ?",
            params![owner_id, cutoff.to_rfc3339()],
        )?,
    };
    Ok(deleted as i64)
}
