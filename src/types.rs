//! Core types for StudySync
//!
//! Every synchronized entity carries the same sync envelope fields on top of
//! its family payload: an owner, a stable identifier, audit timestamps, and
//! the `last_synced_at` watermark stamped by the server on every write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Server-assigned identifier for rowid-keyed entities
pub type ItemId = i64;

/// Default page size when the client omits `limit`
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

/// Hard ceiling on `limit`; larger requests are clamped, not rejected
pub const MAX_PAGE_LIMIT: u32 = 500;

/// Hard ceiling on items per batch write request
pub const MAX_BATCH_ITEMS: usize = 500;

pub const MAX_TITLE_LENGTH: usize = 200;
pub const MAX_SUBJECT_LENGTH: usize = 100;
pub const MAX_DESCRIPTION_LENGTH: usize = 1000;
pub const MAX_SUMMARY_LENGTH: usize = 1000;
pub const MAX_TAG_LENGTH: usize = 50;
pub const MAX_CONTENT_LENGTH: usize = 10_000;
pub const MAX_COMMAND_LENGTH: usize = 500;
pub const MAX_TRANSCRIPTION_LENGTH: usize = 1000;
pub const MAX_INTENT_LENGTH: usize = 100;
pub const MAX_RESPONSE_LENGTH: usize = 2000;
pub const MAX_ERROR_MESSAGE_LENGTH: usize = 500;
pub const MAX_DURATION_MINUTES: i64 = 1440;

// ---------------------------------------------------------------------------
// Storage configuration
// ---------------------------------------------------------------------------

/// Storage mode controlling SQLite journaling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageMode {
    /// WAL journaling for local disks
    Local,
    /// DELETE journaling for cloud-synced folders
    CloudSafe,
}

impl std::str::FromStr for StorageMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(StorageMode::Local),
            "cloud-safe" | "cloudsafe" => Ok(StorageMode::CloudSafe),
            _ => Err(format!("Unknown storage mode: {}", s)),
        }
    }
}

/// Storage engine configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Path to the SQLite database file (":memory:" for tests)
    pub db_path: String,
    /// Journaling mode
    pub storage_mode: StorageMode,
}

impl StorageConfig {
    pub fn in_memory() -> Self {
        Self {
            db_path: ":memory:".to_string(),
            storage_mode: StorageMode::Local,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared enums
// ---------------------------------------------------------------------------

/// Who produced a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            _ => Err(format!("Unknown message role: {}", s)),
        }
    }
}

/// Schedule item priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    /// Rank used for ORDER BY (higher sorts first)
    pub fn rank(&self) -> i64 {
        match self {
            Priority::Low => 0,
            Priority::Medium => 1,
            Priority::High => 2,
            Priority::Urgent => 3,
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

/// Schedule item lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ItemStatus {
    #[default]
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::InProgress => "in-progress",
            ItemStatus::Completed => "completed",
            ItemStatus::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ItemStatus::Pending),
            "in-progress" => Ok(ItemStatus::InProgress),
            "completed" => Ok(ItemStatus::Completed),
            "cancelled" => Ok(ItemStatus::Cancelled),
            _ => Err(format!("Unknown status: {}", s)),
        }
    }
}

/// Question difficulty attached to assistant messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Recurrence cadence for repeating schedule items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceKind {
    Daily,
    Weekly,
    Monthly,
}

// ---------------------------------------------------------------------------
// Chat family
// ---------------------------------------------------------------------------

/// A chat tutoring session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: ItemId,
    pub owner_id: String,
    /// Client-chosen stable identifier, unique across the collection
    pub session_id: String,
    pub title: Option<String>,
    pub subject: Option<String>,
    #[serde(default)]
    pub message_count: i64,
    pub started_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_tokens: i64,
    pub summary: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Sync watermark, server-stamped on every write
    pub last_synced_at: DateTime<Utc>,
}

/// Token accounting for a chat message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub input: i64,
    #[serde(default)]
    pub output: i64,
    #[serde(default)]
    pub total: i64,
}

/// An action item suggested by the assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    pub estimated_time: Option<i64>,
    pub category: String,
}

/// Assistant-side metadata attached to a chat message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    pub subject: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub time_available: Option<i64>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub action_items: Vec<ActionItem>,
    pub confidence: Option<f64>,
    pub response_time: Option<i64>,
}

/// A single chat message within a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: ItemId,
    pub owner_id: String,
    pub session_id: String,
    /// Client-chosen stable identifier, unique across the collection
    pub message_id: String,
    #[serde(rename = "type")]
    pub role: MessageRole,
    pub content: String,
    pub metadata: Option<MessageMetadata>,
    pub tokens: Option<TokenUsage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
}

/// Payload for creating or replacing a chat session
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChatSession {
    pub session_id: String,
    pub title: Option<String>,
    pub subject: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub total_tokens: Option<i64>,
    pub summary: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewChatSession {
    pub fn validate(&self) -> Result<()> {
        if self.session_id.trim().is_empty() {
            return Err(SyncError::validation("Session ID is required"));
        }
        check_len("Title", self.title.as_deref(), MAX_TITLE_LENGTH)?;
        check_len("Subject", self.subject.as_deref(), MAX_SUBJECT_LENGTH)?;
        check_len("Summary", self.summary.as_deref(), MAX_SUMMARY_LENGTH)?;
        check_tags(&self.tags)?;
        if self.total_tokens.is_some_and(|t| t < 0) {
            return Err(SyncError::validation("Total tokens cannot be negative"));
        }
        Ok(())
    }
}

/// Payload for creating a chat message (session comes from the batch)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChatMessage {
    pub message_id: String,
    #[serde(rename = "type")]
    pub role: MessageRole,
    pub content: String,
    pub metadata: Option<MessageMetadata>,
    pub tokens: Option<TokenUsage>,
}

impl NewChatMessage {
    pub fn validate(&self) -> Result<()> {
        if self.message_id.trim().is_empty() {
            return Err(SyncError::validation("Message ID is required"));
        }
        if self.content.is_empty() {
            return Err(SyncError::validation("Content is required"));
        }
        if self.content.chars().count() > MAX_CONTENT_LENGTH {
            return Err(SyncError::validation(format!(
                "Content cannot exceed {} characters",
                MAX_CONTENT_LENGTH
            )));
        }
        if let Some(ref meta) = self.metadata {
            if meta.confidence.is_some_and(|c| !(0.0..=1.0).contains(&c)) {
                return Err(SyncError::validation("Confidence must be between 0 and 1"));
            }
            if meta.time_available.is_some_and(|t| t < 1) {
                return Err(SyncError::validation(
                    "Time available must be at least 1 minute",
                ));
            }
        }
        if let Some(ref tokens) = self.tokens {
            if tokens.input < 0 || tokens.output < 0 || tokens.total < 0 {
                return Err(SyncError::validation("Token count cannot be negative"));
            }
        }
        Ok(())
    }
}

/// Sparse update for a chat session; absent fields keep their stored value
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSessionPatch {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub ended_at: Option<DateTime<Utc>>,
    pub total_tokens: Option<i64>,
    pub summary: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl ChatSessionPatch {
    pub fn validate(&self) -> Result<()> {
        check_len("Title", self.title.as_deref(), MAX_TITLE_LENGTH)?;
        check_len("Subject", self.subject.as_deref(), MAX_SUBJECT_LENGTH)?;
        check_len("Summary", self.summary.as_deref(), MAX_SUMMARY_LENGTH)?;
        if let Some(ref tags) = self.tags {
            check_tags(tags)?;
        }
        if self.total_tokens.is_some_and(|t| t < 0) {
            return Err(SyncError::validation("Total tokens cannot be negative"));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.subject.is_none()
            && self.ended_at.is_none()
            && self.total_tokens.is_none()
            && self.summary.is_none()
            && self.tags.is_none()
    }
}

/// Sparse update for a chat message
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessagePatch {
    pub content: Option<String>,
    pub metadata: Option<MessageMetadata>,
    pub tokens: Option<TokenUsage>,
}

impl ChatMessagePatch {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref content) = self.content {
            if content.is_empty() {
                return Err(SyncError::validation("Content is required"));
            }
            if content.chars().count() > MAX_CONTENT_LENGTH {
                return Err(SyncError::validation(format!(
                    "Content cannot exceed {} characters",
                    MAX_CONTENT_LENGTH
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Schedule family
// ---------------------------------------------------------------------------

/// Reminder settings on a schedule item
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    #[serde(default)]
    pub enabled: bool,
    pub time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notified: bool,
}

/// Recurrence settings on a schedule item
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recurrence {
    #[serde(rename = "type")]
    pub kind: RecurrenceKind,
    pub interval: i64,
    pub end_date: Option<DateTime<Utc>>,
}

/// A task or study block on the user's schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleItem {
    pub id: ItemId,
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Duration in minutes
    pub duration: Option<i64>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    pub reminder: Option<Reminder>,
    pub recurrence: Option<Recurrence>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
}

impl ScheduleItem {
    /// Whether the item is past due and still open
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.due_date.is_some_and(|d| d < now) && self.status != ItemStatus::Completed
    }
}

/// Payload for creating a schedule item
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewScheduleItem {
    pub title: String,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: Option<i64>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    pub reminder: Option<Reminder>,
    pub recurrence: Option<Recurrence>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl NewScheduleItem {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(SyncError::validation("Title is required"));
        }
        check_len("Title", Some(&self.title), MAX_TITLE_LENGTH)?;
        check_len(
            "Description",
            self.description.as_deref(),
            MAX_DESCRIPTION_LENGTH,
        )?;
        check_len("Subject", self.subject.as_deref(), MAX_SUBJECT_LENGTH)?;
        check_duration(self.duration)?;
        check_tags(&self.tags)?;
        if let Some(ref rec) = self.recurrence {
            if rec.interval < 1 {
                return Err(SyncError::validation("Interval must be at least 1"));
            }
        }
        Ok(())
    }
}

/// Sparse update for a schedule item, addressed by `id`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleItemPatch {
    pub id: ItemId,
    pub title: Option<String>,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: Option<i64>,
    pub priority: Option<Priority>,
    pub status: Option<ItemStatus>,
    pub tags: Option<Vec<String>>,
    pub reminder: Option<Reminder>,
    pub recurrence: Option<Recurrence>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ScheduleItemPatch {
    pub fn validate(&self) -> Result<()> {
        if let Some(ref title) = self.title {
            if title.trim().is_empty() {
                return Err(SyncError::validation("Title is required"));
            }
        }
        check_len("Title", self.title.as_deref(), MAX_TITLE_LENGTH)?;
        check_len(
            "Description",
            self.description.as_deref(),
            MAX_DESCRIPTION_LENGTH,
        )?;
        check_len("Subject", self.subject.as_deref(), MAX_SUBJECT_LENGTH)?;
        check_duration(self.duration)?;
        if let Some(ref tags) = self.tags {
            check_tags(tags)?;
        }
        if let Some(ref rec) = self.recurrence {
            if rec.interval < 1 {
                return Err(SyncError::validation("Interval must be at least 1"));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Voice family
// ---------------------------------------------------------------------------

/// Per-user voice assistant settings (singleton per owner)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceSettings {
    pub owner_id: String,
    pub enabled: bool,
    pub volume: f64,
    pub rate: i64,
    pub voice: Option<String>,
    pub language: String,
    pub activation_keyword: String,
    pub wake_word_sensitivity: f64,
    pub noise_reduction: bool,
    pub auto_transcription: bool,
    pub confidence_threshold: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
}

impl VoiceSettings {
    /// Defaults applied when an owner syncs voice data for the first time
    pub fn defaults(owner_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            enabled: true,
            volume: 0.8,
            rate: 150,
            voice: None,
            language: "en-US".to_string(),
            activation_keyword: "hey study helper".to_string(),
            wake_word_sensitivity: 0.7,
            noise_reduction: true,
            auto_transcription: true,
            confidence_threshold: 0.4,
            created_at: now,
            updated_at: now,
            last_synced_at: now,
        }
    }
}

/// Sparse upsert for voice settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceSettingsPatch {
    pub enabled: Option<bool>,
    pub volume: Option<f64>,
    pub rate: Option<i64>,
    pub voice: Option<String>,
    pub language: Option<String>,
    pub activation_keyword: Option<String>,
    pub wake_word_sensitivity: Option<f64>,
    pub noise_reduction: Option<bool>,
    pub auto_transcription: Option<bool>,
    pub confidence_threshold: Option<f64>,
}

impl VoiceSettingsPatch {
    pub fn validate(&self) -> Result<()> {
        check_unit_range("Volume", self.volume)?;
        check_unit_range("Wake word sensitivity", self.wake_word_sensitivity)?;
        check_unit_range("Confidence threshold", self.confidence_threshold)?;
        if self.rate.is_some_and(|r| !(50..=300).contains(&r)) {
            return Err(SyncError::validation("Rate must be between 50 and 300"));
        }
        if let Some(ref keyword) = self.activation_keyword {
            if keyword.trim().is_empty() {
                return Err(SyncError::validation("Activation keyword is required"));
            }
        }
        if let Some(ref language) = self.language {
            if language.trim().is_empty() {
                return Err(SyncError::validation("Language is required"));
            }
        }
        Ok(())
    }
}

/// Client context captured alongside a voice command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceContext {
    pub active_app: Option<String>,
    pub focus_mode: Option<bool>,
    pub current_task: Option<String>,
}

/// A recognized voice command and its outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceCommand {
    pub id: ItemId,
    pub owner_id: String,
    pub session_id: Option<String>,
    pub command: String,
    pub transcription: String,
    pub confidence: f64,
    pub intent: Option<String>,
    pub response: Option<String>,
    pub executed_at: DateTime<Utc>,
    pub response_time: Option<i64>,
    pub successful: bool,
    pub error_message: Option<String>,
    pub context: Option<VoiceContext>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
}

/// Payload for recording a voice command
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVoiceCommand {
    pub session_id: Option<String>,
    pub command: String,
    pub transcription: String,
    pub confidence: f64,
    pub intent: Option<String>,
    pub response: Option<String>,
    pub executed_at: Option<DateTime<Utc>>,
    pub response_time: Option<i64>,
    pub successful: Option<bool>,
    pub error_message: Option<String>,
    pub context: Option<VoiceContext>,
}

impl NewVoiceCommand {
    pub fn validate(&self) -> Result<()> {
        if self.command.trim().is_empty() {
            return Err(SyncError::validation("Command is required"));
        }
        check_len("Command", Some(&self.command), MAX_COMMAND_LENGTH)?;
        if self.transcription.trim().is_empty() {
            return Err(SyncError::validation("Transcription is required"));
        }
        check_len(
            "Transcription",
            Some(&self.transcription),
            MAX_TRANSCRIPTION_LENGTH,
        )?;
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(SyncError::validation("Confidence must be between 0 and 1"));
        }
        check_len("Intent", self.intent.as_deref(), MAX_INTENT_LENGTH)?;
        check_len("Response", self.response.as_deref(), MAX_RESPONSE_LENGTH)?;
        check_len(
            "Error message",
            self.error_message.as_deref(),
            MAX_ERROR_MESSAGE_LENGTH,
        )?;
        if self.response_time.is_some_and(|t| t < 0) {
            return Err(SyncError::validation("Response time cannot be negative"));
        }
        Ok(())
    }
}

/// Sparse update for a voice command, addressed by `id`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceCommandPatch {
    pub id: ItemId,
    pub intent: Option<String>,
    pub response: Option<String>,
    pub response_time: Option<i64>,
    pub successful: Option<bool>,
    pub error_message: Option<String>,
    pub context: Option<VoiceContext>,
}

impl VoiceCommandPatch {
    pub fn validate(&self) -> Result<()> {
        check_len("Intent", self.intent.as_deref(), MAX_INTENT_LENGTH)?;
        check_len("Response", self.response.as_deref(), MAX_RESPONSE_LENGTH)?;
        check_len(
            "Error message",
            self.error_message.as_deref(),
            MAX_ERROR_MESSAGE_LENGTH,
        )?;
        if self.response_time.is_some_and(|t| t < 0) {
            return Err(SyncError::validation("Response time cannot be negative"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Query inputs
// ---------------------------------------------------------------------------

/// Pagination window requested by the client
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageRequest {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl PageRequest {
    /// Effective (limit, offset) with default and ceiling applied
    pub fn effective(&self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT);
        (i64::from(limit), i64::from(self.offset.unwrap_or(0)))
    }
}

/// Filters for listing chat sessions
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub subject: Option<String>,
    pub started_after: Option<DateTime<Utc>>,
    pub started_before: Option<DateTime<Utc>>,
    /// Watermark: only sessions with `last_synced_at > since`
    pub since: Option<DateTime<Utc>>,
}

/// Filters for listing chat messages
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    pub session_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
}

/// Filters for listing schedule items
#[derive(Debug, Clone, Default)]
pub struct ScheduleFilter {
    pub status: Option<ItemStatus>,
    pub priority: Option<Priority>,
    pub subject: Option<String>,
    pub due_after: Option<DateTime<Utc>>,
    pub due_before: Option<DateTime<Utc>>,
    pub since: Option<DateTime<Utc>>,
}

/// Filters for listing voice commands
#[derive(Debug, Clone, Default)]
pub struct CommandFilter {
    pub session_id: Option<String>,
    pub successful: Option<bool>,
    pub executed_after: Option<DateTime<Utc>>,
    pub executed_before: Option<DateTime<Utc>>,
    pub since: Option<DateTime<Utc>>,
}

/// Delete selector for voice commands; exactly one should be set
#[derive(Debug, Clone)]
pub enum CommandSelector {
    ById(ItemId),
    BySession(String),
    OlderThan(DateTime<Utc>),
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

fn check_len(field: &str, value: Option<&str>, max: usize) -> Result<()> {
    if let Some(v) = value {
        if v.chars().count() > max {
            return Err(SyncError::validation(format!(
                "{} cannot exceed {} characters",
                field, max
            )));
        }
    }
    Ok(())
}

fn check_tags(tags: &[String]) -> Result<()> {
    for tag in tags {
        if tag.chars().count() > MAX_TAG_LENGTH {
            return Err(SyncError::validation(format!(
                "Tag cannot exceed {} characters",
                MAX_TAG_LENGTH
            )));
        }
    }
    Ok(())
}

fn check_duration(duration: Option<i64>) -> Result<()> {
    if let Some(d) = duration {
        if d < 1 {
            return Err(SyncError::validation("Duration must be at least 1 minute"));
        }
        if d > MAX_DURATION_MINUTES {
            return Err(SyncError::validation("Duration cannot exceed 24 hours"));
        }
    }
    Ok(())
}

fn check_unit_range(field: &str, value: Option<f64>) -> Result<()> {
    if value.is_some_and(|v| !(0.0..=1.0).contains(&v)) {
        return Err(SyncError::validation(format!(
            "{} must be between 0 and 1",
            field
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_defaults() {
        let page = PageRequest::default();
        assert_eq!(page.effective(), (50, 0));
    }

    #[test]
    fn test_page_request_clamps_limit() {
        let page = PageRequest {
            limit: Some(10_000),
            offset: Some(20),
        };
        assert_eq!(page.effective(), (i64::from(MAX_PAGE_LIMIT), 20));
    }

    #[test]
    fn test_priority_round_trip() {
        for p in [Priority::Low, Priority::Medium, Priority::High, Priority::Urgent] {
            assert_eq!(p.as_str().parse::<Priority>().unwrap(), p);
        }
        assert!("critical".parse::<Priority>().is_err());
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&ItemStatus::InProgress).unwrap();
        assert_eq!(json, r#""in-progress""#);
        assert_eq!("in-progress".parse::<ItemStatus>().unwrap(), ItemStatus::InProgress);
    }

    #[test]
    fn test_schedule_item_validation() {
        let mut item = NewScheduleItem {
            title: "Read chapter 4".to_string(),
            description: None,
            subject: None,
            due_date: None,
            start_time: None,
            end_time: None,
            duration: Some(45),
            priority: Priority::High,
            status: ItemStatus::Pending,
            tags: vec![],
            reminder: None,
            recurrence: None,
            completed_at: None,
        };
        assert!(item.validate().is_ok());

        item.duration = Some(0);
        assert!(item.validate().is_err());

        item.duration = Some(2000);
        assert!(item.validate().is_err());

        item.duration = None;
        item.title = "x".repeat(MAX_TITLE_LENGTH + 1);
        assert!(item.validate().is_err());
    }

    #[test]
    fn test_voice_command_confidence_bounds() {
        let mut cmd = NewVoiceCommand {
            session_id: None,
            command: "start focus mode".to_string(),
            transcription: "start focus mode".to_string(),
            confidence: 0.92,
            intent: None,
            response: None,
            executed_at: None,
            response_time: None,
            successful: None,
            error_message: None,
            context: None,
        };
        assert!(cmd.validate().is_ok());

        cmd.confidence = 1.2;
        assert!(cmd.validate().is_err());
    }

    #[test]
    fn test_voice_settings_defaults() {
        let now = Utc::now();
        let settings = VoiceSettings::defaults("user-1", now);
        assert!(settings.enabled);
        assert_eq!(settings.rate, 150);
        assert_eq!(settings.activation_keyword, "hey study helper");
        assert_eq!(settings.confidence_threshold, 0.4);
    }

    #[test]
    fn test_voice_settings_patch_ranges() {
        let patch = VoiceSettingsPatch {
            rate: Some(40),
            ..Default::default()
        };
        assert!(patch.validate().is_err());

        let patch = VoiceSettingsPatch {
            volume: Some(0.5),
            rate: Some(200),
            ..Default::default()
        };
        assert!(patch.validate().is_ok());
    }

    #[test]
    fn test_overdue() {
        let now = Utc::now();
        let mut item = ScheduleItem {
            id: 1,
            owner_id: "user-1".to_string(),
            title: "Essay draft".to_string(),
            description: None,
            subject: None,
            due_date: Some(now - chrono::Duration::hours(1)),
            start_time: None,
            end_time: None,
            duration: None,
            priority: Priority::Medium,
            status: ItemStatus::Pending,
            tags: vec![],
            reminder: None,
            recurrence: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
            last_synced_at: now,
        };
        assert!(item.is_overdue(now));

        item.status = ItemStatus::Completed;
        assert!(!item.is_overdue(now));
    }
}
