//! Sync token management
//!
//! Each client device holds a bearer token; the server stores only its
//! SHA-256 hash. The token resolves to the owning user, which is the sole
//! identity the sync core consumes.

use crate::auth::UserId;
use crate::error::Result;
use chrono::{DateTime, Utc};
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A device sync token (raw value never stored)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncToken {
    pub id: String,
    pub user_id: UserId,
    /// Human label, typically the device name ("desktop", "windows-helper")
    pub device_name: String,
    /// First characters of the raw token, for identification in listings
    pub token_prefix: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Resolved identity of a validated token
#[derive(Debug, Clone)]
pub struct TokenClaims {
    pub user_id: UserId,
    pub token_id: String,
}

/// Sync token operations
pub struct TokenManager<'a> {
    conn: &'a Connection,
}

impl<'a> TokenManager<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Issue a new token for a device
    ///
    /// Returns (token record, raw token). The raw token is only available
    /// here; show it once.
    pub fn create_token(
        &self,
        user_id: &UserId,
        device_name: &str,
        expires_in_days: Option<i64>,
    ) -> Result<(SyncToken, String)> {
        let id = Uuid::new_v4().to_string();
        let raw = generate_token();
        let token_hash = hash_token(&raw);
        let token_prefix = &raw[..12];
        let expires_at = expires_in_days.map(|days| Utc::now() + chrono::Duration::days(days));

        self.conn.execute(
            "INSERT INTO sync_tokens (id, user_id, token_hash, token_prefix, device_name, expires_at, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
            params![
                id,
                user_id.as_str(),
                token_hash,
                token_prefix,
                device_name,
                expires_at.map(|dt| dt.to_rfc3339()),
                Utc::now().to_rfc3339(),
            ],
        )?;

        let token = SyncToken {
            id,
            user_id: user_id.clone(),
            device_name: device_name.to_string(),
            token_prefix: token_prefix.to_string(),
            expires_at,
            last_used_at: None,
            is_active: true,
            created_at: Utc::now(),
        };

        Ok((token, raw))
    }

    /// Validate a raw token, returning its claims if it is active, unexpired,
    /// and belongs to an active user
    pub fn validate(&self, raw: &str) -> Result<Option<TokenClaims>> {
        let token_hash = hash_token(raw);

        let result: Option<(String, String, Option<String>, bool)> = self
            .conn
            .query_row(
                "SELECT t.id, t.user_id, t.expires_at, u.is_active
                 FROM sync_tokens t
                 JOIN users u ON t.user_id = u.id
                 WHERE t.token_hash = ?1 AND t.is_active = 1",
                params![token_hash],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let Some((token_id, user_id, expires_at_str, user_active)) = result else {
            return Ok(None);
        };

        if !user_active {
            return Ok(None);
        }

        if let Some(expires_at) = expires_at_str
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc))
        {
            if Utc::now() > expires_at {
                return Ok(None);
            }
        }

        self.conn.execute(
            "UPDATE sync_tokens SET last_used_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), token_id],
        )?;

        Ok(Some(TokenClaims {
            user_id: UserId::from_string(user_id),
            token_id,
        }))
    }

    /// Revoke a token by ID
    pub fn revoke(&self, id: &str) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE sync_tokens SET is_active = 0 WHERE id = ?1",
            params![id],
        )?;
        Ok(updated > 0)
    }

    /// List tokens for a user
    pub fn list_tokens(&self, user_id: &UserId) -> Result<Vec<SyncToken>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, token_prefix, device_name, expires_at, last_used_at, is_active, created_at
             FROM sync_tokens WHERE user_id = ?1 ORDER BY created_at DESC",
        )?;

        let tokens = stmt
            .query_map(params![user_id.as_str()], |row| {
                Ok(SyncToken {
                    id: row.get(0)?,
                    user_id: UserId::from_string(row.get::<_, String>(1)?),
                    token_prefix: row.get(2)?,
                    device_name: row.get(3)?,
                    expires_at: row
                        .get::<_, Option<String>>(4)?
                        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                        .map(|dt| dt.with_timezone(&Utc)),
                    last_used_at: row
                        .get::<_, Option<String>>(5)?
                        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                        .map(|dt| dt.with_timezone(&Utc)),
                    is_active: row.get(6)?,
                    created_at: DateTime::parse_from_rfc3339(&row.get::<_, String>(7)?)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(tokens)
    }
}

/// Generate a raw sync token
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
    format!("ssk_{}", hex::encode(bytes))
}

/// Hash a token for storage
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
