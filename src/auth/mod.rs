//! Owner identity for the sync API
//!
//! The sync core never authenticates anything itself; it consumes an
//! [`AuthContext`] produced by this module's token validation. The owner in
//! that context is the only identity any query or mutation is scoped to.

mod tokens;
mod users;

pub use tokens::{SyncToken, TokenClaims, TokenManager};
pub use users::{User, UserId, UserManager};

use rusqlite::Connection;

use crate::error::Result;

/// Verified owner identity for one request
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub owner_id: String,
}

impl AuthContext {
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner_id
    }
}

impl From<TokenClaims> for AuthContext {
    fn from(claims: TokenClaims) -> Self {
        Self {
            owner_id: claims.user_id.to_string(),
        }
    }
}

/// Initialize auth tables in the database
pub fn init_auth_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT UNIQUE NOT NULL,
            display_name TEXT,
            email TEXT,
            password_hash TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS sync_tokens (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            token_hash TEXT UNIQUE NOT NULL,
            token_prefix TEXT NOT NULL,
            device_name TEXT NOT NULL,
            expires_at TEXT,
            last_used_at TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_sync_tokens_user ON sync_tokens(user_id);
        CREATE INDEX IF NOT EXISTS idx_sync_tokens_prefix ON sync_tokens(token_prefix);
        "#,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_context_from_claims() {
        let claims = TokenClaims {
            user_id: UserId::from_string("user-1"),
            token_id: "t1".to_string(),
        };
        let ctx = AuthContext::from(claims);
        assert_eq!(ctx.owner(), "user-1");
    }

    #[test]
    fn test_init_auth_tables() {
        let conn = Connection::open_in_memory().unwrap();
        init_auth_tables(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"users".to_string()));
        assert!(tables.contains(&"sync_tokens".to_string()));
    }
}
