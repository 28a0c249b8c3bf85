//! User account management

use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// User identifier; doubles as the `owner_id` on every synced entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Create a new random user ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user
    pub fn new(username: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            username: username.into(),
            display_name: None,
            email: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;
    Ok(User {
        id: UserId::from_string(row.get::<_, String>(0)?),
        username: row.get(1)?,
        display_name: row.get(2)?,
        email: row.get(3)?,
        is_active: row.get(4)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        updated_at: DateTime::parse_from_rfc3339(&updated_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

const USER_COLUMNS: &str =
    "id, username, display_name, email, is_active, created_at, updated_at";

/// User management operations
pub struct UserManager<'a> {
    conn: &'a Connection,
}

impl<'a> UserManager<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a new user, optionally with a password
    pub fn create_user(&self, user: &User, password: Option<&str>) -> Result<()> {
        let password_hash = password.map(hash_password);

        self.conn.execute(
            "INSERT INTO users (id, username, display_name, email, password_hash, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user.id.as_str(),
                user.username,
                user.display_name,
                user.email,
                password_hash,
                user.is_active,
                user.created_at.to_rfc3339(),
                user.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get user by ID
    pub fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![id.as_str()], user_from_row)
            .optional()?)
    }

    /// Get user by username
    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![username], user_from_row)
            .optional()?)
    }

    /// Verify a username/password pair, returning the user on success
    pub fn verify_password(&self, username: &str, password: &str) -> Result<Option<User>> {
        let result: Option<(String, Option<String>)> = self
            .conn
            .query_row(
                "SELECT id, password_hash FROM users WHERE username = ?1 AND is_active = 1",
                params![username],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        if let Some((id, Some(stored_hash))) = result {
            if hash_password(password) == stored_hash {
                return self.get_user(&UserId::from_string(id));
            }
        }
        Ok(None)
    }

    /// Deactivate a user; their tokens stop validating immediately
    pub fn deactivate_user(&self, id: &UserId) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE users SET is_active = 0, updated_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id.as_str()],
        )?;
        Ok(updated > 0)
    }

    /// List users
    pub fn list_users(&self, include_inactive: bool) -> Result<Vec<User>> {
        let sql = if include_inactive {
            format!(
                "SELECT {} FROM users ORDER BY created_at DESC",
                USER_COLUMNS
            )
        } else {
            format!(
                "SELECT {} FROM users WHERE is_active = 1 ORDER BY created_at DESC",
                USER_COLUMNS
            )
        };

        let mut stmt = self.conn.prepare(&sql)?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }
}

/// Hash a password using SHA-256 (swap for argon2 before exposing signup
/// to untrusted networks; the CLI is the only issuer today)
fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::init_auth_tables;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_auth_tables(&conn).unwrap();
        conn
    }

    #[test]
    fn test_create_and_get_user() {
        let conn = setup_db();
        let manager = UserManager::new(&conn);

        let user = User::new("maya")
            .with_display_name("Maya")
            .with_email("maya@example.com");
        manager.create_user(&user, Some("password123")).unwrap();

        let fetched = manager.get_user(&user.id).unwrap().unwrap();
        assert_eq!(fetched.username, "maya");
        assert_eq!(fetched.email.as_deref(), Some("maya@example.com"));
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let conn = setup_db();
        let manager = UserManager::new(&conn);

        manager.create_user(&User::new("maya"), None).unwrap();
        assert!(manager.create_user(&User::new("maya"), None).is_err());
    }

    #[test]
    fn test_verify_password() {
        let conn = setup_db();
        let manager = UserManager::new(&conn);

        let user = User::new("maya");
        manager.create_user(&user, Some("secret123")).unwrap();

        assert!(manager.verify_password("maya", "secret123").unwrap().is_some());
        assert!(manager.verify_password("maya", "nope").unwrap().is_none());
    }

    #[test]
    fn test_deactivated_user_fails_password_check() {
        let conn = setup_db();
        let manager = UserManager::new(&conn);

        let user = User::new("maya");
        manager.create_user(&user, Some("secret123")).unwrap();
        manager.deactivate_user(&user.id).unwrap();

        assert!(manager.verify_password("maya", "secret123").unwrap().is_none());
    }

    #[test]
    fn test_list_users_filters_inactive() {
        let conn = setup_db();
        let manager = UserManager::new(&conn);

        let active = User::new("active");
        let inactive = User::new("inactive");
        manager.create_user(&active, None).unwrap();
        manager.create_user(&inactive, None).unwrap();
        manager.deactivate_user(&inactive.id).unwrap();

        assert_eq!(manager.list_users(false).unwrap().len(), 1);
        assert_eq!(manager.list_users(true).unwrap().len(), 2);
    }
}
