//! StudySync admin CLI
//!
//! Manages user accounts and device sync tokens against the server's
//! database. The raw token printed by `token create` is shown exactly once.

use clap::{Parser, Subcommand};

use studysync::auth::{TokenManager, User, UserManager};
use studysync::storage::Storage;
use studysync::types::{StorageConfig, StorageMode};

#[derive(Parser, Debug)]
#[command(name = "studysync-cli")]
#[command(about = "StudySync administration")]
struct Args {
    /// Database path
    #[arg(long, env = "STUDYSYNC_DB_PATH", default_value = "data/studysync.db")]
    db_path: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// User account management
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Device sync token management
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand, Debug)]
enum UserAction {
    /// Create a user account
    Create {
        username: String,
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// List user accounts
    List {
        /// Include deactivated accounts
        #[arg(long)]
        all: bool,
    },
    /// Deactivate a user account (tokens stop validating immediately)
    Deactivate { username: String },
}

#[derive(Subcommand, Debug)]
enum TokenAction {
    /// Issue a sync token for a device
    Create {
        username: String,
        /// Device label, e.g. "desktop"
        #[arg(long, default_value = "default")]
        device: String,
        /// Days until expiry (never expires if omitted)
        #[arg(long)]
        expires_days: Option<i64>,
    },
    /// List a user's tokens
    List { username: String },
    /// Revoke a token by ID
    Revoke { id: String },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let storage = Storage::open(StorageConfig {
        db_path: args.db_path,
        storage_mode: StorageMode::Local,
    })?;

    match args.command {
        Command::User { action } => match action {
            UserAction::Create {
                username,
                display_name,
                email,
                password,
            } => {
                storage.with_connection(|conn| {
                    let mut user = User::new(&username);
                    if let Some(name) = display_name {
                        user = user.with_display_name(name);
                    }
                    if let Some(email) = email {
                        user = user.with_email(email);
                    }
                    UserManager::new(conn).create_user(&user, password.as_deref())?;
                    println!("created user {} ({})", user.username, user.id);
                    Ok(())
                })?;
            }
            UserAction::List { all } => {
                storage.with_connection(|conn| {
                    for user in UserManager::new(conn).list_users(all)? {
                        let state = if user.is_active { "active" } else { "inactive" };
                        println!("{}  {}  {}", user.id, user.username, state);
                    }
                    Ok(())
                })?;
            }
            UserAction::Deactivate { username } => {
                storage.with_connection(|conn| {
                    let manager = UserManager::new(conn);
                    match manager.get_user_by_username(&username)? {
                        Some(user) => {
                            manager.deactivate_user(&user.id)?;
                            println!("deactivated {}", username);
                        }
                        None => println!("no such user: {}", username),
                    }
                    Ok(())
                })?;
            }
        },
        Command::Token { action } => match action {
            TokenAction::Create {
                username,
                device,
                expires_days,
            } => {
                storage.with_connection(|conn| {
                    let user = UserManager::new(conn)
                        .get_user_by_username(&username)?
                        .ok_or_else(|| {
                            studysync::SyncError::not_found("user", username.clone())
                        })?;
                    let (token, raw) =
                        TokenManager::new(conn).create_token(&user.id, &device, expires_days)?;
                    println!("token id: {}", token.id);
                    println!("sync token (shown once): {}", raw);
                    Ok(())
                })?;
            }
            TokenAction::List { username } => {
                storage.with_connection(|conn| {
                    let user = UserManager::new(conn)
                        .get_user_by_username(&username)?
                        .ok_or_else(|| {
                            studysync::SyncError::not_found("user", username.clone())
                        })?;
                    for token in TokenManager::new(conn).list_tokens(&user.id)? {
                        let state = if token.is_active { "active" } else { "revoked" };
                        println!(
                            "{}  {}...  {}  {}",
                            token.id, token.token_prefix, token.device_name, state
                        );
                    }
                    Ok(())
                })?;
            }
            TokenAction::Revoke { id } => {
                storage.with_connection(|conn| {
                    if TokenManager::new(conn).revoke(&id)? {
                        println!("revoked {}", id);
                    } else {
                        println!("no such token: {}", id);
                    }
                    Ok(())
                })?;
            }
        },
    }

    Ok(())
}
