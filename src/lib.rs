//! StudySync - incremental sync backend
//!
//! Server-side synchronization for study-productivity clients: chat tutor
//! sessions and messages, schedule items, and voice assistant data, stored
//! per owner and synchronized through watermark-filtered reads and
//! best-effort batch writes.

pub mod api;
pub mod auth;
pub mod error;
pub mod storage;
pub mod sync;
pub mod types;

pub use error::{Result, SyncError};
pub use storage::{Storage, StoragePool};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
