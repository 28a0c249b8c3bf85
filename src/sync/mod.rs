//! Incremental sync protocol
//!
//! The protocol every entity family speaks:
//!
//! 1. The client reads with `lastSyncedAt` set to the `sync.timestamp` of
//!    its previous response; the server returns entities whose watermark is
//!    strictly newer, paginated and deterministically ordered.
//! 2. The client pushes creates/updates in batches; each item succeeds or
//!    fails on its own, and each successful write stamps a fresh watermark.
//! 3. Conflicts are resolved by arrival order: the later write overwrites
//!    the matched fields with no version check or merge.

mod batch;
mod envelope;
mod status;

pub use batch::apply_batch;
pub use envelope::{BatchError, BatchOutcome, Page, PageInfo, SyncMeta};
pub use status::{sync_status, LastSync, SyncStatus};
