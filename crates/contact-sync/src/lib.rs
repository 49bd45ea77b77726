//! # Contact Sync
//!
//! Runs a [`contact_store::ContactStore`] as a service: live events in, backfill scans over
//! a [`ChatDirectory`], snapshots out.
//!
//! ## Flow
//!
//! ```text
//! host event loop ──> ContactService::ingest(LiveEvent)
//!                          │
//! ChatDirectory ──> BackfillScanner (fetch unlocked, merge locked)
//!                          │
//!                          ├──> ContactStore (single tokio Mutex)
//!                          │
//!                          └──> SnapshotWriter (one task, coalesced writes)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use contact_sync::{ContactService, FixtureDirectory, LiveEvent, SyncConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = ContactService::new(SyncConfig::default())?;
//!     service.initialize(Arc::new(FixtureDirectory::default())).await?;
//!
//!     let event: LiveEvent = serde_json::from_str(
//!         r#"{"kind":"message","chatId":"628111@s.whatsapp.net","pushName":"Ann"}"#,
//!     )?;
//!     service.ingest(event).await?;
//!
//!     println!("{}", service.resolve_display_name("628111@s.whatsapp.net", "Unknown").await?);
//!     service.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod directory;
mod error;
mod events;
mod scanner;
mod service;

pub use config::{ScanOptions, SyncConfig};
pub use directory::{ChatDirectory, DirectoryError, FixtureChat, FixtureDirectory, RosterEntry};
pub use error::{Result, SyncError};
pub use events::{ContactUpdate, LiveEvent, MessageNotice};
pub use scanner::{BackfillScanner, ScanReport};
pub use service::ContactService;
