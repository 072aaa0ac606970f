//! # SyncClip
//!
//! Offline-first clip sharing. Short text snippets are posted from any device
//! and reconciled through a REST store by periodic polling; a local cache keeps
//! the collection usable without a connection.
//!
//! The core is [`engine::SyncEngine`]: it applies every change to the in-memory
//! view immediately, confirms it against a [`remote::RemoteStore`], mirrors
//! confirmed state into a [`cache::LocalCache`] and rolls back on failure.

pub mod cache;
pub mod cli;
pub mod clip;
pub mod config;
pub mod engine;
pub mod notify;
pub mod poller;
pub mod remote;

pub use clip::Clip;
pub use config::Config;
pub use engine::{SyncEngine, SyncError};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
