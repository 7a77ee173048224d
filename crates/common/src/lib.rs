//! PhraseBank Common Library
//!
//! Shared code for the PhraseBank service including:
//! - Phrase record types, validation, and business rules
//! - Store abstraction with Postgres and in-process backends
//! - Error types and handling
//! - Configuration management
//! - Metrics helpers

pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod phrase;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::PhraseStore;
pub use errors::{AppError, Result};
pub use phrase::{ListQuery, NewPhrase, Phrase, PhrasePatch, PhraseService};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
