//! Phrase business rules
//!
//! Every operation validates first and then issues a single store call
//! (update may follow its write with one re-read).

use std::sync::Arc;
use std::time::Instant;

use validator::Validate;

use super::{ListQuery, NewPhrase, Phrase, PhrasePatch};
use crate::config::{ListMode, ListingConfig};
use crate::db::PhraseStore;
use crate::errors::{AppError, Result};
use crate::metrics;

/// Largest offset or count a store is asked for; SQL binds them as BIGINT
pub const MAX_WINDOW: u64 = i64::MAX as u64;

/// Resolved listing window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: u64,
    pub limit: u64,
}

impl ListingConfig {
    /// Turn a caller's query into the window actually read from the store
    pub fn page(&self, query: ListQuery) -> Page {
        match self.mode {
            ListMode::Paged => Page {
                skip: query.skip.unwrap_or(0).min(MAX_WINDOW),
                limit: query
                    .limit
                    .unwrap_or(self.default_limit)
                    .min(self.max_limit)
                    .min(MAX_WINDOW),
            },
            ListMode::Capped => Page {
                skip: 0,
                limit: self.max_limit.min(MAX_WINDOW),
            },
        }
    }
}

/// Create/list/read/update/delete over the phrase collection
#[derive(Clone)]
pub struct PhraseService {
    store: Arc<dyn PhraseStore>,
    listing: ListingConfig,
}

impl PhraseService {
    pub fn new(store: Arc<dyn PhraseStore>, listing: ListingConfig) -> Self {
        Self { store, listing }
    }

    /// Validate and persist a new phrase, returning it as stored
    pub async fn create(&self, input: NewPhrase) -> Result<Phrase> {
        input.validate()?;

        let start = Instant::now();
        let result = self.store.insert(input).await;
        metrics::record_store_op("insert", start.elapsed().as_secs_f64(), result.is_ok());

        let phrase = result?;
        tracing::info!(phrase_id = phrase.id, "Phrase created");
        Ok(phrase)
    }

    /// List phrases in ascending identifier order within the configured window
    pub async fn list(&self, query: ListQuery) -> Result<Vec<Phrase>> {
        let page = self.listing.page(query);
        if page.limit == 0 {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let result = self.store.list(page.skip, page.limit).await;
        metrics::record_store_op("list", start.elapsed().as_secs_f64(), result.is_ok());

        let phrases = result?;
        tracing::debug!(
            skip = page.skip,
            limit = page.limit,
            returned = phrases.len(),
            "Phrases listed"
        );
        Ok(phrases)
    }

    /// Fetch one phrase by identifier
    pub async fn get(&self, id: i64) -> Result<Phrase> {
        let start = Instant::now();
        let result = self.store.find(id).await;
        metrics::record_store_op("find", start.elapsed().as_secs_f64(), result.is_ok());

        result?.ok_or(AppError::PhraseNotFound { id })
    }

    /// Merge the supplied attributes into an existing phrase.
    ///
    /// An empty patch writes nothing and returns the current record.
    pub async fn update(&self, id: i64, patch: PhrasePatch) -> Result<Phrase> {
        patch.validate()?;

        if !patch.is_empty() {
            let start = Instant::now();
            let result = self.store.update(id, &patch).await;
            metrics::record_store_op("update", start.elapsed().as_secs_f64(), result.is_ok());

            let modified = result?;
            if modified == 0 {
                // Unchanged values and unknown ids both land here; the re-read tells them apart.
                tracing::debug!(phrase_id = id, "Update modified nothing");
            } else {
                tracing::info!(phrase_id = id, modified, "Phrase updated");
            }
        }

        self.get(id).await
    }

    /// Remove a phrase; `PhraseNotFound` unless exactly one record went away
    pub async fn delete(&self, id: i64) -> Result<()> {
        let start = Instant::now();
        let result = self.store.delete(id).await;
        metrics::record_store_op("delete", start.elapsed().as_secs_f64(), result.is_ok());

        match result? {
            1 => {
                tracing::info!(phrase_id = id, "Phrase deleted");
                Ok(())
            }
            _ => Err(AppError::PhraseNotFound { id }),
        }
    }

    /// Check the backing store is reachable
    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }
}
