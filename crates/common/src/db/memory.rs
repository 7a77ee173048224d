//! In-process phrase store
//!
//! Backs `memory://` URLs. Records live in an ordered map behind an async
//! RwLock, so listing order matches the Postgres repository (ascending id).

use crate::db::PhraseStore;
use crate::errors::{AppError, Result};
use crate::phrase::{NewPhrase, Phrase, PhrasePatch};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryStore {
    phrases: RwLock<BTreeMap<i64, Phrase>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

#[async_trait]
impl PhraseStore for MemoryStore {
    async fn insert(&self, input: NewPhrase) -> Result<Phrase> {
        let mut phrases = self.phrases.write().await;

        let id = match input.id {
            Some(id) if phrases.contains_key(&id) => {
                return Err(AppError::Duplicate {
                    message: format!("phrase {} already exists", id),
                })
            }
            Some(id) => id,
            None => match phrases.keys().next_back() {
                None => 1,
                Some(last) => last.checked_add(1).ok_or_else(|| AppError::Internal {
                    message: "phrase identifier space exhausted".to_string(),
                })?,
            },
        };

        let phrase = input.into_phrase(id);
        phrases.insert(id, phrase.clone());
        Ok(phrase)
    }

    async fn list(&self, skip: u64, limit: u64) -> Result<Vec<Phrase>> {
        let phrases = self.phrases.read().await;
        Ok(phrases
            .values()
            .skip(to_usize(skip))
            .take(to_usize(limit))
            .cloned()
            .collect())
    }

    async fn find(&self, id: i64) -> Result<Option<Phrase>> {
        Ok(self.phrases.read().await.get(&id).cloned())
    }

    async fn update(&self, id: i64, patch: &PhrasePatch) -> Result<u64> {
        let mut phrases = self.phrases.write().await;
        Ok(match phrases.get_mut(&id) {
            Some(phrase) => u64::from(phrase.merge(patch)),
            None => 0,
        })
    }

    async fn delete(&self, id: i64) -> Result<u64> {
        Ok(self.phrases.write().await.remove(&id).map_or(0, |_| 1))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
