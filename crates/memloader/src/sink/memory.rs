//! In-process store used by tests and local experiments.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use super::traits::Store;
use crate::error::WriteError;

/// A `HashMap`-backed store. Can be told to reject every write.
#[derive(Default)]
pub struct MemoryStore {
    name: String,
    values: Mutex<HashMap<String, Bytes>>,
    attempts: AtomicUsize,
    reject_writes: bool,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// A store that answers every write with an error.
    pub fn rejecting(name: impl Into<String>) -> Self {
        Self {
            reject_writes: true,
            ..Self::new(name)
        }
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `put` calls received, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn put(&self, key: &str, value: Bytes) -> Result<(), WriteError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        if self.reject_writes {
            return Err(WriteError::Rejected {
                address: self.name.clone(),
                reply: "SERVER_ERROR rejected".to_string(),
            });
        }
        self.values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string(), value);
        Ok(())
    }

    fn address(&self) -> &str {
        &self.name
    }
}
