//! Trait for key-value stores that receive encoded records.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::WriteError;

/// A key-value sink.
///
/// Writes carry no expiration and no flags. Implementations must tolerate
/// concurrent `put` calls when the pipeline runs more than one worker.
#[async_trait]
pub trait Store: Send + Sync {
    /// Store `value` under `key`, overwriting any previous value.
    async fn put(&self, key: &str, value: Bytes) -> Result<(), WriteError>;

    /// Where this store lives (for logging).
    fn address(&self) -> &str;
}
