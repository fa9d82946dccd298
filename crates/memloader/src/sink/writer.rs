//! Encodes records and writes them to their store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tracing::{info, warn};

use memloader_core::emit;
use memloader_core::metrics::events::{StoreWrite, StoreWriteCompleted, WriteStatus};

use super::traits::Store;
use crate::error::EncodingError;
use crate::record::{CompositeKey, ProtobufEncoder, Record, RecordEncoder};

/// Writes one record per call. In dry-run mode no store is contacted.
pub struct StoreWriter {
    encoder: Box<dyn RecordEncoder>,
    dry_run: bool,
    dry_run_writes: AtomicU64,
}

impl StoreWriter {
    pub fn new(encoder: Box<dyn RecordEncoder>, dry_run: bool) -> Self {
        Self {
            encoder,
            dry_run,
            dry_run_writes: AtomicU64::new(0),
        }
    }

    /// Writer using the `UserApps` protobuf encoding.
    pub fn protobuf(dry_run: bool) -> Self {
        Self::new(Box::new(ProtobufEncoder), dry_run)
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Writes that were logged instead of sent.
    pub fn dry_run_writes(&self) -> u64 {
        self.dry_run_writes.load(Ordering::Relaxed)
    }

    /// Encode `record` and put it under `key`.
    ///
    /// Returns `Ok(false)` when the store refused or failed the write; that
    /// failure is logged here. Encoding failures are returned to the caller.
    pub async fn write(
        &self,
        store: &dyn Store,
        key: &CompositeKey,
        record: &Record,
    ) -> Result<bool, EncodingError> {
        let value = self.encoder.encode(key, record)?;

        if self.dry_run {
            let decoded = self.encoder.describe(key, &value)?;
            info!(%key, value = %decoded, "Dry run, skipping store write");
            self.dry_run_writes.fetch_add(1, Ordering::Relaxed);
            emit!(StoreWrite {
                device_type: record.device_type.clone(),
                status: WriteStatus::DryRun,
            });
            return Ok(true);
        }

        let started = Instant::now();
        let value_len = value.len();
        match store.put(key.as_str(), value).await {
            Ok(()) => {
                emit!(StoreWriteCompleted {
                    device_type: record.device_type.clone(),
                    duration: started.elapsed(),
                });
                emit!(StoreWrite {
                    device_type: record.device_type.clone(),
                    status: WriteStatus::Stored,
                });
                Ok(true)
            }
            Err(e) => {
                warn!(
                    %key,
                    store = store.address(),
                    bytes = value_len,
                    error = %e,
                    "Cannot write to store"
                );
                emit!(StoreWrite {
                    device_type: record.device_type.clone(),
                    status: WriteStatus::Failed,
                });
                Ok(false)
            }
        }
    }
}
