//! Streaming line reader for input files.
//!
//! Files are opened and decompressed on the blocking pool and handed to the
//! async side in batches over a bounded channel, so at most a few batches of
//! a file are held in memory at once.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use snafu::prelude::*;
use tokio::sync::mpsc;

use memloader_core::emit;
use memloader_core::metrics::events::BytesRead;

use super::compression::{CompressionFormat, LineStream};
use crate::error::{DecompressionSnafu, ReadFileSnafu, SourceError, StreamSnafu};

/// Lines per batch sent to the pipeline.
pub const LINE_BATCH_SIZE: usize = 1024;

const BATCH_CHANNEL_CAPACITY: usize = 4;

/// Decompressed lines with their trailing `\n` removed.
pub type LineBatch = Vec<Vec<u8>>;

/// Open `path` and decompress it with `compression`.
///
/// Failures here mean the file could not be opened at all.
pub fn open_lines(path: &Path, compression: CompressionFormat) -> Result<LineStream, SourceError> {
    let file = File::open(path).context(ReadFileSnafu { path })?;
    let len = file.metadata().context(ReadFileSnafu { path })?.len();
    emit!(BytesRead { bytes: len });

    compression
        .codec()
        .create_reader(Box::new(BufReader::new(file)))
        .context(DecompressionSnafu { path })
}

/// Read every line of `path`, passing them to `on_batch` in batches.
///
/// Lines read before a mid-stream failure are delivered before the
/// `SourceError::Stream` is returned. `on_batch` may stop the read early.
pub fn read_lines(
    path: &Path,
    compression: CompressionFormat,
    on_batch: &mut dyn FnMut(LineBatch) -> ControlFlow<()>,
) -> Result<(), SourceError> {
    let mut reader = open_lines(path, compression)?;
    let mut batch = Vec::with_capacity(LINE_BATCH_SIZE);

    loop {
        let mut line = Vec::new();
        let read = match reader.read_until(b'\n', &mut line) {
            Ok(read) => read,
            Err(source) => {
                if !batch.is_empty() && on_batch(batch).is_break() {
                    return Ok(());
                }
                return Err(source).context(StreamSnafu { path });
            }
        };
        if read == 0 {
            break;
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        batch.push(line);

        if batch.len() == LINE_BATCH_SIZE {
            let full = std::mem::replace(&mut batch, Vec::with_capacity(LINE_BATCH_SIZE));
            if on_batch(full).is_break() {
                return Ok(());
            }
        }
    }

    if !batch.is_empty() {
        let _ = on_batch(batch);
    }
    Ok(())
}

/// Spawn a blocking reader for `path` and return the receiving end.
///
/// A read error is sent as the last item. Dropping the receiver stops the
/// reader after its current batch.
pub fn spawn_line_reader(
    path: PathBuf,
    compression: CompressionFormat,
) -> mpsc::Receiver<Result<LineBatch, SourceError>> {
    let (batch_tx, batch_rx) = mpsc::channel(BATCH_CHANNEL_CAPACITY);

    tokio::task::spawn_blocking(move || {
        let result = read_lines(&path, compression, &mut |batch| {
            match batch_tx.blocking_send(Ok(batch)) {
                Ok(()) => ControlFlow::Continue(()),
                Err(_) => ControlFlow::Break(()),
            }
        });

        if let Err(e) = result {
            // Receiver may already be gone.
            let _ = batch_tx.blocking_send(Err(e));
        }
    });

    batch_rx
}
