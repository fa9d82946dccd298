//! Compression codecs for input files.
//!
//! Each codec validates its magic bytes up front so that a file which cannot
//! be decompressed fails when the stream is opened, not on the first line.

use std::io::{BufRead, BufReader};

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::error::{BadHeaderSnafu, DecoderInitSnafu, DecompressionError};

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const ZSTD_MAGIC: &[u8] = &[0x28, 0xb5, 0x2f, 0xfd];

/// Compression format of input files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionFormat {
    #[default]
    Gzip,
    Zstd,
    None,
}

impl CompressionFormat {
    pub fn codec(self) -> &'static dyn CompressionCodec {
        match self {
            CompressionFormat::Gzip => &GzipCodec,
            CompressionFormat::Zstd => &ZstdCodec,
            CompressionFormat::None => &NoopCodec,
        }
    }
}

/// Boxed line-readable stream.
pub type LineStream = Box<dyn BufRead + Send>;

/// A codec that turns a compressed stream into a line-readable one.
pub trait CompressionCodec: Send + Sync {
    /// Wrap `input` in a decompressing reader.
    fn create_reader(&self, input: LineStream) -> Result<LineStream, DecompressionError>;

    fn name(&self) -> &'static str;
}

/// Peek at the buffered head of `input` without consuming it.
fn check_magic(
    input: &mut LineStream,
    magic: &[u8],
    codec: &'static str,
) -> Result<(), DecompressionError> {
    let head = input.fill_buf().context(DecoderInitSnafu { codec })?;
    ensure!(head.starts_with(magic), BadHeaderSnafu { codec });
    Ok(())
}

/// Gzip codec. Concatenated members are read as one stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipCodec;

impl CompressionCodec for GzipCodec {
    fn create_reader(&self, mut input: LineStream) -> Result<LineStream, DecompressionError> {
        check_magic(&mut input, GZIP_MAGIC, self.name())?;
        Ok(Box::new(BufReader::new(flate2::bufread::MultiGzDecoder::new(
            input,
        ))))
    }

    fn name(&self) -> &'static str {
        "gzip"
    }
}

/// Zstandard codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZstdCodec;

impl CompressionCodec for ZstdCodec {
    fn create_reader(&self, mut input: LineStream) -> Result<LineStream, DecompressionError> {
        check_magic(&mut input, ZSTD_MAGIC, self.name())?;
        let decoder = zstd::stream::read::Decoder::with_buffer(input)
            .context(DecoderInitSnafu { codec: self.name() })?;
        Ok(Box::new(BufReader::new(decoder)))
    }

    fn name(&self) -> &'static str {
        "zstd"
    }
}

/// Pass-through codec for plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCodec;

impl CompressionCodec for NoopCodec {
    fn create_reader(&self, input: LineStream) -> Result<LineStream, DecompressionError> {
        Ok(input)
    }

    fn name(&self) -> &'static str {
        "none"
    }
}
