//! Input side of the loader: discovering files, decompressing them and
//! parsing their lines.

mod compression;
mod listing;
mod parser;
mod reader;

pub use compression::{
    CompressionCodec, CompressionFormat, GzipCodec, LineStream, NoopCodec, ZstdCodec,
};
pub use listing::{COMPLETION_MARKER, is_marked_complete, list_pending_files};
pub use parser::RecordParser;
pub use reader::{LINE_BATCH_SIZE, LineBatch, open_lines, read_lines, spawn_line_reader};
