//! Input file discovery.

use std::path::{Path, PathBuf};

use snafu::prelude::*;
use tracing::{debug, warn};

use crate::error::{PatternSnafu, SourceError};

/// Leading character of a file name that marks it as already loaded.
pub const COMPLETION_MARKER: char = '.';

/// Whether the file's base name carries the completion marker.
pub fn is_marked_complete(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.as_encoded_bytes().first() == Some(&(COMPLETION_MARKER as u8)))
}

/// List regular files matching `pattern` that are not yet marked complete,
/// in lexicographic order.
///
/// Entries that cannot be inspected (permission errors while walking) are
/// skipped with a warning. An invalid pattern is an error.
pub fn list_pending_files(pattern: &str) -> Result<Vec<PathBuf>, SourceError> {
    let entries = glob::glob(pattern).context(PatternSnafu { pattern })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                warn!(path = %e.path().display(), error = %e.error(), "Skipping unreadable path");
                continue;
            }
        };

        if is_marked_complete(&path) {
            debug!(file = %path.display(), "Skipping file already marked complete");
            continue;
        }
        if !path.is_file() {
            continue;
        }
        files.push(path);
    }

    files.sort();
    Ok(files)
}
