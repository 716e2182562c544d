use std::{
    fs::OpenOptions,
    io::Write,
    path::PathBuf,
};

use serde_json::json;
use tracing::warn;

use super::record::CardRecord;
use crate::core::AnkimdError;

/// Append-only sink for rows the run could not repair. Entries are written
/// for operator inspection and are never read back.
pub trait ErrorLog {
    fn record(&mut self, record: &CardRecord, error: &str) -> Result<(), AnkimdError>;
}

/// Error log backed by a file of one JSON object per rejected row.
pub struct FileErrorLog {
    path: PathBuf,
}

impl FileErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileErrorLog { path: path.into() }
    }
}

impl ErrorLog for FileErrorLog {
    fn record(&mut self, record: &CardRecord, error: &str) -> Result<(), AnkimdError> {
        warn!("logging unrepairable note to {}: {}", self.path.display(), error);

        let entry = json!({
            "front": record.front,
            "back": record.back,
            "deckName": record.deck_name,
            "tags": record.tags,
            "error": error,
        });

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

/// In-memory error log, mostly useful in tests and embedders.
#[derive(Debug, Default)]
pub struct MemoryErrorLog {
    pub entries: Vec<(String, String)>,
}

impl ErrorLog for MemoryErrorLog {
    fn record(&mut self, record: &CardRecord, error: &str) -> Result<(), AnkimdError> {
        self.entries.push((record.front.clone().unwrap_or_default(), error.to_string()));
        Ok(())
    }
}
