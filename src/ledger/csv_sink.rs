//! CSV hit log (`logs/target_hits.csv`)

use super::{HitSink, LedgerRecord};
use crate::error::Result;
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::path::PathBuf;

/// Append-only CSV file sink
pub struct CsvHitSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvHitSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

impl HitSink for CsvHitSink {
    fn kind(&self) -> &'static str {
        "csv"
    }

    fn append(&self, record: &LedgerRecord) -> Result<()> {
        let _guard = self.write_lock.lock();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let write_header = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        writer.serialize(record)?;
        writer.flush()?;

        Ok(())
    }

    fn records(&self) -> Result<Vec<LedgerRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.path)?;
        let records = reader
            .deserialize()
            .collect::<std::result::Result<Vec<LedgerRecord>, _>>()?;
        Ok(records)
    }
}
