//! Store image writer
//!
//! Lays entities out the way a key-value page does: each record is preceded
//! by its key, bucket name then identifier, with no framing between them.
//!
//! ```text
//! +--------+------------+-------------------------+--------+------------+-----
//! | bucket | identifier | record (length..crc32)  | bucket | identifier | ...
//! +--------+------------+-------------------------+--------+------------+-----
//! ```
//!
//! Nothing reads this file back through a page structure; its only reader
//! is the recovery scan, which finds records by their type-name tags.
//! The file is flushed and fsynced before [`ImageWriter::finish`] returns.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::entries::{EntityKind, Entry};
use crate::observability::{log_event_with_fields, Event};

use super::errors::{StoreError, StoreResult};
use super::memory::MemoryOrchestrator;

/// One entity ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub kind: EntityKind,
    pub id: String,
    pub bytes: Vec<u8>,
}

impl ImageRecord {
    pub fn of<E: Entry>(entry: &E) -> Self {
        Self {
            kind: E::KIND,
            id: entry.id().to_string(),
            bytes: entry.marshal(),
        }
    }
}

/// Totals for a written image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageStats {
    pub records: usize,
    pub bytes: u64,
}

/// Writes one image file front to back.
pub struct ImageWriter {
    path: PathBuf,
    file: BufWriter<File>,
    stats: ImageStats,
}

impl ImageWriter {
    /// Creates (or truncates) the image file at `path`.
    pub fn create(path: &Path) -> StoreResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|e| StoreError::io(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            file: BufWriter::new(file),
            stats: ImageStats::default(),
        })
    }

    /// Appends one keyed record. Returns the offset of the record itself.
    pub fn append(&mut self, record: &ImageRecord) -> StoreResult<u64> {
        let bucket = record.kind.bucket().as_bytes();
        let key = record.id.as_bytes();

        self.write(bucket)?;
        self.write(key)?;
        let offset = self.stats.bytes;
        self.write(&record.bytes)?;

        self.stats.records += 1;
        Ok(offset)
    }

    /// Flushes and fsyncs the file.
    pub fn finish(self) -> StoreResult<ImageStats> {
        let ImageWriter {
            path,
            file,
            stats,
        } = self;
        let file = file
            .into_inner()
            .map_err(|e| StoreError::io(&path, e.into_error()))?;
        file.sync_all().map_err(|e| StoreError::io(&path, e))?;

        let (records, bytes, shown) = (
            stats.records.to_string(),
            stats.bytes.to_string(),
            path.display().to_string(),
        );
        log_event_with_fields(
            Event::ImageWritten,
            &[("bytes", &bytes), ("path", &shown), ("records", &records)],
        );
        Ok(stats)
    }

    fn write(&mut self, bytes: &[u8]) -> StoreResult<()> {
        self.file
            .write_all(bytes)
            .map_err(|e| StoreError::io(&self.path, e))?;
        self.stats.bytes += bytes.len() as u64;
        Ok(())
    }
}

/// Writes every entity the orchestrator holds into a fresh image at `path`.
pub fn write_image(path: &Path, orch: &MemoryOrchestrator) -> StoreResult<ImageStats> {
    let mut writer = ImageWriter::create(path)?;
    for record in orch.records() {
        writer.append(&record)?;
    }
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entries::VolumeEntry;
    use crate::orchestrator::MemoryConfig;
    use tempfile::TempDir;

    #[test]
    fn test_append_prefixes_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.img");
        let volume = VolumeEntry {
            id: "v1".into(),
            ..VolumeEntry::default()
        };
        let record = ImageRecord::of(&volume);

        let mut writer = ImageWriter::create(&path).unwrap();
        let offset = writer.append(&record).unwrap();
        let stats = writer.finish().unwrap();

        assert_eq!(offset, "VOLUMEv1".len() as u64);
        assert_eq!(stats.records, 1);

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"VOLUMEv1"));
        assert_eq!(&bytes[8..], volume.marshal().as_slice());
        assert_eq!(stats.bytes, bytes.len() as u64);
    }

    #[test]
    fn test_write_image_covers_orchestrator() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.img");
        let orch = MemoryOrchestrator::new(&MemoryConfig::default());

        let stats = write_image(&path, &orch).unwrap();
        assert_eq!(stats.records, orch.records().len());
    }

    #[test]
    fn test_create_in_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("store.img");
        let err = ImageWriter::create(&path).err().unwrap();
        assert_eq!(err.code(), "CHURN_IMAGE_IO_ERROR");
    }
}
