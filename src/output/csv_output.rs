//! CSV dataset persistence
//!
//! The dataset is written to a temporary file next to the destination and
//! renamed into place, so readers only ever see the previous complete file
//! or the new complete file.

use crate::model::{BookRecord, Dataset, DATASET_COLUMNS};
use crate::output::traits::{DatasetWriter, OutputError, OutputResult};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes the dataset as a CSV file with a fixed header
#[derive(Debug, Clone)]
pub struct CsvDatasetWriter {
    path: PathBuf,
}

impl CsvDatasetWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DatasetWriter for CsvDatasetWriter {
    fn write(&self, dataset: &Dataset) -> OutputResult<()> {
        write_dataset(dataset, &self.path)
    }

    fn destination(&self) -> String {
        self.path.display().to_string()
    }
}

/// Writes `dataset` to `path`, atomically replacing any existing file
///
/// Missing parent directories are created first, since the temporary file
/// has to live next to the destination. The temporary file is removed on
/// every failure path.
pub fn write_dataset(dataset: &Dataset, path: &Path) -> OutputResult<()> {
    let write_error = |message: String| OutputError::Write {
        path: path.to_path_buf(),
        message,
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .map_err(|e| write_error(format!("create {}: {}", parent.display(), e)))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".shelfscan-")
        .suffix(".csv.tmp")
        .tempfile_in(parent)
        .map_err(|e| write_error(format!("create temporary file: {}", e)))?;

    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(true)
            .from_writer(tmp.as_file_mut());

        if dataset.is_empty() {
            writer
                .write_record(DATASET_COLUMNS)
                .map_err(|e| write_error(e.to_string()))?;
        }
        for record in dataset {
            writer
                .serialize(record)
                .map_err(|e| write_error(e.to_string()))?;
        }
        writer.flush().map_err(|e| write_error(e.to_string()))?;
    }

    tmp.as_file_mut()
        .flush()
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| write_error(format!("sync: {}", e)))?;

    tmp.persist(path)
        .map_err(|e| write_error(format!("rename into place: {}", e.error)))?;

    tracing::debug!("Wrote {} records to {}", dataset.len(), path.display());
    Ok(())
}

/// Loads a persisted dataset, validating the header and every record
///
/// Column types are coerced here, once, so consumers work with typed
/// [`BookRecord`]s.
pub fn read_dataset(path: &Path) -> OutputResult<Dataset> {
    let read_error = |message: String| OutputError::Read {
        path: path.to_path_buf(),
        message,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| read_error(e.to_string()))?;

    let headers = reader.headers().map_err(|e| read_error(e.to_string()))?;
    if !headers.iter().eq(DATASET_COLUMNS.iter().copied()) {
        return Err(OutputError::Header {
            path: path.to_path_buf(),
            found: headers.iter().map(str::to_string).collect(),
        });
    }

    let mut records = Vec::new();
    for row in reader.deserialize::<BookRecord>() {
        let record = row.map_err(|e| OutputError::Record {
            line: e.position().map(|p| p.line()).unwrap_or_default(),
            message: e.to_string(),
        })?;
        record.validate().map_err(|e| OutputError::Record {
            line: records.len() as u64 + 2,
            message: e.to_string(),
        })?;
        records.push(record);
    }

    Ok(Dataset::new(records))
}
