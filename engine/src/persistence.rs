//! Matrix persistence
//!
//! The finished matrix is published with a single atomic rename so a crash
//! mid-write never leaves a partial matrix at the output path.

use crate::discovery::Item;
use crate::engine::KernelMatrix;
use crate::errors::{EngineError, Result};
use crate::scheduler::PairTask;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info};
use uuid::Uuid;

/// Description of a completed run, written next to the matrix
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub run_id: Uuid,

    /// Items in index order: row/column `i` of the matrix is `items[i]`
    pub items: Vec<Item>,

    pub pairs: usize,
    pub chunks: usize,
    pub submission_batch_size: usize,
    pub processing_batch_size: usize,

    /// Pairs recorded as NaN under the skip policy
    pub skipped_pairs: Vec<PairTask>,

    /// Unix timestamp when the run finished computing
    pub finished_at: u64,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

/// Destination of the finished matrix
pub trait PersistenceSink: Send + Sync {
    /// Durably store `matrix`
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Persistence` if the write fails; the matrix must
    /// then be treated as not produced.
    fn persist(&self, matrix: &KernelMatrix, report: &RunReport) -> Result<()>;
}

/// Writes the matrix as JSON (`[[f64; n]; n]`, row-major)
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
    write_manifest: bool,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_manifest: false,
        }
    }

    /// Also write `<stem>.manifest.json` describing the run
    pub fn with_manifest(mut self, enabled: bool) -> Self {
        self.write_manifest = enabled;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the manifest written alongside the matrix
    pub fn manifest_path(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "kernel_matrix".to_string());
        self.path.with_file_name(format!("{}.manifest.json", stem))
    }

    /// Read a matrix previously written by this sink
    ///
    /// `null` entries (failed pairs under the skip policy) load as NaN.
    pub fn load(path: &Path) -> Result<KernelMatrix> {
        let file = File::open(path)?;
        let rows: Vec<Vec<Option<f64>>> = serde_json::from_reader(std::io::BufReader::new(file))?;
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
            .collect();
        KernelMatrix::from_rows(rows)
    }
}

/// Serialize `value` to `path` via a uniquely named temp file and rename
///
/// The temp file lives next to `path` (same filesystem, so the rename is
/// atomic) and is removed if anything fails before the rename.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| {
        error!(path = %parent.display(), error = %e, "Failed to create output directory");
        EngineError::Persistence(format!("cannot create {}: {}", parent.display(), e))
    })?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| EngineError::Persistence(format!("invalid output path {}", path.display())))?;

    let mut temp = tempfile::Builder::new()
        .prefix(&format!(".{}.", file_name))
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|e| {
            error!(dir = %parent.display(), error = %e, "Failed to create temp file");
            EngineError::Persistence(format!("cannot create temp file in {}: {}", parent.display(), e))
        })?;

    let write = |file: &mut File| -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut writer = BufWriter::new(&mut *file);
        serde_json::to_writer(&mut writer, value)?;
        writer.flush()?;
        drop(writer);
        file.sync_all()?;
        Ok(())
    };

    if let Err(e) = write(temp.as_file_mut()) {
        error!(path = %temp.path().display(), error = %e, "Failed to write temp file");
        return Err(EngineError::Persistence(format!(
            "cannot write {}: {}",
            temp.path().display(),
            e
        )));
    }

    temp.persist(path).map_err(|e| {
        error!(
            from = %e.file.path().display(),
            to = %path.display(),
            error = %e.error,
            "Failed to rename temp file"
        );
        EngineError::Persistence(format!("cannot publish {}: {}", path.display(), e.error))
    })?;

    Ok(())
}

impl PersistenceSink for JsonFileSink {
    fn persist(&self, matrix: &KernelMatrix, report: &RunReport) -> Result<()> {
        // The matrix is published last: a run whose manifest cannot be
        // written must not leave a matrix behind
        let manifest = self.write_manifest.then(|| self.manifest_path());
        if let Some(manifest) = &manifest {
            write_json_atomic(manifest, report)?;
            info!(path = %manifest.display(), "Run manifest saved");
        }

        if let Err(e) = write_json_atomic(&self.path, matrix) {
            if let Some(manifest) = &manifest {
                let _ = std::fs::remove_file(manifest);
            }
            return Err(e);
        }
        info!(path = %self.path.display(), n = matrix.size(), "Kernel matrix saved");

        Ok(())
    }
}
