use super::{Item, ItemSource};
use crate::errors::{EngineError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Lists item files with a given extension in one directory
///
/// Items are sorted by file name so index assignment is reproducible across runs.
#[derive(Debug, Clone)]
pub struct DirectoryItemSource {
    dir: PathBuf,
    extension: String,
}

impl DirectoryItemSource {
    /// Create a source for `dir`, matching files ending in `.{extension}`
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        Self {
            dir: dir.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == self.extension)
    }
}

impl ItemSource for DirectoryItemSource {
    fn discover(&self) -> Result<Vec<Item>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            tracing::error!(dir = %self.dir.display(), error = %e, "Failed to read item directory");
            EngineError::Discovery(format!("cannot read {}: {}", self.dir.display(), e))
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                EngineError::Discovery(format!("cannot list {}: {}", self.dir.display(), e))
            })?;
            let path = entry.path();
            if path.is_file() && self.matches(&path) {
                paths.push(path);
            } else {
                debug!(path = %path.display(), "Skipping non-item entry");
            }
        }

        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        info!(
            dir = %self.dir.display(),
            extension = %self.extension,
            items = paths.len(),
            "Items discovered"
        );

        paths
            .into_iter()
            .map(|p| {
                p.into_os_string().into_string().map(Item::new).map_err(|raw| {
                    let path = PathBuf::from(raw);
                    tracing::error!(path = %path.display(), "Item path is not valid UTF-8");
                    EngineError::Discovery(format!("non-UTF-8 item path {}", path.display()))
                })
            })
            .collect()
    }

    fn location(&self) -> String {
        self.dir.display().to_string()
    }
}
