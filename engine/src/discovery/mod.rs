//! Item discovery
//!
//! An item is an opaque identifier (typically a circuit file path) for one
//! input to the pairwise task. The engine never looks inside an item; it only
//! needs a stable, deterministic ordering so index `i` always refers to the
//! same item for the whole run.

mod directory;

pub use directory::DirectoryItemSource;

use crate::errors::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opaque handle for one input of the pairwise task
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Item(Arc<str>);

impl Item {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Item {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Item {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Source of the ordered item list for a run
pub trait ItemSource: Send + Sync {
    /// Return items in their stable index order
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Discovery` if the source cannot be read.
    fn discover(&self) -> Result<Vec<Item>>;

    /// Human-readable location, used in logs and error messages
    fn location(&self) -> String;
}

/// Fixed, already-ordered item list
impl ItemSource for Vec<Item> {
    fn discover(&self) -> Result<Vec<Item>> {
        Ok(self.clone())
    }

    fn location(&self) -> String {
        format!("<{} in-memory items>", self.len())
    }
}
