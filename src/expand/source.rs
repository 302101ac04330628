//! expand::source
//!
//! Where the expander reads files from.
//!
//! # Design
//!
//! The expander only needs "text of this repository path". [`ObjectStore`]
//! serves it at the cached HEAD; [`MemorySource`] serves it from memory for
//! previews and tests.
//!
//! # Example
//!
//! ```
//! use gitfolio::expand::source::{MemorySource, PageSource};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let source = MemorySource::new();
//! source.insert("index.html", "<h1>Home</h1>");
//!
//! assert_eq!(source.read_text("index.html").await.unwrap(), "<h1>Home</h1>");
//! assert!(source.read_text("missing.html").await.unwrap_err().is_not_found());
//! # });
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::git::{GitError, ObjectStore};

/// Read access to page files.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// UTF-8 text of the file at `path`.
    ///
    /// # Errors
    ///
    /// [`GitError::NotFound`] if there is no such file.
    async fn read_text(&self, path: &str) -> Result<String, GitError>;
}

#[async_trait]
impl PageSource for ObjectStore {
    async fn read_text(&self, path: &str) -> Result<String, GitError> {
        self.get_text_file(path, "HEAD").await
    }
}

/// In-memory files, shared across clones.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: Arc<Mutex<HashMap<String, String>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file.
    pub fn insert(&self, path: impl Into<String>, content: impl Into<String>) {
        self.lock().insert(path.into(), content.into());
    }

    pub fn remove(&self, path: &str) {
        self.lock().remove(path);
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.lock().get(path).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MemorySource {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let source = MemorySource::new();
        for (path, content) in iter {
            source.insert(path, content);
        }
        source
    }
}

#[async_trait]
impl PageSource for MemorySource {
    async fn read_text(&self, path: &str) -> Result<String, GitError> {
        self.get(path).ok_or_else(|| GitError::NotFound {
            spec: path.to_string(),
        })
    }
}
