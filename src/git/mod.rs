//! git
//!
//! Single interface for all repository content.
//!
//! # Architecture
//!
//! This module is the **only doorway** to the content repository. Pages,
//! overlays, uploads and history all flow through [`ObjectStore`]. No other
//! module spawns git or imports `git2`.
//!
//! Reads go through one long-lived `git cat-file --batch` helper
//! ([`batch`]); writes and history queries run one-shot git subprocesses
//! ([`command`]); raw encodings are decoded in [`object`].
//!
//! # Invariants
//!
//! - At most one batch request is in flight (`cat-file` queue key)
//! - All writes are totally ordered (`commit` queue key)
//! - Every subprocess is bounded by the configured timeout
//! - Parse failures are errors, never defaults
//!
//! # Example
//!
//! ```no_run
//! use gitfolio::git::{ObjectStore, StoreSettings};
//!
//! # async fn demo() -> Result<(), gitfolio::git::GitError> {
//! let store = ObjectStore::open(StoreSettings::new("/srv/site")).await?;
//! for entry in store.log("index.html").await? {
//!     println!("{} {}", entry.id.short(8), entry.msg);
//! }
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod command;
mod error;
pub mod object;
mod store;

pub use error::GitError;
pub use store::{normalize_repo_path, ObjectStore, StoreSettings};
