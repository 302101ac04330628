//! core::types
//!
//! Strong types for repository content.
//!
//! # Types
//!
//! - [`ObjectId`] - Git object identifier (hex SHA)
//! - [`ObjectKind`] - blob / tree / commit / tag
//! - [`TreeEntry`] - One row of a parsed tree object
//! - [`Commit`] - Parsed commit headers and message
//! - [`GitObject`] - A resolved object with its raw payload
//! - [`LogEntry`] - One entry of a human-readable history dump
//!
//! # Validation
//!
//! Object ids are validated at construction time. Invalid values cannot be
//! represented, so parsers only ever hand out well-formed ids.
//!
//! # Examples
//!
//! ```
//! use gitfolio::core::types::{ObjectId, ObjectKind};
//!
//! let id = ObjectId::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
//! assert_eq!(id.as_str(), "abc123def4567890abc123def4567890abc12345");
//! assert_eq!(id.short(7), "abc123d");
//!
//! assert_eq!("tree".parse::<ObjectKind>().unwrap(), ObjectKind::Tree);
//! assert!(ObjectId::new("not-a-sha").is_err());
//! ```

use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("unknown object type: {0}")]
    UnknownKind(String),
}

/// A Git object identifier (SHA-1 or SHA-256).
///
/// Ids are normalized to lowercase for consistency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

impl ObjectId {
    /// Create a new validated object id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` if the string is not a 40 or 64
    /// character hex id.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        Self::validate(&oid)?;
        Ok(Self(oid))
    }

    /// Build an id from the raw bytes of a binary SHA (as found in trees).
    ///
    /// # Example
    ///
    /// ```
    /// use gitfolio::core::types::ObjectId;
    ///
    /// let id = ObjectId::from_raw(&[0xab; 20]).unwrap();
    /// assert_eq!(id.as_str(), "ab".repeat(20));
    /// ```
    pub fn from_raw(bytes: &[u8]) -> Result<Self, TypeError> {
        Self::new(hex::encode(bytes))
    }

    /// Get an abbreviated form of the id.
    ///
    /// Returns the first `len` characters, or the whole id if it is shorter.
    pub fn short(&self, len: usize) -> &str {
        let end = len.min(self.0.len());
        &self.0[..end]
    }

    fn validate(oid: &str) -> Result<(), TypeError> {
        // SHA-1 is 40 hex chars, SHA-256 is 64
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(
                "object id must be hexadecimal".into(),
            ));
        }
        Ok(())
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ObjectId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ObjectId> for String {
    fn from(oid: ObjectId) -> Self {
        oid.0
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The type of a git object, as reported by the batch helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
            ObjectKind::Tag => "tag",
        }
    }
}

impl FromStr for ObjectKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blob" => Ok(ObjectKind::Blob),
            "tree" => Ok(ObjectKind::Tree),
            "commit" => Ok(ObjectKind::Commit),
            "tag" => Ok(ObjectKind::Tag),
            other => Err(TypeError::UnknownKind(other.to_string())),
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a tree object.
///
/// Entries keep the order in which the tree encodes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Octal file mode as written in the tree (e.g. `100644`, `40000`)
    pub mode: String,
    /// Entry name (a single path component)
    pub name: String,
    /// Object the entry points at
    pub sha: ObjectId,
}

impl TreeEntry {
    /// Whether the entry points at a subtree.
    pub fn is_tree(&self) -> bool {
        self.mode == "40000" || self.mode == "040000"
    }
}

/// Parsed commit object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Root tree of the commit
    pub tree: ObjectId,
    /// Parent commits, in header order
    pub parents: Vec<ObjectId>,
    /// Author identity (`Name <email>`)
    pub author: String,
    /// Author timestamp in seconds since the epoch
    pub date: i64,
    /// Free-text commit message
    pub msg: String,
}

/// A resolved git object.
///
/// Immutable once resolved; identity is the content hash. `tree` and
/// `commit` are populated only for objects of the matching kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub data: Vec<u8>,
    pub tree: Option<Vec<TreeEntry>>,
    pub commit: Option<Commit>,
}

/// A path touched by a commit, as listed by `log --name-status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    /// Status letter(s), e.g. `M`, `A`, `D`, `R100`
    pub status: String,
    /// Path after the change (the new path for renames)
    pub path: String,
}

/// One entry of the repository history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: ObjectId,
    pub author: String,
    pub date: Option<DateTime<FixedOffset>>,
    pub files: Vec<ChangedFile>,
    pub msg: String,
}
