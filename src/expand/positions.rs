//! expand::positions
//!
//! Source positions of editable elements.
//!
//! Each editable element gets a generated id `<file stem>-<element id>`
//! (characters outside `[A-Za-z0-9_-]` replaced by `_`) and a [`Pos`]: the
//! byte range of its content in the file it was written in.
//!
//! # Invariants
//!
//! - If two elements generate the same id, the id maps to no position;
//!   an edit to it is rejected as ambiguous instead of guessed

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::ExpandError;

/// Byte range of an element's content in one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pos {
    pub filename: String,
    pub start: usize,
    pub length: usize,
}

impl Pos {
    pub fn end(&self) -> usize {
        self.start + self.length
    }
}

/// Generated edit id for element `id` written in `filename`.
///
/// ```
/// use gitfolio::expand::positions::generated_id;
///
/// assert_eq!(generated_id("pages/about.html", "greet"), "about-greet");
/// assert_eq!(generated_id("index.html", "a.b c"), "index-a_b_c");
/// ```
pub fn generated_id(filename: &str, id: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let unsafe_chars = UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_-]").expect("valid regex"));

    let base = filename.rsplit('/').next().unwrap_or(filename);
    let stem = match base.rfind('.') {
        Some(i) if i > 0 => &base[..i],
        _ => base,
    };
    unsafe_chars
        .replace_all(&format!("{}-{}", stem, id), "_")
        .into_owned()
}

/// Generated id to position, with collisions recorded as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionIndex {
    entries: HashMap<String, Option<Pos>>,
}

impl PositionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `pos` under `id`; a second record for the same id nulls it.
    pub fn insert(&mut self, id: String, pos: Pos) {
        match self.entries.entry(id) {
            Entry::Vacant(slot) => {
                slot.insert(Some(pos));
            }
            Entry::Occupied(mut slot) => {
                if slot.get().is_some() {
                    warn!(id = %slot.key(), file = %pos.filename, "duplicate edit id; edits to it will be rejected");
                }
                slot.insert(None);
            }
        }
    }

    /// Position for `id`.
    ///
    /// # Errors
    ///
    /// [`ExpandError::AmbiguousTarget`] for a collided id,
    /// [`ExpandError::UnknownTarget`] for an id never recorded.
    pub fn get(&self, id: &str) -> Result<&Pos, ExpandError> {
        match self.entries.get(id) {
            Some(Some(pos)) => Ok(pos),
            Some(None) => Err(ExpandError::AmbiguousTarget { id: id.to_string() }),
            None => Err(ExpandError::UnknownTarget { id: id.to_string() }),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by id.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Pos>)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_ref()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(file: &str, start: usize) -> Pos {
        Pos {
            filename: file.into(),
            start,
            length: 3,
        }
    }

    #[test]
    fn generated_id_uses_file_stem() {
        assert_eq!(generated_id("a/b/nav.inc.html", "menu"), "nav_inc-menu");
        assert_eq!(generated_id("README", "x"), "README-x");
        assert_eq!(generated_id(".hidden", "x"), "_hidden-x");
    }

    #[test]
    fn unique_id_resolves() {
        let mut index = PositionIndex::new();
        index.insert("a-x".into(), pos("a.html", 10));
        assert_eq!(index.get("a-x").unwrap().start, 10);
        assert_eq!(index.get("a-x").unwrap().end(), 13);
    }

    #[test]
    fn collision_nulls_position() {
        let mut index = PositionIndex::new();
        index.insert("a-x".into(), pos("a.html", 10));
        index.insert("a-x".into(), pos("a.html", 50));
        assert!(matches!(
            index.get("a-x"),
            Err(ExpandError::AmbiguousTarget { .. })
        ));

        // A third occurrence keeps it ambiguous.
        index.insert("a-x".into(), pos("a.html", 90));
        assert!(index.get("a-x").is_err());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn unknown_id() {
        let index = PositionIndex::new();
        assert!(matches!(
            index.get("nope"),
            Err(ExpandError::UnknownTarget { .. })
        ));
    }

    #[test]
    fn serializes_null_for_collisions() {
        let mut index = PositionIndex::new();
        index.insert("a-x".into(), pos("a.html", 1));
        index.insert("a-x".into(), pos("a.html", 2));
        index.insert("a-y".into(), pos("a.html", 3));
        let json = serde_json::to_value(&index).unwrap();
        assert!(json["a-x"].is_null());
        assert_eq!(json["a-y"]["start"], 3);
    }
}
