//! expand
//!
//! HTML expansion: includes, slot substitution, edit positions and
//! language overlays.
//!
//! # Architecture
//!
//! - [`tokenizer`] - Byte-offset tokenizer
//! - [`dom`] - Arena document tree and serializer
//! - [`path`] - Include path resolution
//! - [`positions`] - Generated edit ids and their source positions
//! - [`lang`] - Page languages and overlay paths
//! - [`engine`] - The [`Expander`]
//! - [`translation`] - Overlay document edits
//! - [`source`] - Where page files come from
//!
//! # Markup
//!
//! ```html
//! <!-- page.html -->
//! <include src="parts/card.html">
//!   <slot id="title" edit>Welcome</slot>
//! </include>
//!
//! <!-- parts/card.html -->
//! <div class="card"><h2 id="title">Untitled</h2></div>
//! ```
//!
//! expands to `<div class="card"><h2 id="title" data-edit-id="page-title"
//! data-edit="text">Welcome</h2></div>`.
//!
//! # Invariants
//!
//! - An expansion aborts on the first error; there is no partial output
//! - Every editable element carries an id, or the page fails to render
//! - Edit positions always point into the file the content was written in

pub mod dom;
pub mod engine;
pub mod lang;
pub mod path;
pub mod positions;
pub mod source;
pub mod tokenizer;
pub mod translation;

pub use engine::{ExpandRequest, Expander, Expansion};
pub use positions::{Pos, PositionIndex};
pub use source::{MemorySource, PageSource};

use thiserror::Error;

use crate::git::GitError;

/// Errors from page expansion.
#[derive(Debug, Error)]
pub enum ExpandError {
    /// A page, include, config or overlay could not be read.
    #[error(transparent)]
    Source(#[from] GitError),

    /// An element is marked `edit` but has no `id`.
    #[error("{file}: editable element at byte {offset} has no id")]
    EditableWithoutId {
        /// File the element is written in
        file: String,
        /// Byte offset of the element's opening tag
        offset: usize,
    },

    /// An `<include>` has no `src`.
    #[error("{file}: include at byte {offset} has no src")]
    MissingIncludeSrc {
        /// File the include is written in
        file: String,
        /// Byte offset of the include tag
        offset: usize,
    },

    /// An include path climbs above the repository root.
    #[error("{file}: include '{src}' leaves the repository")]
    PathEscapesRoot {
        /// The `src` attribute as written
        src: String,
        /// File the include is written in
        file: String,
    },

    /// An included file does not exist.
    #[error("{file}: included file '{path}' not found")]
    IncludeNotFound {
        /// Resolved path of the include
        path: String,
        /// File the include is written in
        file: String,
    },

    /// Includes nest deeper than the limit (usually a cycle).
    #[error("{file}: include '{src}' nested too deeply (include cycle?)")]
    IncludeTooDeep {
        /// The `src` attribute as written
        src: String,
        /// File the include is written in
        file: String,
    },

    /// The edit id occurs more than once; its source cannot be located.
    #[error("cannot locate '{id}': the id is used more than once")]
    AmbiguousTarget {
        /// Generated edit id
        id: String,
    },

    /// The edit id does not exist on the page.
    #[error("cannot locate '{id}': no editable element has this id")]
    UnknownTarget {
        /// Generated edit id
        id: String,
    },
}

impl ExpandError {
    /// Whether the requested page itself is missing.
    ///
    /// A missing include is reported as [`ExpandError::IncludeNotFound`]
    /// instead, so callers can fall back to another page only when that
    /// makes sense.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ExpandError::Source(err) if err.is_not_found())
    }
}
