//! Gitfolio - A git-backed page store with an HTML expansion engine
//!
//! Gitfolio serves a website straight out of a git repository. Pages are
//! plain HTML files that pull in other files with `<include>`, override
//! parts of them with slots, and mark regions `edit`able. Edits are
//! written back to the exact bytes they came from and committed; other
//! languages live in per-page overlay files.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to [`site`])
//! - [`site`] - Application context: page lookup, rendering, saving edits
//! - [`expand`] - Include/slot expansion, edit positions, language overlays
//! - [`git`] - Single interface for all repository reads and writes
//! - [`core`] - Domain types, configuration, serialized task queue
//! - [`ui`] - Console output and logging
//!
//! # Correctness Invariants
//!
//! 1. All commits, pushes and HEAD refreshes run one at a time
//! 2. Reads within one HEAD refresh window see one revision
//! 3. An edit never lands on an ambiguous position
//! 4. Expansion fails as a whole; there is no partial page

pub mod cli;
pub mod core;
pub mod expand;
pub mod git;
pub mod site;
pub mod ui;
