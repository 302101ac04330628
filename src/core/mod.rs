//! core
//!
//! Core domain types, configuration and coordination primitives.
//!
//! # Modules
//!
//! - [`types`] - Strong types: ObjectId, TreeEntry, Commit, LogEntry, etc.
//! - [`config`] - Configuration schema and loading
//! - [`tasks`] - Per-key task queue and subprocess result buffer
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Shared state lives in explicit structs, never in module globals

pub mod config;
pub mod tasks;
pub mod types;
