//! core::tasks
//!
//! Async coordination primitives shared by the object store.
//!
//! # Modules
//!
//! - [`queue`] - Per-key serialized task queue
//! - [`buffer`] - Ordered handoff from a subprocess reader to awaiting consumers

pub mod buffer;
pub mod queue;

pub use buffer::{BufferError, ResultBuffer};
pub use queue::SerialQueue;
