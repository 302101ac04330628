//! ui
//!
//! User interaction utilities.
//!
//! # Modules
//!
//! - [`output`] - Output formatting, verbosity and log setup
//!
//! # Design
//!
//! All console output goes through this module so `--quiet` and
//! `--debug` behave the same for every command.

pub mod output;
