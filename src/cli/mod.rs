//! cli
//!
//! Command-line interface layer for Gitfolio.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Install logging and load configuration
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and dispatches to
//! handlers that open a [`Site`] and call into it. The CLI itself is
//! synchronous; handlers that touch the repository run on a tokio runtime
//! of their own.

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use std::path::PathBuf;

use anyhow::{Context as _, Result};

use crate::core::config::Config;
use crate::site::Site;
use crate::ui::output::{self, Verbosity};

/// Everything a command handler needs from the command line.
#[derive(Debug)]
pub struct Context {
    /// Content repository root
    pub root: PathBuf,
    /// Loaded configuration
    pub config: Config,
    pub verbosity: Verbosity,
}

impl Context {
    /// Open the site for this invocation.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn open_site(&self) -> Result<Site> {
        Site::open(&self.root, self.config.clone())
            .await
            .with_context(|| format!("failed to open '{}'", self.root.display()))
    }
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    let verbosity = Verbosity::from_flags(cli.quiet, cli.debug);
    output::init_logging(verbosity);

    let root = match cli.repo {
        Some(path) => path,
        None => std::env::current_dir().context("failed to determine current directory")?,
    };

    let loaded = Config::load(Some(&root)).context("failed to load configuration")?;
    for warning in &loaded.warnings {
        output::warn(&warning.message, verbosity);
    }

    let ctx = Context {
        root,
        config: loaded.config,
        verbosity,
    };
    commands::dispatch(cli.command, &ctx)
}
