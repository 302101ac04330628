//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Reads any local input files
//! 2. Opens the [`Site`](crate::site::Site) on a fresh tokio runtime and
//!    runs one operation
//! 3. Shuts the site down (stopping the batch helper) and prints the result
//!
//! `completion` needs no repository and stays synchronous.

mod cat;
mod completion;
mod edit;
mod log_cmd;
mod put;
mod render;
mod upload;

// Re-export command functions for testing and direct invocation
pub use cat::cat;
pub use completion::completion;
pub use edit::edit;
pub use log_cmd::log;
pub use put::put;
pub use render::render;
pub use upload::upload;

use crate::cli::args::Command;
use crate::cli::Context;
use anyhow::Result;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Cat { path, rev } => cat::cat(ctx, &path, &rev),
        Command::Log { path, json } => log_cmd::log(ctx, &path, json),
        Command::Render {
            page,
            langs,
            positions,
        } => render::render(ctx, &page, &langs, positions),
        Command::Put {
            path,
            file,
            message,
        } => put::put(ctx, &path, &file, &message),
        Command::Upload { dir, file, message } => upload::upload(ctx, &dir, &file, &message),
        Command::Edit {
            page,
            id,
            file,
            langs,
            message,
        } => edit::edit(ctx, &page, &id, &file, &langs, &message),
        Command::Completion { shell } => completion::completion(shell),
    }
}
