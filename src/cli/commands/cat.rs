//! cat command - Print a file from the repository

use std::io::Write;

use anyhow::{Context as _, Result};

use crate::cli::Context;

/// Print the bytes of `path` as of `rev`.
pub fn cat(ctx: &Context, path: &str, rev: &str) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let bytes = rt.block_on(async {
        let site = ctx.open_site().await?;
        let result = site.store().get_file(path, rev).await;
        site.shutdown().await;
        result.with_context(|| format!("cannot read '{}' at {}", path, rev))
    })?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&bytes)?;
    stdout.flush()?;
    Ok(())
}
