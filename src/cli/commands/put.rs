//! put command - Write a file, commit and push

use std::path::Path;

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::ui::output;

/// Store the content of the local `file` at repository `path`.
pub fn put(ctx: &Context, path: &str, file: &Path, message: &str) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("cannot read '{}'", file.display()))?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let site = ctx.open_site().await?;
        let result = site.store().set_bin_file(path, &bytes, message).await;
        site.shutdown().await;
        result.with_context(|| format!("cannot write '{}'", path))
    })?;

    output::print(format!("Saved {}", path), ctx.verbosity);
    Ok(())
}
