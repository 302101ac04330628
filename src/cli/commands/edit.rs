//! edit command - Replace the content of an editable region

use std::path::Path;

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::ui::output;

/// Save the HTML in the local `file` as the new content of `id` on `page`.
pub fn edit(
    ctx: &Context,
    page: &str,
    id: &str,
    file: &Path,
    langs: &[String],
    message: &str,
) -> Result<()> {
    let html = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read '{}'", file.display()))?;
    // Editors add a final newline; region content rarely wants one.
    let html = html.strip_suffix('\n').unwrap_or(&html);

    let rt = tokio::runtime::Runtime::new()?;
    let saved = rt.block_on(async {
        let site = ctx.open_site().await?;
        let result = site.save_edit(page, langs, id, html, message).await;
        site.shutdown().await;
        result.with_context(|| format!("cannot save '{}' on '{}'", id, page))
    })?;

    output::print(
        format!("Saved {} ({}) to {}", id, saved.lang, saved.file),
        ctx.verbosity,
    );
    Ok(())
}
