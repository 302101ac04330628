//! render command - Expand a page and print it

use anyhow::{Context as _, Result};

use crate::cli::Context;

/// Print the expanded HTML of `page`, or its position index.
pub fn render(ctx: &Context, page: &str, langs: &[String], positions: bool) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let expansion = rt.block_on(async {
        let site = ctx.open_site().await?;
        let result = site.render_page(page, langs).await;
        site.shutdown().await;
        result.with_context(|| format!("cannot render '{}'", page))
    })?;

    tracing::debug!(
        path = %expansion.path,
        lang = %expansion.lang,
        files = expansion.all_files.len(),
        "rendered"
    );

    if positions {
        println!("{}", serde_json::to_string_pretty(&expansion.positions)?);
    } else {
        print!("{}", expansion.html);
        if !expansion.html.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}
