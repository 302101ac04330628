//! log command - Show the history of a file
//!
//! Newest entries first, at most `log_max_entries` of them. Plain
//! directories have no history and print nothing.

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::core::types::LogEntry;
use crate::ui::output::{self, format_list};

/// Print the history of `path`.
pub fn log(ctx: &Context, path: &str, json: bool) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let entries = rt.block_on(async {
        let site = ctx.open_site().await?;
        let result = site.store().log(path).await;
        site.shutdown().await;
        result.with_context(|| format!("cannot read history of '{}'", path))
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        output::print(format!("No history for {}", path), ctx.verbosity);
        return Ok(());
    }
    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            println!();
        }
        print_entry(entry);
    }
    Ok(())
}

fn print_entry(entry: &LogEntry) {
    let date = entry
        .date
        .map(|d| d.format("%Y-%m-%d %H:%M:%S %:z").to_string())
        .unwrap_or_else(|| "-".to_string());
    println!("{}  {}  {}", entry.id.short(10), date, entry.author);

    let files: Vec<String> = entry
        .files
        .iter()
        .map(|f| format!("{} {}", f.status, f.path))
        .collect();
    if !files.is_empty() {
        println!("{}", format_list(&files, "    "));
    }
    for line in entry.msg.lines() {
        println!("    {}", line);
    }
}
