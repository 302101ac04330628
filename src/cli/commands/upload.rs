//! upload command - Store a file under a free name, reusing duplicates

use std::path::Path;

use anyhow::{anyhow, Context as _, Result};

use crate::cli::Context;

/// Upload the local `file` into repository directory `dir`.
///
/// Prints the repository path the content ended up at.
pub fn upload(ctx: &Context, dir: &str, file: &Path, message: &str) -> Result<()> {
    let (base, ext) = split_name(file)?;
    let bytes = std::fs::read(file).with_context(|| format!("cannot read '{}'", file.display()))?;

    let rt = tokio::runtime::Runtime::new()?;
    let path = rt.block_on(async {
        let site = ctx.open_site().await?;
        let result = site
            .store()
            .create_bin_file(dir, &base, &ext, &bytes, message)
            .await;
        site.shutdown().await;
        result.with_context(|| format!("cannot upload into '{}'", dir))
    })?;

    // The path is the command's result, so it prints even with --quiet.
    println!("{}", path);
    Ok(())
}

/// File stem and extension of `file`'s name.
fn split_name(file: &Path) -> Result<(String, String)> {
    let stem = file
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("'{}' has no usable file name", file.display()))?;
    let ext = file.extension().and_then(|s| s.to_str()).unwrap_or("");
    Ok((stem.to_string(), ext.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_stem_and_extension() {
        assert_eq!(
            split_name(Path::new("/tmp/photo.png")).unwrap(),
            ("photo".to_string(), "png".to_string())
        );
        assert_eq!(
            split_name(Path::new("archive.tar.gz")).unwrap(),
            ("archive.tar".to_string(), "gz".to_string())
        );
        assert_eq!(
            split_name(Path::new("README")).unwrap(),
            ("README".to_string(), String::new())
        );
    }

    #[test]
    fn rejects_nameless_path() {
        assert!(split_name(Path::new("/")).is_err());
    }
}
