//! expand::path
//!
//! Include path resolution.
//!
//! `src="b.html"`, `src="./b.html"` and `src="../b.html"` resolve against
//! the directory of the including file; `src="/b.html"` resolves from the
//! repository root. The result is a normalized repository-relative path.

use super::ExpandError;

/// Resolve `src` as written in `including_file`.
///
/// # Example
///
/// ```
/// use gitfolio::expand::path::resolve_include;
///
/// assert_eq!(resolve_include("docs/a/page.html", "../parts/nav.html").unwrap(), "docs/parts/nav.html");
/// assert_eq!(resolve_include("docs/page.html", "/footer.html").unwrap(), "footer.html");
/// assert!(resolve_include("page.html", "../../etc/passwd").is_err());
/// ```
pub fn resolve_include(including_file: &str, src: &str) -> Result<String, ExpandError> {
    let escapes = || ExpandError::PathEscapesRoot {
        src: src.to_string(),
        file: including_file.to_string(),
    };

    let mut parts: Vec<&str> = if src.starts_with('/') {
        Vec::new()
    } else {
        let mut dir: Vec<&str> = including_file.split('/').filter(|p| !p.is_empty()).collect();
        dir.pop();
        dir
    };

    for part in src.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(escapes());
                }
            }
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return Err(escapes());
    }
    Ok(parts.join("/"))
}

/// Directory part of a repository path, with a trailing slash (or empty).
pub fn dir_prefix(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..=i],
        None => "",
    }
}
