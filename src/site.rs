//! site
//!
//! Application context: one content repository, rendered and edited.
//!
//! # Architecture
//!
//! [`Site`] owns an [`ObjectStore`] and an [`Expander`] reading through it.
//! Everything above the library (the CLI, a web front end) goes through a
//! `Site`:
//!
//! - [`Site::render_page`] maps a URL path to a page file and expands it
//! - [`Site::save_edit`] writes an edited fragment back to the file it
//!   was written in, or to the page's language overlay
//!
//! # Page Lookup
//!
//! | URL path     | Tried                               |
//! |--------------|-------------------------------------|
//! | `` or `/`    | `index.html`                        |
//! | `about`      | `about.html`, then `about/index.html` |
//! | `about.html` | `about.html`                        |
//!
//! # Example
//!
//! ```no_run
//! use gitfolio::core::config::Config;
//! use gitfolio::site::Site;
//! use std::path::Path;
//!
//! # async fn demo() -> Result<(), gitfolio::site::SiteError> {
//! let root = Path::new("/srv/site");
//! let config = Config::load(Some(root))?.config;
//! let site = Site::open(root, config).await?;
//!
//! let page = site.render_page("/about", &["de".to_string()]).await?;
//! println!("{}", page.html);
//!
//! site.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use crate::core::config::{Config, ConfigError};
use crate::expand::lang::{candidates, overlay_path};
use crate::expand::translation::set_translation;
use crate::expand::{ExpandError, ExpandRequest, Expander, Expansion};
use crate::git::{GitError, ObjectStore};

/// Errors from site operations.
#[derive(Debug, Error)]
pub enum SiteError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Expand(#[from] ExpandError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SiteError {
    /// Whether no page exists at the requested path.
    pub fn is_not_found(&self) -> bool {
        match self {
            SiteError::Git(err) => err.is_not_found(),
            SiteError::Expand(err) => err.is_not_found(),
            SiteError::Config(_) => false,
        }
    }
}

/// Where a saved edit went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedEdit {
    /// Repository path of the written file
    pub file: String,
    /// Language the edit was saved in
    pub lang: String,
}

/// How often [`Site::save_edit`] re-expands a page whose file changed.
pub const EDIT_ATTEMPTS: usize = 3;

/// An edit resolved to one file, not yet written.
struct PendingEdit {
    file: String,
    lang: String,
    /// Content the edit was computed from
    original: Option<String>,
    updated: String,
}

/// A content repository opened for rendering and editing.
#[derive(Debug)]
pub struct Site {
    config: Config,
    expander: Expander<ObjectStore>,
}

impl Site {
    /// Open the repository at `root`.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn open(root: &Path, config: Config) -> Result<Self, SiteError> {
        let store = ObjectStore::open(config.store_settings(root)).await?;
        Ok(Self {
            config,
            expander: Expander::new(store),
        })
    }

    pub fn store(&self) -> &ObjectStore {
        self.expander.source()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn shutdown(&self) {
        self.store().shutdown().await;
    }

    /// Expand the page behind `url_path` in the best of `languages`.
    ///
    /// # Errors
    ///
    /// Not found (see [`SiteError::is_not_found`]) if no candidate file
    /// exists; any expansion error otherwise.
    pub async fn render_page(
        &self,
        url_path: &str,
        languages: &[String],
    ) -> Result<Expansion, SiteError> {
        let mut last = None;
        for path in page_candidates(url_path) {
            match self.expand(&path, languages).await {
                Err(err) if err.is_not_found() => last = Some(err),
                other => return other.map_err(SiteError::from),
            }
        }
        Err(last
            .map(SiteError::from)
            .unwrap_or_else(|| GitError::NotFound { spec: url_path.to_string() }.into()))
    }

    /// Save `html` as the new content of the editable element `id`.
    ///
    /// The edit goes to the first of `languages` the page declares. In the
    /// page's primary language the source file is spliced at the element's
    /// recorded position; in any other language the overlay is updated.
    ///
    /// The file is written only if it is unchanged since the page was
    /// expanded; otherwise the page is expanded again and the edit
    /// reapplied, up to [`EDIT_ATTEMPTS`] times.
    ///
    /// # Errors
    ///
    /// [`ExpandError::UnknownTarget`] if the page has no such id,
    /// [`ExpandError::AmbiguousTarget`] if it is not unique,
    /// [`GitError::Stale`] if the file kept changing underneath.
    pub async fn save_edit(
        &self,
        page: &str,
        languages: &[String],
        id: &str,
        html: &str,
        message: &str,
    ) -> Result<SavedEdit, SiteError> {
        let mut attempt = 1;
        loop {
            let edit = self.prepare_edit(page, languages, id, html).await?;
            let written = self
                .store()
                .replace_text_file(&edit.file, edit.original.as_deref(), &edit.updated, message)
                .await;
            match written {
                Ok(()) => {
                    info!(file = %edit.file, %id, lang = %edit.lang, "saved edit");
                    return Ok(SavedEdit {
                        file: edit.file,
                        lang: edit.lang,
                    });
                }
                Err(GitError::Stale { .. }) if attempt < EDIT_ATTEMPTS => {
                    debug!(file = %edit.file, %id, attempt, "file changed; reapplying edit");
                    self.store().head_within(Duration::ZERO).await?;
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Work out which file an edit goes to and its new content.
    async fn prepare_edit(
        &self,
        page: &str,
        languages: &[String],
        id: &str,
        html: &str,
    ) -> Result<PendingEdit, SiteError> {
        // Expand in the primary language: positions are what matter here.
        let expansion = self.render_page(page, &[]).await?;
        let primary = expansion.lang.clone();
        let lang = candidates(languages, &expansion.langs)
            .first()
            .map(|l| l.to_string())
            .unwrap_or_else(|| primary.clone());

        if lang == primary {
            let pos = expansion.positions.get(id)?;
            let source = expansion
                .all_files
                .get(&pos.filename)
                .ok_or_else(|| GitError::NotFound {
                    spec: pos.filename.clone(),
                })?;
            let mut updated = String::with_capacity(source.len() + html.len());
            updated.push_str(&source[..pos.start]);
            updated.push_str(html);
            updated.push_str(&source[pos.end()..]);

            return Ok(PendingEdit {
                file: pos.filename.clone(),
                lang,
                original: Some(source.clone()),
                updated,
            });
        }

        if !expansion.positions.contains(id) {
            return Err(ExpandError::UnknownTarget { id: id.to_string() }.into());
        }
        let file = overlay_path(&expansion.path, &lang);
        let original = match self.store().get_text_file(&file, "HEAD").await {
            Ok(text) => Some(text),
            Err(err) if err.is_not_found() => None,
            Err(err) => return Err(err.into()),
        };
        let updated = set_translation(original.as_deref().unwrap_or(""), id, html);

        Ok(PendingEdit {
            file,
            lang,
            original,
            updated,
        })
    }

    async fn expand(&self, path: &str, languages: &[String]) -> Result<Expansion, ExpandError> {
        let request = ExpandRequest::new(path)
            .languages(languages.to_vec())
            .default_lang(self.config.default_lang());
        self.expander.expand_file(&request).await
    }
}

/// Page files to try for `url_path`, in order.
fn page_candidates(url_path: &str) -> Vec<String> {
    let path = url_path.trim_matches('/');
    if path.is_empty() {
        vec!["index.html".to_string()]
    } else if path.ends_with(".html") {
        vec![path.to_string()]
    } else {
        vec![format!("{}.html", path), format!("{}/index.html", path)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::RepoConfig;
    use tempfile::TempDir;

    fn plain_site_config() -> Config {
        Config::from_parts(
            Default::default(),
            Some(RepoConfig {
                plain_directory: Some(true),
                ..Default::default()
            }),
        )
    }

    fn write(dir: &TempDir, path: &str, content: &str) {
        let full = dir.path().join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }

    fn read(dir: &TempDir, path: &str) -> String {
        std::fs::read_to_string(dir.path().join(path)).unwrap()
    }

    #[test]
    fn page_candidates_by_url() {
        assert_eq!(page_candidates("/"), vec!["index.html"]);
        assert_eq!(page_candidates(""), vec!["index.html"]);
        assert_eq!(
            page_candidates("/docs/"),
            vec!["docs.html", "docs/index.html"]
        );
        assert_eq!(page_candidates("a/b.html"), vec!["a/b.html"]);
    }

    #[tokio::test]
    async fn render_falls_back_to_index() {
        let dir = TempDir::new().unwrap();
        write(&dir, "docs/index.html", "<h1>Docs</h1>");
        let site = Site::open(dir.path(), plain_site_config()).await.unwrap();

        let page = site.render_page("/docs", &[]).await.unwrap();
        assert_eq!(page.path, "docs/index.html");
        assert_eq!(page.html, "<h1>Docs</h1>");

        let missing = site.render_page("/nope", &[]).await.unwrap_err();
        assert!(missing.is_not_found());
    }

    #[tokio::test]
    async fn missing_include_is_not_a_missing_page() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.html", r#"<include src="gone.html"/>"#);
        let site = Site::open(dir.path(), plain_site_config()).await.unwrap();

        let err = site.render_page("a", &[]).await.unwrap_err();
        assert!(!err.is_not_found());
        assert!(matches!(
            err,
            SiteError::Expand(ExpandError::IncludeNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn save_edit_splices_source_file() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "index.html",
            "<include src=\"parts/head.html\"/>\n<p edit id=\"intro\">Old intro</p>\n",
        );
        write(&dir, "parts/head.html", "<h1 edit id=\"t\">Title</h1>");
        let site = Site::open(dir.path(), plain_site_config()).await.unwrap();

        let saved = site
            .save_edit("/", &[], "index-intro", "New <b>intro</b>", "edit")
            .await
            .unwrap();
        assert_eq!(saved.file, "index.html");
        assert_eq!(
            read(&dir, "index.html"),
            "<include src=\"parts/head.html\"/>\n<p edit id=\"intro\">New <b>intro</b></p>\n"
        );

        site.save_edit("/", &[], "head-t", "Welcome", "edit")
            .await
            .unwrap();
        assert_eq!(read(&dir, "parts/head.html"), "<h1 edit id=\"t\">Welcome</h1>");
    }

    #[tokio::test]
    async fn concurrent_edits_of_one_file_both_land() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "index.html",
            "<h1 edit id=\"t\">Title</h1>\n<p edit id=\"intro\">Intro</p>\n",
        );
        let site = Site::open(dir.path(), plain_site_config()).await.unwrap();

        let (title, intro) = tokio::join!(
            site.save_edit("/", &[], "index-t", "New title", "title"),
            site.save_edit("/", &[], "index-intro", "New intro", "intro"),
        );
        title.unwrap();
        intro.unwrap();
        assert_eq!(
            read(&dir, "index.html"),
            "<h1 edit id=\"t\">New title</h1>\n<p edit id=\"intro\">New intro</p>\n"
        );
    }

    #[tokio::test]
    async fn conditional_write_refuses_changed_file() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.html", "current");
        let site = Site::open(dir.path(), plain_site_config()).await.unwrap();

        let err = site
            .store()
            .replace_text_file("a.html", Some("older"), "mine", "m")
            .await
            .unwrap_err();
        assert!(matches!(err, GitError::Stale { .. }));
        assert_eq!(read(&dir, "a.html"), "current");

        site.store()
            .replace_text_file("a.html", Some("current"), "mine", "m")
            .await
            .unwrap();
        assert_eq!(read(&dir, "a.html"), "mine");
    }

    #[tokio::test]
    async fn save_edit_rejects_unknown_and_ambiguous_ids() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "index.html",
            r#"<include src="box.html"/><include src="box.html"/>"#,
        );
        write(&dir, "box.html", r#"<p edit id="x">box</p>"#);
        let site = Site::open(dir.path(), plain_site_config()).await.unwrap();

        let err = site.save_edit("/", &[], "box-x", "y", "m").await.unwrap_err();
        assert!(matches!(
            err,
            SiteError::Expand(ExpandError::AmbiguousTarget { .. })
        ));

        let err = site.save_edit("/", &[], "box-z", "y", "m").await.unwrap_err();
        assert!(matches!(
            err,
            SiteError::Expand(ExpandError::UnknownTarget { .. })
        ));
        assert_eq!(read(&dir, "box.html"), r#"<p edit id="x">box</p>"#);
    }

    #[tokio::test]
    async fn save_edit_in_other_language_writes_overlay() {
        let dir = TempDir::new().unwrap();
        write(&dir, "index.html", r#"<h1 edit id="t">Hello</h1>"#);
        write(&dir, "config.json", r#"{"langs": ["en", "de"]}"#);
        let site = Site::open(dir.path(), plain_site_config()).await.unwrap();
        let de = vec!["de".to_string()];

        let saved = site
            .save_edit("/", &de, "index-t", "Hallo", "translate")
            .await
            .unwrap();
        assert_eq!(saved.file, "lang-de.html");
        assert_eq!(saved.lang, "de");
        assert_eq!(read(&dir, "index.html"), r#"<h1 edit id="t">Hello</h1>"#);

        let page = site.render_page("/", &de).await.unwrap();
        assert_eq!(page.lang, "de");
        assert!(page.html.contains(">Hallo</h1>"));

        site.save_edit("/", &de, "index-t", "Servus", "translate")
            .await
            .unwrap();
        assert_eq!(read(&dir, "lang-de.html"), "<div id=\"index-t\">Servus</div>\n");
    }
}
