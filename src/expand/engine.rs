//! expand::engine
//!
//! The expander.
//!
//! # Algorithm
//!
//! One [`Expander::expand_file`] call is one run over a private arena:
//!
//! 1. Read the page, its `config.json` and (for a non-primary language)
//!    its overlay.
//! 2. Parse the page and record the position of every `edit` element.
//! 3. Walk the tree depth-first. For each element, in order:
//!    - **substitute** it if its `id` is in the current context's slot
//!      table, then continue with the replacement under the context the
//!      slot content was written in
//!    - **mark** it editable (`data-edit="rich"` if it holds paragraphs or
//!      lists, else `"text"`)
//!    - **include**: fetch `src`, record its positions, use the include's
//!      children with an `id` as the new file's slot table, splice the
//!      file in place of the tag and walk it
//!    - otherwise walk the children
//! 4. Replace the content of every editable element that has an overlay
//!    entry, then unwrap `<slot>` and `<group>` tags.
//!
//! # Contexts
//!
//! The context a node is walked under lives in a side table keyed by
//! [`NodeId`]. Substituted content is registered there with the context of
//! the file it was written in, so includes inside slot content resolve
//! relative to that file.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use super::dom::{Document, NodeId};
use super::lang::{candidates, config_path, overlay_path, page_languages};
use super::path::resolve_include;
use super::positions::{generated_id, Pos, PositionIndex};
use super::source::PageSource;
use super::ExpandError;

/// Attribute marking an element editable in source.
pub const EDIT_ATTR: &str = "edit";
/// Output attribute: `rich` or `text`.
pub const EDIT_MODE_ATTR: &str = "data-edit";
/// Output attribute: the generated edit id.
pub const EDIT_ID_ATTR: &str = "data-edit-id";

/// Structural wrappers removed from the output.
const GROUPING_TAGS: &[&str] = &["slot", "group"];
/// Descendants that make an editable element rich text.
const RICH_CONTENT: &[&str] = &["p", "ul", "ol"];
const MAX_INCLUDE_DEPTH: usize = 32;

type Step<'a> = Pin<Box<dyn Future<Output = Result<(), ExpandError>> + Send + 'a>>;

/// What to expand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandRequest {
    /// Repository path of the page
    pub path: String,
    /// Preferred languages, best first
    pub languages: Vec<String>,
    /// Language of pages without `config.json`
    pub default_lang: String,
}

impl ExpandRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            languages: Vec::new(),
            default_lang: "en".to_string(),
        }
    }

    pub fn languages(mut self, languages: Vec<String>) -> Self {
        self.languages = languages;
        self
    }

    pub fn default_lang(mut self, lang: impl Into<String>) -> Self {
        self.default_lang = lang.into();
        self
    }
}

/// Result of one expansion.
#[derive(Debug, Clone)]
pub struct Expansion {
    /// Page path that was expanded
    pub path: String,
    /// Final HTML
    pub html: String,
    /// Language the page was rendered in
    pub lang: String,
    /// Languages the page declares, primary first
    pub langs: Vec<String>,
    /// Overlay file, when one was merged
    pub overlay_path: Option<String>,
    /// Overlay text, when one was merged
    pub overlay: Option<String>,
    /// Positions of editable elements by generated id
    pub positions: PositionIndex,
    /// Every page and include read, by path
    pub all_files: BTreeMap<String, String>,
}

impl Expansion {
    /// Whether the page was rendered in its primary language.
    pub fn is_primary_lang(&self) -> bool {
        self.langs.first() == Some(&self.lang)
    }
}

/// Expands pages read from a [`PageSource`].
#[derive(Debug, Clone)]
pub struct Expander<S> {
    source: S,
}

impl<S: PageSource> Expander<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Expand the page at `request.path`.
    ///
    /// # Errors
    ///
    /// Fails on the first problem: a missing page or include, an editable
    /// element without id, an include without `src` or escaping the root.
    pub async fn expand_file(&self, request: &ExpandRequest) -> Result<Expansion, ExpandError> {
        let content = self.source.read_text(&request.path).await?;

        let config = self.read_optional(&config_path(&request.path)).await?;
        let langs = page_languages(config.as_deref(), &request.default_lang);
        let (lang, overlay_path, overlay) = self.negotiate(request, &langs).await?;

        debug!(page = %request.path, %lang, overlay = ?overlay_path, "expanding page");

        let mut run = Run::new(&self.source);
        let html = run
            .expand_root(&request.path, content, overlay.as_deref())
            .await?;

        Ok(Expansion {
            path: request.path.clone(),
            html,
            lang,
            langs,
            overlay_path,
            overlay,
            positions: run.positions,
            all_files: run.all_files,
        })
    }

    /// Pick the language and load its overlay.
    ///
    /// A preferred language whose overlay file is missing is skipped; with
    /// no usable preference the primary language is used.
    async fn negotiate(
        &self,
        request: &ExpandRequest,
        langs: &[String],
    ) -> Result<(String, Option<String>, Option<String>), ExpandError> {
        let primary = langs.first().cloned().unwrap_or_else(|| request.default_lang.clone());

        for lang in candidates(&request.languages, langs) {
            if lang == primary {
                break;
            }
            let path = overlay_path(&request.path, lang);
            if let Some(text) = self.read_optional(&path).await? {
                return Ok((lang.to_string(), Some(path), Some(text)));
            }
            debug!(%path, "overlay missing; trying next language");
        }

        Ok((primary, None, None))
    }

    async fn read_optional(&self, path: &str) -> Result<Option<String>, ExpandError> {
        match self.source.read_text(path).await {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// Per-file expansion context.
#[derive(Debug)]
struct Ctx {
    filename: String,
    substitutions: HashMap<String, Substitution>,
    depth: usize,
}

#[derive(Debug, Clone)]
struct Substitution {
    node: NodeId,
    origin: Arc<Ctx>,
}

/// State of one expansion run.
struct Run<'s> {
    source: &'s dyn PageSource,
    doc: Document,
    positions: PositionIndex,
    all_files: BTreeMap<String, String>,
    origins: HashMap<NodeId, Arc<Ctx>>,
}

impl<'s> Run<'s> {
    fn new(source: &'s dyn PageSource) -> Self {
        Self {
            source,
            doc: Document::new(),
            positions: PositionIndex::new(),
            all_files: BTreeMap::new(),
            origins: HashMap::new(),
        }
    }

    async fn expand_root(
        &mut self,
        path: &str,
        content: String,
        overlay: Option<&str>,
    ) -> Result<String, ExpandError> {
        let fragment = self.doc.parse_fragment(&content);
        self.capture(path, fragment)?;
        self.all_files.insert(path.to_string(), content);

        let ctx = Arc::new(Ctx {
            filename: path.to_string(),
            substitutions: HashMap::new(),
            depth: 0,
        });
        for node in self.doc.children(fragment).to_vec() {
            self.expand_node(ctx.clone(), node).await?;
        }

        if let Some(overlay) = overlay {
            self.merge_overlay(fragment, overlay);
        }
        self.unwrap_grouping(fragment);

        Ok(self.doc.outer_html(fragment))
    }

    /// Record positions of the `edit` elements parsed from `file`.
    fn capture(&mut self, file: &str, fragment: NodeId) -> Result<(), ExpandError> {
        for node in self.doc.descendants(fragment) {
            if !self.doc.has_attr(node, EDIT_ATTR) {
                continue;
            }
            let Some(span) = self.doc.span(node) else {
                continue;
            };
            let id = match self.doc.attr(node, "id") {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => {
                    return Err(ExpandError::EditableWithoutId {
                        file: file.to_string(),
                        offset: span.start,
                    })
                }
            };

            let edit_id = generated_id(file, &id);
            let content = span.content();
            self.positions.insert(
                edit_id.clone(),
                Pos {
                    filename: file.to_string(),
                    start: content.start,
                    length: content.len(),
                },
            );
            self.doc.set_attr(node, EDIT_ID_ATTR, Some(&edit_id));
        }
        Ok(())
    }

    fn expand_node<'a>(&'a mut self, ctx: Arc<Ctx>, node: NodeId) -> Step<'a> {
        Box::pin(async move {
            let ctx = self.origins.get(&node).cloned().unwrap_or(ctx);
            if self.doc.element(node).is_none() {
                return Ok(());
            }

            let substitution = self
                .doc
                .attr(node, "id")
                .and_then(|id| ctx.substitutions.get(id))
                .cloned();
            if let Some(sub) = substitution {
                let replacement = self.substitute(node, &sub);
                self.origins.insert(replacement, sub.origin);
                return self.expand_node(ctx, replacement).await;
            }

            if self.doc.has_attr(node, EDIT_ATTR) {
                self.mark_editable(&ctx, node)?;
            }

            if self.doc.is_element_named(node, "include") {
                return self.include(ctx, node).await;
            }

            for child in self.doc.children(node).to_vec() {
                self.expand_node(ctx.clone(), child).await?;
            }
            Ok(())
        })
    }

    /// Put the slot content for `placeholder` in its place.
    ///
    /// A grouping slot keeps the placeholder tag and swaps its children; any
    /// other slot element replaces the placeholder wholesale.
    fn substitute(&mut self, placeholder: NodeId, sub: &Substitution) -> NodeId {
        let is_group = self
            .doc
            .element(sub.node)
            .is_some_and(|el| GROUPING_TAGS.contains(&el.name.as_str()));

        let replacement = if is_group {
            let shell = self.doc.clone_shallow(placeholder);
            let children: Vec<NodeId> = self
                .doc
                .children(sub.node)
                .to_vec()
                .into_iter()
                .map(|child| self.doc.clone_subtree(child))
                .collect();
            self.doc.set_children(shell, &children);

            // The content now comes from the slot's file.
            match self.doc.attr(sub.node, EDIT_ID_ATTR).map(str::to_string) {
                Some(edit_id) => {
                    self.doc.set_attr(shell, EDIT_ATTR, None);
                    self.doc.set_attr(shell, EDIT_ID_ATTR, Some(&edit_id));
                }
                None => {
                    self.doc.remove_attr(shell, EDIT_ATTR);
                    self.doc.remove_attr(shell, EDIT_ID_ATTR);
                }
            }
            shell
        } else {
            self.doc.clone_subtree(sub.node)
        };

        self.doc.replace_with(placeholder, &[replacement]);
        replacement
    }

    fn mark_editable(&mut self, ctx: &Ctx, node: NodeId) -> Result<(), ExpandError> {
        if !self.doc.has_attr(node, EDIT_ID_ATTR) {
            return Err(ExpandError::EditableWithoutId {
                file: ctx.filename.clone(),
                offset: self.doc.span(node).map_or(0, |s| s.start),
            });
        }

        let rich = self.doc.descendants(node).into_iter().any(|d| {
            RICH_CONTENT
                .iter()
                .any(|tag| self.doc.is_element_named(d, tag))
        });
        self.doc.remove_attr(node, EDIT_ATTR);
        self.doc
            .set_attr(node, EDIT_MODE_ATTR, Some(if rich { "rich" } else { "text" }));
        Ok(())
    }

    async fn include(&mut self, ctx: Arc<Ctx>, node: NodeId) -> Result<(), ExpandError> {
        let offset = self.doc.span(node).map_or(0, |s| s.start);
        let src = match self.doc.attr(node, "src") {
            Some(src) if !src.is_empty() => src.to_string(),
            _ => {
                return Err(ExpandError::MissingIncludeSrc {
                    file: ctx.filename.clone(),
                    offset,
                })
            }
        };
        if ctx.depth >= MAX_INCLUDE_DEPTH {
            return Err(ExpandError::IncludeTooDeep {
                src,
                file: ctx.filename.clone(),
            });
        }

        let path = resolve_include(&ctx.filename, &src)?;
        let content = match self.source.read_text(&path).await {
            Ok(content) => content,
            Err(err) if err.is_not_found() => {
                return Err(ExpandError::IncludeNotFound {
                    path,
                    file: ctx.filename.clone(),
                })
            }
            Err(err) => return Err(err.into()),
        };
        debug!(file = %ctx.filename, include = %path, "expanding include");

        let fragment = self.doc.parse_fragment(&content);
        self.capture(&path, fragment)?;
        self.all_files.insert(path.clone(), content);

        let mut substitutions = HashMap::new();
        for &child in self.doc.children(node) {
            if let Some(id) = self.doc.attr(child, "id") {
                substitutions.insert(
                    id.to_string(),
                    Substitution {
                        node: child,
                        origin: ctx.clone(),
                    },
                );
            }
        }
        let inner = Arc::new(Ctx {
            filename: path,
            substitutions,
            depth: ctx.depth + 1,
        });

        let top = self.doc.children(fragment).to_vec();
        self.doc.replace_with(node, &top);
        for child in top {
            self.expand_node(inner.clone(), child).await?;
        }
        Ok(())
    }

    /// Swap in overlay content for every editable element it translates.
    fn merge_overlay(&mut self, fragment: NodeId, overlay: &str) {
        let overlay_root = self.doc.parse_fragment(overlay);
        let mut translations: HashMap<String, NodeId> = HashMap::new();
        for node in self.doc.descendants(overlay_root) {
            if let Some(id) = self.doc.attr(node, "id") {
                translations.entry(id.to_string()).or_insert(node);
            }
        }

        for node in self.doc.descendants(fragment) {
            let Some(&source) = self
                .doc
                .attr(node, EDIT_ID_ATTR)
                .and_then(|edit_id| translations.get(edit_id))
            else {
                continue;
            };
            let children: Vec<NodeId> = self
                .doc
                .children(source)
                .to_vec()
                .into_iter()
                .map(|child| self.doc.clone_subtree(child))
                .collect();
            self.doc.set_children(node, &children);
        }
    }

    /// Remove grouping wrappers.
    ///
    /// An editable wrapper is kept as a `<span>` (`<div>` for rich content)
    /// so its edit markers stay addressable in the output.
    fn unwrap_grouping(&mut self, fragment: NodeId) {
        for node in self.doc.descendants(fragment) {
            let grouping = self
                .doc
                .element(node)
                .is_some_and(|el| GROUPING_TAGS.contains(&el.name.as_str()));
            if !grouping {
                continue;
            }
            if !self.doc.has_attr(node, EDIT_ID_ATTR) {
                self.doc.unwrap_node(node);
                continue;
            }
            let tag = match self.doc.attr(node, EDIT_MODE_ATTR) {
                Some("rich") => "div",
                _ => "span",
            };
            if let Some(el) = self.doc.element_mut(node) {
                el.name = tag.to_string();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::source::MemorySource;

    fn expander(files: &[(&str, &str)]) -> Expander<MemorySource> {
        Expander::new(files.iter().copied().collect())
    }

    async fn render(files: &[(&str, &str)], page: &str) -> Result<Expansion, ExpandError> {
        expander(files).expand_file(&ExpandRequest::new(page)).await
    }

    #[tokio::test]
    async fn slot_content_wins_over_default() {
        let out = render(
            &[
                ("a.html", r#"<include src="b.html"><slot id="x">HELLO</slot></include>"#),
                ("b.html", r#"<p id="x">default</p>"#),
            ],
            "a.html",
        )
        .await
        .unwrap();
        assert!(out.html.contains(r#"<p id="x">HELLO</p>"#), "{}", out.html);
        assert!(!out.html.contains("<include"));
        assert!(!out.html.contains("<slot"));
        assert_eq!(out.all_files.len(), 2);
    }

    #[tokio::test]
    async fn non_grouping_slot_replaces_placeholder() {
        let out = render(
            &[
                ("a.html", r#"<include src="b.html"><em id="x">mine</em></include>"#),
                ("b.html", r#"<div><p id="x">default</p></div>"#),
            ],
            "a.html",
        )
        .await
        .unwrap();
        assert_eq!(out.html, r#"<div><em id="x">mine</em></div>"#);
    }

    #[tokio::test]
    async fn unused_default_is_kept() {
        let out = render(
            &[
                ("a.html", r#"<include src="b.html"></include>"#),
                ("b.html", r#"<p id="x">default</p>"#),
            ],
            "a.html",
        )
        .await
        .unwrap();
        assert_eq!(out.html, r#"<p id="x">default</p>"#);
    }

    #[tokio::test]
    async fn includes_resolve_relative_to_their_file() {
        let out = render(
            &[
                ("pages/a.html", r#"<include src="../parts/b.html"/>"#),
                ("parts/b.html", r#"<nav><include src="c.html"/></nav>"#),
                ("parts/c.html", "<a>home</a>"),
            ],
            "pages/a.html",
        )
        .await
        .unwrap();
        assert_eq!(out.html, "<nav><a>home</a></nav>");
    }

    #[tokio::test]
    async fn slot_content_includes_resolve_against_origin() {
        // The include inside the slot is written in pages/a.html, so it
        // resolves to pages/note.html even though it lands in parts/b.html.
        let out = render(
            &[
                (
                    "pages/a.html",
                    r#"<include src="/parts/b.html"><slot id="body"><include src="note.html"/></slot></include>"#,
                ),
                ("parts/b.html", r#"<main id="body"></main>"#),
                ("pages/note.html", "<i>note</i>"),
            ],
            "pages/a.html",
        )
        .await
        .unwrap();
        assert_eq!(out.html, r#"<main id="body"><i>note</i></main>"#);
    }

    #[tokio::test]
    async fn nested_slots_pass_through_two_levels() {
        let out = render(
            &[
                (
                    "a.html",
                    r#"<include src="b.html"><slot id="title">Outer</slot></include>"#,
                ),
                (
                    "b.html",
                    r#"<include src="c.html"><slot id="head"><h1 id="title">b-default</h1></slot></include>"#,
                ),
                ("c.html", r#"<header id="head"></header>"#),
            ],
            "a.html",
        )
        .await
        .unwrap();
        assert_eq!(
            out.html,
            r#"<header id="head"><h1 id="title">Outer</h1></header>"#
        );
    }

    #[tokio::test]
    async fn editable_marking() {
        let out = render(
            &[(
                "index.html",
                r#"<h1 edit id="t">Title</h1><div edit id="b"><p>one</p></div>"#,
            )],
            "index.html",
        )
        .await
        .unwrap();
        assert_eq!(
            out.html,
            concat!(
                r#"<h1 id="t" data-edit-id="index-t" data-edit="text">Title</h1>"#,
                r#"<div id="b" data-edit-id="index-b" data-edit="rich"><p>one</p></div>"#
            )
        );
    }

    #[tokio::test]
    async fn position_points_at_content() {
        let page = "<html>\n<body>\n<p edit id=\"greet\">Hi there</p>\n</body>\n</html>\n";
        let out = render(&[("site/home.html", page)], "site/home.html")
            .await
            .unwrap();
        let pos = out.positions.get("home-greet").unwrap();
        assert_eq!(pos.filename, "site/home.html");
        assert_eq!(&page[pos.start..pos.end()], "Hi there");
        assert_eq!(&page[pos.start - 1..pos.start], ">");
    }

    #[tokio::test]
    async fn include_positions_point_into_included_file() {
        let part = "<footer>\n  <span edit id=\"copy\">(c) 2024</span>\n</footer>";
        let out = render(
            &[("index.html", r#"<include src="footer.html"/>"#), ("footer.html", part)],
            "index.html",
        )
        .await
        .unwrap();
        let pos = out.positions.get("footer-copy").unwrap();
        assert_eq!(pos.filename, "footer.html");
        assert_eq!(&part[pos.start..pos.end()], "(c) 2024");
    }

    #[tokio::test]
    async fn editable_slot_takes_over_placeholder_id() {
        let page = r#"<include src="card.html"><slot id="title" edit>Mine</slot></include>"#;
        let out = render(
            &[
                ("page.html", page),
                ("card.html", r#"<h2 id="title" edit>Untitled</h2>"#),
            ],
            "page.html",
        )
        .await
        .unwrap();
        assert_eq!(
            out.html,
            r#"<h2 id="title" data-edit-id="page-title" data-edit="text">Mine</h2>"#
        );
        let pos = out.positions.get("page-title").unwrap();
        assert_eq!(&page[pos.start..pos.end()], "Mine");
    }

    #[tokio::test]
    async fn plain_slot_drops_placeholder_editability() {
        let out = render(
            &[
                ("page.html", r#"<include src="card.html"><slot id="title">Mine</slot></include>"#),
                ("card.html", r#"<h2 id="title" edit>Untitled</h2>"#),
            ],
            "page.html",
        )
        .await
        .unwrap();
        assert_eq!(out.html, r#"<h2 id="title">Mine</h2>"#);
    }

    #[tokio::test]
    async fn shared_include_ids_collide() {
        let out = render(
            &[
                (
                    "index.html",
                    r#"<include src="box.html"/><include src="box.html"/>"#,
                ),
                ("box.html", r#"<p edit id="x">box</p>"#),
            ],
            "index.html",
        )
        .await
        .unwrap();
        assert!(matches!(
            out.positions.get("box-x"),
            Err(ExpandError::AmbiguousTarget { .. })
        ));
    }

    #[tokio::test]
    async fn editable_without_id_fails_with_offset() {
        let err = render(&[("index.html", "<div>\n<p edit>x</p></div>")], "index.html")
            .await
            .unwrap_err();
        match err {
            ExpandError::EditableWithoutId { file, offset } => {
                assert_eq!(file, "index.html");
                assert_eq!(offset, 6);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn include_errors_abort_the_page() {
        let missing_src = render(&[("a.html", "<include></include>")], "a.html").await;
        assert!(matches!(missing_src, Err(ExpandError::MissingIncludeSrc { .. })));

        let missing_file = render(&[("a.html", r#"<include src="nope.html"/>"#)], "a.html").await;
        let err = missing_file.unwrap_err();
        assert!(matches!(err, ExpandError::IncludeNotFound { .. }));
        assert!(!err.is_not_found());

        let escaping = render(&[("a.html", r#"<include src="../x.html"/>"#)], "a.html").await;
        assert!(matches!(escaping, Err(ExpandError::PathEscapesRoot { .. })));
    }

    #[tokio::test]
    async fn include_cycle_is_bounded() {
        let err = render(&[("a.html", r#"<include src="a.html"/>"#)], "a.html")
            .await
            .unwrap_err();
        assert!(matches!(err, ExpandError::IncludeTooDeep { .. }));
    }

    #[tokio::test]
    async fn missing_page_is_not_found() {
        let err = render(&[], "a.html").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn group_wrappers_are_unwrapped() {
        let out = render(&[("a.html", "<group><b>1</b><i>2</i></group>")], "a.html")
            .await
            .unwrap();
        assert_eq!(out.html, "<b>1</b><i>2</i>");
    }

    #[tokio::test]
    async fn editable_grouping_keeps_its_markers() {
        let out = render(
            &[
                ("index.html", r#"<include src="b.html"/>"#),
                ("b.html", r#"<h1><slot id="title" edit>Untitled</slot></h1>"#),
            ],
            "index.html",
        )
        .await
        .unwrap();
        assert_eq!(
            out.html,
            r#"<h1><span id="title" data-edit-id="b-title" data-edit="text">Untitled</span></h1>"#
        );
        assert!(out.positions.contains("b-title"));
    }

    #[tokio::test]
    async fn editable_rich_group_becomes_div() {
        let out = render(
            &[("a.html", r#"<group id="g" edit><p>one</p></group>"#)],
            "a.html",
        )
        .await
        .unwrap();
        assert_eq!(
            out.html,
            r#"<div id="g" data-edit-id="a-g" data-edit="rich"><p>one</p></div>"#
        );
    }

    mod languages {
        use super::*;

        fn site() -> Vec<(&'static str, &'static str)> {
            vec![
                ("docs/index.html", r#"<h1 edit id="t">Hello</h1><p edit id="u">Keep</p>"#),
                ("docs/config.json", r#"{"langs": ["en", "de", "fr"]}"#),
                ("docs/lang-de.html", "<div id=\"index-t\">Hallo</div>\n"),
            ]
        }

        async fn render_in(langs: &[&str]) -> Expansion {
            let request = ExpandRequest::new("docs/index.html")
                .languages(langs.iter().map(|s| s.to_string()).collect());
            expander(&site()).expand_file(&request).await.unwrap()
        }

        #[tokio::test]
        async fn overlay_replaces_translated_content_only() {
            let out = render_in(&["de"]).await;
            assert_eq!(out.lang, "de");
            assert_eq!(out.overlay_path.as_deref(), Some("docs/lang-de.html"));
            assert!(out.html.contains(">Hallo</h1>"));
            assert!(out.html.contains(">Keep</p>"));
            assert!(!out.is_primary_lang());
        }

        #[tokio::test]
        async fn primary_language_loads_no_overlay() {
            let out = render_in(&["en", "de"]).await;
            assert_eq!(out.lang, "en");
            assert!(out.overlay.is_none());
            assert!(out.html.contains(">Hello</h1>"));
            assert!(out.is_primary_lang());
        }

        #[tokio::test]
        async fn missing_overlay_falls_through() {
            // fr is declared but has no overlay file.
            let out = render_in(&["fr", "de"]).await;
            assert_eq!(out.lang, "de");

            let out = render_in(&["fr"]).await;
            assert_eq!(out.lang, "en");
        }

        #[tokio::test]
        async fn region_subtag_matches() {
            let out = render_in(&["de-AT"]).await;
            assert_eq!(out.lang, "de");
        }

        #[tokio::test]
        async fn undeclared_page_uses_default_language() {
            let request = ExpandRequest::new("a.html")
                .languages(vec!["de".into()])
                .default_lang("en");
            let out = expander(&[("a.html", "<p>x</p>")])
                .expand_file(&request)
                .await
                .unwrap();
            assert_eq!(out.lang, "en");
            assert_eq!(out.langs, vec!["en".to_string()]);
        }
    }
}
