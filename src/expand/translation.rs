//! expand::translation
//!
//! Edits to language overlay documents.
//!
//! An overlay holds one element per translated fragment, keyed by the
//! fragment's generated edit id:
//!
//! ```html
//! <div id="about-greet">Hallo zusammen</div>
//!
//! <div id="about-body"><p>Willkommen.</p></div>
//! ```
//!
//! Updates splice the raw text: bytes outside the replaced content are
//! left exactly as they were.

use super::dom::{Document, NodeId};

/// Set the overlay content for `id` to `html`.
///
/// Replaces the content of the first element with that id, or appends a
/// new `<div id="...">` separated from existing content by a blank line.
///
/// # Example
///
/// ```
/// use gitfolio::expand::translation::{lookup_translation, set_translation};
///
/// let overlay = set_translation("", "home-title", "Willkommen");
/// let overlay = set_translation(&overlay, "home-title", "Hallo");
/// assert_eq!(lookup_translation(&overlay, "home-title").as_deref(), Some("Hallo"));
/// ```
pub fn set_translation(overlay: &str, id: &str, html: &str) -> String {
    let (doc, root) = Document::parse(overlay);

    if let Some(span) = find(&doc, root, id).and_then(|node| doc.span(node)) {
        let mut out = String::with_capacity(overlay.len() + html.len());
        if span.close_start.is_some() {
            let content = span.content();
            out.push_str(&overlay[..content.start]);
            out.push_str(html);
            out.push_str(&overlay[content.end..]);
        } else {
            // Void or unclosed element: swap in a full wrapper.
            out.push_str(&overlay[..span.start]);
            out.push_str(&wrapper(id, html));
            out.push_str(&overlay[span.end..]);
        }
        return out;
    }

    let existing = overlay.trim_end();
    if existing.is_empty() {
        format!("{}\n", wrapper(id, html))
    } else {
        format!("{}\n\n{}\n", existing, wrapper(id, html))
    }
}

/// Raw content of the overlay element with `id`, if any.
pub fn lookup_translation(overlay: &str, id: &str) -> Option<String> {
    let (doc, root) = Document::parse(overlay);
    let span = doc.span(find(&doc, root, id)?)?;
    Some(overlay[span.content()].to_string())
}

/// Number of elements with `id` in the overlay.
pub fn count_translations(overlay: &str, id: &str) -> usize {
    let (doc, root) = Document::parse(overlay);
    doc.find_by_attr(root, "id", id).len()
}

fn find(doc: &Document, root: NodeId, id: &str) -> Option<NodeId> {
    doc.find_by_attr(root, "id", id).into_iter().next()
}

fn wrapper(id: &str, html: &str) -> String {
    format!("<div id=\"{}\">{}</div>", id.replace('"', "&quot;"), html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_to_empty_overlay() {
        assert_eq!(
            set_translation("", "a-x", "Hallo"),
            "<div id=\"a-x\">Hallo</div>\n"
        );
    }

    #[test]
    fn appends_after_blank_line() {
        let overlay = "<div id=\"a-x\">Hallo</div>\n";
        assert_eq!(
            set_translation(overlay, "a-y", "Welt"),
            "<div id=\"a-x\">Hallo</div>\n\n<div id=\"a-y\">Welt</div>\n"
        );
    }

    #[test]
    fn trailing_whitespace_collapses_to_one_blank_line() {
        let overlay = "<div id=\"a-x\">Hallo</div>\n\n\n   \n";
        let updated = set_translation(overlay, "a-y", "Welt");
        assert!(updated.contains("</div>\n\n<div id=\"a-y\">"));
    }

    #[test]
    fn replaces_in_place_and_keeps_surroundings() {
        let overlay = "<!-- de -->\n<section id=\"a-x\" class=\"t\">Alt</section>\nrest";
        assert_eq!(
            set_translation(overlay, "a-x", "<b>Neu</b>"),
            "<!-- de -->\n<section id=\"a-x\" class=\"t\"><b>Neu</b></section>\nrest"
        );
    }

    #[test]
    fn nested_target_found() {
        let overlay = "<div><p id=\"a-x\">Alt</p></div>";
        assert_eq!(
            set_translation(overlay, "a-x", "Neu"),
            "<div><p id=\"a-x\">Neu</p></div>"
        );
    }

    #[test]
    fn void_target_replaced_by_wrapper() {
        let overlay = "<img id=\"a-x\">\n";
        assert_eq!(
            set_translation(overlay, "a-x", "Bild"),
            "<div id=\"a-x\">Bild</div>\n"
        );
    }

    #[test]
    fn second_write_replaces_not_duplicates() {
        let once = set_translation("", "a-x", "C");
        let twice = set_translation(&once, "a-x", "D");
        assert_eq!(lookup_translation(&twice, "a-x").as_deref(), Some("D"));
        assert_eq!(count_translations(&twice, "a-x"), 1);
    }

    #[test]
    fn lookup_missing_id() {
        assert_eq!(lookup_translation("<div id=\"b\">x</div>", "a"), None);
    }
}
