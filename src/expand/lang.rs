//! expand::lang
//!
//! Page languages and overlay lookup.
//!
//! A page directory may carry `config.json` declaring its languages:
//!
//! ```json
//! { "langs": ["en", "de", "fr"] }
//! ```
//!
//! The first declared language is the page's own; every other language
//! has an overlay `lang-<code>.html` in the same directory. Without a
//! readable config the page has the single configured default language.

use serde::Deserialize;
use tracing::debug;

use super::path::dir_prefix;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageConfig {
    #[serde(default)]
    pub langs: Vec<String>,
}

/// Languages declared for a page, first one primary.
///
/// Falls back to `[default_lang]` when `config_json` is absent, does not
/// parse, or declares no languages.
pub fn page_languages(config_json: Option<&str>, default_lang: &str) -> Vec<String> {
    let declared = config_json.and_then(|text| match serde_json::from_str::<PageConfig>(text) {
        Ok(config) => Some(config.langs),
        Err(err) => {
            debug!(error = %err, "ignoring unparseable page config");
            None
        }
    });

    match declared {
        Some(langs) if !langs.is_empty() => langs,
        _ => vec![default_lang.to_string()],
    }
}

/// Declared languages matching the caller's preferences, best first.
///
/// Exact matches (case-insensitive) in preference order come first, then
/// primary-subtag matches (`de-CH` matching `de`). Duplicates are removed.
///
/// ```
/// use gitfolio::expand::lang::candidates;
///
/// let declared = vec!["en".to_string(), "de".to_string()];
/// let wanted = vec!["fr".to_string(), "de-CH".to_string(), "en".to_string()];
/// assert_eq!(candidates(&wanted, &declared), vec!["en", "de"]);
/// ```
pub fn candidates<'a>(preferences: &[String], declared: &'a [String]) -> Vec<&'a str> {
    let mut out: Vec<&'a str> = Vec::new();
    let mut push = |lang: &'a str| {
        if !out.contains(&lang) {
            out.push(lang);
        }
    };

    for wanted in preferences {
        if let Some(found) = declared.iter().find(|d| d.eq_ignore_ascii_case(wanted)) {
            push(found);
        }
    }
    for wanted in preferences {
        let primary = primary_subtag(wanted);
        if let Some(found) = declared
            .iter()
            .find(|d| primary_subtag(d).eq_ignore_ascii_case(primary))
        {
            push(found);
        }
    }
    out
}

fn primary_subtag(tag: &str) -> &str {
    tag.split(['-', '_']).next().unwrap_or(tag)
}

/// Path of the `config.json` next to `page`.
pub fn config_path(page: &str) -> String {
    format!("{}config.json", dir_prefix(page))
}

/// Path of the overlay for `lang` next to `page`.
pub fn overlay_path(page: &str, lang: &str) -> String {
    format!("{}lang-{}.html", dir_prefix(page), lang)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn langs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn declared_languages_parsed() {
        assert_eq!(
            page_languages(Some(r#"{"langs": ["de", "en"]}"#), "en"),
            langs(&["de", "en"])
        );
    }

    #[test]
    fn missing_or_bad_config_uses_default() {
        assert_eq!(page_languages(None, "en"), langs(&["en"]));
        assert_eq!(page_languages(Some("{not json"), "fr"), langs(&["fr"]));
        assert_eq!(page_languages(Some(r#"{"langs": []}"#), "en"), langs(&["en"]));
        assert_eq!(page_languages(Some(r#"{"title": "x"}"#), "en"), langs(&["en"]));
    }

    #[test]
    fn exact_matches_beat_subtag_matches() {
        let declared = langs(&["en", "de", "de-ch"]);
        let wanted = langs(&["de-AT", "DE-CH"]);
        assert_eq!(candidates(&wanted, &declared), vec!["de-ch", "de"]);
    }

    #[test]
    fn no_overlap_yields_nothing() {
        assert!(candidates(&langs(&["ja"]), &langs(&["en"])).is_empty());
    }

    #[test]
    fn sibling_paths() {
        assert_eq!(config_path("docs/index.html"), "docs/config.json");
        assert_eq!(overlay_path("docs/index.html", "de"), "docs/lang-de.html");
        assert_eq!(overlay_path("index.html", "de"), "lang-de.html");
    }
}
