// ABOUTME: ParsedDocument, a read-only query handle over a tolerant HTML parse tree.
// ABOUTME: Exposes first-match selector, attribute and meta-tag lookups used by rule strategies.

//! Document parsing and lookups.
//!
//! Parsing never fails: html5ever repairs malformed markup, and tag and
//! attribute names are lowercased by the parser, so lookups are
//! case-insensitive on names. A missing element is an ordinary `None`.

pub mod compiled;

use scraper::{ElementRef, Html};

use crate::document::compiled::get_or_compile;

/// Which attribute of a `<meta>` tag carries its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaKey {
    Name,
    Property,
}

impl MetaKey {
    fn attr(self) -> &'static str {
        match self {
            MetaKey::Name => "name",
            MetaKey::Property => "property",
        }
    }
}

/// Immutable, queryable handle over a parsed page.
pub struct ParsedDocument {
    html: Html,
}

/// Parses raw markup into a `ParsedDocument`.
pub fn parse(raw: &str) -> ParsedDocument {
    ParsedDocument {
        html: Html::parse_document(raw),
    }
}

/// Collapses runs of whitespace into single spaces.
pub(crate) fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl ParsedDocument {
    /// All elements matching `css`, in document order. Invalid selectors match nothing.
    pub fn select_all(&self, css: &str) -> Vec<ElementRef<'_>> {
        match get_or_compile(css) {
            Some(sel) => self.html.select(&sel).collect(),
            None => Vec::new(),
        }
    }

    /// First element matching `css`.
    pub fn select_first(&self, css: &str) -> Option<ElementRef<'_>> {
        let sel = get_or_compile(css)?;
        self.html.select(&sel).next()
    }

    /// Whitespace-normalized text of the first matching element with non-empty text.
    pub fn first_text(&self, css: &str) -> Option<String> {
        self.select_all(css).into_iter().find_map(|el| {
            let text = normalize_whitespace(&el.text().collect::<String>());
            (!text.is_empty()).then_some(text)
        })
    }

    /// Untouched text content of the first matching element, trimmed only.
    ///
    /// Used for payloads such as embedded JSON where inner whitespace matters.
    pub fn first_raw_text(&self, css: &str) -> Option<String> {
        self.select_all(css).into_iter().find_map(|el| {
            let text = el.text().collect::<String>();
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
    }

    /// Trimmed value of `attr` on the first matching element that carries a non-empty one.
    pub fn first_attr(&self, css: &str, attr: &str) -> Option<String> {
        self.select_all(css).into_iter().find_map(|el| {
            let value = el.value().attr(attr)?.trim();
            (!value.is_empty()).then(|| value.to_string())
        })
    }

    /// Trimmed `content` of the first `<meta>` whose `name`/`property` equals `key`.
    ///
    /// The key comparison ignores ASCII case, so `Description` and
    /// `description` are the same tag.
    pub fn meta_content(&self, key: &str, by: MetaKey) -> Option<String> {
        self.select_all("meta").into_iter().find_map(|el| {
            let candidate = el.value().attr(by.attr())?;
            if !candidate.trim().eq_ignore_ascii_case(key) {
                return None;
            }
            let content = el.value().attr("content")?.trim();
            (!content.is_empty()).then(|| content.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_HTML: &str = r#"
        <!DOCTYPE html>
        <HTML lang="en">
        <head>
            <META NAME="Description" CONTENT="  A page about things  ">
            <meta property="og:title" content="">
            <meta property="og:title" content="Second OG">
            <script type="application/ld+json">
              {"@type": "Article", "headline": "Two  spaces"}
            </script>
        </head>
        <body>
            <h1>   </h1>
            <h1>  Main
                Heading </h1>
            <img class="hero" src="  /hero.png ">
        </body>
        </HTML>
    "#;

    #[test]
    fn meta_lookup_ignores_case() {
        let doc = parse(SAMPLE_HTML);
        assert_eq!(
            doc.meta_content("description", MetaKey::Name),
            Some("A page about things".to_string())
        );
    }

    #[test]
    fn meta_lookup_skips_empty_content() {
        let doc = parse(SAMPLE_HTML);
        assert_eq!(
            doc.meta_content("og:title", MetaKey::Property),
            Some("Second OG".to_string())
        );
        assert_eq!(doc.meta_content("og:title", MetaKey::Name), None);
    }

    #[test]
    fn first_text_skips_blank_elements_and_normalizes() {
        let doc = parse(SAMPLE_HTML);
        assert_eq!(doc.first_text("h1"), Some("Main Heading".to_string()));
    }

    #[test]
    fn first_raw_text_keeps_inner_whitespace() {
        let doc = parse(SAMPLE_HTML);
        let raw = doc
            .first_raw_text("script[type='application/ld+json']")
            .unwrap();
        assert!(raw.starts_with('{'));
        assert!(raw.contains("Two  spaces"));
    }

    #[test]
    fn first_attr_trims() {
        let doc = parse(SAMPLE_HTML);
        assert_eq!(doc.first_attr("img.hero", "src"), Some("/hero.png".to_string()));
        assert_eq!(doc.first_attr("html", "lang"), Some("en".to_string()));
    }

    #[test]
    fn missing_and_invalid_are_none() {
        let doc = parse(SAMPLE_HTML);
        assert!(doc.first_text("article").is_none());
        assert!(doc.first_text("[[[").is_none());
        assert!(doc.select_first("video").is_none());
    }

    #[test]
    fn malformed_markup_still_parses() {
        let doc = parse("<html><head><title>Broken</title><body><p>unclosed <b>bold");
        assert_eq!(doc.first_text("title"), Some("Broken".to_string()));
        assert_eq!(doc.first_text("p"), Some("unclosed bold".to_string()));
    }
}
