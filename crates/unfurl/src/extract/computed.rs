// ABOUTME: Built-in computed strategies that need more than a single selector lookup.
// ABOUTME: First-paragraph description, largest declared icon, and advertised feed URL.

use crate::document::{normalize_whitespace, ParsedDocument};
use crate::rules::Computed;

/// Minimum length of a paragraph used as a description fallback.
const MIN_PARAGRAPH_CHARS: usize = 50;
/// Maximum length of a paragraph-derived description.
const MAX_PARAGRAPH_CHARS: usize = 300;

const FEED_TYPES: &[&str] = &[
    "application/rss+xml",
    "application/atom+xml",
    "application/feed+json",
    "application/json",
];

pub fn evaluate(function: Computed, doc: &ParsedDocument) -> Option<String> {
    match function {
        Computed::FirstParagraph => first_paragraph(doc),
        Computed::LargestIcon => largest_icon(doc),
        Computed::FeedUrl => feed_url(doc),
    }
}

fn first_paragraph(doc: &ParsedDocument) -> Option<String> {
    doc.select_all("p").into_iter().find_map(|p| {
        let text = normalize_whitespace(&p.text().collect::<String>());
        if text.chars().count() < MIN_PARAGRAPH_CHARS {
            return None;
        }
        let truncated: String = text.chars().take(MAX_PARAGRAPH_CHARS).collect();
        Some(truncated.trim_end().to_string())
    })
}

/// Area of the largest `WxH` entry in a `sizes` attribute; `any` wins outright.
fn icon_area(sizes: &str) -> u64 {
    sizes
        .split_whitespace()
        .map(|size| {
            if size.eq_ignore_ascii_case("any") {
                return u64::MAX;
            }
            let mut dims = size.split(|c| c == 'x' || c == 'X');
            match (
                dims.next().and_then(|w| w.parse::<u64>().ok()),
                dims.next().and_then(|h| h.parse::<u64>().ok()),
            ) {
                (Some(w), Some(h)) => w.saturating_mul(h),
                _ => 0,
            }
        })
        .max()
        .unwrap_or(0)
}

fn largest_icon(doc: &ParsedDocument) -> Option<String> {
    let mut best: Option<(u64, String)> = None;
    for link in doc.select_all("link[rel][href]") {
        let el = link.value();
        let is_icon = el.attr("rel").is_some_and(|rel| {
            rel.split_whitespace().any(|token| {
                let token = token.to_ascii_lowercase();
                token == "icon" || token.starts_with("apple-touch-icon")
            })
        });
        let href = el.attr("href").map(str::trim).unwrap_or_default();
        if !is_icon || href.is_empty() {
            continue;
        }
        let area = el.attr("sizes").map(icon_area).unwrap_or(0);
        if best.as_ref().map_or(true, |(best_area, _)| area > *best_area) {
            best = Some((area, href.to_string()));
        }
    }
    best.map(|(_, href)| href)
}

fn feed_url(doc: &ParsedDocument) -> Option<String> {
    doc.select_all("link[rel~='alternate'][href]")
        .into_iter()
        .find_map(|link| {
            let el = link.value();
            let ty = el.attr("type")?.trim().to_ascii_lowercase();
            if !FEED_TYPES.contains(&ty.as_str()) {
                return None;
            }
            let href = el.attr("href")?.trim();
            (!href.is_empty()).then(|| href.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse;

    #[test]
    fn first_paragraph_skips_short_and_truncates() {
        let long = "word ".repeat(100);
        let html = format!("<p>Too short.</p><p>{}</p>", long);
        let doc = parse(&html);
        let text = evaluate(Computed::FirstParagraph, &doc).unwrap();
        assert!(text.starts_with("word word"));
        assert!(text.chars().count() <= MAX_PARAGRAPH_CHARS);
        assert!(!text.ends_with(' '));
    }

    #[test]
    fn first_paragraph_none_when_all_short() {
        let doc = parse("<p>a</p><p>b</p>");
        assert!(evaluate(Computed::FirstParagraph, &doc).is_none());
    }

    #[test]
    fn largest_icon_prefers_biggest_size() {
        let doc = parse(
            r#"<head>
            <link rel="icon" href="/favicon-16.png" sizes="16x16">
            <link rel="apple-touch-icon" href="/touch-180.png" sizes="180x180">
            <link rel="icon" href="/favicon-32.png" sizes="32x32">
            <link rel="stylesheet" href="/big.css" sizes="999x999">
            </head>"#,
        );
        assert_eq!(
            evaluate(Computed::LargestIcon, &doc),
            Some("/touch-180.png".to_string())
        );
    }

    #[test]
    fn largest_icon_falls_back_to_first_without_sizes() {
        let doc = parse(
            r#"<link rel="Shortcut Icon" href="/a.ico"><link rel="icon" href="/b.ico">"#,
        );
        assert_eq!(evaluate(Computed::LargestIcon, &doc), Some("/a.ico".to_string()));
    }

    #[test]
    fn icon_area_parsing() {
        assert_eq!(icon_area("16x16 32x32"), 1024);
        assert_eq!(icon_area("any"), u64::MAX);
        assert_eq!(icon_area("bogus"), 0);
        assert_eq!(icon_area("99999999999x99999999999"), u64::MAX);
    }

    #[test]
    fn largest_icon_tolerates_oversized_dimensions() {
        let doc = parse(
            r#"<link rel="icon" href="/small.png" sizes="16x16">
               <link rel="icon" href="/huge.png" sizes="99999999999x99999999999">"#,
        );
        assert_eq!(evaluate(Computed::LargestIcon, &doc), Some("/huge.png".to_string()));
    }

    #[test]
    fn feed_url_matches_known_types() {
        let doc = parse(
            r#"<link rel="alternate" hreflang="fr" href="/fr/">
               <link rel="alternate" type="application/atom+xml" href="/feed.atom">"#,
        );
        assert_eq!(evaluate(Computed::FeedUrl, &doc), Some("/feed.atom".to_string()));
        assert!(evaluate(Computed::FeedUrl, &parse("<p>no feed</p>")).is_none());
    }
}
