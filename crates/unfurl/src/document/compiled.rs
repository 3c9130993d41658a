// ABOUTME: Pre-compiled CSS selector cache shared by every extraction pass.
// ABOUTME: Rules are compiled once at load time; invalid selectors are cached as misses.

//! Selector caching for repeated rule evaluation.
//!
//! The same handful of selectors is evaluated against every fetched page, so
//! each selector string is parsed once and reused for the lifetime of the
//! process.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use once_cell::sync::Lazy;
use scraper::Selector;

/// Thread-safe cache of compiled CSS selectors.
static SELECTOR_CACHE: Lazy<RwLock<HashMap<String, Option<Selector>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Gets or compiles a CSS selector, caching the result.
///
/// Returns `None` for selectors that fail to parse; the failure is cached too
/// so a broken rule costs one parse attempt per process.
pub fn get_or_compile(css: &str) -> Option<Selector> {
    {
        let cache = SELECTOR_CACHE.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = cache.get(css) {
            return cached.clone();
        }
    }

    let compiled = Selector::parse(css).ok();
    let mut cache = SELECTOR_CACHE
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(cached) = cache.get(css) {
        return cached.clone();
    }
    cache.insert(css.to_string(), compiled.clone());
    compiled
}

/// Precompiles a batch of selectors into the cache.
///
/// Returns the selectors that failed to compile so the caller can report them.
pub fn precompile_selectors<I, S>(selectors: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut invalid = Vec::new();
    let mut cache = SELECTOR_CACHE
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    for css in selectors {
        let css = css.as_ref();
        let entry = cache
            .entry(css.to_string())
            .or_insert_with(|| Selector::parse(css).ok());
        if entry.is_none() {
            invalid.push(css.to_string());
        }
    }
    invalid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_selector_is_cached() {
        assert!(get_or_compile("meta[property='og:title']").is_some());
        assert!(get_or_compile("meta[property='og:title']").is_some());
    }

    #[test]
    fn invalid_selector_returns_none() {
        assert!(get_or_compile("[[[invalid").is_none());
        assert!(get_or_compile("[[[invalid").is_none());
    }

    #[test]
    fn precompile_reports_invalid() {
        let invalid = precompile_selectors(["h1", "link[rel='canonical']", "a[[["]);
        assert_eq!(invalid, vec!["a[[[".to_string()]);
        assert!(get_or_compile("h1").is_some());
    }
}
