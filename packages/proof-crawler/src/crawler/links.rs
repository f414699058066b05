//! Permalink discovery on listing pages.

use lazy_static::lazy_static;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

lazy_static! {
    // `/status/<digits>` as the last path segment, e.g. `/alice/status/1783`
    static ref PERMALINK_REGEX: Regex = Regex::new(r"/status/\d+[^/]*$").unwrap();
}

/// Whether `href` points at an individual item.
pub fn is_permalink(href: &str) -> bool {
    PERMALINK_REGEX.is_match(href)
}

/// Collect item permalinks from a rendered page.
///
/// Hrefs are resolved against `base`. Order of first appearance is kept and
/// duplicates are dropped.
pub fn extract_permalinks(html: &str, base: &Url) -> Vec<String> {
    let link_selector = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return vec![],
    };

    let document = Html::parse_document(html);
    let mut seen = HashSet::new();

    document
        .select(&link_selector)
        .filter_map(|el| el.value().attr("href"))
        .filter(|href| is_permalink(href))
        .filter_map(|href| base.join(href).ok())
        .filter(|url| url.scheme() == "http" || url.scheme() == "https")
        .filter(|url| is_permalink(url.path()))
        .map(|url| url.to_string())
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/search?q=test").unwrap()
    }

    #[test]
    fn test_permalink_pattern() {
        assert!(is_permalink("/alice/status/123"));
        assert!(is_permalink("/status/123"));
        assert!(is_permalink("https://example.com/bob/status/9?s=20"));
        assert!(!is_permalink("/alice/status/123/photo/1"));
        assert!(!is_permalink("/alice/status/"));
        assert!(!is_permalink("/alice"));
    }

    #[test]
    fn test_extracts_and_resolves() {
        let html = r#"
            <a href="/status/111">one</a>
            <a href="/home">home</a>
            <a href="/status/222">two</a>
            <a href="/status/111">again</a>
            <a href="/status/333/analytics">stats</a>
        "#;
        let links = extract_permalinks(html, &base());
        assert_eq!(
            links,
            vec![
                "https://example.com/status/111".to_string(),
                "https://example.com/status/222".to_string(),
            ]
        );
    }

    #[test]
    fn test_keeps_absolute_links() {
        let html = r#"<a href="https://other.example/carol/status/5">x</a>"#;
        assert_eq!(
            extract_permalinks(html, &base()),
            vec!["https://other.example/carol/status/5".to_string()]
        );
    }

    #[test]
    fn test_no_links() {
        assert!(extract_permalinks("<html><body>nothing</body></html>", &base()).is_empty());
    }
}
