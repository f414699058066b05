//! Field extraction from rendered item pages.

use scraper::{ElementRef, Html, Selector};

use crate::error::{CrawlerError, Result};
use crate::types::config::PlatformConfig;
use crate::types::record::ItemFields;

/// Platform selectors, parsed once.
#[derive(Debug, Clone)]
pub struct PageSelectors {
    item: Selector,
    text: Selector,
    author: Selector,
    counter: Selector,
}

fn parse(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|_| CrawlerError::InvalidSelector {
        selector: selector.to_string(),
    })
}

impl PageSelectors {
    pub fn compile(platform: &PlatformConfig) -> Result<Self> {
        Ok(Self {
            item: parse(&platform.item_selector)?,
            text: parse(&platform.text_selector)?,
            author: parse(&platform.author_selector)?,
            counter: parse(&platform.counter_selector)?,
        })
    }
}

/// What one item page yields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPage {
    /// The first item container; `None` when the page shows no items or
    /// the first one lacks an author or text
    pub primary: Option<ItemFields>,

    /// Authors of every following container, in page order
    pub reply_authors: Vec<String>,
}

fn joined_text(container: ElementRef<'_>, selector: &Selector) -> String {
    container
        .select(selector)
        .flat_map(|el| el.text())
        .collect::<String>()
}

fn item_fields(container: ElementRef<'_>, selectors: &PageSelectors) -> Option<ItemFields> {
    let text = joined_text(container, &selectors.text).replace('\n', "<br>");
    let author = joined_text(container, &selectors.author);
    if author.is_empty() || text.is_empty() {
        return None;
    }

    let mut counters = container
        .select(&selectors.counter)
        .map(|el| el.text().collect::<String>());
    let mut next = || counters.next().unwrap_or_default();
    let (comments, likes, shares, views) = (next(), next(), next(), next());

    Some(ItemFields::new(author, text).with_counts(comments, likes, shares, views))
}

/// Pull the primary item and reply authors out of a rendered page.
pub fn parse_item_page(html: &str, selectors: &PageSelectors) -> ParsedPage {
    let document = Html::parse_document(html);
    let mut containers = document.select(&selectors.item);

    let Some(first) = containers.next() else {
        return ParsedPage::default();
    };

    let reply_authors = containers
        .map(|el| joined_text(el, &selectors.author))
        .filter(|author| !author.is_empty())
        .collect();

    ParsedPage {
        primary: item_fields(first, selectors),
        reply_authors,
    }
}

/// Search URL for `term` in posts by `author`.
pub fn reply_search_url(search_url: &str, author: &str, term: &str) -> String {
    format!(
        "{}?q={}%20{}&src=typed_query",
        search_url,
        urlencoding::encode(author),
        urlencoding::encode(term)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{item_page_html, ItemFixture};

    fn selectors() -> PageSelectors {
        PageSelectors::compile(&PlatformConfig::default()).unwrap()
    }

    #[test]
    fn test_primary_item_fields() {
        let html = item_page_html(
            &ItemFixture::new("@alice", "hello world").with_counts("3", "10", "1", "1.2K"),
            &[],
        );
        let parsed = parse_item_page(&html, &selectors());
        let fields = parsed.primary.unwrap();

        assert_eq!(fields.author, "@alice");
        assert_eq!(fields.text, "hello world");
        assert_eq!(fields.comments, "3");
        assert_eq!(fields.likes, "10");
        assert_eq!(fields.shares, "1");
        assert_eq!(fields.views, "1.2K");
        assert!(parsed.reply_authors.is_empty());
    }

    #[test]
    fn test_newlines_become_breaks() {
        let html = item_page_html(&ItemFixture::new("a", "line one\nline two"), &[]);
        let fields = parse_item_page(&html, &selectors()).primary.unwrap();
        assert_eq!(fields.text, "line one<br>line two");
    }

    #[test]
    fn test_missing_counters_are_empty() {
        let html = r#"<article data-testid="tweet"><a tabindex="-1">dan</a><div data-testid="tweetText">hi</div></article>"#;
        let fields = parse_item_page(html, &selectors()).primary.unwrap();
        assert_eq!(fields.author, "dan");
        assert_eq!(fields.views, "");
    }

    #[test]
    fn test_item_without_author_is_unusable() {
        let html = r#"<article data-testid="tweet"><div data-testid="tweetText">hi</div></article>"#;
        assert!(parse_item_page(html, &selectors()).primary.is_none());
    }

    #[test]
    fn test_reply_authors_in_order() {
        let html = item_page_html(
            &ItemFixture::new("alice", "root"),
            &[ItemFixture::new("bob", "r1"), ItemFixture::new("carol", "r2")],
        );
        let parsed = parse_item_page(&html, &selectors());
        assert_eq!(parsed.reply_authors, vec!["bob", "carol"]);
    }

    #[test]
    fn test_page_without_items() {
        let parsed = parse_item_page("<html><body><p>gone</p></body></html>", &selectors());
        assert_eq!(parsed, ParsedPage::default());
    }

    #[test]
    fn test_reply_search_url() {
        assert_eq!(
            reply_search_url("https://twitter.com/search", "@bob", "rust lang"),
            "https://twitter.com/search?q=%40bob%20rust%20lang&src=typed_query"
        );
    }

    #[test]
    fn test_bad_selector_is_reported() {
        let platform = PlatformConfig {
            item_selector: "article[".to_string(),
            ..PlatformConfig::default()
        };
        assert!(matches!(
            PageSelectors::compile(&platform),
            Err(CrawlerError::InvalidSelector { .. })
        ));
    }
}
