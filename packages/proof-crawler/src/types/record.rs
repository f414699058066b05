//! Record types - one harvested item per source URL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attributes extracted from the primary item container of a page.
///
/// Engagement counters are kept exactly as rendered (e.g. `"1.2K"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFields {
    pub author: String,
    pub text: String,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub likes: String,
    #[serde(default)]
    pub shares: String,
    #[serde(default)]
    pub views: String,
}

impl ItemFields {
    /// Create fields with author and text only.
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
            comments: String::new(),
            likes: String::new(),
            shares: String::new(),
            views: String::new(),
        }
    }

    /// Set the four engagement counters in page order.
    pub fn with_counts(
        mut self,
        comments: impl Into<String>,
        likes: impl Into<String>,
        shares: impl Into<String>,
        views: impl Into<String>,
    ) -> Self {
        self.comments = comments.into();
        self.likes = likes.into();
        self.shares = shares.into();
        self.views = views.into();
        self
    }
}

/// A harvested item, keyed by its source URL.
///
/// A record without fields means nothing usable was found on the page;
/// callers skip persistence for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Source URL (primary key)
    pub url: String,

    /// Round the record was harvested in
    pub round: u64,

    /// Extracted attributes, `None` when the page had no usable container
    pub fields: Option<ItemFields>,

    /// When the page was rendered
    pub crawled_at: DateTime<Utc>,
}

impl Record {
    /// Create a record with extracted fields.
    pub fn new(url: impl Into<String>, round: u64, fields: ItemFields) -> Self {
        Self {
            url: url.into(),
            round,
            fields: Some(fields),
            crawled_at: Utc::now(),
        }
    }

    /// Create an empty record for a page with nothing usable on it.
    pub fn empty(url: impl Into<String>, round: u64) -> Self {
        Self {
            url: url.into(),
            round,
            fields: None,
            crawled_at: Utc::now(),
        }
    }

    /// Whether extraction found nothing usable.
    pub fn is_empty(&self) -> bool {
        self.fields.is_none()
    }

    /// Build the JSON document anchored in content-addressed storage.
    ///
    /// Returns `None` for empty records.
    pub fn to_blob(&self) -> Option<ItemBlob> {
        self.fields.as_ref().map(|fields| ItemBlob {
            url: self.url.clone(),
            round: self.round,
            fields: fields.clone(),
        })
    }
}

/// The per-item document written to content-addressed storage.
///
/// Carries no timestamps: auditors re-render `url` and compare against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemBlob {
    pub url: String,
    pub round: u64,
    #[serde(flatten)]
    pub fields: ItemFields,
}
