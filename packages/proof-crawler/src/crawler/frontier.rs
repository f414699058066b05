//! FIFO queue of item URLs awaiting extraction.

use std::collections::{HashSet, VecDeque};

/// Pending URLs in discovery order.
///
/// A URL is accepted at most once per run, even after it has been popped,
/// so recursive discovery cannot loop.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<String>,
    seen: HashSet<String>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `url` unless it was already accepted. Returns whether it was added.
    pub fn push(&mut self, url: impl Into<String>) -> bool {
        let url = url.into();
        if !self.seen.insert(url.clone()) {
            return false;
        }
        self.queue.push_back(url);
        true
    }

    /// Append every new URL, keeping order. Returns how many were added.
    pub fn extend<I>(&mut self, urls: I) -> usize
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut added = 0;
        for url in urls {
            if self.push(url) {
                added += 1;
            }
        }
        added
    }

    /// Put a popped URL back at the head so it is retried next.
    pub fn requeue(&mut self, url: impl Into<String>) {
        let url = url.into();
        self.seen.insert(url.clone());
        self.queue.push_front(url);
    }

    /// Take the oldest pending URL.
    pub fn pop(&mut self) -> Option<String> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Whether `url` was accepted at some point this run.
    pub fn has_seen(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    /// Pending URLs, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.queue.iter().map(String::as_str)
    }

    /// Forget everything, including which URLs were seen.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut frontier = Frontier::new();
        frontier.extend(["a", "b", "c"]);
        assert_eq!(frontier.pop().as_deref(), Some("a"));
        assert_eq!(frontier.pop().as_deref(), Some("b"));
        assert_eq!(frontier.len(), 1);
    }

    #[test]
    fn test_duplicates_rejected_after_pop() {
        let mut frontier = Frontier::new();
        assert!(frontier.push("a"));
        assert!(!frontier.push("a"));
        frontier.pop();
        assert!(!frontier.push("a"));
        assert!(frontier.is_empty());
        assert!(frontier.has_seen("a"));
    }

    #[test]
    fn test_extend_counts_new_urls() {
        let mut frontier = Frontier::new();
        frontier.push("a");
        assert_eq!(frontier.extend(vec!["a".to_string(), "b".to_string(), "b".to_string()]), 1);
        assert_eq!(frontier.iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_requeue_goes_to_head() {
        let mut frontier = Frontier::new();
        frontier.extend(["a", "b"]);
        let url = frontier.pop().unwrap();
        frontier.requeue(url);
        assert_eq!(frontier.pop().as_deref(), Some("a"));
    }

    #[test]
    fn test_clear_forgets_seen() {
        let mut frontier = Frontier::new();
        frontier.push("a");
        frontier.clear();
        assert!(frontier.push("a"));
    }
}
