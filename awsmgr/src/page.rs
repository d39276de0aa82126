//! Single-page listing results.

/// One page of a listing plus the opaque token for the next page.
///
/// The token is handed back to the caller unchanged; passing it to the same
/// listing call returns the following page.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Continuation token, `None` on the last page.
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    /// A page with no continuation.
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }

    /// Whether more pages are available.
    pub fn has_more(&self) -> bool {
        self.next_token.is_some()
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self::last(Vec::new())
    }
}

/// Split `items` into pages of `page_size`, encoding the offset as the token.
///
/// Used by the in-memory backends to mimic remote pagination.
pub(crate) fn paginate<T: Clone>(
    items: &[T],
    page_size: usize,
    token: Option<&str>,
) -> Page<T> {
    let start = token
        .and_then(|t| t.parse::<usize>().ok())
        .unwrap_or(0)
        .min(items.len());
    let end = start.saturating_add(page_size).min(items.len());
    let next_token = (end < items.len()).then(|| end.to_string());
    Page {
        items: items[start..end].to_vec(),
        next_token,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paginate_walks_all_items() {
        let items: Vec<u32> = (0..5).collect();
        let first = paginate(&items, 2, None);
        assert_eq!(first.items, vec![0, 1]);
        assert!(first.has_more());

        let second = paginate(&items, 2, first.next_token.as_deref());
        assert_eq!(second.items, vec![2, 3]);

        let third = paginate(&items, 2, second.next_token.as_deref());
        assert_eq!(third.items, vec![4]);
        assert!(!third.has_more());
    }

    #[test]
    fn test_paginate_bad_token_starts_over() {
        let items = vec!["a", "b"];
        let page = paginate(&items, 10, Some("garbage"));
        assert_eq!(page.items, vec!["a", "b"]);
    }

    #[test]
    fn test_paginate_token_past_end_is_empty() {
        let items = vec![1, 2];
        let page = paginate(&items, 10, Some("99"));
        assert!(page.items.is_empty());
        assert!(page.next_token.is_none());
    }
}
