use serde::Serialize;

/// A resolved page window. Page numbers start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    /// Missing or non-positive values fall back to page 1 and `default_limit`;
    /// the limit is capped at `max_limit`.
    pub fn resolve(page: Option<i64>, limit: Option<i64>, default_limit: u32, max_limit: u32) -> Self {
        let page = page
            .filter(|value| *value > 0)
            .map(|value| u32::try_from(value).unwrap_or(u32::MAX))
            .unwrap_or(1);
        let max_limit = max_limit.max(1);
        let limit = limit
            .filter(|value| *value > 0)
            .map(|value| u32::try_from(value).unwrap_or(u32::MAX))
            .unwrap_or(default_limit)
            .clamp(1, max_limit);
        PageRequest { page, limit }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// Cuts this page out of an already ordered sequence.
    pub fn window<T: Clone>(&self, items: &[T]) -> Vec<T> {
        let offset = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        items
            .iter()
            .skip(offset)
            .take(self.limit as usize)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

impl Pagination {
    pub fn new(request: PageRequest, total: u64) -> Self {
        Pagination {
            page: request.page,
            limit: request.limit,
            total,
            pages: total.div_ceil(u64::from(request.limit)),
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{PageRequest, Pagination};

    #[test]
    fn resolve_uses_defaults_for_missing_or_bad_values() {
        let request = PageRequest::resolve(None, None, 20, 100);
        assert_eq!((request.page(), request.limit()), (1, 20));
        let request = PageRequest::resolve(Some(0), Some(-3), 10, 100);
        assert_eq!((request.page(), request.limit()), (1, 10));
    }

    #[test]
    fn resolve_caps_limit() {
        let request = PageRequest::resolve(Some(2), Some(5000), 20, 100);
        assert_eq!(request.limit(), 100);
        assert_eq!(request.offset(), 100);
    }

    #[test]
    fn pagination_rounds_pages_up() {
        let request = PageRequest::resolve(Some(1), Some(20), 20, 100);
        assert_eq!(Pagination::new(request, 0).pages, 0);
        assert_eq!(Pagination::new(request, 20).pages, 1);
        assert_eq!(Pagination::new(request, 21).pages, 2);
    }

    #[test]
    fn out_of_range_page_is_empty() {
        let items: Vec<u32> = (0..5).collect();
        let request = PageRequest::resolve(Some(4), Some(2), 20, 100);
        assert!(request.window(&items).is_empty());
    }

    proptest! {
        #[test]
        fn consecutive_pages_partition_the_sequence(len in 0usize..200, limit in 1i64..30) {
            let items: Vec<usize> = (0..len).collect();
            let first = PageRequest::resolve(Some(1), Some(limit), 20, 100);
            let pages = Pagination::new(first, len as u64).pages;
            let mut seen = Vec::new();
            for page in 1..=pages + 1 {
                let request = PageRequest::resolve(Some(page as i64), Some(limit), 20, 100);
                seen.extend(request.window(&items));
            }
            prop_assert_eq!(seen, items);
        }
    }
}
