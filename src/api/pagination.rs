//! `?page=&limit=` handling for the document list.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PaginationParams {
    /// 1-based; 0 and absent both mean the first page.
    pub page: Option<u32>,

    pub limit: Option<u32>,
}

impl PaginationParams {
    pub const MAX_LIMIT: u32 = 100;

    pub const DEFAULT_LIMIT: u32 = 10;

    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn offset(&self) -> u32 {
        (self.page() - 1) * self.limit()
    }
}

/// Serialized as the `pagination` object next to the list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub total_documents: u64,
    pub total_pages: u32,
    pub current_page: u32,
    pub page_size: u32,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl PaginationMeta {
    pub fn new(params: &PaginationParams, total_documents: u64) -> Self {
        let page_size = params.limit();
        let current_page = params.page();
        let total_pages = total_documents.div_ceil(page_size as u64) as u32;

        Self {
            total_documents,
            total_pages,
            current_page,
            page_size,
            has_next_page: current_page < total_pages,
            has_prev_page: current_page > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_clamping() {
        let params = PaginationParams::default();
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), 10);
        assert_eq!(params.offset(), 0);

        let params = PaginationParams {
            page: Some(0),
            limit: Some(1000),
        };
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), PaginationParams::MAX_LIMIT);
    }

    #[test]
    fn test_meta() {
        let params = PaginationParams {
            page: Some(2),
            limit: Some(10),
        };
        assert_eq!(params.offset(), 10);
        let meta = PaginationMeta::new(&params, 25);
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next_page);
        assert!(meta.has_prev_page);

        let empty = PaginationMeta::new(&PaginationParams::default(), 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next_page);
    }
}
