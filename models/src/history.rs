//! History listing.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Query parameters for `divination/history`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub page: u32,
    pub limit: u32,
    pub sort_by: String,
    pub sort_order: SortOrder,
    pub method: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl HistoryQuery {
    pub const DEFAULT_LIMIT: u32 = 10;

    pub fn page(page: u32) -> Self {
        Self {
            page: page.max(1),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Wire parameter pairs, camelCase keys.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
            ("sortBy", self.sort_by.clone()),
            ("sortOrder", self.sort_order.as_str().to_string()),
        ];
        if let Some(method) = &self.method {
            pairs.push(("method", method.clone()));
        }
        if let Some(start) = &self.start_date {
            pairs.push(("startDate", start.clone()));
        }
        if let Some(end) = &self.end_date {
            pairs.push(("endDate", end.clone()));
        }
        pairs
    }
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: Self::DEFAULT_LIMIT,
            sort_by: String::from("createdAt"),
            sort_order: SortOrder::Desc,
            method: None,
            start_date: None,
            end_date: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryItem {
    pub id: Option<String>,
    pub question: String,
    pub created_at: Option<String>,
    pub hexagram_name: Option<String>,
    pub fortune: Option<String>,
    pub method: Option<String>,
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPage {
    pub items: Vec<HistoryItem>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl HistoryPage {
    pub fn has_more(&self) -> bool {
        self.page < self.total_pages
    }
}
