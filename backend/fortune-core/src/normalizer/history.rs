use crate::error::PipelineError;
use crate::normalizer::{float, id_string, lenient, raw_object, text, unsigned};

use models::{HistoryItem, HistoryPage, HistoryQuery};

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawHistory {
    #[serde(alias = "items", deserialize_with = "lenient")]
    divinations: Option<Vec<Value>>,
    #[serde(deserialize_with = "lenient")]
    pagination: Option<RawPagination>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPagination {
    total: Option<Value>,
    page: Option<Value>,
    limit: Option<Value>,
    pages: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawHistoryItem {
    id: Option<Value>,
    #[serde(deserialize_with = "lenient")]
    question: Option<String>,
    #[serde(deserialize_with = "lenient")]
    created_at: Option<String>,
    hexagram: Option<Value>,
    #[serde(deserialize_with = "lenient")]
    fortune: Option<String>,
    #[serde(deserialize_with = "lenient")]
    method: Option<String>,
    rating: Option<Value>,
}

/// Map `divination/history`. Pagination the server leaves out is derived
/// from `query` and the item count.
pub fn history_page(data: &Value, query: &HistoryQuery) -> Result<HistoryPage, PipelineError> {
    let raw: RawHistory = raw_object(data, "history")?;
    let pagination = raw.pagination.unwrap_or_default();

    let items: Vec<HistoryItem> = raw
        .divinations
        .unwrap_or_default()
        .iter()
        .filter(|item| item.is_object())
        .filter_map(|item| RawHistoryItem::deserialize(item).ok())
        .map(map_item)
        .collect();

    let total = unsigned(pagination.total.as_ref()).unwrap_or(items.len() as u64);
    let page = unsigned(pagination.page.as_ref())
        .and_then(|page| u32::try_from(page).ok())
        .unwrap_or(query.page)
        .max(1);
    let page_size = unsigned(pagination.limit.as_ref())
        .and_then(|limit| u32::try_from(limit).ok())
        .filter(|limit| *limit > 0)
        .unwrap_or(query.limit.max(1));
    let total_pages = unsigned(pagination.pages.as_ref())
        .and_then(|pages| u32::try_from(pages).ok())
        .unwrap_or_else(|| total_pages(total, page_size));

    Ok(HistoryPage {
        items,
        total,
        page,
        page_size,
        total_pages,
    })
}

fn total_pages(total: u64, page_size: u32) -> u32 {
    u32::try_from(total.div_ceil(u64::from(page_size))).unwrap_or(u32::MAX)
}

fn map_item(raw: RawHistoryItem) -> HistoryItem {
    let hexagram_name = match raw.hexagram {
        Some(Value::String(name)) => text(Some(name)),
        Some(Value::Object(object)) => object
            .get("name")
            .and_then(Value::as_str)
            .and_then(|name| text(Some(name.to_string()))),
        _ => None,
    };

    HistoryItem {
        id: id_string(raw.id.as_ref()),
        question: text(raw.question).unwrap_or_default(),
        created_at: text(raw.created_at),
        hexagram_name,
        fortune: text(raw.fortune),
        method: text(raw.method),
        rating: float(raw.rating.as_ref()),
    }
}
