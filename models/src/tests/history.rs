use crate::{HistoryPage, HistoryQuery, SortOrder};

#[test]
fn given_default_query_when_to_pairs_called_then_uses_wire_names() {
    let pairs = HistoryQuery::page(2).to_pairs();

    assert_eq!(
        pairs,
        vec![
            ("page", String::from("2")),
            ("limit", String::from("10")),
            ("sortBy", String::from("createdAt")),
            ("sortOrder", String::from("desc")),
        ]
    );
}

/// **VALUE**: Page zero is clamped to one.
///
/// **BUG THIS CATCHES**: Would catch sending `page=0`, which the server rejects with a 400.
#[test]
fn given_page_zero_when_query_built_then_clamps_to_first_page() {
    let query = HistoryQuery::page(0).with_limit(0);

    assert_eq!(query.page, 1);
    assert_eq!(query.limit, 1);
    assert_eq!(query.sort_order, SortOrder::Desc);
}

#[test]
fn given_last_page_when_has_more_called_then_returns_false() {
    let page = HistoryPage {
        items: Vec::new(),
        total: 20,
        page: 2,
        page_size: 10,
        total_pages: 2,
    };

    assert!(!page.has_more());
}
