use std::collections::BTreeMap;

use serde::Serialize;

/// Per-user divination statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    pub total_divinations: u64,
    pub this_month: u64,
    /// `None` until the user has rated something.
    pub average_rating: Option<f64>,
    pub method_distribution: BTreeMap<String, u64>,
    pub fortune_distribution: BTreeMap<String, u64>,
}
