use crate::error::PipelineError;
use crate::normalizer::{float, lenient, raw_object, unsigned};

use models::Stats;

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawStats {
    #[serde(alias = "totalDivinations")]
    total: Option<Value>,
    this_month: Option<Value>,
    average_rating: Option<Value>,
    #[serde(deserialize_with = "lenient")]
    method_distribution: Option<Map<String, Value>>,
    #[serde(deserialize_with = "lenient")]
    fortune_distribution: Option<Map<String, Value>>,
}

/// Map `divination/stats`. Counts default to zero; the average rating
/// stays `None` until the server reports one.
pub fn stats(data: &Value) -> Result<Stats, PipelineError> {
    let raw: RawStats = raw_object(data, "stats")?;

    Ok(Stats {
        total_divinations: unsigned(raw.total.as_ref()).unwrap_or(0),
        this_month: unsigned(raw.this_month.as_ref()).unwrap_or(0),
        average_rating: float(raw.average_rating.as_ref()),
        method_distribution: distribution(raw.method_distribution),
        fortune_distribution: distribution(raw.fortune_distribution),
    })
}

fn distribution(raw: Option<Map<String, Value>>) -> BTreeMap<String, u64> {
    raw.unwrap_or_default()
        .into_iter()
        .filter_map(|(key, count)| unsigned(Some(&count)).map(|count| (key, count)))
        .collect()
}
