//! Divination result mapping.
//!
//! Display text gets a readable default when absent. Anything that would
//! change what the reading *means* (result id, the three hexagrams, their
//! line sequences, the moving line) is never invented: it stays `None` and
//! is listed in [`Completeness::missing`].

use crate::error::PipelineError;
use crate::normalizer::{float, id_string, lenient, raw_object, text, unsigned};

use models::{
    Analysis, Completeness, ConsistencyIssue, DivinationResult, Hexagram, HexagramSet,
    IncompleteField, Interpretation, LineKind, LineView, PrimaryHexagram, Sentiment, UserRating,
    WuxingAnalysis,
};

use log::warn;
use serde::Deserialize;
use serde_json::{Map, Value};

pub const UNKNOWN_QUESTION: &str = "Unknown question";
pub const UNKNOWN_HEXAGRAM: &str = "Unknown hexagram";
pub const UNKNOWN: &str = "Unknown";
pub const DEFAULT_FORTUNE: &str = "Average";
pub const DEFAULT_TIMING: &str = "Timing is neutral";
pub const PENDING_SUMMARY: &str = "Interpretation is being generated...";
pub const PENDING_DETAILED: &str = "Detailed interpretation is being generated...";
pub const PENDING_ADVICE: &str = "Advice is on its way, please wait...";
pub const NO_PRECAUTIONS: &str = "No special precautions";
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

const LINES_PER_HEXAGRAM: usize = 6;
const AUSPICIOUS_MARK: char = '吉';
const INAUSPICIOUS_MARK: char = '凶';

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawDivination {
    id: Option<Value>,
    #[serde(deserialize_with = "lenient")]
    question: Option<String>,
    #[serde(deserialize_with = "lenient")]
    created_at: Option<String>,
    #[serde(deserialize_with = "lenient")]
    timestamp: Option<String>,
    #[serde(deserialize_with = "lenient")]
    hexagrams: Option<RawHexagrams>,
    moving_line: Option<Value>,
    #[serde(deserialize_with = "lenient")]
    analysis: Option<RawAnalysis>,
    #[serde(deserialize_with = "lenient")]
    interpretation: Option<RawInterpretation>,
    #[serde(deserialize_with = "lenient")]
    user_rating: Option<UserRating>,
    #[serde(deserialize_with = "lenient")]
    metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawHexagrams {
    #[serde(deserialize_with = "lenient")]
    ben: Option<RawHexagram>,
    #[serde(deserialize_with = "lenient")]
    hu: Option<RawHexagram>,
    #[serde(deserialize_with = "lenient")]
    bian: Option<RawHexagram>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawHexagram {
    id: Option<Value>,
    #[serde(deserialize_with = "lenient")]
    name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    lines: Option<Vec<Value>>,
    upper_gua: Option<Value>,
    lower_gua: Option<Value>,
    #[serde(deserialize_with = "lenient")]
    keywords: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawAnalysis {
    #[serde(deserialize_with = "lenient")]
    fortune: Option<String>,
    #[serde(deserialize_with = "lenient")]
    timing: Option<String>,
    #[serde(deserialize_with = "lenient")]
    wuxing: Option<RawWuxing>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawWuxing {
    #[serde(deserialize_with = "lenient")]
    ben: Option<String>,
    #[serde(deserialize_with = "lenient")]
    hu: Option<String>,
    #[serde(deserialize_with = "lenient")]
    bian: Option<String>,
    #[serde(deserialize_with = "lenient")]
    fortune: Option<String>,
    #[serde(deserialize_with = "lenient")]
    timing: Option<String>,
    #[serde(deserialize_with = "lenient")]
    favorable_elements: Option<Vec<String>>,
    #[serde(deserialize_with = "lenient")]
    relationships: Option<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawInterpretation {
    #[serde(deserialize_with = "lenient")]
    summary: Option<String>,
    #[serde(deserialize_with = "lenient")]
    detailed: Option<String>,
    #[serde(deserialize_with = "lenient")]
    advice: Option<String>,
    #[serde(deserialize_with = "lenient")]
    precautions: Option<String>,
    confidence: Option<Value>,
}

/// Map a divination payload (`POST divination/start`, `GET divination/{id}`).
///
/// # Errors
///
/// [`PipelineError::MalformedPayload`] if `data` is not an object.
pub fn divination_result(data: &Value) -> Result<DivinationResult, PipelineError> {
    let raw: RawDivination = raw_object(data, "divination result")?;
    let mut completeness = Completeness::default();

    let id = id_string(raw.id.as_ref());
    if id.is_none() {
        completeness.missing.push(IncompleteField::Id);
    }

    let moving_line = match unsigned(raw.moving_line.as_ref()) {
        Some(line @ 1..=6) => Some(line as u8),
        Some(line) => {
            completeness
                .inconsistencies
                .push(ConsistencyIssue::MovingLineOutOfRange { line });
            None
        }
        None => None,
    };
    if moving_line.is_none() {
        completeness.missing.push(IncompleteField::MovingLine);
    }

    let raw_hexagrams = raw.hexagrams.unwrap_or_default();
    let hexagrams = HexagramSet {
        ben: map_present(
            raw_hexagrams.ben,
            IncompleteField::PrimaryHexagram,
            IncompleteField::PrimaryLines,
            &mut completeness,
        ),
        hu: map_present(
            raw_hexagrams.hu,
            IncompleteField::MutualHexagram,
            IncompleteField::MutualLines,
            &mut completeness,
        ),
        bian: map_present(
            raw_hexagrams.bian,
            IncompleteField::ChangedHexagram,
            IncompleteField::ChangedLines,
            &mut completeness,
        ),
    };
    completeness
        .inconsistencies
        .extend(check_consistency(&hexagrams, moving_line));

    if !completeness.is_consistent() {
        warn!(
            "Divination result {} is inconsistent: {:?}",
            id.as_deref().unwrap_or("<no id>"),
            completeness.inconsistencies
        );
    }

    let interpretation = map_interpretation(raw.interpretation.unwrap_or_default());
    let analysis = map_analysis(raw.analysis.unwrap_or_default());
    let primary = primary_view(hexagrams.ben.as_ref(), moving_line, &interpretation.summary);
    let keywords = hexagrams
        .ben
        .as_ref()
        .map(|ben| ben.keywords.clone())
        .unwrap_or_default();

    Ok(DivinationResult {
        id,
        question: text(raw.question).unwrap_or_else(|| UNKNOWN_QUESTION.to_string()),
        created_at: text(raw.created_at).or_else(|| text(raw.timestamp)),
        sentiment: sentiment(&analysis.fortune),
        hexagrams,
        primary,
        moving_line,
        analysis,
        interpretation,
        keywords,
        user_rating: raw.user_rating,
        metadata: raw.metadata.unwrap_or_default(),
        completeness,
    })
}

/// Cross-check primary and changed hexagrams against the moving line.
pub fn check_consistency(hexagrams: &HexagramSet, moving_line: Option<u8>) -> Vec<ConsistencyIssue> {
    let mut issues = Vec::new();
    let ben_lines = hexagrams.ben.as_ref().and_then(|ben| ben.lines.as_ref());
    let bian_lines = hexagrams.bian.as_ref().and_then(|bian| bian.lines.as_ref());

    if let (Some(ben), Some(bian)) = (ben_lines, bian_lines) {
        if ben == bian {
            issues.push(ConsistencyIssue::PrimaryEqualsChanged);
        }
        if let Some(line) = moving_line.filter(|line| (1..=6).contains(line)) {
            let index = usize::from(line) - 1;
            if ben.get(index) == bian.get(index) {
                issues.push(ConsistencyIssue::MovingLineUnchanged { line });
            }
        }
    }
    issues
}

pub fn sentiment(fortune: &str) -> Sentiment {
    if fortune.contains(AUSPICIOUS_MARK) {
        Sentiment::Positive
    } else if fortune.contains(INAUSPICIOUS_MARK) {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

fn map_present(
    raw: Option<RawHexagram>,
    absent: IncompleteField,
    lines_absent: IncompleteField,
    completeness: &mut Completeness,
) -> Option<Hexagram> {
    let Some(raw) = raw else {
        completeness.missing.push(absent);
        return None;
    };
    let hexagram = map_hexagram(raw);
    if hexagram.lines.is_none() {
        completeness.missing.push(lines_absent);
    }
    Some(hexagram)
}

fn map_hexagram(raw: RawHexagram) -> Hexagram {
    Hexagram {
        number: unsigned(raw.id.as_ref()).and_then(|number| u32::try_from(number).ok()),
        name: text(raw.name),
        lines: raw.lines.as_deref().and_then(map_lines),
        upper_trigram: trigram_name(raw.upper_gua.as_ref()),
        lower_trigram: trigram_name(raw.lower_gua.as_ref()),
        keywords: raw.keywords.unwrap_or_default(),
    }
}

/// Exactly six 0/1 values, or nothing.
fn map_lines(values: &[Value]) -> Option<Vec<LineKind>> {
    if values.len() != LINES_PER_HEXAGRAM {
        return None;
    }
    values
        .iter()
        .map(|value| value.as_u64().and_then(LineKind::from_bit))
        .collect()
}

/// Trigrams arrive either as `{ name }` or as a bare name.
fn trigram_name(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(name) => text(Some(name.clone())),
        Value::Object(object) => object
            .get("name")
            .and_then(Value::as_str)
            .and_then(|name| text(Some(name.to_string()))),
        _ => None,
    }
}

/// Lines listed top first; position counts from the bottom (1..=6).
fn primary_view(ben: Option<&Hexagram>, moving_line: Option<u8>, summary: &str) -> PrimaryHexagram {
    let lines = ben
        .and_then(|ben| ben.lines.as_ref())
        .map(|lines| {
            lines
                .iter()
                .enumerate()
                .rev()
                .map(|(index, kind)| {
                    let position = index as u8 + 1;
                    LineView {
                        position,
                        kind: *kind,
                        changing: moving_line == Some(position),
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    PrimaryHexagram {
        name: ben
            .and_then(|ben| ben.name.clone())
            .unwrap_or_else(|| UNKNOWN_HEXAGRAM.to_string()),
        number: ben.and_then(|ben| ben.number).unwrap_or(0),
        description: summary.to_string(),
        lines,
        upper_trigram: ben
            .and_then(|ben| ben.upper_trigram.clone())
            .unwrap_or_else(|| UNKNOWN.to_string()),
        lower_trigram: ben
            .and_then(|ben| ben.lower_trigram.clone())
            .unwrap_or_else(|| UNKNOWN.to_string()),
    }
}

fn map_analysis(raw: RawAnalysis) -> Analysis {
    let fortune = text(raw.fortune).unwrap_or_else(|| DEFAULT_FORTUNE.to_string());
    let timing = text(raw.timing).unwrap_or_else(|| DEFAULT_TIMING.to_string());
    let wuxing = raw.wuxing.unwrap_or_default();

    Analysis {
        wuxing: WuxingAnalysis {
            ben: text(wuxing.ben).unwrap_or_else(|| UNKNOWN.to_string()),
            hu: text(wuxing.hu).unwrap_or_else(|| UNKNOWN.to_string()),
            bian: text(wuxing.bian).unwrap_or_else(|| UNKNOWN.to_string()),
            fortune: text(wuxing.fortune).unwrap_or_else(|| fortune.clone()),
            timing: text(wuxing.timing).unwrap_or_else(|| timing.clone()),
            favorable_elements: wuxing.favorable_elements.unwrap_or_default(),
            relationships: wuxing.relationships.unwrap_or_default(),
        },
        fortune,
        timing,
    }
}

fn map_interpretation(raw: RawInterpretation) -> Interpretation {
    let precautions = text(raw.precautions);
    Interpretation {
        summary: text(raw.summary).unwrap_or_else(|| PENDING_SUMMARY.to_string()),
        detailed: text(raw.detailed).unwrap_or_else(|| PENDING_DETAILED.to_string()),
        advice: text(raw.advice).unwrap_or_else(|| PENDING_ADVICE.to_string()),
        cautions: precautions.iter().cloned().collect(),
        precautions: precautions.unwrap_or_else(|| NO_PRECAUTIONS.to_string()),
        confidence: float(raw.confidence.as_ref())
            .map(|confidence| confidence.clamp(0.0, 1.0))
            .unwrap_or(DEFAULT_CONFIDENCE),
    }
}
