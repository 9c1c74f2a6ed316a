//! Normalized divination result.
//!
//! Display fields are always present (defaulted). Fields whose absence means
//! something - a missing hexagram, a missing line sequence, a missing moving
//! line - stay `None` and are listed in [`Completeness::missing`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Yang,
    Yin,
}

impl LineKind {
    /// Wire encoding: `1` is yang, `0` is yin.
    pub fn from_bit(bit: u64) -> Option<Self> {
        match bit {
            1 => Some(LineKind::Yang),
            0 => Some(LineKind::Yin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hexagram {
    pub number: Option<u32>,
    pub name: Option<String>,
    /// Bottom line first, exactly six entries when present.
    pub lines: Option<Vec<LineKind>>,
    pub upper_trigram: Option<String>,
    pub lower_trigram: Option<String>,
    pub keywords: Vec<String>,
}

/// Primary (`ben`), mutual (`hu`) and changed (`bian`) hexagrams.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HexagramSet {
    pub ben: Option<Hexagram>,
    pub hu: Option<Hexagram>,
    pub bian: Option<Hexagram>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineView {
    /// 6 is the top line.
    pub position: u8,
    pub kind: LineKind,
    pub changing: bool,
}

/// Display view of the primary hexagram.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrimaryHexagram {
    pub name: String,
    pub number: u32,
    pub description: String,
    /// Top line first; empty when the line sequence is missing.
    pub lines: Vec<LineView>,
    pub upper_trigram: String,
    pub lower_trigram: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WuxingAnalysis {
    pub ben: String,
    pub hu: String,
    pub bian: String,
    pub fortune: String,
    pub timing: String,
    pub favorable_elements: Vec<String>,
    pub relationships: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub fortune: String,
    pub timing: String,
    pub wuxing: WuxingAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Interpretation {
    pub summary: String,
    pub detailed: String,
    pub advice: String,
    pub precautions: String,
    pub cautions: Vec<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRating {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helpfulness: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

/// Required fields the server did not send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IncompleteField {
    Id,
    PrimaryHexagram,
    MutualHexagram,
    ChangedHexagram,
    PrimaryLines,
    MutualLines,
    ChangedLines,
    MovingLine,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ConsistencyIssue {
    /// Primary and changed hexagrams have identical lines.
    PrimaryEqualsChanged,
    /// The moving line did not flip between primary and changed hexagrams.
    MovingLineUnchanged { line: u8 },
    MovingLineOutOfRange { line: u64 },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Completeness {
    pub missing: Vec<IncompleteField>,
    pub inconsistencies: Vec<ConsistencyIssue>,
}

impl Completeness {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn is_consistent(&self) -> bool {
        self.inconsistencies.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DivinationResult {
    pub id: Option<String>,
    pub question: String,
    pub created_at: Option<String>,
    pub hexagrams: HexagramSet,
    pub primary: PrimaryHexagram,
    /// 1-based, bottom line is 1.
    pub moving_line: Option<u8>,
    pub analysis: Analysis,
    pub interpretation: Interpretation,
    pub sentiment: Sentiment,
    pub keywords: Vec<String>,
    pub user_rating: Option<UserRating>,
    pub metadata: Map<String, Value>,
    pub completeness: Completeness,
}

impl DivinationResult {
    pub fn is_incomplete(&self) -> bool {
        !self.completeness.is_complete()
    }
}
