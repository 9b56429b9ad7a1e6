//! Coverage Report Schema
//!
//! Structured analysis result produced by the pipeline. The schema is fixed:
//! scored categories, narrative fields, and evidence citations. Models are
//! not trusted with arithmetic: `normalize` clamps every sub-score to its
//! declared range, recomputes the total, and derives the recommendation from
//! fixed thresholds.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::constants::report as report_constants;
use crate::types::{CoverageError, Result};

// =============================================================================
// Sub-scores
// =============================================================================

/// One scored category with an optional rationale.
///
/// Models sometimes emit a bare number and sometimes an object with a
/// `score` field; the ambiguity is resolved here, once, at the serde
/// boundary. Internally there is exactly one representation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubScore {
    pub score: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl SubScore {
    pub fn new(score: u8) -> Self {
        Self { score, rationale: None }
    }

    pub fn with_rationale(score: u8, rationale: impl Into<String>) -> Self {
        Self { score, rationale: Some(rationale.into()) }
    }

    fn clamp(&mut self) {
        self.score = self.score.min(report_constants::MAX_SUB_SCORE);
    }
}

impl Default for SubScore {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<'de> Deserialize<'de> for SubScore {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::Number(n) => {
                let score = n.as_f64().unwrap_or(0.0).clamp(0.0, 255.0) as u8;
                Ok(SubScore::new(score))
            }
            Value::Object(map) => {
                let score = map
                    .get("score")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0)
                    .clamp(0.0, 255.0) as u8;
                // Older prompt variants called the rationale a "note"
                let rationale = map
                    .get("rationale")
                    .or_else(|| map.get("note"))
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(String::from);
                Ok(SubScore { score, rationale })
            }
            other => Err(de::Error::custom(format!(
                "sub-score must be a number or an object with a score field, got {other}"
            ))),
        }
    }
}

/// The fixed category set every report carries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    #[serde(default)]
    pub concept: SubScore,
    #[serde(default)]
    pub character: SubScore,
    #[serde(default)]
    pub structure: SubScore,
    #[serde(default)]
    pub dialogue: SubScore,
    #[serde(default)]
    pub market: SubScore,
}

impl SubScores {
    /// Sum of the five categories. Safe on unclamped inputs: the sum is
    /// taken in a wider type and saturates instead of overflowing.
    pub fn total(&self) -> u8 {
        let sum = u16::from(self.concept.score)
            + u16::from(self.character.score)
            + u16::from(self.structure.score)
            + u16::from(self.dialogue.score)
            + u16::from(self.market.score);
        u8::try_from(sum).unwrap_or(u8::MAX)
    }

    fn clamp_all(&mut self) {
        self.concept.clamp();
        self.character.clamp();
        self.structure.clamp();
        self.dialogue.clamp();
        self.market.clamp();
    }

    /// Extract from a raw sub-score map, accepting the alias keys models
    /// substitute for the canonical category names.
    fn from_raw(map: &serde_json::Map<String, Value>) -> Self {
        const ALIASES: &[(&str, &[&str])] = &[
            ("concept", &["concept", "premise", "idea", "hook"]),
            ("character", &["character", "characters", "protagonist", "ensemble"]),
            ("structure", &["structure", "pacing", "plot", "narrative"]),
            ("dialogue", &["dialogue", "writing", "voice", "execution"]),
            ("market", &["market", "viability", "commercial", "audience", "timeliness"]),
        ];

        let pick = |keys: &[&str]| -> SubScore {
            for key in keys {
                if let Some(raw) = map.get(*key) {
                    match serde_json::from_value::<SubScore>(raw.clone()) {
                        Ok(score) => return score,
                        Err(e) => {
                            warn!(category = key, error = %e, "Unparseable sub-score, defaulting to 0");
                            return SubScore::default();
                        }
                    }
                }
            }
            warn!(category = keys[0], "Missing sub-score, defaulting to 0");
            SubScore::default()
        };

        Self {
            concept: pick(ALIASES[0].1),
            character: pick(ALIASES[1].1),
            structure: pick(ALIASES[2].1),
            dialogue: pick(ALIASES[3].1),
            market: pick(ALIASES[4].1),
        }
    }
}

// =============================================================================
// Recommendation
// =============================================================================

/// Categorical verdict derived from the total score, never taken from the
/// model directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Pass,
    Consider,
    Recommend,
}

impl Recommendation {
    /// Fixed thresholds over the /50 total.
    pub fn from_total(total: u8) -> Self {
        if total >= report_constants::RECOMMEND_THRESHOLD {
            Self::Recommend
        } else if total >= report_constants::CONSIDER_THRESHOLD {
            Self::Consider
        } else {
            Self::Pass
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "Pass"),
            Self::Consider => write!(f, "Consider"),
            Self::Recommend => write!(f, "Recommend"),
        }
    }
}

// =============================================================================
// Evidence
// =============================================================================

/// A citation supporting a claim in the report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceQuote {
    #[serde(default)]
    pub quote: String,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub context: String,
}

impl EvidenceQuote {
    fn truncate(&mut self) {
        truncate_in_place(&mut self.quote, report_constants::MAX_QUOTE_CHARS);
        truncate_in_place(&mut self.context, report_constants::MAX_QUOTE_CONTEXT_CHARS);
    }
}

fn truncate_in_place(s: &mut String, max: usize) {
    if s.len() > max {
        let mut cut = max;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
    }
}

// =============================================================================
// Coverage Report
// =============================================================================

/// The full structured analysis result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    #[serde(default)]
    pub logline: String,
    #[serde(default)]
    pub synopsis: String,
    #[serde(default)]
    pub overall_comments: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub subscores: SubScores,
    #[serde(default)]
    pub total_score: u8,
    #[serde(default = "default_recommendation")]
    pub recommendation: Recommendation,
    #[serde(default)]
    pub evidence_quotes: Vec<EvidenceQuote>,
}

fn default_recommendation() -> Recommendation {
    Recommendation::Pass
}

impl Default for Recommendation {
    fn default() -> Self {
        Self::Pass
    }
}

impl CoverageReport {
    /// Build a report from a raw provider JSON value.
    ///
    /// Tolerant at the boundary: missing narrative fields default empty
    /// with a warning, sub-scores go through the alias table. Fails only
    /// when the value is not an object at all.
    pub fn from_raw(raw: &Value) -> Result<Self> {
        let obj = raw.as_object().ok_or_else(|| {
            CoverageError::Validation("analysis result is not a JSON object".to_string())
        })?;

        let text = |key: &str| -> String {
            match obj.get(key).and_then(Value::as_str) {
                Some(s) => s.to_string(),
                None => {
                    warn!(field = key, "Missing narrative field in analysis result");
                    String::new()
                }
            }
        };
        let list = |key: &str| -> Vec<String> {
            obj.get(key)
                .and_then(Value::as_array)
                .map(|a| {
                    a.iter()
                        .filter_map(Value::as_str)
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default()
        };

        let subscores = obj
            .get("subscores")
            .and_then(Value::as_object)
            .map(SubScores::from_raw)
            .unwrap_or_else(|| {
                warn!("Missing subscores in analysis result");
                SubScores::default()
            });

        let evidence_quotes = obj
            .get("evidence_quotes")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(|q| serde_json::from_value::<EvidenceQuote>(q.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();

        let mut report = Self {
            logline: text("logline"),
            synopsis: text("synopsis"),
            overall_comments: text("overall_comments"),
            strengths: list("strengths"),
            weaknesses: list("weaknesses"),
            subscores,
            total_score: 0,
            recommendation: Recommendation::Pass,
            evidence_quotes,
        };
        report.normalize();
        Ok(report)
    }

    /// Clamp sub-scores to their declared range, recompute the total from
    /// sub-scores, derive the recommendation, and bound quote lengths.
    pub fn normalize(&mut self) {
        self.subscores.clamp_all();
        self.total_score = self.subscores.total();
        self.recommendation = Recommendation::from_total(self.total_score);
        for quote in &mut self.evidence_quotes {
            quote.truncate();
        }
    }
}

// =============================================================================
// Analysis Outcome
// =============================================================================

/// Pipeline return value: the normalized report plus usage accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub report: CoverageReport,
    /// Identity of whichever provider ultimately produced the report
    pub model_used: String,
    /// Input + output tokens summed over every call the pipeline made
    pub tokens_consumed: u64,
}

// =============================================================================
// Tests
// =============================================================================
