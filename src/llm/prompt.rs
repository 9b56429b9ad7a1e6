//! Prompt Builder
//!
//! Pure assembly of provider request payloads: instructions, document, and
//! the output-schema description. No network or disk access, and the same
//! inputs always produce the same payload, required for testability and
//! safe retries. Never fails on document content.

use serde_json::Value;

use crate::config::Depth;

/// Role context shared by every analysis call.
///
/// The explicit output-language constraint is load-bearing: mixed-language
/// responses break downstream schema parsing.
pub const SYSTEM_CONTEXT: &str = "\
You are an expert script coverage analyst with 20+ years of experience reading \
screenplays and TV pilots for major studios and production companies. You provide \
professional, objective, and constructive coverage.

IMPORTANT: Respond in English only. Do not use any other languages in your analysis.

EVIDENCE REQUIREMENTS:
- Support all claims with specific quotes from the script
- Quotes should be 1-2 lines maximum, with page references
- Always return valid JSON matching the requested structure";

/// Shared schema description: the fixed field set every depth returns.
const OUTPUT_SCHEMA: &str = r#"OUTPUT FORMAT - Return valid JSON with this exact structure:
{
    "logline": "1-2 sentence hook describing premise + protagonist + stakes",
    "synopsis": "Concise summary of the script's plot and key beats",
    "overall_comments": "Narrative assessment of quality and commercial potential",
    "strengths": ["Strength with specific evidence"],
    "weaknesses": ["Weakness with specific evidence"],
    "subscores": {
        "concept":   {"score": 0, "rationale": "1-2 sentence rationale"},
        "character": {"score": 0, "rationale": "1-2 sentence rationale"},
        "structure": {"score": 0, "rationale": "1-2 sentence rationale"},
        "dialogue":  {"score": 0, "rationale": "1-2 sentence rationale"},
        "market":    {"score": 0, "rationale": "1-2 sentence rationale"}
    },
    "total_score": 0,
    "recommendation": "Pass/Consider/Recommend",
    "evidence_quotes": [
        {"quote": "Exact quote, max 2 lines", "page": 0, "context": "What this demonstrates"}
    ]
}

SCORING RUBRIC (score each /10):
- CONCEPT: Is the premise fresh, compelling, and series-worthy?
- CHARACTER: Are the characters complex, distinct, worth long-term investment?
- STRUCTURE: Does the structure serve the story? Is pacing appropriate?
- DIALOGUE: Is the dialogue sharp, character-specific, free of exposition dumps?
- MARKET: Is this commercially viable, with a clear home and audience?

RECOMMENDATION THRESHOLDS (/50 total):
- RECOMMEND (38-50), CONSIDER (25-37), PASS (0-24)"#;

const QUICK_INSTRUCTIONS: &str = "Provide a quick analysis of this script. \
Focus on the essentials: does it work and does it have series potential? \
Be concise but specific; 2-3 strengths and weaknesses each.";

const STANDARD_INSTRUCTIONS: &str = "Analyze the following script and provide \
comprehensive coverage. Focus heavily on series sustainability and the series \
engine, the repeatable conflict that will generate seasons of stories. Support \
your scores with script references.";

const DEEP_INSTRUCTIONS: &str = "Provide comprehensive deep-dive coverage of \
this script for internal development purposes. Be exhaustive and critical: \
act-by-act structure, character arcs, world building, market positioning, and \
priority revision notes, all grounded in quoted evidence.";

/// Genre-specific analysis emphasis, appended when the caller supplies a
/// known genre hint. Unknown genres are ignored, not rejected.
const GENRE_CONTEXTS: &[(&str, &str)] = &[
    ("drama", "Focus on emotional authenticity, character complexity, and thematic depth."),
    ("comedy", "Focus on comedic engine, joke density, character voices, and rewatchability."),
    ("thriller", "Focus on suspense construction, stakes escalation, and hook sustainability."),
    ("sci-fi", "Focus on world-building clarity and concept sustainability."),
    ("fantasy", "Focus on mythology building and epic scope management."),
    ("crime", "Focus on case-of-the-week vs serialized balance and moral complexity."),
    ("horror", "Focus on scare sustainability and dread maintenance."),
    ("period", "Focus on historical authenticity and period production considerations."),
    ("procedural", "Focus on procedural mechanics, case variety, and formula sustainability."),
];

fn genre_context(genre: &str) -> Option<&'static str> {
    let lower = genre.to_lowercase();
    GENRE_CONTEXTS
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, ctx)| *ctx)
}

// =============================================================================
// Built Prompt
// =============================================================================

/// Deterministic instruction block for one analysis request. The document
/// is attached per call via the message constructors, so chunked runs reuse
/// one `BuiltPrompt` across windows.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltPrompt {
    instructions: String,
}

impl BuiltPrompt {
    /// Assemble instructions for a depth plus optional context hints.
    pub fn build(depth: Depth, genre: Option<&str>, comps: &[String]) -> Self {
        let base = match depth {
            Depth::Quick => QUICK_INSTRUCTIONS,
            Depth::Standard => STANDARD_INSTRUCTIONS,
            Depth::Deep => DEEP_INSTRUCTIONS,
        };

        let mut instructions = String::new();
        if !comps.is_empty() {
            instructions.push_str(&format!(
                "COMPARABLE SERIES: {}\n\nUse these as reference points for market \
                 positioning and quality assessment.\n\n",
                comps.join(", ")
            ));
        }
        if let Some(ctx) = genre.and_then(genre_context) {
            instructions.push_str(&format!(
                "GENRE: {}\n\nGENRE-SPECIFIC NOTES: {ctx}\n\n",
                genre.unwrap_or_default().to_uppercase()
            ));
        }
        instructions.push_str(base);
        instructions.push_str("\n\n");
        instructions.push_str(OUTPUT_SCHEMA);

        Self { instructions }
    }

    pub fn system(&self) -> &str {
        SYSTEM_CONTEXT
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// Full user message for a single-shot analysis.
    pub fn user_message(&self, document: &str) -> String {
        format!(
            "{}\n\n---\n\nSCRIPT CONTENT:\n\n{document}\n\n---\n\n\
             Provide your analysis based on the instructions above.",
            self.instructions
        )
    }

    /// User message for one window of a chunked analysis.
    pub fn chunk_message(&self, window: &str, index: usize, total: usize) -> String {
        format!(
            "{}\n\nNote: This is part {} of {} of the script. Focus on the content in \
             this section while keeping in mind it is part of a larger work.\n\n---\n\n\
             SCRIPT CONTENT:\n\n{window}\n\n---\n\n\
             Provide your analysis based on the instructions above.",
            self.instructions,
            index + 1,
            total,
        )
    }

    /// User message for the synthesis pass over per-window partial results.
    /// Scoring requires holistic judgment, so merging is a model call, not
    /// a mechanical fold.
    pub fn synthesis_message(&self, partials: &[Value]) -> String {
        let partials_json =
            serde_json::to_string_pretty(partials).unwrap_or_else(|_| "[]".to_string());
        format!(
            "You have received analyses of a script that was split into {} parts.\n\n\
             Synthesize these partial analyses into a single coherent coverage report. \
             Resolve contradictions, identify patterns across the full script, merge and \
             deduplicate findings and evidence, and provide one unified assessment with \
             recomputed scores.\n\nPartial analyses:\n{partials_json}\n\n{}",
            partials.len(),
            self.instructions,
        )
    }
}
