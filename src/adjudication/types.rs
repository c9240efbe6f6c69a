//! Evidence model: `Candidate`, `PassResult`, `ExtractionResult`.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Variable;

/// Cap on stored evidence snippets — enough context to audit, short enough
/// to keep the persisted record readable.
pub const SUPPORTING_TEXT_CAP: usize = 240;

pub use crate::models::SourceType;

// ─── Candidate ───────────────────────────────────────────────────────────────

/// One proposed value for a variable with its provenance and confidence.
/// Immutable once created; owned by the `PassResult` that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub value: String,
    pub confidence: f32,
    pub source: String,
    pub source_type: SourceType,
    pub supporting_text: String,
    pub extracted_at: NaiveDateTime,
}

impl Candidate {
    pub fn new(
        value: impl Into<String>,
        confidence: f32,
        source: impl Into<String>,
        source_type: SourceType,
        supporting_text: &str,
    ) -> Self {
        Self {
            value: value.into(),
            confidence: confidence.clamp(0.0, 1.0),
            source: source.into(),
            source_type,
            supporting_text: truncate_snippet(supporting_text),
            extracted_at: Utc::now().naive_utc(),
        }
    }
}

/// Truncate on a char boundary, with an ellipsis marker when cut.
fn truncate_snippet(text: &str) -> String {
    if text.chars().count() <= SUPPORTING_TEXT_CAP {
        return text.to_string();
    }
    let cut: String = text.chars().take(SUPPORTING_TEXT_CAP).collect();
    format!("{cut}…")
}

// ─── PassResult ──────────────────────────────────────────────────────────────

/// Identity of one adjudication pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassMethod {
    DocumentExtraction,
    StructuredQuery,
    CrossValidation,
    TemporalReasoning,
}

impl PassMethod {
    pub fn pass_number(&self) -> u8 {
        match self {
            Self::DocumentExtraction => 1,
            Self::StructuredQuery => 2,
            Self::CrossValidation => 3,
            Self::TemporalReasoning => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocumentExtraction => "document_extraction",
            Self::StructuredQuery => "structured_query",
            Self::CrossValidation => "cross_validation",
            Self::TemporalReasoning => "temporal_reasoning",
        }
    }
}

/// Named markers raised by the passes. Well-known flags exercised by the
/// rule set are typed fields; anything ad hoc goes through `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PassFlags {
    pub strong_consensus: bool,
    pub consensus: bool,
    pub pathology_definitive: bool,
    pub pathology_report_available: bool,
    pub location_mismatch: bool,
    pub tumor_transformation: bool,
    pub grade_progression: bool,
    pub treatment_mismatch: bool,
    /// Ad hoc markers ("name: value"). BTreeMap keeps serialization and
    /// flattening order stable.
    pub extra: BTreeMap<String, String>,
}

impl PassFlags {
    /// Flatten to human-readable strings for `clinical_flags`. Well-known
    /// bools contribute their names; extras contribute "key: value".
    pub fn flattened(&self) -> Vec<String> {
        let mut out = Vec::new();
        let named: [(&str, bool); 8] = [
            ("strong_consensus", self.strong_consensus),
            ("consensus", self.consensus),
            ("pathology_definitive", self.pathology_definitive),
            ("pathology_report_available", self.pathology_report_available),
            ("location_mismatch", self.location_mismatch),
            ("tumor_transformation", self.tumor_transformation),
            ("grade_progression", self.grade_progression),
            ("treatment_mismatch", self.treatment_mismatch),
        ];
        for (name, set) in named {
            if set {
                out.push(name.to_string());
            }
        }
        for (key, value) in &self.extra {
            if value.is_empty() {
                out.push(key.clone());
            } else {
                out.push(format!("{key}: {value}"));
            }
        }
        out
    }
}

/// Output of one adjudication pass. Built incrementally by the append-only
/// methods below; no later pass mutates an earlier pass's result. A pass
/// with no candidates and no value is valid — it means "pass ran, found
/// nothing".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassResult {
    pub pass_number: u8,
    pub method: PassMethod,
    pub value: Option<String>,
    pub confidence: f32,
    pub sources: Vec<String>,
    pub flags: PassFlags,
    pub recommendations: Vec<String>,
    pub candidates: Vec<Candidate>,
    /// Multiplier applied by the finalizer. Stays 1.0 except for Pass 4 and
    /// the Pass 3 plausibility post-checks.
    pub confidence_adjustment: f32,
    pub notes: Vec<String>,
}

impl PassResult {
    pub fn new(method: PassMethod) -> Self {
        Self {
            pass_number: method.pass_number(),
            method,
            value: None,
            confidence: 0.0,
            sources: Vec::new(),
            flags: PassFlags::default(),
            recommendations: Vec::new(),
            candidates: Vec::new(),
            confidence_adjustment: 1.0,
            notes: Vec::new(),
        }
    }

    pub fn add_candidate(&mut self, candidate: Candidate) {
        if !self.sources.contains(&candidate.source) {
            self.sources.push(candidate.source.clone());
        }
        self.candidates.push(candidate);
    }

    pub fn add_flag(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.flags.extra.insert(name.into(), value.into());
    }

    pub fn add_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    pub fn add_recommendation(&mut self, recommendation: impl Into<String>) {
        self.recommendations.push(recommendation.into());
    }

    /// Whether this pass produced a usable answer of its own.
    pub fn has_value(&self) -> bool {
        self.value.as_deref().is_some_and(|v| !v.trim().is_empty())
    }
}

// ─── ExtractionResult ────────────────────────────────────────────────────────

/// Per-(patient, variable, event) aggregate. Created once per extraction
/// request; each pass appends; `finalize()` runs exactly once after Pass 4.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub id: Uuid,
    pub variable: Variable,
    pub patient_id: String,
    pub event_date: NaiveDate,
    pub passes: Vec<PassResult>,
    /// Union of every pass's candidates, insertion order preserved — always
    /// the concatenation of `passes[..].candidates` in pass order.
    pub all_candidates: Vec<Candidate>,
    pub final_value: Option<String>,
    pub final_confidence: f32,
    pub clinical_flags: Vec<String>,
    pub needs_manual_review: bool,
    pub reasoning_chain: Vec<String>,
    #[serde(skip)]
    pub(crate) finalized: bool,
}

impl ExtractionResult {
    pub fn new(variable: Variable, patient_id: impl Into<String>, event_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            variable,
            patient_id: patient_id.into(),
            event_date,
            passes: Vec::new(),
            all_candidates: Vec::new(),
            final_value: None,
            final_confidence: 0.0,
            clinical_flags: Vec::new(),
            needs_manual_review: false,
            reasoning_chain: Vec::new(),
            finalized: false,
        }
    }

    /// Append a completed pass and fold its candidates into the union.
    pub fn add_pass(&mut self, pass: PassResult) {
        self.all_candidates.extend(pass.candidates.iter().cloned());
        self.passes.push(pass);
    }

    /// Latest pass (by order of execution) that produced a non-empty value.
    pub fn latest_valued_pass(&self) -> Option<&PassResult> {
        self.passes.iter().rev().find(|p| p.has_value())
    }

    /// Stable serialized shape persisted by the orchestrator.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn candidate(value: &str, confidence: f32, source: &str) -> Candidate {
        Candidate::new(value, confidence, source, SourceType::Document, "snippet")
    }

    // ── Candidate ───────────────────────────────────────────────────

    #[test]
    fn candidate_confidence_clamped_on_construction() {
        assert_eq!(candidate("GTR", 1.7, "note").confidence, 1.0);
        assert_eq!(candidate("GTR", -0.2, "note").confidence, 0.0);
    }

    #[test]
    fn supporting_text_truncated_with_marker() {
        let long = "x".repeat(500);
        let c = Candidate::new("GTR", 0.9, "MRI", SourceType::StructuredData, &long);
        assert!(c.supporting_text.chars().count() <= SUPPORTING_TEXT_CAP + 1);
        assert!(c.supporting_text.ends_with('…'));
    }

    #[test]
    fn short_supporting_text_kept_verbatim() {
        let c = Candidate::new("GTR", 0.9, "MRI", SourceType::StructuredData, "no residual tumor");
        assert_eq!(c.supporting_text, "no residual tumor");
    }

    // ── PassResult ──────────────────────────────────────────────────

    #[test]
    fn pass_number_follows_method() {
        assert_eq!(PassResult::new(PassMethod::DocumentExtraction).pass_number, 1);
        assert_eq!(PassResult::new(PassMethod::StructuredQuery).pass_number, 2);
        assert_eq!(PassResult::new(PassMethod::CrossValidation).pass_number, 3);
        assert_eq!(PassResult::new(PassMethod::TemporalReasoning).pass_number, 4);
    }

    #[test]
    fn add_candidate_records_source_once() {
        let mut pass = PassResult::new(PassMethod::StructuredQuery);
        pass.add_candidate(candidate("GTR", 0.9, "MRI 2021-03-02"));
        pass.add_candidate(candidate("GTR", 0.8, "MRI 2021-03-02"));
        pass.add_candidate(candidate("STR", 0.7, "operative note"));
        assert_eq!(pass.candidates.len(), 3);
        assert_eq!(pass.sources, vec!["MRI 2021-03-02", "operative note"]);
    }

    #[test]
    fn empty_pass_is_valid_and_has_no_value() {
        let pass = PassResult::new(PassMethod::StructuredQuery);
        assert!(!pass.has_value());
        assert!(pass.candidates.is_empty());
        assert_eq!(pass.confidence_adjustment, 1.0);
    }

    #[test]
    fn whitespace_value_counts_as_empty() {
        let mut pass = PassResult::new(PassMethod::CrossValidation);
        pass.value = Some("   ".into());
        assert!(!pass.has_value());
    }

    // ── PassFlags ───────────────────────────────────────────────────

    #[test]
    fn flags_flatten_named_then_extra() {
        let mut flags = PassFlags::default();
        flags.strong_consensus = true;
        flags.treatment_mismatch = true;
        flags.extra.insert("extent_conflict".into(), "GTR vs STR".into());
        let flat = flags.flattened();
        assert_eq!(
            flat,
            vec![
                "strong_consensus".to_string(),
                "treatment_mismatch".to_string(),
                "extent_conflict: GTR vs STR".to_string(),
            ]
        );
    }

    #[test]
    fn empty_extra_value_flattens_to_bare_name() {
        let mut flags = PassFlags::default();
        flags.extra.insert("high_discordance".into(), String::new());
        assert_eq!(flags.flattened(), vec!["high_discordance".to_string()]);
    }

    // ── ExtractionResult ────────────────────────────────────────────

    #[test]
    fn all_candidates_is_concatenation_in_pass_order() {
        let mut result = ExtractionResult::new(Variable::ExtentOfResection, "pt-001", d("2021-03-01"));

        let mut p1 = PassResult::new(PassMethod::DocumentExtraction);
        p1.add_candidate(candidate("STR", 0.55, "clinical note"));
        let mut p2 = PassResult::new(PassMethod::StructuredQuery);
        p2.add_candidate(candidate("GTR", 0.95, "MRI 2021-03-02"));
        p2.add_candidate(candidate("GTR", 0.75, "procedure code"));

        result.add_pass(p1);
        result.add_pass(p2);

        let expected: Vec<String> = result
            .passes
            .iter()
            .flat_map(|p| p.candidates.iter().map(|c| c.value.clone()))
            .collect();
        let actual: Vec<String> = result.all_candidates.iter().map(|c| c.value.clone()).collect();
        assert_eq!(actual, expected);
        assert_eq!(actual, vec!["STR", "GTR", "GTR"]);
    }

    #[test]
    fn latest_valued_pass_skips_empty_later_passes() {
        let mut result = ExtractionResult::new(Variable::TumorLocation, "pt-001", d("2021-03-01"));
        let mut p1 = PassResult::new(PassMethod::DocumentExtraction);
        p1.value = Some("Cerebellum".into());
        p1.confidence = 0.8;
        result.add_pass(p1);
        result.add_pass(PassResult::new(PassMethod::StructuredQuery));
        let latest = result.latest_valued_pass().unwrap();
        assert_eq!(latest.pass_number, 1);
    }

    #[test]
    fn to_json_exposes_stable_schema() {
        let result = ExtractionResult::new(Variable::WhoGrade, "pt-002", d("2022-01-15"));
        let json = result.to_json();
        for key in [
            "variable",
            "patient_id",
            "event_date",
            "final_value",
            "final_confidence",
            "needs_manual_review",
            "clinical_flags",
            "reasoning_chain",
            "all_candidates",
            "passes",
        ] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
    }
}
