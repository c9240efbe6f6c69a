//! Adjudication orchestrator.
//!
//! Runs the passes strictly in order 1→2→3→4→finalize for one
//! (patient, variable, event) unit. Pass 2 is skipped when Pass 1 already
//! answered confidently; Passes 3 and 4 always run. The whole computation
//! is pure and synchronous — parallelism belongs to the caller, one unit
//! per worker, each with its own snapshot view.

use chrono::NaiveDate;

use crate::adjudication::cross_validation::run_cross_validation;
use crate::adjudication::structured_query::{run_structured_query, QueryInput};
use crate::adjudication::temporal::{run_temporal_reasoning, TemporalInput};
use crate::adjudication::types::{ExtractionResult, PassMethod, PassResult};
use crate::adjudication::weights::engine::PASS2_TRIGGER_THRESHOLD;
use crate::adjudication::AdjudicationError;
use crate::models::{StructuredSnapshot, SurgicalContext, TimelineEvent, Variable};

/// One adjudication request. The document pass comes from the external
/// extractor; everything else is the read-only context the engine needs.
pub struct AdjudicationRequest<'a> {
    pub variable: Variable,
    pub patient_id: &'a str,
    pub event_date: NaiveDate,
    /// Pass 1 as supplied by the document extractor.
    pub document_pass: PassResult,
    pub snapshot: &'a StructuredSnapshot,
    pub timeline: &'a [TimelineEvent],
    /// Precomputed by the orchestrator when adjudicating many variables
    /// for the same event; derived from the timeline when absent.
    pub surgical_context: Option<&'a SurgicalContext>,
    pub patient_age_years: Option<f32>,
}

/// Parse a caller-supplied event date. Unparseable dates are a contract
/// violation, not a data-quality condition.
pub fn parse_event_date(raw: &str) -> Result<NaiveDate, AdjudicationError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AdjudicationError::MalformedDate(raw.to_string()))
}

fn validate_document_pass(pass: &PassResult) -> Result<(), AdjudicationError> {
    if pass.method != PassMethod::DocumentExtraction {
        return Err(AdjudicationError::InvalidDocumentPass(pass.pass_number));
    }
    if !(0.0..=1.0).contains(&pass.confidence) {
        return Err(AdjudicationError::ConfidenceOutOfRange(pass.confidence));
    }
    Ok(())
}

/// Adjudicate one (patient, variable, event) unit end to end.
pub fn adjudicate(request: AdjudicationRequest) -> Result<ExtractionResult, AdjudicationError> {
    validate_document_pass(&request.document_pass)?;

    let mut result = ExtractionResult::new(request.variable, request.patient_id, request.event_date);

    // Pass 1: seeded from the document extractor.
    let run_pass2 = !request.document_pass.has_value()
        || request.document_pass.confidence < PASS2_TRIGGER_THRESHOLD;
    result.add_pass(request.document_pass);

    // Pass 2: structured-data query, only when Pass 1 was empty or weak.
    if run_pass2 {
        let prior = &result.passes[0];
        let input = QueryInput {
            event_date: request.event_date,
            prior,
            snapshot: request.snapshot,
            timeline: request.timeline,
            surgical_context: request.surgical_context,
        };
        let pass2 = run_structured_query(request.variable, &input);
        result.add_pass(pass2);
    } else {
        tracing::debug!(
            variable = request.variable.as_str(),
            "Document pass confident; structured query skipped"
        );
    }

    // Pass 3: always reconcile everything seen so far.
    let pass3 = run_cross_validation(&result);
    result.add_pass(pass3);

    // Pass 4: always check plausibility; emits an adjustment, never a value.
    let input = TemporalInput {
        event_date: request.event_date,
        result: &result,
        timeline: request.timeline,
        patient_age_years: request.patient_age_years,
    };
    let pass4 = run_temporal_reasoning(request.variable, &input);
    result.add_pass(pass4);

    result.finalize()?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjudication::types::{Candidate, SourceType};
    use crate::models::{ImagingModality, ImagingRecord, TimelineEventType};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn document_pass(value: Option<&str>, confidence: f32, source: &str) -> PassResult {
        let mut pass = PassResult::new(PassMethod::DocumentExtraction);
        if let Some(v) = value {
            pass.value = Some(v.into());
            pass.confidence = confidence;
            pass.add_candidate(Candidate::new(
                v,
                confidence,
                source,
                SourceType::Document,
                "per dictated note",
            ));
        }
        pass
    }

    // ── Contract validation ─────────────────────────────────────────

    #[test]
    fn malformed_event_date_is_a_typed_error() {
        assert!(matches!(
            parse_event_date("03/01/2021"),
            Err(AdjudicationError::MalformedDate(_))
        ));
        assert_eq!(parse_event_date(" 2021-03-01 ").unwrap(), d("2021-03-01"));
    }

    #[test]
    fn wrong_method_for_document_pass_fails_fast() {
        let snapshot = StructuredSnapshot::default();
        let request = AdjudicationRequest {
            variable: Variable::ExtentOfResection,
            patient_id: "pt-001",
            event_date: d("2021-03-01"),
            document_pass: PassResult::new(PassMethod::CrossValidation),
            snapshot: &snapshot,
            timeline: &[],
            surgical_context: None,
            patient_age_years: None,
        };
        assert!(matches!(
            adjudicate(request),
            Err(AdjudicationError::InvalidDocumentPass(3))
        ));
    }

    // ── Pass-2 gating ───────────────────────────────────────────────

    #[test]
    fn confident_document_pass_skips_structured_query() {
        let snapshot = StructuredSnapshot::default();
        let request = AdjudicationRequest {
            variable: Variable::ExtentOfResection,
            patient_id: "pt-001",
            event_date: d("2021-03-01"),
            document_pass: document_pass(Some("GTR"), 0.9, "operative note"),
            snapshot: &snapshot,
            timeline: &[],
            surgical_context: None,
            patient_age_years: None,
        };
        let result = adjudicate(request).unwrap();
        let methods: Vec<_> = result.passes.iter().map(|p| p.method).collect();
        assert_eq!(
            methods,
            vec![
                PassMethod::DocumentExtraction,
                PassMethod::CrossValidation,
                PassMethod::TemporalReasoning,
            ]
        );
    }

    #[test]
    fn weak_document_pass_triggers_structured_query() {
        let snapshot = StructuredSnapshot::default();
        let request = AdjudicationRequest {
            variable: Variable::ExtentOfResection,
            patient_id: "pt-001",
            event_date: d("2021-03-01"),
            document_pass: document_pass(Some("STR"), 0.55, "clinical note"),
            snapshot: &snapshot,
            timeline: &[],
            surgical_context: None,
            patient_age_years: None,
        };
        let result = adjudicate(request).unwrap();
        assert_eq!(result.passes.len(), 4);
        assert_eq!(result.passes[1].method, PassMethod::StructuredQuery);
    }

    // ── End-to-end scenario A ───────────────────────────────────────
    // Weak document STR; post-op MRI says no residual tumor; imaging wins
    // the two-way conflict at 0.95 × 0.9; quiet timeline leaves it there.

    #[test]
    fn scenario_a_imaging_overturns_weak_document_extraction() {
        let snapshot = StructuredSnapshot {
            imaging: vec![ImagingRecord {
                date: d("2021-03-02"),
                modality: ImagingModality::Mri,
                findings: "No residual tumor identified in the resection bed.".into(),
            }],
            ..Default::default()
        };
        let request = AdjudicationRequest {
            variable: Variable::ExtentOfResection,
            patient_id: "pt-001",
            event_date: d("2021-03-01"),
            document_pass: document_pass(Some("STR"), 0.55, "clinical note"),
            snapshot: &snapshot,
            timeline: &[],
            surgical_context: None,
            patient_age_years: Some(9.0),
        };
        let result = adjudicate(request).unwrap();

        assert_eq!(result.final_value.as_deref(), Some("GTR"));
        assert!((result.final_confidence - 0.95 * 0.9).abs() < 1e-5);
        assert!(!result.needs_manual_review);
        // Gold-standard short-circuit: pass 2 holds exactly the imaging candidate.
        assert_eq!(result.passes[1].candidates.len(), 1);
        assert!(result.reasoning_chain.iter().any(|l| l.contains("cross_validation")));
    }

    // ── End-to-end scenario B ───────────────────────────────────────
    // Three-way location disagreement: deterministic pick, ×0.5 penalty,
    // mandatory review.

    #[test]
    fn scenario_b_three_way_discordance_forces_review() {
        let mut doc = PassResult::new(PassMethod::DocumentExtraction);
        for (value, source) in [
            ("Frontal lobe", "clinic note"),
            ("Temporal lobe", "discharge summary"),
            ("Cerebellum", "radiology report"),
        ] {
            doc.add_candidate(Candidate::new(value, 0.6, source, SourceType::Document, ""));
        }
        let snapshot = StructuredSnapshot::default();
        let request = AdjudicationRequest {
            variable: Variable::TumorLocation,
            patient_id: "pt-002",
            event_date: d("2021-03-01"),
            document_pass: doc,
            snapshot: &snapshot,
            timeline: &[],
            surgical_context: None,
            patient_age_years: None,
        };
        let result = adjudicate(request).unwrap();

        // Deterministic tie-break: lexicographically smallest value.
        assert_eq!(result.final_value.as_deref(), Some("Cerebellum"));
        assert!((result.final_confidence - 0.6 * 0.5).abs() < 1e-6);
        assert!(result.needs_manual_review);
        let recommendations: Vec<_> = result
            .passes
            .iter()
            .flat_map(|p| p.recommendations.iter())
            .collect();
        assert!(recommendations.iter().any(|r| r.contains("Manual review required")));
    }

    // ── Plausibility interaction ────────────────────────────────────

    #[test]
    fn radiation_after_surgery_downgrades_confident_gtr() {
        let snapshot = StructuredSnapshot::default();
        let timeline = vec![TimelineEvent {
            event_type: TimelineEventType::Radiation,
            event_date: d("2021-04-15"),
            description: "focal proton therapy".into(),
        }];
        let request = AdjudicationRequest {
            variable: Variable::ExtentOfResection,
            patient_id: "pt-003",
            event_date: d("2021-03-01"),
            document_pass: document_pass(Some("GTR"), 0.9, "operative note"),
            snapshot: &snapshot,
            timeline: &timeline,
            surgical_context: None,
            patient_age_years: None,
        };
        let result = adjudicate(request).unwrap();
        // 0.9 (single-candidate consensus) × 0.7 radiation penalty.
        assert_eq!(result.final_value.as_deref(), Some("GTR"));
        assert!((result.final_confidence - 0.9 * 0.7).abs() < 1e-5);
        assert!(result
            .reasoning_chain
            .iter()
            .any(|l| l.contains("Pass 4 adjustment")));
    }

    #[test]
    fn empty_everything_degrades_to_sentinel_not_error() {
        let snapshot = StructuredSnapshot::default();
        let request = AdjudicationRequest {
            variable: Variable::WhoGrade,
            patient_id: "pt-004",
            event_date: d("2021-03-01"),
            document_pass: document_pass(None, 0.0, ""),
            snapshot: &snapshot,
            timeline: &[],
            surgical_context: None,
            patient_age_years: None,
        };
        let result = adjudicate(request).unwrap();
        assert_eq!(result.final_value.as_deref(), Some("no confident extraction"));
        assert_eq!(result.final_confidence, 0.0);
        assert!(result.needs_manual_review);
    }
}
