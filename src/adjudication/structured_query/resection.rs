//! Extent-of-resection query strategy.
//!
//! Tier hierarchy: 0–3 day post-op imaging (gold standard, short-circuits),
//! then 4–7 day imaging, procedure free text, and treatment-pattern
//! inference — the lower three tiers accumulate non-exclusively so Pass 3
//! can reconcile everything they found.

use crate::adjudication::types::{Candidate, PassResult, SourceType};
use crate::adjudication::weights::query;
use crate::models::{ImagingModality, ImagingRecord, SurgicalContext};

use super::{match_phrase, QueryInput, QueryStrategy};

/// Gold-standard phrase sets mapped to adjudicated values.
const GTR_PHRASES: &[&str] = &[
    "no residual tumor",
    "no evidence of residual",
    "gross total resection",
    "complete resection",
];
const STR_PHRASES: &[&str] = &[
    "small residual",
    "subtotal resection",
    "near-total resection",
    "near total resection",
];
const PARTIAL_PHRASES: &[&str] = &[
    "residual mass",
    "stable tumor",
    "partial resection",
    "debulking",
];

/// Procedure free-text phrases — same vocabulary, lower authority.
const PROCEDURE_GTR: &[&str] = &["gross total", "complete excision", "total removal"];
const PROCEDURE_STR: &[&str] = &["subtotal", "near total", "near-total"];
const PROCEDURE_PARTIAL: &[&str] = &["partial", "debulking", "biopsy only"];

/// Map imaging findings text to a resection value.
fn imaging_value(findings: &str) -> Option<&'static str> {
    if match_phrase(findings, GTR_PHRASES).is_some() {
        Some("GTR")
    } else if match_phrase(findings, STR_PHRASES).is_some() {
        Some("STR")
    } else if match_phrase(findings, PARTIAL_PHRASES).is_some() {
        Some("Partial")
    } else {
        None
    }
}

fn procedure_value(description: &str) -> Option<&'static str> {
    if match_phrase(description, PROCEDURE_GTR).is_some() {
        Some("GTR")
    } else if match_phrase(description, PROCEDURE_STR).is_some() {
        Some("STR")
    } else if match_phrase(description, PROCEDURE_PARTIAL).is_some() {
        Some("Partial")
    } else {
        None
    }
}

fn imaging_candidate(record: &ImagingRecord, value: &str, confidence: f32) -> Candidate {
    let modality = match record.modality {
        ImagingModality::Mri => "MRI",
        ImagingModality::Ct => "CT",
        ImagingModality::Other => "imaging",
    };
    Candidate::new(
        value,
        confidence,
        format!("{modality} {}", record.date),
        SourceType::StructuredData,
        &record.findings,
    )
}

pub struct ExtentOfResectionQuery;

impl QueryStrategy for ExtentOfResectionQuery {
    fn run(&self, input: &QueryInput, pass: &mut PassResult) {
        // Tier 1: gold-standard imaging 0–3 days post-op. Authoritative —
        // the first match returns immediately and skips every lower tier.
        let (from, to) = query::IMMEDIATE_POSTOP_WINDOW;
        for record in input.snapshot.imaging_in_window(input.event_date, from, to) {
            if let Some(value) = imaging_value(&record.findings) {
                let confidence = match record.modality {
                    ImagingModality::Mri => query::GOLD_MRI,
                    ImagingModality::Ct => query::GOLD_CT,
                    ImagingModality::Other => continue,
                };
                pass.add_candidate(imaging_candidate(record, value, confidence));
                pass.add_flag("gold_standard_imaging", format!("{} at {}", value, record.date));
                pass.add_note(format!(
                    "Post-op imaging within {from}-{to} days is authoritative; lower evidence tiers skipped."
                ));
                tracing::debug!(value, date = %record.date, "Gold-standard imaging short-circuit");
                return;
            }
        }

        // Tier 2: widened imaging window at reduced confidence.
        let (from, to) = query::EARLY_POSTOP_WINDOW;
        for record in input.snapshot.imaging_in_window(input.event_date, from, to) {
            if let Some(value) = imaging_value(&record.findings) {
                let confidence = match record.modality {
                    ImagingModality::Mri => query::EARLY_MRI,
                    ImagingModality::Ct => query::EARLY_CT,
                    ImagingModality::Other => query::EARLY_OTHER,
                };
                pass.add_candidate(imaging_candidate(record, value, confidence));
            }
        }

        // Tier 3: procedure free-text matching.
        for record in input.snapshot.procedures_in_window(input.event_date, 0, 3) {
            if let Some(value) = procedure_value(&record.description) {
                let source = match &record.code {
                    Some(code) => format!("procedure {code} {}", record.date),
                    None => format!("procedure {}", record.date),
                };
                pass.add_candidate(Candidate::new(
                    value,
                    query::PROCEDURE_TEXT,
                    source,
                    SourceType::StructuredData,
                    &record.description,
                ));
            }
        }

        // Tier 4: inference from surgical/treatment patterns.
        infer_from_treatment(input, pass);

        if pass.candidates.is_empty() {
            pass.add_note("No structured evidence of resection extent found in any tier.");
        }
    }
}

/// ≥3 surgeries within 30 days, or adjuvant radiation/chemo shortly after
/// the event, imply the resection was incomplete.
fn infer_from_treatment(input: &QueryInput, pass: &mut PassResult) {
    let derived;
    let ctx: &SurgicalContext = match input.surgical_context {
        Some(ctx) => ctx,
        None => {
            derived = SurgicalContext::derive(input.timeline, input.event_date);
            &derived
        }
    };

    let mut reasons: Vec<String> = Vec::new();
    if ctx.surgeries_within_30_days >= query::REOPERATION_COUNT {
        reasons.push(format!(
            "{} surgeries within {} days",
            ctx.surgeries_within_30_days,
            query::REOPERATION_WINDOW_DAYS
        ));
    }
    if ctx.radiation_within_90_days {
        reasons.push(format!(
            "radiation within {} days post-op",
            query::RADIATION_WINDOW_DAYS
        ));
    }
    if ctx.chemo_within_60_days {
        reasons.push(format!(
            "chemotherapy within {} days post-op",
            query::CHEMO_WINDOW_DAYS
        ));
    }

    if reasons.is_empty() {
        return;
    }

    let reason_text = reasons.join("; ");
    pass.add_candidate(Candidate::new(
        "STR",
        query::TREATMENT_INFERENCE,
        "treatment-pattern inference",
        SourceType::Inference,
        &format!("Incomplete resection inferred: {reason_text}"),
    ));
    pass.add_note(format!("Treatment pattern suggests incomplete resection ({reason_text})."));
}
