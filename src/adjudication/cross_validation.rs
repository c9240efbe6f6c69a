//! Pass 3: cross-source validation.
//!
//! Groups every candidate seen so far by exact value string, then resolves:
//! perfect consensus gets an agreement boost, binary conflicts go through a
//! per-variable source-priority table, and 3+-way discordance picks the
//! best-supported value at a heavy penalty with mandatory review. Groups
//! live in a `BTreeMap` so every tie-break is deterministic (lexicographic
//! on value when count and confidence are equal).

use std::collections::BTreeMap;

use crate::adjudication::types::{Candidate, ExtractionResult, PassMethod, PassResult, SourceType};
use crate::adjudication::weights::consensus;
use crate::models::Variable;

// ─── Source classification ───────────────────────────────────────────────────

/// Ranked provenance class used by the priority tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceClass {
    OperativeNote,
    Imaging,
    Pathology,
    DischargeSummary,
    ClinicalNote,
    Diagnosis,
    StructuredData,
    Inference,
}

/// Classify a candidate's provenance string. Free-text source labels come
/// from both the document extractor and Pass 2, so this is keyword-based
/// with the `source_type` enum as the fallback.
pub fn classify_source(candidate: &Candidate) -> SourceClass {
    if candidate.source_type == SourceType::Inference {
        return SourceClass::Inference;
    }
    let s = candidate.source.to_lowercase();
    if s.contains("operative") || s.contains("op note") {
        SourceClass::OperativeNote
    } else if s.contains("patholog") {
        SourceClass::Pathology
    } else if s.contains("mri") || s.starts_with("ct ") || s.contains(" ct ") || s.contains("imaging") {
        SourceClass::Imaging
    } else if s.contains("discharge") {
        SourceClass::DischargeSummary
    } else if s.contains("diagnos") {
        SourceClass::Diagnosis
    } else {
        match candidate.source_type {
            SourceType::Document => SourceClass::ClinicalNote,
            SourceType::StructuredData | SourceType::Timeline => SourceClass::StructuredData,
            SourceType::Inference => SourceClass::Inference,
        }
    }
}

/// Per-variable source priority. Higher wins a binary conflict; `None`
/// means the variable has no table and falls back to highest-confidence.
fn priority(variable: Variable, class: SourceClass) -> Option<u8> {
    match variable {
        Variable::ExtentOfResection => Some(match class {
            SourceClass::OperativeNote => 3,
            SourceClass::Imaging | SourceClass::Pathology => 2,
            SourceClass::DischargeSummary
            | SourceClass::ClinicalNote
            | SourceClass::Diagnosis
            | SourceClass::StructuredData => 1,
            SourceClass::Inference => 0,
        }),
        Variable::TumorLocation => Some(match class {
            SourceClass::Imaging => 3,
            SourceClass::OperativeNote | SourceClass::Pathology => 2,
            SourceClass::Diagnosis
            | SourceClass::StructuredData
            | SourceClass::DischargeSummary
            | SourceClass::ClinicalNote => 1,
            SourceClass::Inference => 0,
        }),
        _ => None,
    }
}

// ─── Pass entry point ────────────────────────────────────────────────────────

/// Run cross-source validation over everything in `result.all_candidates`.
pub fn run_cross_validation(result: &ExtractionResult) -> PassResult {
    let mut pass = PassResult::new(PassMethod::CrossValidation);

    let mut groups: BTreeMap<&str, Vec<&Candidate>> = BTreeMap::new();
    for candidate in &result.all_candidates {
        groups.entry(candidate.value.as_str()).or_default().push(candidate);
    }

    match groups.len() {
        0 => {
            pass.add_note("No candidates to cross-validate; pass ran, found nothing.");
        }
        1 => resolve_consensus(&groups, &mut pass),
        2 => resolve_binary_conflict(result.variable, &groups, &mut pass),
        n => resolve_discordance(n, &groups, &mut pass),
    }

    apply_post_checks(result, &mut pass);

    tracing::debug!(
        variable = result.variable.as_str(),
        groups = groups.len(),
        value = pass.value.as_deref().unwrap_or("-"),
        confidence = pass.confidence,
        "Cross-validation complete"
    );
    pass
}

fn group_max_confidence(members: &[&Candidate]) -> f32 {
    members.iter().map(|c| c.confidence).fold(0.0, f32::max)
}

// ─── Perfect consensus ───────────────────────────────────────────────────────

fn resolve_consensus(groups: &BTreeMap<&str, Vec<&Candidate>>, pass: &mut PassResult) {
    let Some((value, members)) = groups.iter().next().map(|(v, m)| (*v, m)) else {
        return;
    };
    let count = members.len();
    let mean: f32 = members.iter().map(|c| c.confidence).sum::<f32>() / count.max(1) as f32;
    let max = group_max_confidence(members);

    let confidence = if count >= 3 {
        pass.flags.strong_consensus = true;
        // Agreement never reduces confidence below the best single source
        // (subject to the cap).
        (mean * consensus::STRONG_BOOST).max(max).min(consensus::STRONG_CAP)
    } else if count == 2 {
        pass.flags.consensus = true;
        (mean * consensus::PAIR_BOOST).max(max).min(consensus::PAIR_CAP)
    } else {
        mean
    };

    pass.value = Some(value.to_string());
    pass.confidence = confidence;
    for c in members.iter() {
        pass.sources.push(c.source.clone());
    }
    pass.add_note(format!(
        "{count} source(s) agree on '{value}'; confidence {confidence:.3}."
    ));
}

// ─── Binary conflict ─────────────────────────────────────────────────────────

fn resolve_binary_conflict(
    variable: Variable,
    groups: &BTreeMap<&str, Vec<&Candidate>>,
    pass: &mut PassResult,
) {
    if variable == Variable::Histopathology {
        resolve_histology_conflict(groups, pass);
        return;
    }

    let has_table = groups
        .values()
        .flatten()
        .any(|c| priority(variable, classify_source(c)).is_some());

    if has_table {
        // Highest-priority candidate wins; ties broken by confidence.
        let Some(winner) = groups.values().flatten().max_by(|a, b| {
            let pa = priority(variable, classify_source(a)).unwrap_or(0);
            let pb = priority(variable, classify_source(b)).unwrap_or(0);
            pa.cmp(&pb).then(a.confidence.total_cmp(&b.confidence))
        }) else {
            return;
        };
        pass.value = Some(winner.value.clone());
        pass.confidence = winner.confidence * consensus::CONFLICT_PENALTY;
        pass.sources.push(winner.source.clone());
        pass.add_note(format!(
            "Two-way disagreement resolved by source priority: '{}' from {} wins; confidence {:.3} after ×{} penalty.",
            winner.value, winner.source, pass.confidence, consensus::CONFLICT_PENALTY
        ));
    } else {
        resolve_by_confidence(groups, pass);
    }
}

/// Pathology is definitive for histology when present; otherwise fall back
/// to confidence ranking at the generic penalty.
fn resolve_histology_conflict(groups: &BTreeMap<&str, Vec<&Candidate>>, pass: &mut PassResult) {
    let best_pathology = groups
        .values()
        .flatten()
        .filter(|c| classify_source(c) == SourceClass::Pathology)
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence));

    if let Some(winner) = best_pathology {
        pass.flags.pathology_definitive = true;
        pass.value = Some(winner.value.clone());
        pass.confidence = winner.confidence;
        pass.sources.push(winner.source.clone());
        pass.add_note(format!(
            "Pathology source is definitive for histology: '{}' at {:.3}.",
            winner.value, winner.confidence
        ));
    } else {
        resolve_by_confidence(groups, pass);
    }
}

/// Generic fallback: highest confidence wins at the ×0.7 penalty.
fn resolve_by_confidence(groups: &BTreeMap<&str, Vec<&Candidate>>, pass: &mut PassResult) {
    let Some(winner) = groups
        .values()
        .flatten()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    else {
        return;
    };
    pass.value = Some(winner.value.clone());
    pass.confidence = winner.confidence * consensus::GENERIC_CONFLICT_PENALTY;
    pass.sources.push(winner.source.clone());
    pass.add_note(format!(
        "Disagreement without a priority rule: highest-confidence candidate '{}' wins; confidence {:.3} after ×{} penalty.",
        winner.value, pass.confidence, consensus::GENERIC_CONFLICT_PENALTY
    ));
}

// ─── High discordance ────────────────────────────────────────────────────────

fn resolve_discordance(
    group_count: usize,
    groups: &BTreeMap<&str, Vec<&Candidate>>,
    pass: &mut PassResult,
) {
    // Most supporting candidates; ties by max in-group confidence; final
    // tie lexicographic on value (BTreeMap order — strict > keeps the
    // first, i.e. smallest, key).
    let mut best: Option<(&str, usize, f32)> = None;
    for (&value, members) in groups {
        let count = members.len();
        let max = group_max_confidence(members);
        let better = match best {
            None => true,
            Some((_, bc, bm)) => count > bc || (count == bc && max > bm),
        };
        if better {
            best = Some((value, count, max));
        }
    }
    let Some((value, count, raw)) = best else { return };

    pass.value = Some(value.to_string());
    pass.confidence = raw * consensus::DISCORDANCE_PENALTY;
    pass.add_flag(
        "high_discordance",
        format!("{group_count} conflicting values across sources"),
    );
    pass.add_recommendation(format!(
        "Manual review required: {group_count} sources disagree; selected '{value}' ({count} supporting) at heavily penalized confidence."
    ));
    pass.add_note(format!(
        "High discordance: '{value}' chosen from {group_count} groups; confidence {:.3} after ×{} penalty.",
        pass.confidence,
        consensus::DISCORDANCE_PENALTY
    ));
}

// ─── Plausibility post-checks ────────────────────────────────────────────────

/// Variable-specific post-checks express themselves through
/// `confidence_adjustment`, never by editing `confidence` directly.
fn apply_post_checks(result: &ExtractionResult, pass: &mut PassResult) {
    if result.variable != Variable::ExtentOfResection {
        return;
    }
    if pass.value.as_deref() != Some("GTR") {
        return;
    }
    let contradicted = result
        .all_candidates
        .iter()
        .any(|c| c.source_type == SourceType::Inference && c.value != "GTR");
    if contradicted {
        pass.confidence_adjustment *= consensus::GTR_REOPERATION_ADJUSTMENT;
        pass.add_flag(
            "gtr_reoperation_unlikely",
            "complete resection claimed while treatment pattern implies residual disease",
        );
        pass.add_note(format!(
            "GTR contradicted by treatment-pattern inference; adjustment ×{}.",
            consensus::GTR_REOPERATION_ADJUSTMENT
        ));
    }
}
