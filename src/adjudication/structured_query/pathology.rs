//! Histopathology and WHO-grade query strategies.
//!
//! Histology lives in the pathology report, which this pass cannot read
//! directly — when procedure rows show a specimen went to pathology the
//! strategy flags "report exists, retrieve it" instead of inventing a
//! value. Coded diagnoses and the problem list are the queryable tiers.

use std::sync::LazyLock;

use regex::Regex;

use crate::adjudication::types::{Candidate, PassResult, SourceType};
use crate::adjudication::weights::query;

use super::{match_phrase, QueryInput, QueryStrategy};

/// Language in procedure rows indicating a pathology specimen exists.
const SPECIMEN_PHRASES: &[&str] = &[
    "sent to pathology",
    "specimen to pathology",
    "frozen section",
    "permanent section",
    "pathology specimen",
];

/// Histology vocabulary in coded-diagnosis / problem-list text.
const HISTOLOGY_PHRASES: &[(&str, &str)] = &[
    ("pilocytic astrocytoma", "Pilocytic astrocytoma"),
    ("medulloblastoma", "Medulloblastoma"),
    ("ependymoma", "Ependymoma"),
    ("glioblastoma", "Glioblastoma"),
    ("anaplastic astrocytoma", "Anaplastic astrocytoma"),
    ("diffuse midline glioma", "Diffuse midline glioma"),
    ("craniopharyngioma", "Craniopharyngioma"),
    ("germinoma", "Germinoma"),
    ("atrt", "ATRT"),
    ("atypical teratoid", "ATRT"),
    ("ganglioglioma", "Ganglioglioma"),
    ("dnet", "DNET"),
    ("low-grade glioma", "Low-grade glioma"),
    ("low grade glioma", "Low-grade glioma"),
    ("high-grade glioma", "High-grade glioma"),
    ("high grade glioma", "High-grade glioma"),
    ("astrocytoma", "Astrocytoma"),
];

/// "WHO grade II", "grade 3", "grade IV" and similar.
static GRADE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:who\s+)?grade\s+(iv|iii|ii|i|[1-4])\b").unwrap()
});

/// Canonical grade ("I".."IV") named in `text`, if any.
pub(crate) fn grade_in_text(text: &str) -> Option<&'static str> {
    let caps = GRADE_PATTERN.captures(text)?;
    match caps[1].to_lowercase().as_str() {
        "i" | "1" => Some("I"),
        "ii" | "2" => Some("II"),
        "iii" | "3" => Some("III"),
        "iv" | "4" => Some("IV"),
        _ => None,
    }
}

pub(crate) fn histology_in_text(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    HISTOLOGY_PHRASES
        .iter()
        .find(|(phrase, _)| lower.contains(phrase))
        .map(|(_, value)| *value)
}

/// Flag a retrievable pathology report when procedure rows show a specimen
/// was sent. Shared between the histology and grade strategies.
fn flag_pathology_report(input: &QueryInput, pass: &mut PassResult) {
    for record in input.snapshot.procedures_in_window(input.event_date, 0, 7) {
        if match_phrase(&record.description, SPECIMEN_PHRASES).is_some() {
            pass.flags.pathology_report_available = true;
            pass.add_note(format!(
                "Pathology report exists for procedure on {} — retrieve it rather than relying on coded tiers.",
                record.date
            ));
            pass.add_recommendation("Retrieve the surgical pathology report for this event.".to_string());
            return;
        }
    }
}

pub struct HistopathologyQuery;

impl QueryStrategy for HistopathologyQuery {
    fn run(&self, input: &QueryInput, pass: &mut PassResult) {
        flag_pathology_report(input, pass);

        // ICD-10-coded diagnosis tier.
        for record in input.snapshot.all_diagnoses() {
            if let Some(histology) = histology_in_text(&record.description) {
                let source = match &record.icd10 {
                    Some(code) => format!("diagnosis {code} {}", record.date),
                    None => format!("diagnosis {}", record.date),
                };
                pass.add_candidate(Candidate::new(
                    histology,
                    query::ICD_DIAGNOSIS,
                    source,
                    SourceType::StructuredData,
                    &record.description,
                ));
            }
        }

        // Problem-list tier — lowest authority.
        for record in &input.snapshot.problem_list {
            if let Some(histology) = histology_in_text(&record.description) {
                pass.add_candidate(Candidate::new(
                    histology,
                    query::PROBLEM_LIST,
                    format!("problem list {}", record.noted_date),
                    SourceType::StructuredData,
                    &record.description,
                ));
            }
        }

        if pass.candidates.is_empty() && !pass.flags.pathology_report_available {
            pass.add_note("No coded histology found in diagnoses or problem list.");
        }
    }
}

pub struct WhoGradeQuery;

impl QueryStrategy for WhoGradeQuery {
    fn run(&self, input: &QueryInput, pass: &mut PassResult) {
        flag_pathology_report(input, pass);

        for record in input.snapshot.all_diagnoses() {
            if let Some(grade) = grade_in_text(&record.description) {
                pass.add_candidate(Candidate::new(
                    grade,
                    query::ICD_DIAGNOSIS,
                    format!("diagnosis {}", record.date),
                    SourceType::StructuredData,
                    &record.description,
                ));
            }
        }

        for record in &input.snapshot.problem_list {
            if let Some(grade) = grade_in_text(&record.description) {
                pass.add_candidate(Candidate::new(
                    grade,
                    query::PROBLEM_LIST,
                    format!("problem list {}", record.noted_date),
                    SourceType::StructuredData,
                    &record.description,
                ));
            }
        }

        if pass.candidates.is_empty() && !pass.flags.pathology_report_available {
            pass.add_note("No WHO grade found in diagnoses or problem list.");
        }
    }
}
