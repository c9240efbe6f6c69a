//! Tumor-location query strategy.
//!
//! Unlike extent-of-resection there is no gold-standard tier: diagnosis
//! text, pre-operative imaging, and procedure free text all contribute
//! non-exclusively at moderate confidence, and Pass 3 reconciles.

use crate::adjudication::types::{Candidate, PassResult, SourceType};
use crate::adjudication::weights::query;

use super::{QueryInput, QueryStrategy};

/// Anatomic site vocabulary mapped to canonical values. Ordered so more
/// specific phrases match before their containing regions.
const SITE_PHRASES: &[(&str, &str)] = &[
    ("posterior fossa", "Posterior fossa"),
    ("cerebellar", "Cerebellum"),
    ("cerebellum", "Cerebellum"),
    ("fourth ventricle", "Fourth ventricle"),
    ("brainstem", "Brainstem"),
    ("pons", "Brainstem"),
    ("thalamic", "Thalamus"),
    ("thalamus", "Thalamus"),
    ("suprasellar", "Suprasellar"),
    ("sellar", "Suprasellar"),
    ("pineal", "Pineal region"),
    ("frontal", "Frontal lobe"),
    ("temporal", "Temporal lobe"),
    ("parietal", "Parietal lobe"),
    ("occipital", "Occipital lobe"),
    ("spinal cord", "Spinal cord"),
    ("spinal", "Spinal cord"),
];

/// Canonical site named in `text`, if any.
pub(crate) fn site_in_text(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    SITE_PHRASES
        .iter()
        .find(|(phrase, _)| lower.contains(phrase))
        .map(|(_, value)| *value)
}

pub struct TumorLocationQuery;

impl QueryStrategy for TumorLocationQuery {
    fn run(&self, input: &QueryInput, pass: &mut PassResult) {
        // Diagnosis text (any date — site is stable across encounters).
        for record in input.snapshot.all_diagnoses() {
            if let Some(site) = site_in_text(&record.description) {
                pass.add_candidate(Candidate::new(
                    site,
                    query::LOCATION_DIAGNOSIS_TEXT,
                    format!("diagnosis {}", record.date),
                    SourceType::StructuredData,
                    &record.description,
                ));
            }
        }

        // Pre-operative imaging names the site most reliably.
        let (from, to) = query::PREOP_IMAGING_WINDOW;
        for record in input.snapshot.imaging_in_window(input.event_date, from, to) {
            if let Some(site) = site_in_text(&record.findings) {
                pass.add_candidate(Candidate::new(
                    site,
                    query::LOCATION_PREOP_IMAGING,
                    format!("pre-op imaging {}", record.date),
                    SourceType::StructuredData,
                    &record.findings,
                ));
            }
        }

        // Procedure free text (approach wording often names the site).
        for record in input.snapshot.procedures_in_window(input.event_date, 0, 3) {
            if let Some(site) = site_in_text(&record.description) {
                pass.add_candidate(Candidate::new(
                    site,
                    query::LOCATION_PROCEDURE_TEXT,
                    format!("procedure {}", record.date),
                    SourceType::StructuredData,
                    &record.description,
                ));
            }
        }

        if pass.candidates.is_empty() {
            pass.add_note("No structured evidence of tumor location found.");
        }
    }
}
