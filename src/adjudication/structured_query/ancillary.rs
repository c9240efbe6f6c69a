//! Lower-stakes text scans: molecular-testing and specimen-routing
//! language in procedure and diagnosis rows.

use crate::adjudication::types::{Candidate, PassResult, SourceType};
use crate::adjudication::weights::query;

use super::{match_phrase, QueryInput, QueryStrategy};

const MOLECULAR_PHRASES: &[&str] = &[
    "molecular testing",
    "molecular profiling",
    "sequencing",
    "methylation",
    "braf",
    "idh",
    "h3 k27",
    "fusion panel",
];

const ROUTING_PHRASES: &[&str] = &[
    "sent to pathology",
    "specimen to pathology",
    "specimen submitted",
    "sent for frozen section",
    "routed to pathology",
];

pub struct MolecularTestingQuery;

impl QueryStrategy for MolecularTestingQuery {
    fn run(&self, input: &QueryInput, pass: &mut PassResult) {
        for record in input.snapshot.procedures_in_window(input.event_date, 0, 14) {
            if let Some(phrase) = match_phrase(&record.description, MOLECULAR_PHRASES) {
                pass.add_candidate(Candidate::new(
                    "Performed",
                    query::ANCILLARY_TEXT,
                    format!("procedure {}", record.date),
                    SourceType::StructuredData,
                    &record.description,
                ));
                pass.add_note(format!("Molecular-testing language matched: '{phrase}'."));
            }
        }
        for record in input.snapshot.all_diagnoses() {
            if match_phrase(&record.description, MOLECULAR_PHRASES).is_some() {
                pass.add_candidate(Candidate::new(
                    "Performed",
                    query::ANCILLARY_TEXT,
                    format!("diagnosis {}", record.date),
                    SourceType::StructuredData,
                    &record.description,
                ));
            }
        }

        if pass.candidates.is_empty() {
            pass.add_note("No molecular-testing language found in structured text.");
        }
    }
}

pub struct SpecimenRoutingQuery;

impl QueryStrategy for SpecimenRoutingQuery {
    fn run(&self, input: &QueryInput, pass: &mut PassResult) {
        for record in input.snapshot.procedures_in_window(input.event_date, 0, 7) {
            if match_phrase(&record.description, ROUTING_PHRASES).is_some() {
                pass.add_candidate(Candidate::new(
                    "Sent to pathology",
                    query::ANCILLARY_TEXT,
                    format!("procedure {}", record.date),
                    SourceType::StructuredData,
                    &record.description,
                ));
            }
        }

        if pass.candidates.is_empty() {
            pass.add_note("No specimen-routing language found in procedure text.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjudication::structured_query::run_structured_query;
    use crate::adjudication::types::PassMethod;
    use crate::models::{ProcedureRecord, StructuredSnapshot, Variable};
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn snapshot_with(description: &str) -> StructuredSnapshot {
        StructuredSnapshot {
            procedures: vec![ProcedureRecord {
                date: d("2021-03-02"),
                code: None,
                description: description.into(),
            }],
            ..Default::default()
        }
    }

    fn run(variable: Variable, snapshot: &StructuredSnapshot) -> PassResult {
        let prior = PassResult::new(PassMethod::DocumentExtraction);
        let input = QueryInput {
            event_date: d("2021-03-01"),
            prior: &prior,
            snapshot,
            timeline: &[],
            surgical_context: None,
        };
        run_structured_query(variable, &input)
    }

    #[test]
    fn braf_language_marks_molecular_testing_performed() {
        let snapshot = snapshot_with("Specimen sent for BRAF fusion panel");
        let pass = run(Variable::MolecularTesting, &snapshot);
        assert_eq!(pass.value.as_deref(), Some("Performed"));
        assert_eq!(pass.confidence, query::ANCILLARY_TEXT);
    }

    #[test]
    fn routing_language_marks_specimen_sent() {
        let snapshot = snapshot_with("Tumor specimen sent to pathology for permanent section");
        let pass = run(Variable::SpecimenRouting, &snapshot);
        assert_eq!(pass.value.as_deref(), Some("Sent to pathology"));
    }

    #[test]
    fn unrelated_procedure_text_yields_nothing() {
        let snapshot = snapshot_with("Dressing change at bedside");
        assert!(run(Variable::MolecularTesting, &snapshot).candidates.is_empty());
        assert!(run(Variable::SpecimenRouting, &snapshot).candidates.is_empty());
    }
}
