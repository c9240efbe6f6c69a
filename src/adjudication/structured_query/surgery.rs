//! Surgery-type query strategy: classify the index procedure from its
//! free-text description.

use crate::adjudication::types::{Candidate, PassResult, SourceType};
use crate::adjudication::weights::query;

use super::{match_phrase, QueryInput, QueryStrategy};

const RESECTION_PHRASES: &[&str] = &["craniotomy", "resection", "excision", "debulking"];
const BIOPSY_PHRASES: &[&str] = &["stereotactic biopsy", "needle biopsy", "biopsy"];
const CSF_PHRASES: &[&str] = &[
    "ventriculoperitoneal shunt",
    "vp shunt",
    "shunt placement",
    "endoscopic third ventriculostomy",
    "etv",
    "external ventricular drain",
];

/// Classify a procedure description. Biopsy wording wins over resection
/// wording when both appear ("craniotomy for open biopsy" is a biopsy).
fn surgery_type(description: &str) -> Option<&'static str> {
    if match_phrase(description, BIOPSY_PHRASES).is_some() {
        Some("Biopsy")
    } else if match_phrase(description, CSF_PHRASES).is_some() {
        Some("CSF diversion")
    } else if match_phrase(description, RESECTION_PHRASES).is_some() {
        Some("Resection")
    } else {
        None
    }
}

pub struct SurgeryTypeQuery;

impl QueryStrategy for SurgeryTypeQuery {
    fn run(&self, input: &QueryInput, pass: &mut PassResult) {
        for record in input.snapshot.procedures_in_window(input.event_date, 0, 3) {
            if let Some(value) = surgery_type(&record.description) {
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

        if pass.candidates.is_empty() {
            pass.add_note("No classifiable procedure text found for this event.");
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

    #[test]
    fn biopsy_wording_wins_over_craniotomy() {
        assert_eq!(surgery_type("craniotomy for open biopsy"), Some("Biopsy"));
        assert_eq!(surgery_type("suboccipital craniotomy, tumor resection"), Some("Resection"));
        assert_eq!(surgery_type("VP shunt placement"), Some("CSF diversion"));
        assert_eq!(surgery_type("wound check"), None);
    }

    #[test]
    fn procedure_in_event_window_yields_candidate() {
        let snapshot = StructuredSnapshot {
            procedures: vec![ProcedureRecord {
                date: d("2021-03-01"),
                code: Some("61510".into()),
                description: "Craniotomy with gross total resection of tumor".into(),
            }],
            ..Default::default()
        };
        let prior = PassResult::new(PassMethod::DocumentExtraction);
        let input = QueryInput {
            event_date: d("2021-03-01"),
            prior: &prior,
            snapshot: &snapshot,
            timeline: &[],
            surgical_context: None,
        };
        let pass = run_structured_query(Variable::SurgeryType, &input);
        assert_eq!(pass.value.as_deref(), Some("Resection"));
        assert_eq!(pass.confidence, query::PROCEDURE_TEXT);
    }
}
