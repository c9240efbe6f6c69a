//! Pass 2: structured-data query.
//!
//! Dispatches by variable to a fixed table of per-variable strategies, each
//! walking its own source-tier hierarchy over the read-only snapshot. Runs
//! only when Pass 1 came back empty or weak.

pub mod ancillary;
pub mod location;
pub mod pathology;
pub mod resection;
pub mod surgery;

use chrono::NaiveDate;

use crate::adjudication::types::{PassMethod, PassResult};
use crate::models::{StructuredSnapshot, SurgicalContext, TimelineEvent, Variable};

/// Read-only inputs shared by every strategy.
pub struct QueryInput<'a> {
    pub event_date: NaiveDate,
    /// Pass 1's result — strategies may consult it but never mutate it.
    pub prior: &'a PassResult,
    pub snapshot: &'a StructuredSnapshot,
    pub timeline: &'a [TimelineEvent],
    pub surgical_context: Option<&'a SurgicalContext>,
}

/// One per variable. Self-contained, independently testable.
pub trait QueryStrategy: Send + Sync {
    /// Scan the snapshot and append candidates/notes to `pass`.
    fn run(&self, input: &QueryInput, pass: &mut PassResult);
}

/// Explicit no-op for variables with no structured-data strategy.
struct NoOpStrategy;

impl QueryStrategy for NoOpStrategy {
    fn run(&self, _input: &QueryInput, pass: &mut PassResult) {
        pass.add_note("No structured-data query strategy for this variable; pass ran, found nothing.");
    }
}

/// Fixed dispatch table. Unknown variables get the explicit no-op rather
/// than an attribute-lookup default.
fn strategy_for(variable: Variable) -> &'static dyn QueryStrategy {
    match variable {
        Variable::ExtentOfResection => &resection::ExtentOfResectionQuery,
        Variable::TumorLocation => &location::TumorLocationQuery,
        Variable::Histopathology => &pathology::HistopathologyQuery,
        Variable::WhoGrade => &pathology::WhoGradeQuery,
        Variable::SurgeryType => &surgery::SurgeryTypeQuery,
        Variable::MolecularTesting => &ancillary::MolecularTestingQuery,
        Variable::SpecimenRouting => &ancillary::SpecimenRoutingQuery,
        Variable::Unsupported => &NoOpStrategy,
    }
}

/// Run the structured-data query pass for one variable.
pub fn run_structured_query(variable: Variable, input: &QueryInput) -> PassResult {
    let mut pass = PassResult::new(PassMethod::StructuredQuery);
    strategy_for(variable).run(input, &mut pass);

    // The pass's own best answer is its top candidate, if any.
    if let Some(best) = pass
        .candidates
        .iter()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    {
        pass.value = Some(best.value.clone());
        pass.confidence = best.confidence;
    }

    tracing::debug!(
        variable = variable.as_str(),
        candidates = pass.candidates.len(),
        value = pass.value.as_deref().unwrap_or("-"),
        "Structured query pass complete"
    );
    pass
}

/// First matching phrase from `phrases` found in `text` (case-insensitive).
pub(crate) fn match_phrase<'p>(text: &str, phrases: &[&'p str]) -> Option<&'p str> {
    let lower = text.to_lowercase();
    phrases.iter().copied().find(|p| lower.contains(p))
}
