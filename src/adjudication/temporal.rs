//! Pass 4: temporal/clinical plausibility.
//!
//! Checks the running adjudicated value against the patient timeline for
//! implausible patterns. Its only output is a `confidence_adjustment`
//! multiplier plus flags and notes — it never sets a value or confidence
//! of its own; the finalizer applies the multiplier.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::adjudication::types::{ExtractionResult, PassMethod, PassResult, SourceType};
use crate::adjudication::weights::temporal;
use crate::adjudication::cross_validation::{classify_source, SourceClass};
use crate::models::{event_within, surgeries_within, TimelineEvent, TimelineEventType, Variable};

/// Low-grade language in prior diagnosis events.
static LOW_GRADE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:who\s+)?grade\s+(?:ii|i|[12])\b|low[\s-]grade|pilocytic").unwrap()
});

/// High-grade language in the adjudicated value.
static HIGH_GRADE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)glioblastoma|anaplastic|high[\s-]grade|\bgrade\s+(?:iii|iv|[34])\b").unwrap()
});

/// Inputs for the plausibility pass.
pub struct TemporalInput<'a> {
    pub event_date: NaiveDate,
    pub result: &'a ExtractionResult,
    pub timeline: &'a [TimelineEvent],
    pub patient_age_years: Option<f32>,
}

/// Run the plausibility pass for one variable.
pub fn run_temporal_reasoning(variable: Variable, input: &TemporalInput) -> PassResult {
    let mut pass = PassResult::new(PassMethod::TemporalReasoning);

    let current = input
        .result
        .latest_valued_pass()
        .and_then(|p| p.value.clone());
    let Some(value) = current else {
        pass.add_note("No adjudicated value yet; nothing to check for plausibility.");
        return pass;
    };

    match variable {
        Variable::ExtentOfResection => check_resection(&value, input, &mut pass),
        Variable::Histopathology => check_histology(&value, input, &mut pass),
        Variable::WhoGrade => check_grade(&value, input, &mut pass),
        Variable::TumorLocation => check_location(&value, input, &mut pass),
        Variable::SurgeryType => check_surgery_type(&value, input, &mut pass),
        _ => {
            pass.add_note("No temporal plausibility rules for this variable; adjustment unchanged.");
        }
    }

    tracing::debug!(
        variable = variable.as_str(),
        adjustment = pass.confidence_adjustment,
        "Temporal reasoning complete"
    );
    pass
}

fn adjust(pass: &mut PassResult, factor: f32, why: String) {
    pass.confidence_adjustment *= factor;
    pass.add_note(format!("Adjustment ×{factor}: {why}"));
}

// ─── Extent of resection ─────────────────────────────────────────────────────

fn check_resection(value: &str, input: &TemporalInput, pass: &mut PassResult) {
    let is_gtr = value == "GTR";
    let is_incomplete = matches!(value, "STR" | "Partial");

    let surgeries = surgeries_within(
        input.timeline,
        input.event_date,
        temporal::MULTI_SURGERY_WINDOW_DAYS,
    );
    if surgeries > temporal::MULTI_SURGERY_THRESHOLD {
        if is_gtr {
            adjust(
                pass,
                temporal::MULTI_SURGERY_GTR,
                format!("{surgeries} surgeries within 30 days contradict a complete resection"),
            );
            pass.add_flag(
                "gtr_unlikely_with_reoperation",
                format!("{surgeries} surgeries within 30 days"),
            );
        } else if is_incomplete {
            adjust(
                pass,
                temporal::MULTI_SURGERY_INCOMPLETE,
                format!("{surgeries} surgeries within 30 days are consistent with residual disease"),
            );
        }
    }

    if event_within(
        input.timeline,
        TimelineEventType::Radiation,
        input.event_date,
        temporal::RADIATION_WINDOW_DAYS,
    )
    .is_some()
    {
        if is_gtr {
            adjust(
                pass,
                temporal::RADIATION_GTR,
                "post-op radiation within 90 days argues against a complete resection".into(),
            );
        } else if is_incomplete {
            adjust(
                pass,
                temporal::RADIATION_INCOMPLETE,
                "post-op radiation within 90 days is consistent with residual disease".into(),
            );
        }
    }

    if event_within(
        input.timeline,
        TimelineEventType::Chemotherapy,
        input.event_date,
        temporal::CHEMO_WINDOW_DAYS,
    )
    .is_some()
        && !is_gtr
    {
        adjust(
            pass,
            temporal::CHEMO_INCOMPLETE,
            "early chemotherapy is a soft signal of residual disease".into(),
        );
    }
}

// ─── Histopathology ──────────────────────────────────────────────────────────

/// A prior low-grade diagnosis event at least `TRANSFORMATION_MIN_YEARS`
/// before the current event.
fn prior_low_grade_event<'a>(
    timeline: &'a [TimelineEvent],
    event_date: NaiveDate,
) -> Option<&'a TimelineEvent> {
    timeline.iter().find(|ev| {
        ev.event_type == TimelineEventType::Diagnosis
            && (event_date - ev.event_date).num_days() >= temporal::TRANSFORMATION_MIN_YEARS * 365
            && LOW_GRADE_PATTERN.is_match(&ev.description)
    })
}

fn check_histology(value: &str, input: &TemporalInput, pass: &mut PassResult) {
    if HIGH_GRADE_PATTERN.is_match(value) {
        if let Some(prior) = prior_low_grade_event(input.timeline, input.event_date) {
            pass.flags.tumor_transformation = true;
            adjust(
                pass,
                temporal::TRANSFORMATION_BOOST,
                format!(
                    "prior low-grade diagnosis on {} supports malignant transformation",
                    prior.event_date
                ),
            );
        }
    }

    let is_glioblastoma = value.to_lowercase().contains("glioblastoma");
    let young = input
        .patient_age_years
        .is_some_and(|age| age < temporal::GLIOBLASTOMA_MIN_AGE);
    if is_glioblastoma && young {
        let pathology_backed = input
            .result
            .all_candidates
            .iter()
            .any(|c| c.value == value && classify_source(c) == SourceClass::Pathology);
        if !pathology_backed {
            adjust(
                pass,
                temporal::GLIOBLASTOMA_AGE_PENALTY,
                "glioblastoma is rare under age 10 and no pathology source supports it".into(),
            );
            pass.add_flag(
                "age_atypical_histology",
                "glioblastoma diagnosed under age 10 without pathology support",
            );
        }
    }
}

// ─── WHO grade ───────────────────────────────────────────────────────────────

fn check_grade(value: &str, input: &TemporalInput, pass: &mut PassResult) {
    let high_grade = matches!(value, "III" | "IV");
    if !high_grade {
        return;
    }

    // Flag apparent progression from prior low-grade diagnoses; no
    // adjustment without a further rule.
    if prior_low_grade_event(input.timeline, input.event_date).is_some() {
        pass.flags.grade_progression = true;
        pass.add_note("Prior low-grade diagnosis on the timeline; apparent grade progression flagged.");
    }

    let radiation = event_within(
        input.timeline,
        TimelineEventType::Radiation,
        input.event_date,
        temporal::RADIATION_WINDOW_DAYS,
    )
    .is_some();
    let chemo = event_within(
        input.timeline,
        TimelineEventType::Chemotherapy,
        input.event_date,
        temporal::CHEMO_WINDOW_DAYS,
    )
    .is_some();
    let recent_surgery = surgeries_within(
        input.timeline,
        input.event_date,
        temporal::TREATMENT_MISMATCH_SURGERY_WINDOW_DAYS,
    ) > 0;

    if !radiation && !chemo && !recent_surgery {
        pass.flags.treatment_mismatch = true;
        pass.add_note(format!(
            "Grade {value} with no adjuvant therapy and no surgery within {} days.",
            temporal::TREATMENT_MISMATCH_SURGERY_WINDOW_DAYS
        ));
    }
}

// ─── Location and surgery type ───────────────────────────────────────────────

const POSTERIOR_FOSSA_VALUES: &[&str] = &["Posterior fossa", "Cerebellum", "Fourth ventricle", "Brainstem"];
const POSTERIOR_FOSSA_APPROACH: &[&str] = &["suboccipital", "posterior fossa", "retrosigmoid", "telovelar"];
const SUPRATENTORIAL_VALUES: &[&str] = &["Frontal lobe", "Temporal lobe", "Parietal lobe", "Occipital lobe"];

fn check_location(value: &str, input: &TemporalInput, pass: &mut PassResult) {
    let approach_text: Vec<&str> = input
        .timeline
        .iter()
        .filter(|ev| {
            ev.event_type == TimelineEventType::Surgery
                && (ev.event_date - input.event_date).num_days().abs() <= 3
        })
        .map(|ev| ev.description.as_str())
        .collect();
    if approach_text.is_empty() {
        pass.add_note("No surgical approach text near the event; location unverified.");
        return;
    }

    let posterior_approach = approach_text.iter().any(|text| {
        let lower = text.to_lowercase();
        POSTERIOR_FOSSA_APPROACH.iter().any(|p| lower.contains(p))
    });

    if posterior_approach && POSTERIOR_FOSSA_VALUES.contains(&value) {
        adjust(
            pass,
            temporal::APPROACH_CONFIRMS_LOCATION,
            "surgical approach confirms a posterior fossa location".into(),
        );
    } else if posterior_approach && SUPRATENTORIAL_VALUES.contains(&value) {
        pass.flags.location_mismatch = true;
        pass.add_note("Posterior fossa approach recorded but adjudicated location is supratentorial.");
    }
}

fn check_surgery_type(value: &str, input: &TemporalInput, pass: &mut PassResult) {
    let consistent = input.timeline.iter().any(|ev| {
        ev.event_type == TimelineEventType::Surgery
            && (ev.event_date - input.event_date).num_days().abs() <= 3
            && ev.description.to_lowercase().contains(&value.to_lowercase())
    });
    if consistent {
        adjust(
            pass,
            temporal::PROCEDURE_CONFIRMS_SURGERY_TYPE,
            "timeline procedure wording matches the adjudicated surgery type".into(),
        );
    } else {
        pass.add_note("Timeline wording neither confirms nor contradicts the surgery type.");
    }
}
