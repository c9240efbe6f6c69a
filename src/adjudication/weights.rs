//! Confidence schedule for the adjudication passes.
//!
//! Every tier confidence, boost, penalty, cap, and date window lives here so
//! the schedule is auditable and testable independently of the control flow
//! that applies it.

/// Pass-2 structured-query tier confidences and windows.
pub mod query {
    /// Post-op imaging window treated as gold standard (days after event).
    pub const IMMEDIATE_POSTOP_WINDOW: (i64, i64) = (0, 3);
    /// Widened imaging window at reduced confidence.
    pub const EARLY_POSTOP_WINDOW: (i64, i64) = (4, 7);
    /// Pre-operative imaging window for location evidence.
    pub const PREOP_IMAGING_WINDOW: (i64, i64) = (-30, 0);

    /// Gold-standard imaging in the immediate post-op window.
    pub const GOLD_MRI: f32 = 0.95;
    pub const GOLD_CT: f32 = 0.85;

    /// Imaging in the widened window.
    pub const EARLY_MRI: f32 = 0.90;
    pub const EARLY_CT: f32 = 0.80;
    pub const EARLY_OTHER: f32 = 0.75;

    /// Procedure free-text match.
    pub const PROCEDURE_TEXT: f32 = 0.75;

    /// Inference from surgical/treatment patterns.
    pub const TREATMENT_INFERENCE: f32 = 0.50;

    /// Diagnosis/grade tiers: ICD-10-coded diagnosis > problem list.
    pub const ICD_DIAGNOSIS: f32 = 0.70;
    pub const PROBLEM_LIST: f32 = 0.50;

    /// Location tiers (non-exclusive).
    pub const LOCATION_PREOP_IMAGING: f32 = 0.80;
    pub const LOCATION_PROCEDURE_TEXT: f32 = 0.70;
    pub const LOCATION_DIAGNOSIS_TEXT: f32 = 0.60;

    /// Lower-stakes scans (molecular-testing, specimen-routing language).
    pub const ANCILLARY_TEXT: f32 = 0.60;

    /// Inference triggers.
    pub const REOPERATION_COUNT: u32 = 3;
    pub const REOPERATION_WINDOW_DAYS: i64 = 30;
    pub const RADIATION_WINDOW_DAYS: i64 = 90;
    pub const CHEMO_WINDOW_DAYS: i64 = 60;
}

/// Pass-3 cross-validation boosts and penalties.
pub mod consensus {
    /// ≥3 agreeing sources.
    pub const STRONG_BOOST: f32 = 1.3;
    pub const STRONG_CAP: f32 = 0.95;
    /// Exactly 2 agreeing sources.
    pub const PAIR_BOOST: f32 = 1.15;
    pub const PAIR_CAP: f32 = 0.90;

    /// Two-way conflict resolved by a priority table.
    pub const CONFLICT_PENALTY: f32 = 0.9;
    /// Two-way conflict resolved by generic highest-confidence fallback,
    /// and histology resolved without any pathology source.
    pub const GENERIC_CONFLICT_PENALTY: f32 = 0.7;
    /// Three or more disagreeing value groups.
    pub const DISCORDANCE_PENALTY: f32 = 0.5;

    /// Post-check: GTR claimed while the evidence set shows re-operation.
    pub const GTR_REOPERATION_ADJUSTMENT: f32 = 0.85;
}

/// Pass-4 temporal/clinical plausibility multipliers.
pub mod temporal {
    /// >2 surgeries within 30 days.
    pub const MULTI_SURGERY_GTR: f32 = 0.6;
    pub const MULTI_SURGERY_INCOMPLETE: f32 = 1.1;
    pub const MULTI_SURGERY_WINDOW_DAYS: i64 = 30;
    pub const MULTI_SURGERY_THRESHOLD: u32 = 2;

    /// Radiation within 90 days of surgery.
    pub const RADIATION_GTR: f32 = 0.7;
    pub const RADIATION_INCOMPLETE: f32 = 1.1;
    pub const RADIATION_WINDOW_DAYS: i64 = 90;

    /// Chemotherapy within 60 days — softer signal.
    pub const CHEMO_INCOMPLETE: f32 = 1.05;
    pub const CHEMO_WINDOW_DAYS: i64 = 60;

    /// Low-grade → high-grade transformation support.
    pub const TRANSFORMATION_BOOST: f32 = 1.1;
    pub const TRANSFORMATION_MIN_YEARS: i64 = 2;

    /// Glioblastoma below this age is penalized unless pathology-backed.
    pub const GLIOBLASTOMA_AGE_PENALTY: f32 = 0.9;
    pub const GLIOBLASTOMA_MIN_AGE: f32 = 10.0;

    /// High-grade value with no adjuvant therapy and no recent surgery.
    pub const TREATMENT_MISMATCH_SURGERY_WINDOW_DAYS: i64 = 180;

    /// Surgical-approach text confirming the adjudicated location.
    pub const APPROACH_CONFIRMS_LOCATION: f32 = 1.15;
    /// Procedure wording consistent with the adjudicated surgery type.
    pub const PROCEDURE_CONFIRMS_SURGERY_TYPE: f32 = 1.05;
}

/// Finalizer thresholds.
pub mod finalizer {
    /// Below this, the adjudicated result requires human inspection.
    pub const MANUAL_REVIEW_THRESHOLD: f32 = 0.6;
    /// Minimum candidate confidence for the no-pass-value fallback.
    pub const FALLBACK_CANDIDATE_THRESHOLD: f32 = 0.5;
    /// Terminal value when nothing confident was extracted.
    pub const NO_CONFIDENT_EXTRACTION: &str = "no confident extraction";
    /// Flag substrings that force manual review regardless of confidence.
    pub const REVIEW_FLAG_TERMS: &[&str] = &["discordance", "conflict", "unlikely", "warning"];
}

/// Engine control constants.
pub mod engine {
    /// Pass 2 runs when Pass 1 is empty or below this confidence.
    pub const PASS2_TRIGGER_THRESHOLD: f32 = 0.70;
}
