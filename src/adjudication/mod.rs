//! Multi-pass evidence adjudication.
//!
//! One `ExtractionResult` per (patient, variable, event) triple. Pass 1
//! (document extraction, external) seeds it; Pass 2 queries the structured
//! snapshot when Pass 1 is weak; Pass 3 reconciles every candidate seen so
//! far; Pass 4 adjusts confidence for temporal/clinical plausibility; the
//! finalizer computes the terminal value, confidence, and review flag.
//! Pure and synchronous — no I/O inside Passes 2–4.

pub mod cross_validation;
pub mod engine;
pub mod finalize;
pub mod structured_query;
pub mod temporal;
pub mod types;
pub mod weights;

pub use engine::{adjudicate, parse_event_date, AdjudicationRequest};
pub use types::*;

use thiserror::Error;

/// Caller-contract violations. Data-quality conditions (no evidence, weak
/// evidence, disagreement) are never errors — they degrade into the
/// confidence/flag/review model instead.
#[derive(Error, Debug)]
pub enum AdjudicationError {
    #[error("Malformed event date '{0}' (expected YYYY-MM-DD)")]
    MalformedDate(String),

    #[error("Document pass must be pass 1 (document_extraction), got pass {0}")]
    InvalidDocumentPass(u8),

    #[error("Confidence {0} outside [0, 1]")]
    ConfidenceOutOfRange(f32),

    #[error("finalize() called twice on extraction for '{0}'")]
    AlreadyFinalized(String),
}
