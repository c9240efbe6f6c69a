//! Neurocurate: multi-pass evidence adjudication for pediatric
//! brain-tumor clinical variables.
//!
//! The engine reconciles document-extracted values against structured
//! EHR data through four sequenced passes (document extraction,
//! structured query, cross-validation, temporal plausibility), then
//! finalizes one auditable value per (patient, variable, event) unit.
//! A separate quality-control agent checks cross-phase state and
//! analyzes recorded failures.

pub mod adjudication;
pub mod config;
pub mod models;
pub mod qc;

pub use adjudication::engine::{adjudicate, parse_event_date, AdjudicationRequest};
pub use adjudication::types::{Candidate, ExtractionResult, PassMethod, PassResult};
pub use adjudication::AdjudicationError;
pub use qc::{analyze_all_failures, QcContext, QcResult, QualityControlAgent};
