//! Read-only structured-data snapshot.
//!
//! The warehouse query layer (external) loads per-patient rows into a
//! `StructuredSnapshot` once; Passes 2 and 4 only filter it by date offset
//! from the surgical event. No I/O happens here — every scan is a bounded
//! in-memory filter.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::ImagingModality;

/// One imaging study with its narrative findings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagingRecord {
    pub date: NaiveDate,
    pub modality: ImagingModality,
    pub findings: String,
}

/// One procedure row (CPT-coded, with free-text description).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcedureRecord {
    pub date: NaiveDate,
    pub code: Option<String>,
    pub description: String,
}

/// One coded diagnosis row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisRecord {
    pub date: NaiveDate,
    pub icd10: Option<String>,
    pub description: String,
}

/// One problem-list entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemListRecord {
    pub noted_date: NaiveDate,
    pub description: String,
}

/// One medication order (drug class distinguishes chemotherapy agents).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationRecord {
    pub start_date: NaiveDate,
    pub name: String,
    pub drug_class: Option<String>,
}

/// Whether `date` falls in `[event + from_days, event + to_days]`.
///
/// Named and exported so the pass-2 window boundaries (0–3d, 4–7d, ...) are
/// testable independently of the strategies that use them.
pub fn within_window(date: NaiveDate, event: NaiveDate, from_days: i64, to_days: i64) -> bool {
    let offset = (date - event).num_days();
    offset >= from_days && offset <= to_days
}

/// Immutable per-patient view of the structured tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuredSnapshot {
    pub imaging: Vec<ImagingRecord>,
    pub procedures: Vec<ProcedureRecord>,
    pub diagnoses: Vec<DiagnosisRecord>,
    pub problem_list: Vec<ProblemListRecord>,
    pub medications: Vec<MedicationRecord>,
}

impl StructuredSnapshot {
    pub fn imaging_in_window(
        &self,
        event: NaiveDate,
        from_days: i64,
        to_days: i64,
    ) -> impl Iterator<Item = &ImagingRecord> {
        self.imaging
            .iter()
            .filter(move |r| within_window(r.date, event, from_days, to_days))
    }

    pub fn procedures_in_window(
        &self,
        event: NaiveDate,
        from_days: i64,
        to_days: i64,
    ) -> impl Iterator<Item = &ProcedureRecord> {
        self.procedures
            .iter()
            .filter(move |r| within_window(r.date, event, from_days, to_days))
    }

    pub fn diagnoses_in_window(
        &self,
        event: NaiveDate,
        from_days: i64,
        to_days: i64,
    ) -> impl Iterator<Item = &DiagnosisRecord> {
        self.diagnoses
            .iter()
            .filter(move |r| within_window(r.date, event, from_days, to_days))
    }

    /// All diagnoses regardless of date — grade and histology coding is not
    /// tied to the surgical event the way imaging is.
    pub fn all_diagnoses(&self) -> impl Iterator<Item = &DiagnosisRecord> {
        self.diagnoses.iter()
    }

    pub fn total_records(&self) -> usize {
        self.imaging.len()
            + self.procedures.len()
            + self.diagnoses.len()
            + self.problem_list.len()
            + self.medications.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn window_is_inclusive_on_both_ends() {
        let event = d("2021-03-01");
        assert!(within_window(d("2021-03-01"), event, 0, 3));
        assert!(within_window(d("2021-03-04"), event, 0, 3));
        assert!(!within_window(d("2021-03-05"), event, 0, 3));
        assert!(!within_window(d("2021-02-28"), event, 0, 3));
    }

    #[test]
    fn negative_offsets_select_preoperative_records() {
        let event = d("2021-03-10");
        assert!(within_window(d("2021-03-01"), event, -30, 0));
        assert!(!within_window(d("2021-03-11"), event, -30, 0));
    }

    #[test]
    fn imaging_window_filter_returns_matching_rows_only() {
        let snapshot = StructuredSnapshot {
            imaging: vec![
                ImagingRecord {
                    date: d("2021-03-02"),
                    modality: ImagingModality::Mri,
                    findings: "post-op".into(),
                },
                ImagingRecord {
                    date: d("2021-03-20"),
                    modality: ImagingModality::Mri,
                    findings: "surveillance".into(),
                },
            ],
            ..Default::default()
        };
        let hits: Vec<_> = snapshot.imaging_in_window(d("2021-03-01"), 0, 3).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].findings, "post-op");
    }

    #[test]
    fn empty_snapshot_has_zero_records() {
        assert_eq!(StructuredSnapshot::default().total_records(), 0);
    }
}
