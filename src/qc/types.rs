//! Quality-control data model: issues, context snapshot, results.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::TimelineEvent;
use crate::qc::QcError;

/// Issue severity. `Critical`/`High` make a phase invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QcSeverity {
    Critical,
    High,
    Medium,
    Low,
}

/// Typed issue categories raised by the rule battery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QcCategory {
    /// Failed/no-findings classification alongside nonzero record counts.
    ClassificationDataMismatch,
    /// A cached result whose text records a failure.
    StaleCachedFailure,
    /// Transient-looking failure that was never retried.
    UnretriedTransientFailure,
    /// Treatment events dated before the earliest diagnosis.
    TemporalOrderViolation,
    /// Adult protocol recommended for a pediatric patient.
    ProtocolAgeMismatch,
    /// Classification claims findings but no records exist anywhere.
    DataQualityOutlier,
    /// A QC rule itself failed to execute.
    RuleExecutionFailure,
}

/// Auto-remediation callback attached to an issue. Runs against the same
/// read-only context; returns a description of what it did.
pub type Remediation = Arc<dyn Fn(&QcContext) -> Result<String, QcError> + Send + Sync>;

/// One finding raised by the QC agent.
#[derive(Clone, Serialize)]
pub struct QcIssue {
    pub id: Uuid,
    pub severity: QcSeverity,
    pub category: QcCategory,
    pub phase: String,
    pub message: String,
    pub reasoning: String,
    pub evidence: BTreeMap<String, String>,
    pub recommended_action: String,
    #[serde(skip)]
    pub remediation: Option<Remediation>,
}

impl QcIssue {
    pub fn new(
        severity: QcSeverity,
        category: QcCategory,
        phase: impl Into<String>,
        message: impl Into<String>,
        reasoning: impl Into<String>,
        recommended_action: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            severity,
            category,
            phase: phase.into(),
            message: message.into(),
            reasoning: reasoning.into(),
            evidence: BTreeMap::new(),
            recommended_action: recommended_action.into(),
            remediation: None,
        }
    }

    pub fn with_evidence(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.evidence.insert(key.into(), value.into());
        self
    }
}

// The callback is opaque; Debug shows everything else.
impl fmt::Debug for QcIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QcIssue")
            .field("id", &self.id)
            .field("severity", &self.severity)
            .field("category", &self.category)
            .field("phase", &self.phase)
            .field("message", &self.message)
            .field("evidence", &self.evidence)
            .field("has_remediation", &self.remediation.is_some())
            .finish()
    }
}

/// Pipeline stage where a failure was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Query,
    Classification,
    Extraction,
}

/// One failure recorded by the orchestrator during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedFailure {
    pub stage: FailureStage,
    pub operation: String,
    pub error: String,
    pub retry_attempted: bool,
    pub retry_succeeded: bool,
    pub occurred_at: NaiveDateTime,
}

/// WHO-classification output captured for auditing. A populated
/// `cached_at` means the value came from (or went into) the run cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhoClassification {
    pub diagnosis: String,
    pub confidence: Option<f32>,
    #[serde(rename = "timestamp")]
    pub cached_at: Option<NaiveDateTime>,
}

/// One cached pipeline artifact, keyed by cache entry name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedEntry {
    pub key: String,
    pub text: String,
}

/// Read-only snapshot of cross-phase state assembled by the orchestrator.
/// Owned by the caller; the QC agent never mutates it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QcContext {
    pub phase: String,
    pub who_classification: Option<WhoClassification>,
    /// Per-source structured record counts (imaging, procedures, ...).
    pub record_counts: BTreeMap<String, u64>,
    pub timeline: Vec<TimelineEvent>,
    pub cached_entries: Vec<CachedEntry>,
    pub query_failures: Vec<RecordedFailure>,
    pub classification_failures: Vec<RecordedFailure>,
    pub extraction_failures: Vec<RecordedFailure>,
    pub patient_age_years: Option<f32>,
    pub therapy_protocol: Option<String>,
}

impl QcContext {
    pub fn total_records(&self) -> u64 {
        self.record_counts.values().sum()
    }

    pub fn all_failures(&self) -> impl Iterator<Item = &RecordedFailure> {
        self.query_failures
            .iter()
            .chain(self.classification_failures.iter())
            .chain(self.extraction_failures.iter())
    }
}

/// Outcome of one `validate()` run.
#[derive(Debug, Clone, Serialize)]
pub struct QcResult {
    pub phase: String,
    pub issues: Vec<QcIssue>,
    /// True iff no CRITICAL/HIGH issue was raised.
    pub is_valid: bool,
    pub remediations_applied: u32,
    pub checked_at: NaiveDateTime,
}

impl QcResult {
    pub fn new(phase: impl Into<String>, issues: Vec<QcIssue>, remediations_applied: u32) -> Self {
        let is_valid = !issues
            .iter()
            .any(|i| matches!(i.severity, QcSeverity::Critical | QcSeverity::High));
        Self {
            phase: phase.into(),
            issues,
            is_valid,
            remediations_applied,
            checked_at: Utc::now().naive_utc(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(severity: QcSeverity) -> QcIssue {
        QcIssue::new(
            severity,
            QcCategory::DataQualityOutlier,
            "phase_2",
            "message",
            "reasoning",
            "action",
        )
    }

    #[test]
    fn result_invalid_on_critical_or_high() {
        assert!(!QcResult::new("p", vec![issue(QcSeverity::Critical)], 0).is_valid);
        assert!(!QcResult::new("p", vec![issue(QcSeverity::High)], 0).is_valid);
        assert!(QcResult::new("p", vec![issue(QcSeverity::Medium)], 0).is_valid);
        assert!(QcResult::new("p", vec![issue(QcSeverity::Low)], 0).is_valid);
        assert!(QcResult::new("p", vec![], 0).is_valid);
    }

    #[test]
    fn issue_serializes_without_callback() {
        let mut i = issue(QcSeverity::Critical);
        let noop: Remediation = Arc::new(|_ctx: &QcContext| Ok("noop".to_string()));
        i.remediation = Some(noop);
        let json = serde_json::to_value(&i).unwrap();
        assert!(json.get("remediation").is_none());
        assert_eq!(json["severity"], "CRITICAL");
        assert_eq!(json["category"], "data_quality_outlier");
    }

    #[test]
    fn context_sums_record_counts() {
        let mut ctx = QcContext::default();
        ctx.record_counts.insert("imaging".into(), 4);
        ctx.record_counts.insert("procedures".into(), 2);
        assert_eq!(ctx.total_records(), 6);
    }

    #[test]
    fn classification_timestamp_field_round_trips() {
        let c = WhoClassification {
            diagnosis: "Medulloblastoma".into(),
            confidence: Some(0.9),
            cached_at: None,
        };
        let json = serde_json::to_value(&c).unwrap();
        assert!(json.get("timestamp").is_some());
    }
}
