//! The QC rule battery. Each rule is independent: it reads the context,
//! returns zero or more issues, and never depends on another rule having
//! run. A rule that errors is reported as its own LOW issue by the agent
//! and must not stop the rest of the battery.

use crate::models::earliest_diagnosis;
use crate::qc::types::{QcCategory, QcContext, QcIssue, QcSeverity};
use crate::qc::QcError;

pub type RuleFn = fn(&QcContext) -> Result<Vec<QcIssue>, QcError>;

pub struct Rule {
    pub name: &'static str,
    pub check: RuleFn,
}

pub fn builtin_rules() -> Vec<Rule> {
    vec![
        Rule { name: "classification_data_mismatch", check: classification_data_mismatch },
        Rule { name: "stale_cached_failure", check: stale_cached_failure },
        Rule { name: "unretried_transient_failure", check: unretried_transient_failure },
        Rule { name: "temporal_order", check: temporal_order },
        Rule { name: "protocol_age", check: protocol_age },
        Rule { name: "data_quality_outlier", check: data_quality_outlier },
    ]
}

fn failure_text(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("failed") || lower.contains("error") || lower.contains("no findings")
}

pub(crate) fn looks_transient(error: &str) -> bool {
    let lower = error.to_lowercase();
    ["timeout", "timed out", "connection", "throttl", "rate limit", "429", "503"]
        .iter()
        .any(|t| lower.contains(t))
}

/// Classification says "failed"/"no findings" while structured sources
/// hold records. The classifier either never saw the data or returned a
/// stale answer; either way the diagnosis cannot stand.
fn classification_data_mismatch(ctx: &QcContext) -> Result<Vec<QcIssue>, QcError> {
    let Some(classification) = &ctx.who_classification else {
        return Ok(vec![]);
    };
    if !failure_text(&classification.diagnosis) || ctx.total_records() == 0 {
        return Ok(vec![]);
    }
    Ok(vec![QcIssue::new(
        QcSeverity::Critical,
        QcCategory::ClassificationDataMismatch,
        &ctx.phase,
        format!(
            "Classification reads '{}' but {} structured records exist",
            classification.diagnosis,
            ctx.total_records()
        ),
        "A failure-shaped diagnosis next to populated record sources means the \
         classifier ran against the wrong or empty input",
        "Re-run WHO classification against the current structured snapshot",
    )
    .with_evidence("diagnosis", &classification.diagnosis)
    .with_evidence("total_records", ctx.total_records().to_string())])
}

/// A failure string must never survive in a cache. Catches both a cached
/// classification and any other cached artifact whose text records an
/// error, so the failure cannot masquerade as a result on the next run.
fn stale_cached_failure(ctx: &QcContext) -> Result<Vec<QcIssue>, QcError> {
    let mut issues = Vec::new();
    if let Some(classification) = &ctx.who_classification {
        if classification.cached_at.is_some() && failure_text(&classification.diagnosis) {
            issues.push(
                QcIssue::new(
                    QcSeverity::Critical,
                    QcCategory::StaleCachedFailure,
                    &ctx.phase,
                    format!("Cached classification records a failure: '{}'", classification.diagnosis),
                    "Caching a failure makes it permanent; every later run inherits it \
                     instead of retrying",
                    "Evict the cached classification and re-run it",
                )
                .with_evidence("diagnosis", &classification.diagnosis),
            );
        }
    }
    for entry in &ctx.cached_entries {
        if failure_text(&entry.text) {
            issues.push(
                QcIssue::new(
                    QcSeverity::Critical,
                    QcCategory::StaleCachedFailure,
                    &ctx.phase,
                    format!("Cached entry '{}' records a failure", entry.key),
                    "Caching a failure makes it permanent; every later run inherits it \
                     instead of retrying",
                    "Evict the cache entry and recompute it",
                )
                .with_evidence("key", &entry.key)
                .with_evidence("text", &entry.text),
            );
        }
    }
    Ok(issues)
}

/// Transient-looking failures (timeouts, dropped connections, throttling)
/// that were never retried. These usually succeed on a second attempt.
fn unretried_transient_failure(ctx: &QcContext) -> Result<Vec<QcIssue>, QcError> {
    let issues = ctx
        .all_failures()
        .filter(|f| looks_transient(&f.error) && !f.retry_attempted)
        .map(|f| {
            QcIssue::new(
                QcSeverity::High,
                QcCategory::UnretriedTransientFailure,
                &ctx.phase,
                format!("'{}' failed transiently and was not retried: {}", f.operation, f.error),
                "The error text matches a transient pattern, so the data it would \
                 have produced is likely recoverable",
                "Retry the operation before accepting this run",
            )
            .with_evidence("operation", &f.operation)
            .with_evidence("error", &f.error)
            .with_evidence("stage", format!("{:?}", f.stage))
        })
        .collect();
    Ok(issues)
}

/// Treatment events dated before the earliest diagnosis. Legitimate care
/// sequences never treat first, so a violation points at date extraction
/// or record-linkage problems upstream.
fn temporal_order(ctx: &QcContext) -> Result<Vec<QcIssue>, QcError> {
    let Some(diagnosis) = earliest_diagnosis(&ctx.timeline) else {
        return Ok(vec![]);
    };
    let issues = ctx
        .timeline
        .iter()
        .filter(|ev| ev.event_type.is_treatment() && ev.event_date < diagnosis.event_date)
        .map(|ev| {
            QcIssue::new(
                QcSeverity::High,
                QcCategory::TemporalOrderViolation,
                &ctx.phase,
                format!(
                    "{:?} on {} precedes the earliest diagnosis ({})",
                    ev.event_type, ev.event_date, diagnosis.event_date
                ),
                "Treatment cannot precede diagnosis; one of the two dates is wrong \
                 or the records belong to different episodes",
                "Verify the event dates against the source records",
            )
            .with_evidence("event_date", ev.event_date.to_string())
            .with_evidence("diagnosis_date", diagnosis.event_date.to_string())
        })
        .collect();
    Ok(issues)
}

/// Adult protocol recommended for a patient under 18.
fn protocol_age(ctx: &QcContext) -> Result<Vec<QcIssue>, QcError> {
    let (Some(protocol), Some(age)) = (&ctx.therapy_protocol, ctx.patient_age_years) else {
        return Ok(vec![]);
    };
    if !protocol.to_lowercase().contains("adult") || age >= 18.0 {
        return Ok(vec![]);
    }
    Ok(vec![QcIssue::new(
        QcSeverity::Medium,
        QcCategory::ProtocolAgeMismatch,
        &ctx.phase,
        format!("Adult protocol '{protocol}' recommended for a {age:.1}-year-old"),
        "Pediatric brain-tumor patients are treated on pediatric protocols; an \
         adult recommendation suggests the cohort filter leaked",
        "Confirm the protocol recommendation with the treating team",
    )
    .with_evidence("protocol", protocol)
    .with_evidence("age_years", format!("{age:.1}"))])
}

/// A confident, non-failure classification with zero records anywhere is
/// an outlier: the diagnosis had to come from somewhere.
fn data_quality_outlier(ctx: &QcContext) -> Result<Vec<QcIssue>, QcError> {
    let Some(classification) = &ctx.who_classification else {
        return Ok(vec![]);
    };
    if failure_text(&classification.diagnosis) || ctx.total_records() > 0 || !ctx.timeline.is_empty()
    {
        return Ok(vec![]);
    }
    Ok(vec![QcIssue::new(
        QcSeverity::Medium,
        QcCategory::DataQualityOutlier,
        &ctx.phase,
        format!(
            "Classification '{}' exists but no structured records or timeline events do",
            classification.diagnosis
        ),
        "A diagnosis with no supporting records anywhere cannot be audited",
        "Locate the source records behind the classification",
    )
    .with_evidence("diagnosis", &classification.diagnosis)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TimelineEvent, TimelineEventType};
    use crate::qc::types::WhoClassification;
    use chrono::{NaiveDate, Utc};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn classified(diagnosis: &str, cached: bool) -> WhoClassification {
        WhoClassification {
            diagnosis: diagnosis.into(),
            confidence: Some(0.8),
            cached_at: cached.then(|| Utc::now().naive_utc()),
        }
    }

    // ── Rule (a): classification vs record counts ───────────────────

    #[test]
    fn failed_classification_with_records_is_critical() {
        let mut ctx = QcContext::default();
        ctx.who_classification = Some(classified("Classification failed", false));
        ctx.record_counts.insert("imaging".into(), 3);
        let issues = classification_data_mismatch(&ctx).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, QcSeverity::Critical);
        assert_eq!(issues[0].category, QcCategory::ClassificationDataMismatch);
    }

    #[test]
    fn failed_classification_without_records_passes_rule_a() {
        let mut ctx = QcContext::default();
        ctx.who_classification = Some(classified("no findings", false));
        assert!(classification_data_mismatch(&ctx).unwrap().is_empty());
    }

    // ── Rule (b): never cache a failure ─────────────────────────────

    #[test]
    fn cached_failure_classification_is_critical() {
        let mut ctx = QcContext::default();
        ctx.who_classification = Some(classified("extraction failed: upstream error", true));
        let issues = stale_cached_failure(&ctx).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].category, QcCategory::StaleCachedFailure);
        assert_eq!(issues[0].severity, QcSeverity::Critical);
    }

    #[test]
    fn uncached_failure_classification_is_not_a_cache_issue() {
        let mut ctx = QcContext::default();
        ctx.who_classification = Some(classified("failed", false));
        assert!(stale_cached_failure(&ctx).unwrap().is_empty());
    }

    #[test]
    fn cached_entry_with_error_text_is_flagged() {
        let mut ctx = QcContext::default();
        ctx.cached_entries.push(crate::qc::types::CachedEntry {
            key: "resection_query".into(),
            text: "error: connection reset".into(),
        });
        let issues = stale_cached_failure(&ctx).unwrap();
        assert_eq!(issues.len(), 1);
    }

    // ── Rule (c): transient failures want a retry ───────────────────

    #[test]
    fn transient_error_without_retry_is_high() {
        let mut ctx = QcContext::default();
        ctx.query_failures.push(crate::qc::types::RecordedFailure {
            stage: crate::qc::types::FailureStage::Query,
            operation: "imaging_lookup".into(),
            error: "request timed out after 30s".into(),
            retry_attempted: false,
            retry_succeeded: false,
            occurred_at: Utc::now().naive_utc(),
        });
        let issues = unretried_transient_failure(&ctx).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, QcSeverity::High);
    }

    #[test]
    fn retried_or_permanent_failures_pass_rule_c() {
        let mut ctx = QcContext::default();
        ctx.query_failures.push(crate::qc::types::RecordedFailure {
            stage: crate::qc::types::FailureStage::Query,
            operation: "a".into(),
            error: "HTTP 429 too many requests".into(),
            retry_attempted: true,
            retry_succeeded: true,
            occurred_at: Utc::now().naive_utc(),
        });
        ctx.extraction_failures.push(crate::qc::types::RecordedFailure {
            stage: crate::qc::types::FailureStage::Extraction,
            operation: "b".into(),
            error: "invalid credentials".into(),
            retry_attempted: false,
            retry_succeeded: false,
            occurred_at: Utc::now().naive_utc(),
        });
        assert!(unretried_transient_failure(&ctx).unwrap().is_empty());
    }

    #[test]
    fn transient_patterns_are_recognized() {
        for e in ["timeout", "Connection refused", "throttled", "rate limit hit", "429", "503"] {
            assert!(looks_transient(e), "{e}");
        }
        assert!(!looks_transient("schema mismatch"));
    }

    // ── Rule (d): treatment before diagnosis ────────────────────────

    #[test]
    fn surgery_before_diagnosis_is_flagged() {
        let mut ctx = QcContext::default();
        ctx.timeline = vec![
            TimelineEvent {
                event_type: TimelineEventType::Surgery,
                event_date: d("2021-01-10"),
                description: "craniotomy".into(),
            },
            TimelineEvent {
                event_type: TimelineEventType::Diagnosis,
                event_date: d("2021-02-01"),
                description: "pilocytic astrocytoma".into(),
            },
        ];
        let issues = temporal_order(&ctx).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].category, QcCategory::TemporalOrderViolation);
    }

    #[test]
    fn ordered_timeline_passes_rule_d() {
        let mut ctx = QcContext::default();
        ctx.timeline = vec![
            TimelineEvent {
                event_type: TimelineEventType::Diagnosis,
                event_date: d("2021-01-01"),
                description: String::new(),
            },
            TimelineEvent {
                event_type: TimelineEventType::Radiation,
                event_date: d("2021-03-01"),
                description: String::new(),
            },
        ];
        assert!(temporal_order(&ctx).unwrap().is_empty());
    }

    // ── Rule (e): protocol vs age ───────────────────────────────────

    #[test]
    fn adult_protocol_for_child_is_medium() {
        let mut ctx = QcContext::default();
        ctx.therapy_protocol = Some("Adult high-grade glioma protocol".into());
        ctx.patient_age_years = Some(7.0);
        let issues = protocol_age(&ctx).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, QcSeverity::Medium);
    }

    #[test]
    fn pediatric_protocol_passes_rule_e() {
        let mut ctx = QcContext::default();
        ctx.therapy_protocol = Some("ACNS0331".into());
        ctx.patient_age_years = Some(7.0);
        assert!(protocol_age(&ctx).unwrap().is_empty());
    }

    // ── Rule (f): unsupported classification ────────────────────────

    #[test]
    fn classification_with_no_records_anywhere_is_an_outlier() {
        let mut ctx = QcContext::default();
        ctx.who_classification = Some(classified("Medulloblastoma, WHO grade IV", false));
        let issues = data_quality_outlier(&ctx).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].category, QcCategory::DataQualityOutlier);
    }
}
