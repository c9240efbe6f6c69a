//! Failure analysis: classify every recorded failure by root cause and
//! explain, for each one, whether remediation happened and why not when
//! it did not. The report never leaves a failure unexplained.

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;

use crate::qc::rules::looks_transient;
use crate::qc::types::{QcContext, RecordedFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RootCause {
    Timeout,
    ConnectionFailure,
    Throttling,
    AuthenticationFailure,
    MissingData,
    SchemaMismatch,
    ParseError,
    Unknown,
}

impl RootCause {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::ConnectionFailure | Self::Throttling)
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ConnectionFailure => "connection_failure",
            Self::Throttling => "throttling",
            Self::AuthenticationFailure => "authentication_failure",
            Self::MissingData => "missing_data",
            Self::SchemaMismatch => "schema_mismatch",
            Self::ParseError => "parse_error",
            Self::Unknown => "unknown",
        }
    }
}

/// Order matters: "connection timed out" is a timeout, not a generic
/// connection failure, so timeout patterns are checked first.
pub fn classify_root_cause(error: &str) -> RootCause {
    let lower = error.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") || lower.contains("deadline") {
        RootCause::Timeout
    } else if lower.contains("connection") || lower.contains("unreachable") || lower.contains("503")
    {
        RootCause::ConnectionFailure
    } else if lower.contains("throttl") || lower.contains("rate limit") || lower.contains("429") {
        RootCause::Throttling
    } else if lower.contains("unauthorized")
        || lower.contains("forbidden")
        || lower.contains("credential")
        || lower.contains("401")
        || lower.contains("403")
    {
        RootCause::AuthenticationFailure
    } else if lower.contains("not found") || lower.contains("no records") || lower.contains("empty")
    {
        RootCause::MissingData
    } else if lower.contains("schema") || lower.contains("unknown field") || lower.contains("column")
    {
        RootCause::SchemaMismatch
    } else if lower.contains("parse") || lower.contains("invalid json") || lower.contains("decode")
    {
        RootCause::ParseError
    } else {
        RootCause::Unknown
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedFailure {
    pub failure: RecordedFailure,
    pub root_cause: RootCause,
    pub is_transient: bool,
    pub remediation_attempted: bool,
    pub remediation_succeeded: bool,
    /// Populated whenever `remediation_attempted` is false. Never empty.
    pub why_not_remediated: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureAnalysisReport {
    pub phase: String,
    pub total_failures: usize,
    pub unremediated_failures: usize,
    pub by_root_cause: BTreeMap<String, usize>,
    pub failures: Vec<AnalyzedFailure>,
    pub generated_at: NaiveDateTime,
}

impl FailureAnalysisReport {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn why_not_remediated(root_cause: RootCause) -> String {
    match root_cause {
        RootCause::Timeout | RootCause::ConnectionFailure | RootCause::Throttling => {
            "Transient failure was never retried; the retry policy did not cover this operation"
                .to_string()
        }
        RootCause::AuthenticationFailure => {
            "Credentials cannot be repaired automatically; rotation requires an operator"
                .to_string()
        }
        RootCause::MissingData => {
            "No retry can supply source data that does not exist; needs upstream record review"
                .to_string()
        }
        RootCause::SchemaMismatch => {
            "Schema drift needs a code or mapping change, not a retry".to_string()
        }
        RootCause::ParseError => {
            "The payload is malformed at the source; re-requesting returns the same bytes"
                .to_string()
        }
        RootCause::Unknown => {
            "Error text matched no known pattern; automatic remediation was not safe to attempt"
                .to_string()
        }
    }
}

fn analyze(failure: &RecordedFailure) -> AnalyzedFailure {
    let root_cause = classify_root_cause(&failure.error);
    let remediation_attempted = failure.retry_attempted;
    AnalyzedFailure {
        failure: failure.clone(),
        root_cause,
        is_transient: root_cause.is_transient() || looks_transient(&failure.error),
        remediation_attempted,
        remediation_succeeded: failure.retry_succeeded,
        why_not_remediated: (!remediation_attempted).then(|| why_not_remediated(root_cause)),
    }
}

/// Analyze every failure recorded across all stages of the run.
pub fn analyze_all_failures(ctx: &QcContext) -> FailureAnalysisReport {
    let failures: Vec<AnalyzedFailure> = ctx.all_failures().map(analyze).collect();

    let mut by_root_cause: BTreeMap<String, usize> = BTreeMap::new();
    for f in &failures {
        *by_root_cause.entry(f.root_cause.as_str().to_string()).or_insert(0) += 1;
    }
    let unremediated = failures
        .iter()
        .filter(|f| !f.remediation_attempted || !f.remediation_succeeded)
        .count();

    tracing::debug!(
        phase = %ctx.phase,
        total = failures.len(),
        unremediated,
        "Failure analysis complete"
    );

    FailureAnalysisReport {
        phase: ctx.phase.clone(),
        total_failures: failures.len(),
        unremediated_failures: unremediated,
        by_root_cause,
        failures,
        generated_at: Utc::now().naive_utc(),
    }
}
