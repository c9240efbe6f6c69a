//! Quality-control agent: an independent battery of cross-phase checks
//! plus failure analysis. The agent only ever reads the context the
//! orchestrator hands it; remediation callbacks are supplied by the
//! caller and attached to the issues they cover.

pub mod failure_analysis;
pub mod rules;
pub mod types;

use std::collections::BTreeMap;

use thiserror::Error;

pub use failure_analysis::{
    analyze_all_failures, classify_root_cause, AnalyzedFailure, FailureAnalysisReport, RootCause,
};
pub use types::{
    CachedEntry, FailureStage, QcCategory, QcContext, QcIssue, QcResult, QcSeverity,
    RecordedFailure, Remediation, WhoClassification,
};

use rules::{builtin_rules, Rule};

#[derive(Error, Debug)]
pub enum QcError {
    #[error("QC rule '{rule}' failed: {message}")]
    Rule { rule: String, message: String },
    #[error("Remediation for {category} failed: {message}")]
    Remediation { category: String, message: String },
}

/// Runs the rule battery over a phase snapshot. Stateless between calls
/// apart from the caller-registered remediation callbacks.
#[derive(Default)]
pub struct QualityControlAgent {
    remediators: BTreeMap<QcCategory, Remediation>,
}

impl QualityControlAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an auto-remediation for one issue category. The callback
    /// is attached to every matching issue and executed for CRITICAL ones.
    pub fn register_remediation(&mut self, category: QcCategory, remediation: Remediation) {
        self.remediators.insert(category, remediation);
    }

    pub fn validate(&self, ctx: &QcContext) -> QcResult {
        self.run_battery(&builtin_rules(), ctx)
    }

    fn run_battery(&self, rules: &[Rule], ctx: &QcContext) -> QcResult {
        let mut issues = Vec::new();
        for rule in rules {
            match (rule.check)(ctx) {
                Ok(found) => issues.extend(found),
                // One broken rule must not silence the rest of the battery.
                Err(err) => {
                    tracing::warn!(rule = rule.name, %err, "QC rule failed to execute");
                    issues.push(
                        QcIssue::new(
                            QcSeverity::Low,
                            QcCategory::RuleExecutionFailure,
                            &ctx.phase,
                            format!("Rule '{}' failed to execute", rule.name),
                            "The check did not run, so its findings are unknown for this phase",
                            "Inspect the rule error and re-run validation",
                        )
                        .with_evidence("rule", rule.name)
                        .with_evidence("error", err.to_string()),
                    );
                }
            }
        }

        let mut applied = 0;
        for issue in &mut issues {
            let Some(remediation) = self.remediators.get(&issue.category) else {
                continue;
            };
            issue.remediation = Some(remediation.clone());
            if issue.severity != QcSeverity::Critical {
                continue;
            }
            match (remediation.as_ref())(ctx) {
                Ok(description) => {
                    applied += 1;
                    issue.evidence.insert("remediation_applied".to_string(), description);
                }
                Err(err) => {
                    tracing::warn!(category = ?issue.category, %err, "Remediation failed");
                    issue
                        .evidence
                        .insert("remediation_failed".to_string(), err.to_string());
                }
            }
        }

        let result = QcResult::new(&ctx.phase, issues, applied);
        tracing::info!(
            phase = %ctx.phase,
            issues = result.issues.len(),
            valid = result.is_valid,
            remediations = result.remediations_applied,
            "QC validation complete"
        );
        result
    }
}
