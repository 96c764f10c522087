//! Findings and the validation report handed to tooling.
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::graph::DependencyGraph;

use super::reachability::Reachability;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

/// One validator observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    #[serde(rename = "type")]
    pub severity: Severity,
    pub category: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl Finding {
    #[must_use]
    pub fn error(category: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, category, message)
    }

    #[must_use]
    pub fn warning(category: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, category, message)
    }

    #[must_use]
    pub fn info(category: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, category, message)
    }

    fn new(severity: Severity, category: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity,
            category,
            message: message.into(),
            details: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Findings bucketed by severity, in the order they were raised.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Findings {
    pub errors: Vec<Finding>,
    pub warnings: Vec<Finding>,
    pub info: Vec<Finding>,
}

impl Findings {
    pub fn push(&mut self, finding: Finding) {
        match finding.severity {
            Severity::Error => self.errors.push(finding),
            Severity::Warning => self.warnings.push(finding),
            Severity::Info => self.info.push(finding),
        }
    }
}

impl Extend<Finding> for Findings {
    fn extend<I: IntoIterator<Item = Finding>>(&mut self, iter: I) {
        for finding in iter {
            self.push(finding);
        }
    }
}

/// Outcome of validating one experience document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub experience_id: String,
    pub experience_name: String,
    /// True iff `errors` is empty.
    pub is_valid: bool,
    pub errors: Vec<Finding>,
    pub warnings: Vec<Finding>,
    pub info: Vec<Finding>,
    pub reachable_items: BTreeSet<String>,
    pub unreachable_items: BTreeSet<String>,
    pub reachable_triggers: BTreeSet<String>,
    pub unreachable_triggers: BTreeSet<String>,
    pub accessible_rooms: BTreeSet<String>,
    pub available_keys: BTreeSet<String>,
    pub passes: usize,
    pub converged: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub access_paths: BTreeMap<String, Vec<String>>,
    pub generated_at: DateTime<Utc>,
}

impl ValidationReport {
    pub(crate) fn assemble(
        graph: &DependencyGraph,
        findings: Findings,
        analysis: Reachability,
        include_access_paths: bool,
    ) -> Self {
        let unreachable_items = graph
            .items
            .keys()
            .filter(|id| !analysis.reachable_items.contains(*id))
            .cloned()
            .collect();
        let unreachable_triggers = graph
            .triggers
            .keys()
            .filter(|id| !analysis.reachable_triggers.contains(*id))
            .cloned()
            .collect();
        Self {
            experience_id: graph.experience_id.clone(),
            experience_name: graph.experience_name.clone(),
            is_valid: findings.errors.is_empty(),
            errors: findings.errors,
            warnings: findings.warnings,
            info: findings.info,
            reachable_items: analysis.reachable_items,
            unreachable_items,
            reachable_triggers: analysis.reachable_triggers,
            unreachable_triggers,
            accessible_rooms: analysis.accessible_rooms,
            available_keys: analysis.available_keys,
            passes: analysis.passes,
            converged: analysis.converged,
            access_paths: if include_access_paths {
                analysis.access_paths
            } else {
                BTreeMap::new()
            },
            generated_at: Utc::now(),
        }
    }

    /// Every finding, errors first.
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.errors.iter().chain(&self.warnings).chain(&self.info)
    }

    pub fn errors_in<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a Finding> {
        self.errors
            .iter()
            .filter(move |finding| finding.category == category)
    }

    pub fn warnings_in<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a Finding> {
        self.warnings
            .iter()
            .filter(move |finding| finding.category == category)
    }

    /// One-line status for logs and console headers.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}: {} ({} error(s), {} warning(s), {}/{} items reachable)",
            self.experience_id,
            if self.is_valid { "valid" } else { "invalid" },
            self.errors.len(),
            self.warnings.len(),
            self.reachable_items.len(),
            self.reachable_items.len() + self.unreachable_items.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn findings_bucket_by_severity() {
        let mut findings = Findings::default();
        findings.extend([
            Finding::info("structure", "one room"),
            Finding::error("references", "dangling"),
            Finding::warning("reachability", "dead weight"),
            Finding::error("completion", "missing"),
        ]);
        assert_eq!(findings.errors.len(), 2);
        assert_eq!(findings.errors[0].message, "dangling");
        assert_eq!(findings.warnings.len(), 1);
        assert_eq!(findings.info.len(), 1);
    }

    #[test]
    fn finding_serializes_with_type_tag() {
        let finding =
            Finding::error("circular_dependency", "loop").with_details(json!({ "keyId": "k" }));
        let value = serde_json::to_value(&finding).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["category"], "circular_dependency");
        assert_eq!(value["details"]["keyId"], "k");

        let plain = serde_json::to_value(Finding::info("structure", "ok")).unwrap();
        assert!(plain.get("details").is_none());
    }
}
