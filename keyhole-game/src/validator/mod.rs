//! Offline solvability validation.
//!
//! Validation always works on its own [`DependencyGraph`] built from a
//! document, so it never aliases a live session.
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::constants::{CAT_CONVERGENCE, CAT_REACHABILITY};
use crate::document::ExperienceDoc;
use crate::graph::DependencyGraph;
use crate::model::Experience;

pub mod dependencies;
pub mod reachability;
pub mod report;
pub mod structure;

pub use reachability::Reachability;
pub use report::{Finding, Findings, Severity, ValidationReport};

/// Validator tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidatorConfig {
    /// Explicit pass ceiling. `None` derives one from the graph.
    pub max_passes: Option<usize>,
    /// Keep per-item access paths in the report.
    pub include_access_paths: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_passes: None,
            include_access_paths: true,
        }
    }
}

/// Run every check against a document.
#[must_use]
pub fn validate_document(doc: &ExperienceDoc, config: &ValidatorConfig) -> ValidationReport {
    let graph = DependencyGraph::build(doc);
    let mut findings = Findings::default();
    findings.extend(structure::check_structure(doc));

    let analysis = Reachability::analyze(&graph, config);
    findings.extend(reachability_findings(&graph, &analysis, config));
    findings.extend(dependencies::circular_keys(&graph));
    findings.extend(dependencies::trigger_cycles(&graph));
    findings.extend(dependencies::puzzle_clues(&graph));

    let report = ValidationReport::assemble(&graph, findings, analysis, config.include_access_paths);
    log::debug!("{}", report.summary());
    report
}

/// Validate the current state of a live experience. The session is copied,
/// never touched.
#[must_use]
pub fn validate_experience(exp: &Experience, config: &ValidatorConfig) -> ValidationReport {
    validate_document(&exp.to_document(), config)
}

fn reachability_findings(
    graph: &DependencyGraph,
    analysis: &Reachability,
    config: &ValidatorConfig,
) -> Vec<Finding> {
    let mut findings = Vec::new();

    if !analysis.converged {
        findings.push(
            Finding::error(
                CAT_CONVERGENCE,
                format!(
                    "Reachability did not converge within {} pass(es)",
                    analysis.passes
                ),
            )
            .with_details(json!({
                "ceiling": Reachability::ceiling(graph, config),
                "factBound": graph.fact_bound(),
            })),
        );
    }

    if let Some(final_room) = &graph.final_room_id
        && graph.rooms.contains_key(final_room)
        && !analysis.accessible_rooms.contains(final_room)
    {
        findings.push(
            Finding::error(
                CAT_REACHABILITY,
                format!(
                    "Final room \"{final_room}\" is not reachable from starting room \"{}\"",
                    graph.starting_room_id
                ),
            )
            .with_details(json!({
                "finalRoomId": final_room,
                "startingRoomId": graph.starting_room_id,
                "accessibleRooms": analysis.accessible_rooms,
            })),
        );
    }

    let mut reported = std::collections::BTreeSet::new();
    for trigger in &graph.completion_triggers {
        if graph.triggers.contains_key(trigger)
            && !analysis.reachable_triggers.contains(trigger)
            && reported.insert(trigger)
        {
            findings.push(
                Finding::error(
                    CAT_REACHABILITY,
                    format!("Completion requires trigger \"{trigger}\" but it is not reachable"),
                )
                .with_details(json!({ "triggerId": trigger })),
            );
        }
    }

    for item in graph.items.keys() {
        if !analysis.reachable_items.contains(item) {
            findings.push(Finding::warning(
                CAT_REACHABILITY,
                format!("Item \"{item}\" is unreachable (may be locked or in inaccessible container)"),
            ));
        }
    }

    findings.push(Finding::info(
        CAT_REACHABILITY,
        format!(
            "Reachability {} after {} pass(es): {} of {} items, {} of {} rooms",
            if analysis.converged {
                "converged"
            } else {
                "stopped"
            },
            analysis.passes,
            analysis.reachable_items.len(),
            graph.items.len(),
            analysis.accessible_rooms.len(),
            graph.rooms.len()
        ),
    ));
    findings
}
