//! Graph-shape checks that do not need the reachability pass.
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

use crate::constants::{CAT_CIRCULAR, CAT_PUZZLE_CLUES};
use crate::graph::{DependencyGraph, TriggerCondition};

use super::report::Finding;

/// A key stored, at any depth, inside a container whose pad lock needs that
/// same key. Reports at most one finding per key.
#[must_use]
pub fn circular_keys(graph: &DependencyGraph) -> Vec<Finding> {
    let mut findings = Vec::new();
    for key in graph.keys.values() {
        let mut container = key.location.as_deref();
        // parent chains are acyclic, but a malformed document may repeat ids
        let mut seen = BTreeSet::new();
        while let Some(container_id) = container {
            if !seen.insert(container_id) {
                break;
            }
            let Some(item) = graph.items.get(container_id) else {
                break;
            };
            let guard = item
                .lock_trigger_id
                .as_deref()
                .filter(|_| item.is_locked)
                .and_then(|id| graph.triggers.get(id));
            if let Some(trigger) = guard
                && trigger.required_key() == Some(key.id.as_str())
            {
                findings.push(
                    Finding::error(
                        CAT_CIRCULAR,
                        format!(
                            "Circular dependency: Key \"{}\" is locked in container \"{}\" that requires the same key (trigger \"{}\")",
                            key.id, item.id, trigger.id
                        ),
                    )
                    .with_details(json!({
                        "keyId": key.id,
                        "containerId": item.id,
                        "triggerId": trigger.id,
                    })),
                );
                break;
            }
            container = item.parent.as_deref();
        }
    }
    findings
}

/// Cycles in `connectedTriggers`: one finding per strongly connected group of
/// two or more triggers, and one per trigger connected to itself. Linear in
/// triggers plus connections.
#[must_use]
pub fn trigger_cycles(graph: &DependencyGraph) -> Vec<Finding> {
    let mut search = ComponentSearch::new(graph);
    for id in graph.triggers.keys() {
        if !search.index.contains_key(id.as_str()) {
            search.visit(id);
        }
    }

    let mut groups: Vec<Vec<&str>> = search
        .components
        .into_iter()
        .filter(|group| match group.as_slice() {
            [single] => graph
                .triggers
                .get(*single)
                .is_some_and(|t| t.connected_triggers.iter().any(|next| next == *single)),
            _ => true,
        })
        .collect();
    for group in &mut groups {
        group.sort_unstable();
    }
    groups.sort();

    groups
        .into_iter()
        .map(|group| {
            let message = match group.as_slice() {
                [single] => format!("Connected triggers form a cycle: {single} -> {single}"),
                _ => format!(
                    "Connected triggers form a cycle among: {}",
                    group.join(", ")
                ),
            };
            Finding::error(CAT_CIRCULAR, message).with_details(json!({ "triggerIds": group }))
        })
        .collect()
}

/// Tarjan's strongly connected components over `connectedTriggers`.
struct ComponentSearch<'g> {
    graph: &'g DependencyGraph,
    next_index: usize,
    index: BTreeMap<&'g str, usize>,
    low: BTreeMap<&'g str, usize>,
    stack: Vec<&'g str>,
    on_stack: BTreeSet<&'g str>,
    components: Vec<Vec<&'g str>>,
}

impl<'g> ComponentSearch<'g> {
    fn new(graph: &'g DependencyGraph) -> Self {
        Self {
            graph,
            next_index: 0,
            index: BTreeMap::new(),
            low: BTreeMap::new(),
            stack: Vec::new(),
            on_stack: BTreeSet::new(),
            components: Vec::new(),
        }
    }

    fn visit(&mut self, id: &'g str) {
        let graph = self.graph;
        let Some(trigger) = graph.triggers.get(id) else {
            return;
        };
        self.index.insert(id, self.next_index);
        self.low.insert(id, self.next_index);
        self.next_index += 1;
        self.stack.push(id);
        self.on_stack.insert(id);

        for next in &trigger.connected_triggers {
            let next = next.as_str();
            if !graph.triggers.contains_key(next) {
                continue;
            }
            let reached = match self.index.get(next).copied() {
                None => {
                    self.visit(next);
                    self.low.get(next).copied()
                }
                Some(index) if self.on_stack.contains(next) => Some(index),
                Some(_) => None,
            };
            if let Some(reached) = reached
                && let Some(low) = self.low.get_mut(id)
            {
                *low = (*low).min(reached);
            }
        }

        if self.low.get(id) == self.index.get(id) {
            let mut component = Vec::new();
            while let Some(member) = self.stack.pop() {
                self.on_stack.remove(member);
                component.push(member);
                if member == id {
                    break;
                }
            }
            self.components.push(component);
        }
    }
}

/// Keypad locks must have something that tells the player the code.
#[must_use]
pub fn puzzle_clues(graph: &DependencyGraph) -> Vec<Finding> {
    graph
        .triggers
        .values()
        .filter_map(|trigger| match &trigger.condition {
            TriggerCondition::Keypad { code } if !code.is_empty() => {
                let clues = graph.keys_for(&trigger.id).count();
                Some(if clues == 0 {
                    Finding::warning(
                        CAT_PUZZLE_CLUES,
                        format!(
                            "Keypad lock \"{}\" has code \"{code}\" but no clues/keys found",
                            trigger.id
                        ),
                    )
                } else {
                    Finding::info(
                        CAT_PUZZLE_CLUES,
                        format!("Keypad lock \"{}\" has {clues} clue(s)", trigger.id),
                    )
                })
            }
            _ => None,
        })
        .collect()
}
