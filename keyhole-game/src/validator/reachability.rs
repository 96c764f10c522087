//! Forward-chaining reachability over a dependency graph.
//!
//! Every set only grows, so the analysis stops at the first pass that adds
//! nothing. Rewards of triggers reached during a pass are applied at the end
//! of that pass, in trigger id order, through the same [`RewardSink`]
//! dispatch the live engine uses.
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::engine::{RewardSink, apply_rewards};
use crate::graph::{DependencyGraph, ItemNode, TriggerCondition, TriggerNode};

use super::ValidatorConfig;

/// Result of one reachability analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reachability {
    pub reachable_items: BTreeSet<String>,
    pub reachable_triggers: BTreeSet<String>,
    pub accessible_rooms: BTreeSet<String>,
    pub available_keys: BTreeSet<String>,
    /// Triggers whose code or answer the player can know.
    pub known_clues: BTreeSet<String>,
    /// First chain of ids and steps through which each item was reached.
    pub access_paths: BTreeMap<String, Vec<String>>,
    pub passes: usize,
    pub converged: bool,
}

impl Reachability {
    /// Analyze from the graph's own start state.
    #[must_use]
    pub fn analyze(graph: &DependencyGraph, config: &ValidatorConfig) -> Self {
        Simulation::seeded(graph, None).run(Self::ceiling(graph, config))
    }

    /// Analyze treating `previous` as already reached. Running this on a
    /// converged result yields the same facts.
    #[must_use]
    pub fn analyze_from(graph: &DependencyGraph, previous: &Self, config: &ValidatorConfig) -> Self {
        Simulation::seeded(graph, Some(previous)).run(Self::ceiling(graph, config))
    }

    /// Pass ceiling: the configured one, else the graph's fact bound.
    #[must_use]
    pub fn ceiling(graph: &DependencyGraph, config: &ValidatorConfig) -> usize {
        config.max_passes.unwrap_or_else(|| graph.fact_bound())
    }

    /// Same reached sets, ignoring pass count and paths.
    #[must_use]
    pub fn same_facts(&self, other: &Self) -> bool {
        self.reachable_items == other.reachable_items
            && self.reachable_triggers == other.reachable_triggers
            && self.accessible_rooms == other.accessible_rooms
            && self.available_keys == other.available_keys
            && self.known_clues == other.known_clues
    }

    fn fact_count(&self) -> usize {
        self.reachable_items.len()
            + self.reachable_triggers.len()
            + self.accessible_rooms.len()
            + self.available_keys.len()
            + self.known_clues.len()
    }
}

/// Simulated player knowledge. Never touches a live experience.
struct Simulation<'g> {
    graph: &'g DependencyGraph,
    facts: Reachability,
    /// Doors and connections opened by access rewards.
    unlocked: BTreeSet<String>,
    /// Items made visible by item rewards.
    revealed: BTreeSet<String>,
    /// Triggers reached whose rewards are not applied yet.
    pending: BTreeSet<String>,
    queue: VecDeque<String>,
}

impl<'g> Simulation<'g> {
    fn seeded(graph: &'g DependencyGraph, previous: Option<&Reachability>) -> Self {
        let mut sim = Self {
            graph,
            facts: Reachability::default(),
            unlocked: BTreeSet::new(),
            revealed: BTreeSet::new(),
            pending: BTreeSet::new(),
            queue: VecDeque::new(),
        };

        let start = if graph.starting_room_id.is_empty() {
            graph.rooms.keys().next().cloned()
        } else {
            Some(graph.starting_room_id.clone())
        };
        if let Some(start) = start {
            sim.enter_room(&start);
        }
        for room in graph.rooms.values().filter(|room| room.is_visited) {
            sim.enter_room(&room.id);
        }
        for key in graph.keys.values().filter(|key| key.is_acquired) {
            sim.make_key_available(&key.id);
        }
        for trigger in graph.triggers.values().filter(|t| t.is_activated) {
            sim.reach_trigger(&trigger.id);
        }

        if let Some(previous) = previous {
            for room in &previous.accessible_rooms {
                sim.enter_room(room);
            }
            for key in &previous.available_keys {
                sim.make_key_available(key);
            }
            for clue in &previous.known_clues {
                sim.know_clue(clue);
            }
            for trigger in &previous.reachable_triggers {
                sim.reach_trigger(trigger);
            }
            for item in &previous.reachable_items {
                if graph.items.contains_key(item) {
                    sim.facts.reachable_items.insert(item.clone());
                }
            }
            sim.facts
                .access_paths
                .extend(previous.access_paths.clone());
        }

        sim.flush_rewards();
        let rooms: Vec<String> = sim.facts.accessible_rooms.iter().cloned().collect();
        sim.populate_rooms(&rooms);
        sim
    }

    fn run(mut self, ceiling: usize) -> Reachability {
        while self.facts.passes < ceiling {
            self.facts.passes += 1;
            let before = self.facts.fact_count();
            self.pass();
            log::debug!(
                "reachability pass {} for '{}': {} items, {} keys, {} rooms, {} triggers",
                self.facts.passes,
                self.graph.experience_id,
                self.facts.reachable_items.len(),
                self.facts.available_keys.len(),
                self.facts.accessible_rooms.len(),
                self.facts.reachable_triggers.len()
            );
            if self.facts.fact_count() == before {
                self.facts.converged = true;
                break;
            }
        }
        if !self.facts.converged {
            log::warn!(
                "reachability for '{}' hit the {ceiling} pass ceiling without converging",
                self.graph.experience_id
            );
        }
        self.facts
    }

    fn pass(&mut self) {
        self.queue = self.facts.reachable_items.iter().cloned().collect();
        loop {
            while let Some(id) = self.queue.pop_front() {
                self.visit(&id);
            }
            // locks opened by keys found while draining
            self.rescan_locked();
            if self.queue.is_empty() {
                break;
            }
        }
        let mut entered = self.open_doors();
        entered.extend(self.follow_connections());
        self.populate_rooms(&entered);
        self.solve_triggers();
        self.flush_rewards();
    }

    /// Keys, examination hooks and open children of one reached item.
    fn visit(&mut self, id: &str) {
        let graph = self.graph;
        let Some(item) = graph.items.get(id) else {
            return;
        };

        if item.is_portable {
            if let Some(key) = &item.key_id {
                self.make_key_available(key);
            }
            if graph.keys.contains_key(id) {
                self.make_key_available(id);
            }
        }

        if let Some(trigger) = item
            .examine_trigger
            .as_ref()
            .and_then(|t| graph.triggers.get(t))
            && examined_by(trigger, id)
        {
            self.reach_trigger(&trigger.id);
            self.know_clue(&trigger.id);
        }

        for child_id in item.children() {
            if self.facts.reachable_items.contains(child_id) {
                continue;
            }
            let Some(child) = graph.items.get(child_id) else {
                continue;
            };
            if !self.is_shown(child) {
                continue;
            }
            if self.is_open(child) {
                let path = self.path_to(child, None);
                self.reach_item(child_id, path);
            } else if let Some((trigger, step)) = self.opener(child) {
                self.reach_trigger(trigger);
                let path = self.path_to(child, Some(step));
                self.reach_item(child_id, path);
            }
        }
    }

    /// Items in accessible places whose lock became solvable after they were
    /// first seen.
    fn rescan_locked(&mut self) {
        let graph = self.graph;
        for item in graph.items.values() {
            if self.facts.reachable_items.contains(&item.id)
                || !self.is_located(item)
                || !self.is_shown(item)
            {
                continue;
            }
            if self.is_open(item) {
                let path = self.path_to(item, None);
                self.reach_item(&item.id, path);
            } else if let Some((trigger, step)) = self.opener(item) {
                self.reach_trigger(trigger);
                let path = self.path_to(item, Some(step));
                self.reach_item(&item.id, path);
            }
        }
    }

    /// Rooms behind doors that are open or can be opened now.
    fn open_doors(&mut self) -> Vec<String> {
        let graph = self.graph;
        let mut entered = Vec::new();
        for door in graph.items.values() {
            let Some(target) = door.door_target() else {
                continue;
            };
            if self.facts.accessible_rooms.contains(target)
                || !self.facts.accessible_rooms.contains(&door.room_id)
            {
                continue;
            }
            let passable = if self.is_open(door) {
                true
            } else if let Some((trigger, _)) = self.opener(door) {
                self.reach_trigger(trigger);
                true
            } else {
                false
            };
            if passable && self.enter_room(target) {
                log::trace!("door '{}' opens room '{target}'", door.id);
                entered.push(target.to_string());
            }
        }
        entered
    }

    /// Rooms reached through room-level connection records.
    fn follow_connections(&mut self) -> Vec<String> {
        let graph = self.graph;
        let from: Vec<String> = self.facts.accessible_rooms.iter().cloned().collect();
        let mut entered = Vec::new();
        for room in from.iter().filter_map(|id| graph.rooms.get(id)) {
            for conn in &room.connections {
                if self.facts.accessible_rooms.contains(&conn.target) {
                    continue;
                }
                let passable = !conn.is_locked
                    || self.unlocked.contains(&conn.id)
                    || match &conn.required_trigger {
                        Some(trigger) => self.facts.reachable_triggers.contains(trigger),
                        None => !graph
                            .triggers
                            .values()
                            .any(|t| t.unlocks.as_deref() == Some(conn.id.as_str())),
                    };
                if passable && self.enter_room(&conn.target) {
                    entered.push(conn.target.clone());
                }
            }
        }
        entered
    }

    /// Open, shown top-level items of newly accessible rooms.
    fn populate_rooms(&mut self, rooms: &[String]) {
        let graph = self.graph;
        for room in rooms.iter().filter_map(|id| graph.rooms.get(id)) {
            for item in room.items.iter().filter_map(|id| graph.items.get(id)) {
                if self.is_shown(item) && self.is_open(item) {
                    self.reach_item(&item.id, vec![room.id.clone(), item.id.clone()]);
                }
            }
        }
    }

    /// Keypads with a discoverable clue and pad locks whose key is in hand.
    fn solve_triggers(&mut self) {
        let graph = self.graph;
        for trigger in graph.triggers.values() {
            if self.facts.reachable_triggers.contains(&trigger.id) {
                continue;
            }
            let solvable = match &trigger.condition {
                TriggerCondition::Keypad { .. } => self.keypad_solvable(trigger),
                TriggerCondition::PadLock { required_key } => {
                    self.key_fits(trigger, required_key)
                }
                TriggerCondition::Examination { .. } => false,
            };
            if solvable {
                self.reach_trigger(&trigger.id);
                self.know_clue(&trigger.id);
            }
        }
    }

    fn flush_rewards(&mut self) {
        let graph = self.graph;
        while let Some(id) = self.pending.pop_first() {
            if let Some(trigger) = graph.triggers.get(&id) {
                apply_rewards(self, &id, &trigger.rewards);
            }
        }
    }

    /// Only portable carriers count: a clue the player cannot pick up is
    /// not a clue they hold.
    fn keypad_solvable(&self, trigger: &TriggerNode) -> bool {
        let reached = &self.facts.reachable_items;
        self.facts.known_clues.contains(&trigger.id)
            || self.graph.keys_for(&trigger.id).any(|key| {
                self.facts.available_keys.contains(&key.id)
                    || reached.contains(&key.id)
                    || self.graph.items.values().any(|item| {
                        item.is_portable
                            && item.key_id.as_deref() == Some(key.id.as_str())
                            && reached.contains(&item.id)
                    })
            })
    }

    /// The key is in hand and the key itself accepts this trigger.
    fn key_fits(&self, trigger: &TriggerNode, key_id: &str) -> bool {
        self.facts.available_keys.contains(key_id)
            && self
                .graph
                .keys
                .get(key_id)
                .is_some_and(|key| key.can_activate(&trigger.id))
    }

    /// Trigger that can open a locked item right now, with a path step.
    fn opener(&self, item: &ItemNode) -> Option<(&'g str, String)> {
        let graph = self.graph;
        let trigger = graph.triggers.get(item.lock_trigger_id.as_deref()?)?;
        match &trigger.condition {
            TriggerCondition::PadLock { required_key } if self.key_fits(trigger, required_key) => {
                Some((trigger.id.as_str(), format!("[unlock with {required_key}]")))
            }
            TriggerCondition::Keypad { .. } if self.keypad_solvable(trigger) => {
                Some((trigger.id.as_str(), format!("[enter code on {}]", trigger.id)))
            }
            _ => None,
        }
    }

    fn is_shown(&self, item: &ItemNode) -> bool {
        item.is_shown() || self.revealed.contains(&item.id)
    }

    fn is_open(&self, item: &ItemNode) -> bool {
        !item.is_locked
            || self.unlocked.contains(&item.id)
            || item
                .lock_trigger_id
                .as_ref()
                .is_some_and(|t| self.facts.reachable_triggers.contains(t))
    }

    /// The item's room is accessible, or its parent has been reached.
    fn is_located(&self, item: &ItemNode) -> bool {
        match &item.parent {
            Some(parent) => self.facts.reachable_items.contains(parent),
            None => self.facts.accessible_rooms.contains(&item.room_id),
        }
    }

    fn path_to(&self, item: &ItemNode, step: Option<String>) -> Vec<String> {
        let mut path = match &item.parent {
            Some(parent) => self
                .facts
                .access_paths
                .get(parent)
                .cloned()
                .unwrap_or_else(|| vec![parent.clone()]),
            None => vec![item.room_id.clone()],
        };
        path.extend(step);
        path.push(item.id.clone());
        path
    }

    fn reach_item(&mut self, id: &str, path: Vec<String>) -> bool {
        if !self.graph.items.contains_key(id) || !self.facts.reachable_items.insert(id.to_string())
        {
            return false;
        }
        self.facts.access_paths.entry(id.to_string()).or_insert(path);
        self.queue.push_back(id.to_string());
        true
    }

    fn reach_trigger(&mut self, id: &str) -> bool {
        if !self.graph.triggers.contains_key(id)
            || !self.facts.reachable_triggers.insert(id.to_string())
        {
            return false;
        }
        self.pending.insert(id.to_string());
        true
    }

    fn know_clue(&mut self, trigger_id: &str) {
        if self.graph.triggers.contains_key(trigger_id) {
            self.facts.known_clues.insert(trigger_id.to_string());
        }
    }

    fn make_key_available(&mut self, key_id: &str) -> bool {
        let graph = self.graph;
        let Some(key) = graph.keys.get(key_id) else {
            return false;
        };
        if !self.facts.available_keys.insert(key_id.to_string()) {
            return false;
        }
        if let Some(trigger) = &key.target_trigger {
            self.know_clue(trigger);
        }
        true
    }

    fn enter_room(&mut self, room_id: &str) -> bool {
        self.graph.rooms.contains_key(room_id)
            && self.facts.accessible_rooms.insert(room_id.to_string())
    }
}

/// Whether examining `item_id` satisfies the trigger's condition.
fn examined_by(trigger: &TriggerNode, item_id: &str) -> bool {
    match &trigger.condition {
        TriggerCondition::Examination { object_id } => object_id == item_id,
        TriggerCondition::Keypad { .. } | TriggerCondition::PadLock { .. } => false,
    }
}

impl RewardSink for Simulation<'_> {
    fn unlock_door(&mut self, door_id: &str) {
        self.unlocked.insert(door_id.to_string());
    }

    fn reveal_room(&mut self, room_id: &str) {
        log::trace!("simulated reveal of room '{room_id}'");
    }

    fn show_trigger(&mut self, trigger_id: &str) {
        log::trace!("simulated reveal of trigger '{trigger_id}'");
    }

    fn grant_key(&mut self, key_id: &str, _source: &str) {
        self.make_key_available(key_id);
    }

    fn reveal_item(&mut self, item_id: &str) {
        self.revealed.insert(item_id.to_string());
    }

    /// Hiding never takes reachability away.
    fn hide_item(&mut self, _item_id: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ExperienceDoc;

    fn graph(json: &str) -> DependencyGraph {
        DependencyGraph::build(&ExperienceDoc::from_json(json).unwrap())
    }

    fn analyze(json: &str) -> Reachability {
        Reachability::analyze(&graph(json), &ValidatorConfig::default())
    }

    const CHAIN: &str = r#"{
        "id": "chain", "name": "Chain", "startingRoomId": "cellar",
        "rooms": [
            {"id": "cellar", "name": "Cellar", "items": [
                {"id": "crate", "name": "Crate", "category": "CONTAINER", "containedItems": [
                    {"id": "iron_key_item", "name": "Iron Key", "isPortable": true, "keyId": "iron_key"}]},
                {"id": "cabinet", "name": "Cabinet", "isLocked": true, "lockTriggerId": "cabinet_lock",
                 "containedItems": [{"id": "note", "name": "Note", "isPortable": true, "keyId": "note_clue"}]},
                {"id": "hatch", "name": "Hatch", "category": "DOOR", "isLocked": true,
                 "lockTriggerId": "hatch_keypad", "leadsTo": "loft"},
                {"id": "hidden_cache", "name": "Cache", "isVisible": false}
            ]},
            {"id": "loft", "name": "Loft", "items": [{"id": "chest", "name": "Chest"}]}
        ],
        "triggers": [
            {"id": "cabinet_lock", "type": "PadLock", "requiredKey": "iron_key"},
            {"id": "hatch_keypad", "type": "KeypadLock", "code": "31",
             "rewards": [{"type": "AccessReward", "unlocksDoor": "hatch"}]}
        ],
        "keys": [
            {"id": "iron_key", "name": "Iron Key", "type": "PHYSICAL_KEY",
             "associatedTriggerId": "cabinet_lock"},
            {"id": "note_clue", "name": "Note", "type": "CLUE", "relatedPuzzle": "hatch_keypad"}
        ]
    }"#;

    #[test]
    fn chained_locks_resolve_to_a_fixed_point() {
        let result = analyze(CHAIN);
        assert!(result.converged);
        for item in ["crate", "iron_key_item", "cabinet", "note", "hatch", "chest"] {
            assert!(result.reachable_items.contains(item), "{item} unreachable");
        }
        assert!(!result.reachable_items.contains("hidden_cache"));
        assert_eq!(
            result.reachable_triggers,
            BTreeSet::from(["cabinet_lock".to_string(), "hatch_keypad".to_string()])
        );
        assert!(result.accessible_rooms.contains("loft"));
        assert_eq!(
            result.access_paths["note"],
            vec!["cellar", "[unlock with iron_key]", "cabinet", "note"]
        );
    }

    #[test]
    fn converged_result_is_stable_under_reseeding() {
        let g = graph(CHAIN);
        let config = ValidatorConfig::default();
        let first = Reachability::analyze(&g, &config);
        let second = Reachability::analyze_from(&g, &first, &config);
        assert!(second.converged);
        assert_eq!(second.passes, 1);
        assert!(second.same_facts(&first));
    }

    #[test]
    fn pass_ceiling_reports_non_convergence() {
        let config = ValidatorConfig {
            max_passes: Some(1),
            ..ValidatorConfig::default()
        };
        let result = Reachability::analyze(&graph(CHAIN), &config);
        assert_eq!(result.passes, 1);
        assert!(!result.converged);
        // the whole chain resolves in one pass, but nothing confirmed it
        assert!(result.available_keys.contains("note_clue"));
        assert!(result.accessible_rooms.contains("loft"));
    }

    #[test]
    fn examination_rewards_reveal_and_grant() {
        let result = analyze(
            r#"{"id": "x", "name": "X", "startingRoomId": "a",
                "rooms": [{"id": "a", "name": "A", "items": [
                    {"id": "mirror", "name": "Mirror", "examineTrigger": "mirror_exam"},
                    {"id": "safe", "name": "Safe", "isVisible": false, "isLocked": true,
                     "lockTriggerId": "safe_lock"}]}],
                "triggers": [
                    {"id": "mirror_exam", "type": "ExaminationTrigger", "objectId": "mirror",
                     "rewards": [{"type": "ItemReward", "itemId": "safe"},
                                 {"type": "KeyReward", "keyId": "combo"}]},
                    {"id": "safe_lock", "type": "KeypadLock", "code": "90"}],
                "keys": [{"id": "combo", "name": "Combo", "type": "CLUE", "relatedPuzzle": "safe_lock"}]}"#,
        );
        assert!(result.available_keys.contains("combo"));
        assert!(result.known_clues.contains("safe_lock"));
        assert!(result.reachable_triggers.contains("safe_lock"));
        assert!(result.reachable_items.contains("safe"));
    }

    #[test]
    fn gated_connection_waits_for_its_trigger() {
        let json = r#"{"id": "x", "name": "X", "startingRoomId": "a",
            "rooms": [
                {"id": "a", "name": "A",
                 "items": [{"id": "lever", "name": "Lever", "examineTrigger": "pull"}],
                 "connectedRooms": [
                    {"id": "arch", "connectedRoomId": "b"},
                    {"id": "gate", "connectedRoomId": "c", "isLocked": true, "requiredTrigger": "pull"},
                    {"id": "vault", "connectedRoomId": "d", "isLocked": true, "requiredTrigger": "never"}]},
                {"id": "b", "name": "B"}, {"id": "c", "name": "C"}, {"id": "d", "name": "D"}],
            "triggers": [
                {"id": "pull", "type": "ExaminationTrigger", "objectId": "lever"},
                {"id": "never", "type": "KeypadLock", "code": "0"}]}"#;
        let result = analyze(json);
        assert_eq!(
            result.accessible_rooms,
            BTreeSet::from(["a".to_string(), "b".to_string(), "c".to_string()])
        );
        assert!(!result.reachable_triggers.contains("never"));
    }

    #[test]
    fn mismatched_examination_object_does_not_fire() {
        let result = analyze(
            r#"{"id": "x", "name": "X", "startingRoomId": "a",
                "rooms": [{"id": "a", "name": "A", "items": [
                    {"id": "vase", "name": "Vase", "examineTrigger": "bust_exam"},
                    {"id": "bust", "name": "Bust"}]}],
                "triggers": [{"id": "bust_exam", "type": "ExaminationTrigger", "objectId": "bust"}]}"#,
        );
        assert!(result.reachable_items.contains("vase"));
        assert!(!result.reachable_triggers.contains("bust_exam"));
    }

    #[test]
    fn only_portable_carriers_give_away_a_code() {
        let json = r#"{"id": "x", "name": "X", "startingRoomId": "a",
            "rooms": [{"id": "a", "name": "A", "items": [
                {"id": "inscription", "name": "Inscription", "keyId": "wall_code"},
                {"id": "strongbox", "name": "Strongbox", "isLocked": true, "lockTriggerId": "box_keypad"}]}],
            "triggers": [{"id": "box_keypad", "type": "KeypadLock", "code": "77"}],
            "keys": [{"id": "wall_code", "name": "Code", "type": "NUMERIC_CODE", "code": "77",
                      "associatedTriggerId": "box_keypad"}]}"#;
        let fixed = analyze(json);
        assert!(fixed.reachable_items.contains("inscription"));
        assert!(!fixed.available_keys.contains("wall_code"));
        assert!(!fixed.reachable_triggers.contains("box_keypad"));

        let portable = analyze(&json.replace(
            r#""name": "Inscription","#,
            r#""name": "Inscription", "isPortable": true,"#,
        ));
        assert!(portable.reachable_triggers.contains("box_keypad"));
        assert!(portable.reachable_items.contains("strongbox"));
    }

    #[test]
    fn pad_lock_needs_a_key_that_answers_to_it() {
        let json = r#"{"id": "x", "name": "X", "startingRoomId": "a",
            "rooms": [{"id": "a", "name": "A", "items": [
                {"id": "hook", "name": "Hook", "surfaceItems": [
                    {"id": "tag", "name": "Tag", "isPortable": true, "keyId": "shed_key"}]},
                {"id": "shed", "name": "Shed", "isLocked": true, "lockTriggerId": "shed_lock"}]}],
            "triggers": [{"id": "shed_lock", "type": "PadLock", "requiredKey": "shed_key"}],
            "keys": [{"id": "shed_key", "name": "Shed Key", "type": "PHYSICAL_KEY",
                      "associatedTriggerId": "none"}]}"#;
        let refused = analyze(json);
        assert!(refused.available_keys.contains("shed_key"));
        assert!(!refused.reachable_triggers.contains("shed_lock"));
        assert!(!refused.reachable_items.contains("shed"));

        let accepted = analyze(&json.replace(
            r#""associatedTriggerId": "none""#,
            r#""associatedTriggerId": "shed_lock""#,
        ));
        assert!(accepted.reachable_triggers.contains("shed_lock"));
        assert!(accepted.reachable_items.contains("shed"));
    }
}
