//! Document-level checks: required fields, id integrity, dangling references
//! and lock configuration. Runs on the raw document, so it also catches what
//! the loader would refuse.
use serde_json::json;
use std::collections::{BTreeSet, HashSet};

use crate::constants::{CAT_COMPLETION, CAT_CONFIGURATION, CAT_REFERENCES, CAT_STRUCTURE};
use crate::document::{ExperienceDoc, ItemDoc};
use crate::model::{KeyKind, Reward, TriggerKind, TRIGGER_ACTIVATED};

use super::report::Finding;

/// Ids declared by a document, with duplicates reported separately.
struct Declared<'a> {
    rooms: HashSet<&'a str>,
    items: HashSet<&'a str>,
    triggers: HashSet<&'a str>,
    keys: HashSet<&'a str>,
    /// Connection ids, which access rewards may name in place of a door item.
    connections: HashSet<&'a str>,
}

impl<'a> Declared<'a> {
    fn collect(doc: &'a ExperienceDoc, findings: &mut Vec<Finding>) -> Self {
        let mut declared = Self {
            rooms: HashSet::new(),
            items: HashSet::new(),
            triggers: HashSet::new(),
            keys: HashSet::new(),
            connections: HashSet::new(),
        };
        let mut duplicate = |kind: &str, id: &str| {
            findings.push(
                Finding::error(CAT_STRUCTURE, format!("Duplicate {kind} id \"{id}\""))
                    .with_details(json!({ "kind": kind, "id": id })),
            );
        };
        for room in &doc.rooms {
            if !declared.rooms.insert(room.id.as_str()) {
                duplicate("room", &room.id);
            }
            for conn in &room.connected_rooms {
                if !conn.id.is_empty() {
                    declared.connections.insert(conn.id.as_str());
                }
            }
        }
        for (_, item, _) in doc.all_items() {
            if !declared.items.insert(item.id.as_str()) {
                duplicate("item", &item.id);
            }
        }
        for trigger in &doc.triggers {
            if !declared.triggers.insert(trigger.id.as_str()) {
                duplicate("trigger", &trigger.id);
            }
        }
        for key in &doc.keys {
            if !declared.keys.insert(key.id.as_str()) {
                duplicate("key", &key.id);
            }
        }
        declared
    }
}

/// Structural, reference, configuration and completion-criteria findings.
#[must_use]
pub fn check_structure(doc: &ExperienceDoc) -> Vec<Finding> {
    let mut findings = Vec::new();
    required_fields(doc, &mut findings);
    let declared = Declared::collect(doc, &mut findings);
    room_references(doc, &declared, &mut findings);
    item_references(doc, &declared, &mut findings);
    key_references(doc, &declared, &mut findings);
    trigger_references(doc, &declared, &mut findings);
    completion_criteria(doc, &declared, &mut findings);
    findings
}

fn required_fields(doc: &ExperienceDoc, findings: &mut Vec<Finding>) {
    if doc.id.is_empty() {
        findings.push(Finding::error(
            CAT_STRUCTURE,
            "Experience missing required field: id",
        ));
    }
    if doc.name.is_empty() {
        findings.push(Finding::error(
            CAT_STRUCTURE,
            "Experience missing required field: name",
        ));
    }
    if doc.rooms.is_empty() {
        findings.push(Finding::error(CAT_STRUCTURE, "Experience has no rooms defined"));
    }
    if doc.starting_room_id.is_empty() {
        findings.push(Finding::error(CAT_STRUCTURE, "Experience missing startingRoomId"));
    } else if !doc.rooms.iter().any(|room| room.id == doc.starting_room_id) {
        findings.push(Finding::error(
            CAT_STRUCTURE,
            format!("Starting room \"{}\" does not exist", doc.starting_room_id),
        ));
    }
    if let Some(final_room) = doc.final_room()
        && !doc.rooms.iter().any(|room| room.id == final_room)
    {
        findings.push(Finding::error(
            CAT_STRUCTURE,
            format!("Final room \"{final_room}\" does not exist"),
        ));
    }
    for room in &doc.rooms {
        if room.id.is_empty() {
            findings.push(Finding::error(CAT_STRUCTURE, "Room missing required field: id"));
        }
    }
    for (room_id, item, _) in doc.all_items() {
        if item.id.is_empty() {
            findings.push(Finding::error(
                CAT_STRUCTURE,
                format!("Item in room \"{room_id}\" missing required field: id"),
            ));
        }
    }
    findings.push(Finding::info(
        CAT_STRUCTURE,
        format!("Experience has {} room(s)", doc.rooms.len()),
    ));
}

fn room_references(doc: &ExperienceDoc, declared: &Declared<'_>, findings: &mut Vec<Finding>) {
    for room in &doc.rooms {
        for conn in &room.connected_rooms {
            let label = if conn.id.is_empty() {
                &conn.connected_room_id
            } else {
                &conn.id
            };
            if !declared.rooms.contains(conn.connected_room_id.as_str()) {
                findings.push(Finding::error(
                    CAT_REFERENCES,
                    format!(
                        "Room \"{}\" connection \"{label}\" targets non-existent room: {}",
                        room.id, conn.connected_room_id
                    ),
                ));
            }
            if let Some(trigger) = conn.required_trigger.as_deref().filter(|t| !t.is_empty())
                && !declared.triggers.contains(trigger)
            {
                findings.push(Finding::error(
                    CAT_REFERENCES,
                    format!(
                        "Room \"{}\" connection \"{label}\" requires non-existent trigger: {trigger}",
                        room.id
                    ),
                ));
            }
        }
    }
}

fn item_references(doc: &ExperienceDoc, declared: &Declared<'_>, findings: &mut Vec<Finding>) {
    let unlocked_by_reward: BTreeSet<&str> = doc
        .triggers
        .iter()
        .flat_map(|trigger| &trigger.rewards)
        .filter_map(|reward| match reward {
            Reward::Access {
                unlocks_door: Some(door),
                ..
            } => Some(door.as_str()),
            _ => None,
        })
        .collect();

    for (_, item, _) in doc.all_items() {
        check_item(doc, item, declared, &unlocked_by_reward, findings);
    }
}

fn check_item(
    doc: &ExperienceDoc,
    item: &ItemDoc,
    declared: &Declared<'_>,
    unlocked_by_reward: &BTreeSet<&str>,
    findings: &mut Vec<Finding>,
) {
    let lock_trigger = item.lock_trigger_id.as_deref().filter(|t| !t.is_empty());
    if let Some(trigger) = lock_trigger {
        if !declared.triggers.contains(trigger) {
            findings.push(Finding::error(
                CAT_REFERENCES,
                format!(
                    "Item \"{}\" references non-existent trigger: {trigger}",
                    item.id
                ),
            ));
        }
        if !item.is_locked {
            findings.push(Finding::error(
                CAT_CONFIGURATION,
                format!(
                    "Item \"{}\" has lockTriggerId \"{trigger}\" but isLocked is not true",
                    item.id
                ),
            ));
        }
    } else if item.is_locked && !unlocked_by_reward.contains(item.id.as_str()) {
        findings.push(Finding::error(
            CAT_CONFIGURATION,
            format!(
                "Item \"{}\" is locked but has no lockTriggerId and no trigger unlocks it",
                item.id
            ),
        ));
    }

    if let Some(trigger_id) = item.examine_trigger.as_deref().filter(|t| !t.is_empty()) {
        match doc.triggers.iter().find(|t| t.id == trigger_id) {
            None => findings.push(Finding::error(
                CAT_REFERENCES,
                format!(
                    "Item \"{}\" references non-existent examination trigger: {trigger_id}",
                    item.id
                ),
            )),
            Some(trigger) => {
                if let TriggerKind::Examination(hook) = &trigger.kind
                    && !hook.object_id.is_empty()
                    && hook.object_id != item.id
                {
                    findings.push(Finding::warning(
                        CAT_CONFIGURATION,
                        format!(
                            "Item \"{}\" fires examination trigger \"{trigger_id}\" bound to object \"{}\"",
                            item.id, hook.object_id
                        ),
                    ));
                }
            }
        }
    }

    if let Some(key) = item.key_id.as_deref().filter(|k| !k.is_empty())
        && !declared.keys.contains(key)
    {
        findings.push(Finding::error(
            CAT_REFERENCES,
            format!("Item \"{}\" references non-existent key: {key}", item.id),
        ));
    }
    if let Some(room) = item.leads_to.as_deref().filter(|r| !r.is_empty())
        && !declared.rooms.contains(room)
    {
        findings.push(Finding::error(
            CAT_REFERENCES,
            format!("Door \"{}\" leads to non-existent room: {room}", item.id),
        ));
    }
}

fn key_references(doc: &ExperienceDoc, declared: &Declared<'_>, findings: &mut Vec<Finding>) {
    for key in &doc.keys {
        if let Some(trigger) = key.associated_trigger()
            && !declared.triggers.contains(trigger)
        {
            findings.push(Finding::error(
                CAT_REFERENCES,
                format!(
                    "Key \"{}\" references non-existent trigger: {trigger}",
                    key.id
                ),
            ));
        }
        if let KeyKind::Clue {
            related_puzzle: Some(puzzle),
            ..
        } = &key.kind
            && !puzzle.is_empty()
            && !declared.triggers.contains(puzzle.as_str())
        {
            findings.push(Finding::error(
                CAT_REFERENCES,
                format!(
                    "Clue \"{}\" references non-existent puzzle: {puzzle}",
                    key.id
                ),
            ));
        }
        if !key.room_id.is_empty() && !declared.rooms.contains(key.room_id.as_str()) {
            findings.push(Finding::warning(
                CAT_REFERENCES,
                format!(
                    "Key \"{}\" is placed in non-existent room: {}",
                    key.id, key.room_id
                ),
            ));
        }
    }
}

fn trigger_references(doc: &ExperienceDoc, declared: &Declared<'_>, findings: &mut Vec<Finding>) {
    for trigger in &doc.triggers {
        let id = &trigger.id;
        match &trigger.kind {
            TriggerKind::PadLock(lock) => {
                match doc.keys.iter().find(|key| key.id == lock.required_key) {
                    None => findings.push(Finding::error(
                        CAT_REFERENCES,
                        format!(
                            "Pad lock \"{id}\" requires non-existent key: {}",
                            lock.required_key
                        ),
                    )),
                    Some(key) if !key.can_activate(id) => findings.push(
                        Finding::error(
                            CAT_CONFIGURATION,
                            format!(
                                "Pad lock \"{id}\" requires key \"{}\", which cannot activate it",
                                key.id
                            ),
                        )
                        .with_details(json!({
                            "triggerId": id,
                            "keyId": key.id,
                            "activates": key.activation_target(),
                        })),
                    ),
                    Some(_) => {}
                }
            }
            TriggerKind::Examination(hook) => {
                if !hook.object_id.is_empty() && !declared.items.contains(hook.object_id.as_str())
                {
                    findings.push(Finding::error(
                        CAT_REFERENCES,
                        format!(
                            "Examination trigger \"{id}\" is bound to non-existent object: {}",
                            hook.object_id
                        ),
                    ));
                }
            }
            TriggerKind::KeypadLock(lock) => {
                if lock.code.is_empty() {
                    findings.push(Finding::error(
                        CAT_CONFIGURATION,
                        format!("Keypad lock \"{id}\" has no code"),
                    ));
                }
            }
        }

        for reward in &trigger.rewards {
            reward_references(id, reward, declared, findings);
        }

        for item in &trigger.required_items {
            if !declared.items.contains(item.as_str()) {
                findings.push(Finding::warning(
                    CAT_REFERENCES,
                    format!("Trigger \"{id}\" requires non-existent item: {item}"),
                ));
            }
        }
        for other in &trigger.connected_triggers {
            if !declared.triggers.contains(other.as_str()) {
                findings.push(Finding::error(
                    CAT_REFERENCES,
                    format!("Trigger \"{id}\" connects to non-existent trigger: {other}"),
                ));
            }
        }
    }
}

fn reward_references(
    trigger_id: &str,
    reward: &Reward,
    declared: &Declared<'_>,
    findings: &mut Vec<Finding>,
) {
    let mut dangling = |what: &str, target: &str| {
        findings.push(
            Finding::error(
                CAT_REFERENCES,
                format!("Trigger \"{trigger_id}\" {what}: {target}"),
            )
            .with_details(json!({ "triggerId": trigger_id, "target": target })),
        );
    };
    match reward {
        Reward::Access {
            unlocks_door,
            reveals_room,
            activates_triggers,
        } => {
            if let Some(door) = unlocks_door
                && !declared.items.contains(door.as_str())
                && !declared.connections.contains(door.as_str())
            {
                dangling("unlocks non-existent door", door);
            }
            if let Some(room) = reveals_room
                && !declared.rooms.contains(room.as_str())
            {
                dangling("reveals non-existent room", room);
            }
            for other in activates_triggers {
                if !declared.triggers.contains(other.as_str()) {
                    dangling("shows non-existent trigger", other);
                }
            }
        }
        Reward::Key { key_id } => {
            if !declared.keys.contains(key_id.as_str()) {
                dangling("grants non-existent key", key_id);
            }
        }
        Reward::Item {
            item_id,
            hide_item_id,
        } => {
            if let Some(item) = item_id
                && !declared.items.contains(item.as_str())
            {
                dangling("reveals non-existent item", item);
            }
            if let Some(item) = hide_item_id
                && !declared.items.contains(item.as_str())
            {
                dangling("hides non-existent item", item);
            }
        }
        Reward::Information { .. } => {}
    }
}

fn completion_criteria(doc: &ExperienceDoc, declared: &Declared<'_>, findings: &mut Vec<Finding>) {
    if doc.completion_criteria.is_empty() {
        findings.push(Finding::warning(CAT_COMPLETION, "No completion criteria defined"));
        return;
    }
    for criterion in &doc.completion_criteria {
        if criterion.kind != TRIGGER_ACTIVATED {
            findings.push(Finding::warning(
                CAT_COMPLETION,
                format!(
                    "Completion criterion type \"{}\" is never evaluated",
                    criterion.kind
                ),
            ));
            continue;
        }
        match criterion.required_trigger() {
            Some(trigger) if declared.triggers.contains(trigger) => {}
            Some(trigger) => findings.push(Finding::error(
                CAT_COMPLETION,
                format!("Completion criteria references non-existent trigger: {trigger}"),
            )),
            None => findings.push(Finding::error(
                CAT_COMPLETION,
                "Completion criterion of type trigger_activated names no trigger",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::report::Severity;

    fn findings(json: &str) -> Vec<Finding> {
        check_structure(&ExperienceDoc::from_json(json).unwrap())
    }

    fn errors(json: &str) -> Vec<String> {
        findings(json)
            .into_iter()
            .filter(Finding::is_error)
            .map(|f| f.message)
            .collect()
    }

    #[test]
    fn empty_document_reports_required_fields() {
        let errors = errors("{}");
        assert!(errors.contains(&"Experience missing required field: id".to_string()));
        assert!(errors.contains(&"Experience missing required field: name".to_string()));
        assert!(errors.contains(&"Experience has no rooms defined".to_string()));
        assert!(errors.contains(&"Experience missing startingRoomId".to_string()));
    }

    #[test]
    fn well_formed_document_has_only_info() {
        let found = findings(
            r#"{"id": "x", "name": "X", "startingRoomId": "a",
                "rooms": [{"id": "a", "name": "A",
                           "items": [{"id": "box", "name": "Box", "isLocked": true,
                                      "lockTriggerId": "pad"}]}],
                "triggers": [{"id": "pad", "type": "KeypadLock", "code": "1"}],
                "keys": [{"id": "hint", "type": "CLUE", "relatedPuzzle": "pad", "roomId": "a"}],
                "completionCriteria": [{"type": "trigger_activated", "triggerId": "pad"}]}"#,
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, Severity::Info);
        assert_eq!(found[0].message, "Experience has 1 room(s)");
    }

    #[test]
    fn dangling_references_are_errors() {
        let errors = errors(
            r#"{"id": "x", "name": "X", "startingRoomId": "a", "finalRoomId": "z",
                "rooms": [{"id": "a", "name": "A",
                           "items": [{"id": "door", "category": "DOOR", "leadsTo": "nowhere",
                                      "keyId": "ghost_key", "examineTrigger": "ghost_exam"}],
                           "connectedRooms": [{"id": "hall", "connectedRoomId": "b",
                                               "requiredTrigger": "ghost_trigger"}]}],
                "triggers": [{"id": "pad", "type": "PadLock", "requiredKey": "ghost_key",
                              "connectedTriggers": ["ghost_next"],
                              "rewards": [{"type": "KeyReward", "keyId": "ghost_key"},
                                          {"type": "AccessReward", "unlocksDoor": "hall"}]}],
                "keys": [{"id": "k", "type": "PHYSICAL_KEY", "associatedTriggerId": "ghost_pad"}],
                "completionCriteria": [{"type": "trigger_activated", "triggerId": "ghost_end"}]}"#,
        );
        for expected in [
            "Final room \"z\" does not exist",
            "Door \"door\" leads to non-existent room: nowhere",
            "Item \"door\" references non-existent key: ghost_key",
            "Item \"door\" references non-existent examination trigger: ghost_exam",
            "Room \"a\" connection \"hall\" targets non-existent room: b",
            "Room \"a\" connection \"hall\" requires non-existent trigger: ghost_trigger",
            "Pad lock \"pad\" requires non-existent key: ghost_key",
            "Trigger \"pad\" connects to non-existent trigger: ghost_next",
            "Trigger \"pad\" grants non-existent key: ghost_key",
            "Key \"k\" references non-existent trigger: ghost_pad",
            "Completion criteria references non-existent trigger: ghost_end",
        ] {
            assert!(errors.contains(&expected.to_string()), "missing: {expected}");
        }
        // a connection id is a valid unlock target
        assert!(!errors.iter().any(|e| e.contains("unlocks non-existent door")));
    }

    #[test]
    fn lock_configuration_is_checked() {
        let errors = errors(
            r#"{"id": "x", "name": "X", "startingRoomId": "a",
                "rooms": [{"id": "a", "name": "A", "items": [
                    {"id": "chest", "lockTriggerId": "pad"},
                    {"id": "safe", "isLocked": true},
                    {"id": "gate", "isLocked": true}]}],
                "triggers": [{"id": "pad", "type": "KeypadLock", "code": "1",
                              "rewards": [{"type": "AccessReward", "unlocksDoor": "gate"}]}],
                "completionCriteria": [{"type": "trigger_activated", "triggerId": "pad"}]}"#,
        );
        assert_eq!(
            errors,
            vec![
                "Item \"chest\" has lockTriggerId \"pad\" but isLocked is not true",
                "Item \"safe\" is locked but has no lockTriggerId and no trigger unlocks it",
            ]
        );
    }

    #[test]
    fn duplicates_and_soft_problems() {
        let found = findings(
            r#"{"id": "x", "name": "X", "startingRoomId": "a",
                "rooms": [{"id": "a", "name": "A", "items": [{"id": "i"}, {"id": "i"}]}],
                "triggers": [{"id": "t", "type": "ExaminationTrigger", "objectId": "i",
                              "requiredItems": ["ghost"]}],
                "keys": [{"id": "k", "type": "CLUE", "roomId": "attic"}]}"#,
        );
        let messages = |severity| {
            found
                .iter()
                .filter(|f| f.severity == severity)
                .map(|f| f.message.as_str())
                .collect::<Vec<_>>()
        };
        assert_eq!(messages(Severity::Error), vec!["Duplicate item id \"i\""]);
        assert_eq!(
            messages(Severity::Warning),
            vec![
                "Key \"k\" is placed in non-existent room: attic",
                "Trigger \"t\" requires non-existent item: ghost",
                "No completion criteria defined",
            ]
        );
    }

    #[test]
    fn pad_lock_key_must_answer_to_the_lock() {
        let errors = errors(
            r#"{"id": "x", "name": "X", "startingRoomId": "a",
                "rooms": [{"id": "a", "name": "A"}],
                "triggers": [
                    {"id": "desk_lock", "type": "PadLock", "requiredKey": "brass_key"},
                    {"id": "gate_lock", "type": "PadLock", "requiredKey": "gate_clue"},
                    {"id": "shed_lock", "type": "PadLock", "requiredKey": "shed_key"}],
                "keys": [
                    {"id": "brass_key", "type": "PHYSICAL_KEY", "associatedTriggerId": "none"},
                    {"id": "gate_clue", "type": "CLUE", "associatedTriggerId": "gate_lock"},
                    {"id": "shed_key", "type": "PHYSICAL_KEY", "associatedTriggerId": "shed_lock"}],
                "completionCriteria": [{"type": "trigger_activated", "triggerId": "shed_lock"}]}"#,
        );
        assert_eq!(
            errors,
            vec![
                "Pad lock \"desk_lock\" requires key \"brass_key\", which cannot activate it",
                "Pad lock \"gate_lock\" requires key \"gate_clue\", which cannot activate it",
            ]
        );
    }
}
