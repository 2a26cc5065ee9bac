//! Default time slot store: one JSON file per workspace holding the slot
//! templates the routine builder starts from. Loaded once at workspace
//! selection, rewritten in full on every mutation.

use anyhow::Context;
use chrono::{NaiveTime, Utc};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::model::{DefaultTimeSlot, SlotKind};

pub const STORE_FILE: &str = "default_time_slots.json";
pub const MIN_SLOT_MINUTES: i64 = 30;

pub fn parse_hhmm(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").ok()
}

/// Times must be `HH:MM`, same-day, end strictly after start, at least
/// 30 minutes apart. Overnight ranges are rejected rather than wrapped.
pub fn validate_slot(slot: &DefaultTimeSlot) -> Result<(), String> {
    if slot.start_time.trim().is_empty() || slot.end_time.trim().is_empty() {
        return Err("both start and end times are required".to_string());
    }
    let start = parse_hhmm(&slot.start_time)
        .ok_or_else(|| format!("invalid start time: {:?}", slot.start_time))?;
    let end = parse_hhmm(&slot.end_time)
        .ok_or_else(|| format!("invalid end time: {:?}", slot.end_time))?;
    if end <= start {
        return Err("end time must be after start time".to_string());
    }
    let minutes = end.signed_duration_since(start).num_minutes();
    if minutes < MIN_SLOT_MINUTES {
        return Err(format!(
            "slot must be at least {MIN_SLOT_MINUTES} minutes, got {minutes}"
        ));
    }
    Ok(())
}

pub fn new_slot_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("slot_{}_{}", Utc::now().timestamp_millis(), &suffix[..6])
}

/// Built-in seed set used when the workspace has no usable store file.
pub fn default_slots() -> Vec<DefaultTimeSlot> {
    const SEED: &[(SlotKind, &str, &str)] = &[
        (SlotKind::Theory, "08:00", "09:15"),
        (SlotKind::Theory, "09:15", "10:30"),
        (SlotKind::Theory, "10:30", "11:45"),
        (SlotKind::Theory, "11:45", "13:00"),
        (SlotKind::Theory, "14:15", "15:30"),
        (SlotKind::Theory, "15:30", "16:45"),
        (SlotKind::Lab, "08:00", "10:45"),
        (SlotKind::Lab, "11:00", "13:45"),
        (SlotKind::Lab, "14:15", "17:00"),
    ];
    SEED.iter()
        .enumerate()
        .map(|(i, (kind, start, end))| DefaultTimeSlot {
            id: format!("slot_default_{}", i + 1),
            kind: *kind,
            start_time: (*start).to_string(),
            end_time: (*end).to_string(),
        })
        .collect()
}

#[derive(Debug)]
pub struct SlotStore {
    path: PathBuf,
    pub slots: Vec<DefaultTimeSlot>,
    pub editing: Option<String>,
}

impl SlotStore {
    /// An absent, unparseable or non-array store file reseeds the defaults.
    /// A parsed array is authoritative: invalid entries are dropped
    /// individually, and an empty result (even from a non-empty array)
    /// is a deliberately cleared store, never reseeded.
    pub fn load(workspace: &Path) -> SlotStore {
        let path = workspace.join(STORE_FILE);
        let slots = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(serde_json::Value::Array(items)) => {
                    let mut slots: Vec<DefaultTimeSlot> = Vec::new();
                    let mut dropped = 0usize;
                    for item in items {
                        match serde_json::from_value::<DefaultTimeSlot>(item) {
                            Ok(slot) if !slot.id.is_empty() && validate_slot(&slot).is_ok() => {
                                slots.push(slot)
                            }
                            _ => dropped += 1,
                        }
                    }
                    if dropped > 0 {
                        tracing::warn!(dropped, "dropped invalid stored time slots");
                    }
                    slots
                }
                _ => {
                    tracing::warn!(path = %path.to_string_lossy(), "slot store unreadable, reseeding defaults");
                    default_slots()
                }
            },
            Err(_) => default_slots(),
        };
        SlotStore {
            path,
            slots,
            editing: None,
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let text =
            serde_json::to_string_pretty(&self.slots).context("failed to serialize time slots")?;
        std::fs::write(&self.path, text)
            .with_context(|| format!("failed to write {}", self.path.to_string_lossy()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_dir(prefix: &str) -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!(
            "routined-store-{}-{}",
            prefix,
            Uuid::new_v4().simple()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn slot(id: &str, kind: SlotKind, start: &str, end: &str) -> DefaultTimeSlot {
        DefaultTimeSlot {
            id: id.to_string(),
            kind,
            start_time: start.to_string(),
            end_time: end.to_string(),
        }
    }

    #[test]
    fn validation_rules() {
        assert!(validate_slot(&slot("a", SlotKind::Theory, "09:00", "10:30")).is_ok());
        // 15 minutes is under the floor.
        assert!(validate_slot(&slot("a", SlotKind::Theory, "09:00", "09:15")).is_err());
        // Exactly 30 minutes passes.
        assert!(validate_slot(&slot("a", SlotKind::Theory, "09:00", "09:30")).is_ok());
        // End before start is rejected, not wrapped to the next day.
        assert!(validate_slot(&slot("a", SlotKind::Lab, "10:00", "09:00")).is_err());
        assert!(validate_slot(&slot("a", SlotKind::Lab, "10:00", "10:00")).is_err());
        assert!(validate_slot(&slot("a", SlotKind::Theory, "", "10:00")).is_err());
        assert!(validate_slot(&slot("a", SlotKind::Theory, "9 am", "10:00")).is_err());
        assert!(validate_slot(&slot("a", SlotKind::Theory, "25:00", "26:00")).is_err());
    }

    #[test]
    fn missing_file_seeds_defaults() {
        let dir = temp_dir("seed");
        let store = SlotStore::load(&dir);
        assert_eq!(store.slots.len(), default_slots().len());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_file_seeds_defaults() {
        let dir = temp_dir("corrupt");
        std::fs::write(dir.join(STORE_FILE), "{not json").unwrap();
        let store = SlotStore::load(&dir);
        assert_eq!(store.slots.len(), default_slots().len());

        std::fs::write(dir.join(STORE_FILE), "{\"slots\": 3}").unwrap();
        let store = SlotStore::load(&dir);
        assert_eq!(store.slots.len(), default_slots().len());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_array_is_a_cleared_store() {
        let dir = temp_dir("cleared");
        std::fs::write(dir.join(STORE_FILE), "[]").unwrap();
        let store = SlotStore::load(&dir);
        assert!(store.slots.is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn invalid_entries_dropped_individually() {
        let dir = temp_dir("partial");
        let text = serde_json::json!([
            { "id": "good", "kind": "Theory", "startTime": "08:00", "endTime": "09:15" },
            { "id": "short", "kind": "Theory", "startTime": "08:00", "endTime": "08:10" },
            { "id": "", "kind": "Lab", "startTime": "08:00", "endTime": "10:45" },
            { "kind": "Lab", "startTime": "08:00" },
            { "id": "wrapped", "kind": "Lab", "startTime": "22:00", "endTime": "01:00" }
        ])
        .to_string();
        std::fs::write(dir.join(STORE_FILE), text).unwrap();
        let store = SlotStore::load(&dir);
        assert_eq!(store.slots.len(), 1);
        assert_eq!(store.slots[0].id, "good");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn all_invalid_array_does_not_reseed() {
        let dir = temp_dir("allbad");
        let text = serde_json::json!([
            { "id": "short", "kind": "Theory", "startTime": "08:00", "endTime": "08:10" }
        ])
        .to_string();
        std::fs::write(dir.join(STORE_FILE), text).unwrap();
        let store = SlotStore::load(&dir);
        assert!(store.slots.is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn save_round_trips() {
        let dir = temp_dir("save");
        let mut store = SlotStore::load(&dir);
        store.slots = vec![slot("s1", SlotKind::Lab, "08:00", "10:45")];
        store.save().unwrap();
        let reloaded = SlotStore::load(&dir);
        assert_eq!(reloaded.slots, store.slots);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn slot_ids_have_the_expected_shape() {
        let id = new_slot_id();
        assert!(id.starts_with("slot_"));
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 6);
    }
}
