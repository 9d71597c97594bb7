use crate::config::OutlineConfig;
use crate::models::EntryRecord;
use crate::outline::{Outline, OutlineError};
use crate::storage::{load_json_from_storage, remove_from_storage, save_json_to_storage};
use serde::{Deserialize, Serialize};

fn key(prefix: &str, outline_id: &str) -> String {
    format!("{prefix}::{outline_id}")
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct OutlineSnapshot {
    pub saved_ms: i64,
    pub outline_id: String,
    pub entries: Vec<EntryRecord>,
}

pub(crate) fn save_outline_snapshot(prefix: &str, outline_id: &str, entries: Vec<EntryRecord>, saved_ms: i64) {
    if outline_id.trim().is_empty() {
        return;
    }

    let snap = OutlineSnapshot {
        saved_ms,
        outline_id: outline_id.to_string(),
        entries,
    };

    save_json_to_storage(&key(prefix, outline_id), &snap);
}

pub(crate) fn load_outline_snapshot(prefix: &str, outline_id: &str) -> Option<OutlineSnapshot> {
    if outline_id.trim().is_empty() {
        return None;
    }
    load_json_from_storage::<OutlineSnapshot>(&key(prefix, outline_id))
}

pub(crate) fn remove_outline_snapshot(prefix: &str, outline_id: &str) {
    if outline_id.trim().is_empty() {
        return;
    }
    remove_from_storage(&key(prefix, outline_id));
}

/// Builds the working outline from a stored snapshot.
///
/// A missing snapshot yields a fresh seed. An invalid one also yields a seed, and the reason is
/// returned alongside so the page can tell the user.
pub(crate) fn outline_from_snapshot(
    config: &OutlineConfig,
    outline_id: &str,
    snap: Option<OutlineSnapshot>,
    id_prefix: &str,
) -> (Outline, Option<OutlineError>) {
    let Some(snap) = snap else {
        return (Outline::seeded(config.clone(), id_prefix), None);
    };
    if snap.outline_id != outline_id {
        let err = OutlineError::Snapshot(format!(
            "snapshot belongs to {}, not {outline_id}",
            snap.outline_id
        ));
        return (Outline::seeded(config.clone(), id_prefix), Some(err));
    }

    match Outline::restore(config.clone(), &snap.entries, id_prefix) {
        Ok(outline) => (outline, None),
        Err(e) => {
            log::warn!("discarding invalid snapshot for {outline_id}: {e}");
            (Outline::seeded(config.clone(), id_prefix), Some(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntryId;

    fn root() -> EntryRecord {
        EntryRecord {
            id: EntryId::root(),
            parent: None,
            text: String::new(),
            position: 0.0,
            collapsed: false,
        }
    }

    #[test]
    fn test_key_format() {
        assert_eq!(key("outline_snapshot", "inbox"), "outline_snapshot::inbox");
    }

    #[test]
    fn test_snapshot_contract_deserialize() {
        let json = r#"{
            "saved_ms": 1700000000000,
            "outline_id": "inbox",
            "entries": [
                {"id": "00000000-0000-0000-0000-000000000000", "parent": null, "position": 0},
                {"id": "a", "parent": "00000000-0000-0000-0000-000000000000", "text": "hi", "position": 1, "collapsed": true}
            ]
        }"#;
        let snap: OutlineSnapshot = serde_json::from_str(json).expect("snapshot should parse");
        assert_eq!(snap.entries.len(), 2);
        assert!(snap.entries[1].collapsed);
    }

    #[test]
    fn test_missing_snapshot_seeds() {
        let (outline, err) = outline_from_snapshot(&OutlineConfig::default(), "inbox", None, "x");
        assert!(err.is_none());
        assert_eq!(outline.tree().visible_preorder().len(), 1);
    }

    #[test]
    fn test_valid_snapshot_restores_entries() {
        let snap = OutlineSnapshot {
            saved_ms: 1,
            outline_id: "inbox".into(),
            entries: vec![
                root(),
                EntryRecord {
                    id: EntryId::new("a"),
                    parent: Some(EntryId::root()),
                    text: "hello".into(),
                    position: 1.0,
                    collapsed: false,
                },
            ],
        };
        let (outline, err) = outline_from_snapshot(&OutlineConfig::default(), "inbox", Some(snap.clone()), "x");
        assert!(err.is_none());
        assert_eq!(outline.records(), snap.entries);
    }

    #[test]
    fn test_invalid_snapshot_falls_back_to_seed() {
        let dup = EntryRecord {
            id: EntryId::new("a"),
            parent: Some(EntryId::root()),
            text: String::new(),
            position: 1.0,
            collapsed: false,
        };
        let snap = OutlineSnapshot {
            saved_ms: 1,
            outline_id: "inbox".into(),
            entries: vec![
                root(),
                dup.clone(),
                EntryRecord {
                    id: EntryId::new("b"),
                    ..dup
                },
            ],
        };
        let (outline, err) = outline_from_snapshot(&OutlineConfig::default(), "inbox", Some(snap), "x");
        assert!(matches!(err, Some(OutlineError::Snapshot(_))));
        assert_eq!(outline.tree().visible_preorder().len(), 1);
    }
}
