use serde::{Deserialize, Serialize};
use std::fmt;

/// Root entry id, the all-zero UUID.
pub(crate) const ROOT_ID: &str = "00000000-0000-0000-0000-000000000000";

/// Opaque, stable entry identifier.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub(crate) struct EntryId(String);

impl EntryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn root() -> Self {
        Self(ROOT_ID.to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One-shot "take input focus on next render" instruction.
///
/// `caret` is a UTF-16 offset; `None` means default focus placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub(crate) struct FocusDirective {
    pub caret: Option<usize>,
}

/// Flat, persisted form of an entry. The tree is rebuilt from these on load.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct EntryRecord {
    pub id: EntryId,

    /// Parent entry id. Only the root has none.
    #[serde(default)]
    pub parent: Option<EntryId>,

    #[serde(default)]
    pub text: String,

    pub position: f64,

    #[serde(default)]
    pub collapsed: bool,
}

/// Length of `s` in UTF-16 code units, the unit used by DOM selections and caret offsets.
pub(crate) fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_record_contract_deserialize() {
        let json = r#"{
            "id": "a",
            "parent": "00000000-0000-0000-0000-000000000000",
            "text": "hello",
            "position": 1.5
        }"#;
        let rec: EntryRecord = serde_json::from_str(json).expect("record should parse");
        assert_eq!(rec.id.as_str(), "a");
        assert!(rec.parent.as_ref().is_some_and(EntryId::is_root));
        assert_eq!(rec.position, 1.5);
        assert!(!rec.collapsed);
    }

    #[test]
    fn entry_id_serializes_as_plain_string() {
        let v = serde_json::to_value(EntryId::new("x-1")).expect("should serialize");
        assert_eq!(v, serde_json::json!("x-1"));
    }

    #[test]
    fn utf16_len_counts_surrogate_pairs() {
        assert_eq!(utf16_len("abc"), 3);
        assert_eq!(utf16_len("a😀"), 3);
    }
}
