//! Normalized upstream change notifications.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Update,
    Delete,
}

impl ChangeType {
    /// Parse the trailing segment of a change type, case-insensitively.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// One change notification, identical in shape to the v1 feed payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeEvent {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    #[serde(rename = "id")]
    pub target_id: String,
}

impl ChangeEvent {
    pub fn new(change_type: ChangeType, target_id: impl Into<String>) -> Self {
        Self { change_type, target_id: target_id.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v1_shape_deserializes_directly() {
        let raw = r#"{"type":"delete","id":"0b6b1c3e-2f1a-11e6-a18d-a96ab29e3c95"}"#;
        let event: ChangeEvent = serde_json::from_str(raw).expect("v1 payload");
        assert_eq!(event.change_type, ChangeType::Delete);
        assert_eq!(event.target_id, "0b6b1c3e-2f1a-11e6-a18d-a96ab29e3c95");
    }

    #[test]
    fn test_from_label() {
        assert_eq!(ChangeType::from_label("UPDATE"), Some(ChangeType::Update));
        assert_eq!(ChangeType::from_label("annotate"), None);
    }
}
