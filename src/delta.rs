//! Change events against model records.

use crate::types::ModelData;
use serde::{Deserialize, Serialize};

/// A single record mutation.
///
/// `model` names the logical record the change applies to. An update carries
/// both snapshots of the same record; insertions and deletions carry one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Delta {
    /// A record appeared.
    #[serde(rename = "insert")]
    Insertion { model: String, data: ModelData },

    /// A record changed.
    Update {
        model: String,
        old_data: ModelData,
        new_data: ModelData,
    },

    /// A record vanished.
    #[serde(rename = "delete")]
    Deletion { model: String, data: ModelData },
}

/// Discriminant of a [`Delta`], handy for assertions and stats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeltaKind {
    Insertion,
    Update,
    Deletion,
}

impl Delta {
    pub fn insertion(model: impl Into<String>, data: ModelData) -> Self {
        Delta::Insertion {
            model: model.into(),
            data,
        }
    }

    pub fn update(model: impl Into<String>, old_data: ModelData, new_data: ModelData) -> Self {
        Delta::Update {
            model: model.into(),
            old_data,
            new_data,
        }
    }

    pub fn deletion(model: impl Into<String>, data: ModelData) -> Self {
        Delta::Deletion {
            model: model.into(),
            data,
        }
    }

    /// Model identifier this delta refers to.
    pub fn model(&self) -> &str {
        match self {
            Delta::Insertion { model, .. }
            | Delta::Update { model, .. }
            | Delta::Deletion { model, .. } => model,
        }
    }

    pub fn kind(&self) -> DeltaKind {
        match self {
            Delta::Insertion { .. } => DeltaKind::Insertion,
            Delta::Update { .. } => DeltaKind::Update,
            Delta::Deletion { .. } => DeltaKind::Deletion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_tags() {
        let delta = Delta::update("m1", json!({"x": 1}), json!({"x": 2}));
        let value = serde_json::to_value(&delta).unwrap();
        assert_eq!(
            value,
            json!({"type": "update", "model": "m1", "old_data": {"x": 1}, "new_data": {"x": 2}})
        );

        let insert = serde_json::to_value(Delta::insertion("m1", json!({}))).unwrap();
        assert_eq!(insert["type"], "insert");

        let delete = serde_json::to_value(Delta::deletion("m1", json!({}))).unwrap();
        assert_eq!(delete["type"], "delete");
    }

    #[test]
    fn test_parse_from_wire() {
        let delta: Delta =
            serde_json::from_value(json!({"type": "delete", "model": "m7", "data": {"a": "b"}}))
                .unwrap();
        assert_eq!(delta.kind(), DeltaKind::Deletion);
        assert_eq!(delta.model(), "m7");
    }
}
