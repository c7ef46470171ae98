//! Variable Contexts
//!
//! A resolution request names exactly one variable source: a live workflow
//! execution, or an explicit caller-owned mapping. The enum makes
//! "both set" and "neither set" unrepresentable; the API layer validates
//! its looser wire shape into this type.

use hb_common::VariableValue;
use std::collections::BTreeMap;

/// Read-only variable source for one resolution request
#[derive(Debug, Clone)]
pub enum VariableContext {
    /// Resolve lazily against the execution's current variable snapshot
    Execution(String),
    /// Resolve against the supplied mapping; pure text transform
    Explicit(BTreeMap<String, VariableValue>),
}

impl VariableContext {
    pub fn execution(execution_id: impl Into<String>) -> Self {
        Self::Execution(execution_id.into())
    }

    pub fn explicit(map: BTreeMap<String, VariableValue>) -> Self {
        Self::Explicit(map)
    }

    /// Build an explicit context from a JSON object, skipping entries whose
    /// values are not substitutable scalars
    pub fn from_json_map(map: &serde_json::Map<String, serde_json::Value>) -> Self {
        let values = map
            .iter()
            .filter_map(|(k, v)| VariableValue::from_json(v).map(|value| (k.clone(), value)))
            .collect();
        Self::Explicit(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_map_keeps_scalars_and_drops_the_rest() {
        let json = serde_json::json!({
            "name": "Ada",
            "count": 3,
            "active": true,
            "nested": {"not": "scalar"},
            "list": [1, 2]
        });
        let VariableContext::Explicit(map) = VariableContext::from_json_map(json.as_object().unwrap())
        else {
            panic!("expected explicit context");
        };

        assert_eq!(map.len(), 3);
        assert_eq!(map.get("name"), Some(&VariableValue::Text("Ada".into())));
        assert!(!map.contains_key("nested"));
    }
}
