//! Resource - Representing attribute values and data source state

use std::collections::{BTreeMap, BTreeSet};

use crate::diagnostics::Diagnostics;
use crate::schema::{AttributeType, Schema};

/// Attribute value of a data source
///
/// Values are totally ordered so that sets deduplicate structurally and
/// compare equal regardless of the order elements were added in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    /// Absent value (e.g., an optional comment that is not set)
    Null,
    String(String),
    Int(i64),
    Bool(bool),
    List(Vec<Value>),
    Set(BTreeSet<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Build a set value from a list of elements
    ///
    /// Elements that do not match `element_type` and repeated elements are
    /// reported as diagnostics and left out. Construction never aborts, so the
    /// returned value always holds every valid element seen.
    pub fn set(
        element_type: &AttributeType,
        elements: impl IntoIterator<Item = Value>,
    ) -> (Value, Diagnostics) {
        let mut diags = Diagnostics::new();
        let mut set = BTreeSet::new();

        for (index, element) in elements.into_iter().enumerate() {
            if let Err(e) = element_type.validate(&element) {
                diags.add_error(
                    "Invalid set element",
                    format!("Element at index {}: {}", index, e),
                );
                continue;
            }
            if set.contains(&element) {
                diags.add_error(
                    "Duplicate set element",
                    format!(
                        "Element at index {} duplicates {}",
                        index,
                        element.to_json()
                    ),
                );
                continue;
            }
            set.insert(element);
        }

        (Value::Set(set), diags)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&BTreeSet<Value>> {
        match self {
            Value::Set(items) => Some(items),
            _ => None,
        }
    }

    /// Convert to JSON for rendering and persistence
    ///
    /// Sets become arrays in their sorted order.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Set(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Convert from JSON
    ///
    /// Arrays become lists and numbers that do not fit an `i64` are kept as
    /// their string form.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::String(n.to_string()),
            },
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

/// State written by a data source during a read
///
/// The snapshot carries the schema it must conform to. Attributes are only
/// stored once they validate against it.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    schema: Schema,
    attributes: Option<BTreeMap<String, Value>>,
}

impl StateSnapshot {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            attributes: None,
        }
    }

    /// Replace the stored state
    ///
    /// Attributes declared by the schema but missing here are stored as
    /// `Value::Null`. On validation errors the previous state is kept and the
    /// errors are returned as diagnostics.
    pub fn set(&mut self, mut attributes: BTreeMap<String, Value>) -> Diagnostics {
        let mut diags = Diagnostics::new();

        for name in self.schema.attributes.keys() {
            attributes.entry(name.clone()).or_insert(Value::Null);
        }

        if let Err(errors) = self.schema.validate_state(&attributes) {
            for (attribute, error) in errors {
                diags.add_attribute_error(attribute, "Invalid state value", error.to_string());
            }
            return diags;
        }

        self.attributes = Some(attributes);
        diags
    }

    /// Whether a state has been written
    pub fn is_set(&self) -> bool {
        self.attributes.is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.as_ref().and_then(|attrs| attrs.get(name))
    }

    pub fn attributes(&self) -> Option<&BTreeMap<String, Value>> {
        self.attributes.as_ref()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// JSON object of the stored state, `None` when nothing was written
    pub fn to_json(&self) -> Option<serde_json::Value> {
        self.attributes.as_ref().map(|attrs| {
            serde_json::Value::Object(
                attrs
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AttributeSchema;

    fn strings(items: &[&str]) -> Vec<Value> {
        items.iter().map(|s| Value::string(*s)).collect()
    }

    #[test]
    fn set_ignores_insertion_order() {
        let (a, diags_a) = Value::set(&AttributeType::String, strings(&["b", "a", "c"]));
        let (b, diags_b) = Value::set(&AttributeType::String, strings(&["c", "b", "a"]));
        assert!(diags_a.is_empty());
        assert!(diags_b.is_empty());
        assert_eq!(a, b);
    }

    #[test]
    fn set_reports_duplicates_and_keeps_going() {
        let (set, diags) = Value::set(&AttributeType::String, strings(&["a", "b", "a"]));
        assert_eq!(diags.error_count(), 1);
        assert!(diags.iter().next().unwrap().detail.contains("index 2"));
        assert_eq!(set.as_set().unwrap().len(), 2);
    }

    #[test]
    fn set_reports_wrong_element_type() {
        let (set, diags) = Value::set(
            &AttributeType::String,
            vec![Value::string("a"), Value::Int(3)],
        );
        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.iter().next().unwrap().summary, "Invalid set element");
        assert_eq!(set, Value::Set(BTreeSet::from([Value::string("a")])));
    }

    #[test]
    fn json_conversion() {
        let value = Value::Map(BTreeMap::from([
            ("name".to_string(), Value::string("ha1")),
            ("priority".to_string(), Value::Int(2)),
            ("comment".to_string(), Value::Null),
        ]));
        let json = value.to_json();
        assert_eq!(
            json,
            serde_json::json!({"name": "ha1", "priority": 2, "comment": null})
        );
        assert_eq!(Value::from_json(&json), value);

        let (set, _) = Value::set(&AttributeType::String, strings(&["b", "a"]));
        assert_eq!(set.to_json(), serde_json::json!(["a", "b"]));
    }

    #[test]
    fn snapshot_fills_missing_attributes_with_null() {
        let schema = Schema::new()
            .attribute(AttributeSchema::new("id", AttributeType::String).computed())
            .attribute(AttributeSchema::new("comment", AttributeType::String).computed());
        let mut state = StateSnapshot::new(schema);

        let diags = state.set(BTreeMap::from([(
            "id".to_string(),
            Value::string("hagroups"),
        )]));

        assert!(diags.is_empty());
        assert_eq!(state.get("comment"), Some(&Value::Null));
        assert_eq!(state.get("id"), Some(&Value::string("hagroups")));
    }

    #[test]
    fn snapshot_rejects_invalid_state_and_keeps_previous() {
        let schema =
            Schema::new().attribute(AttributeSchema::new("id", AttributeType::String).computed());
        let mut state = StateSnapshot::new(schema);

        let diags = state.set(BTreeMap::from([("id".to_string(), Value::string("first"))]));
        assert!(diags.is_empty());

        let diags = state.set(BTreeMap::from([("id".to_string(), Value::Int(1))]));
        assert_eq!(diags.error_count(), 1);
        assert_eq!(state.get("id"), Some(&Value::string("first")));

        let diags = state.set(BTreeMap::from([
            ("id".to_string(), Value::string("second")),
            ("extra".to_string(), Value::Bool(true)),
        ]));
        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.iter().next().unwrap().attribute.as_deref(), Some("extra"));
        assert_eq!(state.get("id"), Some(&Value::string("first")));
    }
}
