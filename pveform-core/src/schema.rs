//! Schema - Define attribute schemas for providers and data sources
//!
//! Providers and data sources publish a schema describing each attribute,
//! which the host uses to validate configuration and written state.

use std::collections::BTreeMap;
use std::fmt;

use crate::resource::Value;

/// Attribute type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeType {
    /// String
    String,
    /// Integer
    Int,
    /// Boolean
    Bool,
    /// List
    List(Box<AttributeType>),
    /// Set (unordered, unique elements)
    Set(Box<AttributeType>),
    /// Map with string keys
    Map(Box<AttributeType>),
}

impl AttributeType {
    pub fn list_of(inner: AttributeType) -> Self {
        AttributeType::List(Box::new(inner))
    }

    pub fn set_of(inner: AttributeType) -> Self {
        AttributeType::Set(Box::new(inner))
    }

    pub fn map_of(inner: AttributeType) -> Self {
        AttributeType::Map(Box::new(inner))
    }

    /// Check if a value conforms to this type
    ///
    /// `Value::Null` never conforms; nullability is decided by the attribute.
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match (self, value) {
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),

            (AttributeType::List(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Set(inner), Value::Set(items)) => {
                for item in items {
                    inner.validate(item).map_err(|e| TypeError::SetElementError {
                        element: item.to_json().to_string(),
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Map(inner), Value::Map(map)) => {
                for (k, v) in map {
                    inner.validate(v).map_err(|e| TypeError::MapValueError {
                        key: k.clone(),
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name(),
            }),
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Set(inner) => format!("Set<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Type error
#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Unknown attribute '{name}'")]
    UnknownAttribute { name: String },

    #[error("Attribute '{name}' is computed and cannot be configured")]
    ComputedOnly { name: String },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Set element {element}: {inner}")]
    SetElementError {
        element: String,
        inner: Box<TypeError>,
    },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },
}

impl Value {
    fn type_name(&self) -> String {
        match self {
            Value::Null => "Null".to_string(),
            Value::String(_) => "String".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Set(_) => "Set".to_string(),
            Value::Map(_) => "Map".to_string(),
        }
    }
}

/// Attribute schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    /// Must be set in configuration
    pub required: bool,
    /// May be set in configuration
    pub optional: bool,
    /// Set by the provider when reading
    pub computed: bool,
    /// Value is hidden from rendered output
    pub sensitive: bool,
    pub description: Option<String>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            optional: false,
            computed: false,
            sensitive: false,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Computed and not settable from configuration
    pub fn is_read_only(&self) -> bool {
        self.computed && !self.required && !self.optional
    }

    /// Short label of how the attribute is set (e.g., "optional, computed")
    pub fn mode(&self) -> &'static str {
        match (self.required, self.optional, self.computed) {
            (true, _, _) => "required",
            (false, true, true) => "optional, computed",
            (false, true, false) => "optional",
            (false, false, true) => "computed",
            (false, false, false) => "unset",
        }
    }
}

/// Schema of a provider configuration or a data source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    pub attributes: BTreeMap<String, AttributeSchema>,
    pub description: Option<String>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Validate user supplied configuration
    ///
    /// Errors are paired with the attribute name they refer to.
    pub fn validate_config(
        &self,
        config: &BTreeMap<String, Value>,
    ) -> Result<(), Vec<(String, TypeError)>> {
        let mut errors = Vec::new();

        // Check required attributes
        for (name, schema) in &self.attributes {
            let missing = config.get(name).is_none_or(Value::is_null);
            if schema.required && missing {
                errors.push((
                    name.clone(),
                    TypeError::MissingRequired { name: name.clone() },
                ));
            }
        }

        for (name, value) in config {
            let Some(schema) = self.attributes.get(name) else {
                errors.push((
                    name.clone(),
                    TypeError::UnknownAttribute { name: name.clone() },
                ));
                continue;
            };
            if value.is_null() {
                continue;
            }
            if schema.is_read_only() {
                errors.push((name.clone(), TypeError::ComputedOnly { name: name.clone() }));
                continue;
            }
            if let Err(e) = schema.attr_type.validate(value) {
                errors.push((name.clone(), e));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate state written by a read
    pub fn validate_state(
        &self,
        attributes: &BTreeMap<String, Value>,
    ) -> Result<(), Vec<(String, TypeError)>> {
        let mut errors = Vec::new();

        for (name, value) in attributes {
            let Some(schema) = self.attributes.get(name) else {
                errors.push((
                    name.clone(),
                    TypeError::UnknownAttribute { name: name.clone() },
                ));
                continue;
            };
            if value.is_null() {
                if schema.required {
                    errors.push((
                        name.clone(),
                        TypeError::MissingRequired { name: name.clone() },
                    ));
                }
                continue;
            }
            if let Err(e) = schema.attr_type.validate(value) {
                errors.push((name.clone(), e));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
