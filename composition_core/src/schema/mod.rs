//! Field Composer - flattens the field declarations of a class hierarchy into
//! one fixed-layout schema per class.
//!
//! Merge order:
//! 1. **Bases**: walk direct bases in declaration order and append every field
//!    not seen yet. The first occurrence fixes both name and type.
//! 2. **Local**: append the class's own fields that no base contributed.
//! 3. **Config**: inherit the structural configuration of the first base that
//!    set one, otherwise use the local one.

mod record;

pub use record::*;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entities::Location;

/// Types a field, capability or event argument can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Bool,
    Int,
    Float,
    Text,
    Location,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldType::Bool => "bool",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Text => "text",
            FieldType::Location => "location",
        };
        f.write_str(name)
    }
}

/// A single stored value.
#[derive(Debug, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Location(Location),
}

impl FieldValue {
    /// The type tag of this value.
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Bool(_) => FieldType::Bool,
            FieldValue::Int(_) => FieldType::Int,
            FieldValue::Float(_) => FieldType::Float,
            FieldValue::Text(_) => FieldType::Text,
            FieldValue::Location(_) => FieldType::Location,
        }
    }

    /// Convert into `ty`, widening integers to floats.
    ///
    /// Returns the original value back when no conversion exists.
    pub fn coerce(self, ty: FieldType) -> Result<FieldValue, FieldValue> {
        match (self, ty) {
            (FieldValue::Int(v), FieldType::Float) => Ok(FieldValue::Float(v as f64)),
            (value, ty) if value.field_type() == ty => Ok(value),
            (value, _) => Err(value),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_location(&self) -> Option<Location> {
        match self {
            FieldValue::Location(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(value.into())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Location> for FieldValue {
    fn from(value: Location) -> Self {
        FieldValue::Location(value)
    }
}

/// One named, typed field and the trait level that introduced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: FieldType,
    pub declared_by: String,
}

/// Equality, ordering and mutability semantics of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralConfig {
    /// Compare records by value instead of identity.
    pub eq: bool,
    /// Order records lexicographically in schema order.
    pub order: bool,
    /// Reject mutation after construction.
    pub frozen: bool,
}

impl Default for StructuralConfig {
    fn default() -> Self {
        Self {
            eq: true,
            order: false,
            frozen: false,
        }
    }
}

/// The flattened field set of one class. Immutable once composed.
#[derive(Debug, Clone)]
pub struct ComposedSchema {
    class: String,
    fields: Vec<FieldDecl>,
    index: HashMap<String, usize>,
    config: Option<StructuralConfig>,
}

impl ComposedSchema {
    /// Merge local declarations with the already composed schemas of the bases.
    pub fn compose(
        class: &str,
        local: &[FieldDecl],
        local_config: Option<StructuralConfig>,
        bases: &[&ComposedSchema],
    ) -> Self {
        let mut schema = Self {
            class: class.to_string(),
            fields: Vec::new(),
            index: HashMap::new(),
            config: None,
        };

        for base in bases {
            for field in &base.fields {
                schema.absorb(field);
            }
        }
        for field in local {
            schema.absorb(field);
        }

        schema.config = bases
            .iter()
            .find_map(|base| base.config)
            .or(local_config);
        schema
    }

    // First occurrence wins; later declarations of the same name are dropped.
    fn absorb(&mut self, field: &FieldDecl) {
        match self.index.get(&field.name) {
            Some(&slot) => {
                let kept = &self.fields[slot];
                if kept.ty != field.ty {
                    log::warn!(
                        "`{}`: field `{}` keeps type {} from `{}`, ignoring {} from `{}`",
                        self.class,
                        field.name,
                        kept.ty,
                        kept.declared_by,
                        field.ty,
                        field.declared_by
                    );
                }
            }
            None => {
                self.index.insert(field.name.clone(), self.fields.len());
                self.fields.push(field.clone());
            }
        }
    }

    /// Name of the class this schema belongs to.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Fields in storage order.
    pub fn fields(&self) -> &[FieldDecl] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Storage slot of a field.
    pub fn slot(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.slot(name).map(|slot| &self.fields[slot])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Effective structural configuration.
    pub fn config(&self) -> StructuralConfig {
        self.config.unwrap_or_default()
    }
}
