//! Fixed-layout storage for one instance.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use super::{ComposedSchema, FieldType, FieldValue};
use crate::entities::Location;
use crate::error::{EngineError, EngineResult};

/// Per-instance field storage laid out exactly as its [`ComposedSchema`].
///
/// No field can be added after construction.
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<ComposedSchema>,
    values: Box<[FieldValue]>,
}

impl Record {
    /// Build a record from keyword-style values.
    ///
    /// The supplied names must match the schema exactly.
    pub fn new<K, I>(schema: Arc<ComposedSchema>, values: I) -> EngineResult<Self>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, FieldValue)>,
    {
        let mut supplied: HashMap<String, FieldValue> = HashMap::new();
        for (name, value) in values {
            let name = name.into();
            if supplied.contains_key(&name) {
                return Err(EngineError::DuplicateField {
                    class: schema.class().to_string(),
                    field: name,
                });
            }
            supplied.insert(name, value);
        }

        let missing: Vec<String> = schema
            .names()
            .filter(|name| !supplied.contains_key(*name))
            .map(str::to_string)
            .collect();
        let mut unexpected: Vec<String> = supplied
            .keys()
            .filter(|name| !schema.contains(name))
            .cloned()
            .collect();
        unexpected.sort();

        if !missing.is_empty() || !unexpected.is_empty() {
            return Err(EngineError::SchemaMismatch {
                class: schema.class().to_string(),
                missing,
                unexpected,
            });
        }

        let mut slots = Vec::with_capacity(schema.len());
        for field in schema.fields() {
            let value = supplied
                .remove(&field.name)
                .ok_or_else(|| EngineError::SchemaMismatch {
                    class: schema.class().to_string(),
                    missing: vec![field.name.clone()],
                    unexpected: Vec::new(),
                })?;
            slots.push(coerce_field(&schema, &field.name, field.ty, value)?);
        }

        Ok(Self {
            schema,
            values: slots.into_boxed_slice(),
        })
    }

    pub fn schema(&self) -> &Arc<ComposedSchema> {
        &self.schema
    }

    /// Read a field by name.
    pub fn get(&self, name: &str) -> EngineResult<&FieldValue> {
        let slot = self.slot(name)?;
        Ok(&self.values[slot])
    }

    /// Overwrite a field, keeping its declared type.
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> EngineResult<()> {
        let slot = self.slot(name)?;
        if self.schema.config().frozen {
            return Err(EngineError::FrozenRecord {
                class: self.schema.class().to_string(),
                field: name.to_string(),
            });
        }
        let ty = self.schema.fields()[slot].ty;
        self.values[slot] = coerce_field(&self.schema, name, ty, value.into())?;
        Ok(())
    }

    pub fn get_bool(&self, name: &str) -> EngineResult<bool> {
        let value = self.get(name)?;
        value
            .as_bool()
            .ok_or_else(|| self.type_mismatch(name, FieldType::Bool, value))
    }

    pub fn get_int(&self, name: &str) -> EngineResult<i64> {
        let value = self.get(name)?;
        value
            .as_int()
            .ok_or_else(|| self.type_mismatch(name, FieldType::Int, value))
    }

    pub fn get_float(&self, name: &str) -> EngineResult<f64> {
        let value = self.get(name)?;
        value
            .as_float()
            .ok_or_else(|| self.type_mismatch(name, FieldType::Float, value))
    }

    pub fn get_text(&self, name: &str) -> EngineResult<&str> {
        let value = self.get(name)?;
        value
            .as_text()
            .ok_or_else(|| self.type_mismatch(name, FieldType::Text, value))
    }

    pub fn get_location(&self, name: &str) -> EngineResult<Location> {
        let value = self.get(name)?;
        value
            .as_location()
            .ok_or_else(|| self.type_mismatch(name, FieldType::Location, value))
    }

    /// Iterate fields in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.schema.names().zip(self.values.iter())
    }

    fn slot(&self, name: &str) -> EngineResult<usize> {
        self.schema
            .slot(name)
            .ok_or_else(|| EngineError::UnknownField {
                class: self.schema.class().to_string(),
                field: name.to_string(),
            })
    }

    fn type_mismatch(&self, name: &str, expected: FieldType, found: &FieldValue) -> EngineError {
        EngineError::FieldTypeMismatch {
            class: self.schema.class().to_string(),
            field: name.to_string(),
            expected,
            found: found.field_type(),
        }
    }
}

fn coerce_field(
    schema: &ComposedSchema,
    name: &str,
    ty: FieldType,
    value: FieldValue,
) -> EngineResult<FieldValue> {
    value
        .coerce(ty)
        .map_err(|value| EngineError::FieldTypeMismatch {
            class: schema.class().to_string(),
            field: name.to_string(),
            expected: ty,
            found: value.field_type(),
        })
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        if !self.schema.config().eq {
            return std::ptr::eq(self, other);
        }
        self.schema.class() == other.schema.class() && self.values == other.values
    }
}

impl PartialOrd for Record {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if !self.schema.config().order || self.schema.class() != other.schema.class() {
            return None;
        }
        self.values.partial_cmp(&other.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDecl, StructuralConfig};

    fn schema(config: Option<StructuralConfig>) -> Arc<ComposedSchema> {
        let fields = [
            FieldDecl {
                name: "location".into(),
                ty: FieldType::Location,
                declared_by: "Item".into(),
            },
            FieldDecl {
                name: "stack_amount".into(),
                ty: FieldType::Int,
                declared_by: "StackableItem".into(),
            },
        ];
        Arc::new(ComposedSchema::compose("Plank", &fields, config, &[]))
    }

    fn plank(schema: &Arc<ComposedSchema>, amount: i64) -> Record {
        Record::new(
            schema.clone(),
            [
                ("location", FieldValue::from(Location::origin())),
                ("stack_amount", FieldValue::Int(amount)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_exact_field_set_required() {
        let schema = schema(None);

        let err = Record::new(
            schema.clone(),
            [("stack_amount", FieldValue::Int(1)), ("colour", "red".into())],
        )
        .unwrap_err();

        assert_eq!(
            err,
            EngineError::SchemaMismatch {
                class: "Plank".into(),
                missing: vec!["location".into()],
                unexpected: vec!["colour".into()],
            }
        );
    }

    #[test]
    fn test_repeated_field_rejected() {
        let schema = schema(None);

        let err = Record::new(
            schema.clone(),
            [
                ("location", FieldValue::from(Location::new(1, 1))),
                ("stack_amount", FieldValue::Int(1)),
                ("location", FieldValue::from(Location::new(9, 9))),
            ],
        )
        .unwrap_err();

        assert_eq!(
            err,
            EngineError::DuplicateField {
                class: "Plank".into(),
                field: "location".into(),
            }
        );
    }

    #[test]
    fn test_typed_access_and_mutation() {
        let schema = schema(None);
        let mut record = plank(&schema, 4);

        assert_eq!(record.get_int("stack_amount").unwrap(), 4);
        record.set("stack_amount", 9).unwrap();
        assert_eq!(record.get_int("stack_amount").unwrap(), 9);

        assert!(matches!(
            record.set("stack_amount", "many"),
            Err(EngineError::FieldTypeMismatch { .. })
        ));
        assert!(matches!(
            record.set("colour", "red"),
            Err(EngineError::UnknownField { .. })
        ));
        assert!(matches!(
            record.get_float("stack_amount"),
            Err(EngineError::FieldTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_frozen_record_rejects_mutation() {
        let schema = schema(Some(StructuralConfig {
            frozen: true,
            ..Default::default()
        }));
        let mut record = plank(&schema, 1);

        assert!(matches!(
            record.set("stack_amount", 2),
            Err(EngineError::FrozenRecord { .. })
        ));
        assert_eq!(record.get_int("stack_amount").unwrap(), 1);
    }

    #[test]
    fn test_value_equality_and_ordering() {
        let schema = schema(Some(StructuralConfig {
            eq: true,
            order: true,
            frozen: false,
        }));
        let a = plank(&schema, 1);
        let b = plank(&schema, 1);
        let c = plank(&schema, 2);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a < c);
    }

    #[test]
    fn test_identity_equality_without_eq() {
        let schema = schema(Some(StructuralConfig {
            eq: false,
            order: false,
            frozen: false,
        }));
        let a = plank(&schema, 1);
        let b = plank(&schema, 1);

        assert_ne!(a, b);
        assert_ne!(a, a.clone());
        assert!(a.eq(&a));
        assert_eq!(a.partial_cmp(&b), None);
    }

    #[test]
    fn test_iter_in_schema_order() {
        let schema = schema(None);
        let record = plank(&schema, 3);
        let names: Vec<_> = record.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["location", "stack_amount"]);
    }
}
