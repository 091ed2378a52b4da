//! Content definitions - concrete classes declared in TOML.
//!
//! Data can add fields and constant capabilities to a class, but not
//! handlers. Every entry goes through [`Family::define`], so names, bases and
//! capability types are validated exactly as for classes defined in code.

use composition_core::{EventKind, Family, FieldType, FieldValue, TraitLevel};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::buildings::BuildingEvent;
use crate::error::ContentError;
use crate::items::ItemEvent;

/// One class entry in a content file.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassSpec {
    pub name: String,
    /// Direct bases in declaration order.
    #[serde(default)]
    pub extends: Vec<String>,
    /// Extra fields, declared in name order.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldType>,
    /// Constant capabilities.
    #[serde(default)]
    pub provides: BTreeMap<String, FieldValue>,
}

impl ClassSpec {
    /// Turn the entry into a trait level for any family.
    pub fn to_level<E: EventKind>(&self) -> TraitLevel<E> {
        let mut level = TraitLevel::new(self.name.clone());
        for base in &self.extends {
            level = level.extends(base.clone());
        }
        for (name, ty) in &self.fields {
            level = level.field(name.clone(), *ty);
        }
        for (name, value) in &self.provides {
            level = level.provide(name.clone(), value.clone());
        }
        level
    }
}

/// A whole content file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentConfig {
    #[serde(default)]
    pub buildings: Vec<ClassSpec>,
    #[serde(default)]
    pub items: Vec<ClassSpec>,
}

impl ContentConfig {
    /// Parse content from a TOML string.
    pub fn from_toml_str(source: &str) -> Result<Self, ContentError> {
        Ok(toml::from_str(source)?)
    }

    /// Read and parse a TOML content file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ContentError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Define every entry in its family, in file order.
    ///
    /// Stops at the first failing entry; entries before it stay defined.
    pub fn apply(
        &self,
        buildings: &mut Family<BuildingEvent>,
        items: &mut Family<ItemEvent>,
    ) -> Result<(), ContentError> {
        define_all(buildings, &self.buildings)?;
        define_all(items, &self.items)?;
        log::info!(
            "loaded content: {} buildings, {} items",
            self.buildings.len(),
            self.items.len()
        );
        Ok(())
    }
}

fn define_all<E: EventKind>(family: &mut Family<E>, specs: &[ClassSpec]) -> Result<(), ContentError> {
    for spec in specs {
        family.define(spec.to_level())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buildings::{building_family, Building};
    use crate::items::{item_family, Item};
    use composition_core::{EngineError, Location};

    const CONTENT: &str = r#"
        [[buildings]]
        name = "WoodenWall"
        extends = ["BreakableBuilding"]
        [buildings.provides]
        sprite = "wall_wood"
        max_durability = 100

        [[items]]
        name = "Plank"
        extends = ["StackableItem"]
        [items.fields]
        quality = "int"
        [items.provides]
        sprite = "plank"
        unit_weight = 2.5
        max_stack_amount = 50
    "#;

    #[test]
    fn test_parse_content() {
        let config = ContentConfig::from_toml_str(CONTENT).unwrap();
        assert_eq!(config.buildings.len(), 1);
        assert_eq!(config.items[0].extends, vec!["StackableItem"]);
        assert_eq!(config.items[0].fields.get("quality"), Some(&FieldType::Int));
        assert_eq!(
            config.items[0].provides.get("unit_weight"),
            Some(&FieldValue::Float(2.5))
        );
    }

    #[test]
    fn test_apply_registers_classes() {
        let mut buildings = building_family().unwrap();
        let mut items = item_family().unwrap();
        ContentConfig::from_toml_str(CONTENT)
            .unwrap()
            .apply(&mut buildings, &mut items)
            .unwrap();

        let wall = Building::spawn(
            &buildings,
            "WoodenWall",
            [
                ("location", FieldValue::Location(Location::origin())),
                ("durability", FieldValue::Float(100.0)),
            ],
        )
        .unwrap();
        assert_eq!(wall.max_durability().unwrap(), 100.0);

        let plank = Item::spawn(
            &items,
            "Plank",
            [
                ("location", FieldValue::Location(Location::origin())),
                ("stack_amount", FieldValue::Int(4)),
                ("quality", FieldValue::Int(2)),
            ],
        )
        .unwrap();
        assert_eq!(plank.weight().unwrap(), 10.0);
        assert_eq!(plank.max_stack_amount().unwrap(), 50);
    }

    #[test]
    fn test_unknown_base_reported() {
        let config = ContentConfig::from_toml_str(
            r#"
            [[items]]
            name = "Ghost"
            extends = ["Spirit"]
            "#,
        )
        .unwrap();
        let mut buildings = building_family().unwrap();
        let mut items = item_family().unwrap();

        let err = config.apply(&mut buildings, &mut items).unwrap_err();
        assert!(matches!(
            err,
            ContentError::Engine(EngineError::UnknownClass { .. })
        ));
    }

    #[test]
    fn test_duplicate_entry_reported() {
        let config = ContentConfig::from_toml_str(
            r#"
            [[buildings]]
            name = "Hut"
            extends = ["Building"]
            provides = { sprite = "hut" }

            [[buildings]]
            name = "Hut"
            extends = ["Building"]
            provides = { sprite = "hut2" }
            "#,
        )
        .unwrap();
        let mut buildings = building_family().unwrap();
        let mut items = item_family().unwrap();

        let err = config.apply(&mut buildings, &mut items).unwrap_err();
        assert!(matches!(
            err,
            ContentError::Engine(EngineError::DuplicateRegistration { .. })
        ));
        assert_eq!(buildings.names().collect::<Vec<_>>(), vec!["Hut"]);
    }

    #[test]
    fn test_bad_field_type_rejected() {
        let result = ContentConfig::from_toml_str(
            r#"
            [[items]]
            name = "Odd"
            fields = { colour = "rgb" }
            "#,
        );
        assert!(matches!(result, Err(ContentError::Parse(_))));
    }
}
