//! Building family: placeable structures and the breakable trait.

use composition_core::{
    EngineResult, EntityId, EventKind, Family, FieldType, FieldValue, Instance, Location,
    TraitLevel,
};
use serde::{Deserialize, Serialize};

/// Root trait level of every building.
pub const BUILDING: &str = "Building";
/// Trait level adding durability with damage and repair.
pub const BREAKABLE_BUILDING: &str = "BreakableBuilding";

/// Events a building can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildingEvent {
    CreateBuilding,
    Place,
    Remove,
    Tick,
    /// Carries the damage amount.
    Damage,
    /// Carries the repair amount.
    Repair,
}

impl EventKind for BuildingEvent {
    fn name(&self) -> &'static str {
        match self {
            BuildingEvent::CreateBuilding => "CreateBuilding",
            BuildingEvent::Place => "Place",
            BuildingEvent::Remove => "Remove",
            BuildingEvent::Tick => "Tick",
            BuildingEvent::Damage => "Damage",
            BuildingEvent::Repair => "Repair",
        }
    }

    fn creation() -> Option<Self> {
        Some(BuildingEvent::CreateBuilding)
    }
}

/// Create the building family with its two abstract trait levels defined.
///
/// Concrete buildings are added with [`Family::define`], extending
/// [`BUILDING`] or [`BREAKABLE_BUILDING`].
pub fn building_family() -> EngineResult<Family<BuildingEvent>> {
    let mut family = Family::new("buildings");

    family.define(
        TraitLevel::new(BUILDING)
            .field("location", FieldType::Location)
            .require("sprite", FieldType::Text)
            .event(BuildingEvent::Place, &[FieldType::Location])
            .event(BuildingEvent::Remove, &[])
            .event(BuildingEvent::CreateBuilding, &[])
            .event(BuildingEvent::Tick, &[FieldType::Float]),
    )?;

    family.define(
        TraitLevel::new(BREAKABLE_BUILDING)
            .extends(BUILDING)
            .field("durability", FieldType::Float)
            .require("max_durability", FieldType::Float)
            .event(BuildingEvent::Damage, &[FieldType::Float])
            .event(BuildingEvent::Repair, &[FieldType::Float]),
    )?;

    Ok(family)
}

/// A building instance.
#[derive(Debug)]
pub struct Building {
    inner: Instance<BuildingEvent>,
}

impl Building {
    /// Construct the named building class.
    pub fn spawn<K, I>(family: &Family<BuildingEvent>, name: &str, values: I) -> EngineResult<Self>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, FieldValue)>,
    {
        family.spawn(name, values).map(Self::from_instance)
    }

    pub fn from_instance(inner: Instance<BuildingEvent>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> EntityId {
        self.inner.id()
    }

    pub fn class_name(&self) -> &str {
        self.inner.class_name()
    }

    pub fn instance(&self) -> &Instance<BuildingEvent> {
        &self.inner
    }

    pub fn instance_mut(&mut self) -> &mut Instance<BuildingEvent> {
        &mut self.inner
    }

    pub fn into_instance(self) -> Instance<BuildingEvent> {
        self.inner
    }

    pub fn location(&self) -> EngineResult<Location> {
        self.inner.record().get_location("location")
    }

    pub fn sprite(&self) -> EngineResult<String> {
        self.inner.capability_text("sprite")
    }

    pub fn is_breakable(&self) -> bool {
        self.inner.is_a(BREAKABLE_BUILDING)
    }

    /// Move the building to `location`, then dispatch `Place`.
    pub fn place(&mut self, location: Location) -> EngineResult<()> {
        self.inner.set("location", location)?;
        self.inner
            .dispatch(BuildingEvent::Place, &[FieldValue::Location(location)])?;
        Ok(())
    }

    /// Dispatch `Remove`; the owner drops the building afterwards.
    pub fn remove(&mut self) -> EngineResult<()> {
        self.inner.dispatch(BuildingEvent::Remove, &[])?;
        Ok(())
    }

    /// Per-frame update driven by the map.
    pub fn tick(&mut self, delta_time: f64) -> EngineResult<()> {
        self.inner
            .dispatch(BuildingEvent::Tick, &[FieldValue::Float(delta_time)])?;
        Ok(())
    }

    pub fn durability(&self) -> EngineResult<f64> {
        self.inner.record().get_float("durability")
    }

    pub fn max_durability(&self) -> EngineResult<f64> {
        self.inner.capability_f64("max_durability")
    }

    /// Subtract `amount` from durability, then dispatch `Damage(amount)`.
    pub fn damage(&mut self, amount: f64) -> EngineResult<()> {
        let durability = self.durability()?;
        self.inner.set("durability", durability - amount)?;
        self.inner
            .dispatch(BuildingEvent::Damage, &[FieldValue::Float(amount)])?;
        Ok(())
    }

    /// Add `amount` to durability, then dispatch `Repair(amount)`.
    pub fn repair(&mut self, amount: f64) -> EngineResult<()> {
        let durability = self.durability()?;
        self.inner.set("durability", durability + amount)?;
        self.inner
            .dispatch(BuildingEvent::Repair, &[FieldValue::Float(amount)])?;
        Ok(())
    }
}
