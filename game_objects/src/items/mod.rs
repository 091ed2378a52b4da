//! Item family: carried objects with weight, and the stackable trait.

use composition_core::{
    EngineResult, EntityId, EventKind, Family, FieldType, FieldValue, Instance, Location,
    TraitLevel,
};
use serde::{Deserialize, Serialize};

/// Root trait level of every item.
pub const ITEM: &str = "Item";
/// Trait level for items held in stacks.
pub const STACKABLE_ITEM: &str = "StackableItem";

/// Events an item can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemEvent {
    CreateItem,
    PickUp,
    Drop,
    Tick,
    /// Carries the amount actually added.
    AddAmount,
    /// Carries the amount actually removed.
    RemoveAmount,
}

impl EventKind for ItemEvent {
    fn name(&self) -> &'static str {
        match self {
            ItemEvent::CreateItem => "CreateItem",
            ItemEvent::PickUp => "PickUp",
            ItemEvent::Drop => "Drop",
            ItemEvent::Tick => "Tick",
            ItemEvent::AddAmount => "AddAmount",
            ItemEvent::RemoveAmount => "RemoveAmount",
        }
    }

    fn creation() -> Option<Self> {
        Some(ItemEvent::CreateItem)
    }
}

/// Create the item family with its two abstract trait levels defined.
pub fn item_family() -> EngineResult<Family<ItemEvent>> {
    let mut family = Family::new("items");

    family.define(
        TraitLevel::new(ITEM)
            .field("location", FieldType::Location)
            .require("sprite", FieldType::Text)
            // Unit weight for single items.
            .require("weight", FieldType::Float)
            .event(ItemEvent::PickUp, &[])
            .event(ItemEvent::Drop, &[FieldType::Location])
            .event(ItemEvent::CreateItem, &[])
            .event(ItemEvent::Tick, &[FieldType::Float]),
    )?;

    family.define(
        TraitLevel::new(STACKABLE_ITEM)
            .extends(ITEM)
            .field("stack_amount", FieldType::Int)
            .require("max_stack_amount", FieldType::Int)
            .require("unit_weight", FieldType::Float)
            .event(ItemEvent::AddAmount, &[FieldType::Int])
            .event(ItemEvent::RemoveAmount, &[FieldType::Int])
            .provide_computed("weight", |item| {
                let amount = item.record().get_int("stack_amount")?;
                let unit_weight = item.capability_f64("unit_weight")?;
                Ok(FieldValue::Float(amount as f64 * unit_weight))
            }),
    )?;

    Ok(family)
}

/// An item instance.
#[derive(Debug)]
pub struct Item {
    inner: Instance<ItemEvent>,
}

impl Item {
    /// Construct the named item class.
    pub fn spawn<K, I>(family: &Family<ItemEvent>, name: &str, values: I) -> EngineResult<Self>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, FieldValue)>,
    {
        family.spawn(name, values).map(Self::from_instance)
    }

    pub fn from_instance(inner: Instance<ItemEvent>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> EntityId {
        self.inner.id()
    }

    pub fn class_name(&self) -> &str {
        self.inner.class_name()
    }

    pub fn instance(&self) -> &Instance<ItemEvent> {
        &self.inner
    }

    pub fn instance_mut(&mut self) -> &mut Instance<ItemEvent> {
        &mut self.inner
    }

    pub fn location(&self) -> EngineResult<Location> {
        self.inner.record().get_location("location")
    }

    pub fn sprite(&self) -> EngineResult<String> {
        self.inner.capability_text("sprite")
    }

    pub fn is_stackable(&self) -> bool {
        self.inner.is_a(STACKABLE_ITEM)
    }

    /// Weight as resolved by the class: fixed, or per-unit times stack size.
    pub fn weight(&self) -> EngineResult<f64> {
        self.inner.capability_f64("weight")
    }

    pub fn total_weight(&self) -> EngineResult<f64> {
        self.weight()
    }

    pub fn unit_weight(&self) -> EngineResult<f64> {
        self.inner.capability_f64("unit_weight")
    }

    pub fn stack_amount(&self) -> EngineResult<i64> {
        self.inner.record().get_int("stack_amount")
    }

    pub fn max_stack_amount(&self) -> EngineResult<i64> {
        self.inner.capability_i64("max_stack_amount")
    }

    pub fn pick_up(&mut self) -> EngineResult<()> {
        self.inner.dispatch(ItemEvent::PickUp, &[])?;
        Ok(())
    }

    /// Put the item down at `location`, then dispatch `Drop`.
    pub fn drop_at(&mut self, location: Location) -> EngineResult<()> {
        self.inner.set("location", location)?;
        self.inner
            .dispatch(ItemEvent::Drop, &[FieldValue::Location(location)])?;
        Ok(())
    }

    pub fn tick(&mut self, delta_time: f64) -> EngineResult<()> {
        self.inner
            .dispatch(ItemEvent::Tick, &[FieldValue::Float(delta_time)])?;
        Ok(())
    }

    /// Grow the stack by up to `amount` without exceeding the maximum.
    ///
    /// Dispatches `AddAmount` with, and returns, the amount actually added.
    pub fn add_amount(&mut self, amount: u32) -> EngineResult<u32> {
        let current = self.stack_amount()?;
        let room = (self.max_stack_amount()? - current).max(0);
        let added = i64::from(amount).min(room);
        self.inner.set("stack_amount", current + added)?;
        self.inner
            .dispatch(ItemEvent::AddAmount, &[FieldValue::Int(added)])?;
        Ok(added as u32)
    }

    /// Shrink the stack by up to `amount`, never below zero.
    ///
    /// Dispatches `RemoveAmount` with, and returns, the amount actually removed.
    pub fn remove_amount(&mut self, amount: u32) -> EngineResult<u32> {
        let current = self.stack_amount()?;
        let removed = i64::from(amount).min(current.max(0));
        self.inner.set("stack_amount", current - removed)?;
        self.inner
            .dispatch(ItemEvent::RemoveAmount, &[FieldValue::Int(removed)])?;
        Ok(removed as u32)
    }
}
