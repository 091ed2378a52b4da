//! Entity collection - the buildings and items a map owns.

use std::collections::HashMap;

use composition_core::{EngineResult, EntityId, Location};

use crate::buildings::Building;
use crate::items::Item;

/// All game objects currently alive on one map.
///
/// Removing an object only drops it from the collection; the caller decides
/// whether to dispatch `Remove` first.
#[derive(Debug, Default)]
pub struct EntityCollection {
    buildings: HashMap<EntityId, Building>,
    items: HashMap<EntityId, Item>,
}

impl EntityCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a building to the collection.
    pub fn add_building(&mut self, building: Building) -> EntityId {
        let id = building.id();
        self.buildings.insert(id, building);
        id
    }

    /// Add an item to the collection.
    pub fn add_item(&mut self, item: Item) -> EntityId {
        let id = item.id();
        self.items.insert(id, item);
        id
    }

    pub fn building(&self, id: EntityId) -> Option<&Building> {
        self.buildings.get(&id)
    }

    pub fn building_mut(&mut self, id: EntityId) -> Option<&mut Building> {
        self.buildings.get_mut(&id)
    }

    pub fn item(&self, id: EntityId) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn item_mut(&mut self, id: EntityId) -> Option<&mut Item> {
        self.items.get_mut(&id)
    }

    pub fn remove_building(&mut self, id: EntityId) -> Option<Building> {
        self.buildings.remove(&id)
    }

    pub fn remove_item(&mut self, id: EntityId) -> Option<Item> {
        self.items.remove(&id)
    }

    /// Get all items lying on a tile.
    pub fn items_at(&self, location: Location) -> Vec<EntityId> {
        self.items
            .iter()
            .filter(|(_, item)| item.location().ok() == Some(location))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Get the building occupying a tile, if any.
    pub fn building_at(&self, location: Location) -> Option<EntityId> {
        self.buildings
            .iter()
            .find(|(_, building)| building.location().ok() == Some(location))
            .map(|(id, _)| *id)
    }

    /// Total number of objects.
    pub fn len(&self) -> usize {
        self.buildings.len() + self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buildings.is_empty() && self.items.is_empty()
    }

    /// Advance every object by `delta_time` seconds.
    ///
    /// Stops at the first object whose tick fails.
    pub fn tick(&mut self, delta_time: f64) -> EngineResult<()> {
        for building in self.buildings.values_mut() {
            building.tick(delta_time)?;
        }
        for item in self.items.values_mut() {
            item.tick(delta_time)?;
        }
        Ok(())
    }
}
