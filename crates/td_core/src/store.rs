//! Entity storage.
//!
//! Towers, enemies, and projectiles live in separate tables, but share one
//! id counter so an [`EntityId`] is unique across the whole session. Tables
//! are `BTreeMap`s: iteration is always in ascending id order, which is
//! also insertion order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::components::{Enemy, Projectile, Tower};

/// Unique identifier for any entity. Never reused within a session.
pub type EntityId = u64;

/// Anything stored in a [`Table`].
pub trait Identified {
    /// Assign the id chosen by the store.
    fn set_id(&mut self, id: EntityId);
}

/// A single id-ordered collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table<T> {
    rows: BTreeMap<EntityId, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }
}

impl<T> Table<T> {
    fn insert(&mut self, id: EntityId, row: T) {
        self.rows.insert(id, row);
    }

    /// Remove a row by id.
    pub fn remove(&mut self, id: EntityId) -> Option<T> {
        self.rows.remove(&id)
    }

    /// Get a row by id.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.rows.get(&id)
    }

    /// Get a mutable row by id.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        self.rows.get_mut(&id)
    }

    /// Check if a row exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.rows.contains_key(&id)
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Ids in ascending order, collected so the caller may mutate the
    /// table while walking them.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        self.rows.keys().copied().collect()
    }

    /// Iterate rows in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.rows.iter().map(|(id, row)| (*id, row))
    }

    /// Iterate rows mutably in ascending id order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> {
        self.rows.iter_mut().map(|(id, row)| (*id, row))
    }

    /// Iterate row values in ascending id order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }

    /// Remove every row.
    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

/// Storage for every live entity in a session.
///
/// Tables are public fields so systems can borrow two of them at once
/// (towers mutably while reading enemies). Rows can only be added through
/// the store, which hands out ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityStore {
    /// Placed towers.
    pub towers: Table<Tower>,
    /// Enemies on the field.
    pub enemies: Table<Enemy>,
    /// Projectiles in flight.
    pub projectiles: Table<Projectile>,
    next_id: EntityId,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    /// Create an empty store. The first id handed out is 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            towers: Table::default(),
            enemies: Table::default(),
            projectiles: Table::default(),
            next_id: 1,
        }
    }

    fn allocate(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Insert a tower and return its new id.
    pub fn insert_tower(&mut self, tower: Tower) -> EntityId {
        let id = self.allocate();
        insert_row(&mut self.towers, id, tower);
        id
    }

    /// Insert an enemy and return its new id.
    pub fn insert_enemy(&mut self, enemy: Enemy) -> EntityId {
        let id = self.allocate();
        insert_row(&mut self.enemies, id, enemy);
        id
    }

    /// Insert a projectile and return its new id.
    pub fn insert_projectile(&mut self, projectile: Projectile) -> EntityId {
        let id = self.allocate();
        insert_row(&mut self.projectiles, id, projectile);
        id
    }

    /// The id the next insert will receive.
    #[must_use]
    pub const fn peek_next_id(&self) -> EntityId {
        self.next_id
    }
}

fn insert_row<T: Identified>(table: &mut Table<T>, id: EntityId, mut row: T) {
    row.set_id(id);
    table.insert(id, row);
}
