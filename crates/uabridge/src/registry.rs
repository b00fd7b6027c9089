// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Ordered item registry.
//!
//! Items get sequential indices in registration order and are never removed
//! or moved, so an index stays valid, and keeps naming the same item, for the
//! lifetime of the registry.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::config::ItemDefaults;
use crate::error::{BridgeResult, ItemError};
use crate::item::{Item, ItemDefinition, ItemIndex, ItemSettings, MAX_PATH_LEN};

/// Owns every registered item.
#[derive(Debug)]
pub struct ItemRegistry {
    items: RwLock<Vec<Arc<Item>>>,
    defaults: ItemDefaults,
}

impl ItemRegistry {
    /// Creates an empty registry applying the given defaults.
    pub fn new(defaults: ItemDefaults) -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            defaults,
        }
    }

    /// Process-wide item defaults.
    pub fn defaults(&self) -> &ItemDefaults {
        &self.defaults
    }

    /// Registers an item and returns its index.
    ///
    /// Registration never contacts the server. The path is only checked for
    /// length here; its syntax is checked at resolution time.
    pub fn register(&self, definition: ItemDefinition) -> BridgeResult<ItemIndex> {
        if definition.path.len() > MAX_PATH_LEN {
            warn!(
                path = %definition.path,
                len = definition.path.len(),
                "Item path too long, registration rejected"
            );
            return Err(ItemError::PathTooLong {
                len: definition.path.len(),
                max: MAX_PATH_LEN,
            }
            .into());
        }
        if definition.array_capacity == Some(0) {
            return Err(ItemError::ZeroCapacity {
                path: definition.path,
            }
            .into());
        }

        let settings = ItemSettings::resolve(&definition.options, definition.scan, &self.defaults);
        let mut items = self.items.write();
        let index = ItemIndex::new(items.len() as u32);
        debug!(
            index = %index,
            item = %definition.name,
            path = %definition.path,
            "Item registered"
        );
        items.push(Arc::new(Item::new(index, definition, settings)));
        Ok(index)
    }

    /// Returns the item at `index`.
    pub fn get(&self, index: ItemIndex) -> BridgeResult<Arc<Item>> {
        self.items
            .read()
            .get(index.as_usize())
            .cloned()
            .ok_or_else(|| ItemError::UnknownIndex { index }.into())
    }

    /// Returns the item at `index`, if any.
    pub fn try_get(&self, index: ItemIndex) -> Option<Arc<Item>> {
        self.items.read().get(index.as_usize()).cloned()
    }

    /// Number of registered items.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Returns every item in index order.
    ///
    /// The registry lock is released before the caller touches any item.
    pub fn snapshot(&self) -> Vec<Arc<Item>> {
        self.items.read().clone()
    }
}

impl Default for ItemRegistry {
    fn default() -> Self {
        Self::new(ItemDefaults::default())
    }
}
