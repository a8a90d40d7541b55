//! In-memory skin registry
//!
//! Keys are dense indices assigned in registration order. Registering a skin
//! equal to an existing one returns the existing key, so each distinct
//! texture-set + material pairing has exactly one key.

use super::{MaterialKey, Skin, SkinProvider};
use crate::error::{CacheError, CacheResult};

/// Dense, deduplicating [`SkinProvider`]
#[derive(Debug, Default, Clone)]
pub struct SkinTable {
    skins: Vec<Skin>,
}

impl SkinTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a skin and return its key
    pub fn register(&mut self, skin: Skin) -> MaterialKey {
        if let Some(index) = self.skins.iter().position(|existing| *existing == skin) {
            return MaterialKey(index as u32);
        }
        let key = MaterialKey(self.skins.len() as u32);
        log::trace!("Registered skin {:?}", key);
        self.skins.push(skin);
        key
    }

    /// Replace the skin behind an existing key
    pub fn update(&mut self, key: MaterialKey, skin: Skin) -> CacheResult<()> {
        let slot = self
            .skins
            .get_mut(key.0 as usize)
            .ok_or(CacheError::UnknownMaterial(key))?;
        *slot = skin;
        Ok(())
    }

    /// Number of registered skins
    pub fn len(&self) -> usize {
        self.skins.len()
    }

    /// Whether no skin is registered
    pub fn is_empty(&self) -> bool {
        self.skins.is_empty()
    }

    /// All registered skins with their keys
    pub fn iter(&self) -> impl Iterator<Item = (MaterialKey, &Skin)> {
        self.skins
            .iter()
            .enumerate()
            .map(|(index, skin)| (MaterialKey(index as u32), skin))
    }
}

impl SkinProvider for SkinTable {
    fn resolve(&self, key: MaterialKey) -> Option<&Skin> {
        if key.is_none() {
            return None;
        }
        self.skins.get(key.0 as usize)
    }
}
