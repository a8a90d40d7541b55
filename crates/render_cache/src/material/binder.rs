//! Equality-gated skin binding

use super::{MaterialColors, MaterialKey, SkinProvider, MAX_TEXTURE_STAGES};
use crate::device::GraphicsDevice;
use crate::effect::ActiveEffect;
use crate::error::{CacheError, CacheResult};

/// Tracks the skin bound on the device and skips redundant rebinds
///
/// A fresh binder assumes the "no material" state, matching a device with no
/// textures bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialBinder {
    /// `None` when a bind failed halfway and the device state is unknown
    current: Option<MaterialKey>,
}

impl Default for MaterialBinder {
    fn default() -> Self {
        Self {
            current: Some(MaterialKey::NONE),
        }
    }
}

impl MaterialBinder {
    /// Create a binder in the "no material" state
    pub fn new() -> Self {
        Self::default()
    }

    /// Key currently bound on the device, if known
    pub fn current(&self) -> Option<MaterialKey> {
        self.current
    }

    /// Forget the bound key so the next [`bind`](Self::bind) always reaches the device
    pub fn invalidate(&mut self) {
        self.current = None;
    }

    /// Bind `key`, returning whether any device call was made
    ///
    /// The key is resolved before the device is touched, so an unknown key
    /// leaves both the device and the tracked state unchanged.
    pub(crate) fn bind(
        &mut self,
        key: MaterialKey,
        device: &mut dyn GraphicsDevice,
        skins: &dyn SkinProvider,
        effect: Option<&mut ActiveEffect<'_>>,
    ) -> CacheResult<bool> {
        if self.current == Some(key) {
            return Ok(false);
        }
        let skin = if key.is_none() {
            None
        } else {
            Some(skins.resolve(key).ok_or(CacheError::UnknownMaterial(key))?)
        };

        self.current = None;
        let (textures, colors) = match skin {
            Some(skin) => (skin.textures, skin.colors),
            None => ([None; MAX_TEXTURE_STAGES], MaterialColors::WHITE),
        };
        for (stage, texture) in textures.into_iter().enumerate() {
            device.set_texture(stage, texture)?;
        }
        device.set_material(&colors)?;
        if let Some(active) = effect {
            active.apply(skin)?;
        }

        log::trace!("Bound material {:?}", key);
        self.current = Some(key);
        Ok(true)
    }

    /// Push the bound skin into a newly activated effect
    pub(crate) fn refresh_effect(&self, skins: &dyn SkinProvider, effect: &mut ActiveEffect<'_>) -> CacheResult<()> {
        match self.current {
            Some(key) if key.is_none() => Ok(effect.apply(None)?),
            Some(key) => {
                let skin = skins.resolve(key).ok_or(CacheError::UnknownMaterial(key))?;
                Ok(effect.apply(Some(skin))?)
            }
            None => Ok(()),
        }
    }
}
