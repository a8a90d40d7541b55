//! # Materials and Skins
//!
//! A *skin* is a bound combination of up to [`MAX_TEXTURE_STAGES`] textures
//! and fixed-function material colors. Skins are identified by an opaque
//! [`MaterialKey`] handed out by a [`SkinProvider`]; the render cache only
//! ever resolves keys, it never creates skins itself.
//!
//! [`SkinTable`] is the in-memory provider used by the engine and the tests.
//! [`MaterialBinder`] applies skins to the device with redundant rebinds
//! filtered out.

mod binder;
mod skin_table;

pub use binder::MaterialBinder;
pub use skin_table::SkinTable;

use crate::device::TextureHandle;

/// Number of fixed-function texture stages a skin can bind
pub const MAX_TEXTURE_STAGES: usize = 4;

/// Opaque identity of a skin
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaterialKey(pub u32);

impl MaterialKey {
    /// Sentinel meaning "no material"
    pub const NONE: Self = Self(u32::MAX);

    /// Whether this is the "no material" sentinel
    pub const fn is_none(self) -> bool {
        self.0 == Self::NONE.0
    }
}

/// Fixed-function material colors, RGBA in 0..=1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialColors {
    /// Diffuse reflectance
    pub diffuse: [f32; 4],
    /// Ambient reflectance
    pub ambient: [f32; 4],
    /// Specular reflectance
    pub specular: [f32; 4],
    /// Emitted color
    pub emissive: [f32; 4],
    /// Specular exponent
    pub power: f32,
}

impl MaterialColors {
    /// Unlit white material
    pub const WHITE: Self = Self {
        diffuse: [1.0, 1.0, 1.0, 1.0],
        ambient: [1.0, 1.0, 1.0, 1.0],
        specular: [0.0, 0.0, 0.0, 0.0],
        emissive: [0.0, 0.0, 0.0, 0.0],
        power: 0.0,
    };

    /// Diffuse + ambient of `color`, no highlights
    pub const fn solid(color: [f32; 4]) -> Self {
        Self {
            diffuse: color,
            ambient: color,
            ..Self::WHITE
        }
    }

    /// Set the specular color and exponent
    pub fn with_specular(mut self, specular: [f32; 4], power: f32) -> Self {
        self.specular = specular;
        self.power = power;
        self
    }

    /// Set the emitted color
    pub fn with_emissive(mut self, emissive: [f32; 4]) -> Self {
        self.emissive = emissive;
        self
    }
}

impl Default for MaterialColors {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Textures + colors bound together for a draw
#[derive(Debug, Clone, PartialEq)]
pub struct Skin {
    /// Texture per fixed-function stage
    pub textures: [Option<TextureHandle>; MAX_TEXTURE_STAGES],
    /// Material colors
    pub colors: MaterialColors,
}

impl Skin {
    /// Untextured skin with the given colors
    pub const fn untextured(colors: MaterialColors) -> Self {
        Self {
            textures: [None; MAX_TEXTURE_STAGES],
            colors,
        }
    }

    /// White skin with a single base texture
    pub fn textured(texture: TextureHandle) -> Self {
        Self::untextured(MaterialColors::WHITE).with_texture(0, texture)
    }

    /// Bind `texture` at `stage`
    ///
    /// Stages beyond [`MAX_TEXTURE_STAGES`] are ignored.
    pub fn with_texture(mut self, stage: usize, texture: TextureHandle) -> Self {
        if stage < MAX_TEXTURE_STAGES {
            self.textures[stage] = Some(texture);
        }
        self
    }
}

impl Default for Skin {
    fn default() -> Self {
        Self::untextured(MaterialColors::WHITE)
    }
}

/// Resolves material keys to skins
pub trait SkinProvider {
    /// Skin registered under `key`, if any
    fn resolve(&self, key: MaterialKey) -> Option<&Skin>;

    /// Whether `key` can be bound; the sentinel always can
    fn contains(&self, key: MaterialKey) -> bool {
        key.is_none() || self.resolve(key).is_some()
    }
}
