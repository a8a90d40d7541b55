//! # Shader Effects
//!
//! Optional programmable-pipeline layer. While an effect is active every
//! batched draw is submitted once per effect pass, and the currently bound
//! skin is mirrored into the effect's parameters.
//!
//! Parameter handles are looked up by name once, when the effect is
//! activated ([`EffectBindings::lookup`]); rebinding a skin afterwards only
//! sets values through the cached handles.

mod recording;

pub use recording::{EffectCall, RecordingEffect};

use std::any::Any;

use slotmap::{new_key_type, SlotMap};

use crate::device::TextureHandle;
use crate::error::DeviceResult;
use crate::material::{MaterialColors, Skin, MAX_TEXTURE_STAGES};

new_key_type! {
    /// Effect registered with the cache
    pub struct EffectId;
}

/// Effect-local handle of a named parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParameterHandle(pub u32);

/// Texture parameter names, one per texture stage
pub const TEXTURE_PARAMETERS: [&str; MAX_TEXTURE_STAGES] = ["Texture0", "Texture1", "Texture2", "Texture3"];

/// Diffuse color parameter name
pub const DIFFUSE_PARAMETER: &str = "MaterialDiffuse";
/// Ambient color parameter name
pub const AMBIENT_PARAMETER: &str = "MaterialAmbient";
/// Specular color parameter name
pub const SPECULAR_PARAMETER: &str = "MaterialSpecular";
/// Emissive color parameter name
pub const EMISSIVE_PARAMETER: &str = "MaterialEmissive";
/// Specular power parameter name
pub const POWER_PARAMETER: &str = "MaterialPower";

/// A multi-pass shader effect
pub trait Effect {
    /// Debug name
    fn name(&self) -> &str;

    /// Handle of the parameter called `name`, if the effect declares it
    fn parameter(&self, name: &str) -> Option<ParameterHandle>;

    /// Set a texture parameter
    fn set_texture(&mut self, parameter: ParameterHandle, texture: Option<TextureHandle>) -> DeviceResult<()>;

    /// Set a 4-component vector parameter
    fn set_vector(&mut self, parameter: ParameterHandle, value: [f32; 4]) -> DeviceResult<()>;

    /// Set a scalar parameter
    fn set_float(&mut self, parameter: ParameterHandle, value: f32) -> DeviceResult<()>;

    /// Push parameter changes made inside an active pass
    fn commit_changes(&mut self) -> DeviceResult<()>;

    /// Start the effect, returning the number of passes
    fn begin(&mut self) -> DeviceResult<usize>;

    /// Start pass `pass`
    fn begin_pass(&mut self, pass: usize) -> DeviceResult<()>;

    /// Finish the current pass
    fn end_pass(&mut self) -> DeviceResult<()>;

    /// Finish the effect
    fn end(&mut self) -> DeviceResult<()>;

    /// Downcast support for inspecting concrete effects
    fn as_any(&self) -> &dyn Any;
}

/// Registry of effects owned by the cache manager
#[derive(Default)]
pub struct EffectTable {
    effects: SlotMap<EffectId, Box<dyn Effect>>,
}

impl EffectTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of an effect
    pub fn register(&mut self, effect: Box<dyn Effect>) -> EffectId {
        let name = effect.name().to_string();
        let id = self.effects.insert(effect);
        log::debug!("Registered effect '{}' as {:?}", name, id);
        id
    }

    /// Remove an effect, returning it
    pub fn remove(&mut self, id: EffectId) -> Option<Box<dyn Effect>> {
        self.effects.remove(id)
    }

    /// Borrow an effect
    pub fn get(&self, id: EffectId) -> Option<&dyn Effect> {
        self.effects.get(id).map(|effect| effect.as_ref())
    }

    /// Mutably borrow an effect
    pub fn get_mut(&mut self, id: EffectId) -> Option<&mut (dyn Effect + 'static)> {
        self.effects.get_mut(id).map(|effect| effect.as_mut())
    }

    /// Whether `id` is registered
    pub fn contains(&self, id: EffectId) -> bool {
        self.effects.contains_key(id)
    }

    /// Number of registered effects
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// Whether no effect is registered
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

/// Effect currently wrapping batched draws, with its cached parameter handles
pub(crate) struct ActiveEffect<'a> {
    pub effect: &'a mut (dyn Effect + 'static),
    pub bindings: &'a EffectBindings,
}

impl ActiveEffect<'_> {
    /// Run `submit` once inside every pass of the effect
    ///
    /// `end` is always called once `begin` succeeded; the first error wins.
    pub fn for_each_pass<F>(&mut self, mut submit: F) -> DeviceResult<()>
    where
        F: FnMut() -> DeviceResult<()>,
    {
        let passes = self.effect.begin()?;
        let effect = &mut *self.effect;
        let result = (0..passes).try_for_each(|pass| {
            effect.begin_pass(pass)?;
            let drawn = submit();
            let ended = effect.end_pass();
            drawn.and(ended)
        });
        let ended = effect.end();
        if let (Err(_), Err(end_error)) = (&result, &ended) {
            log::warn!("Effect '{}' failed to end after a pass error: {}", effect.name(), end_error);
        }
        result.and(ended)
    }

    /// Mirror `skin` into the effect parameters
    pub fn apply(&mut self, skin: Option<&Skin>) -> DeviceResult<()> {
        self.bindings.apply(&mut *self.effect, skin)
    }
}

/// Parameter handles looked up once per effect activation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EffectBindings {
    textures: [Option<ParameterHandle>; MAX_TEXTURE_STAGES],
    diffuse: Option<ParameterHandle>,
    ambient: Option<ParameterHandle>,
    specular: Option<ParameterHandle>,
    emissive: Option<ParameterHandle>,
    power: Option<ParameterHandle>,
}

impl EffectBindings {
    /// Resolve every well-known parameter name against `effect`
    pub fn lookup(effect: &dyn Effect) -> Self {
        let bindings = Self {
            textures: TEXTURE_PARAMETERS.map(|name| effect.parameter(name)),
            diffuse: effect.parameter(DIFFUSE_PARAMETER),
            ambient: effect.parameter(AMBIENT_PARAMETER),
            specular: effect.parameter(SPECULAR_PARAMETER),
            emissive: effect.parameter(EMISSIVE_PARAMETER),
            power: effect.parameter(POWER_PARAMETER),
        };
        log::trace!("Effect '{}' bindings: {:?}", effect.name(), bindings);
        bindings
    }

    /// Whether the effect declares none of the skin parameters
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Mirror `skin` (or the empty skin for `None`) into the effect
    pub fn apply(&self, effect: &mut dyn Effect, skin: Option<&Skin>) -> DeviceResult<()> {
        if self.is_empty() {
            return Ok(());
        }
        let (textures, colors) = match skin {
            Some(skin) => (skin.textures, skin.colors),
            None => ([None; MAX_TEXTURE_STAGES], MaterialColors::WHITE),
        };

        for (parameter, texture) in self.textures.iter().zip(textures) {
            if let Some(parameter) = parameter {
                effect.set_texture(*parameter, texture)?;
            }
        }
        let vectors = [
            (self.diffuse, colors.diffuse),
            (self.ambient, colors.ambient),
            (self.specular, colors.specular),
            (self.emissive, colors.emissive),
        ];
        for (parameter, value) in vectors {
            if let Some(parameter) = parameter {
                effect.set_vector(parameter, value)?;
            }
        }
        if let Some(parameter) = self.power {
            effect.set_float(parameter, colors.power)?;
        }
        effect.commit_changes()
    }
}
