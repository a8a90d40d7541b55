//! # Render Cache
//!
//! Material-sorted batching between scene code and a low-level graphics
//! device. Callers submit raw vertex/index payloads or ranges of pre-uploaded
//! static buffers; the cache groups them per (vertex layout, material,
//! primitive kind), streams them into fixed-capacity buffers and submits
//! each group with as few state changes and draw calls as possible.
//!
//! ## Quick Start
//!
//! ```rust
//! use render_cache::prelude::*;
//!
//! fn main() -> Result<(), CacheError> {
//!     let mut skins = SkinTable::new();
//!     let skin = skins.register(Skin::textured(TextureHandle(1)));
//!     let mut cache = CacheManager::new(RecordingDevice::new(), skins, CacheConfig::default())?;
//!
//!     let triangle = [
//!         PositionVertex { position: [0.0, 0.0, 0.0] },
//!         PositionVertex { position: [1.0, 0.0, 0.0] },
//!         PositionVertex { position: [0.0, 1.0, 0.0] },
//!     ];
//!     cache.begin_frame();
//!     cache.render_vertices(PrimitiveKind::TriangleList, skin, &triangle, None)?;
//!     cache.render_vertices(PrimitiveKind::TriangleList, skin, &triangle, None)?;
//!     let stats = cache.end_frame()?;
//!     assert_eq!(stats.draw_calls, 1);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]

pub mod cache;
pub mod config;
pub mod device;
pub mod effect;
pub mod error;
pub mod material;
pub mod vertex;

pub use cache::{CacheManager, CacheStats};
pub use config::CacheConfig;
pub use error::{CacheError, CacheResult, DeviceError, DeviceResult};

/// Common imports for cache users
pub mod prelude {
    pub use crate::{
        cache::{CacheManager, CacheStats, StaticBufferId, StaticDraw, StaticIndices},
        config::{CacheConfig, Config},
        device::{GraphicsDevice, RecordingDevice, RenderState, TextureHandle, TransformState},
        effect::{Effect, EffectId},
        error::{CacheError, CacheResult, DeviceError, DeviceResult},
        material::{MaterialColors, MaterialKey, Skin, SkinProvider, SkinTable},
        vertex::{ColorVertex, ModelVertex, PositionVertex, PrimitiveKind, ScreenVertex, TerrainVertex, Vertex, VertexLayout},
    };
}
