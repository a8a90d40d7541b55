//! # Graphics Device Abstraction
//!
//! The narrow device interface the render cache is written against. A
//! concrete backend (D3D-style fixed-function device, a GL wrapper, or the
//! headless [`RecordingDevice`]) implements [`GraphicsDevice`]; the cache
//! never sees anything else of the backend.
//!
//! ## Streaming buffers
//!
//! Dynamic buffers are shared with in-flight GPU reads, so writes go through
//! [`LockMode`]:
//!
//! - [`LockMode::Discard`]: the whole buffer may be orphaned. Only valid when
//!   writing from offset zero.
//! - [`LockMode::NoOverwrite`]: append-only; the caller promises not to touch
//!   any range the GPU may still read.
//! - [`LockMode::None`]: plain lock, used for one-off static uploads.

mod recording;

pub use recording::{DeviceCall, RecordingDevice};

use nalgebra::Matrix4;
use slotmap::new_key_type;

use crate::error::{DeviceError, DeviceResult};
use crate::material::MaterialColors;
use crate::vertex::{PrimitiveKind, VertexDeclaration};

new_key_type! {
    /// Device vertex or index buffer
    pub struct BufferHandle;

    /// Device vertex declaration object
    pub struct DeclarationHandle;
}

/// Device texture, owned by the material collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

/// Expected update frequency of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Rewritten every frame through discard/no-overwrite locks
    Dynamic,
    /// Written once, drawn many times
    Static,
}

/// How a buffer range is locked for writing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Orphan the whole buffer; the previous contents are discarded
    Discard,
    /// Append without overwriting data the GPU may still be reading
    NoOverwrite,
    /// Plain lock with no streaming hint
    None,
}

/// Fixed-function transform slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformState {
    /// Object to world
    World,
    /// World to camera
    View,
    /// Camera to clip
    Projection,
}

/// Global render states that invalidate pending batched geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderState {
    /// Alpha blending on/off
    AlphaBlendEnable,
    /// Source blend factor
    SrcBlend,
    /// Destination blend factor
    DestBlend,
    /// Alpha testing on/off
    AlphaTestEnable,
    /// Alpha test reference value
    AlphaRef,
    /// Depth testing on/off
    ZEnable,
    /// Depth writes on/off
    ZWriteEnable,
    /// Face culling mode
    CullMode,
    /// Fixed-function lighting on/off
    Lighting,
    /// Solid / wireframe / point fill
    FillMode,
    /// Fog on/off
    FogEnable,
}

/// Low-level graphics device used by the render cache
///
/// All methods are called from the render thread only.
pub trait GraphicsDevice {
    /// Create a vertex buffer of `size_bytes`
    fn create_vertex_buffer(&mut self, size_bytes: usize, usage: BufferUsage) -> DeviceResult<BufferHandle>;

    /// Create a 16-bit index buffer of `size_bytes`
    fn create_index_buffer(&mut self, size_bytes: usize, usage: BufferUsage) -> DeviceResult<BufferHandle>;

    /// Release a buffer; unknown handles are ignored
    fn release_buffer(&mut self, handle: BufferHandle);

    /// Lock `size` bytes at `offset` for writing
    fn lock(&mut self, handle: BufferHandle, offset: usize, size: usize, mode: LockMode) -> DeviceResult<&mut [u8]>;

    /// Unlock a previously locked buffer
    fn unlock(&mut self, handle: BufferHandle) -> DeviceResult<()>;

    /// Create the device object for a vertex declaration
    fn create_vertex_declaration(&mut self, declaration: &VertexDeclaration) -> DeviceResult<DeclarationHandle>;

    /// Bind a vertex declaration
    fn set_vertex_declaration(&mut self, declaration: DeclarationHandle) -> DeviceResult<()>;

    /// Bind a vertex buffer to stream 0
    fn set_stream_source(&mut self, handle: BufferHandle, stride: usize) -> DeviceResult<()>;

    /// Bind an index buffer
    fn set_indices(&mut self, handle: BufferHandle) -> DeviceResult<()>;

    /// Draw non-indexed primitives from the bound stream
    fn draw_primitive(&mut self, kind: PrimitiveKind, start_vertex: usize, primitive_count: usize) -> DeviceResult<()>;

    /// Draw indexed primitives from the bound stream and index buffer
    fn draw_indexed_primitive(
        &mut self,
        kind: PrimitiveKind,
        base_vertex: usize,
        min_index: usize,
        num_vertices: usize,
        start_index: usize,
        primitive_count: usize,
    ) -> DeviceResult<()>;

    /// Bind a texture to a fixed-function stage
    fn set_texture(&mut self, stage: usize, texture: Option<TextureHandle>) -> DeviceResult<()>;

    /// Set fixed-function material colors
    fn set_material(&mut self, colors: &MaterialColors) -> DeviceResult<()>;

    /// Set a transform matrix
    fn set_transform(&mut self, state: TransformState, matrix: &Matrix4<f32>) -> DeviceResult<()>;

    /// Set a render state value
    fn set_render_state(&mut self, state: RenderState, value: u32) -> DeviceResult<()>;

    /// Redirect rendering to a texture, or back to the back buffer with `None`
    fn set_render_target(&mut self, target: Option<TextureHandle>) -> DeviceResult<()>;
}

/// Lock, copy and unlock in one step
///
/// The buffer is unlocked even when the copy cannot be performed.
pub fn write_buffer(
    device: &mut dyn GraphicsDevice,
    handle: BufferHandle,
    offset: usize,
    bytes: &[u8],
    mode: LockMode,
) -> DeviceResult<()> {
    let copied = {
        let target = device.lock(handle, offset, bytes.len(), mode)?;
        if target.len() == bytes.len() {
            target.copy_from_slice(bytes);
            Ok(())
        } else {
            Err(DeviceError::new(
                "lock",
                format!("locked {} bytes, expected {}", target.len(), bytes.len()),
            ))
        }
    };
    let unlocked = device.unlock(handle);
    copied.and(unlocked)
}
