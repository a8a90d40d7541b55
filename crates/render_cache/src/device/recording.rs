//! Headless device that records every call
//!
//! Buffers live in host memory, draws are validated against the bound
//! buffers, and every call is appended to an ordered log. Used by the test
//! suite and by tools that want to inspect what a frame would submit without
//! a GPU. A failure can be injected once per operation name to exercise the
//! cache's error paths.

use std::collections::HashSet;

use nalgebra::Matrix4;
use slotmap::SlotMap;

use super::{
    BufferHandle, BufferUsage, DeclarationHandle, GraphicsDevice, LockMode, RenderState,
    TextureHandle, TransformState,
};
use crate::error::{DeviceError, DeviceResult};
use crate::material::MaterialColors;
use crate::vertex::{PrimitiveKind, VertexDeclaration, VertexLayout};

/// One recorded device call
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    /// Vertex buffer created
    CreateVertexBuffer {
        /// New buffer
        handle: BufferHandle,
        /// Size in bytes
        size: usize,
        /// Usage hint
        usage: BufferUsage,
    },
    /// Index buffer created
    CreateIndexBuffer {
        /// New buffer
        handle: BufferHandle,
        /// Size in bytes
        size: usize,
        /// Usage hint
        usage: BufferUsage,
    },
    /// Buffer released
    ReleaseBuffer(BufferHandle),
    /// Buffer range locked
    Lock {
        /// Locked buffer
        handle: BufferHandle,
        /// Byte offset
        offset: usize,
        /// Byte count
        size: usize,
        /// Lock mode
        mode: LockMode,
    },
    /// Buffer unlocked
    Unlock(BufferHandle),
    /// Declaration created
    CreateVertexDeclaration {
        /// New declaration
        handle: DeclarationHandle,
        /// Layout it describes
        layout: VertexLayout,
    },
    /// Declaration bound
    SetVertexDeclaration(DeclarationHandle),
    /// Vertex stream bound
    SetStreamSource {
        /// Bound buffer
        handle: BufferHandle,
        /// Vertex stride in bytes
        stride: usize,
    },
    /// Index buffer bound
    SetIndices(BufferHandle),
    /// Non-indexed draw
    DrawPrimitive {
        /// Topology
        kind: PrimitiveKind,
        /// First vertex
        start_vertex: usize,
        /// Primitives drawn
        primitive_count: usize,
    },
    /// Indexed draw
    DrawIndexedPrimitive {
        /// Topology
        kind: PrimitiveKind,
        /// Added to every index
        base_vertex: usize,
        /// Lowest referenced vertex
        min_index: usize,
        /// Referenced vertex span
        num_vertices: usize,
        /// First index
        start_index: usize,
        /// Primitives drawn
        primitive_count: usize,
    },
    /// Texture stage bound
    SetTexture {
        /// Stage
        stage: usize,
        /// Texture, `None` unbinds
        texture: Option<TextureHandle>,
    },
    /// Material colors set
    SetMaterial(MaterialColors),
    /// Transform set
    SetTransform {
        /// Transform slot
        state: TransformState,
        /// New matrix
        matrix: Matrix4<f32>,
    },
    /// Render state set
    SetRenderState {
        /// State
        state: RenderState,
        /// New value
        value: u32,
    },
    /// Render target changed
    SetRenderTarget(Option<TextureHandle>),
}

impl DeviceCall {
    /// Whether this call submits primitives
    pub fn is_draw(&self) -> bool {
        matches!(self, Self::DrawPrimitive { .. } | Self::DrawIndexedPrimitive { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BufferKind {
    Vertex,
    Index,
}

#[derive(Debug)]
struct RecordedBuffer {
    kind: BufferKind,
    usage: BufferUsage,
    data: Vec<u8>,
    locked: bool,
}

/// Host-memory [`GraphicsDevice`] that logs every call
#[derive(Debug, Default)]
pub struct RecordingDevice {
    buffers: SlotMap<BufferHandle, RecordedBuffer>,
    declarations: SlotMap<DeclarationHandle, VertexLayout>,
    calls: Vec<DeviceCall>,
    pending_failures: HashSet<&'static str>,
    stream: Option<(BufferHandle, usize)>,
    indices: Option<BufferHandle>,
}

impl RecordingDevice {
    /// Create an empty device
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of `operation` fail once
    pub fn fail_next(&mut self, operation: &'static str) {
        self.pending_failures.insert(operation);
    }

    /// Every call recorded so far
    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    /// Clear the call log
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Recorded draw calls, in submission order
    pub fn draw_calls(&self) -> Vec<&DeviceCall> {
        self.calls.iter().filter(|call| call.is_draw()).collect()
    }

    /// Number of recorded draw calls
    pub fn draw_call_count(&self) -> usize {
        self.calls.iter().filter(|call| call.is_draw()).count()
    }

    /// Current contents of a buffer
    pub fn buffer_contents(&self, handle: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(handle).map(|buffer| buffer.data.as_slice())
    }

    /// 16-bit indices currently stored in an index buffer
    pub fn index_contents(&self, handle: BufferHandle) -> Option<Vec<u16>> {
        let buffer = self.buffers.get(handle)?;
        if buffer.kind != BufferKind::Index {
            return None;
        }
        Some(
            buffer
                .data
                .chunks_exact(2)
                .map(|pair| u16::from_ne_bytes([pair[0], pair[1]]))
                .collect(),
        )
    }

    /// Usage hint a buffer was created with
    pub fn buffer_usage(&self, handle: BufferHandle) -> Option<BufferUsage> {
        self.buffers.get(handle).map(|buffer| buffer.usage)
    }

    /// Number of buffers that have not been released
    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Layout a declaration was created for
    pub fn declaration_layout(&self, handle: DeclarationHandle) -> Option<VertexLayout> {
        self.declarations.get(handle).copied()
    }

    fn check(&mut self, operation: &'static str) -> DeviceResult<()> {
        if self.pending_failures.remove(operation) {
            log::debug!("RecordingDevice: injected failure for `{}`", operation);
            Err(DeviceError::new(operation, "injected failure"))
        } else {
            Ok(())
        }
    }

    fn create_buffer(
        &mut self,
        operation: &'static str,
        kind: BufferKind,
        size_bytes: usize,
        usage: BufferUsage,
    ) -> DeviceResult<BufferHandle> {
        self.check(operation)?;
        if size_bytes == 0 {
            return Err(DeviceError::new(operation, "zero-sized buffer"));
        }
        Ok(self.buffers.insert(RecordedBuffer {
            kind,
            usage,
            data: vec![0; size_bytes],
            locked: false,
        }))
    }

    fn buffer_len(&self, operation: &'static str, handle: BufferHandle, kind: BufferKind) -> DeviceResult<usize> {
        match self.buffers.get(handle) {
            Some(buffer) if buffer.kind == kind => Ok(buffer.data.len()),
            Some(_) => Err(DeviceError::new(operation, format!("{handle:?} has the wrong buffer kind"))),
            None => Err(DeviceError::new(operation, format!("{handle:?} is not a live buffer"))),
        }
    }

    fn bound_stream(&self, operation: &'static str, vertices: usize) -> DeviceResult<()> {
        let (handle, stride) = self
            .stream
            .ok_or_else(|| DeviceError::new(operation, "no vertex stream bound"))?;
        let len = self.buffer_len(operation, handle, BufferKind::Vertex)?;
        if vertices * stride > len {
            return Err(DeviceError::new(
                operation,
                format!("reads {} vertices from a {}-byte stream", vertices, len),
            ));
        }
        Ok(())
    }
}

impl GraphicsDevice for RecordingDevice {
    fn create_vertex_buffer(&mut self, size_bytes: usize, usage: BufferUsage) -> DeviceResult<BufferHandle> {
        let handle = self.create_buffer("create_vertex_buffer", BufferKind::Vertex, size_bytes, usage)?;
        self.calls.push(DeviceCall::CreateVertexBuffer { handle, size: size_bytes, usage });
        Ok(handle)
    }

    fn create_index_buffer(&mut self, size_bytes: usize, usage: BufferUsage) -> DeviceResult<BufferHandle> {
        let handle = self.create_buffer("create_index_buffer", BufferKind::Index, size_bytes, usage)?;
        self.calls.push(DeviceCall::CreateIndexBuffer { handle, size: size_bytes, usage });
        Ok(handle)
    }

    fn release_buffer(&mut self, handle: BufferHandle) {
        if self.buffers.remove(handle).is_some() {
            if self.stream.map(|(bound, _)| bound) == Some(handle) {
                self.stream = None;
            }
            if self.indices == Some(handle) {
                self.indices = None;
            }
            self.calls.push(DeviceCall::ReleaseBuffer(handle));
        }
    }

    fn lock(&mut self, handle: BufferHandle, offset: usize, size: usize, mode: LockMode) -> DeviceResult<&mut [u8]> {
        self.check("lock")?;
        let buffer = self
            .buffers
            .get_mut(handle)
            .ok_or_else(|| DeviceError::new("lock", format!("{handle:?} is not a live buffer")))?;
        if buffer.locked {
            return Err(DeviceError::new("lock", "buffer is already locked"));
        }
        if offset + size > buffer.data.len() {
            return Err(DeviceError::new(
                "lock",
                format!("range {}..{} exceeds {} bytes", offset, offset + size, buffer.data.len()),
            ));
        }
        if mode == LockMode::Discard {
            if offset != 0 {
                return Err(DeviceError::new("lock", "discard lock at a nonzero offset"));
            }
            buffer.data.fill(0);
        }
        buffer.locked = true;
        self.calls.push(DeviceCall::Lock { handle, offset, size, mode });
        Ok(&mut buffer.data[offset..offset + size])
    }

    fn unlock(&mut self, handle: BufferHandle) -> DeviceResult<()> {
        self.check("unlock")?;
        let buffer = self
            .buffers
            .get_mut(handle)
            .ok_or_else(|| DeviceError::new("unlock", format!("{handle:?} is not a live buffer")))?;
        if !buffer.locked {
            return Err(DeviceError::new("unlock", "buffer is not locked"));
        }
        buffer.locked = false;
        self.calls.push(DeviceCall::Unlock(handle));
        Ok(())
    }

    fn create_vertex_declaration(&mut self, declaration: &VertexDeclaration) -> DeviceResult<DeclarationHandle> {
        self.check("create_vertex_declaration")?;
        let handle = self.declarations.insert(declaration.layout);
        self.calls.push(DeviceCall::CreateVertexDeclaration {
            handle,
            layout: declaration.layout,
        });
        Ok(handle)
    }

    fn set_vertex_declaration(&mut self, declaration: DeclarationHandle) -> DeviceResult<()> {
        self.check("set_vertex_declaration")?;
        if !self.declarations.contains_key(declaration) {
            return Err(DeviceError::new("set_vertex_declaration", "unknown declaration"));
        }
        self.calls.push(DeviceCall::SetVertexDeclaration(declaration));
        Ok(())
    }

    fn set_stream_source(&mut self, handle: BufferHandle, stride: usize) -> DeviceResult<()> {
        self.check("set_stream_source")?;
        self.buffer_len("set_stream_source", handle, BufferKind::Vertex)?;
        self.stream = Some((handle, stride));
        self.calls.push(DeviceCall::SetStreamSource { handle, stride });
        Ok(())
    }

    fn set_indices(&mut self, handle: BufferHandle) -> DeviceResult<()> {
        self.check("set_indices")?;
        self.buffer_len("set_indices", handle, BufferKind::Index)?;
        self.indices = Some(handle);
        self.calls.push(DeviceCall::SetIndices(handle));
        Ok(())
    }

    fn draw_primitive(&mut self, kind: PrimitiveKind, start_vertex: usize, primitive_count: usize) -> DeviceResult<()> {
        self.check("draw_primitive")?;
        self.bound_stream("draw_primitive", start_vertex + kind.element_count(primitive_count))?;
        self.calls.push(DeviceCall::DrawPrimitive {
            kind,
            start_vertex,
            primitive_count,
        });
        Ok(())
    }

    fn draw_indexed_primitive(
        &mut self,
        kind: PrimitiveKind,
        base_vertex: usize,
        min_index: usize,
        num_vertices: usize,
        start_index: usize,
        primitive_count: usize,
    ) -> DeviceResult<()> {
        const OPERATION: &str = "draw_indexed_primitive";
        self.check(OPERATION)?;
        self.bound_stream(OPERATION, base_vertex + min_index + num_vertices)?;
        let indices = self
            .indices
            .ok_or_else(|| DeviceError::new(OPERATION, "no index buffer bound"))?;
        let index_bytes = self.buffer_len(OPERATION, indices, BufferKind::Index)?;
        let end = start_index + kind.element_count(primitive_count);
        if end * 2 > index_bytes {
            return Err(DeviceError::new(
                OPERATION,
                format!("reads indices up to {} from a {}-byte index buffer", end, index_bytes),
            ));
        }
        self.calls.push(DeviceCall::DrawIndexedPrimitive {
            kind,
            base_vertex,
            min_index,
            num_vertices,
            start_index,
            primitive_count,
        });
        Ok(())
    }

    fn set_texture(&mut self, stage: usize, texture: Option<TextureHandle>) -> DeviceResult<()> {
        self.check("set_texture")?;
        self.calls.push(DeviceCall::SetTexture { stage, texture });
        Ok(())
    }

    fn set_material(&mut self, colors: &MaterialColors) -> DeviceResult<()> {
        self.check("set_material")?;
        self.calls.push(DeviceCall::SetMaterial(*colors));
        Ok(())
    }

    fn set_transform(&mut self, state: TransformState, matrix: &Matrix4<f32>) -> DeviceResult<()> {
        self.check("set_transform")?;
        self.calls.push(DeviceCall::SetTransform { state, matrix: *matrix });
        Ok(())
    }

    fn set_render_state(&mut self, state: RenderState, value: u32) -> DeviceResult<()> {
        self.check("set_render_state")?;
        self.calls.push(DeviceCall::SetRenderState { state, value });
        Ok(())
    }

    fn set_render_target(&mut self, target: Option<TextureHandle>) -> DeviceResult<()> {
        self.check("set_render_target")?;
        self.calls.push(DeviceCall::SetRenderTarget(target));
        Ok(())
    }
}
