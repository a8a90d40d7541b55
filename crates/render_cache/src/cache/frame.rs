//! Device-facing state threaded through a flush
//!
//! The cache manager owns the "what is bound right now" bookkeeping and lends
//! it to accumulators through [`FrameContext`] for the duration of one add or
//! flush. Binds that would not change device state are filtered here.

use super::CacheStats;
use crate::device::{BufferHandle, DeclarationHandle, GraphicsDevice};
use crate::effect::ActiveEffect;
use crate::error::{CacheResult, DeviceResult};
use crate::material::{MaterialBinder, MaterialKey, SkinProvider};
use crate::vertex::{PrimitiveKind, VertexLayout};

/// Buffers and declaration currently bound on the device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct BindState {
    pub declaration: Option<DeclarationHandle>,
    pub vertex_stream: Option<(BufferHandle, usize)>,
    pub index_buffer: Option<BufferHandle>,
}

impl BindState {
    /// Forget every binding; the next bind always reaches the device
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Drop bindings that refer to a released buffer
    pub fn forget_buffer(&mut self, handle: BufferHandle) {
        if self.vertex_stream.map(|(bound, _)| bound) == Some(handle) {
            self.vertex_stream = None;
        }
        if self.index_buffer == Some(handle) {
            self.index_buffer = None;
        }
    }
}

/// Device declaration objects, created on first use per layout
#[derive(Debug, Default)]
pub(crate) struct DeclarationTable {
    handles: [Option<DeclarationHandle>; VertexLayout::COUNT],
}

impl DeclarationTable {
    pub fn get_or_create(
        &mut self,
        device: &mut dyn GraphicsDevice,
        layout: VertexLayout,
    ) -> DeviceResult<DeclarationHandle> {
        let slot = &mut self.handles[layout.index()];
        if let Some(handle) = *slot {
            return Ok(handle);
        }
        let handle = device.create_vertex_declaration(&layout.declaration())?;
        log::debug!("Created vertex declaration for {:?}", layout);
        *slot = Some(handle);
        Ok(handle)
    }
}

/// One device draw call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Draw {
    NonIndexed {
        start_vertex: usize,
        primitive_count: usize,
    },
    Indexed {
        base_vertex: usize,
        min_index: usize,
        num_vertices: usize,
        start_index: usize,
        primitive_count: usize,
    },
}

impl Draw {
    pub fn primitive_count(&self) -> usize {
        match *self {
            Self::NonIndexed { primitive_count, .. } | Self::Indexed { primitive_count, .. } => primitive_count,
        }
    }

    fn issue(&self, device: &mut dyn GraphicsDevice, kind: PrimitiveKind) -> DeviceResult<()> {
        match *self {
            Self::NonIndexed {
                start_vertex,
                primitive_count,
            } => device.draw_primitive(kind, start_vertex, primitive_count),
            Self::Indexed {
                base_vertex,
                min_index,
                num_vertices,
                start_index,
                primitive_count,
            } => device.draw_indexed_primitive(kind, base_vertex, min_index, num_vertices, start_index, primitive_count),
        }
    }
}

/// Everything an accumulator needs to submit geometry
pub(crate) struct FrameContext<'a> {
    pub device: &'a mut dyn GraphicsDevice,
    pub skins: &'a dyn SkinProvider,
    pub binder: &'a mut MaterialBinder,
    pub bind: &'a mut BindState,
    pub declarations: &'a mut DeclarationTable,
    pub effect: Option<ActiveEffect<'a>>,
    pub stats: &'a mut CacheStats,
}

impl FrameContext<'_> {
    /// Bind a skin unless it is already bound
    pub fn bind_material(&mut self, key: MaterialKey) -> CacheResult<()> {
        if self.binder.bind(key, self.device, self.skins, self.effect.as_mut())? {
            self.stats.material_binds += 1;
        }
        Ok(())
    }

    /// Bind the declaration for `layout`, creating it on first use
    pub fn bind_declaration(&mut self, layout: VertexLayout) -> DeviceResult<()> {
        let handle = self.declarations.get_or_create(self.device, layout)?;
        if self.bind.declaration != Some(handle) {
            self.device.set_vertex_declaration(handle)?;
            self.bind.declaration = Some(handle);
            self.stats.declaration_binds += 1;
        }
        Ok(())
    }

    pub fn bind_vertex_buffer(&mut self, handle: BufferHandle, stride: usize) -> DeviceResult<()> {
        if self.bind.vertex_stream != Some((handle, stride)) {
            self.device.set_stream_source(handle, stride)?;
            self.bind.vertex_stream = Some((handle, stride));
            self.stats.buffer_binds += 1;
        }
        Ok(())
    }

    pub fn bind_index_buffer(&mut self, handle: BufferHandle) -> DeviceResult<()> {
        if self.bind.index_buffer != Some(handle) {
            self.device.set_indices(handle)?;
            self.bind.index_buffer = Some(handle);
            self.stats.buffer_binds += 1;
        }
        Ok(())
    }

    /// Issue `draw`, once per pass when an effect is active
    pub fn draw(&mut self, kind: PrimitiveKind, draw: Draw) -> DeviceResult<()> {
        let device = &mut *self.device;
        let submitted = match self.effect.as_mut() {
            Some(active) => {
                let mut passes = 0;
                active.for_each_pass(|| {
                    draw.issue(device, kind)?;
                    passes += 1;
                    Ok(())
                })?;
                passes
            }
            None => {
                draw.issue(device, kind)?;
                1
            }
        };
        self.stats.draw_calls += submitted;
        self.stats.primitives += submitted * draw.primitive_count();
        Ok(())
    }
}

/// Owned backing for a [`FrameContext`] in unit tests
#[cfg(test)]
pub(crate) struct TestFrame {
    pub device: crate::device::RecordingDevice,
    pub skins: crate::material::SkinTable,
    pub binder: MaterialBinder,
    pub bind: BindState,
    pub declarations: DeclarationTable,
    pub stats: CacheStats,
}

#[cfg(test)]
impl TestFrame {
    pub fn new() -> Self {
        Self {
            device: crate::device::RecordingDevice::new(),
            skins: crate::material::SkinTable::new(),
            binder: MaterialBinder::new(),
            bind: BindState::default(),
            declarations: DeclarationTable::default(),
            stats: CacheStats::default(),
        }
    }

    pub fn context(&mut self) -> FrameContext<'_> {
        FrameContext {
            device: &mut self.device,
            skins: &self.skins,
            binder: &mut self.binder,
            bind: &mut self.bind,
            declarations: &mut self.declarations,
            effect: None,
            stats: &mut self.stats,
        }
    }
}
