//! Caller-uploaded static geometry
//!
//! Static buffers are written once with a plain lock and drawn from by the
//! static render overloads. The pool remembers what each buffer holds, and
//! keeps a host copy of static indices, so ranges can be checked before
//! they are queued.

use slotmap::{new_key_type, SecondaryMap, SlotMap};

use crate::device::{write_buffer, BufferHandle, BufferUsage, GraphicsDevice, LockMode};
use crate::error::{CacheError, CacheResult};
use crate::vertex::VertexLayout;

new_key_type! {
    /// Static buffer owned by the cache manager
    pub struct StaticBufferId;
}

/// What a static buffer holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticContents {
    /// `count` vertices of `layout`
    Vertices {
        /// Vertex layout
        layout: VertexLayout,
        /// Number of vertices
        count: usize,
    },
    /// `count` 16-bit indices
    Indices {
        /// Number of indices
        count: usize,
    },
}

/// A registered static buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticBuffer {
    /// Device buffer
    pub handle: BufferHandle,
    /// Contents description
    pub contents: StaticContents,
}

/// Registry of static vertex and index buffers
#[derive(Debug, Default)]
pub struct StaticBufferPool {
    buffers: SlotMap<StaticBufferId, StaticBuffer>,
    index_values: SecondaryMap<StaticBufferId, Vec<u16>>,
}

impl StaticBufferPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Upload `bytes` as `layout` vertices into a new static buffer
    pub fn create_vertex_buffer(
        &mut self,
        device: &mut dyn GraphicsDevice,
        layout: VertexLayout,
        bytes: &[u8],
    ) -> CacheResult<StaticBufferId> {
        let stride = layout.stride();
        if bytes.is_empty() || bytes.len() % stride != 0 {
            return Err(CacheError::invalid_payload(format!(
                "{} bytes is not a whole number of {:?} vertices",
                bytes.len(),
                layout
            )));
        }
        let count = bytes.len() / stride;
        let contents = StaticContents::Vertices { layout, count };
        let handle = device.create_vertex_buffer(bytes.len(), BufferUsage::Static)?;
        self.upload(device, handle, bytes, contents)
    }

    /// Upload `indices` into a new static index buffer
    pub fn create_index_buffer(&mut self, device: &mut dyn GraphicsDevice, indices: &[u16]) -> CacheResult<StaticBufferId> {
        if indices.is_empty() {
            return Err(CacheError::invalid_payload("empty index payload"));
        }
        let bytes: &[u8] = bytemuck::cast_slice(indices);
        let contents = StaticContents::Indices { count: indices.len() };
        let handle = device.create_index_buffer(bytes.len(), BufferUsage::Static)?;
        let id = self.upload(device, handle, bytes, contents)?;
        self.index_values.insert(id, indices.to_vec());
        Ok(id)
    }

    fn upload(
        &mut self,
        device: &mut dyn GraphicsDevice,
        handle: BufferHandle,
        bytes: &[u8],
        contents: StaticContents,
    ) -> CacheResult<StaticBufferId> {
        if let Err(err) = write_buffer(device, handle, 0, bytes, LockMode::None) {
            device.release_buffer(handle);
            return Err(err.into());
        }
        let id = self.buffers.insert(StaticBuffer { handle, contents });
        log::debug!("Uploaded static buffer {:?}: {:?}", id, contents);
        Ok(id)
    }

    /// Look up a buffer
    pub fn get(&self, id: StaticBufferId) -> CacheResult<&StaticBuffer> {
        self.buffers.get(id).ok_or(CacheError::UnknownBuffer(id))
    }

    /// Handle and vertex count of a vertex buffer holding `layout` vertices
    pub fn vertices(&self, id: StaticBufferId, layout: VertexLayout) -> CacheResult<(BufferHandle, usize)> {
        let buffer = self.get(id)?;
        match buffer.contents {
            StaticContents::Vertices { layout: stored, count } if stored == layout => Ok((buffer.handle, count)),
            contents => Err(CacheError::invalid_payload(format!(
                "{:?} holds {:?}, expected {:?} vertices",
                id, contents, layout
            ))),
        }
    }

    /// Handle and index count of an index buffer
    pub fn indices(&self, id: StaticBufferId) -> CacheResult<(BufferHandle, usize)> {
        let buffer = self.get(id)?;
        match buffer.contents {
            StaticContents::Indices { count } => Ok((buffer.handle, count)),
            contents => Err(CacheError::invalid_payload(format!(
                "{:?} holds {:?}, expected indices",
                id, contents
            ))),
        }
    }

    /// Smallest and largest value among `count` indices from `start` of an
    /// index buffer
    pub fn index_bounds(&self, id: StaticBufferId, start: usize, count: usize) -> CacheResult<(usize, usize)> {
        let values = self
            .index_values
            .get(id)
            .ok_or_else(|| CacheError::invalid_payload(format!("{:?} holds no indices", id)))?;
        let window = start
            .checked_add(count)
            .and_then(|end| values.get(start..end))
            .filter(|window| !window.is_empty())
            .ok_or_else(|| {
                CacheError::invalid_payload(format!(
                    "indices {}..{} exceed the {} in {:?}",
                    start,
                    start.saturating_add(count),
                    values.len(),
                    id
                ))
            })?;
        let (low, high) = window
            .iter()
            .fold((u16::MAX, u16::MIN), |(low, high), &index| (low.min(index), high.max(index)));
        Ok((usize::from(low), usize::from(high)))
    }

    /// Remove a buffer from the pool, returning its device handle
    pub fn remove(&mut self, id: StaticBufferId) -> CacheResult<BufferHandle> {
        self.index_values.remove(id);
        self.buffers
            .remove(id)
            .map(|buffer| buffer.handle)
            .ok_or(CacheError::UnknownBuffer(id))
    }

    /// Release every buffer
    pub fn release_all(&mut self, device: &mut dyn GraphicsDevice) {
        self.index_values.clear();
        for (_, buffer) in self.buffers.drain() {
            device.release_buffer(buffer.handle);
        }
    }

    /// Number of live static buffers
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether the pool holds no buffers
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
