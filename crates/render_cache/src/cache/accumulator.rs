//! # Batch Accumulator
//!
//! Collects geometry for one (layout, material, primitive kind) triple and
//! submits it with as few draw calls as possible.
//!
//! ## Buffers
//!
//! Each accumulator owns a fixed-capacity pair of dynamic streaming buffers
//! (vertices + 16-bit indices). Everything added through [`BatchAccumulator::add`]
//! lands there and is drawn by a single indexed draw at flush time.
//!
//! Geometry that mixes a caller-owned static buffer with a dynamic payload
//! (static vertices + dynamic indices, or dynamic vertices + static indices)
//! uploads its dynamic half into a second, lazily created pair of hosting
//! buffers and is recorded as a [`StaticRange`].
//!
//! ## Overflow
//!
//! Capacities never grow. An add that does not fit first flushes the
//! accumulator, then writes into the emptied buffers, so at most one flush
//! happens per add and the caller never observes a partial write.
//!
//! ## Static ranges
//!
//! Ranges are drawn in submission order, one draw each. A new range is folded
//! into the most recently added one when both reference the same buffers and
//! the new range starts exactly where the previous one ends.

use std::fmt;

use super::frame::{Draw, FrameContext};
use super::CacheStats;
use crate::config::CacheConfig;
use crate::device::{write_buffer, BufferHandle, BufferUsage, GraphicsDevice, LockMode};
use crate::error::{CacheError, CacheResult};
use crate::material::MaterialKey;
use crate::vertex::{PrimitiveKind, VertexLayout};

/// Size of one index in bytes
const INDEX_SIZE: usize = std::mem::size_of::<u16>();

/// Identity of a batch accumulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccumulatorKey {
    /// Vertex layout of every vertex in the batch
    pub layout: VertexLayout,
    /// Skin bound while the batch is drawn
    pub material: MaterialKey,
    /// Topology of the batch
    pub primitive: PrimitiveKind,
}

impl fmt::Display for AccumulatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}/{:?}", self.layout, self.material.0, self.primitive)
    }
}

/// Buffer referenced by a static range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferRef {
    /// The accumulator's own hosting buffer of the matching kind
    Accumulator,
    /// A caller-owned static buffer
    External(BufferHandle),
}

/// A draw over geometry that does not live in the streaming buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticRange {
    /// Vertex offset added to every index, or the first vertex when non-indexed
    pub base_vertex: usize,
    /// Lowest vertex referenced, relative to `base_vertex`
    pub min_index: usize,
    /// Number of vertices referenced from `min_index`
    pub num_vertices: usize,
    /// First index (indexed ranges only)
    pub start_index: usize,
    /// Primitives drawn
    pub primitive_count: usize,
    /// Vertex source
    pub vertex_buffer: BufferRef,
    /// Index source, `None` for non-indexed ranges
    pub index_buffer: Option<BufferRef>,
}

impl StaticRange {
    /// Non-indexed range of `primitive_count` primitives starting at `start_vertex`
    pub fn non_indexed(
        kind: PrimitiveKind,
        vertex_buffer: BufferRef,
        start_vertex: usize,
        primitive_count: usize,
    ) -> Self {
        Self {
            base_vertex: start_vertex,
            min_index: 0,
            num_vertices: kind.element_count(primitive_count),
            start_index: 0,
            primitive_count,
            vertex_buffer,
            index_buffer: None,
        }
    }

    /// Try to extend `self` by `next`; only list topologies can be joined
    fn try_join(&mut self, next: &StaticRange, kind: PrimitiveKind) -> bool {
        if !kind.is_list()
            || self.vertex_buffer != next.vertex_buffer
            || self.index_buffer != next.index_buffer
        {
            return false;
        }
        let consumed = kind.element_count(self.primitive_count);
        let adjacent = match self.index_buffer {
            Some(_) => next.base_vertex == self.base_vertex && next.start_index == self.start_index + consumed,
            None => next.base_vertex == self.base_vertex + consumed,
        };
        if !adjacent {
            return false;
        }

        if self.index_buffer.is_some() {
            let low = self.min_index.min(next.min_index);
            let high = (self.min_index + self.num_vertices).max(next.min_index + next.num_vertices);
            self.min_index = low;
            self.num_vertices = high - low;
        } else {
            self.num_vertices += next.num_vertices;
        }
        self.primitive_count += next.primitive_count;
        true
    }

    fn draw(&self) -> Draw {
        match self.index_buffer {
            Some(_) => Draw::Indexed {
                base_vertex: self.base_vertex,
                min_index: self.min_index,
                num_vertices: self.num_vertices,
                start_index: self.start_index,
                primitive_count: self.primitive_count,
            },
            None => Draw::NonIndexed {
                start_vertex: self.base_vertex,
                primitive_count: self.primitive_count,
            },
        }
    }
}

fn lock_mode(cursor: usize) -> LockMode {
    if cursor == 0 {
        LockMode::Discard
    } else {
        LockMode::NoOverwrite
    }
}

/// Number of `layout` vertices in a raw payload
pub(crate) fn vertex_count(layout: VertexLayout, vertices: &[u8]) -> CacheResult<usize> {
    let stride = layout.stride();
    if vertices.is_empty() {
        return Err(CacheError::invalid_payload("empty vertex payload"));
    }
    if vertices.len() % stride != 0 {
        return Err(CacheError::invalid_payload(format!(
            "{} bytes is not a multiple of the {}-byte {:?} stride",
            vertices.len(),
            stride,
            layout
        )));
    }
    Ok(vertices.len() / stride)
}

/// Vertex and index counts of a dynamic payload that must fit in one batch
pub(crate) fn payload_counts(
    layout: VertexLayout,
    config: &CacheConfig,
    vertices: &[u8],
    indices: Option<&[u16]>,
) -> CacheResult<(usize, usize)> {
    let vertex_count = vertex_count(layout, vertices)?;
    let index_count = match indices {
        Some(indices) => {
            validate_indices(indices, vertex_count)?;
            indices.len()
        }
        None => vertex_count,
    };
    check_capacity("vertex", vertex_count, config.max_vertices)?;
    check_capacity("index", index_count, config.max_indices)?;
    Ok((vertex_count, index_count))
}

pub(crate) fn check_capacity(what: &'static str, requested: usize, capacity: usize) -> CacheResult<()> {
    if requested > capacity {
        Err(CacheError::CapacityExceeded {
            what,
            requested,
            capacity,
        })
    } else {
        Ok(())
    }
}

/// Fixed-capacity geometry batch for one [`AccumulatorKey`]
#[derive(Debug)]
pub struct BatchAccumulator {
    key: AccumulatorKey,
    stride: usize,

    vertex_buffer: BufferHandle,
    index_buffer: BufferHandle,
    max_vertices: usize,
    max_indices: usize,
    num_vertices: usize,
    num_indices: usize,

    hosted_vertex_buffer: Option<BufferHandle>,
    hosted_index_buffer: Option<BufferHandle>,
    max_hosted_vertices: usize,
    max_hosted_indices: usize,
    num_hosted_vertices: usize,
    num_hosted_indices: usize,

    ranges: Vec<StaticRange>,
    empty: bool,
}

impl BatchAccumulator {
    /// Create the streaming buffers for `key`
    pub(crate) fn new(key: AccumulatorKey, config: &CacheConfig, device: &mut dyn GraphicsDevice) -> CacheResult<Self> {
        let stride = key.layout.stride();
        let vertex_buffer = device.create_vertex_buffer(config.max_vertices * stride, BufferUsage::Dynamic)?;
        let index_buffer = match device.create_index_buffer(config.max_indices * INDEX_SIZE, BufferUsage::Dynamic) {
            Ok(handle) => handle,
            Err(err) => {
                device.release_buffer(vertex_buffer);
                return Err(err.into());
            }
        };
        log::debug!(
            "Created batch accumulator {} ({} vertices x {} bytes, {} indices)",
            key,
            config.max_vertices,
            stride,
            config.max_indices
        );

        Ok(Self {
            key,
            stride,
            vertex_buffer,
            index_buffer,
            max_vertices: config.max_vertices,
            max_indices: config.max_indices,
            num_vertices: 0,
            num_indices: 0,
            hosted_vertex_buffer: None,
            hosted_index_buffer: None,
            max_hosted_vertices: config.max_static_vertices,
            max_hosted_indices: config.max_static_indices,
            num_hosted_vertices: 0,
            num_hosted_indices: 0,
            ranges: Vec::new(),
            empty: true,
        })
    }

    /// Identity of this accumulator
    pub fn key(&self) -> AccumulatorKey {
        self.key
    }

    /// Vertex stride in bytes
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Whether nothing is waiting to be drawn
    pub fn is_empty(&self) -> bool {
        self.empty
    }

    /// Vertices buffered in the streaming buffer
    pub fn vertex_count(&self) -> usize {
        self.num_vertices
    }

    /// Indices buffered in the streaming buffer
    pub fn index_count(&self) -> usize {
        self.num_indices
    }

    /// Capacity of the streaming vertex buffer
    pub fn max_vertices(&self) -> usize {
        self.max_vertices
    }

    /// Capacity of the streaming index buffer
    pub fn max_indices(&self) -> usize {
        self.max_indices
    }

    /// Vertices written to the hosting buffer since the last flush
    pub fn hosted_vertex_count(&self) -> usize {
        self.num_hosted_vertices
    }

    /// Indices written to the hosting buffer since the last flush
    pub fn hosted_index_count(&self) -> usize {
        self.num_hosted_indices
    }

    /// Pending static ranges, in draw order
    pub fn static_ranges(&self) -> &[StaticRange] {
        &self.ranges
    }

    /// Capacities the accumulator was created with
    pub fn capacity(&self) -> CacheConfig {
        CacheConfig {
            max_vertices: self.max_vertices,
            max_indices: self.max_indices,
            max_static_vertices: self.max_hosted_vertices,
            max_static_indices: self.max_hosted_indices,
        }
    }

    /// Streaming vertex buffer
    pub fn vertex_buffer(&self) -> BufferHandle {
        self.vertex_buffer
    }

    /// Streaming index buffer
    pub fn index_buffer(&self) -> BufferHandle {
        self.index_buffer
    }

    /// Append vertices and optional indices to the streaming buffers
    ///
    /// Without `indices` the vertices are indexed in order. Supplied indices
    /// are relative to `vertices` and must all reference one of them.
    pub(crate) fn add(
        &mut self,
        ctx: &mut FrameContext<'_>,
        vertices: &[u8],
        indices: Option<&[u16]>,
    ) -> CacheResult<()> {
        let (vertex_count, index_count) = payload_counts(self.key.layout, &self.capacity(), vertices, indices)?;

        let mut rebased = Vec::new();
        rebased.try_reserve_exact(index_count)?;

        if self.num_vertices + vertex_count > self.max_vertices || self.num_indices + index_count > self.max_indices {
            log::debug!(
                "{}: {} + {} vertices / {} + {} indices overflow, flushing",
                self.key,
                self.num_vertices,
                vertex_count,
                self.num_indices,
                index_count
            );
            ctx.stats.overflow_flushes += 1;
            self.render(ctx)?;
        }

        // Cursors are bounded by a capacity of at most 65536 vertices
        let base = self.num_vertices;
        match indices {
            Some(indices) => rebased.extend(indices.iter().map(|&index| (usize::from(index) + base) as u16)),
            None => rebased.extend((base..base + vertex_count).map(|index| index as u16)),
        }

        write_buffer(
            ctx.device,
            self.vertex_buffer,
            base * self.stride,
            vertices,
            lock_mode(base),
        )?;
        write_buffer(
            ctx.device,
            self.index_buffer,
            self.num_indices * INDEX_SIZE,
            bytemuck::cast_slice(&rebased),
            lock_mode(self.num_indices),
        )?;

        self.num_vertices += vertex_count;
        self.num_indices += index_count;
        self.empty = false;
        log::trace!("{}: now {} vertices, {} indices", self.key, self.num_vertices, self.num_indices);
        Ok(())
    }

    /// Queue a draw over caller-owned geometry, merging with the previous range when adjacent
    pub(crate) fn add_static_rendering(&mut self, range: StaticRange, stats: &mut CacheStats) -> CacheResult<()> {
        if range.primitive_count == 0 {
            return Err(CacheError::invalid_payload("static range draws no primitives"));
        }
        if let Some(last) = self.ranges.last_mut() {
            if last.try_join(&range, self.key.primitive) {
                log::trace!("{}: merged static range, now {} primitives", self.key, last.primitive_count);
                stats.static_merges += 1;
                self.empty = false;
                return Ok(());
            }
        }
        self.ranges.try_reserve(1)?;
        self.ranges.push(range);
        stats.static_ranges += 1;
        self.empty = false;
        Ok(())
    }

    /// Draw indices supplied now against a caller-owned static vertex buffer
    ///
    /// `indices` are relative to `base_vertex` and are uploaded into the
    /// hosting index buffer.
    pub(crate) fn add_static_vertices(
        &mut self,
        ctx: &mut FrameContext<'_>,
        vertex_buffer: BufferHandle,
        base_vertex: usize,
        indices: &[u16],
    ) -> CacheResult<()> {
        let (low, high) = match (indices.iter().min(), indices.iter().max()) {
            (Some(&low), Some(&high)) => (usize::from(low), usize::from(high)),
            _ => return Err(CacheError::invalid_payload("empty index payload")),
        };
        let primitive_count = self.key.primitive.primitive_count(indices.len());
        if primitive_count == 0 {
            return Err(CacheError::invalid_payload(format!(
                "{} indices form no {:?} primitive",
                indices.len(),
                self.key.primitive
            )));
        }
        check_capacity("static index", indices.len(), self.max_hosted_indices)?;
        self.ranges.try_reserve(1)?;

        if self.num_hosted_indices + indices.len() > self.max_hosted_indices {
            log::debug!("{}: hosted index buffer full, flushing", self.key);
            ctx.stats.overflow_flushes += 1;
            self.render(ctx)?;
        }

        let handle = match self.hosted_index_buffer {
            Some(handle) => handle,
            None => {
                let handle = ctx
                    .device
                    .create_index_buffer(self.max_hosted_indices * INDEX_SIZE, BufferUsage::Dynamic)?;
                self.hosted_index_buffer = Some(handle);
                handle
            }
        };
        let start_index = self.num_hosted_indices;
        write_buffer(
            ctx.device,
            handle,
            start_index * INDEX_SIZE,
            bytemuck::cast_slice(indices),
            lock_mode(start_index),
        )?;
        self.num_hosted_indices += indices.len();

        let range = StaticRange {
            base_vertex,
            min_index: low,
            num_vertices: high - low + 1,
            start_index,
            primitive_count,
            vertex_buffer: BufferRef::External(vertex_buffer),
            index_buffer: Some(BufferRef::Accumulator),
        };
        self.add_static_rendering(range, ctx.stats)
    }

    /// Draw vertices supplied now through a caller-owned static index buffer
    ///
    /// `vertices` are uploaded into the hosting vertex buffer; the static
    /// indices are relative to the first of them.
    pub(crate) fn add_static_indices(
        &mut self,
        ctx: &mut FrameContext<'_>,
        vertices: &[u8],
        index_buffer: BufferHandle,
        start_index: usize,
        index_count: usize,
    ) -> CacheResult<()> {
        let vertex_count = vertex_count(self.key.layout, vertices)?;
        let primitive_count = self.key.primitive.primitive_count(index_count);
        if primitive_count == 0 {
            return Err(CacheError::invalid_payload(format!(
                "{} indices form no {:?} primitive",
                index_count, self.key.primitive
            )));
        }
        check_capacity("static vertex", vertex_count, self.max_hosted_vertices)?;
        self.ranges.try_reserve(1)?;

        if self.num_hosted_vertices + vertex_count > self.max_hosted_vertices {
            log::debug!("{}: hosted vertex buffer full, flushing", self.key);
            ctx.stats.overflow_flushes += 1;
            self.render(ctx)?;
        }

        let handle = match self.hosted_vertex_buffer {
            Some(handle) => handle,
            None => {
                let handle = ctx
                    .device
                    .create_vertex_buffer(self.max_hosted_vertices * self.stride, BufferUsage::Dynamic)?;
                self.hosted_vertex_buffer = Some(handle);
                handle
            }
        };
        let base_vertex = self.num_hosted_vertices;
        write_buffer(
            ctx.device,
            handle,
            base_vertex * self.stride,
            vertices,
            lock_mode(base_vertex),
        )?;
        self.num_hosted_vertices += vertex_count;

        let range = StaticRange {
            base_vertex,
            min_index: 0,
            num_vertices: vertex_count,
            start_index,
            primitive_count,
            vertex_buffer: BufferRef::Accumulator,
            index_buffer: Some(BufferRef::External(index_buffer)),
        };
        self.add_static_rendering(range, ctx.stats)
    }

    /// Submit everything pending, then reset
    ///
    /// The accumulator is reset whether or not submission succeeded.
    pub(crate) fn render(&mut self, ctx: &mut FrameContext<'_>) -> CacheResult<()> {
        if self.empty {
            return Ok(());
        }
        let result = self.submit(ctx);
        self.reset();
        match &result {
            Ok(()) => ctx.stats.batch_flushes += 1,
            Err(err) => log::error!("{}: flush failed, batch dropped: {}", self.key, err),
        }
        result
    }

    fn submit(&self, ctx: &mut FrameContext<'_>) -> CacheResult<()> {
        let kind = self.key.primitive;
        ctx.bind_material(self.key.material)?;
        ctx.bind_declaration(self.key.layout)?;

        if self.num_indices > 0 {
            ctx.bind_vertex_buffer(self.vertex_buffer, self.stride)?;
            ctx.bind_index_buffer(self.index_buffer)?;
            let draw = Draw::Indexed {
                base_vertex: 0,
                min_index: 0,
                num_vertices: self.num_vertices,
                start_index: 0,
                primitive_count: kind.primitive_count(self.num_indices),
            };
            if draw.primitive_count() > 0 {
                ctx.draw(kind, draw)?;
            }
        }

        for range in &self.ranges {
            let vertex_buffer = self.resolve(range.vertex_buffer, self.hosted_vertex_buffer)?;
            ctx.bind_vertex_buffer(vertex_buffer, self.stride)?;
            if let Some(index_buffer) = range.index_buffer {
                ctx.bind_index_buffer(self.resolve(index_buffer, self.hosted_index_buffer)?)?;
            }
            ctx.draw(kind, range.draw())?;
        }
        Ok(())
    }

    fn resolve(&self, buffer: BufferRef, hosted: Option<BufferHandle>) -> CacheResult<BufferHandle> {
        match buffer {
            BufferRef::External(handle) => Ok(handle),
            BufferRef::Accumulator => hosted.ok_or_else(|| {
                CacheError::invalid_payload(format!("{}: static range references a missing hosting buffer", self.key))
            }),
        }
    }

    /// Drop pending geometry without drawing it
    pub(crate) fn discard(&mut self) {
        if !self.empty {
            log::debug!("{}: discarding pending batch", self.key);
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.num_vertices = 0;
        self.num_indices = 0;
        self.num_hosted_vertices = 0;
        self.num_hosted_indices = 0;
        self.ranges.clear();
        self.empty = true;
    }

    /// Release every device buffer owned by the accumulator
    pub(crate) fn release(self, device: &mut dyn GraphicsDevice) {
        let buffers = [Some(self.vertex_buffer), Some(self.index_buffer)]
            .into_iter()
            .chain([self.hosted_vertex_buffer, self.hosted_index_buffer]);
        for handle in buffers.flatten() {
            device.release_buffer(handle);
        }
        log::trace!("Released batch accumulator {}", self.key);
    }
}

fn validate_indices(indices: &[u16], vertex_count: usize) -> CacheResult<()> {
    if indices.is_empty() {
        return Err(CacheError::invalid_payload("empty index payload"));
    }
    match indices.iter().find(|&&index| usize::from(index) >= vertex_count) {
        Some(index) => Err(CacheError::invalid_payload(format!(
            "index {} out of range for {} vertices",
            index, vertex_count
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::frame::TestFrame;
    use crate::device::DeviceCall;
    use crate::vertex::PositionVertex;

    fn key(primitive: PrimitiveKind) -> AccumulatorKey {
        AccumulatorKey {
            layout: VertexLayout::Position,
            material: MaterialKey::NONE,
            primitive,
        }
    }

    fn triangle(offset: f32) -> [PositionVertex; 3] {
        [
            PositionVertex { position: [offset, 0.0, 0.0] },
            PositionVertex { position: [offset, 1.0, 0.0] },
            PositionVertex { position: [offset, 0.0, 1.0] },
        ]
    }

    fn accumulator(frame: &mut TestFrame, config: CacheConfig) -> BatchAccumulator {
        BatchAccumulator::new(key(PrimitiveKind::TriangleList), &config, &mut frame.device).unwrap()
    }

    fn lock_modes(frame: &TestFrame, handle: BufferHandle) -> Vec<LockMode> {
        frame
            .device
            .calls()
            .iter()
            .filter_map(|call| match call {
                DeviceCall::Lock { handle: locked, mode, .. } if *locked == handle => Some(*mode),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_new_sizes_buffers_from_config() {
        let mut frame = TestFrame::new();
        let acc = accumulator(&mut frame, CacheConfig::with_capacity(10, 20));

        assert_eq!(frame.device.buffer_contents(acc.vertex_buffer()).unwrap().len(), 10 * 12);
        assert_eq!(frame.device.buffer_contents(acc.index_buffer()).unwrap().len(), 20 * 2);
        assert!(acc.is_empty());
    }

    #[test]
    fn test_new_releases_vertex_buffer_when_index_buffer_fails() {
        let mut frame = TestFrame::new();
        frame.device.fail_next("create_index_buffer");

        let result = BatchAccumulator::new(
            key(PrimitiveKind::TriangleList),
            &CacheConfig::default(),
            &mut frame.device,
        );
        assert!(result.unwrap_err().is_device_error());
        assert_eq!(frame.device.live_buffer_count(), 0);
    }

    #[test]
    fn test_add_rebiases_indices() {
        let mut frame = TestFrame::new();
        let mut acc = accumulator(&mut frame, CacheConfig::default());

        acc.add(&mut frame.context(), bytemuck::cast_slice(&triangle(0.0)), None)
            .unwrap();
        acc.add(
            &mut frame.context(),
            bytemuck::cast_slice(&triangle(1.0)),
            Some(&[2, 1, 0]),
        )
        .unwrap();

        let indices = frame.device.index_contents(acc.index_buffer()).unwrap();
        assert_eq!(indices[..6], [0, 1, 2, 5, 4, 3]);
        assert_eq!(acc.vertex_count(), 6);
        assert_eq!(acc.index_count(), 6);
        assert!(!acc.is_empty());
    }

    #[test]
    fn test_first_write_discards_then_appends() {
        let mut frame = TestFrame::new();
        let mut acc = accumulator(&mut frame, CacheConfig::default());
        for offset in [0.0, 1.0] {
            acc.add(&mut frame.context(), bytemuck::cast_slice(&triangle(offset)), None)
                .unwrap();
        }

        assert_eq!(
            lock_modes(&frame, acc.vertex_buffer()),
            [LockMode::Discard, LockMode::NoOverwrite]
        );
        assert_eq!(
            lock_modes(&frame, acc.index_buffer()),
            [LockMode::Discard, LockMode::NoOverwrite]
        );
    }

    #[test]
    fn test_overflow_flushes_once_before_write() {
        let mut frame = TestFrame::new();
        let mut acc = accumulator(&mut frame, CacheConfig::with_capacity(6, 6));

        for (call, offset) in [0.0, 1.0, 2.0].into_iter().enumerate() {
            acc.add(&mut frame.context(), bytemuck::cast_slice(&triangle(offset)), None)
                .unwrap();
            assert!(acc.vertex_count() <= acc.max_vertices());
            assert!(acc.index_count() <= acc.max_indices());
            let expected_draws = if call < 2 { 0 } else { 1 };
            assert_eq!(frame.device.draw_call_count(), expected_draws);
        }

        assert_eq!(acc.vertex_count(), 3);
        assert!(!acc.is_empty());
        assert_eq!(frame.stats.overflow_flushes, 1);
        assert_eq!(
            frame.device.draw_calls()[0],
            &DeviceCall::DrawIndexedPrimitive {
                kind: PrimitiveKind::TriangleList,
                base_vertex: 0,
                min_index: 0,
                num_vertices: 6,
                start_index: 0,
                primitive_count: 2,
            }
        );
        // Written at cursor zero after the flush
        assert_eq!(lock_modes(&frame, acc.vertex_buffer()).last(), Some(&LockMode::Discard));
    }

    #[test]
    fn test_index_overflow_flushes_even_with_vertex_room() {
        let mut frame = TestFrame::new();
        let mut acc = accumulator(&mut frame, CacheConfig::with_capacity(16, 8));
        let quad = [PositionVertex { position: [0.0; 3] }; 4];
        let quad_indices = [0, 1, 2, 2, 3, 0];

        acc.add(&mut frame.context(), bytemuck::cast_slice(&quad), Some(&quad_indices))
            .unwrap();
        assert_eq!(frame.device.draw_call_count(), 0);

        acc.add(&mut frame.context(), bytemuck::cast_slice(&quad), Some(&quad_indices))
            .unwrap();

        assert_eq!(frame.device.draw_call_count(), 1);
        assert_eq!(frame.stats.overflow_flushes, 1);
        assert_eq!(acc.vertex_count(), 4);
        assert_eq!(acc.index_count(), 6);
        // Second quad starts over at cursor zero
        assert_eq!(frame.device.index_contents(acc.index_buffer()).unwrap()[..6], quad_indices);
    }

    #[test]
    fn test_lock_failure_during_add_leaves_cursors_untouched() {
        let mut frame = TestFrame::new();
        let mut acc = accumulator(&mut frame, CacheConfig::default());
        frame.device.fail_next("lock");

        let err = acc
            .add(&mut frame.context(), bytemuck::cast_slice(&triangle(0.0)), None)
            .unwrap_err();

        assert!(err.is_device_error());
        assert!(acc.is_empty());
        assert_eq!(acc.vertex_count(), 0);
        assert_eq!(acc.index_count(), 0);

        acc.add(&mut frame.context(), bytemuck::cast_slice(&triangle(0.0)), None)
            .unwrap();
        assert_eq!(acc.vertex_count(), 3);
        assert_eq!(lock_modes(&frame, acc.vertex_buffer()).last(), Some(&LockMode::Discard));
    }

    #[test]
    fn test_rejects_bad_payloads_before_device_calls() {
        let mut frame = TestFrame::new();
        let mut acc = accumulator(&mut frame, CacheConfig::with_capacity(6, 6));
        frame.device.clear_calls();

        let mut ctx = frame.context();
        assert!(matches!(
            acc.add(&mut ctx, &[], None),
            Err(CacheError::InvalidPayload { .. })
        ));
        assert!(matches!(
            acc.add(&mut ctx, &[0; 13], None),
            Err(CacheError::InvalidPayload { .. })
        ));
        assert!(matches!(
            acc.add(&mut ctx, bytemuck::cast_slice(&triangle(0.0)), Some(&[0, 1, 3])),
            Err(CacheError::InvalidPayload { .. })
        ));
        let big = [PositionVertex { position: [0.0; 3] }; 7];
        assert!(matches!(
            acc.add(&mut ctx, bytemuck::cast_slice(&big), None),
            Err(CacheError::CapacityExceeded { what: "vertex", requested: 7, capacity: 6 })
        ));
        assert!(frame.device.calls().is_empty());
        assert!(acc.is_empty());
    }

    #[test]
    fn test_render_is_idempotent() {
        let mut frame = TestFrame::new();
        let mut acc = accumulator(&mut frame, CacheConfig::default());
        acc.add(&mut frame.context(), bytemuck::cast_slice(&triangle(0.0)), None)
            .unwrap();

        acc.render(&mut frame.context()).unwrap();
        acc.render(&mut frame.context()).unwrap();

        assert_eq!(frame.device.draw_call_count(), 1);
        assert_eq!(frame.stats.batch_flushes, 1);
        assert!(acc.is_empty());
        assert_eq!(acc.vertex_count(), 0);
    }

    #[test]
    fn test_failed_render_still_resets() {
        let mut frame = TestFrame::new();
        let mut acc = accumulator(&mut frame, CacheConfig::default());
        acc.add(&mut frame.context(), bytemuck::cast_slice(&triangle(0.0)), None)
            .unwrap();
        acc.add_static_rendering(
            StaticRange::non_indexed(PrimitiveKind::TriangleList, BufferRef::External(acc.vertex_buffer()), 0, 1),
            &mut frame.stats,
        )
        .unwrap();

        frame.device.fail_next("draw_indexed_primitive");
        let err = acc.render(&mut frame.context()).unwrap_err();

        assert!(err.is_device_error());
        assert!(acc.is_empty());
        assert_eq!(acc.vertex_count(), 0);
        assert!(acc.static_ranges().is_empty());
    }

    #[test]
    fn test_adjacent_static_ranges_merge() {
        let mut frame = TestFrame::new();
        let mut acc = accumulator(&mut frame, CacheConfig::default());
        let external = BufferRef::External(acc.vertex_buffer());

        let first = StaticRange::non_indexed(PrimitiveKind::TriangleList, external, 0, 2);
        let second = StaticRange::non_indexed(PrimitiveKind::TriangleList, external, 6, 3);
        acc.add_static_rendering(first, &mut frame.stats).unwrap();
        acc.add_static_rendering(second, &mut frame.stats).unwrap();

        assert_eq!(acc.static_ranges().len(), 1);
        assert_eq!(acc.static_ranges()[0].primitive_count, 5);
        assert_eq!(acc.static_ranges()[0].num_vertices, 15);
        assert_eq!(frame.stats.static_merges, 1);
    }

    #[test]
    fn test_only_last_static_range_is_considered() {
        let mut frame = TestFrame::new();
        let mut acc = accumulator(&mut frame, CacheConfig::default());
        let a = BufferRef::External(acc.vertex_buffer());
        let b = BufferRef::Accumulator;

        for range in [
            StaticRange::non_indexed(PrimitiveKind::TriangleList, a, 0, 1),
            StaticRange::non_indexed(PrimitiveKind::TriangleList, b, 0, 1),
            StaticRange::non_indexed(PrimitiveKind::TriangleList, a, 3, 1),
        ] {
            acc.add_static_rendering(range, &mut frame.stats).unwrap();
        }
        assert_eq!(acc.static_ranges().len(), 3);
    }

    #[test]
    fn test_strip_ranges_never_merge() {
        let mut frame = TestFrame::new();
        let mut acc =
            BatchAccumulator::new(key(PrimitiveKind::TriangleStrip), &CacheConfig::default(), &mut frame.device)
                .unwrap();
        let external = BufferRef::External(acc.vertex_buffer());

        let first = StaticRange::non_indexed(PrimitiveKind::TriangleStrip, external, 0, 2);
        let second = StaticRange::non_indexed(PrimitiveKind::TriangleStrip, external, 4, 2);
        acc.add_static_rendering(first, &mut frame.stats).unwrap();
        acc.add_static_rendering(second, &mut frame.stats).unwrap();
        assert_eq!(acc.static_ranges().len(), 2);
    }

    #[test]
    fn test_static_vertices_host_indices_and_merge() {
        let mut frame = TestFrame::new();
        let mut acc = accumulator(&mut frame, CacheConfig::default());
        let model = frame.device.create_vertex_buffer(12 * 8, BufferUsage::Static).unwrap();

        acc.add_static_vertices(&mut frame.context(), model, 0, &[0, 1, 2])
            .unwrap();
        acc.add_static_vertices(&mut frame.context(), model, 0, &[4, 5, 6])
            .unwrap();

        let ranges = acc.static_ranges();
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].primitive_count, 2);
        assert_eq!((ranges[0].min_index, ranges[0].num_vertices), (0, 7));
        assert_eq!(acc.hosted_index_count(), 6);

        acc.render(&mut frame.context()).unwrap();
        assert_eq!(
            frame.device.draw_calls(),
            [&DeviceCall::DrawIndexedPrimitive {
                kind: PrimitiveKind::TriangleList,
                base_vertex: 0,
                min_index: 0,
                num_vertices: 7,
                start_index: 0,
                primitive_count: 2,
            }]
        );
    }

    #[test]
    fn test_static_indices_host_vertices() {
        let mut frame = TestFrame::new();
        let mut acc = accumulator(&mut frame, CacheConfig::default());
        let indices = frame.device.create_index_buffer(2 * 6, BufferUsage::Static).unwrap();

        acc.add_static_indices(&mut frame.context(), bytemuck::cast_slice(&triangle(0.0)), indices, 0, 3)
            .unwrap();
        acc.add_static_indices(&mut frame.context(), bytemuck::cast_slice(&triangle(1.0)), indices, 3, 3)
            .unwrap();

        assert_eq!(acc.hosted_vertex_count(), 6);
        assert_eq!(acc.static_ranges().len(), 2);
        assert_eq!(acc.static_ranges()[1].base_vertex, 3);

        acc.render(&mut frame.context()).unwrap();
        assert_eq!(frame.device.draw_call_count(), 2);
        assert_eq!(acc.hosted_vertex_count(), 0);
    }

    #[test]
    fn test_zero_primitive_static_payload_is_rejected() {
        let mut frame = TestFrame::new();
        let mut acc = accumulator(&mut frame, CacheConfig::default());
        let model = frame.device.create_vertex_buffer(12 * 8, BufferUsage::Static).unwrap();

        assert!(matches!(
            acc.add_static_vertices(&mut frame.context(), model, 0, &[0, 1]),
            Err(CacheError::InvalidPayload { .. })
        ));
        assert!(acc.is_empty());
    }

    #[test]
    fn test_release_frees_all_buffers() {
        let mut frame = TestFrame::new();
        let mut acc = accumulator(&mut frame, CacheConfig::default());
        let model = frame.device.create_vertex_buffer(12 * 3, BufferUsage::Static).unwrap();
        acc.add_static_vertices(&mut frame.context(), model, 0, &[0, 1, 2])
            .unwrap();
        assert_eq!(frame.device.live_buffer_count(), 4);

        acc.release(&mut frame.device);
        assert_eq!(frame.device.live_buffer_count(), 1);
    }
}
