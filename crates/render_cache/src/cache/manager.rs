//! # Cache Manager
//!
//! Single entry point for batched geometry. Owns one [`MaterialIndex`] per
//! vertex layout, the device, the skin provider, registered effects and the
//! static buffer pool.
//!
//! ## Submission shapes
//!
//! | method                                              | vertices | indices  |
//! |-----------------------------------------------------|----------|----------|
//! | [`render`](CacheManager::render)                    | dynamic  | dynamic  |
//! | [`render_static`](CacheManager::render_static)      | static   | static   |
//! | [`render_static_vertices`](CacheManager::render_static_vertices) | static | dynamic |
//! | [`render_static_indices`](CacheManager::render_static_indices)   | dynamic | static |
//!
//! Unknown materials, buffers and effects as well as malformed payloads are
//! rejected before the device is touched.
//!
//! ## Flushing
//!
//! [`flush`](CacheManager::flush) draws every pending batch, layout by layout
//! and material by material in ascending key order. State setters that would
//! change how pending geometry is drawn (transforms, render states, render
//! target, effects) flush first.

use std::collections::HashMap;

use nalgebra::Matrix4;

use super::accumulator::{self, AccumulatorKey, BatchAccumulator, BufferRef, StaticRange};
use super::frame::{BindState, DeclarationTable, FrameContext};
use super::material_index::MaterialIndex;
use super::static_pool::{StaticBufferId, StaticBufferPool};
use super::CacheStats;
use crate::config::{CacheConfig, Config};
use crate::device::{GraphicsDevice, RenderState, TextureHandle, TransformState};
use crate::effect::{ActiveEffect, Effect, EffectBindings, EffectId, EffectTable};
use crate::error::{CacheError, CacheResult};
use crate::material::{MaterialBinder, MaterialKey, SkinProvider, SkinTable};
use crate::vertex::{PrimitiveKind, Vertex, VertexLayout};

/// A draw over static vertex (and optionally index) buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticDraw {
    /// Vertex source
    pub vertex_buffer: StaticBufferId,
    /// Index source; `None` draws vertices in order
    pub index_buffer: Option<StaticBufferId>,
    /// First vertex (non-indexed) or offset added to every index (indexed)
    pub base_vertex: usize,
    /// First index, indexed draws only
    pub start_index: usize,
    /// Primitives drawn
    pub primitive_count: usize,
    /// `(min_index, num_vertices)` referenced by an indexed draw; the whole
    /// buffer from `base_vertex` when `None`
    pub vertex_span: Option<(usize, usize)>,
}

impl StaticDraw {
    /// Draw `primitive_count` primitives from consecutive vertices
    pub fn non_indexed(vertex_buffer: StaticBufferId, start_vertex: usize, primitive_count: usize) -> Self {
        Self {
            vertex_buffer,
            index_buffer: None,
            base_vertex: start_vertex,
            start_index: 0,
            primitive_count,
            vertex_span: None,
        }
    }

    /// Draw `primitive_count` primitives through an index buffer
    pub fn indexed(
        vertex_buffer: StaticBufferId,
        index_buffer: StaticBufferId,
        start_index: usize,
        primitive_count: usize,
    ) -> Self {
        Self {
            vertex_buffer,
            index_buffer: Some(index_buffer),
            base_vertex: 0,
            start_index,
            primitive_count,
            vertex_span: None,
        }
    }

    /// Offset every index by `base_vertex`
    pub fn with_base_vertex(mut self, base_vertex: usize) -> Self {
        self.base_vertex = base_vertex;
        self
    }

    /// Restrict the referenced vertices to `min_index..min_index + num_vertices`
    pub fn with_vertex_span(mut self, min_index: usize, num_vertices: usize) -> Self {
        self.vertex_span = Some((min_index, num_vertices));
        self
    }
}

/// Index range inside a static index buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticIndices {
    /// Index source
    pub buffer: StaticBufferId,
    /// First index
    pub start_index: usize,
    /// Number of indices
    pub count: usize,
}

/// Device-facing half of the manager, borrowed separately from the indices
struct Backend<D, S> {
    device: D,
    skins: S,
    binder: MaterialBinder,
    bind: BindState,
    declarations: DeclarationTable,
    effects: EffectTable,
    active_effect: Option<(EffectId, EffectBindings)>,
    stats: CacheStats,
}

impl<D: GraphicsDevice, S: SkinProvider> Backend<D, S> {
    fn context(&mut self) -> FrameContext<'_> {
        let effect = match &self.active_effect {
            Some((id, bindings)) => self
                .effects
                .get_mut(*id)
                .map(|effect| ActiveEffect { effect, bindings }),
            None => None,
        };
        FrameContext {
            device: &mut self.device,
            skins: &self.skins,
            binder: &mut self.binder,
            bind: &mut self.bind,
            declarations: &mut self.declarations,
            effect,
            stats: &mut self.stats,
        }
    }

    fn check_material(&self, material: MaterialKey) -> CacheResult<()> {
        if self.skins.contains(material) {
            Ok(())
        } else {
            Err(CacheError::UnknownMaterial(material))
        }
    }
}

/// Create the accumulator for `key` if needed and return it
fn accumulator_for<'a>(
    index: &'a mut MaterialIndex,
    config: &CacheConfig,
    device: &mut dyn GraphicsDevice,
    key: AccumulatorKey,
) -> CacheResult<&'a mut BatchAccumulator> {
    index.insert(key.material, key.primitive, || BatchAccumulator::new(key, config, device))?;
    index
        .get_mut(key.material, key.primitive)
        .ok_or(CacheError::UnknownMaterial(key.material))
}

const fn transform_slot(state: TransformState) -> usize {
    match state {
        TransformState::World => 0,
        TransformState::View => 1,
        TransformState::Projection => 2,
    }
}

fn logged<T>(operation: &str, result: CacheResult<T>) -> CacheResult<T> {
    if let Err(err) = &result {
        if err.is_device_error() {
            log::error!("CacheManager::{} failed: {}", operation, err);
        } else {
            log::debug!("CacheManager::{} rejected: {}", operation, err);
        }
    }
    result
}

/// Batched renderer front end
///
/// All methods must be called from the thread that owns the device.
pub struct CacheManager<D: GraphicsDevice, S: SkinProvider = SkinTable> {
    config: CacheConfig,
    indices: [MaterialIndex; VertexLayout::COUNT],
    backend: Backend<D, S>,
    static_buffers: StaticBufferPool,
    transforms: [Option<Matrix4<f32>>; 3],
    render_states: HashMap<RenderState, u32>,
    shadow_target: Option<TextureHandle>,
}

impl<D: GraphicsDevice, S: SkinProvider> CacheManager<D, S> {
    /// Create a manager over `device`, resolving materials through `skins`
    pub fn new(device: D, skins: S, config: CacheConfig) -> CacheResult<Self> {
        config.validate()?;
        log::info!(
            "Creating render cache: {} vertices / {} indices per batch",
            config.max_vertices,
            config.max_indices
        );
        Ok(Self {
            config,
            indices: VertexLayout::ALL.map(MaterialIndex::new),
            backend: Backend {
                device,
                skins,
                binder: MaterialBinder::new(),
                bind: BindState::default(),
                declarations: DeclarationTable::default(),
                effects: EffectTable::new(),
                active_effect: None,
                stats: CacheStats::default(),
            },
            static_buffers: StaticBufferPool::new(),
            transforms: [None; 3],
            render_states: HashMap::new(),
            shadow_target: None,
        })
    }

    /// Capacities every accumulator is created with
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The wrapped device
    pub fn device(&self) -> &D {
        &self.backend.device
    }

    /// Mutable access to the wrapped device
    ///
    /// State changed behind the manager's back is not tracked; call
    /// [`invalidate_state`](Self::invalidate_state) afterwards.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.backend.device
    }

    /// The skin provider
    pub fn skins(&self) -> &S {
        &self.backend.skins
    }

    /// Mutable access to the skin provider, e.g. to register new skins
    pub fn skins_mut(&mut self) -> &mut S {
        &mut self.backend.skins
    }

    /// Statistics since the last [`begin_frame`](Self::begin_frame)
    pub fn stats(&self) -> CacheStats {
        self.backend.stats
    }

    /// Material currently bound on the device, if known
    pub fn current_material(&self) -> Option<MaterialKey> {
        self.backend.binder.current()
    }

    /// Material index for `layout`
    pub fn material_index(&self, layout: VertexLayout) -> &MaterialIndex {
        &self.indices[layout.index()]
    }

    /// Accumulator for a combination, if anything was ever submitted for it
    pub fn accumulator(
        &self,
        layout: VertexLayout,
        material: MaterialKey,
        primitive: PrimitiveKind,
    ) -> Option<&BatchAccumulator> {
        self.indices[layout.index()].get(material, primitive)
    }

    /// Static buffers registered with the manager
    pub fn static_buffers(&self) -> &StaticBufferPool {
        &self.static_buffers
    }

    /// Forget all cached device bindings so the next binds reach the device
    pub fn invalidate_state(&mut self) {
        self.backend.bind.reset();
        self.backend.binder.invalidate();
        self.transforms = [None; 3];
        self.render_states.clear();
    }

    /// Queue dynamic vertices with optional dynamic indices
    ///
    /// Without `indices` the vertices are drawn in order.
    pub fn render(
        &mut self,
        kind: PrimitiveKind,
        layout: VertexLayout,
        material: MaterialKey,
        vertices: &[u8],
        indices: Option<&[u16]>,
    ) -> CacheResult<()> {
        let result = self.render_dynamic(kind, layout, material, vertices, indices);
        logged("render", result)
    }

    fn render_dynamic(
        &mut self,
        kind: PrimitiveKind,
        layout: VertexLayout,
        material: MaterialKey,
        vertices: &[u8],
        indices: Option<&[u16]>,
    ) -> CacheResult<()> {
        self.backend.check_material(material)?;
        accumulator::payload_counts(layout, &self.config, vertices, indices)?;

        let key = AccumulatorKey {
            layout,
            material,
            primitive: kind,
        };
        let accumulator = accumulator_for(
            &mut self.indices[layout.index()],
            &self.config,
            &mut self.backend.device,
            key,
        )?;
        accumulator.add(&mut self.backend.context(), vertices, indices)
    }

    /// Queue typed vertices; the layout comes from the vertex type
    pub fn render_vertices<V: Vertex>(
        &mut self,
        kind: PrimitiveKind,
        material: MaterialKey,
        vertices: &[V],
        indices: Option<&[u16]>,
    ) -> CacheResult<()> {
        self.render(kind, V::LAYOUT, material, bytemuck::cast_slice(vertices), indices)
    }

    /// Queue a draw over static vertex and index buffers
    ///
    /// Consecutive draws over adjacent ranges of the same buffers are merged
    /// into one device draw.
    pub fn render_static(
        &mut self,
        kind: PrimitiveKind,
        layout: VertexLayout,
        material: MaterialKey,
        draw: StaticDraw,
    ) -> CacheResult<()> {
        let result = self.queue_static(kind, layout, material, draw);
        logged("render_static", result)
    }

    fn queue_static(
        &mut self,
        kind: PrimitiveKind,
        layout: VertexLayout,
        material: MaterialKey,
        draw: StaticDraw,
    ) -> CacheResult<()> {
        self.backend.check_material(material)?;
        let range = self.static_range(kind, layout, draw)?;

        let key = AccumulatorKey {
            layout,
            material,
            primitive: kind,
        };
        let accumulator = accumulator_for(
            &mut self.indices[layout.index()],
            &self.config,
            &mut self.backend.device,
            key,
        )?;
        accumulator.add_static_rendering(range, &mut self.backend.stats)
    }

    /// Resolve and bounds-check a static draw
    fn static_range(&self, kind: PrimitiveKind, layout: VertexLayout, draw: StaticDraw) -> CacheResult<StaticRange> {
        let (vertex_handle, vertex_count) = self.static_buffers.vertices(draw.vertex_buffer, layout)?;
        if draw.primitive_count == 0 {
            return Err(CacheError::invalid_payload("static draw has no primitives"));
        }
        let elements = kind.element_count(draw.primitive_count);

        let index_buffer = match draw.index_buffer {
            None => {
                if draw.base_vertex + elements > vertex_count {
                    return Err(CacheError::invalid_payload(format!(
                        "vertices {}..{} exceed the {} in {:?}",
                        draw.base_vertex,
                        draw.base_vertex + elements,
                        vertex_count,
                        draw.vertex_buffer
                    )));
                }
                return Ok(StaticRange::non_indexed(
                    kind,
                    BufferRef::External(vertex_handle),
                    draw.base_vertex,
                    draw.primitive_count,
                ));
            }
            Some(id) => id,
        };

        let (index_handle, index_count) = self.static_buffers.indices(index_buffer)?;
        if draw.start_index + elements > index_count {
            return Err(CacheError::invalid_payload(format!(
                "indices {}..{} exceed the {} in {:?}",
                draw.start_index,
                draw.start_index + elements,
                index_count,
                index_buffer
            )));
        }
        let (min_index, num_vertices) = draw
            .vertex_span
            .unwrap_or((0, vertex_count.saturating_sub(draw.base_vertex)));
        if num_vertices == 0 || draw.base_vertex + min_index + num_vertices > vertex_count {
            return Err(CacheError::invalid_payload(format!(
                "vertex span {}+{}..+{} does not fit the {} in {:?}",
                draw.base_vertex, min_index, num_vertices, vertex_count, draw.vertex_buffer
            )));
        }
        let (low, high) = self
            .static_buffers
            .index_bounds(index_buffer, draw.start_index, elements)?;
        if low < min_index || high >= min_index + num_vertices {
            return Err(CacheError::invalid_payload(format!(
                "indices {}..={} of {:?} fall outside vertices {}..{} above base {}",
                low,
                high,
                index_buffer,
                min_index,
                min_index + num_vertices,
                draw.base_vertex
            )));
        }

        Ok(StaticRange {
            base_vertex: draw.base_vertex,
            min_index,
            num_vertices,
            start_index: draw.start_index,
            primitive_count: draw.primitive_count,
            vertex_buffer: BufferRef::External(vertex_handle),
            index_buffer: Some(BufferRef::External(index_handle)),
        })
    }

    /// Queue dynamic indices over a static vertex buffer
    ///
    /// `indices` are relative to `base_vertex`.
    pub fn render_static_vertices(
        &mut self,
        kind: PrimitiveKind,
        layout: VertexLayout,
        material: MaterialKey,
        vertex_buffer: StaticBufferId,
        base_vertex: usize,
        indices: &[u16],
    ) -> CacheResult<()> {
        let result = self.queue_static_vertices(kind, layout, material, vertex_buffer, base_vertex, indices);
        logged("render_static_vertices", result)
    }

    fn queue_static_vertices(
        &mut self,
        kind: PrimitiveKind,
        layout: VertexLayout,
        material: MaterialKey,
        vertex_buffer: StaticBufferId,
        base_vertex: usize,
        indices: &[u16],
    ) -> CacheResult<()> {
        self.backend.check_material(material)?;
        let (handle, vertex_count) = self.static_buffers.vertices(vertex_buffer, layout)?;
        let highest = indices
            .iter()
            .max()
            .map(|&index| usize::from(index))
            .ok_or_else(|| CacheError::invalid_payload("empty index payload"))?;
        if base_vertex + highest >= vertex_count {
            return Err(CacheError::invalid_payload(format!(
                "index {} + base {} out of range for the {} vertices in {:?}",
                highest, base_vertex, vertex_count, vertex_buffer
            )));
        }
        accumulator::check_capacity("static index", indices.len(), self.config.max_static_indices)?;

        let key = AccumulatorKey {
            layout,
            material,
            primitive: kind,
        };
        let accumulator = accumulator_for(
            &mut self.indices[layout.index()],
            &self.config,
            &mut self.backend.device,
            key,
        )?;
        accumulator.add_static_vertices(&mut self.backend.context(), handle, base_vertex, indices)
    }

    /// Queue dynamic vertices drawn through a static index buffer
    ///
    /// The static indices are relative to the first of `vertices`.
    pub fn render_static_indices(
        &mut self,
        kind: PrimitiveKind,
        layout: VertexLayout,
        material: MaterialKey,
        vertices: &[u8],
        indices: StaticIndices,
    ) -> CacheResult<()> {
        let result = self.queue_static_indices(kind, layout, material, vertices, indices);
        logged("render_static_indices", result)
    }

    fn queue_static_indices(
        &mut self,
        kind: PrimitiveKind,
        layout: VertexLayout,
        material: MaterialKey,
        vertices: &[u8],
        indices: StaticIndices,
    ) -> CacheResult<()> {
        self.backend.check_material(material)?;
        let (handle, index_count) = self.static_buffers.indices(indices.buffer)?;
        if indices.count == 0 || indices.start_index + indices.count > index_count {
            return Err(CacheError::invalid_payload(format!(
                "indices {}..{} exceed the {} in {:?}",
                indices.start_index,
                indices.start_index + indices.count,
                index_count,
                indices.buffer
            )));
        }
        let vertex_count = accumulator::vertex_count(layout, vertices)?;
        let (_, highest) = self
            .static_buffers
            .index_bounds(indices.buffer, indices.start_index, indices.count)?;
        if highest >= vertex_count {
            return Err(CacheError::invalid_payload(format!(
                "index {} of {:?} out of range for {} vertices",
                highest, indices.buffer, vertex_count
            )));
        }
        accumulator::check_capacity("static vertex", vertex_count, self.config.max_static_vertices)?;

        let key = AccumulatorKey {
            layout,
            material,
            primitive: kind,
        };
        let accumulator = accumulator_for(
            &mut self.indices[layout.index()],
            &self.config,
            &mut self.backend.device,
            key,
        )?;
        accumulator.add_static_indices(
            &mut self.backend.context(),
            vertices,
            handle,
            indices.start_index,
            indices.count,
        )
    }

    /// Bind `material` now; a no-op when it is already bound
    pub fn set_material(&mut self, material: MaterialKey) -> CacheResult<()> {
        let result = self
            .backend
            .check_material(material)
            .and_then(|()| self.backend.context().bind_material(material));
        logged("set_material", result)
    }

    /// Draw everything pending
    ///
    /// Every layout is flushed even after a failure; accumulators after the
    /// first failure are discarded and that failure is returned. Buffer
    /// bindings are forgotten afterwards.
    pub fn flush(&mut self) -> CacheResult<()> {
        let mut ctx = self.backend.context();
        let mut first_error = None;
        for index in &mut self.indices {
            if first_error.is_some() {
                index.discard_all();
            } else if let Err(err) = index.flush(&mut ctx) {
                first_error = Some(err);
            }
        }
        ctx.bind.reset();
        ctx.stats.cache_flushes += 1;
        log::trace!("Cache flush #{} done", ctx.stats.cache_flushes);
        logged("flush", first_error.map_or(Ok(()), Err))
    }

    /// Flush, then set a transform
    pub fn set_transform(&mut self, state: TransformState, matrix: &Matrix4<f32>) -> CacheResult<()> {
        self.flush()?;
        let slot = transform_slot(state);
        let result = self.backend.device.set_transform(state, matrix).map_err(CacheError::from);
        self.transforms[slot] = result.is_ok().then_some(*matrix);
        logged("set_transform", result)
    }

    /// Last transform set through the manager
    pub fn transform(&self, state: TransformState) -> Option<&Matrix4<f32>> {
        self.transforms[transform_slot(state)].as_ref()
    }

    /// Set a render state, flushing first when the value changes
    pub fn set_render_state(&mut self, state: RenderState, value: u32) -> CacheResult<()> {
        if self.render_states.get(&state) == Some(&value) {
            return Ok(());
        }
        self.flush()?;
        self.render_states.remove(&state);
        self.backend.device.set_render_state(state, value)?;
        self.render_states.insert(state, value);
        Ok(())
    }

    /// Flush, then redirect rendering into a shadow map
    pub fn begin_shadow_pass(&mut self, target: TextureHandle) -> CacheResult<()> {
        self.flush()?;
        self.backend.device.set_render_target(Some(target))?;
        log::debug!("Entered shadow pass targeting {:?}", target);
        self.shadow_target = Some(target);
        Ok(())
    }

    /// Flush, then return to the back buffer; a no-op outside a shadow pass
    pub fn end_shadow_pass(&mut self) -> CacheResult<()> {
        if self.shadow_target.is_none() {
            return Ok(());
        }
        self.flush()?;
        self.backend.device.set_render_target(None)?;
        log::debug!("Left shadow pass");
        self.shadow_target = None;
        Ok(())
    }

    /// Shadow map currently rendered into
    pub fn shadow_target(&self) -> Option<TextureHandle> {
        self.shadow_target
    }

    /// Take ownership of an effect
    pub fn register_effect(&mut self, effect: Box<dyn Effect>) -> EffectId {
        self.backend.effects.register(effect)
    }

    /// Borrow a registered effect
    pub fn effect(&self, id: EffectId) -> Option<&dyn Effect> {
        self.backend.effects.get(id)
    }

    /// Effect currently wrapping draws
    pub fn active_effect(&self) -> Option<EffectId> {
        self.backend.active_effect.as_ref().map(|(id, _)| *id)
    }

    /// Flush, then draw through `id` until disabled
    ///
    /// Parameter handles are looked up once here and the bound skin is
    /// pushed into the effect.
    pub fn enable_effect(&mut self, id: EffectId) -> CacheResult<()> {
        if !self.backend.effects.contains(id) {
            return Err(CacheError::UnknownEffect(id));
        }
        if self.active_effect() == Some(id) {
            return Ok(());
        }
        self.flush()?;

        let Backend {
            effects,
            active_effect,
            binder,
            skins,
            ..
        } = &mut self.backend;
        let effect = effects.get_mut(id).ok_or(CacheError::UnknownEffect(id))?;
        let bindings = EffectBindings::lookup(&*effect);
        log::debug!("Enabled effect '{}'", effect.name());
        let bindings = &*active_effect.insert((id, bindings));
        let mut active = ActiveEffect {
            effect,
            bindings: &bindings.1,
        };
        logged("enable_effect", binder.refresh_effect(&*skins, &mut active))
    }

    /// Flush, then return to fixed-function drawing
    pub fn disable_effect(&mut self) -> CacheResult<()> {
        if self.backend.active_effect.is_none() {
            return Ok(());
        }
        self.flush()?;
        self.backend.active_effect = None;
        log::debug!("Disabled effect");
        Ok(())
    }

    /// Remove an effect, disabling it first if active
    pub fn remove_effect(&mut self, id: EffectId) -> CacheResult<Box<dyn Effect>> {
        if self.active_effect() == Some(id) {
            self.disable_effect()?;
        }
        self.backend.effects.remove(id).ok_or(CacheError::UnknownEffect(id))
    }

    /// Upload raw `layout` vertices into a new static buffer
    pub fn create_static_vertex_buffer(&mut self, layout: VertexLayout, bytes: &[u8]) -> CacheResult<StaticBufferId> {
        self.static_buffers
            .create_vertex_buffer(&mut self.backend.device, layout, bytes)
    }

    /// Upload typed vertices into a new static buffer
    pub fn create_static_vertices<V: Vertex>(&mut self, vertices: &[V]) -> CacheResult<StaticBufferId> {
        self.create_static_vertex_buffer(V::LAYOUT, bytemuck::cast_slice(vertices))
    }

    /// Upload indices into a new static buffer
    pub fn create_static_index_buffer(&mut self, indices: &[u16]) -> CacheResult<StaticBufferId> {
        self.static_buffers
            .create_index_buffer(&mut self.backend.device, indices)
    }

    /// Flush pending draws that may reference the buffer, then release it
    pub fn release_static_buffer(&mut self, id: StaticBufferId) -> CacheResult<()> {
        self.static_buffers.get(id)?;
        self.flush()?;
        let handle = self.static_buffers.remove(id)?;
        self.backend.bind.forget_buffer(handle);
        self.backend.device.release_buffer(handle);
        Ok(())
    }

    /// Start a frame: statistics are reset
    pub fn begin_frame(&mut self) {
        self.backend.stats = CacheStats::default();
    }

    /// Finish a frame: flush and return the frame's statistics
    pub fn end_frame(&mut self) -> CacheResult<CacheStats> {
        self.flush()?;
        let stats = self.backend.stats;
        log::debug!(
            "Frame: {} draw calls, {} primitives, {} batches, {} overflow flushes",
            stats.draw_calls,
            stats.primitives,
            stats.batch_flushes,
            stats.overflow_flushes
        );
        Ok(stats)
    }

    /// Drop pending geometry and release every accumulator
    ///
    /// Static buffers and effects stay registered.
    pub fn clear_all(&mut self) {
        let mut released = 0;
        for index in &mut self.indices {
            released += index.accumulator_count();
            index.clear(&mut self.backend.device);
        }
        self.backend.bind.reset();
        log::debug!("Cleared render cache ({} accumulators released)", released);
    }
}

impl<D: GraphicsDevice, S: SkinProvider> Drop for CacheManager<D, S> {
    fn drop(&mut self) {
        self.clear_all();
        self.static_buffers.release_all(&mut self.backend.device);
    }
}
