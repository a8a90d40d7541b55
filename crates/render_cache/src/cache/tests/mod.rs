//! End-to-end frames through [`CacheManager`] against the recording device

use nalgebra::Matrix4;

use super::{CacheManager, StaticDraw, StaticIndices};
use crate::config::CacheConfig;
use crate::device::{DeviceCall, RecordingDevice, RenderState, TextureHandle, TransformState};
use crate::effect::{Effect, EffectId, RecordingEffect, DIFFUSE_PARAMETER};
use crate::error::CacheError;
use crate::material::{MaterialColors, MaterialKey, Skin, SkinTable};
use crate::vertex::{ColorVertex, PositionVertex, PrimitiveKind, VertexLayout};

type TestManager = CacheManager<RecordingDevice>;

fn manager() -> TestManager {
    manager_with(CacheConfig::default())
}

fn manager_with(config: CacheConfig) -> TestManager {
    CacheManager::new(RecordingDevice::new(), SkinTable::new(), config).unwrap()
}

fn triangle(offset: f32) -> [PositionVertex; 3] {
    [
        PositionVertex { position: [offset, 0.0, 0.0] },
        PositionVertex { position: [offset, 1.0, 0.0] },
        PositionVertex { position: [offset, 0.0, 1.0] },
    ]
}

fn quad() -> [PositionVertex; 4] {
    [
        PositionVertex { position: [0.0, 0.0, 0.0] },
        PositionVertex { position: [1.0, 0.0, 0.0] },
        PositionVertex { position: [1.0, 1.0, 0.0] },
        PositionVertex { position: [0.0, 1.0, 0.0] },
    ]
}

fn strip_of(count: usize) -> Vec<PositionVertex> {
    (0..count)
        .map(|i| PositionVertex { position: [i as f32, 0.0, 0.0] })
        .collect()
}

fn submit_triangle(manager: &mut TestManager, material: MaterialKey) {
    manager
        .render_vertices(PrimitiveKind::TriangleList, material, &triangle(0.0), None)
        .unwrap();
}

fn stage0_textures(device: &RecordingDevice) -> Vec<Option<TextureHandle>> {
    device
        .calls()
        .iter()
        .filter_map(|call| match call {
            DeviceCall::SetTexture { stage: 0, texture } => Some(*texture),
            _ => None,
        })
        .collect()
}

fn position_of(device: &RecordingDevice, predicate: impl Fn(&DeviceCall) -> bool) -> usize {
    device.calls().iter().position(predicate).unwrap()
}

fn recording_effect(manager: &TestManager, id: EffectId) -> &RecordingEffect {
    manager
        .effect(id)
        .unwrap()
        .as_any()
        .downcast_ref::<RecordingEffect>()
        .unwrap()
}

#[test]
fn test_new_rejects_invalid_config() {
    let result = CacheManager::new(RecordingDevice::new(), SkinTable::new(), CacheConfig::with_capacity(2, 8));
    assert!(matches!(result, Err(CacheError::Config(_))));
}

#[test]
fn test_third_triangle_overflows_six_vertex_batch() {
    let mut manager = manager_with(CacheConfig::with_capacity(6, 6));

    submit_triangle(&mut manager, MaterialKey::NONE);
    submit_triangle(&mut manager, MaterialKey::NONE);
    assert_eq!(manager.device().draw_call_count(), 0);

    submit_triangle(&mut manager, MaterialKey::NONE);
    assert_eq!(manager.device().draw_call_count(), 1);
    assert_eq!(manager.stats().overflow_flushes, 1);

    let acc = manager
        .accumulator(VertexLayout::Position, MaterialKey::NONE, PrimitiveKind::TriangleList)
        .unwrap();
    assert_eq!(acc.vertex_count(), 3);
    assert!(!acc.is_empty());
}

#[test]
fn test_capacity_invariant_holds_after_every_add() {
    let mut manager = manager_with(CacheConfig::with_capacity(8, 12));
    let sizes = [3, 6, 3, 8, 3, 3, 6, 3, 3, 3, 8];

    for size in sizes {
        manager
            .render_vertices(PrimitiveKind::TriangleStrip, MaterialKey::NONE, &strip_of(size), None)
            .unwrap();
        let acc = manager
            .accumulator(VertexLayout::Position, MaterialKey::NONE, PrimitiveKind::TriangleStrip)
            .unwrap();
        assert!(acc.vertex_count() <= acc.max_vertices());
        assert!(acc.index_count() <= acc.max_indices());
    }
}

#[test]
fn test_supplied_indices_are_rebiased() {
    let mut manager = manager();
    submit_triangle(&mut manager, MaterialKey::NONE);
    manager
        .render_vertices(
            PrimitiveKind::TriangleList,
            MaterialKey::NONE,
            &quad(),
            Some(&[0, 1, 2, 2, 3, 0]),
        )
        .unwrap();

    let acc = manager
        .accumulator(VertexLayout::Position, MaterialKey::NONE, PrimitiveKind::TriangleList)
        .unwrap();
    let indices = manager.device().index_contents(acc.index_buffer()).unwrap();
    assert_eq!(indices[..9], [0, 1, 2, 3, 4, 5, 5, 6, 3]);
}

#[test]
fn test_oversized_payload_is_rejected_before_any_device_call() {
    let mut manager = manager_with(CacheConfig::with_capacity(6, 6));

    let result = manager.render_vertices(PrimitiveKind::TriangleList, MaterialKey::NONE, &strip_of(9), None);

    assert!(matches!(result, Err(CacheError::CapacityExceeded { what: "vertex", .. })));
    assert!(manager.device().calls().is_empty());
    assert!(manager.material_index(VertexLayout::Position).is_empty());
}

#[test]
fn test_flush_twice_draws_once() {
    let mut manager = manager();
    submit_triangle(&mut manager, MaterialKey::NONE);

    manager.flush().unwrap();
    manager.flush().unwrap();

    assert_eq!(manager.device().draw_call_count(), 1);
    assert_eq!(manager.stats().cache_flushes, 2);
    assert_eq!(manager.stats().batch_flushes, 1);
}

#[test]
fn test_flush_visits_layouts_then_materials_in_order() {
    let mut manager = manager();
    let first = manager.skins_mut().register(Skin::textured(TextureHandle(1)));
    let second = manager.skins_mut().register(Skin::textured(TextureHandle(2)));
    let colored = [ColorVertex { position: [0.0; 3], color: 0 }; 3];

    submit_triangle(&mut manager, second);
    manager
        .render_vertices(PrimitiveKind::TriangleList, first, &colored, None)
        .unwrap();
    submit_triangle(&mut manager, first);
    manager.flush().unwrap();

    assert_eq!(
        stage0_textures(manager.device()),
        [Some(TextureHandle(1)), Some(TextureHandle(2)), Some(TextureHandle(1))]
    );
    assert_eq!(manager.stats().material_binds, 3);
    assert_eq!(manager.device().draw_call_count(), 3);
}

#[test]
fn test_material_bound_once_for_all_its_primitive_kinds() {
    let mut manager = manager();
    let skin = manager.skins_mut().register(Skin::textured(TextureHandle(3)));

    submit_triangle(&mut manager, skin);
    manager
        .render_vertices(PrimitiveKind::LineList, skin, &strip_of(2), None)
        .unwrap();
    manager.flush().unwrap();

    assert_eq!(manager.stats().material_binds, 1);
    assert_eq!(manager.device().draw_call_count(), 2);
    let kinds: Vec<_> = manager
        .device()
        .draw_calls()
        .into_iter()
        .filter_map(|call| match call {
            DeviceCall::DrawIndexedPrimitive { kind, .. } => Some(*kind),
            _ => None,
        })
        .collect();
    assert_eq!(kinds, [PrimitiveKind::LineList, PrimitiveKind::TriangleList]);
}

#[test]
fn test_set_material_skips_redundant_binds() {
    let mut manager = manager();
    let skin = manager
        .skins_mut()
        .register(Skin::untextured(MaterialColors::solid([1.0, 0.0, 0.0, 1.0])));

    manager.set_material(skin).unwrap();
    manager.set_material(skin).unwrap();
    manager.set_material(MaterialKey::NONE).unwrap();
    manager.set_material(MaterialKey::NONE).unwrap();

    let material_calls = manager
        .device()
        .calls()
        .iter()
        .filter(|call| matches!(call, DeviceCall::SetMaterial(_)))
        .count();
    assert_eq!(material_calls, 2);
    assert_eq!(manager.stats().material_binds, 2);
    assert_eq!(manager.current_material(), Some(MaterialKey::NONE));
}

#[test]
fn test_unknown_ids_are_rejected_before_any_device_call() {
    let mut manager = manager();

    let result = manager.render_vertices(PrimitiveKind::TriangleList, MaterialKey(42), &triangle(0.0), None);
    assert!(matches!(result, Err(CacheError::UnknownMaterial(MaterialKey(42)))));
    assert!(matches!(
        manager.set_material(MaterialKey(42)),
        Err(CacheError::UnknownMaterial(_))
    ));
    assert!(manager.device().calls().is_empty());

    let buffer = manager.create_static_vertices(&quad()).unwrap();
    manager.release_static_buffer(buffer).unwrap();
    manager.device_mut().clear_calls();
    let result = manager.render_static(
        PrimitiveKind::TriangleList,
        VertexLayout::Position,
        MaterialKey::NONE,
        StaticDraw::non_indexed(buffer, 0, 1),
    );
    assert!(matches!(result, Err(CacheError::UnknownBuffer(id)) if id == buffer));

    let effect = manager.register_effect(Box::new(RecordingEffect::new("unused", 1, &[])));
    manager.remove_effect(effect).unwrap();
    assert!(matches!(manager.enable_effect(effect), Err(CacheError::UnknownEffect(_))));
    assert!(manager.device().calls().is_empty());
}

#[test]
fn test_adjacent_static_ranges_share_one_draw() {
    let mut manager = manager();
    let vertices: Vec<_> = (0..4).flat_map(|i| triangle(i as f32)).collect();
    let buffer = manager.create_static_vertices(&vertices).unwrap();
    manager.device_mut().clear_calls();

    for start in [0, 6] {
        manager
            .render_static(
                PrimitiveKind::TriangleList,
                VertexLayout::Position,
                MaterialKey::NONE,
                StaticDraw::non_indexed(buffer, start, 2),
            )
            .unwrap();
    }
    assert_eq!(manager.stats().static_merges, 1);
    assert_eq!(manager.stats().static_ranges, 1);

    manager.flush().unwrap();
    assert_eq!(
        manager.device().draw_calls(),
        [&DeviceCall::DrawPrimitive {
            kind: PrimitiveKind::TriangleList,
            start_vertex: 0,
            primitive_count: 4,
        }]
    );
}

#[test]
fn test_static_range_only_joins_the_latest_range() {
    let mut manager = manager();
    let vertices: Vec<_> = (0..3).flat_map(|i| triangle(i as f32)).collect();
    let buffer = manager.create_static_vertices(&vertices).unwrap();

    for start in [0, 6, 3] {
        manager
            .render_static(
                PrimitiveKind::TriangleList,
                VertexLayout::Position,
                MaterialKey::NONE,
                StaticDraw::non_indexed(buffer, start, 1),
            )
            .unwrap();
    }
    manager.flush().unwrap();

    assert_eq!(manager.stats().static_merges, 0);
    assert_eq!(manager.device().draw_call_count(), 3);
}

#[test]
fn test_indexed_static_draw() {
    let mut manager = manager();
    let vertices = manager.create_static_vertices(&quad()).unwrap();
    let indices = manager.create_static_index_buffer(&[0, 1, 2, 2, 3, 0]).unwrap();

    let out_of_range = manager.render_static(
        PrimitiveKind::TriangleList,
        VertexLayout::Position,
        MaterialKey::NONE,
        StaticDraw::indexed(vertices, indices, 3, 2),
    );
    assert!(matches!(out_of_range, Err(CacheError::InvalidPayload { .. })));

    manager
        .render_static(
            PrimitiveKind::TriangleList,
            VertexLayout::Position,
            MaterialKey::NONE,
            StaticDraw::indexed(vertices, indices, 0, 2),
        )
        .unwrap();
    manager.flush().unwrap();

    assert_eq!(
        manager.device().draw_calls(),
        [&DeviceCall::DrawIndexedPrimitive {
            kind: PrimitiveKind::TriangleList,
            base_vertex: 0,
            min_index: 0,
            num_vertices: 4,
            start_index: 0,
            primitive_count: 2,
        }]
    );
}

#[test]
fn test_static_layout_mismatch_is_rejected() {
    let mut manager = manager();
    let vertices = manager.create_static_vertices(&quad()).unwrap();

    let result = manager.render_static(
        PrimitiveKind::TriangleList,
        VertexLayout::PositionColor,
        MaterialKey::NONE,
        StaticDraw::non_indexed(vertices, 0, 1),
    );
    assert!(matches!(result, Err(CacheError::InvalidPayload { .. })));
}

#[test]
fn test_dynamic_indices_over_static_vertices() {
    let mut manager = manager();
    let vertices = manager.create_static_vertices(&quad()).unwrap();

    let out_of_range = manager.render_static_vertices(
        PrimitiveKind::TriangleList,
        VertexLayout::Position,
        MaterialKey::NONE,
        vertices,
        1,
        &[0, 1, 3],
    );
    assert!(matches!(out_of_range, Err(CacheError::InvalidPayload { .. })));

    manager
        .render_static_vertices(
            PrimitiveKind::TriangleList,
            VertexLayout::Position,
            MaterialKey::NONE,
            vertices,
            0,
            &[0, 1, 2, 2, 3, 0],
        )
        .unwrap();
    manager.flush().unwrap();

    assert_eq!(
        manager.device().draw_calls(),
        [&DeviceCall::DrawIndexedPrimitive {
            kind: PrimitiveKind::TriangleList,
            base_vertex: 0,
            min_index: 0,
            num_vertices: 4,
            start_index: 0,
            primitive_count: 2,
        }]
    );
}

#[test]
fn test_dynamic_vertices_through_static_indices() {
    let mut manager = manager();
    let indices = manager.create_static_index_buffer(&[0, 1, 2]).unwrap();
    let vertices = triangle(0.0);

    manager
        .render_static_indices(
            PrimitiveKind::TriangleList,
            VertexLayout::Position,
            MaterialKey::NONE,
            bytemuck::cast_slice(&vertices),
            StaticIndices {
                buffer: indices,
                start_index: 0,
                count: 3,
            },
        )
        .unwrap();
    manager.flush().unwrap();

    assert_eq!(
        manager.device().draw_calls(),
        [&DeviceCall::DrawIndexedPrimitive {
            kind: PrimitiveKind::TriangleList,
            base_vertex: 0,
            min_index: 0,
            num_vertices: 3,
            start_index: 0,
            primitive_count: 1,
        }]
    );

    let too_many = manager.render_static_indices(
        PrimitiveKind::TriangleList,
        VertexLayout::Position,
        MaterialKey::NONE,
        bytemuck::cast_slice(&vertices),
        StaticIndices {
            buffer: indices,
            start_index: 1,
            count: 3,
        },
    );
    assert!(matches!(too_many, Err(CacheError::InvalidPayload { .. })));
}

#[test]
fn test_static_indices_past_the_dynamic_vertices_are_rejected() {
    let mut manager = manager();
    let indices = manager.create_static_index_buffer(&[0, 1, 9, 0, 1, 2]).unwrap();
    let vertices = triangle(0.0);
    manager.device_mut().clear_calls();

    let result = manager.render_static_indices(
        PrimitiveKind::TriangleList,
        VertexLayout::Position,
        MaterialKey::NONE,
        bytemuck::cast_slice(&vertices),
        StaticIndices {
            buffer: indices,
            start_index: 0,
            count: 3,
        },
    );

    assert!(matches!(result, Err(CacheError::InvalidPayload { .. })));
    assert!(manager.device().calls().is_empty());
    assert!(manager.material_index(VertexLayout::Position).is_empty());

    // The in-range window of the same buffer is fine
    manager
        .render_static_indices(
            PrimitiveKind::TriangleList,
            VertexLayout::Position,
            MaterialKey::NONE,
            bytemuck::cast_slice(&vertices),
            StaticIndices {
                buffer: indices,
                start_index: 3,
                count: 3,
            },
        )
        .unwrap();
    manager.flush().unwrap();
    assert_eq!(manager.device().draw_call_count(), 1);
}

#[test]
fn test_static_draw_indices_must_address_the_vertex_buffer() {
    let mut manager = manager();
    let small = manager.create_static_vertices(&triangle(0.0)).unwrap();
    let wild = manager.create_static_index_buffer(&[0, 1, 200]).unwrap();
    let vertices = manager.create_static_vertices(&quad()).unwrap();
    let indices = manager.create_static_index_buffer(&[0, 1, 2, 1, 2, 3]).unwrap();
    manager.device_mut().clear_calls();

    let rejected = [
        StaticDraw::indexed(small, wild, 0, 1),
        // 3 + base 1 is past the fourth vertex
        StaticDraw::indexed(vertices, indices, 3, 1).with_base_vertex(1),
        // index 0 sits below the declared span
        StaticDraw::indexed(vertices, indices, 0, 1).with_vertex_span(1, 3),
    ];
    for draw in rejected {
        let result = manager.render_static(PrimitiveKind::TriangleList, VertexLayout::Position, MaterialKey::NONE, draw);
        assert!(matches!(result, Err(CacheError::InvalidPayload { .. })), "{:?}", draw);
    }
    assert!(manager.device().calls().is_empty());
    assert!(manager.material_index(VertexLayout::Position).is_empty());

    manager
        .render_static(
            PrimitiveKind::TriangleList,
            VertexLayout::Position,
            MaterialKey::NONE,
            StaticDraw::indexed(vertices, indices, 0, 1).with_base_vertex(1),
        )
        .unwrap();
    manager.flush().unwrap();
    assert_eq!(
        manager.device().draw_calls(),
        [&DeviceCall::DrawIndexedPrimitive {
            kind: PrimitiveKind::TriangleList,
            base_vertex: 1,
            min_index: 0,
            num_vertices: 3,
            start_index: 0,
            primitive_count: 1,
        }]
    );
}

#[test]
fn test_failed_flush_resets_batches_and_next_frame_recovers() {
    let mut manager = manager();
    submit_triangle(&mut manager, MaterialKey::NONE);
    manager
        .render_vertices(
            PrimitiveKind::TriangleList,
            MaterialKey::NONE,
            &[ColorVertex { position: [0.0; 3], color: 0 }; 3],
            None,
        )
        .unwrap();
    manager.device_mut().fail_next("draw_indexed_primitive");

    let result = manager.flush();
    assert!(matches!(result, Err(CacheError::Device(ref err)) if err.operation == "draw_indexed_primitive"));
    for layout in [VertexLayout::Position, VertexLayout::PositionColor] {
        let acc = manager
            .accumulator(layout, MaterialKey::NONE, PrimitiveKind::TriangleList)
            .unwrap();
        assert!(acc.is_empty());
        assert_eq!(acc.vertex_count(), 0);
    }

    manager.flush().unwrap();
    assert_eq!(manager.device().draw_call_count(), 0);

    submit_triangle(&mut manager, MaterialKey::NONE);
    manager.flush().unwrap();
    assert_eq!(manager.device().draw_call_count(), 1);
}

#[test]
fn test_effect_draws_once_per_pass() {
    let mut manager = manager();
    let effect = manager.register_effect(Box::new(RecordingEffect::new("glow", 2, &["Texture0", DIFFUSE_PARAMETER])));

    submit_triangle(&mut manager, MaterialKey::NONE);
    manager.enable_effect(effect).unwrap();
    assert_eq!(manager.device().draw_call_count(), 1);
    assert_eq!(manager.active_effect(), Some(effect));

    submit_triangle(&mut manager, MaterialKey::NONE);
    manager.flush().unwrap();

    assert_eq!(manager.device().draw_call_count(), 3);
    assert_eq!(manager.stats().draw_calls, 3);
    let recorded = recording_effect(&manager, effect);
    assert_eq!(recorded.passes_begun(), 2);
    assert_eq!(recorded.texture("Texture0"), Some(None));
    assert_eq!(recorded.vector(DIFFUSE_PARAMETER), Some(MaterialColors::WHITE.diffuse));
}

#[test]
fn test_enabling_effect_mirrors_bound_skin() {
    let mut manager = manager();
    let skin = manager.skins_mut().register(Skin::textured(TextureHandle(5)));
    let effect = manager.register_effect(Box::new(RecordingEffect::new("lit", 1, &["Texture0"])));

    manager.set_material(skin).unwrap();
    manager.enable_effect(effect).unwrap();

    assert_eq!(
        recording_effect(&manager, effect).texture("Texture0"),
        Some(Some(TextureHandle(5)))
    );
}

#[test]
fn test_disable_and_remove_effect_flush_pending_geometry() {
    let mut manager = manager();
    let effect = manager.register_effect(Box::new(RecordingEffect::new("two_pass", 2, &[])));
    manager.enable_effect(effect).unwrap();

    submit_triangle(&mut manager, MaterialKey::NONE);
    manager.disable_effect().unwrap();
    assert_eq!(manager.device().draw_call_count(), 2);
    assert_eq!(manager.active_effect(), None);

    manager.enable_effect(effect).unwrap();
    submit_triangle(&mut manager, MaterialKey::NONE);
    let removed = manager.remove_effect(effect).unwrap();
    assert_eq!(manager.device().draw_call_count(), 4);
    assert_eq!(removed.name(), "two_pass");
    assert!(manager.effect(effect).is_none());
}

#[test]
fn test_render_state_flushes_only_on_change() {
    let mut manager = manager();

    submit_triangle(&mut manager, MaterialKey::NONE);
    manager.set_render_state(RenderState::AlphaBlendEnable, 1).unwrap();
    assert_eq!(manager.device().draw_call_count(), 1);

    submit_triangle(&mut manager, MaterialKey::NONE);
    manager.set_render_state(RenderState::AlphaBlendEnable, 1).unwrap();
    assert_eq!(manager.device().draw_call_count(), 1);

    manager.set_render_state(RenderState::AlphaBlendEnable, 0).unwrap();
    assert_eq!(manager.device().draw_call_count(), 2);
    let state_calls = manager
        .device()
        .calls()
        .iter()
        .filter(|call| matches!(call, DeviceCall::SetRenderState { .. }))
        .count();
    assert_eq!(state_calls, 2);
}

#[test]
fn test_transform_change_draws_pending_geometry_first() {
    let mut manager = manager();
    submit_triangle(&mut manager, MaterialKey::NONE);

    let world = Matrix4::new_translation(&nalgebra::Vector3::new(1.0, 2.0, 3.0));
    manager.set_transform(TransformState::World, &world).unwrap();

    let device = manager.device();
    let draw = position_of(device, DeviceCall::is_draw);
    let transform = position_of(device, |call| matches!(call, DeviceCall::SetTransform { .. }));
    assert!(draw < transform);
    assert_eq!(manager.transform(TransformState::World), Some(&world));
    assert_eq!(manager.transform(TransformState::View), None);
}

#[test]
fn test_shadow_pass_switches_render_target_around_flushes() {
    let mut manager = manager();
    manager.end_shadow_pass().unwrap();
    assert!(manager.device().calls().is_empty());

    manager.begin_shadow_pass(TextureHandle(9)).unwrap();
    assert_eq!(manager.shadow_target(), Some(TextureHandle(9)));
    submit_triangle(&mut manager, MaterialKey::NONE);
    manager.end_shadow_pass().unwrap();

    let device = manager.device();
    let enter = position_of(device, |call| *call == DeviceCall::SetRenderTarget(Some(TextureHandle(9))));
    let draw = position_of(device, DeviceCall::is_draw);
    let leave = position_of(device, |call| *call == DeviceCall::SetRenderTarget(None));
    assert!(enter < draw && draw < leave);
    assert_eq!(manager.shadow_target(), None);
}

#[test]
fn test_releasing_static_buffer_draws_ranges_that_use_it() {
    let mut manager = manager();
    let buffer = manager.create_static_vertices(&triangle(0.0)).unwrap();
    manager
        .render_static(
            PrimitiveKind::TriangleList,
            VertexLayout::Position,
            MaterialKey::NONE,
            StaticDraw::non_indexed(buffer, 0, 1),
        )
        .unwrap();

    manager.release_static_buffer(buffer).unwrap();

    let device = manager.device();
    let draw = position_of(device, DeviceCall::is_draw);
    let release = position_of(device, |call| matches!(call, DeviceCall::ReleaseBuffer(_)));
    assert!(draw < release);
    assert!(manager.static_buffers().is_empty());
    assert!(matches!(
        manager.release_static_buffer(buffer),
        Err(CacheError::UnknownBuffer(_))
    ));
}

#[test]
fn test_clear_all_releases_accumulators_but_keeps_static_buffers() {
    let mut manager = manager();
    submit_triangle(&mut manager, MaterialKey::NONE);
    manager
        .render_vertices(
            PrimitiveKind::TriangleList,
            MaterialKey::NONE,
            &[ColorVertex { position: [0.0; 3], color: 0 }; 3],
            None,
        )
        .unwrap();
    manager.create_static_vertices(&quad()).unwrap();
    assert_eq!(manager.device().live_buffer_count(), 5);

    manager.clear_all();

    assert_eq!(manager.device().live_buffer_count(), 1);
    assert_eq!(manager.device().draw_call_count(), 0);
    assert!(manager.material_index(VertexLayout::Position).is_empty());
    assert!(manager.material_index(VertexLayout::PositionColor).is_empty());
    assert_eq!(manager.static_buffers().len(), 1);
}

#[test]
fn test_frame_statistics() {
    let mut manager = manager();
    submit_triangle(&mut manager, MaterialKey::NONE);
    manager.flush().unwrap();

    manager.begin_frame();
    assert_eq!(manager.stats(), Default::default());

    submit_triangle(&mut manager, MaterialKey::NONE);
    submit_triangle(&mut manager, MaterialKey::NONE);
    manager
        .render_vertices(PrimitiveKind::LineList, MaterialKey::NONE, &strip_of(2), None)
        .unwrap();
    let stats = manager.end_frame().unwrap();

    assert_eq!(stats.draw_calls, 2);
    assert_eq!(stats.primitives, 3);
    assert_eq!(stats.batch_flushes, 2);
    assert_eq!(stats.cache_flushes, 1);
    assert_eq!(stats.overflow_flushes, 0);
    approx::assert_relative_eq!(stats.avg_primitives_per_draw(), 1.5);
}
