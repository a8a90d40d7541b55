//! Batching demo
//!
//! Submits a few frames of synthetic scene content (scattered model
//! triangles, streamed terrain chunks, a HUD and a shadow pass) through the
//! render cache against the headless recording device, and logs how many
//! draw calls the cache needed per frame.
//!
//! Usage: `batch_demo [cache_config.toml|cache_config.ron]`

use nalgebra::{Matrix4, Vector3};
use rand::prelude::*;
use render_cache::effect::RecordingEffect;
use render_cache::prelude::*;
use render_cache::vertex::pack_argb;

const FRAMES: usize = 3;
const MODEL_SKINS: u32 = 12;
const MODELS_PER_FRAME: usize = 400;
const TERRAIN_CHUNKS: usize = 16;
const TERRAIN_CHUNK_TRIANGLES: usize = 32;
const HUD_QUADS: usize = 24;

type Cache = CacheManager<RecordingDevice>;

struct Scene {
    model_skins: Vec<MaterialKey>,
    terrain_skin: MaterialKey,
    hud_skin: MaterialKey,
    terrain: StaticBufferId,
    shadow_map: TextureHandle,
    shadow_effect: EffectId,
}

impl Scene {
    fn build(cache: &mut Cache) -> CacheResult<Self> {
        let model_skins = (0..MODEL_SKINS)
            .map(|i| {
                let skin = Skin::textured(TextureHandle(100 + i))
                    .with_texture(1, TextureHandle(200 + i % 3));
                cache.skins_mut().register(skin)
            })
            .collect();
        let terrain_skin = cache.skins_mut().register(
            Skin::textured(TextureHandle(300)).with_texture(1, TextureHandle(301)),
        );
        let hud_skin = cache.skins_mut().register(Skin::textured(TextureHandle(400)));

        let terrain = cache.create_static_vertices(&terrain_vertices())?;
        let shadow_effect = cache.register_effect(Box::new(RecordingEffect::new(
            "shadow_depth",
            1,
            &["Texture0", "MaterialDiffuse"],
        )));
        log::info!(
            "Scene ready: {} model skins, {} terrain chunks, {} static buffers",
            MODEL_SKINS,
            TERRAIN_CHUNKS,
            cache.static_buffers().len()
        );

        Ok(Self {
            model_skins,
            terrain_skin,
            hud_skin,
            terrain,
            shadow_map: TextureHandle(900),
            shadow_effect,
        })
    }

    fn render_frame(&self, cache: &mut Cache, rng: &mut impl Rng, frame: usize) -> CacheResult<CacheStats> {
        cache.begin_frame();
        cache.set_transform(TransformState::View, &Matrix4::identity())?;

        // Depth-only pass over the models
        cache.begin_shadow_pass(self.shadow_map)?;
        cache.enable_effect(self.shadow_effect)?;
        self.submit_models(cache, rng, MODELS_PER_FRAME / 4)?;
        cache.disable_effect()?;
        cache.end_shadow_pass()?;

        let world = Matrix4::new_translation(&Vector3::new(0.0, 0.0, frame as f32));
        cache.set_transform(TransformState::World, &world)?;
        self.submit_terrain(cache)?;
        self.submit_models(cache, rng, MODELS_PER_FRAME)?;

        cache.set_render_state(RenderState::AlphaBlendEnable, 1)?;
        self.submit_hud(cache)?;
        let stats = cache.end_frame()?;
        cache.set_render_state(RenderState::AlphaBlendEnable, 0)?;
        Ok(stats)
    }

    fn submit_models(&self, cache: &mut Cache, rng: &mut impl Rng, count: usize) -> CacheResult<()> {
        for _ in 0..count {
            let skin = self.model_skins[rng.gen_range(0..self.model_skins.len())];
            let origin = [rng.gen_range(-50.0..50.0), 0.0, rng.gen_range(-50.0..50.0)];
            cache.render_vertices(PrimitiveKind::TriangleList, skin, &model_quad(origin), Some(&[0, 1, 2, 2, 3, 0]))?;
        }
        Ok(())
    }

    fn submit_terrain(&self, cache: &mut Cache) -> CacheResult<()> {
        let vertices_per_chunk = TERRAIN_CHUNK_TRIANGLES * 3;
        for chunk in 0..TERRAIN_CHUNKS {
            cache.render_static(
                PrimitiveKind::TriangleList,
                VertexLayout::PositionColorTex2,
                self.terrain_skin,
                StaticDraw::non_indexed(self.terrain, chunk * vertices_per_chunk, TERRAIN_CHUNK_TRIANGLES),
            )?;
        }
        Ok(())
    }

    fn submit_hud(&self, cache: &mut Cache) -> CacheResult<()> {
        for i in 0..HUD_QUADS {
            let x = 10.0 + 20.0 * i as f32;
            cache.render_vertices(PrimitiveKind::TriangleList, self.hud_skin, &hud_quad(x, 10.0), Some(&[0, 1, 2, 2, 1, 3]))?;
        }
        Ok(())
    }
}

fn terrain_vertices() -> Vec<TerrainVertex> {
    let count = TERRAIN_CHUNKS * TERRAIN_CHUNK_TRIANGLES * 3;
    (0..count)
        .map(|i| TerrainVertex {
            position: [(i % 64) as f32, 0.0, (i / 64) as f32],
            color: pack_argb(96, 128, 64, 255),
            uv0: [(i % 2) as f32, (i % 3) as f32 * 0.5],
            uv1: [0.0, 0.0],
        })
        .collect()
}

fn model_quad(origin: [f32; 3]) -> [ModelVertex; 4] {
    let [x, y, z] = origin;
    let corner = |dx: f32, dz: f32, u: f32, v: f32| ModelVertex {
        position: [x + dx, y, z + dz],
        normal: [0.0, 1.0, 0.0],
        uv: [u, v],
    };
    [
        corner(0.0, 0.0, 0.0, 0.0),
        corner(1.0, 0.0, 1.0, 0.0),
        corner(1.0, 1.0, 1.0, 1.0),
        corner(0.0, 1.0, 0.0, 1.0),
    ]
}

fn hud_quad(x: f32, y: f32) -> [ScreenVertex; 4] {
    let color = pack_argb(255, 255, 255, 200);
    let corner = |dx: f32, dy: f32| ScreenVertex {
        position: [x + dx, y + dy, 0.0, 1.0],
        color,
        uv: [dx / 16.0, dy / 16.0],
    };
    [corner(0.0, 0.0), corner(16.0, 0.0), corner(0.0, 16.0), corner(16.0, 16.0)]
}

fn load_config() -> CacheConfig {
    let Some(path) = std::env::args().nth(1) else {
        return CacheConfig::default();
    };
    match CacheConfig::load_from_file(&path) {
        Ok(config) => {
            log::info!("Loaded cache configuration from {}", path);
            config
        }
        Err(e) => {
            log::warn!("Failed to load {}: {}, using defaults", path, e);
            CacheConfig::default()
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Starting render cache batching demo");
    let config = load_config();
    let mut cache = CacheManager::new(RecordingDevice::new(), SkinTable::new(), config)?;
    let scene = Scene::build(&mut cache)?;
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for frame in 0..FRAMES {
        let stats = scene.render_frame(&mut cache, &mut rng, frame)?;
        log::info!(
            "Frame {}: {} draw calls for {} primitives ({:.1} per draw), {} material binds, {} overflow flushes, {:.0}% of static ranges merged",
            frame,
            stats.draw_calls,
            stats.primitives,
            stats.avg_primitives_per_draw(),
            stats.material_binds,
            stats.overflow_flushes,
            stats.static_merge_ratio() * 100.0
        );
        cache.device_mut().clear_calls();
    }

    cache.clear_all();
    log::info!(
        "Demo finished; {} device buffers still live (static geometry)",
        cache.device().live_buffer_count()
    );
    Ok(())
}
