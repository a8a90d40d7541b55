//! Per-frame submission counters

/// Statistics for batched submission, reset by `begin_frame`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Device draw calls, one per effect pass
    pub draw_calls: usize,

    /// Primitives submitted across all draw calls
    pub primitives: usize,

    /// Accumulators that submitted geometry
    pub batch_flushes: usize,

    /// Flushes forced by an add that did not fit
    pub overflow_flushes: usize,

    /// Full cache flushes (frame end or state change)
    pub cache_flushes: usize,

    /// Skin binds that reached the device
    pub material_binds: usize,

    /// Vertex/index buffer binds that reached the device
    pub buffer_binds: usize,

    /// Vertex declaration binds that reached the device
    pub declaration_binds: usize,

    /// Static ranges folded into the previous range
    pub static_merges: usize,

    /// Static ranges appended as new entries
    pub static_ranges: usize,
}

impl CacheStats {
    /// Average primitives per draw call
    pub fn avg_primitives_per_draw(&self) -> f32 {
        if self.draw_calls == 0 {
            0.0
        } else {
            self.primitives as f32 / self.draw_calls as f32
        }
    }

    /// Share of static submissions that were merged away
    pub fn static_merge_ratio(&self) -> f32 {
        let submitted = self.static_merges + self.static_ranges;
        if submitted == 0 {
            0.0
        } else {
            self.static_merges as f32 / submitted as f32
        }
    }
}
