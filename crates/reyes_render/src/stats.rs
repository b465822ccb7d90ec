//! Per-render counters.

use std::ops::AddAssign;

/// Counters for one `render_image` invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub surfaces_posted: u64,
    pub surfaces_culled: u64,
    /// Surfaces skipped because they were hidden in every bucket they reached
    pub surfaces_occluded: u64,
    /// Hidden surfaces handed on to a later bucket
    pub surfaces_deferred: u64,
    pub surfaces_discarded: u64,
    pub splits: u64,
    pub eye_splits: u64,
    pub grids_diced: u64,
    pub micropolygons_created: u64,
    pub micropolygons_degenerate: u64,
    pub micropolygons_clipped: u64,
    pub micropolygons_forwarded: u64,
    /// Micropolygons that never hit a sample anywhere
    pub micropolygons_missed: u64,
    pub sample_tests: u64,
    pub sample_hits: u64,
    pub buckets_rendered: u64,
    /// Buckets skipped by cancellation
    pub buckets_skipped: u64,
}

impl RenderStats {
    pub fn log_summary(&self) {
        log::info!(
            "Surfaces: {} posted, {} culled, {} occluded ({} deferred), {} discarded, {} splits ({} eye)",
            self.surfaces_posted,
            self.surfaces_culled,
            self.surfaces_occluded,
            self.surfaces_deferred,
            self.surfaces_discarded,
            self.splits,
            self.eye_splits
        );
        log::info!(
            "Grids: {} diced, {} micropolygons ({} degenerate, {} clipped, {} forwarded, {} missed)",
            self.grids_diced,
            self.micropolygons_created,
            self.micropolygons_degenerate,
            self.micropolygons_clipped,
            self.micropolygons_forwarded,
            self.micropolygons_missed
        );
        log::info!(
            "Sampling: {} tests, {} hits, {} buckets ({} skipped)",
            self.sample_tests,
            self.sample_hits,
            self.buckets_rendered,
            self.buckets_skipped
        );
    }
}

impl AddAssign for RenderStats {
    fn add_assign(&mut self, other: Self) {
        self.surfaces_posted += other.surfaces_posted;
        self.surfaces_culled += other.surfaces_culled;
        self.surfaces_occluded += other.surfaces_occluded;
        self.surfaces_deferred += other.surfaces_deferred;
        self.surfaces_discarded += other.surfaces_discarded;
        self.splits += other.splits;
        self.eye_splits += other.eye_splits;
        self.grids_diced += other.grids_diced;
        self.micropolygons_created += other.micropolygons_created;
        self.micropolygons_degenerate += other.micropolygons_degenerate;
        self.micropolygons_clipped += other.micropolygons_clipped;
        self.micropolygons_forwarded += other.micropolygons_forwarded;
        self.micropolygons_missed += other.micropolygons_missed;
        self.sample_tests += other.sample_tests;
        self.sample_hits += other.sample_hits;
        self.buckets_rendered += other.buckets_rendered;
        self.buckets_skipped += other.buckets_skipped;
    }
}
