//! Bucket-by-bucket render orchestration.
//!
//! [`ImageBuffer`] owns the bucket grid for one frame. Surfaces are
//! posted to the first bucket (in traversal order) their bound reaches.
//! Rendering visits buckets in order: each one splits and dices its
//! surfaces nearest-first, samples the resulting micropolygons, filters
//! its pixels and hands them to the display. Micropolygons that extend
//! past the bucket are then forwarded to the next bucket they reach, so
//! a micropolygon overlapping `N` buckets is forwarded exactly `N - 1`
//! times and freed after its last one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reyes_core::{AttributeStore, RenderOptions};
use reyes_math::Bound;

use crate::bucket::{tile_region, traversal_order, Bucket, PixelRect};
use crate::camera::Camera;
use crate::display::{DisplayManager, Pixel};
use crate::error::{DisplayError, RenderResult};
use crate::filter::PixelFilter;
use crate::micropolygon::{MicroPolygon, MicroPolygonArena, MpgId};
use crate::sample::{SampleBuffer, SampleSettings};
use crate::scheduler::{Classification, Scheduler};
use crate::shading::ShadingExecution;
use crate::stats::RenderStats;
use crate::surface::Surface;

/// Cloneable cancellation handle, checked between buckets.
#[derive(Debug, Clone, Default)]
pub struct RenderControl {
    quit: Arc<AtomicBool>,
}

impl RenderControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the render to stop. The bucket in progress still completes.
    pub fn quit(&self) {
        self.quit.store(true, Ordering::Relaxed);
    }

    pub fn is_quit(&self) -> bool {
        self.quit.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.quit.store(false, Ordering::Relaxed);
    }
}

/// First bucket at or after `from` whose sample region `bound` reaches.
fn first_overlapping(buckets: &[Bucket], from: usize, bound: &Bound) -> Option<usize> {
    buckets
        .iter()
        .skip(from)
        .position(|b| b.overlaps(bound))
        .map(|k| k + from)
}

/// Run one sampling pass over `ids` and count it.
fn sample_batch(
    samples: &mut SampleBuffer,
    arena: &MicroPolygonArena,
    ids: &[MpgId],
    camera: &Camera,
    stats: &mut RenderStats,
) {
    if ids.is_empty() {
        return;
    }
    let batch: Vec<&MicroPolygon> = ids.iter().filter_map(|&id| arena.get(id)).collect();
    let counts = samples.sample(&batch, camera);
    stats.sample_tests += counts.tests;
    stats.sample_hits += counts.hits;
}

/// The render state of one frame.
#[derive(Debug)]
pub struct ImageBuffer {
    options: RenderOptions,
    camera: Camera,
    attributes: AttributeStore,
    filter: PixelFilter,
    settings: SampleSettings,
    /// Buckets in traversal order
    buckets: Vec<Bucket>,
    micropolygons: MicroPolygonArena,
    stats: RenderStats,
    control: RenderControl,
}

impl ImageBuffer {
    /// Validate `options` and lay out the bucket grid over the crop window.
    pub fn new(options: RenderOptions, attributes: AttributeStore) -> RenderResult<Self> {
        options.validate()?;

        let camera = Camera::from_options(&options);
        let filter = PixelFilter::from_options(&options.filter);
        let settings = SampleSettings::from_options(&options);

        let (x0, y0, x1, y1) = options.crop_rect();
        let region = PixelRect::new(x0, y0, x1 - x0, y1 - y0);
        let tiles = tile_region(region, options.bucket_size);
        let cols = region.width.div_ceil(options.bucket_size[0]) as usize;
        let rows = region.height.div_ceil(options.bucket_size[1]) as usize;
        let border = filter.border();
        let limit = [options.width, options.height];

        let buckets: Vec<Bucket> = traversal_order(cols, rows, options.bucket_order, options.seed)
            .into_iter()
            .enumerate()
            .map(|(index, tile)| {
                let rect = tiles[tile];
                Bucket::new(index, rect, rect.expand(border, limit))
            })
            .collect();

        log::info!(
            "Image buffer {}x{}: {} buckets of {}x{} ({:?} order), {}x{} samples per pixel",
            options.width,
            options.height,
            buckets.len(),
            options.bucket_size[0],
            options.bucket_size[1],
            options.bucket_order,
            options.pixel_samples[0],
            options.pixel_samples[1]
        );

        Ok(Self {
            options,
            camera,
            attributes,
            filter,
            settings,
            buckets,
            micropolygons: MicroPolygonArena::new(),
            stats: RenderStats::default(),
            control: RenderControl::new(),
        })
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    /// Attribute snapshots for surfaces not yet posted.
    pub fn attributes_mut(&mut self) -> &mut AttributeStore {
        &mut self.attributes
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn stats(&self) -> &RenderStats {
        &self.stats
    }

    /// Micropolygons currently alive in bucket queues.
    pub fn live_micropolygons(&self) -> usize {
        self.micropolygons.len()
    }

    /// A handle that cancels this render from another thread.
    pub fn control(&self) -> RenderControl {
        self.control.clone()
    }

    /// Register a surface with the first bucket it may cover. Returns
    /// false if the surface was culled.
    pub fn post_surface(&mut self, surface: Surface) -> bool {
        self.stats.surfaces_posted += 1;
        let scheduler = Scheduler::new(&self.camera, &self.options, &self.attributes);

        let bound = scheduler.surface_bound(&surface);
        if !bound.has_nan()
            && (bound.is_empty() || bound.z.max < self.camera.near() || bound.z.min > self.camera.far())
        {
            self.stats.surfaces_culled += 1;
            return false;
        }

        let home = match scheduler.raster_bound(&surface) {
            Some(raster) if !raster.intersects_xy(scheduler.region()) => None,
            Some(raster) => first_overlapping(&self.buckets, 0, &raster).map(|i| (i, raster.z.min)),
            // Unprojectable: the first bucket eye-splits it
            None => (!self.buckets.is_empty()).then_some((0, f32::NEG_INFINITY)),
        };
        match home {
            Some((index, depth)) => {
                self.buckets[index].push_surface(surface, depth);
                true
            }
            None => {
                self.stats.surfaces_culled += 1;
                false
            }
        }
    }

    /// Render every bucket in traversal order, handing each to `display`.
    ///
    /// Returns the counters for this render. A display error aborts the
    /// render; cancellation through [`RenderControl`] does not.
    pub fn render_image(
        &mut self,
        shader: &dyn ShadingExecution,
        display: &mut dyn DisplayManager,
    ) -> RenderResult<RenderStats> {
        let total = self.buckets.len();
        log::info!(
            "Rendering {} surfaces into {} buckets",
            self.buckets.iter().map(Bucket::surface_count).sum::<usize>(),
            total
        );

        for current in 0..total {
            if self.control.is_quit() {
                let skipped = total - current;
                self.stats.buckets_skipped += skipped as u64;
                log::info!("Render cancelled, skipping {} buckets", skipped);
                self.release_from(current);
                break;
            }

            let (rect, pixels) = self.render_bucket(current, shader);
            display.accept_bucket(rect, &pixels).map_err(log_display_error)?;
            self.forward_micropolygons(current);
            self.buckets[current].finish();
            self.stats.buckets_rendered += 1;
            display.bucket_complete(rect).map_err(log_display_error)?;
        }

        debug_assert!(self.control.is_quit() || self.micropolygons.is_empty());
        display.image_complete().map_err(log_display_error)?;
        self.stats.log_summary();
        Ok(self.stats)
    }

    /// Clear every queue and counter so the buffer can be reused.
    pub fn reset(&mut self) {
        for bucket in &mut self.buckets {
            bucket.reset();
        }
        self.micropolygons.clear();
        self.stats = RenderStats::default();
        self.control.reset();
    }

    /// Split, dice, shade and sample everything queued on bucket
    /// `current`, then filter its pixels.
    fn render_bucket(&mut self, current: usize, shader: &dyn ShadingExecution) -> (PixelRect, Vec<Pixel>) {
        let scheduler = Scheduler::new(&self.camera, &self.options, &self.attributes);
        let buckets = &mut self.buckets;
        let arena = &mut self.micropolygons;
        let stats = &mut self.stats;

        let rect = buckets[current].rect;
        let mut samples = SampleBuffer::new(buckets[current].sample_rect, &self.settings);
        buckets[current].begin_sampling();

        // Forwarded micropolygons come first; they are already shaded
        let mut batch = buckets[current].take_pending();
        for &id in &batch {
            if let Some(mpg) = arena.get(id) {
                mpg.clear_pushed_forward();
            }
        }
        let mut active = batch.clone();
        let batch_size = self.options.sample_batch.max(1);
        if batch.len() >= batch_size {
            sample_batch(&mut samples, arena, &batch, &self.camera, stats);
            batch.clear();
        }

        while let Some(surface) = buckets[current].pop_surface() {
            if self.options.occlusion_culling {
                if let Some(raster) = scheduler.raster_bound(&surface) {
                    if samples.is_hidden(&raster) {
                        match first_overlapping(buckets, current + 1, &raster) {
                            Some(next) => {
                                stats.surfaces_deferred += 1;
                                buckets[next].push_surface(surface, raster.z.min);
                            }
                            None => stats.surfaces_occluded += 1,
                        }
                        continue;
                    }
                }
            }

            let classification = scheduler.classify(&surface);
            classification.record(&surface, stats);
            match classification {
                Classification::Cull(_) | Classification::Discard(_) => {}
                Classification::Split(children) => {
                    for child in children {
                        match scheduler.raster_bound(&child) {
                            None => buckets[current].push_surface(child, f32::NEG_INFINITY),
                            Some(raster) if buckets[current].overlaps(&raster) => {
                                buckets[current].push_surface(child, raster.z.min)
                            }
                            Some(raster) => match first_overlapping(buckets, current + 1, &raster) {
                                Some(next) => buckets[next].push_surface(child, raster.z.min),
                                None => stats.surfaces_culled += 1,
                            },
                        }
                    }
                }
                Classification::Dice(size) => {
                    let Some(mut grid) = surface.dice(size) else {
                        continue;
                    };
                    stats.grids_diced += 1;
                    let attributes = self.attributes.get(surface.attributes());
                    shader.shade(&mut grid, attributes, &self.camera);

                    let extraction = grid.extract_micropolygons(&self.camera, attributes.matte);
                    stats.micropolygons_created += extraction.micropolygons.len() as u64;
                    stats.micropolygons_degenerate += extraction.degenerate as u64;
                    stats.micropolygons_clipped += extraction.clipped as u64;

                    for mpg in extraction.micropolygons {
                        let bound = *mpg.bound();
                        if buckets[current].overlaps(&bound) {
                            let id = arena.insert(mpg);
                            active.push(id);
                            batch.push(id);
                        } else if let Some(next) = first_overlapping(buckets, current + 1, &bound) {
                            mpg.mark_pushed_forward();
                            let id = arena.insert(mpg);
                            buckets[next].push_micropolygon(id);
                        } else {
                            stats.micropolygons_missed += 1;
                        }
                    }

                    if batch.len() >= batch_size {
                        sample_batch(&mut samples, arena, &batch, &self.camera, stats);
                        batch.clear();
                    }
                }
            }
        }
        sample_batch(&mut samples, arena, &batch, &self.camera, stats);

        log::trace!(
            "Bucket {} at ({}, {}): {} micropolygons sampled",
            current,
            rect.x,
            rect.y,
            active.len()
        );

        // Hand the active set to forwarding
        for id in active {
            buckets[current].push_micropolygon(id);
        }

        let values = samples.resolve();
        let pixels = samples.filter(&values, &self.filter, rect);
        (rect, pixels)
    }

    /// Move each micropolygon sampled in bucket `current` on to the next
    /// bucket it reaches, or free it.
    fn forward_micropolygons(&mut self, current: usize) {
        for id in self.buckets[current].take_pending() {
            let Some(mpg) = self.micropolygons.get(id) else {
                continue;
            };
            match first_overlapping(&self.buckets, current + 1, mpg.bound()) {
                // Already queued further on
                Some(_) if !mpg.mark_pushed_forward() => {}
                Some(next) => {
                    self.stats.micropolygons_forwarded += 1;
                    self.buckets[next].push_micropolygon(id);
                }
                None => {
                    if !mpg.was_hit() {
                        self.stats.micropolygons_missed += 1;
                    }
                    self.micropolygons.remove(id);
                }
            }
        }
    }

    /// Drop everything queued on buckets `from..` without rendering them.
    fn release_from(&mut self, from: usize) {
        for bucket in &mut self.buckets[from..] {
            for id in bucket.take_pending() {
                self.micropolygons.remove(id);
            }
            bucket.finish();
        }
    }
}

fn log_display_error(err: DisplayError) -> DisplayError {
    log::error!("Display failed: {}", err);
    err
}
