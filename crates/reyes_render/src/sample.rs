//! Stochastic sample storage and visibility for one bucket.
//!
//! Every pixel owns `nx × ny` sub-samples with a raster position, a
//! shutter time and a lens position. Samples are seeded from the pixel's
//! image coordinates, so neighbouring buckets that both sample a border
//! pixel generate identical samples for it.

use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use reyes_core::RenderOptions;
use reyes_math::{Bound, Color, Interval, Vec2};

use crate::bucket::PixelRect;
use crate::camera::Camera;
use crate::display::Pixel;
use crate::filter::PixelFilter;
use crate::micropolygon::MicroPolygon;

/// How samples are laid out within a pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleSettings {
    pub pixel_samples: [u32; 2],
    pub jitter: bool,
    pub seed: u64,
    pub shutter: Interval,
}

impl SampleSettings {
    pub fn from_options(options: &RenderOptions) -> Self {
        Self {
            pixel_samples: options.pixel_samples,
            jitter: options.jitter,
            seed: options.seed,
            shutter: options.shutter_interval(),
        }
    }

    pub fn samples_per_pixel(&self) -> usize {
        (self.pixel_samples[0] * self.pixel_samples[1]) as usize
    }
}

/// One sub-sample location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Raster position
    pub position: Vec2,
    /// Shutter time
    pub time: f32,
    /// Position on the unit lens disk
    pub lens: Vec2,
}

/// A micropolygon hit recorded at a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Hit {
    depth: f32,
    color: Color,
    opacity: Color,
    matte: bool,
}

impl Hit {
    fn occludes(&self) -> bool {
        self.matte || self.opacity.min_element() >= 1.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Insert {
    Hidden,
    Transparent,
    Opaque,
}

/// Visibility accumulator for one sample.
#[derive(Debug, Clone, Default)]
struct SamplePoint {
    opaque: Option<Hit>,
    /// Hits nearer than `opaque`, in arrival order
    transparent: Vec<Hit>,
}

impl SamplePoint {
    fn insert(&mut self, hit: Hit) -> Insert {
        if let Some(opaque) = &self.opaque {
            if hit.depth >= opaque.depth {
                return Insert::Hidden;
            }
        }
        if hit.occludes() {
            self.transparent.retain(|t| t.depth < hit.depth);
            self.opaque = Some(hit);
            Insert::Opaque
        } else {
            self.transparent.push(hit);
            Insert::Transparent
        }
    }

    fn opaque_depth(&self) -> f32 {
        self.opaque.map_or(f32::INFINITY, |h| h.depth)
    }

    /// Composite front to back.
    fn resolve(&mut self) -> SampleValue {
        self.transparent
            .sort_by(|a, b| a.depth.partial_cmp(&b.depth).unwrap_or(std::cmp::Ordering::Equal));

        let mut color = Color::ZERO;
        let mut transmit = Color::ONE;
        let mut alpha_transmit = 1.0_f32;
        for hit in &self.transparent {
            if !hit.matte {
                color += transmit * hit.color;
            }
            transmit *= Color::ONE - hit.opacity;
            alpha_transmit *= 1.0 - (hit.opacity.x + hit.opacity.y + hit.opacity.z) / 3.0;
        }
        if let Some(opaque) = &self.opaque {
            if !opaque.matte {
                color += transmit * opaque.color;
                alpha_transmit = 0.0;
            }
        }

        let depth = self
            .transparent
            .first()
            .map(|h| h.depth)
            .unwrap_or_else(|| self.opaque_depth());
        SampleValue {
            color,
            alpha: 1.0 - alpha_transmit,
            depth,
            hit: self.opaque.is_some() || !self.transparent.is_empty(),
        }
    }
}

/// Composited result of one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleValue {
    /// Premultiplied colour
    pub color: Color,
    pub alpha: f32,
    /// Depth of the nearest hit, infinite when nothing was hit
    pub depth: f32,
    pub hit: bool,
}

/// Sample counters from one sampling pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleCounts {
    pub tests: u64,
    pub hits: u64,
}

fn pixel_seed(seed: u64, x: u32, y: u32) -> u64 {
    // splitmix64 over the seed and packed coordinates
    let mut z = seed ^ ((x as u64) << 32 | y as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Map the unit square onto the unit disk, preserving strata.
fn concentric_disk(u: Vec2) -> Vec2 {
    let o = u * 2.0 - Vec2::ONE;
    if o == Vec2::ZERO {
        return Vec2::ZERO;
    }
    let (r, theta) = if o.x.abs() > o.y.abs() {
        (o.x, FRAC_PI_4 * (o.y / o.x))
    } else {
        (o.y, FRAC_PI_2 - FRAC_PI_4 * (o.x / o.y))
    };
    Vec2::new(theta.cos(), theta.sin()) * r
}

/// Stratified samples for one pixel.
fn pixel_samples(settings: &SampleSettings, x: u32, y: u32, out: &mut Vec<Sample>) {
    let [nx, ny] = settings.pixel_samples;
    let n = (nx * ny) as usize;
    let mut rng = StdRng::seed_from_u64(pixel_seed(settings.seed, x, y));
    let offset = |rng: &mut StdRng| if settings.jitter { rng.gen::<f32>() } else { 0.5 };

    let mut times: Vec<f32> = (0..n)
        .map(|k| settings.shutter.lerp((k as f32 + offset(&mut rng)) / n as f32))
        .collect();
    let mut lens: Vec<Vec2> = Vec::with_capacity(n);
    for sy in 0..ny {
        for sx in 0..nx {
            let u = Vec2::new(
                (sx as f32 + offset(&mut rng)) / nx as f32,
                (sy as f32 + offset(&mut rng)) / ny as f32,
            );
            lens.push(concentric_disk(u));
        }
    }
    if settings.jitter {
        times.shuffle(&mut rng);
        lens.shuffle(&mut rng);
    }

    let mut k = 0;
    for sy in 0..ny {
        for sx in 0..nx {
            let position = Vec2::new(
                x as f32 + (sx as f32 + offset(&mut rng)) / nx as f32,
                y as f32 + (sy as f32 + offset(&mut rng)) / ny as f32,
            );
            out.push(Sample {
                position,
                time: times[k],
                lens: lens[k],
            });
            k += 1;
        }
    }
}

/// Samples and visibility state covering a pixel rectangle.
#[derive(Debug)]
pub struct SampleBuffer {
    rect: PixelRect,
    spp: usize,
    samples: Vec<Sample>,
    points: Vec<SamplePoint>,
    /// Per pixel: farthest opaque depth over its samples
    max_depth: Vec<f32>,
}

impl SampleBuffer {
    pub fn new(rect: PixelRect, settings: &SampleSettings) -> Self {
        let spp = settings.samples_per_pixel();
        let pixels = rect.pixel_count();
        let mut samples = Vec::with_capacity(pixels * spp);
        for y in rect.y..rect.y1() {
            for x in rect.x..rect.x1() {
                pixel_samples(settings, x, y, &mut samples);
            }
        }
        Self {
            rect,
            spp,
            samples,
            points: vec![SamplePoint::default(); pixels * spp],
            max_depth: vec![f32::INFINITY; pixels],
        }
    }

    pub fn rect(&self) -> PixelRect {
        self.rect
    }

    pub fn samples_per_pixel(&self) -> usize {
        self.spp
    }

    /// Samples of the pixel at image coordinates `(x, y)`.
    pub fn pixel_samples(&self, x: u32, y: u32) -> &[Sample] {
        let start = self.pixel_index(x, y) * self.spp;
        &self.samples[start..start + self.spp]
    }

    /// Farthest opaque depth among the samples of pixel `(x, y)`.
    pub fn max_opaque_depth(&self, x: u32, y: u32) -> f32 {
        self.max_depth[self.pixel_index(x, y)]
    }

    fn pixel_index(&self, x: u32, y: u32) -> usize {
        ((y - self.rect.y) * self.rect.width + (x - self.rect.x)) as usize
    }

    /// Local pixel range `[lo, hi]` a raster interval touches on one
    /// axis, or `None` if it misses the buffer.
    fn span(interval: &Interval, origin: u32, len: u32) -> Option<(usize, usize)> {
        let lo = (interval.min.floor() - origin as f32).max(0.0);
        let hi = (interval.max.floor() - origin as f32).min(len as f32 - 1.0);
        (lo <= hi).then(|| (lo as usize, hi as usize))
    }

    /// True when `bound` covers at least one pixel of the buffer and is
    /// behind the opaque surface at every pixel it covers.
    pub fn is_hidden(&self, bound: &Bound) -> bool {
        let (Some((x0, x1)), Some((y0, y1))) = (
            Self::span(&bound.x, self.rect.x, self.rect.width),
            Self::span(&bound.y, self.rect.y, self.rect.height),
        ) else {
            return false;
        };
        let width = self.rect.width as usize;
        (y0..=y1).all(|y| {
            self.max_depth[y * width + x0..=y * width + x1]
                .iter()
                .all(|&d| d < bound.z.min)
        })
    }

    /// Test a batch of micropolygons against every sample they may cover.
    /// Rows of the buffer are processed in parallel.
    pub fn sample(&mut self, batch: &[&MicroPolygon], camera: &Camera) -> SampleCounts {
        let width = self.rect.width as usize;
        let height = self.rect.height as usize;
        let spp = self.spp;

        let mut rows: Vec<Vec<usize>> = vec![Vec::new(); height];
        for (k, mpg) in batch.iter().enumerate() {
            if let Some((y0, y1)) = Self::span(&mpg.bound().y, self.rect.y, self.rect.height) {
                for row in &mut rows[y0..=y1] {
                    row.push(k);
                }
            }
        }

        let rect = self.rect;
        let clip = Interval::new(camera.near(), camera.far());
        self.points
            .par_chunks_mut(width * spp)
            .zip(self.max_depth.par_chunks_mut(width))
            .zip(self.samples.par_chunks(width * spp))
            .zip(rows.par_iter())
            .map(|(((points, max_depth), samples), bin)| {
                let mut counts = SampleCounts::default();
                for &k in bin {
                    let mpg = batch[k];
                    let bound = mpg.bound();
                    let Some((x0, x1)) = Self::span(&bound.x, rect.x, rect.width) else {
                        continue;
                    };
                    for px in x0..=x1 {
                        if bound.z.min > max_depth[px] {
                            continue;
                        }
                        let base = px * spp;
                        let mut occluder_added = false;
                        for s in base..base + spp {
                            let sample = &samples[s];
                            counts.tests += 1;
                            if mpg.moving().is_some() && !mpg.bound_at(sample.time).contains_xy(sample.position) {
                                continue;
                            }
                            let shifted = sample.position - camera.lens_offset(sample.lens, mpg.focus_depth());
                            let Some(depth) = mpg.contains(shifted, sample.time) else {
                                continue;
                            };
                            if mpg.is_trimmed() && !clip.contains(depth) {
                                continue;
                            }
                            let hit = Hit {
                                depth,
                                color: mpg.color,
                                opacity: mpg.opacity,
                                matte: mpg.matte,
                            };
                            match points[s].insert(hit) {
                                Insert::Hidden => continue,
                                Insert::Opaque => occluder_added = true,
                                Insert::Transparent => {}
                            }
                            counts.hits += 1;
                            mpg.mark_hit();
                        }
                        if occluder_added {
                            max_depth[px] = points[base..base + spp]
                                .iter()
                                .map(SamplePoint::opaque_depth)
                                .fold(f32::NEG_INFINITY, f32::max);
                        }
                    }
                }
                counts
            })
            .reduce(SampleCounts::default, |a, b| SampleCounts {
                tests: a.tests + b.tests,
                hits: a.hits + b.hits,
            })
    }

    /// Composite every sample.
    pub fn resolve(&mut self) -> Vec<SampleValue> {
        self.points.par_iter_mut().map(SamplePoint::resolve).collect()
    }

    /// Filter resolved samples into the pixels of `target`, which must lie
    /// inside the buffer. Output is row-major.
    pub fn filter(&self, values: &[SampleValue], filter: &PixelFilter, target: PixelRect) -> Vec<Pixel> {
        let [bx, by] = filter.border();
        let spp = self.spp;
        let mut pixels = vec![Pixel::default(); target.pixel_count()];

        pixels
            .par_chunks_mut(target.width as usize)
            .enumerate()
            .for_each(|(row, out)| {
                let y = target.y + row as u32;
                let sy0 = y.saturating_sub(by).max(self.rect.y);
                let sy1 = (y + by).min(self.rect.y1() - 1);
                for (col, pixel) in out.iter_mut().enumerate() {
                    let x = target.x + col as u32;
                    let centre = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                    let sx0 = x.saturating_sub(bx).max(self.rect.x);
                    let sx1 = (x + bx).min(self.rect.x1() - 1);

                    let mut color = Color::ZERO;
                    let mut alpha = 0.0;
                    let mut total = 0.0;
                    for py in sy0..=sy1 {
                        for px in sx0..=sx1 {
                            let start = self.pixel_index(px, py) * spp;
                            for s in start..start + spp {
                                let d = self.samples[s].position - centre;
                                let w = filter.weight(d.x, d.y);
                                if w != 0.0 {
                                    color += values[s].color * w;
                                    alpha += values[s].alpha * w;
                                    total += w;
                                }
                            }
                        }
                    }

                    let own = self.pixel_index(x, y) * spp;
                    let own = &values[own..own + spp];
                    if total.abs() < 1.0e-8 {
                        // Filter support missed every sample
                        color = own.iter().map(|v| v.color).sum::<Color>();
                        alpha = own.iter().map(|v| v.alpha).sum::<f32>();
                        total = spp as f32;
                    }

                    *pixel = Pixel {
                        color: color / total,
                        alpha: alpha / total,
                        depth: own.iter().map(|v| v.depth).fold(f32::INFINITY, f32::min),
                        coverage: own.iter().filter(|v| v.hit).count() as f32 / spp as f32,
                    };
                }
            });
        pixels
    }
}
