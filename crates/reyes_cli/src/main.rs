//! Render the built-in demo scene to a PNG.

mod scene;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use reyes_core::{AttributeStore, BucketOrder, RenderOptions};
use reyes_render::{ConstantShading, FrameBuffer, ImageBuffer, RippleDisplacement, ShaderTable};

#[derive(Parser)]
#[command(name = "reyes", version, about = "Bucketed micropolygon renderer")]
struct Cli {
    /// Render options as JSON; missing fields take defaults
    #[arg(long)]
    options: Option<PathBuf>,

    /// Output PNG
    #[arg(short, long, default_value = "reyes.png")]
    output: PathBuf,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Sub-samples per pixel along each axis
    #[arg(long)]
    samples: Option<u32>,

    /// Shutter close time; enables motion blur when above zero
    #[arg(long)]
    shutter: Option<f32>,

    #[arg(long)]
    seed: Option<u64>,

    /// Visit buckets nearest the centre first
    #[arg(long)]
    spiral: bool,

    /// Print the resolved options as JSON and exit
    #[arg(long)]
    dump_options: bool,
}

impl Cli {
    fn resolve_options(&self) -> Result<RenderOptions> {
        let mut options = match &self.options {
            Some(path) => RenderOptions::load(path)
                .with_context(|| format!("Failed to load options from {}", path.display()))?,
            None => RenderOptions::default(),
        };
        if let Some(width) = self.width {
            options.width = width;
        }
        if let Some(height) = self.height {
            options.height = height;
        }
        if let Some(n) = self.samples {
            options.pixel_samples = [n, n];
        }
        if let Some(close) = self.shutter {
            options.shutter = [0.0, close];
        }
        if let Some(seed) = self.seed {
            options.seed = seed;
        }
        if self.spiral {
            options.bucket_order = BucketOrder::Spiral;
        }
        Ok(options)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    let options = cli.resolve_options()?;
    if cli.dump_options {
        println!("{}", options.to_json_string()?);
        return Ok(());
    }

    let (width, height) = (options.width, options.height);
    let mut buffer = ImageBuffer::new(options, AttributeStore::new()).context("Invalid render options")?;
    scene::populate(&mut buffer);

    let shaders = ShaderTable::default().with_shader(
        "ripple",
        Arc::new(RippleDisplacement {
            amplitude: 0.1,
            frequency: 3.0,
            inner: Arc::new(ConstantShading),
        }),
    );

    let mut frame = FrameBuffer::new(width, height);
    let start = Instant::now();
    let stats = buffer
        .render_image(&shaders, &mut frame)
        .context("Render failed")?;
    log::info!(
        "Rendered {}x{} in {:.2?} ({} micropolygons)",
        width,
        height,
        start.elapsed(),
        stats.micropolygons_created
    );

    frame
        .save_png(&cli.output)
        .with_context(|| format!("Failed to write {}", cli.output.display()))?;
    Ok(())
}
