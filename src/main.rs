mod capture;
mod overlay;
mod pipeline;
mod segmentation;
mod state;
mod viewport;

use anyhow::{Context, Result};
use capture::{CaptureSource, PreviewCapture, SamplerConfig};
use clap::Parser;
use overlay::{Compositor, OverlaySink, V4L2Output};
use pipeline::Pipeline;
use segmentation::ModelDescriptor;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use viewport::Viewport;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input webcam device index
    #[arg(short, long, default_value_t = 0)]
    device: u32,

    /// Window width the viewport is derived from
    #[arg(long, default_value_t = 1920)]
    window_width: u32,

    /// Still-photo sampling period in milliseconds
    #[arg(long, default_value_t = 1000)]
    period_ms: u64,

    /// Path to the segmentation model (ONNX file)
    #[arg(long)]
    model: PathBuf,

    /// Path to the model config.json (class labels)
    #[arg(long)]
    model_config: Option<PathBuf>,

    /// Path to preprocessor_config.json (normalization, input size)
    #[arg(long)]
    preprocessor_config: Option<PathBuf>,

    /// Overlay opacity, 0.0 to 1.0
    #[arg(long, default_value_t = 0.5)]
    opacity: f32,

    /// Show the raw mask instead of blending it over the preview
    #[arg(long)]
    mask_only: bool,

    /// Output v4l2loopback device path
    #[arg(short, long, default_value = "/dev/video10")]
    output_device: String,

    /// Render loop frames per second
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let viewport = Viewport::from_window_width(args.window_width);

    tracing::info!("Segcam starting");
    tracing::info!("Viewport: {}x{}", viewport.width, viewport.height);
    tracing::info!("Sampling period: {}ms", args.period_ms);
    tracing::info!("Render FPS: {}", args.fps);

    // Preview failure is non-fatal: the overlay still renders over black.
    let preview = match PreviewCapture::open(args.device, viewport) {
        Ok(preview) => Some(preview),
        Err(e) => {
            tracing::warn!("No live preview: {e:#}");
            None
        }
    };

    let mut sink = V4L2Output::new(&args.output_device, viewport.width, viewport.height)
        .context("Failed to initialize v4l2loopback output")?;

    let descriptor = ModelDescriptor::new(
        args.model,
        args.model_config,
        args.preprocessor_config,
    );
    let compositor = Compositor::new(viewport, args.opacity, args.mask_only);

    let mut pipeline = Pipeline::start(
        SamplerConfig {
            device_index: args.device,
            viewport,
            period: Duration::from_millis(args.period_ms),
        },
        descriptor,
    );

    let result = run_render_loop(preview, &mut sink, &pipeline, compositor, args.fps);
    pipeline.shutdown();
    result
}

fn run_render_loop<C, O>(
    mut preview: Option<C>,
    sink: &mut O,
    pipeline: &Pipeline,
    compositor: Compositor,
    target_fps: u32,
) -> Result<()>
where
    C: CaptureSource,
    O: OverlaySink,
{
    let frame_duration = Duration::from_secs_f32(1.0 / target_fps.max(1) as f32);
    let mut frame_count = 0u64;
    let mut total_capture_time = Duration::ZERO;
    let mut total_render_time = Duration::ZERO;

    tracing::info!("Starting render loop");
    tracing::info!("Press Ctrl+C to stop");

    loop {
        let loop_start = Instant::now();

        let capture_start = Instant::now();
        let base = match preview.as_mut() {
            Some(camera) => match camera.capture_frame() {
                Ok(frame) => Some(frame),
                Err(e) => {
                    tracing::warn!("Preview read failed: {e:#}");
                    None
                }
            },
            None => None,
        };
        total_capture_time += capture_start.elapsed();

        let render_start = Instant::now();
        let mask = pipeline.current_overlay();
        let composited = compositor.composite(base.as_ref(), mask.as_ref());
        sink.write_frame(&composited)
            .context("Failed to write frame")?;
        total_render_time += render_start.elapsed();

        frame_count += 1;

        if frame_count % 30 == 0 {
            let avg_capture_ms = total_capture_time.as_secs_f64() * 1000.0 / frame_count as f64;
            let avg_render_ms = total_render_time.as_secs_f64() * 1000.0 / frame_count as f64;
            let total_ms = avg_capture_ms + avg_render_ms;
            tracing::info!(
                "Frame {}: capture={:.1}ms, render={:.1}ms, total={:.1}ms, overlay={}",
                frame_count,
                avg_capture_ms,
                avg_render_ms,
                total_ms,
                if mask.is_some() { "yes" } else { "not yet" }
            );
        }

        let elapsed = loop_start.elapsed();
        if elapsed < frame_duration {
            std::thread::sleep(frame_duration - elapsed);
        }
    }
}
