use std::path::PathBuf;

use anyhow::{Context, Result};
use argh::FromArgs;
use colors_transform::{Color, Hsl};
use image::{Rgb, RgbImage};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;

use flocking::{Boid, Flock, SimulationParameters};

/// Half-width of the square world region mapped onto the image. Boids spawn
/// within +/-4 and the margins sit at +/-2.5, so 5 keeps everything in view.
const VIEW_EXTENT: f32 = 5.0;

#[derive(FromArgs)]
/// Headless flocking simulation rendering each frame's snapshot to a PNG.
struct Args {
    /// JSON parameter file; built-in defaults when omitted
    #[argh(option)]
    params: Option<PathBuf>,
    /// number of frames to simulate
    #[argh(option, default = "600")]
    frames: usize,
    /// simulated seconds per frame
    #[argh(option, default = "1.0 / 60.0")]
    dt: f32,
    /// output image width and height in pixels
    #[argh(option, default = "900")]
    size: u32,
    /// directory receiving the numbered frame PNGs
    #[argh(option, default = "PathBuf::from(\"frames\")")]
    out_dir: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let args: Args = argh::from_env();

    let params = match &args.params {
        Some(path) => SimulationParameters::load(path)?,
        None => SimulationParameters::default(),
    };

    info!(
        "simulating {} boids for {} frames (dt = {:.4}s)",
        params.total_boids, args.frames, args.dt
    );
    info!("using {} rayon threads", rayon::current_num_threads());

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create '{}'", args.out_dir.display()))?;

    let mut flock = Flock::seed(params.total_boids);

    let pbar = ProgressBar::new(args.frames as u64);
    pbar.set_style(ProgressStyle::with_template(
        "[{elapsed_precise}/{eta_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}",
    )?);

    for frame in 0..args.frames {
        flock.advance(args.dt, &params);
        let img = render(flock.snapshot(), &params, args.size);
        let path = args.out_dir.join(format!("frame_{frame:0>8}.png"));
        img.save(&path)
            .with_context(|| format!("failed to write '{}'", path.display()))?;
        pbar.inc(1);
    }
    pbar.finish();

    info!("wrote {} frames to '{}'", args.frames, args.out_dir.display());
    Ok(())
}

/// Orthographic projection of the snapshot onto the x/y plane, one pixel
/// per boid, colored by group.
fn render(boids: &[Boid], params: &SimulationParameters, size: u32) -> RgbImage {
    let mut img = RgbImage::new(size, size);
    if params.show_boundary {
        draw_boundary(&mut img, params, size);
    }
    for boid in boids {
        let px = to_pixel(boid.position.x, size);
        // Screen y grows downward
        let py = to_pixel(-boid.position.y, size);
        if let (Some(px), Some(py)) = (px, py) {
            img.put_pixel(px, py, group_color(boid.group));
        }
    }
    img
}

fn group_color(group: u8) -> Rgb<u8> {
    let hue = if group == 0 { 330.0 } else { 205.0 };
    let rgb = Hsl::from(hue, 85.0, 65.0).to_rgb();
    Rgb([
        rgb.get_red() as u8,
        rgb.get_green() as u8,
        rgb.get_blue() as u8,
    ])
}

fn to_pixel(value: f32, size: u32) -> Option<u32> {
    let scaled = (value + VIEW_EXTENT) / (2.0 * VIEW_EXTENT) * size as f32;
    if scaled >= 0.0 && scaled < size as f32 {
        Some(scaled as u32)
    } else {
        None
    }
}

fn to_pixel_clamped(value: f32, size: u32) -> u32 {
    let scaled = (value + VIEW_EXTENT) / (2.0 * VIEW_EXTENT) * size as f32;
    (scaled.max(0.0) as u32).min(size - 1)
}

// Wireframe of the margin box, drawn only when the parameters ask for it.
fn draw_boundary(img: &mut RgbImage, params: &SimulationParameters, size: u32) {
    let grey = Rgb([90, 90, 90]);
    let x0 = to_pixel_clamped(params.left_margin, size);
    let x1 = to_pixel_clamped(params.right_margin, size);
    let y0 = to_pixel_clamped(-params.top_margin, size);
    let y1 = to_pixel_clamped(-params.bottom_margin, size);
    for px in x0..=x1 {
        img.put_pixel(px, y0, grey);
        img.put_pixel(px, y1, grey);
    }
    for py in y0..=y1 {
        img.put_pixel(x0, py, grey);
        img.put_pixel(x1, py, grey);
    }
}
