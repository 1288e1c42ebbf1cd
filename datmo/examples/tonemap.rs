//! Example: Tone-map a synthetic HDR scene for a target display.
//!
//! Creates a high dynamic range test scene, runs a background tone mapping
//! job and writes the result as a binary PPM.
//!
//! Run with: RUST_LOG=debug cargo run --example tonemap -- [options.json] [out.ppm]

use datmo::{JobEvent, JobRegistry, RgbPlanes, TonemapJob, TonemapOptions};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Display-adaptive Tone Mapping Example");
    println!("=====================================");

    let mut args = std::env::args().skip(1);
    let options: TonemapOptions = match args.next() {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => TonemapOptions::default(),
    };
    let output_path = args.next().unwrap_or_else(|| "tonemapped.ppm".into());

    // Dim interior with a window onto a sunlit scene, about six orders of magnitude.
    let width = 512u32;
    let height = 320u32;
    let mut frame = RgbPlanes::new(width, height)?;
    for y in 0..height {
        for x in 0..width {
            let u = x as f32 / (width - 1) as f32;
            let v = y as f32 / (height - 1) as f32;
            let i = (y * width + x) as usize;

            let in_window = (0.55..0.9).contains(&u) && (0.1..0.5).contains(&v);
            let (r, g, b) = if in_window {
                let sky = 3000.0 * (1.0 - v);
                (sky * 0.8, sky * 0.9, sky * 1.2)
            } else {
                let shade = 0.02 + 0.5 * u * (1.0 - v);
                (shade * 1.1, shade, shade * 0.7)
            };
            frame.r[i] = r;
            frame.g[i] = g;
            frame.b[i] = b;
        }
    }
    println!("Created {}x{} HDR test scene", width, height);

    let registry = JobRegistry::new();
    let handle = TonemapJob::display_adaptive(frame, width, options)
        .with_registry(&registry)
        .spawn()?;
    println!("Live jobs: {}", registry.live_jobs());

    let mut result = None;
    for event in handle.events() {
        match event {
            JobEvent::MaximumSteps(max) => println!("Steps: {}", max),
            JobEvent::Progress(p) => print!("\r  progress {:3}", p),
            JobEvent::ImageComputed(image, _) => result = Some(image),
            JobEvent::Finished => println!("\nFinished"),
            JobEvent::Error(message) => return Err(message.into()),
        }
    }
    handle.wait();

    let image = result.ok_or("job produced no image")?;
    let mut ppm = format!("P6\n{} {}\n255\n", image.width(), image.height()).into_bytes();
    for px in image.to_rgba8().chunks_exact(4) {
        ppm.extend_from_slice(&px[..3]);
    }
    std::fs::write(&output_path, &ppm)?;
    println!("Saved {}x{} to {}", image.width(), image.height(), output_path);

    Ok(())
}
