use anyhow::{anyhow, Context};
use chrono::Local;
use clap::{Parser, Subcommand};
use emotion_overlay::config::Config;
use emotion_overlay::emotion::EmotionAnalyzer;
use emotion_overlay::overlay::RasterCanvas;
use emotion_overlay::pipeline::Orchestrator;
use emotion_overlay::upload::UploadedImage;
use emotion_overlay::{Emotion, EmotionDetectorError, Frame};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect the emotion in a single image
    Analyze {
        /// Image file to analyze
        image: PathBuf,

        /// Write the image with the overlay drawn on top to this path
        #[arg(short, long)]
        overlay: Option<PathBuf>,
    },
    /// Run continuous detection against the camera
    Camera {
        /// Stop after this many frames
        #[arg(short, long)]
        frames: Option<u64>,
    },
    /// List the emotions that can be reported
    Emotions,
}

/// Initializes the logging system (file only, no console output)
fn init_logging(config: &Config) -> anyhow::Result<()> {
    let log_file = std::fs::File::create(&config.logging.file)
        .map_err(EmotionDetectorError::Io)
        .with_context(|| format!("creating log file {}", config.logging.file.display()))?;

    let file_layer = fmt::layer()
        .with_writer(Arc::new(log_file))
        .with_ansi(false);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .init();

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(Config::default()),
    }
}

/// Renders the current overlay onto `frame` and saves the composite
fn write_overlay(
    orchestrator: &Orchestrator,
    canvas: &mut RasterCanvas,
    frame: &Frame,
    path: &Path,
) -> anyhow::Result<()> {
    orchestrator.render(canvas, frame.width, frame.height);
    canvas
        .composite_onto(frame)?
        .save(path)
        .with_context(|| format!("writing overlay to {}", path.display()))?;
    info!("Overlay written to {}", path.display());
    Ok(())
}

async fn analyze(image: &Path, overlay: Option<PathBuf>) -> anyhow::Result<()> {
    let upload = UploadedImage::load_from_path(image)
        .with_context(|| format!("reading {}", image.display()))?;
    let (width, height) = (upload.frame.width, upload.frame.height);

    let orchestrator = Orchestrator::new(EmotionAnalyzer::new());
    let result = orchestrator
        .submit_image(upload.frame.clone(), Local::now())
        .await?
        .ok_or_else(|| anyhow!("detection was superseded"))?;
    println!("{result}");

    if let Some(path) = overlay {
        let mut canvas = RasterCanvas::new(width, height);
        write_overlay(&orchestrator, &mut canvas, &upload.frame, &path)?;
    }

    Ok(())
}

#[cfg(feature = "camera")]
async fn camera(config: &Config, frames: Option<u64>) -> anyhow::Result<()> {
    use emotion_overlay::camera::{CaptureSession, NokhwaCamera};
    use emotion_overlay::EmotionDetails;
    use std::ops::ControlFlow;

    let orchestrator = Orchestrator::new(EmotionAnalyzer::new());
    let mut results = orchestrator.subscribe();
    let mut canvas = RasterCanvas::new(config.camera.width, config.camera.height);
    let mut session = CaptureSession::acquire(NokhwaCamera::new(&config.camera))?;
    let mut delivered = 0u64;

    let waiting = EmotionDetails::waiting();
    println!("{} {}", waiting.glyph, waiting.label);

    let mut last_frame = None;

    let outcome = session
        .run(|frame| {
            orchestrator.render(&mut canvas, frame.width, frame.height);
            last_frame = Some(frame.clone());
            orchestrator.submit_frame(frame, Local::now());

            while let Ok(result) = results.try_recv() {
                println!("{result}");
            }

            delivered += 1;
            match frames {
                Some(limit) if delivered >= limit => ControlFlow::Break(()),
                _ => ControlFlow::Continue(()),
            }
        })
        .await;

    session.release();
    if let Err(e) = outcome {
        orchestrator.deactivate();
        return Err(e.into());
    }

    if let (Some(path), Some(frame)) = (&config.output.overlay_path, &last_frame) {
        write_overlay(&orchestrator, &mut canvas, frame, path)?;
    }

    orchestrator.deactivate();
    Ok(())
}

#[cfg(not(feature = "camera"))]
async fn camera(_config: &Config, _frames: Option<u64>) -> anyhow::Result<()> {
    Err(EmotionDetectorError::CameraInit(
        "built without camera support; rebuild with --features camera".to_string(),
    )
    .into())
}

fn list_emotions() {
    for emotion in Emotion::ALL {
        let details = emotion.details();
        println!("{:<10} {} {}", details.id, details.glyph, details.label);
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    init_logging(&config)?;

    // Detection runs cooperatively on one thread
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(async {
        match args.command {
            Command::Analyze { image, overlay } => {
                analyze(&image, overlay.or(config.output.overlay_path.clone())).await
            }
            Command::Camera { frames } => camera(&config, frames).await,
            Command::Emotions => {
                list_emotions();
                Ok(())
            }
        }
    });

    if let Err(e) = &result {
        error!("Application error: {:#}", e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[tokio::test(start_paused = true)]
    async fn overlay_is_written_over_the_last_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overlay.png");
        let orchestrator = Orchestrator::new(EmotionAnalyzer::with_rng(StepRng::new(0, 0)));
        let frame = Frame::solid(64, 48, [220, 220, 220]);
        orchestrator
            .submit_image(frame.clone(), Local::now())
            .await
            .unwrap();

        // Stale size from an earlier tick is replaced by the frame's
        let mut canvas = RasterCanvas::new(8, 8);
        write_overlay(&orchestrator, &mut canvas, &frame, &path).unwrap();

        let written = image::open(&path).unwrap().to_rgba8();
        assert_eq!(written.dimensions(), (64, 48));
        assert!(written.pixels().any(|p| p.0 != [220, 220, 220, 255]));
        assert!(!canvas.is_blank());
    }
}
