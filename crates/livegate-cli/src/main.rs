//! `livegate`: build galleries, check liveness and verify captures from
//! image files with precomputed face-model sidecars.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use livegate_core::{
    spawn_worker, Error as CoreError, Frame, Gallery, GalleryHandle, LandmarkSource,
    LivenessEvaluator, Verifier, WorkerHandle,
};
use tracing_subscriber::EnvFilter;

mod config;
mod fixture;

use config::Config;
use fixture::FixtureModel;

/// Image extensions considered when scanning a gallery directory.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp"];

#[derive(Parser)]
#[command(name = "livegate", version, about = "Liveness-gated face verification")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Verify a captured image against a gallery directory
    Verify {
        /// Directory of reference images (`label.jpg`, `label@2.jpg`, ...)
        #[arg(long)]
        gallery: PathBuf,
        /// Captured image to verify
        #[arg(long)]
        capture: PathBuf,
        /// Acceptance threshold, overriding config and environment
        #[arg(long)]
        threshold: Option<f32>,
    },
    /// Build a gallery and print a summary
    Gallery {
        #[arg(long)]
        gallery: PathBuf,
    },
    /// Run only the liveness check on an image
    Liveness {
        #[arg(long)]
        capture: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(cli.config.as_deref())?;
    let worker = spawn_worker(FixtureModel, config.worker_queue)
        .context("failed to start face model thread")?;

    match cli.command {
        Command::Verify {
            gallery,
            capture,
            threshold,
        } => verify(&config, worker, &gallery, &capture, threshold).await,
        Command::Gallery { gallery } => {
            let gallery = build_gallery(&worker, &gallery).await?;
            let entries: Vec<_> = gallery
                .entries()
                .map(|e| {
                    serde_json::json!({
                        "label": e.label(),
                        "descriptors": e.descriptors().len(),
                    })
                })
                .collect();
            print_json(&serde_json::json!({
                "identities": gallery.len(),
                "dimension": gallery.dimension(),
                "entries": entries,
            }))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Liveness { capture } => {
            let frame = load_frame(&capture)?;
            let landmarks = worker
                .landmarks(&frame)
                .await?
                .ok_or(CoreError::NoFaceFound)
                .with_context(|| format!("{}", capture.display()))?;
            let verdict = LivenessEvaluator::new(config.liveness).evaluate(&landmarks)?;
            print_json(&verdict)?;
            Ok(if verdict.is_live {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
    }
}

async fn verify(
    config: &Config,
    worker: WorkerHandle,
    gallery_dir: &Path,
    capture: &Path,
    threshold: Option<f32>,
) -> Result<ExitCode> {
    let verifier_config = config.verifier(threshold)?;
    let gallery = build_gallery(&worker, gallery_dir).await?;
    let frame = load_frame(capture)?;

    let worker = Arc::new(worker);
    let verifier = Verifier::new(
        verifier_config,
        worker.clone(),
        worker,
        GalleryHandle::new(gallery),
    )?;

    let timeout = Duration::from_secs(config.verify_timeout_secs);
    let verdict = tokio::time::timeout(timeout, verifier.verify(&frame))
        .await
        .with_context(|| format!("verification timed out after {}s", timeout.as_secs()))??;

    print_json(&verdict)?;
    Ok(if verdict.is_accepted() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

/// Decode every image in `dir` and build a gallery from them. Images that
/// fail to decode are skipped like images without a face.
async fn build_gallery(worker: &WorkerHandle, dir: &Path) -> Result<Gallery> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read gallery directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| is_image(p))
        .collect();
    paths.sort();

    if paths.is_empty() {
        bail!("no reference images in {}", dir.display());
    }

    let mut references = Vec::with_capacity(paths.len());
    for path in &paths {
        let Some(label) = label_for(path) else {
            tracing::warn!(path = %path.display(), "cannot derive label, skipping");
            continue;
        };
        match load_frame(path) {
            Ok(frame) => references.push((label, frame)),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "unreadable reference image, skipping"),
        }
    }

    Ok(Gallery::build(worker, references).await?)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Identity label for a reference image: the file stem up to the first `@`,
/// so `alice.jpg` and `alice@side.jpg` both enroll `alice`.
fn label_for(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let label = stem.split('@').next()?;
    (!label.is_empty()).then(|| label.to_string())
}

fn load_frame(path: &Path) -> Result<Frame> {
    let image = image::open(path)
        .with_context(|| format!("failed to decode image {}", path.display()))?
        .to_rgb8();
    let (width, height) = image.dimensions();
    Ok(Frame::new(
        path.to_string_lossy(),
        width,
        height,
        image.into_raw(),
    ))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
