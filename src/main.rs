use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use photobooth::camera::{CameraBackend, CameraStatus, StillCamera};
use photobooth::config::{CameraPolicy, OverlayPolicy};
use photobooth::delivery::{self, EmailRelay};
use photobooth::session::TracingObserver;
use photobooth::{BoothConfig, SessionController, StartOutcome};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Booth configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Webcam device index
    #[arg(short, long)]
    device: Option<u32>,

    /// Serve this image as the camera instead of a webcam
    #[arg(long)]
    still: Option<PathBuf>,

    /// Index of the overlay to burn into each shot
    #[arg(short, long, default_value_t = 0)]
    overlay: usize,

    /// Number of shots per strip
    #[arg(long)]
    shots: Option<u32>,

    /// Directory the finished strip is saved to
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Email the strip to this address after saving it
    #[arg(long)]
    email: Option<String>,

    /// Email relay endpoint
    #[arg(long, env = "PHOTOBOOTH_RELAY_URL")]
    relay_url: Option<String>,

    /// Fail a shot when its overlay cannot be loaded
    #[arg(long)]
    strict_overlays: bool,

    /// Open the camera when the session starts instead of up front
    #[arg(long)]
    lazy_camera: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("Photo booth starting");

    let mut config = match &args.config {
        Some(path) => BoothConfig::load(path).context("Failed to load booth config")?,
        None => BoothConfig::default(),
    };
    apply_overrides(&mut config, &args);
    config.validate().context("Invalid booth config")?;

    tracing::info!("Shots: {}, countdown: {}s", config.shots, config.countdown_seconds);
    tracing::info!("Camera: {}x{}", config.camera.width, config.camera.height);
    if config.relay.url.is_none() {
        tracing::info!("Email relay not configured, email delivery disabled");
    }

    match &args.still {
        Some(path) => run(config, StillCamera::new(path), &args).await,
        None => run_webcam(config, &args).await,
    }
}

fn apply_overrides(config: &mut BoothConfig, args: &Args) {
    if let Some(device) = args.device {
        config.camera.device_index = device;
    }
    if let Some(shots) = args.shots {
        config.shots = shots;
    }
    if let Some(url) = &args.relay_url {
        config.relay.url = Some(url.clone());
    }
    if args.strict_overlays {
        config.overlays.policy = OverlayPolicy::Strict;
    }
    if args.lazy_camera {
        config.camera.policy = CameraPolicy::AcquireOnStart;
    }
}

#[cfg(feature = "webcam")]
async fn run_webcam(config: BoothConfig, args: &Args) -> Result<()> {
    let backend = photobooth::camera::WebcamBackend::new(config.camera.device_index);
    run(config, backend, args).await
}

#[cfg(not(feature = "webcam"))]
async fn run_webcam(_config: BoothConfig, _args: &Args) -> Result<()> {
    bail!("Built without webcam support; pass --still <image>")
}

async fn run<B: CameraBackend>(config: BoothConfig, backend: B, args: &Args) -> Result<()> {
    let relay = EmailRelay::from_config(&config.relay);
    let policy = config.camera.policy;
    let controller = SessionController::new(config, backend, Box::new(TracingObserver))
        .context("Failed to set up session")?;

    let overlays = controller.overlays();
    if args.overlay >= overlays.len() {
        let names: Vec<_> = overlays
            .iter()
            .enumerate()
            .map(|(i, o)| format!("{}: {}", i, o.name))
            .collect();
        bail!(
            "Overlay {} does not exist, available overlays are [{}]",
            args.overlay,
            names.join(", ")
        );
    }
    controller
        .select_overlay(args.overlay)
        .context("Invalid overlay selection")?;

    if policy == CameraPolicy::RequireBegin {
        if let CameraStatus::Blocked(reason) = controller.begin().await {
            bail!("Camera blocked: {}", reason);
        }
    }

    let strip = match controller.start().await.context("Capture session failed")? {
        StartOutcome::Delivered(strip) => strip,
        StartOutcome::AlreadyRunning => bail!("A session is already running"),
    };

    // Named after the moment the strip was produced, not when it was saved
    delivery::save_strip(&strip, &args.output_dir, strip.produced_at().with_timezone(&Utc))
        .context("Failed to save strip")?;

    if let Some(email) = &args.email {
        relay
            .send(email, controller.strip().as_ref())
            .await
            .context("Failed to email strip")?;
    }

    Ok(())
}
