pub mod camera;
pub mod error;
pub mod guidance;
pub mod models;
pub mod sensing;
pub mod sessions;
pub mod settings;
mod utils;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use tokio::sync::broadcast::error::RecvError;

pub use camera::{CaptureDevice, CapturedImage, PlaceholderCamera};
pub use error::GuidanceError;
pub use guidance::{
    AngleId, AngleWrap, GuidanceCategory, GuidanceConfig, GuidanceController, GuidanceEvent,
    GuidanceSnapshot, MotionSample,
};
pub use sensing::{MotionSampleSource, ScriptedMotionSource};
pub use sessions::{JsonSessionStore, MemorySessionStore, SessionManager, SessionStore};
pub use settings::{GuidanceSettings, SettingsStore};
pub use utils::init_logging;

use guidance::CountdownState;

const IDLE_POLL: Duration = Duration::from_millis(250);

/// Replay a recorded motion script through the guidance core.
#[derive(Parser, Debug)]
#[command(name = "capture-guide")]
#[command(about = "Run a guided capture session against a recorded motion script")]
#[command(version)]
pub struct ReplayArgs {
    /// JSON-lines file, one `{"x":..,"y":..,"z":..}` sample per line
    #[arg(long)]
    script: PathBuf,

    /// Where sessions.json and settings.json live
    #[arg(long, default_value = "capture-data")]
    data_dir: PathBuf,

    /// Override the stored locale
    #[arg(long)]
    locale: Option<String>,

    /// Angle to begin at (front, right45, left45, top, donor)
    #[arg(long, value_parser = parse_angle)]
    start_angle: Option<AngleId>,

    /// Disable voice prompts and remember the choice
    #[arg(long)]
    no_voice: bool,

    /// Disable feedback cues and remember the choice
    #[arg(long)]
    no_cues: bool,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_angle(value: &str) -> Result<AngleId, String> {
    AngleId::parse(value).ok_or_else(|| format!("unknown angle '{value}'"))
}

pub fn run() -> Result<()> {
    let args = ReplayArgs::parse();
    init_logging(args.verbose);

    info!("capture-guide starting up...");

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(replay(args))
}

async fn replay(args: ReplayArgs) -> Result<()> {
    std::fs::create_dir_all(&args.data_dir)
        .with_context(|| format!("failed to create {}", args.data_dir.display()))?;

    let settings_store = SettingsStore::new(args.data_dir.join("settings.json"))?;
    let mut settings = settings_store.guidance();
    if let Some(locale) = args.locale.clone() {
        settings.locale = locale;
    }
    if args.no_voice {
        settings.voice_enabled = false;
    }
    if args.no_cues {
        settings.cues_enabled = false;
    }
    settings_store.update_guidance(settings.clone())?;

    let store = Arc::new(JsonSessionStore::new(args.data_dir.join("sessions.json")));
    let sessions = SessionManager::load(store).await?;
    let source = ScriptedMotionSource::from_jsonl_file(&args.script).await?;
    info!("loaded {} samples from {}", source.remaining(), args.script.display());

    let camera = Arc::new(PlaceholderCamera::new());
    let controller = GuidanceController::new(
        GuidanceConfig::from_env(),
        &settings,
        sessions.clone(),
        camera.clone(),
    );

    let mut events = controller.events();
    controller.start(Box::new(source), args.start_angle).await?;

    let completed = loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    info!("event {}", serde_json::to_string(&event)?);
                    if matches!(event, GuidanceEvent::SessionComplete { .. }) {
                        break true;
                    }
                }
                Err(RecvError::Lagged(missed)) => warn!("dropped {missed} guidance events"),
                Err(RecvError::Closed) => break false,
            },
            _ = tokio::time::sleep(IDLE_POLL) => {
                let snapshot = controller.snapshot();
                let settled = !controller.is_sampling().await
                    && snapshot.countdown == CountdownState::Idle;
                if settled {
                    break snapshot.sequence_complete;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupted");
                break false;
            }
        }
    };

    controller.stop().await?;

    if completed {
        if let Some(session) = sessions.complete_session(None).await? {
            info!(
                "session {} complete with {} photos",
                session.id,
                session.photos.len()
            );
        }
    } else if let Some(session) = sessions.active_session().await {
        info!(
            "session {} left open with {} of {} photos",
            session.id,
            session.photos.len(),
            guidance::ANGLES.len()
        );
    }

    info!("{} shots taken", camera.shots());
    Ok(())
}
