//! `eyecap`: command-line companion to the eyecap daemon.
//!
//! `replay` and `crop` run the capture core locally; the remaining commands
//! talk to `eyecapd` over D-Bus.

use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use eyecap_core::crop::DEFAULT_CROP_MARGIN;
use eyecap_core::{CaptureSession, EyeSelection, OverlaySize, PixelBox, SessionConfig};
use tracing_subscriber::EnvFilter;

mod crop;
mod replay;

#[derive(Parser)]
#[command(name = "eyecap", version, about = "Eye image capture tools")]
struct Cli {
    /// Talk to a daemon on the session bus instead of the system bus
    #[arg(long, global = true)]
    session: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a recorded landmark trace and print the notifications it produces
    Replay {
        /// JSON-lines trace file
        trace: PathBuf,
        #[arg(long, default_value = "left")]
        eye: EyeSelection,
        #[arg(long, default_value_t = eyecap_core::blink::DEFAULT_EAR_THRESHOLD)]
        ear_threshold: f64,
        #[arg(long, default_value_t = eyecap_core::blink::DEFAULT_MIN_CLOSED_FRAMES)]
        min_closed_frames: u32,
        /// Overlay size as WIDTHxHEIGHT
        #[arg(long, value_parser = crop::parse_size, default_value = "480x360")]
        overlay: OverlaySize,
        /// Print per-frame metrics
        #[arg(short, long)]
        verbose: bool,
    },
    /// Crop the eye region from a saved frame
    Crop {
        /// Full-resolution frame image
        frame: PathBuf,
        /// Eye bounding box as x,y,w,h
        #[arg(long, value_parser = crop::parse_bbox, allow_hyphen_values = true)]
        bbox: PixelBox,
        /// Size the box coordinates refer to, as WIDTHxHEIGHT (default: frame size)
        #[arg(long, value_parser = crop::parse_size)]
        overlay: Option<OverlaySize>,
        #[arg(long, default_value_t = DEFAULT_CROP_MARGIN)]
        margin: f64,
        /// Output PNG path
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Show daemon status
    Status,
    /// Select which eye the daemon tracks
    SelectEye {
        eye: EyeSelection,
    },
    /// List captured images for a user
    Images {
        /// User name (default: current user)
        #[arg(long)]
        user: Option<String>,
    },
    /// Show capture counts per eye and per day
    Analytics {
        #[arg(long)]
        user: Option<String>,
    },
    /// E-mail a captured image
    Share {
        filename: String,
        recipient: String,
        #[arg(long)]
        user: Option<String>,
    },
}

#[zbus::proxy(
    interface = "org.eyecap.Eyecap1",
    default_service = "org.eyecap.Eyecap1",
    default_path = "/org/eyecap/Eyecap1"
)]
trait Eyecap {
    fn select_eye(&self, eye: &str) -> zbus::Result<()>;
    fn share(&self, user: &str, filename: &str, recipient: &str) -> zbus::Result<String>;
    fn status(&self) -> zbus::Result<String>;
    fn list_images(&self, user: &str) -> zbus::Result<String>;
    fn analytics(&self, user: &str) -> zbus::Result<String>;
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Replay {
            trace,
            eye,
            ear_threshold,
            min_closed_frames,
            overlay,
            verbose,
        } => {
            let mut config = SessionConfig::default();
            config.blink.ear_threshold = ear_threshold;
            config.blink.min_closed_frames = min_closed_frames;
            config.overlay = overlay;
            config.default_eye = eye;
            let mut session = CaptureSession::new(config);

            let file = std::fs::File::open(&trace)
                .with_context(|| format!("failed to open {}", trace.display()))?;
            let summary = replay::replay(
                &mut session,
                BufReader::new(file),
                &mut replay::StdoutSink,
                verbose,
            )?;

            println!(
                "{} frames ({} without a face, {} skipped), {} notifications, capture enabled on {} frames",
                summary.frames,
                summary.no_face,
                summary.skipped,
                summary.notifications,
                summary.enabled_frames,
            );
            let state = if session.is_enabled() {
                "enabled"
            } else {
                "disabled"
            };
            println!("final state: capture {state}");
        }
        Command::Crop {
            frame,
            bbox,
            overlay,
            margin,
            out,
        } => {
            let rect = crop::crop_file(&frame, &bbox, overlay, margin, &out)?;
            println!(
                "wrote {} ({}x{} at {},{})",
                out.display(),
                rect.width,
                rect.height,
                rect.x,
                rect.y
            );
        }
        Command::Status => print_json(&connect(cli.session).await?.status().await?)?,
        Command::SelectEye { eye } => {
            connect(cli.session)
                .await?
                .select_eye(&eye.to_string())
                .await?;
            println!("tracking {eye} eye");
        }
        Command::Images { user } => {
            let user = user_or_current(user)?;
            print_json(&connect(cli.session).await?.list_images(&user).await?)?;
        }
        Command::Analytics { user } => {
            let user = user_or_current(user)?;
            print_json(&connect(cli.session).await?.analytics(&user).await?)?;
        }
        Command::Share {
            filename,
            recipient,
            user,
        } => {
            let user = user_or_current(user)?;
            let proxy = connect(cli.session).await?;
            print_json(&proxy.share(&user, &filename, &recipient).await?)?;
        }
    }

    Ok(())
}

async fn connect(session: bool) -> Result<EyecapProxy<'static>> {
    let conn = if session {
        zbus::Connection::session().await
    } else {
        zbus::Connection::system().await
    }
    .context("failed to connect to D-Bus")?;
    EyecapProxy::new(&conn)
        .await
        .context("failed to create eyecapd proxy (is eyecapd running?)")
}

/// Pretty-print a JSON reply from the daemon.
fn print_json(json: &str) -> Result<()> {
    let value: serde_json::Value = serde_json::from_str(json).context("daemon sent bad JSON")?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn user_or_current(user: Option<String>) -> Result<String> {
    match user {
        Some(u) => Ok(u),
        None => std::env::var("USER").context("USER not set; pass --user"),
    }
}
