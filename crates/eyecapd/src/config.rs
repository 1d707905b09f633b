use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use eyecap_core::{EyeSelection, OverlaySize, SessionConfig};
use serde::Deserialize;

/// Daemon configuration.
///
/// Built from defaults, then an optional TOML file named by `EYECAP_CONFIG`,
/// then `EYECAP_*` environment variables, each layer overriding the last.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory cropped eye images are written to.
    pub save_dir: PathBuf,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Directory share envelopes are dropped into for the mail relay.
    pub outbox_dir: PathBuf,
    /// Blink, crop and overlay tuning for each capture session.
    pub session: SessionConfig,
    /// Whether the daemon is running on the session bus (development mode).
    pub session_bus: bool,
}

/// On-disk form of [`Config`]. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    save_dir: Option<PathBuf>,
    db_path: Option<PathBuf>,
    outbox_dir: Option<PathBuf>,
    session_bus: Option<bool>,
    session: Option<SessionConfig>,
}

impl Config {
    /// Load configuration from the optional file and `EYECAP_*` variables.
    pub fn load() -> Result<Self> {
        let mut config = Self::defaults();
        if let Ok(path) = std::env::var("EYECAP_CONFIG") {
            config.apply_file(Path::new(&path))?;
        }
        config.apply_env();
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let overlay = self.session.overlay;
        if overlay.width == 0 || overlay.height == 0 {
            bail!(
                "overlay size must be non-zero, got {}x{}",
                overlay.width,
                overlay.height
            );
        }
        Ok(())
    }

    fn defaults() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("eyecap");

        Self {
            save_dir: data_dir.join("captured_eyes"),
            db_path: data_dir.join("eyecap.db"),
            outbox_dir: data_dir.join("outbox"),
            session: SessionConfig::default(),
            session_bus: false,
        }
    }

    fn apply_file(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        self.apply_toml(&text)
            .with_context(|| format!("invalid config {}", path.display()))
    }

    fn apply_toml(&mut self, text: &str) -> Result<()> {
        let file: FileConfig = toml::from_str(text)?;
        if let Some(v) = file.save_dir {
            self.save_dir = v;
        }
        if let Some(v) = file.db_path {
            self.db_path = v;
        }
        if let Some(v) = file.outbox_dir {
            self.outbox_dir = v;
        }
        if let Some(v) = file.session_bus {
            self.session_bus = v;
        }
        if let Some(v) = file.session {
            self.session = v;
        }
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("EYECAP_SAVE_DIR") {
            self.save_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("EYECAP_DB_PATH") {
            self.db_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("EYECAP_OUTBOX_DIR") {
            self.outbox_dir = PathBuf::from(v);
        }

        let s = &mut self.session;
        s.blink.ear_threshold = env_or("EYECAP_EAR_THRESHOLD", s.blink.ear_threshold);
        s.blink.min_closed_frames = env_or("EYECAP_MIN_CLOSED_FRAMES", s.blink.min_closed_frames);
        s.crop_margin = env_or("EYECAP_CROP_MARGIN", s.crop_margin);
        s.overlay = OverlaySize::new(
            env_or("EYECAP_OVERLAY_WIDTH", s.overlay.width),
            env_or("EYECAP_OVERLAY_HEIGHT", s.overlay.height),
        );
        s.default_eye = env_or::<EyeSelection>("EYECAP_DEFAULT_EYE", s.default_eye);

        if std::env::var("EYECAP_SESSION_BUS").is_ok() {
            self.session_bus = true;
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(v) => v.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %v, "ignoring unparseable setting");
            default
        }),
        Err(_) => default,
    }
}
