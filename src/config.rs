use std::path::PathBuf;
use std::time::Duration;

use crate::constants::canvas::{DEFAULT_SLEEP_SECS, LATEST_LINK_NAME, RETRY_BACKOFF_SECS};
use crate::constants::picker::{
    DEFAULT_FORTUNES_DIR, DEFAULT_MAX_LENGTH, MARKER_SUFFIX, MAX_ATTEMPTS,
};

/// Controls corpus enumeration and record selection.
#[derive(Clone, Debug)]
pub struct PickerConfig {
    /// Root directory of the fortune databases.
    pub root: PathBuf,
    /// Whether symlinked directories are followed while walking the root.
    pub follow_links: bool,
    /// Suffix of the sibling file that marks a file as eligible.
    pub marker_suffix: String,
    /// Upper bound on offset draws per pick.
    pub max_attempts: usize,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_FORTUNES_DIR),
            follow_links: true,
            marker_suffix: MARKER_SUFFIX.to_string(),
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

impl PickerConfig {
    /// Create a config rooted at `root` with default settings.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Control whether symlinked directories are followed.
    pub fn with_follow_links(mut self, follow_links: bool) -> Self {
        self.follow_links = follow_links;
        self
    }

    /// Override the eligibility marker suffix.
    pub fn with_marker_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.marker_suffix = suffix.into();
        self
    }

    /// Override the attempt bound (clamped to at least one).
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }
}

/// Top-level configuration for the image generation loop.
#[derive(Clone, Debug)]
pub struct CanvasConfig {
    /// Directory receiving generated images.
    pub outdir: PathBuf,
    /// Pause after each successful generation.
    pub sleep: Duration,
    /// Pause after a missing prompt or a rejected image.
    pub retry_backoff: Duration,
    /// Maintain a `latest.png` link to the newest image.
    pub latest: bool,
    /// Maximum prompt length, in bytes.
    pub max_length: usize,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            outdir: PathBuf::from("."),
            sleep: Duration::from_secs(DEFAULT_SLEEP_SECS),
            retry_backoff: Duration::from_secs(RETRY_BACKOFF_SECS),
            latest: true,
            max_length: DEFAULT_MAX_LENGTH,
        }
    }
}

impl CanvasConfig {
    /// Path of the `latest.png` link, or `None` when disabled.
    pub fn latest_path(&self) -> Option<PathBuf> {
        self.latest.then(|| self.outdir.join(LATEST_LINK_NAME))
    }
}
