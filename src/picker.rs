use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::{debug, warn};

use crate::config::PickerConfig;
use crate::constants::picker::{LOOKAHEAD_CEILING, LOOKAHEAD_MULTIPLIER};
use crate::corpus::CorpusLayout;
use crate::errors::FortuneError;
use crate::record::{RecordMiss, record_bounds};
use crate::types::FortuneText;

/// A selected fortune together with where it was found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PickedFortune {
    /// Record body without delimiters.
    pub text: FortuneText,
    /// Database file the record was read from.
    pub path: PathBuf,
    /// Offset drawn within the virtual concatenation.
    pub offset: u64,
    /// Number of draws used, including the successful one.
    pub attempts: usize,
}

/// Why a single draw produced no fortune.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptMiss {
    /// Offset equal to the total corpus size; belongs to no file.
    PastEnd,
    /// Delimiters not found within the lookahead chunk.
    Record(RecordMiss),
    /// Record longer than the requested maximum.
    TooLong {
        /// Length of the rejected record, in bytes.
        len: usize,
    },
    /// Record bytes are not valid UTF-8.
    NotUtf8,
}

/// Picks fortunes uniformly by byte position across a directory of fortune databases.
///
/// The corpus is re-walked on every pick so files added or removed between
/// calls are picked up without restarting. The picker keeps no state between
/// calls.
#[derive(Clone, Debug)]
pub struct FortunePicker {
    config: PickerConfig,
}

impl FortunePicker {
    /// Create a picker from configuration.
    pub fn new(config: PickerConfig) -> Self {
        Self { config }
    }

    /// Picker over `root` with default settings.
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        Self::new(PickerConfig::new(root))
    }

    /// Configuration in use.
    pub fn config(&self) -> &PickerConfig {
        &self.config
    }

    /// Walk the corpus and lay out its eligible files.
    pub fn layout(&self) -> CorpusLayout {
        CorpusLayout::scan(&self.config)
    }

    /// Choose a random fortune no longer than `max_length` bytes.
    ///
    /// Returns `Ok(None)` when the corpus is empty or every attempt missed.
    /// The only error is a zero `max_length`.
    pub fn pick(&self, max_length: usize) -> Result<Option<FortuneText>, FortuneError> {
        self.pick_with_rng(&mut rand::rng(), max_length)
    }

    /// Like [`FortunePicker::pick`], drawing offsets from `rng`.
    pub fn pick_with_rng<R: Rng>(
        &self,
        rng: &mut R,
        max_length: usize,
    ) -> Result<Option<FortuneText>, FortuneError> {
        Ok(self
            .pick_detailed(rng, max_length)?
            .map(|picked| picked.text))
    }

    /// Choose a random fortune and report where it came from.
    pub fn pick_detailed<R: Rng>(
        &self,
        rng: &mut R,
        max_length: usize,
    ) -> Result<Option<PickedFortune>, FortuneError> {
        if max_length == 0 {
            return Err(FortuneError::Configuration(
                "max_length must be greater than zero".to_string(),
            ));
        }
        let layout = self.layout();
        if layout.is_empty() {
            debug!(root = %self.config.root.display(), "no fortune data to pick from");
            return Ok(None);
        }
        let lookahead = lookahead_len(max_length);
        for attempt in 0..self.config.max_attempts {
            let offset = draw_offset(rng, layout.total_size());
            debug!(attempt, offset, total = layout.total_size(), "picked offset");
            let Some(span) = layout.locate(offset) else {
                debug!(attempt, offset, miss = ?AttemptMiss::PastEnd, "attempt missed");
                continue;
            };
            match read_record_at(&span.path, span.local_offset(offset), lookahead, max_length) {
                Ok(Ok(text)) => {
                    return Ok(Some(PickedFortune {
                        text,
                        path: span.path.clone(),
                        offset,
                        attempts: attempt + 1,
                    }));
                }
                Ok(Err(miss)) => {
                    debug!(attempt, path = %span.path.display(), ?miss, "attempt missed");
                }
                Err(err) => {
                    warn!(
                        attempt,
                        path = %span.path.display(),
                        error = %err,
                        "fortune file read failed"
                    );
                }
            }
        }
        debug!(
            attempts = self.config.max_attempts,
            "gave up picking a fortune"
        );
        Ok(None)
    }
}

/// Draw from `0..=total`. Drawing `total` itself matches no file and wastes
/// the attempt.
fn draw_offset<R: Rng>(rng: &mut R, total: u64) -> u64 {
    rng.random_range(0..=total)
}

/// Bytes read after seeking: enough for several maximum-length records, capped.
pub fn lookahead_len(max_length: usize) -> usize {
    max_length
        .saturating_mul(LOOKAHEAD_MULTIPLIER)
        .min(LOOKAHEAD_CEILING)
}

/// Read the record that follows `local_offset` in `path`.
///
/// The outer `Result` carries IO failures; the inner one a parse miss.
fn read_record_at(
    path: &Path,
    local_offset: u64,
    lookahead: usize,
    max_length: usize,
) -> io::Result<Result<FortuneText, AttemptMiss>> {
    let mut file = File::open(path)?;
    if local_offset > 0 {
        file.seek(SeekFrom::Start(local_offset))?;
    }
    let mut chunk = Vec::with_capacity(lookahead);
    file.take(lookahead as u64).read_to_end(&mut chunk)?;

    let range = match record_bounds(&chunk, local_offset == 0) {
        Ok(range) => range,
        Err(miss) => return Ok(Err(AttemptMiss::Record(miss))),
    };
    debug!(
        path = %path.display(),
        start = range.start,
        end = range.end,
        "found section"
    );
    if range.len() > max_length {
        return Ok(Err(AttemptMiss::TooLong { len: range.len() }));
    }
    match std::str::from_utf8(&chunk[range]) {
        Ok(text) => Ok(Ok(text.to_string())),
        Err(_) => Ok(Err(AttemptMiss::NotUtf8)),
    }
}
