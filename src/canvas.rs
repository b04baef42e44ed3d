use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::CanvasConfig;
use crate::constants::canvas::{
    BLANK_MAX_HISTOGRAM_BINS, IMAGE_EXTENSION, META_KEY_MODEL_ID, META_KEY_PROMPT,
};
use crate::errors::FortuneError;
use crate::generator::ImageGenerator;
use crate::picker::FortunePicker;
use crate::png::{embed_text, histogram_bins};
use crate::types::FortuneText;

/// Result of one iteration of the generation loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// An image was written to `path` from `prompt`.
    Generated {
        /// Saved image.
        path: PathBuf,
        /// Fortune used as the prompt.
        prompt: FortuneText,
    },
    /// The picker returned no fortune.
    NoPrompt,
    /// The generator produced no usable image.
    Rejected,
}

/// Generates prompt images from picked fortunes and saves them with provenance.
pub struct Canvas<G> {
    picker: FortunePicker,
    generator: G,
    config: CanvasConfig,
}

impl<G: ImageGenerator> Canvas<G> {
    /// Assemble a loop from a picker, a generator, and loop settings.
    pub fn new(picker: FortunePicker, generator: G, config: CanvasConfig) -> Self {
        Self {
            picker,
            generator,
            config,
        }
    }

    /// Loop settings in use.
    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    /// Generate an image for `prompt` and save it to `filename` with metadata.
    ///
    /// Returns `Ok(false)` when the generator rejected the image or returned
    /// one that looks blank; nothing is written in that case.
    pub fn make_and_save_image(&self, prompt: &str, filename: &Path) -> Result<bool, FortuneError> {
        let is_png = filename
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == IMAGE_EXTENSION);
        if !is_png {
            return Err(FortuneError::Configuration(format!(
                "filename must end with '.{IMAGE_EXTENSION}', had: {}",
                filename.display()
            )));
        }
        let Some(image) = self.generator.generate(prompt)? else {
            return Ok(false);
        };
        let bins = histogram_bins(&image)?;
        if bins <= BLANK_MAX_HISTOGRAM_BINS {
            debug!(bins, model_id = self.generator.model_id(), "image looks blank");
            return Ok(false);
        }
        let tagged = embed_text(
            &image,
            &[
                (META_KEY_PROMPT, prompt),
                (META_KEY_MODEL_ID, self.generator.model_id()),
            ],
        )?;
        fs::write(filename, tagged)?;
        Ok(true)
    }

    /// Pick a fortune, render it, and refresh the `latest.png` link.
    pub fn step(&self) -> Result<StepOutcome, FortuneError> {
        let Some(picked) = self
            .picker
            .pick_detailed(&mut rand::rng(), self.config.max_length)?
        else {
            return Ok(StepOutcome::NoPrompt);
        };
        let name = format!("{}.{IMAGE_EXTENSION}", Utc::now().timestamp());
        let path = self.config.outdir.join(&name);
        info!(
            path = %path.display(),
            source = %picked.path.display(),
            attempts = picked.attempts,
            "generating from:\n{}",
            picked.text
        );
        if !self.make_and_save_image(&picked.text, &path)? {
            return Ok(StepOutcome::Rejected);
        }
        info!(path = %path.display(), "done");
        if let Some(latest) = self.config.latest_path() {
            info!(link = %latest.display(), target = %name, "linking latest");
            update_latest_link(&latest, &name)?;
        }
        Ok(StepOutcome::Generated {
            path,
            prompt: picked.text,
        })
    }

    /// Run the generation loop, forever when `max_iterations` is `None`.
    pub fn run(&self, max_iterations: Option<usize>) -> Result<(), FortuneError> {
        fs::create_dir_all(&self.config.outdir)?;
        let mut iterations = 0usize;
        while max_iterations.is_none_or(|max| iterations < max) {
            iterations += 1;
            match self.step()? {
                StepOutcome::Generated { .. } => thread::sleep(self.config.sleep),
                StepOutcome::NoPrompt => {
                    error!(root = %self.picker.config().root.display(), "no prompt");
                    thread::sleep(self.config.retry_backoff);
                }
                StepOutcome::Rejected => {
                    warn!("failed to create an image, looping to try again");
                    thread::sleep(self.config.retry_backoff);
                }
            }
        }
        Ok(())
    }
}

/// Point `latest` at `target_name`, replacing any existing entry.
///
/// The link target is relative so the output directory can be moved. A
/// dangling link left by a deleted image is replaced as well.
pub fn update_latest_link(latest: &Path, target_name: &str) -> io::Result<()> {
    if fs::symlink_metadata(latest).is_ok() {
        info!(link = %latest.display(), "removing old link");
        fs::remove_file(latest)?;
    }
    link(target_name, latest)
}

#[cfg(unix)]
fn link(target_name: &str, latest: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target_name, latest)
}

#[cfg(not(unix))]
fn link(target_name: &str, latest: &Path) -> io::Result<()> {
    let dir = latest.parent().unwrap_or_else(|| Path::new("."));
    fs::copy(dir.join(target_name), latest).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::png::read_text;
    use crate::png::tests::{black_png, gradient_png};
    use std::cell::Cell;
    use std::time::Duration;
    use tempfile::tempdir;

    enum Behavior {
        Image,
        BlackImage,
        Blank,
        Fail,
    }

    struct FakeGenerator {
        behavior: Behavior,
        calls: Cell<usize>,
    }

    impl FakeGenerator {
        fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                calls: Cell::new(0),
            }
        }
    }

    impl ImageGenerator for FakeGenerator {
        fn model_id(&self) -> &str {
            "fake/model"
        }

        fn generate(&self, _prompt: &str) -> Result<Option<Vec<u8>>, FortuneError> {
            self.calls.set(self.calls.get() + 1);
            match self.behavior {
                Behavior::Image => Ok(Some(gradient_png())),
                Behavior::BlackImage => Ok(Some(black_png())),
                Behavior::Blank => Ok(None),
                Behavior::Fail => Err(FortuneError::Generator {
                    model_id: "fake/model".to_string(),
                    reason: "out of memory".to_string(),
                }),
            }
        }
    }

    fn corpus(root: &Path) {
        let mut content = String::from("%\n");
        for _ in 0..40 {
            content.push_str("A penny saved is a penny earned.\n%\n");
        }
        fs::write(root.join("wisdom"), content).unwrap();
        fs::write(root.join("wisdom.dat"), b"").unwrap();
    }

    fn quick_config(outdir: &Path) -> CanvasConfig {
        CanvasConfig {
            outdir: outdir.to_path_buf(),
            sleep: Duration::ZERO,
            retry_backoff: Duration::ZERO,
            ..CanvasConfig::default()
        }
    }

    #[test]
    fn non_png_filename_is_rejected() {
        let out = tempdir().unwrap();
        let canvas = Canvas::new(
            FortunePicker::from_root(out.path()),
            FakeGenerator::new(Behavior::Image),
            quick_config(out.path()),
        );
        let result = canvas.make_and_save_image("hi", &out.path().join("image.jpg"));
        assert!(matches!(result, Err(FortuneError::Configuration(_))));
        assert_eq!(canvas.generator.calls.get(), 0);
    }

    #[test]
    fn saved_image_carries_prompt_and_model() {
        let out = tempdir().unwrap();
        let canvas = Canvas::new(
            FortunePicker::from_root(out.path()),
            FakeGenerator::new(Behavior::Image),
            quick_config(out.path()),
        );
        let path = out.path().join("1.png");
        assert!(canvas.make_and_save_image("Go west.", &path).unwrap());
        let meta = read_text(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(
            meta,
            vec![
                ("prompt".to_string(), "Go west.".to_string()),
                ("model_id".to_string(), "fake/model".to_string()),
            ]
        );
    }

    #[test]
    fn rejected_image_writes_nothing() {
        let out = tempdir().unwrap();
        let canvas = Canvas::new(
            FortunePicker::from_root(out.path()),
            FakeGenerator::new(Behavior::Blank),
            quick_config(out.path()),
        );
        let path = out.path().join("1.png");
        assert!(!canvas.make_and_save_image("Go west.", &path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn blank_image_is_not_saved() {
        let out = tempdir().unwrap();
        let canvas = Canvas::new(
            FortunePicker::from_root(out.path()),
            FakeGenerator::new(Behavior::BlackImage),
            quick_config(out.path()),
        );
        let path = out.path().join("1.png");
        assert!(!canvas.make_and_save_image("Go west.", &path).unwrap());
        assert!(!path.exists());
        assert_eq!(canvas.generator.calls.get(), 1);
    }

    #[test]
    fn step_rejects_blank_image() {
        let fortunes = tempdir().unwrap();
        let out = tempdir().unwrap();
        corpus(fortunes.path());
        let canvas = Canvas::new(
            FortunePicker::from_root(fortunes.path()),
            FakeGenerator::new(Behavior::BlackImage),
            quick_config(out.path()),
        );
        assert_eq!(canvas.step().unwrap(), StepOutcome::Rejected);
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn step_without_corpus_reports_no_prompt() {
        let fortunes = tempdir().unwrap();
        let out = tempdir().unwrap();
        let canvas = Canvas::new(
            FortunePicker::from_root(fortunes.path()),
            FakeGenerator::new(Behavior::Image),
            quick_config(out.path()),
        );
        assert_eq!(canvas.step().unwrap(), StepOutcome::NoPrompt);
        assert_eq!(canvas.generator.calls.get(), 0);
    }

    #[test]
    fn step_writes_image_and_latest_link() {
        let fortunes = tempdir().unwrap();
        let out = tempdir().unwrap();
        corpus(fortunes.path());
        let canvas = Canvas::new(
            FortunePicker::from_root(fortunes.path()),
            FakeGenerator::new(Behavior::Image),
            quick_config(out.path()),
        );
        let (path, prompt) = match canvas.step().unwrap() {
            StepOutcome::Generated { path, prompt } => (path, prompt),
            other => panic!("expected an image, got {other:?}"),
        };
        assert_eq!(prompt, "A penny saved is a penny earned.");
        assert!(path.exists());
        assert_eq!(path.extension().unwrap(), "png");

        let latest = out.path().join("latest.png");
        assert_eq!(fs::read(&latest).unwrap(), fs::read(&path).unwrap());
        #[cfg(unix)]
        assert_eq!(
            fs::read_link(&latest).unwrap(),
            PathBuf::from(path.file_name().unwrap())
        );
    }

    #[test]
    fn disabled_latest_link_is_not_created() {
        let fortunes = tempdir().unwrap();
        let out = tempdir().unwrap();
        corpus(fortunes.path());
        let config = CanvasConfig {
            latest: false,
            ..quick_config(out.path())
        };
        let canvas = Canvas::new(
            FortunePicker::from_root(fortunes.path()),
            FakeGenerator::new(Behavior::Image),
            config,
        );
        assert!(matches!(
            canvas.step().unwrap(),
            StepOutcome::Generated { .. }
        ));
        assert!(fs::symlink_metadata(out.path().join("latest.png")).is_err());
    }

    #[test]
    fn step_reports_rejection() {
        let fortunes = tempdir().unwrap();
        let out = tempdir().unwrap();
        corpus(fortunes.path());
        let canvas = Canvas::new(
            FortunePicker::from_root(fortunes.path()),
            FakeGenerator::new(Behavior::Blank),
            quick_config(out.path()),
        );
        assert_eq!(canvas.step().unwrap(), StepOutcome::Rejected);
        assert!(fs::symlink_metadata(out.path().join("latest.png")).is_err());
    }

    #[test]
    fn run_stops_after_requested_iterations() {
        let fortunes = tempdir().unwrap();
        let out = tempdir().unwrap();
        corpus(fortunes.path());
        let outdir = out.path().join("images");
        let canvas = Canvas::new(
            FortunePicker::from_root(fortunes.path()),
            FakeGenerator::new(Behavior::Blank),
            quick_config(&outdir),
        );
        canvas.run(Some(3)).unwrap();
        assert_eq!(canvas.generator.calls.get(), 3);
        assert!(outdir.is_dir());
    }

    #[test]
    fn run_propagates_generator_errors() {
        let fortunes = tempdir().unwrap();
        let out = tempdir().unwrap();
        corpus(fortunes.path());
        let canvas = Canvas::new(
            FortunePicker::from_root(fortunes.path()),
            FakeGenerator::new(Behavior::Fail),
            quick_config(out.path()),
        );
        assert!(matches!(
            canvas.run(Some(5)),
            Err(FortuneError::Generator { .. })
        ));
        assert_eq!(canvas.generator.calls.get(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn dangling_latest_link_is_replaced() {
        let out = tempdir().unwrap();
        let latest = out.path().join("latest.png");
        std::os::unix::fs::symlink("deleted.png", &latest).unwrap();
        fs::write(out.path().join("2.png"), b"png").unwrap();
        update_latest_link(&latest, "2.png").unwrap();
        assert_eq!(fs::read_link(&latest).unwrap(), PathBuf::from("2.png"));
        assert_eq!(fs::read(&latest).unwrap(), b"png");
    }
}
