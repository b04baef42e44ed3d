use std::ffi::OsString;
use std::io::{self, ErrorKind, Write};
use std::process::{ChildStdin, Command, Stdio};
use std::thread;

use tracing::debug;

use crate::errors::FortuneError;
use crate::types::ModelId;

/// Turns a text prompt into encoded PNG bytes.
pub trait ImageGenerator {
    /// Model identifier recorded in image metadata.
    fn model_id(&self) -> &str;

    /// Generate one image for `prompt`.
    ///
    /// `Ok(None)` means the model ran but produced nothing usable, for example
    /// an image blanked out by a safety checker. Callers may retry.
    fn generate(&self, prompt: &str) -> Result<Option<Vec<u8>>, FortuneError>;
}

impl<G: ImageGenerator + ?Sized> ImageGenerator for Box<G> {
    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    fn generate(&self, prompt: &str) -> Result<Option<Vec<u8>>, FortuneError> {
        (**self).generate(prompt)
    }
}

/// Delegates synthesis to an external program.
///
/// The prompt is written to the program's stdin and PNG bytes are read from
/// its stdout. Empty output means the image was rejected; a non-zero exit
/// status is an error.
#[derive(Clone, Debug)]
pub struct CommandGenerator {
    program: OsString,
    args: Vec<OsString>,
    model_id: ModelId,
}

impl CommandGenerator {
    /// Generator running `program` and recording `model_id` in metadata.
    pub fn new(program: impl Into<OsString>, model_id: impl Into<ModelId>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            model_id: model_id.into(),
        }
    }

    /// Append arguments passed to the program on every run.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    fn failure(&self, reason: String) -> FortuneError {
        FortuneError::Generator {
            model_id: self.model_id.clone(),
            reason,
        }
    }
}

impl ImageGenerator for CommandGenerator {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn generate(&self, prompt: &str) -> Result<Option<Vec<u8>>, FortuneError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|err| {
                self.failure(format!(
                    "could not start {}: {err}",
                    self.program.to_string_lossy()
                ))
            })?;
        let stdin = child.stdin.take();
        // Feed stdin while stdout drains so neither pipe fills up and stalls.
        let output = thread::scope(|scope| {
            let writer = scope.spawn(move || feed_prompt(stdin, prompt));
            let output = child.wait_with_output();
            let fed = writer
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("prompt writer panicked")));
            fed.and(output)
        })?;
        if !output.status.success() {
            return Err(self.failure(format!("exited with {}", output.status)));
        }
        debug!(
            model_id = %self.model_id,
            bytes = output.stdout.len(),
            "generator finished"
        );
        if output.stdout.is_empty() {
            return Ok(None);
        }
        Ok(Some(output.stdout))
    }
}

fn feed_prompt(stdin: Option<ChildStdin>, prompt: &str) -> io::Result<()> {
    let Some(mut stdin) = stdin else {
        return Ok(());
    };
    match stdin.write_all(prompt.as_bytes()) {
        Ok(()) => Ok(()),
        // The program may ignore its input and exit early.
        Err(err) if err.kind() == ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err),
    }
}
