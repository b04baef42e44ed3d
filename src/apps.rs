use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, error::ErrorKind};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::canvas::Canvas;
use crate::config::{CanvasConfig, PickerConfig};
use crate::constants::canvas::{DEFAULT_MODEL_ID, DEFAULT_SLEEP_SECS};
use crate::constants::picker::{DEFAULT_FORTUNES_DIR, DEFAULT_MAX_LENGTH};
use crate::generator::CommandGenerator;
use crate::picker::FortunePicker;

#[derive(Debug, Parser)]
#[command(
    name = "fortune_pick",
    disable_help_subcommand = true,
    about = "Print randomly picked fortunes",
    long_about = "Pick fortunes from a directory of fortune databases, weighting every byte of the corpus equally.",
    after_help = "A file is a fortune database when a sibling '<name>.dat' index file exists."
)]
struct PickCli {
    #[arg(
        long = "fortunes-dir",
        short = 'i',
        value_name = "DIR",
        env = "FORTUNES_DIR",
        default_value = DEFAULT_FORTUNES_DIR,
        help = "Location of the fortune database files"
    )]
    fortunes_dir: PathBuf,
    #[arg(
        long = "max-length",
        default_value_t = DEFAULT_MAX_LENGTH,
        value_parser = parse_positive_usize,
        help = "Maximum fortune length in bytes"
    )]
    max_length: usize,
    #[arg(
        long,
        default_value_t = 1,
        value_parser = parse_positive_usize,
        help = "Number of fortunes to print"
    )]
    count: usize,
    #[arg(long, help = "Optional deterministic seed for offset draws")]
    seed: Option<u64>,
}

#[derive(Debug, Parser)]
#[command(
    name = "fortune_canvas",
    disable_help_subcommand = true,
    about = "Render picked fortunes into images",
    long_about = "Repeatedly pick a fortune, hand it to an external image generator, and save the PNG with the prompt and model id embedded as text metadata.",
    after_help = "The generator program receives the prompt on stdin and must write PNG bytes to stdout; empty output means the image was rejected."
)]
struct CanvasCli {
    #[arg(
        long = "fortunes-dir",
        short = 'i',
        value_name = "DIR",
        env = "FORTUNES_DIR",
        default_value = DEFAULT_FORTUNES_DIR,
        help = "Location of the fortune database files"
    )]
    fortunes_dir: PathBuf,
    #[arg(
        long,
        short = 'o',
        value_name = "DIR",
        env = "FORTUNES_OUTDIR",
        default_value = ".",
        help = "Where to write the output image files"
    )]
    outdir: PathBuf,
    #[arg(
        long,
        short = 's',
        value_name = "SECS",
        default_value_t = DEFAULT_SLEEP_SECS,
        help = "How long to sleep between generations"
    )]
    sleep: u64,
    #[arg(long = "no-latest", help = "Do not maintain a 'latest.png' link")]
    no_latest: bool,
    #[arg(
        long = "max-length",
        default_value_t = DEFAULT_MAX_LENGTH,
        value_parser = parse_positive_usize,
        help = "Maximum prompt length in bytes"
    )]
    max_length: usize,
    #[arg(
        long = "model-id",
        default_value = DEFAULT_MODEL_ID,
        help = "Model identifier recorded in image metadata"
    )]
    model_id: String,
    #[arg(
        long,
        value_name = "PROGRAM",
        help = "Program that turns a prompt on stdin into PNG bytes on stdout"
    )]
    generator: PathBuf,
    #[arg(
        long = "generator-arg",
        value_name = "ARG",
        allow_hyphen_values = true,
        help = "Argument passed to the generator, repeat as needed"
    )]
    generator_args: Vec<String>,
    #[arg(
        long,
        value_parser = parse_positive_usize,
        help = "Stop after this many iterations instead of running forever"
    )]
    iterations: Option<usize>,
}

/// Entry point for `fortune_pick`.
pub fn run_pick<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    init_tracing();
    run_pick_to(args_iter, &mut std::io::stdout().lock())
}

fn run_pick_to<I, W>(args_iter: I, out: &mut W) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
    W: Write,
{
    let Some(cli) =
        parse_cli::<PickCli, _>(std::iter::once("fortune_pick".to_string()).chain(args_iter))?
    else {
        return Ok(());
    };

    let picker = FortunePicker::new(PickerConfig::new(cli.fortunes_dir));
    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    for idx in 0..cli.count {
        let Some(text) = picker.pick_with_rng(&mut rng, cli.max_length)? else {
            return Err(format!(
                "no fortune found under {} within {} attempts",
                picker.config().root.display(),
                picker.config().max_attempts
            )
            .into());
        };
        if idx > 0 {
            writeln!(out, "%")?;
        }
        writeln!(out, "{text}")?;
    }
    Ok(())
}

/// Entry point for `fortune_canvas`.
pub fn run_canvas<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    init_tracing();

    let Some(cli) =
        parse_cli::<CanvasCli, _>(std::iter::once("fortune_canvas".to_string()).chain(args_iter))?
    else {
        return Ok(());
    };

    let picker = FortunePicker::new(PickerConfig::new(cli.fortunes_dir));
    let generator = CommandGenerator::new(cli.generator, cli.model_id).with_args(cli.generator_args);
    let config = CanvasConfig {
        outdir: cli.outdir,
        sleep: Duration::from_secs(cli.sleep),
        latest: !cli.no_latest,
        max_length: cli.max_length,
        ..CanvasConfig::default()
    };
    Canvas::new(picker, generator, config).run(cli.iterations)?;
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn parse_positive_usize(raw: &str) -> Result<usize, String> {
    let parsed = raw
        .parse::<usize>()
        .map_err(|_| format!("Could not parse '{}' as a positive integer", raw))?;
    if parsed == 0 {
        return Err("value must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}
