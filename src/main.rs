use clap::{Parser, Subcommand};
use image_chain::config::{self, ChainConfig};
use image_chain::engine::RustEngine;
use image_chain::manipulation::ManipulationSequence;
use image_chain::output;
use image_chain::pipeline::{Conversion, PipelineEvent};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "image-chain")]
#[command(about = "Apply chains of image manipulations through an image engine")]
#[command(long_about = "\
Apply chains of image manipulations through an image engine

A manipulation sequence is a JSON array of groups. Each group is one engine
call; every group works on the output of the previous one:

  [
    {\"width\": 100, \"height\": 100, \"crop\": \"crop\"},
    {\"blur\": 5},
    {\"watermark\": \"/assets/logo.png\", \"watermarkPosition\": \"bottom-right\"}
  ]

Intermediate files live in a temporary workspace (the system temp directory
unless --temp-dir or the config says otherwise) and are removed once the
result is saved.

Run 'image-chain manipulations' for the accepted names and
'image-chain gen-config' to generate a documented image-chain.toml.

Set RUST_LOG=debug to trace every engine call.")]
#[command(version)]
struct Cli {
    /// Config file (default: ./image-chain.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply a manipulation sequence to an image and save the result
    Apply {
        /// Source image
        input: PathBuf,
        /// Where to write the final image
        destination: PathBuf,
        /// JSON file with the manipulation sequence
        #[arg(long)]
        sequence: PathBuf,
        /// Workspace for intermediate files (overrides config)
        #[arg(long)]
        temp_dir: Option<PathBuf>,
    },
    /// List accepted manipulation names and their engine keys
    Manipulations,
    /// Print a stock image-chain.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging()?;

    match cli.command {
        Command::Apply {
            input,
            destination,
            sequence,
            temp_dir,
        } => {
            let config = resolve_config(cli.config.as_deref())?;
            let sequence = ManipulationSequence::load(&sequence)?;
            apply(&config, &input, &destination, &sequence, temp_dir)?;
        }
        Command::Manipulations => {
            output::print_manipulation_table();
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Run one conversion, printing progress from a separate thread.
fn apply(
    config: &ChainConfig,
    input: &Path,
    destination: &Path,
    sequence: &ManipulationSequence,
    temp_dir: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    output::print_conversion_header(input, sequence.len());

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_pipeline_event(&event) {
                println!("{}", line);
            }
        }
    });

    let result = run_conversion(config, input, destination, sequence, temp_dir, tx);
    printer.join().map_err(|_| "progress printer panicked")?;
    result
}

/// Dropping the conversion closes `events`, which ends the printer thread.
fn run_conversion(
    config: &ChainConfig,
    input: &Path,
    destination: &Path,
    sequence: &ManipulationSequence,
    temp_dir: Option<PathBuf>,
    events: Sender<PipelineEvent>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut conversion =
        Conversion::new(RustEngine::new(), &config.engine.driver, input).with_events(events);
    if let Some(dir) = temp_dir.or_else(|| config.workspace.temp_dir.clone()) {
        conversion.configure_workspace(dir)?;
    }
    conversion.apply(sequence)?;
    conversion.save(destination)?;
    Ok(())
}

/// Explicit `--config` file, else `image-chain.toml` in the working directory.
fn resolve_config(explicit: Option<&Path>) -> Result<ChainConfig, config::ConfigError> {
    match explicit {
        Some(file) => config::load_config_file(file),
        None => config::load_config(Path::new(".")),
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init()?;
    Ok(())
}
