//! tarn_image_gen: build an initialized data image from a JSON description.
//!
//! Usage: tarn_image_gen <description.json> -o <out> [--text] [--config <config.json>]
//!
//! The description declares types, methods and values (see `schema`). Each
//! root value is materialized together with everything it references, the
//! bootstrap method gets a `bx lr` body so the entry alias has a target, and
//! the result is written as a 32-bit ARM ELF object or as module text.

mod schema;

#[cfg(test)]
mod tests;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::time::FormatTime;

use tarn_image::env::Environment;
use tarn_image::{ImageConfig, ImageError, ModuleManager};
use tarn_target_arm::backend::ArmBackend;
use tarn_target_arm::encode::return_stub;

use crate::schema::{Description, DescriptionError};

#[derive(Parser)]
#[command(
    name = "tarn_image_gen",
    version,
    about = "Build an initialized data image from a JSON description",
    long_about = None
)]
struct Cli {
    /// Image description to build
    #[arg(value_name = "DESCRIPTION")]
    description: PathBuf,

    /// Output file
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Write the module as text instead of an object file
    #[arg(long)]
    text: bool,

    /// Image configuration (JSON)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Skip verification and emission; only resolve the image
    #[arg(long)]
    no_validate: bool,
}

#[derive(Debug, Error)]
enum ToolError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Description(#[from] DescriptionError),
    #[error(transparent)]
    Image(#[from] ImageError),
}

/// Timer that prints nothing.
struct NoTimestamp;

impl FormatTime for NoTimestamp {
    fn format_time(&self, _w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        Ok(())
    }
}

fn init_tracing() {
    if let Ok(filter) = EnvFilter::try_from_env("TARN_LOG") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_timer(NoTimestamp)
            .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn read(path: &Path) -> Result<String, ToolError> {
    fs::read_to_string(path).map_err(|source| ToolError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn run(cli: &Cli) -> Result<(), ToolError> {
    let config = match &cli.config {
        Some(path) => ImageConfig::from_json(&read(path)?)?,
        None => ImageConfig::default(),
    };
    let description = Description::from_json(&read(&cli.description)?)?;
    let image = description.build(config.native_int_size / 8)?;

    let mut manager = ModuleManager::new(&image.types, config, ArmBackend)?;
    if cli.no_validate {
        manager.set_validation_disabled();
    }
    for &root in &image.roots {
        manager.materialize_root(root)?;
    }
    if let Some(boot) = image.types.find_method(&manager.config().bootstrap_method) {
        let stub = return_stub(&manager.function_symbol(boot));
        manager.add_compiled_function(stub);
    }
    manager.compile()?;
    manager.dump_to_file(&cli.output, cli.text)?;

    info!(
        output = %cli.output.display(),
        globals = manager.module().global_count(),
        "image written"
    );
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
