use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use stagelink::config::{PipelineDocument, DEFAULT_DOCUMENT};
use stagelink::error::LinkResult;
use stagelink::logger::{self, LogLevel};
use stagelink::pipeline::{stages, Pipeline};

#[derive(Debug, Parser)]
#[command(name = "stagelink")]
#[command(about = "Assemble and run a pipeline of capability-linked stages")]
struct Cli {
    /// Log level used when RUST_LOG is not set.
    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Assemble and execute a pipeline (default).
    Run {
        /// Pipeline document to load.
        #[arg(short, long, default_value = DEFAULT_DOCUMENT)]
        file: PathBuf,
    },
    /// Assemble a pipeline and print its chain without running it.
    Check {
        /// Pipeline document to load.
        #[arg(short, long, default_value = DEFAULT_DOCUMENT)]
        file: PathBuf,
    },
    /// List the built-in stages and their capabilities.
    Stages,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init(cli.log_level);

    let command = cli.command.unwrap_or(Command::Run {
        file: PathBuf::from(DEFAULT_DOCUMENT),
    });

    let result = match command {
        Command::Run { file } => run(&file),
        Command::Check { file } => check(&file),
        Command::Stages => list_stages(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn assemble(file: &Path) -> LinkResult<Pipeline> {
    tracing::info!("Loading pipeline from {}", file.display());
    let registry = stages::builtin_registry()?;
    let document = PipelineDocument::from_path(file)?;
    Pipeline::assemble(&document, &registry)
}

fn run(file: &Path) -> LinkResult<()> {
    let summary = assemble(file)?.execute()?;
    tracing::info!(
        "Run {} finished {} stages in {:.3}s",
        summary.run_id,
        summary.executed_stages(),
        summary.total_duration.as_secs_f64()
    );
    Ok(())
}

fn check(file: &Path) -> LinkResult<()> {
    let pipeline = assemble(file)?;
    println!("{}", pipeline.describe());
    Ok(())
}

fn list_stages() -> LinkResult<()> {
    let registry = stages::builtin_registry()?;
    for descriptor in registry.stages() {
        let join = |caps: &[stagelink::pipeline::Capability]| {
            caps.iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        println!(
            "{}\n  accepts: {}\n  emits:   {}",
            descriptor.identifier(),
            join(descriptor.accepted()),
            join(descriptor.emitted())
        );
    }
    Ok(())
}
