use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use elsa_driver::{ElsaError, GenerateRequest, generate, inspect, render_summary};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "elsa")]
#[command(version, about = "Compile-time dependency wiring for Go", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate wiring files for every opted-in unit under a directory
    #[command(visible_alias = "gen")]
    Generate {
        /// Directory to search
        #[arg(value_name = "DIR", default_value = ".")]
        dir: PathBuf,
        /// Process units on this many threads; failures no longer stop the run
        #[arg(short, long)]
        jobs: Option<usize>,
        /// Name of the generated file in each package directory
        #[arg(long, value_name = "NAME")]
        output_file: Option<String>,
        /// Print generated files instead of writing them
        #[arg(long)]
        dry_run: bool,
        /// Keep processing after a unit fails and report every failure
        #[arg(long)]
        keep_going: bool,
    },
    /// List wiring functions and provider sets without generating anything
    Inspect {
        #[arg(value_name = "DIR", default_value = ".")]
        dir: PathBuf,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    // ELSA_LOG takes EnvFilter directives; events go to stderr without timestamps.
    let filter = EnvFilter::try_from_env("ELSA_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .compact()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Generate {
            dir,
            jobs,
            output_file,
            dry_run,
            keep_going,
        } => run_generate(GenerateRequest {
            dir,
            jobs,
            output_file,
            dry_run,
            keep_going,
        }),
        Commands::Inspect { dir, json } => run_inspect(&dir, json),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run_generate(request: GenerateRequest) -> Result<(), ElsaError> {
    let report = generate(&request)?;
    if request.dry_run {
        for file in &report.generated {
            println!("// {}", file.target_path.display());
            print!("{}", file.render());
        }
    }
    tracing::info!(
        generated = report.generated.len(),
        written = report.written.len(),
        unchanged = report.unchanged.len(),
        skipped = report.skipped.len(),
        "done"
    );
    Ok(())
}

fn run_inspect(dir: &std::path::Path, json: bool) -> Result<(), ElsaError> {
    let summaries = inspect(dir)?;
    if json {
        let text = serde_json::to_string_pretty(&summaries).map_err(std::io::Error::from)?;
        println!("{text}");
    } else {
        for summary in &summaries {
            print!("{}", render_summary(summary));
        }
    }
    Ok(())
}
