use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marketfit::cli::commands::{config, run, score};

#[derive(Parser)]
#[command(name = "marketfit")]
#[command(
    version,
    about = "Refine a product concept against a simulated consumer market"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, global = true, help = "Config file (skips global/project lookup)")]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the refinement loop for a seed idea
    Run {
        #[arg(help = "Seed product idea")]
        idea: String,
        #[arg(long, help = "Maximum refinement iterations")]
        max_iterations: Option<usize>,
        #[arg(long, help = "Fit score (0-100) that ends the loop")]
        threshold: Option<f64>,
        #[arg(long, short = 'n', help = "Number of personas")]
        population: Option<usize>,
        #[arg(long, help = "Concurrent persona simulations")]
        concurrency: Option<usize>,
        #[arg(long, short, help = "Where to write the final state JSON")]
        output: Option<PathBuf>,
    },

    /// Score saved persona responses without running the loop
    Score {
        #[arg(help = "JSON array of responses, or a run state file")]
        responses: PathBuf,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(short = 'g', long, help = "Show global config file only")]
        global: bool,
        #[arg(
            short = 'f',
            long,
            default_value = "toml",
            help = "Output format: toml, json, yaml"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Write a default configuration file
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mmarketfit encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Call default hook for backtrace (if RUST_BACKTRACE=1)
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Run {
            idea,
            max_iterations,
            threshold,
            population,
            concurrency,
            output,
        } => {
            let rt = Runtime::new()?;
            rt.block_on(run::run(run::RunOptions {
                seed_idea: idea,
                config_path: cli.config,
                max_iterations,
                fit_threshold: threshold,
                population_size: population,
                concurrency,
                output,
                verbose: cli.verbose,
            }))?;
        }
        Commands::Score { responses, format } => {
            let rt = Runtime::new()?;
            rt.block_on(score::run(score::ScoreOptions {
                responses,
                config_path: cli.config,
                format,
            }))?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { global, format } => config::show(global, &format)?,
            ConfigAction::Path => config::path()?,
            ConfigAction::Init { global, force } => config::init(global, force)?,
        },
    }

    Ok(())
}
