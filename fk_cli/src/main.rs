//! Firkin CLI - a source-build formula interpreter.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

use fk_core::{Compiler, TargetPlatform};

mod commands;
mod display;

#[derive(Parser)]
#[command(name = "fk")]
#[command(about = "Firkin - build and install library formulas from source")]
#[command(version)]
struct Cli {
    /// Root directory for installed kegs, the source cache, and build trees
    #[arg(long, default_value = "/opt/firkin")]
    prefix: PathBuf,

    /// Directory containing formula files
    #[arg(long, default_value = "./Formula")]
    formula_dir: PathBuf,

    /// Number of parallel compile jobs within a single build step
    #[arg(long)]
    jobs: Option<usize>,

    /// Kill any single build step running longer than this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Compiler family the target platform builds with
    #[arg(long, value_enum)]
    compiler: Option<CompilerArg>,

    /// Compiler build number (clang) or major version (gcc)
    #[arg(long)]
    compiler_build: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum CompilerArg {
    Clang,
    Gcc,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and install a formula with its dependencies
    Install {
        /// Formula name, or path to a .rb formula file
        formula: String,

        /// Skip the post-install test probe
        #[arg(long)]
        no_test: bool,

        /// Override the C compiler for the root formula's build
        #[arg(long)]
        cc: Option<String>,

        /// Override the C++ compiler for the root formula's build
        #[arg(long)]
        cxx: Option<String>,
    },

    /// Show the resolved build order for a formula
    Deps {
        /// Formula name
        formula: String,

        /// Show dependencies as a tree
        #[arg(long)]
        tree: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show info about a formula
    Info {
        /// Formula name
        formula: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse and validate formulas without building anything
    Check {
        /// Formula name or path to a .rb file; checks the whole formula
        /// directory when omitted
        formula: Option<String>,
    },
}

fn detect_target(compiler: Option<CompilerArg>, build: Option<u32>) -> TargetPlatform {
    let mut target = TargetPlatform::host();
    if let Some(arg) = compiler {
        target.compiler = match arg {
            CompilerArg::Clang => Compiler::Clang,
            CompilerArg::Gcc => Compiler::Gcc,
        };
        target.compiler_build = target.compiler.default_build();
    }
    if let Some(build) = build {
        target.compiler_build = build;
    }
    target
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let target = detect_target(cli.compiler, cli.compiler_build);
    let jobs = cli.jobs.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    });
    let step_timeout = cli.timeout.map(Duration::from_secs);

    let result = match cli.command {
        Commands::Install {
            formula,
            no_test,
            cc,
            cxx,
        } => {
            commands::install::run_install(commands::install::InstallRequest {
                prefix: cli.prefix,
                formula_dir: cli.formula_dir,
                formula,
                target,
                jobs,
                step_timeout,
                run_tests: !no_test,
                cc,
                cxx,
            })
            .await
        }
        Commands::Deps {
            formula,
            tree,
            json,
        } => commands::query::run_deps(&cli.formula_dir, &formula, &target, tree, json),
        Commands::Info { formula, json } => {
            commands::query::run_info(&cli.formula_dir, &formula, json)
        }
        Commands::Check { formula } => {
            commands::query::run_check(&cli.formula_dir, &target, formula.as_deref())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            display::print_error(&e);
            ExitCode::FAILURE
        }
    }
}
