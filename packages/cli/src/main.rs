mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{check, eval, fill, CheckArgs, EvalArgs, FillArgs};

/// metaform - template-driven metadata forms
#[derive(Parser, Debug)]
#[command(name = "metaform")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a configuration and report template problems
    Check(CheckArgs),

    /// Fill a template headlessly and print the resulting metadata
    Fill(FillArgs),

    /// Evaluate a single computed-value expression
    Eval(EvalArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match std::env::current_dir() {
        Ok(cwd) => match cli.command {
            Command::Check(args) => check(args, &cwd),
            Command::Fill(args) => fill(args, &cwd).await,
            Command::Eval(args) => eval(args),
        },
        Err(err) => Err(err.into()),
    };

    if let Err(err) = result {
        eprintln!();
        eprintln!("{} {}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
