mod commands;
mod input;
mod output;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::conversion::{ConvertRoundArgs, ConvertSafeArgs, MfnArgs};
use commands::follow_on::{AllocateArgs, OpportunityArgs};

/// SAFE conversion and follow-on pro-rata allocation
#[derive(Parser)]
#[command(
    name = "aeq",
    version,
    about = "SAFE conversion and follow-on pro-rata allocation",
    long_about = "A CLI for converting SAFEs at a priced round and allocating follow-on \
                  pro-rata capacity among existing investors, with decimal precision. \
                  Reads JSON or YAML from --input or stdin."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Increase log verbosity on stderr (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a single SAFE at a priced round
    ConvertSafe(ConvertSafeArgs),
    /// Convert every outstanding SAFE at a priced round, sweeping MFN terms
    ConvertRound(ConvertRoundArgs),
    /// Apply a most-favoured-nation adjustment to a conversion price
    ApplyMfn(MfnArgs),
    /// Derive a follow-on opportunity from historical ownership
    FollowOnOpportunity(OpportunityArgs),
    /// Allocate follow-on capacity among rights-holders
    AllocateFollowOn(AllocateArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::ConvertSafe(args) => commands::conversion::run_convert_safe(args),
        Commands::ConvertRound(args) => commands::conversion::run_convert_round(args),
        Commands::ApplyMfn(args) => commands::conversion::run_apply_mfn(args),
        Commands::FollowOnOpportunity(args) => commands::follow_on::run_opportunity(args),
        Commands::AllocateFollowOn(args) => commands::follow_on::run_allocate(args),
        Commands::Version => {
            println!("aeq {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
