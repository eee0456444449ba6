pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "portgate",
    about = "Portgate operator CLI",
    long_about = "Inspect configuration and run the deterministic classification, scoring and slot ranking pipeline offline.",
    after_help = "Examples:\n  portgate config\n  portgate classify \"slots at terminal A tomorrow\"\n  portgate score stats.json\n  portgate recommend request.json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Classify a message and resolve its entities without calling any service")]
    Classify {
        #[arg(help = "Message to classify")]
        message: String,
    },
    #[command(about = "Score carrier statistics read from a JSON file")]
    Score {
        #[arg(help = "Path to a carrier statistics JSON document")]
        stats: PathBuf,
    },
    #[command(about = "Rank slot candidates read from a JSON recommendation request")]
    Recommend {
        #[arg(help = "Path to a recommendation request JSON document")]
        request: PathBuf,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Classify { message } => commands::classify::run(&message),
        Command::Score { stats } => commands::score::run(&stats),
        Command::Recommend { request } => commands::recommend::run(&request),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
