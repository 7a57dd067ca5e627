// SPDX-License-Identifier: Apache-2.0
mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "safe-cli", about = "Safe transfer developer CLI")]
struct Cli {
    /// Debug-level logging (RUST_LOG overrides).
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select, build, sign and submit a transfer.
    Transfer(commands::transfer::TransferArgs),
    /// Print the members hash outputs are indexed by.
    MembersHash(commands::inspect::MembersHashArgs),
    /// Decode a raw transaction and print its recipient view as JSON.
    Decode(commands::inspect::DecodeArgs),
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let result = match cli.command {
        Commands::Transfer(args) => commands::transfer::run(args),
        Commands::MembersHash(args) => commands::inspect::members_hash(args),
        Commands::Decode(args) => commands::inspect::decode(args),
    };
    if let Err(err) = result {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}
