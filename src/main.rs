use clap::{Parser, Subcommand};

mod cli;

use cli::init_config::InitConfigArgs;
use cli::inspect::InspectArgs;
use cli::reduce::ReduceArgs;
use cli::show::ShowArgs;

#[derive(Parser)]
#[command(
    name = "resnet-lab",
    version,
    about = "Build, profile and rank ResNet-v1 topologies"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rank the best trials of one or more tuner sessions by accuracy per FLOP
    Reduce(ReduceArgs),
    /// Print a ranked table from a saved results snapshot
    Show(ShowArgs),
    /// Build a topology and print its per-layer FLOP profile
    Inspect(InspectArgs),
    /// Write a default network config as JSON
    InitConfig(InitConfigArgs),
}

fn main() {
    if let Err(e) = resnet_lab::logging::init_tracing() {
        eprintln!("warning: {}", e);
    }
    let cli = Cli::parse();

    match cli.command {
        Command::Reduce(args) => cli::reduce::cmd_reduce(args),
        Command::Show(args) => cli::show::cmd_show(args),
        Command::Inspect(args) => cli::inspect::cmd_inspect(args),
        Command::InitConfig(args) => cli::init_config::cmd_init_config(args),
    }
}
