use anyhow::Result;
use clap::Parser;

use gridnav::commands::{self, CommonOpts, QueryCommand};

#[derive(Parser, Debug)]
#[command(name = "gridnav", version, about = "Hierarchical pathfinding and flow fields over text cost maps")]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: QueryCommand,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    commands::cmd_query(cli.common, cli.command)
}
