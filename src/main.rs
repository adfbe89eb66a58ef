use clap::Parser;
use adapter_serving::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Simulate(args) => cli::simulate::run(args).await,
        Command::Select(args) => cli::select::run(args).await,
    }
}
