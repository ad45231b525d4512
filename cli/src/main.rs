use clap::Parser;
use spacehost_cli::Cli;
use spacehost_cli::run_main;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_main(cli).await
}
