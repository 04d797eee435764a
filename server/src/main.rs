use anyhow::Context;
use clap::Parser;
use env_logger::Env;

use app_lib::config::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose > 0 { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(filter)).init();

    match cli.command {
        Command::Serve(args) => app_lib::api::serve(args)
            .await
            .context("chat completion server failed")?,
        Command::Chat(args) => app_lib::console::run(args)
            .await
            .context("voice chat failed")?,
    }
    Ok(())
}
