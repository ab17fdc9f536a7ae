//! `promquery-poll` entry point.

use clap::Parser;

use promquery::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = promquery::cli::execute(cli).await {
        promquery::cli::handle_error(err);
    }
}
