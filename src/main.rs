//! toshokan CLI entry point

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use toshokan::cli::{self, Command};
use toshokan::commands;
use toshokan::config::Config;
use toshokan::services::prompt::TermPrompt;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "toshokan=warn".into()),
        )
        .init();

    let command = match cli::parse() {
        Ok(command) => command,
        Err(message) => {
            eprintln!("error: {}\n", message);
            eprintln!("{}", cli::usage());
            std::process::exit(2);
        }
    };

    if let Err(e) = run(command).await {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(command: Command) -> Result<()> {
    let config = Config::from_env()?;
    match command {
        Command::Organize(args) => {
            let mut prompt = TermPrompt;
            commands::organize::run(&config, args, &mut prompt).await
        }
        Command::Search(args) => commands::search::run(&config, &args).await,
        Command::Top { limit } => commands::search::run_top(&config, limit).await,
        Command::Info { id } => commands::search::run_info(&config, id).await,
        Command::Genres => {
            commands::search::run_genres();
            Ok(())
        }
        Command::Help => {
            println!("{}", cli::usage());
            Ok(())
        }
    }
}
