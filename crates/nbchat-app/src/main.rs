use std::io;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::Colorize;

use nbchat::web::{WebServer, WebServerConfig};
use nbchat::{ask_once, run_repl_mode, setup_from_cli, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if let Some(shell) = cli.generate {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "nbchat", &mut io::stdout());
        return Ok(());
    }

    let mut app = setup_from_cli(&cli)?;

    match cli.command.as_ref().unwrap_or(&Commands::Chat) {
        Commands::Chat => {
            let (handle, events) = app.start_bridge().await;
            run_repl_mode(handle, events).await
        }
        Commands::Serve { bind } => {
            let bind_addr: SocketAddr = bind
                .parse()
                .with_context(|| format!("Invalid bind address '{}'", bind))?;
            let (handle, events) = app.start_bridge().await;
            WebServer::new(WebServerConfig { bind_addr }, handle, events)
                .start()
                .await
        }
        Commands::Ask { question } => {
            let (handle, mut events) = app.start_bridge().await;
            let answer = ask_once(&handle, &mut events, &question.join(" ")).await?;
            println!("{}", answer);
            Ok(())
        }
        command => {
            match command.execute(&mut app).await {
                Ok(output) => println!("{}", output),
                Err(e) => {
                    eprintln!("{} {:#}", "Error:".bright_red().bold(), e);
                    std::process::exit(1);
                }
            }
            Ok(())
        }
    }
}
