use anyhow::Result;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tagwright::agent::Agent;
use tagwright::config::Config;
use tagwright::gateway;
use tagwright::tools::Toolbox;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "tagwright",
    version,
    about = "LLM-driven web analytics automation agent"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the HTTP gateway (default when no subcommand is given)
    Serve {
        /// Gateway port
        #[arg(long, value_name = "PORT")]
        port: Option<u16>,
        /// Bind address
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },
    /// Run a single task from the command line and print the answer
    Invoke {
        /// The task prompt
        prompt: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tagwright=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config)?;

    let http = reqwest::Client::new();
    let config = Arc::new(config);
    let toolbox = Arc::new(Toolbox::new(http.clone(), config.clone()));
    let agent = Arc::new(Agent::new(http, config.clone(), toolbox));

    match cli.command {
        Some(Commands::Invoke { prompt }) => {
            let answer = agent.run(&prompt).await?;
            println!("{answer}");
        }
        Some(Commands::Serve { port, bind }) => {
            let addr: SocketAddr = format!(
                "{}:{}",
                bind.unwrap_or_else(|| config.bind.clone()),
                port.unwrap_or(config.port),
            )
            .parse()?;
            gateway::serve(agent, addr).await;
        }
        None => {
            let addr: SocketAddr = format!("{}:{}", config.bind, config.port).parse()?;
            gateway::serve(agent, addr).await;
        }
    }

    Ok(())
}
