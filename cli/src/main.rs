use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use lib_reactions::{ReactionType, TransportClient};

mod config;
mod logger;
mod watch;

#[derive(Parser)]
#[command(name = "reactions", about = "Live presentation reaction client", version)]
struct Cli {
    #[command(flatten)]
    config: config::Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new presentation and print its id
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Fetch and print the current snapshot for a presentation
    Get { id: String },
    /// Submit a single reaction over the REST fallback path
    React { id: String, reaction: String },
    /// Watch a presentation live: counters update in place, reactions are
    /// sent over the channel from stdin
    Watch { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = config::load_config(cli.config);
    logger::setup_logging(&settings.log_dir, &settings.log_level)?;

    match cli.command {
        Command::Create { title, description } => {
            let api = api_client(&settings)?;
            let created = api
                .create_presentation(&title, description.as_deref())
                .await?;
            println!("created presentation: {}", created.id);
        }
        Command::Get { id } => {
            let api = api_client(&settings)?;
            let snapshot = api.get_presentation(&id).await?;
            watch::render(Some(&snapshot));
        }
        Command::React { id, reaction } => {
            let reaction: ReactionType = reaction.parse().map_err(anyhow::Error::msg)?;
            let api = api_client(&settings)?;
            api.submit_reaction(&id, reaction).await?;
            println!("reaction '{}' sent to {}", reaction, id);
        }
        Command::Watch { id } => {
            watch::run(&settings, &id).await?;
        }
    }

    Ok(())
}

fn api_client(settings: &config::Settings) -> Result<TransportClient> {
    Ok(TransportClient::with_timeout(
        &settings.api_url,
        Duration::from_secs(settings.request_timeout_secs),
    )?)
}
