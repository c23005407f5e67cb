//! `tryon` command-line client.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tryon_client::{
    ApiClient, ClientConfig, HttpBlobStore, HttpSynthesisService, TryOnSession,
};
use tryon_shared::identity;

#[derive(Parser, Debug)]
#[command(name = "tryon", version, about = "Virtual try-on client")]
struct Cli {
    #[command(flatten)]
    config: ClientConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print this client's user id, creating it on first use.
    Whoami,
    /// List stored body photos and the garment.
    List,
    /// Upload a body photo into the next free slot.
    AddBody {
        #[arg(long)]
        file: PathBuf,
    },
    /// Delete a body photo; later photos move down.
    DeleteBody {
        #[arg(long)]
        index: u8,
    },
    /// Upload (or replace) the garment photo.
    SetGarment {
        #[arg(long)]
        file: PathBuf,
    },
    RemoveGarment,
    /// Dress a body photo in the current garment.
    Generate {
        /// Body photo to use. Defaults to the first one.
        #[arg(long)]
        body_index: Option<u8>,

        #[arg(long)]
        description: Option<String>,
    },
}

async fn read_image(path: &PathBuf) -> anyhow::Result<Bytes> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(Bytes::from(data))
}

fn print_set(session: &TryOnSession) {
    let set = session.photo_set();
    let selected = session.selected().map(|s| s.index);
    for slot in &set.body {
        let marker = if Some(slot.index) == selected { "*" } else { " " };
        println!("{marker} body {}  {}", slot.index, slot.blob_name);
    }
    match &set.garment {
        Some(garment) => println!("  garment {}", garment.blob_name),
        None => println!("  garment -"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tryon_client=info,tryon_store=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let identity_path = config
        .identity_path()
        .ok_or_else(|| anyhow!("cannot determine a data directory, pass --identity-file"))?;
    let user = identity::provision(&identity_path)?;
    info!(user = %user, path = %identity_path.display(), "Using identity");

    if let Command::Whoami = cli.command {
        println!("{user}");
        return Ok(());
    }

    let api = ApiClient::new(&config.server_url)?;
    let store = Arc::new(HttpBlobStore::new(api.clone(), config.list_timeout()));
    let synthesis = Arc::new(HttpSynthesisService::new(api));
    let mut session = TryOnSession::open(user, store, synthesis, config.generate_timeout()).await?;

    match cli.command {
        Command::Whoami => {}
        Command::List => print_set(&session),
        Command::AddBody { file } => {
            let slot = session.add_body_photo(read_image(&file).await?).await?;
            println!("stored {}", slot.blob_name);
        }
        Command::DeleteBody { index } => {
            session.delete_body_photo(index).await?;
            print_set(&session);
        }
        Command::SetGarment { file } => {
            let slot = session.set_garment(read_image(&file).await?).await?;
            println!("stored {}", slot.blob_name);
        }
        Command::RemoveGarment => {
            session.remove_garment().await?;
            println!("garment removed");
        }
        Command::Generate {
            body_index,
            description,
        } => {
            if let Some(index) = body_index {
                session.select(index)?;
            }
            let result = session.generate(description).await?;
            println!(
                "{}{}",
                config.server_url.trim_end_matches('/'),
                result.display_url
            );
        }
    }

    Ok(())
}
