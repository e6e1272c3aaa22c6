use std::error::Error;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use dm_live_chat::backend::{IdentityProvider, LocalIdentity, LocalStore, UserDirectory};
use dm_live_chat::common::Identity;
use dm_live_chat::config::{self, AppConfig};
use dm_live_chat::session::{Backend, ChatClient};
use dm_live_chat::storage::ensure_parent_dir;
use dm_live_chat::ui::ChatApp;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(
    name = "dm_live_chat",
    version,
    about = "Real-time direct messaging client"
)]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    /// Sign in as this user id (overrides the config identity)
    #[arg(long, requires = "email")]
    user_id: Option<String>,
    #[arg(long, requires = "user_id")]
    email: Option<String>,
    /// Treat the signed-in email as verified
    #[arg(long)]
    verified: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Add or update a directory profile, then exit
    Register {
        #[arg(long)]
        id: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        display_name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let app_config = config::load_config(&cli.config);
    app_config.validate()?;

    ensure_parent_dir(&app_config.database_path)?;
    let store = Arc::new(LocalStore::open(&app_config.database_path)?);
    seed_directory(&store, &app_config).await;

    if let Some(Command::Register {
        id,
        email,
        display_name,
    }) = cli.command
    {
        let profile = store.register_profile(&id, &email, display_name).await?;
        println!(
            "Registered {} <{}> as {}",
            profile.id,
            profile.email,
            profile.display_name.unwrap_or_default()
        );
        return Ok(());
    }

    let identity = match (cli.user_id, cli.email) {
        (Some(id), Some(email)) => Some(Identity {
            id,
            email,
            verified: cli.verified,
            display_name: None,
        }),
        _ => app_config.identity.clone(),
    };
    let identity = Arc::new(LocalIdentity::new(identity));

    // The signed-in user needs a directory entry so peers can find them.
    if let Some(current) = identity.current_identity() {
        if let Err(err) = store
            .register_profile(&current.id, &current.email, current.display_name.clone())
            .await
        {
            log::warn!("Could not register profile for {}: {err}", current.email);
        }
    }

    let _poller = store
        .clone()
        .spawn_change_poller(app_config.poll_interval());

    run_full_client(store, identity, app_config.channel_capacity).await?;
    Ok(())
}

async fn seed_directory(store: &LocalStore, app_config: &AppConfig) {
    for seed in &app_config.seed_users {
        if let Err(err) = store
            .register_profile(&seed.id, &seed.email, seed.display_name.clone())
            .await
        {
            log::warn!("Skipping seed user {}: {err}", seed.id);
        }
    }
}

async fn run_full_client(
    store: Arc<LocalStore>,
    identity: Arc<LocalIdentity>,
    channel_capacity: usize,
) -> Result<(), eframe::Error> {
    // UI -> client
    let (cmd_tx, cmd_rx) = mpsc::channel(channel_capacity);
    // client -> UI
    let (event_tx, event_rx) = mpsc::channel(channel_capacity);

    tokio::spawn(async move {
        let client = ChatClient::new(event_tx, cmd_rx, Backend::local(store, identity));
        if let Err(err) = client.run().await {
            log::error!("Chat client terminated: {err}");
        }
    });

    let options = eframe::NativeOptions::default();
    let mut event_rx = Some(event_rx);

    eframe::run_native(
        "DM Live Chat",
        options,
        Box::new(move |cc| {
            let event_receiver = event_rx
                .take()
                .expect("ChatApp should only be initialized once");

            log::info!("UI started");

            Ok(Box::new(ChatApp::new(cc, cmd_tx.clone(), event_receiver)))
        }),
    )
}
