//! Folio Live Listener
//!
//! Small terminal client: connects to the real-time channel, prints
//! notifications, announcements and toast events as they arrive, and
//! disconnects cleanly on Ctrl-C.

use std::path::PathBuf;

use clap::Parser;
use folio_live::{LiveClient, LiveConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "folio-listen", about = "Listen to the Folio real-time channel")]
struct Args {
    /// Session token for the auth handshake
    #[arg(long, env = "FOLIO_LIVE_TOKEN")]
    token: String,

    /// Base API origin; overrides the configured value
    #[arg(long)]
    api_url: Option<String>,

    /// Path to a config file (otherwise default locations are searched)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable toast events
    #[arg(long)]
    no_toasts: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => LiveConfig::load_with_env(path)?,
        None => LiveConfig::load_default(),
    };
    if let Some(url) = args.api_url {
        config.api_url = url;
    }
    if args.no_toasts {
        config.show_toasts = false;
    }

    init_logging(&config);
    tracing::info!("Folio Live v{}", env!("CARGO_PKG_VERSION"));

    let client = LiveClient::new(config);

    client
        .router()
        .subscribe_notifications(|notif| {
            println!("[{}] {} — {}", notif.kind, notif.title, notif.message);
        })
        .await;

    client
        .router()
        .subscribe_announcements(|ann| {
            println!("[announcement] {} — {}", ann.title, ann.message);
        })
        .await;

    if let Some(mut toasts) = client.take_toasts() {
        tokio::spawn(async move {
            while let Some(toast) = toasts.recv().await {
                println!("{} {}", toast.icon, toast.message);
            }
        });
    }

    let mut state = client.watch_state();
    tokio::spawn(async move {
        while state.changed().await.is_ok() {
            tracing::info!(state = %*state.borrow(), "Connection state");
        }
    });

    client.connect(args.token);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");
    client.disconnect();

    let store = client.notifications();
    tracing::info!(
        total = store.len().await,
        unread = store.unread_count().await,
        "Session summary"
    );

    Ok(())
}

fn init_logging(config: &LiveConfig) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("folio_live={}", config.logging.level)),
    );

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
