use clap::Parser;
use log::{error, info, warn};
use server::config::ServerConfig;
use server::dispatcher::Dispatcher;
use server::network::Server;
use server::notifier::Notifier;
use server::persistence::{snapshot, Collection};
use server::ranking::{RankingEngine, RankingIndex};
use server::ServerError;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Path of the JSON configuration file
    #[clap(short, long, default_value = "server.json")]
    config: PathBuf,
    /// Overrides the port from the configuration file
    #[clap(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("{}", e);
        eprintln!("hotelier server: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(args: Args) -> Result<(), ServerError> {
    let mut config = ServerConfig::load(&args.config)?;
    if let Some(port) = args.port {
        config.port = port;
    }

    let files = config.data_files();
    let store = files.load()?;
    info!(
        "Loaded {} hotels and {} users",
        store.hotels().len(),
        store.users().len()
    );

    let index = Arc::new(RankingIndex::with_cities(store.cities()));
    let store = Arc::new(RwLock::new(store));

    let notifier = match Notifier::bind(config.multicast_group()).await {
        Ok(notifier) => notifier,
        Err(e) => {
            warn!("Notifications disabled: {}", e);
            Notifier::disabled()
        }
    };

    let engine = RankingEngine::new(Arc::clone(&store), Arc::clone(&index), notifier);
    engine.cycle().await;

    let dispatcher = Dispatcher::new(Arc::clone(&store), index, Some(files.clone()));
    let server = Server::bind(
        config.listen_addr(),
        dispatcher,
        &config.exit_message,
        config.buffer_size,
    )
    .await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ranking_handle = tokio::spawn(engine.run(config.ranking_interval(), shutdown_rx.clone()));
    let mut server_handle = tokio::spawn(server.run(shutdown_rx));

    let served = tokio::select! {
        result = &mut server_handle => Some(result),
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            None
        }
    };

    let _ = shutdown_tx.send(true);
    let served = match served {
        Some(result) => result,
        None => server_handle.await,
    };
    if let Err(e) = ranking_handle.await {
        error!("Ranking task panicked: {}", e);
    }

    let saved = {
        let store = store.read().await;
        snapshot(&store, &files, &Collection::ALL)
    };
    let written = saved.write().await;
    info!("Saved {} data files, bye", written);

    match served {
        Ok(result) => result,
        Err(e) => {
            error!("Multiplexer task panicked: {}", e);
            Ok(())
        }
    }
}
