use clap::Parser;
use client::input::Console;
use client::menu::{App, Outcome};
use client::network::ServerConnection;
use client::notifications::NotificationListener;
use log::{info, warn};
use std::net::Ipv4Addr;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Message that asks the server to close the connection
    #[arg(long, default_value = "EXIT")]
    exit_message: String,

    /// Multicast group carrying ranking notifications
    #[arg(long, default_value = "239.255.32.32")]
    multicast_address: Ipv4Addr,

    #[arg(long, default_value = "4446")]
    multicast_port: u16,

    /// Receive buffer size for notifications
    #[arg(long, default_value = "1024")]
    buffer_size: usize,

    /// Seconds between connection attempts
    #[arg(long, default_value = "5")]
    retry_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let retry = Duration::from_secs(args.retry_secs);

    info!("Starting client, server at {}", args.server);
    let mut conn = ServerConnection::connect(&args.server, retry).await;

    let notifications =
        match NotificationListener::start(args.multicast_address, args.multicast_port, args.buffer_size).await {
            Ok(listener) => Some(listener),
            Err(e) => {
                warn!("Notifications unavailable: {}", e);
                None
            }
        };

    let mut app = App::new(Console::stdio(), notifications, &args.exit_message);
    let result = loop {
        match app.serve(conn).await {
            Ok(Outcome::Exit) => break Ok(()),
            Ok(Outcome::Lost) => conn = ServerConnection::connect(&args.server, retry).await,
            Err(e) => break Err(e),
        }
    };

    app.shutdown().await;
    result.map_err(Into::into)
}
