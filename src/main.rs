use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use diffmirror::config::Cli;
use diffmirror::observability::{export, logging, Stats};
use diffmirror::{Mirror, MirrorServer};

const GRAPHITE_INTERVAL: Duration = Duration::from_secs(5);
const CONSOLE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(error = %error, "invalid configuration");
            std::process::exit(1);
        }
    };

    let stats = Arc::new(Stats::new());
    if config.print_stats {
        export::spawn_console_reporter(stats.clone(), CONSOLE_INTERVAL);
    }
    if let Some(addr) = &config.graphite {
        export::spawn_graphite_reporter(
            stats.clone(),
            addr.clone(),
            config.graphite_prefix.clone(),
            GRAPHITE_INTERVAL,
        );
    }

    let mirror = Arc::new(Mirror::new(&config, stats));

    tracing::info!(
        listen = %config.listen,
        backend_a = %config.backend_a.address,
        alias_a = %config.backend_a.name,
        backend_b = %config.backend_b.address,
        alias_b = %config.backend_b.name,
        workers = config.workers,
        "listening and mirroring"
    );

    let listener = TcpListener::bind(&config.listen).await?;
    MirrorServer::new(mirror).run(listener).await?;

    tracing::info!("shutdown complete");
    Ok(())
}
