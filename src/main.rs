use anyhow::{Context, Result};
use clap::Parser;
use feedrelay::feed::HttpFetcher;
use feedrelay::transport::{
    error_channel, liveness_channel, ConsoleTransport, Identity, Transport,
};
use feedrelay::{Config, Relay};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser, Debug)]
#[command(
    name = "feedrelay",
    about = "Relay new Reddit posts into chat channels"
)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, short, value_name = "FILE", default_value = "feedrelay.toml")]
    config: PathBuf,

    /// Validate the configuration, print a summary and exit
    #[arg(long)]
    check: bool,
}

/// Cancel `token` on the first SIGINT or SIGTERM.
fn spawn_signal_handler(token: CancellationToken) -> Result<()> {
    #[cfg(unix)]
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    tokio::spawn(async move {
        #[cfg(unix)]
        let sigterm_fut = sigterm.recv();
        #[cfg(not(unix))]
        let sigterm_fut = std::future::pending::<Option<()>>();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm_fut => {}
        }
        tracing::info!("Shutdown requested, draining outbound queue");
        token.cancel();
    });
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries relayed lines from the console transport.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.check {
        println!("Configuration OK: {}", args.config.display());
        println!("  sources:  {}", config.sources.join(", "));
        println!("  channels: {}", config.channels.join(", "));
        println!("  server:   {} as {} (tls: {})", config.server, config.nick, config.tls);
        println!("  poll:     every {}s", config.poll_interval_secs);
        return Ok(());
    }

    let client = reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client")?;
    let fetcher = HttpFetcher::from_config(client, &config);

    let (error_sink, errors) = error_channel();
    let (notifier, probe) = liveness_channel();
    let transport: Arc<dyn Transport> = Arc::new(ConsoleTransport::new(
        Identity::from_config(&config),
        error_sink,
        notifier,
    ));

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone())?;

    match Relay::new(config, fetcher, transport, errors, probe)
        .run(cancel)
        .await
    {
        Ok(summary) => {
            tracing::info!(delivered = summary.delivered, "Relay stopped");
        }
        Err(e) => {
            tracing::info!(reason = %e, "Relay stopped before polling began");
        }
    }

    Ok(())
}
