//! robogate-daemon - the robot gateway process.
//!
//! Connects the three local datagram peers, runs their inbound pumps,
//! starts the token authority and its refresher, answers the security
//! daemon's request traffic, bridges legacy engine events onto the
//! structured registry, and serves a loopback health endpoint.
//!
//! The public RPC front door (TLS, HTTP/2, JSON transcoding) is hosted
//! separately and consumes this crate's `service` and `auth` modules
//! as a library.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use robogate_core::token::{DisconnectedIdentity, SuccessCallback, TokenAuthority};
use robogate_daemon::config::GatewayConfig;
use robogate_daemon::health::{self, HealthState};
use robogate_daemon::peers::secd::{ConnectionInfo, UnavailableProxy};
use robogate_daemon::peers::{self, bridge};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// robogate daemon - robot gateway
#[derive(Parser, Debug)]
#[command(name = "robogate-daemon")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the gateway configuration file
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,

    /// Override the peer socket directory
    #[arg(long)]
    socket_dir: Option<PathBuf>,

    /// Override the token directory
    #[arg(long)]
    token_dir: Option<PathBuf>,

    /// Override the health endpoint port (0 disables it)
    #[arg(long)]
    health_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn load_config(args: &Args) -> anyhow::Result<GatewayConfig> {
    let mut config = if args.config.exists() {
        GatewayConfig::from_file(&args.config)?
    } else {
        info!(path = %args.config.display(), "no config file, using defaults");
        GatewayConfig::default()
    };
    if let Some(socket_dir) = &args.socket_dir {
        config.socket_dir.clone_from(socket_dir);
    }
    if let Some(token_dir) = &args.token_dir {
        config.token_dir.clone_from(token_dir);
    }
    if let Some(health_port) = args.health_port {
        config.health_port = health_port;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&args.log_level).context("invalid log level")?,
        )
        .init();
    info!("launching robogate-daemon");

    let config = load_config(&args)?;
    if !config.cert_path.exists() {
        warn!(path = %config.cert_path.display(), "gateway certificate not found");
    }
    if !config.key_path.exists() {
        warn!(path = %config.key_path.display(), "gateway key not found");
    }

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        let mut sigterm = signal(SignalKind::terminate()).context("sigterm handler")?;
        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => info!("received SIGTERM"),
                _ = tokio::signal::ctrl_c() => info!("received interrupt"),
            }
            shutdown.cancel();
        });
    }

    // Each connect retries until its socket appears; a shutdown during
    // the wait is a clean exit.
    let (engine, envelope, secd) = tokio::join!(
        peers::connect_engine(&config.socket_dir, shutdown.clone()),
        peers::connect_envelope(&config.socket_dir, shutdown.clone()),
        peers::connect_secd(&config.socket_dir, shutdown.clone()),
    );
    let (Some(engine), Some(envelope), Some(secd)) = (engine, envelope, secd) else {
        info!("shutdown requested before sockets appeared");
        return Ok(());
    };
    let engine = Arc::new(engine);
    let envelope = Arc::new(envelope);
    let secd = Arc::new(secd);
    info!("sockets successfully created");

    let on_success: SuccessCallback = Arc::new(|| debug!("cloud round-trip succeeded"));
    let authority = TokenAuthority::spawn(
        config.token_config(),
        Arc::new(DisconnectedIdentity),
        on_success,
        shutdown.clone(),
    )
    .context("token authority init")?;
    authority.start_refresher();

    // One pump per peer; a fatal link signal ends a pump and leaves
    // that peer degraded until restart.
    let engine_pump = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.run_pump().await })
    };
    let envelope_pump = {
        let envelope = Arc::clone(&envelope);
        tokio::spawn(async move { envelope.run_pump().await })
    };
    let secd_pump = {
        let secd = Arc::clone(&secd);
        tokio::spawn(async move { secd.run_pump().await })
    };

    bridge::spawn(&engine, Arc::clone(&envelope));
    peers::secd::spawn_responder(
        Arc::clone(&secd),
        Arc::new(UnavailableProxy),
        Arc::new(ConnectionInfo::default()),
        Some(authority.clone()),
    );

    if config.health_port != 0 {
        let state = Arc::new(HealthState::new(
            Arc::clone(&engine),
            Arc::clone(&envelope),
            Arc::clone(&secd),
            Some(authority.clone()),
        ));
        let port = config.health_port;
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(err) = health::serve(port, state, shutdown).await {
                error!(error = %err, "health endpoint failed");
            }
        });
    }

    info!(port = config.port, "gateway core running");
    shutdown.cancelled().await;

    // Pumps end on their own when the peers close; don't hold shutdown
    // hostage to a half-open socket.
    engine_pump.abort();
    envelope_pump.abort();
    secd_pump.abort();

    info!("closed robogate-daemon");
    Ok(())
}
