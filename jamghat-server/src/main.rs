//! # Jamghat Server
//!
//! Watch-party synchronization server.
//!
//! ## Overview
//!
//! Keeps the members of a watch party on the same playback position:
//!
//! - **Party lifecycle**: short join codes, membership, inactivity expiry
//! - **Playback sync**: host-authoritative snapshots over polling HTTP
//! - **Chat**: append-only party chat with a bounded retained log
//!
//! State is in-memory by design; the catalog, accounts, and watch-history
//! services are separate collaborators behind the gateway.

use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use chrono::Duration as ChronoDuration;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jamghat_server::{AppState, PartyStore, StoreConfig, build_app};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "jamghat-server")]
#[command(about = "Watch-party synchronization server")]
struct Cli {
    /// Server host
    #[arg(long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Server port
    #[arg(short, long, env = "SERVER_PORT", default_value_t = 4820)]
    port: u16,

    /// Party inactivity expiry, in seconds
    #[arg(long, env = "PARTY_TTL_SECS", default_value_t = 7200)]
    party_ttl_secs: u32,

    /// Member staleness window, in seconds
    #[arg(long, env = "MEMBER_TIMEOUT_SECS", default_value_t = 30)]
    member_timeout_secs: u32,

    /// Retained chat messages per party
    #[arg(long, env = "CHAT_KEEP", default_value_t = 100)]
    chat_keep: usize,

    /// Background sweep interval, in seconds
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value_t = 60)]
    sweep_interval_secs: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let store = PartyStore::new(StoreConfig {
        party_ttl: ChronoDuration::seconds(i64::from(cli.party_ttl_secs)),
        member_timeout: ChronoDuration::seconds(i64::from(
            cli.member_timeout_secs,
        )),
        chat_keep: cli.chat_keep,
    });
    let state = AppState::new(store);

    spawn_sweeper(
        state.clone(),
        Duration::from_secs(u64::from(cli.sweep_interval_secs)),
    );

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
        .parse()
        .with_context(|| {
            format!("invalid listen address {}:{}", cli.host, cli.port)
        })?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("jamghat-server listening on {addr}");

    axum::serve(listener, build_app(state))
        .await
        .context("server error")?;
    Ok(())
}

/// Periodically prune expired parties and stale members.
fn spawn_sweeper(state: AppState, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(
            tokio::time::MissedTickBehavior::Delay,
        );
        loop {
            ticker.tick().await;
            state.store.sweep();
        }
    });
}
