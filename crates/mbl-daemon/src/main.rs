//! mbl-daemon entry point.
//!
//! This file is intentionally thin: it sets up tracing, loads and validates
//! configuration, opens the store, wires the scheduler and the Telegram
//! long-poll loop, and waits for ctrl-c. All command execution lives in
//! `handler.rs`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use tracing::{info, warn};

use mbl_config::secrets::resolve_secrets;
use mbl_config::AppConfig;
use mbl_daemon::handler::CommandHandler;
use mbl_intent::RuleParser;
use mbl_md::{QuoteSource, YahooChart};
use mbl_notify::{Notifier, TelegramClient, TelegramNotifier};
use mbl_scheduler::{Scheduler, SchedulerConfig};
use mbl_store::AlarmStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Silent if the file does
    // not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let loaded = mbl_config::load_layered_yaml(&[
        Path::new("config/base.yaml"),
        Path::new("config/local.yaml"),
    ])?;
    let cfg = AppConfig::from_value(&loaded.config_json)?;
    info!(config_hash = %loaded.config_hash, "configuration loaded");

    // Fail-closed boot: no token, no daemon.
    let secrets = resolve_secrets(&cfg)?;

    // A corrupt store document halts startup with the parse diagnostic;
    // never run the engine against state it cannot trust.
    let store = Arc::new(
        AlarmStore::open(&cfg.store.path)
            .with_context(|| format!("open alarm store at {}", cfg.store.path))?,
    );

    let timezone: chrono_tz::Tz = cfg
        .digest
        .timezone
        .parse()
        .map_err(|_| anyhow!("digest.timezone {:?} is not an IANA zone name", cfg.digest.timezone))?;

    let quotes: Arc<dyn QuoteSource> = Arc::new(YahooChart::new(&cfg.market_data.base_url));
    let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(TelegramClient::new(
        &cfg.telegram.api_base,
        &secrets.telegram_token,
    )));

    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&store),
        Arc::clone(&quotes),
        Arc::clone(&notifier),
        SchedulerConfig {
            poll_interval: Duration::from_secs(cfg.engine.poll_interval_secs),
            call_timeout: Duration::from_secs(cfg.engine.call_timeout_secs),
            digest_hour: cfg.digest.hour,
            timezone,
        },
    ));
    let scheduler_task = scheduler.spawn();

    let handler = Arc::new(CommandHandler::new(
        Arc::clone(&store),
        Arc::clone(&quotes),
        Box::new(RuleParser::new()),
    ));
    let inbound_client = Arc::new(TelegramClient::new(
        &cfg.telegram.api_base,
        &secrets.telegram_token,
    ));
    let inbound_task = tokio::spawn(poll_updates(
        inbound_client,
        handler,
        cfg.telegram.poll_timeout_secs,
    ));

    info!("mbl-daemon running");
    tokio::signal::ctrl_c()
        .await
        .context("wait for shutdown signal")?;
    info!("shutdown signal received");

    scheduler_task.abort();
    inbound_task.abort();
    Ok(())
}

/// Telegram getUpdates long-poll loop. Each inbound message is handled in
/// its own short-lived task; the store is the only shared mutable state, so
/// a slow command never delays the next poll. Transport errors back off and
/// retry so a flaky network never kills the loop.
async fn poll_updates(
    client: Arc<TelegramClient>,
    handler: Arc<CommandHandler>,
    timeout_secs: u64,
) {
    let mut offset: i64 = 0;
    loop {
        match client.get_updates(offset, timeout_secs).await {
            Ok(messages) => {
                for msg in messages {
                    offset = offset.max(msg.update_id + 1);
                    let handler = Arc::clone(&handler);
                    let client = Arc::clone(&client);
                    tokio::spawn(async move {
                        let reply = handler.handle(&msg.chat_id, &msg.text).await;
                        if let Err(e) = client.send_message(&msg.chat_id, &reply).await {
                            warn!(chat = %msg.chat_id, error = %e, "reply delivery failed");
                        }
                    });
                }
            }
            Err(e) => {
                warn!(error = %e, "getUpdates failed, backing off");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
