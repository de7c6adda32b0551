//! FlashLend Simulator
//!
//! Deploys a lending pool, walks it through governance and a flash loan,
//! then replays known attacks against it. Every committed event is appended
//! to the JSONL audit log.

use std::sync::Arc;

use chrono::Utc;
use solana_sdk::pubkey::Pubkey;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use flashlend_core::{
    audit_log::AuditLogger, config::PoolConfig, events::EventBus, Runtime,
};

mod scenario;

/// Forward committed pool events from the bus to the audit log
fn spawn_audit_writer(
    bus: &EventBus,
    audit: Arc<AuditLogger>,
    pool: String,
) -> tokio::task::JoinHandle<usize> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        let mut written = 0usize;
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Err(e) = audit.log_pool_event(&pool, &event).await {
                        error!("Failed to write audit entry: {}", e);
                    } else {
                        written += 1;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Audit writer lagged, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        written
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flashlend_sim=info,flashlend_core=info".into()),
        )
        .init();

    // Load config
    dotenvy::dotenv().ok();
    let mut config = PoolConfig::from_env()?;

    if config.admins.is_empty() {
        config.admins = (0..3).map(|_| Pubkey::new_unique().to_string()).collect();
        warn!("⚠️  ADMINS not set, using {} generated demo admins", config.admins.len());
    }

    let params = config.to_params()?;
    info!("🚀 FlashLend simulator starting...");
    info!("   Fee rate: {} bps", config.fee_rate_bps);
    info!(
        "   Quorum: {} of {} admins, cooldown {}s",
        config.required_confirmations,
        config.admins.len(),
        config.cooldown_seconds
    );

    let audit = Arc::new(AuditLogger::new(&config.audit_log_path).await?);
    audit
        .log_system_event("STARTUP", serde_json::to_value(&config)?)
        .await?;

    let bus = Arc::new(EventBus::default());
    let mut runtime = Runtime::new(params, Utc::now())?.with_event_bus(Arc::clone(&bus));
    let writer = spawn_audit_writer(&bus, Arc::clone(&audit), runtime.pool_address().to_string());

    let outcome = scenario::run(&mut runtime, &audit).await;

    // Closing the bus lets the writer drain and exit
    drop(runtime);
    drop(bus);
    let written = writer.await?;

    let report = outcome?;
    audit
        .log_system_event(
            "SHUTDOWN",
            serde_json::json!({
                "loans_executed": report.loans_executed,
                "attacks_rejected": report.attacks_rejected,
                "pool_balance": report.pool_balance.to_string(),
                "events_written": written,
            }),
        )
        .await?;

    info!(
        "📊 Done - Loans: {}, Attacks rejected: {}, Pool balance: {}",
        report.loans_executed, report.attacks_rejected, report.pool_balance
    );
    info!("   Audit log: {}", audit.path().display());
    Ok(())
}
