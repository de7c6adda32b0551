//! Governance and lending walkthrough against a freshly deployed pool

use anyhow::{bail, Context};
use chrono::Duration;
use solana_sdk::pubkey::Pubkey;
use tracing::{info, warn};

use flashlend_core::audit_log::AuditLogger;
use flashlend_core::borrower::{
    NonRepayingBorrower, ReentrantBorrower, RepayingBorrower, WrongMarkerBorrower,
};
use flashlend_core::{Amount, CallbackMarker, FlashBorrower, Runtime};

const POOL_LIQUIDITY: Amount = 1_000_000;
const LOAN_AMOUNT: Amount = 1_000;

#[derive(Debug, Default)]
pub struct ScenarioReport {
    pub loans_executed: usize,
    pub attacks_rejected: usize,
    pub pool_balance: Amount,
}

pub async fn run(rt: &mut Runtime, audit: &AuditLogger) -> anyhow::Result<ScenarioReport> {
    let mut report = ScenarioReport::default();
    let timelock = rt.pool().timelock();
    if timelock.admins().is_empty() {
        bail!("pool has no admins to govern it");
    }
    let admins = timelock.admins().to_vec();
    let cooldown = timelock.cooldown();
    // The executing admin must itself be confirmed, even with a zero quorum
    let signers = timelock.required_confirmations().max(1);
    let asset = Pubkey::new_unique();
    let pool = rt.pool_address();

    // ── Governance ──────────────────────────────────────────────────
    if cooldown > Duration::zero() {
        match rt.add_supported_token(&admins[0], &asset) {
            Ok(()) => bail!("privileged call succeeded before the cooldown elapsed"),
            Err(e) => {
                warn!(error = %e, "Privileged call rejected at deployment time");
                audit
                    .log_rejection("ADD_SUPPORTED_TOKEN", &asset.to_string(), &e)
                    .await?;
            }
        }
        rt.advance(cooldown);
    }

    for admin in admins.iter().take(signers) {
        rt.confirm(admin)?;
    }
    let executor = admins[signers - 1];
    rt.add_supported_token(&executor, &asset)
        .context("listing the demo asset")?;
    info!("🔓 Asset {} listed by {}", asset, executor);

    // ── Lending ─────────────────────────────────────────────────────
    rt.mint(&asset, &pool, POOL_LIQUIDITY);
    info!("💧 Pool funded with {} units", POOL_LIQUIDITY);

    let fee = rt.flash_fee(&asset, LOAN_AMOUNT)?;
    let mut borrower = RepayingBorrower::new(Pubkey::new_unique());
    let borrower_account = borrower.address();
    rt.mint(&asset, &borrower_account, fee);

    rt.flash_loan(&borrower_account, &mut borrower, &asset, LOAN_AMOUNT, b"demo")
        .context("honest flash loan")?;
    report.loans_executed += 1;
    info!(
        "✅ Borrowed {} and repaid {} (fee {})",
        LOAN_AMOUNT,
        LOAN_AMOUNT + fee,
        fee
    );

    // ── Attacks ─────────────────────────────────────────────────────
    let mut attackers: Vec<(&str, Box<dyn FlashBorrower>)> = Vec::new();
    attackers.push((
        "REENTRANT",
        Box::new(ReentrantBorrower::new(Pubkey::new_unique())),
    ));
    attackers.push((
        "NON_REPAYING",
        Box::new(NonRepayingBorrower::new(Pubkey::new_unique())),
    ));
    attackers.push((
        "WRONG_MARKER",
        Box::new(WrongMarkerBorrower::new(
            Pubkey::new_unique(),
            CallbackMarker([0u8; 32]),
        )),
    ));

    let caller = Pubkey::new_unique();
    for (label, attacker) in &mut attackers {
        let label = *label;
        // Enough to pay the fee, so only the attack itself can fail the loan
        rt.mint(&asset, &attacker.address(), fee);
        let before = rt.balance_of(&asset, &pool);

        match rt.flash_loan(&caller, &mut **attacker, &asset, LOAN_AMOUNT, &[]) {
            Ok(()) => bail!("{} borrower was not rejected", label),
            Err(e) => {
                warn!(attack = label, error = %e, "🛡️ Flash loan rejected");
                audit.log_rejection("FLASH_LOAN", label, &e).await?;
                report.attacks_rejected += 1;
            }
        }

        if rt.balance_of(&asset, &pool) != before {
            bail!("{} attack moved pool funds", label);
        }
    }

    report.pool_balance = rt.balance_of(&asset, &pool);
    Ok(report)
}
