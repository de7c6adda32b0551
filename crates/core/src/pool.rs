//! Flash lending pool
//!
//! [`PoolState`] holds the fee rate, the asset allow-list and the governance
//! lock. The entry points (`flash_loan`, `add_supported_token`, `confirm`,
//! `flash_fee`, `max_flash_loan`) live on [`Runtime`] because they need the
//! ledger, the clock and transactional rollback.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::borrower::{FlashBorrower, LoanContext, CALLBACK_SUCCESS};
use crate::error::{LendingError, LendingResult};
use crate::events::PoolEvent;
use crate::ledger::AssetLedger;
use crate::runtime::Runtime;
use crate::timelock::ConfirmationTimeLock;
use crate::types::{AccountId, Amount, AssetId, FEE_DENOMINATOR};

/// Construction-time parameters of a pool
#[derive(Debug, Clone)]
pub struct PoolParams {
    /// Fee in parts per 10,000 of the borrowed amount
    pub fee_rate_bps: u64,
    /// Minimum time between two privileged actions
    pub cooldown: Duration,
    /// Admin roster, in the order quorum counting walks it
    pub admins: Vec<AccountId>,
    pub required_confirmations: usize,
}

/// `amount * fee_rate_bps / 10000`, rounded toward zero
pub fn compute_fee(amount: Amount, fee_rate_bps: u64) -> LendingResult<Amount> {
    amount
        .checked_mul(Amount::from(fee_rate_bps))
        .map(|scaled| scaled / FEE_DENOMINATOR)
        .ok_or(LendingError::ArithmeticOverflow)
}

#[derive(Debug, Clone)]
pub struct PoolState {
    address: AccountId,
    fee_rate_bps: u64,
    supported: HashSet<AssetId>,
    timelock: ConfirmationTimeLock,
}

impl PoolState {
    pub fn new(address: AccountId, params: PoolParams, now: DateTime<Utc>) -> LendingResult<Self> {
        let timelock = ConfirmationTimeLock::new(
            params.admins,
            params.required_confirmations,
            params.cooldown,
            now,
        )?;

        Ok(Self {
            address,
            fee_rate_bps: params.fee_rate_bps,
            supported: HashSet::new(),
            timelock,
        })
    }

    /// Account that holds the pool's liquidity
    pub fn address(&self) -> AccountId {
        self.address
    }

    pub fn fee_rate_bps(&self) -> u64 {
        self.fee_rate_bps
    }

    pub fn is_supported(&self, asset: &AssetId) -> bool {
        self.supported.contains(asset)
    }

    pub fn supported_assets(&self) -> impl Iterator<Item = &AssetId> {
        self.supported.iter()
    }

    pub fn timelock(&self) -> &ConfirmationTimeLock {
        &self.timelock
    }

    pub fn flash_fee(&self, asset: &AssetId, amount: Amount) -> LendingResult<Amount> {
        if !self.is_supported(asset) {
            return Err(LendingError::UnsupportedCurrency);
        }
        compute_fee(amount, self.fee_rate_bps)
    }
}

impl Runtime {
    /// Fee charged for borrowing `amount` of `asset`
    pub fn flash_fee(&self, asset: &AssetId, amount: Amount) -> LendingResult<Amount> {
        self.world.pool.flash_fee(asset, amount)
    }

    /// Pool holdings of `asset` if it is listed, zero otherwise.
    ///
    /// Advisory: the loan itself fails on the outbound transfer when the
    /// pool holds less than requested.
    pub fn max_flash_loan(&self, asset: &AssetId) -> Amount {
        if !self.world.pool.is_supported(asset) {
            return 0;
        }
        self.world.ledger.balance_of(asset, &self.world.pool.address)
    }

    /// Record `caller`'s confirmation for the next privileged action
    pub fn confirm(&mut self, caller: &AccountId) -> LendingResult<()> {
        self.transact(|rt| {
            rt.world.pool.timelock.confirm(caller)?;
            rt.emit(PoolEvent::AdminConfirmed { admin: *caller });
            info!(
                admin = %caller,
                confirmations = rt.world.pool.timelock.confirmation_count(),
                required = rt.world.pool.timelock.required_confirmations(),
                "Admin confirmed"
            );
            Ok(())
        })
    }

    /// Put `asset` on the allow-list. Privileged: consumes the quorum.
    pub fn add_supported_token(&mut self, caller: &AccountId, asset: &AssetId) -> LendingResult<()> {
        self.transact(|rt| {
            let now = rt.now();
            rt.world.pool.timelock.authorize(caller, now)?;
            rt.emit(PoolEvent::ActionExecuted {
                caller: *caller,
                timestamp: now,
            });

            rt.world.pool.supported.insert(*asset);
            rt.emit(PoolEvent::TokenAdded { asset: *asset });

            info!(%asset, admin = %caller, "Asset added to lending allow-list");
            Ok(())
        })
    }

    /// Lend `amount` of `asset` to `receiver` for the duration of its callback.
    ///
    /// The receiver gets the principal, is called back with `caller` as the
    /// initiator, and must return [`CALLBACK_SUCCESS`] and have approved the
    /// pool for `amount + fee`. Any failure reverts the whole loan, and so
    /// does any attempt to start another loan from inside the callback, even
    /// if the callback ignores the `ReentrantCall` it got back.
    pub fn flash_loan(
        &mut self,
        caller: &AccountId,
        receiver: &mut dyn FlashBorrower,
        asset: &AssetId,
        amount: Amount,
        payload: &[u8],
    ) -> LendingResult<()> {
        self.transact(|rt| {
            // Held until the repayment has been pulled back
            let lock = rt.guard.enter()?;

            let fee = rt.world.pool.flash_fee(asset, amount)?;
            let repayment = amount
                .checked_add(fee)
                .ok_or(LendingError::ArithmeticOverflow)?;
            let pool = rt.world.pool.address;
            let borrower = receiver.address();

            rt.emit(PoolEvent::LoanRequested {
                receiver: borrower,
                asset: *asset,
                amount,
                fee,
                payload: payload.to_vec(),
            });

            debug!(%asset, %borrower, amount, fee, "Sending loan principal");
            // The pool never lends to itself: the callback would act as the pool
            if borrower == pool || !rt.world.ledger.transfer(asset, &pool, &borrower, amount) {
                return Err(LendingError::TransferFailed);
            }

            debug!(%borrower, initiator = %caller, "Invoking borrower callback");
            let marker = receiver.on_flash_loan(
                &mut LoanContext::new(rt, borrower),
                caller,
                asset,
                amount,
                fee,
                payload,
            )?;
            if lock.reentry_attempted() {
                return Err(LendingError::ReentrantCall);
            }
            if marker != CALLBACK_SUCCESS {
                return Err(LendingError::CallbackFailed);
            }

            debug!(%borrower, repayment, "Pulling repayment");
            if !rt
                .world
                .ledger
                .transfer_from(asset, &pool, &borrower, &pool, repayment)
            {
                return Err(LendingError::RepayFailed);
            }

            rt.emit(PoolEvent::LoanExecuted {
                receiver: borrower,
                asset: *asset,
                amount,
                fee,
                payload: payload.to_vec(),
            });

            info!(%asset, %borrower, amount, fee, "Flash loan executed");
            Ok(())
        })
    }
}
