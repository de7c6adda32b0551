//! Execution environment for the pool
//!
//! The runtime owns the world state (ledger balances and pool state), the
//! append-only event journal, the reentrancy guard and the block timestamp.
//! Every state-changing entry point runs inside [`Runtime::transact`]: the
//! world is snapshotted first and restored if the operation fails, and the
//! journal is truncated back to its previous length. That gives each
//! operation all-or-nothing semantics across the untrusted borrower callback.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use solana_sdk::pubkey::Pubkey;

use crate::error::LendingResult;
use crate::events::{EventBus, PoolEvent};
use crate::guard::ReentrancyGuard;
use crate::ledger::{AssetLedger, TokenLedger};
use crate::pool::{PoolParams, PoolState};
use crate::types::{AccountId, Amount, AssetId};

/// Everything a failed operation must leave untouched
#[derive(Debug, Clone)]
pub(crate) struct WorldState {
    pub(crate) ledger: TokenLedger,
    pub(crate) pool: PoolState,
}

pub struct Runtime {
    pub(crate) world: WorldState,
    pub(crate) guard: ReentrancyGuard,
    journal: Vec<PoolEvent>,
    now: DateTime<Utc>,
    depth: usize,
    bus: Option<Arc<EventBus>>,
}

impl Runtime {
    /// Deploy a pool with the given parameters at block time `genesis`
    pub fn new(params: PoolParams, genesis: DateTime<Utc>) -> LendingResult<Self> {
        let pool = PoolState::new(Pubkey::new_unique(), params, genesis)?;
        tracing::info!(
            pool = %pool.address(),
            fee_rate_bps = pool.fee_rate_bps(),
            admins = pool.timelock().admins().len(),
            required = pool.timelock().required_confirmations(),
            "Lending pool deployed"
        );

        Ok(Self {
            world: WorldState {
                ledger: TokenLedger::new(),
                pool,
            },
            guard: ReentrancyGuard::new(),
            journal: Vec::new(),
            now: genesis,
            depth: 0,
            bus: None,
        })
    }

    /// Publish committed events on `bus`
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    // ── Clock ───────────────────────────────────────────────────────

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn set_time(&mut self, now: DateTime<Utc>) {
        self.now = now;
    }

    pub fn advance(&mut self, by: Duration) {
        self.now += by;
    }

    // ── Inspection ──────────────────────────────────────────────────

    pub fn pool(&self) -> &PoolState {
        &self.world.pool
    }

    pub fn pool_address(&self) -> AccountId {
        self.world.pool.address()
    }

    pub fn ledger(&self) -> &TokenLedger {
        &self.world.ledger
    }

    /// Every committed event, oldest first
    pub fn journal(&self) -> &[PoolEvent] {
        &self.journal
    }

    /// True while a guarded operation is in flight
    pub fn is_entered(&self) -> bool {
        self.guard.is_entered()
    }

    // ── Ledger access for accounts ──────────────────────────────────

    /// Create `amount` new units of `asset` for `to`
    pub fn mint(&mut self, asset: &AssetId, to: &AccountId, amount: Amount) -> bool {
        self.world.ledger.mint(asset, to, amount)
    }

    pub fn transfer(&mut self, from: &AccountId, asset: &AssetId, to: &AccountId, amount: Amount) -> bool {
        self.world.ledger.transfer(asset, from, to, amount)
    }

    pub fn approve(&mut self, owner: &AccountId, asset: &AssetId, spender: &AccountId, amount: Amount) -> bool {
        self.world.ledger.approve(asset, owner, spender, amount)
    }

    pub fn allowance(&self, asset: &AssetId, owner: &AccountId, spender: &AccountId) -> Amount {
        self.world.ledger.allowance(asset, owner, spender)
    }

    pub fn balance_of(&self, asset: &AssetId, account: &AccountId) -> Amount {
        self.world.ledger.balance_of(asset, account)
    }

    // ── Transactions ────────────────────────────────────────────────

    pub(crate) fn emit(&mut self, event: PoolEvent) {
        self.journal.push(event);
    }

    /// Run `op` atomically.
    ///
    /// On error the world state is restored to what it was before `op`
    /// started. Calls nest: an inner failure only unwinds the inner call,
    /// and the caller decides whether to propagate it. Events reach the bus
    /// once the outermost call commits.
    pub fn transact<T, F>(&mut self, op: F) -> LendingResult<T>
    where
        F: FnOnce(&mut Self) -> LendingResult<T>,
    {
        let snapshot = self.world.clone();
        let committed = self.journal.len();

        self.depth += 1;
        let result = op(self);
        self.depth -= 1;

        match result {
            Ok(value) => {
                if self.depth == 0 {
                    self.publish_since(committed);
                }
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    depth = self.depth,
                    discarded_events = self.journal.len() - committed,
                    "Operation reverted"
                );
                self.world = snapshot;
                self.journal.truncate(committed);
                Err(e)
            }
        }
    }

    fn publish_since(&self, start: usize) {
        let Some(bus) = &self.bus else {
            return;
        };
        let delivered = bus.publish_committed(&self.journal[start..]);
        tracing::trace!(delivered, "Committed events published");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LendingError;

    fn runtime() -> Runtime {
        let admins = vec![Pubkey::new_unique(), Pubkey::new_unique()];
        let params = PoolParams {
            fee_rate_bps: 10,
            cooldown: Duration::days(1),
            admins,
            required_confirmations: 2,
        };
        Runtime::new(params, DateTime::from_timestamp(0, 0).unwrap()).unwrap()
    }

    #[test]
    fn test_failed_transaction_restores_ledger() {
        let mut rt = runtime();
        let (asset, alice, bob) = (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());
        rt.mint(&asset, &alice, 100);

        let result: LendingResult<()> = rt.transact(|rt| {
            assert!(rt.transfer(&alice, &asset, &bob, 60));
            Err(LendingError::RepayFailed)
        });

        assert_eq!(result.unwrap_err(), LendingError::RepayFailed);
        assert_eq!(rt.balance_of(&asset, &alice), 100);
        assert_eq!(rt.balance_of(&asset, &bob), 0);
    }

    #[test]
    fn test_failed_transaction_discards_events() {
        let mut rt = runtime();
        let asset = Pubkey::new_unique();

        let _ = rt.transact(|rt| -> LendingResult<()> {
            rt.emit(PoolEvent::TokenAdded { asset });
            Err(LendingError::CallbackFailed)
        });

        assert!(rt.journal().is_empty());
    }

    #[test]
    fn test_inner_failure_only_unwinds_inner_call() {
        let mut rt = runtime();
        let (asset, alice, bob) = (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());
        rt.mint(&asset, &alice, 100);

        rt.transact(|rt| {
            rt.transfer(&alice, &asset, &bob, 10);
            let inner: LendingResult<()> = rt.transact(|rt| {
                rt.transfer(&alice, &asset, &bob, 50);
                Err(LendingError::TransferFailed)
            });
            assert!(inner.is_err());
            Ok(())
        })
        .unwrap();

        assert_eq!(rt.balance_of(&asset, &alice), 90);
        assert_eq!(rt.balance_of(&asset, &bob), 10);
    }

    #[tokio::test]
    async fn test_only_committed_events_are_published() {
        let bus = Arc::new(EventBus::new(16));
        let mut rx = bus.subscribe();
        let mut rt = runtime().with_event_bus(Arc::clone(&bus));
        let (kept, dropped) = (Pubkey::new_unique(), Pubkey::new_unique());

        let _ = rt.transact(|rt| -> LendingResult<()> {
            rt.emit(PoolEvent::TokenAdded { asset: dropped });
            Err(LendingError::CallbackFailed)
        });
        rt.transact(|rt| {
            rt.emit(PoolEvent::TokenAdded { asset: kept });
            Ok(())
        })
        .unwrap();

        assert_eq!(rx.recv().await.unwrap(), PoolEvent::TokenAdded { asset: kept });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_clock_advances() {
        let mut rt = runtime();
        let start = rt.now();
        rt.advance(Duration::hours(3));
        assert_eq!(rt.now() - start, Duration::hours(3));
    }
}
