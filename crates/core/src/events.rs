//! Pool events and the broadcast bus that carries committed ones
//!
//! Events are appended to the runtime journal as the operation runs, so a
//! rolled-back operation drops them together with its state changes. Only
//! events of committed operations reach [`EventBus`] subscribers.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{serde_pubkey, AccountId, Amount, AssetId};

/// Observable log entries emitted by the pool and its governance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolEvent {
    // ── Lending Events ──────────────────────────────────────────────
    /// Emitted before any asset leaves the pool
    LoanRequested {
        #[serde(with = "serde_pubkey")]
        receiver: AccountId,
        #[serde(with = "serde_pubkey")]
        asset: AssetId,
        amount: Amount,
        fee: Amount,
        payload: Vec<u8>,
    },

    /// Emitted after principal plus fee is back in the pool
    LoanExecuted {
        #[serde(with = "serde_pubkey")]
        receiver: AccountId,
        #[serde(with = "serde_pubkey")]
        asset: AssetId,
        amount: Amount,
        fee: Amount,
        payload: Vec<u8>,
    },

    // ── Governance Events ───────────────────────────────────────────
    /// A new asset was put on the allow-list
    TokenAdded {
        #[serde(with = "serde_pubkey")]
        asset: AssetId,
    },

    /// An admin recorded their confirmation
    AdminConfirmed {
        #[serde(with = "serde_pubkey")]
        admin: AccountId,
    },

    /// A privileged action consumed the quorum
    ActionExecuted {
        #[serde(with = "serde_pubkey")]
        caller: AccountId,
        timestamp: DateTime<Utc>,
    },
}

impl PoolEvent {
    /// Short name used by the audit log
    pub fn name(&self) -> &'static str {
        match self {
            PoolEvent::LoanRequested { .. } => "LOAN_REQUESTED",
            PoolEvent::LoanExecuted { .. } => "LOAN_EXECUTED",
            PoolEvent::TokenAdded { .. } => "TOKEN_ADDED",
            PoolEvent::AdminConfirmed { .. } => "ADMIN_CONFIRMED",
            PoolEvent::ActionExecuted { .. } => "ACTION_EXECUTED",
        }
    }

    pub fn is_governance(&self) -> bool {
        matches!(
            self,
            PoolEvent::TokenAdded { .. }
                | PoolEvent::AdminConfirmed { .. }
                | PoolEvent::ActionExecuted { .. }
        )
    }
}

/// Fan-out of committed pool events to async subscribers.
///
/// The runtime hands over the events of one committed operation at a time,
/// in journal order. Subscribers never see events of a rolled-back
/// operation.
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<PoolEvent>,
    committed: AtomicU64,
}

impl EventBus {
    pub const DEFAULT_CAPACITY: usize = 1024;

    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            committed: AtomicU64::new(0),
        }
    }

    /// Deliver the events of one committed operation.
    ///
    /// Returns how many of them reached at least one subscriber. With no
    /// subscriber the batch is counted as committed and then dropped.
    pub fn publish_committed(&self, events: &[PoolEvent]) -> usize {
        self.committed
            .fetch_add(events.len() as u64, Ordering::Relaxed);
        events
            .iter()
            .filter(|event| self.tx.send((*event).clone()).is_ok())
            .count()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Events handed to the bus since it was created
    pub fn committed_count(&self) -> u64 {
        self.committed.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
