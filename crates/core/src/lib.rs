//! FlashLend Core Library
//!
//! Uncollateralized same-transaction loans ("flash loans") over an asset
//! allow-list, with allow-list changes gated by a multi-admin, time-locked
//! confirmation protocol.

pub mod audit_log;
pub mod borrower;
pub mod config;
pub mod error;
pub mod events;
pub mod guard;
pub mod ledger;
pub mod pool;
pub mod runtime;
pub mod timelock;
pub mod types;

pub use borrower::{CallbackMarker, FlashBorrower, LoanContext, CALLBACK_SUCCESS};
pub use error::*;
pub use pool::{PoolParams, PoolState};
pub use runtime::Runtime;
pub use types::*;
