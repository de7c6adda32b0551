//! Borrower callback interface
//!
//! The pool calls [`FlashBorrower::on_flash_loan`] after sending the
//! principal. The borrower acknowledges the loan by returning
//! [`CALLBACK_SUCCESS`] and must have approved the pool for `amount + fee`
//! by the time the callback returns.
//!
//! The callback only sees a [`LoanContext`]: every state change it makes is
//! made as the borrower account, and it has no access to minting, the clock
//! or governance.
//!
//! The reference borrowers at the bottom of this module are used by the
//! simulator and the tests to exercise both the happy path and the attack
//! paths the pool has to reject.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::{LendingError, LendingResult};
use crate::pool::PoolState;
use crate::runtime::Runtime;
use crate::types::{AccountId, Amount, AssetId};

/// Opaque 256-bit acknowledgment returned by a borrower callback
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackMarker(pub [u8; 32]);

/// keccak256("ERC3156FlashBorrower.onFlashLoan")
pub const CALLBACK_SUCCESS: CallbackMarker = CallbackMarker([
    0x43, 0x91, 0x48, 0xf0, 0xbb, 0xc6, 0x82, 0xca, 0x07, 0x9e, 0x46, 0xd6, 0xe2, 0xc2, 0xf0, 0xc1,
    0xe3, 0xb8, 0x20, 0xf1, 0xa2, 0x91, 0xb0, 0x69, 0xd8, 0x88, 0x2a, 0xbf, 0x8c, 0xf1, 0x8d, 0xd9,
]);

impl fmt::Display for CallbackMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for CallbackMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallbackMarker({})", self)
    }
}

/// Capabilities handed to a borrower for the duration of its callback
pub struct LoanContext<'a> {
    runtime: &'a mut Runtime,
    borrower: AccountId,
}

impl<'a> LoanContext<'a> {
    pub(crate) fn new(runtime: &'a mut Runtime, borrower: AccountId) -> Self {
        Self { runtime, borrower }
    }

    /// Account every state change in this context acts as
    pub fn borrower(&self) -> AccountId {
        self.borrower
    }

    pub fn pool_address(&self) -> AccountId {
        self.runtime.pool_address()
    }

    pub fn pool(&self) -> &PoolState {
        self.runtime.pool()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.runtime.now()
    }

    pub fn balance_of(&self, asset: &AssetId, account: &AccountId) -> Amount {
        self.runtime.balance_of(asset, account)
    }

    pub fn allowance(&self, asset: &AssetId, owner: &AccountId, spender: &AccountId) -> Amount {
        self.runtime.allowance(asset, owner, spender)
    }

    pub fn flash_fee(&self, asset: &AssetId, amount: Amount) -> LendingResult<Amount> {
        self.runtime.flash_fee(asset, amount)
    }

    pub fn max_flash_loan(&self, asset: &AssetId) -> Amount {
        self.runtime.max_flash_loan(asset)
    }

    /// Move the borrower's own `asset` to `to`
    pub fn transfer(&mut self, asset: &AssetId, to: &AccountId, amount: Amount) -> bool {
        let from = self.borrower;
        self.runtime.transfer(&from, asset, to, amount)
    }

    /// Let `spender` pull up to `amount` of the borrower's `asset`
    pub fn approve(&mut self, asset: &AssetId, spender: &AccountId, amount: Amount) -> bool {
        let owner = self.borrower;
        self.runtime.approve(&owner, asset, spender, amount)
    }

    /// Start another loan with the borrower as initiator. While the current
    /// loan is in flight this always fails, and it fails the current loan too.
    pub fn flash_loan(
        &mut self,
        receiver: &mut dyn FlashBorrower,
        asset: &AssetId,
        amount: Amount,
        payload: &[u8],
    ) -> LendingResult<()> {
        let initiator = self.borrower;
        self.runtime
            .flash_loan(&initiator, receiver, asset, amount, payload)
    }
}

pub trait FlashBorrower {
    /// Account that receives the principal and repays it
    fn address(&self) -> AccountId;

    /// Handle a loan of `amount` of `asset`.
    ///
    /// `initiator` is the account that called `flash_loan`. Returning an error
    /// aborts the loan with that error.
    fn on_flash_loan(
        &mut self,
        ctx: &mut LoanContext<'_>,
        initiator: &AccountId,
        asset: &AssetId,
        amount: Amount,
        fee: Amount,
        payload: &[u8],
    ) -> LendingResult<CallbackMarker>;
}

// ── Reference borrowers ─────────────────────────────────────────────

/// Approves the pool for `amount + fee` and acknowledges the loan
#[derive(Debug, Clone)]
pub struct RepayingBorrower {
    address: AccountId,
    /// Initiators of every loan this borrower has handled
    pub initiators: Vec<AccountId>,
    /// Payloads of every loan this borrower has handled
    pub payloads: Vec<Vec<u8>>,
}

impl RepayingBorrower {
    pub fn new(address: AccountId) -> Self {
        Self {
            address,
            initiators: Vec::new(),
            payloads: Vec::new(),
        }
    }
}

impl FlashBorrower for RepayingBorrower {
    fn address(&self) -> AccountId {
        self.address
    }

    fn on_flash_loan(
        &mut self,
        ctx: &mut LoanContext<'_>,
        initiator: &AccountId,
        asset: &AssetId,
        amount: Amount,
        fee: Amount,
        payload: &[u8],
    ) -> LendingResult<CallbackMarker> {
        let repayment = amount
            .checked_add(fee)
            .ok_or(LendingError::ArithmeticOverflow)?;
        let pool = ctx.pool_address();
        ctx.approve(asset, &pool, repayment);

        self.initiators.push(*initiator);
        self.payloads.push(payload.to_vec());
        Ok(CALLBACK_SUCCESS)
    }
}

/// Acknowledges the loan but never approves repayment
#[derive(Debug, Clone)]
pub struct NonRepayingBorrower {
    address: AccountId,
}

impl NonRepayingBorrower {
    pub fn new(address: AccountId) -> Self {
        Self { address }
    }
}

impl FlashBorrower for NonRepayingBorrower {
    fn address(&self) -> AccountId {
        self.address
    }

    fn on_flash_loan(
        &mut self,
        _ctx: &mut LoanContext<'_>,
        _initiator: &AccountId,
        _asset: &AssetId,
        _amount: Amount,
        _fee: Amount,
        _payload: &[u8],
    ) -> LendingResult<CallbackMarker> {
        Ok(CALLBACK_SUCCESS)
    }
}

/// Approves repayment but answers with the wrong marker
#[derive(Debug, Clone)]
pub struct WrongMarkerBorrower {
    address: AccountId,
    marker: CallbackMarker,
}

impl WrongMarkerBorrower {
    pub fn new(address: AccountId, marker: CallbackMarker) -> Self {
        Self { address, marker }
    }
}

impl FlashBorrower for WrongMarkerBorrower {
    fn address(&self) -> AccountId {
        self.address
    }

    fn on_flash_loan(
        &mut self,
        ctx: &mut LoanContext<'_>,
        _initiator: &AccountId,
        asset: &AssetId,
        amount: Amount,
        fee: Amount,
        _payload: &[u8],
    ) -> LendingResult<CallbackMarker> {
        let pool = ctx.pool_address();
        ctx.approve(asset, &pool, amount.saturating_add(fee));
        Ok(self.marker)
    }
}

/// Borrows again from inside its own callback before repaying
#[derive(Debug, Clone)]
pub struct ReentrantBorrower {
    address: AccountId,
    /// Error the nested loan came back with, if it was attempted
    pub nested_result: Option<LendingResult<()>>,
}

impl ReentrantBorrower {
    pub fn new(address: AccountId) -> Self {
        Self {
            address,
            nested_result: None,
        }
    }
}

impl FlashBorrower for ReentrantBorrower {
    fn address(&self) -> AccountId {
        self.address
    }

    fn on_flash_loan(
        &mut self,
        ctx: &mut LoanContext<'_>,
        _initiator: &AccountId,
        asset: &AssetId,
        amount: Amount,
        fee: Amount,
        payload: &[u8],
    ) -> LendingResult<CallbackMarker> {
        let pool = ctx.pool_address();
        ctx.approve(asset, &pool, amount.saturating_add(fee));

        if self.nested_result.is_none() {
            // Marked before re-entering so a nested callback does not recurse again
            self.nested_result = Some(Ok(()));
            let nested = ctx.flash_loan(self, asset, amount, payload);
            self.nested_result = Some(nested.clone());
            nested?;
        }
        Ok(CALLBACK_SUCCESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_marker_hex() {
        assert_eq!(
            CALLBACK_SUCCESS.to_string(),
            "0x439148f0bbc682ca079e46d6e2c2f0c1e3b820f1a291b069d8882abf8cf18dd9"
        );
    }

    #[test]
    fn test_marker_is_not_a_flag() {
        assert_ne!(CallbackMarker([0; 32]), CALLBACK_SUCCESS);
        let mut almost = CALLBACK_SUCCESS.0;
        almost[31] ^= 1;
        assert_ne!(CallbackMarker(almost), CALLBACK_SUCCESS);
    }
}
