//! Fungible-asset ledger the pool moves funds through
//!
//! The pool only depends on [`AssetLedger`]. [`TokenLedger`] is the in-memory
//! multi-asset implementation the runtime owns; its state is part of the
//! world snapshot, so a rolled-back operation also rolls back its transfers.

use std::collections::HashMap;

use crate::types::{AccountId, Amount, AssetId};

/// Capability set the pool and borrowers need from a token ledger.
///
/// The acting account is passed explicitly. Transfers report rejection with
/// `false` instead of an error; the pool turns that into a hard failure.
pub trait AssetLedger {
    /// Move `amount` of `asset` from `from` to `to`
    fn transfer(&mut self, asset: &AssetId, from: &AccountId, to: &AccountId, amount: Amount) -> bool;

    /// Move `amount` of `asset` from `from` to `to`, spending `spender`'s allowance
    fn transfer_from(
        &mut self,
        asset: &AssetId,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> bool;

    /// Allow `spender` to pull up to `amount` of `owner`'s `asset`
    fn approve(&mut self, asset: &AssetId, owner: &AccountId, spender: &AccountId, amount: Amount) -> bool;

    fn allowance(&self, asset: &AssetId, owner: &AccountId, spender: &AccountId) -> Amount;

    fn balance_of(&self, asset: &AssetId, account: &AccountId) -> Amount;
}

/// In-memory ledger keyed by asset
#[derive(Debug, Clone, Default)]
pub struct TokenLedger {
    balances: HashMap<AssetId, HashMap<AccountId, Amount>>,
    allowances: HashMap<AssetId, HashMap<(AccountId, AccountId), Amount>>,
    supply: HashMap<AssetId, Amount>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create new units of `asset` in `to`'s account. Returns false on supply overflow.
    pub fn mint(&mut self, asset: &AssetId, to: &AccountId, amount: Amount) -> bool {
        let supply = self.supply.get(asset).copied().unwrap_or(0);
        let Some(new_supply) = supply.checked_add(amount) else {
            return false;
        };
        // Balance can never exceed supply, so this cannot overflow
        let balance = self.balance_of(asset, to);
        self.supply.insert(*asset, new_supply);
        self.set_balance(asset, to, balance + amount);
        true
    }

    pub fn total_supply(&self, asset: &AssetId) -> Amount {
        self.supply.get(asset).copied().unwrap_or(0)
    }

    fn set_balance(&mut self, asset: &AssetId, account: &AccountId, amount: Amount) {
        self.balances
            .entry(*asset)
            .or_default()
            .insert(*account, amount);
    }

    fn move_balance(&mut self, asset: &AssetId, from: &AccountId, to: &AccountId, amount: Amount) -> bool {
        let from_balance = self.balance_of(asset, from);
        let Some(remaining) = from_balance.checked_sub(amount) else {
            tracing::debug!(%asset, %from, amount, from_balance, "Transfer rejected: insufficient balance");
            return false;
        };
        if from == to {
            return true;
        }
        let Some(credited) = self.balance_of(asset, to).checked_add(amount) else {
            return false;
        };
        self.set_balance(asset, from, remaining);
        self.set_balance(asset, to, credited);
        true
    }
}

impl AssetLedger for TokenLedger {
    fn transfer(&mut self, asset: &AssetId, from: &AccountId, to: &AccountId, amount: Amount) -> bool {
        self.move_balance(asset, from, to, amount)
    }

    fn transfer_from(
        &mut self,
        asset: &AssetId,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> bool {
        let allowed = self.allowance(asset, from, spender);
        if allowed < amount {
            tracing::debug!(%asset, %from, %spender, amount, allowed, "TransferFrom rejected: allowance too low");
            return false;
        }
        if !self.move_balance(asset, from, to, amount) {
            return false;
        }
        // Amount::MAX is an infinite approval and is never spent down
        if allowed != Amount::MAX {
            self.approve(asset, from, spender, allowed - amount);
        }
        true
    }

    fn approve(&mut self, asset: &AssetId, owner: &AccountId, spender: &AccountId, amount: Amount) -> bool {
        self.allowances
            .entry(*asset)
            .or_default()
            .insert((*owner, *spender), amount);
        true
    }

    fn allowance(&self, asset: &AssetId, owner: &AccountId, spender: &AccountId) -> Amount {
        self.allowances
            .get(asset)
            .and_then(|a| a.get(&(*owner, *spender)))
            .copied()
            .unwrap_or(0)
    }

    fn balance_of(&self, asset: &AssetId, account: &AccountId) -> Amount {
        self.balances
            .get(asset)
            .and_then(|b| b.get(account))
            .copied()
            .unwrap_or(0)
    }
}
