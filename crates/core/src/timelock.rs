//! Multi-admin, time-locked confirmation state machine
//!
//! A privileged action is authorized only when the cooldown since the last
//! authorized action has elapsed, the caller holds a live confirmation and a
//! quorum of distinct roster members hold live confirmations. A successful
//! authorization consumes the quorum: every flag is cleared and the cooldown
//! clock restarts.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use crate::error::{LendingError, LendingResult};
use crate::types::AccountId;

/// Whether a given caller could execute a privileged action right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeLockState {
    Locked,
    Armed,
}

#[derive(Debug, Clone)]
pub struct ConfirmationTimeLock {
    /// Roster in construction order; quorum counting walks this
    admins: Vec<AccountId>,
    roster: HashSet<AccountId>,
    required_confirmations: usize,
    cooldown: Duration,
    last_execution: DateTime<Utc>,
    confirmed: HashSet<AccountId>,
}

impl ConfirmationTimeLock {
    /// Build the lock with its cooldown clock starting at `now`
    pub fn new(
        admins: Vec<AccountId>,
        required_confirmations: usize,
        cooldown: Duration,
        now: DateTime<Utc>,
    ) -> LendingResult<Self> {
        if admins.is_empty() {
            return Err(LendingError::EmptyAdminRoster);
        }
        if required_confirmations > admins.len() {
            return Err(LendingError::RequiredConfirmationsExceedNumberOfAdmins {
                required: required_confirmations,
                admins: admins.len(),
            });
        }

        let mut roster = HashSet::with_capacity(admins.len());
        for admin in &admins {
            if !roster.insert(*admin) {
                return Err(LendingError::DuplicateAdmin(admin.to_string()));
            }
        }

        Ok(Self {
            admins,
            roster,
            required_confirmations,
            cooldown,
            last_execution: now,
            confirmed: HashSet::new(),
        })
    }

    pub fn admins(&self) -> &[AccountId] {
        &self.admins
    }

    pub fn is_admin(&self, account: &AccountId) -> bool {
        self.roster.contains(account)
    }

    pub fn required_confirmations(&self) -> usize {
        self.required_confirmations
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn last_execution(&self) -> DateTime<Utc> {
        self.last_execution
    }

    /// Earliest timestamp at which the next privileged action may run
    pub fn unlocks_at(&self) -> DateTime<Utc> {
        self.last_execution + self.cooldown
    }

    /// Record the caller's confirmation. Repeated confirmations are no-ops.
    pub fn confirm(&mut self, caller: &AccountId) -> LendingResult<()> {
        if !self.is_admin(caller) {
            return Err(LendingError::NotAnAdmin);
        }
        self.confirmed.insert(*caller);
        Ok(())
    }

    pub fn is_confirmed(&self, admin: &AccountId) -> bool {
        self.confirmed.contains(admin)
    }

    /// Number of roster members currently holding a live confirmation
    pub fn confirmation_count(&self) -> usize {
        self.confirmed.len()
    }

    /// Walks the roster in construction order and stops as soon as the
    /// running count reaches the quorum.
    pub fn quorum_reached(&self) -> bool {
        let mut count = 0;
        for admin in &self.admins {
            if count >= self.required_confirmations {
                return true;
            }
            if self.confirmed.contains(admin) {
                count += 1;
            }
        }
        count >= self.required_confirmations
    }

    pub fn state(&self, caller: &AccountId, now: DateTime<Utc>) -> TimeLockState {
        match self.check(caller, now) {
            Ok(()) => TimeLockState::Armed,
            Err(_) => TimeLockState::Locked,
        }
    }

    /// Run the authorization checks without consuming anything.
    ///
    /// Order: cooldown, caller confirmation, quorum.
    pub fn check(&self, caller: &AccountId, now: DateTime<Utc>) -> LendingResult<()> {
        let unlocks_at = self.unlocks_at();
        if now < unlocks_at {
            return Err(LendingError::TimeLockNotExpired {
                remaining_secs: ceil_seconds(unlocks_at - now),
            });
        }
        if !self.is_confirmed(caller) {
            return Err(LendingError::AdminNotConfirmed);
        }
        if !self.quorum_reached() {
            return Err(LendingError::NotEnoughAdminsConfirmed {
                confirmed: self.confirmation_count(),
                required: self.required_confirmations,
            });
        }
        Ok(())
    }

    /// Authorize one privileged action, then reset every confirmation and
    /// restart the cooldown clock at `now`.
    pub fn authorize(&mut self, caller: &AccountId, now: DateTime<Utc>) -> LendingResult<()> {
        self.check(caller, now)?;
        self.confirmed.clear();
        self.last_execution = now;
        Ok(())
    }
}

/// Whole seconds in `d`, rounded up, so a closed lock never reports zero
fn ceil_seconds(d: Duration) -> i64 {
    let secs = d.num_seconds();
    if d > Duration::seconds(secs) {
        secs + 1
    } else {
        secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::pubkey::Pubkey;

    fn genesis() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn roster(n: usize) -> Vec<AccountId> {
        (0..n).map(|_| Pubkey::new_unique()).collect()
    }

    fn lock_with(admins: &[AccountId], required: usize) -> ConfirmationTimeLock {
        ConfirmationTimeLock::new(admins.to_vec(), required, Duration::days(1), genesis()).unwrap()
    }

    #[test]
    fn test_required_exceeding_roster_fails() {
        let err = ConfirmationTimeLock::new(roster(3), 4, Duration::days(1), genesis()).unwrap_err();
        assert_eq!(
            err,
            LendingError::RequiredConfirmationsExceedNumberOfAdmins {
                required: 4,
                admins: 3
            }
        );
    }

    #[test]
    fn test_empty_roster_fails() {
        let err = ConfirmationTimeLock::new(Vec::new(), 0, Duration::days(1), genesis()).unwrap_err();
        assert_eq!(err, LendingError::EmptyAdminRoster);
    }

    #[test]
    fn test_remaining_time_rounds_up() {
        let admins = roster(1);
        let lock = lock_with(&admins, 1);
        let almost = genesis() + Duration::days(1) - Duration::milliseconds(1);

        assert_eq!(
            lock.check(&admins[0], almost).unwrap_err(),
            LendingError::TimeLockNotExpired { remaining_secs: 1 }
        );
        assert_eq!(
            lock.check(&admins[0], genesis() + Duration::hours(23)).unwrap_err(),
            LendingError::TimeLockNotExpired {
                remaining_secs: 3_600
            }
        );
    }

    #[test]
    fn test_duplicate_admin_fails() {
        let a = Pubkey::new_unique();
        let err = ConfirmationTimeLock::new(vec![a, a], 1, Duration::days(1), genesis()).unwrap_err();
        assert!(matches!(err, LendingError::DuplicateAdmin(_)));
    }

    #[test]
    fn test_confirm_rejects_outsiders() {
        let admins = roster(3);
        let mut lock = lock_with(&admins, 2);

        assert_eq!(
            lock.confirm(&Pubkey::new_unique()).unwrap_err(),
            LendingError::NotAnAdmin
        );
        assert_eq!(lock.confirmation_count(), 0);
    }

    #[test]
    fn test_confirm_is_idempotent() {
        let admins = roster(3);
        let mut lock = lock_with(&admins, 2);

        lock.confirm(&admins[0]).unwrap();
        lock.confirm(&admins[0]).unwrap();
        assert_eq!(lock.confirmation_count(), 1);
        assert!(!lock.quorum_reached());
    }

    #[test]
    fn test_cooldown_checked_first() {
        let admins = roster(3);
        let mut lock = lock_with(&admins, 2);
        lock.confirm(&admins[0]).unwrap();
        lock.confirm(&admins[1]).unwrap();

        let err = lock.authorize(&admins[0], genesis()).unwrap_err();
        assert_eq!(
            err,
            LendingError::TimeLockNotExpired {
                remaining_secs: 86_400
            }
        );
        // A rejected attempt leaves confirmations in place
        assert_eq!(lock.confirmation_count(), 2);
    }

    #[test]
    fn test_unconfirmed_caller_rejected() {
        let admins = roster(3);
        let mut lock = lock_with(&admins, 2);
        lock.confirm(&admins[0]).unwrap();
        lock.confirm(&admins[1]).unwrap();

        let later = genesis() + Duration::days(1);
        assert_eq!(
            lock.authorize(&admins[2], later).unwrap_err(),
            LendingError::AdminNotConfirmed
        );
    }

    #[test]
    fn test_quorum_not_met() {
        let admins = roster(3);
        let mut lock = lock_with(&admins, 2);
        lock.confirm(&admins[2]).unwrap();

        let later = genesis() + Duration::days(1);
        assert_eq!(
            lock.authorize(&admins[2], later).unwrap_err(),
            LendingError::NotEnoughAdminsConfirmed {
                confirmed: 1,
                required: 2
            }
        );
    }

    #[test]
    fn test_authorize_consumes_quorum() {
        let admins = roster(3);
        let mut lock = lock_with(&admins, 2);
        lock.confirm(&admins[0]).unwrap();
        lock.confirm(&admins[2]).unwrap();

        let later = genesis() + Duration::days(1);
        assert_eq!(lock.state(&admins[2], later), TimeLockState::Armed);
        lock.authorize(&admins[2], later).unwrap();

        assert_eq!(lock.confirmation_count(), 0);
        assert!(admins.iter().all(|a| !lock.is_confirmed(a)));
        assert_eq!(lock.last_execution(), later);
        assert_eq!(lock.unlocks_at(), later + Duration::days(1));
        assert_eq!(lock.state(&admins[2], later), TimeLockState::Locked);
    }

    #[test]
    fn test_repeat_without_reconfirm_fails() {
        let admins = roster(2);
        let mut lock = lock_with(&admins, 2);
        lock.confirm(&admins[0]).unwrap();
        lock.confirm(&admins[1]).unwrap();

        let t1 = genesis() + Duration::days(1);
        lock.authorize(&admins[0], t1).unwrap();

        let t2 = t1 + Duration::days(1);
        assert_eq!(
            lock.authorize(&admins[0], t2).unwrap_err(),
            LendingError::AdminNotConfirmed
        );
    }

    #[test]
    fn test_quorum_independent_of_which_members() {
        let admins = roster(5);
        for pair in [(0, 1), (3, 4), (0, 4), (2, 3)] {
            let mut lock = lock_with(&admins, 2);
            lock.confirm(&admins[pair.0]).unwrap();
            lock.confirm(&admins[pair.1]).unwrap();
            assert!(lock.quorum_reached(), "pair {:?} should reach quorum", pair);
        }
    }

    #[test]
    fn test_zero_quorum_still_requires_confirmed_caller() {
        let admins = roster(2);
        let mut lock = lock_with(&admins, 0);
        let later = genesis() + Duration::days(1);

        assert!(lock.quorum_reached());
        assert_eq!(
            lock.authorize(&admins[0], later).unwrap_err(),
            LendingError::AdminNotConfirmed
        );
        lock.confirm(&admins[0]).unwrap();
        assert!(lock.authorize(&admins[0], later).is_ok());
    }
}
