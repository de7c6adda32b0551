//! Error types for the flash lending core
//!
//! Every failure is a named condition surfaced to the caller. A failing
//! operation is rolled back by the runtime, so no variant ever describes a
//! partially applied state change.

use thiserror::Error;

/// Main error type for pool, governance and ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LendingError {
    // ── Authorization Errors ────────────────────────────────────────
    #[error("Unsupported currency: asset is not on the lending allow-list")]
    UnsupportedCurrency,

    #[error("Reentrant call: a guarded operation is already in progress")]
    ReentrantCall,

    #[error("Caller is not an admin")]
    NotAnAdmin,

    #[error("Admin has not confirmed the pending action")]
    AdminNotConfirmed,

    #[error("Not enough admins confirmed: {confirmed} of {required} required")]
    NotEnoughAdminsConfirmed { confirmed: usize, required: usize },

    #[error("Time lock not expired: {remaining_secs}s remaining")]
    TimeLockNotExpired { remaining_secs: i64 },

    // ── Protocol Errors ─────────────────────────────────────────────
    #[error("Transfer of loan principal to the receiver failed")]
    TransferFailed,

    #[error("Flash loan callback did not return the success marker")]
    CallbackFailed,

    #[error("Repayment of principal plus fee failed")]
    RepayFailed,

    // ── Arithmetic Errors ───────────────────────────────────────────
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    // ── Construction Errors ─────────────────────────────────────────
    #[error("Required confirmations ({required}) exceed number of admins ({admins})")]
    RequiredConfirmationsExceedNumberOfAdmins { required: usize, admins: usize },

    #[error("Admin roster is empty")]
    EmptyAdminRoster,

    #[error("Duplicate admin in roster: {0}")]
    DuplicateAdmin(String),

    // ── Configuration Errors ────────────────────────────────────────
    #[error("Configuration error: {0}")]
    Config(String),
}

// ── Classification ──────────────────────────────────────────────────

/// Failure families, used for logging and by callers deciding what to fix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The caller is not allowed to do this right now
    Authorization,
    /// A step of the borrow-callback-repay protocol was rejected
    Protocol,
    /// Checked arithmetic failed
    Arithmetic,
    /// The pool or its governance could not be built
    Construction,
}

impl LendingError {
    /// Returns the failure family of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            LendingError::UnsupportedCurrency
            | LendingError::ReentrantCall
            | LendingError::NotAnAdmin
            | LendingError::AdminNotConfirmed
            | LendingError::NotEnoughAdminsConfirmed { .. }
            | LendingError::TimeLockNotExpired { .. } => ErrorCategory::Authorization,
            LendingError::TransferFailed
            | LendingError::CallbackFailed
            | LendingError::RepayFailed => ErrorCategory::Protocol,
            LendingError::ArithmeticOverflow => ErrorCategory::Arithmetic,
            LendingError::RequiredConfirmationsExceedNumberOfAdmins { .. }
            | LendingError::EmptyAdminRoster
            | LendingError::DuplicateAdmin(_)
            | LendingError::Config(_) => ErrorCategory::Construction,
        }
    }

    /// Returns true if the caller lacked permission for the operation
    pub fn is_authorization(&self) -> bool {
        self.category() == ErrorCategory::Authorization
    }

    /// Returns true if a borrow-callback-repay step was rejected
    pub fn is_protocol(&self) -> bool {
        self.category() == ErrorCategory::Protocol
    }
}

/// Result type alias for lending operations
pub type LendingResult<T> = Result<T, LendingError>;
