//! Configuration module for the lending pool

use std::env;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::error::{LendingError, LendingResult};
use crate::pool::PoolParams;
use crate::types::{AccountId, FEE_DENOMINATOR};

/// Pool deployment configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Flash loan fee in parts per 10,000 (10 = 0.1%)
    pub fee_rate_bps: u64,
    /// Minimum delay between privileged actions, in seconds
    pub cooldown_seconds: i64,
    /// Base58 admin account ids, in quorum counting order
    pub admins: Vec<String>,
    /// Distinct admin confirmations needed per privileged action
    pub required_confirmations: usize,
    /// JSONL file receiving committed pool events
    pub audit_log_path: String,
}

impl PoolConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> LendingResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> LendingResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            fee_rate_bps: parse_var(&lookup, "FEE_RATE_BPS", defaults.fee_rate_bps)?,
            cooldown_seconds: parse_var(&lookup, "COOLDOWN_SECONDS", defaults.cooldown_seconds)?,
            admins: lookup("ADMINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            required_confirmations: parse_var(
                &lookup,
                "REQUIRED_CONFIRMATIONS",
                defaults.required_confirmations,
            )?,
            audit_log_path: lookup("AUDIT_LOG_PATH").unwrap_or(defaults.audit_log_path),
        })
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.admins.is_empty() {
            return Err("ADMINS must list at least one admin".to_string());
        }
        if self.required_confirmations == 0 {
            return Err("REQUIRED_CONFIRMATIONS must be at least 1".to_string());
        }
        if self.required_confirmations > self.admins.len() {
            return Err(format!(
                "REQUIRED_CONFIRMATIONS ({}) exceeds number of admins ({})",
                self.required_confirmations,
                self.admins.len()
            ));
        }
        if u128::from(self.fee_rate_bps) > FEE_DENOMINATOR {
            return Err(format!(
                "FEE_RATE_BPS must be at most {} (got {})",
                FEE_DENOMINATOR, self.fee_rate_bps
            ));
        }
        if self.cooldown_seconds < 0 {
            return Err("COOLDOWN_SECONDS must not be negative".to_string());
        }
        Ok(())
    }

    /// Parse the admin roster
    pub fn admin_ids(&self) -> LendingResult<Vec<AccountId>> {
        self.admins
            .iter()
            .map(|s| {
                Pubkey::from_str(s)
                    .map_err(|e| LendingError::Config(format!("invalid admin id {}: {}", s, e)))
            })
            .collect()
    }

    pub fn cooldown(&self) -> Duration {
        Duration::seconds(self.cooldown_seconds)
    }

    /// Validate and convert into pool construction parameters
    pub fn to_params(&self) -> LendingResult<PoolParams> {
        self.validate().map_err(LendingError::Config)?;
        Ok(PoolParams {
            fee_rate_bps: self.fee_rate_bps,
            cooldown: self.cooldown(),
            admins: self.admin_ids()?,
            required_confirmations: self.required_confirmations,
        })
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            fee_rate_bps: 10,
            cooldown_seconds: 86_400,
            admins: Vec::new(),
            required_confirmations: 2,
            audit_log_path: "logs/flashlend_audit.jsonl".to_string(),
        }
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> LendingResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| LendingError::Config(format!("{}={:?}: {}", key, raw, e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = PoolConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, PoolConfig::default());
        assert_eq!(config.cooldown(), Duration::days(1));
    }

    #[test]
    fn test_parses_roster_and_numbers() {
        let (a, b) = (Pubkey::new_unique(), Pubkey::new_unique());
        let admins = format!("{}, {},", a, b);
        let config = PoolConfig::from_lookup(lookup_from(&[
            ("FEE_RATE_BPS", "9"),
            ("COOLDOWN_SECONDS", "60"),
            ("ADMINS", admins.as_str()),
            ("REQUIRED_CONFIRMATIONS", "1"),
        ]))
        .unwrap();

        assert_eq!(config.fee_rate_bps, 9);
        assert_eq!(config.admins.len(), 2);

        let params = config.to_params().unwrap();
        assert_eq!(params.admins, vec![a, b]);
        assert_eq!(params.cooldown, Duration::seconds(60));
        assert_eq!(params.required_confirmations, 1);
    }

    #[test]
    fn test_bad_number_is_an_error() {
        let err = PoolConfig::from_lookup(lookup_from(&[("FEE_RATE_BPS", "ten")])).unwrap_err();
        assert!(matches!(err, LendingError::Config(msg) if msg.contains("FEE_RATE_BPS")));
    }

    #[test]
    fn test_validation_rules() {
        let mut config = PoolConfig {
            admins: vec![Pubkey::new_unique().to_string()],
            required_confirmations: 2,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.required_confirmations = 0;
        assert!(config.validate().is_err());

        config.required_confirmations = 1;
        assert!(config.validate().is_ok());

        config.fee_rate_bps = 10_001;
        assert!(config.validate().is_err());

        config.fee_rate_bps = 10;
        config.cooldown_seconds = -1;
        assert!(config.validate().is_err());

        config.admins.clear();
        config.cooldown_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_admin_id() {
        let config = PoolConfig {
            admins: vec!["not-a-key".to_string()],
            required_confirmations: 1,
            ..Default::default()
        };
        assert!(matches!(config.to_params(), Err(LendingError::Config(_))));
    }
}
