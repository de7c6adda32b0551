//! Shared identifier and amount types

use solana_sdk::pubkey::Pubkey;

/// Account identity: admins, borrowers and the pool itself
pub type AccountId = Pubkey;

/// Asset identity, the mint of the lendable token
pub type AssetId = Pubkey;

/// Unsigned token amount
pub type Amount = u128;

/// Fee scale: a fee rate of `v` charges `v / FEE_DENOMINATOR` of the amount
pub const FEE_DENOMINATOR: Amount = 10_000;

/// Serde adapter writing account ids as base58 strings
pub mod serde_pubkey {
    use std::str::FromStr;

    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;

    pub fn serialize<S: Serializer>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(key)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pubkey, D::Error> {
        let s = String::deserialize(deserializer)?;
        Pubkey::from_str(&s).map_err(D::Error::custom)
    }
}
