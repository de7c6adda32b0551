#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use flashlend_core::{AccountId, AssetId, PoolParams, Runtime};
use solana_sdk::pubkey::Pubkey;

pub const FEE_RATE_BPS: u64 = 10;
pub const POOL_LIQUIDITY: u128 = 1_000_000;

pub struct Deployment {
    pub runtime: Runtime,
    pub admins: [AccountId; 3],
    pub asset: AssetId,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn genesis() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

/// Roster {A, B, C}, quorum 2, cooldown 1 day, fee 10 bps, nothing listed
pub fn deploy() -> Deployment {
    init_tracing();
    let admins = [Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique()];
    let params = PoolParams {
        fee_rate_bps: FEE_RATE_BPS,
        cooldown: Duration::days(1),
        admins: admins.to_vec(),
        required_confirmations: 2,
    };

    Deployment {
        runtime: Runtime::new(params, genesis()).unwrap(),
        admins,
        asset: Pubkey::new_unique(),
    }
}

/// Same as [`deploy`], with `asset` listed and the pool funded
pub fn deploy_listed() -> Deployment {
    let mut d = deploy();
    d.runtime.advance(Duration::days(1));
    d.runtime.confirm(&d.admins[0]).unwrap();
    d.runtime.confirm(&d.admins[1]).unwrap();
    d.runtime.add_supported_token(&d.admins[1], &d.asset).unwrap();

    let pool = d.runtime.pool_address();
    assert!(d.runtime.mint(&d.asset, &pool, POOL_LIQUIDITY));
    d
}
