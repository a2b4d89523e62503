//! Expected payout of a distribution
//!
//! Mirrors the program's arithmetic so the gateway can log the expected
//! outcome and the mock ledger can apply it: every share is
//! `floor(amount * bps / 10_000)` and the agent receives the remainder.

use crate::accounts::{RevenueSplit, MAX_BPS};
use crate::{Result, SettlementError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SplitBreakdown {
    pub agent: u64,
    pub platform: u64,
    pub referrer: u64,
    pub reserve: u64,
    pub protocol_fee: u64,
}

impl SplitBreakdown {
    pub fn compute(amount: u64, split: &RevenueSplit, protocol_fee_bps: u16) -> Result<Self> {
        let total_bps = split.beneficiary_bps() + protocol_fee_bps as u32;
        if total_bps > MAX_BPS as u32 {
            return Err(SettlementError::validation(
                "split_config",
                format!("shares total {} bps, above {}", total_bps, MAX_BPS),
            ));
        }

        let platform = share(amount, split.platform_bps);
        let referrer = share(amount, split.referrer_bps);
        let reserve = share(amount, split.reserve_bps);
        let protocol_fee = share(amount, protocol_fee_bps);
        // total_bps <= 10_000 so the shares never exceed amount
        let agent = amount - platform - referrer - reserve - protocol_fee;

        Ok(Self {
            agent,
            platform,
            referrer,
            reserve,
            protocol_fee,
        })
    }

    pub fn total(&self) -> u64 {
        self.agent + self.platform + self.referrer + self.reserve + self.protocol_fee
    }
}

fn share(amount: u64, bps: u16) -> u64 {
    (amount as u128 * bps as u128 / MAX_BPS as u128) as u64
}
