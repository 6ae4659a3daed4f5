//! Settlement split of a captured payment between platform, venue and officiant.
//!
//! All arithmetic is integer arithmetic on minor currency units. The officiant
//! share absorbs whatever rounding leaves over, so the three parts always add
//! up to the total.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

const BPS_DENOMINATOR: i128 = 10_000;

/// Commission and split percentages, configured in one place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementPolicy {
    /// Platform commission in basis points of the total (1500 = 15%)
    #[serde(default = "default_platform_commission_bps")]
    pub platform_commission_bps: u32,
    /// Venue share in basis points of what remains after commission (5000 = 50%)
    #[serde(default = "default_venue_share_bps")]
    pub venue_share_bps: u32,
}

fn default_platform_commission_bps() -> u32 {
    1500
}

fn default_venue_share_bps() -> u32 {
    5000
}

impl Default for SettlementPolicy {
    fn default() -> Self {
        Self {
            platform_commission_bps: default_platform_commission_bps(),
            venue_share_bps: default_venue_share_bps(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementSplit {
    pub total_amount: i64,
    pub platform_fee: i64,
    pub venue_share: i64,
    pub officiant_share: i64,
}

impl SettlementPolicy {
    pub fn from_percentages(commission_percent: u32, venue_percent: u32) -> Self {
        Self {
            platform_commission_bps: commission_percent * 100,
            venue_share_bps: venue_percent * 100,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.platform_commission_bps as i128 > BPS_DENOMINATOR {
            bail!(
                "platform_commission_bps must be at most 10000, got {}",
                self.platform_commission_bps
            );
        }
        if self.venue_share_bps as i128 > BPS_DENOMINATOR {
            bail!(
                "venue_share_bps must be at most 10000, got {}",
                self.venue_share_bps
            );
        }
        Ok(())
    }

    /// Split a non-negative total.
    ///
    /// platform_fee = round(total * commission), venue = round(remaining * venue
    /// share), officiant = remaining - venue. Halves round up.
    pub fn split(&self, total_amount: i64) -> SettlementSplit {
        let total = total_amount as i128;
        let platform_fee = round_div(total * self.platform_commission_bps as i128, BPS_DENOMINATOR);
        let remaining = total - platform_fee;
        let venue_share = round_div(remaining * self.venue_share_bps as i128, BPS_DENOMINATOR);
        let officiant_share = remaining - venue_share;

        SettlementSplit {
            total_amount,
            platform_fee: platform_fee as i64,
            venue_share: venue_share as i64,
            officiant_share: officiant_share as i64,
        }
    }
}

fn round_div(numerator: i128, denominator: i128) -> i128 {
    (numerator + denominator / 2).div_euclid(denominator)
}

impl SettlementSplit {
    pub fn is_balanced(&self) -> bool {
        self.platform_fee + self.venue_share + self.officiant_share == self.total_amount
    }
}
