// src/response/nbr.rs

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::model::bid::BidStatus;

/// 整个请求未填充
pub const NO_BID_GENERAL_ERROR: i32 = 0;

pub const LOSS_LOST_TO_HIGHER_BID: i32 = 102;
pub const LOSS_CREATIVE_FILTERED: i32 = 200;
pub const LOSS_ADVERTISER_EXCLUSIONS: i32 = 205;
pub const LOSS_CATEGORY_EXCLUSIONS: i32 = 209;

/// **出价状态 → 落选原因**，中标的出价没有落选原因
static LOSS_REASONS: Lazy<HashMap<BidStatus, i32>> = Lazy::new(|| {
    HashMap::from([
        (BidStatus::Ok, LOSS_LOST_TO_HIGHER_BID),
        (BidStatus::CategoryExcluded, LOSS_CATEGORY_EXCLUSIONS),
        (BidStatus::DomainExcluded, LOSS_ADVERTISER_EXCLUSIONS),
        (BidStatus::DurationMismatch, LOSS_CREATIVE_FILTERED),
    ])
});

pub fn loss_reason(status: BidStatus) -> Option<i32> {
    LOSS_REASONS.get(&status).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_losing_status_has_a_reason() {
        assert_eq!(loss_reason(BidStatus::Winning), None);
        assert_eq!(loss_reason(BidStatus::Ok), Some(102));
        assert_eq!(loss_reason(BidStatus::CategoryExcluded), Some(209));
        assert_eq!(loss_reason(BidStatus::DomainExcluded), Some(205));
        assert_eq!(loss_reason(BidStatus::DurationMismatch), Some(200));
    }
}
