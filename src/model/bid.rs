// src/model/bid.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::convert::TryFrom;
use std::sync::Arc;

/// **竞价状态**
/// 线上编码固定为 0..=4
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(try_from = "u8", into = "u8")]
pub enum BidStatus {
    Ok = 0,
    Winning = 1,
    CategoryExcluded = 2,
    DomainExcluded = 3,
    DurationMismatch = 4,
}

impl BidStatus {
    /// 状态只会从 Ok 升级为具体原因，已确定的状态不会被覆盖
    pub fn escalate(self, other: BidStatus) -> BidStatus {
        match self {
            BidStatus::Ok => other,
            decided => decided,
        }
    }
}

impl TryFrom<u8> for BidStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(BidStatus::Ok),
            1 => Ok(BidStatus::Winning),
            2 => Ok(BidStatus::CategoryExcluded),
            3 => Ok(BidStatus::DomainExcluded),
            4 => Ok(BidStatus::DurationMismatch),
            _ => Err(format!("Invalid value for BidStatus: {}", value)),
        }
    }
}

impl From<BidStatus> for u8 {
    fn from(status: BidStatus) -> Self {
        status as u8
    }
}

/// 参与 Pod 组装的单个出价，构建后只读，以 `Arc<Bid>` 共享
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Bid {
    pub id: String,
    pub imp_id: String,
    pub price: f64,
    pub duration: i64,
    pub categories: Vec<String>,
    pub advertiser_domains: Vec<String>,
    pub deal_tier_satisfied: bool,
    pub seat: String,
    /// 素材（VAST XML 或 URL）
    pub creative: Option<String>,
    pub status: BidStatus,
}

/// **最终的 Pod 出价**
#[derive(Debug, Clone)]
pub struct AdPodBid {
    pub bids: Vec<Arc<Bid>>,
    pub durations: Vec<i64>,
    pub price: f64,
    pub deal_bid_count: usize,
    pub categories: Vec<String>,
    pub advertiser_domains: Vec<String>,
    pub original_imp_id: String,
    pub seat_name: String,
}

impl AdPodBid {
    /// 类目与广告主域名去重并排序，保证输出稳定
    pub fn new(bids: Vec<Arc<Bid>>, durations: Vec<i64>, original_imp_id: &str, seat_name: &str) -> Self {
        let price = bids.iter().map(|b| b.price).sum();
        let deal_bid_count = bids.iter().filter(|b| b.deal_tier_satisfied).count();
        let categories: BTreeSet<&String> = bids.iter().flat_map(|b| b.categories.iter()).collect();
        let domains: BTreeSet<&String> = bids.iter().flat_map(|b| b.advertiser_domains.iter()).collect();
        Self {
            durations,
            price,
            deal_bid_count,
            categories: categories.into_iter().cloned().collect(),
            advertiser_domains: domains.into_iter().cloned().collect(),
            original_imp_id: original_imp_id.to_string(),
            seat_name: seat_name.to_string(),
            bids,
        }
    }

    pub fn bid_ids(&self) -> Vec<&str> {
        self.bids.iter().map(|b| b.id.as_str()).collect()
    }
}

#[cfg(test)]
pub(crate) fn test_bid(id: &str, duration: i64, price: f64) -> Bid {
    Bid {
        id: id.to_string(),
        imp_id: "pod_1".to_string(),
        price,
        duration,
        categories: Vec::new(),
        advertiser_domains: Vec::new(),
        deal_tier_satisfied: false,
        seat: "bidder".to_string(),
        creative: None,
        status: BidStatus::Ok,
    }
}
