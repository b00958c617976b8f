use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::adpod::auction::PodOutcome;
use crate::adpod::combination::CombinationStats;
use crate::model::bid::BidStatus;
use crate::response::nbr::loss_reason;

/// **Pod 竞价日志**
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PodAuctionLog {
    pub timestamp: String,      // 记录时间
    pub log_type: String,       // 日志类型 "adpod_auction"
    pub request_id: String,
    pub pod_id: String,
    pub profile: String,
    pub slot_count: usize,      // 规划出的广告位数量
    pub bid_count: usize,
    pub status: String,         // "filled" or "unfilled"
    pub error: Option<String>,
    pub winning_bids: Vec<String>,
    pub winning_durations: Vec<i64>,
    pub winning_price: f64,
    pub deal_bid_count: usize,
    pub evaluated: usize,       // 评估过的时长序列数
    pub timed_out: bool,
    pub combinations: Option<CombinationStats>,
    pub elapsed_ms: u128,
    pub bid_log: Vec<PodBidLog>,
}

/// **单个出价的结果**
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PodBidLog {
    pub bid_id: String,
    pub seat: String,
    pub price: f64,
    pub duration: i64,
    pub status: BidStatus,
    pub loss_reason: Option<i32>,
}

impl PodAuctionLog {
    /// **创建 Pod 竞价日志**
    pub fn new(request_id: &str, pod_id: &str, profile: &str) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            log_type: "adpod_auction".to_string(),
            request_id: request_id.to_string(),
            pod_id: pod_id.to_string(),
            profile: profile.to_string(),
            slot_count: 0,
            bid_count: 0,
            status: "unfilled".to_string(), // 默认未填充，后续可更新
            error: None,
            winning_bids: Vec::new(),
            winning_durations: Vec::new(),
            winning_price: 0.0,
            deal_bid_count: 0,
            evaluated: 0,
            timed_out: false,
            combinations: None,
            elapsed_ms: 0,
            bid_log: Vec::new(),
        }
    }

    /// **添加出价结果**
    pub fn add_bid_log(&mut self, bid_id: &str, seat: &str, price: f64, duration: i64, status: BidStatus) {
        self.bid_log.push(PodBidLog {
            bid_id: bid_id.to_string(),
            seat: seat.to_string(),
            price,
            duration,
            status,
            loss_reason: loss_reason(status),
        });
        self.bid_count += 1;
    }

    /// **设置中标 Pod**
    pub fn set_winner(&mut self, bids: Vec<String>, durations: Vec<i64>, price: f64, deals: usize) {
        self.status = "filled".to_string();
        self.winning_bids = bids;
        self.winning_durations = durations;
        self.winning_price = price;
        self.deal_bid_count = deals;
    }

    pub fn from_outcome(request_id: &str, outcome: &PodOutcome) -> Self {
        let mut log = Self::new(request_id, &outcome.pod_id, &outcome.profile);
        log.slot_count = outcome.slots.len();
        log.error = outcome.error.as_ref().map(|e| e.to_string());
        log.evaluated = outcome.evaluated;
        log.timed_out = outcome.timed_out;
        log.combinations = outcome.stats;
        log.elapsed_ms = outcome.elapsed_ms;

        for bid in &outcome.bids {
            log.add_bid_log(&bid.id, &bid.seat, bid.price, bid.duration, outcome.status_of(&bid.id));
        }
        if let Some(winner) = &outcome.winner {
            log.set_winner(
                winner.bid_ids().into_iter().map(str::to_string).collect(),
                winner.durations.clone(),
                winner.price,
                winner.deal_bid_count,
            );
        }
        log
    }
}
