// src/response/builder.rs

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;
use uuid::Uuid;

use crate::adpod::auction::{PodOutcome, POD_SEAT};
use crate::model::bid::{AdPodBid, BidStatus};
use crate::openrtb::response::{Bid, BidResponse, SeatBid};
use crate::response::nbr::{loss_reason, NO_BID_GENERAL_ERROR};
use crate::response::vast::{add_debug_extension, stitch_creatives};

/// Pod 出价的 ext：引用的原始出价及每个出价的状态
#[derive(Serialize, Debug, Clone)]
pub struct PodBidExt {
    pub adpod: AdPodExt,
    pub bidstatus: Vec<BidStatusExt>,
}

#[derive(Serialize, Debug, Clone)]
pub struct AdPodExt {
    pub refbids: Vec<String>,
    pub durations: Vec<i64>,
    pub deals: usize,
}

#[derive(Serialize, Debug, Clone)]
pub struct BidStatusExt {
    pub id: String,
    pub seat: String,
    pub price: f64,
    pub duration: i64,
    pub status: BidStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbr: Option<i32>,
}

/// 响应级 ext：未填充 Pod 的失败原因
#[derive(Serialize, Debug)]
struct ResponseExt {
    errors: BTreeMap<String, String>,
}

fn pod_ext(outcome: &PodOutcome, winner: &AdPodBid) -> PodBidExt {
    PodBidExt {
        adpod: AdPodExt {
            refbids: winner.bid_ids().into_iter().map(str::to_string).collect(),
            durations: winner.durations.clone(),
            deals: winner.deal_bid_count,
        },
        bidstatus: outcome
            .bids
            .iter()
            .map(|bid| {
                let status = outcome.status_of(&bid.id);
                BidStatusExt {
                    id: bid.id.clone(),
                    seat: bid.seat.clone(),
                    price: bid.price,
                    duration: bid.duration,
                    status,
                    nbr: loss_reason(status),
                }
            })
            .collect(),
    }
}

fn pod_bid(outcome: &PodOutcome, winner: &AdPodBid, debug: bool) -> Option<Bid> {
    let Some(mut adm) = stitch_creatives(&winner.bids) else {
        warn!(pod_id = %outcome.pod_id, "no usable creative in winning pod");
        return None;
    };

    let ext = pod_ext(outcome, winner);
    if debug {
        match serde_json::to_string(&ext) {
            Ok(raw) => adm = add_debug_extension(&adm, &raw),
            Err(e) => warn!("failed to encode debug extension: {}", e),
        }
    }
    let ext = match simd_json::serde::to_owned_value(&ext) {
        Ok(value) => Some(Box::new(value)),
        Err(e) => {
            warn!(pod_id = %outcome.pod_id, "failed to encode pod bid ext: {}", e);
            None
        }
    };

    Some(Bid {
        id: Uuid::new_v4().to_string(),
        impid: winner.original_imp_id.clone(),
        price: winner.price,
        adm: Some(adm),
        adomain: Some(winner.advertiser_domains.clone()).filter(|d| !d.is_empty()),
        cat: Some(winner.categories.clone()).filter(|c| !c.is_empty()),
        ext,
        ..Bid::default()
    })
}

/// **构建 Pod 竞价响应**
/// 每个填充的 Pod 输出一个出价，全部放在 `prebid_ctv` seat 下；没有任何 Pod 填充时设置 nbr。
pub fn build_bid_response(request_id: &str, outcomes: &[PodOutcome], debug: bool) -> BidResponse {
    let bids: Vec<Bid> = outcomes
        .iter()
        .filter_map(|outcome| outcome.winner.as_ref().and_then(|winner| pod_bid(outcome, winner, debug)))
        .collect();

    let errors: BTreeMap<String, String> = outcomes
        .iter()
        .filter_map(|outcome| outcome.error.as_ref().map(|e| (outcome.pod_id.clone(), e.to_string())))
        .collect();
    let ext = if errors.is_empty() {
        None
    } else {
        simd_json::serde::to_owned_value(&ResponseExt { errors }).ok().map(Box::new)
    };

    let filled = !bids.is_empty();
    BidResponse {
        id: request_id.to_string(),
        seatbid: if filled {
            vec![SeatBid {
                bid: bids,
                seat: Some(POD_SEAT.to_string()),
                group: Some(0),
            }]
        } else {
            Vec::new()
        },
        bidid: None,
        cur: Some("USD".to_string()),
        nbr: if filled { None } else { Some(NO_BID_GENERAL_ERROR) },
        ext,
    }
}
