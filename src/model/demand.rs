// src/model/demand.rs

use rand::Rng;
use tracing::warn;

use crate::model::pod::ImpSlotConfig;
use crate::openrtb::request::PodRequest;
use crate::openrtb::response::{Bid, BidExtDetail, PrebidBidExt, SeatBid, VideoBidExt};

const CATEGORIES: [&str; 5] = ["IAB1", "IAB2", "IAB3", "IAB17", "IAB19"];
const DOMAINS: [&str; 6] = [
    "brand-a.com",
    "brand-b.com",
    "brand-c.com",
    "brand-d.com",
    "brand-e.com",
    "brand-f.com",
];

/// 模拟素材，`<Duration>` 与声明时长一致
fn mock_vast(bid_id: &str, duration: i64) -> String {
    format!(
        r#"<VAST version="3.0"><Ad id="{bid_id}"><InLine><AdSystem>Mock Bidder</AdSystem><AdTitle>Mock CTV Ad</AdTitle><Impression><![CDATA[http://bidder-tracker.local/impression?bid={bid_id}]]></Impression><Creatives><Creative><Linear><Duration>00:00:{duration:02}</Duration><MediaFiles><MediaFile delivery="progressive" type="video/mp4" width="1920" height="1080">http://example.com/{bid_id}.mp4</MediaFile></MediaFiles></Linear></Creative></Creatives></InLine></Ad></VAST>"#,
        bid_id = bid_id,
        duration = duration
    )
}

/// 在广告位时长区间内随机取 5 的倍数，区间内没有倍数时取最大时长
fn random_duration(rng: &mut impl Rng, slot: &ImpSlotConfig) -> i64 {
    let low = (slot.min_duration.max(1) + 4) / 5;
    let high = slot.max_duration / 5;
    if low > high {
        return slot.max_duration;
    }
    rng.gen_range(low..=high) * 5
}

fn mock_bid(rng: &mut impl Rng, bid_id: String, slot: &ImpSlotConfig) -> Bid {
    let duration = random_duration(rng, slot);
    let price = (rng.gen_range(1.0..12.0) * 100.0_f64).round() / 100.0;
    let category = CATEGORIES[rng.gen_range(0..CATEGORIES.len())];
    let domain = DOMAINS[rng.gen_range(0..DOMAINS.len())];

    let detail = BidExtDetail {
        prebid: Some(PrebidBidExt {
            video: Some(VideoBidExt {
                duration: Some(duration),
                primary_category: Some(category.to_string()),
            }),
            // 大约一成的出价满足 deal tier
            dealtiersatisfied: rng.gen_bool(0.1),
        }),
    };
    let ext = match simd_json::serde::to_owned_value(&detail) {
        Ok(value) => Some(Box::new(value)),
        Err(e) => {
            warn!(bid_id = %bid_id, "failed to encode mock bid ext: {}", e);
            None
        }
    };

    Bid {
        adm: Some(mock_vast(&bid_id, duration)),
        crid: Some(format!("crid-{}", bid_id)),
        id: bid_id,
        impid: slot.imp_id.clone(),
        price,
        adomain: Some(vec![domain.to_string()]),
        cat: Some(vec![category.to_string()]),
        ext,
        ..Bid::default()
    }
}

/// **生成模拟出价**
/// 每个 bidder 对 Pod 的每个广告位各出 `bids_per_slot` 个价，用于没有真实出价方时演示整个流程。
pub fn synthetic_pod_request(pod_id: &str, profile: &str, slots: &[ImpSlotConfig], bidders: &[&str], bids_per_slot: usize) -> PodRequest {
    let mut rng = rand::thread_rng();
    let seatbid = bidders
        .iter()
        .map(|bidder| SeatBid {
            bid: slots
                .iter()
                .flat_map(|slot| (1..=bids_per_slot).map(move |n| (slot, n)))
                .map(|(slot, n)| mock_bid(&mut rng, format!("{}-{}-{}", bidder, slot.imp_id, n), slot))
                .collect(),
            seat: Some(bidder.to_string()),
            group: Some(0),
        })
        .collect();

    PodRequest {
        id: pod_id.to_string(),
        profile: profile.to_string(),
        seatbid,
    }
}
