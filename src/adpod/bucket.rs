// src/adpod/bucket.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::model::bid::{Bid, BidStatus};

/// 按时长分组的出价，键升序，每组内先 deal 后价格降序
pub type DurationBuckets = BTreeMap<i64, Vec<Arc<Bid>>>;

/// **按时长分桶**
/// 只保留状态为 Ok、价格与时长均为正的出价；排序稳定，同价保持输入顺序。
pub fn bucket_by_duration(bids: &[Arc<Bid>]) -> DurationBuckets {
    let mut buckets = DurationBuckets::new();
    for bid in bids {
        if bid.status != BidStatus::Ok || bid.price <= 0.0 || bid.duration <= 0 {
            continue;
        }
        buckets.entry(bid.duration).or_default().push(Arc::clone(bid));
    }

    for bucket in buckets.values_mut() {
        bucket.sort_by(|a, b| {
            b.deal_tier_satisfied
                .cmp(&a.deal_tier_satisfied)
                .then_with(|| b.price.total_cmp(&a.price))
        });
    }
    buckets
}

/// 各时长可用的出价数量，顺序与 `DurationBuckets` 的键一致
pub fn availability(buckets: &DurationBuckets) -> Vec<(i64, usize)> {
    buckets.iter().map(|(d, bids)| (*d, bids.len())).collect()
}
