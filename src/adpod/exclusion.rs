// src/adpod/exclusion.rs

use std::collections::HashMap;
use std::sync::Arc;

use crate::adpod::bucket::DurationBuckets;
use crate::model::bid::{Bid, BidStatus};
use crate::model::pod::PodSpec;

/// 类目 / 广告主域名的多样性上限（百分比）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExclusionCaps {
    pub category_percent: u32,
    pub advertiser_percent: u32,
}

impl ExclusionCaps {
    pub fn from_spec(spec: &PodSpec) -> Self {
        Self {
            category_percent: spec.category_exclusion_percent,
            advertiser_percent: spec.advertiser_exclusion_percent,
        }
    }

    /// 第一次出现总是允许，之后占比（整数百分比，向下取整）超过上限即拒绝
    fn exceeded(count: usize, percent: u32, total: usize) -> bool {
        if total == 0 {
            return false;
        }
        count > 1 && (count as u64) * 100 / (total as u64) > percent as u64
    }
}

/// **单个时长序列的组装结果**
/// `bids` 为空表示该序列下没有满足多样性约束的组合。
#[derive(Debug, Clone, Default)]
pub struct AssemblyResult {
    pub bids: Vec<Arc<Bid>>,
    pub durations: Vec<i64>,
    pub price: f64,
    pub deal_bid_count: usize,
    pub category_occurrence: HashMap<String, usize>,
    pub domain_occurrence: HashMap<String, usize>,
    pub filtered_bids: HashMap<String, BidStatus>,
}

impl AssemblyResult {
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty()
    }

    pub fn bid_ids(&self) -> Vec<&str> {
        self.bids.iter().map(|b| b.id.as_str()).collect()
    }

    /// deal 数量优先，其次价格，均为严格大于
    pub fn beats(&self, other: &AssemblyResult) -> bool {
        self.deal_bid_count > other.deal_bid_count
            || (self.deal_bid_count == other.deal_bid_count && self.price > other.price)
    }
}

struct Rejection {
    group: usize,
    position: usize,
    status: BidStatus,
}

/// 序列中连续的相同时长合并为一组：(该时长的已排序出价, 需要的数量)
fn group_sequence<'a>(buckets: &'a DurationBuckets, sequence: &[i64]) -> Option<Vec<(&'a [Arc<Bid>], usize)>> {
    let mut groups: Vec<(i64, usize)> = Vec::new();
    for duration in sequence {
        match groups.last_mut() {
            Some((d, count)) if d == duration => *count += 1,
            _ => groups.push((*duration, 1)),
        }
    }
    groups
        .into_iter()
        .map(|(duration, count)| {
            let bids = buckets.get(&duration)?;
            if bids.len() < count {
                return None;
            }
            Some((bids.as_slice(), count))
        })
        .collect()
}

fn evaluate(
    groups: &[(&[Arc<Bid>], usize)],
    indices: &[Vec<usize>],
    total: usize,
    caps: ExclusionCaps,
) -> Result<AssemblyResult, Rejection> {
    let mut result = AssemblyResult {
        bids: Vec::with_capacity(total),
        ..AssemblyResult::default()
    };

    for (group, (bids, _)) in groups.iter().enumerate() {
        for (position, index) in indices[group].iter().enumerate() {
            let bid = &bids[*index];
            result.bids.push(Arc::clone(bid));
            if bid.deal_tier_satisfied {
                result.deal_bid_count += 1;
            }
            result.price += bid.price;

            for category in &bid.categories {
                let count = result.category_occurrence.entry(category.clone()).or_insert(0);
                *count += 1;
                if ExclusionCaps::exceeded(*count, caps.category_percent, total) {
                    return Err(Rejection {
                        group,
                        position,
                        status: BidStatus::CategoryExcluded,
                    });
                }
            }
            for domain in &bid.advertiser_domains {
                let count = result.domain_occurrence.entry(domain.clone()).or_insert(0);
                *count += 1;
                if ExclusionCaps::exceeded(*count, caps.advertiser_percent, total) {
                    return Err(Rejection {
                        group,
                        position,
                        status: BidStatus::DomainExcluded,
                    });
                }
            }
        }
    }
    Ok(result)
}

/// 推进到下一个下标窗口：找到最右侧仍可后移的位置，右侧同组依次紧随，其余组回到开头
fn next_window(groups: &[(&[Arc<Bid>], usize)], indices: &mut [Vec<usize>]) -> bool {
    for group in (0..indices.len()).rev() {
        let available = groups[group].0.len();
        let count = indices[group].len();
        for position in (0..count).rev() {
            if indices[group][position] + 1 <= available - count + position {
                indices[group][position] += 1;
                for next in position + 1..count {
                    indices[group][next] = indices[group][next - 1] + 1;
                }
                for later in indices.iter_mut().skip(group + 1) {
                    for (j, slot) in later.iter_mut().enumerate() {
                        *slot = j;
                    }
                }
                return true;
            }
        }
    }
    false
}

/// **竞争排除**
/// 从价格最高的窗口开始评估，结果不再提升时提前结束；被拒绝的组合中，
/// 截至拒绝点的出价记录排除原因（只记录第一次）。
pub fn evaluate_sequence(buckets: &DurationBuckets, sequence: &[i64], caps: ExclusionCaps) -> AssemblyResult {
    let groups = match group_sequence(buckets, sequence) {
        Some(groups) => groups,
        None => {
            return AssemblyResult {
                durations: sequence.to_vec(),
                ..AssemblyResult::default()
            }
        }
    };

    let total = sequence.len();
    let mut indices: Vec<Vec<usize>> = groups.iter().map(|(_, count)| (0..*count).collect()).collect();
    let mut best: Option<AssemblyResult> = None;
    let mut filtered: HashMap<String, BidStatus> = HashMap::new();

    loop {
        match evaluate(&groups, &indices, total, caps) {
            Ok(candidate) => {
                let improves = best.as_ref().map_or(true, |current| candidate.beats(current));
                if !improves {
                    break;
                }
                best = Some(candidate);
            }
            Err(rejection) => {
                for (group, (bids, _)) in groups.iter().enumerate().take(rejection.group + 1) {
                    for (position, index) in indices[group].iter().enumerate() {
                        if group == rejection.group && position > rejection.position {
                            break;
                        }
                        filtered.entry(bids[*index].id.clone()).or_insert(rejection.status);
                    }
                }
            }
        }

        if !next_window(&groups, &mut indices) {
            break;
        }
    }

    let mut result = best.unwrap_or_default();
    result.durations = sequence.to_vec();
    result.filtered_bids = filtered;
    result
}
