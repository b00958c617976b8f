// src/adpod/combination.rs

use serde::{Deserialize, Serialize};

use crate::model::pod::{CombinationOrder, PodSpec};

/// **组合游标**
/// `indices` 为同一长度下的非递减下标序列，指向升序排列的不同时长。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    Fresh,
    At { size: usize, indices: Vec<usize> },
    Exhausted,
}

/// 游标推进所需的静态参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorShape {
    pub distinct: usize,
    pub min_size: usize,
    pub max_size: usize,
    pub order: CombinationOrder,
}

impl CursorShape {
    fn first_size(&self) -> Option<usize> {
        if self.distinct == 0 || self.min_size > self.max_size {
            return None;
        }
        Some(match self.order {
            CombinationOrder::MaxToMin => self.max_size,
            CombinationOrder::MinToMax => self.min_size,
        })
    }

    fn next_size(&self, size: usize) -> Option<usize> {
        match self.order {
            CombinationOrder::MaxToMin if size > self.min_size => Some(size - 1),
            CombinationOrder::MinToMax if size < self.max_size => Some(size + 1),
            _ => None,
        }
    }
}

/// 纯函数：返回游标的下一个位置
///
/// 同一长度内按里程表方式推进：找到最右侧仍可递增的位置，加一后把右侧全部置为同值；
/// 该长度耗尽后切换到下一个长度。
pub fn advance(cursor: &Cursor, shape: &CursorShape) -> Cursor {
    let start_of = |size: usize| Cursor::At {
        size,
        indices: vec![0; size],
    };

    match cursor {
        Cursor::Exhausted => Cursor::Exhausted,
        Cursor::Fresh => shape.first_size().map(start_of).unwrap_or(Cursor::Exhausted),
        Cursor::At { size, indices } => {
            let last = shape.distinct.saturating_sub(1);
            if let Some(pos) = indices.iter().rposition(|i| *i < last) {
                let mut next = indices.clone();
                let value = next[pos] + 1;
                for slot in next.iter_mut().skip(pos) {
                    *slot = value;
                }
                return Cursor::At {
                    size: *size,
                    indices: next,
                };
            }
            shape.next_size(*size).map(start_of).unwrap_or(Cursor::Exhausted)
        }
    }
}

/// 组合生成的诊断计数，不参与流程控制
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinationStats {
    pub generated: u64,
    pub valid: u64,
    pub repeat_rejected: u64,
    pub out_of_range_rejected: u64,
    /// 因总时长超出上限而整段跳过的次数
    #[serde(default)]
    pub pruned: u64,
}

/// **时长组合生成器**
/// 惰性地逐个产出候选时长序列，不预先展开整个组合空间；非线程安全，由单一生产者持有。
#[derive(Debug, Clone)]
pub struct CombinationGenerator {
    durations: Vec<i64>,
    available: Vec<usize>,
    pod_min_duration: i64,
    pod_max_duration: i64,
    requested_sizes: (usize, usize),
    shape: CursorShape,
    cursor: Cursor,
    stats: CombinationStats,
}

impl CombinationGenerator {
    /// `availability` 为 (时长, 可用出价数)，时长会被升序排列并去重
    pub fn new(availability: &[(i64, usize)], spec: &PodSpec, order: CombinationOrder) -> Self {
        let mut pairs: Vec<(i64, usize)> = availability.iter().copied().filter(|(_, n)| *n > 0).collect();
        pairs.sort_by_key(|(d, _)| *d);
        pairs.dedup_by(|next, prev| {
            if next.0 == prev.0 {
                prev.1 += next.1;
                true
            } else {
                false
            }
        });

        let total_available: usize = pairs.iter().map(|(_, n)| *n).sum();
        let min_size = spec.min_ads.max(1);
        // 序列长度不可能超过可用出价总数
        let max_size = spec.max_ads.min(total_available);

        let (durations, available): (Vec<i64>, Vec<usize>) = pairs.into_iter().unzip();
        Self {
            shape: CursorShape {
                distinct: durations.len(),
                min_size,
                max_size,
                order,
            },
            durations,
            available,
            pod_min_duration: spec.pod_min_duration,
            pod_max_duration: spec.pod_max_duration,
            requested_sizes: (spec.min_ads, spec.max_ads),
            cursor: Cursor::Fresh,
            stats: CombinationStats::default(),
        }
    }

    pub fn durations(&self) -> &[i64] {
        &self.durations
    }

    pub fn stats(&self) -> CombinationStats {
        self.stats
    }

    /// 返回下一个合法的时长序列，耗尽时返回 None
    pub fn next_sequence(&mut self) -> Option<Vec<i64>> {
        loop {
            self.cursor = advance(&self.cursor, &self.shape);
            let indices = match &self.cursor {
                Cursor::At { indices, .. } => indices,
                _ => return None,
            };
            self.stats.generated += 1;

            let total: i64 = indices.iter().map(|i| self.durations[*i]).sum();
            let repeated = !self.within_availability(indices);
            if !repeated && total >= self.pod_min_duration && total <= self.pod_max_duration {
                self.stats.valid += 1;
                return Some(indices.iter().map(|i| self.durations[*i]).collect());
            }

            if repeated {
                self.stats.repeat_rejected += 1;
            } else {
                self.stats.out_of_range_rejected += 1;
            }
            if total > self.pod_max_duration {
                if let Some(skip_to) = self.last_over_budget(indices) {
                    self.cursor = skip_to;
                    self.stats.pruned += 1;
                }
            }
        }
    }

    /// 总时长超出上限时，找到最短的前缀 `indices[..=p]`，使得右侧全部取 `indices[p]` 仍然超出；
    /// 同一前缀下之后的元组只会更长，返回这一段中的最后一个元组，下一次推进即越过它们。
    fn last_over_budget(&self, indices: &[usize]) -> Option<Cursor> {
        let size = indices.len();
        let last = self.shape.distinct.checked_sub(1)?;
        let mut prefix = 0i64;
        for (p, index) in indices.iter().enumerate() {
            let lowest = prefix + self.durations[*index] * (size - p) as i64;
            if lowest > self.pod_max_duration {
                if indices[p..].iter().all(|i| *i == last) {
                    return None;
                }
                let mut skipped = indices.to_vec();
                for slot in skipped.iter_mut().skip(p) {
                    *slot = last;
                }
                return Some(Cursor::At { size, indices: skipped });
            }
            prefix += self.durations[*index];
        }
        None
    }

    fn within_availability(&self, indices: &[usize]) -> bool {
        // indices 非递减，相同下标连续出现
        let mut run_start = 0;
        for pos in 1..=indices.len() {
            if pos == indices.len() || indices[pos] != indices[run_start] {
                if pos - run_start > self.available[indices[run_start]] {
                    return false;
                }
                run_start = pos;
            }
        }
        true
    }

    /// 组合空间大小 `Σ C(r+n-1, r)`，r ∈ [minAds, maxAds]；溢出时返回 None
    pub fn expected_combinations(&self) -> Option<u64> {
        let n = self.durations.len() as u128;
        let (min_ads, max_ads) = self.requested_sizes;
        if n == 0 || min_ads > max_ads {
            return Some(0);
        }
        let mut total: u128 = 0;
        for r in min_ads.max(1)..=max_ads {
            total = total.checked_add(multiset_coefficient(n, r as u128)?)?;
        }
        u64::try_from(total).ok()
    }
}

impl Iterator for CombinationGenerator {
    type Item = Vec<i64>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_sequence()
    }
}

/// `C(r+n-1, r)`，逐步相乘相除，每一步都是整数
fn multiset_coefficient(n: u128, r: u128) -> Option<u128> {
    let mut result: u128 = 1;
    for i in 1..=r {
        result = result.checked_mul(n - 1 + i)? / i;
    }
    Some(result)
}
