// src/planner/duration_ranges.rs

use crate::model::pod::{DurationMatchingPolicy, PlannerAlgorithm, SlotRange};
use crate::planner::SlotPlanner;

/// **按广告服务器时长列表规划**
/// 仅保留落在 `[slot_min, slot_max]` 内的时长，不足 `max_ads` 时循环补齐。
pub struct ByDurationRanges {
    policy: Option<DurationMatchingPolicy>,
    durations: Vec<i64>,
    max_ads: usize,
    slot_min: i64,
    slot_max: i64,
}

impl ByDurationRanges {
    pub fn new(
        durations: &[i64],
        policy: Option<DurationMatchingPolicy>,
        max_ads: usize,
        slot_min: i64,
        slot_max: i64,
    ) -> Self {
        Self {
            policy,
            durations: durations.to_vec(),
            max_ads,
            slot_min,
            slot_max,
        }
    }
}

impl SlotPlanner for ByDurationRanges {
    fn algorithm(&self) -> PlannerAlgorithm {
        PlannerAlgorithm::ByDurationRanges
    }

    fn plan(&self) -> Vec<SlotRange> {
        let valid: Vec<i64> = self
            .durations
            .iter()
            .copied()
            .filter(|d| *d >= self.slot_min && *d <= self.slot_max)
            .collect();
        if valid.is_empty() {
            return Vec::new();
        }

        // roundup：所有广告位的最小时长取有效时长中的最小值
        let roundup_min = match self.policy {
            Some(DurationMatchingPolicy::Roundup) => valid.iter().copied().min(),
            _ => None,
        };
        let mut slots: Vec<SlotRange> = valid
            .iter()
            .map(|d| SlotRange::new(roundup_min.unwrap_or(*d), *d))
            .collect();

        let target = self.max_ads.max(valid.len());
        let mut i = 0;
        while slots.len() < target {
            slots.push(slots[i]);
            i += 1;
        }
        slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_policy_uses_duration_as_min_and_max() {
        let planner = ByDurationRanges::new(&[5, 15, 45], Some(DurationMatchingPolicy::Exact), 2, 5, 30);
        assert_eq!(planner.plan(), vec![SlotRange::new(5, 5), SlotRange::new(15, 15)]);
    }

    #[test]
    fn roundup_policy_uses_smallest_valid_duration() {
        let planner = ByDurationRanges::new(&[30, 15, 20], Some(DurationMatchingPolicy::Roundup), 3, 10, 30);
        assert_eq!(
            planner.plan(),
            vec![SlotRange::new(15, 30), SlotRange::new(15, 15), SlotRange::new(15, 20)]
        );
    }

    #[test]
    fn short_lists_are_extended_cyclically() {
        let planner = ByDurationRanges::new(&[10, 20], Some(DurationMatchingPolicy::Exact), 5, 5, 30);
        let plan = planner.plan();
        let maxes: Vec<i64> = plan.iter().map(|s| s.max_duration).collect();
        assert_eq!(maxes, vec![10, 20, 10, 20, 10]);
    }

    #[test]
    fn nothing_within_slot_range() {
        let planner = ByDurationRanges::new(&[60, 90], Some(DurationMatchingPolicy::Exact), 3, 5, 30);
        assert!(planner.plan().is_empty());
    }
}
