// src/planner/min_max.rs

use std::collections::HashMap;
use std::thread;
use tracing::{debug, warn};

use crate::model::pod::{PlannerAlgorithm, PodSpec, SlotRange};
use crate::planner::generator::SlotGenerator;
use crate::planner::SlotPlanner;

/// **MinMax 规划（默认算法）**
/// 以五组参数并发计算，再按每种时长区间的最大出现次数合并。
pub struct MinMax {
    spec: PodSpec,
    variations: Vec<SlotGenerator>,
}

impl MinMax {
    pub fn new(spec: &PodSpec) -> Self {
        let (pod_min, pod_max) = (spec.pod_min_duration, spec.pod_max_duration);
        let (min_ads, max_ads) = (spec.min_ads, spec.max_ads);
        let variation = |pod_lo: i64, pod_hi: i64, ads_lo: usize, ads_hi: usize| {
            SlotGenerator::new(
                pod_lo,
                pod_hi,
                spec.slot_min_duration,
                spec.slot_max_duration,
                ads_lo,
                ads_hi,
            )
        };

        let variations = vec![
            variation(pod_min, pod_max, min_ads, max_ads),
            variation(pod_max, pod_max, max_ads, max_ads),
            variation(pod_max, pod_max, min_ads, min_ads),
            variation(pod_min, pod_min, max_ads, max_ads),
            variation(pod_min, pod_min, min_ads, min_ads),
        ];
        Self {
            spec: spec.clone(),
            variations,
        }
    }

    /// 并发执行各组参数，结果按参数顺序返回
    fn run_variations(&self) -> Vec<Vec<SlotRange>> {
        thread::scope(|scope| {
            let handles: Vec<_> = self
                .variations
                .iter()
                .map(|generator| scope.spawn(move || generator.allocate().slots))
                .collect();

            handles
                .into_iter()
                .enumerate()
                .map(|(index, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        warn!(variation = index, "slot variation panicked");
                        Vec::new()
                    })
                })
                .collect()
        })
    }

    fn apply_min_duration(&self, slots: &mut [SlotRange]) {
        let spec = &self.spec;
        if spec.min_ads == 0 {
            return;
        }
        let min_duration = (spec.pod_min_duration as f64 / spec.min_ads as f64).round() as i64;
        for slot in slots.iter_mut() {
            slot.min_duration = if min_duration >= spec.slot_min_duration && min_duration <= slot.max_duration {
                min_duration
            } else {
                spec.slot_min_duration
            };
        }
    }
}

/// 同一区间在不同参数组中的出现次数取最大值，不累加；保持首次出现的顺序
pub fn merge_by_max_count(runs: &[Vec<SlotRange>]) -> Vec<(SlotRange, usize)> {
    let mut order: Vec<SlotRange> = Vec::new();
    let mut best: HashMap<SlotRange, usize> = HashMap::new();

    for run in runs {
        let mut counts: HashMap<SlotRange, usize> = HashMap::new();
        for slot in run {
            *counts.entry(*slot).or_insert(0) += 1;
            if !best.contains_key(slot) {
                best.insert(*slot, 0);
                order.push(*slot);
            }
        }
        for (slot, count) in counts {
            let entry = best.entry(slot).or_insert(0);
            if count > *entry {
                *entry = count;
            }
        }
    }

    order
        .into_iter()
        .map(|slot| {
            let count = best.get(&slot).copied().unwrap_or(0);
            (slot, count)
        })
        .collect()
}

impl SlotPlanner for MinMax {
    fn algorithm(&self) -> PlannerAlgorithm {
        PlannerAlgorithm::MinMax
    }

    fn plan(&self) -> Vec<SlotRange> {
        let runs = self.run_variations();
        debug!(?runs, "min-max variations computed");

        let mut plan = Vec::new();
        for (slot, count) in merge_by_max_count(&runs) {
            let start = plan.len();
            plan.extend(std::iter::repeat(slot).take(count));
            if !self.spec.is_exact_duration() {
                self.apply_min_duration(&mut plan[start..]);
            }
        }
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::pod::spec;
    use proptest::prelude::*;

    #[test]
    fn merge_keeps_max_not_sum() {
        let a = SlotRange::new(10, 10);
        let b = SlotRange::new(15, 15);
        let runs = vec![vec![a, a, b], vec![a, a, a], vec![b, b], vec![]];
        assert_eq!(merge_by_max_count(&runs), vec![(a, 3), (b, 2)]);
    }

    #[test]
    fn exact_pod_keeps_slot_min_equal_max() {
        let planner = MinMax::new(&spec(30, 30, 2, 2, 5, 30));
        let plan = planner.plan();
        assert_eq!(plan, vec![SlotRange::new(15, 15); 2]);
    }

    #[test]
    fn range_pod_recomputes_min_duration() {
        // podMin 20 / minAds 2 = 10，落在 [slotMin, slot.max] 内
        let planner = MinMax::new(&spec(20, 30, 2, 3, 5, 15));
        let plan = planner.plan();
        assert!(!plan.is_empty());
        for slot in &plan {
            let expected = if slot.max_duration >= 10 { 10 } else { 5 };
            assert_eq!(slot.min_duration, expected);
        }
    }

    #[test]
    fn degenerate_slots_produce_empty_plan() {
        let planner = MinMax::new(&spec(30, 60, 1, 3, 0, 0));
        assert!(planner.plan().is_empty());
    }

    proptest! {
        #[test]
        fn every_variation_of_exact_pod_sums_to_pod(
            pod in 5i64..150,
            slot_min in 1i64..20,
            slot_extra in 0i64..40,
            min_ads in 1usize..4,
            ads_extra in 0usize..4,
        ) {
            let planner = MinMax::new(&spec(pod, pod, min_ads, min_ads + ads_extra, slot_min, slot_min + slot_extra));
            for run in planner.run_variations() {
                if !run.is_empty() {
                    let total: i64 = run.iter().map(|s| s.max_duration).sum();
                    prop_assert_eq!(total, pod);
                }
            }
        }

        #[test]
        fn merged_slots_stay_within_slot_bounds(
            pod_min in 0i64..100,
            pod_extra in 0i64..100,
            slot_min in 1i64..20,
            slot_extra in 0i64..40,
            min_ads in 1usize..4,
            ads_extra in 0usize..4,
        ) {
            let slot_max = slot_min + slot_extra;
            let planner = MinMax::new(&spec(pod_min, pod_min + pod_extra, min_ads, min_ads + ads_extra, slot_min, slot_max));
            for slot in planner.plan() {
                prop_assert!(slot.min_duration >= slot_min);
                prop_assert!(slot.min_duration <= slot.max_duration);
                prop_assert!(slot.max_duration <= slot_max);
            }
        }
    }
}
