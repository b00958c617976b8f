// src/planner/generator.rs

use tracing::debug;

use crate::model::pod::{PlannerAlgorithm, PodSpec, SlotRange};
use crate::planner::SlotPlanner;

/// 时长计算的粒度，广告位时长通常是 5 秒的倍数
pub const MULTIPLE_OF: i64 = 5;

/// 连续多少轮未分配到任何时长即停止
const MAX_STALLED_PASSES: usize = 4;

pub fn closest_factor(num: i64, multiple_of: i64) -> i64 {
    ((num as f64 / multiple_of as f64).round() * multiple_of as f64) as i64
}

/// 不小于 `min_duration` 的最小倍数，结果为 0 时取 `multiple_of`
pub fn closest_factor_for_min(min_duration: i64, multiple_of: i64) -> i64 {
    let closest = closest_factor(min_duration, multiple_of);
    if closest == 0 {
        return multiple_of;
    }
    if closest < min_duration {
        return closest + multiple_of;
    }
    closest
}

/// 不大于 `max_duration` 的最大倍数，结果为 0 时保留原值
pub fn closest_factor_for_max(max_duration: i64, multiple_of: i64) -> i64 {
    if max_duration <= 0 || max_duration % multiple_of == 0 {
        return max_duration;
    }
    match (max_duration / multiple_of) * multiple_of {
        0 => max_duration,
        floor => floor,
    }
}

fn is_multiple_of(num: i64, multiple_of: i64) -> bool {
    num % multiple_of == 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Bounds {
    pod_min: i64,
    pod_max: i64,
    slot_min: i64,
    slot_max: i64,
    min_ads: i64,
    max_ads: i64,
}

/// **单次时长分配**
/// `requested` 保存原始请求值，`internal` 保存对齐到 `MULTIPLE_OF` 的值，仅用于内部估算。
#[derive(Debug, Clone)]
pub struct SlotGenerator {
    requested: Bounds,
    internal: Bounds,
}

/// 一次分配的结果，`free_time` 为未分配出去的 Pod 时长
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allocation {
    pub slots: Vec<SlotRange>,
    pub free_time: i64,
}

impl SlotGenerator {
    pub fn new(pod_min: i64, pod_max: i64, slot_min: i64, slot_max: i64, min_ads: usize, max_ads: usize) -> Self {
        let requested = Bounds {
            pod_min,
            pod_max,
            slot_min,
            slot_max,
            min_ads: min_ads as i64,
            max_ads: max_ads as i64,
        };
        let mut internal = requested;

        if pod_min != pod_max {
            internal.pod_min = closest_factor_for_min(pod_min, MULTIPLE_OF);
            internal.pod_max = closest_factor_for_max(pod_max, MULTIPLE_OF);
        }

        if slot_min != slot_max {
            internal.slot_min = closest_factor_for_min(slot_min, MULTIPLE_OF);
            internal.slot_max = closest_factor_for_max(slot_max, MULTIPLE_OF);
            if internal.slot_min > internal.slot_max {
                internal.slot_min = slot_min;
                internal.slot_max = slot_max;
            }
        }

        Self { requested, internal }
    }

    pub fn from_spec(spec: &PodSpec) -> Self {
        Self::new(
            spec.pod_min_duration,
            spec.pod_max_duration,
            spec.slot_min_duration,
            spec.slot_max_duration,
            spec.min_ads,
            spec.max_ads,
        )
    }

    fn total_ads(&self) -> i64 {
        if self.internal.slot_max <= 0 || self.internal.slot_min <= 0 {
            return 0;
        }
        let by_max = self.internal.pod_max / self.internal.slot_max;
        let by_min = self.internal.pod_max / self.internal.slot_min;
        by_max
            .max(by_min)
            .max(self.requested.min_ads)
            .min(self.requested.max_ads)
    }

    fn time_for_each_slot(&self, total_ads: i64) -> i64 {
        if total_ads <= 0 {
            return 0;
        }
        let time = (self.internal.pod_max / total_ads)
            .max(self.internal.slot_min)
            .min(self.internal.slot_max);

        if self.requested.slot_min == self.requested.slot_max {
            return time;
        }
        if time * total_ads > self.requested.pod_max {
            return self.internal.pod_max / total_ads;
        }
        if !is_multiple_of(time, MULTIPLE_OF) {
            return closest_factor(time, MULTIPLE_OF);
        }
        time
    }

    /// 计算各广告位的时长区间，校验失败返回空列表
    pub fn allocate(&self) -> Allocation {
        let total_ads = self.total_ads();
        let mut time_for_each_slot = self.time_for_each_slot(total_ads);
        let mut state = SlotState::new(self, total_ads.max(0) as usize);

        let exact_ads = self.requested.min_ads == self.requested.max_ads;
        let mut fill_zero_first = true;
        let mut zero_filled_by_last_run = 0;
        let mut stalled = 0;
        let mut time = 0;

        while time < self.requested.pod_max {
            let (adjusted, all_full) = state.add_time(time_for_each_slot, fill_zero_first);
            time += adjusted;
            time_for_each_slot = least_time(
                self.requested.pod_max - time,
                self.requested.slot_max - time_for_each_slot,
            );
            if all_full {
                break;
            }

            if adjusted == 0 {
                stalled += 1;
                if stalled >= MAX_STALLED_PASSES {
                    debug!(time, "slot allocation made no progress");
                    break;
                }
            } else {
                stalled = 0;
            }

            fill_zero_first = false;
            zero_filled_by_last_run = state.zero_slots - zero_filled_by_last_run;
            if exact_ads && state.zero_slots > 0 && zero_filled_by_last_run > 0 {
                fill_zero_first = true;
            }
        }

        let slots = state.validate();
        let free_time = if slots.is_empty() {
            self.requested.pod_max
        } else {
            (self.requested.pod_max - time).max(0)
        };
        if free_time > 0 {
            debug!(free_time, slots = slots.len(), "pod time left unallocated");
        }
        Allocation { slots, free_time }
    }
}

/// 下一轮每个广告位追加的时长：不超过 `MULTIPLE_OF`，也不超过广告位剩余容量
fn least_time(remaining: i64, least_required_by_slot: i64) -> i64 {
    let mut time = remaining;
    if MULTIPLE_OF < time {
        time = MULTIPLE_OF;
    }
    if least_required_by_slot > 0 && least_required_by_slot < time {
        time = least_required_by_slot;
    }
    time
}

struct SlotState<'a> {
    generator: &'a SlotGenerator,
    slots: Vec<[i64; 2]>,
    total_slot_max_time: i64,
    zero_slots: i64,
}

impl<'a> SlotState<'a> {
    fn new(generator: &'a SlotGenerator, total_ads: usize) -> Self {
        Self {
            generator,
            slots: vec![[0, 0]; total_ads],
            total_slot_max_time: 0,
            zero_slots: total_ads as i64,
        }
    }

    fn add_time(&mut self, time_for_each_slot: i64, fill_zero_first: bool) -> (i64, bool) {
        let requested = self.generator.requested;
        let internal = self.generator.internal;
        let exact_pod = requested.pod_min == requested.pod_max;
        let mut added = 0;
        let mut full = 0;

        for slot in self.slots.iter_mut() {
            let next = slot[1] + time_for_each_slot;
            let can_adjust = next <= requested.slot_max && next >= requested.slot_min;
            let fits_pod = self.total_slot_max_time + time_for_each_slot <= requested.pod_max;
            let allowed = !fill_zero_first || slot[1] == 0;

            if slot[1] <= internal.slot_max && can_adjust && fits_pod && allowed {
                slot[0] += time_for_each_slot;
                if time_for_each_slot < MULTIPLE_OF && !exact_pod {
                    slot[0] = requested.slot_min;
                }
                if slot[1] == 0 {
                    self.zero_slots -= 1;
                }
                slot[1] = next;
                self.total_slot_max_time += time_for_each_slot;
                added += time_for_each_slot;
            }

            if slot[1] == requested.slot_max || !can_adjust {
                full += 1;
            }
        }
        (added, full == self.slots.len())
    }

    fn validate(self) -> Vec<SlotRange> {
        if self.slots.is_empty() {
            return Vec::new();
        }
        let requested = self.generator.requested;
        let within_slot = |d: i64| d >= requested.slot_min && d <= requested.slot_max;
        let within_pod = |total: i64| {
            if requested.pod_min == requested.pod_max && total != requested.pod_max {
                return false;
            }
            total >= requested.pod_min && total <= requested.pod_max
        };

        let total_slot_min_time: i64 = self.slots.iter().map(|s| s[0]).sum();
        let mut has_error = false;
        let mut slots = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            if slot[0] == 0 || slot[1] == 0 {
                continue;
            }
            has_error = has_error || !within_slot(slot[0]) || !within_slot(slot[1]);
            slots.push(SlotRange::new(slot[0], slot[1]));
        }

        let count = slots.len() as i64;
        if count < requested.min_ads || count > requested.max_ads {
            debug!(count, min_ads = requested.min_ads, max_ads = requested.max_ads, "slot count out of range");
            has_error = true;
        }
        has_error = has_error || !within_pod(total_slot_min_time) || !within_pod(self.total_slot_max_time);

        if has_error {
            return Vec::new();
        }
        slots
    }
}

/// **MaximizeForDuration**：单次分配，不做多组参数合并
pub struct MaximizeForDuration {
    generator: SlotGenerator,
}

impl MaximizeForDuration {
    pub fn new(spec: &PodSpec) -> Self {
        Self {
            generator: SlotGenerator::from_spec(spec),
        }
    }
}

impl SlotPlanner for MaximizeForDuration {
    fn algorithm(&self) -> PlannerAlgorithm {
        PlannerAlgorithm::MaximizeForDuration
    }

    fn plan(&self) -> Vec<SlotRange> {
        self.generator.allocate().slots
    }
}
