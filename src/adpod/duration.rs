// src/adpod/duration.rs

use crate::model::bid::BidStatus;
use crate::model::pod::{DurationMatchingPolicy, ImpSlotConfig, PodProfile};
use crate::planner::parse_sequence;

/// **出价时长解析**
/// 优先使用素材声明的时长，缺失时取出价所在广告位的最大时长；只有声明的时长按匹配策略校正。
pub struct DurationResolver<'a> {
    slots: &'a [ImpSlotConfig],
    policy: Option<DurationMatchingPolicy>,
    allowed: Vec<i64>,
}

impl<'a> DurationResolver<'a> {
    pub fn new(profile: &PodProfile, slots: &'a [ImpSlotConfig]) -> Self {
        let mut allowed = if profile.adserver_durations.is_empty() {
            slots.iter().map(|s| s.max_duration).collect()
        } else {
            profile.adserver_durations.clone()
        };
        allowed.sort_unstable();
        allowed.dedup();

        Self {
            slots,
            policy: profile.duration_matching,
            allowed,
        }
    }

    fn slot_default(&self, imp_id: &str) -> Option<i64> {
        let sequence = parse_sequence(imp_id)?;
        self.slots
            .iter()
            .find(|slot| slot.sequence == sequence)
            .map(|slot| slot.max_duration)
    }

    /// 返回解析后的时长；不满足匹配策略时返回 `DurationMismatch`
    pub fn resolve(&self, declared: Option<i64>, imp_id: &str) -> (i64, BidStatus) {
        let Some(duration) = declared.filter(|d| *d > 0) else {
            // 广告位时长本身就来自规划结果，直接使用
            return match self.slot_default(imp_id) {
                Some(duration) if duration > 0 => (duration, BidStatus::Ok),
                _ => (0, BidStatus::DurationMismatch),
            };
        };

        match self.policy {
            Some(DurationMatchingPolicy::Exact) => {
                if self.allowed.binary_search(&duration).is_ok() {
                    (duration, BidStatus::Ok)
                } else {
                    (duration, BidStatus::DurationMismatch)
                }
            }
            Some(DurationMatchingPolicy::Roundup) => match self.allowed.iter().find(|d| **d >= duration) {
                Some(snapped) => (*snapped, BidStatus::Ok),
                None => (duration, BidStatus::DurationMismatch),
            },
            None => (duration, BidStatus::Ok),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::pod::spec;

    fn slots() -> Vec<ImpSlotConfig> {
        vec![
            ImpSlotConfig { imp_id: "pod_1".into(), min_duration: 5, max_duration: 15, sequence: 1 },
            ImpSlotConfig { imp_id: "pod_2".into(), min_duration: 5, max_duration: 30, sequence: 2 },
        ]
    }

    #[test]
    fn declared_duration_wins_over_slot_default() {
        let profile = PodProfile::new("p", spec(10, 60, 1, 3, 5, 30));
        let slots = slots();
        let resolver = DurationResolver::new(&profile, &slots);
        assert_eq!(resolver.resolve(Some(10), "pod_2"), (10, BidStatus::Ok));
        assert_eq!(resolver.resolve(None, "pod_2"), (30, BidStatus::Ok));
        assert_eq!(resolver.resolve(Some(0), "pod_1"), (15, BidStatus::Ok));
    }

    #[test]
    fn unknown_slot_without_declared_duration_mismatches() {
        let profile = PodProfile::new("p", spec(10, 60, 1, 3, 5, 30));
        let slots = slots();
        let resolver = DurationResolver::new(&profile, &slots);
        assert_eq!(resolver.resolve(None, "pod_9"), (0, BidStatus::DurationMismatch));
    }

    #[test]
    fn without_policy_declared_duration_is_kept() {
        let profile = PodProfile::new("p", spec(10, 60, 1, 3, 5, 30));
        let slots = slots();
        let resolver = DurationResolver::new(&profile, &slots);
        // 超过 slotMaxDuration 也不算不匹配，由后续组合阶段决定能否使用
        assert_eq!(resolver.resolve(Some(45), "pod_1"), (45, BidStatus::Ok));
        assert_eq!(resolver.resolve(Some(7), "pod_9"), (7, BidStatus::Ok));
    }

    #[test]
    fn slot_default_skips_matching_policy() {
        let mut profile = PodProfile::new("p", spec(10, 60, 1, 3, 5, 30));
        profile.adserver_durations = vec![20];
        profile.duration_matching = Some(DurationMatchingPolicy::Exact);
        let slots = slots();
        let resolver = DurationResolver::new(&profile, &slots);
        assert_eq!(resolver.resolve(None, "pod_1"), (15, BidStatus::Ok));
        assert_eq!(resolver.resolve(Some(15), "pod_1"), (15, BidStatus::DurationMismatch));

        profile.duration_matching = Some(DurationMatchingPolicy::Roundup);
        let resolver = DurationResolver::new(&profile, &slots);
        assert_eq!(resolver.resolve(None, "pod_2"), (30, BidStatus::Ok));
        assert_eq!(resolver.resolve(Some(15), "pod_2"), (20, BidStatus::Ok));
    }

    #[test]
    fn exact_policy_requires_allowed_duration() {
        let mut profile = PodProfile::new("p", spec(10, 60, 1, 3, 5, 30));
        profile.adserver_durations = vec![15, 30];
        profile.duration_matching = Some(DurationMatchingPolicy::Exact);
        let slots = slots();
        let resolver = DurationResolver::new(&profile, &slots);
        assert_eq!(resolver.resolve(Some(15), "pod_1"), (15, BidStatus::Ok));
        assert_eq!(resolver.resolve(Some(20), "pod_1"), (20, BidStatus::DurationMismatch));
    }

    #[test]
    fn roundup_policy_snaps_to_next_allowed_duration() {
        let mut profile = PodProfile::new("p", spec(10, 60, 1, 3, 5, 30));
        profile.adserver_durations = vec![30, 15];
        profile.duration_matching = Some(DurationMatchingPolicy::Roundup);
        let slots = slots();
        let resolver = DurationResolver::new(&profile, &slots);
        assert_eq!(resolver.resolve(Some(12), "pod_1"), (15, BidStatus::Ok));
        assert_eq!(resolver.resolve(Some(16), "pod_1"), (30, BidStatus::Ok));
        assert_eq!(resolver.resolve(Some(31), "pod_1"), (31, BidStatus::DurationMismatch));
    }
}
