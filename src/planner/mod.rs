pub mod duration_ranges;
pub mod generator;
pub mod min_max;

use tracing::debug;

use crate::adpod::error::PodError;
use crate::model::pod::{ImpSlotConfig, PlannerAlgorithm, PodProfile, SlotRange};
use duration_ranges::ByDurationRanges;
use generator::MaximizeForDuration;
use min_max::MinMax;

/// 广告位规划算法的统一接口
pub trait SlotPlanner: Send + Sync {
    fn algorithm(&self) -> PlannerAlgorithm;
    fn plan(&self) -> Vec<SlotRange>;
}

/// 配置了广告服务器时长列表和匹配策略时按时长列表规划，否则使用配置指定的算法，默认 MinMax
pub fn select_algorithm(profile: &PodProfile) -> PlannerAlgorithm {
    if !profile.adserver_durations.is_empty() && profile.duration_matching.is_some() {
        return PlannerAlgorithm::ByDurationRanges;
    }
    profile.algorithm.unwrap_or(PlannerAlgorithm::MinMax)
}

pub fn new_planner(profile: &PodProfile) -> Box<dyn SlotPlanner> {
    let spec = &profile.spec;
    match select_algorithm(profile) {
        PlannerAlgorithm::MaximizeForDuration => Box::new(MaximizeForDuration::new(spec)),
        PlannerAlgorithm::MinMax => Box::new(MinMax::new(spec)),
        PlannerAlgorithm::ByDurationRanges => Box::new(ByDurationRanges::new(
            &profile.adserver_durations,
            profile.duration_matching,
            spec.max_ads,
            spec.slot_min_duration,
            spec.slot_max_duration,
        )),
    }
}

pub fn impression_id(pod_id: &str, sequence: usize) -> String {
    format!("{}_{}", pod_id, sequence)
}

/// 从 impression id 中解析出广告位序号，格式为 `<podId>_<sequence>`
pub fn parse_sequence(imp_id: &str) -> Option<usize> {
    let (_, sequence) = imp_id.rsplit_once('_')?;
    sequence.parse().ok().filter(|s| *s > 0)
}

/// 规划 Pod 的广告位并生成 impression 配置
pub fn plan_impressions(pod_id: &str, profile: &PodProfile) -> Result<Vec<ImpSlotConfig>, PodError> {
    let planner = new_planner(profile);
    let slots = planner.plan();
    debug!(pod_id, algorithm = ?planner.algorithm(), slots = slots.len(), "pod slots planned");

    if slots.is_empty() {
        return Err(PodError::NoSlots {
            pod_id: pod_id.to_string(),
        });
    }

    Ok(slots
        .iter()
        .enumerate()
        .map(|(i, slot)| ImpSlotConfig {
            imp_id: impression_id(pod_id, i + 1),
            min_duration: slot.min_duration,
            max_duration: slot.max_duration,
            sequence: i + 1,
        })
        .collect())
}
