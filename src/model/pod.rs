// src/model/pod.rs

use serde::{Deserialize, Serialize};

use crate::config::config_manager::ConfigError;

fn default_exclusion_percent() -> u32 {
    100
}

/// **广告 Pod 约束**
/// 时长单位均为秒，单次组装过程中不可变。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    pub pod_min_duration: i64,
    pub pod_max_duration: i64,
    pub min_ads: usize,
    pub max_ads: usize,
    pub slot_min_duration: i64,
    pub slot_max_duration: i64,
    #[serde(default = "default_exclusion_percent")]
    pub category_exclusion_percent: u32,
    #[serde(default = "default_exclusion_percent")]
    pub advertiser_exclusion_percent: u32,
    #[serde(default)]
    pub deals_supported: bool,
}

impl PodSpec {
    pub fn is_exact_duration(&self) -> bool {
        self.pod_min_duration == self.pod_max_duration
    }
}

/// 单个广告位的时长区间
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct SlotRange {
    pub min_duration: i64,
    pub max_duration: i64,
}

impl SlotRange {
    pub fn new(min_duration: i64, max_duration: i64) -> Self {
        Self { min_duration, max_duration }
    }
}

/// 由规划结果展开的广告位（impression）配置，sequence 从 1 开始
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImpSlotConfig {
    pub imp_id: String,
    pub min_duration: i64,
    pub max_duration: i64,
    pub sequence: usize,
}

/// 广告服务器时长匹配策略
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DurationMatchingPolicy {
    Exact,
    Roundup,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PlannerAlgorithm {
    MaximizeForDuration,
    MinMax,
    ByDurationRanges,
}

/// 组合生成顺序：默认从 maxAds 到 minAds
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum CombinationOrder {
    #[default]
    MaxToMin,
    MinToMax,
}

/// **Pod 配置档**
/// 由配置文件加载，名称唯一。
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PodProfile {
    pub name: String,
    #[serde(flatten)]
    pub spec: PodSpec,
    #[serde(default)]
    pub adserver_durations: Vec<i64>,
    #[serde(default)]
    pub duration_matching: Option<DurationMatchingPolicy>,
    #[serde(default)]
    pub algorithm: Option<PlannerAlgorithm>,
    #[serde(default)]
    pub combination_order: CombinationOrder,
}

impl PodProfile {
    pub fn new(name: &str, spec: PodSpec) -> Self {
        Self {
            name: name.to_string(),
            spec,
            adserver_durations: Vec::new(),
            duration_matching: None,
            algorithm: None,
            combination_order: CombinationOrder::default(),
        }
    }

    /// **加载期校验**，非法配置直接拒绝，不在组装阶段做兜底
    pub fn validate(&self) -> Result<(), ConfigError> {
        let spec = &self.spec;
        let invalid = |reason: String| ConfigError::InvalidProfile {
            name: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("empty profile name".to_string()));
        }
        if spec.pod_min_duration < 0 || spec.slot_min_duration < 0 {
            return Err(invalid("durations must not be negative".to_string()));
        }
        if spec.pod_min_duration > spec.pod_max_duration {
            return Err(invalid(format!(
                "podMinDuration {} > podMaxDuration {}",
                spec.pod_min_duration, spec.pod_max_duration
            )));
        }
        if spec.slot_max_duration <= 0 {
            return Err(invalid("slotMaxDuration must be positive".to_string()));
        }
        if spec.slot_min_duration > spec.slot_max_duration {
            return Err(invalid(format!(
                "slotMinDuration {} > slotMaxDuration {}",
                spec.slot_min_duration, spec.slot_max_duration
            )));
        }
        if spec.min_ads == 0 || spec.min_ads > spec.max_ads {
            return Err(invalid(format!(
                "ad count range [{}, {}] is invalid",
                spec.min_ads, spec.max_ads
            )));
        }
        if spec.category_exclusion_percent > 100 || spec.advertiser_exclusion_percent > 100 {
            return Err(invalid("exclusion percent must be within 0..=100".to_string()));
        }
        if self.adserver_durations.iter().any(|d| *d <= 0) {
            return Err(invalid("adserver durations must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn spec(pod_min: i64, pod_max: i64, min_ads: usize, max_ads: usize, slot_min: i64, slot_max: i64) -> PodSpec {
    PodSpec {
        pod_min_duration: pod_min,
        pod_max_duration: pod_max,
        min_ads,
        max_ads,
        slot_min_duration: slot_min,
        slot_max_duration: slot_max,
        category_exclusion_percent: 100,
        advertiser_exclusion_percent: 100,
        deals_supported: false,
    }
}
