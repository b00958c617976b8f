// src/model/adapters.rs

use crate::config::config_manager::ConfigError;
use crate::model::pod::{CombinationOrder, DurationMatchingPolicy, PodProfile, PodSpec};
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ProfileFile {
    pub profiles: Vec<PodProfile>,
}

pub trait ProfileAdapter: Send + Sync {
    fn load_profiles(&self) -> Result<Vec<PodProfile>, ConfigError>;
}

/// 从 JSON 文件读取 Pod 配置档，文件内容形如 `{"profiles": [...]}`
pub struct FileProfileAdapter {
    pub profile_file: String,
}

impl FileProfileAdapter {
    pub fn new(profile_file: &str) -> Self {
        Self {
            profile_file: profile_file.to_string(),
        }
    }
}

impl ProfileAdapter for FileProfileAdapter {
    fn load_profiles(&self) -> Result<Vec<PodProfile>, ConfigError> {
        let content = fs::read_to_string(&self.profile_file).map_err(|source| ConfigError::Read {
            path: self.profile_file.clone(),
            source,
        })?;
        let file: ProfileFile = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: self.profile_file.clone(),
            source,
        })?;
        Ok(file.profiles)
    }
}

/// 内置配置档，未提供配置文件时使用
pub struct StaticProfileAdapter {
    profiles: Vec<PodProfile>,
}

impl StaticProfileAdapter {
    pub fn new(profiles: Vec<PodProfile>) -> Self {
        Self { profiles }
    }

    /// 常见的 CTV 中插配置：60 秒区间 Pod 和 30 秒固定时长 Pod
    pub fn builtin() -> Self {
        let mut midroll = PodProfile::new(
            "ctv_midroll",
            PodSpec {
                pod_min_duration: 30,
                pod_max_duration: 60,
                min_ads: 1,
                max_ads: 4,
                slot_min_duration: 5,
                slot_max_duration: 30,
                category_exclusion_percent: 50,
                advertiser_exclusion_percent: 50,
                deals_supported: true,
            },
        );
        midroll.combination_order = CombinationOrder::MaxToMin;

        let mut preroll = PodProfile::new(
            "ctv_preroll",
            PodSpec {
                pod_min_duration: 30,
                pod_max_duration: 30,
                min_ads: 1,
                max_ads: 2,
                slot_min_duration: 15,
                slot_max_duration: 30,
                category_exclusion_percent: 100,
                advertiser_exclusion_percent: 100,
                deals_supported: false,
            },
        );
        preroll.adserver_durations = vec![15, 30];
        preroll.duration_matching = Some(DurationMatchingPolicy::Roundup);

        Self::new(vec![midroll, preroll])
    }
}

impl ProfileAdapter for StaticProfileAdapter {
    fn load_profiles(&self) -> Result<Vec<PodProfile>, ConfigError> {
        Ok(self.profiles.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_profiles_are_valid() {
        let profiles = StaticProfileAdapter::builtin().load_profiles().unwrap();
        assert_eq!(profiles.len(), 2);
        for profile in &profiles {
            assert!(profile.validate().is_ok(), "{}", profile.name);
        }
    }

    #[test]
    fn file_adapter_reports_missing_file() {
        let adapter = FileProfileAdapter::new("/nonexistent/profiles.json");
        assert!(matches!(adapter.load_profiles(), Err(ConfigError::Read { .. })));
    }

    #[test]
    fn file_adapter_parses_profiles() {
        let path = std::env::temp_dir().join(format!("profiles-{}.json", uuid::Uuid::new_v4()));
        fs::write(
            &path,
            r#"{"profiles":[{"name":"p","podMinDuration":10,"podMaxDuration":30,"minAds":1,"maxAds":3,"slotMinDuration":5,"slotMaxDuration":15}]}"#,
        )
        .unwrap();
        let adapter = FileProfileAdapter::new(path.to_str().unwrap());
        let profiles = adapter.load_profiles().unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].spec.max_ads, 3);
    }

    #[test]
    fn file_adapter_reports_bad_json() {
        let path = std::env::temp_dir().join(format!("profiles-{}.json", uuid::Uuid::new_v4()));
        fs::write(&path, "{ not json").unwrap();
        let adapter = FileProfileAdapter::new(path.to_str().unwrap());
        let result = adapter.load_profiles();
        fs::remove_file(&path).ok();
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}
