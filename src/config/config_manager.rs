use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;
use tracing::info;

use crate::model::pod::PodProfile;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read profile source {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse profile source {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid pod profile '{name}': {reason}")]
    InvalidProfile { name: String, reason: String },

    #[error("duplicate pod profile '{0}'")]
    DuplicateProfile(String),
}

/// **Pod 配置管理**
/// 保存已校验的配置档，读多写少，使用 `RwLock`。
#[derive(Debug, Default)]
pub struct ConfigManager {
    profiles: RwLock<HashMap<String, PodProfile>>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 整批替换配置档，任一配置非法则整批拒绝
    pub fn update_profiles(&self, profiles: Vec<PodProfile>) -> Result<usize, ConfigError> {
        let mut table = HashMap::with_capacity(profiles.len());
        for profile in profiles {
            profile.validate()?;
            if table.contains_key(&profile.name) {
                return Err(ConfigError::DuplicateProfile(profile.name));
            }
            table.insert(profile.name.clone(), profile);
        }

        let count = table.len();
        let mut guard = self.profiles.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = table;
        info!(profiles = count, "pod profiles updated");
        Ok(count)
    }

    pub fn get_profile(&self, name: &str) -> Option<PodProfile> {
        let guard = self.profiles.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.get(name).cloned()
    }

    pub fn profile_names(&self) -> Vec<String> {
        let guard = self.profiles.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut names: Vec<String> = guard.keys().cloned().collect();
        names.sort();
        names
    }
}
