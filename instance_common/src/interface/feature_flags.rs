use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use instance_defs::{FeatureFlagService, FeatureName};

use crate::config::FeatureFlagConfig;

/// Feature flags held in memory, seeded from configuration.
#[derive(Debug, Default)]
pub struct StaticFeatureFlags {
    global: RwLock<BTreeSet<FeatureName>>,
    accounts: RwLock<BTreeMap<String, BTreeSet<FeatureName>>>,
}

impl StaticFeatureFlags {
    pub fn from_config(config: &FeatureFlagConfig) -> Self {
        StaticFeatureFlags {
            global: RwLock::new(config.global.clone()),
            accounts: RwLock::new(config.accounts.clone()),
        }
    }

    pub fn enable(&self, account_id: &str, feature: FeatureName) {
        if let Ok(mut accounts) = self.accounts.write() {
            accounts
                .entry(account_id.to_string())
                .or_default()
                .insert(feature);
        }
    }

    pub fn disable(&self, account_id: &str, feature: FeatureName) {
        if let Ok(mut accounts) = self.accounts.write() {
            if let Some(features) = accounts.get_mut(account_id) {
                features.remove(&feature);
            }
        }
    }

    pub fn enable_globally(&self, feature: FeatureName) {
        if let Ok(mut global) = self.global.write() {
            global.insert(feature);
        }
    }
}

impl FeatureFlagService for StaticFeatureFlags {
    fn is_enabled(&self, feature: FeatureName, account_id: &str) -> bool {
        self.is_global_enabled(feature)
            || self.accounts.read().map_or(false, |accounts| {
                accounts
                    .get(account_id)
                    .map_or(false, |features| features.contains(&feature))
            })
    }

    fn is_global_enabled(&self, feature: FeatureName) -> bool {
        self.global
            .read()
            .map_or(false, |global| global.contains(&feature))
    }
}
