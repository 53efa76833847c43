use serde::{Deserialize, Serialize};

use crate::calibrate::EngineConfig;
use crate::orchestrator::OrchestratorConfig;
use crate::permissions::{GroupRule, PermissionConfig};
use crate::scheduler::SchedulerConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub permissions: PermissionsSection,
}

/// Permission bracket configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PermissionsSection {
    /// Whether the bracket hook runs at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Owner for every path in the tree.
    #[serde(default)]
    pub owner_uid: u32,
    /// Group rules keyed by proposal sets.
    #[serde(default)]
    pub group_rules: Vec<GroupRule>,
    /// Group for programs matched by no rule.
    #[serde(default)]
    pub default_gid: u32,
}

fn default_enabled() -> bool {
    true
}

impl Default for PermissionsSection {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            owner_uid: 0,
            group_rules: Vec::new(),
            default_gid: 0,
        }
    }
}

impl PermissionsSection {
    /// The ownership configuration injected into the bracket.
    pub fn to_permission_config(&self) -> PermissionConfig {
        PermissionConfig {
            owner_uid: self.owner_uid,
            group_rules: self.group_rules.clone(),
            default_gid: self.default_gid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissions_enabled_by_default() {
        let section = PermissionsSection::default();
        assert!(section.enabled);
        assert!(section.group_rules.is_empty());
    }

    #[test]
    fn test_full_config_deserializes() {
        let toml = r#"
[orchestrator]
base_dir = "/data/cal"
parallel = true
max_batch = 500

[scheduler]
load_fraction = 0.25

[engine]
engine_path = "/opt/engine/bin/calibrate"

[permissions]
enabled = false
owner_uid = 5026
default_gid = 65545

[[permissions.group_rules]]
gid = 6045
program_ids = [11111, 11112]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.orchestrator.parallel);
        assert_eq!(config.orchestrator.max_batch, 500);
        assert_eq!(config.scheduler.load_fraction, 0.25);
        assert!(!config.permissions.enabled);
        assert_eq!(config.permissions.to_permission_config().gid_for(11112), 6045);
        assert_eq!(config.permissions.to_permission_config().gid_for(1), 65545);
    }
}
