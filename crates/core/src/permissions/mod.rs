//! Permission bracket around a pipeline pass.
//!
//! The data tree is kept restrictive between runs; the orchestrator opens
//! permissions before touching anything and closes them again at the end,
//! re-owning each program directory according to its proposal-set rule.
//! Everything here is a thin I/O wrapper: per-path failures are logged and
//! never abort the pass.

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;
use walkdir::WalkDir;

/// Mode while the pipeline works on the tree.
const OPEN_MODE: u32 = 0o755;
/// Restrictive mode between runs (sticky, no write, no world access).
const CLOSED_MODE: u32 = 0o1550;

/// A group id assigned to a set of observing programs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupRule {
    pub gid: u32,
    pub program_ids: BTreeSet<u32>,
}

/// Ownership configuration, resolved once at startup and injected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionConfig {
    /// Owner for every path in the tree.
    pub owner_uid: u32,
    /// Group rules keyed by proposal sets; first matching rule wins.
    #[serde(default)]
    pub group_rules: Vec<GroupRule>,
    /// Group for programs matched by no rule.
    pub default_gid: u32,
}

impl PermissionConfig {
    /// Group id for one program directory.
    pub fn gid_for(&self, program_id: u32) -> u32 {
        self.group_rules
            .iter()
            .find(|rule| rule.program_ids.contains(&program_id))
            .map(|rule| rule.gid)
            .unwrap_or(self.default_gid)
    }
}

/// Pre/post hook bracketing one pipeline pass.
#[async_trait]
pub trait PermissionBracket: Send + Sync {
    /// Called before the first stage touches the tree.
    async fn open(&self, base: &Path);
    /// Called after the last stage finishes.
    async fn close(&self, base: &Path);
}

/// Unix implementation: chmod walk on open; chmod + chown walk on close.
pub struct UnixPermissionBracket {
    config: PermissionConfig,
}

impl UnixPermissionBracket {
    pub fn new(config: PermissionConfig) -> Self {
        Self { config }
    }

    fn set_mode_recursive(base: &Path, mode: u32) {
        use std::os::unix::fs::PermissionsExt;
        for entry in WalkDir::new(base).into_iter().filter_map(|e| e.ok()) {
            let perm = std::fs::Permissions::from_mode(mode);
            if let Err(e) = std::fs::set_permissions(entry.path(), perm) {
                warn!("chmod failed on {}: {}", entry.path().display(), e);
            }
        }
    }

    fn chown_program_dirs(config: &PermissionConfig, base: &Path) {
        for entry in WalkDir::new(base)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir())
        {
            let Ok(program_id) = entry.file_name().to_string_lossy().parse::<u32>() else {
                continue;
            };
            let gid = config.gid_for(program_id);
            for item in WalkDir::new(entry.path()).into_iter().filter_map(|e| e.ok()) {
                if let Err(e) =
                    std::os::unix::fs::chown(item.path(), Some(config.owner_uid), Some(gid))
                {
                    warn!("chown failed on {}: {}", item.path().display(), e);
                }
            }
        }
    }
}

#[async_trait]
impl PermissionBracket for UnixPermissionBracket {
    async fn open(&self, base: &Path) {
        let base = base.to_path_buf();
        let _ = tokio::task::spawn_blocking(move || Self::set_mode_recursive(&base, OPEN_MODE))
            .await;
    }

    async fn close(&self, base: &Path) {
        let base = base.to_path_buf();
        let config = self.config.clone();
        let _ = tokio::task::spawn_blocking(move || {
            Self::chown_program_dirs(&config, &base);
            Self::set_mode_recursive(&base, CLOSED_MODE);
        })
        .await;
    }
}

/// No-op bracket, used when the permission switch is off and in tests.
#[derive(Debug, Default)]
pub struct NoopPermissionBracket;

#[async_trait]
impl PermissionBracket for NoopPermissionBracket {
    async fn open(&self, _base: &Path) {}
    async fn close(&self, _base: &Path) {}
}
