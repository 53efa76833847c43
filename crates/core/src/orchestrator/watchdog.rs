//! Disk free-space introspection for the watchdog stage.

use std::path::Path;

use sysinfo::Disks;

/// Free space in GB on the filesystem holding `base`, when determinable.
///
/// The disk whose mount point is the longest prefix of `base` wins, so
/// nested mounts resolve to the right filesystem.
pub fn free_space_gb(base: &Path) -> Option<f64> {
    let disks = Disks::new_with_refreshed_list();
    disks
        .iter()
        .filter(|disk| base.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space() as f64 / 1e9)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_space_on_root() {
        // Every mount table resolves "/" to something.
        let free = free_space_gb(Path::new("/"));
        assert!(free.is_some());
        assert!(free.unwrap() >= 0.0);
    }
}
