//! Admission control: short-circuit writes when the storage volume is under
//! disk pressure. Stateless; every check is a fresh probe.

use std::{
    path::{
        Path,
        PathBuf,
    },
    sync::Arc,
};

use anyhow::Context;
use errors::ErrorMetadata;
use sysinfo::Disks;

/// One-call disk usage probe, injectable so tests can dictate pressure.
pub trait DiskProbe: Send + Sync + 'static {
    /// Used percentage of the volume holding `path`, in `[0, 100]`.
    fn usage_percent(&self, path: &Path) -> anyhow::Result<u64>;
}

/// Probes the host's mounted disks and picks the most specific mount
/// containing the storage path.
pub struct SysinfoProbe;

impl DiskProbe for SysinfoProbe {
    fn usage_percent(&self, path: &Path) -> anyhow::Result<u64> {
        let disks = Disks::new_with_refreshed_list();
        let disk = disks
            .iter()
            .filter(|d| path.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len())
            .with_context(|| format!("no mounted disk contains {}", path.display()))?;
        let total = disk.total_space();
        anyhow::ensure!(total > 0, "disk reports zero total space");
        let used = total - disk.available_space();
        Ok(used * 100 / total)
    }
}

/// Gate for the write path. `max_disk_usage_percent` of zero means the node
/// is read-only; values above 100 clamp to 100.
pub struct DiskMonitor {
    path: PathBuf,
    max_disk_usage_percent: u64,
    probe: Arc<dyn DiskProbe>,
}

impl DiskMonitor {
    pub fn new(
        path: impl Into<PathBuf>,
        max_disk_usage_percent: u64,
        probe: Arc<dyn DiskProbe>,
    ) -> Self {
        Self {
            path: path.into(),
            max_disk_usage_percent,
            probe,
        }
    }

    pub fn check_health(&self) -> anyhow::Result<()> {
        if self.max_disk_usage_percent == 0 {
            anyhow::bail!(ErrorMetadata::overloaded(
                "DiskFull",
                "writes are disabled: max disk usage percent is 0 (readonly)",
            ));
        }
        let threshold = self.max_disk_usage_percent.min(100);
        let used = self.probe.usage_percent(&self.path)?;
        if used >= threshold {
            anyhow::bail!(ErrorMetadata::overloaded(
                "DiskFull",
                format!(
                    "disk usage {used}% of {} is at or above the {threshold}% limit",
                    self.path.display()
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        path::Path,
        sync::Arc,
    };

    use errors::ErrorMetadataAnyhowExt;

    use super::{
        DiskMonitor,
        DiskProbe,
    };

    struct FixedProbe(u64);

    impl DiskProbe for FixedProbe {
        fn usage_percent(&self, _path: &Path) -> anyhow::Result<u64> {
            Ok(self.0)
        }
    }

    fn monitor(threshold: u64, used: u64) -> DiskMonitor {
        DiskMonitor::new("/data", threshold, Arc::new(FixedProbe(used)))
    }

    #[test]
    fn test_zero_threshold_is_readonly() {
        let err = monitor(0, 0).check_health().unwrap_err();
        assert!(err.is_overloaded());
        assert!(err.to_string().contains("readonly"));
    }

    #[test]
    fn test_threshold_above_100_clamps() {
        assert!(monitor(101, 99).check_health().is_ok());
        let err = monitor(101, 100).check_health().unwrap_err();
        assert!(err.is_overloaded());
    }

    #[test]
    fn test_rejects_at_or_above_threshold() {
        assert!(monitor(85, 84).check_health().is_ok());
        assert!(monitor(85, 85).check_health().unwrap_err().is_overloaded());
        assert!(monitor(85, 92).check_health().unwrap_err().is_overloaded());
    }
}
