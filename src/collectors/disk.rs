use crate::collectors::{HostProbe, Partition, PartitionUsage, ProbeError};
use crate::report::DiskSnapshot;
use tracing::debug;

/// Enumerates partitions, dropping those the caller may not inspect.
pub fn collect_disks<P: HostProbe + ?Sized>(probe: &mut P) -> Vec<DiskSnapshot> {
    let partitions = probe.partitions();
    let mut out = Vec::with_capacity(partitions.len());
    for partition in partitions {
        let usage = match probe.partition_usage(&partition) {
            Ok(usage) => usage,
            Err(ProbeError::PermissionDenied { .. }) => continue,
            Err(err) => {
                debug!(mount = %partition.mountpoint, error = %err, "не удалось получить заполненность раздела, используются данные перечисления");
                listed_usage(&partition)
            }
        };
        out.push(DiskSnapshot {
            device: partition.device,
            mountpoint: partition.mountpoint,
            fs_type: partition.fs_type,
            total_bytes: usage.total_bytes,
            used_bytes: usage.used_bytes,
            free_bytes: usage.free_bytes,
            usage_percent: usage.percent,
        });
    }
    out
}

/// Builds usage figures from raw block counts.
///
/// `free_user` is the space available to unprivileged users and `free_root`
/// includes reserved blocks; the percentage is relative to what a user can
/// actually fill.
pub fn usage_from_blocks(total: u64, free_root: u64, free_user: u64) -> PartitionUsage {
    let used = total.saturating_sub(free_root);
    let denom = used.saturating_add(free_user);
    let percent = if denom > 0 {
        let raw = used as f64 / denom as f64 * 100.0;
        (raw * 10.0).round() / 10.0
    } else {
        0.0
    };
    PartitionUsage {
        total_bytes: total,
        used_bytes: used,
        free_bytes: free_user,
        percent,
    }
}

#[cfg(unix)]
pub fn partition_usage(partition: &Partition) -> Result<PartitionUsage, ProbeError> {
    use nix::errno::Errno;
    use nix::sys::statvfs::statvfs;

    let stat = statvfs(partition.mountpoint.as_str()).map_err(|errno| match errno {
        Errno::EACCES | Errno::EPERM => ProbeError::PermissionDenied {
            path: partition.mountpoint.clone(),
        },
        other => ProbeError::Io {
            path: partition.mountpoint.clone(),
            source: std::io::Error::from(other),
        },
    })?;

    let frag = stat.fragment_size() as u64;
    Ok(usage_from_blocks(
        (stat.blocks() as u64).saturating_mul(frag),
        (stat.blocks_free() as u64).saturating_mul(frag),
        (stat.blocks_available() as u64).saturating_mul(frag),
    ))
}

#[cfg(not(unix))]
pub fn partition_usage(partition: &Partition) -> Result<PartitionUsage, ProbeError> {
    if partition.listed_total_bytes == 0 {
        // Unready removable media reports zero space and cannot be queried.
        return Err(ProbeError::PermissionDenied {
            path: partition.mountpoint.clone(),
        });
    }
    Ok(listed_usage(partition))
}

/// Usage from the space figures reported during enumeration; reserved
/// blocks are not distinguished there.
pub fn listed_usage(partition: &Partition) -> PartitionUsage {
    usage_from_blocks(
        partition.listed_total_bytes,
        partition.listed_available_bytes,
        partition.listed_available_bytes,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_blocks_count_as_used_but_not_free() {
        let usage = usage_from_blocks(1000, 200, 150);
        assert_eq!(usage.used_bytes, 800);
        assert_eq!(usage.free_bytes, 150);
        assert_eq!(usage.total_bytes, 1000);
        // 800 / 950
        assert!((usage.percent - 84.2).abs() < 1e-9);
    }

    #[test]
    fn empty_filesystem_reports_zero_percent() {
        let usage = usage_from_blocks(0, 0, 0);
        assert_eq!(usage.percent, 0.0);
        assert_eq!(usage.used_bytes, 0);
    }

    #[test]
    fn listed_space_has_no_reserved_blocks() {
        let partition = Partition {
            device: "C:".to_string(),
            mountpoint: "C:\\".to_string(),
            fs_type: "NTFS".to_string(),
            listed_total_bytes: 400,
            listed_available_bytes: 100,
        };
        let usage = listed_usage(&partition);
        assert_eq!(usage.used_bytes, 300);
        assert_eq!(usage.free_bytes, 100);
        assert_eq!(usage.percent, 75.0);
    }

    #[test]
    fn full_filesystem_is_hundred_percent() {
        let usage = usage_from_blocks(4096, 0, 0);
        assert_eq!(usage.percent, 100.0);
    }

    #[cfg(unix)]
    #[test]
    fn root_partition_usage_is_readable() {
        let root = Partition {
            device: "rootfs".to_string(),
            mountpoint: "/".to_string(),
            fs_type: String::new(),
            listed_total_bytes: 0,
            listed_available_bytes: 0,
        };
        let usage = partition_usage(&root).expect("statvfs on /");
        assert!(usage.used_bytes <= usage.total_bytes);
        assert!((0.0..=100.0).contains(&usage.percent));
    }

    #[cfg(unix)]
    #[test]
    fn missing_mountpoint_is_an_io_error() {
        let ghost = Partition {
            device: "ghost".to_string(),
            mountpoint: "/nonexistent/hostsnap-test-mount".to_string(),
            fs_type: String::new(),
            listed_total_bytes: 0,
            listed_available_bytes: 0,
        };
        assert!(matches!(
            partition_usage(&ghost),
            Err(ProbeError::Io { .. })
        ));
    }
}
