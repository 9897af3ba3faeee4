//! Process-level facts reported by the health endpoints.

use serde::Serialize;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Memory of the current process in MiB, rounded to two decimals.
///
/// A native process has no managed heap, so the figures are the operating
/// system's view: resident set size and reserved virtual memory.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct MemoryUsage {
    pub rss: f64,
    #[serde(rename = "virtual")]
    pub virtual_memory: f64,
}

pub fn to_mib(bytes: u64) -> f64 {
    (bytes as f64 / BYTES_PER_MIB * 100.0).round() / 100.0
}

/// Samples the current process. Falls back to zeros when the platform does
/// not expose process statistics.
pub fn memory_usage() -> MemoryUsage {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return MemoryUsage::default();
    };

    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::new().with_memory(),
    );

    system
        .process(pid)
        .map(|process| MemoryUsage {
            rss: to_mib(process.memory()),
            virtual_memory: to_mib(process.virtual_memory()),
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mib_rounds_to_two_decimals() {
        assert_eq!(to_mib(0), 0.0);
        assert_eq!(to_mib(1024 * 1024), 1.0);
        assert_eq!(to_mib(1_500_000), 1.43);
    }

    #[test]
    fn current_process_reports_memory() {
        let usage = memory_usage();
        assert!(usage.rss >= 0.0);
        assert!(usage.virtual_memory >= usage.rss);
    }
}
