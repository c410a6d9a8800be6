//! Huge-page-backed memory with no node constraint.

use crate::error::Result;
use crate::kind::Kind;
use crate::ops::KindOps;
use crate::placement::{self, MbindMode, NodeMask};
use crate::topology::{self, NodeOracle};

/// Operation table for the huge-page kind.
///
/// Placement mirrors the default kind; the difference is the
/// `MAP_HUGETLB` flag handed to the backend for new mappings, and
/// availability tracking the kernel's preallocated huge-page pool.
pub struct HugetlbOps;

/// Snapshot of the kernel huge-page pool, in pages and bytes-per-page.
#[derive(Debug, Default, Clone, Copy)]
struct HugePagePool {
    total: u64,
    free: u64,
    page_bytes: u64,
}

fn read_pool() -> HugePagePool {
    #[cfg(target_os = "linux")]
    {
        if let Ok(content) = std::fs::read_to_string("/proc/meminfo") {
            let mut pool = HugePagePool::default();
            for line in content.lines() {
                if let Some(v) = line.strip_prefix("HugePages_Total:") {
                    pool.total = v.trim().parse().unwrap_or(0);
                } else if let Some(v) = line.strip_prefix("HugePages_Free:") {
                    pool.free = v.trim().parse().unwrap_or(0);
                } else if let Some(v) = line.strip_prefix("Hugepagesize:") {
                    let kb = v.trim().trim_end_matches("kB").trim();
                    pool.page_bytes = kb.parse::<u64>().unwrap_or(0) * 1024;
                }
            }
            return pool;
        }
    }

    HugePagePool::default()
}

/// Check if huge pages are configured on the current system.
pub fn is_supported() -> bool {
    let pool = read_pool();
    pool.total > 0 && pool.page_bytes > 0
}

impl KindOps for HugetlbOps {
    fn is_available(&self, _kind: &Kind) -> bool {
        is_supported()
    }

    fn mbind_nodemask(&self, _kind: &Kind, max_node: usize) -> Result<NodeMask> {
        let topo = topology::system();
        let nodes: Vec<usize> = (0..topo.num_nodes()).collect();
        placement::online_nodemask(topo.as_ref(), &nodes, max_node)
    }

    fn mbind_mode(&self, _kind: &Kind) -> MbindMode {
        MbindMode::Preferred
    }

    fn mmap_flags(&self, _kind: &Kind) -> std::os::raw::c_int {
        placement::hugetlb_mmap_flag()
    }

    fn size(&self, _kind: &Kind) -> Result<(u64, u64)> {
        let pool = read_pool();
        Ok((pool.total * pool.page_bytes, pool.free * pool.page_bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds;

    #[test]
    fn availability_probe_does_not_panic() {
        let _ = kinds::hugetlb().is_available();
    }

    #[test]
    fn hugetlb_requests_huge_mappings() {
        #[cfg(target_os = "linux")]
        assert_eq!(kinds::hugetlb().mmap_flags(), libc::MAP_HUGETLB);

        #[cfg(not(target_os = "linux"))]
        assert_eq!(kinds::hugetlb().mmap_flags(), 0);
    }

    #[test]
    fn pool_size_is_consistent() {
        let (total, free) = kinds::hugetlb().get_size().unwrap();
        assert!(total >= free);
    }

    #[test]
    fn arena_routing_works_without_huge_pages() {
        // The arena map builds regardless of pool state; only mappings
        // would fail on a machine without huge pages.
        let kind = kinds::hugetlb();
        let a = kind.arena(0).unwrap();
        assert_eq!(kind.arena(0).unwrap(), a);
    }
}
