//! NUMA placement primitives.
//!
//! This module computes the inputs the arena backend needs when it grows a
//! kind's arena with a new OS mapping: the mbind node mask, the mbind mode,
//! and the mmap flags. It also wraps the raw mbind syscall used to pin an
//! existing range to a kind's nodes.

use std::os::raw::{c_int, c_void};

use crate::error::{Error, Result};
use crate::topology::NodeOracle;

// Memory policy numbers from linux/mempolicy.h; libc does not export them.
const MPOL_PREFERRED: c_int = 1;
const MPOL_BIND: c_int = 2;

// Migrate pages already faulted in when rebinding a live range.
#[cfg(target_os = "linux")]
const MPOL_MF_MOVE: c_int = 1 << 1;

/// Widest node id the built-in policies consider when they size a mask
/// themselves; matches the kernel's usual MAX_NUMNODES ceiling.
pub const MAX_NODE: usize = 1024;

/// How strictly a kind's node mask is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbindMode {
    /// Fail the allocation rather than place pages off the mask.
    Bind,

    /// Place pages on the mask when possible, fall back to any node.
    Preferred,
}

impl MbindMode {
    /// The kernel memory-policy number for this mode.
    #[inline]
    pub fn mpol(self) -> c_int {
        match self {
            MbindMode::Bind => MPOL_BIND,
            MbindMode::Preferred => MPOL_PREFERRED,
        }
    }
}

/// The mmap flag requesting huge-page-backed mappings, 0 where unsupported.
#[inline]
pub fn hugetlb_mmap_flag() -> c_int {
    #[cfg(target_os = "linux")]
    {
        libc::MAP_HUGETLB
    }

    #[cfg(not(target_os = "linux"))]
    {
        0
    }
}

/// A bitmask of NUMA nodes, bounded to a caller-chosen width.
///
/// The mask is stored as whole 64-bit words so it can be handed to the
/// mbind syscall directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMask {
    bits: Vec<u64>,
    max_node: usize,
}

impl NodeMask {
    /// An empty mask wide enough for nodes `0..max_node`.
    pub fn new(max_node: usize) -> NodeMask {
        let words = max_node.div_ceil(64).max(1);
        NodeMask {
            bits: vec![0; words],
            max_node: max_node.max(1),
        }
    }

    /// Set `node` in the mask; fails when the node does not fit the width.
    pub fn set(&mut self, node: usize) -> Result<()> {
        if node >= self.max_node {
            return Err(Error::Invalid);
        }
        self.bits[node / 64] |= 1u64 << (node % 64);
        Ok(())
    }

    /// Whether `node` is set.
    #[inline]
    pub fn is_set(&self, node: usize) -> bool {
        node < self.max_node && self.bits[node / 64] & (1u64 << (node % 64)) != 0
    }

    /// Whether no node is set.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|&w| w == 0)
    }

    /// Number of nodes set.
    pub fn count(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Node ids set in the mask, ascending.
    pub fn nodes(&self) -> Vec<usize> {
        (0..self.max_node).filter(|&n| self.is_set(n)).collect()
    }

    /// The mask words, for handing to the kernel.
    #[inline]
    pub fn words(&self) -> &[u64] {
        &self.bits
    }

    /// Bit width the kernel should consider, always a whole-word multiple.
    #[inline]
    pub fn width(&self) -> usize {
        self.bits.len() * 64
    }
}

/// Build the mask of nodes `targets` names that are currently online.
///
/// An offline target is dropped, not an error; a target that does not fit
/// `max_node` bits fails with an invalid-argument error so callers never
/// get a silently truncated mask.
pub fn online_nodemask(
    oracle: &dyn NodeOracle,
    targets: &[usize],
    max_node: usize,
) -> Result<NodeMask> {
    let mut mask = NodeMask::new(max_node);
    for &node in targets {
        if node >= max_node {
            return Err(Error::Invalid);
        }
        if oracle.is_node_available(node) {
            mask.set(node)?;
        }
    }
    Ok(mask)
}

/// Pin `len` bytes at `ptr` to the nodes in `mask`.
///
/// # Safety
///
/// `ptr` must point to `len` bytes of memory mapped by this process, and
/// rebinding must not race with unmapping the range.
pub unsafe fn mbind_range(
    ptr: *mut c_void,
    len: usize,
    mode: MbindMode,
    mask: &NodeMask,
) -> Result<()> {
    if ptr.is_null() || len == 0 || mask.is_empty() {
        return Err(Error::Invalid);
    }

    #[cfg(target_os = "linux")]
    {
        let rc = libc::syscall(
            libc::SYS_mbind,
            ptr,
            len,
            mode.mpol(),
            mask.words().as_ptr(),
            mask.width() as libc::c_ulong,
            MPOL_MF_MOVE,
        );
        if rc != 0 {
            let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
            tracing::warn!(errno, len, mode = ?mode, "mbind failed");
            return Err(Error::Mbind(errno));
        }
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    {
        let _ = mode;
        Err(Error::Mbind(libc::ENOSYS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::SysfsTopology;

    #[test]
    fn mask_set_and_query() {
        let mut mask = NodeMask::new(128);
        assert!(mask.is_empty());
        mask.set(0).unwrap();
        mask.set(65).unwrap();
        assert!(mask.is_set(0));
        assert!(mask.is_set(65));
        assert!(!mask.is_set(1));
        assert_eq!(mask.count(), 2);
        assert_eq!(mask.nodes(), vec![0, 65]);
        assert_eq!(mask.words().len(), 2);
    }

    #[test]
    fn mask_rejects_out_of_width_nodes() {
        let mut mask = NodeMask::new(4);
        assert_eq!(mask.set(4), Err(Error::Invalid));
        assert!(!mask.is_set(4));
    }

    #[test]
    fn mask_width_is_word_rounded() {
        assert_eq!(NodeMask::new(1).width(), 64);
        assert_eq!(NodeMask::new(64).width(), 64);
        assert_eq!(NodeMask::new(65).width(), 128);
    }

    #[test]
    fn online_mask_rejects_narrow_width() {
        let topo = SysfsTopology::detect();
        assert_eq!(online_nodemask(&topo, &[8], 8), Err(Error::Invalid));
    }

    #[test]
    fn online_mask_drops_missing_nodes() {
        let topo = SysfsTopology::detect();
        // A node far past anything real: wide enough mask, node offline.
        let mask = online_nodemask(&topo, &[1000], 2048).unwrap();
        assert!(mask.is_empty());
    }

    #[test]
    fn online_mask_keeps_node_zero() {
        let topo = SysfsTopology::detect();
        let mask = online_nodemask(&topo, &[0], 64).unwrap();
        assert!(mask.is_set(0));
    }

    #[test]
    fn modes_map_to_kernel_policies() {
        assert_eq!(MbindMode::Bind.mpol(), 2);
        assert_eq!(MbindMode::Preferred.mpol(), 1);
    }

    #[test]
    fn mbind_rejects_null_and_empty() {
        let mask = NodeMask::new(64);
        let err = unsafe { mbind_range(std::ptr::null_mut(), 4096, MbindMode::Bind, &mask) };
        assert_eq!(err, Err(Error::Invalid));
    }
}
