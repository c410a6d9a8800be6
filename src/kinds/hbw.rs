//! High-bandwidth memory kinds.
//!
//! Four built-in variants share this table: strict and preferred
//! placement, each with and without huge-page mappings. The target node
//! set comes from the `MEMBIND_HBW_NODES` environment variable when set,
//! otherwise from the topology's memory-only nodes, which is how
//! on-package high-bandwidth memory is exposed by the platform.

use std::os::raw::{c_int, c_void};
use std::ptr::NonNull;
use std::sync::Arc;

use crate::backend::{self, ArenaBackend};
use crate::error::{Error, Result};
use crate::kind::Kind;
use crate::ops::KindOps;
use crate::placement::{self, MbindMode, NodeMask};
use crate::topology::{self, NodeOracle};
use crate::utils::alignment::{align_down, align_up, page_size};

/// Ranges at least this large are pinned to the kind's nodes after
/// allocation. Below this the range may share pages with unrelated data,
/// and mbind works on whole pages.
const MBIND_THRESHOLD: usize = 256 * 1024;

/// Operation table for the high-bandwidth kinds.
pub struct HbwOps {
    topology: Arc<dyn NodeOracle>,
    mode: MbindMode,
    huge: bool,
}

impl HbwOps {
    /// Table over the detected system topology.
    pub fn new(mode: MbindMode, huge: bool) -> HbwOps {
        HbwOps {
            topology: topology::system(),
            mode,
            huge,
        }
    }

    /// Table over a caller-supplied oracle.
    pub fn with_oracle(oracle: Arc<dyn NodeOracle>, mode: MbindMode, huge: bool) -> HbwOps {
        HbwOps {
            topology: oracle,
            mode,
            huge,
        }
    }

    fn target_nodes(&self) -> Result<Vec<usize>> {
        if let Some(nodes) = topology::hbw_nodes_from_env()? {
            return Ok(nodes);
        }
        Ok(self.topology.memory_only_nodes())
    }

    /// Pin the page-aligned interior of a fresh range to the target
    /// nodes. Returns false when strict placement could not be honored.
    fn enforce(&self, kind: &Kind, ptr: *mut c_void, size: usize) -> bool {
        if size < MBIND_THRESHOLD {
            return true;
        }
        let page = page_size();
        let start = align_up(ptr as usize, page);
        let end = align_down(ptr as usize + size, page);
        if end <= start {
            return true;
        }
        match unsafe { KindOps::mbind(self, kind, start as *mut c_void, end - start) } {
            Ok(()) => true,
            Err(err) => {
                if self.mode == MbindMode::Bind {
                    tracing::warn!(kind = %kind.name(), ?err, "strict placement failed");
                    false
                } else {
                    tracing::debug!(kind = %kind.name(), ?err, "preferred placement fell back");
                    true
                }
            }
        }
    }

    /// Rebind after a resize; the original range is gone, so failure
    /// only logs.
    fn enforce_best_effort(&self, kind: &Kind, ptr: *mut c_void, size: usize) {
        let page = page_size();
        let start = align_up(ptr as usize, page);
        let end = align_down(ptr as usize + size, page);
        if end <= start {
            return;
        }
        if let Err(err) = unsafe { KindOps::mbind(self, kind, start as *mut c_void, end - start) } {
            tracing::debug!(kind = %kind.name(), ?err, "rebind after realloc failed");
        }
    }
}

impl KindOps for HbwOps {
    fn is_available(&self, _kind: &Kind) -> bool {
        match self.target_nodes() {
            Ok(nodes) => nodes
                .iter()
                .any(|&n| self.topology.is_node_available(n) && self.topology.node_memory(n).1 > 0),
            Err(_) => false,
        }
    }

    fn mbind_nodemask(&self, _kind: &Kind, max_node: usize) -> Result<NodeMask> {
        let targets = self.target_nodes()?;
        placement::online_nodemask(self.topology.as_ref(), &targets, max_node)
    }

    fn mbind_mode(&self, _kind: &Kind) -> MbindMode {
        self.mode
    }

    fn mmap_flags(&self, _kind: &Kind) -> c_int {
        if self.huge {
            placement::hugetlb_mmap_flag()
        } else {
            0
        }
    }

    fn size(&self, _kind: &Kind) -> Result<(u64, u64)> {
        let targets = self.target_nodes()?;
        if targets.is_empty() {
            return Err(Error::Unavailable);
        }
        let mut total = 0;
        let mut free = 0;
        for node in targets {
            let (t, f) = self.topology.node_memory(node);
            total += t;
            free += f;
        }
        Ok((total, free))
    }

    fn init_check(&self, kind: &Kind) -> Result<()> {
        let targets = self.target_nodes()?;
        if targets.is_empty() {
            tracing::debug!(kind = %kind.name(), "no high-bandwidth nodes");
            return Err(Error::Unavailable);
        }
        Ok(())
    }

    fn malloc(&self, kind: &Kind, size: usize) -> *mut c_void {
        let arena = match kind.arena_for_current_cpu() {
            Ok(a) => a,
            Err(_) => return std::ptr::null_mut(),
        };
        let ptr = backend::system().malloc(arena, size);
        if !ptr.is_null() && !self.enforce(kind, ptr, size) {
            unsafe { backend::system().free(arena, ptr) };
            return std::ptr::null_mut();
        }
        ptr
    }

    fn calloc(&self, kind: &Kind, num: usize, size: usize) -> *mut c_void {
        let arena = match kind.arena_for_current_cpu() {
            Ok(a) => a,
            Err(_) => return std::ptr::null_mut(),
        };
        let ptr = backend::system().calloc(arena, num, size);
        let bytes = num.saturating_mul(size);
        if !ptr.is_null() && !self.enforce(kind, ptr, bytes) {
            unsafe { backend::system().free(arena, ptr) };
            return std::ptr::null_mut();
        }
        ptr
    }

    fn posix_memalign(
        &self,
        kind: &Kind,
        alignment: usize,
        size: usize,
    ) -> Result<NonNull<c_void>> {
        let arena = kind.arena_for_current_cpu()?;
        let ptr = backend::system().posix_memalign(arena, alignment, size)?;
        if !self.enforce(kind, ptr.as_ptr(), size) {
            unsafe { backend::system().free(arena, ptr.as_ptr()) };
            return Err(Error::Mbind(0));
        }
        Ok(ptr)
    }

    unsafe fn realloc(&self, kind: &Kind, ptr: *mut c_void, size: usize) -> *mut c_void {
        let arena = match kind.arena_for_current_cpu() {
            Ok(a) => a,
            Err(_) => return std::ptr::null_mut(),
        };
        let out = backend::system().realloc(arena, ptr, size);
        // A moved range cannot be restored on placement failure, so
        // enforcement here is best effort even for strict kinds.
        if !out.is_null() && size >= MBIND_THRESHOLD {
            self.enforce_best_effort(kind, out, size);
        }
        out
    }
}
