//! The default kind: the ordinary process heap.

use std::os::raw::c_void;
use std::ptr::NonNull;

use crate::error::{Error, Result};
use crate::kind::Kind;
use crate::ops::KindOps;
use crate::placement::{self, MbindMode, NodeMask};
use crate::topology::{self, NodeOracle};

/// Operation table for the default kind.
///
/// Allocations bypass the arena map and go straight to the process
/// allocator, so callers that never leave the default kind pay nothing
/// for the dispatch layer.
pub struct DefaultOps;

impl KindOps for DefaultOps {
    fn is_available(&self, _kind: &Kind) -> bool {
        true
    }

    fn mbind_nodemask(&self, _kind: &Kind, max_node: usize) -> Result<NodeMask> {
        let topo = topology::system();
        let nodes: Vec<usize> = (0..topo.num_nodes()).collect();
        placement::online_nodemask(topo.as_ref(), &nodes, max_node)
    }

    fn mbind_mode(&self, _kind: &Kind) -> MbindMode {
        MbindMode::Preferred
    }

    fn size(&self, _kind: &Kind) -> Result<(u64, u64)> {
        Ok(topology::system_memory())
    }

    fn malloc(&self, _kind: &Kind, size: usize) -> *mut c_void {
        unsafe { libc::malloc(size) }
    }

    fn calloc(&self, _kind: &Kind, num: usize, size: usize) -> *mut c_void {
        if num.checked_mul(size).is_none() {
            return std::ptr::null_mut();
        }
        unsafe { libc::calloc(num, size) }
    }

    fn posix_memalign(
        &self,
        _kind: &Kind,
        alignment: usize,
        size: usize,
    ) -> Result<NonNull<c_void>> {
        let mut ptr: *mut c_void = std::ptr::null_mut();
        let rc = unsafe { libc::posix_memalign(&mut ptr, alignment, size) };
        if rc == libc::EINVAL {
            return Err(Error::Alignment);
        }
        if rc != 0 || ptr.is_null() {
            return Err(Error::Malloc);
        }
        Ok(unsafe { NonNull::new_unchecked(ptr) })
    }

    unsafe fn realloc(&self, _kind: &Kind, ptr: *mut c_void, size: usize) -> *mut c_void {
        libc::realloc(ptr, size)
    }

    unsafe fn free(&self, _kind: &Kind, ptr: *mut c_void) {
        libc::free(ptr)
    }
}
