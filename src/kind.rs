//! Kind records and per-CPU arena routing.
//!
//! A kind pairs a registered name and partition index with its operation
//! table and owns the per-CPU arena map that routes concurrent callers to
//! distinct backend arenas. The map is built lazily, exactly once, and a
//! failed build is sticky: every later allocation against the kind fails
//! with the error the build produced.

use std::fmt;
use std::os::raw::{c_int, c_void};
use std::ptr::NonNull;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::backend::{self, ArenaBackend, ArenaId};
use crate::error::{Error, Result};
use crate::ops::KindOps;
use crate::placement::{MbindMode, NodeMask};
use crate::registry;
use crate::topology;

/// A named, polymorphic handle to a memory placement policy.
///
/// Kinds are created through the registry and shared by reference count;
/// the registry holds one reference for as long as the kind is
/// registered, and destroying a kind drops that reference while any
/// outstanding handles stay usable.
pub struct Kind {
    name: String,
    partition: u32,
    ops: Box<dyn KindOps>,
    // Built at most once; the stored Result makes failure sticky.
    arenas: OnceCell<Result<Box<[ArenaId]>>>,
}

impl Kind {
    pub(crate) fn new(name: &str, partition: u32, ops: Box<dyn KindOps>) -> Arc<Kind> {
        Arc::new(Kind {
            name: name.to_owned(),
            partition,
            ops,
            arenas: OnceCell::new(),
        })
    }

    /// The kind's registered name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The kind's partition index.
    #[inline]
    pub fn partition(&self) -> u32 {
        self.partition
    }

    #[inline]
    pub(crate) fn ops(&self) -> &dyn KindOps {
        self.ops.as_ref()
    }

    /// Whether the memory this kind targets is currently usable.
    pub fn is_available(&self) -> bool {
        self.ops.is_available(self)
    }

    /// Node mask for mbind, bounded to `max_node` bits.
    pub fn mbind_nodemask(&self, max_node: usize) -> Result<NodeMask> {
        self.ops.mbind_nodemask(self, max_node)
    }

    /// Placement enforcement mode for mbind.
    pub fn mbind_mode(&self) -> MbindMode {
        self.ops.mbind_mode(self)
    }

    /// Flags the backend adds to mmap when growing this kind's arenas.
    pub fn mmap_flags(&self) -> c_int {
        self.ops.mmap_flags(self)
    }

    /// Total and free bytes on the kind's target nodes.
    pub fn get_size(&self) -> Result<(u64, u64)> {
        if registry::is_finalized() {
            return Err(Error::Runtime);
        }
        self.ops.size(self)
    }

    /// Pin `len` bytes at `ptr` to this kind's nodes.
    ///
    /// # Safety
    ///
    /// `ptr` must point to `len` bytes mapped by this process.
    pub unsafe fn mbind(&self, ptr: *mut c_void, len: usize) -> Result<()> {
        self.ops.mbind(self, ptr, len)
    }

    /// The backend arena serving `cpu` for this kind.
    ///
    /// The first call builds the per-CPU map, sized to the CPU count
    /// visible at that moment; a CPU hot-added afterwards is out of range
    /// and fails with an invalid-argument error rather than growing the
    /// map.
    pub fn arena(&self, cpu: usize) -> Result<ArenaId> {
        let map = self.arenas.get_or_init(|| self.build_arena_map());
        match map {
            Ok(map) => map.get(cpu).copied().ok_or(Error::Invalid),
            Err(e) => Err(*e),
        }
    }

    /// The backend arena serving the calling thread's current CPU.
    #[inline]
    pub fn arena_for_current_cpu(&self) -> Result<ArenaId> {
        self.arena(topology::current_cpu())
    }

    fn build_arena_map(&self) -> Result<Box<[ArenaId]>> {
        self.ops.init_check(self)?;
        let cpus = topology::cpu_count();
        let mut map = Vec::with_capacity(cpus);
        for _ in 0..cpus {
            map.push(backend::system().create_arena(self.partition)?);
        }
        tracing::debug!(kind = %self.name, cpus, "built per-cpu arena map");
        Ok(map.into_boxed_slice())
    }

    /// Allocate `size` bytes of this kind of memory; null on failure.
    pub fn malloc(&self, size: usize) -> *mut c_void {
        if registry::is_finalized() {
            return std::ptr::null_mut();
        }
        self.ops.malloc(self, size)
    }

    /// Allocate zeroed `num * size` bytes; null on failure or overflow.
    pub fn calloc(&self, num: usize, size: usize) -> *mut c_void {
        if registry::is_finalized() {
            return std::ptr::null_mut();
        }
        self.ops.calloc(self, num, size)
    }

    /// Allocate `size` bytes aligned to `alignment`.
    ///
    /// `alignment` must be a power of two no smaller than a pointer.
    pub fn posix_memalign(&self, alignment: usize, size: usize) -> Result<NonNull<c_void>> {
        if registry::is_finalized() {
            return Err(Error::Runtime);
        }
        if !alignment.is_power_of_two() || alignment < std::mem::size_of::<*mut c_void>() {
            return Err(Error::Alignment);
        }
        self.ops.posix_memalign(self, alignment, size)
    }

    /// Resize `ptr` within this kind; null on failure.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live pointer obtained from this kind and
    /// not yet freed.
    pub unsafe fn realloc(&self, ptr: *mut c_void, size: usize) -> *mut c_void {
        if registry::is_finalized() {
            return std::ptr::null_mut();
        }
        self.ops.realloc(self, ptr, size)
    }

    /// Return `ptr` to this kind.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live pointer obtained from this kind and
    /// not yet freed. Freeing through a different kind than the one that
    /// allocated the pointer is a precondition violation.
    pub unsafe fn free(&self, ptr: *mut c_void) {
        if ptr.is_null() || registry::is_finalized() {
            return;
        }
        self.ops.free(self, ptr);
    }
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kind")
            .field("name", &self.name)
            .field("partition", &self.partition)
            .field("arena_map_built", &self.arenas.get().is_some())
            .finish()
    }
}
