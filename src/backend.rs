//! Arena allocator backend.
//!
//! The core routes every allocation to a backend arena; this module
//! defines the interface it needs from the general-purpose allocator and a
//! reference backend over the process heap. A production backend carving
//! dedicated mappings per arena is expected to consult
//! [`crate::heap::partition_get_mmap_flags`] and
//! [`crate::heap::partition_mbind`] whenever it grows an arena, so new
//! pages land on the owning kind's nodes; the reference backend records
//! the flags at arena creation to keep that contract exercised.

use std::os::raw::{c_int, c_void};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::error::{Error, Result};

/// Identifier of a backend arena.
pub type ArenaId = u32;

/// The allocator interface the kind dispatch layer builds on.
///
/// Arena ids are dense and never reused. Allocation entry points mirror
/// the C allocation family: the malloc-shaped calls return null on
/// failure rather than an error value.
pub trait ArenaBackend: Send + Sync {
    /// Create a fresh arena owned by `partition`.
    fn create_arena(&self, partition: u32) -> Result<ArenaId>;

    /// Allocate `size` bytes from `arena`.
    fn malloc(&self, arena: ArenaId, size: usize) -> *mut c_void;

    /// Allocate a zeroed `num * size` bytes from `arena`.
    fn calloc(&self, arena: ArenaId, num: usize, size: usize) -> *mut c_void;

    /// Allocate `size` bytes aligned to `alignment` from `arena`.
    fn posix_memalign(&self, arena: ArenaId, alignment: usize, size: usize)
        -> Result<NonNull<c_void>>;

    /// Resize `ptr` within `arena`.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live pointer previously returned by this
    /// backend and not yet freed.
    unsafe fn realloc(&self, arena: ArenaId, ptr: *mut c_void, size: usize) -> *mut c_void;

    /// Return `ptr` to `arena`.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live pointer previously returned by this
    /// backend, and must belong to `arena`.
    unsafe fn free(&self, arena: ArenaId, ptr: *mut c_void);
}

struct ArenaRecord {
    partition: u32,
    mmap_flags: c_int,
    allocs: AtomicU64,
    frees: AtomicU64,
}

/// Reference backend over the process heap.
///
/// Arenas are bookkeeping records: allocations are served by libc and the
/// per-arena counters let callers observe routing. Placement enforcement
/// for this backend is applied by the kinds themselves on the returned
/// ranges.
pub struct SystemBackend {
    arenas: RwLock<Vec<ArenaRecord>>,
}

static SYSTEM: Lazy<SystemBackend> = Lazy::new(|| SystemBackend {
    arenas: RwLock::new(Vec::new()),
});

/// The process-wide reference backend.
#[inline]
pub fn system() -> &'static SystemBackend {
    &SYSTEM
}

impl SystemBackend {
    /// Number of arenas created so far.
    pub fn arena_count(&self) -> usize {
        self.arenas.read().len()
    }

    /// Partition the arena was created for.
    pub fn arena_partition(&self, arena: ArenaId) -> Option<u32> {
        self.arenas.read().get(arena as usize).map(|a| a.partition)
    }

    /// mmap flags recorded for the arena's partition at creation.
    pub fn arena_mmap_flags(&self, arena: ArenaId) -> Option<c_int> {
        self.arenas.read().get(arena as usize).map(|a| a.mmap_flags)
    }

    /// Allocation and free counts served by the arena.
    pub fn arena_stats(&self, arena: ArenaId) -> Option<(u64, u64)> {
        self.arenas.read().get(arena as usize).map(|a| {
            (
                a.allocs.load(Ordering::Relaxed),
                a.frees.load(Ordering::Relaxed),
            )
        })
    }

    fn record_alloc(&self, arena: ArenaId, ptr: *mut c_void) {
        if !ptr.is_null() {
            if let Some(a) = self.arenas.read().get(arena as usize) {
                a.allocs.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl ArenaBackend for SystemBackend {
    fn create_arena(&self, partition: u32) -> Result<ArenaId> {
        // The flags a mapping-backed arena would pass to mmap when it
        // grows; recorded here so the grow-path contract stays live.
        let mmap_flags = crate::heap::partition_get_mmap_flags(partition)?;
        let mut arenas = self.arenas.write();
        let id = ArenaId::try_from(arenas.len()).map_err(|_| Error::Runtime)?;
        arenas.push(ArenaRecord {
            partition,
            mmap_flags,
            allocs: AtomicU64::new(0),
            frees: AtomicU64::new(0),
        });
        tracing::debug!(arena = id, partition, mmap_flags, "created arena");
        Ok(id)
    }

    fn malloc(&self, arena: ArenaId, size: usize) -> *mut c_void {
        let ptr = unsafe { libc::malloc(size) };
        self.record_alloc(arena, ptr);
        ptr
    }

    fn calloc(&self, arena: ArenaId, num: usize, size: usize) -> *mut c_void {
        if num.checked_mul(size).is_none() {
            return std::ptr::null_mut();
        }
        let ptr = unsafe { libc::calloc(num, size) };
        self.record_alloc(arena, ptr);
        ptr
    }

    fn posix_memalign(
        &self,
        arena: ArenaId,
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
        self.record_alloc(arena, ptr);
        Ok(unsafe { NonNull::new_unchecked(ptr) })
    }

    unsafe fn realloc(&self, arena: ArenaId, ptr: *mut c_void, size: usize) -> *mut c_void {
        let fresh = ptr.is_null();
        let out = libc::realloc(ptr, size);
        if fresh {
            self.record_alloc(arena, out);
        }
        out
    }

    unsafe fn free(&self, arena: ArenaId, ptr: *mut c_void) {
        if ptr.is_null() {
            return;
        }
        libc::free(ptr);
        if let Some(a) = self.arenas.read().get(arena as usize) {
            a.frees.fetch_add(1, Ordering::Relaxed);
        }
    }
}
