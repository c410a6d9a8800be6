//! The kind operation table.
//!
//! Every kind is a policy behind one trait: built-in kinds and
//! user-registered kinds alike supply a [`KindOps`] implementation, and
//! the dispatch layer never branches on which kind it is talking to.
//! Adding a placement policy means writing one implementation of this
//! trait, not touching the dispatch logic.

use std::os::raw::{c_int, c_void};
use std::ptr::NonNull;

use crate::backend::{self, ArenaBackend};
use crate::error::{Error, Result};
use crate::kind::Kind;
use crate::placement::{self, MbindMode, NodeMask};

/// Behavior table a kind implements.
///
/// The allocation family has default implementations that resolve the
/// calling CPU's arena and delegate to the backend; policies that need to
/// enforce placement on returned ranges override them.
pub trait KindOps: Send + Sync + 'static {
    /// Whether the memory this kind targets currently exists and has free
    /// capacity. Never fails; ambiguity reads as unavailable.
    fn is_available(&self, kind: &Kind) -> bool;

    /// Bitmask of NUMA nodes the kind may place pages on, bounded to
    /// `max_node` bits. Fails with an invalid-argument error when a target
    /// node does not fit the width.
    fn mbind_nodemask(&self, kind: &Kind, max_node: usize) -> Result<NodeMask>;

    /// How strictly the mask is enforced.
    fn mbind_mode(&self, kind: &Kind) -> MbindMode;

    /// Flags the backend should add to mmap when growing this kind's
    /// arenas.
    fn mmap_flags(&self, _kind: &Kind) -> c_int {
        0
    }

    /// Total and free bytes on the kind's target nodes.
    fn size(&self, kind: &Kind) -> Result<(u64, u64)>;

    /// One-time validation run before the kind's arena map is built.
    ///
    /// Runs at most once per kind; a failure here is sticky and every
    /// later allocation observes it.
    fn init_check(&self, _kind: &Kind) -> Result<()> {
        Ok(())
    }

    /// Hook invoked by the registry before the kind is deregistered.
    fn destroy(&self, _kind: &Kind) -> Result<()> {
        Ok(())
    }

    /// Pin `len` bytes at `ptr` to this kind's nodes.
    ///
    /// # Safety
    ///
    /// `ptr` must point to `len` bytes mapped by this process.
    unsafe fn mbind(&self, kind: &Kind, ptr: *mut c_void, len: usize) -> Result<()> {
        let mask = self.mbind_nodemask(kind, placement::MAX_NODE)?;
        if mask.is_empty() {
            return Err(Error::Unavailable);
        }
        placement::mbind_range(ptr, len, self.mbind_mode(kind), &mask)
    }

    /// Allocate `size` bytes from the calling CPU's arena.
    fn malloc(&self, kind: &Kind, size: usize) -> *mut c_void {
        match kind.arena_for_current_cpu() {
            Ok(arena) => backend::system().malloc(arena, size),
            Err(_) => std::ptr::null_mut(),
        }
    }

    /// Allocate zeroed `num * size` bytes from the calling CPU's arena.
    fn calloc(&self, kind: &Kind, num: usize, size: usize) -> *mut c_void {
        match kind.arena_for_current_cpu() {
            Ok(arena) => backend::system().calloc(arena, num, size),
            Err(_) => std::ptr::null_mut(),
        }
    }

    /// Allocate aligned memory from the calling CPU's arena.
    ///
    /// Arguments are validated by [`Kind::posix_memalign`] before this is
    /// called.
    fn posix_memalign(
        &self,
        kind: &Kind,
        alignment: usize,
        size: usize,
    ) -> Result<NonNull<c_void>> {
        let arena = kind.arena_for_current_cpu()?;
        backend::system().posix_memalign(arena, alignment, size)
    }

    /// Resize `ptr` within the kind's arena for the calling CPU.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live pointer obtained from this kind.
    unsafe fn realloc(&self, kind: &Kind, ptr: *mut c_void, size: usize) -> *mut c_void {
        match kind.arena_for_current_cpu() {
            Ok(arena) => backend::system().realloc(arena, ptr, size),
            Err(_) => std::ptr::null_mut(),
        }
    }

    /// Return `ptr` to the kind's arena.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live pointer obtained from this kind.
    unsafe fn free(&self, kind: &Kind, ptr: *mut c_void) {
        if let Ok(arena) = kind.arena_for_current_cpu() {
            backend::system().free(arena, ptr);
        }
    }
}
