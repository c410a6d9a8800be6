//! # Membind
//!
//! `membind` routes heap allocation through named *kinds* of memory —
//! default, high-bandwidth, huge-page-backed — so callers pick a placement
//! policy per allocation while the policy itself decides NUMA node masks,
//! mbind modes, and mmap flags. Each kind maps logical CPUs to dedicated
//! backend arenas, so concurrent threads allocate without contending on a
//! shared arena.
//!
//! ## Features
//!
//! - Six built-in kinds with fixed names and partitions, always present
//! - User-defined kinds registered at runtime through one operation trait
//! - Lazy, exactly-once kind initialization with sticky failure
//! - Per-CPU arena routing for contention-free concurrent allocation
//! - mbind node-mask and mmap-flag computation for arena growth
//! - Closed error taxonomy with stable negative status codes
//!
//! ## Example
//!
//! ```
//! use membind::kinds;
//!
//! // The default kind is plain process-heap memory.
//! let kind = kinds::default();
//! assert!(kind.is_available());
//!
//! let ptr = membind::malloc(&kind, 64);
//! assert!(!ptr.is_null());
//! unsafe { membind::free(&kind, ptr) };
//!
//! // High-bandwidth kinds exist even where the hardware does not.
//! let hbw = kinds::hbw();
//! if hbw.is_available() {
//!     let ptr = membind::malloc(&hbw, 4096);
//!     unsafe { membind::free(&hbw, ptr) };
//! }
//! ```

pub mod backend;
pub mod error;
pub mod heap;
pub mod kind;
pub mod kinds;
pub mod ops;
pub mod placement;
pub mod registry;
pub mod topology;
pub mod utils;

pub use backend::{ArenaBackend, ArenaId, SystemBackend};
pub use error::{error_message, Error, Result, ERROR_MESSAGE_SIZE};
pub use heap::{
    calloc, free, get_size, malloc, partition_get_mmap_flags, partition_is_available,
    partition_mbind, posix_memalign, realloc,
};
pub use kind::Kind;
pub use ops::KindOps;
pub use placement::{MbindMode, NodeMask};
pub use registry::{
    count as kind_count, create, destroy, finalize, get_by_name as get_kind_by_name,
    get_by_partition as get_kind_by_partition,
};
pub use topology::{NodeOracle, SysfsTopology};

/// Maximum number of simultaneously registered kinds.
pub const MAX_KIND: usize = 512;

/// Maximum kind name length in bytes, terminator included.
pub const NAME_LENGTH: usize = 64;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Check if NUMA is available on this system.
#[inline]
pub fn has_numa_support() -> bool {
    topology::is_supported()
}

/// Check if huge pages are configured on this system.
#[inline]
pub fn has_huge_page_support() -> bool {
    kinds::hugetlb().is_available()
}
