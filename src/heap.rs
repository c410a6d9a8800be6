//! Heap management entry points.
//!
//! The dispatch façade: allocation routed by kind handle, plus the
//! partition-indexed pass-throughs an arena backend uses when it grows a
//! kind's arena. The malloc-shaped calls mirror C allocation-failure
//! semantics and return null rather than an error value.

use std::os::raw::{c_int, c_void};
use std::ptr::NonNull;

use crate::error::Result;
use crate::kind::Kind;
use crate::registry;

/// Allocate `size` bytes of `kind` memory; null on failure.
///
/// The first allocation against a kind initializes it: the per-CPU
/// arena map is built once and concurrent first callers wait for that
/// one build.
#[inline]
pub fn malloc(kind: &Kind, size: usize) -> *mut c_void {
    kind.malloc(size)
}

/// Allocate zeroed `num * size` bytes of `kind` memory; null on failure
/// or overflow.
#[inline]
pub fn calloc(kind: &Kind, num: usize, size: usize) -> *mut c_void {
    kind.calloc(num, size)
}

/// Allocate `size` bytes of `kind` memory aligned to `alignment`.
///
/// `alignment` must be a power of two no smaller than a pointer.
#[inline]
pub fn posix_memalign(kind: &Kind, alignment: usize, size: usize) -> Result<NonNull<c_void>> {
    kind.posix_memalign(alignment, size)
}

/// Resize `ptr` within `kind`; the pointer never migrates to another
/// kind's memory.
///
/// # Safety
///
/// `ptr` must be null or a live pointer obtained from `kind` and not
/// yet freed.
#[inline]
pub unsafe fn realloc(kind: &Kind, ptr: *mut c_void, size: usize) -> *mut c_void {
    kind.realloc(ptr, size)
}

/// Return `ptr` to `kind`.
///
/// # Safety
///
/// `ptr` must be null or a live pointer obtained from `kind` and not
/// yet freed. Passing a pointer obtained from a different kind is a
/// precondition violation.
#[inline]
pub unsafe fn free(kind: &Kind, ptr: *mut c_void) {
    kind.free(ptr)
}

/// Total and free bytes on the nodes backing `kind`.
#[inline]
pub fn get_size(kind: &Kind) -> Result<(u64, u64)> {
    kind.get_size()
}

/// Whether the kind registered under `partition` is currently usable.
///
/// Unknown partitions read as unavailable.
pub fn partition_is_available(partition: u32) -> bool {
    registry::get_by_partition(partition)
        .map(|kind| kind.is_available())
        .unwrap_or(false)
}

/// mmap flags the kind registered under `partition` wants for new
/// mappings.
pub fn partition_get_mmap_flags(partition: u32) -> Result<c_int> {
    let kind = registry::get_by_partition(partition)?;
    Ok(kind.mmap_flags())
}

/// Pin `len` bytes at `ptr` to the nodes of the kind registered under
/// `partition`.
///
/// # Safety
///
/// `ptr` must point to `len` bytes mapped by this process.
pub unsafe fn partition_mbind(partition: u32, ptr: *mut c_void, len: usize) -> Result<()> {
    let kind = registry::get_by_partition(partition)?;
    kind.mbind(ptr, len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::kinds;
    use crate::MAX_KIND;

    #[test]
    fn default_malloc_round_trip() {
        let kind = kinds::default();
        let ptr = malloc(&kind, 64);
        assert!(!ptr.is_null());
        assert_eq!(ptr as usize % 8, 0);
        unsafe { free(&kind, ptr) };
    }

    #[test]
    fn memalign_honors_alignment() {
        let kind = kinds::default();
        let ptr = posix_memalign(&kind, 4096, 128).unwrap();
        assert_eq!(ptr.as_ptr() as usize % 4096, 0);
        unsafe { free(&kind, ptr.as_ptr()) };
    }

    #[test]
    fn memalign_rejects_bad_alignment() {
        let kind = kinds::default();
        assert_eq!(posix_memalign(&kind, 3, 64).unwrap_err(), Error::Alignment);
        assert_eq!(posix_memalign(&kind, 2, 64).unwrap_err(), Error::Alignment);
    }

    #[test]
    fn realloc_grows_in_place_of_kind() {
        let kind = kinds::default();
        let ptr = malloc(&kind, 16) as *mut u8;
        assert!(!ptr.is_null());
        unsafe {
            ptr.write_bytes(0x5a, 16);
            let grown = realloc(&kind, ptr as *mut c_void, 1024) as *mut u8;
            assert!(!grown.is_null());
            for i in 0..16 {
                assert_eq!(grown.add(i).read(), 0x5a);
            }
            free(&kind, grown as *mut c_void);
        }
    }

    #[test]
    fn partition_passthroughs_resolve_builtins() {
        assert!(partition_is_available(kinds::PARTITION_DEFAULT));
        assert_eq!(
            partition_get_mmap_flags(kinds::PARTITION_DEFAULT).unwrap(),
            0
        );

        #[cfg(target_os = "linux")]
        assert_eq!(
            partition_get_mmap_flags(kinds::PARTITION_HUGETLB).unwrap(),
            libc::MAP_HUGETLB
        );
    }

    #[test]
    fn unknown_partitions_read_as_unavailable() {
        assert!(!partition_is_available(MAX_KIND as u32));
        assert_eq!(
            partition_get_mmap_flags(MAX_KIND as u32).unwrap_err(),
            Error::Invalid
        );
    }

    #[test]
    fn partition_mbind_rejects_null_ranges() {
        let err = unsafe { partition_mbind(kinds::PARTITION_DEFAULT, std::ptr::null_mut(), 4096) };
        assert!(err.is_err());
    }
}
