//! Memory alignment utilities.
//!
//! This module provides utilities for working with memory alignment.

/// Round up to the next multiple of `align`.
///
/// # Arguments
///
/// * `value` - The value to round up.
/// * `align` - The alignment, which must be a power of two.
///
/// # Returns
///
/// The smallest multiple of `align` that is greater than or equal to `value`.
#[inline]
pub fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two(), "alignment must be a power of two");
    (value + align - 1) & !(align - 1)
}

/// Round down to the previous multiple of `align`.
///
/// # Arguments
///
/// * `value` - The value to round down.
/// * `align` - The alignment, which must be a power of two.
///
/// # Returns
///
/// The largest multiple of `align` that is less than or equal to `value`.
#[inline]
pub fn align_down(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two(), "alignment must be a power of two");
    value & !(align - 1)
}

/// Check if a value is aligned to a given alignment.
///
/// # Arguments
///
/// * `value` - The value to check.
/// * `align` - The alignment, which must be a power of two.
///
/// # Returns
///
/// `true` if `value` is a multiple of `align`, `false` otherwise.
#[inline]
pub fn is_aligned(value: usize, align: usize) -> bool {
    debug_assert!(align.is_power_of_two(), "alignment must be a power of two");
    (value & (align - 1)) == 0
}

/// Get the system page size.
#[inline]
pub fn page_size() -> usize {
    #[cfg(unix)]
    {
        unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
    }

    #[cfg(not(unix))]
    {
        // Default to 4KB for unknown platforms
        4096
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_is_tight() {
        assert_eq!(align_up(0, 4096), 0);
        assert_eq!(align_up(1, 4096), 4096);
        assert_eq!(align_up(4096, 4096), 4096);
        assert_eq!(align_down(4097, 4096), 4096);
        assert_eq!(align_down(4095, 4096), 0);
    }

    #[test]
    fn aligned_check() {
        assert!(is_aligned(0, 8));
        assert!(is_aligned(4096, 4096));
        assert!(!is_aligned(4095, 4096));
    }

    #[test]
    fn page_size_is_a_power_of_two() {
        assert!(page_size().is_power_of_two());
    }
}
