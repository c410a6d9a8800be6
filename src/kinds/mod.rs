//! Built-in memory kinds.
//!
//! Six kinds exist in every process, with fixed names and partition
//! indices, whether or not the hardware backs them: the default process
//! heap, a huge-page-backed variant, and the high-bandwidth family in
//! strict and preferred modes with and without huge pages. Their handles
//! always resolve; on hardware lacking the feature the kind simply
//! reports itself unavailable.

mod default;
mod hbw;
mod hugetlb;

pub use default::DefaultOps;
pub use hbw::HbwOps;
pub use hugetlb::HugetlbOps;

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::kind::Kind;
use crate::placement::MbindMode;

/// Partition index of the default kind.
pub const PARTITION_DEFAULT: u32 = 0;
/// Partition index of the strict high-bandwidth kind.
pub const PARTITION_HBW: u32 = 1;
/// Partition index of the strict high-bandwidth huge-page kind.
pub const PARTITION_HBW_HUGETLB: u32 = 2;
/// Partition index of the preferred high-bandwidth kind.
pub const PARTITION_HBW_PREFERRED: u32 = 3;
/// Partition index of the preferred high-bandwidth huge-page kind.
pub const PARTITION_HBW_PREFERRED_HUGETLB: u32 = 4;
/// Partition index of the huge-page kind.
pub const PARTITION_HUGETLB: u32 = 5;

/// Number of built-in kinds, occupying partitions `0..NUM_BASE_KINDS`.
pub const NUM_BASE_KINDS: usize = 6;

static BUILTINS: Lazy<[Arc<Kind>; NUM_BASE_KINDS]> = Lazy::new(|| {
    [
        Kind::new("membind_default", PARTITION_DEFAULT, Box::new(DefaultOps)),
        Kind::new(
            "membind_hbw",
            PARTITION_HBW,
            Box::new(HbwOps::new(MbindMode::Bind, false)),
        ),
        Kind::new(
            "membind_hbw_hugetlb",
            PARTITION_HBW_HUGETLB,
            Box::new(HbwOps::new(MbindMode::Bind, true)),
        ),
        Kind::new(
            "membind_hbw_preferred",
            PARTITION_HBW_PREFERRED,
            Box::new(HbwOps::new(MbindMode::Preferred, false)),
        ),
        Kind::new(
            "membind_hbw_preferred_hugetlb",
            PARTITION_HBW_PREFERRED_HUGETLB,
            Box::new(HbwOps::new(MbindMode::Preferred, true)),
        ),
        Kind::new("membind_hugetlb", PARTITION_HUGETLB, Box::new(HugetlbOps)),
    ]
});

pub(crate) fn builtins() -> &'static [Arc<Kind>; NUM_BASE_KINDS] {
    &BUILTINS
}

/// The default kind: ordinary process-heap memory, no NUMA constraint.
pub fn default() -> Arc<Kind> {
    Arc::clone(&BUILTINS[PARTITION_DEFAULT as usize])
}

/// Huge-page-backed memory with no node constraint.
pub fn hugetlb() -> Arc<Kind> {
    Arc::clone(&BUILTINS[PARTITION_HUGETLB as usize])
}

/// High-bandwidth memory, strict placement.
pub fn hbw() -> Arc<Kind> {
    Arc::clone(&BUILTINS[PARTITION_HBW as usize])
}

/// High-bandwidth memory with fallback to any node.
pub fn hbw_preferred() -> Arc<Kind> {
    Arc::clone(&BUILTINS[PARTITION_HBW_PREFERRED as usize])
}

/// High-bandwidth huge-page memory, strict placement.
pub fn hbw_hugetlb() -> Arc<Kind> {
    Arc::clone(&BUILTINS[PARTITION_HBW_HUGETLB as usize])
}

/// High-bandwidth huge-page memory with fallback to any node.
pub fn hbw_preferred_hugetlb() -> Arc<Kind> {
    Arc::clone(&BUILTINS[PARTITION_HBW_PREFERRED_HUGETLB as usize])
}
