//! Finalize teardown, in a binary of its own: after this runs the
//! library is deliberately unusable for the rest of the process.

use membind::{kinds, Error};

#[test]
fn finalize_is_terminal_and_deterministic() {
    // The library works normally up to the finalize call.
    let kind = kinds::default();
    let ptr = membind::malloc(&kind, 64);
    assert!(!ptr.is_null());
    unsafe { membind::free(&kind, ptr) };
    assert!(membind::kind_count() >= kinds::NUM_BASE_KINDS);

    membind::finalize().unwrap();

    // Every later call fails deterministically instead of misbehaving.
    assert!(membind::malloc(&kind, 64).is_null());
    assert!(membind::calloc(&kind, 4, 16).is_null());
    assert_eq!(
        membind::posix_memalign(&kind, 64, 64).unwrap_err(),
        Error::Runtime
    );
    assert_eq!(kind.get_size().unwrap_err(), Error::Runtime);
    assert_eq!(
        membind::get_kind_by_name("membind_default").unwrap_err(),
        Error::Runtime
    );
    assert_eq!(
        membind::get_kind_by_partition(kinds::PARTITION_DEFAULT).unwrap_err(),
        Error::Runtime
    );
    assert_eq!(membind::kind_count(), 0);
    assert!(!membind::partition_is_available(kinds::PARTITION_DEFAULT));

    // The built-in handles themselves survive as inert values.
    assert_eq!(kinds::default().name(), "membind_default");
    assert_eq!(kinds::hbw().partition(), kinds::PARTITION_HBW);

    // Finalize must be the last call; a second one is itself an error.
    assert_eq!(membind::finalize().unwrap_err(), Error::Runtime);
}
