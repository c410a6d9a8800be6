//! The process-wide kind registry.
//!
//! A bounded table of live kinds, indexed by partition and by name. The
//! six built-in kinds occupy partitions 0..6 from first use; user kinds
//! take the lowest free partition, and a destroyed kind's partition is
//! reused. Finalize tears the table down and is required to be the last
//! call into the library; anything after it fails with the runtime
//! error rather than misbehaving.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::kind::Kind;
use crate::kinds;
use crate::ops::KindOps;
use crate::{MAX_KIND, NAME_LENGTH};

struct Inner {
    slots: Vec<Option<Arc<Kind>>>,
    by_name: HashMap<String, u32>,
    // Recycled partition indices, reused before the high-water mark moves.
    free: Vec<u32>,
    next: u32,
    live: usize,
}

struct Registry {
    inner: RwLock<Inner>,
    finalized: AtomicBool,
}

static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut inner = Inner {
        slots: vec![None; MAX_KIND],
        by_name: HashMap::new(),
        free: Vec::new(),
        next: kinds::NUM_BASE_KINDS as u32,
        live: 0,
    };
    for kind in kinds::builtins() {
        inner.by_name.insert(kind.name().to_owned(), kind.partition());
        inner.slots[kind.partition() as usize] = Some(Arc::clone(kind));
        inner.live += 1;
    }
    Registry {
        inner: RwLock::new(inner),
        finalized: AtomicBool::new(false),
    }
});

#[inline]
pub(crate) fn is_finalized() -> bool {
    REGISTRY.finalized.load(Ordering::Acquire)
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() >= NAME_LENGTH {
        return Err(Error::Invalid);
    }
    if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(Error::Invalid);
    }
    Ok(())
}

/// Register a new kind under `name` with the given operation table.
///
/// The kind gets the lowest free partition index; the returned handle
/// stays valid until [`destroy`] and the registry holds its own
/// reference until then.
pub fn create(ops: Box<dyn KindOps>, name: &str) -> Result<Arc<Kind>> {
    validate_name(name)?;
    let mut inner = REGISTRY.inner.write();
    if is_finalized() {
        return Err(Error::Runtime);
    }
    if inner.by_name.contains_key(name) {
        return Err(Error::RepeatedName);
    }
    let partition = match inner.free.pop() {
        Some(idx) => idx,
        None => {
            if inner.next as usize >= MAX_KIND {
                return Err(Error::TooMany);
            }
            let idx = inner.next;
            inner.next += 1;
            idx
        }
    };
    let kind = Kind::new(name, partition, ops);
    inner.by_name.insert(name.to_owned(), partition);
    inner.slots[partition as usize] = Some(Arc::clone(&kind));
    inner.live += 1;
    tracing::debug!(name, partition, "created kind");
    Ok(kind)
}

/// Look up a kind by partition index.
pub fn get_by_partition(partition: u32) -> Result<Arc<Kind>> {
    if is_finalized() {
        return Err(Error::Runtime);
    }
    if partition as usize >= MAX_KIND {
        return Err(Error::Invalid);
    }
    REGISTRY
        .inner
        .read()
        .slots
        .get(partition as usize)
        .and_then(Clone::clone)
        .ok_or(Error::Invalid)
}

/// Look up a kind by registered name.
pub fn get_by_name(name: &str) -> Result<Arc<Kind>> {
    if is_finalized() {
        return Err(Error::Runtime);
    }
    let inner = REGISTRY.inner.read();
    let partition = *inner.by_name.get(name).ok_or(Error::Invalid)?;
    inner
        .slots
        .get(partition as usize)
        .and_then(Clone::clone)
        .ok_or(Error::Invalid)
}

/// Number of live kinds, built-ins included.
pub fn count() -> usize {
    if is_finalized() {
        return 0;
    }
    REGISTRY.inner.read().live
}

/// Deregister `kind` and release its partition index for reuse.
///
/// The kind's destroy hook runs first and its error, if any, aborts the
/// removal. Built-in kinds cannot be destroyed individually; finalize
/// tears them down with everything else.
pub fn destroy(kind: &Arc<Kind>) -> Result<()> {
    if kind.partition() < kinds::NUM_BASE_KINDS as u32 {
        return Err(Error::Invalid);
    }
    let mut inner = REGISTRY.inner.write();
    if is_finalized() {
        return Err(Error::Runtime);
    }
    let partition = kind.partition() as usize;
    match &inner.slots[partition] {
        Some(registered) if Arc::ptr_eq(registered, kind) => {}
        _ => return Err(Error::Invalid),
    }
    kind.ops().destroy(kind)?;
    inner.slots[partition] = None;
    inner.by_name.remove(kind.name());
    inner.free.push(kind.partition());
    inner.live -= 1;
    tracing::debug!(name = kind.name(), partition, "destroyed kind");
    Ok(())
}

/// Tear down the registry; must be the last call into the library.
///
/// Every live kind's destroy hook runs, the table empties, and all
/// subsequent registry or allocation calls fail deterministically with
/// the runtime error.
pub fn finalize() -> Result<()> {
    let mut inner = REGISTRY.inner.write();
    if REGISTRY
        .finalized
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return Err(Error::Runtime);
    }
    for slot in inner.slots.iter().flatten() {
        // Teardown is unconditional; a hook error cannot stop it here.
        if let Err(err) = slot.ops().destroy(slot) {
            tracing::warn!(name = slot.name(), ?err, "destroy hook failed during finalize");
        }
    }
    inner.slots.clear();
    inner.by_name.clear();
    inner.free.clear();
    inner.live = 0;
    tracing::debug!("registry finalized");
    Ok(())
}
