//! Caller-held references to cluster map elements.

use core::fmt;
use std::ptr::NonNull;

use crate::map::{DenseEntry, SparseSlot};

/// Opaque reference to an element of a [`ClusterMap`][crate::ClusterMap].
///
/// A handle pairs the element's stable identity (its sparse slot, whose
/// address never changes) with a cached pointer to the element's current
/// dense-storage location. The cache can go stale whenever an unrelated erase
/// relocates dense entries; accessors revalidate it lazily against the slot,
/// so a handle heals itself for as long as its own slot stays occupied.
///
/// Handles stay valid across arbitrary insertions and erasures of *other*
/// elements. Using a handle after its own element was erased, or with a map
/// other than the one that minted it, violates the accessors' safety
/// contracts; in debug builds a per-slot generation counter catches the
/// erased-element case.
///
/// Two handles refer to the same logical element exactly when their slot
/// identities are equal; the cached location does not take part in
/// comparisons.
pub struct Handle<T> {
    pub(crate) slot: NonNull<SparseSlot<T>>,
    pub(crate) entry: NonNull<DenseEntry<T>>,
    pub(crate) generation: u32,
}

// Manual impls: a handle is always plain-old-data regardless of `T`.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot
    }
}

impl<T> Eq for Handle<T> {}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handle").field(&self.slot).finish()
    }
}
