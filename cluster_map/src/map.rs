//! Handle-based associative container over segmented cluster storage.

use core::fmt;
use std::ptr::NonNull;

use cluster_vec::{ClusterAlloc, ClusterVec, Global};

use crate::handle::Handle;
use crate::iter::{Iter, IterMut};

/// A live payload in dense storage, carrying an intrusive back-pointer to the
/// sparse slot that currently designates it.
///
/// Dense entries are packed contiguously and move around on erase
/// (swap-and-pop); the back-pointer is what lets an erase patch the relocated
/// survivor's slot in O(1).
pub(crate) struct DenseEntry<T> {
    pub(crate) slot: NonNull<SparseSlot<T>>,
    pub(crate) value: T,
}

/// A permanently address-stable indirection cell pointing at its element's
/// current dense location.
///
/// Sparse slots are never relocated or freed until the map itself is cleared;
/// "live" versus "free" is structural (free slots are exactly the ones on the
/// free list, and their `entry` content is meaningless there). The generation
/// counter is bumped on every erase so that debug builds can detect a stale
/// handle to a recycled slot.
pub(crate) struct SparseSlot<T> {
    pub(crate) entry: NonNull<DenseEntry<T>>,
    pub(crate) generation: u32,
}

/// Associative container handing out stable, O(1)-dereferenceable [`Handle`]s
/// while keeping all live payloads packed for cache-friendly iteration.
///
/// Internally this is a classic sparse/dense split over three
/// [`ClusterVec`]s: dense storage holds the packed payloads (each with a
/// back-pointer to its slot), the sparse index holds address-stable slots
/// indirecting to current dense locations, and a third vector is a stack of
/// recycled slots. Erasure relocates the last dense entry into the erased
/// position (swap-and-pop), so iteration order is unspecified and may change
/// across erasures; handles are unaffected because they indirect through
/// their slot.
///
/// The map mints its own keys — it is not a general key-value map — and is
/// single-threaded and move-only, like the vectors it is built on.
///
/// Handles are dereferenced without bounds or liveness checks, so the
/// handle-consuming operations are `unsafe` with a shared contract: *the
/// handle must have been returned by this map and its element must not have
/// been erased since* (the map's debug builds verify the latter through the
/// slot generation counter). All other operations are safe.
pub struct ClusterMap<T, A: ClusterAlloc = Global, const STEP_SIZE: usize = 2> {
    // Field order is teardown order: payload destructors first, then the
    // pointer-only sparse and free vectors.
    dense: ClusterVec<DenseEntry<T>, A, STEP_SIZE>,
    sparse: ClusterVec<SparseSlot<T>, A, STEP_SIZE>,
    free: ClusterVec<NonNull<SparseSlot<T>>, A, STEP_SIZE>,
}

impl<T, A: ClusterAlloc + Clone + Default, const STEP_SIZE: usize> Default
    for ClusterMap<T, A, STEP_SIZE>
{
    fn default() -> Self {
        Self::with_allocator(64, A::default())
    }
}

impl<T, const STEP_SIZE: usize> ClusterMap<T, Global, STEP_SIZE> {
    /// Creates an empty map whose vectors start with clusters of
    /// `initial_cluster_capacity` elements.
    ///
    /// # Panics
    /// Panics if `initial_cluster_capacity` is zero.
    pub fn new(initial_cluster_capacity: usize) -> Self {
        Self::with_allocator(initial_cluster_capacity, Global)
    }
}

impl<T, A: ClusterAlloc + Clone, const STEP_SIZE: usize> ClusterMap<T, A, STEP_SIZE> {
    /// Creates an empty map; dense storage, sparse index, and free list all
    /// use clones of `alloc`.
    ///
    /// # Panics
    /// Panics if `initial_cluster_capacity` is zero.
    pub fn with_allocator(initial_cluster_capacity: usize, alloc: A) -> Self {
        Self {
            dense: ClusterVec::with_allocator(initial_cluster_capacity, alloc.clone()),
            sparse: ClusterVec::with_allocator(initial_cluster_capacity, alloc.clone()),
            free: ClusterVec::with_allocator(initial_cluster_capacity, alloc),
        }
    }
}

impl<T, A: ClusterAlloc, const STEP_SIZE: usize> ClusterMap<T, A, STEP_SIZE> {
    /// Inserts `value` and returns a handle to it.
    ///
    /// Reuses the most recently freed sparse slot when one is available;
    /// otherwise a brand-new, permanently address-stable slot is appended to
    /// the sparse index. O(1) either way. Allocation failure is fatal.
    pub fn insert(&mut self, value: T) -> Handle<T> {
        match self.free.pop_back() {
            None => {
                let entry = self.dense.push_back_ptr(DenseEntry {
                    slot: NonNull::dangling(),
                    value,
                });
                let slot = self.sparse.push_back_ptr(SparseSlot {
                    entry,
                    generation: 0,
                });
                // SAFETY: `entry` was just pushed and is owned by `dense`.
                unsafe { (*entry.as_ptr()).slot = slot };
                Handle {
                    slot,
                    entry,
                    generation: 0,
                }
            }
            Some(slot) => {
                let entry = self.dense.push_back_ptr(DenseEntry { slot, value });
                // SAFETY: slots on the free list stay owned by `sparse` and
                // are re-pointed here as they leave the list.
                let generation = unsafe {
                    let slot = &mut *slot.as_ptr();
                    slot.entry = entry;
                    slot.generation
                };
                Handle {
                    slot,
                    entry,
                    generation,
                }
            }
        }
    }

    /// Refreshes `handle`'s cached dense location from its sparse slot.
    ///
    /// Every accessor calls this implicitly; it only needs to be called
    /// directly to re-arm a handle's cache ahead of raw pointer use. A cache
    /// goes stale whenever an unrelated erase swaps dense entries; the slot
    /// itself is always current.
    ///
    /// # Safety
    /// - `handle` must have been returned by this map, and its element must
    ///   not have been erased since (checked in debug builds).
    pub unsafe fn validate(&self, handle: &mut Handle<T>) {
        // SAFETY: per the contract the slot is owned by this map and occupied.
        let slot = unsafe { handle.slot.as_ref() };
        debug_assert_eq!(
            slot.generation, handle.generation,
            "handle used after its element was erased"
        );
        if slot.entry != handle.entry {
            handle.entry = slot.entry;
        }
    }

    /// Returns a reference to the element designated by `handle`,
    /// revalidating its cache first.
    ///
    /// # Safety
    /// - `handle` must have been returned by this map, and its element must
    ///   not have been erased since (checked in debug builds).
    pub unsafe fn at(&self, handle: &mut Handle<T>) -> &T {
        // SAFETY: forwarded contract; after validation the cached entry is
        // the element's current dense location.
        unsafe {
            self.validate(handle);
            &(*handle.entry.as_ptr()).value
        }
    }

    /// Returns a mutable reference to the element designated by `handle`,
    /// revalidating its cache first.
    ///
    /// # Safety
    /// - `handle` must have been returned by this map, and its element must
    ///   not have been erased since (checked in debug builds).
    pub unsafe fn at_mut(&mut self, handle: &mut Handle<T>) -> &mut T {
        // SAFETY: forwarded contract; after validation the cached entry is
        // the element's current dense location.
        unsafe {
            self.validate(handle);
            &mut (*handle.entry.as_ptr()).value
        }
    }

    /// Returns `true` while `handle`'s element is still present.
    ///
    /// Detection works through the slot generation counter: erasing the
    /// element bumps its slot's generation, so any handle minted before the
    /// erase no longer matches, even after the slot is recycled for new
    /// insertions.
    ///
    /// # Safety
    /// - `handle` must have been returned by this map (whose sparse slots
    ///   live until the map is cleared or dropped); handles from other maps
    ///   or from before a [`clear`][Self::clear] are not comparable.
    pub unsafe fn contains(&self, handle: &Handle<T>) -> bool {
        // SAFETY: slot storage lives as long as the map, occupied or not.
        let slot = unsafe { handle.slot.as_ref() };
        slot.generation == handle.generation
    }

    /// Erases the element designated by `handle`.
    ///
    /// The last dense entry is relocated into the erased position
    /// (swap-and-pop) and its sparse slot is patched to the new location, so
    /// every other live handle stays valid. Exactly one slot is freed onto
    /// the free list and exactly one slot is re-pointed. O(1); iteration
    /// order changes.
    ///
    /// # Safety
    /// - `handle` must have been returned by this map, and its element must
    ///   not have been erased before (checked in debug builds).
    pub unsafe fn erase(&mut self, mut handle: Handle<T>) {
        // SAFETY: forwarded contract; the map is non-empty because `handle`
        // designates a live element.
        unsafe {
            self.validate(&mut handle);
            let target = handle.entry;
            {
                // Retire the slot: stale handles to it become detectable.
                let slot = &mut *handle.slot.as_ptr();
                slot.generation = slot.generation.wrapping_add(1);
            }
            self.free.push_back(handle.slot);
            debug_assert!(!self.dense.is_empty());
            if let Some(back) = self.dense.back_ptr() {
                if back != target {
                    // Relocate the back entry (payload and back-pointer) into
                    // the erased position, leaving the erased value at the
                    // back, and re-point the survivor's slot.
                    std::ptr::swap(target.as_ptr(), back.as_ptr());
                    let survivor = &*target.as_ptr();
                    (*survivor.slot.as_ptr()).entry = target;
                }
            }
            // Drops the erased value.
            self.dense.pop_back();
        }
    }

    /// Exchanges the dense positions of two occupied elements without growing
    /// or shrinking storage.
    ///
    /// Identity follows the *value*: after the call each handle still
    /// resolves to the same value it did before, while the two values trade
    /// places in iteration order. Both handles' caches are refreshed. Calling
    /// this with two handles to the same element is a no-op.
    ///
    /// # Safety
    /// - Both handles must have been returned by this map, and neither
    ///   element may have been erased (checked in debug builds).
    pub unsafe fn swap_pos(&mut self, a: &mut Handle<T>, b: &mut Handle<T>) {
        // SAFETY: forwarded contract for both handles.
        unsafe {
            self.validate(a);
            self.validate(b);
            if a.entry == b.entry {
                return;
            }
            std::ptr::swap(a.entry.as_ptr(), b.entry.as_ptr());
            (*a.slot.as_ptr()).entry = b.entry;
            (*b.slot.as_ptr()).entry = a.entry;
        }
        std::mem::swap(&mut a.entry, &mut b.entry);
    }

    /// Number of live elements, computed in O(1) from the dense vector's
    /// closed-form length.
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    /// Returns `true` when the map holds no elements.
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Handle to the first element in dense order, or `None` when empty.
    ///
    /// Freshly computed, so no validation is needed before use.
    pub fn front(&self) -> Option<Handle<T>> {
        let entry = self.dense.front_ptr()?;
        // SAFETY: the entry and its slot are live and owned by this map.
        unsafe {
            let slot = entry.as_ref().slot;
            Some(Handle {
                slot,
                entry,
                generation: slot.as_ref().generation,
            })
        }
    }

    /// Handle to the last element in dense order, or `None` when empty.
    ///
    /// Freshly computed, so no validation is needed before use.
    pub fn back(&self) -> Option<Handle<T>> {
        let entry = self.dense.back_ptr()?;
        // SAFETY: the entry and its slot are live and owned by this map.
        unsafe {
            let slot = entry.as_ref().slot;
            Some(Handle {
                slot,
                entry,
                generation: slot.as_ref().generation,
            })
        }
    }

    /// Drops every element and frees all storage.
    ///
    /// Dense storage is torn down first, running the payload destructors;
    /// the sparse index and free list hold only pointers and follow. All
    /// outstanding handles become invalid, including for
    /// [`contains`][Self::contains].
    pub fn clear(&mut self) {
        self.dense.clear();
        self.sparse.clear();
        self.free.clear();
    }

    /// Iterator over the live payloads, in unspecified order.
    ///
    /// Iterates dense storage only; the sparse index and free list are
    /// invisible. The order may change across erasures.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self.dense.iter())
    }

    /// Mutable iterator over the live payloads, in unspecified order.
    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        IterMut::new(self.dense.iter_mut())
    }

    /// Number of sparse slots ever minted (live plus free-listed).
    #[cfg(test)]
    pub(crate) fn slot_count(&self) -> usize {
        self.sparse.len()
    }

    /// Current depth of the free list.
    #[cfg(test)]
    pub(crate) fn free_count(&self) -> usize {
        self.free.len()
    }
}

impl<T: fmt::Debug, A: ClusterAlloc, const STEP_SIZE: usize> fmt::Debug
    for ClusterMap<T, A, STEP_SIZE>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<'a, T, A: ClusterAlloc, const STEP_SIZE: usize> IntoIterator
    for &'a ClusterMap<T, A, STEP_SIZE>
{
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T, A: ClusterAlloc, const STEP_SIZE: usize> IntoIterator
    for &'a mut ClusterMap<T, A, STEP_SIZE>
{
    type Item = &'a mut T;
    type IntoIter = IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}
