//! Segmented vector growing by cluster chaining instead of reallocation.

use core::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::alloc::{ClusterAlloc, Global};
use crate::cluster::{Cluster, ClusterLink};
use crate::iter::{Iter, IterMut};

/// Closed-form element count of `full_clusters` completely full clusters
/// growing geometrically from `initial_capacity` by factor `step`.
///
/// Geometric series: `Sn = a * (r^n - 1) / (r - 1)`. Exact because cluster
/// capacities follow `initial_capacity * step^i` by construction.
pub(crate) fn full_chain_len(initial_capacity: usize, step: usize, full_clusters: usize) -> usize {
    initial_capacity * (step.pow(full_clusters as u32) - 1) / (step - 1)
}

/// A dynamic array stored as a chain of geometrically growing clusters.
///
/// Unlike `Vec`, growth never relocates existing elements: when the tail
/// cluster fills up, a new cluster of `STEP_SIZE` times its capacity is
/// chained after it. The address of an element is therefore stable from the
/// moment it is pushed until the moment it is popped, which makes the vector
/// suitable as backing storage for intrusive and pointer-linked structures
/// (see the `cluster_map` crate).
///
/// Only tail operations are supported: [`push_back`][Self::push_back],
/// [`pop_back`][Self::pop_back], and the order-breaking
/// [`erase_unsorted`][Self::erase_unsorted]. The total length is computed in
/// O(1) from the geometric growth law rather than by walking the chain.
///
/// The vector is move-only and single-threaded by design; it owns its cluster
/// chain exclusively and dropping it drops all live elements tail-to-head.
pub struct ClusterVec<T, A: ClusterAlloc = Global, const STEP_SIZE: usize = 2> {
    first: Option<NonNull<Cluster<T>>>,
    last: Option<NonNull<Cluster<T>>>,
    cluster_count: usize,
    initial_capacity: usize,
    alloc: A,
    _marker: PhantomData<T>,
}

impl<T, A: ClusterAlloc + Default, const STEP_SIZE: usize> Default
    for ClusterVec<T, A, STEP_SIZE>
{
    fn default() -> Self {
        Self::with_allocator(64, A::default())
    }
}

impl<T, const STEP_SIZE: usize> ClusterVec<T, Global, STEP_SIZE> {
    /// Creates an empty vector whose first cluster will hold
    /// `initial_capacity` elements.
    ///
    /// No memory is allocated until the first push.
    ///
    /// # Panics
    /// Panics if `initial_capacity` is zero.
    pub fn new(initial_capacity: usize) -> Self {
        Self::with_allocator(initial_capacity, Global)
    }
}

impl<T, A: ClusterAlloc, const STEP_SIZE: usize> ClusterVec<T, A, STEP_SIZE> {
    const STEP_SIZE_OK: () = assert!(STEP_SIZE >= 2, "cluster step size must be at least 2");

    /// Creates an empty vector using `alloc` for all cluster allocations.
    ///
    /// # Panics
    /// Panics if `initial_capacity` is zero.
    pub fn with_allocator(initial_capacity: usize, alloc: A) -> Self {
        let () = Self::STEP_SIZE_OK;
        assert!(initial_capacity > 0, "initial cluster capacity must be nonzero");
        Self {
            first: None,
            last: None,
            cluster_count: 0,
            initial_capacity,
            alloc,
            _marker: PhantomData,
        }
    }

    /// The injected allocator.
    pub fn allocator(&mut self) -> &mut A {
        &mut self.alloc
    }

    /// Number of live elements, computed in O(1).
    ///
    /// All clusters except the tail are completely full, so the total is the
    /// closed-form geometric sum of the full prefix plus the tail's fill.
    pub fn len(&self) -> usize {
        let Some(last) = self.last else { return 0 };
        // SAFETY: the tail is a live cluster owned by this chain.
        let tail_len = unsafe { last.as_ref().len() };
        full_chain_len(self.initial_capacity, STEP_SIZE, self.cluster_count - 1) + tail_len
    }

    /// Returns `true` when the vector holds no elements.
    pub fn is_empty(&self) -> bool {
        self.first.is_none()
    }

    /// Number of clusters currently in the chain.
    pub fn cluster_count(&self) -> usize {
        self.cluster_count
    }

    /// The head of the cluster chain, for per-cluster traversal.
    pub fn first_cluster(&self) -> Option<&Cluster<T>> {
        // SAFETY: the chain is owned by `self` and outlives the borrow.
        self.first.map(|first| unsafe { &*first.as_ptr() })
    }

    /// Appends `value` at the tail and returns a reference to it.
    ///
    /// The returned reference (and the element's address) stays valid until
    /// that element is popped or the vector is cleared, no matter how many
    /// further pushes and pops happen in between. Allocation failure is fatal.
    pub fn push_back(&mut self, value: T) -> &mut T {
        let ptr = self.push_back_ptr(value);
        // SAFETY: freshly constructed element owned by `self`.
        unsafe { &mut *ptr.as_ptr() }
    }

    /// Appends `value` and returns its address.
    ///
    /// The pointer stays valid, and the element stays at that address, until
    /// the element is popped or the vector is cleared or dropped. Dereferencing
    /// it requires that the vector still be alive.
    pub fn push_back_ptr(&mut self, value: T) -> NonNull<T> {
        let slot = self.reserve_back();
        // SAFETY: `reserve_back` hands out an unused, properly aligned slot.
        unsafe { slot.as_ptr().write(value) };
        slot
    }

    /// Claims the next free tail slot, growing the chain if the tail is full.
    fn reserve_back(&mut self) -> NonNull<T> {
        let mut last = match self.last {
            Some(last) => {
                // SAFETY: `last` is a live cluster owned by this chain.
                let tail = unsafe { last.as_ref() };
                if tail.len() < tail.capacity() {
                    last
                } else {
                    self.grow_tail(last)
                }
            }
            None => self.grow_first(),
        };
        // SAFETY: `last` is the tail and has spare capacity.
        unsafe {
            let tail = last.as_mut();
            let index = {
                let len = tail.tail_len_mut();
                let index = *len;
                *len += 1;
                index
            };
            NonNull::new_unchecked(tail.data().as_ptr().add(index))
        }
    }

    /// Chains a new cluster of `STEP_SIZE` times the tail's capacity after the
    /// (full) current tail and demotes the old tail to an interior cluster.
    fn grow_tail(&mut self, mut old_tail: NonNull<Cluster<T>>) -> NonNull<Cluster<T>> {
        // SAFETY: `old_tail` is the current tail, full by the growth rule; it
        // is demoted only after the new tail is allocated and linked.
        unsafe {
            debug_assert_eq!(old_tail.as_ref().len(), old_tail.as_ref().capacity());
            let cap = old_tail.as_ref().capacity() * STEP_SIZE;
            let new = Cluster::allocate(&mut self.alloc, Some(old_tail), cap);
            old_tail.as_mut().link = ClusterLink::Interior { next: new };
            self.last = Some(new);
            self.cluster_count += 1;
            new
        }
    }

    /// Allocates the first cluster of an empty vector.
    fn grow_first(&mut self) -> NonNull<Cluster<T>> {
        let new = Cluster::allocate(&mut self.alloc, None, self.initial_capacity);
        self.first = Some(new);
        self.last = Some(new);
        self.cluster_count = 1;
        new
    }

    /// Removes and returns the last element, or `None` when empty.
    ///
    /// When the pop empties the tail cluster, that cluster is freed and the
    /// previous cluster becomes the tail again, completely full.
    pub fn pop_back(&mut self) -> Option<T> {
        let mut last = self.last?;
        // SAFETY: a non-empty vector's tail holds at least one live element.
        unsafe {
            let tail = last.as_mut();
            let new_len = {
                let len = tail.tail_len_mut();
                debug_assert!(*len > 0);
                *len -= 1;
                *len
            };
            let value = tail.data().as_ptr().add(new_len).read();
            if new_len == 0 {
                self.cluster_count -= 1;
                let prev = tail.prev;
                Cluster::free(&mut self.alloc, last);
                match prev {
                    Some(mut prev) => {
                        // Non-tail clusters are always full, so the promoted
                        // tail reports its full capacity again.
                        let promoted = prev.as_mut();
                        let cap = promoted.capacity();
                        promoted.link = ClusterLink::Tail { len: cap };
                        self.last = Some(prev);
                    }
                    None => {
                        self.first = None;
                        self.last = None;
                    }
                }
            }
            Some(value)
        }
    }

    /// Reference to the first element.
    pub fn front(&self) -> Option<&T> {
        // SAFETY: the element is live and owned by `self`.
        self.front_ptr().map(|ptr| unsafe { &*ptr.as_ptr() })
    }

    /// Mutable reference to the first element.
    pub fn front_mut(&mut self) -> Option<&mut T> {
        // SAFETY: the element is live and exclusively owned by `self`.
        self.front_ptr().map(|ptr| unsafe { &mut *ptr.as_ptr() })
    }

    /// Reference to the last element.
    pub fn back(&self) -> Option<&T> {
        // SAFETY: the element is live and owned by `self`.
        self.back_ptr().map(|ptr| unsafe { &*ptr.as_ptr() })
    }

    /// Mutable reference to the last element.
    pub fn back_mut(&mut self) -> Option<&mut T> {
        // SAFETY: the element is live and exclusively owned by `self`.
        self.back_ptr().map(|ptr| unsafe { &mut *ptr.as_ptr() })
    }

    /// Address of the first element.
    ///
    /// Valid for dereferencing while the vector is alive and the element has
    /// not been popped.
    pub fn front_ptr(&self) -> Option<NonNull<T>> {
        let first = self.first?;
        // SAFETY: a non-empty vector's first cluster holds at least one
        // element, at the start of its data array.
        Some(unsafe { first.as_ref().data() })
    }

    /// Address of the last element.
    ///
    /// Valid for dereferencing while the vector is alive and the element has
    /// not been popped.
    pub fn back_ptr(&self) -> Option<NonNull<T>> {
        let last = self.last?;
        // SAFETY: a non-empty vector's tail holds at least one live element.
        unsafe {
            let tail = last.as_ref();
            Some(NonNull::new_unchecked(
                tail.data().as_ptr().add(tail.len() - 1),
            ))
        }
    }

    /// Removes the element at `item` by overwriting it with the back element
    /// and popping the back. O(1); does not preserve element order.
    ///
    /// # Safety
    /// - `item` must address a live element of this vector.
    pub unsafe fn erase_unsorted(&mut self, item: NonNull<T>) {
        debug_assert!(!self.is_empty());
        let Some(back) = self.back_ptr() else { return };
        if back != item {
            // SAFETY: both pointers address distinct live elements.
            unsafe { std::ptr::swap(item.as_ptr(), back.as_ptr()) };
        }
        // Drops the erased value, now sitting at the back.
        self.pop_back();
    }

    /// Drops every element and frees every cluster.
    ///
    /// Teardown runs tail-to-head; only live elements are dropped (interior
    /// clusters are always completely full).
    pub fn clear(&mut self) {
        let mut cur = self.last.take();
        self.first = None;
        self.cluster_count = 0;
        while let Some(cluster) = cur {
            // SAFETY: the chain is exclusively owned and each cluster's first
            // `len()` elements are initialized.
            unsafe {
                let len = cluster.as_ref().len();
                let data = cluster.as_ref().data().as_ptr();
                std::ptr::drop_in_place(std::ptr::slice_from_raw_parts_mut(data, len));
                let prev = cluster.as_ref().prev;
                Cluster::free(&mut self.alloc, cluster);
                cur = prev;
            }
        }
    }

    /// Exchanges the entire contents of two vectors.
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(self, other);
    }

    /// Forward iterator over all elements, crossing cluster boundaries.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self.first, self.len())
    }

    /// Mutable forward iterator over all elements.
    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        IterMut::new(self.first, self.len())
    }
}

impl<T, A: ClusterAlloc, const STEP_SIZE: usize> Drop for ClusterVec<T, A, STEP_SIZE> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: fmt::Debug, A: ClusterAlloc, const STEP_SIZE: usize> fmt::Debug
    for ClusterVec<T, A, STEP_SIZE>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a, T, A: ClusterAlloc, const STEP_SIZE: usize> IntoIterator
    for &'a ClusterVec<T, A, STEP_SIZE>
{
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T, A: ClusterAlloc, const STEP_SIZE: usize> IntoIterator
    for &'a mut ClusterVec<T, A, STEP_SIZE>
{
    type Item = &'a mut T;
    type IntoIter = IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}
