//! A single fixed-capacity segment of a cluster chain.

use std::alloc::Layout;
use std::ptr::NonNull;

use crate::alloc::ClusterAlloc;

/// Chain position of a cluster.
///
/// The original formulation of this structure packs an "is tail" flag into the
/// low bit of a pointer; here the two states are an explicit variant instead.
pub(crate) enum ClusterLink<T> {
    /// This cluster is the chain's tail; the first `len` elements are live.
    Tail { len: usize },
    /// Interior cluster. Always completely full; `next` is the following
    /// cluster in the chain.
    Interior { next: NonNull<Cluster<T>> },
}

/// One fixed-capacity contiguous block of element storage in a cluster chain.
///
/// The header and the element array share a single allocation, with the array
/// placed directly after the header. A cluster's capacity is fixed when it is
/// allocated and elements inside it are never relocated; only the owning
/// [`ClusterVec`][crate::ClusterVec] creates and frees clusters.
pub struct Cluster<T> {
    pub(crate) prev: Option<NonNull<Cluster<T>>>,
    pub(crate) link: ClusterLink<T>,
    cap: usize,
    data: NonNull<T>,
}

impl<T> Cluster<T> {
    /// Combined layout of the header followed by `cap` elements, and the byte
    /// offset of the element array within it.
    fn layout_for_capacity(cap: usize) -> (Layout, usize) {
        let (layout, offset) = Layout::new::<Cluster<T>>()
            .extend(Layout::array::<T>(cap).unwrap())
            .unwrap();
        (layout, offset)
    }

    /// Allocates a cluster of capacity `cap` with no live elements, linked
    /// after `prev`.
    pub(crate) fn allocate<A: ClusterAlloc>(
        alloc: &mut A,
        prev: Option<NonNull<Cluster<T>>>,
        cap: usize,
    ) -> NonNull<Cluster<T>> {
        debug_assert!(cap > 0);
        let (layout, offset) = Self::layout_for_capacity(cap);
        let raw = alloc.allocate(layout);
        let header = raw.cast::<Cluster<T>>();
        // SAFETY: `raw` satisfies `layout`, which starts with the header and
        // places the element array at `offset`.
        unsafe {
            let data = NonNull::new_unchecked(raw.as_ptr().add(offset).cast::<T>());
            header.as_ptr().write(Cluster {
                prev,
                link: ClusterLink::Tail { len: 0 },
                cap,
                data,
            });
        }
        header
    }

    /// Returns the cluster's allocation to `alloc`.
    ///
    /// # Safety
    /// - `cluster` must have been returned by [`allocate`][Self::allocate] on
    ///   the same allocator and not freed since.
    /// - All elements of the cluster must already be dropped.
    pub(crate) unsafe fn free<A: ClusterAlloc>(alloc: &mut A, cluster: NonNull<Cluster<T>>) {
        // SAFETY: `allocate` produced this pointer with the layout derived
        // from its capacity; the header itself holds nothing that needs drop.
        unsafe {
            let (layout, _) = Self::layout_for_capacity(cluster.as_ref().cap);
            alloc.deallocate(cluster.cast::<u8>(), layout);
        }
    }

    pub(crate) fn data(&self) -> NonNull<T> {
        self.data
    }

    pub(crate) fn next_ptr(&self) -> Option<NonNull<Cluster<T>>> {
        match self.link {
            ClusterLink::Tail { .. } => None,
            ClusterLink::Interior { next } => Some(next),
        }
    }

    /// Live-element count of the tail, writable.
    ///
    /// Must only be called on the chain's tail.
    pub(crate) fn tail_len_mut(&mut self) -> &mut usize {
        match &mut self.link {
            ClusterLink::Tail { len } => len,
            ClusterLink::Interior { .. } => unreachable!("interior cluster treated as tail"),
        }
    }

    /// Number of element slots in this cluster, fixed at allocation time.
    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Number of live elements.
    ///
    /// Interior clusters are always completely full and report their capacity;
    /// only the tail can be partially filled.
    pub fn len(&self) -> usize {
        match self.link {
            ClusterLink::Tail { len } => len,
            ClusterLink::Interior { .. } => self.cap,
        }
    }

    /// Returns `true` when this cluster holds no live elements.
    ///
    /// Only ever the case for a freshly allocated tail; the owning vector
    /// frees a tail as soon as it becomes empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` when this cluster is the chain's tail.
    pub fn is_tail(&self) -> bool {
        matches!(self.link, ClusterLink::Tail { .. })
    }

    /// The following cluster in the chain, or `None` for the tail.
    pub fn next(&self) -> Option<&Cluster<T>> {
        // SAFETY: interior links always point at a live cluster owned by the
        // same chain, which outlives the `&self` borrow.
        self.next_ptr().map(|next| unsafe { &*next.as_ptr() })
    }

    /// Pointer to the first element slot.
    pub fn begin(&self) -> *const T {
        self.data.as_ptr()
    }

    /// Pointer one past the last live element.
    pub fn end(&self) -> *const T {
        // SAFETY: `len() <= cap`, so this stays within (or one past) the
        // element array.
        unsafe { self.data.as_ptr().add(self.len()) }
    }

    /// The live elements of this cluster as a contiguous slice.
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: the first `len()` slots are always initialized.
        unsafe { std::slice::from_raw_parts(self.data.as_ptr(), self.len()) }
    }
}
