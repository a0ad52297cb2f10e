//! Allocator seam used by [`ClusterVec`][crate::ClusterVec] for cluster storage.

use std::alloc::{handle_alloc_error, Layout};
use std::ptr::NonNull;

/// Raw memory provider for cluster allocations.
///
/// A cluster vector routes every allocation through this trait, so callers can
/// inject pooled or tagged allocators. The `Layout` carries both the byte size
/// and the required alignment; implementations must honor the alignment even
/// when it exceeds the platform's default allocation alignment, since stored
/// element types may be over-aligned.
///
/// Allocation failure is fatal by contract: `allocate` either returns memory
/// satisfying `layout` or diverges. There is no error return channel and the
/// containers attempt no rollback.
pub trait ClusterAlloc {
    /// Allocates a block of memory satisfying `layout`, or diverges.
    ///
    /// `layout` always has nonzero size.
    fn allocate(&mut self, layout: Layout) -> NonNull<u8>;

    /// Deallocates a block previously returned by [`allocate`][Self::allocate].
    ///
    /// # Safety
    /// - `ptr` must have been returned by `allocate` on this allocator with
    ///   the same `layout`, and must not have been deallocated before.
    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, layout: Layout);
}

/// Default allocator forwarding to the global Rust allocator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Global;

impl ClusterAlloc for Global {
    fn allocate(&mut self, layout: Layout) -> NonNull<u8> {
        debug_assert!(layout.size() != 0);
        // SAFETY: `layout` has nonzero size by the trait contract.
        let ptr = unsafe { std::alloc::alloc(layout) };
        let Some(ptr) = NonNull::new(ptr) else {
            handle_alloc_error(layout);
        };
        ptr
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: the caller guarantees `ptr` came from `alloc` with `layout`.
        unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) };
    }
}
