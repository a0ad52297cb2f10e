//! Forward iterators that lazily cross cluster boundaries.

use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::cluster::Cluster;

/// Borrowing iterator over a [`ClusterVec`][crate::ClusterVec].
///
/// Walks element pointers within a cluster and hops to the next cluster at
/// each segment boundary. Forward-only and restartable from
/// [`iter`][crate::ClusterVec::iter].
pub struct Iter<'a, T> {
    cluster: Option<NonNull<Cluster<T>>>,
    current: *const T,
    end: *const T,
    remaining: usize,
    _marker: PhantomData<&'a T>,
}

impl<'a, T> Iter<'a, T> {
    pub(crate) fn new(first: Option<NonNull<Cluster<T>>>, remaining: usize) -> Self {
        match first {
            Some(first) => {
                // SAFETY: the chain outlives the borrow this iterator holds.
                let cluster = unsafe { first.as_ref() };
                Iter {
                    cluster: Some(first),
                    current: cluster.begin(),
                    end: cluster.end(),
                    remaining,
                    _marker: PhantomData,
                }
            }
            None => Iter {
                cluster: None,
                current: std::ptr::null(),
                end: std::ptr::null(),
                remaining: 0,
                _marker: PhantomData,
            },
        }
    }

    /// Advances `current`/`end` to the start of the following cluster.
    fn hop_cluster(&mut self) {
        debug_assert!(self.cluster.is_some());
        if let Some(cluster) = self.cluster {
            // SAFETY: chain pointers stay valid for the iterator's lifetime.
            if let Some(next) = unsafe { cluster.as_ref() }.next_ptr() {
                // SAFETY: as above.
                let cluster = unsafe { next.as_ref() };
                self.cluster = Some(next);
                self.current = cluster.begin();
                self.end = cluster.end();
            }
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.remaining == 0 {
            return None;
        }
        // SAFETY: `remaining > 0` means `current` addresses a live element.
        let item = unsafe { &*self.current };
        self.remaining -= 1;
        // SAFETY: stepping to at most one past the cluster's live elements.
        self.current = unsafe { self.current.add(1) };
        if self.current == self.end && self.remaining > 0 {
            self.hop_cluster();
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
impl<T> FusedIterator for Iter<'_, T> {}

/// Mutably borrowing iterator over a [`ClusterVec`][crate::ClusterVec].
pub struct IterMut<'a, T> {
    cluster: Option<NonNull<Cluster<T>>>,
    current: *mut T,
    end: *mut T,
    remaining: usize,
    _marker: PhantomData<&'a mut T>,
}

impl<'a, T> IterMut<'a, T> {
    pub(crate) fn new(first: Option<NonNull<Cluster<T>>>, remaining: usize) -> Self {
        match first {
            Some(first) => {
                // SAFETY: the chain outlives the borrow this iterator holds.
                let cluster = unsafe { first.as_ref() };
                IterMut {
                    cluster: Some(first),
                    current: cluster.begin() as *mut T,
                    end: cluster.end() as *mut T,
                    remaining,
                    _marker: PhantomData,
                }
            }
            None => IterMut {
                cluster: None,
                current: std::ptr::null_mut(),
                end: std::ptr::null_mut(),
                remaining: 0,
                _marker: PhantomData,
            },
        }
    }

    fn hop_cluster(&mut self) {
        debug_assert!(self.cluster.is_some());
        if let Some(cluster) = self.cluster {
            // SAFETY: chain pointers stay valid for the iterator's lifetime.
            if let Some(next) = unsafe { cluster.as_ref() }.next_ptr() {
                // SAFETY: as above.
                let cluster = unsafe { next.as_ref() };
                self.cluster = Some(next);
                self.current = cluster.begin() as *mut T;
                self.end = cluster.end() as *mut T;
            }
        }
    }
}

impl<'a, T> Iterator for IterMut<'a, T> {
    type Item = &'a mut T;

    fn next(&mut self) -> Option<&'a mut T> {
        if self.remaining == 0 {
            return None;
        }
        // SAFETY: `remaining > 0` means `current` addresses a live element,
        // and the iterator yields each element at most once.
        let item = unsafe { &mut *self.current };
        self.remaining -= 1;
        // SAFETY: stepping to at most one past the cluster's live elements.
        self.current = unsafe { self.current.add(1) };
        if self.current == self.end && self.remaining > 0 {
            self.hop_cluster();
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for IterMut<'_, T> {}
impl<T> FusedIterator for IterMut<'_, T> {}
