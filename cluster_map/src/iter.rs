//! Value iterators over a map's dense storage.

use std::iter::FusedIterator;

use crate::map::DenseEntry;

/// Iterator over the live values of a
/// [`ClusterMap`][crate::ClusterMap], in unspecified order.
pub struct Iter<'a, T> {
    inner: cluster_vec::Iter<'a, DenseEntry<T>>,
}

impl<'a, T> Iter<'a, T> {
    pub(crate) fn new(inner: cluster_vec::Iter<'a, DenseEntry<T>>) -> Self {
        Self { inner }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|entry| &entry.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
impl<T> FusedIterator for Iter<'_, T> {}

/// Mutable iterator over the live values of a
/// [`ClusterMap`][crate::ClusterMap], in unspecified order.
pub struct IterMut<'a, T> {
    inner: cluster_vec::IterMut<'a, DenseEntry<T>>,
}

impl<'a, T> IterMut<'a, T> {
    pub(crate) fn new(inner: cluster_vec::IterMut<'a, DenseEntry<T>>) -> Self {
        Self { inner }
    }
}

impl<'a, T> Iterator for IterMut<'a, T> {
    type Item = &'a mut T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|entry| &mut entry.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> ExactSizeIterator for IterMut<'_, T> {}
impl<T> FusedIterator for IterMut<'_, T> {}
