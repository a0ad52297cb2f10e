//! A segmented vector that grows by chaining fixed clusters of geometrically
//! increasing capacity, so pushed elements keep their address for life.
//!
//! Growth never reallocates or moves existing elements: a full tail cluster is
//! followed by a freshly allocated, larger one. This trades random-access
//! indexing for address stability, which is what the `cluster_map` crate's
//! handle scheme is built on.

mod alloc;
mod cluster;
mod iter;
mod vec;

pub use alloc::{ClusterAlloc, Global};
pub use cluster::Cluster;
pub use iter::{Iter, IterMut};
pub use vec::ClusterVec;

#[cfg(test)]
#[path = "test_vec.rs"]
mod test_vec;
