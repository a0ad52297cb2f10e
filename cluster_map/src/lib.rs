//! Handle-based container with stable element identity and packed iteration.
//!
//! [`ClusterMap`] layers a sparse/dense slot indirection on top of
//! [`cluster_vec::ClusterVec`]: inserting returns an opaque [`Handle`] that
//! stays valid across arbitrary later insertions and erasures, while the
//! values themselves remain densely packed for fast traversal. Erasure is
//! O(1) swap-and-pop; handle dereference is O(1) through a single always
//! address-stable indirection cell.
//!
//! Handles carry no liveness information that can be checked for free, so
//! the handle-consuming accessors are `unsafe`; debug builds additionally
//! verify handles against a per-slot generation counter.

mod handle;
mod iter;
mod map;

pub use handle::Handle;
pub use iter::{Iter, IterMut};
pub use map::ClusterMap;
