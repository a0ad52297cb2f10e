#![allow(missing_docs)] // test only
#![allow(clippy::undocumented_unsafe_blocks)]

use std::alloc::Layout;
use std::cell::Cell;
use std::ptr::NonNull;
use std::rc::Rc;

use rand::prelude::*;

use crate::vec::full_chain_len;
use crate::{ClusterAlloc, ClusterVec, Global};

fn chain_walk_len<T, A: ClusterAlloc, const STEP_SIZE: usize>(
    vec: &ClusterVec<T, A, STEP_SIZE>,
) -> usize {
    let mut total = 0;
    let mut cluster = vec.first_cluster();
    while let Some(c) = cluster {
        total += c.len();
        cluster = c.next();
    }
    total
}

#[test]
fn push_back_basic() {
    let mut sv: ClusterVec<i32> = ClusterVec::new(8);
    sv.push_back(0);
    sv.push_back(1);
    sv.push_back(2);
    sv.push_back(3);

    assert_eq!(sv.iter().copied().collect::<Vec<_>>(), [0, 1, 2, 3]);
    assert_eq!(sv.len(), 4);
}

#[test]
fn empty_vec() {
    let sv: ClusterVec<i32> = ClusterVec::new(8);
    assert!(sv.is_empty());
    assert_eq!(sv.len(), 0);
    assert_eq!(sv.cluster_count(), 0);
    assert_eq!(sv.front(), None);
    assert_eq!(sv.back(), None);
    assert_eq!(sv.iter().next(), None);
}

#[test]
fn cluster_count_growth() {
    let mut sv: ClusterVec<i32> = ClusterVec::new(4);
    sv.push_back(42);
    assert_eq!(sv.len(), 1);
    assert_eq!(sv.cluster_count(), 1);
    assert!(!sv.is_empty());

    sv.push_back(43);
    sv.push_back(44);
    sv.push_back(45);
    sv.push_back(46);
    assert_eq!(sv.len(), 5);
    assert_eq!(sv.cluster_count(), 2);

    assert_eq!(sv.front(), Some(&42));
    assert_eq!(sv.back(), Some(&46));

    sv.pop_back();
    assert_eq!(sv.len(), 4);
    assert_eq!(sv.cluster_count(), 1);

    sv.clear();
    assert!(sv.is_empty());
    assert_eq!(sv.len(), 0);
    assert_eq!(sv.cluster_count(), 0);
}

#[test]
fn foreach_and_pop_all() {
    let init_values: Vec<i32> = (0..2048).collect();

    let mut sv: ClusterVec<i32> = ClusterVec::new(4);
    for &i in &init_values {
        sv.push_back(i);
    }

    assert_eq!(sv.len(), 2048);
    assert_eq!(sv.cluster_count(), 10);

    for (a, b) in sv.iter().zip(&init_values) {
        assert_eq!(a, b);
    }

    for remaining in (0..init_values.len()).rev() {
        sv.pop_back();
        assert_eq!(sv.len(), remaining);
        assert!(sv.iter().eq(init_values[..remaining].iter()));
    }
    assert!(sv.is_empty());
}

#[test]
fn addresses_are_stable() {
    let mut sv: ClusterVec<u64> = ClusterVec::new(2);
    let mut ptrs = Vec::new();
    for i in 0..500u64 {
        ptrs.push(sv.push_back_ptr(i));
    }
    for i in 500..1000u64 {
        sv.push_back(i);
    }
    for _ in 0..300 {
        sv.pop_back();
    }
    // The first 500 elements were never popped, so every recorded address is
    // still the element's address and still holds the inserted value.
    for (i, ptr) in ptrs.iter().enumerate() {
        // SAFETY: element `i` is still live.
        assert_eq!(unsafe { *ptr.as_ptr() }, i as u64);
    }
    for (i, item) in sv.iter().enumerate().take(500) {
        assert_eq!(item as *const u64, ptrs[i].as_ptr() as *const u64);
    }
}

#[test]
fn push_pop_is_lifo() {
    let mut sv: ClusterVec<u64> = ClusterVec::new(4);
    let mut ptrs = Vec::new();
    for i in 0..100u64 {
        ptrs.push(sv.push_back_ptr(i));
    }
    let len = sv.len();

    sv.push_back(999);
    assert_eq!(sv.len(), len + 1);
    assert_eq!(sv.pop_back(), Some(999));
    assert_eq!(sv.len(), len);

    for (i, ptr) in ptrs.iter().enumerate() {
        // SAFETY: the elements below the popped one are untouched.
        assert_eq!(unsafe { *ptr.as_ptr() }, i as u64);
    }
    assert!(sv.iter().copied().eq(0..100));
}

#[test]
fn len_formula_matches_series_sum() {
    for step in 2..=4usize {
        for initial_capacity in [1usize, 3, 64] {
            let mut brute = 0usize;
            for full_clusters in 0..=20usize {
                assert_eq!(
                    full_chain_len(initial_capacity, step, full_clusters),
                    brute,
                    "step {step}, initial capacity {initial_capacity}, \
                     {full_clusters} full clusters"
                );
                brute += initial_capacity * step.pow(full_clusters as u32);
            }
        }
    }
}

fn check_len_against_chain_walk<const STEP_SIZE: usize>(
    initial_capacity: usize,
    target_clusters: usize,
) {
    let mut sv: ClusterVec<usize, Global, STEP_SIZE> = ClusterVec::with_allocator(
        initial_capacity,
        Global,
    );
    let mut pushed = 0;
    while sv.cluster_count() < target_clusters {
        sv.push_back(pushed);
        pushed += 1;
        assert_eq!(sv.len(), pushed);
        assert_eq!(sv.len(), chain_walk_len(&sv));
    }
    // Capacities along the chain follow the geometric growth law.
    let mut expected_cap = initial_capacity;
    let mut cluster = sv.first_cluster();
    while let Some(c) = cluster {
        assert_eq!(c.capacity(), expected_cap);
        assert_eq!(c.is_tail(), c.next().is_none());
        expected_cap *= STEP_SIZE;
        cluster = c.next();
    }
    while sv.pop_back().is_some() {
        pushed -= 1;
        assert_eq!(sv.len(), pushed);
        assert_eq!(sv.len(), chain_walk_len(&sv));
    }
}

#[test]
fn len_matches_chain_walk_step_2() {
    check_len_against_chain_walk::<2>(1, 12);
}

#[test]
fn len_matches_chain_walk_step_3() {
    check_len_against_chain_walk::<3>(2, 8);
}

#[test]
fn len_matches_chain_walk_step_4() {
    check_len_against_chain_walk::<4>(3, 7);
}

#[test]
fn erase_unsorted_moves_back() {
    let mut sv: ClusterVec<i32> = ClusterVec::new(4);
    let mut target = None;
    for i in 0..10 {
        let ptr = sv.push_back_ptr(i);
        if i == 3 {
            target = Some(ptr);
        }
    }
    // SAFETY: element 3 is live.
    unsafe { sv.erase_unsorted(target.unwrap()) };
    assert_eq!(sv.len(), 9);
    assert_eq!(
        sv.iter().copied().collect::<Vec<_>>(),
        [0, 1, 2, 9, 4, 5, 6, 7, 8]
    );

    // Erasing the back element is a plain pop.
    let back = sv.back_ptr().unwrap();
    // SAFETY: the back element is live.
    unsafe { sv.erase_unsorted(back) };
    assert_eq!(
        sv.iter().copied().collect::<Vec<_>>(),
        [0, 1, 2, 9, 4, 5, 6, 7]
    );
}

#[test]
fn tail_promotion_refills_to_capacity() {
    let mut sv: ClusterVec<i32> = ClusterVec::new(2);
    sv.push_back(1);
    sv.push_back(2);
    sv.push_back(3);
    assert_eq!(sv.cluster_count(), 2);

    sv.pop_back();
    assert_eq!(sv.cluster_count(), 1);
    let tail = sv.first_cluster().unwrap();
    assert!(tail.is_tail());
    assert_eq!(tail.len(), tail.capacity());

    // The promoted tail is full again, so the next push must grow a fresh
    // cluster immediately.
    sv.push_back(4);
    assert_eq!(sv.cluster_count(), 2);
    assert_eq!(sv.iter().copied().collect::<Vec<_>>(), [1, 2, 4]);
}

#[derive(Clone)]
struct DropCounter(Rc<Cell<usize>>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

#[test]
fn clear_and_drop_run_destructors_once() {
    let drops = Rc::new(Cell::new(0));
    {
        let mut sv: ClusterVec<DropCounter> = ClusterVec::new(4);
        for _ in 0..100 {
            sv.push_back(DropCounter(drops.clone()));
        }
        for _ in 0..30 {
            sv.pop_back();
        }
        assert_eq!(drops.get(), 30);
        sv.clear();
        assert_eq!(drops.get(), 100);
        for _ in 0..10 {
            sv.push_back(DropCounter(drops.clone()));
        }
    }
    assert_eq!(drops.get(), 110);
}

#[repr(align(64))]
#[derive(Debug, PartialEq)]
struct OverAligned(u8);

#[test]
fn over_aligned_elements() {
    let mut sv: ClusterVec<OverAligned> = ClusterVec::new(2);
    for i in 0..20u8 {
        let ptr = sv.push_back_ptr(OverAligned(i));
        assert_eq!(ptr.as_ptr() as usize % 64, 0);
    }
    assert!(sv.iter().map(|a| a.0).eq(0..20));
}

/// Allocator wrapper that counts outstanding allocations and verifies layouts
/// pair up across allocate/deallocate.
#[derive(Clone, Default)]
struct CountingAlloc {
    live: Rc<Cell<usize>>,
    total: Rc<Cell<usize>>,
}

impl ClusterAlloc for CountingAlloc {
    fn allocate(&mut self, layout: Layout) -> NonNull<u8> {
        self.live.set(self.live.get() + 1);
        self.total.set(self.total.get() + 1);
        Global.allocate(layout)
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, layout: Layout) {
        assert!(self.live.get() > 0);
        self.live.set(self.live.get() - 1);
        // SAFETY: forwarded unchanged from the caller.
        unsafe { Global.deallocate(ptr, layout) };
    }
}

#[test]
fn injected_allocator_balances() {
    let alloc = CountingAlloc::default();
    {
        let mut sv: ClusterVec<u64, CountingAlloc> =
            ClusterVec::with_allocator(4, alloc.clone());
        for i in 0..100 {
            sv.push_back(i);
        }
        assert_eq!(alloc.live.get(), sv.cluster_count());
        while sv.pop_back().is_some() {}
        assert_eq!(alloc.live.get(), 0);
        for i in 0..10 {
            sv.push_back(i);
        }
    }
    assert_eq!(alloc.live.get(), 0);
    assert!(alloc.total.get() > 0);
}

#[test]
fn random_churn_matches_vec() {
    let mut rng = rand_pcg::Pcg64::seed_from_u64(39);
    let mut dut: ClusterVec<u64, Global, 3> = ClusterVec::with_allocator(2, Global);
    let mut spec: Vec<u64> = Vec::new();

    for step in 0..4000 {
        if rng.gen_range(0..10) < 6 {
            let value = rng.gen();
            dut.push_back(value);
            spec.push(value);
        } else {
            assert_eq!(dut.pop_back(), spec.pop());
        }
        assert_eq!(dut.len(), spec.len());
        assert_eq!(dut.front(), spec.first());
        assert_eq!(dut.back(), spec.last());
        if step % 64 == 0 {
            assert!(dut.iter().eq(spec.iter()));
        }
    }
    assert!(dut.iter().eq(spec.iter()));
}

#[test]
fn iter_mut_updates_in_place() {
    let mut sv: ClusterVec<u64> = ClusterVec::new(2);
    for i in 0..50 {
        sv.push_back(i);
    }
    for item in sv.iter_mut() {
        *item *= 2;
    }
    assert!(sv.iter().copied().eq((0..50).map(|i| i * 2)));
}
