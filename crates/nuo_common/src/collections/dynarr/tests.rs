use std::{
    cell::Cell,
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    panic::{self, AssertUnwindSafe},
    rc::Rc,
};

use crate::{
    alloc::TrackingAllocator,
    collections::{ExactReserveStrategy, Pow2ReserveStrategy, ThreeHalvesReserveStrategy},
};
use super::*;

type TrackedArr<T> = DynArr<T, TrackingAllocator>;
type PropagatingArr<T> = DynArr<T, TrackingAllocator<true>>;

fn tracker() -> TrackingAllocator {
    TrackingAllocator::new()
}

/// Value whose clones fail once its shared fuse has burned down
#[derive(Debug)]
struct Bomb {
    value: i32,
    fuse:  Rc<Cell<usize>>,
}

impl Bomb {
    fn new(value: i32, fuse: &Rc<Cell<usize>>) -> Self {
        Self { value, fuse: fuse.clone() }
    }
}

impl Clone for Bomb {
    fn clone(&self) -> Self {
        let left = self.fuse.get();
        if left == 0 {
            panic!("bomb went off");
        }
        self.fuse.set(left - 1);
        Self { value: self.value, fuse: self.fuse.clone() }
    }
}

fn values<A: Allocator, R: ReserveStrategy>(arr: &DynArr<Bomb, A, R>) -> Vec<i32> {
    arr.iter().map(|bomb| bomb.value).collect()
}

/// Iterator that reports an exact size of 1, whatever it actually yields
struct Undercount<I>(I);

impl<I: Iterator> Iterator for Undercount<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<I::Item> {
        self.0.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (1, Some(1))
    }
}

struct DropCounter(Rc<Cell<usize>>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

//------------------------------------------------------------------------------------------------------------------------------

#[test]
fn dynarr_new() {
    let arr = DynArr::<i32>::new();
    assert_eq!(arr.capacity(), 0);
    assert_eq!(arr.len(), 0);
    assert!(arr.is_empty());

    let arr = DynArr::<i32>::with_capacity(21).unwrap();
    assert_eq!(arr.capacity(), 21);
    assert_eq!(arr.len(), 0);

    let arr: DynArr<i32> = dynarr![];
    assert!(arr.is_empty());
}

#[test]
fn dynarr_with_len_and_value() {
    let arr = DynArr::<String>::with_len(3).unwrap();
    assert_eq!(arr, ["", "", ""]);
    assert_eq!(arr.capacity(), 3);

    let arr = DynArr::with_value(3, 7).unwrap();
    assert_eq!(arr, [7, 7, 7]);
    assert_eq!(arr.capacity(), 3);

    let arr = dynarr![String::from("x"); 2];
    assert_eq!(arr, ["x", "x"]);
}

#[test]
fn dynarr_push_and_access() {
    let mut arr = DynArr::<i32>::new();

    arr.push(42).unwrap();
    assert!(arr.capacity() >= 1);
    assert_eq!(arr.len(), 1);
    assert_eq!(arr[0], 42);

    arr.push(84).unwrap();
    assert!(arr.capacity() >= 2);
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[1], 84);

    *arr.emplace_back(|| 21).unwrap() += 1;
    assert_eq!(arr, [42, 84, 22]);
}

#[test]
fn dynarr_push_pop_scenario() {
    let mut arr = DynArr::new();
    for i in 1..=3 {
        arr.push(i).unwrap();
    }
    assert_eq!(arr, [1, 2, 3]);

    assert_eq!(arr.pop_back(), Ok(()));
    assert_eq!(arr, [1, 2]);
    assert_eq!(arr.at(1), Ok(&2));
    assert_eq!(arr.at(5), Err(DynArrError::OutOfRange { index: 5, len: 2 }));
    assert_eq!(arr.at(2), Err(DynArrError::OutOfRange { index: 2, len: 2 }));

    assert_eq!(arr.pop(), Some(2));
    assert_eq!(arr.pop(), Some(1));
    assert_eq!(arr.pop(), None);
    assert_eq!(arr.pop_back(), Err(DynArrError::Empty));
}

#[test]
fn dynarr_pop_and_remove_balance_allocator() {
    let alloc = tracker();
    let mut arr = TrackedArr::from_slice_in(&["a", "b", "c", "d"].map(String::from), alloc.clone()).unwrap();

    arr.pop_back().unwrap();
    assert_eq!(arr, ["a", "b", "c"]);
    assert_eq!(alloc.destroys(), 1);

    assert_eq!(arr.pop().as_deref(), Some("c"));
    assert_eq!(arr.remove(0).as_deref(), Ok("a"));
    assert_eq!(arr, ["b"]);
    assert_eq!(alloc.live_values(), arr.len());

    drop(arr);
    assert_eq!(alloc.constructs(), alloc.destroys());
}

#[test]
fn dynarr_front_back() {
    let mut arr = dynarr![1, 2, 3];
    assert_eq!(arr.front(), Some(&1));
    assert_eq!(arr.back(), Some(&3));
    *arr.front_mut().unwrap() = 10;
    *arr.back_mut().unwrap() = 30;
    *arr.at_mut(1).unwrap() = 20;
    assert_eq!(arr, [10, 20, 30]);

    let empty = DynArr::<i32>::new();
    assert_eq!(empty.front(), None);
    assert_eq!(empty.back(), None);
}

#[test]
fn dynarr_growth_doubles() {
    let mut arr = DynArr::new();
    let mut caps = Vec::new();
    for i in 0..9 {
        arr.push(i).unwrap();
        caps.push(arr.capacity());
    }
    assert_eq!(caps, [1, 2, 4, 4, 8, 8, 8, 8, 16]);
}

#[test]
fn dynarr_other_strategies() {
    let mut arr = DynArr::<i32, Mallocator, Pow2ReserveStrategy>::new_in(Mallocator);
    arr.reserve(5).unwrap();
    assert_eq!(arr.capacity(), 8);

    let mut arr = DynArr::<i32, Mallocator, ThreeHalvesReserveStrategy>::new_in(Mallocator);
    arr.reserve(10).unwrap();
    assert_eq!(arr.capacity(), 13);

    let mut arr = DynArr::<i32, Mallocator, ExactReserveStrategy>::new_in(Mallocator);
    for i in 0..3 {
        arr.push(i).unwrap();
        assert_eq!(arr.capacity(), arr.len());
    }
}

#[test]
fn dynarr_reserve() {
    let mut arr = DynArr::<i32>::new();
    arr.reserve(21).unwrap();
    assert!(arr.capacity() >= 21);

    let cap = arr.capacity();
    arr.reserve(3).unwrap();
    assert_eq!(arr.capacity(), cap);

    let mut arr = dynarr![1, 2, 3];
    arr.reserve(4).unwrap();
    assert_eq!(arr.capacity(), 6);

    let mut arr = dynarr![1, 2, 3];
    arr.reserve_exact(4).unwrap();
    assert_eq!(arr.capacity(), 4);
    assert_eq!(arr, [1, 2, 3]);
}

#[test]
fn dynarr_reserve_and_push() {
    let mut arr = DynArr::<i32>::new();
    arr.reserve(10).unwrap();
    let old_cap = arr.capacity();

    arr.push(42).unwrap();
    assert_eq!(arr.capacity(), old_cap);
    arr.push(84).unwrap();
    assert_eq!(arr.capacity(), old_cap);
    assert_eq!(arr, [42, 84]);
}

#[test]
fn dynarr_length_exceeded() {
    let max = isize::MAX as usize / 8;

    let mut arr = DynArr::<u64>::new();
    assert_eq!(arr.max_size(), max);
    assert_eq!(arr.reserve(usize::MAX), Err(DynArrError::LengthExceeded { requested: usize::MAX, max }));
    assert_eq!(arr.capacity(), 0);

    assert!(matches!(DynArr::<u64>::with_capacity(max + 1), Err(DynArrError::LengthExceeded { .. })));
}

#[test]
fn dynarr_failed_reserve_leaves_array_untouched() {
    let alloc = tracker();
    let mut arr = TrackedArr::from_slice_in(&[1, 2, 3], alloc.clone()).unwrap();
    let ptr = arr.as_ptr();
    let begin = arr.begin();

    alloc.fail_after(0);
    assert!(matches!(arr.reserve(100), Err(DynArrError::Alloc(_))));
    assert!(matches!(arr.push(4), Err(DynArrError::Alloc(_))));
    assert!(matches!(arr.insert(arr.begin(), 0), Err(DynArrError::Alloc(_))));
    alloc.disarm();

    assert_eq!(arr, [1, 2, 3]);
    assert_eq!(arr.capacity(), 3);
    assert_eq!(arr.as_ptr(), ptr);
    assert_eq!(arr.at_cursor(begin), Ok(&1));

    drop(arr);
    assert_eq!(alloc.live_allocations(), 0);
    assert_eq!(alloc.live_values(), 0);
}

#[test]
fn dynarr_resize() {
    let mut arr = dynarr![1, 2, 3];
    arr.resize(6, 5).unwrap();
    assert_eq!(arr, [1, 2, 3, 5, 5, 5]);

    let mut arr = dynarr![1, 2, 3];
    arr.resize(2, 5).unwrap();
    assert_eq!(arr, [1, 2]);

    let mut arr = dynarr![1, 2, 3];
    let mut i = 4;
    arr.resize_with(6, || { let res = i; i *= 2; res }).unwrap();
    assert_eq!(arr, [1, 2, 3, 4, 8, 16]);

    let mut arr = dynarr![1, 2, 3];
    arr.resize_default(5).unwrap();
    assert_eq!(arr, [1, 2, 3, 0, 0]);
    arr.resize_default(1).unwrap();
    assert_eq!(arr, [1]);
}

#[test]
fn dynarr_resize_with_panic_rolls_back() {
    let alloc = tracker();
    let mut arr = TrackedArr::from_slice_in(&[1, 2], alloc.clone()).unwrap();

    let mut n = 0;
    let res = panic::catch_unwind(AssertUnwindSafe(|| {
        arr.resize_with(6, || {
            n += 1;
            if n == 3 {
                panic!("out of values");
            }
            n
        })
    }));
    assert!(res.is_err());
    assert_eq!(arr, [1, 2]);
    assert_eq!(alloc.live_values(), 2);
}

#[test]
fn dynarr_truncate_and_clear() {
    let mut arr = dynarr![1, 2, 3, 4, 5, 6];
    arr.truncate(3);
    assert_eq!(arr, [1, 2, 3]);
    arr.truncate(8);
    assert_eq!(arr, [1, 2, 3]);

    let cap = arr.capacity();
    arr.clear();
    assert!(arr.is_empty());
    assert_eq!(arr.capacity(), cap);
}

#[test]
fn dynarr_drops_elements() {
    let drops = Rc::new(Cell::new(0));
    let mut arr = DynArr::new();
    for _ in 0..3 {
        arr.push(DropCounter(drops.clone())).unwrap();
    }

    arr.truncate(1);
    assert_eq!(drops.get(), 2);

    drop(arr);
    assert_eq!(drops.get(), 3);
}

#[test]
fn dynarr_shrink() {
    let mut arr = dynarr![1, 2, 3, 4, 5];
    arr.reserve(20).unwrap();
    arr.shrink_to_fit();
    assert_eq!(arr.capacity(), 5);
    assert_eq!(arr, [1, 2, 3, 4, 5]);

    arr.clear();
    arr.shrink_to_fit();
    assert_eq!(arr.capacity(), 0);
}

#[test]
fn dynarr_failed_shrink_keeps_capacity() {
    let alloc = tracker();
    let mut arr = TrackedArr::from_slice_in(&[1, 2, 3], alloc.clone()).unwrap();
    arr.reserve(10).unwrap();
    assert_eq!(arr.capacity(), 10);

    alloc.fail_after(0);
    arr.shrink_to_fit();
    assert_eq!(arr.capacity(), 10);
    assert_eq!(arr, [1, 2, 3]);

    alloc.disarm();
    arr.shrink_to_fit();
    assert_eq!(arr.capacity(), 3);
    assert_eq!(alloc.live_allocations(), 1);
}

#[test]
fn dynarr_zero_sized() {
    let alloc = tracker();
    let mut arr = TrackedArr::<()>::new_in(alloc.clone());
    for _ in 0..10 {
        arr.push(()).unwrap();
    }
    assert_eq!(arr.len(), 10);
    assert!(arr.capacity() >= 10);
    assert_eq!(arr.max_size(), usize::MAX);

    arr.shrink_to_fit();
    assert_eq!(arr.capacity(), 10);
    arr.erase_range(arr.begin(), arr.begin() + 4).unwrap();
    assert_eq!(arr.len(), 6);

    drop(arr);
    assert_eq!(alloc.total_allocations(), 0);
}

//------------------------------------------------------------------------------------------------------------------------------

#[test]
fn dynarr_insert() {
    let mut arr = dynarr![1, 2, 3];
    let pos = arr.insert(arr.begin() + 1, 99).unwrap();
    assert_eq!(arr, [1, 99, 2, 3]);
    assert_eq!(arr.index_of(pos), Ok(1));

    arr.insert(arr.end(), 4).unwrap();
    assert_eq!(arr, [1, 99, 2, 3, 4]);
    arr.insert(arr.begin(), 0).unwrap();
    assert_eq!(arr, [0, 1, 99, 2, 3, 4]);
}

#[test]
fn dynarr_insert_then_erase_restores() {
    let mut arr = dynarr![1, 2, 3, 4];
    let pos = arr.insert(arr.begin() + 2, 42).unwrap();
    arr.erase(pos).unwrap();
    assert_eq!(arr, [1, 2, 3, 4]);
}

#[test]
fn dynarr_insert_n_and_slice() {
    let mut arr = dynarr![1, 4];
    let pos = arr.insert_slice(arr.begin() + 1, &[2, 3]).unwrap();
    assert_eq!(arr, [1, 2, 3, 4]);
    assert_eq!(arr.at_cursor(pos), Ok(&2));

    let pos = arr.insert_n(arr.end(), 3, 5).unwrap();
    assert_eq!(arr, [1, 2, 3, 4, 5, 5, 5]);
    assert_eq!(arr.index_of(pos), Ok(4));

    let begin = arr.begin();
    assert_eq!(arr.insert_n(begin, 0, 9), Ok(begin));
    assert_eq!(arr.len(), 7);
}

#[test]
fn dynarr_insert_iter() {
    let mut arr = dynarr![1, 2, 3];
    arr.insert_iter(arr.begin() + 1, [7, 8]).unwrap();
    assert_eq!(arr, [1, 7, 8, 2, 3]);

    // `filter` only gives an upper bound
    let mut arr = dynarr![1, 2, 3];
    let pos = arr.insert_iter(arr.begin() + 1, (10..20).filter(|x| x % 3 == 0)).unwrap();
    assert_eq!(arr, [1, 12, 15, 18, 2, 3]);
    assert_eq!(arr.at_cursor(pos), Ok(&12));

    let mut arr = dynarr![1, 2];
    arr.insert_iter(arr.end(), core::iter::empty()).unwrap();
    assert_eq!(arr, [1, 2]);
}

#[test]
fn dynarr_insert_iter_beyond_size_hint() {
    let mut arr = dynarr![1, 2, 3];
    let pos = arr.insert_iter(arr.begin() + 1, Undercount(10..13)).unwrap();
    assert_eq!(arr, [1, 10, 11, 12, 2, 3]);
    assert_eq!(arr.at_cursor(pos), Ok(&10));
}

#[test]
fn dynarr_insert_iter_beyond_size_hint_rolls_back() {
    let alloc = tracker();
    let mut arr = TrackedArr::from_slice_in(&[1, 2, 3], alloc.clone()).unwrap();

    // Growing for the reported item succeeds, growing again for the surplus fails
    alloc.fail_after(1);
    let res = arr.insert_iter(arr.begin() + 1, Undercount(10..14));
    alloc.disarm();
    assert!(matches!(res, Err(DynArrError::Alloc(_))));
    assert_eq!(arr, [1, 2, 3]);
    assert_eq!(alloc.live_values(), 3);

    let mut n = 0;
    let surplus = core::iter::from_fn(|| {
        n += 1;
        if n == 3 {
            panic!("out of values");
        }
        Some(n * 10)
    });
    let res = panic::catch_unwind(AssertUnwindSafe(|| arr.insert_iter(arr.begin() + 1, Undercount(surplus))));
    assert!(res.is_err());
    assert_eq!(arr, [1, 2, 3]);
    assert_eq!(alloc.live_values(), 3);

    drop(arr);
    assert_eq!(alloc.live_allocations(), 0);
}

#[test]
fn dynarr_insert_panic_restores_sequence() {
    let alloc = tracker();
    let fuse = Rc::new(Cell::new(usize::MAX));
    let mut arr = TrackedArr::from_iter_in((0..4).map(|v| Bomb::new(v, &fuse)), alloc.clone()).unwrap();

    fuse.set(2);
    let bomb = Bomb::new(99, &fuse);
    let pos = arr.begin() + 1;
    let res = panic::catch_unwind(AssertUnwindSafe(|| arr.insert_n(pos, 3, bomb)));
    assert!(res.is_err());
    assert_eq!(values(&arr), [0, 1, 2, 3]);
    assert_eq!(alloc.live_values(), 4);

    let src = [Bomb::new(7, &fuse), Bomb::new(8, &fuse)];
    fuse.set(1);
    let res = panic::catch_unwind(AssertUnwindSafe(|| arr.insert_slice(arr.end(), &src)));
    assert!(res.is_err());
    assert_eq!(values(&arr), [0, 1, 2, 3]);
    assert_eq!(alloc.live_values(), 4);

    drop(arr);
    assert_eq!(alloc.live_allocations(), 0);
    assert_eq!(alloc.live_values(), 0);
}

#[test]
fn dynarr_emplace_panic_restores_sequence() {
    let mut arr = dynarr![1, 2, 3];
    let res = panic::catch_unwind(AssertUnwindSafe(|| arr.emplace(arr.begin() + 1, || panic!("no value"))));
    assert!(res.is_err());
    assert_eq!(arr, [1, 2, 3]);

    let res = panic::catch_unwind(AssertUnwindSafe(|| arr.emplace_back(|| -> i32 { panic!("no value") }).map(|_| ())));
    assert!(res.is_err());
    assert_eq!(arr, [1, 2, 3]);
}

#[test]
fn dynarr_erase() {
    let mut arr = dynarr![1, 99, 2, 3];
    let pos = arr.erase_range(arr.begin(), arr.begin() + 2).unwrap();
    assert_eq!(arr, [2, 3]);
    assert_eq!(arr.index_of(pos), Ok(0));

    let pos = arr.erase(arr.begin() + 1).unwrap();
    assert_eq!(arr, [2]);
    assert_eq!(pos, arr.end());
}

#[test]
fn dynarr_erase_errors() {
    let mut arr = dynarr![1, 2, 3];

    assert!(matches!(
        arr.erase_range(arr.begin() + 2, arr.begin()),
        Err(DynArrError::InvalidArgument { .. })
    ));
    assert_eq!(arr.erase_range(arr.begin(), arr.begin() + 4), Err(DynArrError::OutOfRange { index: 4, len: 3 }));
    assert_eq!(arr.erase(arr.end()), Err(DynArrError::OutOfRange { index: 3, len: 3 }));

    let other = dynarr![1, 2, 3];
    assert_eq!(arr.erase(other.begin()), Err(DynArrError::InvalidatedCursor));
    assert_eq!(arr, [1, 2, 3]);
}

#[test]
fn dynarr_erase_empty_range_keeps_cursors() {
    let mut arr = dynarr![1, 2, 3];
    let pos = arr.begin() + 1;
    assert_eq!(arr.erase_range(pos, pos), Ok(pos));
    assert_eq!(arr.at_cursor(pos), Ok(&2));
}

#[test]
fn dynarr_erase_destroys_through_allocator() {
    let alloc = tracker();
    let mut arr = TrackedArr::from_slice_in(&["a", "b", "c", "d"].map(String::from), alloc.clone()).unwrap();
    arr.erase_range(arr.begin() + 1, arr.begin() + 3).unwrap();
    assert_eq!(arr, ["a", "d"]);
    assert_eq!(alloc.destroys(), 2);
}

#[test]
fn dynarr_remove() {
    let mut arr = dynarr![1, 2, 3, 4, 5, 6];
    assert_eq!(arr.remove(2), Ok(3));
    assert_eq!(arr, [1, 2, 4, 5, 6]);
    assert_eq!(arr.remove(10), Err(DynArrError::OutOfRange { index: 10, len: 5 }));
}

#[test]
fn dynarr_append() {
    let mut arr = dynarr![1, 2];
    arr.append_range(3..5).unwrap();
    arr.extend_from_slice(&[5, 6]).unwrap();
    arr.extend([7]);
    arr.extend(&[8, 9]);
    assert_eq!(arr, [1, 2, 3, 4, 5, 6, 7, 8, 9]);
}

#[test]
fn dynarr_append_panic_rolls_back() {
    let mut arr = dynarr![1, 2];
    let res = panic::catch_unwind(AssertUnwindSafe(|| {
        arr.append_range((3..10).map(|x| if x == 6 { panic!("iterator failed") } else { x }))
    }));
    assert!(res.is_err());
    assert_eq!(arr, [1, 2]);
}

#[test]
fn dynarr_append_failure_rolls_back() {
    let alloc = tracker();
    let mut arr = TrackedArr::from_slice_in(&[1, 2], alloc.clone()).unwrap();

    // The size hint of `filter` allows no reservation up front, so growing fails halfway
    alloc.fail_after(0);
    assert!(matches!(arr.append_range((3..10).filter(|_| true)), Err(DynArrError::Alloc(_))));
    alloc.disarm();
    assert_eq!(arr, [1, 2]);
}

//------------------------------------------------------------------------------------------------------------------------------

#[test]
fn dynarr_cursors() {
    let arr = dynarr![1, 2, 3];
    assert_eq!(arr.at_cursor(arr.begin()), Ok(&1));
    assert_eq!(arr.at_cursor(arr.end() - 1), Ok(&3));
    assert_eq!(arr.at_cursor(arr.end()), Err(DynArrError::OutOfRange { index: 3, len: 3 }));
    assert_eq!(arr.end() - arr.begin(), 3);
    assert!(arr.begin() < arr.end());

    assert_eq!(arr.index_of(arr.end()), Ok(3));
    assert_eq!(arr.index_of(arr.end() + 1), Err(DynArrError::OutOfRange { index: 4, len: 3 }));

    let other = dynarr![1, 2, 3];
    assert_eq!(arr.index_of(other.begin()), Err(DynArrError::InvalidatedCursor));
    assert_eq!(arr.begin().partial_cmp(&other.begin()), None);
}

#[test]
fn dynarr_rev_cursors() {
    let mut arr = dynarr![1, 2, 3];
    let mut out = Vec::new();
    let mut rc = arr.rbegin();
    while rc != arr.rend() {
        out.push(*arr.at_rev(rc).unwrap());
        rc += 1;
    }
    assert_eq!(out, [3, 2, 1]);
    assert_eq!(arr.at_rev(arr.rend()), Err(DynArrError::OutOfRange { index: usize::MAX, len: 3 }));

    let c = arr.begin() + 1;
    *arr.at_cursor_mut(c).unwrap() = 20;
    assert_eq!(arr.at_rev(arr.rbegin() + 1), Ok(&20));
}

#[test]
fn dynarr_cursors_are_invalidated() {
    let mut arr = DynArr::<i32>::with_capacity(2).unwrap();
    arr.push(1).unwrap();
    let first = arr.begin();

    // No reallocation
    arr.push(2).unwrap();
    assert_eq!(arr.at_cursor(first), Ok(&1));

    // Reallocation
    arr.push(3).unwrap();
    assert_eq!(arr.at_cursor(first), Err(DynArrError::InvalidatedCursor));

    // Shifting
    let first = arr.begin();
    arr.insert(arr.end(), 4).unwrap();
    assert_eq!(arr.at_cursor(first), Err(DynArrError::InvalidatedCursor));

    let first = arr.begin();
    arr.remove(3).unwrap();
    assert_eq!(arr.insert(first, 0), Err(DynArrError::InvalidatedCursor));
    assert_eq!(arr, [1, 2, 3]);
}

//------------------------------------------------------------------------------------------------------------------------------

#[test]
fn dynarr_clone_is_independent() {
    let arr = dynarr![1, 2, 3];
    let mut copy = arr.clone();
    copy[0] = 10;
    copy.push(4).unwrap();
    assert_eq!(arr, [1, 2, 3]);
    assert_eq!(copy, [10, 2, 3, 4]);

    let copy = arr.try_clone().unwrap();
    assert_eq!(copy, arr);
    assert_eq!(copy.capacity(), 3);
}

#[test]
fn dynarr_clone_panic_releases_everything() {
    let alloc = tracker();
    let fuse = Rc::new(Cell::new(2));
    let bomb = Bomb::new(1, &fuse);
    let res = panic::catch_unwind(AssertUnwindSafe(|| TrackedArr::with_value_in(5, bomb, alloc.clone())));
    assert!(res.is_err());
    assert_eq!(alloc.live_allocations(), 0);
    assert_eq!(alloc.constructs(), 2);
    assert_eq!(alloc.destroys(), 2);

    fuse.set(usize::MAX);
    let arr = TrackedArr::with_value_in(3, Bomb::new(1, &fuse), alloc.clone()).unwrap();
    fuse.set(1);
    let res = panic::catch_unwind(AssertUnwindSafe(|| arr.try_clone()));
    assert!(res.is_err());
    assert_eq!(alloc.live_allocations(), 1);
    assert_eq!(alloc.live_values(), 3);
}

#[test]
fn dynarr_assign_reuses_buffer() {
    let src = dynarr![1, 2, 3];

    let mut dst = DynArr::<i32>::with_capacity(8).unwrap();
    dst.push(9).unwrap();
    let ptr = dst.as_ptr();
    dst.assign_from(&src).unwrap();
    assert_eq!(dst, [1, 2, 3]);
    assert_eq!(dst.as_ptr(), ptr);
    assert_eq!(dst.capacity(), 8);

    dst.assign_slice(&[4]).unwrap();
    assert_eq!(dst, [4]);
    assert_eq!(dst.capacity(), 8);

    let mut small = dynarr![7];
    small.clone_from(&src);
    assert_eq!(small, [1, 2, 3]);
    assert_eq!(small.capacity(), 3);
}

#[test]
fn dynarr_failed_assign_resets() {
    let alloc = tracker();
    let mut dst = TrackedArr::from_slice_in(&[1], alloc.clone()).unwrap();

    alloc.fail_after(0);
    assert!(matches!(dst.assign_slice(&[1, 2, 3]), Err(DynArrError::Alloc(_))));
    alloc.disarm();

    assert!(dst.is_empty());
    assert_eq!(dst.capacity(), 0);
    assert_eq!(alloc.live_allocations(), 0);
    assert_eq!(alloc.live_values(), 0);
}

#[test]
fn dynarr_failed_clone_assign_resets() {
    let alloc = tracker();
    let fuse = Rc::new(Cell::new(usize::MAX));
    let mut dst = TrackedArr::from_slice_in(&[Bomb::new(0, &fuse)], alloc.clone()).unwrap();
    let src = [Bomb::new(1, &fuse), Bomb::new(2, &fuse), Bomb::new(3, &fuse)];

    fuse.set(1);
    let res = panic::catch_unwind(AssertUnwindSafe(|| dst.assign_slice(&src)));
    assert!(res.is_err());
    assert!(dst.is_empty());
    assert_eq!(dst.capacity(), 0);
    assert_eq!(alloc.live_allocations(), 0);
    assert_eq!(alloc.live_values(), 0);

    fuse.set(2);
    let res = panic::catch_unwind(AssertUnwindSafe(|| dst.assign_elem(4, Bomb::new(9, &fuse))));
    assert!(res.is_err());
    assert!(dst.is_empty());
    assert_eq!(dst.capacity(), 0);
    assert_eq!(alloc.live_allocations(), 0);
    assert_eq!(alloc.live_values(), 0);

    // The array is still usable afterwards
    fuse.set(usize::MAX);
    dst.assign_slice(&src).unwrap();
    assert_eq!(values(&dst), [1, 2, 3]);
}

#[test]
fn dynarr_assign_elem_and_iter() {
    let mut arr = dynarr![1, 2, 3, 4];
    arr.assign_elem(2, 9).unwrap();
    assert_eq!(arr, [9, 9]);
    assert_eq!(arr.capacity(), 4);

    arr.assign_elem(3, 1).unwrap();
    assert_eq!(arr, [1, 1, 1]);

    arr.assign_elem(6, 5).unwrap();
    assert_eq!(arr, [5; 6]);
    assert_eq!(arr.capacity(), 6);

    arr.assign_iter(0..3).unwrap();
    assert_eq!(arr, [0, 1, 2]);
}

#[test]
fn dynarr_move_from() {
    let mut src = dynarr![1, 2, 3];
    let ptr = src.as_ptr();
    let dst = DynArr::move_from(&mut src);
    assert_eq!(dst, [1, 2, 3]);
    assert_eq!(dst.as_ptr(), ptr);
    assert!(src.is_empty());

    src.push(4).unwrap();
    assert_eq!(src, [4]);
}

#[test]
fn dynarr_move_from_in() {
    let alloc_a = tracker();
    let alloc_b = tracker();

    let mut src = TrackedArr::from_slice_in(&[1, 2, 3], alloc_a.clone()).unwrap();
    src.reserve(10).unwrap();
    let ptr = src.as_ptr();
    let begin = src.begin();

    let dst = TrackedArr::move_from_in(&mut src, alloc_a.clone()).unwrap();
    assert_eq!(dst.as_ptr(), ptr);
    assert_eq!(dst.at_cursor(begin), Ok(&1));
    assert!(src.is_empty());

    let mut src = dst;
    let dst = TrackedArr::move_from_in(&mut src, alloc_b.clone()).unwrap();
    assert_eq!(dst, [1, 2, 3]);
    assert_eq!(dst.capacity(), 3);
    assert!(src.is_empty());
    assert_eq!(alloc_b.live_allocations(), 1);

    drop(src);
    drop(dst);
    assert_eq!(alloc_a.live_allocations(), 0);
    assert_eq!(alloc_b.live_allocations(), 0);
}

#[test]
fn dynarr_move_assign_equal_allocators() {
    let alloc = tracker();
    let mut a = TrackedArr::from_slice_in(&[1, 2, 3], alloc.clone()).unwrap();
    let mut b = TrackedArr::from_slice_in(&[4, 5], alloc.clone()).unwrap();
    let ptr = b.as_ptr();

    a.move_assign(&mut b).unwrap();
    assert_eq!(a, [4, 5]);
    assert_eq!(a.as_ptr(), ptr);
    assert!(b.is_empty());
    assert_eq!(b.capacity(), 0);

    drop(a);
    drop(b);
    assert_eq!(alloc.live_allocations(), 0);
    assert_eq!(alloc.live_values(), 0);
}

#[test]
fn dynarr_move_assign_unequal_allocators() {
    let alloc_a = tracker();
    let alloc_b = tracker();

    // Enough capacity, the existing buffer is reused
    let mut a = TrackedArr::from_slice_in(&[1, 2, 3], alloc_a.clone()).unwrap();
    let mut b = TrackedArr::from_slice_in(&[4, 5], alloc_b.clone()).unwrap();
    let ptr = a.as_ptr();
    a.move_assign(&mut b).unwrap();
    assert_eq!(a, [4, 5]);
    assert_eq!(a.as_ptr(), ptr);
    assert_eq!(a.capacity(), 3);
    assert!(b.is_empty());
    assert_eq!(a.allocator().id(), alloc_a.id());

    // Not enough capacity, a new buffer of exactly the right size is allocated
    b = TrackedArr::from_slice_in(&[6, 7, 8, 9], alloc_b.clone()).unwrap();
    a.move_assign(&mut b).unwrap();
    assert_eq!(a, [6, 7, 8, 9]);
    assert_eq!(a.capacity(), 4);
    assert!(b.is_empty());

    drop(a);
    drop(b);
    assert_eq!(alloc_a.live_allocations(), 0);
    assert_eq!(alloc_b.live_allocations(), 0);
}

#[test]
fn dynarr_move_across_allocators_constructs_in_destination() {
    let alloc_a = tracker();
    let alloc_b = tracker();

    let mut a = TrackedArr::from_slice_in(&["1"].map(String::from), alloc_a.clone()).unwrap();
    let mut b = TrackedArr::from_slice_in(&["4", "5", "6"].map(String::from), alloc_b.clone()).unwrap();
    a.move_assign(&mut b).unwrap();
    assert_eq!(a, ["4", "5", "6"]);
    assert_eq!(alloc_a.constructs(), 4);
    assert_eq!(alloc_a.live_values(), 3);
    assert_eq!(alloc_b.live_values(), 0);

    b = TrackedArr::from_slice_in(&["7", "8"].map(String::from), alloc_b.clone()).unwrap();
    a.move_assign(&mut b).unwrap();
    assert_eq!(a, ["7", "8"]);
    assert_eq!(alloc_a.live_values(), 2);

    let c = TrackedArr::move_from_in(&mut a, alloc_b.clone()).unwrap();
    assert_eq!(c, ["7", "8"]);
    assert_eq!(alloc_a.live_values(), 0);
    assert_eq!(alloc_b.live_values(), 2);

    drop(a);
    drop(b);
    drop(c);
    assert_eq!(alloc_a.constructs(), alloc_a.destroys());
    assert_eq!(alloc_b.constructs(), alloc_b.destroys());
    assert_eq!(alloc_a.live_allocations(), 0);
    assert_eq!(alloc_b.live_allocations(), 0);
}

#[test]
fn dynarr_failed_move_assign() {
    let alloc_a = tracker();
    let alloc_b = tracker();
    let mut a = TrackedArr::from_slice_in(&[1], alloc_a.clone()).unwrap();
    let mut b = TrackedArr::from_slice_in(&[4, 5, 6], alloc_b.clone()).unwrap();

    alloc_a.fail_after(0);
    assert!(matches!(a.move_assign(&mut b), Err(DynArrError::Alloc(_))));
    alloc_a.disarm();

    assert!(a.is_empty());
    assert_eq!(a.capacity(), 0);
    assert_eq!(b, [4, 5, 6]);
    assert_eq!(alloc_a.live_allocations(), 0);
}

#[test]
fn dynarr_move_assign_propagates() {
    let alloc_a = TrackingAllocator::<true>::new();
    let alloc_b = TrackingAllocator::<true>::new();
    let mut a = PropagatingArr::from_slice_in(&[1], alloc_a.clone()).unwrap();
    let mut b = PropagatingArr::from_slice_in(&[4, 5, 6], alloc_b.clone()).unwrap();
    let ptr = b.as_ptr();

    a.move_assign(&mut b).unwrap();
    assert_eq!(a, [4, 5, 6]);
    assert_eq!(a.as_ptr(), ptr);
    assert_eq!(a.allocator().id(), alloc_b.id());
    assert_eq!(b.allocator().id(), alloc_a.id());
    assert!(b.is_empty());
    assert_eq!(alloc_a.live_allocations(), 0);
}

#[test]
fn dynarr_swap() {
    let mut a = dynarr![1, 2, 3];
    let mut b = dynarr![4];
    let a_begin = a.begin();

    a.swap_with(&mut b).unwrap();
    assert_eq!(a, [4]);
    assert_eq!(b, [1, 2, 3]);
    assert_eq!(b.at_cursor(a_begin), Ok(&1));
}

#[test]
fn dynarr_swap_allocators() {
    let alloc_a = tracker();
    let alloc_b = tracker();
    let mut a = TrackedArr::from_slice_in(&[1, 2], alloc_a.clone()).unwrap();
    let mut b = TrackedArr::from_slice_in(&[3], alloc_b.clone()).unwrap();
    let mut c = TrackedArr::from_slice_in(&[4, 5, 6], alloc_a.clone()).unwrap();

    assert_eq!(a.swap_with(&mut b), Err(DynArrError::IncompatibleAllocators));
    assert_eq!(a, [1, 2]);
    assert_eq!(b, [3]);

    a.swap_with(&mut c).unwrap();
    assert_eq!(a, [4, 5, 6]);
    assert_eq!(c, [1, 2]);

    let mut a = PropagatingArr::from_slice_in(&[1, 2], TrackingAllocator::<true>::new()).unwrap();
    let alloc_b = TrackingAllocator::<true>::new();
    let mut b = PropagatingArr::from_slice_in(&[3], alloc_b.clone()).unwrap();
    a.swap_with(&mut b).unwrap();
    assert_eq!(a, [3]);
    assert_eq!(a.allocator().id(), alloc_b.id());
}

//------------------------------------------------------------------------------------------------------------------------------

#[test]
fn dynarr_into_iter() {
    let arr = dynarr![1, 2, 3, 4];
    let mut iter = arr.into_iter();
    assert_eq!(iter.len(), 4);
    assert_eq!(iter.next(), Some(1));
    assert_eq!(iter.next_back(), Some(4));
    assert_eq!(iter.as_slice(), [2, 3]);
    assert_eq!(iter.collect::<Vec<_>>(), [2, 3]);

    let arr = dynarr![1, 2, 3];
    let rev: Vec<_> = arr.iter().rev().copied().collect();
    assert_eq!(rev, [3, 2, 1]);

    let mut arr = dynarr![1, 2, 3];
    for x in &mut arr {
        *x *= 2;
    }
    let mut sum = 0;
    for x in &arr {
        sum += x;
    }
    assert_eq!(sum, 12);
}

#[test]
fn dynarr_into_iter_destroys_remaining() {
    let alloc = tracker();
    let arr = TrackedArr::from_slice_in(&["a", "b", "c"].map(String::from), alloc.clone()).unwrap();
    let mut iter = arr.into_iter();
    assert_eq!(iter.next().as_deref(), Some("a"));
    drop(iter);

    // The value moved out by `next` counts as destroyed too
    assert_eq!(alloc.destroys(), 3);
    assert_eq!(alloc.live_values(), 0);
    assert_eq!(alloc.live_allocations(), 0);
}

#[test]
fn dynarr_conversions() {
    let arr: DynArr<i32> = [1, 2, 3].into();
    assert_eq!(arr, [1, 2, 3]);

    let arr: DynArr<i32> = DynArr::from(&[1, 2, 3][..]);
    assert_eq!(arr, dynarr![1, 2, 3]);

    let arr: DynArr<_> = (0..5).collect();
    assert_eq!(arr, [0, 1, 2, 3, 4]);

    let slice: &[i32] = arr.as_ref();
    assert_eq!(slice, &[0, 1, 2, 3, 4]);
}

#[test]
fn dynarr_comparisons() {
    assert!(dynarr![1, 2] < dynarr![1, 3]);
    assert!(dynarr![1, 2, 3] > dynarr![1, 2]);
    assert_eq!(dynarr![1, 2].cmp(&dynarr![1, 2]), core::cmp::Ordering::Equal);

    let mut h0 = DefaultHasher::new();
    dynarr![1, 2, 3].hash(&mut h0);
    let mut h1 = DefaultHasher::new();
    [1, 2, 3][..].hash(&mut h1);
    assert_eq!(h0.finish(), h1.finish());

    assert_eq!(format!("{:?}", dynarr![1, 2]), "[1, 2]");
}
