use std::{
    alloc::{GlobalAlloc, Layout, System},
    cell::Cell,
    fmt,
    ptr::NonNull,
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::alloc::{AllocError, Allocator};

static NEXT_TRACKER_ID: AtomicU64 = AtomicU64::new(0);

#[derive(Default)]
struct TrackingState {
    id: u64,
    live_allocs: Cell<usize>,
    live_bytes: Cell<usize>,
    total_allocs: Cell<usize>,
    constructs: Cell<usize>,
    destroys: Cell<usize>,
    fail_after: Cell<Option<usize>>,
}

/// Stateful allocator that counts everything going through it, and can be armed to fail.
///
/// Clones share their statistics and compare equal, while every allocator created with [`TrackingAllocator::new`] is distinct.
/// `PROPAGATE` sets both the move-assignment and swap propagation flags.
#[derive(Clone)]
pub struct TrackingAllocator<const PROPAGATE: bool = false> {
    state: Rc<TrackingState>,
}

impl<const PROPAGATE: bool> TrackingAllocator<PROPAGATE> {
    /// Create a new allocator, which is unequal to any other allocator
    pub fn new() -> Self {
        Self {
            state: Rc::new(TrackingState {
                id: NEXT_TRACKER_ID.fetch_add(1, Ordering::Relaxed),
                ..Default::default()
            }),
        }
    }

    /// Unique id shared by this allocator and its clones
    pub fn id(&self) -> u64 {
        self.state.id
    }

    /// Make the allocation after the next `n` successful allocations fail, and every allocation after that.
    ///
    /// `fail_after(0)` makes the very next allocation fail.
    pub fn fail_after(&self, n: usize) {
        self.state.fail_after.set(Some(n));
    }

    /// Stop injecting allocation failures
    pub fn disarm(&self) {
        self.state.fail_after.set(None);
    }

    /// Number of allocations that have not been deallocated yet
    pub fn live_allocations(&self) -> usize {
        self.state.live_allocs.get()
    }

    /// Number of bytes that have not been deallocated yet
    pub fn live_bytes(&self) -> usize {
        self.state.live_bytes.get()
    }

    /// Number of successful allocations over the lifetime of the allocator
    pub fn total_allocations(&self) -> usize {
        self.state.total_allocs.get()
    }

    /// Number of values constructed through the allocator
    pub fn constructs(&self) -> usize {
        self.state.constructs.get()
    }

    /// Number of values destroyed through the allocator
    pub fn destroys(&self) -> usize {
        self.state.destroys.get()
    }

    /// Constructed values that have not been destroyed yet.
    ///
    /// Values moved out of a slot with [`Allocator::take`] (e.g. by `pop`) count as destroyed.
    pub fn live_values(&self) -> usize {
        self.constructs().saturating_sub(self.destroys())
    }
}

impl<const PROPAGATE: bool> Default for TrackingAllocator<PROPAGATE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const PROPAGATE: bool> fmt::Debug for TrackingAllocator<PROPAGATE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackingAllocator")
            .field("id", &self.id())
            .field("live_allocations", &self.live_allocations())
            .field("live_bytes", &self.live_bytes())
            .field("constructs", &self.constructs())
            .field("destroys", &self.destroys())
        .finish()
    }
}

unsafe impl<const PROPAGATE: bool> Allocator for TrackingAllocator<PROPAGATE> {
    const PROPAGATE_ON_MOVE_ASSIGNMENT: bool = PROPAGATE;
    const PROPAGATE_ON_SWAP: bool = PROPAGATE;

    fn allocate(&mut self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        let state = &*self.state;
        match state.fail_after.get() {
            Some(0) => return Err(AllocError { layout }),
            Some(n) => state.fail_after.set(Some(n - 1)),
            None => {},
        }

        if layout.size() == 0 {
            return Err(AllocError { layout });
        }

        // SAFETY: The layout has a non-zero size
        let ptr = NonNull::new(unsafe { System.alloc(layout) }).ok_or(AllocError { layout })?;
        state.live_allocs.set(state.live_allocs.get() + 1);
        state.live_bytes.set(state.live_bytes.get() + layout.size());
        state.total_allocs.set(state.total_allocs.get() + 1);
        Ok(ptr)
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>, layout: Layout) {
        let state = &*self.state;
        assert!(state.live_allocs.get() > 0, "deallocating more than was allocated");
        state.live_allocs.set(state.live_allocs.get() - 1);
        state.live_bytes.set(state.live_bytes.get() - layout.size());
        System.dealloc(ptr.as_ptr(), layout);
    }

    unsafe fn construct<T>(&mut self, slot: NonNull<T>, value: T) {
        slot.as_ptr().write(value);
        self.state.constructs.set(self.state.constructs.get() + 1);
    }

    unsafe fn destroy<T>(&mut self, slot: NonNull<T>) {
        // Count first, a panicking drop still ends the value's lifetime
        self.state.destroys.set(self.state.destroys.get() + 1);
        core::ptr::drop_in_place(slot.as_ptr());
    }

    unsafe fn take<T>(&mut self, slot: NonNull<T>) -> T {
        self.state.destroys.set(self.state.destroys.get() + 1);
        slot.as_ptr().read()
    }

    fn is_equal(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}
