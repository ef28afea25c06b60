use core::alloc::{GlobalAlloc, Layout};
use core::ptr::null_mut;

use spin::{Mutex, MutexGuard};
use system::memory::{HeapStats, MemoryRegion};

use crate::block::ALIGN;
use crate::error::HeapError;
use crate::first_fit::{FirstFitHeap, HeapPtr};
use crate::kprintln;

/// A `FirstFitHeap` behind a spin lock, usable as a `static` and as the
/// global allocator. The lock is held for the whole of every operation.
/// Until `init` runs every allocation fails.
pub struct LockedHeap<'a> {
    heap: Mutex<Option<FirstFitHeap<'a>>>,
}

impl<'a> LockedHeap<'a> {
    pub const fn new() -> Self {
        LockedHeap {
            heap: Mutex::new(None),
        }
    }

    /// Fails with `AlreadyInitialized` on any call after the first successful
    /// one, leaving the existing heap and its allocations in place.
    pub fn init(&self, region: &'a mut [u8]) -> Result<(), HeapError> {
        let start = region.as_ptr() as usize;
        let size = region.len();
        {
            let mut guard = self.heap.lock();
            if guard.is_some() {
                return Err(HeapError::AlreadyInitialized);
            }
            *guard = Some(FirstFitHeap::new(region)?);
        }

        kprintln!(
            "[HEAP] Region: 0x{:x}-0x{:x} ({} KB)",
            start,
            start + size,
            size / 1024
        );
        Ok(())
    }

    /// # Safety
    ///
    /// `region` must describe writable memory that nothing else reads or
    /// writes for as long as this heap is alive.
    pub unsafe fn init_region(&self, region: MemoryRegion) -> Result<(), HeapError> {
        // Safety: guaranteed by the caller.
        let memory = unsafe { core::slice::from_raw_parts_mut(region.start as *mut u8, region.size) };
        self.init(memory)
    }

    pub fn is_initialized(&self) -> bool {
        self.heap.lock().is_some()
    }

    /// Exclusive access for sequences of operations that must not interleave.
    pub fn lock(&self) -> MutexGuard<'_, Option<FirstFitHeap<'a>>> {
        self.heap.lock()
    }

    pub fn allocate(&self, size: usize) -> Option<HeapPtr> {
        self.heap.lock().as_mut()?.allocate(size)
    }

    pub fn free(&self, ptr: HeapPtr) -> Result<(), HeapError> {
        self.heap
            .lock()
            .as_mut()
            .ok_or(HeapError::Uninitialized)?
            .free(ptr)
    }

    pub fn zero_allocate(&self, count: usize, element_size: usize) -> Option<HeapPtr> {
        self.heap.lock().as_mut()?.zero_allocate(count, element_size)
    }

    pub fn reallocate(&self, ptr: Option<HeapPtr>, new_size: usize) -> Option<HeapPtr> {
        self.heap.lock().as_mut()?.reallocate(ptr, new_size)
    }

    /// All zero before `init`.
    pub fn stats(&self) -> HeapStats {
        self.heap
            .lock()
            .as_ref()
            .map(|heap| heap.stats())
            .unwrap_or_default()
    }

    pub fn check(&self) -> Result<(), HeapError> {
        self.heap
            .lock()
            .as_ref()
            .ok_or(HeapError::Uninitialized)?
            .check()
    }
}

impl Default for LockedHeap<'_> {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl GlobalAlloc for LockedHeap<'static> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > ALIGN {
            return null_mut();
        }
        let mut guard = self.heap.lock();
        let Some(heap) = guard.as_mut() else {
            return null_mut();
        };
        match heap.allocate(layout.size()) {
            Some(ptr) => heap.raw_payload(ptr),
            None => null_mut(),
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        if ptr.is_null() {
            return;
        }
        let mut guard = self.heap.lock();
        if let Some(heap) = guard.as_mut() {
            if let Some(handle) = heap.ptr_from_raw(ptr) {
                // dealloc has no error channel; rejected frees leave the heap unchanged.
                heap.free(handle).ok();
            }
        }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        if layout.align() > ALIGN {
            return null_mut();
        }
        let mut guard = self.heap.lock();
        let Some(heap) = guard.as_mut() else {
            return null_mut();
        };
        match heap.zero_allocate(1, layout.size()) {
            Some(ptr) => heap.raw_payload(ptr),
            None => null_mut(),
        }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if layout.align() > ALIGN {
            return null_mut();
        }
        let mut guard = self.heap.lock();
        let Some(heap) = guard.as_mut() else {
            return null_mut();
        };
        let handle = heap.ptr_from_raw(ptr);
        if !ptr.is_null() && handle.is_none() {
            return null_mut();
        }
        match heap.reallocate(handle, new_size) {
            Some(moved) => heap.raw_payload(moved),
            None => null_mut(),
        }
    }
}
