#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MemoryRegion {
    pub start: usize,
    pub size: usize,
}

impl MemoryRegion {
    pub fn new(start: usize, size: usize) -> Self {
        MemoryRegion { start, size }
    }
}

/// Usage figures of a heap. Header bytes are counted as `used`, so
/// `used + free == total` always holds.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
    pub total: usize,
    pub used: usize,
    pub free: usize,
    pub blocks: usize,
    pub largest_free: usize,
}

