use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapError {
    /// The region cannot hold a header plus one alignment unit.
    RegionTooSmall,
    /// The region does not fit 32-bit block offsets.
    RegionTooLarge,
    Uninitialized,
    /// `init` already ran on this heap.
    AlreadyInitialized,
    /// The pointer's header would lie outside the region.
    OutOfBounds,
    InvalidPointer,
    DoubleFree,
    /// The block chain is inconsistent at this header offset.
    Corrupted { offset: usize },
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapError::RegionTooSmall => write!(f, "region too small for a heap"),
            HeapError::RegionTooLarge => write!(f, "region too large for a heap"),
            HeapError::Uninitialized => write!(f, "heap not initialized"),
            HeapError::AlreadyInitialized => write!(f, "heap already initialized"),
            HeapError::OutOfBounds => write!(f, "pointer outside of heap region"),
            HeapError::InvalidPointer => write!(f, "pointer does not refer to an allocated block"),
            HeapError::DoubleFree => write!(f, "block is already free"),
            HeapError::Corrupted { offset } => write!(f, "heap corrupted at offset 0x{:x}", offset),
        }
    }
}
