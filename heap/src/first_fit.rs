use core::fmt;

use system::memory::HeapStats;

use crate::block::{align_up, BlockState, Header, ALIGN, HEADER_SIZE, NO_BLOCK};
use crate::error::HeapError;

/// Payload handle: the offset of the first payload byte from the heap base.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HeapPtr(usize);

impl HeapPtr {
    pub const fn from_offset(offset: usize) -> Self {
        HeapPtr(offset)
    }

    pub const fn offset(self) -> usize {
        self.0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    /// Offset of the block header from the heap base.
    pub offset: usize,
    pub size: usize,
    pub state: BlockState,
}

impl BlockInfo {
    pub fn payload(&self) -> HeapPtr {
        HeapPtr(self.offset + HEADER_SIZE)
    }
}

/// First-fit heap over a single borrowed region.
///
/// The region is tiled by a chain of blocks, each a header followed by its
/// payload. Allocation takes the first free block large enough and splits
/// off the tail when the leftover can hold another header. Freeing merges the
/// block with free neighbours on both sides, so no two adjacent blocks are
/// ever free.
pub struct FirstFitHeap<'a> {
    region: &'a mut [u8],
}

fn request_size(size: usize) -> Option<usize> {
    let size = align_up(size, ALIGN)?.max(HEADER_SIZE);
    if size >= NO_BLOCK as usize {
        return None;
    }
    Some(size)
}

impl<'a> FirstFitHeap<'a> {
    /// Takes ownership of `region` and lays a single free block over it.
    /// The start is moved up to the next `ALIGN` boundary and the length
    /// trimmed to a multiple of `ALIGN`.
    pub fn new(region: &'a mut [u8]) -> Result<Self, HeapError> {
        let skip = region.as_ptr().align_offset(ALIGN);
        if skip > region.len() {
            return Err(HeapError::RegionTooSmall);
        }
        let region = &mut region[skip..];
        let len = region.len() & !(ALIGN - 1);
        if len < HEADER_SIZE + ALIGN {
            return Err(HeapError::RegionTooSmall);
        }
        if len >= NO_BLOCK as usize {
            return Err(HeapError::RegionTooLarge);
        }

        let region = &mut region[..len];
        Header::free(len - HEADER_SIZE).write(region, 0);
        Ok(FirstFitHeap { region })
    }

    pub fn allocate(&mut self, size: usize) -> Option<HeapPtr> {
        let size = request_size(size)?;

        let mut current = Some(0);
        while let Some(offset) = current {
            let mut block = Header::read(self.region, offset).ok()?;

            if block.state == BlockState::Free && block.size >= size {
                if block.size - size >= HEADER_SIZE + ALIGN {
                    let tail_offset = offset + HEADER_SIZE + size;
                    let tail = Header {
                        next: block.next,
                        prev: Some(offset),
                        size: block.size - size - HEADER_SIZE,
                        state: BlockState::Free,
                    };
                    tail.write(self.region, tail_offset);
                    if let Some(next) = block.next {
                        Header::set_prev(self.region, next, Some(tail_offset));
                    }
                    block.next = Some(tail_offset);
                    block.size = size;
                }

                block.state = BlockState::Allocated;
                block.write(self.region, offset);
                return Some(HeapPtr(offset + HEADER_SIZE));
            }

            current = block.next;
        }

        None
    }

    /// Releases an allocated block and merges it with free neighbours.
    ///
    /// Pointers whose header would fall outside the region are rejected with
    /// `OutOfBounds`. Anything that is not the payload of a live block in the
    /// chain is rejected with `DoubleFree` or `InvalidPointer`. A rejected
    /// pointer leaves the heap untouched.
    pub fn free(&mut self, ptr: HeapPtr) -> Result<(), HeapError> {
        let (offset, mut block) = self.live_block(ptr)?;
        let successor = match block.next {
            Some(next) => Some((next, Header::read(self.region, next)?)),
            None => None,
        };
        let predecessor = match block.prev {
            Some(prev) => Some((prev, Header::read(self.region, prev)?)),
            None => None,
        };

        block.state = BlockState::Free;

        if let Some((_, successor)) = successor {
            if successor.state == BlockState::Free {
                block.size += HEADER_SIZE + successor.size;
                block.next = successor.next;
                if let Some(after) = successor.next {
                    Header::set_prev(self.region, after, Some(offset));
                }
            }
        }
        block.write(self.region, offset);

        if let Some((prev_offset, mut predecessor)) = predecessor {
            if predecessor.state == BlockState::Free {
                predecessor.size += HEADER_SIZE + block.size;
                predecessor.next = block.next;
                if let Some(after) = block.next {
                    Header::set_prev(self.region, after, Some(prev_offset));
                }
                predecessor.write(self.region, prev_offset);
            }
        }

        Ok(())
    }

    /// Allocates `count * element_size` bytes and zeroes the whole payload.
    /// A product that overflows is treated as out of memory.
    pub fn zero_allocate(&mut self, count: usize, element_size: usize) -> Option<HeapPtr> {
        let total = count.checked_mul(element_size)?;
        let ptr = self.allocate(total)?;
        self.payload_mut(ptr).ok()?.fill(0);
        Some(ptr)
    }

    /// Grows or keeps a block.
    ///
    /// `None` behaves like `allocate`, a zero `new_size` like `free`. A block
    /// already large enough is returned unchanged. Otherwise the payload is
    /// moved to a new block; if that allocation fails the old block stays
    /// valid and `None` is returned.
    pub fn reallocate(&mut self, ptr: Option<HeapPtr>, new_size: usize) -> Option<HeapPtr> {
        let Some(ptr) = ptr else {
            return self.allocate(new_size);
        };

        if new_size == 0 {
            // Result is `None` either way; a rejected pointer is left untouched.
            self.free(ptr).ok();
            return None;
        }

        let (_, block) = self.live_block(ptr).ok()?;
        if block.size >= new_size {
            return Some(ptr);
        }

        let moved = self.allocate(new_size)?;
        let from = ptr.offset();
        self.region
            .copy_within(from..from + block.size.min(new_size), moved.offset());
        self.free(ptr).ok()?;
        Some(moved)
    }

    pub fn stats(&self) -> HeapStats {
        let mut stats = HeapStats {
            total: self.region.len(),
            ..HeapStats::default()
        };

        for block in self.blocks() {
            stats.blocks += 1;
            stats.used += HEADER_SIZE;
            match block.state {
                BlockState::Free => {
                    stats.free += block.size;
                    stats.largest_free = stats.largest_free.max(block.size);
                }
                BlockState::Allocated => stats.used += block.size,
            }
        }

        stats
    }

    pub fn blocks(&self) -> Blocks<'_> {
        Blocks {
            region: self.region,
            next: Some(0),
        }
    }

    /// Walks the chain and verifies that it tiles the region exactly, that
    /// back links mirror forward links, that sizes are aligned and that no
    /// two neighbours are both free.
    pub fn check(&self) -> Result<(), HeapError> {
        let mut expected = 0;
        let mut previous: Option<(usize, BlockState)> = None;
        let mut current = Some(0);

        while let Some(offset) = current {
            let block = Header::read(self.region, offset)?;
            let corrupted = offset != expected
                || block.prev != previous.map(|(prev, _)| prev)
                || block.size % ALIGN != 0
                || (block.state == BlockState::Free
                    && previous.is_some_and(|(_, state)| state == BlockState::Free));
            if corrupted {
                return Err(HeapError::Corrupted { offset });
            }

            expected = offset + HEADER_SIZE + block.size;
            if expected > self.region.len() {
                return Err(HeapError::Corrupted { offset });
            }
            previous = Some((offset, block.state));
            current = block.next;
        }

        if expected != self.region.len() {
            let offset = previous.map_or(0, |(offset, _)| offset);
            return Err(HeapError::Corrupted { offset });
        }
        Ok(())
    }

    pub fn payload(&self, ptr: HeapPtr) -> Result<&[u8], HeapError> {
        let (_, block) = self.live_block(ptr)?;
        let start = ptr.offset();
        Ok(&self.region[start..start + block.size])
    }

    pub fn payload_mut(&mut self, ptr: HeapPtr) -> Result<&mut [u8], HeapError> {
        let (_, block) = self.live_block(ptr)?;
        let start = ptr.offset();
        Ok(&mut self.region[start..start + block.size])
    }

    pub fn write_layout(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        for block in self.blocks() {
            let state = match block.state {
                BlockState::Free => "free",
                BlockState::Allocated => "allocated",
            };
            writeln!(
                out,
                "  0x{:06x} {:>8} bytes {}",
                block.payload().offset(),
                block.size,
                state
            )?;
        }
        Ok(())
    }

    pub fn base(&self) -> *const u8 {
        self.region.as_ptr()
    }

    pub fn size(&self) -> usize {
        self.region.len()
    }

    /// Address of the payload `ptr` refers to.
    pub fn raw_payload(&mut self, ptr: HeapPtr) -> *mut u8 {
        self.region.as_mut_ptr().wrapping_add(ptr.offset())
    }

    /// Handle for an address inside the region, `None` for foreign addresses.
    pub fn ptr_from_raw(&self, raw: *const u8) -> Option<HeapPtr> {
        let offset = (raw as usize).checked_sub(self.region.as_ptr() as usize)?;
        if offset >= self.region.len() {
            return None;
        }
        Some(HeapPtr(offset))
    }

    /// Resolves `ptr` to the header of an allocated block that is linked into
    /// the chain, returning the header offset and its decoded contents.
    fn live_block(&self, ptr: HeapPtr) -> Result<(usize, Header), HeapError> {
        let offset = ptr
            .offset()
            .checked_sub(HEADER_SIZE)
            .filter(|offset| *offset < self.region.len())
            .ok_or(HeapError::OutOfBounds)?;
        if offset % ALIGN != 0 {
            return Err(HeapError::InvalidPointer);
        }

        let block = Header::read(self.region, offset).map_err(|_| HeapError::InvalidPointer)?;
        if block.state == BlockState::Free {
            return Err(HeapError::DoubleFree);
        }

        let end = offset + HEADER_SIZE + block.size;
        let linked_from_prev = match block.prev {
            Some(prev) => Header::read(self.region, prev)
                .is_ok_and(|header| prev < offset && header.next == Some(offset)),
            None => offset == 0,
        };
        let linked_from_next = match block.next {
            Some(next) => {
                next == end
                    && Header::read(self.region, next)
                        .is_ok_and(|header| header.prev == Some(offset))
            }
            None => end == self.region.len(),
        };

        if !(linked_from_prev && linked_from_next) {
            return Err(HeapError::InvalidPointer);
        }
        Ok((offset, block))
    }
}

/// Iterator over the block chain in address order. Stops early on a header
/// that cannot be decoded or a link that does not move forward.
pub struct Blocks<'h> {
    region: &'h [u8],
    next: Option<usize>,
}

impl Iterator for Blocks<'_> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<BlockInfo> {
        let offset = self.next?;
        let Ok(block) = Header::read(self.region, offset) else {
            self.next = None;
            return None;
        };
        self.next = block.next.filter(|next| *next > offset);
        Some(BlockInfo {
            offset,
            size: block.size,
            state: block.state,
        })
    }
}
