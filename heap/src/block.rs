use crate::error::HeapError;

/// Word alignment of every block size and payload offset.
pub const ALIGN: usize = 8;
/// Bytes taken by a block header: next, prev, size and tag as little-endian `u32`s.
pub const HEADER_SIZE: usize = 16;

pub(crate) const NO_BLOCK: u32 = u32::MAX;

const NEXT_FIELD: usize = 0;
const PREV_FIELD: usize = 4;
const SIZE_FIELD: usize = 8;
const TAG_FIELD: usize = 12;

const FREE_TAG: u32 = u32::from_le_bytes(*b"FREE");
const USED_TAG: u32 = u32::from_le_bytes(*b"USED");

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BlockState {
    Free,
    Allocated,
}

/// A decoded block header. Links are header offsets relative to the heap base.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Header {
    pub(crate) next: Option<usize>,
    pub(crate) prev: Option<usize>,
    pub(crate) size: usize,
    pub(crate) state: BlockState,
}

pub(crate) fn align_up(value: usize, alignment: usize) -> Option<usize> {
    value
        .checked_add(alignment - 1)
        .map(|value| value & !(alignment - 1))
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn write_u32(bytes: &mut [u8], at: usize, value: u32) {
    bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn encode_link(link: Option<usize>) -> u32 {
    link.map_or(NO_BLOCK, |offset| offset as u32)
}

fn decode_link(raw: u32) -> Option<usize> {
    if raw == NO_BLOCK {
        None
    } else {
        Some(raw as usize)
    }
}

impl Header {
    pub(crate) fn free(size: usize) -> Self {
        Header {
            next: None,
            prev: None,
            size,
            state: BlockState::Free,
        }
    }

    pub(crate) fn read(region: &[u8], offset: usize) -> Result<Header, HeapError> {
        let bytes = offset
            .checked_add(HEADER_SIZE)
            .and_then(|end| region.get(offset..end))
            .ok_or(HeapError::Corrupted { offset })?;

        let state = match read_u32(bytes, TAG_FIELD) {
            FREE_TAG => BlockState::Free,
            USED_TAG => BlockState::Allocated,
            _ => return Err(HeapError::Corrupted { offset }),
        };

        Ok(Header {
            next: decode_link(read_u32(bytes, NEXT_FIELD)),
            prev: decode_link(read_u32(bytes, PREV_FIELD)),
            size: read_u32(bytes, SIZE_FIELD) as usize,
            state,
        })
    }

    /// Callers only write headers at offsets taken from a validated chain,
    /// so `offset + HEADER_SIZE` is always inside the region.
    pub(crate) fn write(&self, region: &mut [u8], offset: usize) {
        let bytes = &mut region[offset..offset + HEADER_SIZE];
        let tag = match self.state {
            BlockState::Free => FREE_TAG,
            BlockState::Allocated => USED_TAG,
        };
        write_u32(bytes, NEXT_FIELD, encode_link(self.next));
        write_u32(bytes, PREV_FIELD, encode_link(self.prev));
        write_u32(bytes, SIZE_FIELD, self.size as u32);
        write_u32(bytes, TAG_FIELD, tag);
    }

    pub(crate) fn set_prev(region: &mut [u8], offset: usize, prev: Option<usize>) {
        write_u32(region, offset + PREV_FIELD, encode_link(prev));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_the_next_multiple() {
        assert_eq!(align_up(0, ALIGN), Some(0));
        assert_eq!(align_up(1, ALIGN), Some(8));
        assert_eq!(align_up(8, ALIGN), Some(8));
        assert_eq!(align_up(50, ALIGN), Some(56));
    }

    #[test]
    fn align_up_reports_overflow() {
        assert_eq!(align_up(usize::MAX, ALIGN), None);
    }

    #[test]
    fn written_header_reads_back() {
        let mut region = [0u8; 64];
        let header = Header {
            next: Some(48),
            prev: None,
            size: 32,
            state: BlockState::Allocated,
        };
        header.write(&mut region, 0);
        assert_eq!(Header::read(&region, 0), Ok(header));
    }

    #[test]
    fn unknown_tag_is_reported_as_corruption() {
        let region = [0xAAu8; 32];
        assert_eq!(
            Header::read(&region, 8),
            Err(HeapError::Corrupted { offset: 8 })
        );
    }

    #[test]
    fn header_past_the_region_end_is_reported_as_corruption() {
        let mut region = [0u8; 32];
        Header::free(0).write(&mut region, 16);
        assert!(Header::read(&region, 16).is_ok());
        assert_eq!(
            Header::read(&region, 24),
            Err(HeapError::Corrupted { offset: 24 })
        );
    }

    #[test]
    fn set_prev_only_touches_the_prev_link() {
        let mut region = [0u8; 32];
        Header::free(16).write(&mut region, 0);
        Header::set_prev(&mut region, 0, Some(16));

        let header = Header::read(&region, 0).unwrap();
        assert_eq!(header.prev, Some(16));
        assert_eq!(header.next, None);
        assert_eq!(header.size, 16);
        assert_eq!(header.state, BlockState::Free);
    }
}
