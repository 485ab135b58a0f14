use zerocopy::{ByteSlice, ByteSliceMut};

use crate::storage::entity::PageId;

// next_page_id: u64, num_records: u16
pub const HEADER_SIZE: usize = 10;

const NEXT_PAGE_ID: std::ops::Range<usize> = 0..8;
const NUM_RECORDS: std::ops::Range<usize> = 8..10;

/// A heap data page: a small header followed by fixed-width record slots.
pub struct Page<B> {
    bytes: B,
}

impl<B: ByteSlice> Page<B> {
    pub fn new(bytes: B) -> Self {
        Self { bytes }
    }

    pub fn next_page_id(&self) -> PageId {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.bytes[NEXT_PAGE_ID]);
        PageId(u64::from_be_bytes(buf))
    }

    pub fn num_records(&self) -> usize {
        let mut buf = [0u8; 2];
        buf.copy_from_slice(&self.bytes[NUM_RECORDS]);
        u16::from_be_bytes(buf) as usize
    }

    pub fn record(&self, slot: usize, record_size: usize) -> &[u8] {
        let offset = HEADER_SIZE + slot * record_size;
        &self.bytes[offset..offset + record_size]
    }
}

impl<B: ByteSliceMut> Page<B> {
    pub fn initialize(&mut self) {
        self.set_next_page_id(PageId::INVALID_PAGE_ID);
        self.set_num_records(0);
    }

    pub fn set_next_page_id(&mut self, page_id: PageId) {
        self.bytes[NEXT_PAGE_ID].copy_from_slice(&page_id.to_u64().to_be_bytes());
    }

    fn set_num_records(&mut self, num_records: usize) {
        self.bytes[NUM_RECORDS].copy_from_slice(&(num_records as u16).to_be_bytes());
    }

    /// Claims the next free slot and returns it for writing.
    pub fn push_record(&mut self, record_size: usize) -> &mut [u8] {
        let slot = self.num_records();
        self.set_num_records(slot + 1);
        let offset = HEADER_SIZE + slot * record_size;
        &mut self.bytes[offset..offset + record_size]
    }
}
