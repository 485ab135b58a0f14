use std::io::{self, Read, Result, Write};

use zerocopy::AsBytes;

use super::{entity::PageId, manager::StorageManager};
use crate::buffer::entity::PAGE_SIZE;

#[derive(Default)]
pub struct MemoryManager {
    heap: Vec<Box<[u8; PAGE_SIZE]>>,
}

impl MemoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_pages(&self) -> usize {
        self.heap.len()
    }

    fn page(&self, page_id: PageId) -> Result<&[u8; PAGE_SIZE]> {
        self.heap
            .get(page_id.to_u64() as usize)
            .map(|page| page.as_ref())
            .ok_or_else(|| unallocated(page_id))
    }
}

fn unallocated(page_id: PageId) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("page {} is not allocated", page_id.to_u64()),
    )
}

impl StorageManager for MemoryManager {
    fn allocate_page(&mut self) -> PageId {
        let page_id = PageId(self.heap.len() as u64);
        self.heap.push(Box::new([0; PAGE_SIZE]));
        page_id
    }
    fn read_page_data(&mut self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        let mut row: &[u8] = self.page(page_id)?[..].as_bytes();
        row.read_exact(data)
    }
    fn write_page_data(&mut self, page_id: PageId, data: &[u8]) -> Result<()> {
        let page = self
            .heap
            .get_mut(page_id.to_u64() as usize)
            .ok_or_else(|| unallocated(page_id))?;
        let mut row: &mut [u8] = page[..].as_bytes_mut();
        row.write_all(data.as_bytes())
    }
    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_write_test() {
        let mut memory = MemoryManager::new();
        let mut hello = Vec::with_capacity(PAGE_SIZE);
        hello.extend_from_slice(b"hello");
        hello.resize(PAGE_SIZE, 0);
        let hello_page_id = memory.allocate_page();
        memory.write_page_data(hello_page_id, &hello).unwrap();
        let mut world = Vec::with_capacity(PAGE_SIZE);
        world.extend_from_slice(b"world");
        world.resize(PAGE_SIZE, 0);
        let world_page_id = memory.allocate_page();
        memory.write_page_data(world_page_id, &world).unwrap();

        let mut buf = vec![0; PAGE_SIZE];
        memory.read_page_data(hello_page_id, &mut buf).unwrap();
        assert_eq!(hello, buf);
        memory.read_page_data(world_page_id, &mut buf).unwrap();
        assert_eq!(world, buf);
        assert_eq!(2, memory.num_pages());
    }

    #[test]
    fn unallocated_page_test() {
        let mut memory = MemoryManager::new();
        let mut buf = vec![0; PAGE_SIZE];
        assert!(memory.read_page_data(PageId(0), &mut buf).is_err());
        assert!(memory.write_page_data(PageId(3), &buf).is_err());
    }
}
