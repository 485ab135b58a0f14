use std::fs::{File, OpenOptions};
use std::io::{prelude::*, Result, SeekFrom};
use std::path::Path;

use crate::buffer::entity::PAGE_SIZE;
use crate::storage::{entity::PageId, manager::StorageManager};

pub struct DiskManager {
    heap_file: File,
    // next page id to hand out
    next_page_id: u64,
}

impl DiskManager {
    pub fn new(heap_file: File) -> Result<Self> {
        let heap_file_size = heap_file.metadata()?.len();
        let next_page_id = heap_file_size / PAGE_SIZE as u64;
        Ok(Self {
            heap_file,
            next_page_id,
        })
    }

    pub fn open(heap_file_path: impl AsRef<Path>) -> Result<Self> {
        let heap_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(heap_file_path)?;
        Self::new(heap_file)
    }

    fn seek_page(&mut self, page_id: PageId) -> Result<()> {
        let offset = PAGE_SIZE as u64 * page_id.to_u64();
        self.heap_file.seek(SeekFrom::Start(offset))?;
        Ok(())
    }
}

impl StorageManager for DiskManager {
    fn allocate_page(&mut self) -> PageId {
        let page_id = self.next_page_id;
        self.next_page_id += 1;
        PageId(page_id)
    }
    fn read_page_data(&mut self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        self.seek_page(page_id)?;
        self.heap_file.read_exact(data)
    }
    fn write_page_data(&mut self, page_id: PageId, data: &[u8]) -> Result<()> {
        self.seek_page(page_id)?;
        self.heap_file.write_all(data)
    }
    fn sync(&mut self) -> Result<()> {
        self.heap_file.flush()?;
        self.heap_file.sync_all()
    }
}
