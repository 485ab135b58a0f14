use super::entity::PageId;

use std::io::Result;

pub trait StorageManager {
    // hand out a fresh page id
    fn allocate_page(&mut self) -> PageId;
    // read a whole page into `data`
    fn read_page_data(&mut self, page_id: PageId, data: &mut [u8]) -> Result<()>;
    // write a whole page from `data`
    fn write_page_data(&mut self, page_id: PageId, data: &[u8]) -> Result<()>;
    fn sync(&mut self) -> Result<()>;
}
