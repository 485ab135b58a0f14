use super::entity::Buffer;
use crate::storage::entity::PageId;

use std::io;
use std::rc::Rc;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("no free buffer available in buffer pool")]
    NoFreeBuffer,
}

pub trait BufferPoolManager {
    // fetch a page, reading it from storage on a miss
    fn fetch_page(&mut self, page_id: PageId) -> Result<Rc<Buffer>, Error>;
    // allocate a brand new zeroed page
    fn create_page(&mut self) -> Result<Rc<Buffer>, Error>;
    // write every cached page back to storage
    fn flush(&mut self) -> Result<(), Error>;
}
