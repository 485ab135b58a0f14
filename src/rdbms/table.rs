use anyhow::Result;

use super::heap::HeapFile;
use crate::buffer::manager::BufferPoolManager;
use crate::sql::ddl::table::Table;
use crate::sql::dml::entity::{Record, Schema};
use crate::storage::entity::PageId;

#[derive(Debug)]
pub struct SimpleTable {
    pub meta_page_id: PageId,
    pub schema: Schema,
}

impl SimpleTable {
    pub fn new(schema: Schema) -> Self {
        Self {
            meta_page_id: PageId::INVALID_PAGE_ID,
            schema,
        }
    }

    pub fn heap(&self) -> HeapFile {
        HeapFile::new(self.meta_page_id)
    }
}

impl<T: BufferPoolManager> Table<T> for SimpleTable {
    fn create(&mut self, bufmgr: &mut T) -> Result<()> {
        let heap = HeapFile::create(bufmgr, &self.schema)?;
        self.meta_page_id = heap.meta_page_id;
        Ok(())
    }

    fn insert(&self, bufmgr: &mut T, record: &Record) -> Result<()> {
        self.heap().append(bufmgr, record)?;
        Ok(())
    }
}
