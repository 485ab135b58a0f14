use anyhow::Result;

use crate::buffer::manager::BufferPoolManager;
use crate::sql::dml::entity::Record;

pub trait Table<T: BufferPoolManager> {
    fn create(&mut self, bufmgr: &mut T) -> Result<()>;
    fn insert(&self, bufmgr: &mut T, record: &Record) -> Result<()>;
}
