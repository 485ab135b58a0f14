//! Heap files: unordered relations stored as a meta page plus a linked chain
//! of data pages holding fixed-width records.

use std::cell::{Ref, RefMut};

use bincode::Options;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::buffer::{
    entity::{Buffer, PAGE_SIZE},
    manager::{self, BufferPoolManager},
};
use crate::sql::dml::{
    entity::{Record, Schema, Type, Value},
    query::TableStats,
};
use crate::storage::entity::PageId;

mod page;

use page::{Page, HEADER_SIZE};

const PAGE_CAPACITY: usize = PAGE_SIZE - HEADER_SIZE;

#[derive(Debug, Error)]
pub enum Error {
    #[error("record does not match the relation schema")]
    SchemaMismatch,
    #[error("records of {0} bytes do not fit in a page")]
    RecordTooLarge(usize),
    #[error("relation metadata does not fit in a page")]
    MetaTooLarge,
    #[error(transparent)]
    Meta(#[from] bincode::Error),
    #[error(transparent)]
    Buffer(#[from] manager::Error),
}

/// Number of records of `schema` that fit on one data page.
pub fn records_per_page(schema: &Schema) -> usize {
    let record_size = schema.size_in_bytes().max(1);
    (PAGE_CAPACITY / record_size).max(1)
}

#[derive(Debug, Serialize, Deserialize)]
struct Meta {
    schema: Schema,
    first_page_id: PageId,
    last_page_id: PageId,
    num_pages: u64,
    num_records: u64,
}

impl Meta {
    fn from_buffer(buffer: &Buffer) -> Result<Self, Error> {
        let page = buffer.page.borrow();
        Ok(options().deserialize(&page[..])?)
    }

    fn write_to(&self, buffer: &Buffer) -> Result<(), Error> {
        let bytes = options().serialize(self)?;
        if bytes.len() > PAGE_SIZE {
            return Err(Error::MetaTooLarge);
        }
        buffer.page.borrow_mut()[..bytes.len()].copy_from_slice(&bytes);
        buffer.is_dirty.set(true);
        Ok(())
    }
}

fn options() -> impl Options {
    bincode::options().allow_trailing_bytes()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapFile {
    pub meta_page_id: PageId,
}

impl HeapFile {
    pub fn create(bufmgr: &mut dyn BufferPoolManager, schema: &Schema) -> Result<Self, Error> {
        let record_size = schema.size_in_bytes();
        if record_size > PAGE_CAPACITY {
            return Err(Error::RecordTooLarge(record_size));
        }
        let meta_buffer = bufmgr.create_page()?;
        let meta = Meta {
            schema: schema.clone(),
            first_page_id: PageId::INVALID_PAGE_ID,
            last_page_id: PageId::INVALID_PAGE_ID,
            num_pages: 0,
            num_records: 0,
        };
        meta.write_to(&meta_buffer)?;
        Ok(Self::new(meta_buffer.page_id))
    }

    pub fn new(meta_page_id: PageId) -> Self {
        Self { meta_page_id }
    }

    fn read_meta(&self, bufmgr: &mut dyn BufferPoolManager) -> Result<Meta, Error> {
        let meta_buffer = bufmgr.fetch_page(self.meta_page_id)?;
        Meta::from_buffer(&meta_buffer)
    }

    pub fn schema(&self, bufmgr: &mut dyn BufferPoolManager) -> Result<Schema, Error> {
        Ok(self.read_meta(bufmgr)?.schema)
    }

    pub fn stats(&self, bufmgr: &mut dyn BufferPoolManager) -> Result<TableStats, Error> {
        let meta = self.read_meta(bufmgr)?;
        Ok(TableStats {
            num_records: meta.num_records,
            num_pages: meta.num_pages,
        })
    }

    /// Appends a record at the end of the relation.
    ///
    /// Needs up to three unpinned frames in the buffer pool: the meta page,
    /// the current last page and a freshly created page.
    pub fn append(&self, bufmgr: &mut dyn BufferPoolManager, record: &Record) -> Result<(), Error> {
        let meta_buffer = bufmgr.fetch_page(self.meta_page_id)?;
        let mut meta = Meta::from_buffer(&meta_buffer)?;
        let record_size = meta.schema.size_in_bytes();
        let mut bytes = vec![0u8; record_size];
        encode(&meta.schema, record, &mut bytes)?;

        let capacity = records_per_page(&meta.schema);
        let mut last_buffer = None;
        if meta.last_page_id.is_valid() {
            let buffer = bufmgr.fetch_page(meta.last_page_id)?;
            let has_room = Page::new(buffer.page.borrow() as Ref<[_]>).num_records() < capacity;
            if has_room {
                last_buffer = Some(buffer);
            }
        }
        let buffer = match last_buffer {
            Some(buffer) => buffer,
            None => {
                let new_buffer = bufmgr.create_page()?;
                Page::new(new_buffer.page.borrow_mut() as RefMut<[_]>).initialize();
                if meta.last_page_id.is_valid() {
                    let prev_buffer = bufmgr.fetch_page(meta.last_page_id)?;
                    Page::new(prev_buffer.page.borrow_mut() as RefMut<[_]>)
                        .set_next_page_id(new_buffer.page_id);
                    prev_buffer.is_dirty.set(true);
                } else {
                    meta.first_page_id = new_buffer.page_id;
                }
                trace!(
                    heap = self.meta_page_id.to_u64(),
                    page_id = new_buffer.page_id.to_u64(),
                    "heap page added"
                );
                meta.last_page_id = new_buffer.page_id;
                meta.num_pages += 1;
                new_buffer
            }
        };
        Page::new(buffer.page.borrow_mut() as RefMut<[_]>)
            .push_record(record_size)
            .copy_from_slice(&bytes);
        buffer.is_dirty.set(true);

        meta.num_records += 1;
        meta.write_to(&meta_buffer)
    }

    pub fn scan(&self, bufmgr: &mut dyn BufferPoolManager) -> Result<Cursor, Error> {
        let meta = self.read_meta(bufmgr)?;
        Ok(Cursor {
            record_size: meta.schema.size_in_bytes(),
            schema: meta.schema,
            position: Position {
                page_id: meta.first_page_id,
                slot: 0,
            },
            prev: None,
            mark: None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Position {
    page_id: PageId,
    slot: usize,
}

/// Forward cursor over a heap file that can be rewound to a marked position.
///
/// Rewinding only moves the position; records are read again through the
/// buffer pool.
#[derive(Debug)]
pub struct Cursor {
    schema: Schema,
    record_size: usize,
    position: Position,
    prev: Option<Position>,
    mark: Option<Position>,
}

impl Cursor {
    // skip past exhausted pages
    fn settle(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<(), Error> {
        while self.position.page_id.is_valid() {
            let buffer = bufmgr.fetch_page(self.position.page_id)?;
            let page = Page::new(buffer.page.borrow() as Ref<[_]>);
            if self.position.slot < page.num_records() {
                return Ok(());
            }
            self.position = Position {
                page_id: page.next_page_id(),
                slot: 0,
            };
        }
        Ok(())
    }

    pub fn has_next(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<bool, Error> {
        self.settle(bufmgr)?;
        Ok(self.position.page_id.is_valid())
    }

    pub fn next(&mut self, bufmgr: &mut dyn BufferPoolManager) -> Result<Option<Record>, Error> {
        if !self.has_next(bufmgr)? {
            return Ok(None);
        }
        let buffer = bufmgr.fetch_page(self.position.page_id)?;
        let page = Page::new(buffer.page.borrow() as Ref<[_]>);
        let record = decode(&self.schema, page.record(self.position.slot, self.record_size));
        self.prev = Some(self.position);
        self.position.slot += 1;
        Ok(Some(record))
    }

    pub fn mark_next(&mut self) {
        self.mark = Some(self.position);
    }

    pub fn mark_prev(&mut self) {
        if let Some(prev) = self.prev {
            self.mark = Some(prev);
        }
    }

    pub fn reset(&mut self) {
        if let Some(mark) = self.mark {
            self.position = mark;
            self.prev = None;
        }
    }
}

fn encode(schema: &Schema, record: &Record, dst: &mut [u8]) -> Result<(), Error> {
    if record.len() != schema.len() {
        return Err(Error::SchemaMismatch);
    }
    let mut offset = 0;
    for (value, field) in record.values().iter().zip(&schema.fields) {
        if !value.fits(&field.ty) {
            return Err(Error::SchemaMismatch);
        }
        let size = field.ty.size_in_bytes();
        let slot = &mut dst[offset..offset + size];
        match value {
            Value::Bool(v) => slot[0] = *v as u8,
            Value::Int(v) => slot.copy_from_slice(&v.to_be_bytes()),
            Value::Long(v) => slot.copy_from_slice(&v.to_be_bytes()),
            Value::Float(v) => slot.copy_from_slice(&v.to_be_bytes()),
            Value::String(v) => {
                let (head, pad) = slot.split_at_mut(v.len());
                head.copy_from_slice(v.as_bytes());
                pad.fill(0);
            }
        }
        offset += size;
    }
    Ok(())
}

fn decode(schema: &Schema, src: &[u8]) -> Record {
    let mut values = Vec::with_capacity(schema.len());
    let mut offset = 0;
    for field in &schema.fields {
        let size = field.ty.size_in_bytes();
        let slot = &src[offset..offset + size];
        let value = match field.ty {
            Type::Bool => Value::Bool(slot[0] != 0),
            Type::Int => Value::Int(i32::from_be_bytes(fixed(slot))),
            Type::Long => Value::Long(i64::from_be_bytes(fixed(slot))),
            Type::Float => Value::Float(f32::from_be_bytes(fixed(slot))),
            Type::String(_) => {
                // strings are zero padded, so trailing NULs do not round trip
                let len = slot.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
                Value::String(String::from_utf8_lossy(&slot[..len]).into_owned())
            }
        };
        values.push(value);
        offset += size;
    }
    Record::new(values)
}

fn fixed<const N: usize>(slot: &[u8]) -> [u8; N] {
    let mut buf = [0u8; N];
    buf.copy_from_slice(slot);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdbms::{clocksweep::ClockSweepManager, disk::DiskManager};
    use crate::record;
    use crate::sql::dml::entity::Field;
    use crate::storage::memory::MemoryManager;

    fn people() -> Schema {
        Schema::new(vec![
            Field::new("id", Type::Int),
            Field::new("name", Type::String(16)),
            Field::new("score", Type::Float),
            Field::new("active", Type::Bool),
            Field::new("balance", Type::Long),
        ])
    }

    // 2504 byte records, one per page
    fn wide() -> Schema {
        Schema::new(vec![
            Field::new("id", Type::Int),
            Field::new("pad", Type::String(2500)),
        ])
    }

    fn collect(cursor: &mut Cursor, bufmgr: &mut dyn BufferPoolManager) -> Vec<Record> {
        let mut records = vec![];
        while let Some(record) = cursor.next(bufmgr).unwrap() {
            records.push(record);
        }
        records
    }

    #[test]
    fn append_scan_test() {
        let mut bufmgr = ClockSweepManager::new(MemoryManager::new(), 10);
        let heap = HeapFile::create(&mut bufmgr, &people()).unwrap();
        let records = vec![
            record![1, "Alice", 1.5f32, true, 10i64],
            record![2, "Bob", -2.0f32, false, -20i64],
            record![3, "", 0.0f32, true, i64::MAX],
        ];
        for record in &records {
            heap.append(&mut bufmgr, record).unwrap();
        }
        assert_eq!(people(), heap.schema(&mut bufmgr).unwrap());

        let mut cursor = heap.scan(&mut bufmgr).unwrap();
        assert_eq!(records, collect(&mut cursor, &mut bufmgr));
        assert!(!cursor.has_next(&mut bufmgr).unwrap());
        assert_eq!(
            TableStats {
                num_records: 3,
                num_pages: 1
            },
            heap.stats(&mut bufmgr).unwrap()
        );
    }

    #[test]
    fn page_chain_test() {
        let mut bufmgr = ClockSweepManager::new(MemoryManager::new(), 3);
        let heap = HeapFile::create(&mut bufmgr, &wide()).unwrap();
        assert_eq!(1, records_per_page(&wide()));
        for id in 0..20 {
            heap.append(&mut bufmgr, &record![id, "x"]).unwrap();
        }
        let stats = heap.stats(&mut bufmgr).unwrap();
        assert_eq!(20, stats.num_pages);
        assert_eq!(20, stats.num_records);

        let mut cursor = heap.scan(&mut bufmgr).unwrap();
        let ids: Vec<_> = collect(&mut cursor, &mut bufmgr)
            .into_iter()
            .map(|record| record.0[0].clone())
            .collect();
        assert_eq!((0..20).map(Value::Int).collect::<Vec<_>>(), ids);
    }

    #[test]
    fn empty_heap_test() {
        let mut bufmgr = ClockSweepManager::new(MemoryManager::new(), 3);
        let heap = HeapFile::create(&mut bufmgr, &people()).unwrap();
        let mut cursor = heap.scan(&mut bufmgr).unwrap();
        cursor.mark_next();
        assert!(!cursor.has_next(&mut bufmgr).unwrap());
        assert!(cursor.next(&mut bufmgr).unwrap().is_none());
        cursor.reset();
        assert!(!cursor.has_next(&mut bufmgr).unwrap());
        assert_eq!(TableStats::default(), heap.stats(&mut bufmgr).unwrap());
    }

    #[test]
    fn mark_reset_test() {
        let mut bufmgr = ClockSweepManager::new(MemoryManager::new(), 4);
        let heap = HeapFile::create(&mut bufmgr, &wide()).unwrap();
        for id in 0..5 {
            heap.append(&mut bufmgr, &record![id, "x"]).unwrap();
        }
        let mut cursor = heap.scan(&mut bufmgr).unwrap();
        cursor.mark_next();
        assert_eq!(5, collect(&mut cursor, &mut bufmgr).len());
        cursor.reset();
        assert_eq!(Some(record![0, "x"]), cursor.next(&mut bufmgr).unwrap());

        cursor.next(&mut bufmgr).unwrap();
        cursor.next(&mut bufmgr).unwrap();
        cursor.mark_prev();
        cursor.next(&mut bufmgr).unwrap();
        cursor.reset();
        assert_eq!(Some(record![2, "x"]), cursor.next(&mut bufmgr).unwrap());
    }

    #[test]
    fn schema_mismatch_test() {
        let mut bufmgr = ClockSweepManager::new(MemoryManager::new(), 3);
        let heap = HeapFile::create(&mut bufmgr, &wide()).unwrap();
        assert!(matches!(
            heap.append(&mut bufmgr, &record![1]),
            Err(Error::SchemaMismatch)
        ));
        assert!(matches!(
            heap.append(&mut bufmgr, &record![1i64, "x"]),
            Err(Error::SchemaMismatch)
        ));
        let too_long = "y".repeat(2501);
        assert!(matches!(
            heap.append(&mut bufmgr, &record![1, too_long.as_str()]),
            Err(Error::SchemaMismatch)
        ));
        assert_eq!(0, heap.stats(&mut bufmgr).unwrap().num_records);
    }

    #[test]
    fn record_too_large_test() {
        let mut bufmgr = ClockSweepManager::new(MemoryManager::new(), 3);
        let schema = Schema::new(vec![Field::new("blob", Type::String(PAGE_SIZE))]);
        assert!(matches!(
            HeapFile::create(&mut bufmgr, &schema),
            Err(Error::RecordTooLarge(PAGE_SIZE))
        ));
    }

    #[test]
    fn reopen_test() {
        use tempfile::NamedTempFile;

        let (data_file, data_file_path) = NamedTempFile::new().unwrap().into_parts();
        let heap = {
            let disk = DiskManager::new(data_file).unwrap();
            let mut bufmgr = ClockSweepManager::new(disk, 3);
            let heap = HeapFile::create(&mut bufmgr, &people()).unwrap();
            heap.append(&mut bufmgr, &record![7, "Carol", 3.25f32, false, 0i64])
                .unwrap();
            bufmgr.flush().unwrap();
            heap
        };
        let disk = DiskManager::open(&data_file_path).unwrap();
        let mut bufmgr = ClockSweepManager::new(disk, 3);
        let heap = HeapFile::new(heap.meta_page_id);
        let mut cursor = heap.scan(&mut bufmgr).unwrap();
        assert_eq!(
            vec![record![7, "Carol", 3.25f32, false, 0i64]],
            collect(&mut cursor, &mut bufmgr)
        );
    }
}
