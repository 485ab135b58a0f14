use tracing::trace;

use super::heap::records_per_page;
use crate::buffer::manager::BufferPoolManager;
use crate::sql::dml::{
    entity::{Record, Schema},
    query::{Executor, Result},
};

/// A bounded, in-memory window of records with mark/reset support.
///
/// The records are owned by the block; marking and resetting only move the
/// read index, nothing is fetched from the source again.
#[derive(Debug, Default)]
pub struct RecordBlock {
    records: Vec<Record>,
    next_index: usize,
    mark_index: Option<usize>,
}

impl RecordBlock {
    /// Pulls up to `max_pages` pages' worth of records from `source`.
    ///
    /// `source` is left positioned just past the last buffered record.
    pub fn load<T, E>(
        source: &mut E,
        bufmgr: &mut T,
        schema: &Schema,
        max_pages: usize,
    ) -> Result<Self>
    where
        T: BufferPoolManager,
        E: Executor<T> + ?Sized,
    {
        let max_records = max_pages.saturating_mul(records_per_page(schema));
        let mut records = Vec::new();
        while records.len() < max_records && source.has_next(bufmgr)? {
            records.push(source.next(bufmgr)?);
        }
        trace!(records = records.len(), max_pages, "block loaded");
        Ok(Self::from(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_next(&self) -> bool {
        self.next_index < self.records.len()
    }

    pub fn mark_next(&mut self) {
        self.mark_index = Some(self.next_index);
    }

    pub fn mark_prev(&mut self) {
        if let Some(prev) = self.next_index.checked_sub(1) {
            self.mark_index = Some(prev);
        }
    }

    pub fn reset(&mut self) {
        if let Some(mark) = self.mark_index {
            self.next_index = mark;
        }
    }
}

impl From<Vec<Record>> for RecordBlock {
    fn from(records: Vec<Record>) -> Self {
        Self {
            records,
            next_index: 0,
            mark_index: None,
        }
    }
}

impl Iterator for RecordBlock {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        let record = self.records.get(self.next_index)?.clone();
        self.next_index += 1;
        Some(record)
    }
}
