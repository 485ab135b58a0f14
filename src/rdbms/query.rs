use tracing::debug;

use super::heap::{Cursor, HeapFile};
use crate::buffer::manager::BufferPoolManager;
use crate::sql::dml::{entity::*, query::*};

/// Full scan over a stored relation.
pub struct SeqScan {
    pub heap: HeapFile,
    pub schema: Schema,
}

impl SeqScan {
    pub fn new(bufmgr: &mut dyn BufferPoolManager, heap: HeapFile) -> Result<Self> {
        let schema = heap.schema(bufmgr)?;
        Ok(Self { heap, schema })
    }
}

impl<T: BufferPoolManager> PlanNode<T> for SeqScan {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn start(&self, bufmgr: &mut T) -> Result<BoxExecutor<T>> {
        Ok(Box::new(ExecHeapScan::new(self.heap.scan(bufmgr)?)))
    }

    fn backtracking_start(&self, bufmgr: &mut T) -> Result<BoxBacktrackingExecutor<T>> {
        Ok(Box::new(ExecHeapScan::new(self.heap.scan(bufmgr)?)))
    }

    fn estimate_stats(&self, bufmgr: &mut T) -> Result<TableStats> {
        Ok(self.heap.stats(bufmgr)?)
    }

    fn estimate_io_cost(&self, bufmgr: &mut T) -> Result<u64> {
        Ok(self.heap.stats(bufmgr)?.num_pages)
    }
}

/// Spools its source into a temporary heap file once, so the result can be
/// scanned from the start any number of times.
pub struct Materialize {
    heap: HeapFile,
    schema: Schema,
}

impl Materialize {
    pub fn new<T: BufferPoolManager>(bufmgr: &mut T, source: &dyn PlanNode<T>) -> Result<Self> {
        let schema = source.schema().clone();
        let heap = HeapFile::create(bufmgr, &schema)?;
        let mut exec = source.start(bufmgr)?;
        let mut num_records = 0u64;
        while exec.has_next(bufmgr)? {
            let record = exec.next(bufmgr)?;
            heap.append(bufmgr, &record)?;
            num_records += 1;
        }
        debug!(
            heap = heap.meta_page_id.to_u64(),
            num_records, "source materialized"
        );
        Ok(Self { heap, schema })
    }

    pub fn heap(&self) -> HeapFile {
        self.heap
    }
}

impl<T: BufferPoolManager> PlanNode<T> for Materialize {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn start(&self, bufmgr: &mut T) -> Result<BoxExecutor<T>> {
        Ok(Box::new(ExecHeapScan::new(self.heap.scan(bufmgr)?)))
    }

    fn backtracking_start(&self, bufmgr: &mut T) -> Result<BoxBacktrackingExecutor<T>> {
        Ok(Box::new(ExecHeapScan::new(self.heap.scan(bufmgr)?)))
    }

    fn estimate_stats(&self, bufmgr: &mut T) -> Result<TableStats> {
        Ok(self.heap.stats(bufmgr)?)
    }

    fn estimate_io_cost(&self, bufmgr: &mut T) -> Result<u64> {
        Ok(self.heap.stats(bufmgr)?.num_pages)
    }
}

pub struct ExecHeapScan {
    cursor: Cursor,
}

impl ExecHeapScan {
    fn new(cursor: Cursor) -> Self {
        Self { cursor }
    }
}

impl<T: BufferPoolManager> Executor<T> for ExecHeapScan {
    fn has_next(&mut self, bufmgr: &mut T) -> Result<bool> {
        Ok(self.cursor.has_next(bufmgr)?)
    }

    fn next(&mut self, bufmgr: &mut T) -> Result<Record> {
        self.cursor.next(bufmgr)?.ok_or(Error::NoElement)
    }
}

impl<T: BufferPoolManager> BacktrackingExecutor<T> for ExecHeapScan {
    fn mark_next(&mut self) {
        self.cursor.mark_next();
    }

    fn mark_prev(&mut self) {
        self.cursor.mark_prev();
    }

    fn reset(&mut self) {
        self.cursor.reset();
    }
}
