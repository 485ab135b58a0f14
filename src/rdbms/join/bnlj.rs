//! Block nested loop join.
//!
//! The left input is read once, a block of `num_buffers - 2` pages at a time.
//! The right input is materialized up front and rescanned, one page at a
//! time, for every left block.

use std::cmp::Ordering;

use tracing::{debug, info_span, trace, Span};

use super::{estimate_io_cost, JoinKeys};
use crate::buffer::manager::BufferPoolManager;
use crate::rdbms::{block::RecordBlock, context::ExecContext, heap::records_per_page, query::Materialize};
use crate::sql::dml::{entity::*, query::*};

pub struct BlockNestedLoopJoin<'a, T: BufferPoolManager> {
    left: &'a dyn PlanNode<T>,
    right: Materialize,
    keys: JoinKeys,
    num_buffers: usize,
    schema: Schema,
}

impl<'a, T: BufferPoolManager> BlockNestedLoopJoin<'a, T> {
    /// Validates the buffer budget and join columns, then materializes
    /// `right` so it can be rescanned once per left block.
    pub fn new(
        bufmgr: &mut T,
        left: &'a dyn PlanNode<T>,
        right: &dyn PlanNode<T>,
        left_column: &str,
        right_column: &str,
        ctx: &ExecContext,
    ) -> Result<Self> {
        let num_buffers = ctx.work_mem;
        if num_buffers < 3 {
            return Err(Error::InsufficientBuffers(num_buffers));
        }
        let keys = JoinKeys::resolve(left.schema(), left_column, right.schema(), right_column)?;
        let schema = left.schema().concat(right.schema());
        let right = Materialize::new(bufmgr, right)?;
        Ok(Self {
            left,
            right,
            keys,
            num_buffers,
            schema,
        })
    }

    /// Pages available for the left block; one page each is kept for the
    /// right page and the output.
    pub fn usable_buffers(&self) -> usize {
        self.num_buffers - 2
    }

    /// Starts an execution without boxing it.
    pub fn open(&self, bufmgr: &mut T) -> Result<ExecBlockNestedLoopJoin<'_, T>> {
        let left_source = self.left.start(bufmgr)?;
        let right_source = self.right.backtracking_start(bufmgr)?;
        ExecBlockNestedLoopJoin::new(
            bufmgr,
            left_source,
            right_source,
            self.left.schema(),
            PlanNode::<T>::schema(&self.right),
            self.keys,
            self.usable_buffers(),
        )
    }
}

impl<'a, T: BufferPoolManager> PlanNode<T> for BlockNestedLoopJoin<'a, T> {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn start(&self, bufmgr: &mut T) -> Result<BoxExecutor<T>> {
        Ok(Box::new(self.open(bufmgr)?))
    }

    /// Upper bound: every left record matching every right record.
    fn estimate_stats(&self, bufmgr: &mut T) -> Result<TableStats> {
        let left = self.left.estimate_stats(bufmgr)?;
        let right = self.right.estimate_stats(bufmgr)?;
        let num_records = left.num_records.saturating_mul(right.num_records);
        let num_pages = num_records.div_ceil(records_per_page(&self.schema) as u64);
        Ok(TableStats {
            num_records,
            num_pages,
        })
    }

    fn estimate_io_cost(&self, bufmgr: &mut T) -> Result<u64> {
        let left_pages = self.left.estimate_stats(bufmgr)?.num_pages;
        let left_scan_cost = self.left.estimate_io_cost(bufmgr)?;
        let right_scan_cost = self.right.estimate_io_cost(bufmgr)?;
        Ok(estimate_io_cost(
            left_pages,
            left_scan_cost,
            right_scan_cost,
            self.num_buffers,
        ))
    }
}

pub struct ExecBlockNestedLoopJoin<'a, T: BufferPoolManager> {
    left_source: BoxExecutor<'a, T>,
    right_source: BoxBacktrackingExecutor<'a, T>,
    left_schema: &'a Schema,
    right_schema: &'a Schema,
    keys: JoinKeys,
    usable_buffers: usize,
    // current block of left records, None until the left input yields one
    left_block: Option<RecordBlock>,
    // current page of right records, None until the right input yields one
    right_page: Option<RecordBlock>,
    left_record: Option<Record>,
    next_record: Option<Record>,
    exhausted: bool,
    // an upstream failure may leave the sources half-advanced
    failed: bool,
    span: Span,
}

impl<'a, T: BufferPoolManager> ExecBlockNestedLoopJoin<'a, T> {
    fn new(
        bufmgr: &mut T,
        left_source: BoxExecutor<'a, T>,
        right_source: BoxBacktrackingExecutor<'a, T>,
        left_schema: &'a Schema,
        right_schema: &'a Schema,
        keys: JoinKeys,
        usable_buffers: usize,
    ) -> Result<Self> {
        let span = info_span!("bnlj", usable_buffers);
        let mut exec = Self {
            left_source,
            right_source,
            left_schema,
            right_schema,
            keys,
            usable_buffers,
            left_block: None,
            right_page: None,
            left_record: None,
            next_record: None,
            exhausted: false,
            failed: false,
            span,
        };
        {
            let span = exec.span.clone();
            let _enter = span.enter();
            exec.fetch_next_left_block(bufmgr)?;
            exec.right_source.mark_next();
            exec.fetch_next_right_page(bufmgr)?;
        }
        Ok(exec)
    }

    /// Records currently held in memory: the left block plus the right page.
    pub fn buffered_records(&self) -> usize {
        self.left_block.as_ref().map_or(0, RecordBlock::len)
            + self.right_page.as_ref().map_or(0, RecordBlock::len)
    }

    /// Once an upstream error has been returned, every later call fails with
    /// `Aborted`.
    pub fn has_next(&mut self, bufmgr: &mut T) -> Result<bool> {
        if self.failed {
            return Err(Error::Aborted);
        }
        if self.next_record.is_none() && !self.exhausted {
            let span = self.span.clone();
            let _enter = span.enter();
            self.next_record = match self.fetch_next_record(bufmgr) {
                Ok(record) => record,
                Err(err) => {
                    debug!(%err, "join aborted");
                    self.failed = true;
                    return Err(err);
                }
            };
            if self.next_record.is_none() {
                debug!("join exhausted");
                self.exhausted = true;
            }
        }
        Ok(self.next_record.is_some())
    }

    pub fn next(&mut self, bufmgr: &mut T) -> Result<Record> {
        if !self.has_next(bufmgr)? {
            return Err(Error::NoElement);
        }
        self.next_record.take().ok_or(Error::NoElement)
    }

    // Loads up to `usable_buffers` pages of left records and positions
    // `left_record` on the first one. No-op once the left input is drained.
    fn fetch_next_left_block(&mut self, bufmgr: &mut T) -> Result<()> {
        if !self.left_source.has_next(bufmgr)? {
            return Ok(());
        }
        let mut block = RecordBlock::load(
            self.left_source.as_mut(),
            bufmgr,
            self.left_schema,
            self.usable_buffers,
        )?;
        debug!(records = block.len(), "left block loaded");
        self.left_record = block.next();
        block.mark_prev();
        self.left_block = Some(block);
        Ok(())
    }

    // Loads the next single page of right records. No-op once the right
    // input is drained.
    fn fetch_next_right_page(&mut self, bufmgr: &mut T) -> Result<()> {
        if !self.right_source.has_next(bufmgr)? {
            return Ok(());
        }
        let mut page = RecordBlock::load(self.right_source.as_mut(), bufmgr, self.right_schema, 1)?;
        trace!(records = page.len(), "right page loaded");
        page.mark_next();
        self.right_page = Some(page);
        Ok(())
    }

    fn fetch_next_record(&mut self, bufmgr: &mut T) -> Result<Option<Record>> {
        loop {
            let (left_block, right_page) = match (self.left_block.as_mut(), self.right_page.as_mut()) {
                (Some(left_block), Some(right_page)) => (left_block, right_page),
                // one side is empty
                _ => return Ok(None),
            };
            if let Some(left_record) = &self.left_record {
                if let Some(right_record) = right_page.next() {
                    if self.keys.compare(left_record, &right_record) == Ordering::Equal {
                        trace!(%left_record, %right_record, "match");
                        return Ok(Some(left_record.concat(&right_record)));
                    }
                    continue;
                }
            }
            if left_block.has_next() {
                // same right page, next left record
                self.left_record = left_block.next();
                right_page.reset();
            } else if self.right_source.has_next(bufmgr)? {
                // next right page, whole left block again
                self.fetch_next_right_page(bufmgr)?;
                if let Some(left_block) = self.left_block.as_mut() {
                    left_block.reset();
                    self.left_record = left_block.next();
                }
            } else if self.left_source.has_next(bufmgr)? {
                // next left block, full right scan again
                self.fetch_next_left_block(bufmgr)?;
                self.right_source.reset();
                self.fetch_next_right_page(bufmgr)?;
            } else {
                return Ok(None);
            }
        }
    }
}

impl<'a, T: BufferPoolManager> Executor<T> for ExecBlockNestedLoopJoin<'a, T> {
    fn has_next(&mut self, bufmgr: &mut T) -> Result<bool> {
        ExecBlockNestedLoopJoin::has_next(self, bufmgr)
    }

    fn next(&mut self, bufmgr: &mut T) -> Result<Record> {
        ExecBlockNestedLoopJoin::next(self, bufmgr)
    }
}
