use thiserror::Error;

use super::entity::{Record, Schema};
use crate::buffer::manager::{self, BufferPoolManager};
use crate::rdbms::heap;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no more records")]
    NoElement,
    #[error("block nested loop join needs at least 3 buffers, got {0}")]
    InsufficientBuffers(usize),
    #[error("unknown column {0:?}")]
    UnknownColumn(String),
    #[error("cannot join column {left:?} with column {right:?}")]
    IncomparableColumns { left: String, right: String },
    #[error("plan node cannot be scanned more than once without materialization")]
    NotBacktrackable,
    #[error("execution was aborted by an earlier failure")]
    Aborted,
    #[error(transparent)]
    Heap(#[from] heap::Error),
    #[error(transparent)]
    Buffer(#[from] manager::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    pub num_records: u64,
    pub num_pages: u64,
}

/// Pull-based record stream.
///
/// `has_next` may compute and buffer the next record but never consumes it.
/// `next` fails with [`Error::NoElement`] once the stream is exhausted.
pub trait Executor<T: BufferPoolManager> {
    fn has_next(&mut self, bufmgr: &mut T) -> Result<bool>;
    fn next(&mut self, bufmgr: &mut T) -> Result<Record>;
}

/// An executor that can rewind to a remembered position.
pub trait BacktrackingExecutor<T: BufferPoolManager>: Executor<T> {
    /// Remember the position of the record the next `next` call returns.
    fn mark_next(&mut self);
    /// Remember the position of the record the last `next` call returned.
    fn mark_prev(&mut self);
    /// Rewind to the last mark. Without a mark this does nothing.
    fn reset(&mut self);
}

pub type BoxExecutor<'a, T> = Box<dyn Executor<T> + 'a>;

pub type BoxBacktrackingExecutor<'a, T> = Box<dyn BacktrackingExecutor<T> + 'a>;

pub trait PlanNode<T: BufferPoolManager> {
    fn schema(&self) -> &Schema;

    fn start(&self, bufmgr: &mut T) -> Result<BoxExecutor<T>>;

    fn backtracking_start(&self, _bufmgr: &mut T) -> Result<BoxBacktrackingExecutor<T>> {
        Err(Error::NotBacktrackable)
    }

    fn estimate_stats(&self, bufmgr: &mut T) -> Result<TableStats>;

    fn estimate_io_cost(&self, bufmgr: &mut T) -> Result<u64>;
}
