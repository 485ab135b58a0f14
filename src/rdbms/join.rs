use std::cmp::Ordering;

use crate::sql::dml::{
    entity::{Record, Schema},
    query::{Error, Result},
};

pub mod bnlj;

pub use bnlj::{BlockNestedLoopJoin, ExecBlockNestedLoopJoin};

/// Key columns of an equijoin, resolved against both input schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinKeys {
    pub left_index: usize,
    pub right_index: usize,
}

impl JoinKeys {
    pub fn resolve(
        left: &Schema,
        left_column: &str,
        right: &Schema,
        right_column: &str,
    ) -> Result<Self> {
        let left_index = left
            .index_of(left_column)
            .ok_or_else(|| Error::UnknownColumn(left_column.to_owned()))?;
        let right_index = right
            .index_of(right_column)
            .ok_or_else(|| Error::UnknownColumn(right_column.to_owned()))?;
        let left_type = &left.fields[left_index].ty;
        let right_type = &right.fields[right_index].ty;
        if !left_type.is_comparable_with(right_type) {
            return Err(Error::IncomparableColumns {
                left: left_column.to_owned(),
                right: right_column.to_owned(),
            });
        }
        Ok(Self {
            left_index,
            right_index,
        })
    }

    pub fn compare(&self, left: &Record, right: &Record) -> Ordering {
        left.get(self.left_index).cmp(&right.get(self.right_index))
    }
}

/// IO cost of a block nested loop join.
///
/// The left input is read once; the right input is read once per block of
/// `num_buffers - 2` left pages. Budgets below 3 are treated as a single
/// usable page.
pub fn estimate_io_cost(
    left_pages: u64,
    left_scan_cost: u64,
    right_scan_cost: u64,
    num_buffers: usize,
) -> u64 {
    let usable_buffers = num_buffers.saturating_sub(2).max(1) as u64;
    let num_left_blocks = left_pages.div_ceil(usable_buffers);
    num_left_blocks
        .saturating_mul(right_scan_cost)
        .saturating_add(left_scan_cost)
}
