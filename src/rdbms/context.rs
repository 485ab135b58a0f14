/// Pages of working memory handed to an operator when nothing else is said.
pub const DEFAULT_WORK_MEM: usize = 5;

/// Per-query execution settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecContext {
    /// Buffer pages an operator may hold at once.
    pub work_mem: usize,
}

impl ExecContext {
    pub fn new(work_mem: usize) -> Self {
        Self { work_mem }
    }
}

impl Default for ExecContext {
    fn default() -> Self {
        Self::new(DEFAULT_WORK_MEM)
    }
}
