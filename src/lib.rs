pub mod buffer;
pub mod rdbms;
pub mod sql;
pub mod storage;
