// Disk-backed StorageManager
pub mod disk;

// BufferPoolManager using a clock-sweep buffer pool
pub mod clocksweep;

pub mod heap;

pub mod block;

pub mod context;

pub mod table;

pub mod query;

pub mod join;
