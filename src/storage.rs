pub mod entity;
pub mod manager;

// In-memory page heap, used for temporary relations and tests
pub mod memory;
