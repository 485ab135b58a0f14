pub mod entity;
pub mod manager;
