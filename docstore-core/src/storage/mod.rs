// src/storage/mod.rs
//! Storage layer: the `Storage` trait and its in-memory implementation

pub mod memory_storage;
pub mod traits;

pub use memory_storage::MemoryStorage;
pub use traits::{DocumentFilter, Storage};
