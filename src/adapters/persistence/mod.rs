//! Movement store adapters.
//!
//! `MemoryMovementStore` for tests and ephemeral runs;
//! `JsonlMovementStore` adds a durable append-only journal with crash
//! recovery on top of the same in-memory index.

pub mod jsonl;
pub mod memory;

pub use jsonl::JsonlMovementStore;
pub use memory::MemoryMovementStore;
