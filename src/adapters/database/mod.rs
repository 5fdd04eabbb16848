//! Store abstraction layer
//!
//! This module provides a trait-based abstraction for the shared key-value
//! store, allowing reportflow to run against different backends
//! (in-memory, PostgreSQL).

pub mod factory;
pub mod memory;
pub mod traits;
pub mod update;

pub use factory::create_store;
pub use memory::InMemoryStore;
pub use traits::{
    decode_document, load_document, save_document, Collection, KeyValueStore, RecordKey,
    UpdateOutcome,
};
pub use update::{Condition, FieldUpdate};
