//! Key-indexed persistence for Decisions, indicator measurements and
//! Resolutions.
//!
//! The engine only sees the three store traits. `MemoryStore` backs tests and
//! dry runs; `PgStore` is the production implementation, where the
//! `content_hash` unique index makes `insert_if_absent` atomic across
//! concurrent detection runs.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use traits::{DecisionStore, IndicatorStore, InsertOutcome, ResolutionStore, Store};
