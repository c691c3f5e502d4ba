//! Claude client used by the classification adapters.
//!
//! Only structured extraction (forced tool use) and plain completion are
//! exposed. Every request carries a client-level timeout so callers can bound
//! how long a classification may take.

pub mod claude;
pub mod schema;

pub use claude::Claude;
pub use schema::StructuredOutput;
