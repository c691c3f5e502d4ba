pub mod config;
pub mod error;
pub mod hash;
pub mod policy;
pub mod text;
pub mod types;
pub mod vocabulary;

pub use config::{AppConfig, FileConfig};
pub use error::{Result, VerdictError};
pub use hash::content_hash;
pub use policy::*;
pub use types::*;
pub use vocabulary::Vocabulary;
