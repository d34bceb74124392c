pub mod chunker;
pub mod core;
pub mod extract;

pub use self::core::{BuildReport, IndexError, Indexer};
