//! File-backed checkpoint store and entity feed.

mod checkpoint;
mod entities;

pub use checkpoint::FileCheckpointStore;
pub use entities::JsonLinesEntitySource;
