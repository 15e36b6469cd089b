//! feedreel — core library for harvested feed posts: the deduplicating post
//! store, its JSON document format, and snapshot helpers.

pub mod capture;
pub mod slug;
pub mod storage;
pub mod store;
pub mod types;

pub use capture::{content_hash, snapshot_dimensions, snapshot_path, write_snapshot};
pub use slug::slugify;
pub use storage::{DocumentReader, DocumentWriter};
pub use store::PostStore;
pub use types::*;
