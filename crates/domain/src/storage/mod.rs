//! Storage port consumed by the ingest pipeline and the lookup path.

mod traits;

pub use traits::*;
