//! Document store backends and the evaluation helpers they share.
//!
//! - [`MemoryStore`]: collections held in memory, seeded from JSON
//! - [`NullStore`]: no collections, empty results
//! - [`StorePool`]: one shared store per database name

pub mod filter;
pub mod memory;
pub mod null;
pub mod pool;
pub mod projection;

pub use filter::FilterExpr;
pub use memory::MemoryStore;
pub use null::NullStore;
pub use pool::{StoreFactory, StorePool};
pub use projection::Projection;
