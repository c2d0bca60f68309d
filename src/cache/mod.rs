//! In-process caching of parsed memo lists

pub mod bounded;
pub mod policy;

pub use bounded::{BoundedCache, DEFAULT_CAPACITY};
pub use policy::{CacheKey, CacheStats, MemoCache};
