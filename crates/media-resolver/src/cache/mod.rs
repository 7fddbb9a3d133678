//! # Cache System
//!
//! The cache store seam the resolution controller talks to, the key derivation
//! it addresses entries with, and an in-process memory store.

mod key;
pub mod memory;
mod store;

pub use key::CacheKey;
pub use memory::{MemoryCacheStore, MemoryStoreConfig, Populator};
pub use store::{CacheStore, HeaderResolver, LocalPath, is_remote_url};
