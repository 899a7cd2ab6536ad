//! Persistent catalog cache and the cache-or-refresh coordinator.

mod coordinator;
mod flight;
mod lifetime;
mod store;

pub use coordinator::{CacheOrRefresh, FetchCommand, QueryCommand, RandomCommand};
pub use flight::KeyedLocks;
pub use lifetime::Lifetime;
pub use store::{CacheStore, CacheTx, StoreResult};
