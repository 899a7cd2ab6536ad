//! tunevfs-kernel: one directory tree over many slow, remote music catalogs.
//!
//! This crate provides:
//!
//! - **VFS**: directories and files addressed by URI, mounted by scheme,
//!   with optional capabilities discovered at runtime
//! - **Cache**: SQLite-backed cache-or-refresh coordinator with TTLs,
//!   aliasing and single-flight refreshes
//! - **Catalog**: the `archive:` album catalog on top of the coordinator
//! - **Scheduler**: the polling protocol, async operations with streaming
//!   status, and a client pull loop
//!
//! [`kernel::VfsKernel`] wires them together from a [`config::VfsConfig`].

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod kernel;
pub mod paths;
pub mod scheduler;
pub mod uri;
pub mod vfs;

pub use config::VfsConfig;
pub use error::{StoreError, VfsError, VfsResult};
pub use kernel::VfsKernel;
pub use scheduler::{AsyncQueryScheduler, RowCallback, RowCollector, VfsClient};
pub use uri::VfsUri;
