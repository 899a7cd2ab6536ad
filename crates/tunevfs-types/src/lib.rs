//! Pure data types for tunevfs: result rows, progress and request kinds.
//!
//! This crate is a leaf dependency with no async runtime, no storage, no I/O.
//! It exists so that front-ends can speak the polling protocol without pulling
//! in tunevfs-kernel and its SQLite/tokio dependencies.

pub mod progress;
pub mod request;
pub mod row;

// Flat re-exports for convenience
pub use progress::*;
pub use request::*;
pub use row::*;
