//! Async operation scheduling behind the polling protocol.
//!
//! ```text
//! ┌──────────┐  poll(request)   ┌─────────────────────┐  spawn   ┌───────────┐
//! │ VfsClient│─────────────────▶│ AsyncQueryScheduler │─────────▶│ Operation │
//! │ (pull    │◀─────────────────│  registry: key → op │◀─status──│ (worker)  │
//! │  loop)   │   row batch      │  ticker → notifier  │          └───────────┘
//! └──────────┘                  └─────────────────────┘
//! ```
//!
//! A poll either answers within the synchronous wait, or registers the
//! operation and hands back its status. Repeat polls reuse the registered
//! operation until one of them collects the final rows.

mod client;
mod notify;
mod operation;
mod ops;
mod progress;
mod query;
mod registry;

pub use client::{RowCallback, RowCollector, VfsClient};
pub use notify::{ChangeNotifier, NOTIFY_CAPACITY};
pub use operation::Operation;
pub use ops::build_operation;
pub use progress::ProgressTracker;
pub use query::AsyncQueryScheduler;
pub use registry::{OperationInfo, OperationState};
