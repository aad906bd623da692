//! Per-cluster workers and trigger dispatch.
//!
//! Each cluster gets a dedicated worker that runs its reconciliation passes
//! serially, while different clusters reconcile concurrently.
//!
//! # Module Structure
//!
//! - [`dispatch`]: routes triggers to workers, spawning them on demand
//! - [`worker`]: the per-cluster event loop
//! - [`message`]: worker message types
//! - [`poll`]: periodic resync with per-cluster jitter
//! - [`retry`]: backoff between failed passes

pub mod dispatch;
pub mod message;
pub mod poll;
pub mod retry;
pub mod worker;

pub use dispatch::{DispatchError, Dispatcher};
pub use message::{Trigger, WorkerMessage};
pub use poll::ResyncConfig;
pub use retry::RetryConfig;
pub use worker::{ClusterWorker, WorkerConfig, WorkerError, WorkerExit};
