//! Notification pipeline.
//!
//! - `new_postings`: Diff the fetched listing against the seen set
//! - `Dispatcher`: Render once, fan out to subscribers
//! - `CycleRunner`: Serialized fetch, diff, dispatch and commit pass
//! - `Scheduler`: Run cycles on an interval until shutdown

pub mod cycle;
pub mod diff;
pub mod dispatch;
pub mod scheduler;

pub use cycle::CycleRunner;
pub use diff::new_postings;
pub use dispatch::Dispatcher;
pub use scheduler::Scheduler;
