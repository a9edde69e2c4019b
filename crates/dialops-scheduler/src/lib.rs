//! # DialOps Scheduler
//!
//! The batch outreach scheduler — the one stateful piece of the platform.
//!
//! ## Architecture
//! ```text
//! start(contacts, batch_size, interval)
//!   ├── eligibility filter → OutreachQueue (FIFO, in-memory)
//!   └── run_batch (generation-tagged)
//!         ├── take_batch(n) → dispatch all concurrently → settle all
//!         ├── ExecutionLog: one line per contact, newest first
//!         ├── queue empty → idle
//!         └── else → single-shot timer → run_batch
//! ```
//!
//! Pause cancels the pending timer only; resume dispatches immediately.
//! Nothing is persisted: a run lives and dies with the process, and the
//! execution log is the session's audit trail.

pub mod dispatch;
pub mod engine;
pub mod log;
pub mod queue;

pub use dispatch::{build_call_request, dispatch_contact, language_code, normalize_phone};
pub use engine::{
    BatchScheduler, SchedulerState, SchedulerStatus, SharedScheduler, StartSummary, pause, resume,
    start,
};
pub use log::{ExecutionLog, LogEntry};
pub use queue::OutreachQueue;
