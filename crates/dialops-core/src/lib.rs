//! # DialOps Core
//!
//! Shared foundation for the DialOps outreach platform:
//! - Configuration (`~/.dialops/config.toml`, env overrides for secrets)
//! - Error taxonomy (`DialopsError`) — per-contact failures are values,
//!   never panics
//! - Shared types: open-ended contact rows, call requests/outcomes,
//!   metric ranges
//! - The `Dialer` trait — the seam between the batch scheduler and the
//!   voice provider client

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::DialopsConfig;
pub use error::{DialopsError, Result};
pub use traits::Dialer;
pub use types::{CallOutcome, CallRequest, ContactRow, MetricRange};
