//! Trait seams between the scheduler and the outside world.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{CallOutcome, CallRequest};

/// Something that can place one outbound call.
///
/// The batch scheduler only ever talks to this trait; the production
/// implementation lives in `dialops-provider`, tests inject a recording
/// mock. One invocation maps to one HTTP request — the dialer mutates no
/// local state.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn place_call(&self, request: &CallRequest) -> Result<CallOutcome>;
}
