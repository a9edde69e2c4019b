//! # DialOps Gateway
//!
//! The operator-facing HTTP API: dashboard metrics, agents, call history
//! with transcripts and audio, contacts table CRUD with CSV import/export,
//! manual test calls, and batch scheduler control.
//!
//! Auth is a single pairing code (header or query param), checked by
//! middleware on every protected route.

pub mod routes;
pub mod server;

pub use server::{AppState, build_router, build_state, start};
