//! # DialOps Provider
//!
//! Client for the conversational-AI provider's REST surface: agent
//! listing, dashboard metrics, cursor-paginated call history, transcripts
//! and audio, conversation deletion, and outbound call initiation (the
//! `Dialer` implementation the batch scheduler dials through).
//!
//! Agents (30s) and metrics (5min) sit behind per-client TTL caches with
//! explicit invalidation — no global state.

pub mod cache;
pub mod client;
pub mod types;

pub use cache::TtlCache;
pub use client::VoiceClient;
pub use types::{
    AgentInfo, CallDetails, CallSummary, DailyCalls, DailySuccess, DashboardMetrics, HistoryPage,
    TranscriptTurn,
};
