//! # DialOps Store
//!
//! Client for the hosted tabular backend that holds the outreach contacts
//! table: select-all reads, merge-duplicate CSV imports, CSV export, and
//! full-table clears. The CSV codec lives here too.
//!
//! The backend enforces no schema; rows come and go as open-ended
//! column→value maps (`ContactRow`).

pub mod client;
pub mod csv;

pub use client::TableStore;
pub use csv::{collect_columns, parse_csv, write_csv};
