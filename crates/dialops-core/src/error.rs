//! Error taxonomy for DialOps.
//!
//! Per-contact failures (`InvalidPhone`, `DispatchFailed`) are recovered
//! inside the batch loop and never abort a run; configuration and
//! eligibility failures are surfaced to the operator before any state
//! changes.

use thiserror::Error;

/// Convenience result alias used across the workspace.
pub type Result<T> = std::result::Result<T, DialopsError>;

#[derive(Debug, Error)]
pub enum DialopsError {
    /// Configuration file missing, unreadable, or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level HTTP failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The voice provider answered with an unexpected payload shape.
    #[error("Provider error: {0}")]
    Provider(String),

    /// The provider rejected an outbound call request.
    #[error("Call dispatch failed ({status}): {body}")]
    DispatchFailed { status: u16, body: String },

    /// The hosted table backend rejected a request.
    #[error("Store error: {0}")]
    Store(String),

    /// A contact has no normalizable phone number.
    #[error("Contact is missing a valid phone number")]
    InvalidPhone,

    /// Batch size or interval rejected at start/resume time.
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// Every contact was filtered out before the queue was built.
    #[error(
        "No eligible contacts: {missing_phone} missing a phone number, \
         {already_called} already have a call status"
    )]
    NoEligibleContacts {
        missing_phone: usize,
        already_called: usize,
    },

    /// Lookup by encounter id (or similar key) found nothing.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DialopsError {
    /// Whether this error is scoped to a single contact and must not
    /// abort the rest of its batch.
    pub fn is_per_contact(&self) -> bool {
        matches!(
            self,
            DialopsError::InvalidPhone | DialopsError::DispatchFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_contact_classification() {
        assert!(DialopsError::InvalidPhone.is_per_contact());
        assert!(
            DialopsError::DispatchFailed {
                status: 502,
                body: "bad gateway".into()
            }
            .is_per_contact()
        );
        assert!(!DialopsError::Config("x".into()).is_per_contact());
        assert!(
            !DialopsError::NoEligibleContacts {
                missing_phone: 1,
                already_called: 2
            }
            .is_per_contact()
        );
    }

    #[test]
    fn test_no_eligible_contacts_message() {
        let err = DialopsError::NoEligibleContacts {
            missing_phone: 3,
            already_called: 7,
        };
        let msg = err.to_string();
        assert!(msg.contains("3 missing a phone number"));
        assert!(msg.contains("7 already have a call status"));
    }
}
