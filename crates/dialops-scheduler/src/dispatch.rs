//! Call dispatcher — turns one contact row into one outbound-call request.
//!
//! Pure request shaping (phone normalization, language derivation, variable
//! payload) plus a thin async wrapper over the `Dialer` trait. The dispatcher
//! mutates no local state; failures are values the batch loop logs per
//! contact.

use std::collections::BTreeMap;

use dialops_core::error::{DialopsError, Result};
use dialops_core::traits::Dialer;
use dialops_core::types::{CallOutcome, CallRequest, ContactRow};

/// Columns the voice agent's prompt references by name. Absent columns are
/// sent as empty strings so the provider always sees the same variable
/// shape regardless of source-row completeness.
pub const REQUIRED_COLUMNS: &[&str] = &[
    "account_number",
    "encounter_id",
    "first_name",
    "last_name",
    "encounter_date",
    "check_in",
    "visit_type",
    "dob",
    "site_name",
    "provider_name",
    "reason",
    "preferred_language",
    "primary_phone",
    "mobile_phone",
    "status",
];

/// Strip everything but digits and one leading `+`. Returns an empty
/// string when nothing dialable remains.
pub fn normalize_phone(value: &str) -> String {
    // The plus survives only when it leads the kept [0-9+] sequence, so
    // punctuation around it ("(+1) ...") does not strip the prefix.
    let kept: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    let has_plus = kept.starts_with('+');
    let digits: String = kept.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return String::new();
    }

    if has_plus {
        format!("+{digits}")
    } else {
        digits
    }
}

/// Whether a contact row carries a dialable `primary_phone`.
pub fn has_dialable_phone(row: &ContactRow) -> bool {
    !normalize_phone(&row.value("primary_phone")).is_empty()
}

/// Derive the 2-letter language code from a `preferred_language` value.
/// Known prefixes map directly; any other value of 2+ chars contributes its
/// first two characters; everything else falls back to English.
pub fn language_code(preferred_language: &str) -> String {
    let trimmed = preferred_language.trim().to_lowercase();

    if trimmed.is_empty() {
        return "en".into();
    }
    for known in ["es", "en", "fr", "pt"] {
        if trimmed.starts_with(known) {
            return (*known).into();
        }
    }
    if trimmed.chars().count() >= 2 {
        return trimmed.chars().take(2).collect();
    }
    "en".into()
}

/// Build the call request for one contact, with an optional phone override
/// (manual test calls). Every column is passed through as a string
/// variable; the required set is backfilled with empty strings.
///
/// Returns `InvalidPhone` when neither the override nor `primary_phone`
/// normalizes to anything dialable — the contact is skipped, never sent.
pub fn build_call_request(row: &ContactRow, override_phone: Option<&str>) -> Result<CallRequest> {
    let stored_phone = row.value("primary_phone");
    let override_trimmed = override_phone.map(str::trim).unwrap_or("");
    let raw_phone = if override_trimmed.is_empty() {
        stored_phone.as_str()
    } else {
        override_trimmed
    };

    let to = normalize_phone(raw_phone);
    if to.is_empty() {
        return Err(DialopsError::InvalidPhone);
    }

    let mut vars: BTreeMap<String, String> = row
        .columns()
        .map(|key| (key.to_string(), row.value(key)))
        .collect();
    for column in REQUIRED_COLUMNS {
        vars.entry((*column).to_string()).or_default();
    }

    // An operator-supplied phone wins; otherwise make sure the agent sees
    // the number that was actually dialed.
    if !override_trimmed.is_empty() {
        vars.insert("primary_phone".into(), override_trimmed.to_string());
        let mobile = vars.entry("mobile_phone".into()).or_default();
        if mobile.is_empty() {
            *mobile = override_trimmed.to_string();
        }
    } else if vars.get("primary_phone").is_none_or(|p| p.is_empty()) {
        let fallback = if stored_phone.is_empty() {
            to.clone()
        } else {
            stored_phone.clone()
        };
        vars.insert("primary_phone".into(), fallback);
    }

    let lang = language_code(&row.value("preferred_language"));

    Ok(CallRequest { to, lang, vars })
}

/// Shape and submit one call. One invocation maps to one HTTP request on
/// the dialer side; errors here are per-contact and never abort a batch.
pub async fn dispatch_contact(
    dialer: &dyn Dialer,
    row: &ContactRow,
    override_phone: Option<&str>,
) -> Result<CallOutcome> {
    let request = build_call_request(row, override_phone)?;
    dialer.place_call(&request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: serde_json::Value) -> ContactRow {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("(202) 555-0175"), "2025550175");
        assert_eq!(normalize_phone("+1 (202) 555-0175"), "+12025550175");
        assert_eq!(normalize_phone("  +1-202-555-0175 "), "+12025550175");
        // Leading punctuation must not strip the international prefix
        assert_eq!(normalize_phone("(+1) 202-555-0175"), "+12025550175");
        // A plus that is not first in the kept sequence stays dropped
        assert_eq!(normalize_phone("1+2025550175"), "12025550175");
        assert_eq!(normalize_phone("ext."), "");
        assert_eq!(normalize_phone("+"), "");
        assert_eq!(normalize_phone(""), "");
    }

    #[test]
    fn test_language_code() {
        assert_eq!(language_code("español"), "es");
        assert_eq!(language_code("ENGLISH"), "en");
        assert_eq!(language_code("fr-CA"), "fr");
        assert_eq!(language_code("pt-BR"), "pt");
        // Only the known prefixes map directly; other values take their
        // first two characters, so "Spanish" lands on "sp" (the endpoint
        // routing hint still recognizes it).
        assert_eq!(language_code("Spanish"), "sp");
        assert_eq!(language_code("Português"), "po");
        assert_eq!(language_code("Deutsch"), "de");
        assert_eq!(language_code("x"), "en");
        assert_eq!(language_code(""), "en");
    }

    #[test]
    fn test_build_request_requires_phone() {
        let r = row(json!({"first_name": "Ana", "primary_phone": "n/a"}));
        assert!(matches!(
            build_call_request(&r, None),
            Err(DialopsError::InvalidPhone)
        ));
        // An override can rescue a row with no stored phone
        let req = build_call_request(&r, Some("202-555-0101")).unwrap();
        assert_eq!(req.to, "2025550101");
    }

    #[test]
    fn test_build_request_payload_shape() {
        let r = row(json!({
            "encounter_id": "10299658",
            "first_name": "Ana",
            "primary_phone": "(202) 555-0175",
            "preferred_language": "Spanish",
            "extra_column": "kept",
        }));
        let req = build_call_request(&r, None).unwrap();

        assert_eq!(req.to, "2025550175");
        assert_eq!(req.lang, "sp");
        // Source columns pass through verbatim
        assert_eq!(req.vars["extra_column"], "kept");
        // Stored phone, not the normalized form, reaches the agent
        assert_eq!(req.vars["primary_phone"], "(202) 555-0175");
        // Required columns are backfilled as empty strings
        for column in REQUIRED_COLUMNS {
            assert!(req.vars.contains_key(*column), "missing {column}");
        }
        assert_eq!(req.vars["dob"], "");
    }

    #[test]
    fn test_build_request_override_phone() {
        let r = row(json!({
            "encounter_id": "7",
            "primary_phone": "(202) 555-0175",
        }));
        let req = build_call_request(&r, Some(" +1 202 555 0199 ")).unwrap();
        assert_eq!(req.to, "+12025550199");
        assert_eq!(req.vars["primary_phone"], "+1 202 555 0199");
        // Empty mobile_phone is backfilled from the override
        assert_eq!(req.vars["mobile_phone"], "+1 202 555 0199");
    }

    #[test]
    fn test_spanish_routing_hints() {
        let es = row(json!({"primary_phone": "2025550175", "preferred_language": "Español"}));
        assert!(build_call_request(&es, None).unwrap().prefers_spanish());

        // "Spanish" derives to "sp", which the routing hint still accepts
        let sp = row(json!({"primary_phone": "2025550175", "preferred_language": "Spanish"}));
        let req = build_call_request(&sp, None).unwrap();
        assert_eq!(req.lang, "sp");
        assert!(req.prefers_spanish());

        let en = row(json!({"primary_phone": "2025550175", "preferred_language": "English"}));
        assert!(!build_call_request(&en, None).unwrap().prefers_spanish());

        let unset = row(json!({"primary_phone": "2025550175"}));
        assert!(!build_call_request(&unset, None).unwrap().prefers_spanish());
    }
}
