//! Shared types — contact rows, call requests, metric ranges.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One record from the outreach table.
///
/// The hosted backend enforces no schema: any column may be present or
/// absent, so rows are an open-ended column→value map rather than a fixed
/// struct. The few columns the platform depends on (`primary_phone`,
/// `call_status`, `encounter_id`, ...) are looked up by key with an empty
/// string default.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ContactRow(pub serde_json::Map<String, Value>);

impl ContactRow {
    /// Look up a column as a trimmed string. Null/absent columns yield "".
    /// Non-string scalars are stringified; nested values are JSON-encoded.
    pub fn value(&self, key: &str) -> String {
        match self.0.get(key) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(other) => other.to_string(),
        }
    }

    /// Column names present on this row.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Human label for log lines: name, then `Encounter <id>`, then the
    /// raw phone, then a generic fallback.
    pub fn label(&self) -> String {
        let first = self.value("first_name");
        let last = self.value("last_name");
        let name = [first.as_str(), last.as_str()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        if !name.is_empty() {
            return name;
        }

        let encounter = self.value("encounter_id");
        if !encounter.is_empty() {
            return format!("Encounter {encounter}");
        }

        let phone = self.value("primary_phone");
        if !phone.is_empty() {
            return phone;
        }

        "Contact".to_string()
    }

    /// Build a row from string pairs (CSV import, tests).
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = serde_json::Map::new();
        for (k, v) in pairs {
            map.insert(k.into(), Value::String(v.into()));
        }
        Self(map)
    }
}

/// One outbound-call request, built once per dispatch attempt.
///
/// Wire format: `POST { "to": ..., "lang": ..., "vars": {...} }` to the
/// configured call endpoint (Spanish-specific or default).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallRequest {
    /// Normalized destination phone (digits, optional leading `+`).
    pub to: String,
    /// Two-letter language code derived from `preferred_language`.
    pub lang: String,
    /// Every source column, stringified, plus the required-column set
    /// defaulted to "" — the provider always sees a consistent shape.
    pub vars: BTreeMap<String, String>,
}

impl CallRequest {
    /// Whether this call should be routed to the Spanish-specific
    /// endpoint: either the derived language code is `es`, or the
    /// contact's `preferred_language` matches one of the Spanish
    /// spellings after diacritic folding ("Español" and "espanol" both
    /// count).
    pub fn prefers_spanish(&self) -> bool {
        if self.lang.trim().eq_ignore_ascii_case("es") {
            return true;
        }
        let hint = self
            .vars
            .get("preferred_language")
            .map(|s| fold_latin(s))
            .unwrap_or_default();
        matches!(hint.as_str(), "es" | "sp" | "spa" | "spanish" | "espanol")
    }
}

/// Lowercase and strip the Latin diacritics that show up in language
/// names ("Español" → "espanol"). Anything outside the table passes
/// through unchanged.
pub fn fold_latin(s: &str) -> String {
    s.trim()
        .chars()
        .flat_map(|c| {
            let folded = match c {
                'á' | 'à' | 'â' | 'ä' | 'Á' | 'À' | 'Â' | 'Ä' => 'a',
                'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => 'e',
                'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => 'i',
                'ó' | 'ò' | 'ô' | 'ö' | 'Ó' | 'Ò' | 'Ô' | 'Ö' => 'o',
                'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ù' | 'Û' | 'Ü' => 'u',
                'ñ' | 'Ñ' => 'n',
                'ç' | 'Ç' => 'c',
                other => other,
            };
            folded.to_lowercase()
        })
        .collect()
}

/// What the provider returned for a dispatched call. The response body is
/// otherwise opaque; only the call identifier is kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallOutcome {
    pub call_id: Option<String>,
}

/// Metric aggregation window understood by the provider's dashboard API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricRange {
    Last7Days,
    Last30Days,
    AllTime,
}

impl MetricRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricRange::Last7Days => "LAST_7_DAYS",
            MetricRange::Last30Days => "LAST_30_DAYS",
            MetricRange::AllTime => "ALL_TIME",
        }
    }
}

impl fmt::Display for MetricRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricRange {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LAST_7_DAYS" | "7D" => Ok(MetricRange::Last7Days),
            "LAST_30_DAYS" | "30D" => Ok(MetricRange::Last30Days),
            "ALL_TIME" | "ALL" => Ok(MetricRange::AllTime),
            other => Err(format!("Unknown metric range: {other}")),
        }
    }
}
