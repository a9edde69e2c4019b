//! Client for the hosted table backend (PostgREST-style REST).
//!
//! Every request carries both the `apikey` header and a bearer token.
//! Table names that are not plain lowercase identifiers are quoted in the
//! URL, mirroring how the backend addresses them.

use serde_json::Value;

use dialops_core::config::StoreConfig;
use dialops_core::error::{DialopsError, Result};
use dialops_core::types::ContactRow;

use crate::csv;

/// Client for one project of the hosted tabular backend.
pub struct TableStore {
    config: StoreConfig,
    client: reqwest::Client,
}

/// Quote-encode a table name for the REST path. Plain `[a-z0-9_]` names
/// pass through; anything else is wrapped in encoded double quotes.
fn encode_table_name(table: &str) -> String {
    let plain = table
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    let encoded: String = table
        .bytes()
        .flat_map(|b| {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
                vec![b as char]
            } else {
                format!("%{b:02X}").chars().collect()
            }
        })
        .collect();

    if plain {
        encoded
    } else {
        format!("%22{encoded}%22")
    }
}

impl TableStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    /// The configured outreach contacts table.
    pub fn contacts_table(&self) -> &str {
        &self.config.contacts_table
    }

    fn require_configured(&self) -> Result<String> {
        if !self.is_configured() {
            return Err(DialopsError::Store(
                "Table backend is not configured. Set store.url and DIALOPS_STORE_KEY.".into(),
            ));
        }
        Ok(self.config.resolved_api_key())
    }

    fn rest_url(&self, table: &str, query: &str) -> String {
        format!(
            "{}/rest/v1/{}{query}",
            self.config.url.trim_end_matches('/'),
            encode_table_name(table)
        )
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder, key: &str) -> reqwest::RequestBuilder {
        req.header("apikey", key)
            .header("Authorization", format!("Bearer {key}"))
    }

    /// Select every row of a table. Eligibility filtering happens in the
    /// scheduler, not here.
    pub async fn fetch_rows(&self, table: &str) -> Result<Vec<ContactRow>> {
        let key = self.require_configured()?;
        let url = self.rest_url(table, "?select=*");
        let resp = self
            .apply_auth(self.client.get(&url), &key)
            .send()
            .await
            .map_err(|e| DialopsError::Http(format!("Store request failed ({url}): {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(DialopsError::Store(format!(
                "Failed to load table \"{table}\" ({status}): {body}"
            )));
        }

        let payload: Value = resp
            .json()
            .await
            .map_err(|e| DialopsError::Store(format!("Invalid store response: {e}")))?;
        let Value::Array(items) = payload else {
            return Err(DialopsError::Store(format!(
                "Table \"{table}\" returned an unexpected payload shape."
            )));
        };

        let rows = items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(ContactRow(map)),
                _ => None,
            })
            .collect();
        Ok(rows)
    }

    /// Upsert rows into a table. Duplicate keys are merged rather than
    /// rejected, so re-importing the same CSV is safe.
    pub async fn import_rows(&self, table: &str, rows: &[ContactRow]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let key = self.require_configured()?;
        let url = self.rest_url(table, "");
        let resp = self
            .apply_auth(self.client.post(&url), &key)
            .header("Content-Type", "application/json")
            .header("Prefer", "resolution=merge-duplicates")
            .json(rows)
            .send()
            .await
            .map_err(|e| DialopsError::Http(format!("Store request failed ({url}): {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(DialopsError::Store(format!(
                "Failed to import data into \"{table}\" ({status}): {body}"
            )));
        }

        tracing::info!("📥 Imported {} row(s) into {table}", rows.len());
        Ok(rows.len())
    }

    /// Export a table as CSV. The backend renders CSV itself when asked
    /// via `Accept: text/csv`; if it answers with JSON rows instead, the
    /// CSV is produced locally.
    pub async fn export_csv(&self, table: &str) -> Result<String> {
        let key = self.require_configured()?;
        let url = self.rest_url(table, "?select=*");
        let resp = self
            .apply_auth(self.client.get(&url), &key)
            .header("Accept", "text/csv")
            .send()
            .await
            .map_err(|e| DialopsError::Http(format!("Store request failed ({url}): {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(DialopsError::Store(format!(
                "Failed to export table \"{table}\" ({status}): {body}"
            )));
        }

        let is_json = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("json"));
        let body = resp
            .text()
            .await
            .map_err(|e| DialopsError::Store(format!("Invalid store response: {e}")))?;

        if !is_json {
            return Ok(body);
        }

        let rows: Vec<ContactRow> = serde_json::from_str(&body)
            .map_err(|e| DialopsError::Store(format!("Invalid store response: {e}")))?;
        let columns = csv::collect_columns(&rows);
        Ok(csv::write_csv(&columns, &rows))
    }

    /// Delete every row of a table, returning how many were removed. The
    /// "all rows" filter matches the delete column being null or not null,
    /// which the backend requires over a bare unfiltered delete.
    pub async fn delete_all_rows(&self, table: &str) -> Result<u64> {
        let key = self.require_configured()?;
        let column = &self.config.delete_column;
        let url = self.rest_url(
            table,
            &format!("?or=({column}.is.null,{column}.not.is.null)"),
        );
        let resp = self
            .apply_auth(self.client.delete(&url), &key)
            .header("Prefer", "count=exact")
            .send()
            .await
            .map_err(|e| DialopsError::Http(format!("Store request failed ({url}): {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(DialopsError::Store(format!(
                "Failed to delete rows from \"{table}\" ({status}): {body}"
            )));
        }

        let removed = resp
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .unwrap_or(0);

        tracing::info!("🗑️ Cleared {removed} row(s) from {table}");
        Ok(removed)
    }
}

/// Total from a `Content-Range: 0-9/10` (or `*/10`) header.
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_table_name() {
        assert_eq!(encode_table_name("no_show_contacts"), "no_show_contacts");
        assert_eq!(encode_table_name("Weird Table"), "%22Weird%20Table%22");
        assert_eq!(encode_table_name("contacts2"), "contacts2");
        assert_eq!(encode_table_name("No_Show"), "%22No_Show%22");
    }

    #[test]
    fn test_parse_content_range_total() {
        assert_eq!(parse_content_range_total("0-9/10"), Some(10));
        assert_eq!(parse_content_range_total("*/42"), Some(42));
        assert_eq!(parse_content_range_total("*/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn test_unconfigured_store_is_rejected() {
        let store = TableStore::new(StoreConfig::default());
        assert!(!store.is_configured());
        assert!(store.require_configured().is_err());
    }
}
