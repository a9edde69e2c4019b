//! HTTP client for the conversational-AI provider.
//!
//! Auth is a single `xi-api-key` header. Agents and dashboard metrics are
//! cached behind short TTLs owned by this client; deleting a conversation
//! invalidates the metrics cache so the aggregates are refetched.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use dialops_core::config::ProviderConfig;
use dialops_core::error::{DialopsError, Result};
use dialops_core::traits::Dialer;
use dialops_core::types::{CallOutcome, CallRequest, MetricRange};

use crate::cache::TtlCache;
use crate::types::{
    AgentInfo, CallDetails, DashboardMetrics, HistoryPage, parse_agents, parse_call_details,
    parse_dashboard, parse_history_page,
};

const AGENTS_CACHE_TTL: Duration = Duration::from_secs(30);
const METRICS_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
const HISTORY_PAGE_SIZE: u32 = 30;

/// Client for the voice provider's REST surface.
pub struct VoiceClient {
    config: ProviderConfig,
    client: reqwest::Client,
    agents_cache: TtlCache<String, Vec<AgentInfo>>,
    metrics_cache: TtlCache<String, DashboardMetrics>,
}

impl VoiceClient {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            agents_cache: TtlCache::new(AGENTS_CACHE_TTL),
            metrics_cache: TtlCache::new(METRICS_CACHE_TTL),
        }
    }

    fn api_key(&self) -> String {
        self.config.resolved_api_key()
    }

    fn require_api_key(&self) -> Result<String> {
        let key = self.api_key();
        if key.trim().is_empty() {
            return Err(DialopsError::Provider(
                "Missing provider API key. Set DIALOPS_PROVIDER_API_KEY or provider.api_key."
                    .into(),
            ));
        }
        Ok(key)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let key = self.require_api_key()?;
        let resp = self
            .client
            .get(url)
            .header("xi-api-key", key)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await
            .map_err(|e| DialopsError::Http(format!("Provider request failed ({url}): {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(DialopsError::Provider(format!(
                "Provider API error {status}: {body}"
            )));
        }

        resp.json()
            .await
            .map_err(|e| DialopsError::Http(format!("Invalid provider response: {e}")))
    }

    /// List configured agents. A missing API key or a listing failure
    /// yields an empty list rather than an error, so the rest of the
    /// dashboard stays usable.
    pub async fn list_agents(&self) -> Result<Vec<AgentInfo>> {
        if self.api_key().trim().is_empty() {
            return Ok(Vec::new());
        }

        let cache_key = "agents".to_string();
        if let Some(cached) = self.agents_cache.get(&cache_key) {
            return Ok(cached);
        }

        let url = self.url(&self.config.agents_path);
        let agents = match self.get_json(&url, &[]).await {
            Ok(payload) => parse_agents(&payload),
            Err(e) => {
                tracing::warn!("⚠️ Failed to load agents: {e}");
                Vec::new()
            }
        };

        self.agents_cache.insert(cache_key, agents.clone());
        Ok(agents)
    }

    /// Dashboard metrics for a range, optionally scoped to one agent.
    pub async fn metrics(
        &self,
        range: MetricRange,
        agent_id: Option<&str>,
    ) -> Result<DashboardMetrics> {
        let agent = agent_id.filter(|a| !a.is_empty() && *a != "all");
        let cache_key = format!("{range}|{}", agent.unwrap_or("all"));
        if let Some(cached) = self.metrics_cache.get(&cache_key) {
            return Ok(cached);
        }

        let mut query = vec![("range", range.to_string())];
        if let Some(agent) = agent {
            query.push(("agent_id", agent.to_string()));
        }

        let url = self.url(&self.config.dashboard_path);
        let payload = self.get_json(&url, &query).await?;
        let metrics = parse_dashboard(&payload)?;
        self.metrics_cache.insert(cache_key, metrics.clone());
        Ok(metrics)
    }

    /// One cursor-paginated page of call history.
    pub async fn history_page(
        &self,
        agent_id: Option<&str>,
        cursor: Option<&str>,
    ) -> Result<HistoryPage> {
        let mut query = vec![("page_size", HISTORY_PAGE_SIZE.to_string())];
        if let Some(agent) = agent_id.filter(|a| !a.is_empty() && *a != "all") {
            query.push(("agent_id", agent.to_string()));
        }
        if let Some(cursor) = cursor.filter(|c| !c.is_empty()) {
            query.push(("cursor", cursor.to_string()));
        }

        let url = self.url(&self.config.conversations_path);
        let payload = self.get_json(&url, &query).await?;
        Ok(parse_history_page(&payload))
    }

    /// Transcript and outcome details for one conversation.
    pub async fn conversation_details(&self, conversation_id: &str) -> Result<CallDetails> {
        let url = self.url(&format!(
            "{}/{conversation_id}",
            self.config.conversations_path
        ));
        let payload = self.get_json(&url, &[]).await?;
        Ok(parse_call_details(conversation_id, &payload))
    }

    /// Raw audio bytes for one conversation.
    pub async fn conversation_audio(&self, conversation_id: &str) -> Result<bytes::Bytes> {
        let key = self.require_api_key()?;
        let url = self.url(&format!(
            "{}/{conversation_id}/audio",
            self.config.conversations_path
        ));
        let resp = self
            .client
            .get(&url)
            .header("xi-api-key", key)
            .send()
            .await
            .map_err(|e| DialopsError::Http(format!("Provider request failed ({url}): {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(DialopsError::Provider(format!(
                "Provider API error {status}: {body}"
            )));
        }

        resp.bytes()
            .await
            .map_err(|e| DialopsError::Http(format!("Failed to read audio body: {e}")))
    }

    /// Delete one conversation. Metrics aggregates include it, so the
    /// metrics cache is invalidated along with it.
    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<()> {
        let key = self.require_api_key()?;
        let url = self.url(&format!(
            "{}/{conversation_id}",
            self.config.conversations_path
        ));
        let resp = self
            .client
            .delete(&url)
            .header("xi-api-key", key)
            .send()
            .await
            .map_err(|e| DialopsError::Http(format!("Provider request failed ({url}): {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(DialopsError::Provider(format!(
                "Failed to delete conversation {conversation_id} ({status}): {body}"
            )));
        }

        self.metrics_cache.invalidate_all();
        tracing::info!("🗑️ Conversation {conversation_id} deleted");
        Ok(())
    }

    /// Pick the call-initiation endpoint for a request. Spanish-hinted
    /// calls go to the Spanish endpoint when one is configured; everything
    /// else uses the default.
    fn call_endpoint(&self, request: &CallRequest) -> Result<&str> {
        let default_url = self.config.call_url.trim();
        let spanish_url = self.config.call_url_es.trim();

        if request.prefers_spanish() && !spanish_url.is_empty() {
            return Ok(spanish_url);
        }
        if default_url.is_empty() {
            return Err(DialopsError::Config(
                "No call endpoint configured (provider.call_url).".into(),
            ));
        }
        Ok(default_url)
    }
}

#[async_trait]
impl Dialer for VoiceClient {
    /// Submit one outbound call: `POST { to, lang, vars }`. A non-2xx
    /// answer becomes `DispatchFailed` for the batch loop to log; only the
    /// optional call id is read from a successful response.
    async fn place_call(&self, request: &CallRequest) -> Result<CallOutcome> {
        let url = self.call_endpoint(request)?.to_string();

        let resp = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| DialopsError::Http(format!("Call dispatch failed ({url}): {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DialopsError::DispatchFailed {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = resp.json().await.unwrap_or(Value::Null);
        let call_id = match &payload["call_id"] {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        };

        tracing::debug!("📤 Call dispatched to {} via {url}", request.to);
        Ok(CallOutcome { call_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn client(call_url: &str, call_url_es: &str) -> VoiceClient {
        VoiceClient::new(ProviderConfig {
            call_url: call_url.into(),
            call_url_es: call_url_es.into(),
            ..ProviderConfig::default()
        })
    }

    fn request(lang: &str, preferred: &str) -> CallRequest {
        let mut vars = BTreeMap::new();
        if !preferred.is_empty() {
            vars.insert("preferred_language".to_string(), preferred.to_string());
        }
        CallRequest {
            to: "2025550100".into(),
            lang: lang.into(),
            vars,
        }
    }

    #[test]
    fn test_spanish_routing() {
        let c = client("https://calls.example.com/start", "https://calls.example.com/es");

        assert_eq!(
            c.call_endpoint(&request("es", "")).unwrap(),
            "https://calls.example.com/es"
        );
        assert_eq!(
            c.call_endpoint(&request("en", "Español")).unwrap(),
            "https://calls.example.com/es"
        );
        assert_eq!(
            c.call_endpoint(&request("en", "English")).unwrap(),
            "https://calls.example.com/start"
        );
    }

    #[test]
    fn test_spanish_falls_back_to_default_endpoint() {
        let c = client("https://calls.example.com/start", "");
        assert_eq!(
            c.call_endpoint(&request("es", "")).unwrap(),
            "https://calls.example.com/start"
        );
    }

    #[test]
    fn test_missing_call_url_is_config_error() {
        let c = client("", "");
        assert!(matches!(
            c.call_endpoint(&request("en", "")),
            Err(DialopsError::Config(_))
        ));
    }
}
