//! Provider payload types and the lenient parsers that produce them.
//!
//! The provider's responses are treated as semi-structured JSON: the few
//! fields the dashboard needs are pulled out, everything else is ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use dialops_core::error::{DialopsError, Result};

/// One configured voice agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentInfo {
    pub agent_id: String,
    pub name: String,
}

/// Aggregated dashboard metrics for a time range.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardMetrics {
    pub total_calls: u64,
    pub average_duration_seconds: f64,
    pub success_rate: f64,
    pub calls_by_day: Vec<DailyCalls>,
    pub success_timeline: Vec<DailySuccess>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyCalls {
    pub date: String,
    pub calls: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySuccess {
    pub date: String,
    pub success: u64,
    pub fail: u64,
}

/// One row of the call-history listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSummary {
    pub conversation_id: String,
    pub agent_id: String,
    pub agent_name: String,
    pub start_time_unix_secs: i64,
    pub call_duration_secs: u64,
    pub status: String,
    pub call_successful: String,
}

/// One cursor-paginated page of call history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPage {
    pub calls: Vec<CallSummary>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

/// Transcript and outcome details for one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallDetails {
    pub conversation_id: String,
    pub status: String,
    pub summary: Option<String>,
    pub transcript: Vec<TranscriptTurn>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptTurn {
    pub role: String,
    pub message: String,
    pub time_in_call_secs: Option<f64>,
}

fn str_of(value: &Value, key: &str) -> String {
    value[key].as_str().unwrap_or_default().to_string()
}

/// The data points of the chart named `name`, or an empty slice.
fn chart_data<'a>(charts: &'a [Value], name: &str) -> &'a [Value] {
    charts
        .iter()
        .find(|c| c["name"].as_str() == Some(name))
        .and_then(|c| c["data"].as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Parse `{ totals, charts }` from the dashboard endpoint. The "Calls" and
/// "Success Rate" charts become the two timelines; a missing chart just
/// yields an empty series.
pub fn parse_dashboard(payload: &Value) -> Result<DashboardMetrics> {
    let totals = payload
        .get("totals")
        .ok_or_else(|| DialopsError::Provider("Dashboard response is missing totals".into()))?;

    let empty = Vec::new();
    let charts = payload["charts"].as_array().unwrap_or(&empty);

    let calls_by_day = chart_data(charts, "Calls")
        .iter()
        .map(|p| DailyCalls {
            date: str_of(p, "date"),
            calls: p["calls"].as_u64().unwrap_or(0),
        })
        .collect();

    let success_timeline = chart_data(charts, "Success Rate")
        .iter()
        .map(|p| DailySuccess {
            date: str_of(p, "date"),
            success: p["success"].as_u64().unwrap_or(0),
            fail: p["fail"].as_u64().unwrap_or(0),
        })
        .collect();

    Ok(DashboardMetrics {
        total_calls: totals["total_calls"].as_u64().unwrap_or(0),
        average_duration_seconds: totals["average_duration_seconds"].as_f64().unwrap_or(0.0),
        success_rate: totals["success_rate"].as_f64().unwrap_or(0.0),
        calls_by_day,
        success_timeline,
    })
}

/// Parse the agent listing. The endpoint has been seen returning both a
/// bare array and `{ "agents": [...] }`; tolerate either, drop entries
/// without an id.
pub fn parse_agents(payload: &Value) -> Vec<AgentInfo> {
    let list = if payload.is_array() {
        payload.as_array()
    } else {
        payload["agents"].as_array()
    };

    list.map(|agents| {
        agents
            .iter()
            .filter_map(|a| {
                let agent_id = a["agent_id"].as_str()?.to_string();
                Some(AgentInfo {
                    name: a["name"].as_str().unwrap_or(&agent_id).to_string(),
                    agent_id,
                })
            })
            .collect()
    })
    .unwrap_or_default()
}

/// Parse one page of `{ conversations, has_more, next_cursor }`.
pub fn parse_history_page(payload: &Value) -> HistoryPage {
    let calls = payload["conversations"]
        .as_array()
        .map(|rows| {
            rows.iter()
                .map(|c| CallSummary {
                    conversation_id: str_of(c, "conversation_id"),
                    agent_id: str_of(c, "agent_id"),
                    agent_name: str_of(c, "agent_name"),
                    start_time_unix_secs: c["start_time_unix_secs"].as_i64().unwrap_or(0),
                    call_duration_secs: c["call_duration_secs"].as_u64().unwrap_or(0),
                    status: str_of(c, "status"),
                    call_successful: str_of(c, "call_successful"),
                })
                .collect()
        })
        .unwrap_or_default();

    HistoryPage {
        calls,
        has_more: payload["has_more"].as_bool().unwrap_or(false),
        next_cursor: payload["next_cursor"].as_str().map(String::from),
    }
}

/// Parse conversation details: status, transcript turns, and the analysis
/// summary when present.
pub fn parse_call_details(conversation_id: &str, payload: &Value) -> CallDetails {
    let transcript = payload["transcript"]
        .as_array()
        .map(|turns| {
            turns
                .iter()
                .map(|t| TranscriptTurn {
                    role: str_of(t, "role"),
                    message: str_of(t, "message"),
                    time_in_call_secs: t["time_in_call_secs"].as_f64(),
                })
                .collect()
        })
        .unwrap_or_default();

    CallDetails {
        conversation_id: conversation_id.to_string(),
        status: str_of(payload, "status"),
        summary: payload["analysis"]["transcript_summary"]
            .as_str()
            .map(String::from),
        transcript,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_dashboard() {
        let payload = json!({
            "totals": {
                "total_calls": 132,
                "average_duration_seconds": 94.5,
                "success_rate": 0.82,
            },
            "charts": [
                {
                    "name": "Calls",
                    "type": "line",
                    "data": [
                        {"date": "2026-08-25", "calls": 40},
                        {"date": "2026-08-26", "calls": 92},
                    ]
                },
                {
                    "name": "Success Rate",
                    "type": "area",
                    "data": [{"date": "2026-08-25", "success": 30, "fail": 10}]
                }
            ]
        });

        let metrics = parse_dashboard(&payload).unwrap();
        assert_eq!(metrics.total_calls, 132);
        assert_eq!(metrics.calls_by_day.len(), 2);
        assert_eq!(metrics.calls_by_day[1].calls, 92);
        assert_eq!(metrics.success_timeline[0].fail, 10);
    }

    #[test]
    fn test_parse_dashboard_missing_charts() {
        let payload = json!({"totals": {"total_calls": 3}});
        let metrics = parse_dashboard(&payload).unwrap();
        assert_eq!(metrics.total_calls, 3);
        assert!(metrics.calls_by_day.is_empty());
        assert!(metrics.success_timeline.is_empty());
    }

    #[test]
    fn test_parse_dashboard_without_totals() {
        assert!(parse_dashboard(&json!({"charts": []})).is_err());
    }

    #[test]
    fn test_parse_agents_both_shapes() {
        let bare = json!([{"agent_id": "a1", "name": "Front desk"}]);
        let wrapped = json!({"agents": [{"agent_id": "a1", "name": "Front desk"}, {"name": "no id"}]});

        assert_eq!(parse_agents(&bare).len(), 1);
        let agents = parse_agents(&wrapped);
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].agent_id, "a1");
        assert!(parse_agents(&json!({"other": true})).is_empty());
    }

    #[test]
    fn test_parse_history_page() {
        let payload = json!({
            "conversations": [{
                "conversation_id": "conv_1",
                "agent_id": "a1",
                "agent_name": "Front desk",
                "start_time_unix_secs": 1756400000,
                "call_duration_secs": 61,
                "status": "done",
                "call_successful": "success",
            }],
            "has_more": true,
            "next_cursor": "abc",
        });

        let page = parse_history_page(&payload);
        assert_eq!(page.calls.len(), 1);
        assert_eq!(page.calls[0].conversation_id, "conv_1");
        assert!(page.has_more);
        assert_eq!(page.next_cursor.as_deref(), Some("abc"));
    }

    #[test]
    fn test_parse_call_details() {
        let payload = json!({
            "status": "done",
            "transcript": [
                {"role": "agent", "message": "Hello", "time_in_call_secs": 0.0},
                {"role": "user", "message": "Hi", "time_in_call_secs": 2.5},
            ],
            "analysis": {"transcript_summary": "Greeting exchange."},
        });

        let details = parse_call_details("conv_1", &payload);
        assert_eq!(details.conversation_id, "conv_1");
        assert_eq!(details.transcript.len(), 2);
        assert_eq!(details.transcript[1].role, "user");
        assert_eq!(details.summary.as_deref(), Some("Greeting exchange."));
    }
}
