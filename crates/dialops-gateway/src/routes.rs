//! API route handlers for the gateway.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use dialops_core::error::DialopsError;
use dialops_core::types::MetricRange;
use dialops_scheduler::dispatch::dispatch_contact;

use super::server::AppState;

fn fail(err: &DialopsError) -> Json<serde_json::Value> {
    Json(json!({"ok": false, "error": err.to_string()}))
}

/// Health check endpoint.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "dialops-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// System information endpoint.
pub async fn system_info(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let uptime = state.start_time.elapsed();
    let scheduler = state.scheduler.lock().await;
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "platform": format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
        "uptime_secs": uptime.as_secs(),
        "store_configured": state.store.is_configured(),
        "contacts_table": state.store.contacts_table(),
        "scheduler": {
            "state": scheduler.state(),
            "pending": scheduler.pending(),
        },
        "gateway": {
            "host": state.config.gateway.host,
            "port": state.config.gateway.port,
            "require_pairing": state.config.gateway.require_pairing,
        }
    }))
}

#[derive(Deserialize)]
pub struct MetricsParams {
    range: Option<String>,
    agent_id: Option<String>,
}

/// Dashboard metrics for a range (`LAST_7_DAYS` default), optionally
/// scoped to one agent.
pub async fn get_metrics(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MetricsParams>,
) -> Json<serde_json::Value> {
    let range = match params.range.as_deref() {
        None | Some("") => MetricRange::Last7Days,
        Some(raw) => match raw.parse() {
            Ok(range) => range,
            Err(e) => return Json(json!({"ok": false, "error": e})),
        },
    };

    match state.provider.metrics(range, params.agent_id.as_deref()).await {
        Ok(metrics) => Json(json!({"ok": true, "range": range.as_str(), "metrics": metrics})),
        Err(e) => fail(&e),
    }
}

/// List the provider's configured voice agents.
pub async fn list_agents(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    match state.provider.list_agents().await {
        Ok(agents) => Json(json!({"ok": true, "agents": agents})),
        Err(e) => fail(&e),
    }
}

#[derive(Deserialize)]
pub struct HistoryParams {
    agent_id: Option<String>,
    cursor: Option<String>,
}

/// One cursor-paginated page of call history.
pub async fn call_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> Json<serde_json::Value> {
    match state
        .provider
        .history_page(params.agent_id.as_deref(), params.cursor.as_deref())
        .await
    {
        Ok(page) => Json(json!({
            "ok": true,
            "calls": page.calls,
            "has_more": page.has_more,
            "next_cursor": page.next_cursor,
        })),
        Err(e) => fail(&e),
    }
}

/// Transcript and outcome details for one conversation.
pub async fn call_details(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<serde_json::Value> {
    match state.provider.conversation_details(&id).await {
        Ok(details) => Json(json!({"ok": true, "call": details})),
        Err(e) => fail(&e),
    }
}

/// Conversation audio, streamed back as-is.
pub async fn call_audio(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.provider.conversation_audio(&id).await {
        Ok(audio) => (
            [(axum::http::header::CONTENT_TYPE, "audio/mpeg")],
            audio,
        )
            .into_response(),
        Err(e) => fail(&e).into_response(),
    }
}

/// Delete one conversation (also invalidates cached metrics).
pub async fn delete_call(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<serde_json::Value> {
    match state.provider.delete_conversation(&id).await {
        Ok(()) => Json(json!({"ok": true})),
        Err(e) => fail(&e),
    }
}

/// All rows of the contacts table.
pub async fn list_contacts(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let table = state.store.contacts_table();
    match state.store.fetch_rows(table).await {
        Ok(rows) => Json(json!({"ok": true, "count": rows.len(), "rows": rows})),
        Err(e) => fail(&e),
    }
}

/// Import a CSV body into the contacts table (merge on duplicates).
pub async fn import_contacts(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Json<serde_json::Value> {
    let rows = dialops_store::parse_csv(&body);
    if rows.is_empty() {
        return Json(json!({
            "ok": false,
            "error": "The provided CSV does not contain any rows.",
        }));
    }

    let table = state.store.contacts_table();
    match state.store.import_rows(table, &rows).await {
        Ok(count) => Json(json!({"ok": true, "imported": count})),
        Err(e) => fail(&e),
    }
}

/// Export the contacts table as CSV.
pub async fn export_contacts(State(state): State<Arc<AppState>>) -> Response {
    let table = state.store.contacts_table();
    match state.store.export_csv(table).await {
        Ok(csv) => ([(axum::http::header::CONTENT_TYPE, "text/csv")], csv).into_response(),
        Err(e) => fail(&e).into_response(),
    }
}

/// Clear the contacts table, recording the outcome in the execution log.
pub async fn clear_contacts(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let table = state.store.contacts_table().to_string();
    match state.store.delete_all_rows(&table).await {
        Ok(removed) => {
            if removed > 0 {
                state.scheduler.lock().await.log.append(format!(
                    "Contacts table \"{table}\" cleared ({removed} record(s) removed)."
                ));
            }
            Json(json!({"ok": true, "removed": removed}))
        }
        Err(e) => fail(&e),
    }
}

#[derive(Deserialize)]
pub struct ManualCallParams {
    encounter_id: String,
    /// Optional phone override — dial this number instead of the stored one.
    phone: Option<String>,
}

/// Manual test call: look up a contact by encounter id and dispatch one
/// call immediately, outside any scheduled run.
pub async fn manual_call(
    State(state): State<Arc<AppState>>,
    Json(params): Json<ManualCallParams>,
) -> Json<serde_json::Value> {
    let needle = params.encounter_id.trim().to_lowercase();
    if needle.is_empty() {
        return Json(json!({
            "ok": false,
            "error": "Provide the encounter ID you want to call.",
        }));
    }

    let table = state.store.contacts_table();
    let rows = match state.store.fetch_rows(table).await {
        Ok(rows) => rows,
        Err(e) => return fail(&e),
    };
    let Some(row) = rows
        .iter()
        .find(|row| row.value("encounter_id").to_lowercase() == needle)
    else {
        return fail(&DialopsError::NotFound(format!(
            "No contact matches encounter ID \"{}\"",
            params.encounter_id.trim()
        )));
    };

    let label = row.label();
    match dispatch_contact(state.provider.as_ref(), row, params.phone.as_deref()).await {
        Ok(outcome) => {
            let suffix = outcome
                .call_id
                .as_ref()
                .map(|id| format!(" (ID: {id})"))
                .unwrap_or_default();
            state
                .scheduler
                .lock()
                .await
                .log
                .append(format!("Manual call queued for {label}{suffix}."));
            Json(json!({"ok": true, "contact": label, "call_id": outcome.call_id}))
        }
        Err(e) => {
            state
                .scheduler
                .lock()
                .await
                .log
                .append(format!("Manual call for {label} failed: {e}"));
            fail(&e)
        }
    }
}

#[derive(Deserialize)]
pub struct StartParams {
    batch_size: Option<f64>,
    interval_minutes: Option<f64>,
}

/// Start a scheduled run over the current contacts table.
pub async fn scheduler_start(
    State(state): State<Arc<AppState>>,
    Json(params): Json<StartParams>,
) -> Json<serde_json::Value> {
    let batch_size = params
        .batch_size
        .unwrap_or(f64::from(state.config.scheduler.batch_size));
    let interval_minutes = params
        .interval_minutes
        .unwrap_or(f64::from(state.config.scheduler.interval_minutes));

    let table = state.store.contacts_table();
    let contacts = match state.store.fetch_rows(table).await {
        Ok(rows) => rows,
        Err(e) => return fail(&e),
    };

    match dialops_scheduler::start(&state.scheduler, contacts, batch_size, interval_minutes).await {
        Ok(summary) => Json(json!({
            "ok": true,
            "queued": summary.queued,
            "skipped_missing_phone": summary.skipped_missing_phone,
            "skipped_already_called": summary.skipped_already_called,
        })),
        Err(e) => fail(&e),
    }
}

/// Pause the running schedule.
pub async fn scheduler_pause(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let paused = dialops_scheduler::pause(&state.scheduler).await;
    let status = state.scheduler.lock().await.status(Some(0));
    Json(json!({"ok": true, "paused": paused, "state": status.state}))
}

/// Resume a paused schedule (next batch dispatches immediately).
pub async fn scheduler_resume(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    match dialops_scheduler::resume(&state.scheduler).await {
        Ok(new_state) => Json(json!({"ok": true, "state": new_state})),
        Err(e) => fail(&e),
    }
}

#[derive(Deserialize)]
pub struct StatusParams {
    log_limit: Option<usize>,
}

/// Scheduler status surface: state, pending count, newest-first log.
pub async fn scheduler_status(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatusParams>,
) -> Json<serde_json::Value> {
    let status = state.scheduler.lock().await.status(params.log_limit);
    Json(json!({"ok": true, "status": status}))
}

/// Clear the execution log.
pub async fn scheduler_clear_logs(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.scheduler.lock().await.log.clear();
    Json(json!({"ok": true}))
}
