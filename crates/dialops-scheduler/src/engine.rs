//! Batch scheduler — the timer-driven loop that drains the outreach queue.
//!
//! A run moves through `idle → running → (paused ↔ running) → idle`. Each
//! cycle takes one batch off the queue, dispatches every contact in it
//! concurrently, waits for all of them to settle, logs one line per
//! contact, then either finishes (queue empty) or arms a single-shot timer
//! for the next batch.
//!
//! The engine lives behind `Arc<Mutex<...>>` and is only ever mutated
//! between awaits, so batches are strictly sequential. Timers carry the
//! run's generation number: a timer that outlives its run (stop, restart)
//! finds a different generation and does nothing.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, join_all};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use dialops_core::config::SchedulerConfig;
use dialops_core::error::{DialopsError, Result};
use dialops_core::traits::Dialer;
use dialops_core::types::ContactRow;

use crate::dispatch::{dispatch_contact, has_dialable_phone};
use crate::log::{ExecutionLog, LogEntry};
use crate::queue::OutreachQueue;

/// Scheduler lifecycle state. A completed run ends back at `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Idle,
    Running,
    Paused,
}

/// What `start` did with the contact set it was given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSummary {
    pub queued: usize,
    pub skipped_missing_phone: usize,
    pub skipped_already_called: usize,
}

/// Read projection for the operator surface. No logic of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub pending: usize,
    pub batch_size: u32,
    pub interval_minutes: u32,
    pub log: Vec<LogEntry>,
}

/// The batch scheduler engine. Share it as [`SharedScheduler`] and drive
/// it through the free functions [`start`], [`pause`] and [`resume`].
pub struct BatchScheduler {
    dialer: Arc<dyn Dialer>,
    state: SchedulerState,
    queue: OutreachQueue,
    pub log: ExecutionLog,
    batch_size: u32,
    interval_minutes: u32,
    /// Bumped whenever a run is replaced; stale timers check this and
    /// no-op instead of mutating the new run's queue.
    generation: u64,
    timer: Option<tokio::task::JoinHandle<()>>,
}

pub type SharedScheduler = Arc<Mutex<BatchScheduler>>;

impl BatchScheduler {
    pub fn new(dialer: Arc<dyn Dialer>, defaults: &SchedulerConfig) -> Self {
        Self {
            dialer,
            state: SchedulerState::Idle,
            queue: OutreachQueue::new(),
            log: ExecutionLog::new(),
            batch_size: defaults.batch_size.max(1),
            interval_minutes: defaults.interval_minutes.max(1),
            generation: 0,
            timer: None,
        }
    }

    pub fn shared(dialer: Arc<dyn Dialer>, defaults: &SchedulerConfig) -> SharedScheduler {
        Arc::new(Mutex::new(Self::new(dialer, defaults)))
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Snapshot for the status surface, with the newest `log_limit` lines.
    pub fn status(&self, log_limit: Option<usize>) -> SchedulerStatus {
        SchedulerStatus {
            state: self.state,
            pending: self.queue.len(),
            batch_size: self.batch_size,
            interval_minutes: self.interval_minutes,
            log: self.log.entries(log_limit).to_vec(),
        }
    }

    /// Validate operator input and bring up a fresh run. Filters the
    /// contact set down to eligible rows (dialable `primary_phone`, empty
    /// `call_status`) and records the skip breakdown in the log.
    ///
    /// On success the state is `Running` and the caller is expected to
    /// fire the first batch immediately.
    fn begin_run(
        &mut self,
        contacts: Vec<ContactRow>,
        batch_size: f64,
        interval_minutes: f64,
    ) -> Result<StartSummary> {
        validate_schedule(batch_size, interval_minutes)?;

        let mut skipped_missing_phone = 0usize;
        let mut skipped_already_called = 0usize;
        let eligible: Vec<ContactRow> = contacts
            .into_iter()
            .filter(|row| {
                if !has_dialable_phone(row) {
                    skipped_missing_phone += 1;
                    return false;
                }
                if !row.value("call_status").is_empty() {
                    skipped_already_called += 1;
                    return false;
                }
                true
            })
            .collect();

        if eligible.is_empty() {
            if skipped_already_called > 0 {
                self.log.append(format!(
                    "Scheduler skipped queue creation: {skipped_already_called} contact(s) \
                     already have a call status."
                ));
            }
            if skipped_missing_phone > 0 {
                self.log.append(format!(
                    "Scheduler skipped queue creation: {skipped_missing_phone} contact(s) \
                     are missing a valid phone number."
                ));
            }
            return Err(DialopsError::NoEligibleContacts {
                missing_phone: skipped_missing_phone,
                already_called: skipped_already_called,
            });
        }

        if skipped_already_called > 0 {
            self.log.append(format!(
                "{skipped_already_called} contact(s) skipped because they already have a call status."
            ));
        }
        if skipped_missing_phone > 0 {
            self.log.append(format!(
                "{skipped_missing_phone} contact(s) skipped due to missing phone numbers."
            ));
        }

        self.cancel_timer();
        self.generation += 1;
        self.batch_size = coerce(batch_size);
        self.interval_minutes = coerce(interval_minutes);
        let queued = eligible.len();
        self.queue.initialize(eligible);
        self.state = SchedulerState::Running;
        self.log.append(format!(
            "Scheduler started with {queued} contact(s). Batch size: {}, interval: {} minute(s).",
            self.batch_size, self.interval_minutes
        ));

        Ok(StartSummary {
            queued,
            skipped_missing_phone,
            skipped_already_called,
        })
    }

    /// Pause a running schedule. Cancels only the pending inter-batch
    /// timer; an in-flight batch settles and logs as usual, the remainder
    /// stays queued untouched.
    pub fn pause(&mut self) -> bool {
        if self.state != SchedulerState::Running {
            return false;
        }
        self.state = SchedulerState::Paused;
        self.cancel_timer();
        self.log.append("Schedule paused by the operator.");
        true
    }

    /// Teardown: cancel the pending timer and invalidate the run so a
    /// late-firing timer cannot advance a dead schedule. No state
    /// transition is recorded.
    pub fn shutdown(&mut self) {
        self.generation += 1;
        self.cancel_timer();
    }

    fn finish_run(&mut self, message: &str) {
        self.state = SchedulerState::Idle;
        self.queue.clear();
        self.cancel_timer();
        self.log.append(message);
    }

    fn cancel_timer(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }
}

/// Reject non-finite, zero, or negative batch sizes and intervals.
fn validate_schedule(batch_size: f64, interval_minutes: f64) -> Result<()> {
    if !batch_size.is_finite() || !interval_minutes.is_finite() || batch_size <= 0.0 || interval_minutes <= 0.0 {
        return Err(DialopsError::InvalidSchedule(
            "Calls per batch and minutes between batches must be greater than zero.".into(),
        ));
    }
    Ok(())
}

/// Round to the nearest integer, floored at 1.
fn coerce(value: f64) -> u32 {
    (value.round() as u32).max(1)
}

/// Start a run: validate, filter, queue, and dispatch the first batch
/// immediately. On rejection (`InvalidSchedule`, `NoEligibleContacts`)
/// the scheduler state is unchanged.
pub async fn start(
    shared: &SharedScheduler,
    contacts: Vec<ContactRow>,
    batch_size: f64,
    interval_minutes: f64,
) -> Result<StartSummary> {
    let (generation, summary) = {
        let mut s = shared.lock().await;
        let summary = s.begin_run(contacts, batch_size, interval_minutes)?;
        (s.generation, summary)
    };
    tokio::spawn(run_batch(shared.clone(), generation));
    Ok(summary)
}

/// Pause a running schedule. No-op in any other state.
pub async fn pause(shared: &SharedScheduler) -> bool {
    shared.lock().await.pause()
}

/// Resume a paused schedule: the next batch dispatches immediately, with
/// no inter-batch wait. Resuming with a drained queue falls back to idle.
pub async fn resume(shared: &SharedScheduler) -> Result<SchedulerState> {
    let generation = {
        let mut s = shared.lock().await;
        if s.state == SchedulerState::Running {
            return Ok(SchedulerState::Running);
        }
        validate_schedule(s.batch_size as f64, s.interval_minutes as f64)?;
        if s.queue.is_empty() {
            s.state = SchedulerState::Idle;
            s.log.append("No pending contacts remain to resume.");
            return Ok(SchedulerState::Idle);
        }
        s.cancel_timer();
        s.state = SchedulerState::Running;
        s.log.append("Schedule resumed.");
        s.generation
    };
    tokio::spawn(run_batch(shared.clone(), generation));
    Ok(SchedulerState::Running)
}

/// One scheduler cycle. Boxed because the inter-batch timer re-invokes it.
fn run_batch(shared: SharedScheduler, generation: u64) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        let (batch, dialer) = {
            let mut s = shared.lock().await;
            if s.generation != generation || s.state != SchedulerState::Running {
                return;
            }
            if s.queue.is_empty() {
                s.finish_run("No pending contacts left for the scheduler.");
                return;
            }
            let n = s.batch_size as usize;
            (s.queue.take_batch(n), Arc::clone(&s.dialer))
        };

        // Fire the whole batch, then wait for every attempt to settle.
        // Results come back in batch insertion order.
        let attempts = batch
            .iter()
            .map(|row| dispatch_contact(dialer.as_ref(), row, None));
        let results = join_all(attempts).await;

        let mut s = shared.lock().await;
        if s.generation != generation {
            // The run was replaced while this batch was in flight.
            return;
        }

        for (row, result) in batch.iter().zip(&results) {
            let label = row.label();
            match result {
                Ok(outcome) => match &outcome.call_id {
                    Some(id) => s.log.append(format!("Call queued for {label} (ID: {id}).")),
                    None => s.log.append(format!("Call queued for {label}.")),
                },
                Err(err) => s
                    .log
                    .append(format!("Failed to queue call for {label}: {err}")),
            }
        }

        if s.queue.is_empty() {
            s.finish_run("Scheduler completed all pending contacts.");
            return;
        }
        if s.state != SchedulerState::Running {
            // Paused mid-batch: remainder stays queued, no timer armed.
            return;
        }

        s.cancel_timer();
        let delay = Duration::from_secs(u64::from(s.interval_minutes) * 60);
        let next = shared.clone();
        s.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            run_batch(next, generation).await;
        }));
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dialops_core::types::{CallOutcome, CallRequest};

    struct MockDialer {
        calls: Mutex<Vec<CallRequest>>,
        fail_numbers: Vec<String>,
    }

    impl MockDialer {
        fn shared() -> Arc<Self> {
            Self::failing(&[])
        }

        fn failing(numbers: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                fail_numbers: numbers.iter().map(|n| n.to_string()).collect(),
            })
        }

        async fn count(&self) -> usize {
            self.calls.lock().await.len()
        }
    }

    #[async_trait]
    impl Dialer for MockDialer {
        async fn place_call(&self, request: &CallRequest) -> Result<CallOutcome> {
            self.calls.lock().await.push(request.clone());
            if self.fail_numbers.contains(&request.to) {
                return Err(DialopsError::DispatchFailed {
                    status: 502,
                    body: "provider unavailable".into(),
                });
            }
            Ok(CallOutcome {
                call_id: Some(format!("call_{}", request.to)),
            })
        }
    }

    fn contact(id: &str, phone: &str) -> ContactRow {
        ContactRow::from_pairs([("encounter_id", id), ("primary_phone", phone)])
    }

    fn scheduler(dialer: Arc<MockDialer>) -> SharedScheduler {
        BatchScheduler::shared(dialer, &SchedulerConfig::default())
    }

    /// Let spawned batch tasks make progress without skipping past the
    /// inter-batch timer (each step advances paused time by 1ms only).
    async fn settle() {
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_rejects_invalid_config() {
        let dialer = MockDialer::shared();
        let shared = scheduler(dialer.clone());

        for (batch, interval) in [(0.0, 5.0), (2.0, 0.0), (-1.0, 5.0), (f64::NAN, 5.0)] {
            let err = start(&shared, vec![contact("1", "2025550101")], batch, interval)
                .await
                .unwrap_err();
            assert!(matches!(err, DialopsError::InvalidSchedule(_)));
        }

        let s = shared.lock().await;
        assert_eq!(s.state(), SchedulerState::Idle);
        assert_eq!(s.pending(), 0);
        assert_eq!(dialer.count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_filters_ineligible_contacts() {
        let dialer = MockDialer::shared();
        let shared = scheduler(dialer.clone());

        let mut attempted = contact("2", "2025550102");
        attempted.0.insert("call_status".into(), "completed".into());
        let contacts = vec![
            contact("1", "2025550101"),
            attempted,
            contact("3", "no digits"),
        ];

        let summary = start(&shared, contacts, 10.0, 1.0).await.unwrap();
        assert_eq!(summary.queued, 1);
        assert_eq!(summary.skipped_already_called, 1);
        assert_eq!(summary.skipped_missing_phone, 1);

        settle().await;
        assert_eq!(dialer.count().await, 1);
        assert_eq!(
            dialer.calls.lock().await[0].vars["encounter_id"],
            "1".to_string()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_with_no_eligible_contacts_stays_idle() {
        let dialer = MockDialer::shared();
        let shared = scheduler(dialer.clone());

        let mut attempted = contact("1", "2025550101");
        attempted.0.insert("call_status".into(), "called".into());

        let err = start(&shared, vec![attempted, contact("2", "---")], 5.0, 5.0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DialopsError::NoEligibleContacts {
                missing_phone: 1,
                already_called: 1
            }
        ));

        let s = shared.lock().await;
        assert_eq!(s.state(), SchedulerState::Idle);
        assert_eq!(s.pending(), 0);
        // Both skip reasons recorded for the operator
        assert_eq!(s.log.len(), 2);
        assert_eq!(dialer.count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_completes_in_ceil_batches() {
        let dialer = MockDialer::shared();
        let shared = scheduler(dialer.clone());

        let contacts: Vec<ContactRow> = (0..5)
            .map(|i| contact(&i.to_string(), &format!("202555010{i}")))
            .collect();
        start(&shared, contacts, 2.0, 1.0).await.unwrap();

        settle().await;
        assert_eq!(dialer.count().await, 2);
        assert_eq!(shared.lock().await.pending(), 3);

        // ceil(5/2) = 3 batches, one interval between each
        tokio::time::sleep(Duration::from_secs(61)).await;
        settle().await;
        assert_eq!(dialer.count().await, 4);

        tokio::time::sleep(Duration::from_secs(61)).await;
        settle().await;
        assert_eq!(dialer.count().await, 5);

        let s = shared.lock().await;
        assert_eq!(s.state(), SchedulerState::Idle);
        assert_eq!(s.pending(), 0);
        let newest = &s.log.entries(Some(1))[0];
        assert!(newest.message.contains("completed all pending contacts"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_blocks_dispatch_until_resume() {
        let dialer = MockDialer::shared();
        let shared = scheduler(dialer.clone());

        let contacts: Vec<ContactRow> = (0..4)
            .map(|i| contact(&i.to_string(), &format!("202555020{i}")))
            .collect();
        start(&shared, contacts, 2.0, 1.0).await.unwrap();
        settle().await;
        assert_eq!(dialer.count().await, 2);

        assert!(pause(&shared).await);
        assert_eq!(shared.lock().await.state(), SchedulerState::Paused);

        // Hours pass; nothing dispatches while paused.
        tokio::time::sleep(Duration::from_secs(3 * 3600)).await;
        assert_eq!(dialer.count().await, 2);
        assert_eq!(shared.lock().await.pending(), 2);

        // Resume dispatches the next batch without waiting an interval.
        assert_eq!(resume(&shared).await.unwrap(), SchedulerState::Running);
        settle().await;
        assert_eq!(dialer.count().await, 4);

        let s = shared.lock().await;
        assert_eq!(s.state(), SchedulerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_in_non_running_states_is_noop() {
        let shared = scheduler(MockDialer::shared());
        assert!(!pause(&shared).await);
        assert_eq!(shared.lock().await.state(), SchedulerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_with_empty_queue_goes_idle() {
        let shared = scheduler(MockDialer::shared());
        assert_eq!(resume(&shared).await.unwrap(), SchedulerState::Idle);
        let s = shared.lock().await;
        assert_eq!(s.log.entries(Some(1))[0].message, "No pending contacts remain to resume.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_failure_is_isolated_per_contact() {
        let dialer = MockDialer::failing(&["2025550301"]);
        let shared = scheduler(dialer.clone());

        let contacts = vec![
            contact("a", "2025550300"),
            contact("b", "2025550301"),
            contact("c", "2025550302"),
        ];
        start(&shared, contacts, 3.0, 1.0).await.unwrap();
        settle().await;

        // All three attempted; the failure did not abort its siblings.
        assert_eq!(dialer.count().await, 3);

        let s = shared.lock().await;
        assert_eq!(s.state(), SchedulerState::Idle);
        let messages: Vec<&str> = s
            .log
            .entries(None)
            .iter()
            .map(|e| e.message.as_str())
            .collect();
        assert!(messages.iter().any(|m| m.contains("Failed to queue call")
            && m.contains("Encounter b")
            && m.contains("502")));
        assert!(messages.iter().any(|m| m.contains("Call queued for Encounter a")));
        assert!(messages.iter().any(|m| m.contains("Call queued for Encounter c")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_supersedes_previous_run() {
        let dialer = MockDialer::shared();
        let shared = scheduler(dialer.clone());

        let first: Vec<ContactRow> = (0..4)
            .map(|i| contact(&format!("old{i}"), &format!("202555040{i}")))
            .collect();
        start(&shared, first, 2.0, 30.0).await.unwrap();
        settle().await;
        assert_eq!(dialer.count().await, 2);

        // A second start replaces the run; the old 30-minute timer must
        // never dial the old queue's remainder.
        let second = vec![contact("new", "2025550500")];
        start(&shared, second, 2.0, 1.0).await.unwrap();
        settle().await;
        tokio::time::sleep(Duration::from_secs(3600)).await;
        settle().await;

        let calls = dialer.calls.lock().await;
        assert_eq!(calls.len(), 3);
        assert!(calls[2..].iter().all(|c| c.vars["encounter_id"] == "new"));
        assert_eq!(shared.lock().await.state(), SchedulerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fractional_inputs_round_before_use() {
        let dialer = MockDialer::shared();
        let shared = scheduler(dialer.clone());

        let contacts: Vec<ContactRow> = (0..3)
            .map(|i| contact(&i.to_string(), &format!("202555060{i}")))
            .collect();
        start(&shared, contacts, 2.4, 0.6).await.unwrap();
        settle().await;

        let s = shared.lock().await;
        assert_eq!(s.status(None).batch_size, 2);
        assert_eq!(s.status(None).interval_minutes, 1);
    }
}
