//! Job lifecycle: submission, the polling loop, and reconciliation of poll
//! replies into the single piece of state the front end renders.
//!
//! The polling loop is a tokio task owned by [`JobController`]. It is aborted
//! when polling stops, when a new job is submitted, on [`JobController::shutdown`],
//! and when the controller is dropped. Replies that arrive after the loop was
//! stopped, or that belong to an older submission, are discarded.

use crate::backend::{ClientError, SimulationBackend};
use crate::domain::{CalculationOptions, Job, JobStatus, MoleculeData};
use crate::history::JobHistory;
use crate::viewer::ViewTarget;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{Notify, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);
pub const DEFAULT_FAILURE_MESSAGE: &str = "Simulation failed during processing.";
const EVENT_CAPACITY: usize = 64;

/// Notifications published as the controller's state changes.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    Submitted(Job),
    JobUpdated(Job),
    Completed(Job),
    Failed { job_id: String, message: String },
    ErrorRaised(String),
    ViewTargetChanged(ViewTarget),
    PollingStopped { job_id: String },
}

/// Point-in-time copy of everything the front end renders.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSnapshot {
    pub current_job: Option<Job>,
    pub is_polling: bool,
    pub is_submitting: bool,
    pub last_error: Option<String>,
    pub history: JobHistory,
    pub view_target: ViewTarget,
}

#[derive(Default)]
struct LifecycleState {
    current_job: Option<Job>,
    is_polling: bool,
    is_submitting: bool,
    last_error: Option<String>,
    history: JobHistory,
    /// Bumped by every submission or history load; replies tagged with an
    /// older generation are stale.
    generation: u64,
    next_seq: u64,
    last_applied_seq: u64,
    poll_in_flight: bool,
}

enum Step {
    Continue,
    Stop,
}

struct Shared {
    backend: Arc<dyn SimulationBackend>,
    state: Mutex<LifecycleState>,
    events: broadcast::Sender<ControllerEvent>,
    view: watch::Sender<ViewTarget>,
    settled: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, LifecycleState> {
        // A panic while holding the lock leaves plain data behind, still usable.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: ControllerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn publish_view(&self, structure: &str, format: &str) {
        let target = ViewTarget::new(structure, format);
        if *self.view.borrow() == target {
            return;
        }
        self.view.send_replace(target.clone());
        self.emit(ControllerEvent::ViewTargetChanged(target));
    }

    fn stop_polling(&self, state: &mut LifecycleState) {
        let was_polling = state.is_polling;
        state.is_polling = false;
        state.is_submitting = false;
        if was_polling {
            if let Some(job) = &state.current_job {
                self.emit(ControllerEvent::PollingStopped {
                    job_id: job.id.clone(),
                });
            }
        }
        self.settled.notify_waiters();
    }

    fn raise(&self, state: &mut LifecycleState, message: String) {
        state.last_error = Some(message.clone());
        self.emit(ControllerEvent::ErrorRaised(message));
    }

    /// Terminal handling for a job that just became `current_job`.
    fn settle(&self, state: &mut LifecycleState, job: &Job) {
        self.stop_polling(state);
        match job.status {
            JobStatus::Completed => {
                if state.history.insert(job.clone()) {
                    info!(job_id = %job.id, "Job completed");
                }
                if let Some(optimized) = job
                    .results
                    .as_ref()
                    .and_then(|r| r.optimized_structure.as_deref())
                {
                    self.publish_view(optimized, "xyz");
                }
                self.emit(ControllerEvent::Completed(job.clone()));
            }
            JobStatus::Failed => {
                let message = job
                    .error
                    .clone()
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string());
                warn!(job_id = %job.id, "Job failed: {}", message);
                state.history.insert(job.clone());
                self.emit(ControllerEvent::Failed {
                    job_id: job.id.clone(),
                    message: message.clone(),
                });
                self.raise(state, message);
            }
            JobStatus::Pending | JobStatus::Running => {}
        }
    }

    /// Folds one poll reply into the state.
    fn reconcile(&self, state: &mut LifecycleState, fetched: Job) -> Step {
        let Some(current) = state.current_job.as_ref() else {
            return Step::Stop;
        };

        if *current == fetched {
            if fetched.is_terminal() {
                self.settle(state, &fetched);
                return Step::Stop;
            }
            return Step::Continue;
        }

        if fetched.status.rank() < current.status.rank() {
            debug!(
                job_id = %fetched.id,
                "Discarding regressed status {} (holding {})",
                fetched.status,
                current.status
            );
            return Step::Continue;
        }

        state.current_job = Some(fetched.clone());
        self.emit(ControllerEvent::JobUpdated(fetched.clone()));

        if fetched.is_terminal() {
            self.settle(state, &fetched);
            return Step::Stop;
        }
        Step::Continue
    }

    /// One poll of the current job, guarded against overlap, stale
    /// generations and out-of-order completion.
    async fn poll_step(&self, generation: u64) -> Step {
        let (job_id, seq) = {
            let mut state = self.lock();
            if state.generation != generation || !state.is_polling {
                return Step::Stop;
            }
            let Some(job) = state.current_job.as_ref() else {
                return Step::Stop;
            };
            if job.is_terminal() {
                let job = job.clone();
                self.settle(&mut state, &job);
                return Step::Stop;
            }
            if state.poll_in_flight {
                return Step::Continue;
            }
            let job_id = job.id.clone();
            state.poll_in_flight = true;
            state.next_seq += 1;
            (job_id, state.next_seq)
        };

        let reply = self.backend.poll(&job_id).await;

        let mut state = self.lock();
        if state.generation != generation {
            debug!(job_id = %job_id, "Discarding reply for superseded job");
            return Step::Stop;
        }
        state.poll_in_flight = false;
        if !state.is_polling {
            debug!(job_id = %job_id, "Discarding reply that arrived after polling stopped");
            return Step::Stop;
        }
        if state.current_job.as_ref().map(|j| j.id.as_str()) != Some(job_id.as_str()) {
            return Step::Stop;
        }
        if seq <= state.last_applied_seq {
            debug!(job_id = %job_id, seq, "Discarding out-of-order reply");
            return Step::Continue;
        }
        state.last_applied_seq = seq;

        match reply {
            Ok(fetched) if fetched.id != job_id => {
                warn!(
                    "Backend answered poll for {} with job {}; ignoring",
                    job_id, fetched.id
                );
                Step::Continue
            }
            Ok(fetched) => self.reconcile(&mut state, fetched),
            Err(err) if err.is_network() => {
                debug!(job_id = %job_id, "Transient polling error: {}", err);
                Step::Continue
            }
            Err(err) => {
                warn!(job_id = %job_id, "Polling stopped: {}", err);
                self.stop_polling(&mut state);
                self.raise(&mut state, err.to_string());
                Step::Stop
            }
        }
    }
}

async fn run_poller(shared: Arc<Shared>, generation: u64, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; the first poll waits one full interval.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if let Step::Stop = shared.poll_step(generation).await {
            break;
        }
    }
}

/// Owns the active job, drives the polling loop and keeps the session history.
pub struct JobController {
    shared: Arc<Shared>,
    poller: Mutex<Option<JoinHandle<()>>>,
    poll_interval: Duration,
}

impl JobController {
    pub fn new(backend: Arc<dyn SimulationBackend>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (view, _) = watch::channel(ViewTarget::default());
        Self {
            shared: Arc::new(Shared {
                backend,
                state: Mutex::new(LifecycleState::default()),
                events,
                view,
                settled: Notify::new(),
            }),
            poller: Mutex::new(None),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets the polling period. A zero interval is raised to one millisecond,
    /// since the tick timer cannot run with a zero period.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.shared.events.subscribe()
    }

    pub fn view_target(&self) -> watch::Receiver<ViewTarget> {
        self.shared.view.subscribe()
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        let state = self.shared.lock();
        ControllerSnapshot {
            current_job: state.current_job.clone(),
            is_polling: state.is_polling,
            is_submitting: state.is_submitting,
            last_error: state.last_error.clone(),
            history: state.history.clone(),
            view_target: self.shared.view.borrow().clone(),
        }
    }

    /// Submits a job and, on success, starts polling it.
    ///
    /// Any failure is also recorded as the controller's `last_error`.
    pub async fn submit(
        &self,
        molecule: &MoleculeData,
        options: &CalculationOptions,
    ) -> Result<Job, ClientError> {
        self.abort_poller();
        let generation = {
            let mut state = self.shared.lock();
            state.last_error = None;
            state.current_job = None;
            state.is_submitting = true;
            state.is_polling = false;
            state.poll_in_flight = false;
            state.generation += 1;
            state.generation
        };

        if let Some((structure, format)) = molecule.uploaded_structure() {
            self.shared.publish_view(structure, format);
        }

        info!(
            "Submitting {} ({} / {}, {})",
            molecule.name, options.theory, options.basis, options.calc_type
        );
        let outcome = self.shared.backend.submit(molecule, options).await;

        let mut state = self.shared.lock();
        if state.generation != generation {
            debug!("Submission superseded before the backend answered");
            return outcome;
        }

        match &outcome {
            Ok(job) => {
                state.current_job = Some(job.clone());
                self.shared.emit(ControllerEvent::Submitted(job.clone()));
                if job.is_terminal() {
                    self.shared.settle(&mut state, job);
                } else {
                    state.is_polling = true;
                    drop(state);
                    self.spawn_poller(generation);
                }
            }
            Err(err) => {
                state.is_submitting = false;
                self.shared.raise(&mut state, err.to_string());
                self.shared.settled.notify_waiters();
            }
        }
        outcome
    }

    /// Runs one poll immediately, with the same guards as the timer.
    /// Returns whether polling is still active afterwards.
    pub async fn refresh(&self) -> bool {
        let generation = self.shared.lock().generation;
        self.shared.poll_step(generation).await;
        self.shared.lock().is_polling
    }

    /// Shows a finished job again. Any active polling is stopped; history
    /// entries are terminal so polling is not restarted.
    pub fn load_from_history(&self, job_id: &str) -> Option<Job> {
        let job = self.shared.lock().history.get(job_id).cloned()?;
        self.abort_poller();

        let mut state = self.shared.lock();
        state.generation += 1;
        state.poll_in_flight = false;
        self.shared.stop_polling(&mut state);
        state.current_job = Some(job.clone());
        drop(state);

        match job.display_structure() {
            Some((structure, format)) => self.shared.publish_view(structure, format),
            None => warn!(job_id = %job.id, "History entry has no structure to display"),
        }
        Some(job)
    }

    pub fn dismiss_error(&self) {
        self.shared.lock().last_error = None;
    }

    /// Resolves once no polling is active, returning the state at that point.
    pub async fn wait_for_terminal(&self) -> ControllerSnapshot {
        loop {
            let settled = self.shared.settled.notified();
            if !self.shared.lock().is_polling {
                return self.snapshot();
            }
            settled.await;
        }
    }

    /// Stops polling and cancels the timer task.
    pub fn shutdown(&self) {
        self.abort_poller();
        let mut state = self.shared.lock();
        state.generation += 1;
        state.poll_in_flight = false;
        self.shared.stop_polling(&mut state);
    }

    fn spawn_poller(&self, generation: u64) {
        let handle = tokio::spawn(run_poller(
            self.shared.clone(),
            generation,
            self.poll_interval,
        ));
        let mut poller = self
            .poller
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = poller.replace(handle) {
            previous.abort();
        }
    }

    fn abort_poller(&self) {
        let handle = self
            .poller
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

impl Drop for JobController {
    fn drop(&mut self) {
        self.abort_poller();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constants::METHANE_XYZ;
    use crate::testing::{MockBackend, job_fixture};

    fn ethanol() -> MoleculeData {
        MoleculeData {
            name: "Ethanol".to_string(),
            smiles: Some("CCO".to_string()),
            structure: None,
            format: None,
        }
    }

    fn controller(backend: &MockBackend) -> JobController {
        JobController::new(Arc::new(backend.clone()))
    }

    fn drain(rx: &mut broadcast::Receiver<ControllerEvent>) -> Vec<ControllerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_polls_until_completed() {
        let backend = MockBackend::new();
        backend.push_submit(Ok(job_fixture("job_1", JobStatus::Pending)));
        backend.push_poll(Ok(job_fixture("job_1", JobStatus::Running)));
        backend.push_poll(Ok(job_fixture("job_1", JobStatus::Completed)));
        let controller = controller(&backend);

        let job = controller
            .submit(&ethanol(), &CalculationOptions::default())
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        let snap = controller.snapshot();
        assert!(snap.is_polling);
        assert!(snap.is_submitting);

        let done = controller.wait_for_terminal().await;
        assert_eq!(backend.poll_calls(), 2);
        assert!(!done.is_polling);
        assert!(!done.is_submitting);
        assert_eq!(
            done.current_job.as_ref().unwrap().status,
            JobStatus::Completed
        );
        assert_eq!(done.history.len(), 1);
        assert_eq!(done.view_target.structure, "1\njob_1\nC 0.0 0.0 0.0");
        assert_eq!(done.view_target.format, "xyz");
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_poll_interval_still_reaches_completion() {
        let backend = MockBackend::new();
        backend.push_submit(Ok(job_fixture("job_1", JobStatus::Pending)));
        backend.push_poll(Ok(job_fixture("job_1", JobStatus::Completed)));
        let controller = controller(&backend).with_poll_interval(Duration::ZERO);
        assert_eq!(controller.poll_interval(), MIN_POLL_INTERVAL);

        controller
            .submit(&ethanol(), &CalculationOptions::default())
            .await
            .unwrap();
        let done = tokio::time::timeout(Duration::from_secs(5), controller.wait_for_terminal())
            .await
            .expect("polling should settle the job");
        assert_eq!(backend.poll_calls(), 1);
        assert!(!done.is_polling);
        assert_eq!(done.current_job.unwrap().status, JobStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_poll_publishes_nothing() {
        let backend = MockBackend::new();
        backend.push_submit(Ok(job_fixture("job_1", JobStatus::Pending)));
        backend.push_poll(Ok(job_fixture("job_1", JobStatus::Pending)));
        let controller = controller(&backend);
        let mut events = controller.subscribe();

        controller
            .submit(&ethanol(), &CalculationOptions::default())
            .await
            .unwrap();
        let before = controller.snapshot();
        drain(&mut events);

        assert!(controller.refresh().await);
        assert!(controller.refresh().await);

        assert_eq!(backend.poll_calls(), 2);
        assert!(drain(&mut events).is_empty());
        assert_eq!(controller.snapshot(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_job_sets_error_and_stops() {
        let backend = MockBackend::new();
        backend.push_submit(Ok(job_fixture("job_1", JobStatus::Pending)));
        let mut failed = job_fixture("job_1", JobStatus::Failed);
        failed.error = None;
        backend.push_poll(Ok(failed));
        let controller = controller(&backend);

        controller
            .submit(&ethanol(), &CalculationOptions::default())
            .await
            .unwrap();
        let snap = controller.wait_for_terminal().await;
        assert_eq!(snap.last_error.as_deref(), Some(DEFAULT_FAILURE_MESSAGE));
        assert!(!snap.is_polling);
        assert_eq!(snap.history.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_poll_errors_are_retried() {
        let backend = MockBackend::new();
        backend.push_submit(Ok(job_fixture("job_1", JobStatus::Pending)));
        backend.push_poll(Err(ClientError::Network("offline".to_string())));
        backend.push_poll(Err(ClientError::Network("offline".to_string())));
        backend.push_poll(Ok(job_fixture("job_1", JobStatus::Completed)));
        let controller = controller(&backend);

        controller
            .submit(&ethanol(), &CalculationOptions::default())
            .await
            .unwrap();
        let snap = controller.wait_for_terminal().await;
        assert_eq!(backend.poll_calls(), 3);
        assert!(snap.last_error.is_none());
        assert_eq!(
            snap.current_job.unwrap().status,
            JobStatus::Completed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_stops_polling() {
        let backend = MockBackend::new();
        backend.push_submit(Ok(job_fixture("job_1", JobStatus::Pending)));
        backend.push_poll(Err(ClientError::not_found("job_1")));
        let controller = controller(&backend);

        controller
            .submit(&ethanol(), &CalculationOptions::default())
            .await
            .unwrap();
        let snap = controller.wait_for_terminal().await;
        assert_eq!(snap.last_error.as_deref(), Some("Job not found"));
        assert!(!snap.is_polling);
        assert!(snap.history.is_empty());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(backend.poll_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_failure_records_error() {
        let backend = MockBackend::new();
        backend.push_submit(Err(ClientError::Rejected {
            status: 400,
            message: "Invalid SMILES string".to_string(),
        }));
        let controller = controller(&backend);

        let err = controller
            .submit(&ethanol(), &CalculationOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid SMILES string");
        let snap = controller.snapshot();
        assert_eq!(snap.last_error.as_deref(), Some("Invalid SMILES string"));
        assert!(!snap.is_submitting);
        assert!(!snap.is_polling);
        assert!(snap.current_job.is_none());

        controller.dismiss_error();
        assert!(controller.snapshot().last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_submission_clears_previous_error() {
        let backend = MockBackend::new();
        backend.push_submit(Err(ClientError::Rejected {
            status: 500,
            message: "Server Error: Internal Server Error".to_string(),
        }));
        backend.push_submit(Ok(job_fixture("job_2", JobStatus::Pending)));
        let controller = controller(&backend);

        let _ = controller
            .submit(&ethanol(), &CalculationOptions::default())
            .await;
        assert!(controller.snapshot().last_error.is_some());

        controller
            .submit(&ethanol(), &CalculationOptions::default())
            .await
            .unwrap();
        assert!(controller.snapshot().last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_regression_is_ignored() {
        let backend = MockBackend::new();
        backend.push_submit(Ok(job_fixture("job_1", JobStatus::Running)));
        backend.push_poll(Ok(job_fixture("job_1", JobStatus::Pending)));
        let controller = controller(&backend);

        controller
            .submit(&ethanol(), &CalculationOptions::default())
            .await
            .unwrap();
        assert!(controller.refresh().await);
        assert_eq!(
            controller.snapshot().current_job.unwrap().status,
            JobStatus::Running
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_submission_is_settled_without_polling() {
        let backend = MockBackend::new();
        backend.push_submit(Ok(job_fixture("job_1", JobStatus::Completed)));
        let controller = controller(&backend);

        controller
            .submit(&ethanol(), &CalculationOptions::default())
            .await
            .unwrap();
        let snap = controller.snapshot();
        assert!(!snap.is_polling);
        assert_eq!(snap.history.len(), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(backend.poll_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_after_shutdown_is_discarded() {
        let backend = MockBackend::new();
        backend.push_submit(Ok(job_fixture("job_1", JobStatus::Pending)));
        backend.push_poll_delayed(
            Duration::from_secs(1),
            Ok(job_fixture("job_1", JobStatus::Completed)),
        );
        let controller = Arc::new(controller(&backend));

        controller
            .submit(&ethanol(), &CalculationOptions::default())
            .await
            .unwrap();

        let refreshing = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.refresh().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        controller.shutdown();
        let still_polling = refreshing.await.unwrap();

        assert!(!still_polling);
        let snap = controller.snapshot();
        assert_eq!(snap.current_job.unwrap().status, JobStatus::Pending);
        assert!(snap.history.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_polling_task() {
        let backend = MockBackend::new();
        backend.push_submit(Ok(job_fixture("job_1", JobStatus::Pending)));
        backend.push_poll(Ok(job_fixture("job_1", JobStatus::Running)));
        {
            let controller = controller(&backend);
            controller
                .submit(&ethanol(), &CalculationOptions::default())
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(2100)).await;
            assert_eq!(backend.poll_calls(), 1);
        }
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(backend.poll_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_from_history_falls_back_to_input_structure() {
        let backend = MockBackend::new();
        let mut uploaded = job_fixture("job_1", JobStatus::Completed);
        uploaded.smiles = None;
        uploaded.structure = Some("PDB DATA".to_string());
        uploaded.format = Some("pdb".to_string());
        if let Some(results) = uploaded.results.as_mut() {
            results.optimized_structure = None;
        }
        backend.push_submit(Ok(uploaded));
        backend.push_submit(Ok(job_fixture("job_2", JobStatus::Completed)));
        let controller = controller(&backend);

        controller
            .submit(&ethanol(), &CalculationOptions::default())
            .await
            .unwrap();
        assert_eq!(controller.snapshot().view_target.structure, METHANE_XYZ);

        controller
            .submit(&ethanol(), &CalculationOptions::default())
            .await
            .unwrap();
        assert_eq!(controller.snapshot().view_target.format, "xyz");

        let loaded = controller.load_from_history("job_1").unwrap();
        assert_eq!(loaded.id, "job_1");
        let snap = controller.snapshot();
        assert_eq!(snap.view_target, ViewTarget::new("PDB DATA", "pdb"));
        assert_eq!(snap.current_job.unwrap().id, "job_1");
        assert!(!snap.is_polling);
        assert_eq!(snap.history.len(), 2);

        assert!(controller.load_from_history("missing").is_none());
    }
}
