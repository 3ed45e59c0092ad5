//! Scripted collaborators for exercising the controller and assistant without
//! a network.

use crate::assistant::{AssistantError, ChatMessage, TextGenerator};
use crate::backend::{ClientError, SimulationBackend};
use crate::domain::{CalculationOptions, Job, JobStatus, MoleculeData, SimulationResults};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

type Scripted = (Option<Duration>, Result<Job, ClientError>);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A backend that replays queued replies.
///
/// An empty poll queue repeats the last successful poll reply, or reports a
/// network error when there has been none.
#[derive(Clone, Default)]
pub struct MockBackend {
    submits: Arc<Mutex<VecDeque<Result<Job, ClientError>>>>,
    polls: Arc<Mutex<VecDeque<Scripted>>>,
    last_poll: Arc<Mutex<Option<Job>>>,
    poll_calls: Arc<AtomicUsize>,
    submit_calls: Arc<AtomicUsize>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_submit(&self, reply: Result<Job, ClientError>) {
        lock(&self.submits).push_back(reply);
    }

    pub fn push_poll(&self, reply: Result<Job, ClientError>) {
        lock(&self.polls).push_back((None, reply));
    }

    /// Queues a poll reply that resolves only after `latency`.
    pub fn push_poll_delayed(&self, latency: Duration, reply: Result<Job, ClientError>) {
        lock(&self.polls).push_back((Some(latency), reply));
    }

    pub fn poll_calls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SimulationBackend for MockBackend {
    async fn submit(
        &self,
        _molecule: &MoleculeData,
        _options: &CalculationOptions,
    ) -> Result<Job, ClientError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.submits)
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::Network("no scripted submit reply".to_string())))
    }

    async fn poll(&self, _job_id: &str) -> Result<Job, ClientError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        let next = lock(&self.polls).pop_front();
        match next {
            Some((latency, reply)) => {
                if let Some(latency) = latency {
                    tokio::time::sleep(latency).await;
                }
                if let Ok(job) = &reply {
                    *lock(&self.last_poll) = Some(job.clone());
                }
                reply
            }
            None => {
                let last = lock(&self.last_poll).clone();
                last.ok_or_else(|| ClientError::Network("no scripted poll reply".to_string()))
            }
        }
    }
}

/// A text generator that replays queued replies and records what it was asked.
#[derive(Clone, Default)]
pub struct MockGenerator {
    replies: Arc<Mutex<VecDeque<Result<String, AssistantError>>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    histories: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl MockGenerator {
    pub fn new(replies: Vec<Result<String, AssistantError>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            ..Self::default()
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    /// Histories passed to each `chat` call, excluding the new message.
    pub fn histories(&self) -> Vec<Vec<ChatMessage>> {
        lock(&self.histories).clone()
    }

    fn next_reply(&self) -> Result<String, AssistantError> {
        lock(&self.replies)
            .pop_front()
            .unwrap_or_else(|| Ok("MOCK_RESPONSE".to_string()))
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, AssistantError> {
        lock(&self.prompts).push(prompt.to_string());
        self.next_reply()
    }

    async fn chat(
        &self,
        _system: &str,
        history: &[ChatMessage],
        message: &str,
    ) -> Result<String, AssistantError> {
        lock(&self.histories).push(history.to_vec());
        lock(&self.prompts).push(message.to_string());
        self.next_reply()
    }
}

/// A job in `status` with the presence rules satisfied.
pub fn job_fixture(id: &str, status: JobStatus) -> Job {
    let results = (status == JobStatus::Completed).then(|| SimulationResults {
        energy: -154.1,
        dipole_moment: [0.3, 0.4, 1.2],
        homo_energy: -0.41,
        lumo_energy: 0.09,
        gap: 0.5,
        frequencies: None,
        intensities: None,
        optimized_structure: Some(format!("1\n{}\nC 0.0 0.0 0.0", id)),
        orbitals_url: None,
        homo_cube_url: None,
        lumo_cube_url: None,
        output_log: None,
    });
    Job {
        id: id.to_string(),
        status,
        molecule_name: "Ethanol".to_string(),
        smiles: Some("CCO".to_string()),
        structure: None,
        format: None,
        theory: "B3LYP".to_string(),
        basis_set: "6-31G*".to_string(),
        created_at: "2026-01-01T00:00:00.000Z".to_string(),
        results,
        error: (status == JobStatus::Failed).then(|| "SCF did not converge".to_string()),
    }
}
