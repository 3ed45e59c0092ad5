use crate::domain::{Job, JobStatus, SimulationResults};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A status change applied by the simulated backend.
#[derive(Debug, Clone)]
pub enum JobTransition {
    Start,
    Complete(SimulationResults),
    Fail(String),
}

impl JobTransition {
    fn target(&self) -> JobStatus {
        match self {
            JobTransition::Start => JobStatus::Running,
            JobTransition::Complete(_) => JobStatus::Completed,
            JobTransition::Fail(_) => JobStatus::Failed,
        }
    }
}

/// Repository holding the jobs the simulated backend has accepted.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: Job);
    async fn get(&self, id: &str) -> Option<Job>;
    /// Applies `transition` if it moves the job forward. Returns the job as stored afterwards,
    /// or `None` when the id is unknown.
    async fn transition(&self, id: &str, transition: JobTransition) -> Option<Job>;
    async fn len(&self) -> usize;
}

pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: Job) {
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.id.clone(), job);
    }

    async fn get(&self, id: &str) -> Option<Job> {
        let jobs = self.jobs.read().await;
        jobs.get(id).cloned()
    }

    async fn transition(&self, id: &str, transition: JobTransition) -> Option<Job> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(id)?;

        if transition.target().rank() <= job.status.rank() {
            return Some(job.clone());
        }

        job.status = transition.target();
        match transition {
            JobTransition::Start => {}
            JobTransition::Complete(results) => job.results = Some(results),
            JobTransition::Fail(message) => job.error = Some(message),
        }
        Some(job.clone())
    }

    async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constants::mock_results;

    fn pending(id: &str) -> Job {
        Job {
            id: id.to_string(),
            status: JobStatus::Pending,
            molecule_name: "Water".to_string(),
            smiles: Some("O".to_string()),
            structure: None,
            format: None,
            theory: "HF".to_string(),
            basis_set: "STO-3G".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            results: None,
            error: None,
        }
    }

    #[tokio::test]
    async fn test_transitions_move_forward_only() {
        let store = InMemoryJobStore::new();
        store.insert(pending("a")).await;

        let running = store.transition("a", JobTransition::Start).await.unwrap();
        assert_eq!(running.status, JobStatus::Running);

        let done = store
            .transition("a", JobTransition::Complete(mock_results()))
            .await
            .unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert!(done.results.is_some());

        // Late transitions never move a terminal job.
        let still_done = store.transition("a", JobTransition::Start).await.unwrap();
        assert_eq!(still_done.status, JobStatus::Completed);
        let not_failed = store
            .transition("a", JobTransition::Fail("late".to_string()))
            .await
            .unwrap();
        assert_eq!(not_failed.status, JobStatus::Completed);
        assert!(not_failed.error.is_none());
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let store = InMemoryJobStore::new();
        assert!(store.get("nope").await.is_none());
        assert!(store.transition("nope", JobTransition::Start).await.is_none());
        assert_eq!(store.len().await, 0);
    }
}
