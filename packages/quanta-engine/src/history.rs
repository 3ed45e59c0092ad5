use crate::domain::Job;
use std::collections::HashSet;

/// Terminal jobs run during this session, in the order they first settled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobHistory {
    entries: Vec<Job>,
    ids: HashSet<String>,
}

impl JobHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `job` unless an entry with the same id exists. Returns whether it was added.
    pub fn insert(&mut self, job: Job) -> bool {
        if self.ids.contains(&job.id) {
            return false;
        }
        self.ids.insert(job.id.clone());
        self.entries.push(job);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn get(&self, id: &str) -> Option<&Job> {
        if !self.ids.contains(id) {
            return None;
        }
        self.entries.iter().find(|j| j.id == id)
    }

    pub fn latest(&self) -> Option<&Job> {
        self.entries.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
