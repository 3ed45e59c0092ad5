use crate::controller::ControllerEvent;
use crate::domain::Job;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SessionEventType {
    Submitted,
    JobUpdated,
    Completed,
    Failed,
    Error,
    ExportWritten,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// One line of the session journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: String,
    pub event_type: SessionEventType,
    pub level: LogLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl LogEvent {
    pub fn new(
        event_type: SessionEventType,
        level: LogLevel,
        message: impl Into<String>,
        details: Option<serde_json::Value>,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            event_type,
            level,
            message: message.into(),
            details,
        }
    }

    pub fn info(event_type: SessionEventType, message: impl Into<String>) -> Self {
        Self::new(event_type, LogLevel::Info, message, None)
    }

    pub fn info_with_details(
        event_type: SessionEventType,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self::new(event_type, LogLevel::Info, message, Some(details))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(SessionEventType::Error, LogLevel::Error, message, None)
    }
}

fn job_details(job: &Job) -> serde_json::Value {
    serde_json::json!({
        "job_id": job.id,
        "status": job.status,
        "molecule": job.molecule_name,
        "theory": job.theory,
        "basis": job.basis_set,
    })
}

/// Appends one JSON object per line to `<dir>/logs/session.jsonl`.
pub struct SessionJournal {
    log_file_path: PathBuf,
}

impl SessionJournal {
    /// Creates the `logs/` subdirectory if it doesn't exist.
    pub async fn new(dir: &Path) -> Result<Self> {
        let logs_dir = dir.join("logs");
        tokio::fs::create_dir_all(&logs_dir)
            .await
            .context("Failed to create logs directory")?;

        Ok(Self {
            log_file_path: logs_dir.join("session.jsonl"),
        })
    }

    /// Each call opens, appends and flushes.
    pub async fn log(&self, event: LogEvent) -> Result<()> {
        let mut line = serde_json::to_string(&event).context("Failed to serialize log event")?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file_path)
            .await
            .context("Failed to open session journal")?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }

    /// Journals a controller event. View changes are not recorded.
    pub async fn record(&self, event: &ControllerEvent) -> Result<()> {
        let entry = match event {
            ControllerEvent::Submitted(job) => LogEvent::info_with_details(
                SessionEventType::Submitted,
                format!("Submitted {} as {}", job.molecule_name, job.id),
                job_details(job),
            ),
            ControllerEvent::JobUpdated(job) => LogEvent::new(
                SessionEventType::JobUpdated,
                LogLevel::Debug,
                format!("Job {} is {}", job.id, job.status),
                Some(job_details(job)),
            ),
            ControllerEvent::Completed(job) => {
                let mut details = job_details(job);
                if let Some(results) = &job.results {
                    details["energy"] = serde_json::json!(results.energy);
                    details["gap"] = serde_json::json!(results.gap);
                }
                LogEvent::info_with_details(
                    SessionEventType::Completed,
                    format!("Job {} completed", job.id),
                    details,
                )
            }
            ControllerEvent::Failed { job_id, message } => LogEvent::new(
                SessionEventType::Failed,
                LogLevel::Warn,
                format!("Job {} failed", job_id),
                Some(serde_json::json!({ "job_id": job_id, "error": message })),
            ),
            ControllerEvent::ErrorRaised(message) => LogEvent::error(message.clone()),
            ControllerEvent::PollingStopped { job_id } => LogEvent::info(
                SessionEventType::Info,
                format!("Stopped polling {}", job_id),
            ),
            ControllerEvent::ViewTargetChanged(_) => return Ok(()),
        };
        self.log(entry).await
    }

    pub async fn log_export_written(&self, job_id: &str, path: &Path) -> Result<()> {
        self.log(LogEvent::info_with_details(
            SessionEventType::ExportWritten,
            format!("Exported {} to {}", job_id, path.display()),
            serde_json::json!({
                "job_id": job_id,
                "path": path.display().to_string(),
            }),
        ))
        .await
    }

    pub fn log_file_path(&self) -> &Path {
        &self.log_file_path
    }
}
