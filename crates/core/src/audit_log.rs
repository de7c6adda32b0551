//! Append-only audit trail of pool activity
//!
//! Committed pool events and rejected operations are written as JSONL, one
//! record per line, for post-incident analysis of loans and governance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::LendingError;
use crate::events::PoolEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditCategory {
    Lending,
    Governance,
    Security,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOutcome {
    Committed,
    Rejected,
    Logged,
}

/// One line of the audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub recorded_at: DateTime<Utc>,
    pub category: AuditCategory,
    /// Event or operation name (LOAN_EXECUTED, FLASH_LOAN, STARTUP, ...)
    pub action: String,
    /// Pool, asset or borrower the record is about
    pub subject: String,
    pub outcome: AuditOutcome,
    pub details: serde_json::Value,
}

impl AuditRecord {
    fn new(
        category: AuditCategory,
        action: &str,
        subject: &str,
        outcome: AuditOutcome,
        details: serde_json::Value,
    ) -> Self {
        Self {
            recorded_at: Utc::now(),
            category,
            action: action.to_string(),
            subject: subject.to_string(),
            outcome,
            details,
        }
    }
}

fn invalid_data(e: serde_json::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}

/// JSONL writer shared by the event forwarder and the operator tooling
pub struct AuditLogger {
    sink: Mutex<File>,
    path: PathBuf,
}

impl AuditLogger {
    /// Open `path` for appending, creating it and its parent directories
    pub async fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }

        let sink = OpenOptions::new().create(true).append(true).open(&path).await?;
        Ok(Self {
            sink: Mutex::new(sink),
            path,
        })
    }

    pub async fn append(&self, record: &AuditRecord) -> io::Result<()> {
        let mut line = serde_json::to_vec(record).map_err(invalid_data)?;
        line.push(b'\n');

        let mut sink = self.sink.lock().await;
        sink.write_all(&line).await?;
        sink.flush().await
    }

    /// Record an event the pool committed
    pub async fn log_pool_event(&self, pool: &str, event: &PoolEvent) -> io::Result<()> {
        let category = if event.is_governance() {
            AuditCategory::Governance
        } else {
            AuditCategory::Lending
        };
        let details = serde_json::to_value(event).map_err(invalid_data)?;

        self.append(&AuditRecord::new(
            category,
            event.name(),
            pool,
            AuditOutcome::Committed,
            details,
        ))
        .await
    }

    /// Record an operation the pool rejected and rolled back
    pub async fn log_rejection(
        &self,
        operation: &str,
        subject: &str,
        error: &LendingError,
    ) -> io::Result<()> {
        let details = serde_json::json!({
            "error": error.to_string(),
            "category": format!("{:?}", error.category()),
        });

        self.append(&AuditRecord::new(
            AuditCategory::Security,
            operation,
            subject,
            AuditOutcome::Rejected,
            details,
        ))
        .await
    }

    /// Record a lifecycle event of the process itself
    pub async fn log_system_event(&self, action: &str, details: serde_json::Value) -> io::Result<()> {
        self.append(&AuditRecord::new(
            AuditCategory::System,
            action,
            "flashlend",
            AuditOutcome::Logged,
            details,
        ))
        .await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
