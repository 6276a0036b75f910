//! Endpoint descriptors and the retrieval attempt log.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::family::{AccessProtocol, ModelFamily};
use crate::time::RunDescriptor;

/// One file (or server-side subset) to fetch for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEndpoint {
    pub family: ModelFamily,
    pub run: RunDescriptor,
    pub protocol: AccessProtocol,
    /// Fully rendered URL
    pub address: String,
    /// File name inside the staging directory
    pub file_name: String,
    pub lead_hour: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
    /// Variables the decoded file must contain
    #[serde(default)]
    pub expected_variables: Vec<String>,
}

impl fmt::Display for SourceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} f{:03}", self.run, self.lead_hour)?;
        if let Some(member) = self.member {
            write!(f, " m{:02}", member)?;
        }
        if let Some(var) = &self.variable {
            write!(f, " {}", var)?;
        }
        Ok(())
    }
}

/// Why an attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Http(u16),
    Network,
    Decode,
    /// Some, but not all, files of a multi-file run were usable.
    Incomplete,
}

impl FailureKind {
    pub fn as_label(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Http(_) => "http",
            FailureKind::Network => "network",
            FailureKind::Decode => "decode",
            FailureKind::Incomplete => "incomplete",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Http(status) => write!(f, "http {}", status),
            other => f.write_str(other.as_label()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Failure { kind: FailureKind, message: String },
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success)
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::Failure { kind, .. } => kind.as_label(),
        }
    }
}

/// One entry of the append-only attempt log: a candidate run and what came of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalAttempt {
    pub run: RunDescriptor,
    /// Addresses requested for this candidate, in request order
    pub endpoints: Vec<String>,
    pub attempted_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub outcome: AttemptOutcome,
}
