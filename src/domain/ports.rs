use crate::domain::facts::RepoFactSheet;
use crate::domain::model::Repository;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Gathers repository state. The engine never fetches facts itself.
#[async_trait]
pub trait FactSheetProvider: Send + Sync {
    async fn fetch(&self, repository: &Repository) -> Result<RepoFactSheet>;
}

/// What a live probe observed. Transport failures are data, not errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Response {
        status: u16,
        /// `None` when the body was not valid JSON.
        body: Option<serde_json::Value>,
    },
    Unreachable {
        reason: String,
    },
    TimedOut,
    Skipped,
}

impl ProbeOutcome {
    /// A 2xx response carrying a JSON object.
    pub fn json_object(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        match self {
            ProbeOutcome::Response { status, body } if (200..300).contains(status) => {
                body.as_ref().and_then(|b| b.as_object())
            }
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ProbeOutcome::Response { status, body } => match body {
                Some(_) => format!("HTTP {} with JSON body", status),
                None => format!("HTTP {} without a JSON body", status),
            },
            ProbeOutcome::Unreachable { reason } => format!("unreachable: {}", reason),
            ProbeOutcome::TimedOut => "timed out".to_string(),
            ProbeOutcome::Skipped => "skipped (--skip-runtime)".to_string(),
        }
    }
}

#[async_trait]
pub trait RuntimeProbe: Send + Sync {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome;
}
