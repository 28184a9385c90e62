pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{FileFactSheetProvider, HttpProbe, InMemoryFactSheetProvider, LocalStorage};
pub use config::AuditConfig;
pub use core::audit::{AuditEntry, AuditRun, AuditSettings, Auditor};
pub use core::profile::{ProfileMatrix, ProfileResolver};
pub use utils::error::{AuditError, Result};
