pub mod audit;
pub mod canon_uri;
pub mod catalog;
pub mod conflict;
pub mod dimensions;
pub mod metadata;
pub mod profile;

pub use crate::domain::model::{ComplianceReport, DimensionKind, Repository, ServiceType, Verdict};
pub use crate::domain::ports::{FactSheetProvider, ProbeOutcome, RuntimeProbe, Storage};
pub use crate::utils::error::Result;
