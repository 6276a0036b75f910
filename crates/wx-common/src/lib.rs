//! Common types shared by the forecast-run resolver crates.

pub mod convention;
pub mod dataset;
pub mod endpoint;
pub mod error;
pub mod family;
pub mod region;
pub mod time;

pub use convention::{LonConvention, LonSpan};
pub use dataset::{GriddedDataset, Provenance, Variable};
pub use endpoint::{AttemptOutcome, FailureKind, RetrievalAttempt, SourceEndpoint};
pub use error::{ResolveError, ResolveResult};
pub use family::{
    AccessProtocol, FamilyProfile, FileLayout, ModelFamily, PeriodKind, SourceTemplate,
    VariableRequest,
};
pub use region::RegionSpec;
pub use time::{parse_reference_instant, reference_from_local, LeadHours, RunDescriptor};
