//! Forecast-run resolution and retrieval.
//!
//! Given a reference instant, a model family and a region, this crate picks
//! the newest published run that is actually retrievable, fetches it with a
//! sequential fallback cascade, cuts the region out in the provider's native
//! longitude convention, stitches short- and extended-range periods, and
//! attaches uniform time and longitude metadata.

pub mod catalog;
pub mod config;
pub mod decoder;
pub mod fetch;
pub mod normalize;
pub mod region_window;
pub mod resolver;
pub mod run_clock;
pub mod staging;
pub mod stitch;
pub mod transport;

pub use catalog::SourceCatalog;
pub use config::{FamilyOverride, ResolverConfig};
pub use decoder::{Grib2Decoder, GridDecoder};
pub use fetch::{FetchExecutor, FetchOptions, FetchOutcome};
pub use normalize::DatasetNormalizer;
pub use region_window::RegionWindow;
pub use resolver::{PeriodRequest, ProductSummary, ResolveRequest, ResolvedProduct, Resolver};
pub use run_clock::RunClock;
pub use staging::{StagingArea, StagingLease};
pub use stitch::{PartialPeriod, PeriodStitcher, StitchMode, Stitched};
pub use transport::{HttpTransport, HttpTransportConfig, Transport, TransportError};
