//! End-to-end resolution of one request.
//!
//! RunClock -> SourceCatalog -> FetchExecutor -> RegionWindow ->
//! PeriodStitcher -> DatasetNormalizer.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use wx_common::{
    FamilyProfile, GriddedDataset, LeadHours, ModelFamily, PeriodKind, Provenance, RegionSpec,
    ResolveError, ResolveResult, RetrievalAttempt, RunDescriptor,
};

use crate::catalog::SourceCatalog;
use crate::config::ResolverConfig;
use crate::decoder::Grib2Decoder;
use crate::fetch::{FetchExecutor, FetchOptions, FetchOutcome};
use crate::normalize::DatasetNormalizer;
use crate::region_window::RegionWindow;
use crate::run_clock::RunClock;
use crate::staging::StagingArea;
use crate::stitch::{PartialPeriod, PeriodStitcher, Stitched};
use crate::transport::HttpTransport;

/// Which periods of a product to resolve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodRequest {
    #[default]
    Short,
    Extended,
    /// Short period, then the extended period stitched after it
    Both,
}

impl std::str::FromStr for PeriodRequest {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "short" => Ok(PeriodRequest::Short),
            "extended" => Ok(PeriodRequest::Extended),
            "both" => Ok(PeriodRequest::Both),
            other => Err(ResolveError::invalid_input(format!(
                "unknown period '{other}', expected short, extended or both"
            ))),
        }
    }
}

/// One resolution request.
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    pub family: ModelFamily,
    /// "Now" for candidate selection
    pub reference: DateTime<Utc>,
    pub region: RegionSpec,
    pub period: PeriodRequest,
    /// Fetch exactly this run instead of asking the clock. Its lead hours
    /// are used for the first requested period.
    pub run_override: Option<RunDescriptor>,
    pub attempt_cap: Option<usize>,
    pub cancel: Option<CancellationToken>,
}

impl ResolveRequest {
    pub fn new(family: ModelFamily, reference: DateTime<Utc>, region: RegionSpec) -> Self {
        Self {
            family,
            reference,
            region,
            period: PeriodRequest::Short,
            run_override: None,
            attempt_cap: None,
            cancel: None,
        }
    }

    pub fn with_period(mut self, period: PeriodRequest) -> Self {
        self.period = period;
        self
    }

    pub fn with_run(mut self, run: RunDescriptor) -> Self {
        self.run_override = Some(run);
        self
    }

    pub fn with_attempt_cap(mut self, cap: usize) -> Self {
        self.attempt_cap = Some(cap);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            attempt_cap: self.attempt_cap,
            cancel: self.cancel.clone(),
        }
    }
}

/// A resolved, subset and normalized product.
#[derive(Debug, Clone)]
pub struct ResolvedProduct {
    pub family: ModelFamily,
    pub product: Stitched,
    /// Run of the first period in the product
    pub run: RunDescriptor,
    /// Run the extended period came from, when one was stitched in
    pub extended_run: Option<RunDescriptor>,
    pub partial: Option<PartialPeriod>,
    /// Every attempt made, across both periods
    pub attempts: Vec<RetrievalAttempt>,
}

impl ResolvedProduct {
    pub fn dataset(&self) -> &GriddedDataset {
        self.product.primary()
    }

    pub fn is_partial(&self) -> bool {
        self.partial.is_some()
    }

    pub fn summary(&self) -> ProductSummary {
        let ds = self.dataset();
        ProductSummary {
            family: self.family,
            run: self.run,
            extended_run: self.extended_run,
            partial: self.partial.clone(),
            shape: ds.shape(),
            variables: ds.variable_names(),
            valid_times: self.product.valid_times(),
            lon_range: axis_range(ds.signed_lon.as_deref().unwrap_or(&ds.lon)),
            lat_range: axis_range(&ds.lat),
            attempts: self.attempts.clone(),
        }
    }
}

/// Serializable overview of a product, without the data arrays.
#[derive(Debug, Clone, Serialize)]
pub struct ProductSummary {
    pub family: ModelFamily,
    pub run: RunDescriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended_run: Option<RunDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial: Option<PartialPeriod>,
    /// `[member, time, level, lat, lon]` of the primary dataset
    pub shape: [usize; 5],
    pub variables: Vec<String>,
    pub valid_times: Vec<DateTime<Utc>>,
    pub lon_range: Option<(f64, f64)>,
    pub lat_range: Option<(f64, f64)>,
    pub attempts: Vec<RetrievalAttempt>,
}

fn axis_range(axis: &[f64]) -> Option<(f64, f64)> {
    Some((*axis.first()?, *axis.last()?))
}

/// One fetched, windowed period.
struct Period {
    dataset: GriddedDataset,
    run: RunDescriptor,
}

pub struct Resolver {
    catalog: Arc<SourceCatalog>,
    executor: FetchExecutor,
    stitcher: PeriodStitcher,
    normalizer: DatasetNormalizer,
}

impl Resolver {
    pub fn new(catalog: Arc<SourceCatalog>, executor: FetchExecutor, stitcher: PeriodStitcher) -> Self {
        Self {
            catalog,
            executor,
            stitcher,
            normalizer: DatasetNormalizer::new(),
        }
    }

    /// Production wiring: HTTP transport, GRIB2 decoder, configured profiles.
    pub fn from_config(config: &ResolverConfig) -> ResolveResult<Self> {
        config.validate()?;
        let catalog = Arc::new(SourceCatalog::from_profiles(config.profiles()));
        let executor = FetchExecutor::new(
            catalog.clone(),
            Arc::new(HttpTransport::new(&config.transport())?),
            Arc::new(Grib2Decoder::new()),
            Arc::new(StagingArea::new(config.staging_dir.clone())),
            config.attempt_timeout(),
        );
        Ok(Self::new(
            catalog,
            executor,
            PeriodStitcher::new(config.stitch_mode),
        ))
    }

    pub fn catalog(&self) -> &SourceCatalog {
        &self.catalog
    }

    #[instrument(skip_all, fields(family = %request.family, period = ?request.period))]
    pub async fn resolve(&self, request: &ResolveRequest) -> ResolveResult<ResolvedProduct> {
        let profile = self.catalog.profile(request.family)?;
        let window = RegionWindow::new(&request.region, profile.convention)?;
        let overridden = self.validated_override(profile, request)?;

        let first_kind = match request.period {
            PeriodRequest::Extended => PeriodKind::Extended,
            PeriodRequest::Short | PeriodRequest::Both => PeriodKind::Short,
        };
        let first_leads = period_leads(profile, first_kind)?;
        let first_candidates = match overridden {
            Some(run) => vec![run],
            None => RunClock::from_profile(profile).candidates(&request.reference, first_leads)?,
        };

        let mut attempts = Vec::new();
        let first = self
            .fetch_period(&first_candidates, &window, request, &mut attempts)
            .await?;
        info!(
            family = %request.family,
            run = %first.run,
            period = %first_kind,
            "Resolved period"
        );

        let extended_leads = match request.period {
            PeriodRequest::Both => profile.extended,
            PeriodRequest::Short | PeriodRequest::Extended => None,
        };

        let Some(extended_leads) = extended_leads else {
            let dataset = self.normalizer.normalize(first.dataset)?;
            return Ok(ResolvedProduct {
                family: request.family,
                product: Stitched::Sequence(dataset),
                run: first.run,
                extended_run: None,
                partial: None,
                attempts,
            });
        };

        // The extended period comes from the short run or an older one
        let extended_candidates: Vec<RunDescriptor> = match overridden {
            Some(run) => vec![run.with_leads(extended_leads)],
            None => RunClock::from_profile(profile)
                .with_min_age(Duration::zero())
                .issue_times(&first.run.issued)
                .into_iter()
                .map(|issued| aligned_extended(&first.run, issued, extended_leads))
                .collect(),
        };

        match self
            .fetch_period(&extended_candidates, &window, request, &mut attempts)
            .await
        {
            Ok(extended) => {
                let stitched = self.stitcher.stitch(first.dataset, extended.dataset)?;
                Ok(ResolvedProduct {
                    family: request.family,
                    product: self.normalize_stitched(stitched)?,
                    run: first.run,
                    extended_run: Some(extended.run),
                    partial: None,
                    attempts,
                })
            }
            Err(err @ ResolveError::StaleData { .. }) => {
                let marker = PartialPeriod::from_error(PeriodKind::Extended, &err);
                warn!(
                    family = %request.family,
                    run = %first.run,
                    reason = %marker.reason,
                    "Extended period unavailable, returning short period only"
                );
                let dataset = self.normalizer.normalize(first.dataset)?;
                Ok(ResolvedProduct {
                    family: request.family,
                    product: Stitched::Sequence(dataset),
                    run: first.run,
                    extended_run: None,
                    partial: Some(marker),
                    attempts,
                })
            }
            Err(err) => Err(err),
        }
    }

    /// One cascade pass plus the region cut.
    ///
    /// Attempts from the pass are appended to `log`. On failure the log
    /// gathered so far is folded into the returned error.
    async fn fetch_period(
        &self,
        candidates: &[RunDescriptor],
        window: &RegionWindow,
        request: &ResolveRequest,
        log: &mut Vec<RetrievalAttempt>,
    ) -> ResolveResult<Period> {
        let outcome = match self
            .executor
            .fetch_first(candidates, &request.region, &request.fetch_options())
            .await
        {
            Ok(outcome) => outcome,
            Err(ResolveError::StaleData { family, attempts }) => {
                log.extend(attempts);
                return Err(ResolveError::StaleData {
                    family,
                    attempts: log.clone(),
                });
            }
            Err(ResolveError::Cancelled { attempts }) => {
                log.extend(attempts);
                return Err(ResolveError::Cancelled {
                    attempts: log.clone(),
                });
            }
            Err(other) => return Err(other),
        };

        let FetchOutcome {
            dataset,
            run,
            endpoints,
            attempts,
            retrieved_at,
        } = outcome;
        log.extend(attempts.iter().cloned());

        let mut dataset = window.apply(&dataset)?;
        dataset.provenance = Some(Provenance {
            run,
            endpoints,
            retrieved_at,
            attempts,
        });
        Ok(Period { dataset, run })
    }

    fn validated_override(
        &self,
        profile: &FamilyProfile,
        request: &ResolveRequest,
    ) -> ResolveResult<Option<RunDescriptor>> {
        let Some(run) = request.run_override else {
            return Ok(None);
        };
        if run.family != request.family {
            return Err(ResolveError::invalid_input(format!(
                "run override is for {}, request is for {}",
                run.family, request.family
            )));
        }
        RunDescriptor::new(profile, run.issued, run.leads).map(Some)
    }

    fn normalize_stitched(&self, stitched: Stitched) -> ResolveResult<Stitched> {
        Ok(match stitched {
            Stitched::Sequence(ds) => Stitched::Sequence(self.normalizer.normalize(ds)?),
            Stitched::Pair { short, extended } => Stitched::Pair {
                short: self.normalizer.normalize(short)?,
                extended: self.normalizer.normalize(extended)?,
            },
        })
    }
}

/// Extended run at `issued`, with its lead range shifted so its valid times
/// match those the short run's own extended period would have.
fn aligned_extended(short: &RunDescriptor, issued: DateTime<Utc>, leads: LeadHours) -> RunDescriptor {
    let offset = u32::try_from((short.issued - issued).num_hours()).unwrap_or(0);
    RunDescriptor {
        family: short.family,
        issued,
        leads: LeadHours::new(leads.start + offset, leads.end + offset, leads.step),
    }
}

fn period_leads(profile: &FamilyProfile, period: PeriodKind) -> ResolveResult<LeadHours> {
    profile.leads_for(period).ok_or_else(|| {
        ResolveError::invalid_input(format!(
            "{} does not publish a {} period",
            profile.family, period
        ))
    })
}
