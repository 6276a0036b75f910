//! Sequential retrieval cascade.
//!
//! Candidates are tried newest first, one at a time. A candidate either
//! yields a complete dataset (every file fetched and decoded) or is logged as
//! a failed attempt, and the next older candidate is tried. There is no retry
//! against the same endpoint.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use wx_common::{
    AttemptOutcome, FailureKind, FamilyProfile, FileLayout, GriddedDataset, RegionSpec,
    ResolveError, ResolveResult, RetrievalAttempt, RunDescriptor, SourceEndpoint,
};

use crate::catalog::SourceCatalog;
use crate::decoder::GridDecoder;
use crate::staging::{StagingArea, StagingLease};
use crate::transport::Transport;

/// Per-pass knobs.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Upper bound on candidates tried (default: all of them)
    pub attempt_cap: Option<usize>,
    /// Checked between candidates only
    pub cancel: Option<CancellationToken>,
}

/// The first complete candidate and how we got there.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub dataset: GriddedDataset,
    pub run: RunDescriptor,
    pub endpoints: Vec<SourceEndpoint>,
    pub attempts: Vec<RetrievalAttempt>,
    pub retrieved_at: DateTime<Utc>,
}

/// A failed candidate.
#[derive(Debug)]
struct CandidateFailure {
    kind: FailureKind,
    message: String,
}

impl CandidateFailure {
    fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Runs the cascade for one family.
///
/// `attempt_timeout` bounds a whole candidate: every file transfer and
/// decode of that run.
pub struct FetchExecutor {
    catalog: Arc<SourceCatalog>,
    transport: Arc<dyn Transport>,
    decoder: Arc<dyn GridDecoder>,
    staging: Arc<StagingArea>,
    attempt_timeout: Duration,
}

impl FetchExecutor {
    pub fn new(
        catalog: Arc<SourceCatalog>,
        transport: Arc<dyn Transport>,
        decoder: Arc<dyn GridDecoder>,
        staging: Arc<StagingArea>,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            transport,
            decoder,
            staging,
            attempt_timeout,
        }
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Try `candidates` in order and return the first complete dataset.
    ///
    /// Fails with `StaleData` once the candidates (or the attempt cap) are
    /// exhausted, and with `Cancelled` if the token fires between candidates.
    /// Both carry the attempt log.
    #[instrument(skip_all, fields(candidates = candidates.len()))]
    pub async fn fetch_first(
        &self,
        candidates: &[RunDescriptor],
        region: &RegionSpec,
        options: &FetchOptions,
    ) -> ResolveResult<FetchOutcome> {
        let first = candidates
            .first()
            .ok_or_else(|| ResolveError::invalid_input("candidate list is empty"))?;
        let family = first.family;
        if let Some(other) = candidates.iter().find(|c| c.family != family) {
            return Err(ResolveError::invalid_input(format!(
                "candidate list mixes families: {} and {}",
                family, other.family
            )));
        }
        let profile = self.catalog.profile(family)?;
        let cap = options.attempt_cap.unwrap_or(candidates.len());

        let lease = self.staging.acquire(family).await?;

        let mut attempts: Vec<RetrievalAttempt> = Vec::new();
        let mut seen_runs: HashSet<RunDescriptor> = HashSet::new();
        let mut requested: HashSet<(DateTime<Utc>, String)> = HashSet::new();

        for run in candidates {
            // One attempt per distinct run, so the log length is the cap
            if attempts.len() >= cap {
                break;
            }
            if options.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
                info!(family = %family, attempts = attempts.len(), "Resolution cancelled");
                return Err(ResolveError::Cancelled { attempts });
            }
            if !seen_runs.insert(*run) {
                debug!(run = %run, "Skipping duplicate candidate");
                continue;
            }

            let endpoints = self.catalog.endpoints(run, region)?;
            let attempted_at = Utc::now();
            let started = Instant::now();
            let mut addresses = Vec::with_capacity(endpoints.len());

            let deadline = tokio::time::timeout(
                self.attempt_timeout,
                self.try_candidate(&lease, profile, run, &endpoints, &mut requested, &mut addresses),
            )
            .await;
            let result = match deadline {
                Ok(result) => result?,
                Err(_) => Err(CandidateFailure::new(
                    FailureKind::Timeout,
                    format!("{run} did not complete within {:?}", self.attempt_timeout),
                )),
            };

            let elapsed = started.elapsed();
            histogram!("resolver_attempt_duration_ms", "family" => family.as_str())
                .record(elapsed.as_secs_f64() * 1000.0);

            let outcome = match &result {
                Ok(_) => AttemptOutcome::Success,
                Err(failure) => AttemptOutcome::Failure {
                    kind: failure.kind.clone(),
                    message: failure.message.clone(),
                },
            };
            counter!(
                "resolver_attempts_total",
                "family" => family.as_str(),
                "outcome" => outcome.as_label()
            )
            .increment(1);

            attempts.push(RetrievalAttempt {
                run: *run,
                endpoints: addresses,
                attempted_at,
                elapsed_ms: elapsed.as_millis() as u64,
                outcome,
            });

            match result {
                Ok(dataset) => {
                    info!(
                        family = %family,
                        run = %run,
                        attempt = attempts.len(),
                        files = endpoints.len(),
                        "Candidate run complete"
                    );
                    return Ok(FetchOutcome {
                        dataset,
                        run: *run,
                        endpoints,
                        attempts,
                        retrieved_at: Utc::now(),
                    });
                }
                Err(failure) => {
                    warn!(
                        family = %family,
                        run = %run,
                        attempt = attempts.len(),
                        kind = %failure.kind,
                        error = %failure.message,
                        "Candidate run unavailable, advancing"
                    );
                }
            }
        }

        warn!(family = %family, attempts = attempts.len(), "All candidate runs exhausted");
        Err(ResolveError::StaleData { family, attempts })
    }

    /// Fetch and decode every file of one candidate.
    ///
    /// The outer error is for local failures that must surface (staging I/O);
    /// the inner one is a failed candidate.
    async fn try_candidate(
        &self,
        lease: &StagingLease,
        profile: &FamilyProfile,
        run: &RunDescriptor,
        endpoints: &[SourceEndpoint],
        requested: &mut HashSet<(DateTime<Utc>, String)>,
        addresses: &mut Vec<String>,
    ) -> ResolveResult<Result<GriddedDataset, CandidateFailure>> {
        let dir = lease.candidate_dir(run).await?;
        let mut parts: Vec<(&SourceEndpoint, GriddedDataset)> = Vec::with_capacity(endpoints.len());

        for endpoint in endpoints {
            if !requested.insert((run.issued, endpoint.address.clone())) {
                return Ok(Err(CandidateFailure::new(
                    FailureKind::Incomplete,
                    format!("{endpoint} was already requested in this pass"),
                )));
            }
            addresses.push(endpoint.address.clone());

            let failure = match self.fetch_one(endpoint, &dir.join(&endpoint.file_name), profile).await {
                Ok(dataset) => {
                    parts.push((endpoint, dataset));
                    continue;
                }
                Err(failure) => failure,
            };

            // A multi-file run with some files in hand is incomplete, not absent
            if parts.is_empty() {
                return Ok(Err(failure));
            }
            return Ok(Err(CandidateFailure::new(
                FailureKind::Incomplete,
                format!(
                    "{} of {} files retrieved; {}: {}",
                    parts.len(),
                    endpoints.len(),
                    failure.kind,
                    failure.message
                ),
            )));
        }

        match assemble(profile.layout, parts) {
            Ok(dataset) => Ok(Ok(dataset)),
            Err(e) => Ok(Err(CandidateFailure::new(FailureKind::Decode, e.to_string()))),
        }
    }

    async fn fetch_one(
        &self,
        endpoint: &SourceEndpoint,
        dest: &Path,
        profile: &FamilyProfile,
    ) -> Result<GriddedDataset, CandidateFailure> {
        let bytes = self
            .transport
            .fetch(endpoint, dest)
            .await
            .map_err(|e| CandidateFailure::new(e.failure_kind(), format!("{endpoint}: {e}")))?;
        debug!(endpoint = %endpoint, bytes = bytes, "Fetched");

        let decoder = self.decoder.clone();
        let path = dest.to_path_buf();
        let owned = endpoint.clone();
        let convention = profile.convention;
        let decoded = tokio::task::spawn_blocking(move || decoder.decode(&path, &owned, convention))
            .await
            .map_err(|e| CandidateFailure::new(FailureKind::Decode, format!("decode task failed: {e}")))?;

        let dataset = decoded
            .map_err(|e| CandidateFailure::new(FailureKind::Decode, format!("{endpoint}: {e}")))?;

        if !dataset.has_variables(&endpoint.expected_variables) {
            return Err(CandidateFailure::new(
                FailureKind::Incomplete,
                format!(
                    "{endpoint}: expected {:?}, decoded {:?}",
                    endpoint.expected_variables,
                    dataset.variable_names()
                ),
            ));
        }
        Ok(dataset)
    }
}

/// Combine per-file datasets of one run according to the family's layout.
///
/// Parts arrive in catalog order: members or variables outermost, lead hours
/// innermost.
pub fn assemble(
    layout: FileLayout,
    parts: Vec<(&SourceEndpoint, GriddedDataset)>,
) -> ResolveResult<GriddedDataset> {
    let mut groups: Vec<(Option<u32>, Option<String>, GriddedDataset)> = Vec::new();

    for (endpoint, dataset) in parts {
        let key = (endpoint.member, endpoint.variable.clone());
        match groups.last_mut() {
            Some((member, variable, series)) if (*member, variable.clone()) == key => {
                series.concat_time(&dataset)?;
            }
            _ => groups.push((key.0, key.1, dataset)),
        }
    }

    let mut groups = groups.into_iter().map(|(_, _, ds)| ds);
    let mut combined = groups
        .next()
        .ok_or_else(|| ResolveError::decode("run produced no files"))?;

    for next in groups {
        match layout {
            FileLayout::PerMember { .. } => combined.stack_members(&next)?,
            FileLayout::PerVariable => combined.merge_variables(next)?,
            FileLayout::Single | FileLayout::PerLeadHour => {
                return Err(ResolveError::decode(
                    "unexpected member or variable split for a single-series layout",
                ))
            }
        }
    }
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{constant_dataset, sample_endpoint};

    fn part(member: Option<u32>, variable: Option<&str>) -> SourceEndpoint {
        let mut ep = sample_endpoint();
        ep.member = member;
        ep.variable = variable.map(str::to_string);
        ep
    }

    #[test]
    fn test_assemble_per_lead() {
        let ep = part(None, None);
        let parts = vec![
            (&ep, constant_dataset("TMP", 0, 1.0)),
            (&ep, constant_dataset("TMP", 6, 2.0)),
        ];
        let ds = assemble(FileLayout::PerLeadHour, parts).unwrap();
        assert_eq!(ds.lead_hours, vec![0, 6]);
    }

    #[test]
    fn test_assemble_per_member() {
        let m1 = part(Some(1), None);
        let m2 = part(Some(2), None);
        let mut second = constant_dataset("TMP", 0, 3.0);
        second.member = vec![2];
        let mut second_late = constant_dataset("TMP", 6, 4.0);
        second_late.member = vec![2];
        let parts = vec![
            (&m1, constant_dataset("TMP", 0, 1.0)),
            (&m1, constant_dataset("TMP", 6, 2.0)),
            (&m2, second),
            (&m2, second_late),
        ];
        let ds = assemble(FileLayout::PerMember { members: 2 }, parts).unwrap();
        assert_eq!(ds.shape()[0], 2);
        assert_eq!(ds.shape()[1], 2);
        let idx = ds.index(1, 1, 0, 0, 0);
        assert_eq!(ds.variables["TMP"].data[idx], 4.0);
    }

    #[test]
    fn test_assemble_per_variable() {
        let tmp = part(None, Some("TMP"));
        let prmsl = part(None, Some("PRMSL"));
        let parts = vec![
            (&tmp, constant_dataset("TMP", 0, 280.0)),
            (&prmsl, constant_dataset("PRMSL", 0, 101325.0)),
        ];
        let ds = assemble(FileLayout::PerVariable, parts).unwrap();
        assert_eq!(ds.variable_names(), vec!["PRMSL".to_string(), "TMP".to_string()]);
    }

    #[test]
    fn test_assemble_empty_is_error() {
        assert!(assemble(FileLayout::Single, Vec::new()).is_err());
    }
}
