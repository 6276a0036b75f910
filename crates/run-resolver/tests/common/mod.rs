//! In-process collaborators for cascade and resolver tests.
//!
//! `FakeTransport` answers from a rule over the endpoint and records every
//! request. `FakeDecoder` ignores the file body and synthesizes a global
//! one-degree grid for the endpoint.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use run_resolver::{
    FetchExecutor, GridDecoder, PeriodStitcher, Resolver, SourceCatalog, StagingArea, StitchMode,
    Transport, TransportError,
};
use wx_common::{
    GriddedDataset, LonConvention, ResolveError, ResolveResult, SourceEndpoint,
    Variable,
};

/// How the fake server answers one request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reply {
    Ok,
    Status(u16),
    Network,
    /// Never answers within any sane timeout
    Hang,
    /// Answers successfully after this many milliseconds
    Slow(u64),
}

type Rule = dyn Fn(&SourceEndpoint) -> Reply + Send + Sync;

pub struct FakeTransport {
    rule: Box<Rule>,
    requests: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn new(rule: impl Fn(&SourceEndpoint) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            rule: Box::new(rule),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every run issued at or before `cutoff` is published.
    pub fn published_until(cutoff: DateTime<Utc>) -> Self {
        Self::new(move |ep| {
            if ep.run.issued <= cutoff {
                Reply::Ok
            } else {
                Reply::Status(404)
            }
        })
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn fetch(&self, endpoint: &SourceEndpoint, dest: &Path) -> Result<u64, TransportError> {
        self.requests.lock().unwrap().push(endpoint.address.clone());
        match (self.rule)(endpoint) {
            Reply::Ok => {
                tokio::fs::write(dest, endpoint.address.as_bytes()).await?;
                Ok(endpoint.address.len() as u64)
            }
            Reply::Status(status) => Err(TransportError::Http {
                status,
                url: endpoint.address.clone(),
            }),
            Reply::Network => Err(TransportError::Network("connection reset".to_string())),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(0)
            }
            Reply::Slow(millis) => {
                tokio::time::sleep(Duration::from_millis(millis)).await;
                tokio::fs::write(dest, endpoint.address.as_bytes()).await?;
                Ok(endpoint.address.len() as u64)
            }
        }
    }
}

type CorruptRule = dyn Fn(&SourceEndpoint) -> bool + Send + Sync;

pub struct FakeDecoder {
    corrupt: Box<CorruptRule>,
    omit: Option<String>,
}

impl FakeDecoder {
    pub fn new() -> Self {
        Self {
            corrupt: Box::new(|_| false),
            omit: None,
        }
    }

    /// Files matching `rule` fail to decode.
    pub fn corrupt_when(rule: impl Fn(&SourceEndpoint) -> bool + Send + Sync + 'static) -> Self {
        Self {
            corrupt: Box::new(rule),
            omit: None,
        }
    }

    /// Decoded files silently lack `variable`.
    pub fn omitting(variable: &str) -> Self {
        Self {
            corrupt: Box::new(|_| false),
            omit: Some(variable.to_string()),
        }
    }
}

/// One-degree global axes in `convention`, north to south.
pub fn global_axes(convention: LonConvention) -> (Vec<f64>, Vec<f64>) {
    let lon = match convention {
        LonConvention::ZeroTo360 => (0..360).map(f64::from).collect(),
        LonConvention::Signed | LonConvention::PositiveWest => {
            (-180..180).map(f64::from).collect()
        }
    };
    let lat = (0..=180).map(|j| 90.0 - f64::from(j)).collect();
    (lon, lat)
}

/// Value stored for every point of a decoded file: the lead hour plus
/// 1000 per ensemble member.
pub fn marker_value(endpoint: &SourceEndpoint) -> f32 {
    endpoint.lead_hour as f32 + endpoint.member.unwrap_or(0) as f32 * 1000.0
}

impl GridDecoder for FakeDecoder {
    fn decode(
        &self,
        path: &Path,
        endpoint: &SourceEndpoint,
        convention: LonConvention,
    ) -> ResolveResult<GriddedDataset> {
        if !path.exists() {
            return Err(ResolveError::decode(format!("{} missing", path.display())));
        }
        if (self.corrupt)(endpoint) {
            return Err(ResolveError::decode("truncated GRIB2 message"));
        }

        let (lon, lat) = global_axes(convention);
        let field = lon.len() * lat.len();
        let mut ds = GriddedDataset::new(lon, lat, convention, endpoint.run.issued, endpoint.lead_hour);
        ds.member = vec![endpoint.member.unwrap_or(0)];

        let names: Vec<String> = match &endpoint.variable {
            Some(var) => vec![var.clone()],
            None if endpoint.expected_variables.is_empty() => vec!["FIELD".to_string()],
            None => endpoint.expected_variables.clone(),
        };
        for name in names {
            if self.omit.as_deref() == Some(name.as_str()) {
                continue;
            }
            let data = vec![marker_value(endpoint); field];
            ds.insert_variable(Variable::new(name, "", data))?;
        }
        Ok(ds)
    }
}

pub struct Harness {
    pub transport: Arc<FakeTransport>,
    pub executor: FetchExecutor,
    pub catalog: Arc<SourceCatalog>,
    pub staging: tempfile::TempDir,
}

pub fn harness(transport: FakeTransport, decoder: FakeDecoder) -> Harness {
    harness_with_timeout(transport, decoder, Duration::from_secs(5))
}

pub fn harness_with_timeout(
    transport: FakeTransport,
    decoder: FakeDecoder,
    attempt_timeout: Duration,
) -> Harness {
    let staging = tempfile::tempdir().unwrap();
    let catalog = Arc::new(SourceCatalog::builtin());
    let transport = Arc::new(transport);
    let executor = FetchExecutor::new(
        catalog.clone(),
        transport.clone(),
        Arc::new(decoder),
        Arc::new(StagingArea::new(staging.path())),
        attempt_timeout,
    );
    Harness {
        transport,
        executor,
        catalog,
        staging,
    }
}

impl Harness {
    pub fn into_resolver(self, mode: StitchMode) -> (Resolver, Arc<FakeTransport>, tempfile::TempDir) {
        let resolver = Resolver::new(self.catalog, self.executor, PeriodStitcher::new(mode));
        (resolver, self.transport, self.staging)
    }
}
