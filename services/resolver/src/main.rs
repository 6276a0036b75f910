//! Forecast-run resolver CLI.
//!
//! Resolves one request end to end:
//! - Picks candidate runs from the reference instant and the family's cycles
//! - Walks the cascade until a complete run is retrieved
//! - Subsets to the region and stitches short and extended periods
//! - Prints a JSON summary (and optionally the full dataset) to stdout

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use run_resolver::{PeriodRequest, ResolveRequest, Resolver, ResolverConfig, StitchMode};
use wx_common::{parse_reference_instant, ModelFamily, RegionSpec, RunDescriptor};

#[derive(Parser, Debug)]
#[command(name = "wx-resolve")]
#[command(about = "Resolve and retrieve the newest available forecast run for a region")]
struct Args {
    /// Model family (gfs, gefs, ecmwf, gdps, mrms)
    #[arg(short, long, env = "WX_FAMILY")]
    family: ModelFamily,

    /// Region as west,south,east,north in signed degrees
    #[arg(short, long, env = "WX_REGION", default_value = "-125,24,-65,50", allow_hyphen_values = true)]
    region: RegionSpec,

    /// Reference instant (RFC 3339 with offset). Defaults to now.
    #[arg(long)]
    reference: Option<String>,

    /// Periods to resolve: short, extended or both
    #[arg(short, long, default_value = "short")]
    period: PeriodRequest,

    /// Fetch this issuance (RFC 3339) instead of searching for one
    #[arg(long)]
    run: Option<String>,

    /// Stop after this many candidate runs
    #[arg(long)]
    attempt_cap: Option<usize>,

    /// Override the configured stitch mode
    #[arg(long, value_parser = parse_stitch_mode)]
    stitch_mode: Option<StitchMode>,

    /// Resolver configuration file
    #[arg(long, env = "WX_RESOLVER_CONFIG", default_value = "config/resolver.yaml")]
    config: PathBuf,

    /// Override the configured staging directory
    #[arg(long, env = "WX_STAGING_DIR")]
    staging_dir: Option<PathBuf>,

    /// Also write the full resolved dataset as JSON to this file
    #[arg(long)]
    output: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn parse_stitch_mode(s: &str) -> Result<StitchMode, String> {
    match s.trim().to_lowercase().as_str() {
        "concatenate" => Ok(StitchMode::Concatenate),
        "pair" => Ok(StitchMode::Pair),
        other => Err(format!("unknown stitch mode '{other}', expected concatenate or pair")),
    }
}

fn load_config(path: &Path) -> Result<ResolverConfig> {
    if !path.exists() {
        warn!(path = %path.display(), "Config file not found, using built-in defaults");
        return Ok(ResolverConfig::default());
    }
    ResolverConfig::load(path)
        .with_context(|| format!("Failed to load resolver config from {}", path.display()))
}

fn build_request(args: &Args, config: &ResolverConfig) -> Result<ResolveRequest> {
    let reference: DateTime<Utc> = match &args.reference {
        Some(s) => parse_reference_instant(s).context("Invalid --reference")?,
        None => Utc::now(),
    };

    let mut request = ResolveRequest::new(args.family, reference, args.region)
        .with_period(args.period);

    if let Some(run) = &args.run {
        let issued = parse_reference_instant(run).context("Invalid --run")?;
        let profile = config
            .profiles()
            .into_iter()
            .find(|p| p.family == args.family)
            .with_context(|| format!("No profile for {}", args.family))?;
        let leads = match args.period {
            PeriodRequest::Extended => profile
                .extended
                .with_context(|| format!("{} has no extended period", args.family))?,
            PeriodRequest::Short | PeriodRequest::Both => profile.short,
        };
        let run = RunDescriptor::new(&profile, issued, leads).context("Invalid --run")?;
        request = request.with_run(run);
    }
    if let Some(cap) = args.attempt_cap {
        request = request.with_attempt_cap(cap);
    }
    Ok(request)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so stdout stays machine-readable
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .json()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = load_config(&args.config)?;
    if let Some(dir) = &args.staging_dir {
        config.staging_dir = dir.clone();
    }
    if let Some(mode) = args.stitch_mode {
        config.stitch_mode = mode;
    }

    let resolver = Resolver::from_config(&config).context("Failed to build resolver")?;
    let cancel = CancellationToken::new();
    let request = build_request(&args, &config)?.with_cancel(cancel.clone());

    // Ctrl+C stops the cascade at the next candidate boundary
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        cancel.cancel();
    });

    info!(
        family = %request.family,
        reference = %request.reference,
        region = %request.region,
        period = ?request.period,
        "Resolving"
    );

    let product = match resolver.resolve(&request).await {
        Ok(product) => product,
        Err(e) => {
            let report = serde_json::json!({
                "error": e.kind(),
                "message": e.to_string(),
                "attempts": e.attempts(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            error!(kind = e.kind(), error = %e, "Resolution failed");
            return Err(e).context("Resolution failed");
        }
    };

    if let Some(path) = &args.output {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        serde_json::to_writer(std::io::BufWriter::new(file), &product.product.datasets())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "Wrote dataset");
    }

    println!("{}", serde_json::to_string_pretty(&product.summary())?);
    info!(
        run = %product.run,
        attempts = product.attempts.len(),
        partial = product.is_partial(),
        "Resolution complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_args() {
        let args = Args::try_parse_from(["wx-resolve", "--family", "gfs"]).unwrap();
        assert_eq!(args.family, ModelFamily::Gfs);
        assert_eq!(args.region, RegionSpec::conus());
        assert_eq!(args.period, PeriodRequest::Short);
    }

    #[test]
    fn test_parse_negative_region() {
        let args = Args::try_parse_from([
            "wx-resolve",
            "--family",
            "gdps",
            "--region",
            "-140,45,-120,60",
        ])
        .unwrap();
        assert_eq!(args.region, RegionSpec::new(-140.0, -120.0, 45.0, 60.0).unwrap());
    }

    #[test]
    fn test_rejects_unknown_family() {
        assert!(Args::try_parse_from(["wx-resolve", "--family", "hrrr_ak"]).is_err());
    }

    #[test]
    fn test_build_request_with_run_override() {
        let args = Args::try_parse_from([
            "wx-resolve",
            "--family",
            "ecmwf",
            "--period",
            "both",
            "--run",
            "2024-01-15T12:00:00Z",
            "--reference",
            "2024-01-15T20:00:00+02:00",
        ])
        .unwrap();
        let request = build_request(&args, &ResolverConfig::default()).unwrap();
        let run = request.run_override.unwrap();
        assert_eq!(run.family, ModelFamily::Ecmwf);
        assert_eq!(run.cycle(), 12);
        assert_eq!(request.reference.to_rfc3339(), "2024-01-15T18:00:00+00:00");
    }

    #[test]
    fn test_naive_reference_is_rejected() {
        let args = Args::try_parse_from([
            "wx-resolve",
            "--family",
            "gfs",
            "--reference",
            "2024-01-15T12:00:00",
        ])
        .unwrap();
        assert!(build_request(&args, &ResolverConfig::default()).is_err());
    }
}
