//! Joining short-range and extended-range products.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use wx_common::{GriddedDataset, PeriodKind, ResolveError, ResolveResult};

/// How stitched periods are handed back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StitchMode {
    /// One dataset with extended time steps appended after the short ones.
    #[default]
    Concatenate,
    /// Both datasets, side by side.
    Pair,
}

/// Result of stitching.
#[derive(Debug, Clone)]
pub enum Stitched {
    Sequence(GriddedDataset),
    Pair {
        short: GriddedDataset,
        extended: GriddedDataset,
    },
}

impl Stitched {
    /// The dataset that starts the sequence.
    pub fn primary(&self) -> &GriddedDataset {
        match self {
            Stitched::Sequence(ds) => ds,
            Stitched::Pair { short, .. } => short,
        }
    }

    pub fn datasets(&self) -> Vec<&GriddedDataset> {
        match self {
            Stitched::Sequence(ds) => vec![ds],
            Stitched::Pair { short, extended } => vec![short, extended],
        }
    }

    /// Every valid time in order, across both periods.
    pub fn valid_times(&self) -> Vec<DateTime<Utc>> {
        match self {
            Stitched::Sequence(ds) => valid_times(ds),
            Stitched::Pair { short, extended } => {
                let mut times = valid_times(short);
                times.extend(valid_times(extended));
                times
            }
        }
    }
}

/// Marker attached when one of the periods could not be retrieved.
///
/// Never an error: the product is still usable, just shorter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialPeriod {
    pub missing: PeriodKind,
    /// `ResolveError::kind()` of the failure
    pub reason: String,
    pub message: String,
}

impl PartialPeriod {
    pub fn from_error(missing: PeriodKind, err: &ResolveError) -> Self {
        Self {
            missing,
            reason: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

fn valid_times(ds: &GriddedDataset) -> Vec<DateTime<Utc>> {
    ds.valid_time
        .clone()
        .unwrap_or_else(|| ds.computed_valid_times())
}

/// Aligns the two periods of a product.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeriodStitcher {
    mode: StitchMode,
}

impl PeriodStitcher {
    pub fn new(mode: StitchMode) -> Self {
        Self { mode }
    }

    /// Join `short` and `extended`.
    ///
    /// The extended product's first valid time must not precede the short
    /// product's last. If the two are equal the leading extended step is
    /// dropped.
    pub fn stitch(
        &self,
        short: GriddedDataset,
        mut extended: GriddedDataset,
    ) -> ResolveResult<Stitched> {
        let short_times = valid_times(&short);
        let ext_times = valid_times(&extended);
        let (Some(short_last), Some(ext_first)) = (short_times.last(), ext_times.first()) else {
            return Err(ResolveError::invalid_input(
                "cannot stitch a period with no time steps",
            ));
        };

        if ext_first < short_last {
            return Err(ResolveError::invalid_input(format!(
                "extended period starts at {ext_first}, before the short period ends at {short_last}"
            )));
        }
        if ext_first == short_last {
            debug!(valid_time = %ext_first, "Dropping duplicate boundary step");
            extended.drop_leading_times(1);
        }

        match self.mode {
            StitchMode::Pair => Ok(Stitched::Pair { short, extended }),
            StitchMode::Concatenate => {
                let combined = concatenate(short, extended)?;
                info!(
                    steps = combined.lead_hours.len(),
                    "Stitched short and extended periods"
                );
                Ok(Stitched::Sequence(combined))
            }
        }
    }
}

/// Append `extended` to `short`, re-expressing extended lead hours against
/// the short product's issuance.
fn concatenate(
    mut short: GriddedDataset,
    mut extended: GriddedDataset,
) -> ResolveResult<GriddedDataset> {
    let rebased: Vec<u32> = valid_times(&extended)
        .iter()
        .map(|t| (*t - short.reference_time).num_hours())
        .map(|h| {
            u32::try_from(h).map_err(|_| {
                ResolveError::invalid_input(format!("extended step {h}h precedes short issuance"))
            })
        })
        .collect::<ResolveResult<_>>()?;

    extended.lead_hours = rebased;
    extended.reference_time = short.reference_time;
    extended.valid_time = None;
    extended.elapsed_hours = None;
    extended.lead_index = None;

    short.concat_time(&extended)?;

    if let (Some(prov), Some(ext_prov)) = (short.provenance.as_mut(), extended.provenance) {
        prov.endpoints.extend(ext_prov.endpoints);
        prov.attempts.extend(ext_prov.attempts);
    }
    Ok(short)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use test_utils::series_dataset;

    fn issued(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_equal_boundary_drops_duplicate() {
        let short = series_dataset(issued(12), &[0, 6, 12, 18, 24]);
        let extended = series_dataset(issued(12), &[24, 36, 48]);

        let stitched = PeriodStitcher::new(StitchMode::Concatenate)
            .stitch(short, extended)
            .unwrap();
        let Stitched::Sequence(ds) = stitched else {
            panic!("expected a sequence");
        };
        assert_eq!(ds.lead_hours, vec![0, 6, 12, 18, 24, 36, 48]);
        assert_eq!(ds.variables["TMP"].data.len(), 7 * ds.field_len());
    }

    #[test]
    fn test_overlap_is_rejected() {
        let short = series_dataset(issued(12), &[0, 6, 12, 18, 24]);
        let extended = series_dataset(issued(12), &[18, 30]);
        let err = PeriodStitcher::new(StitchMode::Concatenate)
            .stitch(short, extended)
            .unwrap_err();
        assert!(matches!(err, ResolveError::InvalidInput(_)));
    }

    #[test]
    fn test_older_extended_run_is_rebased() {
        // Short from 12Z, extended from the 06Z run: f030 of 06Z is 12Z+24h
        let short = series_dataset(issued(12), &[0, 12, 24]);
        let extended = series_dataset(issued(6), &[30, 42]);

        let stitched = PeriodStitcher::new(StitchMode::Concatenate)
            .stitch(short, extended)
            .unwrap();
        let ds = stitched.primary();
        assert_eq!(ds.reference_time, issued(12));
        assert_eq!(ds.lead_hours, vec![0, 12, 24, 36]);
    }

    #[test]
    fn test_pair_mode_keeps_both() {
        let short = series_dataset(issued(0), &[0, 6]);
        let extended = series_dataset(issued(0), &[12, 24]);
        match PeriodStitcher::new(StitchMode::Pair).stitch(short, extended).unwrap() {
            Stitched::Pair { short, extended } => {
                assert_eq!(short.lead_hours, vec![0, 6]);
                assert_eq!(extended.lead_hours, vec![12, 24]);
            }
            other => panic!("expected a pair, got {other:?}"),
        }
    }

    #[test]
    fn test_boundary_steps_strictly_increase() {
        for (short_end, ext_start) in [(24, 24), (24, 30), (48, 48), (6, 72)] {
            let short = series_dataset(issued(0), &[0, short_end]);
            let extended = series_dataset(issued(0), &[ext_start, ext_start + 12]);
            for mode in [StitchMode::Concatenate, StitchMode::Pair] {
                let stitched = PeriodStitcher::new(mode)
                    .stitch(short.clone(), extended.clone())
                    .unwrap();
                let times = stitched.valid_times();
                for pair in times.windows(2) {
                    assert!(pair[1] - pair[0] > Duration::zero(), "{mode:?}: {times:?}");
                }
            }
        }
    }

    #[test]
    fn test_grid_mismatch_is_rejected() {
        let short = series_dataset(issued(0), &[0, 6]);
        let mut extended = series_dataset(issued(0), &[12]);
        extended.lat.reverse();
        assert!(PeriodStitcher::new(StitchMode::Concatenate)
            .stitch(short, extended)
            .is_err());
    }

    #[test]
    fn test_partial_marker_from_error() {
        let err = ResolveError::StaleData {
            family: wx_common::ModelFamily::Gfs,
            attempts: Vec::new(),
        };
        let marker = PartialPeriod::from_error(PeriodKind::Extended, &err);
        assert_eq!(marker.reason, "stale_data");
        assert_eq!(marker.missing, PeriodKind::Extended);
    }
}
