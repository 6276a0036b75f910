//! Uniform time and longitude metadata.

use wx_common::{GriddedDataset, ResolveError, ResolveResult};

/// Attaches `valid_time`, `signed_lon`, `elapsed_hours` and `lead_index`.
///
/// Pure and idempotent: normalizing a normalized dataset changes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatasetNormalizer;

impl DatasetNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, mut dataset: GriddedDataset) -> ResolveResult<GriddedDataset> {
        self.normalize_in_place(&mut dataset)?;
        Ok(dataset)
    }

    pub fn normalize_in_place(&self, dataset: &mut GriddedDataset) -> ResolveResult<()> {
        let expected = dataset.values_per_variable();
        if let Some(var) = dataset.variables.values().find(|v| v.data.len() != expected) {
            return Err(ResolveError::invalid_input(format!(
                "variable {} has {} values for shape {:?}",
                var.name,
                var.data.len(),
                dataset.shape()
            )));
        }
        if dataset.lead_hours.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ResolveError::invalid_input(format!(
                "lead hours are not strictly increasing: {:?}",
                dataset.lead_hours
            )));
        }

        let steps = dataset.lead_hours.len();
        if dataset.valid_time.as_ref().map(Vec::len) != Some(steps) {
            dataset.valid_time = Some(dataset.computed_valid_times());
        }

        dataset.signed_lon = Some(dataset.lon_convention.signed_axis(&dataset.lon));

        let reference = dataset.reference_time;
        dataset.elapsed_hours = dataset.valid_time.as_ref().map(|times| {
            times
                .iter()
                .map(|t| (*t - reference).num_seconds() as f64 / 3600.0)
                .collect()
        });
        dataset.lead_index = Some((0..steps).collect());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use test_utils::{ramp_dataset, series_dataset, GridAxes};
    use wx_common::LonConvention;

    fn issued() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 18, 0, 0).unwrap()
    }

    #[test]
    fn test_valid_time_from_issuance() {
        let ds = DatasetNormalizer
            .normalize(series_dataset(issued(), &[0, 6, 12]))
            .unwrap();
        let times = ds.valid_time.unwrap();
        assert_eq!(times[2], Utc.with_ymd_and_hms(2024, 1, 16, 6, 0, 0).unwrap());
        assert_eq!(ds.elapsed_hours.unwrap(), vec![0.0, 6.0, 12.0]);
        assert_eq!(ds.lead_index.unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_idempotent() {
        let once = DatasetNormalizer
            .normalize(series_dataset(issued(), &[0, 3, 6]))
            .unwrap();
        let twice = DatasetNormalizer.normalize(once.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_signed_longitudes_for_zero_to_360() {
        let axes = GridAxes::regular(230.0, 300.0, 10.0, 50.0, 20.0, -10.0);
        let ds = DatasetNormalizer
            .normalize(ramp_dataset(&axes, LonConvention::ZeroTo360))
            .unwrap();
        assert_eq!(ds.lon[0], 230.0);
        let signed = ds.signed_lon.unwrap();
        assert_eq!(signed[0], -130.0);
        assert_eq!(signed[7], -60.0);
    }

    #[test]
    fn test_antimeridian_slice_runs_west_to_east() {
        let axes = GridAxes::regular(180.0, 190.0, 0.25, 10.0, -10.0, -0.25);
        let ds = DatasetNormalizer
            .normalize(ramp_dataset(&axes, LonConvention::ZeroTo360))
            .unwrap();
        let signed = ds.signed_lon.unwrap();
        assert_eq!(signed[0], -180.0);
        assert_eq!(signed.last().copied(), Some(-170.0));
        assert!(signed.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_rejects_disordered_leads() {
        let mut ds = series_dataset(issued(), &[0, 6]);
        ds.lead_hours = vec![6, 0];
        assert!(matches!(
            DatasetNormalizer.normalize(ds),
            Err(ResolveError::InvalidInput(_))
        ));
    }
}
