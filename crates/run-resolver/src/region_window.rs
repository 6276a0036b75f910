//! Geographic subsetting in the provider's native coordinates.

use tracing::debug;

use wx_common::{GriddedDataset, LonConvention, LonSpan, RegionSpec, ResolveError, ResolveResult};

const EPSILON: f64 = 1e-9;

/// A caller's region translated into one provider convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionWindow {
    pub convention: LonConvention,
    pub lon: LonSpan,
    pub south: f64,
    pub north: f64,
}

impl RegionWindow {
    pub fn new(region: &RegionSpec, convention: LonConvention) -> ResolveResult<Self> {
        region.validate()?;
        Ok(Self {
            convention,
            lon: convention.native_span(region.west, region.east),
            south: region.south,
            north: region.north,
        })
    }

    /// Native longitude bounds in slicing order.
    pub fn lon_bounds(&self) -> (f64, f64) {
        self.lon.bounds()
    }

    /// Longitude indices to keep, in output order.
    ///
    /// Contiguous spans keep native order. Wrapped spans emit `lo..360`
    /// first and then `0..=hi`, so the result runs west to east across the
    /// seam.
    pub fn lon_indices(&self, lon: &[f64]) -> Vec<usize> {
        match self.lon {
            LonSpan::Contiguous { lo, hi } => (0..lon.len())
                .filter(|&i| lon[i] >= lo - EPSILON && lon[i] <= hi + EPSILON)
                .collect(),
            LonSpan::Wrapped { lo, hi } => {
                let mut before_seam: Vec<usize> =
                    (0..lon.len()).filter(|&i| lon[i] >= lo - EPSILON).collect();
                let mut after_seam: Vec<usize> = (0..lon.len())
                    .filter(|&i| lon[i] <= hi + EPSILON && lon[i] < lo - EPSILON)
                    .collect();
                sort_by_coordinate(&mut before_seam, lon);
                sort_by_coordinate(&mut after_seam, lon);
                before_seam.extend(after_seam);
                before_seam
            }
        }
    }

    /// Latitude indices to keep, in native order (ascending or descending).
    pub fn lat_indices(&self, lat: &[f64]) -> Vec<usize> {
        (0..lat.len())
            .filter(|&j| lat[j] >= self.south - EPSILON && lat[j] <= self.north + EPSILON)
            .collect()
    }

    /// Slice a dataset to the window.
    ///
    /// The dataset must be in this window's convention.
    pub fn apply(&self, dataset: &GriddedDataset) -> ResolveResult<GriddedDataset> {
        if dataset.lon_convention != self.convention {
            return Err(ResolveError::invalid_input(format!(
                "dataset longitudes are {} but the window is {}",
                dataset.lon_convention, self.convention
            )));
        }

        let lon_idx = self.lon_indices(&dataset.lon);
        let lat_idx = self.lat_indices(&dataset.lat);
        if lon_idx.is_empty() || lat_idx.is_empty() {
            return Err(ResolveError::EmptyRegion {
                lon_points: lon_idx.len(),
                lat_points: lat_idx.len(),
                message: format!(
                    "window {:?} lat {}..{} against grid lon {:?} lat {:?}",
                    self.lon,
                    self.south,
                    self.north,
                    axis_extent(&dataset.lon),
                    axis_extent(&dataset.lat)
                ),
            });
        }

        debug!(
            convention = %self.convention,
            lon_points = lon_idx.len(),
            lat_points = lat_idx.len(),
            wrapped = self.lon.is_wrapped(),
            "Applied region window"
        );
        Ok(dataset.select_horizontal(&lon_idx, &lat_idx))
    }
}

fn sort_by_coordinate(indices: &mut [usize], axis: &[f64]) {
    indices.sort_by(|a, b| axis[*a].total_cmp(&axis[*b]));
}

fn axis_extent(axis: &[f64]) -> Option<(f64, f64)> {
    let min = axis.iter().copied().reduce(f64::min)?;
    let max = axis.iter().copied().reduce(f64::max)?;
    Some((min, max))
}
