//! Synthetic datasets with predictable, verifiable values.

use chrono::{DateTime, Utc};

use wx_common::{GriddedDataset, LonConvention, Variable};

use crate::fixtures::reference_time;

/// Coordinate axes of a regular lat-lon grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridAxes {
    pub lon: Vec<f64>,
    pub lat: Vec<f64>,
}

impl GridAxes {
    /// Build axes from start, end (inclusive) and step for each dimension.
    ///
    /// Values are computed as `start + i * step` so that quarter-degree
    /// grids land exactly on their nominal coordinates.
    ///
    /// ```
    /// use test_utils::GridAxes;
    ///
    /// let axes = GridAxes::regular(0.0, 359.75, 0.25, 90.0, -90.0, -0.25);
    /// assert_eq!(axes.lon.len(), 1440);
    /// assert_eq!(axes.lat.len(), 721);
    /// ```
    pub fn regular(
        lon_start: f64,
        lon_end: f64,
        lon_step: f64,
        lat_start: f64,
        lat_end: f64,
        lat_step: f64,
    ) -> Self {
        Self {
            lon: axis(lon_start, lon_end, lon_step),
            lat: axis(lat_start, lat_end, lat_step),
        }
    }

    pub fn width(&self) -> usize {
        self.lon.len()
    }

    pub fn height(&self) -> usize {
        self.lat.len()
    }
}

fn axis(start: f64, end: f64, step: f64) -> Vec<f64> {
    let count = ((end - start) / step).round() as usize + 1;
    (0..count).map(|i| start + i as f64 * step).collect()
}

/// Creates a test grid with predictable values.
///
/// Each cell value is `col * 1000 + row`, so a value read back after
/// slicing identifies the source cell.
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[1], 1000.0);  // col=1, row=0
/// assert_eq!(grid[10], 1.0);    // col=0, row=1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Single-step dataset over `axes` with a `RAMP` variable from
/// [`create_test_grid`].
pub fn ramp_dataset(axes: &GridAxes, convention: LonConvention) -> GriddedDataset {
    let data = create_test_grid(axes.width(), axes.height());
    GriddedDataset::new(
        axes.lon.clone(),
        axes.lat.clone(),
        convention,
        reference_time(),
        0,
    )
    .with_variable(Variable::new("RAMP", "1", data))
    .unwrap()
}

/// The small 0-360 grid shared by the constant and series generators.
pub fn small_axes() -> GridAxes {
    GridAxes::regular(230.0, 250.0, 10.0, 50.0, 40.0, -10.0)
}

/// One time step of a single variable, filled with `value`, issued at
/// [`reference_time`].
pub fn constant_dataset(name: &str, lead_hour: u32, value: f32) -> GriddedDataset {
    let axes = small_axes();
    let data = vec![value; axes.width() * axes.height()];
    GriddedDataset::new(
        axes.lon,
        axes.lat,
        LonConvention::ZeroTo360,
        reference_time(),
        lead_hour,
    )
    .with_variable(Variable::new(name, "", data))
    .unwrap()
}

/// A `TMP` time series issued at `issued` with one step per lead hour.
///
/// Every cell at lead `h` holds `273.15 + h`.
pub fn series_dataset(issued: DateTime<Utc>, lead_hours: &[u32]) -> GriddedDataset {
    let axes = small_axes();
    let field = axes.width() * axes.height();
    let mut ds = GriddedDataset::new(axes.lon, axes.lat, LonConvention::ZeroTo360, issued, 0);
    ds.lead_hours = lead_hours.to_vec();

    let data = lead_hours
        .iter()
        .flat_map(|h| std::iter::repeat(273.15 + *h as f32).take(field))
        .collect();
    ds.with_variable(Variable::new("TMP", "K", data)).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regular_axes_inclusive() {
        let axes = GridAxes::regular(230.0, 300.0, 10.0, 50.0, 20.0, -10.0);
        assert_eq!(axes.lon.len(), 8);
        assert_eq!(axes.lon[7], 300.0);
        assert_eq!(axes.lat, vec![50.0, 40.0, 30.0, 20.0]);
    }

    #[test]
    fn test_ramp_dataset_values() {
        let axes = GridAxes::regular(0.0, 3.0, 1.0, 1.0, 0.0, -1.0);
        let ds = ramp_dataset(&axes, LonConvention::ZeroTo360);
        let ramp = &ds.variables["RAMP"].data;
        assert_eq!(ramp[ds.index(0, 0, 0, 1, 2)], 2001.0);
    }

    #[test]
    fn test_series_dataset_shape() {
        let ds = series_dataset(reference_time(), &[0, 6, 12]);
        assert_eq!(ds.shape(), [1, 3, 1, 2, 3]);
        assert_eq!(ds.variables["TMP"].data[ds.index(0, 2, 0, 0, 0)], 273.15 + 12.0);
    }
}
