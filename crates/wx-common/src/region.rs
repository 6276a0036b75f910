//! Geographic region requested by a caller.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ResolveError;

/// A geographic box in signed decimal degrees.
///
/// Invariant: `west < east`, `south < north`, longitudes within -180..180 and
/// latitudes within -90..90.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionSpec {
    pub west: f64,
    pub east: f64,
    pub south: f64,
    pub north: f64,
}

impl RegionSpec {
    /// Create a validated region.
    pub fn new(west: f64, east: f64, south: f64, north: f64) -> Result<Self, ResolveError> {
        let region = Self {
            west,
            east,
            south,
            north,
        };
        region.validate()?;
        Ok(region)
    }

    /// Check the region invariants.
    pub fn validate(&self) -> Result<(), ResolveError> {
        let all = [self.west, self.east, self.south, self.north];
        if all.iter().any(|v| !v.is_finite()) {
            return Err(ResolveError::invalid_input(format!(
                "region has non-finite bounds: {self}"
            )));
        }
        if self.west >= self.east {
            return Err(ResolveError::invalid_input(format!(
                "region west ({}) must be less than east ({})",
                self.west, self.east
            )));
        }
        if self.south >= self.north {
            return Err(ResolveError::invalid_input(format!(
                "region south ({}) must be less than north ({})",
                self.south, self.north
            )));
        }
        if self.west < -180.0 || self.east > 180.0 {
            return Err(ResolveError::invalid_input(format!(
                "region longitudes must lie within -180..180: {self}"
            )));
        }
        if self.south < -90.0 || self.north > 90.0 {
            return Err(ResolveError::invalid_input(format!(
                "region latitudes must lie within -90..90: {self}"
            )));
        }
        Ok(())
    }

    /// Contiguous United States, the most common request.
    pub fn conus() -> Self {
        Self {
            west: -125.0,
            east: -65.0,
            south: 24.0,
            north: 50.0,
        }
    }
}

impl fmt::Display for RegionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "W{} E{} S{} N{}",
            self.west, self.east, self.south, self.north
        )
    }
}

/// Parse `"west,south,east,north"` (the same axis order as a WMS BBOX).
impl FromStr for RegionSpec {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(ResolveError::invalid_input(format!(
                "invalid region '{s}', expected 'west,south,east,north'"
            )));
        }

        let mut values = [0.0f64; 4];
        for (value, part) in values.iter_mut().zip(&parts) {
            *value = part.parse().map_err(|_| {
                ResolveError::invalid_input(format!("invalid number in region: {part}"))
            })?;
        }

        RegionSpec::new(values[0], values[2], values[1], values[3])
    }
}
