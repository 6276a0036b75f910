//! In-memory gridded datasets.
//!
//! Variable data is stored row-major as `[member, time, level, lat, lon]`.
//! Coordinate arrays are kept in the provider's native order; longitudes stay
//! in the provider's native convention until `signed_lon` is attached.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::convention::LonConvention;
use crate::endpoint::{RetrievalAttempt, SourceEndpoint};
use crate::error::{ResolveError, ResolveResult};
use crate::time::RunDescriptor;

/// A named variable tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub units: String,
    pub data: Vec<f32>,
}

impl Variable {
    pub fn new(name: impl Into<String>, units: impl Into<String>, data: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            units: units.into(),
            data,
        }
    }
}

/// Where a dataset came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub run: RunDescriptor,
    pub endpoints: Vec<SourceEndpoint>,
    pub retrieved_at: DateTime<Utc>,
    pub attempts: Vec<RetrievalAttempt>,
}

/// A decoded grid with coordinates, variables and optional derived metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GriddedDataset {
    /// Longitudes in `lon_convention`
    pub lon: Vec<f64>,
    /// Latitudes in native order (ascending or descending)
    pub lat: Vec<f64>,
    pub level: Vec<f64>,
    /// Lead hours relative to `reference_time`
    pub lead_hours: Vec<u32>,
    pub member: Vec<u32>,
    pub lon_convention: LonConvention,
    /// Issuance the lead hours count from
    pub reference_time: DateTime<Utc>,
    pub variables: BTreeMap<String, Variable>,

    // Derived metadata, attached by the normalizer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_time: Option<Vec<DateTime<Utc>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_lon: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_hours: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_index: Option<Vec<usize>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

impl GriddedDataset {
    /// Create a dataset with a single member, lead hour and level and no variables.
    pub fn new(
        lon: Vec<f64>,
        lat: Vec<f64>,
        lon_convention: LonConvention,
        reference_time: DateTime<Utc>,
        lead_hour: u32,
    ) -> Self {
        Self {
            lon,
            lat,
            level: vec![0.0],
            lead_hours: vec![lead_hour],
            member: vec![0],
            lon_convention,
            reference_time,
            variables: BTreeMap::new(),
            valid_time: None,
            signed_lon: None,
            elapsed_hours: None,
            lead_index: None,
            provenance: None,
        }
    }

    /// Add a variable, checking its length against the coordinate shape.
    pub fn with_variable(mut self, variable: Variable) -> ResolveResult<Self> {
        self.insert_variable(variable)?;
        Ok(self)
    }

    pub fn insert_variable(&mut self, variable: Variable) -> ResolveResult<()> {
        let expected = self.values_per_variable();
        if variable.data.len() != expected {
            return Err(ResolveError::decode(format!(
                "variable {} has {} values, grid expects {}",
                variable.name,
                variable.data.len(),
                expected
            )));
        }
        self.variables.insert(variable.name.clone(), variable);
        Ok(())
    }

    /// Shape as `[member, time, level, lat, lon]`.
    pub fn shape(&self) -> [usize; 5] {
        [
            self.member.len(),
            self.lead_hours.len(),
            self.level.len(),
            self.lat.len(),
            self.lon.len(),
        ]
    }

    pub fn values_per_variable(&self) -> usize {
        self.shape().iter().product()
    }

    /// Number of values in one horizontal field.
    pub fn field_len(&self) -> usize {
        self.lat.len() * self.lon.len()
    }

    /// Flat index of a point.
    pub fn index(&self, member: usize, time: usize, level: usize, y: usize, x: usize) -> usize {
        let [_, nt, nl, ny, nx] = self.shape();
        (((member * nt + time) * nl + level) * ny + y) * nx + x
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.variables.keys().cloned().collect()
    }

    pub fn has_variables(&self, names: &[String]) -> bool {
        names.iter().all(|n| self.variables.contains_key(n))
    }

    /// Valid time of each time step, computed from the reference time.
    pub fn computed_valid_times(&self) -> Vec<DateTime<Utc>> {
        self.lead_hours
            .iter()
            .map(|h| self.reference_time + chrono::Duration::hours(*h as i64))
            .collect()
    }

    /// Copy of the dataset restricted to the given horizontal indices.
    ///
    /// Index order is preserved, so a wrapped longitude selection
    /// (`[350..360) + [0..10]`) comes out contiguous in signed space.
    pub fn select_horizontal(&self, lon_idx: &[usize], lat_idx: &[usize]) -> Self {
        let [nm, nt, nl, _, _] = self.shape();
        let planes = nm * nt * nl;
        let (ny, nx) = (self.lat.len(), self.lon.len());

        let variables = self
            .variables
            .iter()
            .map(|(name, var)| {
                let mut data = Vec::with_capacity(planes * lat_idx.len() * lon_idx.len());
                for plane in 0..planes {
                    let base = plane * ny * nx;
                    for &y in lat_idx {
                        let row = base + y * nx;
                        data.extend(lon_idx.iter().map(|&x| var.data[row + x]));
                    }
                }
                (
                    name.clone(),
                    Variable {
                        name: var.name.clone(),
                        units: var.units.clone(),
                        data,
                    },
                )
            })
            .collect();

        Self {
            lon: lon_idx.iter().map(|&x| self.lon[x]).collect(),
            lat: lat_idx.iter().map(|&y| self.lat[y]).collect(),
            signed_lon: self
                .signed_lon
                .as_ref()
                .map(|s| lon_idx.iter().map(|&x| s[x]).collect()),
            variables,
            ..self.clone_without_variables()
        }
    }

    /// Append another dataset's time steps after this one's.
    ///
    /// Both datasets must share the horizontal grid, levels, members and
    /// variable set; `other` lead hours must already be expressed relative to
    /// this dataset's reference time.
    pub fn concat_time(&mut self, other: &GriddedDataset) -> ResolveResult<()> {
        self.check_same_grid(other)?;
        if self.member != other.member {
            return Err(ResolveError::invalid_input("cannot concatenate: member axes differ"));
        }
        if self.variable_names() != other.variable_names() {
            return Err(ResolveError::invalid_input(format!(
                "cannot concatenate: variables {:?} vs {:?}",
                self.variable_names(),
                other.variable_names()
            )));
        }

        let nm = self.member.len();
        let self_block = self.lead_hours.len() * self.level.len() * self.field_len();
        let other_block = other.lead_hours.len() * other.level.len() * other.field_len();

        for (name, var) in self.variables.iter_mut() {
            let theirs = &other.variables[name].data;
            let mut data = Vec::with_capacity(var.data.len() + theirs.len());
            for m in 0..nm {
                data.extend_from_slice(&var.data[m * self_block..(m + 1) * self_block]);
                data.extend_from_slice(&theirs[m * other_block..(m + 1) * other_block]);
            }
            var.data = data;
        }
        self.lead_hours.extend_from_slice(&other.lead_hours);
        self.clear_derived();
        Ok(())
    }

    /// Append another dataset's members after this one's.
    pub fn stack_members(&mut self, other: &GriddedDataset) -> ResolveResult<()> {
        self.check_same_grid(other)?;
        if self.lead_hours != other.lead_hours {
            return Err(ResolveError::invalid_input("cannot stack members: lead hours differ"));
        }
        if self.variable_names() != other.variable_names() {
            return Err(ResolveError::invalid_input("cannot stack members: variables differ"));
        }
        for (name, var) in self.variables.iter_mut() {
            var.data.extend_from_slice(&other.variables[name].data);
        }
        self.member.extend_from_slice(&other.member);
        Ok(())
    }

    /// Take over the variables of a dataset on the same coordinates.
    pub fn merge_variables(&mut self, other: GriddedDataset) -> ResolveResult<()> {
        self.check_same_grid(&other)?;
        if self.lead_hours != other.lead_hours || self.member != other.member {
            return Err(ResolveError::invalid_input(
                "cannot merge variables: time or member axes differ",
            ));
        }
        for (name, var) in other.variables {
            self.variables.insert(name, var);
        }
        Ok(())
    }

    /// Remove the first `n` time steps.
    pub fn drop_leading_times(&mut self, n: usize) {
        let n = n.min(self.lead_hours.len());
        if n == 0 {
            return;
        }
        let nm = self.member.len();
        let step = self.level.len() * self.field_len();
        let block = self.lead_hours.len() * step;

        for var in self.variables.values_mut() {
            let mut data = Vec::with_capacity(var.data.len() - nm * n * step);
            for m in 0..nm {
                data.extend_from_slice(&var.data[m * block + n * step..(m + 1) * block]);
            }
            var.data = data;
        }
        self.lead_hours.drain(..n);
        for times in self.valid_time.iter_mut() {
            times.drain(..n.min(times.len()));
        }
        for hours in self.elapsed_hours.iter_mut() {
            hours.drain(..n.min(hours.len()));
        }
        self.lead_index = None;
    }

    fn check_same_grid(&self, other: &GriddedDataset) -> ResolveResult<()> {
        if self.lon != other.lon || self.lat != other.lat || self.level != other.level {
            return Err(ResolveError::invalid_input(format!(
                "grids differ: {}x{}x{} vs {}x{}x{}",
                self.level.len(),
                self.lat.len(),
                self.lon.len(),
                other.level.len(),
                other.lat.len(),
                other.lon.len()
            )));
        }
        if self.lon_convention != other.lon_convention {
            return Err(ResolveError::invalid_input(format!(
                "longitude conventions differ: {} vs {}",
                self.lon_convention, other.lon_convention
            )));
        }
        Ok(())
    }

    fn clear_derived(&mut self) {
        self.valid_time = None;
        self.elapsed_hours = None;
        self.lead_index = None;
    }

    fn clone_without_variables(&self) -> Self {
        Self {
            lon: Vec::new(),
            lat: Vec::new(),
            level: self.level.clone(),
            lead_hours: self.lead_hours.clone(),
            member: self.member.clone(),
            lon_convention: self.lon_convention,
            reference_time: self.reference_time,
            variables: BTreeMap::new(),
            valid_time: self.valid_time.clone(),
            signed_lon: None,
            elapsed_hours: self.elapsed_hours.clone(),
            lead_index: self.lead_index.clone(),
            provenance: self.provenance.clone(),
        }
    }
}
