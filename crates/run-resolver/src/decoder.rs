//! GRIB2 decoding into `GriddedDataset`.
//!
//! Only regular lat/lon grids are supported. Each GRIB2 submessage becomes a
//! named variable. Lead hour, member and issuance are taken from the endpoint
//! that produced the file, not from the GRIB headers.

use std::io::{Cursor, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::debug;

use wx_common::{
    GriddedDataset, LonConvention, ResolveError, ResolveResult, SourceEndpoint, Variable,
};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Turns a staged file into a dataset.
pub trait GridDecoder: Send + Sync {
    fn decode(
        &self,
        path: &Path,
        endpoint: &SourceEndpoint,
        convention: LonConvention,
    ) -> ResolveResult<GriddedDataset>;
}

/// Parameter short name from (discipline, category, number).
pub fn parameter_name(discipline: u8, category: u8, number: u8) -> String {
    match (discipline, category, number) {
        // Category 0: Temperature
        (0, 0, 0) => "TMP".to_string(),
        (0, 0, 6) => "DPT".to_string(),
        // Category 1: Moisture
        (0, 1, 1) => "RH".to_string(),
        (0, 1, 8) => "APCP".to_string(),
        // Category 2: Momentum
        (0, 2, 2) => "UGRD".to_string(),
        (0, 2, 3) => "VGRD".to_string(),
        (0, 2, 22) => "GUST".to_string(),
        // Category 3: Mass
        (0, 3, 0) => "PRES".to_string(),
        (0, 3, 1) => "PRMSL".to_string(),
        (0, 3, 5) => "HGT".to_string(),
        // Category 6: Cloud
        (0, 6, 1) => "TCDC".to_string(),
        // Discipline 209: MRMS
        (209, 0, 16) => "REFL".to_string(),
        (209, 1, 1) => "QPE".to_string(),
        (209, 6, 37) => "QPE01H".to_string(),
        _ => format!("P{}_{}_{}", discipline, category, number),
    }
}

/// Units for the names produced by `parameter_name`.
pub fn parameter_units(name: &str) -> &'static str {
    match name {
        "TMP" | "DPT" => "K",
        "RH" | "TCDC" => "%",
        "APCP" => "kg m-2",
        "UGRD" | "VGRD" | "GUST" => "m s-1",
        "PRES" | "PRMSL" => "Pa",
        "HGT" => "gpm",
        "REFL" => "dBZ",
        "QPE" | "QPE01H" => "mm",
        _ => "",
    }
}

/// Read a file, inflating it if it starts with the gzip magic bytes.
pub fn read_payload(path: &Path) -> ResolveResult<Vec<u8>> {
    let raw = std::fs::read(path)?;
    if raw.len() >= 2 && raw[..2] == GZIP_MAGIC {
        let mut inflated = Vec::with_capacity(raw.len() * 4);
        GzDecoder::new(raw.as_slice())
            .read_to_end(&mut inflated)
            .map_err(|e| ResolveError::decode(format!("{}: bad gzip stream: {e}", path.display())))?;
        return Ok(inflated);
    }
    Ok(raw)
}

/// GRIB2 decoder backed by the `grib` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct Grib2Decoder;

impl Grib2Decoder {
    pub fn new() -> Self {
        Self
    }
}

impl GridDecoder for Grib2Decoder {
    fn decode(
        &self,
        path: &Path,
        endpoint: &SourceEndpoint,
        convention: LonConvention,
    ) -> ResolveResult<GriddedDataset> {
        let bytes = read_payload(path)?;
        let grib_file = grib::from_reader(Cursor::new(bytes))
            .map_err(|e| ResolveError::decode(format!("{}: {e}", path.display())))?;

        let mut dataset: Option<GriddedDataset> = None;

        for (_index, submsg) in grib_file.iter() {
            let discipline = submsg.indicator().discipline;
            let prod_def = submsg.prod_def();
            let (Some(category), Some(number)) =
                (prod_def.parameter_category(), prod_def.parameter_number())
            else {
                continue;
            };
            let name = parameter_name(discipline, category, number);

            if dataset
                .as_ref()
                .is_some_and(|ds| ds.variables.contains_key(&name))
            {
                debug!(variable = %name, "Skipping additional level");
                continue;
            }

            let (nx, ny) = submsg
                .grid_shape()
                .map_err(|e| ResolveError::decode(format!("{name}: grid shape: {e}")))?;
            let points: Vec<(f32, f32)> = submsg
                .latlons()
                .map_err(|e| ResolveError::decode(format!("{name}: unsupported grid: {e}")))?
                .collect();
            let (lon, lat) = regular_axes(&points, nx, ny, convention)?;

            let values: Vec<f32> = grib::Grib2SubmessageDecoder::from(submsg)
                .map_err(|e| ResolveError::decode(format!("{name}: {e}")))?
                .dispatch()
                .map_err(|e| ResolveError::decode(format!("{name}: {e}")))?
                .collect();

            let ds = dataset.get_or_insert_with(|| {
                let mut ds = GriddedDataset::new(
                    lon.clone(),
                    lat.clone(),
                    convention,
                    endpoint.run.issued,
                    endpoint.lead_hour,
                );
                ds.member = vec![endpoint.member.unwrap_or(0)];
                ds
            });
            if ds.lon != lon || ds.lat != lat {
                return Err(ResolveError::decode(format!(
                    "{name} is on a different grid than the rest of {}",
                    path.display()
                )));
            }

            let units = parameter_units(&name);
            ds.insert_variable(Variable::new(name, units, values))?;
        }

        let dataset = dataset.ok_or_else(|| {
            ResolveError::decode(format!("{} contains no usable GRIB2 fields", path.display()))
        })?;

        debug!(
            path = %path.display(),
            variables = ?dataset.variable_names(),
            nx = dataset.lon.len(),
            ny = dataset.lat.len(),
            "Decoded GRIB2 file"
        );
        Ok(dataset)
    }
}

/// Split the point list of a regular grid into longitude and latitude axes.
///
/// Points must be row-major (longitude varying fastest). Longitudes are
/// rewritten into `convention`.
fn regular_axes(
    points: &[(f32, f32)],
    nx: usize,
    ny: usize,
    convention: LonConvention,
) -> ResolveResult<(Vec<f64>, Vec<f64>)> {
    if nx == 0 || ny == 0 || points.len() != nx * ny {
        return Err(ResolveError::decode(format!(
            "grid has {} points, expected {}x{}",
            points.len(),
            nx,
            ny
        )));
    }

    let first_lat = points[0].0;
    if points[..nx].iter().any(|(lat, _)| *lat != first_lat) {
        return Err(ResolveError::decode(
            "grid is not scanned row by row; only i-consecutive lat/lon grids are supported",
        ));
    }

    let lon = points[..nx]
        .iter()
        .map(|(_, lon)| convention.to_native(LonConvention::ZeroTo360.to_signed(*lon as f64)))
        .collect();
    let lat = (0..ny).map(|j| points[j * nx].0 as f64).collect();
    Ok((lon, lat))
}
