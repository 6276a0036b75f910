//! Model families and their declarative source profiles.
//!
//! Every per-provider quirk lives in the `FamilyProfile` table: issuance
//! cycles, how far back to look, the native longitude convention, how a run
//! is split into files, and the address template for those files.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::convention::LonConvention;
use crate::error::ResolveError;
use crate::time::LeadHours;

/// The closed set of supported model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFamily {
    /// NCEP Global Forecast System, 0.25°
    Gfs,
    /// NCEP Global Ensemble Forecast System, 0.5°
    Gefs,
    /// ECMWF IFS open data, 0.25°
    Ecmwf,
    /// Canadian Global Deterministic Prediction System, 0.15°
    Gdps,
    /// Multi-Radar Multi-Sensor hourly QPE analysis
    Mrms,
}

impl ModelFamily {
    pub fn all() -> &'static [ModelFamily] {
        &[
            ModelFamily::Gfs,
            ModelFamily::Gefs,
            ModelFamily::Ecmwf,
            ModelFamily::Gdps,
            ModelFamily::Mrms,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::Gfs => "gfs",
            ModelFamily::Gefs => "gefs",
            ModelFamily::Ecmwf => "ecmwf",
            ModelFamily::Gdps => "gdps",
            ModelFamily::Mrms => "mrms",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelFamily {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.trim().to_ascii_lowercase();
        ModelFamily::all()
            .iter()
            .copied()
            .find(|f| f.as_str() == id)
            .ok_or_else(|| ResolveError::invalid_input(format!("unsupported model family: {s}")))
    }
}

/// How a provider serves data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessProtocol {
    /// NOMADS-style CGI filter; subsetting (variables and region) happens server side.
    GribFilter,
    /// Whole-file transfer over HTTP(S), subsetting happens locally.
    HttpFile,
}

/// How one run is split into files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileLayout {
    /// One file per run.
    Single,
    /// One file per lead hour.
    PerLeadHour,
    /// One file per ensemble member and lead hour.
    PerMember { members: u32 },
    /// One file per variable and lead hour.
    PerVariable,
}

/// Which segment of a forecast product is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    Short,
    Extended,
}

impl fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodKind::Short => f.write_str("short"),
            PeriodKind::Extended => f.write_str("extended"),
        }
    }
}

/// A variable to request from a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableRequest {
    /// Short name as exposed in the decoded dataset (e.g. "TMP")
    pub name: String,
    /// Level key in the provider's filter vocabulary (e.g. "2_m_above_ground")
    #[serde(default)]
    pub level: String,
    /// File name fragment for providers that publish one file per variable
    #[serde(default)]
    pub file_tag: String,
}

impl VariableRequest {
    pub fn new(name: &str, level: &str, file_tag: &str) -> Self {
        Self {
            name: name.to_string(),
            level: level.to_string(),
            file_tag: file_tag.to_string(),
        }
    }
}

/// Address template for a family's files.
///
/// Placeholders: `{date}`, `{cycle:02}`, `{lead}`, `{lead:02}`, `{lead:03}`,
/// `{member:02}`, `{var}`, `{vars}`, `{leftlon}`, `{rightlon}`, `{toplat}`,
/// `{bottomlat}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceTemplate {
    pub protocol: AccessProtocol,
    pub base_url: String,
    pub path_template: String,
    pub file_template: String,
    #[serde(default)]
    pub variables: Vec<VariableRequest>,
}

/// Everything the engine needs to know about one family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyProfile {
    pub family: ModelFamily,
    pub description: String,
    /// Cycles in UTC hours (e.g. [0, 6, 12, 18])
    pub cycle_hours: Vec<u32>,
    /// Oldest run worth trying, in hours before the reference instant
    pub lookback_hours: u32,
    pub max_candidates: usize,
    /// Minutes after issuance before a run is worth asking for
    #[serde(default)]
    pub min_age_minutes: u32,
    pub convention: LonConvention,
    pub layout: FileLayout,
    pub source: SourceTemplate,
    pub short: LeadHours,
    #[serde(default)]
    pub extended: Option<LeadHours>,
}

const NOMADS: &str = "https://nomads.ncep.noaa.gov/cgi-bin";

impl FamilyProfile {
    /// The built-in profile table.
    pub fn builtin(family: ModelFamily) -> Self {
        match family {
            ModelFamily::Gfs => Self {
                family,
                description: "GFS - Global Forecast System 0.25deg".to_string(),
                cycle_hours: vec![0, 6, 12, 18],
                lookback_hours: 24,
                max_candidates: 4,
                min_age_minutes: 0,
                convention: LonConvention::ZeroTo360,
                layout: FileLayout::PerLeadHour,
                source: SourceTemplate {
                    protocol: AccessProtocol::GribFilter,
                    base_url: format!("{NOMADS}/filter_gfs_0p25.pl"),
                    path_template: "?dir=%2Fgfs.{date}%2F{cycle:02}%2Fatmos\
                        &file=gfs.t{cycle:02}z.pgrb2.0p25.f{lead:03}&{vars}\
                        &subregion=&leftlon={leftlon}&rightlon={rightlon}\
                        &toplat={toplat}&bottomlat={bottomlat}"
                        .to_string(),
                    file_template: "gfs_{date}_{cycle:02}z_f{lead:03}.grib2".to_string(),
                    variables: vec![
                        VariableRequest::new("TMP", "2_m_above_ground", ""),
                        VariableRequest::new("UGRD", "10_m_above_ground", ""),
                        VariableRequest::new("VGRD", "10_m_above_ground", ""),
                    ],
                },
                short: LeadHours::new(0, 24, 6),
                extended: Some(LeadHours::new(24, 72, 12)),
            },
            ModelFamily::Gefs => Self {
                family,
                description: "GEFS - Global Ensemble Forecast System 0.5deg".to_string(),
                cycle_hours: vec![0, 6, 12, 18],
                lookback_hours: 24,
                max_candidates: 4,
                min_age_minutes: 0,
                convention: LonConvention::ZeroTo360,
                layout: FileLayout::PerMember { members: 4 },
                source: SourceTemplate {
                    protocol: AccessProtocol::GribFilter,
                    base_url: format!("{NOMADS}/filter_gefs_atmos_0p50a.pl"),
                    path_template: "?dir=%2Fgefs.{date}%2F{cycle:02}%2Fatmos%2Fpgrb2ap5\
                        &file=gep{member:02}.t{cycle:02}z.pgrb2a.0p50.f{lead:03}&{vars}\
                        &subregion=&leftlon={leftlon}&rightlon={rightlon}\
                        &toplat={toplat}&bottomlat={bottomlat}"
                        .to_string(),
                    file_template: "gefs_{date}_{cycle:02}z_m{member:02}_f{lead:03}.grib2"
                        .to_string(),
                    variables: vec![VariableRequest::new("TMP", "2_m_above_ground", "")],
                },
                short: LeadHours::new(0, 24, 12),
                extended: None,
            },
            ModelFamily::Ecmwf => Self {
                family,
                description: "ECMWF IFS open data 0.25deg".to_string(),
                cycle_hours: vec![0, 12],
                lookback_hours: 48,
                max_candidates: 4,
                min_age_minutes: 0,
                convention: LonConvention::Signed,
                layout: FileLayout::PerLeadHour,
                source: SourceTemplate {
                    protocol: AccessProtocol::HttpFile,
                    base_url: "https://data.ecmwf.int/forecasts".to_string(),
                    path_template: "/{date}/{cycle:02}z/ifs/0p25/oper/\
                        {date}{cycle:02}0000-{lead}h-oper-fc.grib2"
                        .to_string(),
                    file_template: "ecmwf_{date}_{cycle:02}z_f{lead:03}.grib2".to_string(),
                    variables: Vec::new(),
                },
                short: LeadHours::new(0, 24, 6),
                extended: Some(LeadHours::new(24, 72, 12)),
            },
            ModelFamily::Gdps => Self {
                family,
                description: "GDPS - Canadian Global Deterministic Prediction System 15km"
                    .to_string(),
                cycle_hours: vec![0, 12],
                lookback_hours: 48,
                max_candidates: 4,
                min_age_minutes: 0,
                convention: LonConvention::Signed,
                layout: FileLayout::PerVariable,
                source: SourceTemplate {
                    protocol: AccessProtocol::HttpFile,
                    base_url: "https://dd.weather.gc.ca/model_gem_global/15km/grib2/lat_lon"
                        .to_string(),
                    path_template: "/{cycle:02}/{lead:03}/\
                        CMC_glb_{var}_latlon.15x.15_{date}{cycle:02}_P{lead:03}.grib2"
                        .to_string(),
                    file_template: "gdps_{date}_{cycle:02}z_{var}_f{lead:03}.grib2".to_string(),
                    variables: vec![
                        VariableRequest::new("TMP", "", "TMP_TGL_2"),
                        VariableRequest::new("PRMSL", "", "PRMSL_MSL_0"),
                    ],
                },
                short: LeadHours::new(0, 24, 6),
                extended: Some(LeadHours::new(24, 72, 12)),
            },
            ModelFamily::Mrms => Self {
                family,
                description: "MRMS MultiSensor QPE 1-hour pass 2".to_string(),
                cycle_hours: (0..24).collect(),
                lookback_hours: 6,
                max_candidates: 5,
                min_age_minutes: 0,
                convention: LonConvention::ZeroTo360,
                layout: FileLayout::Single,
                source: SourceTemplate {
                    protocol: AccessProtocol::HttpFile,
                    base_url: "https://noaa-mrms-pds.s3.amazonaws.com/CONUS".to_string(),
                    path_template: "/MultiSensor_QPE_01H_Pass2_00.00/{date}/\
                        MRMS_MultiSensor_QPE_01H_Pass2_00.00_{date}-{cycle:02}0000.grib2.gz"
                        .to_string(),
                    file_template: "mrms_qpe01h_{date}_{cycle:02}z.grib2.gz".to_string(),
                    variables: Vec::new(),
                },
                short: LeadHours::analysis(),
                extended: None,
            },
        }
    }

    /// Hours between consecutive cycles (smallest gap, wrapping over midnight).
    pub fn cycle_interval_hours(&self) -> u32 {
        let mut hours = self.cycle_hours.clone();
        hours.sort_unstable();
        hours.dedup();
        match hours.len() {
            0 => 24,
            1 => 24,
            n => {
                let mut min_gap = 24 + hours[0] - hours[n - 1];
                for pair in hours.windows(2) {
                    min_gap = min_gap.min(pair[1] - pair[0]);
                }
                min_gap
            }
        }
    }

    /// Lead hours of the requested period, if the family publishes it.
    pub fn leads_for(&self, period: PeriodKind) -> Option<LeadHours> {
        match period {
            PeriodKind::Short => Some(self.short),
            PeriodKind::Extended => self.extended,
        }
    }

    /// Whether one run is split into several files for the given lead range.
    pub fn is_multi_file(&self, leads: &LeadHours) -> bool {
        match self.layout {
            FileLayout::Single => false,
            FileLayout::PerLeadHour => leads.hours().len() > 1,
            FileLayout::PerMember { members } => members > 1 || leads.hours().len() > 1,
            FileLayout::PerVariable => {
                self.source.variables.len() > 1 || leads.hours().len() > 1
            }
        }
    }

    /// Names the decoded dataset must contain.
    pub fn expected_variables(&self) -> Vec<String> {
        self.source.variables.iter().map(|v| v.name.clone()).collect()
    }

    /// Check the profile for values that would make the cascade meaningless.
    pub fn validate(&self) -> Result<(), ResolveError> {
        if self.cycle_hours.is_empty() || self.cycle_hours.iter().any(|h| *h > 23) {
            return Err(ResolveError::Config(format!(
                "{}: cycle hours must be a non-empty subset of 0..23",
                self.family
            )));
        }
        if self.max_candidates == 0 {
            return Err(ResolveError::Config(format!(
                "{}: max_candidates must be at least 1",
                self.family
            )));
        }
        self.short.validate()?;
        if let Some(ext) = &self.extended {
            ext.validate()?;
        }
        Ok(())
    }
}
