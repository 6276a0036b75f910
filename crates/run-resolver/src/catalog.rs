//! Endpoint construction from the family profile table.
//!
//! One renderer fills every family's template. Provider quirks (native
//! longitude convention, server-side subsetting and per-lead, per-member or
//! per-variable file splitting) are all read from the `FamilyProfile`.

use std::collections::HashMap;

use tracing::debug;

use wx_common::{
    AccessProtocol, FamilyProfile, FileLayout, LonSpan, ModelFamily, RegionSpec, ResolveError,
    ResolveResult, RunDescriptor, SourceEndpoint, VariableRequest,
};

/// Values substituted into a template.
#[derive(Debug, Default)]
struct TemplateContext<'a> {
    date: String,
    cycle: u32,
    lead: u32,
    member: Option<u32>,
    var: Option<&'a str>,
    vars: String,
    bounds: Option<(f64, f64, f64, f64)>,
}

fn render(template: &str, ctx: &TemplateContext<'_>) -> String {
    let mut out = template
        .replace("{date}", &ctx.date)
        .replace("{cycle:02}", &format!("{:02}", ctx.cycle))
        .replace("{lead:03}", &format!("{:03}", ctx.lead))
        .replace("{lead:02}", &format!("{:02}", ctx.lead))
        .replace("{lead}", &ctx.lead.to_string())
        .replace("{vars}", &ctx.vars);

    if let Some(member) = ctx.member {
        out = out.replace("{member:02}", &format!("{:02}", member));
    }
    if let Some(var) = ctx.var {
        out = out.replace("{var}", var);
    }
    if let Some((left, right, top, bottom)) = ctx.bounds {
        out = out
            .replace("{leftlon}", &format_degrees(left))
            .replace("{rightlon}", &format_degrees(right))
            .replace("{toplat}", &format_degrees(top))
            .replace("{bottomlat}", &format_degrees(bottom));
    }
    out
}

fn format_degrees(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    format!("{}", rounded)
}

/// `var_X=on&lev_Y=on` selection for grib-filter requests.
fn filter_selection(variables: &[VariableRequest]) -> String {
    let mut parts: Vec<String> = Vec::new();
    for var in variables {
        let part = format!("var_{}=on", var.name);
        if !parts.contains(&part) {
            parts.push(part);
        }
    }
    for var in variables.iter().filter(|v| !v.level.is_empty()) {
        let part = format!("lev_{}=on", var.level);
        if !parts.contains(&part) {
            parts.push(part);
        }
    }
    parts.join("&")
}

/// Server-side subset bounds as (leftlon, rightlon, toplat, bottomlat).
///
/// A region that crosses the native seam cannot be expressed as one
/// left/right pair, so the subset is widened to the whole longitude range
/// and the exact cut happens after decode.
pub fn subset_bounds(profile: &FamilyProfile, region: &RegionSpec) -> (f64, f64, f64, f64) {
    let span = profile.convention.native_span(region.west, region.east);
    let (left, right) = match span {
        LonSpan::Contiguous { lo, hi } => (lo, hi),
        LonSpan::Wrapped { .. } => (0.0, 360.0),
    };
    (left, right, region.north, region.south)
}

/// Maps (family, run, region) to the endpoints that make up the run.
#[derive(Debug, Clone)]
pub struct SourceCatalog {
    profiles: HashMap<ModelFamily, FamilyProfile>,
}

impl Default for SourceCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SourceCatalog {
    /// Catalog over the built-in profile table.
    pub fn builtin() -> Self {
        Self::from_profiles(
            ModelFamily::all()
                .iter()
                .map(|f| FamilyProfile::builtin(*f)),
        )
    }

    pub fn from_profiles(profiles: impl IntoIterator<Item = FamilyProfile>) -> Self {
        Self {
            profiles: profiles.into_iter().map(|p| (p.family, p)).collect(),
        }
    }

    pub fn profile(&self, family: ModelFamily) -> ResolveResult<&FamilyProfile> {
        self.profiles
            .get(&family)
            .ok_or_else(|| ResolveError::invalid_input(format!("no profile for family {family}")))
    }

    /// All endpoints for one run, in fetch order.
    pub fn endpoints(
        &self,
        run: &RunDescriptor,
        region: &RegionSpec,
    ) -> ResolveResult<Vec<SourceEndpoint>> {
        let profile = self.profile(run.family)?;
        region.validate()?;

        let source = &profile.source;
        let bounds = match source.protocol {
            AccessProtocol::GribFilter => Some(subset_bounds(profile, region)),
            AccessProtocol::HttpFile => None,
        };
        let vars = filter_selection(&source.variables);
        let all_names = profile.expected_variables();
        let leads = run.leads.hours();

        let base = TemplateContext {
            date: run.date_str(),
            cycle: run.cycle(),
            vars,
            bounds,
            ..Default::default()
        };

        let endpoint = |lead: u32, member: Option<u32>, var: Option<&VariableRequest>| {
            let ctx = TemplateContext {
                date: base.date.clone(),
                cycle: base.cycle,
                lead,
                member,
                var: var.map(|v| v.file_tag.as_str()),
                vars: base.vars.clone(),
                bounds: base.bounds,
            };
            SourceEndpoint {
                family: run.family,
                run: *run,
                protocol: source.protocol,
                address: format!("{}{}", source.base_url, render(&source.path_template, &ctx)),
                file_name: render(&source.file_template, &ctx),
                lead_hour: lead,
                member,
                variable: var.map(|v| v.name.clone()),
                expected_variables: match var {
                    Some(v) => vec![v.name.clone()],
                    None => all_names.clone(),
                },
            }
        };

        let endpoints: Vec<SourceEndpoint> = match profile.layout {
            FileLayout::Single => vec![endpoint(run.leads.start, None, None)],
            FileLayout::PerLeadHour => leads.iter().map(|&h| endpoint(h, None, None)).collect(),
            FileLayout::PerMember { members } => (1..=members)
                .flat_map(|m| leads.iter().map(move |&h| (m, h)))
                .map(|(m, h)| endpoint(h, Some(m), None))
                .collect(),
            FileLayout::PerVariable => {
                if source.variables.is_empty() {
                    return Err(ResolveError::Config(format!(
                        "{}: per-variable layout needs at least one variable",
                        run.family
                    )));
                }
                source
                    .variables
                    .iter()
                    .flat_map(|v| leads.iter().map(move |&h| (v, h)))
                    .map(|(v, h)| endpoint(h, None, Some(v)))
                    .collect()
            }
        };

        debug!(
            family = %run.family,
            run = %run,
            count = endpoints.len(),
            "Rendered endpoints"
        );
        Ok(endpoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use wx_common::LeadHours;

    fn run(family: ModelFamily, hour: u32, leads: LeadHours) -> RunDescriptor {
        let profile = FamilyProfile::builtin(family);
        let issued = Utc.with_ymd_and_hms(2024, 1, 15, hour, 0, 0).unwrap();
        RunDescriptor::new(&profile, issued, leads).unwrap()
    }

    #[test]
    fn test_gfs_filter_url_uses_zero_to_360_bounds() {
        let catalog = SourceCatalog::builtin();
        let run = run(ModelFamily::Gfs, 6, LeadHours::new(0, 6, 6));
        let endpoints = catalog.endpoints(&run, &RegionSpec::conus()).unwrap();

        assert_eq!(endpoints.len(), 2);
        let first = &endpoints[0];
        assert!(first.address.contains("dir=%2Fgfs.20240115%2F06%2Fatmos"));
        assert!(first.address.contains("file=gfs.t06z.pgrb2.0p25.f000"));
        assert!(first.address.contains("leftlon=235&rightlon=295"));
        assert!(first.address.contains("toplat=50&bottomlat=24"));
        assert!(first.address.contains("var_TMP=on"));
        assert!(first.address.contains("lev_2_m_above_ground=on"));
        assert_eq!(first.file_name, "gfs_20240115_06z_f000.grib2");
        assert!(endpoints[1].address.contains(".f006"));
    }

    #[test]
    fn test_seam_crossing_widens_subset() {
        let catalog = SourceCatalog::builtin();
        let run = run(ModelFamily::Gfs, 0, LeadHours::analysis());
        let region = RegionSpec::new(-15.0, 25.0, 35.0, 60.0).unwrap();
        let endpoints = catalog.endpoints(&run, &region).unwrap();
        assert!(endpoints[0].address.contains("leftlon=0&rightlon=360"));
    }

    #[test]
    fn test_gefs_splits_by_member_then_lead() {
        let catalog = SourceCatalog::builtin();
        let run = run(ModelFamily::Gefs, 12, LeadHours::new(0, 12, 12));
        let endpoints = catalog.endpoints(&run, &RegionSpec::conus()).unwrap();

        assert_eq!(endpoints.len(), 8);
        assert_eq!(endpoints[0].member, Some(1));
        assert_eq!(endpoints[1].member, Some(1));
        assert_eq!(endpoints[1].lead_hour, 12);
        assert!(endpoints[2].address.contains("file=gep02.t12z.pgrb2a.0p50.f000"));
    }

    #[test]
    fn test_gdps_splits_by_variable() {
        let catalog = SourceCatalog::builtin();
        let run = run(ModelFamily::Gdps, 0, LeadHours::new(0, 6, 6));
        let endpoints = catalog.endpoints(&run, &RegionSpec::conus()).unwrap();

        assert_eq!(endpoints.len(), 4);
        assert_eq!(
            endpoints[0].address,
            "https://dd.weather.gc.ca/model_gem_global/15km/grib2/lat_lon/00/000/\
             CMC_glb_TMP_TGL_2_latlon.15x.15_2024011500_P000.grib2"
        );
        assert_eq!(endpoints[0].expected_variables, vec!["TMP".to_string()]);
        assert_eq!(endpoints[2].variable.as_deref(), Some("PRMSL"));
    }

    #[test]
    fn test_ecmwf_unpadded_lead() {
        let catalog = SourceCatalog::builtin();
        let run = run(ModelFamily::Ecmwf, 12, LeadHours::new(6, 6, 6));
        let endpoints = catalog.endpoints(&run, &RegionSpec::conus()).unwrap();
        assert_eq!(
            endpoints[0].address,
            "https://data.ecmwf.int/forecasts/20240115/12z/ifs/0p25/oper/20240115120000-6h-oper-fc.grib2"
        );
    }

    #[test]
    fn test_mrms_single_file() {
        let catalog = SourceCatalog::builtin();
        let run = run(ModelFamily::Mrms, 7, LeadHours::analysis());
        let endpoints = catalog.endpoints(&run, &RegionSpec::conus()).unwrap();
        assert_eq!(endpoints.len(), 1);
        assert!(endpoints[0]
            .address
            .ends_with("MRMS_MultiSensor_QPE_01H_Pass2_00.00_20240115-070000.grib2.gz"));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let catalog = SourceCatalog::builtin();
        let run = run(ModelFamily::Gfs, 18, LeadHours::new(0, 24, 6));
        let a = catalog.endpoints(&run, &RegionSpec::conus()).unwrap();
        let b = catalog.endpoints(&run, &RegionSpec::conus()).unwrap();
        assert_eq!(a, b);
    }
}
