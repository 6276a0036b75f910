//! Fixed runs, endpoints and regions shared across the test suite.

use chrono::{DateTime, TimeZone, Utc};

use wx_common::{
    AccessProtocol, FamilyProfile, LeadHours, ModelFamily, RegionSpec, RunDescriptor,
    SourceEndpoint,
};

/// 2024-01-15T12:00Z, a GFS cycle.
pub fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
}

/// The GFS short-range run issued at [`reference_time`].
pub fn sample_run() -> RunDescriptor {
    let profile = FamilyProfile::builtin(ModelFamily::Gfs);
    RunDescriptor::new(&profile, reference_time(), profile.short).unwrap()
}

/// Analysis-style run of `family` at `issued`, bypassing cycle checks.
pub fn run_at(family: ModelFamily, issued: DateTime<Utc>, leads: LeadHours) -> RunDescriptor {
    RunDescriptor {
        family,
        issued,
        leads,
    }
}

/// A single GFS f000 file expecting `TMP`.
pub fn sample_endpoint() -> SourceEndpoint {
    let run = sample_run();
    SourceEndpoint {
        family: ModelFamily::Gfs,
        run,
        protocol: AccessProtocol::GribFilter,
        address: "https://example.invalid/filter_gfs_0p25.pl?file=gfs.t12z.pgrb2.0p25.f000"
            .to_string(),
        file_name: "gfs_20240115_12z_f000.grib2".to_string(),
        lead_hour: 0,
        member: None,
        variable: None,
        expected_variables: vec!["TMP".to_string()],
    }
}

/// Common regions in signed degrees.
pub mod regions {
    use super::RegionSpec;

    pub fn conus() -> RegionSpec {
        RegionSpec::conus()
    }

    /// Straddles the prime meridian, so it wraps in 0-360 space.
    pub fn greenwich() -> RegionSpec {
        RegionSpec::new(-10.0, 10.0, 40.0, 55.0).unwrap()
    }
}
