//! Tests for RegionSpec parsing/validation and longitude convention transforms.

use wx_common::{LonConvention, LonSpan, ModelFamily, FamilyProfile, RegionSpec, ResolveError};

// ============================================================================
// RegionSpec construction
// ============================================================================

#[test]
fn test_region_new_valid() {
    let region = RegionSpec::new(-125.0, -65.0, 24.0, 50.0).unwrap();
    assert_eq!(region, RegionSpec::conus());
}

#[test]
fn test_region_rejects_equal_bounds() {
    assert!(matches!(
        RegionSpec::new(-100.0, -100.0, 24.0, 50.0),
        Err(ResolveError::InvalidInput(_))
    ));
    assert!(matches!(
        RegionSpec::new(-125.0, -65.0, 30.0, 30.0),
        Err(ResolveError::InvalidInput(_))
    ));
}

#[test]
fn test_region_rejects_out_of_range() {
    assert!(RegionSpec::new(-190.0, -65.0, 24.0, 50.0).is_err());
    assert!(RegionSpec::new(-125.0, 200.0, 24.0, 50.0).is_err());
    assert!(RegionSpec::new(-125.0, -65.0, -95.0, 50.0).is_err());
    assert!(RegionSpec::new(-125.0, -65.0, 24.0, 91.0).is_err());
}

#[test]
fn test_region_rejects_nan() {
    assert!(RegionSpec::new(f64::NAN, -65.0, 24.0, 50.0).is_err());
}

#[test]
fn test_region_global_is_valid() {
    assert!(RegionSpec::new(-180.0, 180.0, -90.0, 90.0).is_ok());
}

// ============================================================================
// RegionSpec parsing
// ============================================================================

#[test]
fn test_parse_region_with_spaces() {
    let region: RegionSpec = " -10.5 , 35 , 30.25 , 60 ".parse().unwrap();
    assert!((region.west - (-10.5)).abs() < 0.001);
    assert!((region.east - 30.25).abs() < 0.001);
    assert!((region.south - 35.0).abs() < 0.001);
    assert!((region.north - 60.0).abs() < 0.001);
}

#[test]
fn test_parse_region_wrong_count() {
    assert!("1,2,3".parse::<RegionSpec>().is_err());
    assert!("1,2,3,4,5".parse::<RegionSpec>().is_err());
}

#[test]
fn test_parse_region_not_a_number() {
    assert!("a,b,c,d".parse::<RegionSpec>().is_err());
}

// ============================================================================
// Longitude conventions
// ============================================================================

#[test]
fn test_conus_against_zero_to_360() {
    let span = LonConvention::ZeroTo360.native_span(-125.0, -65.0);
    assert_eq!(span.bounds(), (235.0, 295.0));
    assert!(!span.is_wrapped());
}

#[test]
fn test_eastern_hemisphere_unchanged_in_zero_to_360() {
    let span = LonConvention::ZeroTo360.native_span(10.0, 40.0);
    assert_eq!(span, LonSpan::Contiguous { lo: 10.0, hi: 40.0 });
}

#[test]
fn test_seam_crossing_region_wraps() {
    let span = LonConvention::ZeroTo360.native_span(-20.0, 30.0);
    assert!(span.is_wrapped());
    assert_eq!(span.bounds(), (340.0, 30.0));
}

#[test]
fn test_antimeridian_west_edge_is_native_180() {
    let span = LonConvention::ZeroTo360.native_span(-180.0, -170.0);
    assert_eq!(span, LonSpan::Contiguous { lo: 180.0, hi: 190.0 });
    let signed = LonConvention::ZeroTo360.signed_axis(&[180.0, 185.0, 190.0]);
    assert_eq!(signed, vec![-180.0, -175.0, -170.0]);
}

#[test]
fn test_signed_is_identity() {
    let span = LonConvention::Signed.native_span(-125.0, -65.0);
    assert_eq!(span, LonSpan::Contiguous { lo: -125.0, hi: -65.0 });
}

#[test]
fn test_round_trip_region_bounds() {
    let region = RegionSpec::new(-97.25, -80.5, 30.0, 45.0).unwrap();
    for conv in [
        LonConvention::Signed,
        LonConvention::ZeroTo360,
        LonConvention::PositiveWest,
    ] {
        let west = conv.to_signed(conv.to_native(region.west));
        let east = conv.to_signed(conv.to_native(region.east));
        assert!((west - region.west).abs() < 1e-9);
        assert!((east - region.east).abs() < 1e-9);
    }
}

// ============================================================================
// Family profiles
// ============================================================================

#[test]
fn test_builtin_conventions() {
    assert_eq!(
        FamilyProfile::builtin(ModelFamily::Gfs).convention,
        LonConvention::ZeroTo360
    );
    assert_eq!(
        FamilyProfile::builtin(ModelFamily::Ecmwf).convention,
        LonConvention::Signed
    );
    assert_eq!(
        FamilyProfile::builtin(ModelFamily::Gdps).convention,
        LonConvention::Signed
    );
}

#[test]
fn test_family_display_round_trip() {
    for family in ModelFamily::all() {
        let parsed: ModelFamily = family.to_string().parse().unwrap();
        assert_eq!(parsed, *family);
    }
}

#[test]
fn test_candidate_defaults() {
    assert_eq!(FamilyProfile::builtin(ModelFamily::Gfs).max_candidates, 4);
    assert_eq!(FamilyProfile::builtin(ModelFamily::Mrms).max_candidates, 5);
}
