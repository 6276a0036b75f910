//! Longitude conventions used by data providers.
//!
//! Callers always speak signed degrees (-180..180, east positive). Providers
//! index longitude in one of three native forms; the transforms here are the
//! single place where the two are converted.

use std::fmt;

use serde::{Deserialize, Serialize};

const EPSILON: f64 = 1e-9;

/// Native longitude convention of a provider's grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LonConvention {
    /// -180..180, east positive.
    Signed,
    /// 0..360, east positive.
    ZeroTo360,
    /// -180..180, west positive (degrees west).
    PositiveWest,
}

impl LonConvention {
    /// Convert a signed longitude into this convention.
    pub fn to_native(&self, signed: f64) -> f64 {
        match self {
            LonConvention::Signed => signed,
            LonConvention::ZeroTo360 => signed.rem_euclid(360.0),
            LonConvention::PositiveWest => -signed,
        }
    }

    /// Convert a native longitude back into signed degrees.
    pub fn to_signed(&self, native: f64) -> f64 {
        match self {
            LonConvention::Signed => native,
            LonConvention::ZeroTo360 => {
                let lon = native.rem_euclid(360.0);
                if lon > 180.0 {
                    lon - 360.0
                } else {
                    lon
                }
            }
            LonConvention::PositiveWest => -native,
        }
    }

    /// Signed longitudes for a native axis in slicing order.
    ///
    /// On 0..360 grids native 180 is both -180 and 180. A leading 180 that
    /// is followed by western longitudes is the -180 edge, so the exposed
    /// axis runs west to east.
    pub fn signed_axis(&self, native: &[f64]) -> Vec<f64> {
        let mut signed: Vec<f64> = native.iter().map(|l| self.to_signed(*l)).collect();
        if *self == LonConvention::ZeroTo360 {
            if let [first, second, ..] = signed.as_mut_slice() {
                if (*first - 180.0).abs() < EPSILON && *second < *first {
                    *first = -180.0;
                }
            }
        }
        signed
    }

    /// Native longitude span covering the signed interval `west..=east`.
    ///
    /// For 0..360 providers a box crossing the prime meridian becomes a
    /// wrapped span (`lo..360` followed by `0..hi`). A full globe also wraps,
    /// starting at the native image of `west`, so slices begin at -180.
    pub fn native_span(&self, west: f64, east: f64) -> LonSpan {
        match self {
            LonConvention::Signed => LonSpan::Contiguous { lo: west, hi: east },
            LonConvention::PositiveWest => LonSpan::Contiguous {
                lo: -east,
                hi: -west,
            },
            LonConvention::ZeroTo360 => {
                if east - west >= 360.0 - EPSILON {
                    let start = self.to_native(west);
                    return LonSpan::Wrapped {
                        lo: start,
                        hi: start,
                    };
                }
                let lo = self.to_native(west);
                let hi = self.to_native(east);
                if lo <= hi {
                    LonSpan::Contiguous { lo, hi }
                } else {
                    LonSpan::Wrapped { lo, hi }
                }
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LonConvention::Signed => "signed",
            LonConvention::ZeroTo360 => "zero_to_360",
            LonConvention::PositiveWest => "positive_west",
        }
    }
}

impl fmt::Display for LonConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A longitude interval expressed in a provider's native convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LonSpan {
    /// `lo..=hi` with `lo <= hi`.
    Contiguous { lo: f64, hi: f64 },
    /// `lo..360` joined with `0..=hi`, for 0..360 grids cut by the seam.
    Wrapped { lo: f64, hi: f64 },
}

impl LonSpan {
    pub fn contains(&self, native: f64) -> bool {
        match *self {
            LonSpan::Contiguous { lo, hi } => native >= lo - EPSILON && native <= hi + EPSILON,
            LonSpan::Wrapped { lo, hi } => native >= lo - EPSILON || native <= hi + EPSILON,
        }
    }

    pub fn is_wrapped(&self) -> bool {
        matches!(self, LonSpan::Wrapped { .. })
    }

    /// Bounds as `(first, last)` in slicing order.
    pub fn bounds(&self) -> (f64, f64) {
        match *self {
            LonSpan::Contiguous { lo, hi } | LonSpan::Wrapped { lo, hi } => (lo, hi),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_to_360_bounds_keep_operand_order() {
        let span = LonConvention::ZeroTo360.native_span(-125.0, -65.0);
        assert_eq!(span, LonSpan::Contiguous { lo: 235.0, hi: 295.0 });
    }

    #[test]
    fn test_zero_to_360_wraps_at_prime_meridian() {
        let span = LonConvention::ZeroTo360.native_span(-10.0, 10.0);
        assert_eq!(span, LonSpan::Wrapped { lo: 350.0, hi: 10.0 });
        assert!(span.contains(355.0));
        assert!(span.contains(5.0));
        assert!(!span.contains(180.0));
    }

    #[test]
    fn test_zero_to_360_full_globe_starts_at_antimeridian() {
        let span = LonConvention::ZeroTo360.native_span(-180.0, 180.0);
        assert_eq!(span, LonSpan::Wrapped { lo: 180.0, hi: 180.0 });
        assert!(span.contains(0.0));
        assert!(span.contains(359.75));
    }

    #[test]
    fn test_signed_axis_leading_180_is_west_edge() {
        let conv = LonConvention::ZeroTo360;
        assert_eq!(conv.signed_axis(&[180.0, 180.5, 181.0]), vec![-180.0, -179.5, -179.0]);
        assert_eq!(conv.signed_axis(&[179.0, 180.0]), vec![179.0, 180.0]);
        assert_eq!(conv.signed_axis(&[180.0]), vec![180.0]);
        assert_eq!(LonConvention::Signed.signed_axis(&[-180.0, 0.0]), vec![-180.0, 0.0]);
    }

    #[test]
    fn test_positive_west_negates_and_orders() {
        let span = LonConvention::PositiveWest.native_span(-125.0, -65.0);
        assert_eq!(span, LonSpan::Contiguous { lo: 65.0, hi: 125.0 });
    }

    #[test]
    fn test_signed_round_trip() {
        for conv in [
            LonConvention::Signed,
            LonConvention::ZeroTo360,
            LonConvention::PositiveWest,
        ] {
            for lon in [-179.5, -125.0, -0.25, 0.0, 45.0, 179.75] {
                let back = conv.to_signed(conv.to_native(lon));
                assert!((back - lon).abs() < 1e-9, "{conv}: {lon} -> {back}");
            }
        }
    }
}
