//! Geometric helpers shared by the distance builder and the plots.
//!
//! Coordinates are `[latitude, longitude]` pairs in degrees throughout.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometres (IUGG).
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Great-circle distance between two `[lat, lon]` points, in kilometres.
///
/// Uses the haversine formula; the intermediate term is clamped to `[0, 1]`
/// so antipodal rounding never produces NaN.
#[inline]
pub fn haversine_km(a: [f64; 2], b: [f64; 2]) -> f64 {
    let lat1 = a[0].to_radians();
    let lat2 = b[0].to_radians();
    let dlat = (b[0] - a[0]).to_radians();
    let dlon = (b[1] - a[1]).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.clamp(0.0, 1.0).sqrt().asin()
}

/// Euclidean distance in degree space.
#[inline]
pub fn euclidean(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    (dx * dx + dy * dy).sqrt()
}

/// How NaN entries are removed from paired latitude/longitude columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NanFilter {
    /// Drop a row when either coordinate is NaN. Pairs stay aligned.
    #[default]
    Joint,
    /// Drop NaNs from each axis on its own, then pair by position and
    /// truncate to the shorter axis. Pairs can end up misaligned whenever the
    /// two axes have NaNs at different rows; kept for reproducing old plots.
    PerAxis,
}

/// Remove NaN entries from paired coordinate columns according to `mode`.
///
/// Columns of unequal length are first cut to the shorter one.
pub fn filter_nan_pairs(lat: &[f64], lon: &[f64], mode: NanFilter) -> (Vec<f64>, Vec<f64>) {
    let n = lat.len().min(lon.len());
    match mode {
        NanFilter::Joint => lat[..n]
            .iter()
            .zip(&lon[..n])
            .filter(|(x, y)| !x.is_nan() && !y.is_nan())
            .map(|(x, y)| (*x, *y))
            .unzip(),
        NanFilter::PerAxis => {
            let mut xs: Vec<f64> = lat[..n].iter().copied().filter(|v| !v.is_nan()).collect();
            let mut ys: Vec<f64> = lon[..n].iter().copied().filter(|v| !v.is_nan()).collect();
            let paired = xs.len().min(ys.len());
            xs.truncate(paired);
            ys.truncate(paired);
            (xs, ys)
        }
    }
}

/// Minimum and maximum of the finite values in `values`, if any.
pub fn finite_extent(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}
