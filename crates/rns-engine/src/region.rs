use rns_core::errors::ErrorInfo;
use rns_core::{Point, RngHandle, RnsError};

use crate::config::RegionConfig;

/// Sampling bound for one dimension.
#[derive(Debug, Clone, PartialEq)]
enum DimBound {
    /// Plain interval inside the unit cube.
    Interval {
        /// Inclusive lower edge.
        lo: f64,
        /// Inclusive upper edge.
        hi: f64,
    },
    /// Arc on the unit circle for wrapped dimensions.
    Arc {
        /// Start of the arc in `[0, 1)`.
        start: f64,
        /// Arc length, at most 1.
        width: f64,
    },
}

/// Enclosing proposal region fitted to the live population.
///
/// An axis-aligned bounding box inflated by a padding factor: staleness
/// between refits only ever over-covers the constrained volume, since the
/// box is grown from (and always contains) every live point it was fitted
/// to. Wrapped dimensions cover the complement of the largest angular gap.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    dims: Vec<DimBound>,
}

impl Region {
    /// Fits an inflated bounding region to the current live points.
    ///
    /// Fails when the live set is empty or when every dimension has
    /// collapsed below `min_width` (numerically identical live points), so
    /// callers terminate instead of rejection-looping forever.
    pub fn fit(
        points: &[&Point],
        wrapped: &[usize],
        config: &RegionConfig,
    ) -> Result<Self, RnsError> {
        let Some(first) = points.first() else {
            return Err(RnsError::Region(ErrorInfo::new(
                "empty-live-set",
                "cannot fit a region to an empty live population",
            )));
        };
        let dim = first.dim();

        let mut spreads = Vec::with_capacity(dim);
        let mut dims = Vec::with_capacity(dim);
        for axis in 0..dim {
            if wrapped.contains(&axis) {
                let (start, width) = covering_arc(points, axis);
                spreads.push(width);
                dims.push(inflate_arc(start, width, config.padding));
            } else {
                let lo = points
                    .iter()
                    .map(|point| point.u[axis])
                    .fold(f64::INFINITY, f64::min);
                let hi = points
                    .iter()
                    .map(|point| point.u[axis])
                    .fold(f64::NEG_INFINITY, f64::max);
                let spread = hi - lo;
                spreads.push(spread);
                let pad = (config.padding * spread).max(config.min_width);
                dims.push(DimBound::Interval {
                    lo: (lo - pad).max(0.0),
                    hi: (hi + pad).min(1.0),
                });
            }
        }

        if spreads.iter().all(|&spread| spread < config.min_width) {
            return Err(RnsError::Region(
                ErrorInfo::new("degenerate-region", "live points are numerically identical")
                    .with_context("live_points", points.len().to_string())
                    .with_hint("the likelihood may be pathologically peaked"),
            ));
        }

        Ok(Self { dims })
    }

    /// Draws one uniform candidate from the region.
    pub fn sample(&self, rng: &mut RngHandle) -> Vec<f64> {
        self.dims
            .iter()
            .map(|bound| match bound {
                DimBound::Interval { lo, hi } => lo + rng.uniform() * (hi - lo),
                DimBound::Arc { start, width } => (start + rng.uniform() * width).rem_euclid(1.0),
            })
            .collect()
    }

    /// Whether a unit-cube point lies inside the region.
    pub fn contains(&self, u: &[f64]) -> bool {
        u.len() == self.dims.len()
            && u.iter().zip(&self.dims).all(|(&value, bound)| match bound {
                DimBound::Interval { lo, hi } => value >= *lo && value <= *hi,
                DimBound::Arc { start, width } => {
                    (value - start).rem_euclid(1.0) <= *width + 1e-12
                }
            })
    }

    /// Log volume of the region (sum of log side lengths).
    pub fn log_volume(&self) -> f64 {
        self.dims
            .iter()
            .map(|bound| match bound {
                DimBound::Interval { lo, hi } => (hi - lo).max(f64::MIN_POSITIVE).ln(),
                DimBound::Arc { width, .. } => width.max(f64::MIN_POSITIVE).ln(),
            })
            .sum()
    }
}

/// Smallest arc covering the wrapped coordinates: the complement of the
/// largest gap between neighbouring points on the circle.
fn covering_arc(points: &[&Point], axis: usize) -> (f64, f64) {
    let mut coords: Vec<f64> = points
        .iter()
        .map(|point| point.u[axis].rem_euclid(1.0))
        .collect();
    coords.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut gap_start = coords.len() - 1;
    let mut gap_width = coords[0] + 1.0 - coords[coords.len() - 1];
    for pair in 0..coords.len() - 1 {
        let width = coords[pair + 1] - coords[pair];
        if width > gap_width {
            gap_width = width;
            gap_start = pair;
        }
    }
    let start = coords[(gap_start + 1) % coords.len()];
    (start, 1.0 - gap_width)
}

fn inflate_arc(start: f64, width: f64, padding: f64) -> DimBound {
    let pad = padding * width;
    let padded = width + 2.0 * pad;
    if padded >= 1.0 {
        DimBound::Interval { lo: 0.0, hi: 1.0 }
    } else {
        DimBound::Arc {
            start: (start - pad).rem_euclid(1.0),
            width: padded,
        }
    }
}
