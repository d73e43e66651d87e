//! Evaluated sample points in unit-cube and physical space.

use serde::{Deserialize, Serialize};

/// Identifier for a sample point, unique within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PointId(u64);

impl PointId {
    /// Creates a new identifier from its raw integer representation.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw integer representation of the identifier.
    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

/// A single evaluated sample.
///
/// `theta` is the image of `u` under the prior transform and `logl` the
/// log-likelihood at `theta`, both computed exactly once when the point is
/// created. `logl` is finite or equal to the floor constant substituted for
/// non-finite likelihood values; it is never NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Run-unique identifier.
    pub id: PointId,
    /// Coordinates in the unit cube `[0,1]^d`.
    pub u: Vec<f64>,
    /// Coordinates in physical parameter space, `transform(u)`.
    pub theta: Vec<f64>,
    /// Cached log-likelihood at `theta`.
    pub logl: f64,
}

impl Point {
    /// Bundles an evaluated sample into a point.
    pub fn new(id: PointId, u: Vec<f64>, theta: Vec<f64>, logl: f64) -> Self {
        Self { id, u, theta, logl }
    }

    /// Dimensionality of the unit-cube coordinates.
    pub fn dim(&self) -> usize {
        self.u.len()
    }
}
