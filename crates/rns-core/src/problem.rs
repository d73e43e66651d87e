//! User-supplied prior transform and likelihood contracts.

use crate::errors::{ErrorInfo, RnsError};
use crate::point::{Point, PointId};
use crate::rng::RngHandle;

/// Floor substituted for non-finite log-likelihood values.
///
/// Large enough in magnitude to lose against any finite likelihood when
/// ordering live points, small enough to stay harmless inside log-sum-exp
/// accumulation.
pub const LOGL_FLOOR: f64 = -1e300;

/// Maps a unit-cube sample to physical parameter space.
///
/// Implementations must be deterministic and safely callable from multiple
/// evaluation workers at once. Any closure with the matching shape
/// qualifies.
pub trait PriorTransform: Send + Sync {
    /// Transforms `u` in `[0,1]^d` to a physical-space vector.
    fn transform(&self, u: &[f64]) -> Vec<f64>;
}

impl<F> PriorTransform for F
where
    F: Fn(&[f64]) -> Vec<f64> + Send + Sync,
{
    fn transform(&self, u: &[f64]) -> Vec<f64> {
        self(u)
    }
}

/// Evaluates the log-likelihood of a physical-space vector.
pub trait LogLikelihood: Send + Sync {
    /// Returns the log-likelihood at `theta`. Non-finite results are
    /// tolerated and floored by the [`Problem`] adapter.
    fn log_likelihood(&self, theta: &[f64]) -> f64;
}

impl<F> LogLikelihood for F
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
    fn log_likelihood(&self, theta: &[f64]) -> f64 {
        self(theta)
    }
}

/// Adapter wrapping the user callables together with parameter metadata.
///
/// The adapter is the single evaluation path into user code: it checks the
/// transform output shape, floors non-finite likelihoods, and caches both
/// results inside the produced [`Point`].
pub struct Problem<T, L> {
    param_names: Vec<String>,
    derived_param_names: Vec<String>,
    wrapped_params: Vec<usize>,
    transform: T,
    loglike: L,
}

impl<T, L> std::fmt::Debug for Problem<T, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Problem")
            .field("param_names", &self.param_names)
            .field("derived_param_names", &self.derived_param_names)
            .field("wrapped_params", &self.wrapped_params)
            .finish_non_exhaustive()
    }
}

impl<T, L> Problem<T, L>
where
    T: PriorTransform,
    L: LogLikelihood,
{
    /// Creates a problem definition from parameter labels and callables.
    pub fn new(
        param_names: Vec<String>,
        transform: T,
        loglike: L,
    ) -> Result<Self, RnsError> {
        if param_names.is_empty() {
            return Err(RnsError::Config(ErrorInfo::new(
                "empty-param-names",
                "at least one parameter name is required",
            )));
        }
        Ok(Self {
            param_names,
            derived_param_names: Vec::new(),
            wrapped_params: Vec::new(),
            transform,
            loglike,
        })
    }

    /// Declares dimension indices treated as circular/periodic.
    pub fn with_wrapped_params(mut self, wrapped: Vec<usize>) -> Result<Self, RnsError> {
        let dim = self.param_names.len();
        if let Some(&bad) = wrapped.iter().find(|&&index| index >= dim) {
            return Err(RnsError::Config(
                ErrorInfo::new("wrapped-out-of-range", "wrapped index exceeds dimensionality")
                    .with_context("index", bad.to_string())
                    .with_context("dim", dim.to_string()),
            ));
        }
        self.wrapped_params = wrapped;
        Ok(self)
    }

    /// Declares labels for derived quantities computed alongside theta.
    ///
    /// Derived values are the trailing components the transform returns
    /// beyond the sampled dimensionality.
    pub fn with_derived_param_names(mut self, names: Vec<String>) -> Self {
        self.derived_param_names = names;
        self
    }

    /// Number of sampled dimensions.
    pub fn dim(&self) -> usize {
        self.param_names.len()
    }

    /// Ordered labels of the sampled parameters.
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Ordered labels of derived quantities, possibly empty.
    pub fn derived_param_names(&self) -> &[String] {
        &self.derived_param_names
    }

    /// Dimension indices treated as circular.
    pub fn wrapped_params(&self) -> &[usize] {
        &self.wrapped_params
    }

    /// Evaluates a unit-cube candidate into a fully populated point.
    ///
    /// The transform must return `dim()` sampled components plus one value
    /// per derived label, all finite; violations surface immediately as
    /// user-function errors. Non-finite likelihoods are floored, never
    /// surfaced.
    pub fn evaluate(&self, id: PointId, u: Vec<f64>) -> Result<Point, RnsError> {
        let theta = self.transform.transform(&u);
        let expected = self.dim() + self.derived_param_names.len();
        if theta.len() != expected {
            return Err(RnsError::UserFunction(
                ErrorInfo::new("transform-arity", "prior transform returned wrong arity")
                    .with_context("expected", expected.to_string())
                    .with_context("actual", theta.len().to_string())
                    .with_hint("return one value per parameter name plus derived labels"),
            ));
        }
        if let Some(pos) = theta.iter().position(|value| !value.is_finite()) {
            return Err(RnsError::UserFunction(
                ErrorInfo::new("transform-non-finite", "prior transform produced non-finite value")
                    .with_context("component", pos.to_string()),
            ));
        }
        let raw = self.loglike.log_likelihood(&theta[..self.dim()]);
        let logl = if raw.is_finite() { raw } else { LOGL_FLOOR };
        Ok(Point::new(id, u, theta, logl))
    }

    /// Exercises both callables on prior samples to surface caller bugs
    /// before a run starts.
    pub fn validate(&self, num_test_samples: usize, seed: u64) -> Result<(), RnsError> {
        let mut rng = RngHandle::from_seed(seed);
        for sample in 0..num_test_samples {
            let u: Vec<f64> = (0..self.dim()).map(|_| rng.uniform()).collect();
            self.evaluate(PointId::from_raw(sample as u64), u)?;
        }
        Ok(())
    }
}
