use std::panic::{catch_unwind, AssertUnwindSafe};

use rayon::prelude::*;
use rns_core::errors::ErrorInfo;
use rns_core::{LogLikelihood, Point, PointId, PriorTransform, Problem, RnsError};

/// Parallel fan-out, ordered fan-in evaluator for candidate points.
///
/// Candidates are evaluated concurrently on a dedicated pool and handed back
/// sorted by proposal index, never completion order, so the accept/replace
/// sequence is reproducible for a fixed seed regardless of scheduling
/// jitter. A batch either fully completes or fails as a whole with no
/// engine state touched, which makes a retry with the same candidates safe.
pub struct Dispatcher {
    pool: rayon::ThreadPool,
}

impl Dispatcher {
    /// Builds a dispatcher with `num_workers` threads (0 uses the default).
    pub fn new(num_workers: usize) -> Result<Self, RnsError> {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if num_workers > 0 {
            builder = builder.num_threads(num_workers);
        }
        let pool = builder.build().map_err(|err| {
            RnsError::Dispatch(
                ErrorInfo::new("thread-pool", err.to_string())
                    .with_context("num_workers", num_workers.to_string()),
            )
        })?;
        Ok(Self { pool })
    }

    /// Evaluates every candidate, returning points in proposal order.
    pub fn evaluate_batch<T, L>(
        &self,
        problem: &Problem<T, L>,
        candidates: &[(PointId, Vec<f64>)],
    ) -> Result<Vec<Point>, RnsError>
    where
        T: PriorTransform,
        L: LogLikelihood,
    {
        let results: Result<Vec<(usize, Point)>, RnsError> = self.pool.install(|| {
            candidates
                .par_iter()
                .enumerate()
                .map(|(index, (id, u))| {
                    let evaluated = catch_unwind(AssertUnwindSafe(|| {
                        problem.evaluate(*id, u.clone())
                    }))
                    .unwrap_or_else(|_| {
                        Err(RnsError::UserFunction(
                            ErrorInfo::new(
                                "user-function-panic",
                                "user callable panicked during evaluation",
                            )
                            .with_context("candidate", index.to_string()),
                        ))
                    })?;
                    Ok((index, evaluated))
                })
                .collect()
        });
        let mut ordered = results?;
        ordered.sort_by_key(|(index, _)| *index);
        if ordered.len() != candidates.len() {
            return Err(RnsError::Dispatch(
                ErrorInfo::new("partial-batch", "batch returned fewer results than candidates")
                    .with_context("expected", candidates.len().to_string())
                    .with_context("actual", ordered.len().to_string()),
            ));
        }
        Ok(ordered.into_iter().map(|(_, point)| point).collect())
    }
}
