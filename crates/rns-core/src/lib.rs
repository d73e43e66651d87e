#![deny(missing_docs)]

//! Core contracts and deterministic plumbing for the RNS nested sampling
//! engine: sample points, user-function adapters, structured errors and the
//! substream-seeded RNG policy shared by every crate in the workspace.

pub mod errors;
pub mod point;
pub mod problem;
pub mod rng;

pub use errors::{ErrorInfo, RnsError};
pub use point::{Point, PointId};
pub use problem::{LogLikelihood, PriorTransform, Problem, LOGL_FLOOR};
pub use rng::{derive_substream_seed, RngHandle};
