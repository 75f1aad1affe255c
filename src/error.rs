//! Error taxonomy. Only `InvalidGeometry` and `NoSheet`
//! prevent a nest from starting; everything else is either absorbed
//! locally (reduced placement quality, logged at `warn`) or, for
//! `WorkerFailure` after its one retry, escalated by aborting the
//! individual with a synthetic large fitness rather than propagating.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum NestError {
    #[error("invalid geometry for source {source}: {message}")]
    InvalidGeometry { source: u32, message: String },

    #[error("no sheets supplied")]
    NoSheet,

    #[error("clipper failed to produce a result for sources {a_source}/{b_source}")]
    ClipperFailure { a_source: u32, b_source: u32 },

    #[error("NFP computation failed for sources {a_source}/{b_source} (rotations {a_rot}/{b_rot})")]
    NFPFailure { a_source: u32, b_source: u32, a_rot: i32, b_rot: i32 },

    #[error("worker failed computing NFP for sources {a_source}/{b_source}, retry on evaluator thread also failed")]
    WorkerFailure { a_source: u32, b_source: u32 },

    #[error("nest cancelled")]
    Cancelled,
}
