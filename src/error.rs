// src/error.rs

use crate::adapter::MatrixStructure;
use crate::kernel::KernelFailure;
use crate::scalar::ScalarKind;
use ndarray::ShapeError;
use thiserror::Error;

/// Errors reported by the factorization and its adapter.
///
/// Every error is raised synchronously by the call that triggered it. Nothing
/// is retried internally and no partial output is handed back on failure.
#[derive(Debug, Error)]
pub enum FactorSvdError {
    #[error("No matrix was passed to FactorSvd.")]
    NotFactored,

    #[error(
        "number of rows in right hand side={rhs_rows} does not match number of rows in original matrix={matrix_rows}"
    )]
    DimensionMismatch { rhs_rows: usize, matrix_rows: usize },

    #[error("{routine}: divide and conquer singular value decomposition did not converge (status {status})")]
    ConvergenceFailure { routine: &'static str, status: i32 },

    /// The kernel rejected one of its arguments. Prior validation should make
    /// this unreachable, so it signals a contract violation inside the crate.
    #[error("{routine}: kernel rejected argument {} (status {status})", -status)]
    InvalidArgument { routine: &'static str, status: i32 },

    #[error("factorization holds {factored:?} elements but {requested:?} were requested")]
    ScalarKindMismatch {
        factored: ScalarKind,
        requested: ScalarKind,
    },

    #[error("inverse requires a square matrix, got {nrows}x{ncols}")]
    NotSquare { nrows: usize, ncols: usize },

    #[error("inverse requires a full rank matrix, rank {rank} < {dim}")]
    RankDeficient { rank: usize, dim: usize },

    #[error("{structure:?} structure requires a square matrix, got {nrows}x{ncols}")]
    NonSquareStructure {
        structure: MatrixStructure,
        nrows: usize,
        ncols: usize,
    },

    #[error("matrix buffer does not match its declared shape: {0}")]
    Layout(#[from] ShapeError),
}

impl FactorSvdError {
    /// Lifts a kernel status into the error kind the caller sees.
    pub(crate) fn from_kernel(routine: &'static str, failure: KernelFailure) -> Self {
        match failure {
            KernelFailure::NonConvergence { status } => {
                FactorSvdError::ConvergenceFailure { routine, status }
            }
            KernelFailure::InvalidArgument { status } => {
                FactorSvdError::InvalidArgument { routine, status }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, FactorSvdError>;
