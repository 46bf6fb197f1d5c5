// Rank-revealing singular value decomposition (SVD) factorization

#![doc = include_str!("../README.md")]

pub mod adapter;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod facade;
pub mod factorization;
pub mod kernel;
pub mod scalar;


pub use adapter::{ElementView, MatrixSource, MatrixStructure, StorageOrder, StructuredMatrix, Triangle};
pub use config::{FactorSvdConfig, InversePolicy};
pub use diagnostics::FactorizationDiagnostics;
pub use error::{FactorSvdError, Result};
pub use facade::{FactorSvd, Representation};
pub use factorization::{FactorSvdRep, SingularTriplets, Spectrum};
pub use kernel::{
    numerical_rank, KernelFailure, KernelProvider, LapackKernel, LeastSquaresOutput, SVDOutput, SvdJob,
    SvdKernel, Workspace,
};
#[cfg(feature = "backend_faer")]
pub use kernel::FaerKernel;
pub use scalar::{default_rcond, ScalarKind, SvdScalar};

pub use ndarray_linalg::{c32, c64};
