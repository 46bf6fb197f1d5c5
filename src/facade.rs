// src/facade.rs

use crate::adapter::{MatrixSource, MatrixStructure};
use crate::config::FactorSvdConfig;
use crate::diagnostics::FactorizationDiagnostics;
use crate::error::{FactorSvdError, Result};
use crate::factorization::{FactorSvdRep, SingularTriplets};
use crate::kernel::SvdKernel;
use crate::scalar::{ScalarKind, SvdScalar};
use log::info;
use ndarray::{Array1, Array2, ArrayBase, Data, Ix1, Ix2};
use ndarray_linalg::{c32, c64};
use num_traits::ToPrimitive;
use std::sync::Arc;

/// The closed set of states a [`FactorSvd`] handle can be in.
#[derive(Debug, Clone, Default)]
pub enum Representation {
    #[default]
    Unfactored,
    Real32(FactorSvdRep<f32>),
    Real64(FactorSvdRep<f64>),
    Complex32(FactorSvdRep<c32>),
    Complex64(FactorSvdRep<c64>),
}

impl Representation {
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self {
            Representation::Unfactored => None,
            Representation::Real32(_) => Some(ScalarKind::Real32),
            Representation::Real64(_) => Some(ScalarKind::Real64),
            Representation::Complex32(_) => Some(ScalarKind::Complex32),
            Representation::Complex64(_) => Some(ScalarKind::Complex64),
        }
    }

    fn dims(&self) -> Option<(usize, usize)> {
        match self {
            Representation::Unfactored => None,
            Representation::Real32(rep) => Some((rep.nrows(), rep.ncols())),
            Representation::Real64(rep) => Some((rep.nrows(), rep.ncols())),
            Representation::Complex32(rep) => Some((rep.nrows(), rep.ncols())),
            Representation::Complex64(rep) => Some((rep.nrows(), rep.ncols())),
        }
    }

    fn structure(&self) -> Option<MatrixStructure> {
        match self {
            Representation::Unfactored => None,
            Representation::Real32(rep) => Some(rep.structure()),
            Representation::Real64(rep) => Some(rep.structure()),
            Representation::Complex32(rep) => Some(rep.structure()),
            Representation::Complex64(rep) => Some(rep.structure()),
        }
    }

    fn rcond(&self) -> Option<f64> {
        match self {
            Representation::Unfactored => None,
            Representation::Real32(rep) => rep.rcond().to_f64(),
            Representation::Real64(rep) => Some(rep.rcond()),
            Representation::Complex32(rep) => rep.rcond().to_f64(),
            Representation::Complex64(rep) => Some(rep.rcond()),
        }
    }

    fn rank(&mut self) -> Result<usize> {
        match self {
            Representation::Unfactored => Err(FactorSvdError::NotFactored),
            Representation::Real32(rep) => rep.rank(),
            Representation::Real64(rep) => rep.rank(),
            Representation::Complex32(rep) => rep.rank(),
            Representation::Complex64(rep) => rep.rank(),
        }
    }

    fn diagnostics(&mut self) -> Result<FactorizationDiagnostics> {
        match self {
            Representation::Unfactored => Err(FactorSvdError::NotFactored),
            Representation::Real32(rep) => rep.diagnostics(),
            Representation::Real64(rep) => rep.diagnostics(),
            Representation::Complex32(rep) => rep.diagnostics(),
            Representation::Complex64(rep) => rep.diagnostics(),
        }
    }
}

/// Rank-revealing SVD factorization of a dense matrix.
///
/// A handle is either unfactored or holds the captured matrix of one scalar
/// kind (`f32`, `f64`, `c32` or `c64`). Cloning a handle deep-copies its
/// state, so two handles never observe each other's cache updates.
///
/// # Examples
///
/// ```
/// use ndarray::{arr1, arr2};
/// use svd_factor::FactorSvd;
///
/// let a = arr2(&[[1.0_f64, 2.0], [2.0, 4.0], [0.0, 1.0]]);
/// let mut svd = FactorSvd::from_matrix(&a).unwrap();
/// assert_eq!(svd.rank().unwrap(), 2);
///
/// let x = svd.solve(&arr1(&[1.0, 2.0, 0.0])).unwrap();
/// assert_eq!(x.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FactorSvd {
    rep: Representation,
    config: FactorSvdConfig,
}

impl FactorSvd {
    /// Creates an unfactored handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an unfactored handle whose later `factor` calls use `config`.
    pub fn with_config(config: FactorSvdConfig) -> Self {
        Self {
            rep: Representation::Unfactored,
            config,
        }
    }

    /// Captures `matrix` with the default threshold.
    pub fn from_matrix<T, M>(matrix: &M) -> Result<Self>
    where
        T: SvdScalar,
        M: MatrixSource<T> + ?Sized,
    {
        let mut handle = Self::new();
        handle.factor(matrix)?;
        Ok(handle)
    }

    pub fn from_matrix_with_rcond<T, M>(matrix: &M, rcond: f64) -> Result<Self>
    where
        T: SvdScalar,
        M: MatrixSource<T> + ?Sized,
    {
        let mut handle = Self::new();
        handle.factor_with_rcond(matrix, rcond)?;
        Ok(handle)
    }

    /// Captures `matrix` and routes every decomposition through `kernel`.
    pub fn from_matrix_with_kernel<T, M>(
        matrix: &M,
        rcond: Option<f64>,
        kernel: Arc<dyn SvdKernel<T>>,
    ) -> Result<Self>
    where
        T: SvdScalar,
        M: MatrixSource<T> + ?Sized,
    {
        let mut handle = Self::new();
        handle.factor_with_kernel(matrix, rcond, kernel)?;
        Ok(handle)
    }

    /// Discards the current state and captures `matrix`. The threshold comes
    /// from the handle's configuration.
    pub fn factor<T, M>(&mut self, matrix: &M) -> Result<()>
    where
        T: SvdScalar,
        M: MatrixSource<T> + ?Sized,
    {
        let rcond = self.config.reciprocal_condition;
        self.factor_with_kernel(matrix, rcond, T::default_kernel())
    }

    pub fn factor_with_rcond<T, M>(&mut self, matrix: &M, rcond: f64) -> Result<()>
    where
        T: SvdScalar,
        M: MatrixSource<T> + ?Sized,
    {
        self.factor_with_kernel(matrix, Some(rcond), T::default_kernel())
    }

    /// Discards the current state and captures `matrix` with an explicit
    /// kernel. If capture fails the handle is left unfactored.
    pub fn factor_with_kernel<T, M>(
        &mut self,
        matrix: &M,
        rcond: Option<f64>,
        kernel: Arc<dyn SvdKernel<T>>,
    ) -> Result<()>
    where
        T: SvdScalar,
        M: MatrixSource<T> + ?Sized,
    {
        if let Some(previous) = self.rep.scalar_kind() {
            info!("Discarding previous {:?} factorization.", previous);
        }
        self.rep = Representation::Unfactored;
        let rcond = rcond.or(self.config.reciprocal_condition);
        let rep = FactorSvdRep::new(matrix, rcond, kernel)?;
        self.rep = T::into_representation(rep);
        Ok(())
    }

    pub fn is_factored(&self) -> bool {
        !matches!(self.rep, Representation::Unfactored)
    }

    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        self.rep.scalar_kind()
    }

    pub fn nrows(&self) -> Option<usize> {
        self.rep.dims().map(|(nrows, _)| nrows)
    }

    pub fn ncols(&self) -> Option<usize> {
        self.rep.dims().map(|(_, ncols)| ncols)
    }

    pub fn structure(&self) -> Option<MatrixStructure> {
        self.rep.structure()
    }

    /// Threshold in effect for the current factorization, widened to `f64`.
    pub fn rcond(&self) -> Option<f64> {
        self.rep.rcond()
    }

    pub fn config(&self) -> &FactorSvdConfig {
        &self.config
    }

    pub fn representation(&self) -> &Representation {
        &self.rep
    }

    /// Numerical rank, computing singular values on first use.
    pub fn rank(&mut self) -> Result<usize> {
        self.rep.rank()
    }

    /// Minimum-norm least-squares solution of `A x = b`; `x` has `ncols` entries.
    pub fn solve<T, S>(&mut self, b: &ArrayBase<S, Ix1>) -> Result<Array1<T>>
    where
        T: SvdScalar,
        S: Data<Elem = T>,
    {
        self.rep_mut::<T>()?.solve(b.view())
    }

    /// Minimum-norm least-squares solution of `A X = B`; `X` is `ncols x B.ncols()`.
    pub fn solve_matrix<T, S>(&mut self, b: &ArrayBase<S, Ix2>) -> Result<Array2<T>>
    where
        T: SvdScalar,
        S: Data<Elem = T>,
    {
        self.rep_mut::<T>()?.solve_matrix(b.view())
    }

    /// Inverse of the factored matrix according to the configured
    /// [`InversePolicy`](crate::InversePolicy).
    pub fn inverse<T: SvdScalar>(&mut self) -> Result<Array2<T>> {
        let policy = self.config.inverse_policy;
        self.rep_mut::<T>()?.inverse(policy)
    }

    pub fn singular_values<T: SvdScalar>(&mut self) -> Result<Array1<T::Real>> {
        self.rep_mut::<T>()?.singular_values()
    }

    pub fn singular_values_and_vectors<T: SvdScalar>(&mut self) -> Result<SingularTriplets<T>> {
        self.rep_mut::<T>()?.singular_values_and_vectors()
    }

    pub fn condition_number<T: SvdScalar>(&mut self) -> Result<Option<T::Real>> {
        self.rep_mut::<T>()?.condition_number()
    }

    pub fn diagnostics(&mut self) -> Result<FactorizationDiagnostics> {
        self.rep.diagnostics()
    }

    /// Typed access to the factored state.
    pub fn rep<T: SvdScalar>(&self) -> Result<&FactorSvdRep<T>> {
        let factored = self.rep.scalar_kind().ok_or(FactorSvdError::NotFactored)?;
        T::representation_ref(&self.rep).ok_or(FactorSvdError::ScalarKindMismatch {
            factored,
            requested: T::KIND,
        })
    }

    fn rep_mut<T: SvdScalar>(&mut self) -> Result<&mut FactorSvdRep<T>> {
        let factored = self.rep.scalar_kind().ok_or(FactorSvdError::NotFactored)?;
        T::representation_mut(&mut self.rep).ok_or(FactorSvdError::ScalarKindMismatch {
            factored,
            requested: T::KIND,
        })
    }
}
