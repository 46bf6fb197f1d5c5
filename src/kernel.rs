// src/kernel.rs

use crate::scalar::SvdScalar;
use log::{trace, warn};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis, ShapeBuilder};
use ndarray_linalg::error::LinalgError;
use ndarray_linalg::{JobSvd, SVDDCInto};
use num_traits::Float;
use std::fmt;
use thiserror::Error;

/// Status code convention shared by every kernel call: `0` is success, a
/// negative value names the offending argument, a positive value reports
/// that the iteration did not converge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum KernelFailure {
    #[error("invalid value for argument {} of the kernel routine", -status)]
    InvalidArgument { status: i32 },
    #[error("kernel routine did not converge (status {status})")]
    NonConvergence { status: i32 },
}

impl KernelFailure {
    pub fn from_status(status: i32) -> Result<(), KernelFailure> {
        match status {
            0 => Ok(()),
            s if s < 0 => Err(KernelFailure::InvalidArgument { status: s }),
            s => Err(KernelFailure::NonConvergence { status: s }),
        }
    }
}

/// Which parts of the decomposition a call must produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SvdJob {
    /// Full `U` (rows x rows) and `V*` (cols x cols).
    AllVectors,
    ValuesOnly,
}

/// Output of a Singular Value Decomposition.
#[derive(Debug)]
pub struct SVDOutput<T: SvdScalar> {
    pub u: Option<Array2<T>>,
    /// Singular values in descending order.
    pub s: Array1<T::Real>,
    pub vt: Option<Array2<T>>,
}

#[derive(Debug, Clone)]
pub struct LeastSquaresOutput<R> {
    pub singular_values: Array1<R>,
    pub rank: usize,
}

/// Scratch copy of a coefficient buffer, handed to a kernel and consumed by it.
///
/// A workspace can only be built by copying, so the kernel never receives a
/// factorization's owned buffer.
#[derive(Debug)]
pub struct Workspace<T> {
    buffer: Array2<T>,
}

impl<T: Copy> Workspace<T> {
    /// Copies `coefficients` into a fresh column-major buffer.
    pub fn copy_of(coefficients: ArrayView2<'_, T>) -> Self {
        let buffer = Array2::from_shape_fn(coefficients.raw_dim().f(), |(i, j)| coefficients[[i, j]]);
        Self { buffer }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.buffer.dim()
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        self.buffer.view()
    }

    pub fn into_inner(self) -> Array2<T> {
        self.buffer
    }
}

/// Counts the singular values strictly above `rcond * sigma_max`.
///
/// `singular_values` must be sorted in descending order. This is the single
/// rank rule used by the factorization, its solve path included.
pub fn numerical_rank<R: Float>(singular_values: ArrayView1<'_, R>, rcond: R) -> usize {
    let largest = match singular_values.get(0) {
        Some(&value) => value,
        None => return 0,
    };
    let cutoff = rcond * largest;
    singular_values.iter().filter(|&&sigma| sigma > cutoff).count()
}

/// Trait for the dense SVD kernel behind a factorization.
///
/// Implementations only have to provide [`svd`](SvdKernel::svd); the
/// minimum-norm least-squares solve is derived from it.
pub trait SvdKernel<T: SvdScalar>: fmt::Debug + Send + Sync {
    /// Decomposes the workspace. The workspace is consumed. Singular values
    /// may come back in any order; they are sorted descending before use.
    fn svd(&self, job: SvdJob, workspace: Workspace<T>) -> Result<SVDOutput<T>, KernelFailure>;

    /// Minimum-norm least-squares solve of `A x = B`.
    ///
    /// `rhs` holds `B` in its leading rows and must have `max(rows, cols)`
    /// rows. On success its first `cols` rows hold `x` and the rest are zero.
    /// Singular values at or below `rcond * sigma_max` are dropped from the
    /// solution subspace.
    fn least_squares_solve(
        &self,
        workspace: Workspace<T>,
        rhs: &mut Array2<T>,
        rcond: T::Real,
    ) -> Result<LeastSquaresOutput<T::Real>, KernelFailure> {
        let (nrows, ncols) = workspace.dim();
        if rhs.nrows() != nrows.max(ncols) {
            // Leading dimension of B is the seventh argument of xGELSS.
            return Err(KernelFailure::InvalidArgument { status: -7 });
        }

        let SVDOutput { u, s: singular_values, vt } = sort_descending(self.svd(SvdJob::AllVectors, workspace)?);
        let (u, vt) = match (u, vt) {
            (Some(u), Some(vt)) => (u, vt),
            _ => return Err(KernelFailure::InvalidArgument { status: -1 }),
        };

        let rank = numerical_rank(singular_values.view(), rcond);
        trace!("Least-squares solve keeps {} of {} singular values.", rank, singular_values.len());

        // x = V_r * inv(S_r) * U_r^H * b
        let mut projected = u
            .slice(s![.., ..rank])
            .t()
            .mapv(|value| value.conj())
            .dot(&rhs.slice(s![..nrows, ..]));
        for (mut row, &sigma) in projected.axis_iter_mut(Axis(0)).zip(singular_values.iter()) {
            row.mapv_inplace(|value| value.div_real(sigma));
        }
        let solution = vt
            .slice(s![..rank, ..])
            .t()
            .mapv(|value| value.conj())
            .dot(&projected);

        rhs.fill(T::zero());
        rhs.slice_mut(s![..ncols, ..]).assign(&solution);

        Ok(LeastSquaresOutput { singular_values, rank })
    }
}

// --- Helpers for reordering ndarray structures ---

/// Returns a new owned `Array2<T>` with columns in the specified order.
pub fn reorder_columns_owned<T: Clone>(matrix: &Array2<T>, order: &[usize]) -> Array2<T> {
    matrix.select(Axis(1), order)
}

/// Returns a new owned `Array2<T>` with rows in the specified order.
pub fn reorder_rows_owned<T: Clone>(matrix: &Array2<T>, order: &[usize]) -> Array2<T> {
    matrix.select(Axis(0), order)
}

/// Returns a new owned `Array1<T>` with elements in the specified order.
pub fn reorder_array_owned<T: Clone>(array: &Array1<T>, order: &[usize]) -> Array1<T> {
    array.select(Axis(0), order)
}

/// Puts singular values (and the matching singular vectors) in descending
/// order. Backends that already sort are returned untouched.
pub fn sort_descending<T: SvdScalar>(output: SVDOutput<T>) -> SVDOutput<T> {
    let sorted = output
        .s
        .windows(2)
        .into_iter()
        .all(|pair| pair[0] >= pair[1]);
    if sorted {
        return output;
    }

    let mut order: Vec<usize> = (0..output.s.len()).collect();
    order.sort_by(|&a, &b| {
        output.s[b]
            .partial_cmp(&output.s[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Only the leading min(rows, cols) vectors pair with a singular value.
    let k = order.len();
    let u = output.u.map(|u| {
        let tail: Vec<usize> = (k..u.ncols()).collect();
        let full_order: Vec<usize> = order.iter().copied().chain(tail).collect();
        reorder_columns_owned(&u, &full_order)
    });
    let vt = output.vt.map(|vt| {
        let tail: Vec<usize> = (k..vt.nrows()).collect();
        let full_order: Vec<usize> = order.iter().copied().chain(tail).collect();
        reorder_rows_owned(&vt, &full_order)
    });

    SVDOutput {
        u,
        s: reorder_array_owned(&output.s, &order),
        vt,
    }
}

// --- LAPACK kernel through ndarray-linalg ---

/// Kernel backed by LAPACK's divide and conquer SVD (`xGESDD`).
#[derive(Debug, Default, Copy, Clone)]
pub struct LapackKernel;

fn failure_from_linalg(error: LinalgError) -> KernelFailure {
    let status = match error {
        LinalgError::Lapack(lax::error::Error::LapackComputationalFailure { return_code }) => {
            return_code.abs().max(1)
        }
        LinalgError::Lapack(lax::error::Error::LapackInvalidValue { return_code }) => -return_code.abs().max(1),
        other => {
            warn!("Unexpected error from the LAPACK backend: {}", other);
            -1
        }
    };
    // status is never zero here
    KernelFailure::from_status(status)
        .err()
        .unwrap_or(KernelFailure::InvalidArgument { status: -1 })
}

impl<T: SvdScalar> SvdKernel<T> for LapackKernel {
    fn svd(&self, job: SvdJob, workspace: Workspace<T>) -> Result<SVDOutput<T>, KernelFailure> {
        let flag = match job {
            SvdJob::AllVectors => JobSvd::All,
            SvdJob::ValuesOnly => JobSvd::None,
        };
        let (nrows, ncols) = workspace.dim();
        trace!("xGESDD on {}x{} workspace ({:?}).", nrows, ncols, job);
        let (u, s, vt) = workspace
            .into_inner()
            .svddc_into(flag)
            .map_err(failure_from_linalg)?;
        Ok(SVDOutput { u, s, vt })
    }
}

// --- faer kernel ---
#[cfg(feature = "backend_faer")]
mod faer_specific_code {
    use super::{sort_descending, KernelFailure, SVDOutput, SvdJob, SvdKernel, Workspace};
    use dyn_stack::{MemBuffer, MemStack};
    use faer::diag::{Diag, DiagRef};
    use faer::linalg::svd::{self, ComputeSvdVectors};
    use faer::traits::ComplexField;
    use faer::{get_global_parallelism, Mat, MatRef};
    use log::trace;
    use ndarray::{Array1, Array2};

    /// Kernel backed by faer's SVD, for real scalars.
    #[derive(Debug, Default, Copy, Clone)]
    pub struct FaerKernel;

    type RawSvd<F> = (Option<Array2<F>>, Array1<F>, Option<Array2<F>>);

    fn mat_to_array<F: Copy>(mat: MatRef<'_, F>) -> Array2<F> {
        Array2::from_shape_fn((mat.nrows(), mat.ncols()), |(i, j)| mat[(i, j)])
    }

    fn diag_to_array<F: Copy>(diag: DiagRef<'_, F>) -> Array1<F> {
        let mat = diag.column_vector().as_mat();
        Array1::from_shape_fn(mat.nrows(), |i| mat[(i, 0)])
    }

    fn workspace_as_mat<F>(buffer: &Array2<F>) -> Result<MatRef<'_, F>, KernelFailure> {
        let (nrows, ncols) = buffer.dim();
        // The workspace is always contiguous; anything else is a caller bug.
        let slice = buffer
            .as_slice_memory_order()
            .ok_or(KernelFailure::InvalidArgument { status: -4 })?;
        if buffer.is_standard_layout() {
            Ok(MatRef::from_row_major_slice(slice, nrows, ncols))
        } else {
            Ok(MatRef::from_column_major_slice(slice, nrows, ncols))
        }
    }

    fn faer_svd<F: ComplexField + Copy>(
        matrix: MatRef<'_, F>,
        job: SvdJob,
    ) -> Result<RawSvd<F>, KernelFailure> {
        let (rows, cols) = matrix.shape();
        let want_vectors = job == SvdJob::AllVectors;
        let flag = if want_vectors {
            ComputeSvdVectors::Full
        } else {
            ComputeSvdVectors::No
        };

        let mut singular = Diag::<F>::zeros(rows.min(cols));
        let mut u_storage = want_vectors.then(|| Mat::<F>::zeros(rows, rows));
        let mut v_storage = want_vectors.then(|| Mat::<F>::zeros(cols, cols));

        let par = get_global_parallelism();
        let mut mem = MemBuffer::new(svd::svd_scratch::<F>(
            rows,
            cols,
            flag,
            flag,
            par,
            Default::default(),
        ));
        let stack = MemStack::new(&mut mem);

        trace!("faer SVD on {}x{} workspace ({:?}).", rows, cols, job);
        svd::svd(
            matrix,
            singular.as_mut(),
            u_storage.as_mut().map(|mat| mat.as_mut()),
            v_storage.as_mut().map(|mat| mat.as_mut()),
            par,
            stack,
            Default::default(),
        )
        .map_err(|_| KernelFailure::NonConvergence { status: 1 })?;

        let s = diag_to_array(singular.as_ref());
        let u = u_storage.map(|mat| mat_to_array(mat.as_ref()));
        // Real scalars only, so V* is the plain transpose of V.
        let vt = v_storage.map(|mat| mat_to_array(mat.as_ref().transpose()));
        Ok((u, s, vt))
    }

    impl SvdKernel<f64> for FaerKernel {
        fn svd(&self, job: SvdJob, workspace: Workspace<f64>) -> Result<SVDOutput<f64>, KernelFailure> {
            let buffer = workspace.into_inner();
            let (u, s, vt) = faer_svd(workspace_as_mat(&buffer)?, job)?;
            Ok(sort_descending(SVDOutput { u, s, vt }))
        }
    }

    impl SvdKernel<f32> for FaerKernel {
        fn svd(&self, job: SvdJob, workspace: Workspace<f32>) -> Result<SVDOutput<f32>, KernelFailure> {
            let buffer = workspace.into_inner();
            let (u, s, vt) = faer_svd(workspace_as_mat(&buffer)?, job)?;
            Ok(sort_descending(SVDOutput { u, s, vt }))
        }
    }
}

#[cfg(feature = "backend_faer")]
pub use faer_specific_code::FaerKernel;

// --- Provider dispatch ---

/// Dispatches to the kernel selected by compile-time feature flags: faer for
/// real scalars when `backend_faer` is enabled, LAPACK otherwise. Complex
/// scalars always go through LAPACK.
#[derive(Debug, Default, Copy, Clone)]
pub struct KernelProvider;

impl SvdKernel<f64> for KernelProvider {
    fn svd(&self, job: SvdJob, workspace: Workspace<f64>) -> Result<SVDOutput<f64>, KernelFailure> {
        #[cfg(feature = "backend_faer")]
        {
            FaerKernel.svd(job, workspace)
        }
        #[cfg(not(feature = "backend_faer"))]
        {
            LapackKernel.svd(job, workspace)
        }
    }
}

impl SvdKernel<f32> for KernelProvider {
    fn svd(&self, job: SvdJob, workspace: Workspace<f32>) -> Result<SVDOutput<f32>, KernelFailure> {
        #[cfg(feature = "backend_faer")]
        {
            FaerKernel.svd(job, workspace)
        }
        #[cfg(not(feature = "backend_faer"))]
        {
            LapackKernel.svd(job, workspace)
        }
    }
}

impl SvdKernel<ndarray_linalg::c64> for KernelProvider {
    fn svd(
        &self,
        job: SvdJob,
        workspace: Workspace<ndarray_linalg::c64>,
    ) -> Result<SVDOutput<ndarray_linalg::c64>, KernelFailure> {
        LapackKernel.svd(job, workspace)
    }
}

impl SvdKernel<ndarray_linalg::c32> for KernelProvider {
    fn svd(
        &self,
        job: SvdJob,
        workspace: Workspace<ndarray_linalg::c32>,
    ) -> Result<SVDOutput<ndarray_linalg::c32>, KernelFailure> {
        LapackKernel.svd(job, workspace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use ndarray::{arr1, arr2};

    #[test]
    fn status_codes_follow_lapack_convention() {
        assert_eq!(KernelFailure::from_status(0), Ok(()));
        assert_eq!(
            KernelFailure::from_status(-3),
            Err(KernelFailure::InvalidArgument { status: -3 })
        );
        assert_eq!(
            KernelFailure::from_status(2),
            Err(KernelFailure::NonConvergence { status: 2 })
        );
    }

    #[test]
    fn lapack_errors_map_to_kernel_failures() {
        let invalid = LinalgError::Lapack(lax::error::Error::LapackInvalidValue { return_code: -4 });
        assert_eq!(
            failure_from_linalg(invalid),
            KernelFailure::InvalidArgument { status: -4 }
        );

        let diverged = LinalgError::Lapack(lax::error::Error::LapackComputationalFailure { return_code: 3 });
        let failure = failure_from_linalg(diverged);
        assert_eq!(failure, KernelFailure::NonConvergence { status: 3 });
        assert!(matches!(
            crate::FactorSvdError::from_kernel("gesdd", failure),
            crate::FactorSvdError::ConvergenceFailure { status: 3, .. }
        ));
    }

    #[test]
    fn numerical_rank_uses_relative_cutoff() {
        let values = arr1(&[10.0, 1.0, 1e-3, 1e-12]);
        assert_eq!(numerical_rank(values.view(), 1e-10), 3);
        assert_eq!(numerical_rank(values.view(), 1e-2), 2);
        assert_eq!(numerical_rank(values.view(), 0.5), 1);
        // sigma_0 itself is never above its own cutoff once rcond >= 1.
        assert_eq!(numerical_rank(values.view(), 1.0), 0);
        assert_eq!(numerical_rank(arr1(&[0.0f64, 0.0]).view(), 1e-10), 0);
        assert_eq!(numerical_rank(Array1::<f64>::zeros(0).view(), 1e-10), 0);
    }

    #[test]
    fn workspace_is_an_independent_column_major_copy() {
        let original = arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let workspace = Workspace::copy_of(original.view());
        assert_eq!(workspace.dim(), (2, 3));
        assert!(workspace.view().t().is_standard_layout());

        let mut scratch = workspace.into_inner();
        scratch.fill(0.0);
        assert_eq!(original[[1, 2]], 6.0);
    }

    #[test]
    fn lapack_kernel_returns_sorted_values_and_full_vectors() {
        let a = arr2(&[[3.0, 0.0], [0.0, 4.0], [0.0, 0.0]]);
        let out = LapackKernel
            .svd(SvdJob::AllVectors, Workspace::copy_of(a.view()))
            .unwrap();
        assert_approx_eq!(f64, out.s[0], 4.0, epsilon = 1e-12);
        assert_approx_eq!(f64, out.s[1], 3.0, epsilon = 1e-12);
        assert_eq!(out.u.as_ref().map(|u| u.dim()), Some((3, 3)));
        assert_eq!(out.vt.as_ref().map(|vt| vt.dim()), Some((2, 2)));

        let values_only = LapackKernel
            .svd(SvdJob::ValuesOnly, Workspace::copy_of(a.view()))
            .unwrap();
        assert!(values_only.u.is_none());
        assert!(values_only.vt.is_none());
    }

    #[test]
    fn least_squares_rejects_short_rhs_buffer() {
        let a = arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        // Underdetermined: the buffer must have max(2, 3) = 3 rows.
        let mut rhs = Array2::<f64>::zeros((2, 1));
        let err = LapackKernel
            .least_squares_solve(Workspace::copy_of(a.view()), &mut rhs, 1e-12)
            .unwrap_err();
        assert_eq!(err, KernelFailure::InvalidArgument { status: -7 });
    }

    #[test]
    fn least_squares_returns_minimum_norm_solution() {
        // x + y = 2 has minimum-norm solution (1, 1).
        let a = arr2(&[[1.0, 1.0]]);
        let mut rhs = arr2(&[[2.0], [0.0]]);
        let out = LapackKernel
            .least_squares_solve(Workspace::copy_of(a.view()), &mut rhs, 1e-12)
            .unwrap();
        assert_eq!(out.rank, 1);
        assert_approx_eq!(f64, rhs[[0, 0]], 1.0, epsilon = 1e-12);
        assert_approx_eq!(f64, rhs[[1, 0]], 1.0, epsilon = 1e-12);
    }

    /// Decomposition of diag(1, 4) reported in ascending order.
    #[derive(Debug)]
    struct AscendingDiagonalKernel;

    impl SvdKernel<f64> for AscendingDiagonalKernel {
        fn svd(&self, _job: SvdJob, _workspace: Workspace<f64>) -> Result<SVDOutput<f64>, KernelFailure> {
            Ok(SVDOutput {
                u: Some(Array2::eye(2)),
                s: arr1(&[1.0, 4.0]),
                vt: Some(Array2::eye(2)),
            })
        }
    }

    #[test]
    fn least_squares_cutoff_is_relative_to_largest_value() {
        let a = arr2(&[[1.0, 0.0], [0.0, 4.0]]);
        let mut rhs = arr2(&[[1.0], [8.0]]);
        let out = AscendingDiagonalKernel
            .least_squares_solve(Workspace::copy_of(a.view()), &mut rhs, 0.5)
            .unwrap();
        // Cutoff is 0.5 * 4, so only the sigma = 4 direction survives.
        assert_eq!(out.rank, 1);
        assert_eq!(out.singular_values, arr1(&[4.0, 1.0]));
        assert_approx_eq!(f64, rhs[[0, 0]], 0.0, epsilon = 1e-12);
        assert_approx_eq!(f64, rhs[[1, 0]], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn sort_descending_reorders_values_and_vectors() {
        let unsorted = SVDOutput::<f64> {
            u: Some(arr2(&[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])),
            s: arr1(&[1.0, 3.0]),
            vt: Some(arr2(&[[1.0, 2.0], [3.0, 4.0]])),
        };
        let sorted = sort_descending(unsorted);
        assert_eq!(sorted.s, arr1(&[3.0, 1.0]));
        // Columns beyond min(rows, cols) keep their position.
        assert_eq!(
            sorted.u.unwrap(),
            arr2(&[[0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]])
        );
        assert_eq!(sorted.vt.unwrap(), arr2(&[[3.0, 4.0], [1.0, 2.0]]));
    }
}
