// src/factorization.rs

use crate::adapter::{MatrixSource, MatrixStructure};
use crate::config::InversePolicy;
use crate::diagnostics::FactorizationDiagnostics;
use crate::error::{FactorSvdError, Result};
use crate::kernel::{numerical_rank, sort_descending, SVDOutput, SvdJob, SvdKernel, Workspace};
use crate::scalar::{resolve_rcond, SvdScalar};
use log::{debug, info, trace};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, Axis, ShapeBuilder};
use num_traits::{Float, ToPrimitive, Zero};
use std::sync::Arc;

/// Singular values of the captured matrix and the rank they reveal.
#[derive(Debug, Clone)]
pub struct Spectrum<R> {
    /// Descending, `min(rows, cols)` entries.
    pub singular_values: Array1<R>,
    pub rank: usize,
}

/// Singular values together with the full orthogonal factors.
#[derive(Debug, Clone)]
pub struct SingularTriplets<T: SvdScalar> {
    pub values: Array1<T::Real>,
    /// `U`, shape `(rows, rows)`.
    pub left_vectors: Array2<T>,
    /// `V*`, shape `(cols, cols)`.
    pub right_vectors: Array2<T>,
}

/// Factored state for one matrix of element type `T`.
///
/// Capture is eager: the matrix is copied into `coefficients` on
/// construction. Decomposition is lazy: singular values are computed by the
/// first query that needs them and kept in the `spectrum` slot. The
/// coefficients are never handed to the kernel; every kernel call gets a
/// fresh [`Workspace`] copy, because the kernel overwrites its input.
///
/// Queries that fill the cache take `&mut self`, so sharing one
/// factorization across threads needs external locking.
#[derive(Debug, Clone)]
pub struct FactorSvdRep<T: SvdScalar> {
    nrows: usize,
    ncols: usize,
    min_dim: usize,
    max_dim: usize,
    coefficients: Array2<T>,
    rcond: T::Real,
    spectrum: Option<Spectrum<T::Real>>,
    structure: MatrixStructure,
    kernel: Arc<dyn SvdKernel<T>>,
}

impl<T: SvdScalar> FactorSvdRep<T> {
    /// Captures `matrix`. No decomposition happens here.
    pub fn new<M>(matrix: &M, rcond: Option<f64>, kernel: Arc<dyn SvdKernel<T>>) -> Result<Self>
    where
        M: MatrixSource<T> + ?Sized,
    {
        let coefficients = matrix.to_backend_layout()?;
        let (nrows, ncols) = coefficients.dim();
        let min_dim = nrows.min(ncols);
        let max_dim = nrows.max(ncols);
        let rcond: T::Real = resolve_rcond(rcond, max_dim);

        info!(
            "Captured {}x{} {:?} matrix for SVD factorization (rcond = {:?}).",
            nrows,
            ncols,
            T::KIND,
            rcond
        );

        Ok(Self {
            nrows,
            ncols,
            min_dim,
            max_dim,
            coefficients,
            rcond,
            spectrum: None,
            structure: matrix.structure(),
            kernel,
        })
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn rcond(&self) -> T::Real {
        self.rcond
    }

    pub fn structure(&self) -> MatrixStructure {
        self.structure
    }

    /// Cached spectrum, if a query has computed it.
    pub fn spectrum(&self) -> Option<&Spectrum<T::Real>> {
        self.spectrum.as_ref()
    }

    /// Read-only view of the captured column-major coefficients.
    pub fn coefficients(&self) -> ArrayView2<'_, T> {
        self.coefficients.view()
    }

    /// Number of singular values above `rcond * sigma_max`.
    pub fn rank(&mut self) -> Result<usize> {
        if let Some(spectrum) = &self.spectrum {
            return Ok(spectrum.rank);
        }
        debug!("Rank not cached yet; computing singular values.");
        self.compute_svd(false)?;
        Ok(self.spectrum.as_ref().map_or(0, |spectrum| spectrum.rank))
    }

    /// Minimum-norm least-squares solution of `A x = b`.
    ///
    /// # Errors
    /// `DimensionMismatch` if `b.len() != rows` (checked before any kernel
    /// call), `ConvergenceFailure` or `InvalidArgument` from the kernel.
    pub fn solve(&mut self, b: ArrayView1<'_, T>) -> Result<Array1<T>> {
        let x = self.solve_matrix(b.insert_axis(Axis(1)))?;
        Ok(x.index_axis_move(Axis(1), 0))
    }

    /// Column-by-column minimum-norm least-squares solution of `A X = B`.
    /// The result has shape `(cols, b.ncols())`.
    pub fn solve_matrix(&mut self, b: ArrayView2<'_, T>) -> Result<Array2<T>> {
        if b.nrows() != self.nrows {
            return Err(FactorSvdError::DimensionMismatch {
                rhs_rows: b.nrows(),
                matrix_rows: self.nrows,
            });
        }
        let nrhs = b.ncols();

        if self.min_dim == 0 {
            self.store_spectrum(Array1::zeros(0));
            return Ok(Array2::zeros((self.ncols, nrhs)));
        }

        // Underdetermined systems return more rows than they take, so the
        // right hand side buffer holds max(rows, cols) rows.
        let mut rhs = Array2::<T>::zeros((self.max_dim, nrhs).f());
        rhs.slice_mut(s![..self.nrows, ..]).assign(&b);

        let workspace = Workspace::copy_of(self.coefficients.view());
        trace!(
            "Least-squares solve with {} right hand side(s) on {}x{} workspace.",
            nrhs,
            self.nrows,
            self.ncols
        );
        let outcome = self
            .kernel
            .least_squares_solve(workspace, &mut rhs, self.rcond)
            .map_err(|failure| FactorSvdError::from_kernel("FactorSvd::solve", failure))?;
        self.check_spectrum_len("FactorSvd::solve", outcome.singular_values.len())?;

        let rank = self.store_spectrum(outcome.singular_values);
        if rank != outcome.rank {
            debug!(
                "Kernel reported rank {} during solve; keeping thresholded rank {}.",
                outcome.rank, rank
            );
        }

        Ok(rhs.slice(s![..self.ncols, ..]).to_owned())
    }

    /// Inverse (or pseudoinverse) by solving against an identity right hand side.
    pub fn inverse(&mut self, policy: InversePolicy) -> Result<Array2<T>> {
        match policy {
            InversePolicy::SquareFullRank => {
                if self.nrows != self.ncols {
                    return Err(FactorSvdError::NotSquare {
                        nrows: self.nrows,
                        ncols: self.ncols,
                    });
                }
                let rank = self.rank()?;
                if rank < self.min_dim {
                    return Err(FactorSvdError::RankDeficient {
                        rank,
                        dim: self.min_dim,
                    });
                }
                let identity = Array2::<T>::eye(self.min_dim);
                self.solve_matrix(identity.view())
            }
            InversePolicy::Pseudoinverse => {
                let identity = Array2::<T>::eye(self.nrows);
                self.solve_matrix(identity.view())
            }
        }
    }

    /// Singular values in descending order. Served from the cache when a
    /// previous query already computed them.
    pub fn singular_values(&mut self) -> Result<Array1<T::Real>> {
        if let Some(spectrum) = &self.spectrum {
            return Ok(spectrum.singular_values.clone());
        }
        Ok(self.compute_svd(false)?.s)
    }

    /// Singular values with the full `U` and `V*` factors.
    pub fn singular_values_and_vectors(&mut self) -> Result<SingularTriplets<T>> {
        let SVDOutput { u, s: values, vt } = self.compute_svd(true)?;
        match (u, vt) {
            (Some(left_vectors), Some(right_vectors)) => Ok(SingularTriplets {
                values,
                left_vectors,
                right_vectors,
            }),
            _ => Err(FactorSvdError::InvalidArgument {
                routine: "FactorSvd::singular_values_and_vectors",
                status: -1,
            }),
        }
    }

    /// `sigma_max / sigma_min`. Infinite for a singular matrix, `None` when the
    /// matrix has no rows or no columns.
    pub fn condition_number(&mut self) -> Result<Option<T::Real>> {
        let values = self.singular_values()?;
        let len = values.len();
        if len == 0 {
            return Ok(None);
        }
        let (largest, smallest) = (values[0], values[len - 1]);
        if smallest > <T::Real as Zero>::zero() {
            Ok(Some(largest / smallest))
        } else {
            Ok(Some(<T::Real as Float>::infinity()))
        }
    }

    pub fn diagnostics(&mut self) -> Result<FactorizationDiagnostics> {
        let rank = self.rank()?;
        let values: Vec<f64> = self
            .singular_values()?
            .iter()
            .map(|value| value.to_f64().unwrap_or(f64::NAN))
            .collect();
        Ok(FactorizationDiagnostics::summarize(
            T::KIND,
            (self.nrows, self.ncols),
            self.structure,
            self.rcond.to_f64().unwrap_or(f64::NAN),
            &values,
            rank,
        ))
    }

    /// Runs the SVD kernel on a fresh workspace and refreshes the cached
    /// spectrum. With `want_vectors` the full `U` and `V*` are returned too.
    pub fn compute_svd(&mut self, want_vectors: bool) -> Result<SVDOutput<T>> {
        let job = if want_vectors {
            SvdJob::AllVectors
        } else {
            SvdJob::ValuesOnly
        };

        let output = if self.min_dim == 0 {
            self.empty_decomposition(want_vectors)
        } else {
            let workspace = Workspace::copy_of(self.coefficients.view());
            let raw = self
                .kernel
                .svd(job, workspace)
                .map_err(|failure| FactorSvdError::from_kernel("FactorSvd::compute_svd", failure))?;
            sort_descending(raw)
        };
        self.check_spectrum_len("FactorSvd::compute_svd", output.s.len())?;

        let rank = self.store_spectrum(output.s.clone());
        debug!(
            "SVD of {}x{} matrix reveals rank {} of {} (rcond = {:?}).",
            self.nrows, self.ncols, rank, self.min_dim, self.rcond
        );
        Ok(output)
    }

    fn empty_decomposition(&self, want_vectors: bool) -> SVDOutput<T> {
        SVDOutput {
            u: want_vectors.then(|| Array2::eye(self.nrows)),
            s: Array1::zeros(0),
            vt: want_vectors.then(|| Array2::eye(self.ncols)),
        }
    }

    fn check_spectrum_len(&self, routine: &'static str, len: usize) -> Result<()> {
        if len == self.min_dim {
            Ok(())
        } else {
            // Singular values are the sixth argument of xGESDD.
            Err(FactorSvdError::InvalidArgument { routine, status: -6 })
        }
    }

    fn store_spectrum(&mut self, singular_values: Array1<T::Real>) -> usize {
        let rank = numerical_rank(singular_values.view(), self.rcond);
        self.spectrum = Some(Spectrum {
            singular_values,
            rank,
        });
        rank
    }
}
