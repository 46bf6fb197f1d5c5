// src/adapter.rs

use crate::error::{FactorSvdError, Result};
use crate::scalar::SvdScalar;
use ndarray::{Array2, ArrayBase, ArrayView2, Data, Ix2, ShapeBuilder};
use serde::{Deserialize, Serialize};

/// Which triangle of a stored matrix is authoritative.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Triangle {
    Upper,
    Lower,
}

impl Triangle {
    pub fn flipped(self) -> Self {
        match self {
            Triangle::Upper => Triangle::Lower,
            Triangle::Lower => Triangle::Upper,
        }
    }
}

/// Structure tag of a matrix view. The adapter uses it to materialize the
/// effective elements; the factorization only carries it along.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatrixStructure {
    #[default]
    General,
    /// Only the given triangle is read; the other is its mirror image.
    Symmetric(Triangle),
    /// Only the given triangle is read; the other is its conjugate mirror and
    /// the diagonal is taken as real.
    Hermitian(Triangle),
    /// Elements outside the given triangle are zero.
    Triangular(Triangle),
    /// Elements more than `lower` below or `upper` above the diagonal are zero.
    Banded { lower: usize, upper: usize },
}

/// Memory order of a flat element slice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageOrder {
    RowMajor,
    ColumnMajor,
}

/// Element transformation applied on top of the stored values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ElementView {
    #[default]
    Plain,
    Negated,
    Conjugated,
    NegatedConjugated,
}

impl ElementView {
    pub fn negate(self) -> Self {
        match self {
            ElementView::Plain => ElementView::Negated,
            ElementView::Negated => ElementView::Plain,
            ElementView::Conjugated => ElementView::NegatedConjugated,
            ElementView::NegatedConjugated => ElementView::Conjugated,
        }
    }

    pub fn conjugate(self) -> Self {
        match self {
            ElementView::Plain => ElementView::Conjugated,
            ElementView::Conjugated => ElementView::Plain,
            ElementView::Negated => ElementView::NegatedConjugated,
            ElementView::NegatedConjugated => ElementView::Negated,
        }
    }

    pub fn apply<T: SvdScalar>(self, value: T) -> T {
        match self {
            ElementView::Plain => value,
            ElementView::Negated => -value,
            ElementView::Conjugated => value.conj(),
            ElementView::NegatedConjugated => -value.conj(),
        }
    }
}

/// Anything that can be captured by a factorization.
pub trait MatrixSource<T: SvdScalar> {
    /// `(rows, cols)` of the effective matrix.
    fn dim(&self) -> (usize, usize);

    fn structure(&self) -> MatrixStructure {
        MatrixStructure::General
    }

    /// Materializes the effective elements into a contiguous column-major
    /// buffer owned by the caller.
    fn to_backend_layout(&self) -> Result<Array2<T>>;
}

impl<T, S> MatrixSource<T> for ArrayBase<S, Ix2>
where
    T: SvdScalar,
    S: Data<Elem = T>,
{
    fn dim(&self) -> (usize, usize) {
        ArrayBase::dim(self)
    }

    fn to_backend_layout(&self) -> Result<Array2<T>> {
        Ok(Array2::from_shape_fn(self.raw_dim().f(), |(i, j)| self[[i, j]]))
    }
}

/// A matrix view carrying a structure tag and an element transformation.
///
/// ```
/// use ndarray::arr2;
/// use svd_factor::{MatrixSource, MatrixStructure, StructuredMatrix, Triangle};
///
/// let upper = arr2(&[[2.0, 1.0], [0.0, 3.0]]);
/// let view = StructuredMatrix::new(upper.view())
///     .with_structure(MatrixStructure::Symmetric(Triangle::Upper))
///     .negated();
/// let buffer = view.to_backend_layout().unwrap();
/// assert_eq!(buffer, arr2(&[[-2.0, -1.0], [-1.0, -3.0]]));
/// ```
#[derive(Clone, Debug)]
pub struct StructuredMatrix<'a, T> {
    elements: ArrayView2<'a, T>,
    structure: MatrixStructure,
    view: ElementView,
}

impl<'a, T: SvdScalar> StructuredMatrix<'a, T> {
    pub fn new(elements: ArrayView2<'a, T>) -> Self {
        Self {
            elements,
            structure: MatrixStructure::General,
            view: ElementView::Plain,
        }
    }

    /// Wraps a flat slice stored in `order`.
    ///
    /// # Errors
    /// Returns [`FactorSvdError::Layout`] if `data` does not hold exactly
    /// `nrows * ncols` elements.
    pub fn from_slice(data: &'a [T], nrows: usize, ncols: usize, order: StorageOrder) -> Result<Self> {
        let elements = match order {
            StorageOrder::RowMajor => ArrayView2::from_shape((nrows, ncols), data)?,
            StorageOrder::ColumnMajor => ArrayView2::from_shape((nrows, ncols).f(), data)?,
        };
        Ok(Self::new(elements))
    }

    pub fn with_structure(mut self, structure: MatrixStructure) -> Self {
        self.structure = structure;
        self
    }

    pub fn negated(mut self) -> Self {
        self.view = self.view.negate();
        self
    }

    pub fn conjugated(mut self) -> Self {
        self.view = self.view.conjugate();
        self
    }

    /// Swaps rows and columns. The structure tag is mirrored to match.
    pub fn transposed(self) -> Self {
        let structure = match self.structure {
            MatrixStructure::General => MatrixStructure::General,
            MatrixStructure::Symmetric(triangle) => MatrixStructure::Symmetric(triangle.flipped()),
            MatrixStructure::Hermitian(triangle) => MatrixStructure::Hermitian(triangle.flipped()),
            MatrixStructure::Triangular(triangle) => MatrixStructure::Triangular(triangle.flipped()),
            MatrixStructure::Banded { lower, upper } => MatrixStructure::Banded {
                lower: upper,
                upper: lower,
            },
        };
        Self {
            elements: self.elements.reversed_axes(),
            structure,
            view: self.view,
        }
    }

    pub fn view(&self) -> ElementView {
        self.view
    }

    fn stored(&self, i: usize, j: usize) -> T {
        self.elements[[i, j]]
    }

    fn effective(&self, i: usize, j: usize) -> T {
        let value = match self.structure {
            MatrixStructure::General => self.stored(i, j),
            MatrixStructure::Symmetric(triangle) => {
                if reads_directly(triangle, i, j) {
                    self.stored(i, j)
                } else {
                    self.stored(j, i)
                }
            }
            MatrixStructure::Hermitian(triangle) => {
                if i == j {
                    T::from_real(self.stored(i, i).re())
                } else if reads_directly(triangle, i, j) {
                    self.stored(i, j)
                } else {
                    self.stored(j, i).conj()
                }
            }
            MatrixStructure::Triangular(triangle) => {
                if reads_directly(triangle, i, j) {
                    self.stored(i, j)
                } else {
                    T::zero()
                }
            }
            MatrixStructure::Banded { lower, upper } => {
                if i.saturating_sub(j) > lower || j.saturating_sub(i) > upper {
                    T::zero()
                } else {
                    self.stored(i, j)
                }
            }
        };
        self.view.apply(value)
    }
}

fn reads_directly(triangle: Triangle, i: usize, j: usize) -> bool {
    match triangle {
        Triangle::Upper => i <= j,
        Triangle::Lower => i >= j,
    }
}

impl<T: SvdScalar> MatrixSource<T> for StructuredMatrix<'_, T> {
    fn dim(&self) -> (usize, usize) {
        self.elements.dim()
    }

    fn structure(&self) -> MatrixStructure {
        self.structure
    }

    fn to_backend_layout(&self) -> Result<Array2<T>> {
        let (nrows, ncols) = self.elements.dim();
        if matches!(
            self.structure,
            MatrixStructure::Symmetric(_) | MatrixStructure::Hermitian(_)
        ) && nrows != ncols
        {
            return Err(FactorSvdError::NonSquareStructure {
                structure: self.structure,
                nrows,
                ncols,
            });
        }
        Ok(Array2::from_shape_fn((nrows, ncols).f(), |(i, j)| self.effective(i, j)))
    }
}
