// src/scalar.rs

use crate::facade::Representation;
use crate::factorization::FactorSvdRep;
use crate::kernel::{KernelProvider, SvdKernel};
use ndarray_linalg::{c32, c64, Lapack, Scalar};
use num_traits::{Float, NumCast};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

mod seal {
    pub trait Sealed {}

    impl Sealed for f32 {}
    impl Sealed for f64 {}
    impl Sealed for super::c32 {}
    impl Sealed for super::c64 {}
}

/// Element type of a factored matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    Real32,
    Real64,
    Complex32,
    Complex64,
}

/// The closed set of element types the factorization supports:
/// `f32`, `f64`, `c32` and `c64`.
///
/// The trait is sealed. Besides the numeric capabilities inherited from
/// `ndarray-linalg` it carries the plumbing that lets the non-generic
/// [`FactorSvd`](crate::FactorSvd) handle route a typed call to the matching
/// variant of its [`Representation`].
pub trait SvdScalar: Scalar + Lapack + Send + Sync + 'static + seal::Sealed {
    const KIND: ScalarKind;

    /// Kernel used when the caller does not inject one.
    fn default_kernel() -> Arc<dyn SvdKernel<Self>>;

    #[doc(hidden)]
    fn into_representation(rep: FactorSvdRep<Self>) -> Representation;

    #[doc(hidden)]
    fn representation_ref(rep: &Representation) -> Option<&FactorSvdRep<Self>>;

    #[doc(hidden)]
    fn representation_mut(rep: &mut Representation) -> Option<&mut FactorSvdRep<Self>>;
}

impl SvdScalar for f32 {
    const KIND: ScalarKind = ScalarKind::Real32;

    fn default_kernel() -> Arc<dyn SvdKernel<Self>> {
        Arc::new(KernelProvider)
    }

    fn into_representation(rep: FactorSvdRep<Self>) -> Representation {
        Representation::Real32(rep)
    }

    fn representation_ref(rep: &Representation) -> Option<&FactorSvdRep<Self>> {
        match rep {
            Representation::Real32(inner) => Some(inner),
            _ => None,
        }
    }

    fn representation_mut(rep: &mut Representation) -> Option<&mut FactorSvdRep<Self>> {
        match rep {
            Representation::Real32(inner) => Some(inner),
            _ => None,
        }
    }
}

impl SvdScalar for f64 {
    const KIND: ScalarKind = ScalarKind::Real64;

    fn default_kernel() -> Arc<dyn SvdKernel<Self>> {
        Arc::new(KernelProvider)
    }

    fn into_representation(rep: FactorSvdRep<Self>) -> Representation {
        Representation::Real64(rep)
    }

    fn representation_ref(rep: &Representation) -> Option<&FactorSvdRep<Self>> {
        match rep {
            Representation::Real64(inner) => Some(inner),
            _ => None,
        }
    }

    fn representation_mut(rep: &mut Representation) -> Option<&mut FactorSvdRep<Self>> {
        match rep {
            Representation::Real64(inner) => Some(inner),
            _ => None,
        }
    }
}

impl SvdScalar for c32 {
    const KIND: ScalarKind = ScalarKind::Complex32;

    fn default_kernel() -> Arc<dyn SvdKernel<Self>> {
        Arc::new(KernelProvider)
    }

    fn into_representation(rep: FactorSvdRep<Self>) -> Representation {
        Representation::Complex32(rep)
    }

    fn representation_ref(rep: &Representation) -> Option<&FactorSvdRep<Self>> {
        match rep {
            Representation::Complex32(inner) => Some(inner),
            _ => None,
        }
    }

    fn representation_mut(rep: &mut Representation) -> Option<&mut FactorSvdRep<Self>> {
        match rep {
            Representation::Complex32(inner) => Some(inner),
            _ => None,
        }
    }
}

impl SvdScalar for c64 {
    const KIND: ScalarKind = ScalarKind::Complex64;

    fn default_kernel() -> Arc<dyn SvdKernel<Self>> {
        Arc::new(KernelProvider)
    }

    fn into_representation(rep: FactorSvdRep<Self>) -> Representation {
        Representation::Complex64(rep)
    }

    fn representation_ref(rep: &Representation) -> Option<&FactorSvdRep<Self>> {
        match rep {
            Representation::Complex64(inner) => Some(inner),
            _ => None,
        }
    }

    fn representation_mut(rep: &mut Representation) -> Option<&mut FactorSvdRep<Self>> {
        match rep {
            Representation::Complex64(inner) => Some(inner),
            _ => None,
        }
    }
}

/// Default reciprocal condition threshold: the larger dimension times the
/// unit roundoff of the real type.
pub fn default_rcond<R: Float>(max_dim: usize) -> R {
    let dim: R = NumCast::from(max_dim.max(1)).unwrap_or_else(R::one);
    dim * R::epsilon()
}

/// Picks the threshold actually used for a factorization.
///
/// A missing, negative or non-finite request falls back to
/// [`default_rcond`], the same convention LAPACK's least-squares drivers use
/// for a negative `rcond`.
pub(crate) fn resolve_rcond<R: Float>(requested: Option<f64>, max_dim: usize) -> R {
    requested
        .filter(|value| value.is_finite() && *value >= 0.0)
        .and_then(|value| <R as NumCast>::from(value))
        .unwrap_or_else(|| default_rcond(max_dim))
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn default_rcond_scales_with_the_larger_dimension() {
        assert_approx_eq!(f64, default_rcond::<f64>(7), 7.0 * f64::EPSILON, ulps = 2);
        assert_approx_eq!(f32, default_rcond::<f32>(3), 3.0 * f32::EPSILON, ulps = 2);
        assert_approx_eq!(f64, default_rcond::<f64>(0), f64::EPSILON, ulps = 2);
    }

    #[test]
    fn invalid_requests_fall_back_to_default() {
        let fallback = default_rcond::<f64>(4);
        assert_approx_eq!(f64, resolve_rcond::<f64>(None, 4), fallback, ulps = 2);
        assert_approx_eq!(f64, resolve_rcond::<f64>(Some(-1.0), 4), fallback, ulps = 2);
        assert_approx_eq!(f64, resolve_rcond::<f64>(Some(f64::NAN), 4), fallback, ulps = 2);
        assert_approx_eq!(f64, resolve_rcond::<f64>(Some(1e-3), 4), 1e-3, ulps = 2);
        assert_approx_eq!(f64, resolve_rcond::<f64>(Some(0.0), 4), 0.0, epsilon = 0.0);
    }
}
