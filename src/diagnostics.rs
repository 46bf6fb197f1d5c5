// src/diagnostics.rs

use crate::adapter::MatrixStructure;
use crate::scalar::ScalarKind;
use serde::{Deserialize, Serialize};

/// How many leading singular values a summary keeps.
const SINGULAR_VALUES_SAMPLE_LEN: usize = 8;

/// Snapshot of a factorization's spectrum, meant for logs and reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorizationDiagnostics {
    pub scalar_kind: ScalarKind,
    pub matrix_dims: (usize, usize),
    pub structure: MatrixStructure,
    pub rcond: f64,
    pub rank: usize,
    pub largest_singular_value: Option<f64>,
    pub smallest_singular_value: Option<f64>,
    /// sigma_max / sigma_min over all singular values; infinite when singular.
    pub condition_number: Option<f64>,
    pub singular_values_sample: Vec<f64>,
    pub notes: String,
}

impl FactorizationDiagnostics {
    pub(crate) fn summarize(
        scalar_kind: ScalarKind,
        matrix_dims: (usize, usize),
        structure: MatrixStructure,
        rcond: f64,
        singular_values: &[f64],
        rank: usize,
    ) -> Self {
        let largest = singular_values.first().copied();
        let smallest = singular_values.last().copied();
        let condition_number = match (largest, smallest) {
            (Some(hi), Some(lo)) if lo > 0.0 => Some(hi / lo),
            (Some(_), Some(_)) => Some(f64::INFINITY),
            _ => None,
        };

        let min_dim = singular_values.len();
        let notes = if min_dim == 0 {
            "empty matrix".to_string()
        } else if rank < min_dim {
            format!(
                "rank deficient: {} of {} singular values at or below {:e} * sigma_max",
                min_dim - rank,
                min_dim,
                rcond
            )
        } else {
            String::new()
        };

        Self {
            scalar_kind,
            matrix_dims,
            structure,
            rcond,
            rank,
            largest_singular_value: largest,
            smallest_singular_value: smallest,
            condition_number,
            singular_values_sample: singular_values
                .iter()
                .take(SINGULAR_VALUES_SAMPLE_LEN)
                .copied()
                .collect(),
            notes,
        }
    }

    pub fn is_full_rank(&self) -> bool {
        self.rank == self.matrix_dims.0.min(self.matrix_dims.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_flags_rank_deficiency() {
        let diag = FactorizationDiagnostics::summarize(
            ScalarKind::Real64,
            (3, 3),
            MatrixStructure::General,
            1e-12,
            &[4.0, 2.0, 0.0],
            2,
        );
        assert!(!diag.is_full_rank());
        assert_eq!(diag.condition_number, Some(f64::INFINITY));
        assert!(diag.notes.starts_with("rank deficient: 1 of 3"));
        assert_eq!(diag.singular_values_sample, vec![4.0, 2.0, 0.0]);
    }

    #[test]
    fn summary_of_well_conditioned_matrix() {
        let values: Vec<f64> = (1..=12).rev().map(f64::from).collect();
        let diag = FactorizationDiagnostics::summarize(
            ScalarKind::Real32,
            (12, 20),
            MatrixStructure::General,
            1e-6,
            &values,
            12,
        );
        assert!(diag.is_full_rank());
        assert_eq!(diag.condition_number, Some(12.0));
        assert_eq!(diag.singular_values_sample.len(), SINGULAR_VALUES_SAMPLE_LEN);
        assert!(diag.notes.is_empty());
    }
}
