// src/config.rs

use serde::{Deserialize, Serialize};

/// What [`FactorSvd::inverse`](crate::FactorSvd::inverse) computes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InversePolicy {
    /// Only square, numerically full rank matrices are inverted. Anything else
    /// is rejected with `NotSquare` or `RankDeficient`.
    #[default]
    SquareFullRank,
    /// Solve against the `rows x rows` identity, giving the `cols x rows`
    /// Moore-Penrose pseudoinverse under the rcond threshold for any shape.
    Pseudoinverse,
}

/// Configuration for a [`FactorSvd`](crate::FactorSvd) handle.
///
/// The configuration survives re-factoring; it only supplies defaults for
/// calls that do not pass their own values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorSvdConfig {
    /// Relative singular value cutoff used for rank decisions and solves.
    /// `None` selects `max(rows, cols) * epsilon` of the factored scalar type.
    pub reciprocal_condition: Option<f64>,
    pub inverse_policy: InversePolicy,
}

impl FactorSvdConfig {
    pub fn with_reciprocal_condition(mut self, rcond: f64) -> Self {
        self.reciprocal_condition = Some(rcond);
        self
    }

    pub fn with_inverse_policy(mut self, policy: InversePolicy) -> Self {
        self.inverse_policy = policy;
        self
    }
}
