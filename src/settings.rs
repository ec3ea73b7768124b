//! Solver configuration (`UserSettings`) and the strategy enums it selects between.

use serde::{Deserialize, Serialize};

/// Which problem representation the solver should expect.
///
/// Only [`ProblemConfiguration::Dense`] is implemented; selecting
/// [`ProblemConfiguration::Sparse`] is a structural input error reported by
/// [`crate::prepare::check_problem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProblemConfiguration {
    Dense,
    Sparse,
}

/// Row-scaling strategy applied to the stacked constraint matrix before the
/// NNLS transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DbScalerStrategy {
    /// Multiply each constraint row by its inverse 2-norm.
    ScaleFactor,
    /// Equalize row and column infinity norms of `A` by alternating row/column
    /// scaling until a fixed-point tolerance is reached.
    Balance,
}

/// Pivoting policy used when factoring the Hessian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CholPivotingStrategy {
    NoPivoting,
    /// Diagonal-magnitude swap without the symmetric row swap.
    Partial,
    /// Full symmetric pivoting: swap both rows and columns.
    Full,
}

/// Relaxation (`gamma`) update strategy used by the primal NNLS loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GammaUpdateStrategyPrimal {
    NoUpdate,
    /// Subtract `‖Δy‖` scaled by a small factor.
    DecrementByDNorm,
}

/// Relaxation (`gamma`) update strategy used by the dual active-set loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GammaUpdateStrategyDual {
    NoUpdate,
    /// `gamma += s[i*]` for the newly added constraint `i*`.
    IncrementBySComponent,
}

/// Numerical tolerances and iteration policy for a solve.
///
/// Defaults match the documented values of the original specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    pub configuration: ProblemConfiguration,
    pub db_scaler_strategy: DbScalerStrategy,
    pub chol_pivoting_strategy: CholPivotingStrategy,
    pub gamma_update_primal: GammaUpdateStrategyPrimal,
    pub gamma_update_dual: GammaUpdateStrategyDual,

    pub n_dual_iterations: usize,
    pub n_primal_iterations: usize,

    pub log_level: u8,

    pub nnls_resid_norm_fsb: f64,
    pub orig_primal_fsb: f64,
    pub nnls_primal_zero: f64,
    pub min_nnls_dual_tol: f64,

    pub log_file: String,
    pub check_problem: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            configuration: ProblemConfiguration::Dense,
            db_scaler_strategy: DbScalerStrategy::ScaleFactor,
            chol_pivoting_strategy: CholPivotingStrategy::NoPivoting,
            gamma_update_primal: GammaUpdateStrategyPrimal::NoUpdate,
            gamma_update_dual: GammaUpdateStrategyDual::NoUpdate,

            n_dual_iterations: 100,
            n_primal_iterations: 100,

            log_level: 3,

            nnls_resid_norm_fsb: 1.0e-16,
            orig_primal_fsb: 1.0e-6,
            nnls_primal_zero: -1.0e-16,
            min_nnls_dual_tol: -1.0e-12,

            log_file: "logNNLS.txt".to_string(),
            check_problem: false,
        }
    }
}

impl UserSettings {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_match_documented_values() {
        let settings = UserSettings::default();
        assert_eq!(settings.n_dual_iterations, 100);
        assert_eq!(settings.n_primal_iterations, 100);
        assert_eq!(settings.nnls_resid_norm_fsb, 1.0e-16);
        assert_eq!(settings.orig_primal_fsb, 1.0e-6);
        assert_eq!(settings.nnls_primal_zero, -1.0e-16);
        assert_eq!(settings.min_nnls_dual_tol, -1.0e-12);
        assert_eq!(settings.log_file, "logNNLS.txt");
        assert!(!settings.check_problem);
    }

    #[test]
    fn settings_round_trip_through_json() {
        let settings = UserSettings {
            chol_pivoting_strategy: CholPivotingStrategy::Full,
            n_dual_iterations: 42,
            ..UserSettings::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        let back: UserSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }
}
