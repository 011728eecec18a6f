//! Core data types shared across the crate: the error enum, design
//! variables, solver settings and the two-variant solve outcome.

use crate::expr::SessionId;
use thiserror::Error;

// ─────────────────────────────────────────────────────────────
//  Error type
// ─────────────────────────────────────────────────────────────

/// Unified error type for all fallible operations in the crate.
///
/// Construction-time problems (bad bounds, duplicate names, expressions
/// from a different session) are fatal.  Non-convergence of the solver is
/// *not* an error: it is reported as [`SolveOutcome::Diagnostic`].
#[derive(Debug, Error)]
pub enum IcarusError {
    /// Declared bounds are empty or the initial guess lies outside them.
    #[error("invalid bounds for `{name}`: need lower < upper and lower <= initial <= upper (got lower={lower}, initial={initial}, upper={upper})")]
    InvalidBounds {
        name: String,
        lower: f64,
        initial: f64,
        upper: f64,
    },

    /// A second variable was declared under an existing name.
    #[error("duplicate design variable `{0}`")]
    DuplicateVariable(String),

    /// An expression refers to a variable owned by another session.
    #[error("expression references a variable from a different problem session")]
    ForeignExpression,

    /// Lookup of a variable that was never declared.
    #[error("unknown design variable `{0}`")]
    UnknownVariable(String),

    /// Fixed geometric input is degenerate.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// `freeze` was called before `minimize`.
    #[error("no objective registered")]
    MissingObjective,

    /// Configuration failed validation.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Argmin returned an error.
    #[error("solver error: {0}")]
    Solver(String),
}

impl From<argmin::core::Error> for IcarusError {
    fn from(e: argmin::core::Error) -> Self {
        Self::Solver(e.to_string())
    }
}

// ─────────────────────────────────────────────────────────────
//  Design variables
// ─────────────────────────────────────────────────────────────

/// A free parameter of the design problem.
///
/// `value` is `None` while the problem is symbolic and is filled in on the
/// copies carried by a [`Solution`].
#[derive(Debug, Clone, PartialEq)]
pub struct DesignVariable {
    pub name: String,
    pub index: usize,
    pub initial: f64,
    pub lower: f64,
    pub upper: f64,
    pub value: Option<f64>,
}

impl DesignVariable {
    /// Width of the feasible interval.
    pub fn range(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.lower && x <= self.upper
    }
}

// ─────────────────────────────────────────────────────────────
//  Solver settings
// ─────────────────────────────────────────────────────────────

/// Settings for each inner L-BFGS solve.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Maximum L-BFGS iterations per inner solve.
    pub max_iterations: u64,
    /// Number of stored correction pairs.
    pub memory: usize,
    /// Terminate the inner solve once the gradient norm drops below this.
    pub gradient_tolerance: f64,
    /// Terminate the inner solve once the merit change drops below this.
    pub cost_tolerance: f64,
    /// Relative objective change between outer iterations treated as stationary.
    pub objective_tolerance: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            memory: 10,
            gradient_tolerance: 1e-9,
            cost_tolerance: 1e-14,
            objective_tolerance: 1e-5,
        }
    }
}

/// Augmented Lagrangian outer-loop settings.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct ALSettings {
    /// Initial penalty parameter μ.
    pub mu_init: f64,
    /// Multiplicative growth factor for μ.
    pub mu_factor: f64,
    /// Ceiling on μ.
    pub mu_max: f64,
    pub max_outer_iters: usize,
    /// Max constraint violation accepted as feasible.
    pub constraint_tol: f64,
    /// μ grows unless the violation falls below this fraction of the previous one.
    pub progress_ratio: f64,
}

impl Default for ALSettings {
    fn default() -> Self {
        Self {
            mu_init: 10.0,
            mu_factor: 10.0,
            mu_max: 1e8,
            max_outer_iters: 30,
            constraint_tol: 1e-6,
            progress_ratio: 0.25,
        }
    }
}

/// Mutable AL state carried across outer iterations.
#[derive(Debug, Clone)]
pub struct ALState {
    /// One multiplier per constraint.
    pub lambdas: Vec<f64>,
    pub mu: f64,
}

impl ALState {
    pub fn new(num_constraints: usize, settings: &ALSettings) -> Self {
        Self {
            lambdas: vec![0.0; num_constraints],
            mu: settings.mu_init,
        }
    }
}

// ─────────────────────────────────────────────────────────────
//  Solve results
// ─────────────────────────────────────────────────────────────

/// Resolved variable assignment plus solver bookkeeping.
#[derive(Debug, Clone)]
pub struct Solution {
    pub(crate) session: SessionId,
    /// Every declared variable with `value` populated.
    pub variables: Vec<DesignVariable>,
    /// Unscaled objective at the returned point.
    pub objective: f64,
    /// Largest constraint violation at the returned point.
    pub max_violation: f64,
    pub outer_iterations: usize,
    pub inner_iterations: u64,
    /// Final penalty parameter.
    pub penalty: f64,
}

impl Solution {
    /// Resolved value of a variable by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.variables
            .iter()
            .find(|v| v.name == name)
            .and_then(|v| v.value)
    }

    /// Like [`Solution::get`], but a name that was never declared is an error.
    pub fn require(&self, name: &str) -> Result<f64, IcarusError> {
        self.get(name)
            .ok_or_else(|| IcarusError::UnknownVariable(name.to_string()))
    }

    /// Resolved values in declaration order.
    pub fn values(&self) -> Vec<f64> {
        self.variables.iter().map(|v| v.value.unwrap_or(v.initial)).collect()
    }

    pub fn session(&self) -> SessionId {
        self.session
    }
}

/// Outcome of a constrained solve.
///
/// Both variants carry a fully populated [`Solution`]; callers must match
/// on the variant before trusting constraint satisfaction.
#[derive(Debug, Clone)]
pub enum SolveOutcome {
    /// Constraints satisfied to tolerance and the objective is stationary.
    Converged(Solution),
    /// Last iterate of a solve that did not converge.
    Diagnostic(Solution),
}

impl SolveOutcome {
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged(_))
    }

    pub fn solution(&self) -> &Solution {
        match self {
            Self::Converged(s) | Self::Diagnostic(s) => s,
        }
    }

    pub fn into_solution(self) -> Solution {
        match self {
            Self::Converged(s) | Self::Diagnostic(s) => s,
        }
    }
}
