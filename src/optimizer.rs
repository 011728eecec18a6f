//! Constrained solve: augmented Lagrangian outer loop around argmin's
//! L-BFGS.
//!
//! Box bounds are removed by the substitution
//!
//!   x = lb + (ub − lb) · (1 + sin s) / 2
//!
//! so every iterate the inner solver proposes maps into [lb, ub] and the
//! model is never evaluated outside its declared domain.  Equality and
//! inequality constraints are handled by the outer loop.
//!
//! Failure handling: anything that goes wrong inside an inner solve ends
//! the outer loop and the last good iterate is returned as
//! [`SolveOutcome::Diagnostic`].  So does an inner solve that repeatedly
//! leaves the iterate where it was while constraints are still violated.
//! Only construction errors propagate.

use crate::objectives::{merit, multiplier_estimates};
use crate::problem::{Evaluation, Program};
use crate::types::{ALSettings, ALState, IcarusError, SolveOutcome, Solution, SolverOptions};
use argmin::core::{CostFunction, Executor, Gradient, State, TerminationReason};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use std::cell::RefCell;
use tracing::{debug, info, warn};

/// Consecutive inner solves that may end without moving before the outer
/// loop gives up.
const STALL_LIMIT: usize = 2;

// ─────────────────────────────────────────────────────────────
//  Bound transform
// ─────────────────────────────────────────────────────────────

/// Maps unbounded solver coordinates `s` onto the variable box.
#[derive(Debug, Clone)]
pub struct BoxTransform {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl BoxTransform {
    pub fn new(program: &Program) -> Self {
        Self {
            lower: program.variables().iter().map(|v| v.lower).collect(),
            upper: program.variables().iter().map(|v| v.upper).collect(),
        }
    }

    pub fn to_bounded(&self, s: &[f64]) -> Vec<f64> {
        s.iter()
            .zip(self.lower.iter().zip(&self.upper))
            .map(|(&si, (&lb, &ub))| (lb + (ub - lb) * 0.5 * (1.0 + si.sin())).clamp(lb, ub))
            .collect()
    }

    /// Inverse map; points on a bound are nudged inside so the chain-rule
    /// factor is not exactly zero.
    pub fn to_unbounded(&self, x: &[f64]) -> Vec<f64> {
        const EDGE: f64 = 1e-9;
        x.iter()
            .zip(self.lower.iter().zip(&self.upper))
            .map(|(&xi, (&lb, &ub))| {
                let u = 2.0 * (xi - lb) / (ub - lb) - 1.0;
                u.clamp(-1.0 + EDGE, 1.0 - EDGE).asin()
            })
            .collect()
    }

    /// dx/ds for each coordinate.
    pub fn jacobian_diagonal(&self, s: &[f64]) -> Vec<f64> {
        s.iter()
            .zip(self.lower.iter().zip(&self.upper))
            .map(|(&si, (&lb, &ub))| 0.5 * (ub - lb) * si.cos())
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────
//  argmin problem wrapper
// ─────────────────────────────────────────────────────────────

/// Augmented Lagrangian merit over the transformed coordinates.
///
/// argmin calls `cost` and `gradient` separately at the same point; the
/// last `(s, merit, gradient)` is cached so the tape sweep runs once.
struct MeritProblem<'a> {
    program: &'a Program,
    transform: &'a BoxTransform,
    al: &'a ALState,
    equality: &'a [bool],
    objective_scale: f64,
    last_eval: RefCell<Option<(Vec<f64>, f64, Vec<f64>)>>,
}

impl<'a> MeritProblem<'a> {
    fn ensure_evaluated(&self, s: &[f64]) -> Result<(f64, Vec<f64>), argmin::core::Error> {
        if let Some((ref t, f, ref g)) = *self.last_eval.borrow() {
            if t == s {
                return Ok((f, g.clone()));
            }
        }

        let x = self.transform.to_bounded(s);
        let lin = self
            .program
            .linearize(&x)
            .map_err(|e| argmin::core::Error::msg(e.to_string()))?;
        let residuals = &lin.eval.residuals;
        let value = merit(lin.eval.objective / self.objective_scale, residuals, self.equality, self.al);

        let weights = multiplier_estimates(residuals, self.equality, self.al);
        let mut grad_x = lin.objective_grad.mapv(|g| g / self.objective_scale);
        for (k, &w) in weights.iter().enumerate() {
            if w != 0.0 {
                grad_x.scaled_add(w, &lin.residual_jacobian.row(k));
            }
        }
        let grad: Vec<f64> = grad_x
            .iter()
            .zip(self.transform.jacobian_diagonal(s))
            .map(|(g, d)| g * d)
            .collect();

        if !value.is_finite() || grad.iter().any(|g| !g.is_finite()) {
            return Err(argmin::core::Error::msg("merit or gradient is not finite"));
        }

        *self.last_eval.borrow_mut() = Some((s.to_vec(), value, grad.clone()));
        Ok((value, grad))
    }
}

impl<'a> CostFunction for MeritProblem<'a> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, s: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        Ok(self.ensure_evaluated(s)?.0)
    }
}

impl<'a> Gradient for MeritProblem<'a> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, s: &Self::Param) -> Result<Self::Gradient, argmin::core::Error> {
        Ok(self.ensure_evaluated(s)?.1)
    }
}

// ─────────────────────────────────────────────────────────────
//  Inner L-BFGS solve
// ─────────────────────────────────────────────────────────────

struct InnerResult {
    s: Vec<f64>,
    iterations: u64,
    reason: Option<TerminationReason>,
}

fn inner_lbfgs(
    program: &Program,
    transform: &BoxTransform,
    al: &ALState,
    equality: &[bool],
    objective_scale: f64,
    init: Vec<f64>,
    options: &SolverOptions,
) -> Result<InnerResult, IcarusError> {
    let problem = MeritProblem {
        program,
        transform,
        al,
        equality,
        objective_scale,
        last_eval: RefCell::new(None),
    };

    let linesearch = MoreThuenteLineSearch::new();
    let solver = LBFGS::new(linesearch, options.memory)
        .with_tolerance_grad(options.gradient_tolerance)?
        .with_tolerance_cost(options.cost_tolerance)?;

    let result = Executor::new(problem, solver)
        .configure(|config| {
            config
                .param(init)
                .max_iters(options.max_iterations)
                .target_cost(f64::NEG_INFINITY)
        })
        .run()?;

    let state = result.state();
    let s = state
        .get_best_param()
        .cloned()
        .ok_or_else(|| IcarusError::Solver("L-BFGS returned no best parameters".into()))?;
    Ok(InnerResult {
        s,
        iterations: state.get_iter(),
        reason: state.get_termination_reason().cloned(),
    })
}

// ─────────────────────────────────────────────────────────────
//  Augmented Lagrangian driver
// ─────────────────────────────────────────────────────────────

fn is_finite(eval: &Evaluation) -> bool {
    eval.objective.is_finite() && eval.residuals.iter().all(|r| r.is_finite())
}

/// Solve `program` from its declared initial guesses.
///
/// Returns `Err` only when the problem cannot be evaluated at all at the
/// initial guess; every solve-time failure becomes a diagnostic outcome.
pub fn solve(program: &Program, options: &SolverOptions, settings: &ALSettings) -> Result<SolveOutcome, IcarusError> {
    let transform = BoxTransform::new(program);
    let equality: Vec<bool> = program.constraints().iter().map(|c| c.is_equality()).collect();

    let mut s = transform.to_unbounded(&program.initial_point());
    let mut x = transform.to_bounded(&s);
    let mut eval = program.evaluate(&x)?;
    if !is_finite(&eval) {
        return Err(IcarusError::Solver("model is not finite at the initial guess".into()));
    }
    let objective_scale = if eval.objective.abs() > f64::EPSILON {
        eval.objective.abs()
    } else {
        1.0
    };

    let mut al = ALState::new(program.constraints().len(), settings);
    let mut viol = program.max_violation(&eval.residuals);
    let mut prev_viol = f64::INFINITY;
    let mut prev_objective: Option<f64> = None;
    let mut inner_total = 0u64;
    let mut outer_done = 0usize;
    let mut converged = false;
    let mut stalled = 0usize;

    for outer in 0..settings.max_outer_iters {
        let inner = match inner_lbfgs(program, &transform, &al, &equality, objective_scale, s.clone(), options) {
            Ok(inner) => inner,
            Err(e) => {
                warn!(outer = outer + 1, error = %e, "inner solve failed, keeping previous iterate");
                break;
            }
        };
        inner_total += inner.iterations;
        debug!(outer = outer + 1, iterations = inner.iterations, reason = ?inner.reason, "inner L-BFGS finished");
        if inner.s == s {
            stalled += 1;
            warn!(outer = outer + 1, reason = ?inner.reason, "inner L-BFGS ended without moving");
        } else {
            stalled = 0;
        }

        let x_new = transform.to_bounded(&inner.s);
        let eval_new = program.evaluate(&x_new)?;
        if !is_finite(&eval_new) {
            warn!(outer = outer + 1, "non-finite model values, keeping previous iterate");
            break;
        }
        s = inner.s;
        x = x_new;
        eval = eval_new;
        outer_done = outer + 1;
        viol = program.max_violation(&eval.residuals);

        info!(
            outer = outer_done,
            mu = al.mu,
            max_violation = viol,
            objective = eval.objective,
            "augmented Lagrangian iteration"
        );

        let stationary = prev_objective.is_some_and(|p| {
            (eval.objective - p).abs() <= options.objective_tolerance * eval.objective.abs().max(1.0)
        });
        if viol <= settings.constraint_tol && stationary {
            converged = true;
            break;
        }
        if stalled >= STALL_LIMIT {
            warn!(outer = outer_done, max_violation = viol, "no progress in {STALL_LIMIT} inner solves, stopping");
            break;
        }

        al.lambdas = multiplier_estimates(&eval.residuals, &equality, &al);
        if viol > settings.constraint_tol && viol > settings.progress_ratio * prev_viol {
            al.mu = (al.mu * settings.mu_factor).min(settings.mu_max);
        }
        prev_viol = viol;
        prev_objective = Some(eval.objective);
    }

    let solution = Solution {
        session: program.session(),
        variables: program
            .variables()
            .iter()
            .zip(&x)
            .map(|(v, &xi)| {
                let mut v = v.clone();
                v.value = Some(xi.clamp(v.lower, v.upper));
                v
            })
            .collect(),
        objective: eval.objective,
        max_violation: viol,
        outer_iterations: outer_done,
        inner_iterations: inner_total,
        penalty: al.mu,
    };

    if converged {
        info!(objective = solution.objective, outer = outer_done, "converged");
        Ok(SolveOutcome::Converged(solution))
    } else {
        warn!(
            max_violation = viol,
            outer = outer_done,
            "did not converge, returning last iterate as diagnostic"
        );
        Ok(SolveOutcome::Diagnostic(solution))
    }
}
