//! The problem builder: design-variable registry, constraint set and
//! objective for one optimisation session.
//!
//! A [`Problem`] is passed by `&mut` into every component that needs to
//! declare variables or register constraints.  [`Problem::freeze`]
//! consumes it and produces an immutable [`Program`] for the solver, so
//! nothing can be appended once solving starts.

use crate::expr::{Expr, SessionId};
use crate::gradients::Tape;
use crate::types::{DesignVariable, IcarusError};
use ndarray::{Array1, Array2};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

// ─────────────────────────────────────────────────────────────
//  Constraints
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    LessEq,
    GreaterEq,
    Equal,
}

/// `expr (<=|>=|==) bound`, normalised by `scale` inside the solver.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub name: String,
    pub expr: Expr,
    pub relation: Relation,
    pub bound: f64,
    pub scale: f64,
}

impl Constraint {
    fn new(name: &str, expr: Expr, relation: Relation, bound: f64) -> Self {
        Self {
            name: name.to_string(),
            expr,
            relation,
            bound,
            scale: 1.0,
        }
    }

    pub fn at_least(name: &str, expr: Expr, bound: f64) -> Self {
        Self::new(name, expr, Relation::GreaterEq, bound)
    }

    pub fn at_most(name: &str, expr: Expr, bound: f64) -> Self {
        Self::new(name, expr, Relation::LessEq, bound)
    }

    pub fn equal(name: &str, expr: Expr, bound: f64) -> Self {
        Self::new(name, expr, Relation::Equal, bound)
    }

    /// Divide the residual by `scale` (a typical magnitude of the bound).
    pub fn scaled(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn is_equality(&self) -> bool {
        self.relation == Relation::Equal
    }

    /// Residual in standard form: `<= 0` for inequalities, `== 0` for equalities.
    pub fn residual(&self, value: f64) -> f64 {
        match self.relation {
            Relation::LessEq | Relation::Equal => (value - self.bound) / self.scale,
            Relation::GreaterEq => (self.bound - value) / self.scale,
        }
    }

    /// d(residual)/d(value).
    pub fn residual_slope(&self) -> f64 {
        match self.relation {
            Relation::LessEq | Relation::Equal => 1.0 / self.scale,
            Relation::GreaterEq => -1.0 / self.scale,
        }
    }

    /// Amount by which a standard-form residual violates the constraint.
    pub fn violation(&self, residual: f64) -> f64 {
        if self.is_equality() {
            residual.abs()
        } else {
            residual.max(0.0)
        }
    }
}

// ─────────────────────────────────────────────────────────────
//  Builder
// ─────────────────────────────────────────────────────────────

/// Accumulates variables, constraints and the objective for one session.
#[derive(Debug)]
pub struct Problem {
    session: SessionId,
    variables: Vec<DesignVariable>,
    constraints: Vec<Constraint>,
    objective: Option<Expr>,
}

impl Default for Problem {
    fn default() -> Self {
        Self::new()
    }
}

impl Problem {
    /// Start a fresh session.  Expressions from other sessions are
    /// rejected when this problem is frozen.
    pub fn new() -> Self {
        Self {
            session: SessionId(NEXT_SESSION.fetch_add(1, Ordering::Relaxed)),
            variables: Vec::new(),
            constraints: Vec::new(),
            objective: None,
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Declare a free design variable and return its symbolic handle.
    pub fn variable(&mut self, name: &str, initial: f64, lower: f64, upper: f64) -> Result<Expr, IcarusError> {
        let ordered = lower < upper && lower <= initial && initial <= upper;
        if !ordered || !lower.is_finite() || !upper.is_finite() {
            return Err(IcarusError::InvalidBounds {
                name: name.to_string(),
                lower,
                initial,
                upper,
            });
        }
        if self.variables.iter().any(|v| v.name == name) {
            return Err(IcarusError::DuplicateVariable(name.to_string()));
        }
        let index = self.variables.len();
        self.variables.push(DesignVariable {
            name: name.to_string(),
            index,
            initial,
            lower,
            upper,
            value: None,
        });
        Ok(Expr::variable(self.session, index))
    }

    pub fn variables(&self) -> &[DesignVariable] {
        &self.variables
    }

    pub fn subject_to(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Set (or replace) the objective to minimise.
    pub fn minimize(&mut self, objective: Expr) {
        self.objective = Some(objective);
    }

    /// Freeze the session and compile objective and constraints.
    pub fn freeze(self) -> Result<Program, IcarusError> {
        let objective = self.objective.ok_or(IcarusError::MissingObjective)?;
        let mut roots: Vec<&Expr> = Vec::with_capacity(1 + self.constraints.len());
        roots.push(&objective);
        roots.extend(self.constraints.iter().map(|c| &c.expr));
        let tape = Tape::compile(self.session, self.variables.len(), &roots)?;
        Ok(Program {
            session: self.session,
            variables: self.variables,
            constraints: self.constraints,
            objective,
            tape,
        })
    }
}

// ─────────────────────────────────────────────────────────────
//  Frozen program
// ─────────────────────────────────────────────────────────────

/// Objective and standard-form constraint residuals at a point.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub objective: f64,
    pub residuals: Vec<f64>,
}

/// Evaluation plus first derivatives with respect to the variables.
#[derive(Debug, Clone)]
pub struct Linearization {
    pub eval: Evaluation,
    pub objective_grad: Array1<f64>,
    /// constraints × variables
    pub residual_jacobian: Array2<f64>,
}

/// An immutable, compiled optimisation problem.
#[derive(Debug, Clone)]
pub struct Program {
    session: SessionId,
    variables: Vec<DesignVariable>,
    constraints: Vec<Constraint>,
    objective: Expr,
    tape: Tape,
}

impl Program {
    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn variables(&self) -> &[DesignVariable] {
        &self.variables
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn objective(&self) -> &Expr {
        &self.objective
    }

    pub fn initial_point(&self) -> Vec<f64> {
        self.variables.iter().map(|v| v.initial).collect()
    }

    pub fn evaluate(&self, x: &[f64]) -> Result<Evaluation, IcarusError> {
        let values = self.tape.values(x)?;
        Ok(self.split(&values))
    }

    pub fn linearize(&self, x: &[f64]) -> Result<Linearization, IcarusError> {
        let (values, jac) = self.tape.jacobian(x)?;
        let eval = self.split(&values);
        let objective_grad = jac.row(0).to_owned();
        let mut residual_jacobian = jac.slice(ndarray::s![1.., ..]).to_owned();
        for (k, c) in self.constraints.iter().enumerate() {
            residual_jacobian.row_mut(k).mapv_inplace(|d| d * c.residual_slope());
        }
        Ok(Linearization {
            eval,
            objective_grad,
            residual_jacobian,
        })
    }

    /// Largest violation over all constraints.
    pub fn max_violation(&self, residuals: &[f64]) -> f64 {
        self.constraints
            .iter()
            .zip(residuals)
            .fold(0.0_f64, |m, (c, &r)| m.max(c.violation(r)))
    }

    fn split(&self, values: &[f64]) -> Evaluation {
        let residuals = self
            .constraints
            .iter()
            .zip(&values[1..])
            .map(|(c, &v)| c.residual(v))
            .collect();
        Evaluation {
            objective: values[0],
            residuals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_checked_at_declaration() {
        let mut p = Problem::new();
        assert!(matches!(
            p.variable("v", 5.0, 10.0, 1.0),
            Err(IcarusError::InvalidBounds { .. })
        ));
        assert!(matches!(
            p.variable("v", 0.0, 1.0, 2.0),
            Err(IcarusError::InvalidBounds { .. })
        ));
        assert!(matches!(
            p.variable("v", 1.0, 1.0, 1.0),
            Err(IcarusError::InvalidBounds { .. })
        ));
        assert!(p.variables().is_empty());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut p = Problem::new();
        p.variable("chord", 0.2, 0.1, 0.3).unwrap();
        assert!(matches!(
            p.variable("chord", 0.2, 0.1, 0.3),
            Err(IcarusError::DuplicateVariable(n)) if n == "chord"
        ));
    }

    #[test]
    fn sessions_do_not_mix() {
        let mut a = Problem::new();
        let mut b = Problem::new();
        let xa = a.variable("x", 1.0, 0.0, 2.0).unwrap();
        let _xb = b.variable("x", 1.0, 0.0, 2.0).unwrap();
        b.minimize(xa.square());
        assert!(matches!(b.freeze(), Err(IcarusError::ForeignExpression)));
    }

    #[test]
    fn residuals_follow_standard_form() {
        let mut p = Problem::new();
        let x = p.variable("x", 1.0, 0.0, 4.0).unwrap();
        p.subject_to(Constraint::at_least("floor", x.clone(), 2.0).scaled(2.0));
        p.subject_to(Constraint::at_most("ceiling", x.clone(), 3.0));
        p.subject_to(Constraint::equal("pin", x.clone(), 1.5));
        p.minimize(x);
        let prog = p.freeze().unwrap();
        let lin = prog.linearize(&[1.0]).unwrap();
        assert_eq!(lin.eval.residuals, vec![0.5, -2.0, -0.5]);
        assert_eq!(lin.residual_jacobian[[0, 0]], -0.5);
        assert_eq!(lin.residual_jacobian[[1, 0]], 1.0);
        assert_eq!(prog.max_violation(&lin.eval.residuals), 0.5);
    }

    #[test]
    fn freeze_requires_an_objective() {
        let p = Problem::new();
        assert!(matches!(p.freeze(), Err(IcarusError::MissingObjective)));
    }
}
