//! Compilation of expression graphs into a linear tape, with value and
//! forward-mode Jacobian evaluation.
//!
//! The tape is built once per frozen problem:
//!   1. Post-order walk of every root, memoised on node identity so shared
//!      subexpressions get one slot.
//!   2. Each slot stores an instruction referencing earlier slots only.
//!
//! Evaluation sweeps the tape forward.  The Jacobian sweep carries one
//! tangent row per slot (one column per design variable), which is cheap
//! for the handful of variables a design problem has.

use crate::expr::{BinaryOp, Expr, Node, SessionId, UnaryOp};
use crate::types::IcarusError;
use ndarray::Array2;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, Copy)]
enum Instr {
    Const(f64),
    Var(usize),
    Unary(UnaryOp, usize),
    Binary(BinaryOp, usize, usize),
    Powf(usize, f64),
}

/// A compiled, session-checked evaluation program for a list of roots.
#[derive(Debug, Clone)]
pub struct Tape {
    instrs: Vec<Instr>,
    outputs: Vec<usize>,
    num_vars: usize,
}

impl Tape {
    /// Compile `roots` against the variables of `session`.
    ///
    /// Fails with [`IcarusError::ForeignExpression`] if any variable node
    /// belongs to another session.
    pub fn compile(session: SessionId, num_vars: usize, roots: &[&Expr]) -> Result<Tape, IcarusError> {
        let mut instrs: Vec<Instr> = Vec::new();
        let mut memo: HashMap<*const Node, usize> = HashMap::new();
        let mut outputs = Vec::with_capacity(roots.len());

        for root in roots {
            let mut stack: Vec<(&Expr, bool)> = vec![(*root, false)];
            while let Some((e, expanded)) = stack.pop() {
                let key = Rc::as_ptr(&e.0);
                if memo.contains_key(&key) {
                    continue;
                }
                if !expanded {
                    stack.push((e, true));
                    match &*e.0 {
                        Node::Constant(_) | Node::Variable { .. } => {}
                        Node::Unary { arg, .. } => stack.push((arg, false)),
                        Node::Binary { lhs, rhs, .. } => {
                            stack.push((rhs, false));
                            stack.push((lhs, false));
                        }
                        Node::Powf { base, .. } => stack.push((base, false)),
                    }
                    continue;
                }
                let slot = |child: &Expr| memo[&Rc::as_ptr(&child.0)];
                let instr = match &*e.0 {
                    Node::Constant(v) => Instr::Const(*v),
                    Node::Variable { session: s, index } => {
                        if *s != session || *index >= num_vars {
                            return Err(IcarusError::ForeignExpression);
                        }
                        Instr::Var(*index)
                    }
                    Node::Unary { op, arg } => Instr::Unary(*op, slot(arg)),
                    Node::Binary { op, lhs, rhs } => Instr::Binary(*op, slot(lhs), slot(rhs)),
                    Node::Powf { base, exponent } => Instr::Powf(slot(base), *exponent),
                };
                memo.insert(key, instrs.len());
                instrs.push(instr);
            }
            outputs.push(memo[&Rc::as_ptr(&root.0)]);
        }

        Ok(Tape { instrs, outputs, num_vars })
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    pub fn num_vars(&self) -> usize {
        self.num_vars
    }

    /// Number of distinct nodes after sharing.
    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    fn check_arity(&self, x: &[f64]) -> Result<(), IcarusError> {
        if x.len() != self.num_vars {
            return Err(IcarusError::Solver(format!(
                "expected {} variable values, got {}",
                self.num_vars,
                x.len()
            )));
        }
        Ok(())
    }

    /// Values of every output at `x`.
    pub fn values(&self, x: &[f64]) -> Result<Vec<f64>, IcarusError> {
        self.check_arity(x)?;
        let mut v = vec![0.0; self.instrs.len()];
        for (i, instr) in self.instrs.iter().enumerate() {
            v[i] = match *instr {
                Instr::Const(c) => c,
                Instr::Var(k) => x[k],
                Instr::Unary(op, a) => op.apply(v[a]),
                Instr::Binary(op, a, b) => op.apply(v[a], v[b]),
                Instr::Powf(a, p) => v[a].powf(p),
            };
        }
        Ok(self.outputs.iter().map(|&o| v[o]).collect())
    }

    /// Values and the Jacobian (outputs × variables) at `x`.
    pub fn jacobian(&self, x: &[f64]) -> Result<(Vec<f64>, Array2<f64>), IcarusError> {
        self.check_arity(x)?;
        let n = self.num_vars;
        let mut v = vec![0.0; self.instrs.len()];
        let mut dot = Array2::<f64>::zeros((self.instrs.len(), n));

        for (i, instr) in self.instrs.iter().enumerate() {
            match *instr {
                Instr::Const(c) => v[i] = c,
                Instr::Var(k) => {
                    v[i] = x[k];
                    dot[[i, k]] = 1.0;
                }
                Instr::Unary(op, a) => {
                    v[i] = op.apply(v[a]);
                    let d = op.derivative(v[a], v[i]);
                    for j in 0..n {
                        dot[[i, j]] = scaled(dot[[a, j]], d);
                    }
                }
                Instr::Binary(op, a, b) => {
                    v[i] = op.apply(v[a], v[b]);
                    let (da, db) = op.partials(v[a], v[b]);
                    for j in 0..n {
                        dot[[i, j]] = scaled(dot[[a, j]], da) + scaled(dot[[b, j]], db);
                    }
                }
                Instr::Powf(a, p) => {
                    v[i] = v[a].powf(p);
                    let d = if p == 0.0 { 0.0 } else { p * v[a].powf(p - 1.0) };
                    for j in 0..n {
                        dot[[i, j]] = scaled(dot[[a, j]], d);
                    }
                }
            }
        }

        let values = self.outputs.iter().map(|&o| v[o]).collect();
        let mut jac = Array2::<f64>::zeros((self.outputs.len(), n));
        for (r, &o) in self.outputs.iter().enumerate() {
            jac.row_mut(r).assign(&dot.row(o));
        }
        Ok((values, jac))
    }
}

/// Tangent times local partial, treating a zero tangent as exact so an
/// infinite partial on a variable-independent branch does not produce NaN.
#[inline]
fn scaled(tangent: f64, partial: f64) -> f64 {
    if tangent == 0.0 {
        0.0
    } else {
        tangent * partial
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn var(i: usize) -> Expr {
        Expr::variable(SessionId(7), i)
    }

    #[test]
    fn shared_nodes_compile_once() {
        let x = var(0);
        let s = x.sin();
        let e = &s * &s + &s;
        let tape = Tape::compile(SessionId(7), 1, &[&e]).unwrap();
        // x, sin x, sin x * sin x, sum
        assert_eq!(tape.len(), 4);
    }

    #[test]
    fn jacobian_of_product_and_quotient() {
        let x = var(0);
        let y = var(1);
        let f = &x * &y;
        let g = &x / &y;
        let tape = Tape::compile(SessionId(7), 2, &[&f, &g]).unwrap();
        let (vals, jac) = tape.jacobian(&[3.0, 2.0]).unwrap();
        assert_relative_eq!(vals[0], 6.0);
        assert_relative_eq!(vals[1], 1.5);
        assert_relative_eq!(jac[[0, 0]], 2.0);
        assert_relative_eq!(jac[[0, 1]], 3.0);
        assert_relative_eq!(jac[[1, 0]], 0.5);
        assert_relative_eq!(jac[[1, 1]], -0.75);
    }

    #[test]
    fn foreign_variable_is_rejected() {
        let alien = Expr::variable(SessionId(8), 0);
        let e = var(0) + alien;
        let err = Tape::compile(SessionId(7), 1, &[&e]).unwrap_err();
        assert!(matches!(err, IcarusError::ForeignExpression));
    }

    #[test]
    fn arity_mismatch_is_an_error() {
        let e = var(0).exp();
        let tape = Tape::compile(SessionId(7), 1, &[&e]).unwrap();
        assert!(tape.values(&[1.0, 2.0]).is_err());
    }
}
