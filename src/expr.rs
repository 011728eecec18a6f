//! Symbolic scalar expressions over design variables.
//!
//! An [`Expr`] is a reference-counted node in a DAG.  Cloning is cheap and
//! shares the node, so a subexpression used in several places (the total
//! mass, the wing reference area) is compiled and evaluated once per pass.
//! Operations on two constants fold immediately.

use std::ops::{Add, Div, Mul, Neg, Sub};
use std::rc::Rc;

/// Identifies the [`Problem`](crate::problem::Problem) that owns a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Sqrt,
    Sin,
    Cos,
    Tan,
    Exp,
    Ln,
    Atan,
    Tanh,
}

impl UnaryOp {
    pub(crate) fn apply(self, a: f64) -> f64 {
        match self {
            Self::Neg => -a,
            Self::Sqrt => a.sqrt(),
            Self::Sin => a.sin(),
            Self::Cos => a.cos(),
            Self::Tan => a.tan(),
            Self::Exp => a.exp(),
            Self::Ln => a.ln(),
            Self::Atan => a.atan(),
            Self::Tanh => a.tanh(),
        }
    }

    /// d(op(a))/da given the argument `a` and the result `v`.
    pub(crate) fn derivative(self, a: f64, v: f64) -> f64 {
        match self {
            Self::Neg => -1.0,
            Self::Sqrt => 0.5 / v,
            Self::Sin => a.cos(),
            Self::Cos => -a.sin(),
            Self::Tan => 1.0 + v * v,
            Self::Exp => v,
            Self::Ln => 1.0 / a,
            Self::Atan => 1.0 / (1.0 + a * a),
            Self::Tanh => 1.0 - v * v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub(crate) fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Add => a + b,
            Self::Sub => a - b,
            Self::Mul => a * b,
            Self::Div => a / b,
        }
    }

    /// Partial derivatives (∂/∂a, ∂/∂b).
    pub(crate) fn partials(self, a: f64, b: f64) -> (f64, f64) {
        match self {
            Self::Add => (1.0, 1.0),
            Self::Sub => (1.0, -1.0),
            Self::Mul => (b, a),
            Self::Div => (1.0 / b, -a / (b * b)),
        }
    }
}

#[derive(Debug)]
pub(crate) enum Node {
    Constant(f64),
    Variable { session: SessionId, index: usize },
    Unary { op: UnaryOp, arg: Expr },
    Binary { op: BinaryOp, lhs: Expr, rhs: Expr },
    /// `base^exponent` with a constant exponent.
    Powf { base: Expr, exponent: f64 },
}

/// Handle to a node in the expression graph.
#[derive(Debug, Clone)]
pub struct Expr(pub(crate) Rc<Node>);

impl Expr {
    pub fn constant(value: f64) -> Self {
        Self(Rc::new(Node::Constant(value)))
    }

    pub(crate) fn variable(session: SessionId, index: usize) -> Self {
        Self(Rc::new(Node::Variable { session, index }))
    }

    /// The value if this expression is a folded constant.
    pub fn as_constant(&self) -> Option<f64> {
        match *self.0 {
            Node::Constant(v) => Some(v),
            _ => None,
        }
    }

    /// True when `self` and `other` are the same graph node.
    pub fn ptr_eq(&self, other: &Expr) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn unary(op: UnaryOp, arg: &Expr) -> Expr {
        if let Some(a) = arg.as_constant() {
            return Expr::constant(op.apply(a));
        }
        Expr(Rc::new(Node::Unary { op, arg: arg.clone() }))
    }

    pub(crate) fn binary(op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Expr {
        match (op, lhs.as_constant(), rhs.as_constant()) {
            (_, Some(a), Some(b)) => return Expr::constant(op.apply(a, b)),
            (BinaryOp::Add, Some(a), None) if a == 0.0 => return rhs.clone(),
            (BinaryOp::Add | BinaryOp::Sub, None, Some(b)) if b == 0.0 => return lhs.clone(),
            (BinaryOp::Mul, Some(a), None) if a == 1.0 => return rhs.clone(),
            (BinaryOp::Mul | BinaryOp::Div, None, Some(b)) if b == 1.0 => return lhs.clone(),
            _ => {}
        }
        Expr(Rc::new(Node::Binary {
            op,
            lhs: lhs.clone(),
            rhs: rhs.clone(),
        }))
    }

    pub fn sqrt(&self) -> Expr {
        Self::unary(UnaryOp::Sqrt, self)
    }

    pub fn sin(&self) -> Expr {
        Self::unary(UnaryOp::Sin, self)
    }

    pub fn cos(&self) -> Expr {
        Self::unary(UnaryOp::Cos, self)
    }

    pub fn tan(&self) -> Expr {
        Self::unary(UnaryOp::Tan, self)
    }

    pub fn exp(&self) -> Expr {
        Self::unary(UnaryOp::Exp, self)
    }

    pub fn ln(&self) -> Expr {
        Self::unary(UnaryOp::Ln, self)
    }

    pub fn atan(&self) -> Expr {
        Self::unary(UnaryOp::Atan, self)
    }

    pub fn tanh(&self) -> Expr {
        Self::unary(UnaryOp::Tanh, self)
    }

    pub fn powf(&self, exponent: f64) -> Expr {
        if let Some(a) = self.as_constant() {
            return Expr::constant(a.powf(exponent));
        }
        if exponent == 1.0 {
            return self.clone();
        }
        Expr(Rc::new(Node::Powf {
            base: self.clone(),
            exponent,
        }))
    }

    /// `self * self`, sharing the node.
    pub fn square(&self) -> Expr {
        self * self
    }

    /// Degrees to radians.
    pub fn to_radians(&self) -> Expr {
        self * (std::f64::consts::PI / 180.0)
    }

    /// Sum of an iterator of expressions; empty sums are zero.
    pub fn sum<I: IntoIterator<Item = Expr>>(terms: I) -> Expr {
        terms
            .into_iter()
            .fold(Expr::constant(0.0), |acc, t| &acc + &t)
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::constant(value)
    }
}

impl From<&Expr> for Expr {
    fn from(value: &Expr) -> Self {
        value.clone()
    }
}

// ─────────────────────────────────────────────────────────────
//  Operator overloading
// ─────────────────────────────────────────────────────────────

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl $trait<Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::binary($op, &self, &rhs)
            }
        }

        impl $trait<&Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                Expr::binary($op, &self, rhs)
            }
        }

        impl $trait<Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::binary($op, self, &rhs)
            }
        }

        impl<'a, 'b> $trait<&'b Expr> for &'a Expr {
            type Output = Expr;
            fn $method(self, rhs: &'b Expr) -> Expr {
                Expr::binary($op, self, rhs)
            }
        }

        impl $trait<f64> for Expr {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                Expr::binary($op, &self, &Expr::constant(rhs))
            }
        }

        impl $trait<f64> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                Expr::binary($op, self, &Expr::constant(rhs))
            }
        }

        impl $trait<Expr> for f64 {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::binary($op, &Expr::constant(self), &rhs)
            }
        }

        impl $trait<&Expr> for f64 {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                Expr::binary($op, &Expr::constant(self), rhs)
            }
        }
    };
}

impl_binary_op!(Add, add, BinaryOp::Add);
impl_binary_op!(Sub, sub, BinaryOp::Sub);
impl_binary_op!(Mul, mul, BinaryOp::Mul);
impl_binary_op!(Div, div, BinaryOp::Div);

impl Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::unary(UnaryOp::Neg, &self)
    }
}

impl Neg for &Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::unary(UnaryOp::Neg, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_fold() {
        let e = Expr::constant(2.0) * 3.0 + 1.0;
        assert_eq!(e.as_constant(), Some(7.0));
        assert_eq!(Expr::constant(4.0).sqrt().as_constant(), Some(2.0));
        assert_eq!(Expr::constant(3.0).powf(2.0).as_constant(), Some(9.0));
    }

    #[test]
    fn identities_return_the_same_node() {
        let x = Expr::variable(SessionId(0), 0);
        assert!((&x + 0.0).ptr_eq(&x));
        assert!((1.0 * &x).ptr_eq(&x));
        assert!((&x / 1.0).ptr_eq(&x));
        assert!(x.powf(1.0).ptr_eq(&x));
        assert!((&x * 2.0).as_constant().is_none());
    }

    #[test]
    fn empty_sum_is_zero() {
        assert_eq!(Expr::sum(Vec::new()).as_constant(), Some(0.0));
    }
}
