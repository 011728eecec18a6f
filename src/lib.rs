//! **Icarus**: parametric design optimisation for a small fixed-wing UAV.
//!
//! The crate builds the whole aircraft as one differentiable symbolic model
//! and solves it as a constrained nonlinear program:
//!
//! 1. **Registry** (`problem`): design variables with bounds, constraints,
//!    objective; frozen into a compiled `Program`.
//! 2. **Expressions** (`expr`, `gradients`): symbolic DAG, tape compilation,
//!    forward-mode Jacobians.
//! 3. **Geometry** (`geometry`): wing, V-tail, pod and boom.
//! 4. **Mass** (`mass`): component budget with assembly allowance.
//! 5. **Aerodynamics** (`aero`): component buildup about the current cg.
//! 6. **Assembly** (`objectives`): trim, stability and geometric constraints;
//!    power-required objective.
//! 7. **Optimiser** (`optimizer`): augmented Lagrangian + L-BFGS via `argmin`,
//!    returning `Converged` or `Diagnostic`.
//! 8. **Extraction** (`solution`): solved projections and metrics.

pub mod types;
pub mod expr;
pub mod gradients;
pub mod problem;
pub mod geometry;
pub mod mass;
pub mod aero;
pub mod objectives;
pub mod optimizer;
pub mod solution;
pub mod config;
pub mod design;

pub use config::DesignConfig;
pub use design::AircraftDesign;
pub use types::{IcarusError, SolveOutcome, Solution};
