//! Constraint and objective assembly, and the augmented-Lagrangian merit
//! the solver minimises.
//!
//! The assembler registers hard constraints against the problem builder;
//! nothing here penalises infeasibility in the objective itself.  The merit
//! functions at the bottom are pure ℝ → ℝ math on standard-form residuals.

use crate::aero::AeroResult;
use crate::expr::Expr;
use crate::geometry::Airframe;
use crate::mass::MassComponent;
use crate::problem::{Constraint, Problem};
use crate::types::ALState;
use serde::Deserialize;

pub const LIFT: &str = "lift";
pub const TRIM: &str = "trim";
pub const STATIC_MARGIN: &str = "static_margin";
pub const TIP_CHORD: &str = "tip_chord";
pub const TAIL_ARM: &str = "tail_arm";
pub const PAYLOAD_VOLUME: &str = "payload_volume";

// ─────────────────────────────────────────────────────────────
//  Fixed inputs
// ─────────────────────────────────────────────────────────────

/// Mission constants.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MissionSpec {
    pub battery_energy_wh: f64,
    /// Takeoff gross weight target, kg.
    pub design_mass: f64,
    pub gravity: f64,
    pub propulsive_efficiency: f64,
}

impl Default for MissionSpec {
    fn default() -> Self {
        Self {
            battery_energy_wh: 30.0,
            design_mass: 0.700,
            gravity: 9.81,
            propulsive_efficiency: 0.67,
        }
    }
}

impl MissionSpec {
    pub fn battery_energy_j(&self) -> f64 {
        self.battery_energy_wh * 3600.0
    }

    /// Lift the wing must carry, N.
    pub fn weight(&self) -> f64 {
        self.design_mass * self.gravity
    }
}

/// Floors and ceilings on the solved design.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConstraintSpec {
    /// Static margin as a fraction of MAC.
    pub min_static_margin: f64,
    pub min_tip_chord: f64,
    pub max_tail_arm: f64,
    /// Minimum pod volume, m³.
    pub min_payload_volume: f64,
}

impl Default for ConstraintSpec {
    fn default() -> Self {
        Self {
            min_static_margin: 0.05,
            min_tip_chord: 0.06,
            max_tail_arm: 0.75,
            min_payload_volume: 0.0005,
        }
    }
}

// ─────────────────────────────────────────────────────────────
//  Assembly
// ─────────────────────────────────────────────────────────────

/// (x_np − x_cg) / MAC.
pub fn static_margin(x_np: &Expr, x_cg: &Expr, mac: &Expr) -> Expr {
    (x_np - x_cg) / mac
}

/// Shaft-to-air power: D·V / η.
pub fn power_required(drag: &Expr, velocity: &Expr, efficiency: f64) -> Expr {
    drag * velocity / efficiency
}

/// Model quantities the assembler reads.
pub struct ModelTerms<'a> {
    pub airframe: &'a Airframe,
    pub mass: &'a MassComponent,
    pub aero: &'a AeroResult,
    pub velocity: &'a Expr,
    pub tail_arm: &'a Expr,
}

/// Handles to the assembled objective and derived constraint quantities.
#[derive(Debug, Clone)]
pub struct Assembled {
    pub weight: f64,
    pub static_margin: Expr,
    pub power_required: Expr,
}

/// Register every constraint and the objective on `problem`.
pub fn assemble(problem: &mut Problem, mission: &MissionSpec, limits: &ConstraintSpec, terms: &ModelTerms<'_>) -> Assembled {
    let weight = mission.weight();
    let wing = &terms.airframe.wing;
    let sm = static_margin(&terms.aero.x_np, terms.mass.x_cg(), &wing.mean_aerodynamic_chord());
    let power = power_required(&terms.aero.drag, terms.velocity, mission.propulsive_efficiency);

    problem.subject_to(Constraint::at_least(LIFT, terms.aero.lift.clone(), weight).scaled(weight));
    problem.subject_to(Constraint::equal(TRIM, terms.aero.cm.clone(), 0.0));
    problem.subject_to(Constraint::at_least(STATIC_MARGIN, sm.clone(), limits.min_static_margin));
    problem.subject_to(
        Constraint::at_least(TIP_CHORD, wing.tip_chord(), limits.min_tip_chord).scaled(limits.min_tip_chord),
    );
    problem.subject_to(
        Constraint::at_most(TAIL_ARM, terms.tail_arm.clone(), limits.max_tail_arm).scaled(limits.max_tail_arm),
    );
    problem.subject_to(
        Constraint::at_least(PAYLOAD_VOLUME, terms.airframe.pod.volume(), limits.min_payload_volume)
            .scaled(limits.min_payload_volume),
    );
    problem.minimize(power.clone());

    Assembled {
        weight,
        static_margin: sm,
        power_required: power,
    }
}

// ─────────────────────────────────────────────────────────────
//  Augmented Lagrangian merit
// ─────────────────────────────────────────────────────────────

/// Merit value for scaled objective `f` and residuals `r`:
///
///   f + Σ_eq (λ r + μ/2 r²) + Σ_ineq μ/2 [max(0, λ/μ + r)² − (λ/μ)²]
pub fn merit(f: f64, residuals: &[f64], equality: &[bool], al: &ALState) -> f64 {
    let mu = al.mu;
    let penalty: f64 = residuals
        .iter()
        .zip(equality)
        .zip(&al.lambdas)
        .map(|((&r, &eq), &lam)| {
            if eq {
                lam * r + 0.5 * mu * r * r
            } else {
                let shifted = (lam / mu + r).max(0.0);
                0.5 * mu * (shifted * shifted - (lam / mu) * (lam / mu))
            }
        })
        .sum();
    f + penalty
}

/// ∂merit/∂rₖ for each residual; also the first-order multiplier update.
pub fn multiplier_estimates(residuals: &[f64], equality: &[bool], al: &ALState) -> Vec<f64> {
    residuals
        .iter()
        .zip(equality)
        .zip(&al.lambdas)
        .map(|((&r, &eq), &lam)| {
            let w = lam + al.mu * r;
            if eq {
                w
            } else {
                w.max(0.0)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn merit_is_objective_when_feasible_and_unpriced() {
        let al = ALState {
            lambdas: vec![0.0, 0.0],
            mu: 10.0,
        };
        assert_relative_eq!(merit(2.0, &[-1.0, 0.0], &[false, true], &al), 2.0);
    }

    #[test]
    fn merit_slope_matches_finite_difference() {
        let al = ALState {
            lambdas: vec![0.3, -0.2],
            mu: 5.0,
        };
        let eq = [false, true];
        let r = [0.1, 0.05];
        let w = multiplier_estimates(&r, &eq, &al);
        let h = 1e-6;
        for k in 0..2 {
            let mut up = r;
            let mut dn = r;
            up[k] += h;
            dn[k] -= h;
            let fd = (merit(0.0, &up, &eq, &al) - merit(0.0, &dn, &eq, &al)) / (2.0 * h);
            assert_relative_eq!(fd, w[k], epsilon = 1e-6);
        }
    }

    #[test]
    fn inactive_inequality_releases_its_multiplier() {
        let al = ALState {
            lambdas: vec![0.5],
            mu: 10.0,
        };
        assert_eq!(multiplier_estimates(&[-1.0], &[false], &al), vec![0.0]);
    }
}
