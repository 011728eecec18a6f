//! Solved projections: concrete numeric replicas of the symbolic model,
//! and the scalar performance metrics derived from them.
//!
//! Everything symbolic implements [`Resolve`].  Resolution is a pure
//! function of the [`Solution`], so re-resolving the same entity always
//! yields the same numbers.

use crate::aero::{AeroResult, SurfaceLoads};
use crate::expr::Expr;
use crate::geometry::{Airframe, BodyOfRevolution, LiftingSurface};
use crate::gradients::Tape;
use crate::mass::{MassBudget, MassComponent};
use crate::problem::{Constraint, Relation};
use crate::types::{DesignVariable, IcarusError, Solution};
use std::fmt;

/// Map a symbolic entity to its numeric replica at a solution.
pub trait Resolve {
    type Solved;

    fn resolve(&self, solution: &Solution) -> Result<Self::Solved, IcarusError>;
}

impl Resolve for Expr {
    type Solved = f64;

    fn resolve(&self, solution: &Solution) -> Result<f64, IcarusError> {
        if let Some(v) = self.as_constant() {
            return Ok(v);
        }
        let tape = Tape::compile(solution.session(), solution.variables.len(), &[self])?;
        Ok(tape.values(&solution.values())?[0])
    }
}

impl<const N: usize> Resolve for [Expr; N] {
    type Solved = [f64; N];

    fn resolve(&self, solution: &Solution) -> Result<[f64; N], IcarusError> {
        let mut out = [0.0; N];
        for (o, e) in out.iter_mut().zip(self) {
            *o = e.resolve(solution)?;
        }
        Ok(out)
    }
}

// ─────────────────────────────────────────────────────────────
//  Geometry
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SolvedSection {
    pub xyz_le: [f64; 3],
    pub chord: f64,
    pub twist_deg: f64,
    pub airfoil: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolvedSurface {
    pub name: String,
    pub symmetric: bool,
    pub sections: Vec<SolvedSection>,
    pub area: f64,
    pub span: f64,
    pub aspect_ratio: f64,
    pub mean_aerodynamic_chord: f64,
    pub x_mac_le: f64,
}

impl Resolve for LiftingSurface {
    type Solved = SolvedSurface;

    fn resolve(&self, solution: &Solution) -> Result<SolvedSurface, IcarusError> {
        let sections = self
            .sections
            .iter()
            .map(|s| {
                let chord = s.chord.resolve(solution)?;
                if !(chord > 0.0) {
                    return Err(IcarusError::InvalidGeometry(format!(
                        "`{}` resolved to non-positive chord {chord}",
                        self.name
                    )));
                }
                Ok(SolvedSection {
                    xyz_le: s.xyz_le.resolve(solution)?,
                    chord,
                    twist_deg: s.twist_deg.resolve(solution)?,
                    airfoil: s.airfoil.name.clone(),
                })
            })
            .collect::<Result<Vec<_>, IcarusError>>()?;
        Ok(SolvedSurface {
            name: self.name.clone(),
            symmetric: self.symmetric,
            sections,
            area: self.area().resolve(solution)?,
            span: self.span().resolve(solution)?,
            aspect_ratio: self.aspect_ratio().resolve(solution)?,
            mean_aerodynamic_chord: self.mean_aerodynamic_chord().resolve(solution)?,
            x_mac_le: self.x_mac_le().resolve(solution)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolvedBody {
    pub name: String,
    /// (x, radius)
    pub stations: Vec<(f64, f64)>,
    pub length: f64,
    pub volume: f64,
    pub wetted_area: f64,
}

impl Resolve for BodyOfRevolution {
    type Solved = SolvedBody;

    fn resolve(&self, solution: &Solution) -> Result<SolvedBody, IcarusError> {
        let stations = self
            .stations
            .iter()
            .map(|(x, r)| {
                let r = r.resolve(solution)?;
                if !(r >= 0.0) {
                    return Err(IcarusError::InvalidGeometry(format!(
                        "`{}` resolved to negative radius {r}",
                        self.name
                    )));
                }
                Ok((x.resolve(solution)?, r))
            })
            .collect::<Result<Vec<_>, IcarusError>>()?;
        Ok(SolvedBody {
            name: self.name.clone(),
            stations,
            length: self.length().resolve(solution)?,
            volume: self.volume().resolve(solution)?,
            wetted_area: self.wetted_area().resolve(solution)?,
        })
    }
}

/// Read-only airframe handed to CAD export and template generation.
#[derive(Debug, Clone, PartialEq)]
pub struct SolvedAirframe {
    pub wing: SolvedSurface,
    pub tail: SolvedSurface,
    pub pod: SolvedBody,
    pub boom: SolvedBody,
}

impl Resolve for Airframe {
    type Solved = SolvedAirframe;

    fn resolve(&self, solution: &Solution) -> Result<SolvedAirframe, IcarusError> {
        Ok(SolvedAirframe {
            wing: self.wing.resolve(solution)?,
            tail: self.tail.resolve(solution)?,
            pod: self.pod.resolve(solution)?,
            boom: self.boom.resolve(solution)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────
//  Mass
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SolvedMass {
    pub name: String,
    pub mass: f64,
    pub cg: [f64; 3],
    pub inertia: [f64; 3],
}

impl Resolve for MassComponent {
    type Solved = SolvedMass;

    fn resolve(&self, solution: &Solution) -> Result<SolvedMass, IcarusError> {
        Ok(SolvedMass {
            name: self.name.clone(),
            mass: self.mass.resolve(solution)?,
            cg: self.cg.resolve(solution)?,
            inertia: self.inertia.resolve(solution)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolvedMassBudget {
    pub components: Vec<SolvedMass>,
    pub total: SolvedMass,
}

impl SolvedMassBudget {
    /// Share of total mass per component.
    pub fn fractions(&self) -> Vec<(&str, f64)> {
        self.components
            .iter()
            .map(|c| (c.name.as_str(), c.mass / self.total.mass))
            .collect()
    }
}

impl Resolve for MassBudget {
    type Solved = SolvedMassBudget;

    fn resolve(&self, solution: &Solution) -> Result<SolvedMassBudget, IcarusError> {
        Ok(SolvedMassBudget {
            components: self
                .components
                .iter()
                .map(|c| c.resolve(solution))
                .collect::<Result<_, _>>()?,
            total: self.total.resolve(solution)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────
//  Aerodynamics
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SolvedSurfaceLoads {
    pub lift: f64,
    pub drag: f64,
    pub moment: f64,
    pub normal_coefficient: f64,
}

impl Resolve for SurfaceLoads {
    type Solved = SolvedSurfaceLoads;

    fn resolve(&self, solution: &Solution) -> Result<SolvedSurfaceLoads, IcarusError> {
        Ok(SolvedSurfaceLoads {
            lift: self.lift.resolve(solution)?,
            drag: self.drag.resolve(solution)?,
            moment: self.moment.resolve(solution)?,
            normal_coefficient: self.normal_coefficient.resolve(solution)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolvedAero {
    pub lift: f64,
    pub drag: f64,
    pub moment: f64,
    pub cl: f64,
    pub cd: f64,
    pub cm: f64,
    pub cl_alpha: f64,
    pub cm_alpha: f64,
    pub x_np: f64,
    pub dynamic_pressure: f64,
    pub wing: SolvedSurfaceLoads,
    pub tail: SolvedSurfaceLoads,
    pub body_drag: f64,
}

impl Resolve for AeroResult {
    type Solved = SolvedAero;

    fn resolve(&self, solution: &Solution) -> Result<SolvedAero, IcarusError> {
        Ok(SolvedAero {
            lift: self.lift.resolve(solution)?,
            drag: self.drag.resolve(solution)?,
            moment: self.moment.resolve(solution)?,
            cl: self.cl.resolve(solution)?,
            cd: self.cd.resolve(solution)?,
            cm: self.cm.resolve(solution)?,
            cl_alpha: self.cl_alpha.resolve(solution)?,
            cm_alpha: self.cm_alpha.resolve(solution)?,
            x_np: self.x_np.resolve(solution)?,
            dynamic_pressure: self.dynamic_pressure.resolve(solution)?,
            wing: self.wing.resolve(solution)?,
            tail: self.tail.resolve(solution)?,
            body_drag: self.body_drag.resolve(solution)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────
//  Constraints
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintStatus {
    pub name: String,
    pub relation: Relation,
    pub value: f64,
    pub bound: f64,
    /// Standard-form residual (scaled).
    pub residual: f64,
    pub satisfied: bool,
}

impl ConstraintStatus {
    pub fn evaluate(constraint: &Constraint, solution: &Solution, tol: f64) -> Result<Self, IcarusError> {
        let value = constraint.expr.resolve(solution)?;
        let residual = constraint.residual(value);
        Ok(Self {
            name: constraint.name.clone(),
            relation: constraint.relation,
            value,
            bound: constraint.bound,
            residual,
            satisfied: constraint.violation(residual) <= tol,
        })
    }
}

// ─────────────────────────────────────────────────────────────
//  Metrics
// ─────────────────────────────────────────────────────────────

/// Scalar performance summary, recomputable from solved values alone.
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub cruise_speed: f64,
    pub alpha_deg: f64,
    pub lift: f64,
    pub drag: f64,
    /// W
    pub power_required: f64,
    pub lift_to_drag: f64,
    /// s
    pub endurance: f64,
    /// Fraction of MAC.
    pub static_margin: f64,
    pub x_cg: f64,
    pub x_np: f64,
    pub total_mass: f64,
}

impl Metrics {
    pub fn derive(
        battery_energy_j: f64,
        propulsive_efficiency: f64,
        cruise_speed: f64,
        alpha_deg: f64,
        aero: &SolvedAero,
        mass: &SolvedMassBudget,
        mean_aerodynamic_chord: f64,
    ) -> Self {
        let power_required = aero.drag * cruise_speed / propulsive_efficiency;
        let x_cg = mass.total.cg[0];
        Self {
            cruise_speed,
            alpha_deg,
            lift: aero.lift,
            drag: aero.drag,
            power_required,
            lift_to_drag: aero.lift / aero.drag,
            endurance: battery_energy_j / power_required,
            static_margin: (aero.x_np - x_cg) / mean_aerodynamic_chord,
            x_cg,
            x_np: aero.x_np,
            total_mass: mass.total.mass,
        }
    }

    pub fn endurance_minutes(&self) -> f64 {
        self.endurance / 60.0
    }

    pub fn static_margin_percent(&self) -> f64 {
        self.static_margin * 100.0
    }
}

// ─────────────────────────────────────────────────────────────
//  Report
// ─────────────────────────────────────────────────────────────

/// Everything an external consumer gets from one solve.
#[derive(Debug, Clone)]
pub struct Report {
    pub converged: bool,
    pub variables: Vec<DesignVariable>,
    pub airframe: SolvedAirframe,
    pub mass: SolvedMassBudget,
    pub aero: SolvedAero,
    pub constraints: Vec<ConstraintStatus>,
    pub metrics: Metrics,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.metrics;
        if !self.converged {
            writeln!(f, "!!!! DIAGNOSTIC: solver did not converge, check constraints below !!!!")?;
        }
        writeln!(f, "==== SOLUTION SUMMARY ====")?;
        writeln!(f, "Cruise   : {:.2} m/s  @ α {:.1}°", m.cruise_speed, m.alpha_deg)?;
        writeln!(f, "Drag     : {:.2} N", m.drag)?;
        writeln!(f, "PowerReq : {:.1} W (est.)", m.power_required)?;
        writeln!(f, "L/D      : {:.2}", m.lift_to_drag)?;
        writeln!(f, "Endurance: {:.1} min", m.endurance_minutes())?;
        writeln!(f, "Static Margin: {:.1} % MAC", m.static_margin_percent())?;
        writeln!(f, "CG / NP  : {:.4} m / {:.4} m", m.x_cg, m.x_np)?;

        writeln!(f)?;
        writeln!(f, "---- Design variables ----")?;
        for v in &self.variables {
            writeln!(
                f,
                "{:<20} {:>10.4}   [{}, {}]",
                v.name,
                v.value.unwrap_or(f64::NAN),
                v.lower,
                v.upper
            )?;
        }

        writeln!(f)?;
        writeln!(f, "---- Mass budget ----")?;
        for (c, (_, frac)) in self.mass.components.iter().zip(self.mass.fractions()) {
            writeln!(
                f,
                "{:<20} {:>7.1} g  {:>5.1} %  x_cg {:>7.4} m",
                c.name,
                c.mass * 1000.0,
                frac * 100.0,
                c.cg[0]
            )?;
        }
        writeln!(f, "{:<20} {:>7.1} g", "Total", self.mass.total.mass * 1000.0)?;

        writeln!(f)?;
        writeln!(f, "---- Constraints ----")?;
        for c in &self.constraints {
            let rel = match c.relation {
                Relation::LessEq => "<=",
                Relation::GreaterEq => ">=",
                Relation::Equal => "==",
            };
            writeln!(
                f,
                "{:<16} {:>12.5} {} {:<12.5} {}",
                c.name,
                c.value,
                rel,
                c.bound,
                if c.satisfied { "ok" } else { "VIOLATED" }
            )?;
        }
        Ok(())
    }
}
