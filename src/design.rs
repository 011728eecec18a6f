//! The aircraft design session: declares the variables, builds geometry,
//! mass budget and aerodynamics on one problem builder, assembles the
//! constraints and freezes the program.
//!
//! Each [`AircraftDesign`] owns its own [`Problem`] session, so two designs
//! built side by side (say a baseline and a strict-margin variant) never
//! share symbolic state.

use crate::aero::{AeroBuildup, AeroResult, OperatingPoint};
use crate::config::{Bounds, DesignConfig};
use crate::expr::Expr;
use crate::geometry::{Airframe, AirframeVariables};
use crate::mass::{MassAnchors, MassBudget};
use crate::objectives::{assemble, Assembled, ModelTerms};
use crate::optimizer;
use crate::problem::{Problem, Program};
use crate::solution::{ConstraintStatus, Metrics, Report, Resolve};
use crate::types::{IcarusError, SolveOutcome};
use tracing::info;

/// Symbolic handles to every design variable.
#[derive(Debug, Clone)]
pub struct DesignVariables {
    pub velocity: Expr,
    pub alpha_deg: Expr,
    pub root_chord: Expr,
    pub tail_arm: Expr,
    pub nose_radius: Expr,
    pub mid_radius: Expr,
    pub aft_radius: Expr,
    pub tail_incidence_deg: Expr,
    /// A variable when `variables.battery_x` is configured, else a constant.
    pub battery_x: Expr,
}

impl DesignVariables {
    pub fn declare(problem: &mut Problem, config: &DesignConfig) -> Result<Self, IcarusError> {
        let v = &config.variables;
        let mut declare = |name: &str, b: Bounds| problem.variable(name, b.initial, b.lower, b.upper);
        Ok(Self {
            velocity: declare("velocity", v.velocity)?,
            alpha_deg: declare("alpha_deg", v.alpha_deg)?,
            root_chord: declare("root_chord", v.root_chord)?,
            tail_arm: declare("tail_arm", v.tail_arm)?,
            nose_radius: declare("nose_radius", v.nose_radius)?,
            mid_radius: declare("mid_radius", v.mid_radius)?,
            aft_radius: declare("aft_radius", v.aft_radius)?,
            tail_incidence_deg: declare("tail_incidence_deg", v.tail_incidence_deg)?,
            battery_x: match v.battery_x {
                Some(b) => declare("battery_x", b)?,
                None => Expr::constant(config.layout.battery_x),
            },
        })
    }
}

/// A fully assembled, frozen design problem.
#[derive(Debug)]
pub struct AircraftDesign {
    pub config: DesignConfig,
    pub variables: DesignVariables,
    pub airframe: Airframe,
    pub mass: MassBudget,
    pub aero: AeroResult,
    pub assembled: Assembled,
    program: Program,
}

impl AircraftDesign {
    /// Build the symbolic model.  Fails on invalid configuration or
    /// variable declarations, before any solve is attempted.
    pub fn build(config: &DesignConfig) -> Result<Self, IcarusError> {
        config.validate()?;
        let mut problem = Problem::new();
        let variables = DesignVariables::declare(&mut problem, config)?;

        let airframe = Airframe::build(
            &config.wing,
            &config.tail,
            &config.fuselage,
            &AirframeVariables {
                root_chord: variables.root_chord.clone(),
                tail_arm: variables.tail_arm.clone(),
                nose_radius: variables.nose_radius.clone(),
                mid_radius: variables.mid_radius.clone(),
                aft_radius: variables.aft_radius.clone(),
                tail_incidence_deg: variables.tail_incidence_deg.clone(),
            },
        )?;

        let mass = MassBudget::build(
            &config.mass,
            &MassAnchors {
                tail_arm: variables.tail_arm.clone(),
                battery_x: variables.battery_x.clone(),
            },
        )?;

        let op_point = OperatingPoint::new(variables.velocity.clone(), variables.alpha_deg.clone());
        let aero = AeroBuildup::new(
            &airframe,
            op_point,
            mass.total.cg.clone(),
            config.atmosphere,
            config.tail.efficiency,
        )
        .run();

        let assembled = assemble(
            &mut problem,
            &config.mission,
            &config.constraints,
            &ModelTerms {
                airframe: &airframe,
                mass: &mass.total,
                aero: &aero,
                velocity: &variables.velocity,
                tail_arm: &variables.tail_arm,
            },
        );

        let program = problem.freeze()?;
        info!(
            variables = program.variables().len(),
            constraints = program.constraints().len(),
            "design problem assembled"
        );

        Ok(Self {
            config: config.clone(),
            variables,
            airframe,
            mass,
            aero,
            assembled,
            program,
        })
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Run the constrained solve from the configured initial guesses.
    pub fn solve(&self) -> Result<SolveOutcome, IcarusError> {
        let solver = &self.config.solver;
        optimizer::solve(&self.program, &solver.lbfgs, &solver.augmented_lagrangian)
    }

    /// Resolve the whole model at the outcome's point.
    pub fn report(&self, outcome: &SolveOutcome) -> Result<Report, IcarusError> {
        let solution = outcome.solution();
        let airframe = self.airframe.resolve(solution)?;
        let mass = self.mass.resolve(solution)?;
        let aero = self.aero.resolve(solution)?;
        let tol = self.config.solver.augmented_lagrangian.constraint_tol;
        let constraints = self
            .program
            .constraints()
            .iter()
            .map(|c| ConstraintStatus::evaluate(c, solution, tol))
            .collect::<Result<Vec<_>, _>>()?;
        let metrics = Metrics::derive(
            self.config.mission.battery_energy_j(),
            self.config.mission.propulsive_efficiency,
            self.variables.velocity.resolve(solution)?,
            self.variables.alpha_deg.resolve(solution)?,
            &aero,
            &mass,
            airframe.wing.mean_aerodynamic_chord,
        );
        Ok(Report {
            converged: outcome.is_converged(),
            variables: solution.variables.clone(),
            airframe,
            mass,
            aero,
            constraints,
            metrics,
        })
    }
}
