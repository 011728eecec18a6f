//! Design configuration: every fixed constant, bound and solver setting
//! that defines one optimisation run.
//!
//! All sections default to the baseline 700 g endurance aircraft, so a TOML
//! file only needs to name what it changes:
//!
//! ```toml
//! [constraints]
//! min_static_margin = 0.10
//!
//! [variables.battery_x]
//! initial = -0.02
//! lower = -0.15
//! upper = 0.05
//! ```

use crate::aero::Atmosphere;
use crate::geometry::{FuselageSpec, TailSpec, WingSpec};
use crate::mass::MassSpec;
use crate::objectives::{ConstraintSpec, MissionSpec};
use crate::types::{ALSettings, IcarusError, SolverOptions};
use serde::Deserialize;
use std::path::Path;

macro_rules! ensure {
    ($cond:expr, $($msg:tt)+) => {
        if !$cond {
            return Err(IcarusError::Config(format!($($msg)+)));
        }
    };
}

/// Initial guess and bounds for one design variable.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Bounds {
    pub initial: f64,
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub const fn new(initial: f64, lower: f64, upper: f64) -> Self {
        Self { initial, lower, upper }
    }
}

/// Bound tuples for the free parameters.  `battery_x` is optional: when
/// absent the battery sits at `layout.battery_x`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VariableSpec {
    /// m/s
    pub velocity: Bounds,
    pub alpha_deg: Bounds,
    pub root_chord: Bounds,
    pub tail_arm: Bounds,
    pub nose_radius: Bounds,
    pub mid_radius: Bounds,
    pub aft_radius: Bounds,
    pub tail_incidence_deg: Bounds,
    pub battery_x: Option<Bounds>,
}

impl Default for VariableSpec {
    fn default() -> Self {
        Self {
            velocity: Bounds::new(15.0, 8.0, 25.0),
            alpha_deg: Bounds::new(4.0, -5.0, 10.0),
            root_chord: Bounds::new(0.24, 0.15, 0.30),
            tail_arm: Bounds::new(0.60, 0.45, 0.75),
            nose_radius: Bounds::new(0.03, 0.02, 0.05),
            mid_radius: Bounds::new(0.03, 0.02, 0.05),
            aft_radius: Bounds::new(0.015, 0.01, 0.03),
            tail_incidence_deg: Bounds::new(-3.0, -10.0, 5.0),
            battery_x: None,
        }
    }
}

/// Fixed placement of items that may alternatively be design variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LayoutSpec {
    pub battery_x: f64,
}

impl Default for LayoutSpec {
    fn default() -> Self {
        Self { battery_x: -0.02 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SolverSpec {
    pub lbfgs: SolverOptions,
    pub augmented_lagrangian: ALSettings,
}

/// Root of the configuration tree.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DesignConfig {
    pub mission: MissionSpec,
    pub atmosphere: Atmosphere,
    pub wing: WingSpec,
    pub tail: TailSpec,
    pub fuselage: FuselageSpec,
    pub mass: MassSpec,
    pub layout: LayoutSpec,
    pub constraints: ConstraintSpec,
    pub variables: VariableSpec,
    pub solver: SolverSpec,
}

impl DesignConfig {
    /// 30 Wh, 700 g, 1.5 m span, static margin ≥ 5 % MAC.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Baseline with the static-margin floor raised to 80 % MAC.
    pub fn strict_margin() -> Self {
        let mut cfg = Self::baseline();
        cfg.constraints.min_static_margin = 0.80;
        cfg
    }

    pub fn from_toml_str(text: &str) -> Result<Self, IcarusError> {
        let cfg: Self = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, IcarusError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Reject non-physical constants.  Variable bounds are checked by the
    /// problem builder when they are declared.
    pub fn validate(&self) -> Result<(), IcarusError> {
        let m = &self.mission;
        ensure!(m.battery_energy_wh > 0.0, "mission.battery_energy_wh must be positive");
        ensure!(m.design_mass > 0.0, "mission.design_mass must be positive");
        ensure!(m.gravity > 0.0, "mission.gravity must be positive");
        ensure!(
            m.propulsive_efficiency > 0.0 && m.propulsive_efficiency <= 1.0,
            "mission.propulsive_efficiency must be in (0, 1]"
        );

        let a = &self.atmosphere;
        ensure!(
            a.density > 0.0 && a.dynamic_viscosity > 0.0 && a.speed_of_sound > 0.0,
            "atmosphere properties must be positive"
        );

        ensure!(self.wing.span > 0.0, "wing.span must be positive");
        ensure!(
            self.wing.taper_ratio > 0.0 && self.wing.taper_ratio <= 1.0,
            "wing.taper_ratio must be in (0, 1]"
        );
        ensure!(self.wing.sweep_le_deg.abs() < 60.0, "wing.sweep_le_deg must be below 60 degrees");

        let t = &self.tail;
        ensure!(
            t.dihedral_deg > 0.0 && t.dihedral_deg < 90.0,
            "tail.dihedral_deg must be in (0, 90)"
        );
        ensure!(t.projected_area > 0.0, "tail.projected_area must be positive");
        ensure!(
            t.sizing_factor > 0.0 && t.sizing_factor <= 1.0,
            "tail.sizing_factor must be in (0, 1]"
        );
        ensure!(t.root_chord > 0.0, "tail.root_chord must be positive");
        ensure!(t.tip_ratio > 0.0 && t.tip_ratio <= 1.0, "tail.tip_ratio must be in (0, 1]");
        ensure!(t.efficiency > 0.0 && t.efficiency <= 1.0, "tail.efficiency must be in (0, 1]");

        let f = &self.fuselage;
        ensure!(
            f.pod_stations.windows(2).all(|w| w[1] > w[0]),
            "fuselage.pod_stations must be strictly increasing"
        );
        ensure!(f.boom_radius > 0.0, "fuselage.boom_radius must be positive");
        // Malformed tuples are left for the problem builder to reject as
        // invalid bounds.
        let arm = &self.variables.tail_arm;
        if arm.lower < arm.upper && (arm.lower..=arm.upper).contains(&arm.initial) {
            ensure!(
                arm.lower > f.pod_stations[3],
                "variables.tail_arm.lower must lie aft of the pod"
            );
        }

        ensure!(!self.mass.components.is_empty(), "mass.components must not be empty");
        ensure!(
            (0.0..1.0).contains(&self.mass.allowance_fraction),
            "mass.allowance_fraction must be in [0, 1)"
        );

        let c = &self.constraints;
        ensure!(c.min_tip_chord > 0.0, "constraints.min_tip_chord must be positive");
        ensure!(c.max_tail_arm > 0.0, "constraints.max_tail_arm must be positive");
        ensure!(c.min_payload_volume > 0.0, "constraints.min_payload_volume must be positive");

        let s = &self.solver;
        ensure!(s.lbfgs.max_iterations > 0, "solver.lbfgs.max_iterations must be at least 1");
        ensure!(s.lbfgs.memory > 0, "solver.lbfgs.memory must be at least 1");
        ensure!(
            s.augmented_lagrangian.mu_init > 0.0 && s.augmented_lagrangian.mu_factor > 1.0,
            "solver.augmented_lagrangian needs mu_init > 0 and mu_factor > 1"
        );
        ensure!(
            s.augmented_lagrangian.constraint_tol > 0.0,
            "solver.augmented_lagrangian.constraint_tol must be positive"
        );
        Ok(())
    }
}
