//! Component-superposition aerodynamic buildup.
//!
//! Loads are summed from semi-empirical models of each lifting surface and
//! body, evaluated about the current centre of gravity:
//!
//!   * lifting surfaces: Helmbold/DATCOM lift slope with Prandtl-Glauert
//!     compressibility, flat-plate skin friction with a thickness form
//!     factor, a quadratic drag bucket and Oswald-factor induced drag;
//!   * the tail sees the wing downwash and a reduced dynamic pressure;
//!   * bodies contribute form drag and a Munk destabilising moment.
//!
//! The pitching-moment slope is assembled analytically from the same
//! terms, which locates the neutral point without a second evaluation.

use crate::expr::Expr;
use crate::geometry::{Airframe, BodyOfRevolution, LiftingSurface};
use serde::Deserialize;
use std::f64::consts::PI;

// ─────────────────────────────────────────────────────────────
//  Flight condition
// ─────────────────────────────────────────────────────────────

/// Constant-property atmosphere.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Atmosphere {
    /// kg/m³
    pub density: f64,
    /// Pa·s
    pub dynamic_viscosity: f64,
    /// m/s
    pub speed_of_sound: f64,
}

impl Default for Atmosphere {
    /// International Standard Atmosphere at sea level.
    fn default() -> Self {
        Self {
            density: 1.225,
            dynamic_viscosity: 1.789e-5,
            speed_of_sound: 340.3,
        }
    }
}

/// Airspeed (m/s) and angle of attack (degrees).
#[derive(Debug, Clone)]
pub struct OperatingPoint {
    pub velocity: Expr,
    pub alpha_deg: Expr,
}

impl OperatingPoint {
    pub fn new(velocity: Expr, alpha_deg: Expr) -> Self {
        Self { velocity, alpha_deg }
    }

    pub fn dynamic_pressure(&self, atmosphere: &Atmosphere) -> Expr {
        self.velocity.square() * (0.5 * atmosphere.density)
    }

    pub fn mach(&self, atmosphere: &Atmosphere) -> Expr {
        &self.velocity / atmosphere.speed_of_sound
    }

    pub fn reynolds(&self, atmosphere: &Atmosphere, length: &Expr) -> Expr {
        &self.velocity * length * (atmosphere.density / atmosphere.dynamic_viscosity)
    }
}

// ─────────────────────────────────────────────────────────────
//  Semi-empirical building blocks
// ─────────────────────────────────────────────────────────────

/// Share of the wetted length assumed turbulent.
const TURBULENT_FRACTION: f64 = 0.5;

/// Flat-plate skin friction blending Blasius laminar and 1/5-power
/// turbulent correlations.
pub fn skin_friction(reynolds: &Expr) -> Expr {
    (1.0 - TURBULENT_FRACTION) * 1.328 / reynolds.sqrt() + TURBULENT_FRACTION * 0.074 * reynolds.powf(-0.2)
}

/// Raymer's Oswald efficiency estimate for straight wings.
pub fn oswald_efficiency(aspect_ratio: &Expr) -> Expr {
    (1.0 - aspect_ratio.powf(0.68) * 0.045) * 1.78 - 0.64
}

/// Helmbold/DATCOM finite-wing lift slope [1/rad].
pub fn lift_curve_slope(aspect_ratio: &Expr, kappa: f64, mach: &Expr, tan_half_chord_sweep: &Expr) -> Expr {
    let beta_sq = 1.0 - mach.square();
    let inner = aspect_ratio.square() * &beta_sq / (kappa * kappa) * (1.0 + tan_half_chord_sweep.square() / &beta_sq);
    2.0 * PI * aspect_ratio / ((inner + 4.0).sqrt() + 2.0)
}

// ─────────────────────────────────────────────────────────────
//  Results
// ─────────────────────────────────────────────────────────────

/// Loads from one lifting surface about the reference point.
#[derive(Debug, Clone)]
pub struct SurfaceLoads {
    pub lift: Expr,
    pub drag: Expr,
    pub moment: Expr,
    /// Normal-force coefficient on the surface's own area.
    pub normal_coefficient: Expr,
    /// Finite-surface lift-curve slope [1/rad].
    pub lift_curve_slope: Expr,
    /// dL/dα [N/rad] including any downwash factor.
    pub lift_slope: Expr,
    pub aerodynamic_center_x: Expr,
}

/// Aircraft totals; all quantities are symbolic in the design variables.
#[derive(Debug, Clone)]
pub struct AeroResult {
    pub lift: Expr,
    pub drag: Expr,
    /// Pitching moment about the reference point, nose up positive.
    pub moment: Expr,
    pub cl: Expr,
    pub cd: Expr,
    pub cm: Expr,
    /// dCL/dα [1/rad].
    pub cl_alpha: Expr,
    /// dCm/dα [1/rad].
    pub cm_alpha: Expr,
    /// Neutral-point x.
    pub x_np: Expr,
    pub dynamic_pressure: Expr,
    pub wing: SurfaceLoads,
    pub tail: SurfaceLoads,
    /// Pod and boom drag.
    pub body_drag: Expr,
}

// ─────────────────────────────────────────────────────────────
//  Buildup
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AeroBuildup<'a> {
    pub airframe: &'a Airframe,
    pub op_point: OperatingPoint,
    /// Reference point for moments, normally the current cg.
    pub xyz_ref: [Expr; 3],
    pub atmosphere: Atmosphere,
    /// Tail dynamic-pressure ratio.
    pub tail_efficiency: f64,
}

impl<'a> AeroBuildup<'a> {
    pub fn new(
        airframe: &'a Airframe,
        op_point: OperatingPoint,
        xyz_ref: [Expr; 3],
        atmosphere: Atmosphere,
        tail_efficiency: f64,
    ) -> Self {
        Self {
            airframe,
            op_point,
            xyz_ref,
            atmosphere,
            tail_efficiency,
        }
    }

    fn surface(&self, surface: &LiftingSurface, alpha: &Expr, q: &Expr, downwash_factor: &Expr) -> SurfaceLoads {
        let atm = &self.atmosphere;
        let airfoil = surface.airfoil();
        let area = surface.area();
        let ar = surface.aspect_ratio();
        let mac = surface.mean_aerodynamic_chord();
        let cos_dihedral = surface.mean_cos_dihedral();

        let cla = lift_curve_slope(&ar, airfoil.kappa(), &self.op_point.mach(atm), &surface.tan_half_chord_sweep());
        let incidence = surface.mean_twist_deg().to_radians();
        let cn = &cla * (&cos_dihedral * alpha + incidence - airfoil.zero_lift_alpha_deg.to_radians());
        let qs = q * &area;
        let lift = &qs * &cn * &cos_dihedral;

        let cf = skin_friction(&self.op_point.reynolds(atm, &mac));
        let profile = 2.0 * cf * airfoil.form_factor() + airfoil.drag_bucket * (&cn - airfoil.cl_min_drag).square();
        let induced = cn.square() / (PI * &ar * oswald_efficiency(&ar));
        let drag = &qs * (profile + induced);

        let x_ac = surface.aerodynamic_center_x();
        let arm = &x_ac - &self.xyz_ref[0];
        let moment = -(&lift * &arm) + &qs * &mac * airfoil.cm0;
        let lift_slope = &qs * &cla * cos_dihedral.square() * downwash_factor;

        SurfaceLoads {
            lift,
            drag,
            moment,
            normal_coefficient: cn,
            lift_curve_slope: cla,
            lift_slope,
            aerodynamic_center_x: x_ac,
        }
    }

    /// Form drag and Munk moment plus its α-slope.
    fn body(&self, body: &BodyOfRevolution, alpha: &Expr, q: &Expr) -> (Expr, Expr, Expr) {
        let length = body.length();
        let volume = body.volume();
        let fineness = body.fineness_ratio();
        let cf = skin_friction(&self.op_point.reynolds(&self.atmosphere, &length));
        let form = 1.0 + 60.0 / fineness.powf(3.0) + &fineness / 400.0;
        let drag = q * cf * form * body.wetted_area();
        let munk_slope = q * 2.0 * (1.0 - 1.0 / &fineness) * volume;
        let moment = &munk_slope * alpha;
        (drag, moment, munk_slope)
    }

    pub fn run(&self) -> AeroResult {
        let af = self.airframe;
        let q = self.op_point.dynamic_pressure(&self.atmosphere);
        let alpha = self.op_point.alpha_deg.to_radians();

        let wing = self.surface(&af.wing, &alpha, &q, &Expr::constant(1.0));

        // Downwash from the wing at the tail.
        let wing_area = af.wing.area();
        let wing_ar = af.wing.aspect_ratio();
        let wing_cl = &wing.lift / (&q * &wing_area);
        let epsilon = 2.0 * &wing_cl / (PI * &wing_ar);
        let deps_dalpha = 2.0 * &wing.lift_curve_slope * af.wing.mean_cos_dihedral().square() / (PI * &wing_ar);

        let q_tail = &q * self.tail_efficiency;
        let tail = self.surface(&af.tail, &(&alpha - &epsilon), &q_tail, &(1.0 - deps_dalpha));

        let (pod_drag, pod_moment, pod_slope) = self.body(&af.pod, &alpha, &q);
        let (boom_drag, boom_moment, boom_slope) = self.body(&af.boom, &alpha, &q);

        let body_drag = &pod_drag + &boom_drag;
        let lift = &wing.lift + &tail.lift;
        let drag = &wing.drag + &tail.drag + &body_drag;
        let moment = &wing.moment + &tail.moment + pod_moment + boom_moment;

        let x_ref = &self.xyz_ref[0];
        let dl_dalpha = &wing.lift_slope + &tail.lift_slope;
        let dm_dalpha = -(&wing.lift_slope * (&wing.aerodynamic_center_x - x_ref))
            - &tail.lift_slope * (&tail.aerodynamic_center_x - x_ref)
            + pod_slope
            + boom_slope;
        let x_np = x_ref - &dm_dalpha / &dl_dalpha;

        let qs = &q * &wing_area;
        let qsc = &qs * af.wing.mean_aerodynamic_chord();

        AeroResult {
            cl: &lift / &qs,
            cd: &drag / &qs,
            cm: &moment / &qsc,
            cl_alpha: &dl_dalpha / &qs,
            cm_alpha: &dm_dalpha / &qsc,
            x_np,
            lift,
            drag,
            moment,
            dynamic_pressure: q,
            wing,
            tail,
            body_drag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn c(v: f64) -> Expr {
        Expr::constant(v)
    }

    #[test]
    fn lift_slope_tends_to_thin_airfoil_limit() {
        let kappa = 1.0;
        let high = lift_curve_slope(&c(1e6), kappa, &c(0.0), &c(0.0)).as_constant().unwrap();
        assert_relative_eq!(high, 2.0 * PI, epsilon = 1e-4);
        // Slender-wing limit πA/2
        let low = lift_curve_slope(&c(1e-4), kappa, &c(0.0), &c(0.0)).as_constant().unwrap();
        assert_relative_eq!(low, PI * 1e-4 / 2.0, max_relative = 1e-6);
    }

    #[test]
    fn skin_friction_matches_correlations() {
        let re = 1e5_f64;
        let cf = skin_friction(&c(re)).as_constant().unwrap();
        let expected = 0.5 * 1.328 / re.sqrt() + 0.5 * 0.074 * re.powf(-0.2);
        assert_relative_eq!(cf, expected, max_relative = 1e-12);
    }

    fn constant_airframe() -> Airframe {
        use crate::geometry::{AirframeVariables, FuselageSpec, TailSpec, WingSpec};
        Airframe::build(
            &WingSpec::default(),
            &TailSpec::default(),
            &FuselageSpec::default(),
            &AirframeVariables {
                root_chord: c(0.2),
                tail_arm: c(0.6),
                nose_radius: c(0.03),
                mid_radius: c(0.03),
                aft_radius: c(0.015),
                tail_incidence_deg: c(-3.0),
            },
        )
        .unwrap()
    }

    #[test]
    fn tail_loads_scale_with_tail_efficiency() {
        let airframe = constant_airframe();
        let run = |eta: f64| {
            let op = OperatingPoint::new(c(12.0), c(4.0));
            let cg = [c(0.05), c(0.0), c(0.0)];
            AeroBuildup::new(&airframe, op, cg, Atmosphere::default(), eta).run()
        };
        let full = run(0.9);
        let half = run(0.45);
        let value = |e: &Expr| e.as_constant().unwrap();

        assert_relative_eq!(value(&half.wing.lift), value(&full.wing.lift), max_relative = 1e-12);
        assert_relative_eq!(value(&half.tail.lift), 0.5 * value(&full.tail.lift), max_relative = 1e-12);
        assert_relative_eq!(value(&half.tail.lift_slope), 0.5 * value(&full.tail.lift_slope), max_relative = 1e-12);
    }

    #[test]
    fn oswald_is_reasonable_for_glider_aspect_ratios() {
        for ar in [6.0, 9.0, 13.0] {
            let e = oswald_efficiency(&c(ar)).as_constant().unwrap();
            assert!(e > 0.6 && e < 1.0, "e({ar}) = {e}");
        }
    }
}
