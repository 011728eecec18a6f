//! Parametric airframe geometry: lifting surfaces built from ordered
//! cross-sections and bodies of revolution built from (x, r) stations.
//!
//! Every derived quantity (areas, chords, volumes) is an [`Expr`] computed
//! on demand from the current section data, so it stays differentiable
//! with respect to the design variables that feed the sections.

use crate::expr::Expr;
use crate::types::IcarusError;
use serde::Deserialize;
use std::f64::consts::PI;

// ─────────────────────────────────────────────────────────────
//  Airfoils
// ─────────────────────────────────────────────────────────────

/// Section properties used by the aerodynamic buildup.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Airfoil {
    pub name: String,
    /// Maximum thickness over chord.
    pub thickness_ratio: f64,
    /// Section lift-curve slope [1/rad].
    pub lift_slope: f64,
    pub zero_lift_alpha_deg: f64,
    /// Moment coefficient about the quarter chord.
    pub cm0: f64,
    /// Centre of the profile-drag bucket.
    pub cl_min_drag: f64,
    /// Quadratic growth of profile drag away from the bucket.
    pub drag_bucket: f64,
}

impl Airfoil {
    /// Selig-Donovan SD7037, a cambered low-Reynolds-number section.
    pub fn sd7037() -> Self {
        Self {
            name: "sd7037".into(),
            thickness_ratio: 0.092,
            lift_slope: 6.0,
            zero_lift_alpha_deg: -3.0,
            cm0: -0.085,
            cl_min_drag: 0.6,
            drag_bucket: 0.01,
        }
    }

    /// NACA 0008, symmetric tail section.
    pub fn naca0008() -> Self {
        Self {
            name: "naca0008".into(),
            thickness_ratio: 0.08,
            lift_slope: 6.0,
            zero_lift_alpha_deg: 0.0,
            cm0: 0.0,
            cl_min_drag: 0.0,
            drag_bucket: 0.0,
        }
    }

    /// Ratio of the section lift slope to thin-airfoil 2π.
    pub fn kappa(&self) -> f64 {
        self.lift_slope / (2.0 * PI)
    }

    /// Thickness form factor 1 + 2 t/c + 60 (t/c)^4.
    pub fn form_factor(&self) -> f64 {
        let t = self.thickness_ratio;
        1.0 + 2.0 * t + 60.0 * t.powi(4)
    }
}

// ─────────────────────────────────────────────────────────────
//  Lifting surfaces
// ─────────────────────────────────────────────────────────────

/// Rotate a point about the x axis by `angle_rad`.
pub fn rotate_about_x(p: &[Expr; 3], angle_rad: f64) -> [Expr; 3] {
    let (s, c) = angle_rad.sin_cos();
    [
        p[0].clone(),
        &p[1] * c - &p[2] * s,
        &p[1] * s + &p[2] * c,
    ]
}

#[derive(Debug, Clone)]
pub struct CrossSection {
    /// Leading-edge position.
    pub xyz_le: [Expr; 3],
    pub chord: Expr,
    /// Incidence about the leading edge, degrees.
    pub twist_deg: Expr,
    pub airfoil: Airfoil,
}

impl CrossSection {
    pub fn new(xyz_le: [Expr; 3], chord: Expr, airfoil: Airfoil) -> Self {
        Self {
            xyz_le,
            chord,
            twist_deg: Expr::constant(0.0),
            airfoil,
        }
    }

    pub fn with_twist(mut self, twist_deg: Expr) -> Self {
        self.twist_deg = twist_deg;
        self
    }
}

/// Per-panel quantities between two adjacent sections.
struct Panel {
    /// Length along the panel (in the y-z plane).
    span: Expr,
    area: Expr,
    /// ∫ c² dy over the panel.
    chord_sq: Expr,
    /// x of the panel MAC leading edge.
    x_mac_le: Expr,
    cos_dihedral: Expr,
    tan_half_chord_sweep: Expr,
    mean_twist_deg: Expr,
}

/// A wing or tail, root section first.
#[derive(Debug, Clone)]
pub struct LiftingSurface {
    pub name: String,
    /// Mirrored about the x-z plane.
    pub symmetric: bool,
    pub sections: Vec<CrossSection>,
}

impl LiftingSurface {
    pub fn new(name: &str, symmetric: bool, sections: Vec<CrossSection>) -> Result<Self, IcarusError> {
        if sections.len() < 2 {
            return Err(IcarusError::InvalidGeometry(format!(
                "lifting surface `{name}` needs at least two cross-sections, got {}",
                sections.len()
            )));
        }
        Ok(Self {
            name: name.to_string(),
            symmetric,
            sections,
        })
    }

    fn panels(&self) -> Vec<Panel> {
        self.sections
            .windows(2)
            .map(|w| {
                let (a, b) = (&w[0], &w[1]);
                let dx = &b.xyz_le[0] - &a.xyz_le[0];
                let dy = &b.xyz_le[1] - &a.xyz_le[1];
                let dz = &b.xyz_le[2] - &a.xyz_le[2];
                let span = (dy.square() + dz.square()).sqrt();
                let (c1, c2) = (&a.chord, &b.chord);
                let area = &span * (c1 + c2) * 0.5;
                let chord_sq = &span * (c1.square() + c1 * c2 + c2.square()) / 3.0;
                let frac = (c1 + 2.0 * c2) / ((c1 + c2) * 3.0);
                let x_mac_le = &a.xyz_le[0] + &dx * frac;
                let cos_dihedral = &dy / &span;
                let tan_half_chord_sweep = (&dx + (c2 - c1) * 0.5) / &span;
                let mean_twist_deg = (&a.twist_deg + &b.twist_deg) * 0.5;
                Panel {
                    span,
                    area,
                    chord_sq,
                    x_mac_le,
                    cos_dihedral,
                    tan_half_chord_sweep,
                    mean_twist_deg,
                }
            })
            .collect()
    }

    fn mirror_factor(&self) -> f64 {
        if self.symmetric {
            2.0
        } else {
            1.0
        }
    }

    /// Planform area of one side.
    fn half_area(&self) -> Expr {
        Expr::sum(self.panels().into_iter().map(|p| p.area))
    }

    /// Area-weighted average of a per-panel quantity.
    fn area_weighted(&self, f: impl Fn(&Panel) -> Expr) -> Expr {
        let panels = self.panels();
        let num = Expr::sum(panels.iter().map(|p| &p.area * f(p)));
        let den = Expr::sum(panels.into_iter().map(|p| p.area));
        num / den
    }

    /// Reference (planform) area.
    pub fn area(&self) -> Expr {
        self.half_area() * self.mirror_factor()
    }

    /// Tip-to-tip span measured along the panels.
    pub fn span(&self) -> Expr {
        Expr::sum(self.panels().into_iter().map(|p| p.span)) * self.mirror_factor()
    }

    pub fn aspect_ratio(&self) -> Expr {
        self.span().square() / self.area()
    }

    pub fn root_chord(&self) -> Expr {
        self.sections[0].chord.clone()
    }

    pub fn tip_chord(&self) -> Expr {
        self.sections[self.sections.len() - 1].chord.clone()
    }

    /// Mean aerodynamic chord.
    pub fn mean_aerodynamic_chord(&self) -> Expr {
        let panels = self.panels();
        let chord_sq = Expr::sum(panels.iter().map(|p| p.chord_sq.clone()));
        chord_sq / Expr::sum(panels.into_iter().map(|p| p.area))
    }

    /// x of the MAC leading edge.
    pub fn x_mac_le(&self) -> Expr {
        let panels = self.panels();
        let num = Expr::sum(panels.iter().map(|p| &p.chord_sq * &p.x_mac_le));
        num / Expr::sum(panels.into_iter().map(|p| p.chord_sq))
    }

    /// x of the aerodynamic centre (quarter MAC).
    pub fn aerodynamic_center_x(&self) -> Expr {
        self.x_mac_le() + self.mean_aerodynamic_chord() * 0.25
    }

    /// Area-weighted cosine of the panel dihedral.
    pub fn mean_cos_dihedral(&self) -> Expr {
        self.area_weighted(|p| p.cos_dihedral.clone())
    }

    pub fn tan_half_chord_sweep(&self) -> Expr {
        self.area_weighted(|p| p.tan_half_chord_sweep.clone())
    }

    /// Area-weighted section incidence, degrees.
    pub fn mean_twist_deg(&self) -> Expr {
        self.area_weighted(|p| p.mean_twist_deg.clone())
    }

    /// Section properties used for the whole surface.
    pub fn airfoil(&self) -> &Airfoil {
        &self.sections[0].airfoil
    }
}

// ─────────────────────────────────────────────────────────────
//  Bodies of revolution
// ─────────────────────────────────────────────────────────────

/// Axisymmetric body given as ordered (x, radius) stations.
#[derive(Debug, Clone)]
pub struct BodyOfRevolution {
    pub name: String,
    pub stations: Vec<(Expr, Expr)>,
}

impl BodyOfRevolution {
    pub fn new(name: &str, stations: Vec<(Expr, Expr)>) -> Result<Self, IcarusError> {
        if stations.len() < 2 {
            return Err(IcarusError::InvalidGeometry(format!(
                "body `{name}` needs at least two stations, got {}",
                stations.len()
            )));
        }
        Ok(Self {
            name: name.to_string(),
            stations,
        })
    }

    /// Volume by exact integration over conical frusta.
    pub fn volume(&self) -> Expr {
        Expr::sum(self.stations.windows(2).map(|w| {
            let ((x1, r1), (x2, r2)) = (&w[0], &w[1]);
            (x2 - x1) * (r1.square() + r1 * r2 + r2.square()) * (PI / 3.0)
        }))
    }

    /// Lateral surface area of the frusta.
    pub fn wetted_area(&self) -> Expr {
        Expr::sum(self.stations.windows(2).map(|w| {
            let ((x1, r1), (x2, r2)) = (&w[0], &w[1]);
            let slant = ((x2 - x1).square() + (r1 - r2).square()).sqrt();
            (r1 + r2) * slant * PI
        }))
    }

    pub fn length(&self) -> Expr {
        &self.stations[self.stations.len() - 1].0 - &self.stations[0].0
    }

    /// Diameter of the cylinder with the same length and volume.
    pub fn equivalent_diameter(&self) -> Expr {
        (self.volume() * 4.0 / (self.length() * PI)).sqrt()
    }

    pub fn fineness_ratio(&self) -> Expr {
        self.length() / self.equivalent_diameter()
    }
}

// ─────────────────────────────────────────────────────────────
//  Airframe assembly
// ─────────────────────────────────────────────────────────────

/// Fixed main-wing inputs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WingSpec {
    pub span: f64,
    pub taper_ratio: f64,
    /// Root leading-edge x.
    pub x_le: f64,
    pub sweep_le_deg: f64,
    pub airfoil: Airfoil,
}

impl Default for WingSpec {
    fn default() -> Self {
        Self {
            span: 1.5,
            taper_ratio: 0.5,
            x_le: 0.02,
            sweep_le_deg: 0.0,
            airfoil: Airfoil::sd7037(),
        }
    }
}

/// Fixed V-tail inputs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TailSpec {
    pub dihedral_deg: f64,
    /// Required horizontal projected area.
    pub projected_area: f64,
    /// Fraction of the panel area credited to pitch.
    pub sizing_factor: f64,
    pub root_chord: f64,
    pub tip_ratio: f64,
    pub airfoil: Airfoil,
    /// Dynamic-pressure ratio at the tail.
    pub efficiency: f64,
}

impl Default for TailSpec {
    fn default() -> Self {
        Self {
            dihedral_deg: 35.0,
            projected_area: 0.042,
            sizing_factor: 0.6,
            root_chord: 0.10,
            tip_ratio: 0.5,
            airfoil: Airfoil::naca0008(),
            efficiency: 0.9,
        }
    }
}

impl TailSpec {
    /// Panel length that delivers the projected area at this dihedral.
    pub fn half_span(&self) -> f64 {
        let cos = self.dihedral_deg.to_radians().cos();
        (self.projected_area / (2.0 * self.sizing_factor * cos * cos)).sqrt()
    }
}

/// Fixed pod and boom inputs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FuselageSpec {
    /// x of the nose tip, nose shoulder, mid and aft stations.
    pub pod_stations: [f64; 4],
    pub boom_radius: f64,
}

impl Default for FuselageSpec {
    fn default() -> Self {
        Self {
            pod_stations: [-0.22, -0.20, 0.02, 0.07],
            boom_radius: 0.007,
        }
    }
}

/// Design variables that shape the airframe.
#[derive(Debug, Clone)]
pub struct AirframeVariables {
    pub root_chord: Expr,
    /// x of the tail root leading edge and of the boom end.
    pub tail_arm: Expr,
    pub nose_radius: Expr,
    pub mid_radius: Expr,
    pub aft_radius: Expr,
    pub tail_incidence_deg: Expr,
}

/// Wing, V-tail, pod and boom.
#[derive(Debug, Clone)]
pub struct Airframe {
    pub wing: LiftingSurface,
    pub tail: LiftingSurface,
    pub pod: BodyOfRevolution,
    pub boom: BodyOfRevolution,
}

impl Airframe {
    pub fn build(
        wing: &WingSpec,
        tail: &TailSpec,
        fuselage: &FuselageSpec,
        vars: &AirframeVariables,
    ) -> Result<Self, IcarusError> {
        if wing.span <= 0.0 || tail.root_chord <= 0.0 || tail.tip_ratio <= 0.0 || fuselage.boom_radius <= 0.0 {
            return Err(IcarusError::InvalidGeometry(
                "fixed spans, chords and radii must be positive".into(),
            ));
        }

        let half_span = wing.span / 2.0;
        let tip_chord = &vars.root_chord * wing.taper_ratio;
        let x_tip = wing.x_le + half_span * wing.sweep_le_deg.to_radians().tan();
        let wing_surface = LiftingSurface::new(
            "Main Wing",
            true,
            vec![
                CrossSection::new(point(wing.x_le, 0.0), vars.root_chord.clone(), wing.airfoil.clone()),
                CrossSection::new(point(x_tip, half_span), tip_chord, wing.airfoil.clone()),
            ],
        )?;

        let dihedral = tail.dihedral_deg.to_radians();
        let origin = [vars.tail_arm.clone(), Expr::constant(0.0), Expr::constant(0.0)];
        let tip = [vars.tail_arm.clone(), Expr::constant(tail.half_span()), Expr::constant(0.0)];
        let tail_surface = LiftingSurface::new(
            "V-Tail",
            true,
            vec![
                CrossSection::new(rotate_about_x(&origin, dihedral), Expr::constant(tail.root_chord), tail.airfoil.clone())
                    .with_twist(vars.tail_incidence_deg.clone()),
                CrossSection::new(
                    rotate_about_x(&tip, dihedral),
                    Expr::constant(tail.root_chord * tail.tip_ratio),
                    tail.airfoil.clone(),
                )
                .with_twist(vars.tail_incidence_deg.clone()),
            ],
        )?;

        let [x0, x1, x2, x3] = fuselage.pod_stations;
        let pod = BodyOfRevolution::new(
            "Fuselage Pod",
            vec![
                (Expr::constant(x0), Expr::constant(0.0)),
                (Expr::constant(x1), vars.nose_radius.clone()),
                (Expr::constant(x2), vars.mid_radius.clone()),
                (Expr::constant(x3), vars.aft_radius.clone()),
            ],
        )?;

        let boom = BodyOfRevolution::new(
            "Tail Boom",
            vec![
                (Expr::constant(x3), Expr::constant(fuselage.boom_radius)),
                (vars.tail_arm.clone(), Expr::constant(fuselage.boom_radius)),
            ],
        )?;

        Ok(Self {
            wing: wing_surface,
            tail: tail_surface,
            pod,
            boom,
        })
    }
}

fn point(x: f64, y: f64) -> [Expr; 3] {
    [Expr::constant(x), Expr::constant(y), Expr::constant(0.0)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn c(v: f64) -> Expr {
        Expr::constant(v)
    }

    fn value(e: Expr) -> f64 {
        e.as_constant().expect("constant geometry folds to a number")
    }

    #[test]
    fn tapered_wing_reference_quantities() {
        let wing = LiftingSurface::new(
            "w",
            true,
            vec![
                CrossSection::new([c(0.0), c(0.0), c(0.0)], c(0.2), Airfoil::sd7037()),
                CrossSection::new([c(0.0), c(0.75), c(0.0)], c(0.1), Airfoil::sd7037()),
            ],
        )
        .unwrap();
        assert_relative_eq!(value(wing.area()), 0.225, epsilon = 1e-12);
        assert_relative_eq!(value(wing.span()), 1.5, epsilon = 1e-12);
        assert_relative_eq!(value(wing.aspect_ratio()), 10.0, epsilon = 1e-12);
        // MAC of a trapezoid: 2/3 c_r (1 + λ + λ²)/(1 + λ)
        assert_relative_eq!(value(wing.mean_aerodynamic_chord()), 2.0 / 3.0 * 0.2 * 1.75 / 1.5, epsilon = 1e-12);
        assert_relative_eq!(value(wing.mean_cos_dihedral()), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn cylinder_volume_and_area() {
        let body = BodyOfRevolution::new("cyl", vec![(c(0.0), c(0.1)), (c(2.0), c(0.1))]).unwrap();
        assert_relative_eq!(value(body.volume()), PI * 0.01 * 2.0, epsilon = 1e-12);
        assert_relative_eq!(value(body.wetted_area()), 2.0 * PI * 0.1 * 2.0, epsilon = 1e-12);
        assert_relative_eq!(value(body.equivalent_diameter()), 0.2, epsilon = 1e-12);
    }

    #[test]
    fn cone_volume() {
        let body = BodyOfRevolution::new("cone", vec![(c(0.0), c(0.0)), (c(3.0), c(1.0))]).unwrap();
        assert_relative_eq!(value(body.volume()), PI, epsilon = 1e-12);
    }

    #[test]
    fn v_tail_panel_keeps_its_length_after_rotation() {
        let spec = TailSpec::default();
        let p = [c(0.6), c(spec.half_span()), c(0.0)];
        let r = rotate_about_x(&p, spec.dihedral_deg.to_radians());
        let y = value(r[1].clone());
        let z = value(r[2].clone());
        assert_relative_eq!((y * y + z * z).sqrt(), spec.half_span(), epsilon = 1e-12);
        assert_relative_eq!(z.atan2(y), 35f64.to_radians(), epsilon = 1e-12);
    }

    #[test]
    fn single_section_surface_is_rejected() {
        let err = LiftingSurface::new("w", true, vec![CrossSection::new(point(0.0, 0.0), c(0.2), Airfoil::sd7037())]);
        assert!(matches!(err, Err(IcarusError::InvalidGeometry(_))));
    }
}
