//! Mass properties and the aircraft mass budget.
//!
//! A [`MassComponent`] carries mass, centre of gravity and the diagonal of
//! its inertia tensor about its own cg.  Components combine by mass-weighted
//! superposition with the parallel-axis theorem, which makes aggregation
//! associative: any grouping of the same parts gives the same assembly.

use crate::expr::Expr;
use crate::types::IcarusError;
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct MassComponent {
    pub name: String,
    pub mass: Expr,
    pub cg: [Expr; 3],
    /// Ixx, Iyy, Izz about the component's own cg.
    pub inertia: [Expr; 3],
}

impl MassComponent {
    /// A point mass.
    pub fn point(name: &str, mass: f64, cg: [Expr; 3]) -> Self {
        Self::from_radius_of_gyration(name, mass, cg, [0.0; 3])
    }

    /// Inertia from per-axis radii of gyration, I = m k².
    pub fn from_radius_of_gyration(name: &str, mass: f64, cg: [Expr; 3], gyration: [f64; 3]) -> Self {
        Self {
            name: name.to_string(),
            mass: Expr::constant(mass),
            cg,
            inertia: gyration.map(|k| Expr::constant(mass * k * k)),
        }
    }

    pub fn x_cg(&self) -> &Expr {
        &self.cg[0]
    }

    /// Same cg, mass and inertia multiplied by `factor`.
    pub fn scaled(&self, name: &str, factor: f64) -> Self {
        Self {
            name: name.to_string(),
            mass: &self.mass * factor,
            cg: self.cg.clone(),
            inertia: self.inertia.clone().map(|i| i * factor),
        }
    }

    /// Combine any number of components into one assembly.
    ///
    /// cg = Σ mᵢ rᵢ / Σ mᵢ, and each inertia term picks up mᵢ d² for the
    /// offset of rᵢ from the assembly cg in the two perpendicular axes.
    pub fn aggregate(name: &str, parts: &[MassComponent]) -> Self {
        let mass = Expr::sum(parts.iter().map(|p| p.mass.clone()));
        let cg: [Expr; 3] = std::array::from_fn(|axis| {
            Expr::sum(parts.iter().map(|p| &p.mass * &p.cg[axis])) / &mass
        });
        let inertia: [Expr; 3] = std::array::from_fn(|axis| {
            let (a, b) = ((axis + 1) % 3, (axis + 2) % 3);
            Expr::sum(parts.iter().map(|p| {
                let da = &p.cg[a] - &cg[a];
                let db = &p.cg[b] - &cg[b];
                &p.inertia[axis] + &p.mass * (da.square() + db.square())
            }))
        });
        Self {
            name: name.to_string(),
            mass,
            cg,
            inertia,
        }
    }

    pub fn combine(&self, other: &MassComponent) -> Self {
        Self::aggregate(
            &format!("{} + {}", self.name, other.name),
            &[self.clone(), other.clone()],
        )
    }
}

impl std::ops::Add for &MassComponent {
    type Output = MassComponent;
    fn add(self, rhs: &MassComponent) -> MassComponent {
        self.combine(rhs)
    }
}

// ─────────────────────────────────────────────────────────────
//  Budget definition
// ─────────────────────────────────────────────────────────────

/// Where a component's cg sits along the fuselage axis.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CgAnchor {
    /// Fixed x coordinate.
    Fixed(f64),
    /// Follows the tail-arm design variable.
    TailArm,
    /// Follows the battery-bay position (fixed or variable).
    BatteryBay,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MassItem {
    pub name: String,
    pub mass: f64,
    pub cg: CgAnchor,
    /// Radii of gyration about x, y, z.
    #[serde(default)]
    pub gyration: [f64; 3],
    /// Counts toward the assembly-allowance base.
    #[serde(default)]
    pub structural: bool,
}

impl MassItem {
    fn new(name: &str, mass: f64, cg: CgAnchor, structural: bool) -> Self {
        Self {
            name: name.to_string(),
            mass,
            cg,
            gyration: [0.0; 3],
            structural,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MassSpec {
    pub components: Vec<MassItem>,
    /// Allowance for glue and fasteners as a fraction of structural mass.
    pub allowance_fraction: f64,
}

impl Default for MassSpec {
    fn default() -> Self {
        Self {
            components: vec![
                MassItem::new("Structure", 0.200, CgAnchor::Fixed(0.05), true),
                MassItem::new("Motor + Mount", 0.055, CgAnchor::Fixed(-0.05), false),
                MassItem::new("Battery", 0.280, CgAnchor::BatteryBay, false),
                MassItem::new("Electronics", 0.045, CgAnchor::Fixed(0.00), false),
                MassItem::new("Tail & Boom", 0.095, CgAnchor::TailArm, true),
            ],
            allowance_fraction: 0.08,
        }
    }
}

/// Symbolic positions that mass anchors resolve to.
#[derive(Debug, Clone)]
pub struct MassAnchors {
    pub tail_arm: Expr,
    pub battery_x: Expr,
}

pub const ALLOWANCE_NAME: &str = "Assembly Allowance";

/// Named components plus the assembled total.
#[derive(Debug, Clone)]
pub struct MassBudget {
    pub components: Vec<MassComponent>,
    pub total: MassComponent,
}

impl MassBudget {
    pub fn build(spec: &MassSpec, anchors: &MassAnchors) -> Result<Self, IcarusError> {
        if spec.components.is_empty() {
            return Err(IcarusError::Config("mass budget has no components".into()));
        }
        let mut components = Vec::with_capacity(spec.components.len() + 1);
        let mut structural = Vec::new();
        for item in &spec.components {
            if !(item.mass > 0.0) {
                return Err(IcarusError::Config(format!(
                    "component `{}` must have positive mass, got {}",
                    item.name, item.mass
                )));
            }
            let x = match &item.cg {
                CgAnchor::Fixed(x) => Expr::constant(*x),
                CgAnchor::TailArm => anchors.tail_arm.clone(),
                CgAnchor::BatteryBay => anchors.battery_x.clone(),
            };
            let cg = [x, Expr::constant(0.0), Expr::constant(0.0)];
            let component = MassComponent::from_radius_of_gyration(&item.name, item.mass, cg, item.gyration);
            if item.structural {
                structural.push(component.clone());
            }
            components.push(component);
        }

        if spec.allowance_fraction > 0.0 && !structural.is_empty() {
            let base = MassComponent::aggregate("structural", &structural);
            components.push(base.scaled(ALLOWANCE_NAME, spec.allowance_fraction));
        }

        let total = MassComponent::aggregate("Total", &components);
        Ok(Self { components, total })
    }

    pub fn get(&self, name: &str) -> Option<&MassComponent> {
        self.components.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn at(x: f64) -> [Expr; 3] {
        [Expr::constant(x), Expr::constant(0.0), Expr::constant(0.0)]
    }

    fn num(e: &Expr) -> f64 {
        e.as_constant().expect("constant mass data folds")
    }

    #[test]
    fn two_point_masses_balance_between_them() {
        let a = MassComponent::point("a", 1.0, at(0.0));
        let b = MassComponent::point("b", 3.0, at(4.0));
        let ab = &a + &b;
        assert_relative_eq!(num(&ab.mass), 4.0);
        assert_relative_eq!(num(ab.x_cg()), 3.0);
        // parallel axis about y: 1·3² + 3·1²
        assert_relative_eq!(num(&ab.inertia[1]), 12.0, epsilon = 1e-12);
        assert_relative_eq!(num(&ab.inertia[0]), 0.0);
    }

    #[test]
    fn allowance_sits_at_structural_cg() {
        let anchors = MassAnchors {
            tail_arm: Expr::constant(0.6),
            battery_x: Expr::constant(-0.02),
        };
        let budget = MassBudget::build(&MassSpec::default(), &anchors).unwrap();
        let glue = budget.get(ALLOWANCE_NAME).unwrap();
        assert_relative_eq!(num(&glue.mass), 0.08 * 0.295, epsilon = 1e-12);
        assert_relative_eq!(num(glue.x_cg()), (0.2 * 0.05 + 0.095 * 0.6) / 0.295, epsilon = 1e-12);
        assert_relative_eq!(num(&budget.total.mass), 0.675 + 0.0236, epsilon = 1e-12);
    }

    #[test]
    fn non_positive_mass_is_rejected() {
        let mut spec = MassSpec::default();
        spec.components[0].mass = 0.0;
        let anchors = MassAnchors {
            tail_arm: Expr::constant(0.6),
            battery_x: Expr::constant(0.0),
        };
        assert!(matches!(MassBudget::build(&spec, &anchors), Err(IcarusError::Config(_))));
    }
}
