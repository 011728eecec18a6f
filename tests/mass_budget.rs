//! Mass aggregation: grouping invariance and the budget's symbolic
//! dependence on the tail arm and battery position.

use approx::assert_relative_eq;
use icarus::expr::Expr;
use icarus::mass::{MassAnchors, MassBudget, MassComponent, MassSpec, ALLOWANCE_NAME};
use icarus::problem::{Constraint, Problem};

fn at(x: f64, y: f64, z: f64) -> [Expr; 3] {
    [Expr::constant(x), Expr::constant(y), Expr::constant(z)]
}

fn num(e: &Expr) -> f64 {
    e.as_constant().expect("constant data folds to a constant")
}

fn parts() -> Vec<MassComponent> {
    vec![
        MassComponent::from_radius_of_gyration("wing", 0.20, at(0.05, 0.0, 0.0), [0.30, 0.04, 0.30]),
        MassComponent::point("motor", 0.055, at(-0.05, 0.0, 0.01)),
        MassComponent::from_radius_of_gyration("battery", 0.28, at(-0.02, 0.0, -0.01), [0.01, 0.03, 0.03]),
        MassComponent::point("avionics", 0.045, at(0.0, 0.02, 0.0)),
        MassComponent::from_radius_of_gyration("tail", 0.095, at(0.60, 0.0, 0.03), [0.10, 0.05, 0.10]),
    ]
}

fn assert_same_assembly(a: &MassComponent, b: &MassComponent) {
    assert_relative_eq!(num(&a.mass), num(&b.mass), max_relative = 1e-12);
    for axis in 0..3 {
        assert_relative_eq!(num(&a.cg[axis]), num(&b.cg[axis]), epsilon = 1e-12);
        assert_relative_eq!(num(&a.inertia[axis]), num(&b.inertia[axis]), epsilon = 1e-12);
    }
}

#[test]
fn grouping_does_not_change_the_assembly() {
    let p = parts();
    let flat = MassComponent::aggregate("flat", &p);

    // ((wing + motor) + battery) + (avionics + tail)
    let left = &(&p[0] + &p[1]) + &p[2];
    let right = &p[3] + &p[4];
    let nested = &left + &right;
    assert_same_assembly(&flat, &nested);

    // wing + (motor + (battery + (avionics + tail)))
    let mut acc = p[4].clone();
    for part in p[..4].iter().rev() {
        acc = part + &acc;
    }
    assert_same_assembly(&flat, &acc);

    // two sub-assemblies aggregated as a slice
    let fuselage = MassComponent::aggregate("fuselage", &p[1..4]);
    let grouped = MassComponent::aggregate("grouped", &[p[0].clone(), fuselage, p[4].clone()]);
    assert_same_assembly(&flat, &grouped);
}

#[test]
fn assembly_inertia_includes_parallel_axis_terms() {
    let p = parts();
    let total = MassComponent::aggregate("total", &p);
    let m: f64 = p.iter().map(|c| num(&c.mass)).sum();
    let xc: f64 = p.iter().map(|c| num(&c.mass) * num(&c.cg[0])).sum::<f64>() / m;
    let zc: f64 = p.iter().map(|c| num(&c.mass) * num(&c.cg[2])).sum::<f64>() / m;

    let iyy: f64 = p
        .iter()
        .map(|c| {
            let dx = num(&c.cg[0]) - xc;
            let dz = num(&c.cg[2]) - zc;
            num(&c.inertia[1]) + num(&c.mass) * (dx * dx + dz * dz)
        })
        .sum();
    assert_relative_eq!(num(&total.inertia[1]), iyy, max_relative = 1e-12);
    assert!(
        num(&total.inertia[1]) > p.iter().map(|c| num(&c.inertia[1])).sum::<f64>(),
        "offset parts must add parallel-axis inertia"
    );
}

#[test]
fn scaled_component_keeps_its_cg() {
    let p = parts();
    let half = p[0].scaled("half wing", 0.5);
    assert_eq!(half.name, "half wing");
    assert_relative_eq!(num(&half.mass), 0.10);
    assert_relative_eq!(num(half.x_cg()), 0.05);
    assert_relative_eq!(num(&half.inertia[0]), 0.5 * 0.20 * 0.30 * 0.30, max_relative = 1e-12);
}

/// The budget's total cg is symbolic in the tail arm; evaluate it through a
/// frozen program and compare with the hand-computed moment balance.
#[test]
fn budget_cg_tracks_the_tail_arm() {
    let mut problem = Problem::new();
    let tail_arm = problem.variable("tail_arm", 0.6, 0.45, 0.75).unwrap();
    let anchors = MassAnchors {
        tail_arm: tail_arm.clone(),
        battery_x: Expr::constant(-0.02),
    };
    let spec = MassSpec::default();
    let budget = MassBudget::build(&spec, &anchors).unwrap();
    assert!(budget.get(ALLOWANCE_NAME).is_some());
    assert_eq!(budget.components.len(), spec.components.len() + 1);

    problem.minimize(budget.total.x_cg().clone());
    problem.subject_to(Constraint::at_least("mass", budget.total.mass.clone(), 0.0));
    let program = problem.freeze().unwrap();

    for arm in [0.45, 0.6, 0.75] {
        let eval = program.evaluate(&[arm]).unwrap();

        // Structure 0.2 @ 0.05, tail 0.095 @ arm, allowance 8 % of both at their cg.
        let structural_moment = 0.2 * 0.05 + 0.095 * arm;
        let moment = 0.2 * 0.05 + 0.055 * -0.05 + 0.28 * -0.02 + 0.045 * 0.0 + 0.095 * arm
            + 0.08 * structural_moment;
        let mass = 0.675 + 0.08 * 0.295;
        assert_relative_eq!(eval.objective, moment / mass, max_relative = 1e-12);
        assert_relative_eq!(eval.residuals[0], -mass, max_relative = 1e-12);
    }

    let lin = program.linearize(&[0.6]).unwrap();
    let dcg = 0.095 * 1.08 / (0.675 + 0.08 * 0.295);
    assert_relative_eq!(lin.objective_grad[0], dcg, max_relative = 1e-10);
}
