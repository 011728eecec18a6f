//! Finite-difference checks of the forward-mode Jacobian.
//!
//! `Program::linearize` is evaluated at a point and every entry of the
//! objective gradient and the scaled constraint Jacobian is compared against
//! a central-difference estimate of `Program::evaluate`:
//!
//!     ∂r_k/∂x_i  ≈  [ r_k(x + h_i eᵢ) − r_k(x − h_i eᵢ) ] / 2h_i
//!
//! The step is proportional to each variable's bound range, since the design
//! variables span four orders of magnitude (radii in metres, speed in m/s).

use icarus::config::{Bounds, DesignConfig};
use icarus::design::AircraftDesign;
use icarus::problem::{Constraint, Problem, Program};

// ─────────────────────────────────────────────────────────────
//  Helpers
// ─────────────────────────────────────────────────────────────

/// Row 0 is the objective, rows 1.. are the constraint residuals.
fn stacked(program: &Program, x: &[f64]) -> Vec<f64> {
    let eval = program.evaluate(x).unwrap();
    std::iter::once(eval.objective).chain(eval.residuals).collect()
}

fn row_label(program: &Program, k: usize) -> String {
    if k == 0 {
        "objective".to_string()
    } else {
        program.constraints()[k - 1].name.clone()
    }
}

/// Central-difference Jacobian check.
fn fd_jacobian_check(program: &Program, x: &[f64], rel_step: f64, tol_abs: f64, tol_rel: f64) {
    let n = x.len();
    let lin = program.linearize(x).unwrap();
    let rows = 1 + program.constraints().len();

    let analytic = |k: usize, i: usize| {
        if k == 0 {
            lin.objective_grad[i]
        } else {
            lin.residual_jacobian[[k - 1, i]]
        }
    };

    let mut fd = vec![vec![0.0; n]; rows];
    let mut x_plus = x.to_vec();
    let mut x_minus = x.to_vec();
    for i in 0..n {
        let h = rel_step * program.variables()[i].range();
        x_plus[i] = x[i] + h;
        x_minus[i] = x[i] - h;

        let f_plus = stacked(program, &x_plus);
        let f_minus = stacked(program, &x_minus);
        for k in 0..rows {
            fd[k][i] = (f_plus[k] - f_minus[k]) / (2.0 * h);
        }

        x_plus[i] = x[i];
        x_minus[i] = x[i];
    }

    let mut max_abs = 0.0_f64;
    let mut max_rel = 0.0_f64;
    let mut worst = (0, 0);
    for k in 0..rows {
        for i in 0..n {
            let abs_err = (analytic(k, i) - fd[k][i]).abs();
            let denom = fd[k][i].abs().max(analytic(k, i).abs()).max(1e-14);
            if abs_err > max_abs {
                max_abs = abs_err;
                worst = (k, i);
            }
            max_rel = max_rel.max(abs_err / denom);
        }
    }

    eprintln!("──────────────────────────────────────────────");
    eprintln!("FD Jacobian check  (h = {rel_step:.1e} × range)");
    eprintln!(
        "  max |J_a - J_fd|  = {max_abs:.3e}  at {} / {}",
        row_label(program, worst.0),
        program.variables()[worst.1].name
    );
    eprintln!("  max relative err  = {max_rel:.3e}");
    eprintln!("──────────────────────────────────────────────");

    for k in 0..rows {
        for i in 0..n {
            let abs_err = (analytic(k, i) - fd[k][i]).abs();
            let denom = fd[k][i].abs().max(analytic(k, i).abs()).max(1e-14);
            let rel_err = abs_err / denom;
            assert!(
                abs_err < tol_abs || rel_err < tol_rel,
                "∂{}/∂{}: analytic={:.8e}, fd={:.8e}, abs_err={:.3e}, rel_err={:.3e}",
                row_label(program, k),
                program.variables()[i].name,
                analytic(k, i),
                fd[k][i],
                abs_err,
                rel_err,
            );
        }
    }
}

/// Point at a fixed fraction of every variable's range.
fn interior_point(program: &Program, fraction: f64) -> Vec<f64> {
    program
        .variables()
        .iter()
        .map(|v| v.lower + fraction * v.range())
        .collect()
}

// ─────────────────────────────────────────────────────────────
//  Tests
// ─────────────────────────────────────────────────────────────

#[test]
fn fd_jacobian_baseline_initial_guess() {
    let design = AircraftDesign::build(&DesignConfig::baseline()).unwrap();
    let program = design.program();
    let x0 = program.initial_point();
    fd_jacobian_check(program, &x0, 1e-6, 1e-6, 1e-5);
}

#[test]
fn fd_jacobian_baseline_off_centre() {
    let design = AircraftDesign::build(&DesignConfig::baseline()).unwrap();
    let program = design.program();
    fd_jacobian_check(program, &interior_point(program, 0.3), 1e-6, 1e-6, 1e-5);
    fd_jacobian_check(program, &interior_point(program, 0.7), 1e-6, 1e-6, 1e-5);
}

#[test]
fn fd_jacobian_with_battery_position_free() {
    let mut cfg = DesignConfig::baseline();
    cfg.variables.battery_x = Some(Bounds::new(-0.02, -0.15, 0.05));
    let design = AircraftDesign::build(&cfg).unwrap();
    let program = design.program();
    assert_eq!(program.variables().len(), 9);
    fd_jacobian_check(program, &program.initial_point(), 1e-6, 1e-6, 1e-5);
}

/// Every elementary operation the model builder can emit, in one graph.
#[test]
fn fd_jacobian_elementary_operations() {
    let mut problem = Problem::new();
    let x = problem.variable("x", 0.7, 0.1, 1.2).unwrap();
    let y = problem.variable("y", 1.3, 0.5, 2.0).unwrap();

    problem.minimize((&x * &y).sin() + (&x / &y).exp() + y.ln() * x.sqrt());
    problem.subject_to(Constraint::at_least("trig", x.cos() + x.tan() + (&y * 0.5).atan(), 0.0));
    problem.subject_to(Constraint::at_most("powers", x.powf(1.7) + y.powf(-0.5) - x.tanh(), 1.0).scaled(2.0));
    problem.subject_to(Constraint::equal("neg", -(&x - &y).square() + 3.0 / &y, 1.0));

    let program = problem.freeze().unwrap();
    fd_jacobian_check(&program, &program.initial_point(), 1e-6, 1e-8, 1e-6);
    fd_jacobian_check(&program, &[0.25, 1.9], 1e-6, 1e-8, 1e-6);
}
