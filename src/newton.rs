use crate::assemble::Assembly;
use crate::debug::{format_f64, format_f64_vec, format_rect_vec};
use crate::error::{Error, Result};
use crate::network::Network;

use full::slice::norm_inf;
use num_complex::Complex64;
use sparsetools::csc::CSC;
use spsolve::Solver;

pub trait ProgressMonitor {
    fn update(&self, i: usize, norm_f: f64);
}

/// Reports every iteration through `log::info!`.
pub struct LogProgress;

impl ProgressMonitor for LogProgress {
    fn update(&self, i: usize, norm_f: f64) {
        log::info!("{:>4}  {}", i, format_f64(norm_f));
    }
}

/// Goldstein and Price bracket constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct LineSearch {
    pub(crate) m1: f64,
    pub(crate) m2: f64,
}

const MAX_BISECTIONS: usize = 50;

fn largest(f: &[f64]) -> usize {
    f.iter()
        .enumerate()
        .fold((0, 0.0), |(k, m), (i, v)| if v.abs() > m { (i, v.abs()) } else { (k, m) })
        .0
}

/// Solves `F(x) = 0` by Newton's method on the real and imaginary parts
/// of the residual, optionally damped by a Goldstein and Price line search.
///
/// Iteration `i` evaluates the residual at the current iterate and returns
/// `i` once its infinity norm is below `tol`. `x` holds the last iterate on
/// return, whether or not the method converged.
#[allow(clippy::too_many_arguments)]
pub(crate) fn newton(
    network: &Network,
    assembly: &Assembly,
    x: &mut [Complex64],
    tol: f64,
    max_it: usize,
    line_search: Option<LineSearch>,
    solver: &dyn Solver<usize, f64>,
    progress: Option<&dyn ProgressMonitor>,
) -> Result<usize> {
    let mut i = 0;
    loop {
        i += 1;

        let eq = assembly.evaluate(network, x, true);
        let f = eq.real_residual();
        let norm_f = norm_inf(&f);
        if let Some(pm) = progress {
            pm.update(i, norm_f);
        }
        log::debug!(
            "norm_f{}: {} ({})",
            i,
            format_f64(norm_f),
            assembly.labels[largest(&f) / 2]
        );
        log::trace!("F_{}: {}", i, format_rect_vec(eq.residual()));

        if norm_f < tol {
            log::info!("Newton's method converged in {} iterations.", i);
            return Ok(i);
        }
        if i >= max_it || !norm_f.is_finite() {
            log::info!("Newton's method did not converge in {} iterations.", i);
            return Err(Error::NoConvergence {
                iterations: i,
                residual: norm_f,
            });
        }

        let jac = eq.jacobian();
        if let Some(reason) = structural_singularity(&jac, &assembly.labels) {
            log::info!("singular Jacobian at iteration {}: {}", i, reason);
            return Err(Error::SingularJacobian { iteration: i, reason });
        }

        // compute update step
        let dx = {
            let mut neg_f: Vec<f64> = f.iter().map(|f| -f).collect();
            solver
                .solve(
                    jac.cols(),
                    jac.rowidx(),
                    jac.colptr(),
                    jac.values(),
                    &mut neg_f,
                    false,
                )
                .map_err(|err| Error::SingularJacobian {
                    iteration: i,
                    reason: err.to_string(),
                })?;
            neg_f
        };
        if dx.iter().any(|v| !v.is_finite()) {
            return Err(Error::SingularJacobian {
                iteration: i,
                reason: "the Newton step is not finite".to_string(),
            });
        }
        log::trace!("dx: {}", format_f64_vec(&dx));

        let t = match line_search {
            Some(ls) => goldstein_price(network, assembly, x, &f, &dx, ls),
            None => 1.0,
        };
        step(x, &dx, t);
    }
}

/// Names the unknown or the equation behind an empty column or row of the
/// real Jacobian. The direct solver is only called on matrices without one.
fn structural_singularity(jac: &CSC<usize, f64>, labels: &[String]) -> Option<String> {
    let colptr = jac.colptr();
    if let Some(j) = (0..jac.cols()).find(|&j| colptr[j] == colptr[j + 1]) {
        return Some(format!("no equation depends on {}", labels[j / 2]));
    }
    let mut touched = vec![false; jac.rows()];
    for &i in jac.rowidx() {
        touched[i] = true;
    }
    touched
        .iter()
        .position(|t| !t)
        .map(|i| format!("the equation of {} is empty", labels[i / 2]))
}

fn step(x: &mut [Complex64], dx: &[f64], t: f64) {
    for (k, v) in x.iter_mut().enumerate() {
        *v += t * Complex64::new(dx[2 * k], dx[2 * k + 1]);
    }
}

fn half_square_norm(f: &[f64]) -> f64 {
    0.5 * f.iter().map(|v| v * v).sum::<f64>()
}

/// Step length `t` in `(0, 1]` along the Newton direction `dx` such that
///
/// ```text
/// m2 q'(0) <= (q(t) - q(0)) / t <= m1 q'(0)
/// ```
///
/// with `q(t) = ½‖F(x + t dx)‖²`. Along a Newton direction
/// `q'(0) = -‖F(x)‖²`.
fn goldstein_price(
    network: &Network,
    assembly: &Assembly,
    x: &[Complex64],
    f: &[f64],
    dx: &[f64],
    ls: LineSearch,
) -> f64 {
    let q0 = half_square_norm(f);
    let dq0 = -2.0 * q0;

    let (mut lo, mut hi) = (0.0, 1.0);
    let mut t = 1.0;
    for _ in 0..MAX_BISECTIONS {
        let mut trial = x.to_vec();
        step(&mut trial, dx, t);
        let qt = half_square_norm(&assembly.evaluate(network, &trial, false).real_residual());
        let slope = (qt - q0) / t;

        if !slope.is_finite() || slope > ls.m1 * dq0 {
            // not enough decrease
            hi = t;
        } else if slope < ls.m2 * dq0 && t < 1.0 {
            // step too short
            lo = t;
        } else {
            break;
        }
        t = 0.5 * (lo + hi);
    }
    log::debug!("line search step: {}", format_f64(t));
    t
}
