use crate::assemble::Equations;
use crate::flexible::{power_and_derivative, FlexibleParameter};
use crate::math::J;
use crate::network::BusId;
use crate::phase::{has_neutral, Phase};
use num_complex::Complex64;
use num_traits::Zero;

/// Load model, one value per branch. A star load has one branch per
/// live phase (phase to neutral). A delta load has one branch per pair of
/// consecutive phases: `ab, bc, ca` for three phases, `ab` for two.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadKind {
    Impedance(Vec<Complex64>),
    Current(Vec<Complex64>),
    Power(Vec<Complex64>),
    Flexible {
        powers: Vec<Complex64>,
        parameters: Vec<FlexibleParameter>,
    },
}

impl LoadKind {
    pub fn len(&self) -> usize {
        match self {
            LoadKind::Impedance(v) | LoadKind::Current(v) | LoadKind::Power(v) => v.len(),
            LoadKind::Flexible { powers, .. } => powers.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn name(&self) -> &'static str {
        match self {
            LoadKind::Impedance(_) => "impedance",
            LoadKind::Current(_) => "current",
            LoadKind::Power(_) => "power",
            LoadKind::Flexible { .. } => "flexible",
        }
    }

    pub(crate) fn validate(&self, branches: usize) -> Result<(), String> {
        if self.len() != branches {
            return Err(format!(
                "{} {} values given for {} branches",
                self.len(),
                self.name(),
                branches
            ));
        }
        match self {
            LoadKind::Impedance(z) => {
                if z.iter().any(|z| z.is_zero() || !z.is_finite()) {
                    return Err("impedances must be finite and non-zero".to_string());
                }
            }
            LoadKind::Flexible { parameters, .. } => {
                if parameters.len() != branches {
                    return Err(format!(
                        "{} flexible parameters given for {} branches",
                        parameters.len(),
                        branches
                    ));
                }
                for p in parameters {
                    p.validate()?;
                }
            }
            LoadKind::Current(_) | LoadKind::Power(_) => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Load {
    pub id: String,
    pub bus: BusId,
    /// Includes `n` for a star connection, even when the bus has no
    /// neutral (the load neutral then floats).
    pub phases: Vec<Phase>,
    pub kind: LoadKind,
}

impl Load {
    pub fn is_star(&self) -> bool {
        has_neutral(&self.phases)
    }
}

/// Branches of a star or delta connection as pairs of positions in
/// `phases`.
pub(crate) fn branches(phases: &[Phase]) -> Vec<(usize, usize)> {
    if let Some(n) = phases.iter().position(|p| p.is_neutral()) {
        (0..phases.len()).filter(|&i| i != n).map(|i| (i, n)).collect()
    } else if phases.len() == 3 {
        vec![(0, 1), (1, 2), (2, 0)]
    } else if phases.len() == 2 {
        vec![(0, 1)]
    } else {
        Vec::new()
    }
}

/// Current through a branch as a function of its voltage `v`, with the
/// partial derivatives with respect to `Re(v)` and `Im(v)`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BranchCurrent {
    pub(crate) current: Complex64,
    pub(crate) d_re: Complex64,
    pub(crate) d_im: Complex64,
}

impl BranchCurrent {
    fn zero() -> Self {
        BranchCurrent {
            current: Complex64::zero(),
            d_re: Complex64::zero(),
            d_im: Complex64::zero(),
        }
    }
}

pub(crate) fn impedance_current(z: Complex64, v: Complex64) -> BranchCurrent {
    let y = 1.0 / z;
    BranchCurrent {
        current: y * v,
        d_re: y,
        d_im: J * y,
    }
}

/// `I = I0 · v / |v|`
pub(crate) fn constant_current(i0: Complex64, v: Complex64) -> BranchCurrent {
    let u = v.norm();
    if u == 0.0 {
        return BranchCurrent::zero();
    }
    let u3 = u * u * u;
    BranchCurrent {
        current: i0 * v / u,
        d_re: i0 * (1.0 / u - v * v.re / u3),
        d_im: i0 * (J / u - v * v.im / u3),
    }
}

/// `I = conj(S / v)`, with `S` depending on `|v|` at rate `ds_du`.
pub(crate) fn power_current(s: Complex64, ds_du: Complex64, v: Complex64) -> BranchCurrent {
    let u = v.norm();
    if u == 0.0 {
        return BranchCurrent::zero();
    }
    let vc = v.conj();
    let base = s.conj() / (vc * vc);
    let du = ds_du.conj() / vc;
    BranchCurrent {
        current: s.conj() / vc,
        d_re: -base + du * (v.re / u),
        d_im: J * base + du * (v.im / u),
    }
}

/// Current drawn by branch `k` of `kind` at branch voltage `v`, and the
/// power realized by a flexible branch.
pub(crate) fn branch_current(kind: &LoadKind, k: usize, v: Complex64) -> (BranchCurrent, Complex64) {
    match kind {
        LoadKind::Impedance(z) => {
            let bc = impedance_current(z[k], v);
            (bc, v * bc.current.conj())
        }
        LoadKind::Current(i) => {
            let bc = constant_current(i[k], v);
            (bc, v * bc.current.conj())
        }
        LoadKind::Power(s) => (power_current(s[k], Complex64::zero(), v), s[k]),
        LoadKind::Flexible { powers, parameters } => {
            let (s, ds) = power_and_derivative(v.norm(), powers[k], &parameters[k]);
            (power_current(s, ds, v), s)
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct LoadStamp {
    /// Node of every load phase, the floating neutral included.
    pub(crate) terminals: Vec<usize>,
    pub(crate) branches: Vec<(usize, usize)>,
}

impl LoadStamp {
    pub(crate) fn stamp(&self, load: &Load, x: &[Complex64], eq: &mut Equations) {
        for (k, &(from, to)) in self.branches.iter().enumerate() {
            let (nf, nt) = (self.terminals[from], self.terminals[to]);
            let (bc, _) = branch_current(&load.kind, k, x[nf] - x[nt]);

            eq.add(nf, bc.current);
            eq.add(nt, -bc.current);

            eq.partials(nf, nf, bc.d_re, bc.d_im);
            eq.partials(nf, nt, -bc.d_re, -bc.d_im);
            eq.partials(nt, nf, -bc.d_re, -bc.d_im);
            eq.partials(nt, nt, bc.d_re, bc.d_im);
        }
    }

    /// Current into the load at each terminal and the branch voltages,
    /// currents and powers.
    pub(crate) fn evaluate(&self, load: &Load, x: &[Complex64]) -> LoadState {
        let mut state = LoadState {
            terminal_currents: vec![Complex64::zero(); self.terminals.len()],
            branch_voltages: Vec::with_capacity(self.branches.len()),
            branch_currents: Vec::with_capacity(self.branches.len()),
            branch_powers: Vec::with_capacity(self.branches.len()),
        };
        for (k, &(from, to)) in self.branches.iter().enumerate() {
            let v = x[self.terminals[from]] - x[self.terminals[to]];
            let (bc, s) = branch_current(&load.kind, k, v);
            state.terminal_currents[from] += bc.current;
            state.terminal_currents[to] -= bc.current;
            state.branch_voltages.push(v);
            state.branch_currents.push(bc.current);
            state.branch_powers.push(s);
        }
        state
    }
}

pub(crate) struct LoadState {
    pub(crate) terminal_currents: Vec<Complex64>,
    pub(crate) branch_voltages: Vec<Complex64>,
    pub(crate) branch_currents: Vec<Complex64>,
    /// Power requested by each branch (the realized power for flexible
    /// branches).
    pub(crate) branch_powers: Vec<Complex64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmplx;
    use crate::flexible::FlexibleParameter;
    use crate::phase::phases;
    use anyhow::{format_err, Result};

    fn check_partials(f: impl Fn(Complex64) -> BranchCurrent, v: Complex64) -> Result<()> {
        let h = 1e-6;
        let bc = f(v);
        let d_re = (f(v + h).current - f(v - h).current) / (2.0 * h);
        let d_im = (f(v + J * h).current - f(v - J * h).current) / (2.0 * h);
        let tol = 1e-6 * (1.0 + d_re.norm() + d_im.norm());
        if (bc.d_re - d_re).norm() > tol || (bc.d_im - d_im).norm() > tol {
            return Err(format_err!(
                "analytic ({}, {}) != numeric ({}, {})",
                bc.d_re,
                bc.d_im,
                d_re,
                d_im
            ));
        }
        Ok(())
    }

    #[test]
    fn partial_derivatives() -> Result<()> {
        let v = cmplx!(200.0, -90.0);
        check_partials(|v| impedance_current(cmplx!(10.0, 3.0), v), v)?;
        check_partials(|v| constant_current(cmplx!(5.0, -1.0), v), v)?;
        check_partials(|v| power_current(cmplx!(4000.0, 1200.0), cmplx!(), v), v)?;

        let parameter = FlexibleParameter::pq_u_production(210.0, 230.0, 180.0, 200.0, 215.0, 240.0, 5000.0);
        let parameter = FlexibleParameter {
            control_p: parameter.control_p.with_alpha(8.0),
            control_q: parameter.control_q.with_alpha(8.0),
            ..parameter
        };
        let kind = LoadKind::Flexible {
            powers: vec![cmplx!(-4500.0, 0.0)],
            parameters: vec![parameter],
        };
        check_partials(|v| branch_current(&kind, 0, v).0, v)?;
        Ok(())
    }

    #[test]
    fn power_load_draws_requested_power() {
        let s = cmplx!(5000.0, -1500.0);
        let v = cmplx!(215.0, -12.0);
        let bc = power_current(s, cmplx!(), v);
        assert!((v * bc.current.conj() - s).norm() < 1e-9);
    }

    #[test]
    fn star_and_delta_branches() {
        assert_eq!(branches(&phases("abcn").unwrap()), vec![(0, 3), (1, 3), (2, 3)]);
        assert_eq!(branches(&phases("bn").unwrap()), vec![(0, 1)]);
        assert_eq!(branches(&phases("abc").unwrap()), vec![(0, 1), (1, 2), (2, 0)]);
        assert_eq!(branches(&phases("ca").unwrap()), vec![(0, 1)]);
    }

    #[test]
    fn validation_counts_branches() {
        let kind = LoadKind::Power(vec![cmplx!(1.0); 2]);
        assert!(kind.validate(3).is_err());
        assert!(kind.validate(2).is_ok());
        assert!(LoadKind::Impedance(vec![cmplx!()]).validate(1).is_err());
    }
}
