use crate::assemble::{Equations, ONE};
use crate::dense::CMatrix;
use crate::error::{Error, Result};
use crate::math::J;
use crate::network::BusId;
use crate::phase::{phase_code, Phase};
use num_complex::Complex64;
use num_traits::Zero;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HvWinding {
    D,
    Y,
    YN,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LvWinding {
    D,
    Y,
    YN,
    Z,
    ZN,
}

/// Winding arrangement of a transformer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorGroup {
    /// `Ii0` or `Ii6`.
    SinglePhase { clock: u8 },
    /// `Iii0`: one primary winding, two secondary half windings around a
    /// neutral.
    CenterTapped,
    ThreePhase {
        hv: HvWinding,
        lv: LvWinding,
        clock: u8,
    },
}

impl FromStr for VectorGroup {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidParameter {
            element: s.to_string(),
            reason: reason.to_string(),
        };
        match s {
            "Ii0" => return Ok(VectorGroup::SinglePhase { clock: 0 }),
            "Ii6" => return Ok(VectorGroup::SinglePhase { clock: 6 }),
            "Iii0" => return Ok(VectorGroup::CenterTapped),
            _ => {}
        }
        let split = s
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| invalid("missing clock number"))?;
        let (windings, clock) = s.split_at(split);
        let clock: u8 = clock.parse().map_err(|_| invalid("bad clock number"))?;
        let (hv, lv) = if let Some(lv) = windings.strip_prefix("YN") {
            (HvWinding::YN, lv)
        } else if let Some(lv) = windings.strip_prefix('Y') {
            (HvWinding::Y, lv)
        } else if let Some(lv) = windings.strip_prefix('D') {
            (HvWinding::D, lv)
        } else {
            return Err(invalid("unknown HV winding"));
        };
        let lv = match lv {
            "d" => LvWinding::D,
            "y" => LvWinding::Y,
            "yn" => LvWinding::YN,
            "z" => LvWinding::Z,
            "zn" => LvWinding::ZN,
            _ => return Err(invalid("unknown LV winding")),
        };
        let hv_delta = hv == HvWinding::D;
        let clocks: [u8; 2] = match lv {
            LvWinding::D if hv_delta => [0, 6],
            LvWinding::D => [5, 11],
            LvWinding::Y | LvWinding::YN if hv_delta => [5, 11],
            LvWinding::Y | LvWinding::YN => [0, 6],
            LvWinding::Z | LvWinding::ZN if hv_delta => [0, 6],
            LvWinding::Z | LvWinding::ZN => [5, 11],
        };
        if !clocks.contains(&clock) {
            return Err(invalid("unsupported clock number for these windings"));
        }
        Ok(VectorGroup::ThreePhase { hv, lv, clock })
    }
}

impl fmt::Display for VectorGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VectorGroup::SinglePhase { clock } => write!(f, "Ii{}", clock),
            VectorGroup::CenterTapped => write!(f, "Iii0"),
            VectorGroup::ThreePhase { hv, lv, clock } => {
                let hv = match hv {
                    HvWinding::D => "D",
                    HvWinding::Y => "Y",
                    HvWinding::YN => "YN",
                };
                let lv = match lv {
                    LvWinding::D => "d",
                    LvWinding::Y => "y",
                    LvWinding::YN => "yn",
                    LvWinding::Z => "z",
                    LvWinding::ZN => "zn",
                };
                write!(f, "{}{}{}", hv, lv, clock)
            }
        }
    }
}

impl VectorGroup {
    /// Count and rated voltage of the primary windings, then of the
    /// secondary paths, for nominal phase-to-phase voltages `uhv` and `ulv`.
    fn rated_windings(&self, uhv: f64, ulv: f64) -> ((f64, f64), (f64, f64)) {
        let sqrt3 = 3f64.sqrt();
        match *self {
            VectorGroup::SinglePhase { .. } => ((1.0, uhv), (1.0, ulv)),
            VectorGroup::CenterTapped => ((1.0, uhv), (2.0, ulv / 2.0)),
            VectorGroup::ThreePhase { hv, lv, .. } => {
                let u1 = match hv {
                    HvWinding::D => uhv,
                    HvWinding::Y | HvWinding::YN => uhv / sqrt3,
                };
                // A zigzag path joins two half windings between a phase
                // terminal and the star point.
                let u2 = match lv {
                    LvWinding::D => ulv,
                    LvWinding::Y | LvWinding::YN | LvWinding::Z | LvWinding::ZN => ulv / sqrt3,
                };
                ((3.0, u1), (3.0, u2))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformerParameters {
    pub id: String,
    pub vector_group: VectorGroup,
    /// Nominal phase-to-phase voltages (V).
    pub uhv: f64,
    pub ulv: f64,
    /// Series impedance seen from each secondary winding (ohm).
    pub z2: Complex64,
    /// Magnetizing admittance of each primary winding (S).
    pub ym: Complex64,
}

impl TransformerParameters {
    pub fn new(
        id: &str,
        vector_group: &str,
        uhv: f64,
        ulv: f64,
        z2: Complex64,
        ym: Complex64,
    ) -> Result<Self> {
        let vector_group = vector_group.parse()?;
        if !(uhv > 0.0 && ulv > 0.0) {
            return Err(Error::InvalidParameter {
                element: id.to_string(),
                reason: format!("nominal voltages must be positive ({}, {})", uhv, ulv),
            });
        }
        Ok(TransformerParameters {
            id: id.to_string(),
            vector_group,
            uhv,
            ulv,
            z2,
            ym,
        })
    }

    /// Parameters from open-circuit and short-circuit test results.
    ///
    /// `sn` is the nominal power (VA), `i0` the no-load current and `vsc`
    /// the short-circuit voltage (both per unit), `p0` the no-load losses
    /// and `psc` the short-circuit losses (W).
    #[allow(clippy::too_many_arguments)]
    pub fn from_tests(
        id: &str,
        vector_group: &str,
        sn: f64,
        uhv: f64,
        ulv: f64,
        i0: f64,
        p0: f64,
        psc: f64,
        vsc: f64,
    ) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidParameter {
            element: id.to_string(),
            reason,
        };
        if !(sn > 0.0) {
            return Err(invalid(format!("nominal power must be positive, got {}", sn)));
        }
        let group: VectorGroup = vector_group.parse()?;
        let ((n1, u1), (n2, u2)) = group.rated_windings(uhv, ulv);

        // Open-circuit test, shared by the primary windings.
        let s0 = i0 * sn;
        if s0 < p0 || p0 < 0.0 {
            return Err(invalid(format!(
                "no-load losses {} W exceed the no-load apparent power {} VA",
                p0, s0
            )));
        }
        let base1 = n1 * u1 * u1;
        let ym = Complex64::new(p0 / base1, -(s0 * s0 - p0 * p0).sqrt() / base1);

        // Short-circuit test, at rated current in every secondary path.
        let base2 = n2 * u2 * u2 / sn;
        let r2 = psc * base2 / sn;
        let z2_norm = vsc * base2;
        if z2_norm < r2 || psc < 0.0 {
            return Err(invalid(format!(
                "short-circuit losses {} W exceed the short-circuit apparent power {} VA",
                psc,
                vsc * sn
            )));
        }
        let z2 = r2 + J * (z2_norm * z2_norm - r2 * r2).sqrt();

        Self::new(id, vector_group, uhv, ulv, z2, ym)
    }

    /// Nominal ratio between a secondary path EMF and the primary winding
    /// voltages driving it.
    pub fn ratio(&self) -> f64 {
        match self.vector_group {
            VectorGroup::SinglePhase { .. } => self.ulv / self.uhv,
            VectorGroup::CenterTapped => self.ulv / (2.0 * self.uhv),
            VectorGroup::ThreePhase { hv, lv, .. } => {
                let winding_hv = match hv {
                    HvWinding::D => self.uhv,
                    HvWinding::Y | HvWinding::YN => self.uhv / 3f64.sqrt(),
                };
                let factor = match lv {
                    LvWinding::D => 1.0,
                    LvWinding::Y | LvWinding::YN => 3f64.sqrt(),
                    LvWinding::Z | LvWinding::ZN => 3.0,
                };
                self.ulv / (winding_hv * factor)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Transformer {
    pub id: String,
    pub bus_hv: BusId,
    pub bus_lv: BusId,
    pub phases_hv: Vec<Phase>,
    pub phases_lv: Vec<Phase>,
    pub parameters: TransformerParameters,
    /// Multiplies the nominal ratio.
    pub tap: f64,
}

impl Transformer {
    /// Checks the phases against the vector group.
    pub(crate) fn check_phases(&self) -> std::result::Result<(), String> {
        let hv = phase_code(&self.phases_hv);
        let lv = phase_code(&self.phases_lv);
        let (want_hv, want_lv): (&[&str], &[&str]) = match self.parameters.vector_group {
            VectorGroup::SinglePhase { .. } => (&["ab", "bc", "ac", "an", "bn", "cn"], &["ab", "bc", "ac", "an", "bn", "cn"]),
            VectorGroup::CenterTapped => (&["ab", "bc", "ac", "an", "bn", "cn"], &["abn", "bcn", "acn"]),
            VectorGroup::ThreePhase { hv, lv, .. } => (
                match hv {
                    HvWinding::D | HvWinding::Y => &["abc"],
                    HvWinding::YN => &["abcn"],
                },
                match lv {
                    LvWinding::D | LvWinding::Y | LvWinding::Z => &["abc"],
                    LvWinding::YN | LvWinding::ZN => &["abcn"],
                },
            ),
        };
        if !want_hv.contains(&hv.as_str()) {
            return Err(format!(
                "HV phases {} do not suit vector group {}",
                hv, self.parameters.vector_group
            ));
        }
        if !want_lv.contains(&lv.as_str()) {
            return Err(format!(
                "LV phases {} do not suit vector group {}",
                lv, self.parameters.vector_group
            ));
        }
        Ok(())
    }

    pub(crate) fn ratio(&self) -> f64 {
        self.parameters.ratio() * self.tap
    }
}

/// Winding incidence of a transformer.
///
/// `k1` maps HV node potentials to primary winding voltages (one row per
/// core), `k2` maps LV node potentials to secondary path voltages and `m`
/// couples secondary paths to cores. HV and LV nodes are the transformer
/// phases in order, followed by an internal star point when a star winding
/// has no neutral terminal.
#[derive(Debug, Clone)]
pub(crate) struct Windings {
    pub(crate) k1: CMatrix,
    pub(crate) k2: CMatrix,
    pub(crate) m: CMatrix,
    pub(crate) hv_internal_star: bool,
    pub(crate) lv_internal_star: bool,
}

impl Windings {
    pub(crate) fn new(group: VectorGroup) -> Windings {
        let one = Complex64::new(1.0, 0.0);
        let incidence = |rows: usize, cols: usize, pairs: &[(usize, usize)]| {
            let mut k = CMatrix::zeros(rows, cols);
            for (r, &(plus, minus)) in pairs.iter().enumerate() {
                k[(r, plus)] = one;
                k[(r, minus)] = -one;
            }
            k
        };
        match group {
            VectorGroup::SinglePhase { clock } => {
                let s = if clock == 6 { -one } else { one };
                Windings {
                    k1: incidence(1, 2, &[(0, 1)]),
                    k2: incidence(1, 2, &[(0, 1)]),
                    m: CMatrix::scalar(1, s),
                    hv_internal_star: false,
                    lv_internal_star: false,
                }
            }
            VectorGroup::CenterTapped => {
                // LV phases are (p1, p2, n): p1 -> n and n -> p2.
                let mut m = CMatrix::zeros(2, 1);
                m[(0, 0)] = one;
                m[(1, 0)] = one;
                Windings {
                    k1: incidence(1, 2, &[(0, 1)]),
                    k2: incidence(2, 3, &[(0, 2), (2, 1)]),
                    m,
                    hv_internal_star: false,
                    lv_internal_star: false,
                }
            }
            VectorGroup::ThreePhase { hv, lv, clock } => {
                let hv_delta = hv == HvWinding::D;
                let k1 = if hv_delta {
                    incidence(3, 3, &[(0, 1), (1, 2), (2, 0)])
                } else {
                    incidence(3, 4, &[(0, 3), (1, 3), (2, 3)])
                };
                let s = if clock == 0 || clock == 11 { one } else { -one };
                let (k2, m) = match lv {
                    LvWinding::D if hv_delta => (
                        incidence(3, 3, &[(0, 1), (1, 2), (2, 0)]),
                        CMatrix::scalar(3, s),
                    ),
                    LvWinding::D => (
                        incidence(3, 3, &[(0, 2), (1, 0), (2, 1)]),
                        CMatrix::scalar(3, s),
                    ),
                    LvWinding::Y | LvWinding::YN => (
                        incidence(3, 4, &[(0, 3), (1, 3), (2, 3)]),
                        CMatrix::scalar(3, s),
                    ),
                    LvWinding::Z | LvWinding::ZN => {
                        // Each path spans half windings on two cores.
                        let mut m = CMatrix::zeros(3, 3);
                        for j in 0..3 {
                            let other = if hv_delta { (j + 2) % 3 } else { (j + 1) % 3 };
                            m[(j, j)] = s;
                            m[(j, other)] = -s;
                        }
                        (incidence(3, 4, &[(0, 3), (1, 3), (2, 3)]), m)
                    }
                };
                Windings {
                    k1,
                    k2,
                    m,
                    hv_internal_star: hv == HvWinding::Y,
                    lv_internal_star: matches!(lv, LvWinding::Y | LvWinding::Z),
                }
            }
        }
    }

    pub(crate) fn cores(&self) -> usize {
        self.k1.rows()
    }

    pub(crate) fn paths(&self) -> usize {
        self.k2.rows()
    }

    /// Secondary path EMFs `k M K1 V1`.
    pub(crate) fn emf(&self, k: f64, v1: &[Complex64]) -> Vec<Complex64> {
        let u1 = self.k1.mul_vec(v1);
        self.m
            .mul_vec(&u1)
            .into_iter()
            .map(|e| e * k)
            .collect()
    }

    /// Primary winding currents `-k Mᵗ I2 + Ym K1 V1`.
    pub(crate) fn primary_currents(
        &self,
        k: f64,
        ym: Complex64,
        v1: &[Complex64],
        i2: &[Complex64],
    ) -> Vec<Complex64> {
        let u1 = self.k1.mul_vec(v1);
        let mt_i2 = self.m.transpose().mul_vec(i2);
        u1.iter()
            .zip(mt_i2)
            .map(|(u, i)| ym * u - k * i)
            .collect()
    }

    /// Solves the secondary side for the path currents and the LV node
    /// potentials, given the path EMFs and the current entering the
    /// transformer at each LV node. The LV potentials sum to zero.
    pub(crate) fn solve_secondary(
        &self,
        z2: Complex64,
        emf: &[Complex64],
        node_currents: &[Complex64],
    ) -> Option<(Vec<Complex64>, Vec<Complex64>)> {
        let (paths, nodes) = self.k2.shape();
        let n = nodes + paths;
        let mut a = CMatrix::zeros(paths + nodes + 1, n);
        let mut b = vec![Complex64::zero(); paths + nodes + 1];
        for j in 0..paths {
            // K2 V2 - Z2 I2 = e
            for t in 0..nodes {
                a[(j, t)] = self.k2[(j, t)];
                // K2ᵗ I2 = T
                a[(paths + t, nodes + j)] = self.k2[(j, t)];
            }
            a[(j, nodes + j)] = -z2;
            b[j] = emf[j];
        }
        b[paths..paths + nodes].copy_from_slice(node_currents);
        for t in 0..nodes {
            a[(paths + nodes, t)] = ONE;
        }
        let sol = a.solve_least_squares(&b)?;
        let v2 = sol[..nodes].to_vec();
        let i2 = sol[nodes..].to_vec();
        Some((i2, v2))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TransformerStamp {
    pub(crate) hv_nodes: Vec<usize>,
    pub(crate) lv_nodes: Vec<usize>,
    /// Primary winding currents, one per core.
    pub(crate) i1: Vec<usize>,
    /// Secondary path currents.
    pub(crate) i2: Vec<usize>,
    pub(crate) windings: Windings,
}

impl TransformerStamp {
    pub(crate) fn stamp(&self, transformer: &Transformer, x: &[Complex64], eq: &mut Equations) {
        let k = transformer.ratio();
        let (z2, ym) = (transformer.parameters.z2, transformer.parameters.ym);
        let Windings { k1, k2, m, .. } = &self.windings;

        let v1: Vec<Complex64> = self.hv_nodes.iter().map(|&n| x[n]).collect();
        let v2: Vec<Complex64> = self.lv_nodes.iter().map(|&n| x[n]).collect();
        let u1 = k1.mul_vec(&v1);
        let u2 = k2.mul_vec(&v2);

        // I1w + k Mᵗ I2 - Ym K1 V1 = 0
        for (c, &ic) in self.i1.iter().enumerate() {
            let mut r = x[ic] - ym * u1[c];
            eq.linear(ic, ic, ONE);
            for (t, &node) in self.hv_nodes.iter().enumerate() {
                let kk = k1[(c, t)];
                if !kk.is_zero() {
                    eq.linear(ic, node, -ym * kk);
                    eq.add(node, kk * x[ic]);
                    eq.linear(node, ic, kk);
                }
            }
            for (j, &ij) in self.i2.iter().enumerate() {
                let mm = m[(j, c)];
                if !mm.is_zero() {
                    r += k * mm * x[ij];
                    eq.linear(ic, ij, k * mm);
                }
            }
            eq.add(ic, r);
        }

        // K2 V2 - k M K1 V1 - Z2 I2 = 0
        let mk1 = m * k1;
        for (j, &ij) in self.i2.iter().enumerate() {
            let mut r = u2[j] - z2 * x[ij];
            eq.linear(ij, ij, -z2);
            for (t, &node) in self.lv_nodes.iter().enumerate() {
                let kk = k2[(j, t)];
                if !kk.is_zero() {
                    eq.linear(ij, node, kk);
                    eq.add(node, kk * x[ij]);
                    eq.linear(node, ij, kk);
                }
            }
            for (t, &node) in self.hv_nodes.iter().enumerate() {
                let coeff = k * mk1[(j, t)];
                if !coeff.is_zero() {
                    r -= coeff * x[node];
                    eq.linear(ij, node, -coeff);
                }
            }
            eq.add(ij, r);
        }
    }

    /// Currents entering the transformer at each HV and LV node.
    pub(crate) fn node_currents(&self, x: &[Complex64]) -> (Vec<Complex64>, Vec<Complex64>) {
        let i1: Vec<Complex64> = self.i1.iter().map(|&k| x[k]).collect();
        let i2: Vec<Complex64> = self.i2.iter().map(|&k| x[k]).collect();
        (
            self.windings.k1.transpose().mul_vec(&i1),
            self.windings.k2.transpose().mul_vec(&i2),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::polar_deg;
    use anyhow::{format_err, Result};

    const GROUPS: [&str; 18] = [
        "Dd0", "Dd6", "Yy0", "Yy6", "YNyn0", "YNyn6", "Dyn11", "Dyn5", "Dy11", "Yd11", "Yd5",
        "YNd11", "Dzn0", "Dz6", "Yzn11", "Yz5", "YNzn11", "Yyn0",
    ];

    #[test]
    fn parse_groups() -> Result<()> {
        for g in GROUPS {
            let parsed: VectorGroup = g.parse()?;
            assert_eq!(parsed.to_string(), g);
        }
        assert!("Dyn0".parse::<VectorGroup>().is_err());
        assert!("Yd6".parse::<VectorGroup>().is_err());
        assert!("Xy0".parse::<VectorGroup>().is_err());
        assert!("Dy".parse::<VectorGroup>().is_err());
        assert_eq!("Ii6".parse::<VectorGroup>()?, VectorGroup::SinglePhase { clock: 6 });
        Ok(())
    }

    /// Open-circuit LV line voltage follows the HV line voltage scaled by
    /// `ulv / uhv` and shifted by `-30°` per clock hour.
    #[test]
    fn no_load_ratio_and_phase_shift() -> Result<()> {
        let (uhv, ulv) = (20e3, 400.0);
        let vp = uhv / 3f64.sqrt();
        for g in GROUPS {
            let tp = TransformerParameters::new("tp", g, uhv, ulv, Complex64::new(0.01, 0.04), Complex64::default())?;
            let w = Windings::new(tp.vector_group);
            let clock = match tp.vector_group {
                VectorGroup::ThreePhase { clock, .. } => clock,
                _ => return Err(format_err!("{} is not three-phase", g)),
            };
            let mut v1 = vec![polar_deg(vp, 0.0), polar_deg(vp, -120.0), polar_deg(vp, 120.0)];
            if w.k1.cols() == 4 {
                v1.push(Complex64::default());
            }
            let emf = w.emf(tp.ratio(), &v1);
            let (i2, v2) = w
                .solve_secondary(tp.z2, &emf, &vec![Complex64::default(); w.k2.cols()])
                .ok_or_else(|| format_err!("{}: singular secondary", g))?;
            if i2.iter().any(|i| i.norm() > 1e-6) {
                return Err(format_err!("{}: no-load current {:?}", g, i2));
            }
            let ratio = (v2[0] - v2[1]) / (v1[0] - v1[1]);
            let expected = polar_deg(ulv / uhv, -30.0 * clock as f64);
            if (ratio - expected).norm() > 1e-9 {
                return Err(format_err!("{}: ratio {} expected {}", g, ratio, expected));
            }
        }
        Ok(())
    }

    #[test]
    fn center_tapped_split_phase() -> Result<()> {
        let tp = TransformerParameters::new("ct", "Iii0", 20e3, 240.0, Complex64::new(0.01, 0.02), Complex64::default())?;
        let w = Windings::new(tp.vector_group);
        let v1 = vec![polar_deg(20e3, 0.0), Complex64::default()];
        let emf = w.emf(tp.ratio(), &v1);
        let (_, v2) = w
            .solve_secondary(tp.z2, &emf, &[Complex64::default(); 3])
            .ok_or_else(|| format_err!("singular"))?;
        // Phases (a, b, n): a and b in opposition around n.
        assert!((v2[0] - v2[2] - Complex64::new(120.0, 0.0)).norm() < 1e-9);
        assert!((v2[2] - v2[1] - Complex64::new(120.0, 0.0)).norm() < 1e-9);
        Ok(())
    }

    #[test]
    fn parameters_from_tests() -> Result<()> {
        let tp = TransformerParameters::from_tests("160kVA", "Dyn11", 160e3, 20e3, 400.0, 0.023, 460.0, 2350.0, 0.04)?;
        assert!(tp.z2.re > 0.0 && tp.z2.im > 0.0);
        assert!((tp.z2.norm() - 0.04 * 400.0 * 400.0 / 160e3).abs() < 1e-12);
        assert!(tp.ym.re > 0.0 && tp.ym.im < 0.0);
        // A delta primary winding sees the full phase-to-phase voltage.
        assert!((tp.ym.re - 460.0 / (3.0 * 20e3 * 20e3)).abs() < 1e-18);

        let yy = TransformerParameters::from_tests("yy", "Yyn0", 160e3, 20e3, 400.0, 0.023, 460.0, 2350.0, 0.04)?;
        assert!((yy.ym.re - 460.0 / (20e3 * 20e3)).abs() < 1e-18);
        // A delta secondary carries 1/sqrt(3) of the line current.
        let dd = TransformerParameters::from_tests("dd", "Dd0", 160e3, 20e3, 400.0, 0.023, 460.0, 2350.0, 0.04)?;
        if (dd.z2 - 3.0 * yy.z2).norm() > 1e-12 {
            return Err(format_err!("delta z2 {} vs star z2 {}", dd.z2, yy.z2));
        }
        let zn = TransformerParameters::from_tests("zn", "Dzn0", 160e3, 20e3, 400.0, 0.023, 460.0, 2350.0, 0.04)?;
        assert!((zn.z2 - yy.z2).norm() < 1e-12);
        assert!(TransformerParameters::from_tests("bad", "Dyn11", 160e3, 20e3, 400.0, 0.001, 460.0, 2350.0, 0.04).is_err());
        Ok(())
    }
}
