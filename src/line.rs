use crate::assemble::{Equations, ONE};
use crate::cmplx;
use crate::dense::CMatrix;
use crate::error::{Error, Result};
use crate::network::{BusId, GroundId};
use crate::phase::Phase;
use num_complex::Complex64;

/// Per unit length electrical parameters of a line.
#[derive(Debug, Clone, PartialEq)]
pub struct LineParameters {
    pub id: String,
    /// Series impedance matrix (ohm per km).
    pub z_line: CMatrix,
    /// Shunt admittance matrix (siemens per km).
    pub y_shunt: Option<CMatrix>,
}

impl LineParameters {
    pub fn new(id: &str, z_line: CMatrix, y_shunt: Option<CMatrix>) -> Result<Self> {
        let n = z_line.rows();
        if !z_line.is_square() || n == 0 {
            return Err(Error::InvalidParameter {
                element: id.to_string(),
                reason: format!("series impedance must be square, got {:?}", z_line.shape()),
            });
        }
        if let Some(y) = &y_shunt {
            if y.shape() != (n, n) {
                return Err(Error::InvalidParameter {
                    element: id.to_string(),
                    reason: format!(
                        "shunt admittance shape {:?} does not match impedance shape {:?}",
                        y.shape(),
                        z_line.shape()
                    ),
                });
            }
        }
        // An all-zero admittance is no shunt at all.
        let y_shunt = y_shunt.filter(|y| !y.is_zero());
        Ok(LineParameters {
            id: id.to_string(),
            z_line,
            y_shunt,
        })
    }

    /// Three-conductor parameters from zero and positive sequence values.
    ///
    /// `z0 == z1` gives uncoupled conductors. With `z1 == 0` the impedance
    /// matrix has rank one.
    pub fn from_sym(
        id: &str,
        z0: Complex64,
        z1: Complex64,
        y0: Complex64,
        y1: Complex64,
    ) -> Result<Self> {
        let sym = |zero: Complex64, pos: Complex64| {
            let diag = (zero + 2.0 * pos) / 3.0;
            let off = (zero - pos) / 3.0;
            let mut m = CMatrix::zeros(3, 3);
            for i in 0..3 {
                for j in 0..3 {
                    m[(i, j)] = if i == j { diag } else { off };
                }
            }
            m
        };
        Self::new(id, sym(z0, z1), Some(sym(y0, y1)))
    }

    pub fn size(&self) -> usize {
        self.z_line.rows()
    }

    pub fn with_shunt(&self) -> bool {
        self.y_shunt.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Line {
    pub id: String,
    pub bus1: BusId,
    pub bus2: BusId,
    pub phases: Vec<Phase>,
    pub parameters: LineParameters,
    /// km
    pub length: f64,
    pub ground: Option<GroundId>,
}

/// Matrices of the line model, scaled by length.
#[derive(Debug, Clone)]
pub(crate) enum LineModel {
    Series {
        z: CMatrix,
    },
    /// PI model in the form
    ///
    /// ```text
    /// V1 = a V2 - b I2 + g Vg
    /// I1 = c V2 - d I2 + h Vg
    /// Ig = f (V1 + V2 - 2 Vg)
    /// ```
    ///
    /// where `Ig` flows from the line into the ground.
    Shunt {
        z: CMatrix,
        y_half: CMatrix,
        a: CMatrix,
        c: CMatrix,
        d: CMatrix,
        g: Vec<Complex64>,
        h: Vec<Complex64>,
        f: Vec<Complex64>,
    },
}

impl LineModel {
    pub(crate) fn new(line: &Line) -> LineModel {
        let z = line.parameters.z_line.scale(line.length.into());
        match &line.parameters.y_shunt {
            None => LineModel::Series { z },
            Some(y) => {
                let y = y.scale(line.length.into());
                let y_half = y.scale(cmplx!(0.5));
                let n = z.rows();
                let id = CMatrix::identity(n);
                let zy = &z * &y_half;
                let yz = &y_half * &z;
                let a = &id + &zy;
                let c = &y + &(&yz * &y_half);
                let d = &id + &yz;
                let g = zy.row_sums().into_iter().map(|v| -v).collect();
                let h = c.row_sums().into_iter().map(|v| -v).collect();
                let f = y_half.col_sums();
                LineModel::Shunt {
                    z,
                    y_half,
                    a,
                    c,
                    d,
                    g,
                    h,
                    f,
                }
            }
        }
    }

    pub(crate) fn z(&self) -> &CMatrix {
        match self {
            LineModel::Series { z } | LineModel::Shunt { z, .. } => z,
        }
    }

    pub(crate) fn y_half(&self) -> Option<&CMatrix> {
        match self {
            LineModel::Series { .. } => None,
            LineModel::Shunt { y_half, .. } => Some(y_half),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct LineStamp {
    pub(crate) nodes1: Vec<usize>,
    pub(crate) nodes2: Vec<usize>,
    pub(crate) ground: Option<usize>,
    /// Current entering the line from bus 1.
    pub(crate) i1: Vec<usize>,
    /// Current entering the line from bus 2 (shunt lines only).
    pub(crate) i2: Vec<usize>,
    pub(crate) model: LineModel,
}

impl LineStamp {
    pub(crate) fn stamp(&self, x: &[Complex64], eq: &mut Equations) {
        let n = self.nodes1.len();
        match (&self.model, self.ground) {
            (LineModel::Shunt { a, c, d, g, h, f, z, .. }, Some(ground)) => {
                let vg = x[ground];
                let mut ig = Complex64::default();
                for p in 0..n {
                    let (n1, n2) = (self.nodes1[p], self.nodes2[p]);
                    let (k1, k2) = (self.i1[p], self.i2[p]);

                    eq.add(n1, x[k1]);
                    eq.add(n2, x[k2]);
                    eq.linear(n1, k1, ONE);
                    eq.linear(n2, k2, ONE);

                    // V1 - a V2 + b I2 - g Vg = 0, with b = z
                    let mut r1 = x[n1] - g[p] * vg;
                    eq.linear(k1, n1, ONE);
                    eq.linear(k1, ground, -g[p]);
                    // I1 - c V2 + d I2 - h Vg = 0
                    let mut r2 = x[k1] - h[p] * vg;
                    eq.linear(k2, k1, ONE);
                    eq.linear(k2, ground, -h[p]);
                    for q in 0..n {
                        let (m2, j2) = (self.nodes2[q], self.i2[q]);
                        r1 += -a[(p, q)] * x[m2] + z[(p, q)] * x[j2];
                        r2 += -c[(p, q)] * x[m2] + d[(p, q)] * x[j2];
                        eq.linear(k1, m2, -a[(p, q)]);
                        eq.linear(k1, j2, z[(p, q)]);
                        eq.linear(k2, m2, -c[(p, q)]);
                        eq.linear(k2, j2, d[(p, q)]);
                    }
                    // Row of I1 holds the voltage relation, row of I2 the
                    // current relation.
                    eq.add(k1, r1);
                    eq.add(k2, r2);

                    ig += f[p] * (x[n1] + x[n2] - 2.0 * vg);
                    eq.linear(ground, n1, -f[p]);
                    eq.linear(ground, n2, -f[p]);
                    eq.linear(ground, ground, 2.0 * f[p]);
                }
                eq.add(ground, -ig);
            }
            (model, _) => {
                let z = model.z();
                for p in 0..n {
                    let (n1, n2, k1) = (self.nodes1[p], self.nodes2[p], self.i1[p]);
                    eq.add(n1, x[k1]);
                    eq.add(n2, -x[k1]);
                    eq.linear(n1, k1, ONE);
                    eq.linear(n2, k1, -ONE);

                    // V1 - V2 - Z I1 = 0
                    let mut r = x[n1] - x[n2];
                    eq.linear(k1, n1, ONE);
                    eq.linear(k1, n2, -ONE);
                    for q in 0..n {
                        let j1 = self.i1[q];
                        r -= z[(p, q)] * x[j1];
                        eq.linear(k1, j1, -z[(p, q)]);
                    }
                    eq.add(k1, r);
                }
            }
        }
    }

    /// Currents entering the line at each end.
    pub(crate) fn end_currents(&self, x: &[Complex64]) -> (Vec<Complex64>, Vec<Complex64>) {
        let i1: Vec<Complex64> = self.i1.iter().map(|&k| x[k]).collect();
        let i2 = if self.i2.is_empty() {
            i1.iter().map(|i| -i).collect()
        } else {
            self.i2.iter().map(|&k| x[k]).collect()
        };
        (i1, i2)
    }
}
