use crate::error::{Error, Result};
use num_complex::Complex64;
use num_traits::{One, Zero};
use std::fmt;
use std::ops::{Add, Index, IndexMut, Mul, Neg, Sub};

/// Small dense complex matrix.
///
/// Used for per-element conductor matrices (line impedance and admittance,
/// transformer incidence) where the dimension never exceeds a handful of
/// phases. Values are stored in row-major order.
#[derive(Clone, PartialEq)]
pub struct CMatrix {
    rows: usize,
    cols: usize,
    values: Vec<Complex64>,
}

impl CMatrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            values: vec![Complex64::zero(); rows * cols],
        }
    }

    pub fn identity(n: usize) -> Self {
        Self::scalar(n, Complex64::one())
    }

    /// `z` on the diagonal.
    pub fn scalar(n: usize, z: Complex64) -> Self {
        Self::with_diagonal(&vec![z; n])
    }

    pub fn with_diagonal(diag: &[Complex64]) -> Self {
        let n = diag.len();
        let mut mat = Self::zeros(n, n);
        for (i, d) in diag.iter().enumerate() {
            mat[(i, i)] = *d;
        }
        mat
    }

    /// Builds a matrix from a slice of rows, which must all have the same length.
    pub fn from_rows(rows: &[Vec<Complex64>]) -> Result<Self> {
        let cols = rows.first().map_or(0, |r| r.len());
        if let Some(r) = rows.iter().find(|r| r.len() != cols) {
            return Err(Error::InvalidParameter {
                element: "matrix".to_string(),
                reason: format!("ragged rows ({} and {} columns)", cols, r.len()),
            });
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            values: rows.concat(),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    pub fn values(&self) -> &[Complex64] {
        &self.values
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| v.is_zero())
    }

    pub fn row(&self, i: usize) -> &[Complex64] {
        &self.values[i * self.cols..(i + 1) * self.cols]
    }

    pub fn transpose(&self) -> Self {
        let mut t = Self::zeros(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                t[(j, i)] = self[(i, j)];
            }
        }
        t
    }

    /// Conjugate transpose.
    pub fn adjoint(&self) -> Self {
        let mut t = self.transpose();
        t.values.iter_mut().for_each(|v| *v = v.conj());
        t
    }

    pub fn scale(&self, z: Complex64) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            values: self.values.iter().map(|v| v * z).collect(),
        }
    }

    pub fn mul_vec(&self, v: &[Complex64]) -> Vec<Complex64> {
        assert_eq!(v.len(), self.cols);
        (0..self.rows)
            .map(|i| self.row(i).iter().zip(v).map(|(a, b)| a * b).sum())
            .collect()
    }

    /// `M * 1`
    pub fn row_sums(&self) -> Vec<Complex64> {
        (0..self.rows).map(|i| self.row(i).iter().sum()).collect()
    }

    /// `1ᵗ * M`
    pub fn col_sums(&self) -> Vec<Complex64> {
        (0..self.cols)
            .map(|j| (0..self.rows).map(|i| self[(i, j)]).sum())
            .collect()
    }

    /// Solves `A x = b` by Gaussian elimination with partial pivoting.
    ///
    /// Returns `None` if a pivot vanishes.
    pub fn solve(&self, b: &[Complex64]) -> Option<Vec<Complex64>> {
        assert!(self.is_square());
        assert_eq!(b.len(), self.rows);
        let n = self.rows;
        let mut a = self.values.clone();
        let mut x = b.to_vec();

        let scale = a.iter().map(|v| v.norm()).fold(0.0, f64::max);
        let tiny = f64::EPSILON * scale * n as f64;

        for k in 0..n {
            let (p, max) = (k..n)
                .map(|i| (i, a[i * n + k].norm()))
                .fold((k, -1.0), |acc, v| if v.1 > acc.1 { v } else { acc });
            if max <= tiny || max == 0.0 {
                return None;
            }
            if p != k {
                for j in 0..n {
                    a.swap(k * n + j, p * n + j);
                }
                x.swap(k, p);
            }
            let pivot = a[k * n + k];
            for i in k + 1..n {
                let factor = a[i * n + k] / pivot;
                if factor.is_zero() {
                    continue;
                }
                for j in k..n {
                    let akj = a[k * n + j];
                    a[i * n + j] -= factor * akj;
                }
                let xk = x[k];
                x[i] -= factor * xk;
            }
        }
        for k in (0..n).rev() {
            let mut sum = x[k];
            for j in k + 1..n {
                sum -= a[k * n + j] * x[j];
            }
            x[k] = sum / a[k * n + k];
        }
        Some(x)
    }

    /// Least-squares solution of an over-determined, consistent system
    /// through the normal equations `Aᴴ A x = Aᴴ b`.
    pub fn solve_least_squares(&self, b: &[Complex64]) -> Option<Vec<Complex64>> {
        let ah = self.adjoint();
        let normal = &ah * self;
        normal.solve(&ah.mul_vec(b))
    }
}

impl Index<(usize, usize)> for CMatrix {
    type Output = Complex64;

    fn index(&self, (row, col): (usize, usize)) -> &Self::Output {
        assert!(row < self.rows && col < self.cols);
        &self.values[row * self.cols + col]
    }
}

impl IndexMut<(usize, usize)> for CMatrix {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut Self::Output {
        assert!(row < self.rows && col < self.cols);
        &mut self.values[row * self.cols + col]
    }
}

impl<'a> Mul<&'a CMatrix> for &'a CMatrix {
    type Output = CMatrix;

    fn mul(self, rhs: &CMatrix) -> CMatrix {
        assert_eq!(self.cols, rhs.rows);
        let mut c = CMatrix::zeros(self.rows, rhs.cols);
        for i in 0..self.rows {
            for k in 0..self.cols {
                let aik = self[(i, k)];
                if aik.is_zero() {
                    continue;
                }
                for j in 0..rhs.cols {
                    c[(i, j)] += aik * rhs[(k, j)];
                }
            }
        }
        c
    }
}

impl<'a> Add<&'a CMatrix> for &'a CMatrix {
    type Output = CMatrix;

    fn add(self, rhs: &CMatrix) -> CMatrix {
        assert_eq!(self.shape(), rhs.shape());
        CMatrix {
            rows: self.rows,
            cols: self.cols,
            values: self.values.iter().zip(&rhs.values).map(|(a, b)| a + b).collect(),
        }
    }
}

impl<'a> Sub<&'a CMatrix> for &'a CMatrix {
    type Output = CMatrix;

    fn sub(self, rhs: &CMatrix) -> CMatrix {
        assert_eq!(self.shape(), rhs.shape());
        CMatrix {
            rows: self.rows,
            cols: self.cols,
            values: self.values.iter().zip(&rhs.values).map(|(a, b)| a - b).collect(),
        }
    }
}

impl Neg for &CMatrix {
    type Output = CMatrix;

    fn neg(self) -> CMatrix {
        self.scale(-Complex64::one())
    }
}

impl fmt::Debug for CMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CMatrix {}x{}", self.rows, self.cols)?;
        for i in 0..self.rows {
            writeln!(f, "{}", crate::debug::format_rect_vec(self.row(i)))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmplx;
    use anyhow::{format_err, Result};

    #[test]
    fn solve_with_pivoting() -> Result<()> {
        let a = CMatrix::from_rows(&[
            vec![cmplx!(0.0), cmplx!(2.0, 1.0), cmplx!(1.0)],
            vec![cmplx!(1.0, -1.0), cmplx!(0.0), cmplx!(3.0)],
            vec![cmplx!(4.0), cmplx!(1.0), cmplx!(0.0, 2.0)],
        ])?;
        let x = vec![cmplx!(1.0, 2.0), cmplx!(-3.0), cmplx!(0.5, -0.5)];
        let b = a.mul_vec(&x);
        let sol = a.solve(&b).ok_or_else(|| format_err!("singular"))?;
        for (s, e) in sol.iter().zip(&x) {
            if (s - e).norm() > 1e-12 {
                return Err(format_err!("{} != {}", s, e));
            }
        }
        Ok(())
    }

    #[test]
    fn singular_is_detected() -> Result<()> {
        let a = CMatrix::from_rows(&[
            vec![cmplx!(1.0), cmplx!(2.0)],
            vec![cmplx!(2.0), cmplx!(4.0)],
        ])?;
        assert!(a.solve(&[cmplx!(1.0), cmplx!(1.0)]).is_none());
        Ok(())
    }

    #[test]
    fn least_squares_consistent_system() -> Result<()> {
        // Three equations, two unknowns, exactly satisfied by x.
        let a = CMatrix::from_rows(&[
            vec![cmplx!(1.0), cmplx!(-1.0)],
            vec![cmplx!(0.0), cmplx!(1.0)],
            vec![cmplx!(1.0), cmplx!(1.0)],
        ])?;
        let x = vec![cmplx!(2.0, 1.0), cmplx!(-1.0, 3.0)];
        let sol = a
            .solve_least_squares(&a.mul_vec(&x))
            .ok_or_else(|| format_err!("singular"))?;
        assert!((sol[0] - x[0]).norm() < 1e-12);
        assert!((sol[1] - x[1]).norm() < 1e-12);
        Ok(())
    }

    #[test]
    fn ragged_rows_rejected() {
        let r = CMatrix::from_rows(&[vec![cmplx!(1.0)], vec![cmplx!(1.0), cmplx!(2.0)]]);
        assert!(r.is_err());
    }

    #[test]
    fn sums_and_products() {
        let a = CMatrix::with_diagonal(&[cmplx!(1.0), cmplx!(2.0)]);
        let b = &CMatrix::identity(2) + &a;
        assert_eq!(b.row_sums(), vec![cmplx!(2.0), cmplx!(3.0)]);
        let c = &b * &a;
        assert_eq!(c[(1, 1)], cmplx!(6.0));
        assert_eq!(c.col_sums(), vec![cmplx!(2.0), cmplx!(6.0)]);
        assert_eq!((&c - &c).is_zero(), true);
    }
}
