// Copyright (c) 2022-2024, Richard Lincoln. All rights reserved.

use num_complex::Complex64;

pub const J: Complex64 = Complex64 { re: 0.0, im: 1.0 };

/// Default steepness of the soft-clip function used by flexible controls.
pub const DEFAULT_ALPHA: f64 = 1000.0;

#[macro_export]
macro_rules! cmplx {
    () => {
        num_complex::Complex64::new(0.0, 0.0)
    };
    ($arg1:expr) => {
        num_complex::Complex64::new($arg1, 0.0)
    };
    ($arg1:expr, $arg2:expr) => {
        num_complex::Complex64::new($arg1, $arg2)
    };
}

/// Numerically stable `ln(1 + exp(x))`.
pub fn softplus(x: f64) -> f64 {
    if x > 0.0 {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}

/// Logistic function, the derivative of [`softplus`].
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Smooth monotone clip of `x` into `(0, 1)`.
///
/// Behaves like `min(max(x, 0), 1)` away from the corners, with the
/// corners rounded over a width of about `1 / alpha`:
///
/// `s(x) = (softplus(alpha * x) - softplus(alpha * (x - 1))) / alpha`
///
/// Above one half it is evaluated as `1 - s(1 - x)`, which keeps the
/// difference of the two softplus terms small.
pub fn soft_clip(x: f64, alpha: f64) -> f64 {
    let s = if x > 0.5 {
        1.0 - (softplus(alpha * (1.0 - x)) - softplus(-alpha * x)) / alpha
    } else {
        (softplus(alpha * x) - softplus(alpha * (x - 1.0))) / alpha
    };
    s.clamp(0.0, 1.0)
}

/// Derivative of [`soft_clip`] with respect to `x`.
pub fn soft_clip_derivative(x: f64, alpha: f64) -> f64 {
    sigmoid(alpha * x) - sigmoid(alpha * (x - 1.0))
}

/// Sign of `x`, with zero mapped to zero.
pub(crate) fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Complex phasor from magnitude and angle in degrees.
pub fn polar_deg(magnitude: f64, degrees: f64) -> Complex64 {
    Complex64::from_polar(magnitude, degrees.to_radians())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{format_err, Result};

    #[test]
    fn soft_clip_bounds() -> Result<()> {
        for i in -200..=300 {
            let x = i as f64 / 100.0;
            let s = soft_clip(x, DEFAULT_ALPHA);
            if !(0.0..=1.0).contains(&s) {
                return Err(format_err!("s({}) = {} outside [0, 1]", x, s));
            }
        }
        assert!(soft_clip(-1.0, DEFAULT_ALPHA) < 1e-12);
        assert!((soft_clip(2.0, DEFAULT_ALPHA) - 1.0).abs() < 1e-12);
        assert!((soft_clip(0.5, DEFAULT_ALPHA) - 0.5).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn soft_clip_monotone() {
        let mut prev = soft_clip(-1.0, 50.0);
        for i in -99..=200 {
            let s = soft_clip(i as f64 / 100.0, 50.0);
            assert!(s >= prev);
            prev = s;
        }
    }

    #[test]
    fn soft_clip_saturates_at_one() -> Result<()> {
        let mut prev = soft_clip(1.0, DEFAULT_ALPHA);
        for i in 1..=2000 {
            let x = 1.0 + i as f64 * 5e-4;
            let s = soft_clip(x, DEFAULT_ALPHA);
            if s > 1.0 || s < prev {
                return Err(format_err!("s({}) = {} after {}", x, s, prev));
            }
            prev = s;
        }
        assert!(soft_clip(1.13, DEFAULT_ALPHA) <= 1.0);
        assert_eq!(soft_clip(1.13, DEFAULT_ALPHA) + soft_clip(-0.13, DEFAULT_ALPHA), 1.0);
        Ok(())
    }

    #[test]
    fn soft_clip_derivative_matches_difference() -> Result<()> {
        let h = 1e-6;
        for &x in &[-0.1, 0.0, 0.001, 0.3, 0.999, 1.0, 1.2] {
            let fd = (soft_clip(x + h, 100.0) - soft_clip(x - h, 100.0)) / (2.0 * h);
            let d = soft_clip_derivative(x, 100.0);
            if (fd - d).abs() > 1e-5 {
                return Err(format_err!("x = {}: {} != {}", x, d, fd));
            }
        }
        Ok(())
    }

    #[test]
    fn softplus_large_arguments() {
        assert_eq!(softplus(1000.0), 1000.0);
        assert_eq!(softplus(-1000.0), 0.0);
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-15);
    }
}
