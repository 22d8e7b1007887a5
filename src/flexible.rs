//! Voltage-dependent power of flexible loads.
//!
//! A flexible load starts from a theoretical power `S_th = P_th + jQ_th`.
//! The active and reactive parts are each adjusted by a [`Control`] driven
//! by the local voltage magnitude `U`, and the resulting point is mapped
//! back into the disc of radius `S_max` by a [`Projection`]. Every step is
//! smooth so that the load can sit inside a Newton-Raphson Jacobian.

use crate::math::{sign, soft_clip, soft_clip_derivative, DEFAULT_ALPHA};
use num_complex::Complex64;

/// Default smoothing of the projection norm.
pub const DEFAULT_EPSILON: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Control {
    /// Keep the theoretical value.
    Constant,
    /// Curtail production (negative `P`) as the voltage rises from `u_up`
    /// to `u_max`.
    PMaxUProduction { u_up: f64, u_max: f64, alpha: f64 },
    /// Reduce consumption as the voltage falls from `u_down` to `u_min`.
    PMaxUConsumption { u_min: f64, u_down: f64, alpha: f64 },
    /// Reactive support: `Q_min` below `u_min`, nothing between `u_down`
    /// and `u_up`, `Q_max` above `u_max`.
    QU {
        u_min: f64,
        u_down: f64,
        u_up: f64,
        u_max: f64,
        alpha: f64,
    },
}

impl Control {
    pub fn constant() -> Self {
        Control::Constant
    }

    pub fn p_max_u_production(u_up: f64, u_max: f64) -> Self {
        Control::PMaxUProduction {
            u_up,
            u_max,
            alpha: DEFAULT_ALPHA,
        }
    }

    pub fn p_max_u_consumption(u_min: f64, u_down: f64) -> Self {
        Control::PMaxUConsumption {
            u_min,
            u_down,
            alpha: DEFAULT_ALPHA,
        }
    }

    pub fn q_u(u_min: f64, u_down: f64, u_up: f64, u_max: f64) -> Self {
        Control::QU {
            u_min,
            u_down,
            u_up,
            u_max,
            alpha: DEFAULT_ALPHA,
        }
    }

    /// Replaces the soft-clip steepness.
    pub fn with_alpha(self, value: f64) -> Self {
        match self {
            Control::Constant => Control::Constant,
            Control::PMaxUProduction { u_up, u_max, .. } => Control::PMaxUProduction {
                u_up,
                u_max,
                alpha: value,
            },
            Control::PMaxUConsumption { u_min, u_down, .. } => Control::PMaxUConsumption {
                u_min,
                u_down,
                alpha: value,
            },
            Control::QU {
                u_min,
                u_down,
                u_up,
                u_max,
                ..
            } => Control::QU {
                u_min,
                u_down,
                u_up,
                u_max,
                alpha: value,
            },
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Control::Constant)
    }

    fn validate(&self) -> Result<(), String> {
        let alpha = match *self {
            Control::Constant => return Ok(()),
            Control::PMaxUProduction { u_up, u_max, alpha } => {
                if !(u_up < u_max) {
                    return Err(format!("u_up ({}) must be below u_max ({})", u_up, u_max));
                }
                alpha
            }
            Control::PMaxUConsumption {
                u_min,
                u_down,
                alpha,
            } => {
                if !(u_min < u_down) {
                    return Err(format!(
                        "u_min ({}) must be below u_down ({})",
                        u_min, u_down
                    ));
                }
                alpha
            }
            Control::QU {
                u_min,
                u_down,
                u_up,
                u_max,
                alpha,
            } => {
                if !(u_min < u_down && u_down <= u_up && u_up < u_max) {
                    return Err(format!(
                        "thresholds must satisfy u_min < u_down <= u_up < u_max ({}, {}, {}, {})",
                        u_min, u_down, u_up, u_max
                    ));
                }
                alpha
            }
        };
        if alpha > 0.0 && alpha.is_finite() {
            Ok(())
        } else {
            Err(format!("alpha must be positive, got {}", alpha))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionKind {
    /// Scale `(P, Q)` radially onto the disc.
    Euclidean,
    /// Keep `P` (clipped to `±S_max`) and shrink `Q`.
    KeepP,
    /// Keep `Q` (clipped to `±S_max`) and shrink `P`.
    KeepQ,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub kind: ProjectionKind,
    pub epsilon: f64,
}

impl Projection {
    pub fn euclidean() -> Self {
        Self::new(ProjectionKind::Euclidean)
    }

    pub fn keep_p() -> Self {
        Self::new(ProjectionKind::KeepP)
    }

    pub fn keep_q() -> Self {
        Self::new(ProjectionKind::KeepQ)
    }

    fn new(kind: ProjectionKind) -> Self {
        Projection {
            kind,
            epsilon: DEFAULT_EPSILON,
        }
    }

    pub fn with_epsilon(self, epsilon: f64) -> Self {
        Projection { epsilon, ..self }
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self::euclidean()
    }
}

/// Per-phase control description of a flexible load.
#[derive(Debug, Clone, PartialEq)]
pub struct FlexibleParameter {
    pub control_p: Control,
    pub control_q: Control,
    pub projection: Projection,
    pub s_max: f64,
    /// Defaults to `-s_max`.
    pub q_min: Option<f64>,
    /// Defaults to `s_max`.
    pub q_max: Option<f64>,
}

impl FlexibleParameter {
    pub fn new(control_p: Control, control_q: Control, projection: Projection, s_max: f64) -> Self {
        FlexibleParameter {
            control_p,
            control_q,
            projection,
            s_max,
            q_min: None,
            q_max: None,
        }
    }

    pub fn with_q_limits(self, q_min: f64, q_max: f64) -> Self {
        FlexibleParameter {
            q_min: Some(q_min),
            q_max: Some(q_max),
            ..self
        }
    }

    /// No control at all: the load behaves as a constant power load.
    pub fn constant() -> Self {
        Self::new(
            Control::Constant,
            Control::Constant,
            Projection::default(),
            f64::INFINITY,
        )
    }

    pub fn p_max_u_production(u_up: f64, u_max: f64, s_max: f64) -> Self {
        Self::new(
            Control::p_max_u_production(u_up, u_max),
            Control::Constant,
            Projection::keep_q(),
            s_max,
        )
    }

    pub fn p_max_u_consumption(u_min: f64, u_down: f64, s_max: f64) -> Self {
        Self::new(
            Control::p_max_u_consumption(u_min, u_down),
            Control::Constant,
            Projection::keep_q(),
            s_max,
        )
    }

    pub fn q_u(u_min: f64, u_down: f64, u_up: f64, u_max: f64, s_max: f64) -> Self {
        Self::new(
            Control::Constant,
            Control::q_u(u_min, u_down, u_up, u_max),
            Projection::keep_p(),
            s_max,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn pq_u_production(
        up_up: f64,
        up_max: f64,
        uq_min: f64,
        uq_down: f64,
        uq_up: f64,
        uq_max: f64,
        s_max: f64,
    ) -> Self {
        Self::new(
            Control::p_max_u_production(up_up, up_max),
            Control::q_u(uq_min, uq_down, uq_up, uq_max),
            Projection::euclidean(),
            s_max,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn pq_u_consumption(
        up_min: f64,
        up_down: f64,
        uq_min: f64,
        uq_down: f64,
        uq_up: f64,
        uq_max: f64,
        s_max: f64,
    ) -> Self {
        Self::new(
            Control::p_max_u_consumption(up_min, up_down),
            Control::q_u(uq_min, uq_down, uq_up, uq_max),
            Projection::euclidean(),
            s_max,
        )
    }

    pub fn q_min(&self) -> f64 {
        self.q_min.unwrap_or(-self.s_max)
    }

    pub fn q_max(&self) -> f64 {
        self.q_max.unwrap_or(self.s_max)
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if matches!(self.control_p, Control::QU { .. }) {
            return Err("q_u cannot control the active power".to_string());
        }
        if matches!(
            self.control_q,
            Control::PMaxUProduction { .. } | Control::PMaxUConsumption { .. }
        ) {
            return Err("p_max_u controls cannot control the reactive power".to_string());
        }
        self.control_p.validate()?;
        self.control_q.validate()?;
        if !(self.s_max > 0.0) {
            return Err(format!("s_max must be positive, got {}", self.s_max));
        }
        if !(self.projection.epsilon >= 0.0) {
            return Err(format!(
                "projection epsilon must not be negative, got {}",
                self.projection.epsilon
            ));
        }
        let (q_min, q_max) = (self.q_min(), self.q_max());
        if q_min < -self.s_max || q_max > self.s_max || q_min > 0.0 || q_max < 0.0 {
            return Err(format!(
                "reactive limits [{}, {}] must contain 0 and lie within ±s_max",
                q_min, q_max
            ));
        }
        Ok(())
    }
}

/// Realized power of a flexible load at voltage magnitude `u`.
pub fn compute_power(u: f64, s_th: Complex64, parameter: &FlexibleParameter) -> Complex64 {
    power_and_derivative(u, s_th, parameter).0
}

/// Realized power and its derivative with respect to `u`.
pub(crate) fn power_and_derivative(
    u: f64,
    s_th: Complex64,
    parameter: &FlexibleParameter,
) -> (Complex64, Complex64) {
    if parameter.control_p.is_constant() && parameter.control_q.is_constant() {
        return (s_th, Complex64::default());
    }
    let (p, dp) = active_power(&parameter.control_p, u, s_th.re, parameter.s_max);
    let (q, dq) = reactive_power(
        &parameter.control_q,
        u,
        s_th.im,
        parameter.q_min(),
        parameter.q_max(),
    );
    let (p, q, dp, dq) = project(p, q, dp, dq, parameter.s_max, &parameter.projection);
    (Complex64::new(p, q), Complex64::new(dp, dq))
}

fn active_power(control: &Control, u: f64, p_th: f64, s_max: f64) -> (f64, f64) {
    match *control {
        Control::PMaxUProduction { u_up, u_max, alpha } => {
            let width = u_max - u_up;
            let x = (u - u_up) / width;
            let p = (soft_clip(x, alpha) - 1.0) * s_max;
            if p > p_th {
                (p, soft_clip_derivative(x, alpha) / width * s_max)
            } else {
                (p_th, 0.0)
            }
        }
        Control::PMaxUConsumption {
            u_min,
            u_down,
            alpha,
        } => {
            let width = u_down - u_min;
            let x = (u - u_min) / width;
            let p = soft_clip(x, alpha) * s_max;
            if p < p_th {
                (p, soft_clip_derivative(x, alpha) / width * s_max)
            } else {
                (p_th, 0.0)
            }
        }
        Control::Constant | Control::QU { .. } => (p_th, 0.0),
    }
}

fn reactive_power(control: &Control, u: f64, q_th: f64, q_min: f64, q_max: f64) -> (f64, f64) {
    match *control {
        Control::QU {
            u_min,
            u_down,
            u_up,
            u_max,
            alpha,
        } => {
            let w_up = u_max - u_up;
            let x_up = (u - u_up) / w_up;
            let w_down = u_down - u_min;
            let x_down = (u_down - u) / w_down;
            let q = q_max * soft_clip(x_up, alpha) + q_min * soft_clip(x_down, alpha);
            let dq = q_max * soft_clip_derivative(x_up, alpha) / w_up
                - q_min * soft_clip_derivative(x_down, alpha) / w_down;
            (q, dq)
        }
        Control::Constant | Control::PMaxUProduction { .. } | Control::PMaxUConsumption { .. } => {
            (q_th, 0.0)
        }
    }
}

/// Maps `(p, q)` into the disc of radius `s_max`, carrying derivatives.
fn project(
    p: f64,
    q: f64,
    dp: f64,
    dq: f64,
    s_max: f64,
    projection: &Projection,
) -> (f64, f64, f64, f64) {
    if p * p + q * q <= s_max * s_max {
        return (p, q, dp, dq);
    }
    let eps = projection.epsilon;
    match projection.kind {
        ProjectionKind::Euclidean => {
            let norm = (p * p + q * q + eps).sqrt();
            let ratio = s_max / norm;
            let d_norm = (p * dp + q * dq) / norm;
            let d_ratio = -s_max * d_norm / (norm * norm);
            (
                ratio * p,
                ratio * q,
                d_ratio * p + ratio * dp,
                d_ratio * q + ratio * dq,
            )
        }
        ProjectionKind::KeepP => {
            let (p, dp) = clip(p, dp, s_max);
            let (q, dq) = complement(q, p, dp, s_max, eps);
            (p, q, dp, dq)
        }
        ProjectionKind::KeepQ => {
            let (q, dq) = clip(q, dq, s_max);
            let (p, dp) = complement(p, q, dq, s_max, eps);
            (p, q, dp, dq)
        }
    }
}

fn clip(v: f64, dv: f64, s_max: f64) -> (f64, f64) {
    if v > s_max {
        (s_max, 0.0)
    } else if v < -s_max {
        (-s_max, 0.0)
    } else {
        (v, dv)
    }
}

/// The free component of a projection that keeps `kept`: magnitude
/// `w / sqrt(w + eps)` with `w = s_max² - kept²`, never above the exact
/// `sqrt(w)`, with the sign of the original value.
fn complement(original: f64, kept: f64, d_kept: f64, s_max: f64, eps: f64) -> (f64, f64) {
    let sgn = sign(original);
    let w = s_max * s_max - kept * kept;
    if w <= 0.0 {
        return (0.0, 0.0);
    }
    let dw = -2.0 * kept * d_kept;
    if eps == 0.0 {
        let root = w.sqrt();
        return (sgn * root, sgn * dw / (2.0 * root));
    }
    let value = w / (w + eps).sqrt();
    let d_value = (w + 2.0 * eps) / (2.0 * (w + eps).powf(1.5)) * dw;
    (sgn * value, sgn * d_value)
}
