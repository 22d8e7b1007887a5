use crate::error::{Error, Result};

use clap::ValueEnum;
use derive_builder::Builder;
use std::collections::HashMap;

/// Load flow algorithm.
#[derive(Debug, PartialEq, Copy, Clone, ValueEnum)]
pub enum AlgorithmKind {
    /// Newton-Raphson.
    NewtonRaphson,
    /// Newton-Raphson with a Goldstein and Price line search.
    GoldsteinPrice,
    /// Backward-forward sweep (radial networks only, experimental).
    BackwardForward,
}

#[derive(Debug, PartialEq, Copy, Clone, Default)]
pub enum Algorithm {
    #[default]
    NewtonRaphson,
    GoldsteinPrice {
        m1: f64,
        m2: f64,
    },
    BackwardForward,
}

impl Algorithm {
    pub fn goldstein_price() -> Self {
        Algorithm::GoldsteinPrice { m1: 0.1, m2: 0.9 }
    }

    pub fn kind(&self) -> AlgorithmKind {
        match self {
            Algorithm::NewtonRaphson => AlgorithmKind::NewtonRaphson,
            Algorithm::GoldsteinPrice { .. } => AlgorithmKind::GoldsteinPrice,
            Algorithm::BackwardForward => AlgorithmKind::BackwardForward,
        }
    }

    /// Builds an algorithm from its kind and named parameters. Only the
    /// Goldstein and Price search takes parameters, `m1` and `m2`.
    pub fn from_params(kind: AlgorithmKind, params: &HashMap<String, f64>) -> Result<Self> {
        let known: &[&str] = match kind {
            AlgorithmKind::GoldsteinPrice => &["m1", "m2"],
            AlgorithmKind::NewtonRaphson | AlgorithmKind::BackwardForward => &[],
        };
        if let Some(key) = params.keys().find(|k| !known.contains(&k.as_str())) {
            return Err(Error::InvalidParameter {
                element: format!("{:?}", kind),
                reason: format!("unknown algorithm parameter {:?}", key),
            });
        }
        let algorithm = match kind {
            AlgorithmKind::NewtonRaphson => Algorithm::NewtonRaphson,
            AlgorithmKind::BackwardForward => Algorithm::BackwardForward,
            AlgorithmKind::GoldsteinPrice => Algorithm::GoldsteinPrice {
                m1: params.get("m1").copied().unwrap_or(0.1),
                m2: params.get("m2").copied().unwrap_or(0.9),
            },
        };
        algorithm.validate().map_err(|reason| Error::InvalidParameter {
            element: format!("{:?}", kind),
            reason,
        })?;
        Ok(algorithm)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if let Algorithm::GoldsteinPrice { m1, m2 } = *self {
            if !(0.0 < m1 && m1 < m2 && m2 < 1.0) {
                return Err(format!("need 0 < m1 < m2 < 1, got m1={} m2={}", m1, m2));
            }
        }
        Ok(())
    }
}

#[derive(Debug, PartialEq, Clone, Builder)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct SolveOptions {
    /// Bound on the infinity norm of the residual.
    #[builder(default = "1e-6")]
    pub tolerance: f64,

    #[builder(default = "20")]
    pub max_iterations: usize,

    /// Start from the last converged solution when there is one.
    #[builder(default = "true")]
    pub warm_start: bool,

    #[builder(default)]
    pub algorithm: Algorithm,
}

impl SolveOptionsBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(tol) = self.tolerance {
            if !(tol > 0.0) {
                return Err(format!("tolerance must be positive, got {}", tol));
            }
        }
        if self.max_iterations == Some(0) {
            return Err("at least one iteration is needed".to_string());
        }
        if let Some(algorithm) = &self.algorithm {
            algorithm.validate()?;
        }
        Ok(())
    }
}

impl Default for SolveOptions {
    fn default() -> Self {
        SolveOptions {
            tolerance: 1e-6,
            max_iterations: 20,
            warm_start: true,
            algorithm: Algorithm::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn builder_defaults() -> Result<()> {
        let options = SolveOptionsBuilder::default().build()?;
        assert_eq!(options, SolveOptions::default());
        let options = SolveOptionsBuilder::default()
            .tolerance(1e-8)
            .algorithm(Algorithm::BackwardForward)
            .build()?;
        assert_eq!(options.tolerance, 1e-8);
        assert_eq!(options.max_iterations, 20);
        Ok(())
    }

    #[test]
    fn builder_rejects_bad_values() {
        assert!(SolveOptionsBuilder::default().tolerance(0.0).build().is_err());
        assert!(SolveOptionsBuilder::default().max_iterations(0).build().is_err());
        assert!(SolveOptionsBuilder::default()
            .algorithm(Algorithm::GoldsteinPrice { m1: 0.9, m2: 0.1 })
            .build()
            .is_err());
    }

    #[test]
    fn algorithm_params() -> Result<()> {
        let mut params = HashMap::new();
        assert_eq!(
            Algorithm::from_params(AlgorithmKind::GoldsteinPrice, &params)?,
            Algorithm::goldstein_price()
        );
        params.insert("m1".to_string(), 0.2);
        assert_eq!(
            Algorithm::from_params(AlgorithmKind::GoldsteinPrice, &params)?,
            Algorithm::GoldsteinPrice { m1: 0.2, m2: 0.9 }
        );
        assert!(Algorithm::from_params(AlgorithmKind::NewtonRaphson, &params).is_err());
        params.insert("m3".to_string(), 0.5);
        assert!(Algorithm::from_params(AlgorithmKind::GoldsteinPrice, &params).is_err());
        Ok(())
    }
}
