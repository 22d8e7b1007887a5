mod algorithms;
mod invariants;
mod scenarios;

use crate::network::Network;
use crate::results::NetworkResults;
use crate::SolveOptions;
use anyhow::Result;
use num_complex::Complex64;

pub(crate) fn solve(net: &mut Network, options: &SolveOptions) -> Result<NetworkResults> {
    net.solve(options)?;
    Ok(net.results()?.clone())
}

pub(crate) fn close(a: Complex64, b: Complex64, tol: f64) -> bool {
    (a - b).norm() <= tol
}
