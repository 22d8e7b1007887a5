use crate::assemble::Assembly;
use crate::error::Result;
use crate::init::flat_start;
use crate::network::Network;
use crate::newton::{newton, LineSearch, ProgressMonitor};
use crate::options::{Algorithm, SolveOptions};
use crate::radial::backward_forward;
use crate::results::NetworkResults;
use crate::validate::check_parameters;

use num_complex::Complex64;
use spsolve::rlu::RLU;
use spsolve::Solver;

impl Network {
    /// Solves the load flow with the default sparse LU solver and returns
    /// the number of iterations.
    pub fn solve(&mut self, options: &SolveOptions) -> Result<usize> {
        self.solve_with(options, &RLU::default())
    }

    /// Solves the load flow using `solver` for the Newton steps.
    pub fn solve_with(&mut self, options: &SolveOptions, solver: &dyn Solver<usize, f64>) -> Result<usize> {
        self.solve_with_progress(options, solver, None)
    }

    /// Solves the load flow, reporting every Newton iteration to `progress`.
    ///
    /// On success the results and the warm start are replaced. On failure
    /// the network is marked stale and both are kept from the last
    /// successful solve.
    pub fn solve_with_progress(
        &mut self,
        options: &SolveOptions,
        solver: &dyn Solver<usize, f64>,
        progress: Option<&dyn ProgressMonitor>,
    ) -> Result<usize> {
        self.stale = true;

        let assembly = match self.assembly.take() {
            Some(assembly) => assembly,
            None => {
                let assembly = Assembly::new(self)?;
                log::debug!("assembled {} unknowns", assembly.size);
                assembly
            }
        };
        let outcome = self.run(&assembly, options, solver, progress);
        self.assembly = Some(assembly);

        let (x, iterations) = outcome?;
        let results = self.assembly.as_ref().map(|a| NetworkResults::new(self, a, &x, iterations));
        self.results = results;
        self.warm_start = Some(x);
        self.stale = false;
        Ok(iterations)
    }

    fn run(
        &self,
        assembly: &Assembly,
        options: &SolveOptions,
        solver: &dyn Solver<usize, f64>,
        progress: Option<&dyn ProgressMonitor>,
    ) -> Result<(Vec<Complex64>, usize)> {
        check_parameters(self)?;

        let mut x = match &self.warm_start {
            Some(x) if options.warm_start && x.len() == assembly.size => {
                log::debug!("warm start from the last solution");
                x.clone()
            }
            _ => flat_start(self, assembly),
        };

        let iterations = match options.algorithm {
            Algorithm::NewtonRaphson => newton(
                self,
                assembly,
                &mut x,
                options.tolerance,
                options.max_iterations,
                None,
                solver,
                progress,
            )?,
            Algorithm::GoldsteinPrice { m1, m2 } => newton(
                self,
                assembly,
                &mut x,
                options.tolerance,
                options.max_iterations,
                Some(LineSearch { m1, m2 }),
                solver,
                progress,
            )?,
            Algorithm::BackwardForward => {
                backward_forward(self, assembly, &mut x, options.tolerance, options.max_iterations)?
            }
        };
        Ok((x, iterations))
    }
}
