use super::{close, solve};
use crate::demo;
use crate::error::Error;
use crate::network::Network;
use crate::newton::ProgressMonitor;
use crate::phase::phases;
use crate::results::NetworkResults;
use crate::{Algorithm, SolveOptionsBuilder};
use anyhow::{format_err, Result};
use spsolve::rlu::RLU;
use std::cell::RefCell;

fn same_potentials(a: &NetworkResults, b: &NetworkResults, tol: f64) -> Result<()> {
    for (x, y) in a.buses.iter().zip(&b.buses) {
        for (p, (u, v)) in x.potentials.iter().zip(&y.potentials).enumerate() {
            if !close(*u, *v, tol) {
                return Err(format_err!("{} phase {}: {} != {}", x.id, x.phases[p], u, v));
            }
        }
    }
    Ok(())
}

fn solve_with(net: &mut Network, algorithm: Algorithm) -> Result<NetworkResults> {
    let options = SolveOptionsBuilder::default()
        .tolerance(1e-9)
        .max_iterations(100)
        .warm_start(false)
        .algorithm(algorithm)
        .build()?;
    solve(net, &options)
}

#[test]
fn goldstein_price_agrees_with_newton() -> Result<()> {
    for net in [demo::simple_line()?, demo::shunt_line()?, demo::transformer_feeder()?, demo::flexible_feeder()?] {
        let newton = solve_with(&mut net.clone(), Algorithm::NewtonRaphson)?;
        let damped = solve_with(&mut net.clone(), Algorithm::goldstein_price())?;
        same_potentials(&newton, &damped, 1e-6)?;
    }
    Ok(())
}

#[test]
fn backward_forward_agrees_with_newton() -> Result<()> {
    for net in [demo::simple_line()?, demo::shunt_line()?, demo::transformer_feeder()?] {
        let newton = solve_with(&mut net.clone(), Algorithm::NewtonRaphson)?;
        let sweep = solve_with(&mut net.clone(), Algorithm::BackwardForward)?;
        same_potentials(&newton, &sweep, 1e-5)?;

        let (a, b) = (
            newton.line("line").ok_or_else(|| format_err!("no line"))?,
            sweep.line("line").ok_or_else(|| format_err!("no line"))?,
        );
        for (i, j) in a.currents1.iter().zip(&b.currents1) {
            assert!(close(*i, *j, 1e-4), "line current {} != {}", i, j);
        }
    }
    Ok(())
}

#[test]
fn backward_forward_rejects_unsupported_networks() -> Result<()> {
    // Short circuit.
    let mut net = demo::short_circuit()?;
    match solve_with(&mut net, Algorithm::BackwardForward) {
        Err(err) => match err.downcast_ref::<Error>() {
            Some(e @ Error::RadialUnsupported(_)) => assert!(e.is_structural()),
            other => return Err(format_err!("unexpected {:?}", other)),
        },
        Ok(_) => return Err(format_err!("short circuit accepted")),
    }
    // Newton handles it.
    solve_with(&mut net, Algorithm::NewtonRaphson)?;

    // Loop through a second switch.
    let mut net = demo::simple_line()?;
    let bus2 = net.bus_id("bus2").ok_or_else(|| format_err!("no bus2"))?;
    let bus3 = net.add_bus("bus3", &phases("abcn")?);
    net.add_switch("sw1", bus2, bus3, &phases("abcn")?);
    net.add_switch("sw2", bus2, bus3, &phases("abcn")?);
    match net.solve(&SolveOptionsBuilder::default().algorithm(Algorithm::BackwardForward).build()?) {
        Err(Error::RadialLoop(_)) => {}
        other => return Err(format_err!("unexpected {:?}", other)),
    }

    // Star load floating on a three-wire bus.
    let mut net = demo::simple_line()?;
    let bus2 = net.bus_id("bus2").ok_or_else(|| format_err!("no bus2"))?;
    let abc = net.add_bus("abc", &phases("abc")?);
    net.add_switch("sw", bus2, abc, &phases("abc")?);
    net.add_load(
        "floating",
        abc,
        &phases("abcn")?,
        crate::LoadKind::Power(vec![crate::cmplx!(100.0); 3]),
    );
    match net.solve(&SolveOptionsBuilder::default().algorithm(Algorithm::BackwardForward).build()?) {
        Err(Error::FloatingNeutral(id)) => assert_eq!(id, "floating"),
        other => return Err(format_err!("unexpected {:?}", other)),
    }
    // Newton solves it.
    let res = solve_with(&mut net, Algorithm::NewtonRaphson)?;
    let load = res.load("floating").ok_or_else(|| format_err!("no load"))?;
    let branch: Vec<f64> = load.branch_voltages.iter().map(|v| v.norm()).collect();
    assert!(branch.iter().all(|u| *u > 200.0 && *u < 240.0), "{:?}", branch);
    Ok(())
}

struct Recorder(RefCell<Vec<(usize, f64)>>);

impl ProgressMonitor for Recorder {
    fn update(&self, i: usize, norm_f: f64) {
        self.0.borrow_mut().push((i, norm_f));
    }
}

#[test]
fn progress_reports_every_iteration() -> Result<()> {
    let mut net = demo::transformer_feeder()?;
    let recorder = Recorder(RefCell::new(Vec::new()));
    let options = SolveOptionsBuilder::default().build()?;
    let iterations = net.solve_with_progress(&options, &RLU::default(), Some(&recorder))?;

    let reports = recorder.0.borrow();
    assert_eq!(reports.len(), iterations);
    for (k, (i, _)) in reports.iter().enumerate() {
        assert_eq!(*i, k + 1);
    }
    let last = reports.last().map(|r| r.1).unwrap_or(f64::INFINITY);
    assert!(last < options.tolerance);
    assert!(reports[0].1 > options.tolerance);
    Ok(())
}
