//! Small feeders for the binary and the tests.

use crate::cmplx;
use crate::dense::CMatrix;
use crate::error::Result;
use crate::flexible::FlexibleParameter;
use crate::ground::RefTarget;
use crate::line::LineParameters;
use crate::load::LoadKind;
use crate::math::polar_deg;
use crate::network::{BusId, Network};
use crate::phase::{phases, Phase};
use crate::transformer::TransformerParameters;

use num_complex::Complex64;

const U_LV: f64 = 230.94;

fn star_voltages(u: f64) -> Vec<Complex64> {
    vec![polar_deg(u, 0.0), polar_deg(u, -120.0), polar_deg(u, 120.0)]
}

fn delta_voltages(u: f64) -> Vec<Complex64> {
    vec![polar_deg(u, 30.0), polar_deg(u, -90.0), polar_deg(u, 150.0)]
}

/// Four-wire source bus with its neutral as the reference, one line of
/// 0.35 ohm per conductor to a second bus.
fn two_buses(parameters: LineParameters, with_ground: bool) -> Result<(Network, BusId)> {
    let abcn = phases("abcn")?;
    let mut net = Network::new();
    let bus1 = net.add_bus("bus1", &abcn);
    let bus2 = net.add_bus("bus2", &abcn);
    net.add_voltage_source("source", bus1, &abcn, star_voltages(U_LV));
    if with_ground {
        let ground = net.add_ground("ground");
        net.connect_ground("gc", ground, bus1, Phase::N);
        net.add_potential_ref("pref", RefTarget::Ground(ground));
        net.add_line("line", bus1, bus2, &abcn, parameters, 1.0, Some(ground));
    } else {
        net.add_potential_ref("pref", RefTarget::Bus { bus: bus1, phases: phases("n")? });
        net.add_line("line", bus1, bus2, &abcn, parameters, 1.0, None);
    }
    Ok((net, bus2))
}

fn unbalanced_load() -> LoadKind {
    LoadKind::Power(vec![cmplx!(5000.0, -1500.0), cmplx!(2500.0, -750.0), cmplx!(0.0)])
}

/// Unbalanced constant power load at the end of a line without shunt.
pub fn simple_line() -> Result<Network> {
    let lp = LineParameters::new("lp", CMatrix::scalar(4, cmplx!(0.35)), None)?;
    let (mut net, bus2) = two_buses(lp, false)?;
    net.add_load("load", bus2, &phases("abcn")?, unbalanced_load());
    Ok(net)
}

fn coupled(diag: Complex64, off: Complex64) -> CMatrix {
    let mut m = CMatrix::scalar(4, diag - off);
    for i in 0..4 {
        for j in 0..4 {
            m[(i, j)] += off;
        }
    }
    m
}

/// The same load behind a coupled line with a shunt admittance to a
/// ground, the ground tied to the source neutral.
pub fn shunt_line() -> Result<Network> {
    let z = coupled(cmplx!(0.35, 0.3), cmplx!(0.05, 0.1));
    let y = coupled(cmplx!(0.0, 2e-4), cmplx!(0.0, -5e-5));
    let lp = LineParameters::new("lp_shunt", z, Some(y))?;
    let (mut net, bus2) = two_buses(lp, true)?;
    net.add_load("load", bus2, &phases("abcn")?, unbalanced_load());
    Ok(net)
}

/// The line of [`simple_line`] with phases a and b shorted at its far
/// end. Nothing else is connected there: a constant power load behind the
/// fault would ask for more than the line can deliver.
pub fn short_circuit() -> Result<Network> {
    let lp = LineParameters::new("lp", CMatrix::scalar(4, cmplx!(0.35)), None)?;
    let (mut net, bus2) = two_buses(lp, false)?;
    net.add_short_circuit("sc", bus2, &phases("ab")?, None);
    Ok(net)
}

/// 20 kV delta source, 160 kVA Dyn11 transformer with its LV neutral
/// grounded, and a 4-wire LV line to an unbalanced load.
pub fn transformer_feeder() -> Result<Network> {
    let abc = phases("abc")?;
    let abcn = phases("abcn")?;
    let mut net = Network::new();
    let mv = net.add_bus("mv", &abc);
    let lv = net.add_bus("lv", &abcn);
    let load_bus = net.add_bus("load_bus", &abcn);
    let ground = net.add_ground("ground");

    net.add_voltage_source("source", mv, &abc, delta_voltages(20e3));
    net.add_potential_ref("pref_mv", RefTarget::Bus { bus: mv, phases: abc.clone() });

    let tp = TransformerParameters::from_tests("160kVA", "Dyn11", 160e3, 20e3, 400.0, 0.023, 460.0, 2350.0, 0.04)?;
    net.add_transformer("tr", mv, lv, &abc, &abcn, tp, 1.0);

    net.connect_ground("gc", ground, lv, Phase::N);
    net.add_potential_ref("pref_lv", RefTarget::Ground(ground));

    let z = coupled(cmplx!(0.2, 0.08), cmplx!(0.0, 0.03));
    let lp = LineParameters::new("lp_lv", z, None)?;
    net.add_line("line", lv, load_bus, &abcn, lp, 0.5, None);
    net.add_load(
        "load",
        load_bus,
        &abcn,
        LoadKind::Power(vec![cmplx!(20e3, 5e3), cmplx!(15e3, 3e3), cmplx!(10e3, 2e3)]),
    );
    Ok(net)
}

/// Simple line with a flexible production unit on each phase of the load
/// bus.
pub fn flexible_feeder() -> Result<Network> {
    let lp = LineParameters::new("lp", CMatrix::scalar(4, cmplx!(0.35)), None)?;
    let (mut net, bus2) = two_buses(lp, false)?;
    net.add_load(
        "flexible",
        bus2,
        &phases("abcn")?,
        LoadKind::Flexible {
            powers: vec![cmplx!(-3000.0); 3],
            parameters: vec![
                FlexibleParameter::p_max_u_production(232.0, 240.0, 4000.0),
                FlexibleParameter::q_u(210.0, 220.0, 235.0, 240.0, 4000.0),
                FlexibleParameter::pq_u_production(232.0, 240.0, 210.0, 220.0, 235.0, 240.0, 4000.0),
            ],
        },
    );
    Ok(net)
}
