use super::{close, solve};
use crate::cmplx;
use crate::demo;
use crate::error::Error;
use crate::flexible::{compute_power, FlexibleParameter};
use crate::ground::RefTarget;
use crate::line::LineParameters;
use crate::load::LoadKind;
use crate::math::polar_deg;
use crate::network::Network;
use crate::phase::{phases, Phase};
use crate::{SolveOptions, SolveOptionsBuilder};
use anyhow::{format_err, Result};

#[test]
fn currents_balance_at_every_node() -> Result<()> {
    for mut net in [demo::shunt_line()?, demo::transformer_feeder()?, demo::short_circuit()?] {
        let res = solve(&mut net, &SolveOptions::default())?;
        for bus in &res.buses {
            for &phase in &bus.phases {
                let sum = res.current_balance(&bus.id, phase);
                if sum.norm() > 1e-5 {
                    return Err(format_err!("{}.{}: {} A unbalanced", bus.id, phase, sum));
                }
            }
        }
        for r in &res.potential_refs {
            assert!(r.current.norm() < 1e-6, "{} carries {}", r.id, r.current);
        }
    }
    Ok(())
}

#[test]
fn references_hold() -> Result<()> {
    let mut net = demo::simple_line()?;
    let res = solve(&mut net, &SolveOptions::default())?;
    let bus1 = res.bus("bus1").ok_or_else(|| format_err!("no bus1"))?;
    assert!(bus1.potential(Phase::N).unwrap_or_default().norm() < 1e-9);

    let mut net = demo::transformer_feeder()?;
    let res = solve(&mut net, &SolveOptions::default())?;
    let ground = res.ground("ground").ok_or_else(|| format_err!("no ground"))?;
    assert!(ground.potential.norm() < 1e-6);
    let mv = res.bus("mv").ok_or_else(|| format_err!("no mv bus"))?;
    let sum: num_complex::Complex64 = mv.potentials.iter().sum();
    assert!(sum.norm() < 1e-6, "mv potentials sum to {}", sum);
    Ok(())
}

#[test]
fn balanced_load_leaves_neutral_at_rest() -> Result<()> {
    let mut net = demo::simple_line()?;
    let load = net.element_id("load").ok_or_else(|| format_err!("no load"))?;
    net.set_load_powers(load, vec![cmplx!(3000.0, 1000.0); 3])?;
    let res = solve(&mut net, &SolveOptions::default())?;

    let bus2 = res.bus("bus2").ok_or_else(|| format_err!("no bus2"))?;
    let vn = bus2.potential(Phase::N).unwrap_or_default();
    assert!(vn.norm() < 1e-6, "neutral at {}", vn);
    let v = bus2.voltages();
    for k in 1..3 {
        if (v[k].norm() - v[0].norm()).abs() > 1e-6 {
            return Err(format_err!("asymmetric voltages {:?}", v));
        }
        // 120 degrees apart.
        let shifted = v[0] * polar_deg(1.0, -120.0 * k as f64);
        assert!(close(v[k], shifted, 1e-6));
    }
    Ok(())
}

#[test]
fn warm_start_converges_at_once() -> Result<()> {
    for mut net in [demo::simple_line()?, demo::transformer_feeder()?, demo::flexible_feeder()?] {
        let first = net.solve(&SolveOptions::default())?;
        assert!(first > 1);
        assert_eq!(net.solve(&SolveOptions::default())?, 1);

        net.invalidate_warm_start();
        assert_eq!(net.solve(&SolveOptions::default())?, first);
    }
    Ok(())
}

#[test]
fn rank_one_line_impedance() -> Result<()> {
    let abc = phases("abc")?;
    let mut net = Network::new();
    let bus1 = net.add_bus("bus1", &abc);
    let bus2 = net.add_bus("bus2", &abc);
    net.add_voltage_source(
        "source",
        bus1,
        &abc,
        vec![polar_deg(400.0, 30.0), polar_deg(400.0, -90.0), polar_deg(400.0, 150.0)],
    );
    net.add_potential_ref("pref", RefTarget::Bus { bus: bus1, phases: abc.clone() });
    // Zero positive sequence impedance: Z = z0/3 on every entry.
    let lp = LineParameters::from_sym("lp", cmplx!(0.3, 0.3), cmplx!(0.0), cmplx!(0.0), cmplx!(0.0))?;
    assert!(!lp.with_shunt());
    net.add_line("line", bus1, bus2, &abc, lp, 1.0, None);
    net.add_load("load", bus2, &abc, LoadKind::Power(vec![cmplx!(1000.0, 200.0); 3]));

    let res = solve(&mut net, &SolveOptions::default())?;
    // Delta currents sum to zero so the line drops no voltage.
    let v1 = res.bus("bus1").ok_or_else(|| format_err!("no bus1"))?.voltages();
    let v2 = res.bus("bus2").ok_or_else(|| format_err!("no bus2"))?.voltages();
    for (a, b) in v1.iter().zip(&v2) {
        assert!(close(*a, *b, 1e-6));
        assert!((b.norm() - 400.0).abs() < 1e-6);
    }
    let line = res.line("line").ok_or_else(|| format_err!("no line"))?;
    assert!(line.currents1.iter().all(|i| i.norm() > 1.0));
    Ok(())
}

#[test]
fn flexible_powers_stay_feasible() -> Result<()> {
    let s_max = 5000.0;
    let s_th = cmplx!(-4000.0, 1000.0);
    let parameters = [
        FlexibleParameter::p_max_u_production(240.0, 250.0, s_max),
        FlexibleParameter::p_max_u_consumption(200.0, 210.0, s_max),
        FlexibleParameter::q_u(200.0, 210.0, 235.0, 245.0, s_max),
        FlexibleParameter::pq_u_production(240.0, 250.0, 200.0, 210.0, 235.0, 245.0, s_max),
        FlexibleParameter::pq_u_consumption(200.0, 210.0, 200.0, 210.0, 235.0, 245.0, s_max),
    ];
    for parameter in &parameters {
        for k in 0..=200 {
            let u = 180.0 + 0.5 * k as f64;
            let s = compute_power(u, s_th, parameter);
            if !(s.norm() <= s_max * (1.0 + 1e-9)) {
                return Err(format_err!("{:?} at {} V gives {}", parameter, u, s));
            }
        }
    }

    // Full curtailment above u_max, none well below u_up.
    let p = &parameters[0];
    assert!(compute_power(260.0, s_th, p).re.abs() < 1.0);
    assert!(close(compute_power(220.0, s_th, p), s_th, 1e-6));

    // Constant parameters return the requested power unchanged.
    let big = cmplx!(1e6, -1e6);
    assert_eq!(compute_power(230.0, big, &FlexibleParameter::constant()), big);
    Ok(())
}

#[test]
fn flexible_feeder_respects_limits() -> Result<()> {
    let mut net = demo::flexible_feeder()?;
    let res = solve(&mut net, &SolveOptions::default())?;
    let load = res.load("flexible").ok_or_else(|| format_err!("no flexible load"))?;
    let powers = load.flexible_powers.as_ref().ok_or_else(|| format_err!("no flexible powers"))?;
    for s in powers {
        assert!(s.norm() <= 4000.0 * (1.0 + 1e-9));
        // Production only.
        assert!(s.re <= 1e-6);
    }
    Ok(())
}

#[test]
fn failed_solve_keeps_stale_results() -> Result<()> {
    let mut net = demo::simple_line()?;
    let first = net.solve(&SolveOptions::default())?;

    let load = net.element_id("load").ok_or_else(|| format_err!("no load"))?;
    net.set_load_powers(load, vec![cmplx!(8000.0, -2000.0), cmplx!(2500.0, -750.0), cmplx!(1000.0)])?;
    assert_eq!(net.results().err(), Some(Error::StaleResults));

    let options = SolveOptionsBuilder::default().tolerance(1e-10).max_iterations(1).build()?;
    match net.solve(&options) {
        Err(Error::NoConvergence { iterations: 1, .. }) => {}
        other => return Err(format_err!("unexpected {:?}", other)),
    }
    assert!(net.is_stale());
    assert_eq!(net.results().err(), Some(Error::StaleResults));
    let last = net.last_results().ok_or_else(|| format_err!("results dropped"))?;
    assert_eq!(last.iterations, first);

    net.solve(&SolveOptions::default())?;
    assert!(!net.is_stale());
    let res = net.results()?;
    let line = res.line("line").ok_or_else(|| format_err!("no line"))?;
    assert!(line.currents1[0].norm() > 30.0);
    Ok(())
}

#[test]
fn dangling_node_gives_singular_jacobian() -> Result<()> {
    let mut net = demo::simple_line()?;
    let bus2 = net.bus_id("bus2").ok_or_else(|| format_err!("no bus2"))?;
    let dangling = net.add_bus("dangling", &phases("abcn")?);
    // Nothing touches the neutral of the new bus.
    net.add_switch("sw", bus2, dangling, &phases("abc")?);

    match net.solve(&SolveOptions::default()) {
        Err(err @ Error::SingularJacobian { .. }) => {
            assert!(!err.is_structural());
            Ok(())
        }
        other => Err(format_err!("unexpected {:?}", other)),
    }
}

#[test]
fn setters_check_element_kind() -> Result<()> {
    let mut net = demo::transformer_feeder()?;
    let load = net.element_id("load").ok_or_else(|| format_err!("no load"))?;
    let tr = net.element_id("tr").ok_or_else(|| format_err!("no transformer"))?;
    let before = solve(&mut net, &SolveOptions::default())?;

    assert!(matches!(
        net.set_transformer_tap(load, 1.0),
        Err(Error::WrongElementKind { .. })
    ));
    assert!(matches!(
        net.set_load_kind(tr, LoadKind::Current(vec![cmplx!(1.0); 3])),
        Err(Error::WrongElementKind { .. })
    ));
    assert!(matches!(
        net.set_flexible_parameters(load, vec![]),
        Err(Error::WrongElementKind { .. })
    ));
    // Rejected changes leave the results current.
    assert!(!net.is_stale());
    assert!(net.results().is_ok());

    net.set_transformer_tap(tr, 1.025)?;
    let after = solve(&mut net, &SolveOptions::default())?;
    let u = |res: &crate::NetworkResults| -> Result<f64> {
        let lv = res.bus("lv").ok_or_else(|| format_err!("no lv bus"))?;
        Ok(lv.voltages()[0].norm())
    };
    assert!(u(&after)? > u(&before)?);

    net.set_transformer_tap(tr, -1.0)?;
    assert!(matches!(
        net.solve(&SolveOptions::default()),
        Err(Error::InvalidParameter { .. })
    ));
    Ok(())
}

#[test]
fn foreign_ids_are_not_found() -> Result<()> {
    let mut small = demo::simple_line()?;
    let big = demo::transformer_feeder()?;
    let load_bus = big.bus_id("load_bus").ok_or_else(|| format_err!("no load bus"))?;
    assert!(big.bus(load_bus).is_some());
    assert!(small.bus(load_bus).is_none());

    let ground = big.ground_id("ground").ok_or_else(|| format_err!("no ground"))?;
    assert!(small.ground(ground).is_none());

    let load = big.element_id("load").ok_or_else(|| format_err!("no load"))?;
    assert!(small.element(load).is_none());
    assert!(matches!(
        small.set_transformer_tap(load, 1.0),
        Err(Error::InvalidParameter { .. })
    ));
    Ok(())
}
