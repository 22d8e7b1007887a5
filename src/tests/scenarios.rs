use super::{close, solve};
use crate::demo;
use crate::error::Error;
use crate::ground::RefTarget;
use crate::math::polar_deg;
use crate::network::Network;
use crate::phase::{phases, Phase};
use crate::transformer::TransformerParameters;
use crate::SolveOptions;
use anyhow::{format_err, Result};
use num_complex::Complex64;

#[test]
fn unbalanced_load_on_simple_line() -> Result<()> {
    let mut net = demo::simple_line()?;
    let res = solve(&mut net, &SolveOptions::default())?;

    let line = res.line("line").ok_or_else(|| format_err!("no line result"))?;
    let magnitudes: Vec<f64> = line.currents1.iter().map(|i| i.norm()).collect();
    for (got, want) in magnitudes.iter().zip([24.1959, 11.3722, 0.0]) {
        if (got - want).abs() > 1e-3 {
            return Err(format_err!("line currents {:?}", magnitudes));
        }
    }
    for (i1, i2) in line.currents1.iter().zip(&line.currents2) {
        assert!(close(*i1, -i2, 1e-9));
    }

    let load = res.load("load").ok_or_else(|| format_err!("no load result"))?;
    for (v, want) in load.branch_voltages.iter().zip([215.746, 229.513, 235.788]) {
        if (v.norm() - want).abs() > 1e-2 {
            return Err(format_err!("load voltage {} expected {}", v.norm(), want));
        }
    }
    Ok(())
}

#[test]
fn shunt_line_losses_add_up() -> Result<()> {
    let mut net = demo::shunt_line()?;
    let res = solve(&mut net, &SolveOptions::default())?;
    let line = res.line("line").ok_or_else(|| format_err!("no line result"))?;

    // Charging currents leak to the ground.
    let leak: f64 = line
        .currents1
        .iter()
        .zip(&line.currents2)
        .map(|(i1, i2)| (i1 + i2).norm())
        .sum();
    assert!(leak > 1e-3, "no shunt current ({})", leak);

    for p in 0..line.phases.len() {
        let sum = line.series_losses[p] + line.shunt_losses[p];
        if !close(line.power_losses[p], sum, 1e-6 * (1.0 + sum.norm())) {
            return Err(format_err!(
                "phase {}: losses {} != {} + {}",
                line.phases[p],
                line.power_losses[p],
                line.series_losses[p],
                line.shunt_losses[p]
            ));
        }
    }

    // Total losses equal the power entering the line from both buses.
    let entering: Complex64 = line.powers1().iter().chain(&line.powers2()).sum();
    let vg = line.ground_potential.unwrap_or_default();
    let to_ground: Complex64 = line
        .shunt_currents1
        .iter()
        .chain(&line.shunt_currents2)
        .map(|i| vg * i.conj())
        .sum();
    assert!(close(line.total_losses(), entering - to_ground, 1e-6));
    // Series losses of a resistive-inductive line are positive.
    assert!(line.series_losses.iter().map(|s| s.re).sum::<f64>() > 0.0);
    Ok(())
}

#[test]
fn phase_to_phase_fault() -> Result<()> {
    let nominal = {
        let res = solve(&mut demo::simple_line()?, &SolveOptions::default())?;
        let line = res.line("line").ok_or_else(|| format_err!("no line result"))?;
        line.currents1[0].norm()
    };
    let mut net = demo::short_circuit()?;
    let res = solve(&mut net, &SolveOptions::default())?;

    let sc = res.short_circuit("sc").ok_or_else(|| format_err!("no short circuit result"))?;
    assert!(sc.ground_current.is_none());
    for i in &sc.currents {
        assert!(i.norm() > 10.0 * nominal, "fault current {}", i.norm());
    }
    assert!(close(sc.currents[0], -sc.currents[1], 1e-6));
    // 400 V across the two phase conductors.
    assert!((sc.currents[0].norm() - 400.0 / 0.7).abs() < 1.0);

    let line = res.line("line").ok_or_else(|| format_err!("no line result"))?;
    assert!(line.currents1[0].norm() > 10.0 * nominal);
    assert!(line.currents1[1].norm() > 10.0 * nominal);
    assert!(line.currents1[2].norm() < 1e-6);

    let bus2 = res.bus("bus2").ok_or_else(|| format_err!("no bus2 result"))?;
    let (va, vb) = (bus2.potentials[0], bus2.potentials[1]);
    assert!(close(va, vb, 1e-6));
    Ok(())
}

#[test]
fn two_references_fail_before_iterating() -> Result<()> {
    let mut net = demo::simple_line()?;
    let bus2 = net.bus_id("bus2").ok_or_else(|| format_err!("no bus2"))?;
    net.add_potential_ref("pref2", RefTarget::Bus { bus: bus2, phases: phases("n")? });

    match net.solve(&SolveOptions::default()) {
        Err(err @ Error::MultiplePotentialRefs { .. }) => assert!(err.is_structural()),
        other => return Err(format_err!("unexpected {:?}", other)),
    }
    assert_eq!(net.results().err(), Some(Error::NotSolved));
    Ok(())
}

#[test]
fn transformer_feeder_voltages() -> Result<()> {
    let mut net = demo::transformer_feeder()?;
    let res = solve(&mut net, &SolveOptions::default())?;

    let load_bus = res.bus("load_bus").ok_or_else(|| format_err!("no load bus result"))?;
    for v in load_bus.voltages() {
        if !(v.norm() > 200.0 && v.norm() < 250.0) {
            return Err(format_err!("load bus voltage {}", v.norm()));
        }
    }

    let tr = res.transformer("tr").ok_or_else(|| format_err!("no transformer result"))?;
    let losses = tr.power_losses();
    assert!(losses.re > 0.0 && losses.im > 0.0, "transformer losses {}", losses);

    let lv = res.bus("lv").ok_or_else(|| format_err!("no lv result"))?;
    let vn = lv.potential(Phase::N).ok_or_else(|| format_err!("no lv neutral"))?;
    assert!(vn.norm() < 1e-6);
    Ok(())
}

#[test]
fn unloaded_transformer_draws_no_load_losses() -> Result<()> {
    let (p0, s0) = (460.0, 0.023 * 160e3);
    let q0 = f64::sqrt(s0 * s0 - p0 * p0);
    for group in ["Dyn11", "Dd0", "Yyn0", "Yd11"] {
        let abc = phases("abc")?;
        let mut net = Network::new();
        let mv = net.add_bus("mv", &abc);
        net.add_voltage_source(
            "source",
            mv,
            &abc,
            vec![polar_deg(20e3, 30.0), polar_deg(20e3, -90.0), polar_deg(20e3, 150.0)],
        );
        net.add_potential_ref("pref_mv", RefTarget::Bus { bus: mv, phases: abc.clone() });

        let tp = TransformerParameters::from_tests("160kVA", group, 160e3, 20e3, 400.0, 0.023, p0, 2350.0, 0.04)?;
        if group.contains("yn") {
            let lv = net.add_bus("lv", &phases("abcn")?);
            net.add_transformer("tr", mv, lv, &abc, &phases("abcn")?, tp, 1.0);
            let ground = net.add_ground("ground");
            net.connect_ground("gc", ground, lv, Phase::N);
            net.add_potential_ref("pref_lv", RefTarget::Ground(ground));
        } else {
            let lv = net.add_bus("lv", &abc);
            net.add_transformer("tr", mv, lv, &abc, &abc, tp, 1.0);
            net.add_potential_ref("pref_lv", RefTarget::Bus { bus: lv, phases: abc.clone() });
        }

        let res = solve(&mut net, &SolveOptions::default())?;
        let tr = res.transformer("tr").ok_or_else(|| format_err!("no transformer result"))?;
        let losses = tr.power_losses();
        if (losses.re - p0).abs() > 1e-6 * p0 || (losses.im - q0).abs() > 1e-6 * q0 {
            return Err(format_err!("{}: no-load losses {} expected {} + {}j", group, losses, p0, q0));
        }
    }
    Ok(())
}
