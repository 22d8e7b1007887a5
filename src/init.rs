use crate::assemble::{Assembly, Stamp};
use crate::network::{Element, Network};

use num_complex::Complex64;
use std::collections::VecDeque;

fn mean(values: impl Iterator<Item = Complex64>) -> Complex64 {
    let (sum, n) = values.fold((Complex64::default(), 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        sum
    } else {
        sum / n as f64
    }
}

/// Initial iterate: source voltages propagated through the network as if
/// no current flowed. Currents start at zero.
pub(crate) fn flat_start(network: &Network, assembly: &Assembly) -> Vec<Complex64> {
    let mut x = vec![Complex64::default(); assembly.size];
    let mut known = vec![false; network.buses.len()];
    let mut queue = VecDeque::new();

    for (element, stamp) in network.elements.iter().zip(&assembly.stamps) {
        if let (Element::Source(source), Stamp::Source(s)) = (element, stamp) {
            if known[source.bus.0] {
                continue;
            }
            let mut v = vec![Complex64::default(); s.terminals.len()];
            if source.is_star() {
                for (k, &(from, _)) in s.branches.iter().enumerate() {
                    v[from] = source.voltages[k];
                }
            } else {
                for (k, &(from, to)) in s.branches.iter().enumerate() {
                    v[to] = v[from] - source.voltages[k];
                }
                let m = mean(v.iter().copied());
                v.iter_mut().for_each(|v| *v -= m);
            }
            for (&node, v) in s.terminals.iter().zip(v) {
                x[node] = v;
            }
            known[source.bus.0] = true;
            queue.push_back(source.bus.0);
        }
    }

    // Breadth-first through lines, switches and transformers (HV to LV).
    while let Some(bus) = queue.pop_front() {
        for (element, stamp) in network.elements.iter().zip(&assembly.stamps) {
            match (element, stamp) {
                (Element::Line(line), Stamp::Line(s)) => {
                    let (from, to) = (line.bus1.0, line.bus2.0);
                    let (src, dst, next) = if from == bus && !known[to] {
                        (&s.nodes1, &s.nodes2, to)
                    } else if to == bus && !known[from] {
                        (&s.nodes2, &s.nodes1, from)
                    } else {
                        continue;
                    };
                    for (&a, &b) in src.iter().zip(dst) {
                        x[b] = x[a];
                    }
                    known[next] = true;
                    queue.push_back(next);
                }
                (Element::Switch(switch), Stamp::Tie(s)) => {
                    let (from, to) = (switch.bus1.0, switch.bus2.0);
                    let next = if from == bus && !known[to] {
                        for &(a, b) in &s.pairs {
                            x[b] = x[a];
                        }
                        to
                    } else if to == bus && !known[from] {
                        for &(a, b) in &s.pairs {
                            x[a] = x[b];
                        }
                        from
                    } else {
                        continue;
                    };
                    known[next] = true;
                    queue.push_back(next);
                }
                (Element::Transformer(tr), Stamp::Transformer(s)) => {
                    if tr.bus_hv.0 != bus || known[tr.bus_lv.0] {
                        continue;
                    }
                    let w = &s.windings;
                    let n_phases = tr.phases_hv.len();
                    if w.hv_internal_star {
                        let star = mean(s.hv_nodes[..n_phases].iter().map(|&n| x[n]));
                        x[s.hv_nodes[n_phases]] = star;
                    }
                    let v1: Vec<Complex64> = s.hv_nodes.iter().map(|&n| x[n]).collect();
                    let emf = w.emf(tr.ratio(), &v1);
                    let t = vec![Complex64::default(); s.lv_nodes.len()];
                    if let Some((_, v2)) = w.solve_secondary(tr.parameters.z2, &emf, &t) {
                        for (&node, v) in s.lv_nodes.iter().zip(v2) {
                            x[node] = v;
                        }
                    }
                    known[tr.bus_lv.0] = true;
                    queue.push_back(tr.bus_lv.0);
                }
                _ => {}
            }
        }
    }

    // Floating star points sit at the mean of their phases.
    for (element, stamp) in network.elements.iter().zip(&assembly.stamps) {
        match (element, stamp) {
            (Element::Load(load), Stamp::Load(s)) => {
                float_neutral(&mut x, assembly, &s.terminals, load.is_star());
            }
            (Element::Source(source), Stamp::Source(s)) => {
                float_neutral(&mut x, assembly, &s.terminals, source.is_star());
            }
            (Element::Transformer(tr), Stamp::Transformer(s)) => {
                if s.windings.hv_internal_star {
                    let n = tr.phases_hv.len();
                    x[s.hv_nodes[n]] = mean(s.hv_nodes[..n].iter().map(|&k| x[k]));
                }
            }
            _ => {}
        }
    }

    // Grounds follow the bus phase they are tied to.
    for (element, stamp) in network.elements.iter().zip(&assembly.stamps) {
        if let (Element::GroundConnection(_), Stamp::Tie(s)) = (element, stamp) {
            for &(node, ground) in &s.pairs {
                x[ground] = x[node];
            }
        }
    }

    log::trace!(
        "flat start: {}",
        crate::debug::format_rect_vec(&x)
    );
    x
}

fn float_neutral(x: &mut [Complex64], assembly: &Assembly, terminals: &[usize], star: bool) {
    if !star {
        return;
    }
    let (neutral, phases) = match terminals.split_last() {
        Some(split) => split,
        None => return,
    };
    // Only internal nodes, bus neutrals keep their propagated value.
    let internal = !assembly.bus_nodes.iter().any(|nodes| nodes.contains(neutral));
    if internal {
        x[*neutral] = mean(phases.iter().map(|&k| x[k]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo;
    use crate::math::polar_deg;
    use anyhow::{format_err, Result};

    #[test]
    fn source_voltages_reach_the_load_bus() -> Result<()> {
        let net = demo::simple_line()?;
        let assembly = Assembly::new(&net)?;
        let x = flat_start(&net, &assembly);
        let bus2 = &assembly.bus_nodes[1];
        let expected = [polar_deg(230.94, 0.0), polar_deg(230.94, -120.0), polar_deg(230.94, 120.0)];
        for (k, v) in expected.iter().enumerate() {
            if (x[bus2[k]] - v).norm() > 1e-9 {
                return Err(format_err!("phase {} got {}", k, x[bus2[k]]));
            }
        }
        assert_eq!(x[bus2[3]], Complex64::default());
        Ok(())
    }

    #[test]
    fn transformer_secondary_is_energized() -> Result<()> {
        let net = demo::transformer_feeder()?;
        let assembly = Assembly::new(&net)?;
        let x = flat_start(&net, &assembly);
        let lv = net.bus_id("lv").ok_or_else(|| format_err!("no lv bus"))?;
        let nodes = &assembly.bus_nodes[lv.0];
        let van = x[nodes[0]] - x[nodes[3]];
        if (van.norm() - 400.0 / 3f64.sqrt()).abs() > 1e-6 {
            return Err(format_err!("secondary phase voltage {}", van));
        }
        Ok(())
    }
}
