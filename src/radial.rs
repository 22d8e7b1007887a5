use crate::assemble::{Assembly, Stamp};
use crate::debug::format_f64;
use crate::error::{Error, Result};
use crate::line::LineModel;
use crate::network::{Element, Network};
use crate::phase::has_neutral;
use crate::validate::Sections;

use full::slice::norm_inf;
use num_complex::Complex64;
use petgraph::unionfind::UnionFind;
use std::collections::VecDeque;

/// Branch of the feeder tree, oriented away from the source.
struct Branch {
    element: usize,
    /// For lines and switches, whether `bus1` is the parent.
    forward: bool,
}

struct Tree {
    /// Buses, parents before children.
    order: Vec<usize>,
    /// Branch feeding each bus, `None` at the roots.
    parent: Vec<Option<usize>>,
    branches: Vec<Branch>,
}

/// Currents of a branch found by the backward pass.
enum Flow {
    Line {
        /// Through the series impedance, parent to child.
        series: Vec<Complex64>,
        /// Entering the line at the parent end.
        send: Vec<Complex64>,
        /// Entering the line at the child end.
        receive: Vec<Complex64>,
    },
    /// Parent to child.
    Switch(Vec<Complex64>),
    Transformer {
        i1: Vec<Complex64>,
        i2: Vec<Complex64>,
        /// Entering the transformer at each LV node.
        lv_currents: Vec<Complex64>,
    },
}

/// Checks the sweep preconditions and orients the feeders.
fn feeder_tree(network: &Network, sections: &Sections) -> Result<Tree> {
    let n = network.buses.len();
    let mut uf = UnionFind::new(n);
    let mut adjacency: Vec<Vec<(usize, usize)>> = vec![Vec::new(); n];
    let mut ties = vec![0usize; network.grounds.len()];
    let mut roots: Vec<(usize, usize)> = Vec::new();

    let floating = |bus: usize, phases: &[crate::phase::Phase]| {
        has_neutral(phases) && !has_neutral(&network.buses[bus].phases)
    };

    for (e, element) in network.elements.iter().enumerate() {
        let edge = match element {
            Element::ShortCircuit(sc) => {
                return Err(Error::RadialUnsupported(format!("short circuit {}", sc.id)))
            }
            Element::Load(load) => {
                if floating(load.bus.0, &load.phases) {
                    return Err(Error::FloatingNeutral(load.id.clone()));
                }
                None
            }
            Element::Source(source) => {
                if floating(source.bus.0, &source.phases) {
                    return Err(Error::FloatingNeutral(source.id.clone()));
                }
                roots.push((e, source.bus.0));
                None
            }
            Element::GroundConnection(gc) => {
                ties[gc.ground.0] += 1;
                if ties[gc.ground.0] > 1 {
                    return Err(Error::RadialUnsupported(format!(
                        "ground {} tied to several bus phases",
                        network.grounds[gc.ground.0].id
                    )));
                }
                None
            }
            Element::PotentialRef(_) => None,
            Element::Line(line) => Some((line.bus1.0, line.bus2.0)),
            Element::Switch(switch) => Some((switch.bus1.0, switch.bus2.0)),
            Element::Transformer(tr) => {
                let vg = tr.parameters.vector_group;
                let w = crate::transformer::Windings::new(vg);
                if w.hv_internal_star || w.lv_internal_star {
                    return Err(Error::FloatingNeutral(tr.id.clone()));
                }
                if sections.of_bus(tr.bus_hv) == sections.of_bus(tr.bus_lv) {
                    return Err(Error::RadialUnsupported(format!(
                        "transformer {} with both windings in one galvanic section",
                        tr.id
                    )));
                }
                Some((tr.bus_hv.0, tr.bus_lv.0))
            }
        };
        if let Some((a, b)) = edge {
            if !uf.union(a, b) {
                return Err(Error::RadialLoop(element.id().to_string()));
            }
            adjacency[a].push((e, b));
            adjacency[b].push((e, a));
        }
    }

    let mut fed: Vec<Option<usize>> = vec![None; n];
    let mut tree = Tree {
        order: Vec::with_capacity(n),
        parent: vec![None; n],
        branches: Vec::new(),
    };
    for &(source, root) in &roots {
        if let Some(other) = fed[uf.find(root)] {
            return Err(Error::RadialUnsupported(format!(
                "several voltage sources ({}, {}) in one feeder",
                network.elements[other].id(),
                network.elements[source].id()
            )));
        }
        fed[uf.find(root)] = Some(source);

        let mut queue = VecDeque::from([root]);
        tree.order.push(root);
        let mut visited = vec![false; n];
        visited[root] = true;
        while let Some(bus) = queue.pop_front() {
            for &(e, other) in &adjacency[bus] {
                if visited[other] {
                    continue;
                }
                let forward = match &network.elements[e] {
                    Element::Line(line) => line.bus1.0 == bus,
                    Element::Switch(switch) => switch.bus1.0 == bus,
                    Element::Transformer(tr) => {
                        if tr.bus_hv.0 != bus {
                            return Err(Error::RadialUnsupported(format!(
                                "transformer {} fed from its LV side",
                                tr.id
                            )));
                        }
                        true
                    }
                    _ => true,
                };
                visited[other] = true;
                tree.parent[other] = Some(tree.branches.len());
                tree.branches.push(Branch { element: e, forward });
                tree.order.push(other);
                queue.push_back(other);
            }
        }
    }

    if let Some(b) = (0..n).find(|&b| fed[uf.find(b)].is_none()) {
        return Err(Error::RadialUnsupported(format!(
            "bus {} without a voltage source",
            network.buses[b].id
        )));
    }
    Ok(tree)
}

struct Backward {
    flows: Vec<Option<Flow>>,
    /// Current leaving each node into loads, ground ties and downstream
    /// branches.
    leaving: Vec<Complex64>,
    /// Current from each bus node into its ground tie.
    tie_currents: Vec<Complex64>,
}

fn backward(network: &Network, assembly: &Assembly, tree: &Tree, x: &[Complex64]) -> Result<Backward> {
    let mut leaving = vec![Complex64::default(); assembly.size];
    let mut ground_return = vec![Complex64::default(); assembly.size];

    for (element, stamp) in network.elements.iter().zip(&assembly.stamps) {
        match (element, stamp) {
            (Element::Load(load), Stamp::Load(s)) => {
                let state = s.evaluate(load, x);
                for (&node, i) in s.terminals.iter().zip(state.terminal_currents) {
                    leaving[node] += i;
                }
            }
            (Element::Line(_), Stamp::Line(s)) => {
                if let (LineModel::Shunt { f, .. }, Some(g)) = (&s.model, s.ground) {
                    for (p, fp) in f.iter().enumerate() {
                        ground_return[g] += fp * (x[s.nodes1[p]] + x[s.nodes2[p]] - 2.0 * x[g]);
                    }
                }
            }
            _ => {}
        }
    }
    let mut tie_currents = vec![Complex64::default(); assembly.size];
    for (element, stamp) in network.elements.iter().zip(&assembly.stamps) {
        if let (Element::GroundConnection(_), Stamp::Tie(s)) = (element, stamp) {
            for &(node, g) in &s.pairs {
                // Shunt currents collected by the ground return to the bus.
                tie_currents[node] = -ground_return[g];
                leaving[node] += tie_currents[node];
            }
        }
    }

    let mut flows: Vec<Option<Flow>> = (0..tree.branches.len()).map(|_| None).collect();
    for &bus in tree.order.iter().rev() {
        let b = match tree.parent[bus] {
            Some(b) => b,
            None => continue,
        };
        let branch = &tree.branches[b];
        let flow = match (&network.elements[branch.element], &assembly.stamps[branch.element]) {
            (Element::Line(_), Stamp::Line(s)) => {
                let (parent, child) = if branch.forward {
                    (&s.nodes1, &s.nodes2)
                } else {
                    (&s.nodes2, &s.nodes1)
                };
                let demand: Vec<Complex64> = child.iter().map(|&n| leaving[n]).collect();
                let (series, send) = match (&s.model, s.ground) {
                    (LineModel::Shunt { y_half, .. }, Some(g)) => {
                        let shunt = |nodes: &[usize]| {
                            let dv: Vec<Complex64> = nodes.iter().map(|&n| x[n] - x[g]).collect();
                            y_half.mul_vec(&dv)
                        };
                        let series: Vec<Complex64> =
                            demand.iter().zip(shunt(child.as_slice())).map(|(d, s)| d + s).collect();
                        let send = series.iter().zip(shunt(parent.as_slice())).map(|(i, s)| i + s).collect();
                        (series, send)
                    }
                    _ => (demand.clone(), demand.clone()),
                };
                for (&n, i) in parent.iter().zip(&send) {
                    leaving[n] += i;
                }
                Flow::Line {
                    series,
                    send,
                    receive: demand.iter().map(|d| -d).collect(),
                }
            }
            (Element::Switch(_), Stamp::Tie(s)) => {
                let demand: Vec<Complex64> = s
                    .pairs
                    .iter()
                    .map(|&(n1, n2)| leaving[if branch.forward { n2 } else { n1 }])
                    .collect();
                for (&(n1, n2), d) in s.pairs.iter().zip(&demand) {
                    leaving[if branch.forward { n1 } else { n2 }] += d;
                }
                Flow::Switch(demand)
            }
            (Element::Transformer(tr), Stamp::Transformer(s)) => {
                let w = &s.windings;
                let k = tr.ratio();
                let lv_currents: Vec<Complex64> = s.lv_nodes.iter().map(|&n| -leaving[n]).collect();
                let v1: Vec<Complex64> = s.hv_nodes.iter().map(|&n| x[n]).collect();
                let emf = w.emf(k, &v1);
                let (i2, _) = w
                    .solve_secondary(tr.parameters.z2, &emf, &lv_currents)
                    .ok_or_else(|| {
                        Error::RadialUnsupported(format!("transformer {} with a singular secondary", tr.id))
                    })?;
                let i1 = w.primary_currents(k, tr.parameters.ym, &v1, &i2);
                let hv_currents = w.k1.transpose().mul_vec(&i1);
                for (&n, i) in s.hv_nodes.iter().zip(hv_currents) {
                    leaving[n] += i;
                }
                Flow::Transformer { i1, i2, lv_currents }
            }
            _ => unreachable!("feeder branch {} is not a line, switch or transformer", branch.element),
        };
        flows[b] = Some(flow);
    }
    Ok(Backward {
        flows,
        leaving,
        tie_currents,
    })
}

fn forward(network: &Network, assembly: &Assembly, tree: &Tree, flows: &[Option<Flow>], x: &mut [Complex64]) -> Result<()> {
    for (element, stamp) in network.elements.iter().zip(&assembly.stamps) {
        if let (Element::Source(source), Stamp::Source(s)) = (element, stamp) {
            for (k, &(from, to)) in s.branches.iter().enumerate() {
                if source.is_star() {
                    x[s.terminals[from]] = x[s.terminals[to]] + source.voltages[k];
                } else {
                    x[s.terminals[to]] = x[s.terminals[from]] - source.voltages[k];
                }
            }
        }
    }

    for &bus in &tree.order {
        let b = match tree.parent[bus] {
            Some(b) => b,
            None => continue,
        };
        let branch = &tree.branches[b];
        match (
            &network.elements[branch.element],
            &assembly.stamps[branch.element],
            &flows[b],
        ) {
            (Element::Line(_), Stamp::Line(s), Some(Flow::Line { series, .. })) => {
                let (parent, child) = if branch.forward {
                    (&s.nodes1, &s.nodes2)
                } else {
                    (&s.nodes2, &s.nodes1)
                };
                let drop = s.model.z().mul_vec(series);
                for ((&p, &c), d) in parent.iter().zip(child).zip(drop) {
                    x[c] = x[p] - d;
                }
            }
            (Element::Switch(_), Stamp::Tie(s), Some(Flow::Switch(_))) => {
                for &(n1, n2) in &s.pairs {
                    if branch.forward {
                        x[n2] = x[n1];
                    } else {
                        x[n1] = x[n2];
                    }
                }
            }
            (Element::Transformer(tr), Stamp::Transformer(s), Some(Flow::Transformer { lv_currents, .. })) => {
                let w = &s.windings;
                let v1: Vec<Complex64> = s.hv_nodes.iter().map(|&n| x[n]).collect();
                let emf = w.emf(tr.ratio(), &v1);
                let (_, v2) = w
                    .solve_secondary(tr.parameters.z2, &emf, lv_currents)
                    .ok_or_else(|| {
                        Error::RadialUnsupported(format!("transformer {} with a singular secondary", tr.id))
                    })?;
                for (&n, v) in s.lv_nodes.iter().zip(v2) {
                    x[n] = v;
                }
            }
            _ => unreachable!("feeder branch {} has no flow", branch.element),
        }
    }
    Ok(())
}

/// Tied grounds follow their bus phase, free grounds balance the shunt
/// currents of their lines.
fn update_grounds(network: &Network, assembly: &Assembly, x: &mut [Complex64]) {
    let mut num = vec![Complex64::default(); assembly.size];
    let mut den = vec![Complex64::default(); assembly.size];
    let mut tied = vec![false; assembly.size];
    for (element, stamp) in network.elements.iter().zip(&assembly.stamps) {
        match (element, stamp) {
            (Element::GroundConnection(_), Stamp::Tie(s)) => {
                for &(node, g) in &s.pairs {
                    x[g] = x[node];
                    tied[g] = true;
                }
            }
            (Element::Line(_), Stamp::Line(s)) => {
                if let (LineModel::Shunt { f, .. }, Some(g)) = (&s.model, s.ground) {
                    for (p, fp) in f.iter().enumerate() {
                        num[g] += fp * (x[s.nodes1[p]] + x[s.nodes2[p]]);
                        den[g] += 2.0 * fp;
                    }
                }
            }
            _ => {}
        }
    }
    for &g in &assembly.ground_nodes {
        if !tied[g] && den[g].norm() > 0.0 {
            x[g] = num[g] / den[g];
        }
    }
}

/// Shifts every galvanic section so that its potential reference holds.
fn apply_references(network: &Network, assembly: &Assembly, sections: &Sections, x: &mut [Complex64]) {
    for (element, stamp) in network.elements.iter().zip(&assembly.stamps) {
        if let (Element::PotentialRef(r), Stamp::PotentialRef(s)) = (element, stamp) {
            let sum: Complex64 = s.nodes.iter().map(|&n| x[n]).sum();
            let offset = -sum / s.nodes.len() as f64;
            let section = sections.of_target(&r.target);
            for (b, nodes) in assembly.bus_nodes.iter().enumerate() {
                if sections.of_bus(crate::network::BusId(b)) == section {
                    nodes.iter().for_each(|&n| x[n] += offset);
                }
            }
            for (g, &n) in assembly.ground_nodes.iter().enumerate() {
                if sections.of_ground(crate::network::GroundId(g)) == section {
                    x[n] += offset;
                }
            }
        }
    }
}

/// Writes the branch currents of the converged sweep into the unknowns.
fn store_currents(network: &Network, assembly: &Assembly, tree: &Tree, bw: &Backward, x: &mut [Complex64]) {
    for (b, branch) in tree.branches.iter().enumerate() {
        match (&assembly.stamps[branch.element], &bw.flows[b]) {
            (Stamp::Line(s), Some(Flow::Line { send, receive, .. })) => {
                let (i1, i2) = if branch.forward { (send, receive) } else { (receive, send) };
                for (&k, &i) in s.i1.iter().zip(i1) {
                    x[k] = i;
                }
                for (&k, &i) in s.i2.iter().zip(i2) {
                    x[k] = i;
                }
            }
            (Stamp::Tie(s), Some(Flow::Switch(current))) => {
                let sign = if branch.forward { 1.0 } else { -1.0 };
                for (&k, &i) in s.currents.iter().zip(current) {
                    x[k] = sign * i;
                }
            }
            (Stamp::Transformer(s), Some(Flow::Transformer { i1, i2, .. })) => {
                for (&k, &i) in s.i1.iter().zip(i1) {
                    x[k] = i;
                }
                for (&k, &i) in s.i2.iter().zip(i2) {
                    x[k] = i;
                }
            }
            _ => {}
        }
    }
    for (element, stamp) in network.elements.iter().zip(&assembly.stamps) {
        match (element, stamp) {
            (Element::GroundConnection(_), Stamp::Tie(s)) => {
                for (&(node, _), &k) in s.pairs.iter().zip(&s.currents) {
                    x[k] = bw.tie_currents[node];
                }
            }
            (Element::Source(source), Stamp::Source(s)) => {
                // The source supplies whatever leaves its terminals.
                let mut supplied = Complex64::default();
                for (&(from, _), &k) in s.branches.iter().zip(&s.currents) {
                    let demand = bw.leaving[s.terminals[from]];
                    x[k] = if source.is_star() {
                        demand
                    } else {
                        supplied += demand;
                        supplied
                    };
                }
            }
            (Element::PotentialRef(_), Stamp::PotentialRef(s)) => {
                x[s.current] = Complex64::default();
            }
            _ => {}
        }
    }
}

/// Backward-forward sweep for radial feeders.
///
/// Experimental: the feeders must be trees with one voltage source each,
/// without short circuits or floating neutrals, and with every transformer
/// fed from its HV side. Iterates until no potential moves by more than
/// `tol` between two sweeps.
pub(crate) fn backward_forward(
    network: &Network,
    assembly: &Assembly,
    x: &mut [Complex64],
    tol: f64,
    max_it: usize,
) -> Result<usize> {
    log::warn!("the backward-forward sweep is experimental, edge cases are not guaranteed");

    let sections = Sections::new(network);
    let tree = feeder_tree(network, &sections)?;
    update_grounds(network, assembly, x);
    apply_references(network, assembly, &sections, x);

    let mut i = 0;
    loop {
        i += 1;

        let before: Vec<Complex64> = x.to_vec();
        let bw = backward(network, assembly, &tree, x)?;
        forward(network, assembly, &tree, &bw.flows, x)?;
        update_grounds(network, assembly, x);
        apply_references(network, assembly, &sections, x);

        let dv = (0..x.len())
            .filter(|&k| assembly.is_node[k])
            .map(|k| (x[k] - before[k]).norm())
            .fold(0.0, f64::max);
        log::debug!("sweep {}: max potential change {}", i, format_f64(dv));

        if dv < tol {
            let bw = backward(network, assembly, &tree, x)?;
            store_currents(network, assembly, &tree, &bw, x);
            let f = assembly.evaluate(network, x, false).real_residual();
            log::info!(
                "Backward-forward sweep converged in {} iterations (residual {}).",
                i,
                format_f64(norm_inf(&f))
            );
            return Ok(i);
        }
        if i >= max_it || !dv.is_finite() {
            log::info!("Backward-forward sweep did not converge in {} iterations.", i);
            return Err(Error::NoConvergence {
                iterations: i,
                residual: dv,
            });
        }
    }
}
