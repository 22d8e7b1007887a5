use crate::error::{Error, Result};
use crate::ground::{RefStamp, RefTarget};
use crate::line::{LineModel, LineStamp};
use crate::load::{branches, LoadStamp};
use crate::math::J;
use crate::network::{BusId, Element, Network};
use crate::phase::{phase_code, Phase};
use crate::source::SourceStamp;
use crate::switch::TieStamp;
use crate::transformer::{TransformerStamp, Windings};
use crate::validate;

use num_complex::Complex64;
use sparsetools::coo::Coo;
use sparsetools::csc::CSC;
use std::collections::BTreeMap;

pub(crate) const ONE: Complex64 = Complex64 { re: 1.0, im: 0.0 };

/// Residual and Jacobian contributions collected from the stamps.
///
/// Complex row `r` and unknown `c` split into the real rows `2r, 2r+1`
/// (real and imaginary parts) and the real columns `2c, 2c+1`.
pub(crate) struct Equations {
    residual: Vec<Complex64>,
    // (col, row) -> [∂Re/∂Re, ∂Re/∂Im, ∂Im/∂Re, ∂Im/∂Im]
    partials: Option<BTreeMap<(usize, usize), [f64; 4]>>,
}

impl Equations {
    pub(crate) fn new(size: usize, with_jacobian: bool) -> Self {
        Equations {
            residual: vec![Complex64::default(); size],
            partials: if with_jacobian {
                Some(BTreeMap::new())
            } else {
                None
            },
        }
    }

    pub(crate) fn add(&mut self, row: usize, value: Complex64) {
        self.residual[row] += value;
    }

    /// Holomorphic dependence of `row` on unknown `col`.
    pub(crate) fn linear(&mut self, row: usize, col: usize, coeff: Complex64) {
        self.partials(row, col, coeff, J * coeff);
    }

    /// Derivatives of `row` with respect to the real and imaginary parts of
    /// unknown `col`.
    pub(crate) fn partials(&mut self, row: usize, col: usize, d_re: Complex64, d_im: Complex64) {
        if let Some(partials) = self.partials.as_mut() {
            let block = partials.entry((col, row)).or_insert([0.0; 4]);
            block[0] += d_re.re;
            block[1] += d_im.re;
            block[2] += d_re.im;
            block[3] += d_im.im;
        }
    }

    pub(crate) fn residual(&self) -> &[Complex64] {
        &self.residual
    }

    pub(crate) fn real_residual(&self) -> Vec<f64> {
        self.residual.iter().flat_map(|f| [f.re, f.im]).collect()
    }

    pub(crate) fn jacobian(&self) -> CSC<usize, f64> {
        let n = 2 * self.residual.len();
        let mut jac: Coo<usize, f64> = Coo::with_size(n, n);
        if let Some(partials) = &self.partials {
            for (&(col, row), block) in partials {
                let (r, c) = (2 * row, 2 * col);
                let positions = [(r, c), (r, c + 1), (r + 1, c), (r + 1, c + 1)];
                for (&(i, j), &v) in positions.iter().zip(block) {
                    if v != 0.0 {
                        jac.push(i, j, v);
                    }
                }
            }
        }
        jac.to_csc()
    }
}

/// Equation contribution of one element.
#[derive(Debug, Clone)]
pub(crate) enum Stamp {
    PotentialRef(RefStamp),
    /// Switches, short circuits and ground connections.
    Tie(TieStamp),
    Line(LineStamp),
    Transformer(TransformerStamp),
    Load(LoadStamp),
    Source(SourceStamp),
}

/// Layout of the unknown vector and one stamp per network element.
#[derive(Debug, Clone)]
pub(crate) struct Assembly {
    pub(crate) size: usize,
    /// Unknown of every phase of every bus, in bus phase order.
    pub(crate) bus_nodes: Vec<Vec<usize>>,
    pub(crate) ground_nodes: Vec<usize>,
    /// Potential unknowns, as opposed to current unknowns.
    pub(crate) is_node: Vec<bool>,
    pub(crate) stamps: Vec<Stamp>,
    pub(crate) labels: Vec<String>,
}

struct Layout {
    is_node: Vec<bool>,
    labels: Vec<String>,
}

impl Layout {
    fn node(&mut self, label: String) -> usize {
        self.is_node.push(true);
        self.labels.push(label);
        self.labels.len() - 1
    }

    fn current(&mut self, label: String) -> usize {
        self.is_node.push(false);
        self.labels.push(label);
        self.labels.len() - 1
    }

    fn currents(&mut self, id: &str, n: usize) -> Vec<usize> {
        (0..n).map(|k| self.current(format!("{}.i{}", id, k))).collect()
    }
}

impl Assembly {
    pub(crate) fn new(network: &Network) -> Result<Assembly> {
        validate::check_topology(network)?;

        let mut layout = Layout {
            is_node: Vec::new(),
            labels: Vec::new(),
        };
        let bus_nodes: Vec<Vec<usize>> = network
            .buses
            .iter()
            .map(|bus| {
                bus.phases
                    .iter()
                    .map(|p| layout.node(format!("{}.{}", bus.id, p)))
                    .collect()
            })
            .collect();
        let ground_nodes: Vec<usize> = network
            .grounds
            .iter()
            .map(|g| layout.node(g.id.clone()))
            .collect();

        let nodes = |element: &str, bus: BusId, phases: &[Phase]| -> Result<Vec<usize>> {
            phases
                .iter()
                .map(|&p| bus_node(network, &bus_nodes, element, bus, p))
                .collect()
        };

        let mut stamps = Vec::with_capacity(network.elements.len());
        for element in &network.elements {
            let stamp = match element {
                Element::PotentialRef(pref) => {
                    let nodes = match &pref.target {
                        RefTarget::Ground(g) => vec![ground_nodes[g.0]],
                        RefTarget::Bus { bus, phases } => nodes(&pref.id, *bus, phases)?,
                    };
                    Stamp::PotentialRef(RefStamp {
                        nodes,
                        current: layout.current(format!("{}.i", pref.id)),
                    })
                }
                Element::GroundConnection(gc) => {
                    let node = bus_node(network, &bus_nodes, &gc.id, gc.bus, gc.phase)?;
                    Stamp::Tie(TieStamp {
                        pairs: vec![(node, ground_nodes[gc.ground.0])],
                        currents: vec![layout.current(format!("{}.i", gc.id))],
                    })
                }
                Element::Line(line) => {
                    let model = LineModel::new(line);
                    let n = line.phases.len();
                    let i1 = (0..n)
                        .map(|k| layout.current(format!("{}.i1.{}", line.id, line.phases[k])))
                        .collect();
                    let i2 = match model {
                        LineModel::Shunt { .. } => (0..n)
                            .map(|k| layout.current(format!("{}.i2.{}", line.id, line.phases[k])))
                            .collect(),
                        LineModel::Series { .. } => Vec::new(),
                    };
                    Stamp::Line(LineStamp {
                        nodes1: nodes(&line.id, line.bus1, &line.phases)?,
                        nodes2: nodes(&line.id, line.bus2, &line.phases)?,
                        ground: line.ground.map(|g| ground_nodes[g.0]),
                        i1,
                        i2,
                        model,
                    })
                }
                Element::Transformer(tr) => {
                    let windings = Windings::new(tr.parameters.vector_group);
                    let mut hv_nodes = nodes(&tr.id, tr.bus_hv, &tr.phases_hv)?;
                    if windings.hv_internal_star {
                        hv_nodes.push(layout.node(format!("{}.hv.n", tr.id)));
                    }
                    let mut lv_nodes = nodes(&tr.id, tr.bus_lv, &tr.phases_lv)?;
                    if windings.lv_internal_star {
                        lv_nodes.push(layout.node(format!("{}.lv.n", tr.id)));
                    }
                    let i1 = (0..windings.cores())
                        .map(|c| layout.current(format!("{}.i1.{}", tr.id, c)))
                        .collect();
                    let i2 = (0..windings.paths())
                        .map(|j| layout.current(format!("{}.i2.{}", tr.id, j)))
                        .collect();
                    Stamp::Transformer(TransformerStamp {
                        hv_nodes,
                        lv_nodes,
                        i1,
                        i2,
                        windings,
                    })
                }
                Element::Load(load) => {
                    let terminals = terminals(network, &bus_nodes, &mut layout, &load.id, load.bus, &load.phases)?;
                    Stamp::Load(LoadStamp {
                        terminals,
                        branches: branches(&load.phases),
                    })
                }
                Element::Source(source) => {
                    let terminals = terminals(network, &bus_nodes, &mut layout, &source.id, source.bus, &source.phases)?;
                    let currents = layout.currents(&source.id, terminals.len() - 1);
                    Stamp::Source(SourceStamp::new(terminals, source.is_star(), currents))
                }
                Element::Switch(switch) => {
                    let nodes1 = nodes(&switch.id, switch.bus1, &switch.phases)?;
                    let nodes2 = nodes(&switch.id, switch.bus2, &switch.phases)?;
                    let currents = layout.currents(&switch.id, nodes1.len());
                    Stamp::Tie(TieStamp::switch(&nodes1, &nodes2, currents))
                }
                Element::ShortCircuit(sc) => {
                    let mut tied = nodes(&sc.id, sc.bus, &sc.phases)?;
                    if let Some(g) = sc.ground {
                        tied.push(ground_nodes[g.0]);
                    }
                    let currents = layout.currents(&sc.id, tied.len() - 1);
                    Stamp::Tie(TieStamp::short_circuit(&tied, currents))
                }
            };
            stamps.push(stamp);
        }

        let assembly = Assembly {
            size: layout.labels.len(),
            bus_nodes,
            ground_nodes,
            is_node: layout.is_node,
            stamps,
            labels: layout.labels,
        };
        log::debug!(
            "assembled {} unknowns ({} potentials) for {} elements",
            assembly.size,
            assembly.is_node.iter().filter(|&&n| n).count(),
            network.elements.len()
        );
        Ok(assembly)
    }

    /// Evaluates every stamp at `x`.
    pub(crate) fn evaluate(&self, network: &Network, x: &[Complex64], with_jacobian: bool) -> Equations {
        let mut eq = Equations::new(self.size, with_jacobian);
        for (element, stamp) in network.elements.iter().zip(&self.stamps) {
            match (element, stamp) {
                (Element::PotentialRef(_), Stamp::PotentialRef(s)) => s.stamp(x, &mut eq),
                (
                    Element::GroundConnection(_) | Element::Switch(_) | Element::ShortCircuit(_),
                    Stamp::Tie(s),
                ) => s.stamp(x, &mut eq),
                (Element::Line(_), Stamp::Line(s)) => s.stamp(x, &mut eq),
                (Element::Transformer(tr), Stamp::Transformer(s)) => s.stamp(tr, x, &mut eq),
                (Element::Load(load), Stamp::Load(s)) => s.stamp(load, x, &mut eq),
                (Element::Source(source), Stamp::Source(s)) => s.stamp(source, x, &mut eq),
                _ => unreachable!("stamp of {} does not match its element", element.id()),
            }
        }
        eq
    }

    pub(crate) fn bus_node(&self, bus: BusId, phase: Phase, network: &Network) -> Option<usize> {
        let pos = network.buses[bus.0].phases.iter().position(|&p| p == phase)?;
        Some(self.bus_nodes[bus.0][pos])
    }
}

fn bus_node(
    network: &Network,
    bus_nodes: &[Vec<usize>],
    element: &str,
    bus: BusId,
    phase: Phase,
) -> Result<usize> {
    let b = &network.buses[bus.0];
    match b.phases.iter().position(|&p| p == phase) {
        Some(pos) => Ok(bus_nodes[bus.0][pos]),
        None => Err(Error::PhaseMismatch {
            element: element.to_string(),
            bus: b.id.clone(),
            phases: phase.to_string(),
            bus_phases: phase_code(&b.phases),
        }),
    }
}

/// Nodes of a load or source. A neutral the bus lacks becomes an internal
/// floating node.
fn terminals(
    network: &Network,
    bus_nodes: &[Vec<usize>],
    layout: &mut Layout,
    element: &str,
    bus: BusId,
    phases: &[Phase],
) -> Result<Vec<usize>> {
    let bus_phases = &network.buses[bus.0].phases;
    phases
        .iter()
        .map(|&p| {
            if p.is_neutral() && !bus_phases.contains(&p) {
                Ok(layout.node(format!("{}.n", element)))
            } else {
                bus_node(network, bus_nodes, element, bus, p)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmplx;
    use crate::demo;
    use anyhow::{format_err, Result};

    #[test]
    fn holomorphic_partials_interleave() -> Result<()> {
        let mut eq = Equations::new(2, true);
        let c = cmplx!(2.0, -3.0);
        eq.linear(1, 0, c);
        eq.add(1, cmplx!(1.0, 4.0));
        assert_eq!(eq.real_residual(), vec![0.0, 0.0, 1.0, 4.0]);

        let jac = eq.jacobian();
        assert_eq!(jac.cols(), 4);
        // Re(c x) = c.re x.re - c.im x.im, Im(c x) = c.im x.re + c.re x.im
        let expected = [(2, 0, 2.0), (2, 1, 3.0), (3, 0, -3.0), (3, 1, 2.0)];
        assert_eq!(jac.values().len(), expected.len());
        for (i, j, v) in expected {
            let start = jac.colptr()[j];
            let end = jac.colptr()[j + 1];
            let found = (start..end).any(|k| jac.rowidx()[k] == i && jac.values()[k] == v);
            if !found {
                return Err(format_err!("missing J[{}][{}] = {}", i, j, v));
            }
        }
        Ok(())
    }

    /// Every unknown owns exactly one row and the layout labels them.
    #[test]
    fn layout_of_simple_feeder() -> Result<()> {
        let net = demo::simple_line()?;
        let assembly = Assembly::new(&net)?;
        // 2 buses x 4 phases, 3 source currents, 4 line currents, 1 reference current.
        assert_eq!(assembly.size, 16);
        assert_eq!(assembly.is_node.iter().filter(|&&n| n).count(), 8);
        assert_eq!(assembly.labels[0], "bus1.a");
        Ok(())
    }

    /// Analytic Jacobian against central differences of the residual.
    #[test]
    fn jacobian_matches_finite_differences() -> Result<()> {
        for net in [demo::simple_line()?, demo::shunt_line()?, demo::transformer_feeder()?, demo::flexible_feeder()?] {
            let assembly = Assembly::new(&net)?;
            let x0 = crate::init::flat_start(&net, &assembly);
            // Move away from the flat start so that every load draws current.
            let x: Vec<Complex64> = x0
                .iter()
                .enumerate()
                .map(|(k, v)| v * 0.97 + cmplx!(0.3 + 0.01 * k as f64, -0.2))
                .collect();
            let eq = assembly.evaluate(&net, &x, true);
            let jac = eq.jacobian();
            let n = 2 * assembly.size;
            let mut dense = vec![vec![0.0; n]; n];
            for j in 0..n {
                for k in jac.colptr()[j]..jac.colptr()[j + 1] {
                    dense[jac.rowidx()[k]][j] += jac.values()[k];
                }
            }
            let h = 1e-6;
            for j in 0..n {
                let perturbed = |sign: f64| {
                    let mut xp = x.clone();
                    let d = if j % 2 == 0 { cmplx!(sign * h) } else { cmplx!(0.0, sign * h) };
                    xp[j / 2] += d;
                    assembly.evaluate(&net, &xp, false).real_residual()
                };
                let (fp, fm) = (perturbed(1.0), perturbed(-1.0));
                for i in 0..n {
                    let numeric = (fp[i] - fm[i]) / (2.0 * h);
                    let tol = 1e-4 * (1.0 + numeric.abs());
                    if (numeric - dense[i][j]).abs() > tol {
                        return Err(format_err!(
                            "J[{}][{}] ({} / {}) analytic {} numeric {}",
                            i,
                            j,
                            assembly.labels[i / 2],
                            assembly.labels[j / 2],
                            dense[i][j],
                            numeric
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}
