use crate::assemble::{Assembly, Stamp};
use crate::load::{branches, LoadKind};
use crate::network::{Element, Network};
use crate::phase::Phase;

use num_complex::Complex64;

/// Currents are oriented from the bus into the element at every terminal,
/// powers are `V conj(I)` with the same orientation.
#[derive(Debug, Clone)]
pub struct BusResult {
    pub id: String,
    pub phases: Vec<Phase>,
    pub potentials: Vec<Complex64>,
}

impl BusResult {
    /// Phase-to-neutral voltages with a neutral, phase-to-phase voltages
    /// (`ab, bc, ca`) without.
    pub fn voltages(&self) -> Vec<Complex64> {
        branches(&self.phases)
            .into_iter()
            .map(|(i, j)| self.potentials[i] - self.potentials[j])
            .collect()
    }

    pub fn potential(&self, phase: Phase) -> Option<Complex64> {
        let k = self.phases.iter().position(|&p| p == phase)?;
        Some(self.potentials[k])
    }
}

#[derive(Debug, Clone)]
pub struct GroundResult {
    pub id: String,
    pub potential: Complex64,
}

#[derive(Debug, Clone)]
pub struct PotentialRefResult {
    pub id: String,
    /// Zero at a consistent solution.
    pub current: Complex64,
}

#[derive(Debug, Clone)]
pub struct GroundConnectionResult {
    pub id: String,
    pub ground: String,
    pub bus: String,
    pub phase: Phase,
    /// From the bus into the ground.
    pub current: Complex64,
}

#[derive(Debug, Clone)]
pub struct LineResult {
    pub id: String,
    pub bus1: String,
    pub bus2: String,
    pub phases: Vec<Phase>,
    pub potentials1: Vec<Complex64>,
    pub potentials2: Vec<Complex64>,
    pub currents1: Vec<Complex64>,
    pub currents2: Vec<Complex64>,
    /// Through the series impedance, from bus 1 to bus 2.
    pub series_currents: Vec<Complex64>,
    /// Into the shunt admittances at each end.
    pub shunt_currents1: Vec<Complex64>,
    pub shunt_currents2: Vec<Complex64>,
    pub ground_potential: Option<Complex64>,
    pub series_losses: Vec<Complex64>,
    pub shunt_losses: Vec<Complex64>,
    pub power_losses: Vec<Complex64>,
}

impl LineResult {
    pub fn powers1(&self) -> Vec<Complex64> {
        powers(&self.potentials1, &self.currents1)
    }

    pub fn powers2(&self) -> Vec<Complex64> {
        powers(&self.potentials2, &self.currents2)
    }

    pub fn total_losses(&self) -> Complex64 {
        self.power_losses.iter().sum()
    }
}

#[derive(Debug, Clone)]
pub struct TransformerResult {
    pub id: String,
    pub bus_hv: String,
    pub bus_lv: String,
    pub phases_hv: Vec<Phase>,
    pub phases_lv: Vec<Phase>,
    pub potentials_hv: Vec<Complex64>,
    pub potentials_lv: Vec<Complex64>,
    pub currents_hv: Vec<Complex64>,
    pub currents_lv: Vec<Complex64>,
}

impl TransformerResult {
    pub fn powers_hv(&self) -> Vec<Complex64> {
        powers(&self.potentials_hv, &self.currents_hv)
    }

    pub fn powers_lv(&self) -> Vec<Complex64> {
        powers(&self.potentials_lv, &self.currents_lv)
    }

    pub fn power_losses(&self) -> Complex64 {
        self.powers_hv().iter().chain(&self.powers_lv()).sum()
    }
}

#[derive(Debug, Clone)]
pub struct LoadResult {
    pub id: String,
    pub bus: String,
    pub phases: Vec<Phase>,
    pub potentials: Vec<Complex64>,
    pub currents: Vec<Complex64>,
    pub branch_voltages: Vec<Complex64>,
    pub branch_currents: Vec<Complex64>,
    pub branch_powers: Vec<Complex64>,
    /// Power realized by each branch of a flexible load.
    pub flexible_powers: Option<Vec<Complex64>>,
}

#[derive(Debug, Clone)]
pub struct SourceResult {
    pub id: String,
    pub bus: String,
    pub phases: Vec<Phase>,
    pub potentials: Vec<Complex64>,
    pub currents: Vec<Complex64>,
}

impl SourceResult {
    /// Negative when the source feeds the network.
    pub fn powers(&self) -> Vec<Complex64> {
        powers(&self.potentials, &self.currents)
    }
}

#[derive(Debug, Clone)]
pub struct SwitchResult {
    pub id: String,
    pub bus1: String,
    pub bus2: String,
    pub phases: Vec<Phase>,
    pub currents1: Vec<Complex64>,
    pub currents2: Vec<Complex64>,
}

#[derive(Debug, Clone)]
pub struct ShortCircuitResult {
    pub id: String,
    pub bus: String,
    pub phases: Vec<Phase>,
    pub currents: Vec<Complex64>,
    /// Into the ground, for a fault to ground.
    pub ground_current: Option<Complex64>,
}

fn powers(v: &[Complex64], i: &[Complex64]) -> Vec<Complex64> {
    v.iter().zip(i).map(|(v, i)| v * i.conj()).collect()
}

/// Converged state of a network.
#[derive(Debug, Clone, Default)]
pub struct NetworkResults {
    pub iterations: usize,
    pub buses: Vec<BusResult>,
    pub grounds: Vec<GroundResult>,
    pub potential_refs: Vec<PotentialRefResult>,
    pub ground_connections: Vec<GroundConnectionResult>,
    pub lines: Vec<LineResult>,
    pub transformers: Vec<TransformerResult>,
    pub loads: Vec<LoadResult>,
    pub sources: Vec<SourceResult>,
    pub switches: Vec<SwitchResult>,
    pub short_circuits: Vec<ShortCircuitResult>,
}

impl NetworkResults {
    pub(crate) fn new(network: &Network, assembly: &Assembly, x: &[Complex64], iterations: usize) -> Self {
        let at = |nodes: &[usize]| -> Vec<Complex64> { nodes.iter().map(|&n| x[n]).collect() };
        let bus_id = |b: usize| network.buses[b].id.clone();

        let mut results = NetworkResults {
            iterations,
            buses: network
                .buses
                .iter()
                .zip(&assembly.bus_nodes)
                .map(|(bus, nodes)| BusResult {
                    id: bus.id.clone(),
                    phases: bus.phases.clone(),
                    potentials: at(nodes),
                })
                .collect(),
            grounds: network
                .grounds
                .iter()
                .zip(&assembly.ground_nodes)
                .map(|(g, &n)| GroundResult {
                    id: g.id.clone(),
                    potential: x[n],
                })
                .collect(),
            ..Default::default()
        };

        for (element, stamp) in network.elements.iter().zip(&assembly.stamps) {
            match (element, stamp) {
                (Element::PotentialRef(r), Stamp::PotentialRef(s)) => {
                    results.potential_refs.push(PotentialRefResult {
                        id: r.id.clone(),
                        current: x[s.current],
                    });
                }
                (Element::GroundConnection(gc), Stamp::Tie(s)) => {
                    results.ground_connections.push(GroundConnectionResult {
                        id: gc.id.clone(),
                        ground: network.grounds[gc.ground.0].id.clone(),
                        bus: bus_id(gc.bus.0),
                        phase: gc.phase,
                        current: x[s.currents[0]],
                    });
                }
                (Element::Line(line), Stamp::Line(s)) => {
                    let (v1, v2) = (at(&s.nodes1), at(&s.nodes2));
                    let (i1, i2) = s.end_currents(x);
                    let vg = s.ground.map(|g| x[g]);
                    let (ish1, ish2) = match (s.model.y_half(), vg) {
                        (Some(y), Some(vg)) => {
                            let shunt = |v: &[Complex64]| {
                                let dv: Vec<Complex64> = v.iter().map(|v| v - vg).collect();
                                y.mul_vec(&dv)
                            };
                            (shunt(&v1), shunt(&v2))
                        }
                        _ => {
                            let zero = vec![Complex64::default(); v1.len()];
                            (zero.clone(), zero)
                        }
                    };
                    let series: Vec<Complex64> = i1.iter().zip(&ish1).map(|(i, s)| i - s).collect();
                    let vg0 = vg.unwrap_or_default();
                    let mut series_losses = Vec::with_capacity(v1.len());
                    let mut shunt_losses = Vec::with_capacity(v1.len());
                    let mut power_losses = Vec::with_capacity(v1.len());
                    for p in 0..v1.len() {
                        series_losses.push((v1[p] - v2[p]) * series[p].conj());
                        shunt_losses.push((v1[p] - vg0) * ish1[p].conj() + (v2[p] - vg0) * ish2[p].conj());
                        power_losses.push(
                            v1[p] * i1[p].conj() + v2[p] * i2[p].conj() - vg0 * (ish1[p] + ish2[p]).conj(),
                        );
                    }
                    results.lines.push(LineResult {
                        id: line.id.clone(),
                        bus1: bus_id(line.bus1.0),
                        bus2: bus_id(line.bus2.0),
                        phases: line.phases.clone(),
                        potentials1: v1,
                        potentials2: v2,
                        currents1: i1,
                        currents2: i2,
                        series_currents: series,
                        shunt_currents1: ish1,
                        shunt_currents2: ish2,
                        ground_potential: vg,
                        series_losses,
                        shunt_losses,
                        power_losses,
                    });
                }
                (Element::Transformer(tr), Stamp::Transformer(s)) => {
                    let (ihv, ilv) = s.node_currents(x);
                    let (nhv, nlv) = (tr.phases_hv.len(), tr.phases_lv.len());
                    results.transformers.push(TransformerResult {
                        id: tr.id.clone(),
                        bus_hv: bus_id(tr.bus_hv.0),
                        bus_lv: bus_id(tr.bus_lv.0),
                        phases_hv: tr.phases_hv.clone(),
                        phases_lv: tr.phases_lv.clone(),
                        potentials_hv: at(&s.hv_nodes[..nhv]),
                        potentials_lv: at(&s.lv_nodes[..nlv]),
                        currents_hv: ihv[..nhv].to_vec(),
                        currents_lv: ilv[..nlv].to_vec(),
                    });
                }
                (Element::Load(load), Stamp::Load(s)) => {
                    let state = s.evaluate(load, x);
                    let flexible_powers = match &load.kind {
                        LoadKind::Flexible { .. } => Some(state.branch_powers.clone()),
                        _ => None,
                    };
                    results.loads.push(LoadResult {
                        id: load.id.clone(),
                        bus: bus_id(load.bus.0),
                        phases: load.phases.clone(),
                        potentials: at(&s.terminals),
                        currents: state.terminal_currents,
                        branch_voltages: state.branch_voltages,
                        branch_currents: state.branch_currents,
                        branch_powers: state.branch_powers,
                        flexible_powers,
                    });
                }
                (Element::Source(source), Stamp::Source(s)) => {
                    results.sources.push(SourceResult {
                        id: source.id.clone(),
                        bus: bus_id(source.bus.0),
                        phases: source.phases.clone(),
                        potentials: at(&s.terminals),
                        currents: s.terminal_currents(x),
                    });
                }
                (Element::Switch(switch), Stamp::Tie(s)) => {
                    let currents1: Vec<Complex64> = s.currents.iter().map(|&k| x[k]).collect();
                    results.switches.push(SwitchResult {
                        id: switch.id.clone(),
                        bus1: bus_id(switch.bus1.0),
                        bus2: bus_id(switch.bus2.0),
                        phases: switch.phases.clone(),
                        currents2: currents1.iter().map(|i| -i).collect(),
                        currents1,
                    });
                }
                (Element::ShortCircuit(sc), Stamp::Tie(s)) => {
                    // Tie currents summed per node, bus phases first.
                    let mut nodes: Vec<usize> = sc
                        .phases
                        .iter()
                        .filter_map(|&p| assembly.bus_node(sc.bus, p, network))
                        .collect();
                    let n_phases = nodes.len();
                    if let Some(g) = sc.ground {
                        nodes.push(assembly.ground_nodes[g.0]);
                    }
                    let mut currents = vec![Complex64::default(); nodes.len()];
                    for (node, i) in s.node_currents(x) {
                        if let Some(k) = nodes.iter().position(|&n| n == node) {
                            currents[k] += i;
                        }
                    }
                    let ground_current = sc.ground.map(|_| -currents[n_phases]);
                    currents.truncate(n_phases);
                    results.short_circuits.push(ShortCircuitResult {
                        id: sc.id.clone(),
                        bus: bus_id(sc.bus.0),
                        phases: sc.phases.clone(),
                        currents,
                        ground_current,
                    });
                }
                _ => unreachable!("stamp of {} does not match its element", element.id()),
            }
        }
        results
    }

    pub fn bus(&self, id: &str) -> Option<&BusResult> {
        self.buses.iter().find(|r| r.id == id)
    }

    pub fn ground(&self, id: &str) -> Option<&GroundResult> {
        self.grounds.iter().find(|r| r.id == id)
    }

    pub fn line(&self, id: &str) -> Option<&LineResult> {
        self.lines.iter().find(|r| r.id == id)
    }

    pub fn transformer(&self, id: &str) -> Option<&TransformerResult> {
        self.transformers.iter().find(|r| r.id == id)
    }

    pub fn load(&self, id: &str) -> Option<&LoadResult> {
        self.loads.iter().find(|r| r.id == id)
    }

    pub fn source(&self, id: &str) -> Option<&SourceResult> {
        self.sources.iter().find(|r| r.id == id)
    }

    pub fn switch(&self, id: &str) -> Option<&SwitchResult> {
        self.switches.iter().find(|r| r.id == id)
    }

    pub fn short_circuit(&self, id: &str) -> Option<&ShortCircuitResult> {
        self.short_circuits.iter().find(|r| r.id == id)
    }

    /// Sum of the currents flowing from `bus` into elements through `phase`.
    pub fn current_balance(&self, bus: &str, phase: Phase) -> Complex64 {
        let mut sum = Complex64::default();
        let mut add = |b: &str, phases: &[Phase], currents: &[Complex64]| {
            if b == bus {
                if let Some(k) = phases.iter().position(|&p| p == phase) {
                    sum += currents[k];
                }
            }
        };
        for r in &self.lines {
            add(&r.bus1, &r.phases, &r.currents1);
            add(&r.bus2, &r.phases, &r.currents2);
        }
        for r in &self.transformers {
            add(&r.bus_hv, &r.phases_hv, &r.currents_hv);
            add(&r.bus_lv, &r.phases_lv, &r.currents_lv);
        }
        for r in &self.loads {
            add(&r.bus, &r.phases, &r.currents);
        }
        for r in &self.sources {
            add(&r.bus, &r.phases, &r.currents);
        }
        for r in &self.switches {
            add(&r.bus1, &r.phases, &r.currents1);
            add(&r.bus2, &r.phases, &r.currents2);
        }
        for r in &self.short_circuits {
            add(&r.bus, &r.phases, &r.currents);
        }
        for r in &self.ground_connections {
            add(&r.bus, &[r.phase], &[r.current]);
        }
        sum
    }
}
