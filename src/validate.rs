use crate::error::{Error, Result};
use crate::ground::RefTarget;
use crate::load::branches;
use crate::network::{BusId, Element, GroundId, Network};
use crate::phase::{phase_code, Phase};

use petgraph::unionfind::UnionFind;
use std::collections::HashSet;

/// Galvanically connected sections of buses and grounds.
///
/// Buses joined by lines, switches or short circuits share a section, as do
/// grounds tied to a bus or serving as the return of a shunt line.
/// Transformers separate sections.
pub(crate) struct Sections {
    labels: Vec<usize>,
    n_buses: usize,
}

impl Sections {
    pub(crate) fn new(network: &Network) -> Self {
        let n_buses = network.buses.len();
        let mut uf = UnionFind::new(n_buses + network.grounds.len());
        let ground = |g: GroundId| n_buses + g.0;
        for element in &network.elements {
            match element {
                Element::Line(line) => {
                    uf.union(line.bus1.0, line.bus2.0);
                    if let Some(g) = line.ground {
                        uf.union(line.bus1.0, ground(g));
                    }
                }
                Element::Switch(switch) => {
                    uf.union(switch.bus1.0, switch.bus2.0);
                }
                Element::GroundConnection(gc) => {
                    uf.union(gc.bus.0, ground(gc.ground));
                }
                Element::ShortCircuit(sc) => {
                    if let Some(g) = sc.ground {
                        uf.union(sc.bus.0, ground(g));
                    }
                }
                Element::PotentialRef(_)
                | Element::Transformer(_)
                | Element::Load(_)
                | Element::Source(_) => {}
            }
        }
        Sections {
            labels: uf.into_labeling(),
            n_buses,
        }
    }

    pub(crate) fn of_bus(&self, bus: BusId) -> usize {
        self.labels[bus.0]
    }

    pub(crate) fn of_ground(&self, ground: GroundId) -> usize {
        self.labels[self.n_buses + ground.0]
    }

    pub(crate) fn of_target(&self, target: &RefTarget) -> usize {
        match target {
            RefTarget::Ground(g) => self.of_ground(*g),
            RefTarget::Bus { bus, .. } => self.of_bus(*bus),
        }
    }
}

fn check_phases(network: &Network, element: &str, bus: BusId, phases: &[Phase], floating_neutral: bool) -> Result<()> {
    if phases.is_empty() {
        return Err(Error::InvalidParameter {
            element: element.to_string(),
            reason: "no phases".to_string(),
        });
    }
    if let Some(w) = phases.windows(2).find(|w| w[0] == w[1]) {
        return Err(Error::DuplicatePhase {
            element: element.to_string(),
            phase: w[0].to_string(),
        });
    }
    let b = &network.buses[bus.0];
    let missing: Vec<Phase> = phases
        .iter()
        .copied()
        .filter(|p| !b.phases.contains(p) && !(floating_neutral && p.is_neutral()))
        .collect();
    if !missing.is_empty() {
        return Err(Error::PhaseMismatch {
            element: element.to_string(),
            bus: b.id.clone(),
            phases: phase_code(&missing),
            bus_phases: phase_code(&b.phases),
        });
    }
    Ok(())
}

fn check_ids(network: &Network) -> Result<()> {
    let duplicate = |kind: &'static str, ids: &mut dyn Iterator<Item = &str>| -> Result<()> {
        let mut seen = HashSet::new();
        for id in ids {
            if !seen.insert(id) {
                return Err(Error::DuplicateId {
                    kind,
                    id: id.to_string(),
                });
            }
        }
        Ok(())
    };
    duplicate("bus", &mut network.buses.iter().map(|b| b.id.as_str()))?;
    duplicate("ground", &mut network.grounds.iter().map(|g| g.id.as_str()))?;
    duplicate("element", &mut network.elements.iter().map(|e| e.id()))?;

    let (nb, ng) = (network.buses.len(), network.grounds.len());
    let unknown = |element: &str, what: &str| Error::InvalidParameter {
        element: element.to_string(),
        reason: format!("refers to a {} of another network", what),
    };
    for element in &network.elements {
        let id = element.id();
        let (buses, ground): (Vec<BusId>, Option<GroundId>) = match element {
            Element::PotentialRef(r) => match &r.target {
                RefTarget::Ground(g) => (vec![], Some(*g)),
                RefTarget::Bus { bus, .. } => (vec![*bus], None),
            },
            Element::GroundConnection(gc) => (vec![gc.bus], Some(gc.ground)),
            Element::Line(l) => (vec![l.bus1, l.bus2], l.ground),
            Element::Transformer(t) => (vec![t.bus_hv, t.bus_lv], None),
            Element::Load(l) => (vec![l.bus], None),
            Element::Source(s) => (vec![s.bus], None),
            Element::Switch(s) => (vec![s.bus1, s.bus2], None),
            Element::ShortCircuit(s) => (vec![s.bus], s.ground),
        };
        if buses.iter().any(|b| b.0 >= nb) {
            return Err(unknown(id, "bus"));
        }
        if ground.map_or(false, |g| g.0 >= ng) {
            return Err(unknown(id, "ground"));
        }
    }
    Ok(())
}

/// Checks that depend on the network structure only.
pub(crate) fn check_topology(network: &Network) -> Result<()> {
    check_ids(network)?;

    for bus in &network.buses {
        if bus.phases.is_empty() {
            return Err(Error::InvalidParameter {
                element: bus.id.clone(),
                reason: "no phases".to_string(),
            });
        }
        if let Some(w) = bus.phases.windows(2).find(|w| w[0] == w[1]) {
            return Err(Error::DuplicatePhase {
                element: bus.id.clone(),
                phase: w[0].to_string(),
            });
        }
    }

    for element in &network.elements {
        match element {
            Element::PotentialRef(r) => {
                if let RefTarget::Bus { bus, phases } = &r.target {
                    check_phases(network, &r.id, *bus, phases, false)?;
                }
            }
            Element::GroundConnection(gc) => {
                check_phases(network, &gc.id, gc.bus, &[gc.phase], false)?;
            }
            Element::Line(line) => {
                check_phases(network, &line.id, line.bus1, &line.phases, false)?;
                check_phases(network, &line.id, line.bus2, &line.phases, false)?;
                match (line.parameters.with_shunt(), line.ground) {
                    (true, None) => return Err(Error::MissingLineGround(line.id.clone())),
                    (false, Some(_)) => return Err(Error::UnexpectedLineGround(line.id.clone())),
                    _ => {}
                }
                if line.parameters.size() != line.phases.len() {
                    return Err(Error::InvalidParameter {
                        element: line.id.clone(),
                        reason: format!(
                            "{}x{} parameters {} for {} phases",
                            line.parameters.size(),
                            line.parameters.size(),
                            line.parameters.id,
                            line.phases.len()
                        ),
                    });
                }
                if !(line.length > 0.0 && line.length.is_finite()) {
                    return Err(Error::InvalidParameter {
                        element: line.id.clone(),
                        reason: format!("length must be positive, got {}", line.length),
                    });
                }
            }
            Element::Transformer(tr) => {
                check_phases(network, &tr.id, tr.bus_hv, &tr.phases_hv, false)?;
                check_phases(network, &tr.id, tr.bus_lv, &tr.phases_lv, false)?;
                tr.check_phases().map_err(|reason| Error::InvalidParameter {
                    element: tr.id.clone(),
                    reason,
                })?;
            }
            Element::Load(load) => {
                check_phases(network, &load.id, load.bus, &load.phases, true)?;
                if branches(&load.phases).is_empty() {
                    return Err(Error::InvalidParameter {
                        element: load.id.clone(),
                        reason: format!("no branch between phases {}", phase_code(&load.phases)),
                    });
                }
            }
            Element::Source(source) => {
                check_phases(network, &source.id, source.bus, &source.phases, true)?;
                if branches(&source.phases).is_empty() {
                    return Err(Error::InvalidParameter {
                        element: source.id.clone(),
                        reason: format!("no branch between phases {}", phase_code(&source.phases)),
                    });
                }
            }
            Element::Switch(switch) => {
                check_phases(network, &switch.id, switch.bus1, &switch.phases, false)?;
                check_phases(network, &switch.id, switch.bus2, &switch.phases, false)?;
            }
            Element::ShortCircuit(sc) => {
                check_phases(network, &sc.id, sc.bus, &sc.phases, false)?;
                if sc.phases.len() + sc.ground.map_or(0, |_| 1) < 2 {
                    return Err(Error::InvalidParameter {
                        element: sc.id.clone(),
                        reason: "a short circuit needs two phases or a phase and a ground".to_string(),
                    });
                }
            }
        }
    }

    check_references(network)
}

/// One potential reference per galvanically isolated section.
fn check_references(network: &Network) -> Result<()> {
    let sections = Sections::new(network);
    let mut refs: Vec<Vec<&str>> = vec![Vec::new(); network.buses.len() + network.grounds.len()];
    for element in &network.elements {
        if let Element::PotentialRef(r) = element {
            refs[sections.of_target(&r.target)].push(&r.id);
        }
    }

    let members = network
        .buses
        .iter()
        .enumerate()
        .map(|(b, bus)| (sections.of_bus(BusId(b)), &bus.id))
        .chain(
            network
                .grounds
                .iter()
                .enumerate()
                .map(|(g, ground)| (sections.of_ground(GroundId(g)), &ground.id)),
        );
    let mut seen = HashSet::new();
    for (section, member) in members {
        if !seen.insert(section) {
            continue;
        }
        match refs[section].len() {
            0 => return Err(Error::MissingPotentialRef(member.clone())),
            1 => {}
            _ => {
                return Err(Error::MultiplePotentialRefs {
                    element: member.clone(),
                    refs: refs[section].iter().map(|r| r.to_string()).collect(),
                })
            }
        }
    }
    Ok(())
}

/// Checks of values that setters may change between solves.
pub(crate) fn check_parameters(network: &Network) -> Result<()> {
    for element in &network.elements {
        match element {
            Element::Load(load) => {
                load.kind
                    .validate(branches(&load.phases).len())
                    .map_err(|reason| Error::InvalidParameter {
                        element: load.id.clone(),
                        reason,
                    })?;
            }
            Element::Source(source) => {
                let n = branches(&source.phases).len();
                if source.voltages.len() != n {
                    return Err(Error::InvalidParameter {
                        element: source.id.clone(),
                        reason: format!("{} voltages given for {} branches", source.voltages.len(), n),
                    });
                }
                if source.voltages.iter().any(|v| !v.is_finite()) {
                    return Err(Error::InvalidParameter {
                        element: source.id.clone(),
                        reason: "voltages must be finite".to_string(),
                    });
                }
            }
            Element::Transformer(tr) => {
                if !(tr.tap > 0.0 && tr.tap.is_finite()) {
                    return Err(Error::InvalidParameter {
                        element: tr.id.clone(),
                        reason: format!("tap must be positive, got {}", tr.tap),
                    });
                }
            }
            Element::PotentialRef(_)
            | Element::GroundConnection(_)
            | Element::Line(_)
            | Element::Switch(_)
            | Element::ShortCircuit(_) => {}
        }
    }
    Ok(())
}
