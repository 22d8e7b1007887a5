use crate::assemble::Assembly;
use crate::error::{Error, Result};
use crate::flexible::FlexibleParameter;
use crate::ground::{Ground, GroundConnection, PotentialRef, RefTarget};
use crate::line::{Line, LineParameters};
use crate::load::{Load, LoadKind};
use crate::phase::Phase;
use crate::results::NetworkResults;
use crate::source::VoltageSource;
use crate::switch::{ShortCircuit, Switch};
use crate::transformer::{Transformer, TransformerParameters};

use num_complex::Complex64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BusId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroundId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub(crate) usize);

/// Connection point with one potential per phase.
#[derive(Debug, Clone)]
pub struct Bus {
    pub id: String,
    pub phases: Vec<Phase>,
}

#[derive(Debug, Clone)]
pub enum Element {
    PotentialRef(PotentialRef),
    GroundConnection(GroundConnection),
    Line(Line),
    Transformer(Transformer),
    Load(Load),
    Source(VoltageSource),
    Switch(Switch),
    ShortCircuit(ShortCircuit),
}

impl Element {
    pub fn id(&self) -> &str {
        match self {
            Element::PotentialRef(e) => &e.id,
            Element::GroundConnection(e) => &e.id,
            Element::Line(e) => &e.id,
            Element::Transformer(e) => &e.id,
            Element::Load(e) => &e.id,
            Element::Source(e) => &e.id,
            Element::Switch(e) => &e.id,
            Element::ShortCircuit(e) => &e.id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Element::PotentialRef(_) => "potential reference",
            Element::GroundConnection(_) => "ground connection",
            Element::Line(_) => "line",
            Element::Transformer(_) => "transformer",
            Element::Load(_) => "load",
            Element::Source(_) => "voltage source",
            Element::Switch(_) => "switch",
            Element::ShortCircuit(_) => "short circuit",
        }
    }
}

/// Distribution network and its solver state.
///
/// Elements are added with the `add_*` methods, which only record them.
/// Structural checks run when the network is first solved after a
/// topology change.
#[derive(Debug, Clone, Default)]
pub struct Network {
    pub(crate) buses: Vec<Bus>,
    pub(crate) grounds: Vec<Ground>,
    pub(crate) elements: Vec<Element>,

    pub(crate) assembly: Option<Assembly>,
    /// Last converged unknown vector, used as a warm start.
    pub(crate) warm_start: Option<Vec<Complex64>>,
    pub(crate) results: Option<NetworkResults>,
    pub(crate) stale: bool,
}

fn sorted(phases: &[Phase]) -> Vec<Phase> {
    let mut phases = phases.to_vec();
    phases.sort();
    phases
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bus(&mut self, id: &str, phases: &[Phase]) -> BusId {
        self.topology_changed();
        self.buses.push(Bus {
            id: id.to_string(),
            phases: sorted(phases),
        });
        BusId(self.buses.len() - 1)
    }

    pub fn add_ground(&mut self, id: &str) -> GroundId {
        self.topology_changed();
        self.grounds.push(Ground { id: id.to_string() });
        GroundId(self.grounds.len() - 1)
    }

    fn add_element(&mut self, element: Element) -> ElementId {
        self.topology_changed();
        self.elements.push(element);
        ElementId(self.elements.len() - 1)
    }

    pub fn add_potential_ref(&mut self, id: &str, target: RefTarget) -> ElementId {
        let target = match target {
            RefTarget::Bus { bus, phases } => RefTarget::Bus {
                bus,
                phases: sorted(&phases),
            },
            target => target,
        };
        self.add_element(Element::PotentialRef(PotentialRef {
            id: id.to_string(),
            target,
        }))
    }

    /// Ties `ground` to one phase of `bus`.
    pub fn connect_ground(&mut self, id: &str, ground: GroundId, bus: BusId, phase: Phase) -> ElementId {
        self.add_element(Element::GroundConnection(GroundConnection {
            id: id.to_string(),
            ground,
            bus,
            phase,
        }))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_line(
        &mut self,
        id: &str,
        bus1: BusId,
        bus2: BusId,
        phases: &[Phase],
        parameters: LineParameters,
        length: f64,
        ground: Option<GroundId>,
    ) -> ElementId {
        self.add_element(Element::Line(Line {
            id: id.to_string(),
            bus1,
            bus2,
            phases: sorted(phases),
            parameters,
            length,
            ground,
        }))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_transformer(
        &mut self,
        id: &str,
        bus_hv: BusId,
        bus_lv: BusId,
        phases_hv: &[Phase],
        phases_lv: &[Phase],
        parameters: TransformerParameters,
        tap: f64,
    ) -> ElementId {
        self.add_element(Element::Transformer(Transformer {
            id: id.to_string(),
            bus_hv,
            bus_lv,
            phases_hv: sorted(phases_hv),
            phases_lv: sorted(phases_lv),
            parameters,
            tap,
        }))
    }

    pub fn add_load(&mut self, id: &str, bus: BusId, phases: &[Phase], kind: LoadKind) -> ElementId {
        self.add_element(Element::Load(Load {
            id: id.to_string(),
            bus,
            phases: sorted(phases),
            kind,
        }))
    }

    pub fn add_voltage_source(
        &mut self,
        id: &str,
        bus: BusId,
        phases: &[Phase],
        voltages: Vec<Complex64>,
    ) -> ElementId {
        self.add_element(Element::Source(VoltageSource {
            id: id.to_string(),
            bus,
            phases: sorted(phases),
            voltages,
        }))
    }

    pub fn add_switch(&mut self, id: &str, bus1: BusId, bus2: BusId, phases: &[Phase]) -> ElementId {
        self.add_element(Element::Switch(Switch {
            id: id.to_string(),
            bus1,
            bus2,
            phases: sorted(phases),
        }))
    }

    pub fn add_short_circuit(
        &mut self,
        id: &str,
        bus: BusId,
        phases: &[Phase],
        ground: Option<GroundId>,
    ) -> ElementId {
        self.add_element(Element::ShortCircuit(ShortCircuit {
            id: id.to_string(),
            bus,
            phases: sorted(phases),
            ground,
        }))
    }

    pub fn buses(&self) -> &[Bus] {
        &self.buses
    }

    pub fn grounds(&self) -> &[Ground] {
        &self.grounds
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// `None` for an id from another network.
    pub fn bus(&self, id: BusId) -> Option<&Bus> {
        self.buses.get(id.0)
    }

    pub fn ground(&self, id: GroundId) -> Option<&Ground> {
        self.grounds.get(id.0)
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id.0)
    }

    pub fn bus_id(&self, id: &str) -> Option<BusId> {
        self.buses.iter().position(|b| b.id == id).map(BusId)
    }

    pub fn ground_id(&self, id: &str) -> Option<GroundId> {
        self.grounds.iter().position(|g| g.id == id).map(GroundId)
    }

    pub fn element_id(&self, id: &str) -> Option<ElementId> {
        self.elements.iter().position(|e| e.id() == id).map(ElementId)
    }

    /// Applies a parameter change to one element. The results only go
    /// stale once the change is accepted.
    fn modify(&mut self, id: ElementId, change: impl FnOnce(&mut Element) -> Result<()>) -> Result<()> {
        let element = self.elements.get_mut(id.0).ok_or_else(|| Error::InvalidParameter {
            element: format!("#{}", id.0),
            reason: "no such element".to_string(),
        })?;
        change(element)?;
        self.stale = true;
        Ok(())
    }

    pub fn set_load_kind(&mut self, id: ElementId, kind: LoadKind) -> Result<()> {
        self.modify(id, |element| {
            as_load(element)?.kind = kind;
            Ok(())
        })
    }

    /// Replaces the powers of a power or flexible load.
    pub fn set_load_powers(&mut self, id: ElementId, powers: Vec<Complex64>) -> Result<()> {
        self.modify(id, |element| {
            let load = as_load(element)?;
            match &mut load.kind {
                LoadKind::Power(s) | LoadKind::Flexible { powers: s, .. } => {
                    *s = powers;
                    Ok(())
                }
                _ => Err(Error::WrongElementKind {
                    element: load.id.clone(),
                    expected: "power or flexible load",
                }),
            }
        })
    }

    pub fn set_flexible_parameters(&mut self, id: ElementId, parameters: Vec<FlexibleParameter>) -> Result<()> {
        self.modify(id, |element| {
            let load = as_load(element)?;
            match &mut load.kind {
                LoadKind::Flexible { parameters: p, .. } => {
                    *p = parameters;
                    Ok(())
                }
                _ => Err(Error::WrongElementKind {
                    element: load.id.clone(),
                    expected: "flexible load",
                }),
            }
        })
    }

    pub fn set_source_voltages(&mut self, id: ElementId, voltages: Vec<Complex64>) -> Result<()> {
        self.modify(id, |element| match element {
            Element::Source(source) => {
                source.voltages = voltages;
                Ok(())
            }
            other => Err(Error::WrongElementKind {
                element: other.id().to_string(),
                expected: "voltage source",
            }),
        })
    }

    pub fn set_transformer_tap(&mut self, id: ElementId, tap: f64) -> Result<()> {
        self.modify(id, |element| match element {
            Element::Transformer(tr) => {
                tr.tap = tap;
                Ok(())
            }
            other => Err(Error::WrongElementKind {
                element: other.id().to_string(),
                expected: "transformer",
            }),
        })
    }

    /// Results of the last solve, if it succeeded and nothing changed since.
    pub fn results(&self) -> Result<&NetworkResults> {
        match &self.results {
            None => Err(Error::NotSolved),
            Some(_) if self.stale => Err(Error::StaleResults),
            Some(results) => Ok(results),
        }
    }

    /// Results of the last successful solve, stale or not.
    pub fn last_results(&self) -> Option<&NetworkResults> {
        self.results.as_ref()
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Makes the next solve start from the propagated source voltages.
    pub fn invalidate_warm_start(&mut self) {
        self.warm_start = None;
    }

    fn topology_changed(&mut self) {
        self.assembly = None;
        self.warm_start = None;
        self.stale = true;
    }
}

fn as_load(element: &mut Element) -> Result<&mut Load> {
    match element {
        Element::Load(load) => Ok(load),
        other => Err(Error::WrongElementKind {
            element: other.id().to_string(),
            expected: "load",
        }),
    }
}
