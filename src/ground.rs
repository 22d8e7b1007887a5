use crate::assemble::{Equations, ONE};
use crate::network::{BusId, GroundId};
use crate::phase::Phase;
use num_complex::Complex64;

/// Virtual node whose only constraint is the balance of the currents
/// injected into it. It is not at zero potential unless a
/// [`PotentialRef`] says so.
#[derive(Debug, Clone)]
pub struct Ground {
    pub id: String,
}

/// Where a potential reference applies.
#[derive(Debug, Clone, PartialEq)]
pub enum RefTarget {
    /// The ground potential is zero.
    Ground(GroundId),
    /// The sum of the potentials of `phases` of `bus` is zero. A single
    /// phase pins that phase.
    Bus { bus: BusId, phases: Vec<Phase> },
}

#[derive(Debug, Clone)]
pub struct PotentialRef {
    pub id: String,
    pub target: RefTarget,
}

/// Ideal tie between a ground and one phase of a bus.
#[derive(Debug, Clone)]
pub struct GroundConnection {
    pub id: String,
    pub ground: GroundId,
    pub bus: BusId,
    pub phase: Phase,
}

#[derive(Debug, Clone)]
pub(crate) struct RefStamp {
    pub(crate) nodes: Vec<usize>,
    pub(crate) current: usize,
}

impl RefStamp {
    /// `Σ V = 0`, with the (zero at the solution) reference current
    /// injected into every referenced node.
    pub(crate) fn stamp(&self, x: &[Complex64], eq: &mut Equations) {
        let i_ref = x[self.current];
        let mut sum = Complex64::default();
        for &node in &self.nodes {
            sum += x[node];
            eq.add(node, i_ref);
            eq.linear(node, self.current, ONE);
            eq.linear(self.current, node, ONE);
        }
        eq.add(self.current, sum);
    }
}
