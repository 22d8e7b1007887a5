use crate::assemble::{Equations, ONE};
use crate::network::{BusId, GroundId};
use crate::phase::Phase;
use num_complex::Complex64;

/// Ideal closed switch between the same phases of two buses.
#[derive(Debug, Clone)]
pub struct Switch {
    pub id: String,
    pub bus1: BusId,
    pub bus2: BusId,
    pub phases: Vec<Phase>,
}

/// Bolted fault between phases of a bus, optionally to a ground.
#[derive(Debug, Clone)]
pub struct ShortCircuit {
    pub id: String,
    pub bus: BusId,
    pub phases: Vec<Phase>,
    pub ground: Option<GroundId>,
}

/// Equality of potentials between pairs of nodes, each pair carrying an
/// unknown current from the first node to the second.
#[derive(Debug, Clone)]
pub(crate) struct TieStamp {
    pub(crate) pairs: Vec<(usize, usize)>,
    pub(crate) currents: Vec<usize>,
}

impl TieStamp {
    pub(crate) fn switch(nodes1: &[usize], nodes2: &[usize], currents: Vec<usize>) -> Self {
        TieStamp {
            pairs: nodes1.iter().copied().zip(nodes2.iter().copied()).collect(),
            currents,
        }
    }

    /// Ties every node of `nodes` to the first one.
    pub(crate) fn short_circuit(nodes: &[usize], currents: Vec<usize>) -> Self {
        TieStamp {
            pairs: nodes[1..].iter().map(|&n| (nodes[0], n)).collect(),
            currents,
        }
    }

    pub(crate) fn stamp(&self, x: &[Complex64], eq: &mut Equations) {
        for (&(from, to), &k) in self.pairs.iter().zip(&self.currents) {
            let i = x[k];
            eq.add(from, i);
            eq.add(to, -i);
            eq.add(k, x[from] - x[to]);

            eq.linear(from, k, ONE);
            eq.linear(to, k, -ONE);
            eq.linear(k, from, ONE);
            eq.linear(k, to, -ONE);
        }
    }

    /// Current leaving each node into the tie.
    pub(crate) fn node_currents(&self, x: &[Complex64]) -> Vec<(usize, Complex64)> {
        let mut out = Vec::with_capacity(2 * self.pairs.len());
        for (&(from, to), &k) in self.pairs.iter().zip(&self.currents) {
            out.push((from, x[k]));
            out.push((to, -x[k]));
        }
        out
    }
}
