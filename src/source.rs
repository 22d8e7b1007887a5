use crate::assemble::{Equations, ONE};
use crate::network::BusId;
use crate::phase::{has_neutral, Phase};
use num_complex::Complex64;

/// Ideal voltage source.
///
/// Star sources (phases including `n`) impose phase-to-neutral voltages,
/// one per live phase. Delta sources take the phase-to-phase voltages
/// `ab, bc, ca` (or `ab` for two phases) and impose all but the last,
/// which follows from the others.
#[derive(Debug, Clone)]
pub struct VoltageSource {
    pub id: String,
    pub bus: BusId,
    pub phases: Vec<Phase>,
    pub voltages: Vec<Complex64>,
}

impl VoltageSource {
    pub fn is_star(&self) -> bool {
        has_neutral(&self.phases)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SourceStamp {
    /// Node of every source phase, the floating neutral included.
    pub(crate) terminals: Vec<usize>,
    /// Imposed branches as positions in `terminals`.
    pub(crate) branches: Vec<(usize, usize)>,
    /// Branch current unknowns, flowing out of the source into the `from`
    /// terminal.
    pub(crate) currents: Vec<usize>,
}

impl SourceStamp {
    pub(crate) fn new(terminals: Vec<usize>, star: bool, currents: Vec<usize>) -> Self {
        let branches = if star {
            let n = terminals.len() - 1;
            (0..n).map(|i| (i, n)).collect()
        } else {
            (0..terminals.len() - 1).map(|i| (i, i + 1)).collect()
        };
        SourceStamp {
            terminals,
            branches,
            currents,
        }
    }

    /// `V_from - V_to - U = 0`, the branch current leaving the `to` node
    /// and entering the `from` node.
    pub(crate) fn stamp(&self, source: &VoltageSource, x: &[Complex64], eq: &mut Equations) {
        for (k, (&(from, to), &ik)) in self.branches.iter().zip(&self.currents).enumerate() {
            let (nf, nt) = (self.terminals[from], self.terminals[to]);
            let i = x[ik];
            eq.add(nf, -i);
            eq.add(nt, i);
            eq.add(ik, x[nf] - x[nt] - source.voltages[k]);

            eq.linear(nf, ik, -ONE);
            eq.linear(nt, ik, ONE);
            eq.linear(ik, nf, ONE);
            eq.linear(ik, nt, -ONE);
        }
    }

    /// Current flowing from the bus into the source at each terminal.
    pub(crate) fn terminal_currents(&self, x: &[Complex64]) -> Vec<Complex64> {
        let mut out = vec![Complex64::default(); self.terminals.len()];
        for (&(from, to), &ik) in self.branches.iter().zip(&self.currents) {
            out[from] -= x[ik];
            out[to] += x[ik];
        }
        out
    }
}
