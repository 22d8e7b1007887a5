use thiserror::Error;

/// Errors raised while building, validating or solving a network.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("no potential reference in the galvanically isolated section containing {0}")]
    MissingPotentialRef(String),

    #[error("potential references {} share the galvanically isolated section containing {element}", .refs.join(", "))]
    MultiplePotentialRefs { element: String, refs: Vec<String> },

    #[error("phases {phases} of {element} are not available on {bus} ({bus_phases})")]
    PhaseMismatch {
        element: String,
        bus: String,
        phases: String,
        bus_phases: String,
    },

    #[error("phase {phase} is repeated in {element}")]
    DuplicatePhase { element: String, phase: String },

    #[error("{kind} id {id:?} is used more than once")]
    DuplicateId { kind: &'static str, id: String },

    #[error("line {0} has a shunt admittance but no ground")]
    MissingLineGround(String),

    #[error("line {0} has a ground but no shunt admittance")]
    UnexpectedLineGround(String),

    #[error("invalid parameter for {element}: {reason}")]
    InvalidParameter { element: String, reason: String },

    #[error("element {element} is not a {expected}")]
    WrongElementKind {
        element: String,
        expected: &'static str,
    },

    #[error("backward-forward sweep needs a radial network but {0} closes a loop")]
    RadialLoop(String),

    #[error("backward-forward sweep does not support the floating neutral of {0}")]
    FloatingNeutral(String),

    #[error("backward-forward sweep does not support {0}")]
    RadialUnsupported(String),

    #[error("singular Jacobian at iteration {iteration}: {reason}")]
    SingularJacobian { iteration: usize, reason: String },

    #[error("no convergence after {iterations} iterations (residual {residual:e})")]
    NoConvergence { iterations: usize, residual: f64 },

    #[error("the network has not been solved")]
    NotSolved,

    #[error("results are stale: the network changed or the last solve failed")]
    StaleResults,
}

impl Error {
    /// Errors that follow from the network definition alone and are
    /// raised before any iteration.
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            Error::SingularJacobian { .. }
                | Error::NoConvergence { .. }
                | Error::NotSolved
                | Error::StaleResults
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
