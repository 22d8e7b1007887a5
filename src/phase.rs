use crate::error::{Error, Result};
use std::fmt;

/// Conductor identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    A,
    B,
    C,
    N,
}

impl Phase {
    pub fn is_neutral(&self) -> bool {
        *self == Phase::N
    }

    pub fn as_char(&self) -> char {
        match self {
            Phase::A => 'a',
            Phase::B => 'b',
            Phase::C => 'c',
            Phase::N => 'n',
        }
    }

    fn from_char(c: char) -> Option<Phase> {
        match c.to_ascii_lowercase() {
            'a' => Some(Phase::A),
            'b' => Some(Phase::B),
            'c' => Some(Phase::C),
            'n' => Some(Phase::N),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Parses a phase code such as `"abcn"` or `"an"`.
pub fn phases(code: &str) -> Result<Vec<Phase>> {
    let parsed = code
        .chars()
        .map(|c| {
            Phase::from_char(c).ok_or_else(|| Error::InvalidParameter {
                element: code.to_string(),
                reason: format!("unknown phase {:?}", c),
            })
        })
        .collect::<Result<Vec<Phase>>>()?;
    if parsed.is_empty() {
        return Err(Error::InvalidParameter {
            element: code.to_string(),
            reason: "empty phase code".to_string(),
        });
    }
    Ok(parsed)
}

pub fn phase_code(phases: &[Phase]) -> String {
    phases.iter().map(|p| p.as_char()).collect()
}

pub(crate) fn has_neutral(phases: &[Phase]) -> bool {
    phases.contains(&Phase::N)
}

/// Phases other than the neutral, in order.
pub(crate) fn live(phases: &[Phase]) -> Vec<Phase> {
    phases.iter().copied().filter(|p| !p.is_neutral()).collect()
}
