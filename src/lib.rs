//! Unbalanced multi-phase load flow for distribution networks.
//!
//! A [`Network`] is built from buses, grounds and elements, then solved
//! in place:
//!
//! ```no_run
//! use distflow::{demo, SolveOptions};
//!
//! let mut net = demo::simple_line()?;
//! let iterations = net.solve(&SolveOptions::default())?;
//! let results = net.results()?;
//! println!("{} iterations, {:?}", iterations, results.bus("bus2"));
//! # Ok::<(), distflow::Error>(())
//! ```

mod assemble;
mod init;
mod newton;
mod radial;
mod solve;
mod validate;

pub mod debug;
pub mod demo;
pub mod dense;
mod error;
pub mod flexible;
mod ground;
mod line;
mod load;
pub mod math;
mod network;
mod options;
mod phase;
mod results;
mod source;
mod switch;
mod transformer;

pub use dense::CMatrix;
pub use error::*;
pub use flexible::{compute_power, Control, FlexibleParameter, Projection, ProjectionKind};
pub use ground::{Ground, GroundConnection, PotentialRef, RefTarget};
pub use line::{Line, LineParameters};
pub use load::{Load, LoadKind};
pub use network::*;
pub use newton::{LogProgress, ProgressMonitor};
pub use options::*;
pub use phase::*;
pub use results::*;
pub use source::VoltageSource;
pub use switch::{ShortCircuit, Switch};
pub use transformer::{HvWinding, LvWinding, Transformer, TransformerParameters, VectorGroup};

#[cfg(test)]
mod tests;
