//! Per-sensor state: the registry of known sensors, their aliases, and the
//! duplicate/rate suppression applied to every reading.

pub mod alias;
pub mod dedup;
pub mod tree;

pub use alias::bootstrap_aliases;
pub use dedup::{DedupEngine, Decision};
pub use tree::{NodeId, SensorNode, SensorTree};
