//! ResNet-v1 topology lab.
//!
//! Builds parameterized ResNet-v1 topologies (optionally quantization
//! aware), profiles their FLOPs layer by layer, and reduces finished
//! hyperparameter-search sessions into a ranked accuracy-per-FLOP table.

pub mod error;
pub mod logging;
pub mod profile;
pub mod reduce;
pub mod topology;
pub mod tuner;

pub use error::{Error, Result};
pub use profile::{profile, LayerProfile, ModelProfile};
pub use reduce::{reduce, RankedTable, ReduceOptions, ResultsTable, TrialResult};
pub use topology::{build, NetworkConfig, TopologyGraph};
pub use tuner::{parse_sessions, Session, TunerKind};
