//! ResNet-v1 topology construction for CIFAR-10.
//!
//! A [`NetworkConfig`] turns into two artifacts:
//!
//! - a [`TopologyGraph`]: the layer DAG with inferred shapes, used for
//!   validation and FLOP profiling;
//! - a [`ResNetV1`] burn module, trainable by any burn training loop.
//!
//! ```ignore
//! use resnet_lab::topology::{self, NetworkConfig};
//! let graph = topology::build(&NetworkConfig::new())?;
//! assert_eq!(graph.residual_stacks(), 3);
//! ```

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod graph;
pub mod model;
pub mod quant;

pub use config::{NetworkConfig, QuantConfig, StageConfig, Variant, MAX_STAGES};
pub use error::TopologyError;
pub use graph::{build, Layer, LayerKind, Shape, TopologyGraph};
pub use model::ResNetV1;

#[cfg(test)]
mod tests;
