use thiserror::Error;

use super::graph::Shape;

/// Why a configuration cannot be turned into a network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("layer {layer}: {reason}")]
    InvalidLayer { layer: String, reason: String },

    #[error("layer {layer}: kernel {kernel} does not fit input {input}")]
    ShapeUnderflow {
        layer: String,
        kernel: usize,
        input: Shape,
    },

    #[error("layer {layer}: cannot add {left} and {right}")]
    ShapeMismatch {
        layer: String,
        left: Shape,
        right: Shape,
    },

    #[error("layer {layer}: size overflows a 64-bit count")]
    Overflow { layer: String },
}
