//! Declarative layer graph of a ResNet-v1 network.
//!
//! Every layer carries its inferred output shape, so malformed
//! configurations are rejected while the graph is assembled and the
//! profiler can read input shapes straight off the edges.

use std::collections::BTreeMap;
use std::fmt;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use super::config::{NetworkConfig, Variant};
use super::error::TopologyError;
use super::quant::{QuantizedBits, QuantizedRelu};

// ─── Shapes ───────────────────────────────────────────────────────

/// Per-sample tensor shape (batch dimension omitted).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Image {
        height: usize,
        width: usize,
        channels: usize,
    },
    Vector(usize),
}

impl Shape {
    pub fn image(height: usize, width: usize, channels: usize) -> Self {
        Shape::Image {
            height,
            width,
            channels,
        }
    }

    /// Element count, saturating at `usize::MAX`. Shapes inside a built
    /// graph never saturate.
    pub fn elements(&self) -> usize {
        self.checked_elements().unwrap_or(usize::MAX)
    }

    pub fn checked_elements(&self) -> Option<usize> {
        match *self {
            Shape::Image {
                height,
                width,
                channels,
            } => height.checked_mul(width)?.checked_mul(channels),
            Shape::Vector(n) => Some(n),
        }
    }

    pub fn channels(&self) -> usize {
        match *self {
            Shape::Image { channels, .. } => channels,
            Shape::Vector(n) => n,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Image {
                height,
                width,
                channels,
            } => write!(f, "{}x{}x{}", height, width, channels),
            Shape::Vector(n) => write!(f, "{}", n),
        }
    }
}

/// Output extent of a "same"-padded convolution with symmetric padding.
pub fn conv_extent(input: usize, kernel: usize, stride: usize) -> Option<usize> {
    let padding = same_padding(kernel);
    (input + 2 * padding)
        .checked_sub(kernel)
        .map(|span| span / stride + 1)
}

pub fn same_padding(kernel: usize) -> usize {
    kernel.saturating_sub(1) / 2
}

// ─── Layers ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum LayerKind {
    Input,
    Conv2d {
        filters: usize,
        kernel: usize,
        stride: usize,
        quantizer: Option<QuantizedBits>,
    },
    BatchNorm,
    /// ReLU, or its fixed-point variant.
    Activation { quantizer: Option<QuantizedRelu> },
    Add,
    AveragePool {
        pool_size: usize,
        quantizer: Option<QuantizedRelu>,
    },
    Flatten,
    Dense {
        units: usize,
        quantizer: Option<QuantizedBits>,
    },
    Softmax,
}

impl LayerKind {
    /// Keras-style name prefix.
    fn prefix(&self) -> &'static str {
        match self {
            LayerKind::Input => "input",
            LayerKind::Conv2d { quantizer: None, .. } => "conv2d",
            LayerKind::Conv2d { .. } => "q_conv2d",
            LayerKind::BatchNorm => "batch_normalization",
            LayerKind::Activation { quantizer: None } => "activation",
            LayerKind::Activation { .. } => "q_activation",
            LayerKind::Add => "add",
            LayerKind::AveragePool {
                quantizer: None, ..
            } => "average_pooling2d",
            LayerKind::AveragePool { .. } => "q_average_pooling2d",
            LayerKind::Flatten => "flatten",
            LayerKind::Dense { quantizer: None, .. } => "dense",
            LayerKind::Dense { .. } => "q_dense",
            LayerKind::Softmax => "softmax",
        }
    }

    pub fn is_quantized(&self) -> bool {
        match self {
            LayerKind::Conv2d { quantizer, .. } | LayerKind::Dense { quantizer, .. } => {
                quantizer.is_some()
            }
            LayerKind::Activation { quantizer } | LayerKind::AveragePool { quantizer, .. } => {
                quantizer.is_some()
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub kind: LayerKind,
    pub output_shape: Shape,
}

impl Layer {
    /// Trainable plus running-statistic parameters, given the input shape.
    /// `None` when the count does not fit in a `u64`.
    pub fn weights(&self, input: Option<Shape>) -> Option<u64> {
        let in_channels = input.map_or(0, |s| s.channels()) as u64;
        match self.kind {
            LayerKind::Conv2d {
                filters, kernel, ..
            } => {
                let (k, f) = (kernel as u64, filters as u64);
                k.checked_mul(k)?
                    .checked_mul(in_channels)?
                    .checked_mul(f)?
                    .checked_add(f)
            }
            // gamma, beta, moving mean, moving variance
            LayerKind::BatchNorm => (self.output_shape.channels() as u64).checked_mul(4),
            LayerKind::Dense { units, .. } => {
                let u = units as u64;
                in_channels.checked_mul(u)?.checked_add(u)
            }
            _ => Some(0),
        }
    }

    /// FLOPs of one sample through this layer (one multiply-accumulate
    /// counts as 2). `None` when the count does not fit in a `u64`.
    pub fn flops(&self, input: Option<Shape>) -> Option<u64> {
        let out = self.output_shape.checked_elements()? as u64;
        let (in_elements, in_channels) = match input {
            Some(shape) => (shape.checked_elements()? as u64, shape.channels() as u64),
            None => (0, 0),
        };
        match self.kind {
            LayerKind::Input | LayerKind::Flatten => Some(0),
            LayerKind::Conv2d { kernel, .. } => {
                let k = kernel as u64;
                2u64.checked_mul(k)?
                    .checked_mul(k)?
                    .checked_mul(in_channels)?
                    .checked_mul(out)
            }
            LayerKind::Dense { units, .. } => {
                2u64.checked_mul(in_elements)?.checked_mul(units as u64)
            }
            LayerKind::BatchNorm => out.checked_mul(2),
            LayerKind::Activation { .. } | LayerKind::Add => Some(out),
            LayerKind::AveragePool { .. } => Some(in_elements),
            LayerKind::Softmax => out.checked_mul(3),
        }
    }
}

/// A layer together with the shapes flowing into it.
#[derive(Debug, Clone)]
pub struct LayerNode<'a> {
    pub layer: &'a Layer,
    pub inputs: Vec<Shape>,
}

impl LayerNode<'_> {
    pub fn input_shape(&self) -> Option<Shape> {
        self.inputs.first().copied()
    }
}

// ─── Graph ────────────────────────────────────────────────────────

/// Layer DAG with a single input and a single output node.
#[derive(Debug, Clone)]
pub struct TopologyGraph {
    graph: DiGraph<Layer, ()>,
    input: NodeIndex,
    output: NodeIndex,
    flops: u64,
    weights: u64,
}

impl TopologyGraph {
    /// Layers in dependency order, each with its input shapes.
    pub fn walk(&self) -> Vec<LayerNode<'_>> {
        let order =
            toposort(&self.graph, None).unwrap_or_else(|_| self.graph.node_indices().collect());
        order
            .into_iter()
            .map(|idx| {
                let mut producers: Vec<NodeIndex> = self
                    .graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .collect();
                producers.sort();
                LayerNode {
                    layer: &self.graph[idx],
                    inputs: producers
                        .into_iter()
                        .map(|p| self.graph[p].output_shape)
                        .collect(),
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn input_shape(&self) -> Shape {
        self.graph[self.input].output_shape
    }

    pub fn output_shape(&self) -> Shape {
        self.graph[self.output].output_shape
    }

    /// One residual stack per shortcut sum.
    pub fn residual_stacks(&self) -> usize {
        self.graph
            .node_weights()
            .filter(|l| l.kind == LayerKind::Add)
            .count()
    }

    /// Number of layers whose name starts with `prefix`.
    pub fn count_kind(&self, prefix: &str) -> usize {
        self.graph
            .node_weights()
            .filter(|l| l.kind.prefix() == prefix)
            .count()
    }

    pub fn param_count(&self) -> u64 {
        self.weights
    }

    /// Sum of [`Layer::flops`] over every layer.
    pub fn total_flops(&self) -> u64 {
        self.flops
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.graph.node_weights().find(|l| l.name == name)
    }

    /// Output shape of the last residual sum's activation, i.e. the tensor
    /// handed to the pooling head.
    pub fn feature_shape(&self) -> Option<Shape> {
        self.walk()
            .into_iter()
            .find(|n| matches!(n.layer.kind, LayerKind::AveragePool { .. }))
            .and_then(|n| n.input_shape())
    }
}

// ─── Builder ──────────────────────────────────────────────────────

struct GraphBuilder<'c> {
    config: &'c NetworkConfig,
    graph: DiGraph<Layer, ()>,
    counters: BTreeMap<&'static str, usize>,
    flops: u64,
    weights: u64,
}

impl<'c> GraphBuilder<'c> {
    fn new(config: &'c NetworkConfig) -> Self {
        Self {
            config,
            graph: DiGraph::new(),
            counters: BTreeMap::new(),
            flops: 0,
            weights: 0,
        }
    }

    fn next_name(&mut self, kind: &LayerKind) -> String {
        let prefix = kind.prefix();
        let n = self.counters.entry(prefix).or_insert(0);
        let name = if *n == 0 {
            prefix.to_string()
        } else {
            format!("{}_{}", prefix, n)
        };
        *n += 1;
        name
    }

    /// Add a layer fed by `inputs`. Every size the profiler later derives
    /// from it is checked here, so overflow is reported at build time.
    fn push(
        &mut self,
        kind: LayerKind,
        output_shape: Shape,
        inputs: &[NodeIndex],
    ) -> Result<NodeIndex, TopologyError> {
        let layer = Layer {
            name: self.next_name(&kind),
            kind,
            output_shape,
        };
        let input = inputs.first().map(|&idx| self.shape(idx));
        let overflow = || TopologyError::Overflow {
            layer: layer.name.clone(),
        };
        output_shape.checked_elements().ok_or_else(overflow)?;
        let flops = layer.flops(input).ok_or_else(overflow)?;
        let weights = layer.weights(input).ok_or_else(overflow)?;
        self.flops = self.flops.checked_add(flops).ok_or_else(overflow)?;
        self.weights = self.weights.checked_add(weights).ok_or_else(overflow)?;

        let idx = self.graph.add_node(layer);
        for &src in inputs {
            self.graph.add_edge(src, idx, ());
        }
        Ok(idx)
    }

    fn shape(&self, idx: NodeIndex) -> Shape {
        self.graph[idx].output_shape
    }

    fn weight_quantizer(&self) -> Option<QuantizedBits> {
        self.config.quantization.as_ref().map(|q| q.weights())
    }

    fn activation_quantizer(&self) -> Option<QuantizedRelu> {
        self.config.quantization.as_ref().map(|q| q.activations())
    }

    fn input(&mut self) -> Result<NodeIndex, TopologyError> {
        let shape = Shape::image(
            self.config.input_height,
            self.config.input_width,
            self.config.input_channels,
        );
        self.push(LayerKind::Input, shape, &[])
    }

    fn conv(
        &mut self,
        from: NodeIndex,
        filters: usize,
        kernel: usize,
        stride: usize,
    ) -> Result<NodeIndex, TopologyError> {
        let kind = LayerKind::Conv2d {
            filters,
            kernel,
            stride,
            quantizer: self.weight_quantizer(),
        };
        let input = self.shape(from);
        let invalid = |reason: &str| TopologyError::InvalidLayer {
            layer: kind.prefix().to_string(),
            reason: reason.to_string(),
        };
        if filters == 0 {
            return Err(invalid("zero filters"));
        }
        if kernel == 0 {
            return Err(invalid("zero kernel size"));
        }
        if stride == 0 {
            return Err(invalid("zero stride"));
        }
        let Shape::Image { height, width, .. } = input else {
            return Err(invalid("convolution over a flat tensor"));
        };
        let underflow = || TopologyError::ShapeUnderflow {
            layer: kind.prefix().to_string(),
            kernel,
            input,
        };
        let out_h = conv_extent(height, kernel, stride).ok_or_else(underflow)?;
        let out_w = conv_extent(width, kernel, stride).ok_or_else(underflow)?;
        self.push(kind, Shape::image(out_h, out_w, filters), &[from])
    }

    fn batch_norm(&mut self, from: NodeIndex) -> Result<NodeIndex, TopologyError> {
        let shape = self.shape(from);
        self.push(LayerKind::BatchNorm, shape, &[from])
    }

    fn activation(&mut self, from: NodeIndex) -> Result<NodeIndex, TopologyError> {
        let shape = self.shape(from);
        let kind = LayerKind::Activation {
            quantizer: self.activation_quantizer(),
        };
        self.push(kind, shape, &[from])
    }

    fn add(&mut self, shortcut: NodeIndex, residual: NodeIndex) -> Result<NodeIndex, TopologyError> {
        let left = self.shape(shortcut);
        let right = self.shape(residual);
        if left != right {
            return Err(TopologyError::ShapeMismatch {
                layer: LayerKind::Add.prefix().to_string(),
                left,
                right,
            });
        }
        self.push(LayerKind::Add, left, &[shortcut, residual])
    }

    /// conv → BN → act → conv → BN on the residual branch.
    fn weight_layers(
        &mut self,
        x: NodeIndex,
        filters: usize,
        first_stride: usize,
    ) -> Result<NodeIndex, TopologyError> {
        let kernel = self.config.body_kernel;
        let y = self.conv(x, filters, kernel, first_stride)?;
        let y = self.batch_norm(y)?;
        let y = self.activation(y)?;
        let y = self.conv(y, filters, kernel, self.config.body_stride)?;
        self.batch_norm(y)
    }

    fn identity_stack(&mut self, x: NodeIndex, filters: usize) -> Result<NodeIndex, TopologyError> {
        let y = self.weight_layers(x, filters, self.config.body_stride)?;
        let sum = self.add(x, y)?;
        self.activation(sum)
    }

    fn projection_stack(
        &mut self,
        x: NodeIndex,
        filters: usize,
    ) -> Result<NodeIndex, TopologyError> {
        let stride = self.config.downsample_stride;
        let y = self.weight_layers(x, filters, stride)?;
        let shortcut = self.conv(x, filters, self.config.shortcut_kernel, stride)?;
        let sum = self.add(shortcut, y)?;
        self.activation(sum)
    }

    fn head(&mut self, x: NodeIndex) -> Result<NodeIndex, TopologyError> {
        let Shape::Image {
            height,
            width,
            channels,
        } = self.shape(x)
        else {
            return Err(TopologyError::InvalidLayer {
                layer: "average_pooling2d".into(),
                reason: "pooling over a flat tensor".into(),
            });
        };
        let pool_size = height.min(width);
        if pool_size == 0 {
            return Err(TopologyError::InvalidLayer {
                layer: "average_pooling2d".into(),
                reason: "empty feature map".into(),
            });
        }
        let pooled = Shape::image(
            (height - pool_size) / pool_size + 1,
            (width - pool_size) / pool_size + 1,
            channels,
        );
        let kind = LayerKind::AveragePool {
            pool_size,
            quantizer: self.activation_quantizer(),
        };
        let x = self.push(kind, pooled, &[x])?;
        let x = self.push(LayerKind::Flatten, Shape::Vector(pooled.elements()), &[x])?;

        let units = self.config.num_classes;
        if units == 0 {
            return Err(TopologyError::InvalidLayer {
                layer: "dense".into(),
                reason: "zero classes".into(),
            });
        }
        let kind = LayerKind::Dense {
            units,
            quantizer: self.weight_quantizer(),
        };
        let x = self.push(kind, Shape::Vector(units), &[x])?;
        self.push(LayerKind::Softmax, Shape::Vector(units), &[x])
    }
}

/// A zero-width quantizer cannot hold a value, and the model would run
/// those layers in float while the graph reports them quantized.
fn check_quantization(config: &NetworkConfig) -> Result<(), TopologyError> {
    let Some(q) = &config.quantization else {
        return Ok(());
    };
    let widths = [
        ("q_conv2d", "logit", q.logit_total_bits),
        ("q_activation", "activation", q.activation_total_bits),
    ];
    for (layer, what, bits) in widths {
        if bits == 0 {
            return Err(TopologyError::InvalidLayer {
                layer: layer.into(),
                reason: format!("zero {what} bit width"),
            });
        }
    }
    Ok(())
}

/// Assemble the layer graph for `config`.
pub fn build(config: &NetworkConfig) -> Result<TopologyGraph, TopologyError> {
    check_quantization(config)?;
    let mut b = GraphBuilder::new(config);
    let stages = config.stages();
    let stem_filters = config.filters[0];

    let input = b.input()?;
    let x = b.conv(input, stem_filters, config.body_kernel, config.body_stride)?;
    let x = b.batch_norm(x)?;
    let mut x = b.activation(x)?;

    match config.variant {
        Variant::Full => {
            x = b.identity_stack(x, stem_filters)?;
            for stage in stages.iter().skip(1).filter(|s| s.is_enabled()) {
                x = b.projection_stack(x, stage.filters)?;
            }
        }
        Variant::Tiny => {
            x = b.projection_stack(x, stem_filters)?;
        }
    }

    let output = b.head(x)?;
    Ok(TopologyGraph {
        graph: b.graph,
        input,
        output,
        flops: b.flops,
        weights: b.weights,
    })
}
