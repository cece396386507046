//! Trainable ResNet-v1 as a burn `Module`.
//!
//! Mirrors the layer graph built by [`super::graph::build`]: the graph is
//! assembled first so shape errors surface before any weights are
//! allocated, and the classifier's input width is read off it.

use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{AvgPool2d, AvgPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, Initializer, Linear, LinearConfig, PaddingConfig2d};
use burn::prelude::*;
use burn::tensor::activation::{relu, softmax};
use burn::tensor::module::conv2d;
use burn::tensor::ops::ConvOptions;

use super::config::{NetworkConfig, Variant};
use super::error::TopologyError;
use super::graph::{self, same_padding, Shape};
use super::quant::{QuantizedBits, QuantizedRelu};

/// He-normal: std = sqrt(2 / fan_in).
fn he_normal() -> Initializer {
    Initializer::KaimingNormal {
        gain: std::f64::consts::SQRT_2,
        fan_out_only: false,
    }
}

// Keras BatchNormalization defaults (momentum 0.99, epsilon 1e-3) in
// burn's convention, where momentum weighs the new batch statistics.
fn batch_norm<B: Backend>(channels: usize, device: &B::Device) -> BatchNorm<B> {
    BatchNormConfig::new(channels)
        .with_momentum(0.01)
        .with_epsilon(1e-3)
        .init(device)
}

/// ReLU, or the fixed-point ReLU when `total_bits` is non-zero.
fn activate<B: Backend, const D: usize>(
    x: Tensor<B, D>,
    total_bits: usize,
    int_bits: usize,
) -> Tensor<B, D> {
    if total_bits == 0 {
        relu(x)
    } else {
        QuantizedRelu::new(total_bits as u32, int_bits as u32).apply(x)
    }
}

// ─── Quantization-aware layers ────────────────────────────────────

/// 2-D convolution whose kernel and bias are fake-quantized when
/// `total_bits > 0`.
#[derive(Module, Debug)]
pub struct QConv2d<B: Backend> {
    conv: Conv2d<B>,
    stride: usize,
    padding: usize,
    total_bits: usize,
    int_bits: usize,
}

impl<B: Backend> QConv2d<B> {
    fn new(
        channels: [usize; 2],
        kernel: usize,
        stride: usize,
        quantizer: Option<QuantizedBits>,
        device: &B::Device,
    ) -> Self {
        let padding = same_padding(kernel);
        let conv = Conv2dConfig::new(channels, [kernel, kernel])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(padding, padding))
            .with_initializer(he_normal())
            .init(device);
        let (total_bits, int_bits) =
            quantizer.map_or((0, 0), |q| (q.total_bits as usize, q.int_bits as usize));
        Self {
            conv,
            stride,
            padding,
            total_bits,
            int_bits,
        }
    }

    fn quantizer(&self) -> Option<QuantizedBits> {
        (self.total_bits > 0)
            .then(|| QuantizedBits::new(self.total_bits as u32, self.int_bits as u32))
    }

    pub fn kernel(&self) -> Tensor<B, 4> {
        self.conv.weight.val()
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let Some(q) = self.quantizer() else {
            return self.conv.forward(x);
        };
        let weight = q.apply(self.conv.weight.val());
        let bias = self.conv.bias.as_ref().map(|b| q.apply(b.val()));
        let options = ConvOptions::new(
            [self.stride, self.stride],
            [self.padding, self.padding],
            [1, 1],
            1,
        );
        conv2d(x, weight, bias, options)
    }
}

/// Dense layer with optional weight/bias fake quantization.
#[derive(Module, Debug)]
pub struct QLinear<B: Backend> {
    linear: Linear<B>,
    total_bits: usize,
    int_bits: usize,
}

impl<B: Backend> QLinear<B> {
    fn new(
        d_input: usize,
        d_output: usize,
        quantizer: Option<QuantizedBits>,
        device: &B::Device,
    ) -> Self {
        let (total_bits, int_bits) =
            quantizer.map_or((0, 0), |q| (q.total_bits as usize, q.int_bits as usize));
        Self {
            linear: LinearConfig::new(d_input, d_output)
                .with_initializer(he_normal())
                .init(device),
            total_bits,
            int_bits,
        }
    }

    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        if self.total_bits == 0 {
            return self.linear.forward(x);
        }
        let q = QuantizedBits::new(self.total_bits as u32, self.int_bits as u32);
        let out = x.matmul(q.apply(self.linear.weight.val()));
        match &self.linear.bias {
            Some(bias) => out + q.apply(bias.val()).unsqueeze_dim::<2>(0),
            None => out,
        }
    }
}

// ─── Residual stack ───────────────────────────────────────────────

/// Two weight layers plus an identity or projection shortcut.
#[derive(Module, Debug)]
pub struct ResidualStack<B: Backend> {
    conv_a: QConv2d<B>,
    bn_a: BatchNorm<B>,
    conv_b: QConv2d<B>,
    bn_b: BatchNorm<B>,
    shortcut: Option<QConv2d<B>>,
    act_total_bits: usize,
    act_int_bits: usize,
}

impl<B: Backend> ResidualStack<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let y = self.bn_a.forward(self.conv_a.forward(x.clone()));
        let y = activate(y, self.act_total_bits, self.act_int_bits);
        let y = self.bn_b.forward(self.conv_b.forward(y));
        let shortcut = match &self.shortcut {
            Some(projection) => projection.forward(x),
            None => x,
        };
        activate(shortcut + y, self.act_total_bits, self.act_int_bits)
    }

    pub fn has_projection(&self) -> bool {
        self.shortcut.is_some()
    }

    fn kernels(&self) -> Vec<&QConv2d<B>> {
        let mut out = vec![&self.conv_a, &self.conv_b];
        out.extend(self.shortcut.as_ref());
        out
    }
}

// ─── Network ──────────────────────────────────────────────────────

/// ResNet-v1 classifier: stem, residual stacks, pooled dense head.
#[derive(Module, Debug)]
pub struct ResNetV1<B: Backend> {
    stem: QConv2d<B>,
    stem_bn: BatchNorm<B>,
    pub stacks: Vec<ResidualStack<B>>,
    pool: AvgPool2d,
    dense: QLinear<B>,
    act_total_bits: usize,
    act_int_bits: usize,
    l1_penalty: f64,
    l2_penalty: f64,
}

impl<B: Backend> ResNetV1<B> {
    /// `[N, C, H, W]` images to `[N, num_classes]` class probabilities.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.stem_bn.forward(self.stem.forward(x));
        let mut x = activate(x, self.act_total_bits, self.act_int_bits);
        for stack in &self.stacks {
            x = stack.forward(x);
        }

        let x = self.pool.forward(x);
        let x = if self.act_total_bits > 0 {
            activate(x, self.act_total_bits, self.act_int_bits)
        } else {
            x
        };
        let [n, c, h, w] = x.dims();
        let logits = self.dense.forward(x.reshape([n, c * h * w]));
        softmax(logits, 1)
    }

    /// L1/L2 penalty over every convolution kernel.
    pub fn regularization(&self) -> Tensor<B, 1> {
        let mut kernels = vec![&self.stem];
        for stack in &self.stacks {
            kernels.extend(stack.kernels());
        }
        let device = self.stem.kernel().device();
        kernels
            .into_iter()
            .map(|conv| {
                let w = conv.kernel();
                let l1 = w.clone().abs().sum().mul_scalar(self.l1_penalty);
                let l2 = w.powf_scalar(2.0).sum().mul_scalar(self.l2_penalty);
                l1 + l2
            })
            .fold(Tensor::zeros([1], &device), |acc, t| acc + t)
    }
}

impl NetworkConfig {
    /// Allocate the trainable network described by this config.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<ResNetV1<B>, TopologyError> {
        let topology = graph::build(self)?;
        let weight_q = self.quantization.as_ref().map(|q| q.weights());
        let (act_total_bits, act_int_bits) = self
            .quantization
            .as_ref()
            .map_or((0, 0), |q| {
                (q.activation_total_bits as usize, q.activation_int_bits as usize)
            });

        let stack = |in_channels: usize,
                     filters: usize,
                     first_stride: usize,
                     project: bool|
         -> ResidualStack<B> {
            ResidualStack {
                conv_a: QConv2d::new(
                    [in_channels, filters],
                    self.body_kernel,
                    first_stride,
                    weight_q,
                    device,
                ),
                bn_a: batch_norm(filters, device),
                conv_b: QConv2d::new(
                    [filters, filters],
                    self.body_kernel,
                    self.body_stride,
                    weight_q,
                    device,
                ),
                bn_b: batch_norm(filters, device),
                shortcut: project.then(|| {
                    QConv2d::new(
                        [in_channels, filters],
                        self.shortcut_kernel,
                        self.downsample_stride,
                        weight_q,
                        device,
                    )
                }),
                act_total_bits,
                act_int_bits,
            }
        };

        let stem_filters = self.filters[0];
        let mut stacks = Vec::new();
        match self.variant {
            Variant::Full => {
                stacks.push(stack(stem_filters, stem_filters, self.body_stride, false));
                let mut channels = stem_filters;
                for stage in self.stages().iter().skip(1).filter(|s| s.is_enabled()) {
                    stacks.push(stack(channels, stage.filters, self.downsample_stride, true));
                    channels = stage.filters;
                }
            }
            Variant::Tiny => {
                stacks.push(stack(stem_filters, stem_filters, self.downsample_stride, true));
            }
        }

        let Some(Shape::Image { height, width, .. }) = topology.feature_shape() else {
            return Err(TopologyError::InvalidLayer {
                layer: "average_pooling2d".into(),
                reason: "missing feature map".into(),
            });
        };
        let pool_size = height.min(width);
        let flat = match topology.layer("flatten") {
            Some(layer) => layer.output_shape.elements(),
            None => {
                return Err(TopologyError::InvalidLayer {
                    layer: "flatten".into(),
                    reason: "missing classifier input".into(),
                })
            }
        };

        Ok(ResNetV1 {
            stem: QConv2d::new(
                [self.input_channels, stem_filters],
                self.body_kernel,
                self.body_stride,
                weight_q,
                device,
            ),
            stem_bn: batch_norm(stem_filters, device),
            stacks,
            pool: AvgPool2dConfig::new([pool_size, pool_size])
                .with_strides([pool_size, pool_size])
                .init(),
            dense: QLinear::new(flat, self.num_classes, weight_q, device),
            act_total_bits,
            act_int_bits,
            l1_penalty: self.l1_penalty,
            l2_penalty: self.l2_penalty,
        })
    }
}
