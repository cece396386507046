//! Network hyperparameters.
//!
//! `NetworkConfig` replaces the positional `kernel_sizes[2]` / `strides[2]`
//! pairs with named fields: index 0 is the kernel/stride used inside every
//! residual stack, index 1 the one used by the downsampling conv and its
//! shortcut projection.

use std::path::Path;

use burn::config::Config;
use serde::{Deserialize, Serialize};

use super::quant::{QuantizedBits, QuantizedRelu};
use crate::error::Error;

/// Number of stages the full variant can stack.
pub const MAX_STAGES: usize = 3;

/// Which family of ResNet-v1 topology to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Variant {
    /// Stem + identity stack + up to two downsampling stacks.
    #[default]
    Full,
    /// Stem + a single downsampling stack with projection shortcut.
    Tiny,
}

/// Filters/kernel/stride triple of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageConfig {
    pub filters: usize,
    pub kernel_size: usize,
    pub stride: usize,
}

impl StageConfig {
    /// A stage exists only when all three values are positive.
    pub fn is_enabled(&self) -> bool {
        self.filters > 0 && self.kernel_size > 0 && self.stride > 0
    }
}

/// Bit widths for the quantization-aware variants.
#[derive(Config, Debug, PartialEq)]
pub struct QuantConfig {
    /// Total bits of weight and bias quantizers.
    #[config(default = 7)]
    pub logit_total_bits: u32,
    /// Integer bits of weight and bias quantizers.
    #[config(default = 0)]
    pub logit_int_bits: u32,
    /// Total bits of activation quantizers.
    #[config(default = 7)]
    pub activation_total_bits: u32,
    /// Integer bits of activation quantizers.
    #[config(default = 3)]
    pub activation_int_bits: u32,
}

impl QuantConfig {
    pub fn weights(&self) -> QuantizedBits {
        QuantizedBits::new(self.logit_total_bits, self.logit_int_bits)
    }

    pub fn activations(&self) -> QuantizedRelu {
        QuantizedRelu::new(self.activation_total_bits, self.activation_int_bits)
    }
}

/// Full description of one ResNet-v1 network.
#[derive(Config, Debug, PartialEq)]
pub struct NetworkConfig {
    /// Filters per stage; a zero disables stages 1 and 2.
    #[config(default = "[16, 32, 64]")]
    pub filters: [usize; MAX_STAGES],
    #[config(default = 32)]
    pub input_height: usize,
    #[config(default = 32)]
    pub input_width: usize,
    #[config(default = 3)]
    pub input_channels: usize,
    #[config(default = 10)]
    pub num_classes: usize,
    /// Kernel of the convolutions inside a stack.
    #[config(default = 3)]
    pub body_kernel: usize,
    /// Kernel of the shortcut projection; gates stages 1 and 2.
    #[config(default = 1)]
    pub shortcut_kernel: usize,
    /// Stride of the stem and of non-downsampling convolutions.
    #[config(default = 1)]
    pub body_stride: usize,
    /// Stride of the first conv of a downsampling stack and its shortcut.
    #[config(default = 2)]
    pub downsample_stride: usize,
    #[config(default = 1e-4)]
    pub l1_penalty: f64,
    #[config(default = 0.0)]
    pub l2_penalty: f64,
    #[config(default = "Variant::Full")]
    pub variant: Variant,
    /// Quantization bit widths; `None` builds the float network.
    pub quantization: Option<QuantConfig>,
}

impl NetworkConfig {
    /// Defaults of the single-stack tiny variant.
    pub fn tiny() -> Self {
        Self::new().with_variant(Variant::Tiny).with_filters([8, 0, 0])
    }

    /// Switch on quantization with the default bit widths.
    pub fn quantized(self) -> Self {
        self.with_quantization(Some(QuantConfig::new()))
    }

    /// Per-stage triples in build order.
    ///
    /// Stage 0 uses the body kernel/stride. Later stages report the
    /// shortcut kernel and downsample stride, since those are the values
    /// that decide whether the stage is built.
    pub fn stages(&self) -> Vec<StageConfig> {
        let count = match self.variant {
            Variant::Full => MAX_STAGES,
            Variant::Tiny => 1,
        };
        (0..count)
            .map(|i| {
                if i == 0 {
                    StageConfig {
                        filters: self.filters[0],
                        kernel_size: self.body_kernel,
                        stride: self.body_stride,
                    }
                } else {
                    StageConfig {
                        filters: self.filters[i],
                        kernel_size: self.shortcut_kernel,
                        stride: self.downsample_stride,
                    }
                }
            })
            .collect()
    }

    /// Number of residual stacks the builder will emit.
    pub fn expected_stacks(&self) -> usize {
        match self.variant {
            Variant::Tiny => 1,
            Variant::Full => {
                1 + self
                    .stages()
                    .iter()
                    .skip(1)
                    .filter(|s| s.is_enabled())
                    .count()
            }
        }
    }

    pub fn is_quantized(&self) -> bool {
        self.quantization.is_some()
    }

    /// Read a JSON config, mapping failures into the crate error.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        Self::load(path).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn to_file(&self, path: &Path) -> Result<(), Error> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        }
        self.save(path).map_err(|e| Error::io(path, e))
    }
}
