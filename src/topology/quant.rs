//! Fixed-point fake quantizers for quantization-aware layers.
//!
//! Forward passes see the quantized value, gradients flow through as if
//! the quantizer were the identity (straight-through estimator).

use burn::prelude::*;
use serde::{Deserialize, Serialize};

/// Signed fixed-point quantizer for weights and biases.
///
/// `total_bits` includes the sign bit; `int_bits` of them sit left of the
/// binary point. With `(7, 0)` the grid is `k / 64` for `k` in `-64..=63`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantizedBits {
    pub total_bits: u32,
    pub int_bits: u32,
}

impl QuantizedBits {
    pub fn new(total_bits: u32, int_bits: u32) -> Self {
        Self {
            total_bits,
            int_bits,
        }
    }

    /// Grid step and inclusive code range `(step, lo, hi)`.
    fn grid(&self) -> (f64, f64, f64) {
        let m = 2f64.powi(self.total_bits.saturating_sub(1) as i32);
        let m_i = 2f64.powi(self.int_bits as i32);
        (m_i / m, -m, m - 1.0)
    }

    pub fn quantize(&self, x: f64) -> f64 {
        let (step, lo, hi) = self.grid();
        (x / step).round().clamp(lo, hi) * step
    }

    pub fn apply<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        let (step, lo, hi) = self.grid();
        straight_through(x, step, lo, hi)
    }
}

/// Unsigned fixed-point ReLU: negative inputs clip to zero.
///
/// With `(7, 3)` the grid is `k / 16` for `k` in `0..=127`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantizedRelu {
    pub total_bits: u32,
    pub int_bits: u32,
}

impl QuantizedRelu {
    pub fn new(total_bits: u32, int_bits: u32) -> Self {
        Self {
            total_bits,
            int_bits,
        }
    }

    fn grid(&self) -> (f64, f64, f64) {
        let m = 2f64.powi(self.total_bits as i32);
        let m_i = 2f64.powi(self.int_bits as i32);
        (m_i / m, 0.0, m - 1.0)
    }

    pub fn quantize(&self, x: f64) -> f64 {
        let (step, lo, hi) = self.grid();
        (x / step).round().clamp(lo, hi) * step
    }

    pub fn apply<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        let (step, lo, hi) = self.grid();
        straight_through(x, step, lo, hi)
    }
}

fn straight_through<B: Backend, const D: usize>(
    x: Tensor<B, D>,
    step: f64,
    lo: f64,
    hi: f64,
) -> Tensor<B, D> {
    let quantized = x
        .clone()
        .div_scalar(step)
        .round()
        .clamp(lo, hi)
        .mul_scalar(step);
    x.clone() + (quantized - x).detach()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    #[test]
    fn bits_7_0_grid() {
        let q = QuantizedBits::new(7, 0);
        assert_eq!(q.quantize(0.0), 0.0);
        assert_eq!(q.quantize(0.5), 0.5);
        assert_eq!(q.quantize(1.0 / 64.0), 1.0 / 64.0);
        assert_eq!(q.quantize(0.4 / 64.0), 0.0);
        // saturates at the code range
        assert_eq!(q.quantize(5.0), 63.0 / 64.0);
        assert_eq!(q.quantize(-5.0), -1.0);
    }

    #[test]
    fn bits_with_integer_part() {
        let q = QuantizedBits::new(8, 3);
        // step 2^3 / 2^7 = 1/16, range [-8, 8 - 1/16]
        assert_eq!(q.quantize(1.03), 1.0);
        assert_eq!(q.quantize(100.0), 8.0 - 1.0 / 16.0);
        assert_eq!(q.quantize(-100.0), -8.0);
    }

    #[test]
    fn relu_7_3_grid() {
        let q = QuantizedRelu::new(7, 3);
        assert_eq!(q.quantize(-1.0), 0.0);
        assert_eq!(q.quantize(0.5), 0.5);
        assert_eq!(q.quantize(1.0 / 16.0), 1.0 / 16.0);
        assert_eq!(q.quantize(100.0), 127.0 / 16.0);
    }

    #[test]
    fn tensor_apply_matches_scalar() {
        let device = Default::default();
        let q = QuantizedRelu::new(4, 1);
        let values = [-0.7f32, 0.0, 0.3, 0.9, 1.6, 3.0];
        let x = Tensor::<B, 1>::from_floats(values, &device);
        let out: Vec<f32> = q.apply(x).into_data().to_vec().unwrap();
        for (got, input) in out.iter().zip(values) {
            let want = q.quantize(input as f64) as f32;
            assert!((got - want).abs() < 1e-6, "{input}: {got} != {want}");
        }
    }
}
