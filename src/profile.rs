//! Per-layer FLOP and weight profiling of a [`TopologyGraph`].
//!
//! Counting conventions (one multiply-accumulate = 2 FLOPs):
//!
//! | layer        | FLOPs                                  |
//! |--------------|----------------------------------------|
//! | conv         | `2 * k * k * c_in * h_out * w_out * c_out` |
//! | dense        | `2 * in * out`                         |
//! | batch norm   | `2 * elements` (scale and shift)       |
//! | activation   | `elements`                             |
//! | add          | `elements`                             |
//! | avg pool     | input elements                         |
//! | softmax      | `3 * n` (exp, sum, divide)             |
//! | input/flatten| 0                                      |
//!
//! Quantized layers count the same as their float counterparts.

use crate::topology::{Shape, TopologyGraph};

/// One row of the profile.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerProfile {
    pub name: String,
    pub flops: u64,
    pub input_shape: Option<Shape>,
    pub output_shape: Shape,
    pub weights: u64,
}

/// Profile of a whole network, layers in dependency order.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelProfile {
    pub layers: Vec<LayerProfile>,
}

impl ModelProfile {
    pub fn total_flops(&self) -> u64 {
        self.layers.iter().map(|l| l.flops).sum()
    }

    pub fn total_weights(&self) -> u64 {
        self.layers.iter().map(|l| l.weights).sum()
    }

    /// Table-style profile report.
    pub fn format_report(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{:<24} {:>12} {:>12} {:>14} {:>10}\n",
            "Layer", "Input", "Output", "FLOPs", "Weights"
        ));
        let line_width = 24 + 13 + 13 + 15 + 11;
        out.push_str(&"-".repeat(line_width));
        out.push('\n');
        for layer in &self.layers {
            let input = layer
                .input_shape
                .map_or_else(|| "-".to_string(), |s| s.to_string());
            out.push_str(&format!(
                "{:<24} {:>12} {:>12} {:>14} {:>10}\n",
                layer.name,
                input,
                layer.output_shape.to_string(),
                layer.flops,
                layer.weights
            ));
        }
        out.push_str(&"-".repeat(line_width));
        out.push('\n');
        out.push_str(&format!(
            "{:<24} {:>12} {:>12} {:>14} {:>10}\n",
            "TOTAL",
            "",
            "",
            self.total_flops(),
            self.total_weights()
        ));
        out
    }
}

/// Walk `graph` and count FLOPs and weights per layer.
///
/// [`build`](crate::topology::build) has already checked every count
/// against `u64`, so the per-layer values here are always present.
pub fn profile(graph: &TopologyGraph) -> ModelProfile {
    let layers = graph
        .walk()
        .iter()
        .map(|node| {
            let input = node.input_shape();
            LayerProfile {
                name: node.layer.name.clone(),
                flops: node.layer.flops(input).unwrap_or(u64::MAX),
                input_shape: input,
                output_shape: node.layer.output_shape,
                weights: node.layer.weights(input).unwrap_or(u64::MAX),
            }
        })
        .collect();
    ModelProfile { layers }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{build, NetworkConfig};

    fn layer<'a>(profile: &'a ModelProfile, name: &str) -> &'a LayerProfile {
        profile.layers.iter().find(|l| l.name == name).unwrap()
    }

    #[test]
    fn stem_conv_flops() {
        let p = profile(&build(&NetworkConfig::new()).unwrap());
        let stem = layer(&p, "conv2d");
        assert_eq!(stem.flops, 2 * 3 * 3 * 3 * 32 * 32 * 16);
        assert_eq!(stem.weights, 3 * 3 * 3 * 16 + 16);
        assert_eq!(stem.input_shape, Some(Shape::image(32, 32, 3)));
    }

    #[test]
    fn tiny_total_flops() {
        let p = profile(&build(&NetworkConfig::tiny()).unwrap());
        assert_eq!(p.total_flops(), 1_106_110);
        assert_eq!(p.total_weights(), 1650);
    }

    #[test]
    fn add_counts_one_per_element() {
        let p = profile(&build(&NetworkConfig::new()).unwrap());
        assert_eq!(layer(&p, "add").flops, 32 * 32 * 16);
        assert_eq!(layer(&p, "add_2").flops, 8 * 8 * 64);
    }

    #[test]
    fn head_flops() {
        let p = profile(&build(&NetworkConfig::new()).unwrap());
        assert_eq!(layer(&p, "average_pooling2d").flops, 8 * 8 * 64);
        assert_eq!(layer(&p, "flatten").flops, 0);
        assert_eq!(layer(&p, "dense").flops, 2 * 64 * 10);
        assert_eq!(layer(&p, "softmax").flops, 30);
    }

    #[test]
    fn quantization_does_not_change_counts() {
        let float = profile(&build(&NetworkConfig::new()).unwrap());
        let quant = profile(&build(&NetworkConfig::new().quantized()).unwrap());
        assert_eq!(float.total_flops(), quant.total_flops());
    }

    #[test]
    fn more_stacks_cost_more() {
        let one = NetworkConfig::new().with_filters([16, 0, 0]);
        let two = NetworkConfig::new().with_filters([16, 32, 0]);
        let three = NetworkConfig::new();
        let flops = |c: &NetworkConfig| profile(&build(c).unwrap()).total_flops();
        assert!(flops(&one) < flops(&two));
        assert!(flops(&two) < flops(&three));
    }

    #[test]
    fn totals_agree_with_the_graph() {
        let graph = build(&NetworkConfig::new()).unwrap();
        let p = profile(&graph);
        assert_eq!(p.total_flops(), graph.total_flops());
        assert_eq!(p.total_weights(), graph.param_count());
    }

    #[test]
    fn report_lists_every_layer_and_total() {
        let p = profile(&build(&NetworkConfig::tiny()).unwrap());
        let report = p.format_report();
        assert_eq!(report.lines().count(), p.layers.len() + 4);
        assert!(report.contains("conv2d_3"));
        let total = report.lines().last().unwrap();
        assert!(total.starts_with("TOTAL"));
        assert!(total.contains("1106110"));
    }
}
