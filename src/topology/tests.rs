use proptest::prelude::*;

use super::*;

fn conv_params(layer: &Layer) -> (usize, usize, usize) {
    match layer.kind {
        LayerKind::Conv2d {
            filters,
            kernel,
            stride,
            ..
        } => (filters, kernel, stride),
        ref other => panic!("{} is not a conv: {:?}", layer.name, other),
    }
}

#[test]
fn default_network_shapes() {
    let graph = build(&NetworkConfig::new()).unwrap();
    assert_eq!(graph.input_shape(), Shape::image(32, 32, 3));
    assert_eq!(graph.output_shape(), Shape::Vector(10));
    assert_eq!(graph.residual_stacks(), 3);
    assert_eq!(graph.feature_shape(), Some(Shape::image(8, 8, 64)));
    assert_eq!(
        graph.layer("average_pooling2d").unwrap().output_shape,
        Shape::image(1, 1, 64)
    );
    assert_eq!(graph.layer("flatten").unwrap().output_shape, Shape::Vector(64));
}

#[test]
fn default_network_layer_counts() {
    let graph = build(&NetworkConfig::new()).unwrap();
    assert_eq!(graph.count_kind("conv2d"), 9);
    assert_eq!(graph.count_kind("batch_normalization"), 7);
    assert_eq!(graph.count_kind("activation"), 7);
    assert_eq!(graph.count_kind("add"), 3);
    assert_eq!(graph.count_kind("dense"), 1);
    assert_eq!(graph.count_kind("softmax"), 1);
}

#[test]
fn first_stack_is_identity() {
    let graph = build(&NetworkConfig::new()).unwrap();
    // stem, then the two weight layers of the first stack
    for name in ["conv2d", "conv2d_1", "conv2d_2"] {
        assert_eq!(conv_params(graph.layer(name).unwrap()), (16, 3, 1));
    }
    let add = graph
        .walk()
        .into_iter()
        .find(|n| n.layer.name == "add")
        .unwrap();
    assert_eq!(add.inputs, vec![Shape::image(32, 32, 16); 2]);
}

#[test]
fn downsampling_stack_uses_named_kernels_and_strides() {
    let graph = build(&NetworkConfig::new()).unwrap();
    // second stack: conv(k0, s1), conv(k0, s0), shortcut conv(k1, s1)
    assert_eq!(conv_params(graph.layer("conv2d_3").unwrap()), (32, 3, 2));
    assert_eq!(conv_params(graph.layer("conv2d_4").unwrap()), (32, 3, 1));
    assert_eq!(conv_params(graph.layer("conv2d_5").unwrap()), (32, 1, 2));
    assert_eq!(
        graph.layer("conv2d_5").unwrap().output_shape,
        Shape::image(16, 16, 32)
    );
}

#[test]
fn tiny_variant_projects_first_stack() {
    let graph = build(&NetworkConfig::tiny()).unwrap();
    assert_eq!(graph.residual_stacks(), 1);
    assert_eq!(conv_params(graph.layer("conv2d_1").unwrap()), (8, 3, 2));
    assert_eq!(conv_params(graph.layer("conv2d_3").unwrap()), (8, 1, 2));
    assert_eq!(graph.feature_shape(), Some(Shape::image(16, 16, 8)));
    assert_eq!(graph.param_count(), 1650);
}

#[test]
fn tiny_variant_ignores_later_filters() {
    let config = NetworkConfig::tiny().with_filters([8, 32, 64]);
    let graph = build(&config).unwrap();
    assert_eq!(graph.residual_stacks(), 1);
}

#[test]
fn quantized_variant_swaps_layer_kinds() {
    let graph = build(&NetworkConfig::new().quantized()).unwrap();
    assert_eq!(graph.count_kind("conv2d"), 0);
    assert_eq!(graph.count_kind("q_conv2d"), 9);
    assert_eq!(graph.count_kind("q_activation"), 7);
    assert_eq!(graph.count_kind("q_average_pooling2d"), 1);
    assert_eq!(graph.count_kind("q_dense"), 1);
    // normalization and the output softmax stay in float
    assert_eq!(graph.count_kind("batch_normalization"), 7);
    assert_eq!(graph.count_kind("softmax"), 1);
    assert!(graph.layer("q_conv2d").unwrap().kind.is_quantized());
    assert!(!graph.layer("softmax").unwrap().kind.is_quantized());
}

#[test]
fn quantized_structure_matches_float() {
    let float = build(&NetworkConfig::new()).unwrap();
    let quant = build(&NetworkConfig::new().quantized()).unwrap();
    assert_eq!(float.len(), quant.len());
    assert_eq!(float.residual_stacks(), quant.residual_stacks());
    assert_eq!(float.param_count(), quant.param_count());
}

#[test]
fn zero_stem_filters_rejected() {
    let err = build(&NetworkConfig::new().with_filters([0, 32, 64])).unwrap_err();
    assert!(matches!(err, TopologyError::InvalidLayer { .. }));
}

#[test]
fn zero_body_kernel_rejected() {
    let err = build(&NetworkConfig::new().with_body_kernel(0)).unwrap_err();
    assert_eq!(
        err,
        TopologyError::InvalidLayer {
            layer: "conv2d".into(),
            reason: "zero kernel size".into(),
        }
    );
}

#[test]
fn kernel_larger_than_input_underflows() {
    let config = NetworkConfig::new()
        .with_input_height(1)
        .with_input_width(1)
        .with_body_kernel(4);
    let err = build(&config).unwrap_err();
    assert!(matches!(err, TopologyError::ShapeUnderflow { kernel: 4, .. }));
}

#[test]
fn mismatched_shortcut_rejected() {
    // body stride 2 shrinks the residual branch below the identity path
    let err = build(&NetworkConfig::new().with_body_stride(2)).unwrap_err();
    match err {
        TopologyError::ShapeMismatch { left, right, .. } => {
            assert_eq!(left, Shape::image(16, 16, 16));
            assert_eq!(right, Shape::image(4, 4, 16));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn oversized_filters_overflow_instead_of_wrapping() {
    let config = NetworkConfig::new().with_filters([4_000_000_000, 32, 64]);
    let err = build(&config).unwrap_err();
    assert_eq!(
        err,
        TopologyError::Overflow {
            layer: "conv2d_1".into()
        }
    );
}

#[test]
fn totals_are_kept_while_building() {
    let graph = build(&NetworkConfig::tiny()).unwrap();
    let flops: u64 = graph
        .walk()
        .iter()
        .map(|n| n.layer.flops(n.input_shape()).unwrap())
        .sum();
    assert_eq!(graph.total_flops(), flops);
    assert_eq!(graph.total_flops(), 1_106_110);
}

#[test]
fn zero_width_quantizers_rejected() {
    let mut config = NetworkConfig::new().quantized();
    if let Some(q) = config.quantization.as_mut() {
        q.activation_total_bits = 0;
    }
    assert_eq!(
        build(&config).unwrap_err(),
        TopologyError::InvalidLayer {
            layer: "q_activation".into(),
            reason: "zero activation bit width".into(),
        }
    );

    let mut config = NetworkConfig::new().quantized();
    if let Some(q) = config.quantization.as_mut() {
        q.logit_total_bits = 0;
    }
    let err = build(&config).unwrap_err();
    assert!(matches!(err, TopologyError::InvalidLayer { ref layer, .. } if layer == "q_conv2d"));
}

#[test]
fn non_square_input_pools_over_short_side() {
    let config = NetworkConfig::new()
        .with_input_height(32)
        .with_input_width(64);
    let graph = build(&config).unwrap();
    let pool = graph.layer("average_pooling2d").unwrap();
    assert!(matches!(pool.kind, LayerKind::AveragePool { pool_size: 8, .. }));
    assert_eq!(pool.output_shape, Shape::image(1, 2, 64));
    assert_eq!(graph.layer("flatten").unwrap().output_shape, Shape::Vector(128));
}

#[test]
fn walk_is_topological() {
    let graph = build(&NetworkConfig::new()).unwrap();
    let names: Vec<&str> = graph.walk().iter().map(|n| n.layer.name.as_str()).collect();
    let pos = |name: &str| names.iter().position(|n| *n == name).unwrap();
    assert_eq!(pos("input"), 0);
    assert!(pos("conv2d_5") < pos("add_1"));
    assert!(pos("batch_normalization_4") < pos("add_1"));
    assert_eq!(names.last(), Some(&"softmax"));
}

proptest! {
    #[test]
    fn stacks_follow_stage_gating(
        f1 in prop::sample::select(vec![0usize, 8, 32]),
        f2 in prop::sample::select(vec![0usize, 16, 64]),
        k1 in prop::sample::select(vec![0usize, 1, 3]),
        s1 in 0usize..4,
    ) {
        let config = NetworkConfig::new()
            .with_filters([16, f1, f2])
            .with_shortcut_kernel(k1)
            .with_downsample_stride(s1);
        let gate = k1 > 0 && s1 > 0;
        let expected = 1 + usize::from(f1 > 0 && gate) + usize::from(f2 > 0 && gate);

        let graph = build(&config).unwrap();
        prop_assert_eq!(graph.residual_stacks(), expected);
        prop_assert_eq!(config.expected_stacks(), expected);
    }

    #[test]
    fn each_disabled_stage_removes_one_stack(
        disable1 in any::<bool>(),
        disable2 in any::<bool>(),
    ) {
        let full = NetworkConfig::new();
        let full_stacks = build(&full).unwrap().residual_stacks();
        let mut filters = full.filters;
        if disable1 { filters[1] = 0; }
        if disable2 { filters[2] = 0; }
        let reduced = build(&full.clone().with_filters(filters)).unwrap();
        let removed = usize::from(disable1) + usize::from(disable2);
        prop_assert_eq!(reduced.residual_stacks(), full_stacks - removed);
    }
}

#[test]
fn zero_shortcut_kernel_or_stride_drops_both_later_stacks() {
    let full = build(&NetworkConfig::new()).unwrap().residual_stacks();
    let no_kernel = build(&NetworkConfig::new().with_shortcut_kernel(0)).unwrap();
    let no_stride = build(&NetworkConfig::new().with_downsample_stride(0)).unwrap();
    assert_eq!(no_kernel.residual_stacks(), full - 2);
    assert_eq!(no_stride.residual_stacks(), full - 2);
}
