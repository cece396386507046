use std::path::PathBuf;

use burn::backend::NdArray;
use burn::prelude::*;
use clap::Args;

use resnet_lab::topology::checkpoint::save_model;
use resnet_lab::topology::MAX_STAGES;
use resnet_lab::{build, profile, NetworkConfig};

use super::{fail, load_config, or_exit};

type B = NdArray;

#[derive(Args)]
pub struct InspectArgs {
    /// Network config JSON (see `init-config`)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Filters per stage, e.g. 16,32,64 (0 disables a stage)
    #[arg(long, value_delimiter = ',')]
    pub filters: Option<Vec<usize>>,
    /// Build the single-stack tiny variant
    #[arg(long)]
    pub tiny: bool,
    /// Enable quantization with the default bit widths
    #[arg(long)]
    pub quantized: bool,
    /// Initialize the model and run one forward pass
    #[arg(long)]
    pub forward: bool,
    /// Save initialized weights (implies model initialization)
    #[arg(long, value_name = "PATH")]
    pub save: Option<PathBuf>,
}

fn resolve_config(args: &InspectArgs) -> NetworkConfig {
    let mut config = if args.tiny && args.config.is_none() {
        NetworkConfig::tiny()
    } else {
        load_config(args.config.as_deref())
    };
    if let Some(filters) = &args.filters {
        if filters.is_empty() || filters.len() > MAX_STAGES {
            fail(format!(
                "--filters takes 1 to {} values, got {}",
                MAX_STAGES,
                filters.len()
            ));
        }
        let mut padded = [0; MAX_STAGES];
        padded[..filters.len()].copy_from_slice(filters);
        config = config.with_filters(padded);
    }
    if args.quantized && !config.is_quantized() {
        config = config.quantized();
    }
    config
}

pub fn cmd_inspect(args: InspectArgs) {
    let config = resolve_config(&args);
    let graph = or_exit(build(&config));
    let profile = profile(&graph);

    println!("{}", profile.format_report());
    println!(
        "{} layers, {} residual stack(s), {} parameters, {} FLOPs{}",
        graph.len(),
        graph.residual_stacks(),
        graph.param_count(),
        profile.total_flops(),
        if config.is_quantized() {
            " (quantized)"
        } else {
            ""
        }
    );

    if !args.forward && args.save.is_none() {
        return;
    }

    let device = Default::default();
    let model = or_exit(config.init::<B>(&device));
    if args.forward {
        let images = Tensor::<B, 4>::zeros(
            [
                1,
                config.input_channels,
                config.input_height,
                config.input_width,
            ],
            &device,
        );
        let probs = model.forward(images);
        let [batch, classes] = probs.dims();
        let total: f32 = probs.sum().into_scalar();
        if batch != 1 || classes != config.num_classes || (total - 1.0).abs() > 1e-3 {
            fail(format!(
                "forward pass produced [{}, {}] summing to {}",
                batch, classes, total
            ));
        }
        eprintln!("Forward pass OK: [{}, {}]", batch, classes);
    }
    if let Some(path) = &args.save {
        let written = or_exit(save_model::<B, _>(&model, path));
        eprintln!("Saved weights to {}", written.display());
    }
}
