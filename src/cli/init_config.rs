use std::path::PathBuf;

use clap::Args;

use resnet_lab::NetworkConfig;

use super::or_exit;

#[derive(Args)]
pub struct InitConfigArgs {
    /// Output JSON file
    pub path: PathBuf,
    /// Start from the single-stack tiny variant
    #[arg(long)]
    pub tiny: bool,
    /// Enable quantization with the default bit widths
    #[arg(long)]
    pub quantized: bool,
}

pub fn cmd_init_config(args: InitConfigArgs) {
    let mut config = if args.tiny {
        NetworkConfig::tiny()
    } else {
        NetworkConfig::new()
    };
    if args.quantized {
        config = config.quantized();
    }
    or_exit(config.to_file(&args.path));
    eprintln!("Wrote {}", args.path.display());
}
