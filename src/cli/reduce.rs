use std::path::PathBuf;

use clap::Args;
use tracing::debug;

use resnet_lab::reduce::{self, ReduceOptions};
use resnet_lab::tuner::parse_sessions;

use super::{load_config, or_exit, print_ranked};

#[derive(Args)]
pub struct ReduceArgs {
    /// Comma-separated tuner kinds (RandomSearch, BayesianOptimization, Hyperband)
    #[arg(short, long, default_value = "RandomSearch")]
    pub tuner: String,
    /// Comma-separated project directories, one per tuner
    #[arg(short, long, default_value = "rs_resnet_v1_eembc")]
    pub project_dir: String,
    /// Best trials taken from each session
    #[arg(short, long, default_value = "100")]
    pub max_trials: usize,
    /// Maximum number of residual stacks (not used by the reduction)
    #[arg(short, long, default_value = "3")]
    pub stacks: usize,
    /// Directory receiving plots and the results snapshot
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,
    /// Network config the searched hyperparameters are applied to
    #[arg(long, value_name = "PATH")]
    pub base_config: Option<PathBuf>,
    /// Skip the scatter plots
    #[arg(long)]
    pub no_plot: bool,
}

pub fn cmd_reduce(args: ReduceArgs) {
    debug!(stacks = args.stacks, "ignoring --stacks");
    let sessions = or_exit(parse_sessions(&args.tuner, &args.project_dir));
    let options = ReduceOptions {
        max_trials: args.max_trials,
        base: load_config(args.base_config.as_deref()),
        output_dir: args.output_dir,
        plot: !args.no_plot,
    };
    let ranked = or_exit(reduce::reduce(&sessions, &options));
    print_ranked(&ranked);
}
