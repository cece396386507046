pub mod init_config;
pub mod inspect;
pub mod reduce;
pub mod show;

use std::fmt::Display;
use std::path::Path;
use std::process;

use resnet_lab::reduce::{RankedTable, StackSummary};
use resnet_lab::NetworkConfig;

/// Print `error: <message>` and exit 1.
pub fn fail(e: impl Display) -> ! {
    eprintln!("error: {}", e);
    process::exit(1);
}

pub fn or_exit<T, E: Display>(result: Result<T, E>) -> T {
    result.unwrap_or_else(|e| fail(e))
}

/// Ranked rows to stdout, per-stack summary after them.
pub fn print_ranked(ranked: &RankedTable) {
    print!("{}", ranked.format_table());
    if !ranked.is_empty() {
        println!();
        print!(
            "{}",
            StackSummary::format_summary(&StackSummary::collect(ranked))
        );
    }
}

/// Base config from `--base-config`/`--config`, or the defaults.
pub fn load_config(path: Option<&Path>) -> NetworkConfig {
    match path {
        Some(path) => or_exit(NetworkConfig::from_file(path)),
        None => NetworkConfig::new(),
    }
}
