use std::path::PathBuf;

use clap::Args;

use resnet_lab::reduce::{snapshot, RankedTable};

use super::{or_exit, print_ranked};

#[derive(Args)]
pub struct ShowArgs {
    /// Snapshot written by `reduce` (results.rkyv)
    pub snapshot: PathBuf,
}

pub fn cmd_show(args: ShowArgs) {
    let table = or_exit(snapshot::load(&args.snapshot));
    let ranked = or_exit(RankedTable::rank(&table));
    print_ranked(&ranked);
}
