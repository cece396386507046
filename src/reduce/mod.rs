//! Reduce tuner sessions into one ranked results table.
//!
//! Every trial's FLOP count is recomputed by rebuilding and profiling the
//! topology it searched, so the ranking does not depend on anything the
//! tuner recorded beyond hyperparameters and the objective.

pub mod plot;
pub mod snapshot;
pub mod table;

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::Error;
use crate::profile::profile;
use crate::topology::{build, NetworkConfig};
use crate::tuner::{Oracle, Session, Trial, OBJECTIVE};

pub use snapshot::SNAPSHOT_FILE;
pub use table::{RankedRow, RankedTable, ResultsTable, StackSummary, TrialResult};

/// Knobs of one reduction run.
#[derive(Debug, Clone)]
pub struct ReduceOptions {
    /// Best trials taken from each session.
    pub max_trials: usize,
    /// Configuration the searched hyperparameters are overlaid on.
    pub base: NetworkConfig,
    pub output_dir: PathBuf,
    pub plot: bool,
}

impl Default for ReduceOptions {
    fn default() -> Self {
        Self {
            max_trials: 100,
            base: NetworkConfig::new(),
            output_dir: PathBuf::from("."),
            plot: true,
        }
    }
}

/// Reduce a single trial: rebuild its topology and count FLOPs.
pub fn evaluate(trial: &Trial, base: &NetworkConfig) -> Result<TrialResult, Error> {
    let val_acc = trial.first_metric(OBJECTIVE)?;
    let arch = trial.hyperparameters().architecture()?;
    let config = arch.apply(base);
    let graph = build(&config).map_err(|source| Error::Topology {
        trial: trial.trial_id.clone(),
        source,
    })?;
    let flops = profile(&graph).total_flops();
    if flops <= 1 {
        return Err(Error::DegenerateFlops {
            trial: trial.trial_id.clone(),
            flops,
        });
    }
    debug!(trial = %trial.trial_id, val_acc, flops, stacks = arch.stacks(), "reduced trial");
    Ok(TrialResult::new(&arch, val_acc, flops))
}

/// Gather the best trials of every session into one table, session by
/// session.
pub fn collect(sessions: &[Session], options: &ReduceOptions) -> Result<ResultsTable, Error> {
    let mut table = ResultsTable::new();
    for session in sessions {
        let oracle = Oracle::open(session)?;
        let best = oracle.best_trials(options.max_trials);
        info!(
            tuner = %session.kind,
            project = %session.project_dir.display(),
            completed = oracle.len(),
            taken = best.len(),
            "reading session"
        );
        for trial in best {
            table.push(evaluate(trial, &options.base)?);
        }
    }
    Ok(table)
}

const STAGING_DIR: &str = ".reduce-staging";

/// Run `write` against an empty staging directory under `out`, then move
/// what it produced into `out`. If `write` fails the staging directory is
/// removed and `out` keeps its previous contents.
fn write_staged<F>(out: &Path, write: F) -> Result<Vec<PathBuf>, Error>
where
    F: FnOnce(&Path) -> Result<(), Error>,
{
    let staging = out.join(STAGING_DIR);
    if staging.exists() {
        std::fs::remove_dir_all(&staging).map_err(|e| Error::io(&staging, e))?;
    }
    std::fs::create_dir_all(&staging).map_err(|e| Error::io(&staging, e))?;

    if let Err(e) = write(&staging) {
        if let Err(cleanup) = std::fs::remove_dir_all(&staging) {
            warn!(path = %staging.display(), error = %cleanup, "staging directory left behind");
        }
        return Err(e);
    }

    let mut moved = Vec::new();
    let entries = std::fs::read_dir(&staging).map_err(|e| Error::io(&staging, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(&staging, e))?;
        let dest = out.join(entry.file_name());
        std::fs::rename(entry.path(), &dest).map_err(|e| Error::io(&dest, e))?;
        moved.push(dest);
    }
    std::fs::remove_dir(&staging).map_err(|e| Error::io(&staging, e))?;
    moved.sort();
    Ok(moved)
}

/// Collect, rank, plot and snapshot.
///
/// Nothing is written unless every trial of every session reduced
/// successfully, and plots plus snapshot land in the output directory
/// together or not at all.
pub fn reduce(sessions: &[Session], options: &ReduceOptions) -> Result<RankedTable, Error> {
    let table = collect(sessions, options)?;
    let ranked = RankedTable::rank(&table)?;

    let out = &options.output_dir;
    std::fs::create_dir_all(out).map_err(|e| Error::io(out, e))?;
    let written = write_staged(out, |dir| {
        if options.plot {
            plot::plot_results(&table, dir)?;
        }
        snapshot::save(&table, &dir.join(SNAPSHOT_FILE))
    })?;
    debug!(files = written.len(), "outputs written");
    let snapshot_path = out.join(SNAPSHOT_FILE);

    if let Some(best) = ranked.best() {
        info!(
            trials = ranked.len(),
            best_score = best.score,
            best_val_acc = best.result.val_acc,
            snapshot = %snapshot_path.display(),
            "reduction complete"
        );
    }
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::TopologyError;

    fn trial(values: &str, val_acc: f64) -> Trial {
        serde_json::from_str(&format!(
            r#"{{"trial_id": "t", "status": "COMPLETED", "score": {val_acc},
                "hyperparameters": {{"values": {{{values}}}}},
                "metrics": {{"metrics": {{"val_accuracy":
                    {{"observations": [{{"value": [{val_acc}], "step": 0}}]}}}}}}}}"#
        ))
        .unwrap()
    }

    const FULL: &str = r#""filters0": 16, "filters1": 32, "filters2": 64,
        "kernelsize0": 3, "kernelsize1": 1, "strides0": 1, "strides1": 2"#;

    #[test]
    fn evaluate_matches_profile_of_rebuilt_topology() {
        let result = evaluate(&trial(FULL, 0.8), &NetworkConfig::new()).unwrap();
        let expected = profile(&build(&NetworkConfig::new()).unwrap()).total_flops();
        assert_eq!(result.flops, expected);
        assert_eq!(result.stacks, 3);
        assert_eq!(result.val_acc, 0.8);
    }

    #[test]
    fn evaluate_reports_topology_errors_with_trial_id() {
        let values = r#""filters0": 0, "filters1": 32, "filters2": 64,
            "kernelsize0": 3, "kernelsize1": 1, "strides0": 1, "strides1": 2"#;
        let err = evaluate(&trial(values, 0.8), &NetworkConfig::new()).unwrap_err();
        assert!(matches!(err, Error::Topology { ref trial, .. } if trial == "t"));
    }

    #[test]
    fn oversized_filters_are_a_topology_error() {
        let values = r#""filters0": 4000000000, "filters1": 32, "filters2": 64,
            "kernelsize0": 3, "kernelsize1": 1, "strides0": 1, "strides1": 2"#;
        let err = evaluate(&trial(values, 0.8), &NetworkConfig::new()).unwrap_err();
        assert!(matches!(
            err,
            Error::Topology {
                source: TopologyError::Overflow { .. },
                ..
            }
        ));
    }

    #[test]
    fn evaluate_respects_base_config() {
        let small = NetworkConfig::new()
            .with_input_height(16)
            .with_input_width(16);
        let a = evaluate(&trial(FULL, 0.8), &NetworkConfig::new()).unwrap();
        let b = evaluate(&trial(FULL, 0.8), &small).unwrap();
        assert!(b.flops < a.flops);
    }

    #[test]
    fn empty_session_list_reduces_to_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let options = ReduceOptions {
            output_dir: dir.path().to_path_buf(),
            plot: false,
            ..ReduceOptions::default()
        };
        let ranked = reduce(&[], &options).unwrap();
        assert!(ranked.is_empty());
        assert!(dir.path().join(SNAPSHOT_FILE).is_file());
    }

    #[test]
    fn failed_write_leaves_output_untouched() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("keep.txt"), "old").unwrap();
        let err = write_staged(dir.path(), |staging| {
            std::fs::write(staging.join("flops_val_acc.png"), "partial").unwrap();
            Err(Error::Plot {
                path: staging.join("flops_val_acc.svg"),
                message: "no font".into(),
            })
        })
        .unwrap_err();
        assert!(matches!(err, Error::Plot { .. }));

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("keep.txt")]);
    }

    #[test]
    fn staged_files_replace_previous_outputs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SNAPSHOT_FILE), "stale").unwrap();
        std::fs::create_dir(dir.path().join(STAGING_DIR)).unwrap();
        let moved = write_staged(dir.path(), |staging| {
            std::fs::write(staging.join(SNAPSHOT_FILE), "fresh").map_err(|e| Error::io(staging, e))
        })
        .unwrap();
        assert_eq!(moved, vec![dir.path().join(SNAPSHOT_FILE)]);
        assert_eq!(std::fs::read_to_string(&moved[0]).unwrap(), "fresh");
        assert!(!dir.path().join(STAGING_DIR).exists());
    }
}
