use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::topology::TopologyError;

/// Everything that can abort a reduction or an inspection run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot access '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in '{}': {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{tuners} tuner(s) but {projects} project dir(s); each tuner needs exactly one project dir")]
    SessionMismatch { tuners: usize, projects: usize },

    #[error("unknown tuner '{0}' (expected RandomSearch, BayesianOptimization or Hyperband)")]
    UnknownTuner(String),

    #[error("trial {trial}: no '{metric}' recorded")]
    MissingMetric { trial: String, metric: String },

    #[error("trial {trial}: missing hyperparameter '{name}'")]
    MissingHyperparameter { trial: String, name: String },

    #[error("trial {trial}: hyperparameter '{name}' = {value} is not a non-negative integer")]
    InvalidHyperparameter {
        trial: String,
        name: String,
        value: String,
    },

    #[error("trial {trial}: {source}")]
    Topology {
        trial: String,
        #[source]
        source: TopologyError,
    },

    #[error("trial {trial}: {flops} FLOPs leaves val_acc / log10(flops) undefined")]
    DegenerateFlops { trial: String, flops: u64 },

    #[error("snapshot '{}': {message}", path.display())]
    Snapshot { path: PathBuf, message: String },

    #[error("checkpoint '{}': {message}", path.display())]
    Checkpoint { path: PathBuf, message: String },

    #[error("plot '{}': {message}", path.display())]
    Plot { path: PathBuf, message: String },

    #[error("config '{}': {message}", path.display())]
    Config { path: PathBuf, message: String },
}

impl Error {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Error::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn json(path: &Path, source: serde_json::Error) -> Self {
        Error::Json {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
