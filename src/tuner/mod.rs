//! Hyperparameter-search sessions read back from disk.
//!
//! A session pairs a tuner kind with the project directory it wrote its
//! trials to (Keras-Tuner layout: one `trial_<id>/trial.json` per trial).

pub mod oracle;
pub mod trial;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::Error;

pub use oracle::Oracle;
pub use trial::{HyperParameters, SearchedArchitecture, Trial, OBJECTIVE};

/// Search strategy that produced a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunerKind {
    RandomSearch,
    BayesianOptimization,
    Hyperband,
}

impl TunerKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RandomSearch => "RandomSearch",
            Self::BayesianOptimization => "BayesianOptimization",
            Self::Hyperband => "Hyperband",
        }
    }
}

impl fmt::Display for TunerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TunerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "RandomSearch" => Ok(Self::RandomSearch),
            "BayesianOptimization" => Ok(Self::BayesianOptimization),
            "Hyperband" => Ok(Self::Hyperband),
            other => Err(Error::UnknownTuner(other.to_string())),
        }
    }
}

/// One tuner run and where its trials live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub kind: TunerKind,
    pub project_dir: PathBuf,
}

/// Pair comma-separated tuner names with comma-separated project dirs.
///
/// Lists of different lengths are rejected instead of silently truncated.
pub fn parse_sessions(tuners: &str, project_dirs: &str) -> Result<Vec<Session>, Error> {
    let kinds: Vec<&str> = tuners.split(',').collect();
    let dirs: Vec<&str> = project_dirs.split(',').collect();
    if kinds.len() != dirs.len() {
        return Err(Error::SessionMismatch {
            tuners: kinds.len(),
            projects: dirs.len(),
        });
    }
    kinds
        .into_iter()
        .zip(dirs)
        .map(|(kind, dir)| {
            Ok(Session {
                kind: kind.parse()?,
                project_dir: PathBuf::from(dir.trim()),
            })
        })
        .collect()
}
