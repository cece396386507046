//! Read-only view of a tuner project directory.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::trial::Trial;
use super::Session;
use crate::error::Error;

/// Completed trials of one session, best first.
#[derive(Debug, Clone)]
pub struct Oracle {
    session: Session,
    trials: Vec<Trial>,
}

fn trial_files(project_dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let entries = std::fs::read_dir(project_dir).map_err(|e| Error::io(project_dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(project_dir, e))?;
        let path = entry.path();
        let is_trial_dir = path.is_dir()
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("trial_"));
        let file = path.join("trial.json");
        if is_trial_dir && file.is_file() {
            files.push(file);
        }
    }
    files.sort();
    Ok(files)
}

fn load_trial(path: &Path) -> Result<Trial, Error> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| Error::json(path, e))
}

impl Oracle {
    /// Load every completed trial under the session's project directory.
    ///
    /// Trials are ordered by score, highest first (the objective is
    /// maximized); equal scores keep directory order.
    pub fn open(session: &Session) -> Result<Self, Error> {
        let mut trials = Vec::new();
        for path in trial_files(&session.project_dir)? {
            let trial = load_trial(&path)?;
            if trial.is_completed() {
                trials.push(trial);
            } else {
                debug!(trial = %trial.trial_id, status = ?trial.status, "skipping unfinished trial");
            }
        }
        trials.sort_by(|a, b| {
            let a = a.score.unwrap_or(f64::NEG_INFINITY);
            let b = b.score.unwrap_or(f64::NEG_INFINITY);
            b.total_cmp(&a)
        });
        Ok(Self {
            session: session.clone(),
            trials,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    /// Up to `n` best trials.
    pub fn best_trials(&self, n: usize) -> &[Trial] {
        &self.trials[..n.min(self.trials.len())]
    }
}
