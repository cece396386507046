//! Weight checkpoints for [`ResNetV1`](super::model::ResNetV1).
//!
//! Uses burn's native record format (NamedMpk) with full precision.

use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};

use crate::error::Error;

/// Save a model next to `path`; burn appends the `.mpk` extension.
pub fn save_model<B: Backend, M: Module<B> + Clone>(model: &M, path: &Path) -> Result<PathBuf, Error> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    }
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    model
        .clone()
        .save_file(path.to_path_buf(), &recorder)
        .map_err(|e| Error::Checkpoint {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    Ok(path.with_extension("mpk"))
}

/// Load weights into `model`, or `None` when no checkpoint exists.
pub fn load_model<B: Backend, M: Module<B>>(
    model: M,
    path: &Path,
    device: &B::Device,
) -> Result<Option<M>, Error> {
    let full_path = path.with_extension("mpk");
    if !full_path.exists() {
        return Ok(None);
    }
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    let loaded = model
        .load_file(path.to_path_buf(), &recorder, device)
        .map_err(|e| Error::Checkpoint {
            path: full_path,
            message: e.to_string(),
        })?;
    Ok(Some(loaded))
}
