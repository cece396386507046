//! Results snapshot persisted as an rkyv archive.

use std::path::Path;

use rkyv::rancor;
use rkyv::util::AlignedVec;

use super::table::ResultsTable;
use crate::error::Error;

/// Default snapshot file name inside the output directory.
pub const SNAPSHOT_FILE: &str = "results.rkyv";

fn snapshot_error(path: &Path, message: impl ToString) -> Error {
    Error::Snapshot {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

pub fn save(table: &ResultsTable, path: &Path) -> Result<(), Error> {
    let bytes = rkyv::to_bytes::<rancor::Error>(table).map_err(|e| snapshot_error(path, e))?;
    std::fs::write(path, &*bytes).map_err(|e| Error::io(path, e))
}

/// Load and validate a snapshot written by [`save`].
pub fn load(path: &Path) -> Result<ResultsTable, Error> {
    let data = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    let mut aligned: AlignedVec = AlignedVec::with_capacity(data.len());
    aligned.extend_from_slice(&data);
    let table = rkyv::from_bytes::<ResultsTable, rancor::Error>(&aligned)
        .map_err(|e| snapshot_error(path, e))?;
    if !table.is_consistent() {
        return Err(snapshot_error(path, "columns have different lengths"));
    }
    Ok(table)
}
