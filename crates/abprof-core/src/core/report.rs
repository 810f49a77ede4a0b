use crate::engine::aggregate::RunResult;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report to '{path}': {source}", path = path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read report from '{path}': {source}", path = path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Report serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Serializes a run result to its canonical JSON form. Structures are keyed
/// by id in a sorted map and field order is fixed by the type definitions,
/// so identical results serialize to identical bytes.
pub fn to_json(result: &RunResult) -> Result<String, ReportError> {
    let mut json = serde_json::to_string_pretty(result)?;
    json.push('\n');
    Ok(json)
}

pub fn write_report(result: &RunResult, path: &Path) -> Result<(), ReportError> {
    let json = to_json(result)?;
    std::fs::write(path, json).map_err(|source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_report(path: &Path) -> Result<RunResult, ReportError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ReportError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&raw)?)
}
