use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

const PDB_EXTENSION: &str = "pdb";

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Failed to read input directory '{path}': {source}", path = path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Invalid input path '{path}': must be a .pdb file or a directory containing .pdb files",
        path = path.display()
    )]
    InvalidInput { path: PathBuf },

    #[error(
        "Duplicate structure id '{id}': '{first}' and '{second}' would collide in the report",
        first = first.display(),
        second = second.display()
    )]
    DuplicateId {
        id: String,
        first: PathBuf,
        second: PathBuf,
    },
}

/// A discovered input structure. Immutable once created; the `id` (file stem)
/// keys everything downstream, from tasks to the final report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructureRef {
    pub id: String,
    pub path: PathBuf,
    pub heavy_chain: char,
    pub light_chain: char,
}

impl StructureRef {
    pub fn from_path(path: PathBuf) -> Self {
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self {
            id,
            path,
            heavy_chain: 'H',
            light_chain: 'L',
        }
    }
}

/// Enumerates the `.pdb` structures under `input`, which may be a single file
/// or a directory. Directory entries are sorted by file name so discovery
/// order is stable across platforms and runs.
pub fn discover_structures(input: &Path) -> Result<Vec<StructureRef>, DiscoveryError> {
    if input.is_file() {
        if !has_pdb_extension(input) {
            return Err(DiscoveryError::InvalidInput {
                path: input.to_path_buf(),
            });
        }
        return Ok(vec![StructureRef::from_path(input.to_path_buf())]);
    }

    if !input.is_dir() {
        return Err(DiscoveryError::InvalidInput {
            path: input.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(input).map_err(|source| DiscoveryError::ReadDir {
        path: input.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| DiscoveryError::ReadDir {
            path: input.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() && has_pdb_extension(&path) {
            paths.push(path);
        }
    }
    paths.sort();

    let structures: Vec<StructureRef> = paths.into_iter().map(StructureRef::from_path).collect();

    // Ids key every downstream map, so `mab.pdb` next to `mab.PDB` must be
    // rejected here rather than silently merging in the report.
    let mut seen: HashMap<&str, &Path> = HashMap::new();
    for structure in &structures {
        if let Some(first) = seen.insert(structure.id.as_str(), &structure.path) {
            return Err(DiscoveryError::DuplicateId {
                id: structure.id.clone(),
                first: first.to_path_buf(),
                second: structure.path.clone(),
            });
        }
    }

    Ok(structures)
}

fn has_pdb_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case(PDB_EXTENSION))
        .unwrap_or(false)
}
