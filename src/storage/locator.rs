/// Store locator resolution
///
/// A locator is a source folder plus a file path relative to it. The resolved
/// file must exist and stay inside the source folder.
use crate::error::{ConnectorError, ConnectorResult};
use std::path::{Path, PathBuf};

const ACCESS_ERROR: &str = "The file cannot be accessed";

/// Resolve `file` (either separator style) under `source_dir`
pub fn resolve_store_path(source_dir: Option<&Path>, file: &str) -> ConnectorResult<PathBuf> {
    let file = file.trim();
    if file.is_empty() {
        return Err(ConnectorError::connect(ACCESS_ERROR, file));
    }

    let relative: PathBuf = file
        .split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != ".")
        .collect();

    // Without a source folder the file is taken as given
    let Some(source_dir) = source_dir else {
        let direct = PathBuf::from(file);
        return if direct.is_file() {
            Ok(direct)
        } else if relative.is_file() {
            Ok(relative)
        } else {
            Err(ConnectorError::connect(ACCESS_ERROR, file))
        };
    };

    let root = source_dir
        .canonicalize()
        .map_err(|_| ConnectorError::connect(ACCESS_ERROR, source_dir.display().to_string()))?;
    let candidate = root
        .join(&relative)
        .canonicalize()
        .map_err(|_| ConnectorError::connect(ACCESS_ERROR, file))?;

    if !candidate.starts_with(&root) || !candidate.is_file() {
        return Err(ConnectorError::connect(ACCESS_ERROR, file));
    }
    Ok(candidate)
}
