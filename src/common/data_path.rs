// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::error::AppError;
use std::path::{Path, PathBuf};

const DATA_DIR_ENV: &str = "DATA_DIR";

fn absolute(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path,
    }
}

fn non_empty(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

fn env_data_dir() -> Option<String> {
    non_empty(std::env::var(DATA_DIR_ENV).ok().as_deref())
}

fn executable_data_dir_candidate() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let parent = exe.parent()?;
    Some(absolute(parent.join("..").join("data")))
}

/// Resolve the active data directory using precedence:
/// 1) explicit setting
/// 2) `DATA_DIR`
/// 3) executable-relative `../data` (if present)
/// 4) cwd-relative `./data`
pub fn resolve_data_dir(explicit_data_dir: Option<&str>) -> PathBuf {
    if let Some(dir) = non_empty(explicit_data_dir).or_else(env_data_dir) {
        return absolute(PathBuf::from(dir));
    }
    if let Some(exe_data) = executable_data_dir_candidate()
        && exe_data.exists()
    {
        return exe_data;
    }
    absolute(PathBuf::from("data"))
}

/// Absolute paths pass through; relative ones land inside the data directory.
pub fn resolve_data_path(raw_path: &str, explicit_data_dir: Option<&str>) -> PathBuf {
    let as_path = PathBuf::from(raw_path.trim());
    if as_path.is_absolute() {
        return as_path;
    }
    let relative = as_path
        .strip_prefix("data")
        .map(Path::to_path_buf)
        .unwrap_or(as_path);
    resolve_data_dir(explicit_data_dir).join(relative)
}

pub fn resolve_required_data_path(
    raw_path: &str,
    explicit_data_dir: Option<&str>,
) -> Result<PathBuf, AppError> {
    let resolved = resolve_data_path(raw_path, explicit_data_dir);
    if resolved.exists() {
        return Ok(resolved);
    }
    Err(AppError::Config(format!(
        "expected {} at {}; set DATA_DIR",
        raw_path,
        resolved.display()
    )))
}

/// `state.json` -> `state.json.<suffix>`, next to the original file.
pub fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dir_wins_for_relative_paths() {
        let resolved = resolve_data_path("data/state.json", Some("/var/lib/keeper"));
        assert_eq!(resolved, PathBuf::from("/var/lib/keeper/state.json"));
    }

    #[test]
    fn absolute_paths_are_untouched() {
        let resolved = resolve_data_path("/tmp/state.json", Some("/var/lib/keeper"));
        assert_eq!(resolved, PathBuf::from("/tmp/state.json"));
    }

    #[test]
    fn sibling_appends_suffix() {
        let p = sibling_path(Path::new("/x/tracked_transactions.json"), "cursor");
        assert_eq!(p, PathBuf::from("/x/tracked_transactions.json.cursor"));
    }

    #[test]
    fn required_path_reports_location() {
        let err = resolve_required_data_path("missing-model.json", Some("/nonexistent-dir"))
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent-dir/missing-model.json"));
    }
}
