//! Utility functions and helpers

pub mod browser;
pub mod logger;
pub mod net;
pub mod progress;

use std::env;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::{Result, ToolError};

/// Resolve `path` against `base` and drop `.`/`..` components lexically
pub fn resolve_path(base: &Path, path: impl AsRef<Path>) -> PathBuf {
    let joined = base.join(path);
    let mut out = PathBuf::new();

    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }

    out
}

/// `path` made absolute against the current directory, then normalized
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(resolve_path(path, ""));
    }
    Ok(resolve_path(&env::current_dir()?, path))
}

/// Remove `dir` with everything in it and create it again, empty.
///
/// Refuses to touch the project root itself.
pub fn clear_output_dir(project_root: &Path, dir: &Path) -> Result<PathBuf> {
    let target = resolve_path(project_root, dir);

    if target == resolve_path(project_root, ".") {
        return Err(ToolError::OutputIsProjectRoot { path: target });
    }

    match fs::remove_dir_all(&target) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    fs::create_dir_all(&target)?;

    Ok(target)
}

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format duration as human-readable string
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs_f64();

    if secs >= 60.0 {
        let mins = (secs / 60.0).floor() as u64;
        let remaining_secs = secs - (mins as f64 * 60.0);
        format!("{}m {:.2}s", mins, remaining_secs)
    } else if secs >= 1.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.0}ms", secs * 1000.0)
    }
}
