//! Opening the dev server address in the user's browser

use std::process::{Command, Stdio};

use crate::error::{Result, ToolError};

/// Platform opener and its arguments for `url`
fn opener(url: &str) -> (&'static str, Vec<&str>) {
    if cfg!(target_os = "macos") {
        ("open", vec![url])
    } else if cfg!(target_os = "windows") {
        ("cmd", vec!["/C", "start", "", url])
    } else {
        ("xdg-open", vec![url])
    }
}

/// Hand `url` to the platform opener without waiting for it
pub fn open(url: &str) -> Result<()> {
    let (program, args) = opener(url);

    Command::new(program)
        .args(&args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(drop)
        .map_err(|e| ToolError::external("browser", format!("{} {}: {}", program, url, e)))
}
