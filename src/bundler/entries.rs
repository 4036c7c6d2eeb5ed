//! Global style/script entries and lazy chunk detection

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::ExtraEntry;
use crate::utils::resolve_path;

static ENTRY_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(js|css|scss|sass|less|styl)$").expect("valid regex"));

/// Entry name used for styles without an explicit output
pub const STYLES_ENTRY: &str = "styles";

/// Entry name used for scripts without an explicit output
pub const SCRIPTS_ENTRY: &str = "scripts";

/// An extra entry resolved against the app root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEntry {
    /// Absolute file path
    pub path: PathBuf,

    /// Bundle entry this file belongs to
    pub entry: String,

    pub lazy: bool,
}

/// Resolve paths and assign each extra entry to a bundle entry name.
///
/// An explicit `output` names the entry. Lazy entries without one are
/// named after their input. Everything else lands in `default_entry`.
pub fn parse_extra_entries(
    entries: &[ExtraEntry],
    app_root: &Path,
    default_entry: &str,
) -> Vec<ParsedEntry> {
    entries
        .iter()
        .map(|extra| {
            let entry = match extra.output() {
                Some(output) => strip_entry_extension(output),
                None if extra.is_lazy() => strip_entry_extension(extra.input()),
                None => default_entry.to_string(),
            };

            ParsedEntry {
                path: resolve_path(app_root, extra.input()),
                entry,
                lazy: extra.is_lazy(),
            }
        })
        .collect()
}

fn strip_entry_extension(name: &str) -> String {
    ENTRY_EXTENSION.replace(name, "").into_owned()
}

/// Style entries grouped by bundle entry name, plus every global style path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CssEntries {
    pub entries: BTreeMap<String, Vec<PathBuf>>,
    pub global: Vec<PathBuf>,
}

pub fn parse_css_entries(app_root: &Path, styles: &[ExtraEntry]) -> CssEntries {
    let mut css = CssEntries::default();

    for style in parse_extra_entries(styles, app_root, STYLES_ENTRY) {
        css.global.push(style.path.clone());
        css.entries.entry(style.entry).or_default().push(style.path);
    }

    css
}

/// Entry names that must not be injected into the generated HTML
pub fn lazy_chunks(app_root: &Path, scripts: &[ExtraEntry], styles: &[ExtraEntry]) -> Vec<String> {
    let mut lazy: Vec<String> = parse_extra_entries(scripts, app_root, SCRIPTS_ENTRY)
        .into_iter()
        .chain(parse_extra_entries(styles, app_root, STYLES_ENTRY))
        .filter(|entry| entry.lazy)
        .map(|entry| entry.entry)
        .collect();
    lazy.dedup();
    lazy
}
