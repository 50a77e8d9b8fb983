use crate::model::EngineSettings;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

const HISTORY_MARKERS: &[&str] = &["Streaming_History", "StreamingHistory"];

/// Reads every history JSON file under `root` (an extracted data export).
/// Keys are file names; when two folders hold the same name, the parent
/// folder is prefixed to keep both.
pub fn read_export_dir(root: &Path, settings: &EngineSettings) -> Result<BTreeMap<String, Vec<u8>>> {
    if !root.is_dir() {
        anyhow::bail!("{} is not a directory", root.display());
    }

    let mut files = BTreeMap::new();
    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_json(path) {
            continue;
        }
        let Some(name) = path.file_name().and_then(OsStr::to_str) else {
            continue;
        };
        if settings.history_files_only && !is_history_file(name) {
            debug!(file = name, "skipping non-history JSON file");
            continue;
        }

        let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let key = if files.contains_key(name) {
            relative_name(root, path)
        } else {
            name.to_string()
        };
        files.insert(key, bytes);
    }

    debug!(root = %root.display(), files = files.len(), "read export directory");
    Ok(files)
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn is_history_file(name: &str) -> bool {
    HISTORY_MARKERS.iter().any(|marker| name.contains(marker))
}

fn relative_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}
