//! File system helpers shared by the root-set scan and plugin discovery

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::error::HotloadResult;

/// Canonicalize when the path exists, otherwise keep it as given.
///
/// Watch events, scan results and module requests must agree on cache keys,
/// so every path is funneled through here before touching a registry.
pub fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Every file under `root` in sorted order, skipping `skip_dirs` subtrees.
///
/// Hidden files and `.gitignore`d paths are skipped like any other tool
/// built on the `ignore` walker.
pub fn walk_files(root: &Path, skip_dirs: &[PathBuf]) -> HotloadResult<Vec<PathBuf>> {
    let skip: Vec<PathBuf> = skip_dirs.iter().map(|d| canonical(d)).collect();
    let walker = WalkBuilder::new(root)
        .require_git(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |entry| {
            let path = canonical(entry.path());
            !skip.iter().any(|dir| path.starts_with(dir))
        })
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
        if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            files.push(canonical(entry.path()));
        }
    }
    Ok(files)
}

/// First path component of `path` below `root`, if `path` is nested.
pub fn top_level_dir(root: &Path, path: &Path) -> Option<PathBuf> {
    let relative = path.strip_prefix(root).ok()?;
    let mut components = relative.components();
    let first = components.next()?;
    // A file directly in the root has no top-level directory
    components.next()?;
    Some(root.join(first.as_os_str()))
}
