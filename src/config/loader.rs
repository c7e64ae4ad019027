//! Configuration loading

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{HotloadError, HotloadResult};

use super::types::{Config, RuntimeMode};

/// Project config file looked up in the project root
pub const CONFIG_FILE_NAME: &str = "hotload.toml";

/// Non-fatal configuration warning (unknown key).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub key: String,
    pub file: PathBuf,
    pub line: Option<usize>,
    pub suggestion: Option<String>,
}

/// Load configuration and collect unknown keys as warnings.
///
/// A relative `project_root` is resolved against the config file's directory.
pub fn load_with_warnings(path: &Path) -> HotloadResult<(Config, Vec<ConfigWarning>)> {
    let content = fs::read_to_string(path)?;

    let mut unknown_paths: Vec<String> = Vec::new();
    let deserializer = toml::de::Deserializer::new(&content);

    let mut config: Config = serde_ignored::deserialize(deserializer, |p| {
        unknown_paths.push(p.to_string());
    })
    .map_err(|e| HotloadError::Config {
        file: path.to_path_buf(),
        message: e.to_string(),
    })?;

    if config.project_root.is_relative() {
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.project_root = base.join(&config.project_root);
    }

    let warnings: Vec<ConfigWarning> = unknown_paths
        .into_iter()
        .map(|path_str| {
            let key = path_str
                .split('.')
                .next_back()
                .unwrap_or(path_str.as_str())
                .to_string();
            ConfigWarning {
                line: find_line_number(&content, &key),
                suggestion: suggest_key(&key),
                key,
                file: path.to_path_buf(),
            }
        })
        .collect();

    for warning in &warnings {
        tracing::warn!(
            file = %warning.file.display(),
            key = %warning.key,
            suggestion = ?warning.suggestion,
            "unknown configuration key"
        );
    }

    Ok((config, warnings))
}

pub fn load_or_default(root: &Path) -> HotloadResult<(Config, Vec<ConfigWarning>)> {
    let file = root.join(CONFIG_FILE_NAME);
    let (config, warnings) = if file.is_file() {
        load_with_warnings(&file)?
    } else {
        (Config::for_root(root), Vec::new())
    };
    Ok((with_env_overrides(config), warnings))
}

/// Apply environment variable overrides (`HOTLOAD_*` prefix)
pub fn with_env_overrides(config: Config) -> Config {
    apply_overrides(config, |key| std::env::var(key).ok())
}

pub(super) fn apply_overrides(
    mut config: Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Config {
    // HOTLOAD_MODE
    if let Some(mode) = lookup("HOTLOAD_MODE") {
        match mode.parse::<RuntimeMode>() {
            Ok(mode) => config.mode = mode,
            Err(message) => tracing::warn!(%message, "ignoring HOTLOAD_MODE"),
        }
    }

    // HOTLOAD_WATCH
    if let Some(val) = lookup("HOTLOAD_WATCH") {
        config.watch = matches!(val.trim().to_lowercase().as_str(), "true" | "1" | "yes");
    }

    config
}

fn find_line_number(content: &str, needle: &str) -> Option<usize> {
    content
        .lines()
        .position(|line| line.trim_start().starts_with(needle))
        .map(|i| i + 1)
}

fn suggest_key(unknown: &str) -> Option<String> {
    const CANDIDATES: &[&str] = &[
        "project_root",
        "mode",
        "watch",
        "excluded_patterns",
        "library_dir",
        "dev_library_dirs",
        "transformer_pattern",
    ];

    let mut best: Option<(&str, usize)> = None;
    for candidate in CANDIDATES {
        let dist = levenshtein(unknown, candidate);
        if best.map(|(_, d)| dist < d).unwrap_or(true) {
            best = Some((candidate, dist));
        }
    }

    match best {
        Some((candidate, dist)) if dist <= 3 => Some(candidate.to_string()),
        _ => None,
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }

    let b_bytes = b.as_bytes();
    let mut prev: Vec<usize> = (0..=b_bytes.len()).collect();
    let mut curr = vec![0usize; b_bytes.len() + 1];

    for (i, &ac) in a.as_bytes().iter().enumerate() {
        curr[0] = i + 1;
        for (j, &bc) in b_bytes.iter().enumerate() {
            let cost = usize::from(ac != bc);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_bytes.len()]
}
