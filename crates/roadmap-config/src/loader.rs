use std::path::{Path, PathBuf};

use anyhow::Context;
use toml::{map::Map, Value};
use tracing::debug;

use crate::Config;

/// Candidate config files, weakest first.  Each file found overlays the
/// ones before it.
pub fn config_search_paths() -> Vec<PathBuf> {
    let user_files = [
        dirs::home_dir().map(|home| home.join(".config/roadmap/config.toml")),
        dirs::config_dir().map(|dir| dir.join("roadmap/config.toml")),
    ];

    let mut paths = vec![PathBuf::from("/etc/roadmap/config.toml")];
    for path in user_files.into_iter().flatten() {
        // On Linux both resolve to the same file.
        if !paths.contains(&path) {
            paths.push(path);
        }
    }
    paths.push(PathBuf::from(".roadmap/config.toml"));
    paths.push(PathBuf::from("roadmap.toml"));
    paths
}

/// Build the effective [`Config`].
///
/// Every discovered file is overlaid in search order, then `explicit` (the
/// `--config` flag) on top.  Discovered files that do not exist are skipped;
/// an explicit file that cannot be read is an error, as is any layer that is
/// not valid TOML or a merged document that does not fit the schema.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<Config> {
    let discovered = config_search_paths().into_iter().filter(|p| p.is_file());

    let mut merged = Value::Table(Map::new());
    for path in discovered.chain(explicit.map(Path::to_path_buf)) {
        debug!(path = %path.display(), "applying config layer");
        overlay(&mut merged, read_layer(&path)?);
    }

    merged.try_into().context("invalid configuration")
}

fn read_layer(path: &Path) -> anyhow::Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

/// Recursively lay `top` over `base`.  Tables merge key by key; anything
/// else in `top` replaces what `base` had.
fn overlay(base: &mut Value, top: Value) {
    match (base, top) {
        (Value::Table(base), Value::Table(top)) => {
            for (key, value) in top {
                match base.get_mut(&key) {
                    Some(existing) => overlay(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, top) => *base = top,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
