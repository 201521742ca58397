//! Manifest, state and endpoint locations

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "pgconverge.toml";
pub const STATE_FILE: &str = "pgconverge.state.toml";

/// Per-user config directory (`~/.config/pgconverge` on Linux)
pub fn config_dir() -> Result<PathBuf> {
    let dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(dir.join("pgconverge"))
}

/// Expand `~` in a user supplied path
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// Resolve the manifest path
///
/// An explicit path must exist. Otherwise `./pgconverge.toml` is preferred
/// over the copy in the config directory.
pub fn manifest_path(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        let path = expand_path(path);
        if !path.exists() {
            bail!("Manifest {} does not exist", path.display());
        }
        return Ok(path);
    }

    let local = PathBuf::from(MANIFEST_FILE);
    if local.exists() {
        return Ok(local);
    }

    let global = config_dir()?.join(MANIFEST_FILE);
    if global.exists() {
        return Ok(global);
    }

    bail!(
        "No manifest found. Create ./{MANIFEST_FILE} or {}",
        global.display()
    )
}

/// Resolve the state path: explicit, else next to the manifest
pub fn state_path(explicit: Option<&str>, manifest: &Path) -> PathBuf {
    match explicit {
        Some(path) => expand_path(path),
        None => manifest
            .parent()
            .map_or_else(|| PathBuf::from(STATE_FILE), |dir| dir.join(STATE_FILE)),
    }
}

/// Pick the endpoint: command line (or `PGCONVERGE_ENDPOINT`) over manifest
pub fn endpoint(cli: Option<&str>, manifest: Option<&str>) -> Result<String> {
    cli.or(manifest)
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .context("No endpoint configured. Pass --endpoint, set PGCONVERGE_ENDPOINT or add [connection] endpoint to the manifest")
}
