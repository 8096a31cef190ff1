//! Top-level subcommand orchestration.
pub mod install;
pub mod list;

use anyhow::Result;
use std::path::PathBuf;

use crate::cli::GlobalOpts;

/// Resolve the catalog file path from CLI arguments or auto-detection.
///
/// Order: explicit `--catalog`, the `PROVISION_CATALOG` environment
/// variable, `catalog.yaml` in the current directory, then the user config
/// directory.
///
/// # Errors
///
/// Returns an error if no catalog file can be located.
pub fn resolve_catalog(global: &GlobalOpts) -> Result<PathBuf> {
    if let Some(ref path) = global.catalog {
        return Ok(path.clone());
    }

    if let Ok(path) = std::env::var("PROVISION_CATALOG") {
        return Ok(PathBuf::from(path));
    }

    let cwd_catalog = PathBuf::from("catalog.yaml");
    if cwd_catalog.exists() {
        return Ok(cwd_catalog);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let candidate = config_dir.join("provision").join("catalog.yaml");
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    anyhow::bail!(
        "cannot determine catalog path. Use --catalog or set the PROVISION_CATALOG env var"
    );
}
