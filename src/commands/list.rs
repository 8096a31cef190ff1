//! The `list` subcommand: show applicable packages without installing.
use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::cli::{GlobalOpts, ListOpts};
use crate::config::Catalog;
use crate::config::filter::{HostRenderer, Matcher};
use crate::exec::{CancelScope, SystemExecutor};
use crate::host::{FilterContext, Os};
use crate::install::Orchestrator;
use crate::logging::Logger;

/// Run the list command.
///
/// Shows every applicable package with its chosen install method and, where
/// knowable, whether it is already installed. Status checks share the bulk
/// listing cache, so listing hundreds of packages stays cheap.
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded.
pub fn run(global: &GlobalOpts, _opts: &ListOpts, log: &Logger) -> Result<()> {
    let os = Os::current();
    let ctx = FilterContext::detect(os);

    let path = super::resolve_catalog(global)?;
    let catalog = Catalog::load(&path).context("loading catalog")?;

    let matcher = Matcher::new();
    let renderer = HostRenderer::new(&ctx);
    let packages = catalog.packages(&matcher, &ctx, Some(&renderer));

    let cancel = CancelScope::new();
    let executor = Arc::new(SystemExecutor::new(cancel));
    let orchestrator = Orchestrator::new(&catalog.install, os, true, executor);

    let available: Vec<&str> = orchestrator.available().iter().map(|m| m.name()).collect();
    log.stage(&format!("Backends: {}", available.join(", ")));
    if let Some(preferred) = orchestrator.preferred_manager() {
        log.info(&format!("preferred manager: {preferred}"));
    }

    log.stage(&format!("Packages ({})", packages.len()));
    for pkg in &packages {
        let method = orchestrator
            .install_method(pkg)
            .map_or_else(|| "none".to_string(), |m| m.to_string());
        let installed = match orchestrator.is_package_installed(pkg) {
            Some(true) => "installed",
            Some(false) => "missing",
            None => "-",
        };
        log.info(&format!("{:<24} {method:<10} {installed}", pkg.name));
    }

    let configs = catalog.config_entries(&matcher, &ctx, Some(&renderer));
    let gits = catalog.git_entries(&matcher, &ctx, Some(&renderer));
    log.info(&format!(
        "{} config entries, {} tracked repositories",
        configs.len(),
        gits.len()
    ));

    Ok(())
}
