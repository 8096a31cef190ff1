//! The `install` subcommand: select applicable packages and install them.
use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::cli::{GlobalOpts, InstallOpts};
use crate::config::Catalog;
use crate::config::filter::{HostRenderer, Matcher};
use crate::config::package::Package;
use crate::exec::{CancelScope, SystemExecutor};
use crate::host::{FilterContext, Os};
use crate::install::Orchestrator;
use crate::logging::Logger;

/// Run the install command.
///
/// Reports one line per package (`[ok]` / `[error]`), a summary, and fails
/// with a non-zero exit iff any package failed.
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded, or to signal batch
/// failure to the process exit status.
pub fn run(global: &GlobalOpts, opts: &InstallOpts, log: &Logger) -> Result<()> {
    let os = Os::current();
    let ctx = FilterContext::detect(os);
    let version = option_env!("PROVISION_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"));
    log.info(&format!("provision {version}"));

    log.stage("Loading catalog");
    let path = super::resolve_catalog(global)?;
    let catalog = Catalog::load(&path).context("loading catalog")?;
    log.info(&format!(
        "host: os={} distro={} hostname={} user={}",
        ctx.os, ctx.distro, ctx.hostname, ctx.user
    ));

    let matcher = Matcher::new();
    let renderer = HostRenderer::new(&ctx);
    let mut packages = catalog.packages(&matcher, &ctx, Some(&renderer));
    if !opts.only.is_empty() {
        packages = filter_only(packages, &opts.only);
    }
    log.info(&format!("{} applicable packages", packages.len()));

    let cancel = CancelScope::new();
    if let Err(e) = cancel.install_ctrlc_handler() {
        log.debug(&format!("Ctrl-C handler unavailable: {e}"));
    }
    let executor = Arc::new(SystemExecutor::new(cancel.clone()));

    log.stage("Detecting backends");
    let orchestrator =
        Orchestrator::new(&catalog.install, os, global.dry_run, executor).with_cancel_scope(cancel);
    let available: Vec<&str> = orchestrator.available().iter().map(|m| m.name()).collect();
    log.info(&format!("available: {}", available.join(", ")));
    if let Some(preferred) = orchestrator.preferred_manager() {
        log.info(&format!("preferred manager: {preferred}"));
    }

    log.stage("Installing packages");
    let results = orchestrator.install_all(&packages);

    let mut successful = 0usize;
    let mut failed = 0usize;
    for result in &results {
        if result.success {
            successful += 1;
            log.info(&format!("[ok] {}: {}", result.package, result.message));
        } else {
            failed += 1;
            log.error(&format!("[error] {}: {}", result.package, result.message));
        }
    }
    log.info(&format!("{successful} successful, {failed} failed"));

    if failed > 0 {
        anyhow::bail!("{failed} package(s) failed to install");
    }
    Ok(())
}

/// Keep only the packages named by `--only`.
fn filter_only(packages: Vec<Package>, only: &[String]) -> Vec<Package> {
    packages
        .into_iter()
        .filter(|p| only.iter().any(|o| p.name == *o))
        .collect()
}
