//! Multi-backend install orchestration.
//!
//! The orchestrator coordinates many independent, unreliable external
//! programs (package managers, git, shells, download tools) behind one
//! uniform contract: probe the host once, pick a method per package in a
//! fixed priority, build the literal command, and execute it (or, in
//! dry-run mode, report exactly what would run). Every failure below catalog
//! parsing becomes a per-package [`InstallResult`]; nothing aborts the batch.
pub mod command;
pub mod managers;
pub mod status;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::config::InstallPrefs;
use crate::config::package::Package;
use crate::exec::{CancelScope, Executor};
use crate::host::Os;

use command::CommandLine;
use managers::ManagerId;
use status::StatusChecker;

/// Failure message for packages with no way to install on this host.
const NO_METHOD_MESSAGE: &str = "no installation method available for this OS/system";

/// How a package gets installed.
///
/// A closed enumeration rather than ad hoc strings, so adding a method kind
/// is a compiler-checked exercise. Order of the selection logic lives in
/// [`Orchestrator::install_method`], not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMethod {
    /// A traditional package manager present on the host.
    Manager(ManagerId),
    /// Clone or update a repository with git.
    Git,
    /// Run the package's installer script for this OS.
    Installer,
    /// Run the package's raw custom command for this OS.
    Custom,
    /// Download an artifact and run it.
    Url,
}

impl fmt::Display for InstallMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manager(m) => f.write_str(m.name()),
            Self::Git => f.write_str("git"),
            Self::Installer => f.write_str("installer"),
            Self::Custom => f.write_str("custom"),
            Self::Url => f.write_str("url"),
        }
    }
}

/// Outcome of one install attempt. Ephemeral: produced per call, reported,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallResult {
    /// Package name from the catalog.
    pub package: String,
    /// Method that was (or would have been) used; `None` when none fit.
    pub method: Option<InstallMethod>,
    /// Whether the attempt succeeded.
    pub success: bool,
    /// Human-readable detail: what ran, or why it failed.
    pub message: String,
}

impl InstallResult {
    fn ok(package: &str, method: InstallMethod, message: String) -> Self {
        Self {
            package: package.to_string(),
            method: Some(method),
            success: true,
            message,
        }
    }

    fn failed(package: &str, method: Option<InstallMethod>, message: String) -> Self {
        Self {
            package: package.to_string(),
            method,
            success: false,
            message,
        }
    }

    /// The method name for reporting; `"none"` when no method fit.
    #[must_use]
    pub fn method_name(&self) -> String {
        self.method
            .map_or_else(|| "none".to_string(), |m| m.to_string())
    }
}

/// Coordinates backend detection, method selection, status checks, and
/// execution for a batch of packages.
///
/// Installation is strictly sequential: concurrent invocations of one
/// system package manager commonly deadlock or corrupt a shared lock, so
/// one-at-a-time is a correctness requirement here, not a missed
/// optimization. Status queries, by contrast, may come from concurrent
/// paths and are served by the internally synchronized [`StatusChecker`].
#[derive(Debug)]
pub struct Orchestrator {
    os: Os,
    dry_run: bool,
    available: Vec<ManagerId>,
    preferred: Option<ManagerId>,
    executor: Arc<dyn Executor>,
    status: StatusChecker,
    cancel: CancelScope,
}

impl Orchestrator {
    /// Build an orchestrator: probes the host for every known backend once
    /// (probe order becomes the default method priority) and computes the
    /// informational preferred manager.
    #[must_use]
    pub fn new(prefs: &InstallPrefs, os: Os, dry_run: bool, executor: Arc<dyn Executor>) -> Self {
        let available = managers::detect_available(executor.as_ref(), os);
        let preferred = select_preferred(prefs, &available, os);
        let status = StatusChecker::new(Arc::clone(&executor));
        Self {
            os,
            dry_run,
            available,
            preferred,
            executor,
            status,
            cancel: CancelScope::new(),
        }
    }

    /// Attach the shared cancellation scope; an interrupt then aborts the
    /// remaining batch, not just the current subprocess.
    #[must_use]
    pub fn with_cancel_scope(mut self, cancel: CancelScope) -> Self {
        self.cancel = cancel;
        self
    }

    /// Backends detected on this host, in probe order.
    #[must_use]
    pub fn available(&self) -> &[ManagerId] {
        &self.available
    }

    /// The host-level preferred manager, reported to the operator.
    ///
    /// Informational only: it never decides any package's install method.
    #[must_use]
    pub const fn preferred_manager(&self) -> Option<ManagerId> {
        self.preferred
    }

    /// The OS this orchestrator installs for.
    #[must_use]
    pub const fn os(&self) -> Os {
        self.os
    }

    /// The status checker, shared with reporting paths.
    #[must_use]
    pub const fn status(&self) -> &StatusChecker {
        &self.status
    }

    /// Select the install method for a package, in fixed priority:
    /// git, installer (with a command for this OS), first available manager
    /// declared on the package, custom command, URL install.
    ///
    /// Independent of the preferred manager.
    #[must_use]
    pub fn install_method(&self, pkg: &Package) -> Option<InstallMethod> {
        if pkg.managers.git().is_some() {
            return Some(InstallMethod::Git);
        }
        if let Some(spec) = pkg.managers.installer()
            && spec.command.contains_key(&self.os)
        {
            return Some(InstallMethod::Installer);
        }
        for manager in &self.available {
            if pkg.managers.get(manager.name()).is_some() {
                return Some(InstallMethod::Manager(*manager));
            }
        }
        if pkg.custom.contains_key(&self.os) {
            return Some(InstallMethod::Custom);
        }
        if pkg.url.contains_key(&self.os) {
            return Some(InstallMethod::Url);
        }
        None
    }

    /// Whether any install method fits this package on this host.
    #[must_use]
    pub fn can_install(&self, pkg: &Package) -> bool {
        self.install_method(pkg).is_some()
    }

    /// The subset of packages that can be installed on this host.
    #[must_use]
    pub fn installable_packages(&self, packages: &[Package]) -> Vec<Package> {
        packages
            .iter()
            .filter(|p| self.can_install(p))
            .cloned()
            .collect()
    }

    /// Whether the package is already installed, when that is knowable.
    ///
    /// `None` for custom/URL methods, whose effects are opaque to the
    /// engine, and for installer packages without a presence-check binary.
    #[must_use]
    pub fn is_package_installed(&self, pkg: &Package) -> Option<bool> {
        match self.install_method(pkg)? {
            InstallMethod::Manager(manager) => {
                let payload = pkg.managers.get(manager.name())?.as_package()?;
                Some(self.status.is_installed(&payload.name, manager))
            }
            InstallMethod::Git => {
                let spec = pkg.managers.git()?;
                let target = command::expanded_git_target(spec, self.os)?;
                Some(Path::new(&target).join(".git").is_dir())
            }
            InstallMethod::Installer => {
                let binary = pkg.managers.installer()?.binary.as_deref()?;
                Some(self.status.is_installer_installed(binary))
            }
            InstallMethod::Custom | InstallMethod::Url => None,
        }
    }

    /// Install a single package, producing exactly one result.
    ///
    /// Runs the dependency phase first (fail-fast for this package only),
    /// then selects and executes the method. Never panics and never aborts
    /// the surrounding batch.
    #[must_use]
    pub fn install(&self, pkg: &Package) -> InstallResult {
        if self.cancel.is_cancelled() {
            return InstallResult::failed(&pkg.name, None, "cancelled".to_string());
        }
        if let Some(failure) = self.install_dependencies(pkg) {
            return failure;
        }
        let Some(method) = self.install_method(pkg) else {
            return InstallResult::failed(&pkg.name, None, NO_METHOD_MESSAGE.to_string());
        };
        match method {
            InstallMethod::Git => self.install_git(pkg),
            InstallMethod::Installer => self.install_installer(pkg),
            InstallMethod::Manager(manager) => self.install_via_manager(pkg, manager),
            InstallMethod::Custom => self.install_custom(pkg),
            InstallMethod::Url => self.install_url(pkg),
        }
    }

    /// Install every package in input order, one result per package.
    ///
    /// Never stops early on a failure. Resets the bulk status cache
    /// afterwards, since the installs may have changed the system state.
    #[must_use]
    pub fn install_all(&self, packages: &[Package]) -> Vec<InstallResult> {
        let results = packages.iter().map(|p| self.install(p)).collect();
        self.status.reset();
        results
    }

    /// Run the per-package dependency phase.
    ///
    /// For every traditional-manager entry carrying deps: skip managers not
    /// detected on this host, install each dependency serially through that
    /// same manager, and abort the whole package on the first failure with
    /// the failing dependency and manager named. Git/installer entries never
    /// carry deps.
    fn install_dependencies(&self, pkg: &Package) -> Option<InstallResult> {
        for (key, value) in pkg.managers.iter() {
            if value.is_git() || value.is_installer() || value.deps().is_empty() {
                continue;
            }
            let Some(manager) = ManagerId::from_key(key) else {
                continue;
            };
            if !self.available.contains(&manager) {
                continue;
            }
            for dep in value.deps() {
                if self.status.is_installed(dep, manager) {
                    continue;
                }
                let cmd = command::manager_install(manager, dep);
                if self.dry_run {
                    tracing::debug!("would install dependency {dep} via {manager}: {cmd}");
                    continue;
                }
                if let Err(e) = self.execute(&cmd) {
                    return Some(InstallResult::failed(
                        &pkg.name,
                        Some(InstallMethod::Manager(manager)),
                        format!("dependency '{dep}' via {manager} failed: {e}"),
                    ));
                }
            }
        }
        None
    }

    fn install_via_manager(&self, pkg: &Package, manager: ManagerId) -> InstallResult {
        let method = InstallMethod::Manager(manager);
        let Some(payload) = pkg.managers.get(manager.name()).and_then(|v| v.as_package()) else {
            return InstallResult::failed(&pkg.name, Some(method), NO_METHOD_MESSAGE.to_string());
        };
        if self.status.is_installed(&payload.name, manager) {
            return InstallResult::ok(&pkg.name, method, "already installed".to_string());
        }
        let cmd = command::manager_install(manager, &payload.name);
        if self.dry_run {
            return InstallResult::ok(&pkg.name, method, format!("would run: {cmd}"));
        }
        match self.execute(&cmd) {
            Ok(()) => InstallResult::ok(&pkg.name, method, format!("installed via {manager}")),
            Err(e) => InstallResult::failed(&pkg.name, Some(method), format!("{cmd} failed: {e}")),
        }
    }

    fn install_git(&self, pkg: &Package) -> InstallResult {
        let method = InstallMethod::Git;
        let Some(spec) = pkg.managers.git() else {
            return InstallResult::failed(&pkg.name, Some(method), NO_METHOD_MESSAGE.to_string());
        };
        let Some(target) = command::expanded_git_target(spec, self.os) else {
            return InstallResult::failed(
                &pkg.name,
                Some(method),
                format!("no git target defined for {}", self.os),
            );
        };
        let update = Path::new(&target).join(".git").is_dir();
        let Some(cmd) = command::git_command(spec, self.os, update) else {
            return InstallResult::failed(
                &pkg.name,
                Some(method),
                format!("no git target defined for {}", self.os),
            );
        };
        if self.dry_run {
            return InstallResult::ok(&pkg.name, method, format!("would run: {cmd}"));
        }
        match self.execute(&cmd) {
            Ok(()) if update => {
                InstallResult::ok(&pkg.name, method, format!("updated {target}"))
            }
            Ok(()) => InstallResult::ok(
                &pkg.name,
                method,
                format!("cloned {} into {target}", spec.url),
            ),
            Err(e) => InstallResult::failed(&pkg.name, Some(method), format!("{cmd} failed: {e}")),
        }
    }

    fn install_installer(&self, pkg: &Package) -> InstallResult {
        let method = InstallMethod::Installer;
        let Some(spec) = pkg.managers.installer() else {
            return InstallResult::failed(&pkg.name, Some(method), NO_METHOD_MESSAGE.to_string());
        };
        if let Some(binary) = spec.binary.as_deref()
            && self.status.is_installer_installed(binary)
        {
            return InstallResult::ok(&pkg.name, method, "already installed".to_string());
        }
        let Some(cmd) = command::installer(spec, self.os) else {
            return InstallResult::failed(&pkg.name, Some(method), NO_METHOD_MESSAGE.to_string());
        };
        if self.dry_run {
            return InstallResult::ok(&pkg.name, method, format!("would run: {cmd}"));
        }
        match self.execute(&cmd) {
            Ok(()) => InstallResult::ok(&pkg.name, method, "installer succeeded".to_string()),
            Err(e) => InstallResult::failed(&pkg.name, Some(method), format!("{cmd} failed: {e}")),
        }
    }

    fn install_custom(&self, pkg: &Package) -> InstallResult {
        let method = InstallMethod::Custom;
        let Some(cmd) = command::custom(pkg, self.os) else {
            return InstallResult::failed(&pkg.name, Some(method), NO_METHOD_MESSAGE.to_string());
        };
        if self.dry_run {
            return InstallResult::ok(&pkg.name, method, format!("would run: {cmd}"));
        }
        match self.execute(&cmd) {
            Ok(()) => InstallResult::ok(&pkg.name, method, "custom command succeeded".to_string()),
            Err(e) => InstallResult::failed(&pkg.name, Some(method), format!("{cmd} failed: {e}")),
        }
    }

    fn install_url(&self, pkg: &Package) -> InstallResult {
        let method = InstallMethod::Url;
        let Some(spec) = pkg.url.get(&self.os) else {
            return InstallResult::failed(&pkg.name, Some(method), NO_METHOD_MESSAGE.to_string());
        };
        if self.dry_run {
            let file = std::env::temp_dir().join("provision-dl").join("artifact");
            let cmd = command::url_script(spec, self.os, &file);
            return InstallResult::ok(&pkg.name, method, format!("would run: {cmd}"));
        }
        // A fresh uniquely-named directory per download: a fixed, guessable
        // path would open a swap-the-file-before-execution race. The RAII
        // guard removes it on every exit path, including cancellation.
        let dir = match tempfile::Builder::new().prefix("provision-").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                return InstallResult::failed(
                    &pkg.name,
                    Some(method),
                    format!("could not create download directory: {e}"),
                );
            }
        };
        let file = dir.path().join("artifact");
        let cmd = command::url_script(spec, self.os, &file);
        match self.execute(&cmd) {
            Ok(()) => InstallResult::ok(
                &pkg.name,
                method,
                format!("downloaded and ran {}", spec.url),
            ),
            Err(e) => InstallResult::failed(&pkg.name, Some(method), format!("{cmd} failed: {e}")),
        }
    }

    /// Spawn a built command with inherited streams; `Err` carries a short
    /// failure summary.
    fn execute(&self, cmd: &CommandLine) -> Result<(), String> {
        match self.executor.run_interactive(cmd.program(), &cmd.args()) {
            Ok(result) if result.success => Ok(()),
            Ok(result) => Err(result
                .code
                .map_or_else(|| "terminated by signal".to_string(), |c| format!("exit status {c}"))),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// The informational host-level preferred manager: first configured
/// priority entry that is available, else the configured default if
/// available, else the OS fallback order.
fn select_preferred(
    prefs: &InstallPrefs,
    available: &[ManagerId],
    os: Os,
) -> Option<ManagerId> {
    for key in &prefs.manager_priority {
        if let Some(manager) = ManagerId::from_key(key)
            && available.contains(&manager)
        {
            return Some(manager);
        }
    }
    if let Some(key) = &prefs.default_manager
        && let Some(manager) = ManagerId::from_key(key)
        && available.contains(&manager)
    {
        return Some(manager);
    }
    ManagerId::known_for(os)
        .iter()
        .copied()
        .find(|m| available.contains(m))
}
