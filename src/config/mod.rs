//! Declarative catalog: loading, the raw entry model, and the applicable
//! entry views consumed by the install orchestrator and the external
//! backup/restore collaborator.
pub mod filter;
pub mod package;

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::CatalogError;
use crate::host::{FilterContext, Os};

use filter::{Filter, Matcher, WhenRenderer, applies};
use package::{Managers, Package, UrlInstall};

/// Catalog schema version this build understands.
pub const SUPPORTED_VERSION: u32 = 1;

/// Install preferences declared at the top of the catalog.
///
/// Manager identifiers stay as strings here; the orchestrator parses them
/// and silently ignores identifiers it does not know.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct InstallPrefs {
    /// Preferred managers, most preferred first.
    #[serde(default)]
    pub manager_priority: Vec<String>,
    /// Manager to fall back to when the priority list yields nothing.
    #[serde(default)]
    pub default_manager: Option<String>,
}

/// One declared catalog entry.
///
/// Classification is structural: an entry with a `backup`/`targets` pair is
/// config-type, one with a `repo` is git-type, one with `managers`/`custom`/
/// `url` is package-type. A single entry may be several of these at once.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Entry {
    /// Entry name, unique within its parent.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Applicability filters (OR over the list; empty always matches).
    #[serde(default)]
    pub filters: Vec<Filter>,
    /// Applicability when-expression.
    #[serde(default)]
    pub when: Option<String>,
    /// Package-installation payloads per manager.
    #[serde(default)]
    pub managers: Managers,
    /// Raw installation command per OS.
    #[serde(default)]
    pub custom: BTreeMap<Os, String>,
    /// Download-and-run installation per OS.
    #[serde(default)]
    pub url: BTreeMap<Os, UrlInstall>,
    /// Name of the backup directory for config-type entries.
    #[serde(default)]
    pub backup: Option<String>,
    /// Symlink destinations per OS for config-type entries.
    #[serde(default)]
    pub targets: BTreeMap<Os, String>,
    /// Repository URL for git-type entries.
    #[serde(default)]
    pub repo: Option<String>,
    /// Branch for git-type entries.
    #[serde(default)]
    pub branch: Option<String>,
    /// Checkout destination for git-type entries.
    #[serde(default)]
    pub target: Option<String>,
}

impl Entry {
    /// Whether this entry feeds the backup/restore collaborator.
    #[must_use]
    pub fn is_config_type(&self) -> bool {
        self.backup.is_some() && !self.targets.is_empty()
    }

    /// Whether this entry declares a repository to track.
    #[must_use]
    pub const fn is_git_type(&self) -> bool {
        self.repo.is_some()
    }
}

/// A named group of entries with its own applicability and, optionally, its
/// own package-installation metadata.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Application {
    /// Application name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Applicability filters for the application and everything nested in it.
    #[serde(default)]
    pub filters: Vec<Filter>,
    /// Applicability when-expression.
    #[serde(default)]
    pub when: Option<String>,
    /// The application's own package-installation payloads.
    #[serde(default)]
    pub managers: Managers,
    /// The application's own raw installation command per OS.
    #[serde(default)]
    pub custom: BTreeMap<Os, String>,
    /// The application's own download-and-run installation per OS.
    #[serde(default)]
    pub url: BTreeMap<Os, UrlInstall>,
    /// Nested entries, evaluated only when the application itself applies.
    #[serde(default)]
    pub entries: Vec<Entry>,
}

/// The loaded, versioned catalog.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Catalog {
    /// Schema version; anything but [`SUPPORTED_VERSION`] is fatal.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Install preferences.
    #[serde(default)]
    pub install: InstallPrefs,
    /// Nested applications, in declaration order.
    #[serde(default)]
    pub applications: Vec<Application>,
    /// Flat entries, in declaration order.
    #[serde(default)]
    pub entries: Vec<Entry>,
}

const fn default_version() -> u32 {
    SUPPORTED_VERSION
}

impl Catalog {
    /// Load and validate a catalog file.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] if the file cannot be read, is not valid
    /// YAML, violates the schema (including manager-value shapes), or
    /// declares an unsupported version.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog: Self =
            serde_yaml::from_str(&content).map_err(|source| CatalogError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        if catalog.version != SUPPORTED_VERSION {
            return Err(CatalogError::UnsupportedVersion {
                found: catalog.version,
                supported: SUPPORTED_VERSION,
            });
        }
        Ok(catalog)
    }

    /// Walk the catalog top-down and collect the entries that apply to the
    /// host, in declaration order.
    ///
    /// An application whose own filters/when do not match is skipped
    /// wholesale; none of its nested entries are evaluated.
    fn applicable_entries(
        &self,
        matcher: &Matcher,
        ctx: &FilterContext,
        renderer: Option<&dyn WhenRenderer>,
    ) -> Vec<&Entry> {
        let mut out = Vec::new();
        for app in &self.applications {
            if !applies(matcher, &app.filters, app.when.as_deref(), ctx, renderer) {
                continue;
            }
            for entry in &app.entries {
                if applies(matcher, &entry.filters, entry.when.as_deref(), ctx, renderer) {
                    out.push(entry);
                }
            }
        }
        for entry in &self.entries {
            if applies(matcher, &entry.filters, entry.when.as_deref(), ctx, renderer) {
                out.push(entry);
            }
        }
        out
    }

    /// Applicable config-type entries (backup/targets pairs), in order.
    #[must_use]
    pub fn config_entries(
        &self,
        matcher: &Matcher,
        ctx: &FilterContext,
        renderer: Option<&dyn WhenRenderer>,
    ) -> Vec<&Entry> {
        self.applicable_entries(matcher, ctx, renderer)
            .into_iter()
            .filter(|e| e.is_config_type())
            .collect()
    }

    /// Applicable git-type entries (repository URLs), in order.
    #[must_use]
    pub fn git_entries(
        &self,
        matcher: &Matcher,
        ctx: &FilterContext,
        renderer: Option<&dyn WhenRenderer>,
    ) -> Vec<&Entry> {
        self.applicable_entries(matcher, ctx, renderer)
            .into_iter()
            .filter(|e| e.is_git_type())
            .collect()
    }

    /// Applicable packages, normalized and in declaration order.
    ///
    /// Applications contribute their own package metadata (if any) before
    /// their nested entries.
    #[must_use]
    pub fn packages(
        &self,
        matcher: &Matcher,
        ctx: &FilterContext,
        renderer: Option<&dyn WhenRenderer>,
    ) -> Vec<Package> {
        let mut out = Vec::new();
        for app in &self.applications {
            if !applies(matcher, &app.filters, app.when.as_deref(), ctx, renderer) {
                continue;
            }
            if let Some(pkg) = Package::from_application(app) {
                out.push(pkg);
            }
            for entry in &app.entries {
                if applies(matcher, &entry.filters, entry.when.as_deref(), ctx, renderer)
                    && let Some(pkg) = Package::from_entry(entry)
                {
                    out.push(pkg);
                }
            }
        }
        for entry in &self.entries {
            if applies(matcher, &entry.filters, entry.when.as_deref(), ctx, renderer)
                && let Some(pkg) = Package::from_entry(entry)
            {
                out.push(pkg);
            }
        }
        out
    }
}
