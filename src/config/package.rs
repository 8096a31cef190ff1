//! Canonical package representation and the catalog normalizer.
//!
//! The declared catalog mixes several developer-facing shapes for a manager
//! value: a bare string (traditional manager), a nested `git` object, a
//! nested `installer` object, and the legacy `name`/`deps` object. The
//! normalizer decodes all of them into the closed [`ManagerValue`] variant
//! so the rest of the engine never sees the raw shapes.
use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::de::{Error as _, MapAccess, Visitor};

use crate::host::Os;

use super::filter::Filter;
use super::{Application, Entry};

/// Reserved manager key for git-managed packages.
pub const GIT_MANAGER: &str = "git";
/// Reserved manager key for script-installer packages.
pub const INSTALLER_MANAGER: &str = "installer";

/// A repository to clone (or update) as the installation method.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitSpec {
    /// Clone URL.
    pub url: String,
    /// Branch to clone; the remote default when absent.
    #[serde(default)]
    pub branch: Option<String>,
    /// Checkout destination per OS; tilde-expanded before use.
    #[serde(default)]
    pub targets: BTreeMap<Os, String>,
    /// Whether the clone must run under `sudo git`.
    #[serde(default)]
    pub sudo: bool,
}

/// A per-OS installer script with an optional presence-check binary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstallerSpec {
    /// Shell command per OS.
    #[serde(default)]
    pub command: BTreeMap<Os, String>,
    /// Binary whose presence on `PATH` marks the package as installed.
    #[serde(default)]
    pub binary: Option<String>,
}

/// Download-and-run installation: fetch `url`, substitute the artifact path
/// for `{file}` in `command`, execute.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UrlInstall {
    /// Artifact URL.
    pub url: String,
    /// Command to run after download; must contain the `{file}` placeholder.
    pub command: String,
}

/// Traditional-manager payload: the manager-specific package name plus an
/// optional list of dependencies to install first through the same manager.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManagerPackage {
    /// Package name as the manager knows it.
    pub name: String,
    /// Packages to install through the same manager beforehand.
    #[serde(default)]
    pub deps: Vec<String>,
}

/// Per-manager configuration payload, decoded from one of the catalog's
/// polymorphic shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerValue {
    /// Plain package name (with optional deps) for a traditional manager.
    Package(ManagerPackage),
    /// Repository clone handled by git.
    Git(GitSpec),
    /// Script installer with per-OS commands.
    Installer(InstallerSpec),
}

impl ManagerValue {
    /// Whether this value is a [`GitSpec`].
    #[must_use]
    pub const fn is_git(&self) -> bool {
        matches!(self, Self::Git(_))
    }

    /// Whether this value is an [`InstallerSpec`].
    #[must_use]
    pub const fn is_installer(&self) -> bool {
        matches!(self, Self::Installer(_))
    }

    /// The traditional-manager payload, if that is what this value is.
    #[must_use]
    pub const fn as_package(&self) -> Option<&ManagerPackage> {
        match self {
            Self::Package(p) => Some(p),
            _ => None,
        }
    }

    /// Dependency list carried by a traditional-manager value.
    #[must_use]
    pub fn deps(&self) -> &[String] {
        match self {
            Self::Package(p) => &p.deps,
            _ => &[],
        }
    }
}

/// Ordered map of manager identifier → decoded [`ManagerValue`].
///
/// Decoding dispatches on the key: the reserved `git` and `installer` keys
/// decode their dedicated shapes, every other key tries a bare string first
/// and the legacy `name`/`deps` object second. Shape mismatches fail with
/// the offending manager key and the attempted shapes named.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Managers(BTreeMap<String, ManagerValue>);

impl Managers {
    /// Whether no manager is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Look up a manager entry by its catalog key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ManagerValue> {
        self.0.get(key)
    }

    /// The git spec, if a `git` manager entry is declared.
    #[must_use]
    pub fn git(&self) -> Option<&GitSpec> {
        match self.0.get(GIT_MANAGER) {
            Some(ManagerValue::Git(spec)) => Some(spec),
            _ => None,
        }
    }

    /// The installer spec, if an `installer` manager entry is declared.
    #[must_use]
    pub fn installer(&self) -> Option<&InstallerSpec> {
        match self.0.get(INSTALLER_MANAGER) {
            Some(ManagerValue::Installer(spec)) => Some(spec),
            _ => None,
        }
    }

    /// Iterate manager entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ManagerValue)> {
        self.0.iter()
    }
}

impl<'de> Deserialize<'de> for Managers {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct ManagersVisitor;

        impl<'de> Visitor<'de> for ManagersVisitor {
            type Value = Managers;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of manager identifiers to manager values")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut out = BTreeMap::new();
                while let Some(key) = map.next_key::<String>()? {
                    let value = match key.as_str() {
                        GIT_MANAGER => {
                            let spec: GitSpec = map.next_value().map_err(|e| {
                                A::Error::custom(format!(
                                    "manager '{GIT_MANAGER}' does not fit the git shape: {e}"
                                ))
                            })?;
                            ManagerValue::Git(spec)
                        }
                        INSTALLER_MANAGER => {
                            let spec: InstallerSpec = map.next_value().map_err(|e| {
                                A::Error::custom(format!(
                                    "manager '{INSTALLER_MANAGER}' does not fit the installer shape: {e}"
                                ))
                            })?;
                            ManagerValue::Installer(spec)
                        }
                        _ => {
                            let raw: serde_yaml::Value = map.next_value()?;
                            decode_package_value(&key, raw).map_err(A::Error::custom)?
                        }
                    };
                    out.insert(key, value);
                }
                Ok(Managers(out))
            }
        }

        deserializer.deserialize_map(ManagersVisitor)
    }
}

/// Decode a traditional-manager value: bare string first, then the legacy
/// `name`/`deps` object.
fn decode_package_value(key: &str, raw: serde_yaml::Value) -> Result<ManagerValue, String> {
    match raw {
        serde_yaml::Value::String(name) => Ok(ManagerValue::Package(ManagerPackage {
            name,
            deps: Vec::new(),
        })),
        other => serde_yaml::from_value::<ManagerPackage>(other)
            .map(ManagerValue::Package)
            .map_err(|e| {
                format!(
                    "manager '{key}': value is neither a package name string \
                     nor a name/deps object: {e}"
                )
            }),
    }
}

/// Canonical, normalized package: one per installable catalog node.
///
/// Built once from the loaded catalog and treated as read-only input to the
/// install orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    /// Catalog name of the package.
    pub name: String,
    /// Human-readable description; may be empty.
    pub description: String,
    /// Per-manager configuration payloads.
    pub managers: Managers,
    /// Raw shell command per OS, run when no manager fits.
    pub custom: BTreeMap<Os, String>,
    /// Download-and-run installation per OS, the last resort.
    pub url: BTreeMap<Os, UrlInstall>,
    /// Applicability filters carried down from the owning catalog node.
    pub filters: Vec<Filter>,
    /// Applicability when-expression carried down from the owning node.
    pub when: Option<String>,
}

impl Package {
    /// Normalize a catalog entry into a package.
    ///
    /// Returns `None` when the entry declares no package-installation
    /// metadata (it may still be a config- or git-type entry).
    #[must_use]
    pub fn from_entry(entry: &Entry) -> Option<Self> {
        Self::from_parts(
            &entry.name,
            &entry.description,
            &entry.managers,
            &entry.custom,
            &entry.url,
            &entry.filters,
            entry.when.as_ref(),
        )
    }

    /// Normalize an application's own package metadata into a package.
    ///
    /// Applications may declare installation metadata directly in addition
    /// to nested sub-entries; returns `None` when this one does not.
    #[must_use]
    pub fn from_application(app: &Application) -> Option<Self> {
        Self::from_parts(
            &app.name,
            &app.description,
            &app.managers,
            &app.custom,
            &app.url,
            &app.filters,
            app.when.as_ref(),
        )
    }

    fn from_parts(
        name: &str,
        description: &str,
        managers: &Managers,
        custom: &BTreeMap<Os, String>,
        url: &BTreeMap<Os, UrlInstall>,
        filters: &[Filter],
        when: Option<&String>,
    ) -> Option<Self> {
        if managers.is_empty() && custom.is_empty() && url.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            description: description.to_string(),
            managers: managers.clone(),
            custom: custom.clone(),
            url: url.clone(),
            filters: filters.to_vec(),
            when: when.cloned(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // ManagerValue decoding
    // -----------------------------------------------------------------------

    #[test]
    fn bare_string_decodes_as_package_name() {
        let managers: Managers = serde_yaml::from_str("pacman: ripgrep\n").unwrap();
        let value = managers.get("pacman").unwrap();
        assert_eq!(
            value.as_package().map(|p| p.name.as_str()),
            Some("ripgrep")
        );
        assert!(value.deps().is_empty());
    }

    #[test]
    fn name_deps_object_decodes_as_package() {
        let managers: Managers =
            serde_yaml::from_str("apt:\n  name: neovim\n  deps: [gcc, make]\n").unwrap();
        let value = managers.get("apt").unwrap();
        let pkg = value.as_package().unwrap();
        assert_eq!(pkg.name, "neovim");
        assert_eq!(pkg.deps, vec!["gcc".to_string(), "make".to_string()]);
    }

    #[test]
    fn git_key_decodes_as_git_spec() {
        let yaml = "git:\n  url: https://example.com/dotfiles.git\n  branch: main\n  targets:\n    linux: ~/.dotfiles\n  sudo: true\n";
        let managers: Managers = serde_yaml::from_str(yaml).unwrap();
        let spec = managers.git().unwrap();
        assert_eq!(spec.url, "https://example.com/dotfiles.git");
        assert_eq!(spec.branch.as_deref(), Some("main"));
        assert_eq!(
            spec.targets.get(&Os::Linux).map(String::as_str),
            Some("~/.dotfiles")
        );
        assert!(spec.sudo);
    }

    #[test]
    fn installer_key_decodes_as_installer_spec() {
        let yaml = "installer:\n  command:\n    linux: curl -fsSL https://example.com | sh\n  binary: example\n";
        let managers: Managers = serde_yaml::from_str(yaml).unwrap();
        let spec = managers.installer().unwrap();
        assert!(spec.command.contains_key(&Os::Linux));
        assert_eq!(spec.binary.as_deref(), Some("example"));
    }

    #[test]
    fn git_shape_mismatch_names_the_key() {
        let err = serde_yaml::from_str::<Managers>("git: [1, 2]\n").unwrap_err();
        assert!(
            err.to_string().contains("manager 'git'"),
            "expected key name in: {err}"
        );
    }

    #[test]
    fn unknown_shape_names_key_and_attempted_shapes() {
        let err = serde_yaml::from_str::<Managers>("pacman: [a, b]\n").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("manager 'pacman'"), "key missing in: {msg}");
        assert!(msg.contains("package name string"), "shape missing in: {msg}");
        assert!(msg.contains("name/deps object"), "shape missing in: {msg}");
    }

    #[test]
    fn manager_value_variant_predicates() {
        let managers: Managers = serde_yaml::from_str(
            "git:\n  url: https://example.com/x.git\ninstaller:\n  command:\n    linux: sh install.sh\npacman: x\n",
        )
        .unwrap();
        assert!(managers.get("git").unwrap().is_git());
        assert!(!managers.get("git").unwrap().is_installer());
        assert!(managers.get("installer").unwrap().is_installer());
        assert!(!managers.get("installer").unwrap().is_git());
        assert!(!managers.get("pacman").unwrap().is_git());
        assert!(!managers.get("pacman").unwrap().is_installer());
    }

    // -----------------------------------------------------------------------
    // Normalizer
    // -----------------------------------------------------------------------

    fn entry_from_yaml(yaml: &str) -> Entry {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn from_entry_requires_package_metadata() {
        let entry = entry_from_yaml("name: bash\nbackup: bash\ntargets:\n  linux: ~/.bashrc\n");
        assert!(Package::from_entry(&entry).is_none());
    }

    #[test]
    fn from_entry_carries_applicability_down() {
        let entry = entry_from_yaml(
            "name: tmux\nfilters:\n  - include:\n      os: linux\nmanagers:\n  pacman: tmux\n",
        );
        let pkg = Package::from_entry(&entry).unwrap();
        assert_eq!(pkg.name, "tmux");
        assert_eq!(pkg.filters.len(), 1);
        assert!(pkg.managers.get("pacman").is_some());
    }

    #[test]
    fn from_entry_with_custom_only_is_a_package() {
        let entry = entry_from_yaml("name: rustup\ncustom:\n  linux: curl https://sh.rustup.rs | sh\n");
        let pkg = Package::from_entry(&entry).unwrap();
        assert!(pkg.managers.is_empty());
        assert!(pkg.custom.contains_key(&Os::Linux));
    }

    #[test]
    fn normalizer_round_trip_git_vs_installer() {
        let git_entry = entry_from_yaml(
            "name: nvim-config\nmanagers:\n  git:\n    url: https://example.com/nvim.git\n    targets:\n      linux: ~/.config/nvim\n",
        );
        let pkg = Package::from_entry(&git_entry).unwrap();
        let value = pkg.managers.get(GIT_MANAGER).unwrap();
        assert!(value.is_git());
        assert!(!value.is_installer());

        let installer_entry = entry_from_yaml(
            "name: rustup\nmanagers:\n  installer:\n    command:\n      linux: curl -fsSL https://sh.rustup.rs | sh\n    binary: rustup\n",
        );
        let pkg = Package::from_entry(&installer_entry).unwrap();
        let value = pkg.managers.get(INSTALLER_MANAGER).unwrap();
        assert!(value.is_installer());
        assert!(!value.is_git());
    }
}
