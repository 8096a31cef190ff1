//! Known package-management backends and their command tables.
use std::fmt;

use crate::exec::Executor;
use crate::host::Os;

/// A package-management backend this engine can delegate to.
///
/// The pseudo-managers `git` and `installer` are not listed here: they are
/// method kinds of their own and bypass backend detection entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ManagerId {
    /// Arch Linux pacman.
    Pacman,
    /// AUR helper yay.
    Yay,
    /// AUR helper paru.
    Paru,
    /// Debian/Ubuntu apt.
    Apt,
    /// Fedora/RHEL dnf.
    Dnf,
    /// Homebrew.
    Brew,
    /// Windows winget.
    Winget,
    /// Windows scoop.
    Scoop,
    /// Windows chocolatey.
    Choco,
}

/// Probe order on POSIX hosts; doubles as the fallback preference order.
const POSIX_MANAGERS: &[ManagerId] = &[
    ManagerId::Yay,
    ManagerId::Paru,
    ManagerId::Pacman,
    ManagerId::Apt,
    ManagerId::Dnf,
    ManagerId::Brew,
];

/// Probe order on Windows hosts; doubles as the fallback preference order.
const WINDOWS_MANAGERS: &[ManagerId] = &[ManagerId::Winget, ManagerId::Scoop, ManagerId::Choco];

impl ManagerId {
    /// The catalog key and binary name of this manager.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pacman => "pacman",
            Self::Yay => "yay",
            Self::Paru => "paru",
            Self::Apt => "apt",
            Self::Dnf => "dnf",
            Self::Brew => "brew",
            Self::Winget => "winget",
            Self::Scoop => "scoop",
            Self::Choco => "choco",
        }
    }

    /// Parse a catalog key or preference string.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "pacman" => Some(Self::Pacman),
            "yay" => Some(Self::Yay),
            "paru" => Some(Self::Paru),
            "apt" => Some(Self::Apt),
            "dnf" => Some(Self::Dnf),
            "brew" => Some(Self::Brew),
            "winget" => Some(Self::Winget),
            "scoop" => Some(Self::Scoop),
            "choco" => Some(Self::Choco),
            _ => None,
        }
    }

    /// Managers that can exist on the given OS, in probe order.
    ///
    /// Probe order matters: it becomes the default method priority when a
    /// package is available through several detected backends.
    #[must_use]
    pub const fn known_for(os: Os) -> &'static [Self] {
        match os {
            Os::Windows => WINDOWS_MANAGERS,
            Os::Linux | Os::Macos => POSIX_MANAGERS,
        }
    }

    /// Install argv template; `{pkg}` is substituted with the package name.
    #[must_use]
    pub const fn install_args(self) -> &'static [&'static str] {
        match self {
            Self::Pacman => &["sudo", "pacman", "-S", "--needed", "--noconfirm", "{pkg}"],
            Self::Yay => &["yay", "-S", "--needed", "--noconfirm", "{pkg}"],
            Self::Paru => &["paru", "-S", "--needed", "--noconfirm", "{pkg}"],
            Self::Apt => &["sudo", "apt", "install", "-y", "{pkg}"],
            Self::Dnf => &["sudo", "dnf", "install", "-y", "{pkg}"],
            Self::Brew => &["brew", "install", "{pkg}"],
            Self::Winget => &[
                "winget",
                "install",
                "--id",
                "{pkg}",
                "--exact",
                "--accept-source-agreements",
                "--accept-package-agreements",
            ],
            Self::Scoop => &["scoop", "install", "{pkg}"],
            Self::Choco => &["choco", "install", "-y", "{pkg}"],
        }
    }

    /// Check argv template; exit status zero means installed.
    #[must_use]
    pub const fn check_args(self) -> &'static [&'static str] {
        match self {
            Self::Pacman | Self::Yay | Self::Paru => &["pacman", "-Q", "{pkg}"],
            Self::Apt => &["dpkg", "-s", "{pkg}"],
            Self::Dnf => &["rpm", "-q", "{pkg}"],
            Self::Brew => &["brew", "list", "{pkg}"],
            Self::Winget => &[
                "winget",
                "list",
                "--id",
                "{pkg}",
                "--exact",
                "--accept-source-agreements",
            ],
            Self::Scoop => &["scoop", "list", "{pkg}"],
            Self::Choco => &["choco", "list", "--exact", "{pkg}"],
        }
    }

    /// Whether status queries must go through the cached bulk listing.
    ///
    /// Winget is slow and unreliable under repeated or concurrent
    /// per-package queries, so it is listed once and cached instead.
    #[must_use]
    pub const fn uses_bulk_listing(self) -> bool {
        matches!(self, Self::Winget)
    }

    /// Argv that lists every installed package, for bulk-listing managers.
    #[must_use]
    pub const fn bulk_list_args(self) -> Option<&'static [&'static str]> {
        match self {
            Self::Winget => Some(&[
                "winget",
                "list",
                "--accept-source-agreements",
                "--disable-interactivity",
            ]),
            _ => None,
        }
    }
}

impl fmt::Display for ManagerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Probe the host for every known backend, in probe order.
///
/// The returned order is the default per-package method priority.
#[must_use]
pub fn detect_available(executor: &dyn Executor, os: Os) -> Vec<ManagerId> {
    ManagerId::known_for(os)
        .iter()
        .copied()
        .filter(|m| executor.which(m.name()))
        .collect()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::install::test_helpers::MockExecutor;

    #[test]
    fn name_and_from_key_round_trip() {
        for manager in [
            ManagerId::Pacman,
            ManagerId::Yay,
            ManagerId::Paru,
            ManagerId::Apt,
            ManagerId::Dnf,
            ManagerId::Brew,
            ManagerId::Winget,
            ManagerId::Scoop,
            ManagerId::Choco,
        ] {
            assert_eq!(ManagerId::from_key(manager.name()), Some(manager));
        }
        assert_eq!(ManagerId::from_key("git"), None);
        assert_eq!(ManagerId::from_key("installer"), None);
        assert_eq!(ManagerId::from_key("nix"), None);
    }

    #[test]
    fn install_templates_carry_the_placeholder() {
        for manager in ManagerId::known_for(Os::Linux)
            .iter()
            .chain(ManagerId::known_for(Os::Windows))
        {
            assert!(
                manager.install_args().contains(&"{pkg}"),
                "{manager} install template lacks {{pkg}}"
            );
            assert!(
                manager.check_args().contains(&"{pkg}"),
                "{manager} check template lacks {{pkg}}"
            );
        }
    }

    #[test]
    fn bulk_listing_is_flagged_for_winget_only() {
        assert!(ManagerId::Winget.uses_bulk_listing());
        assert!(ManagerId::Winget.bulk_list_args().is_some());
        for manager in POSIX_MANAGERS {
            assert!(!manager.uses_bulk_listing());
            assert!(manager.bulk_list_args().is_none());
        }
    }

    #[test]
    fn probe_order_is_preserved() {
        assert_eq!(
            WINDOWS_MANAGERS,
            &[ManagerId::Winget, ManagerId::Scoop, ManagerId::Choco]
        );
        assert_eq!(POSIX_MANAGERS[0], ManagerId::Yay);
        assert_eq!(POSIX_MANAGERS[2], ManagerId::Pacman);
    }

    #[test]
    fn detect_available_keeps_probe_order() {
        let executor = MockExecutor::new().with_available(&["apt", "pacman"]);
        let available = detect_available(&executor, Os::Linux);
        assert_eq!(available, vec![ManagerId::Pacman, ManagerId::Apt]);
    }

    #[test]
    fn detect_available_empty_host() {
        let executor = MockExecutor::new();
        assert!(detect_available(&executor, Os::Linux).is_empty());
    }
}
