//! Host attribute detection: operating system, distribution, hostname, user.
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Operating system family a catalog entry can target.
///
/// Serialized as the lowercase attribute value used in filters
/// (`linux`, `darwin`, `windows`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Os {
    /// Linux (any distribution).
    #[serde(rename = "linux")]
    Linux,
    /// macOS.
    #[serde(rename = "darwin", alias = "macos")]
    Macos,
    /// Windows.
    #[serde(rename = "windows")]
    Windows,
}

impl Os {
    /// Detect the operating system this binary was built for.
    #[must_use]
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::Macos
        } else {
            // Default to Linux for other Unix-like systems
            Self::Linux
        }
    }

    /// The attribute value used by filters and catalog keys.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Macos => "darwin",
            Self::Windows => "windows",
        }
    }

    /// Whether this OS uses POSIX shell conventions for wrapped commands.
    #[must_use]
    pub const fn is_posix(self) -> bool {
        !matches!(self, Self::Windows)
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Observed attributes of the current host, matched against catalog filters.
///
/// Constructed once per run and treated as read-only afterwards. Attribute
/// names outside the known set resolve to the empty string, so any non-empty
/// include pattern on an unknown attribute fails to match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterContext {
    /// Operating system name (`linux`, `darwin`, `windows`).
    pub os: String,
    /// Distribution identifier (`arch`, `ubuntu`, …); empty when unknown.
    pub distro: String,
    /// Hostname; empty when it cannot be determined.
    pub hostname: String,
    /// Login name of the invoking user; empty when unknown.
    pub user: String,
}

impl FilterContext {
    /// Detect the attributes of the current host.
    #[must_use]
    pub fn detect(os: Os) -> Self {
        Self {
            os: os.name().to_string(),
            distro: detect_distro(os),
            hostname: detect_hostname(),
            user: detect_user(),
        }
    }

    /// Look up an attribute by its filter name.
    ///
    /// Unknown attribute names resolve to the empty string.
    #[must_use]
    pub fn attribute(&self, name: &str) -> &str {
        match name {
            "os" => &self.os,
            "distro" => &self.distro,
            "hostname" => &self.hostname,
            "user" => &self.user,
            _ => "",
        }
    }
}

/// Read the distribution identifier from `/etc/os-release`.
///
/// Only meaningful on Linux; other systems report an empty distro.
fn detect_distro(os: Os) -> String {
    if os != Os::Linux {
        return String::new();
    }
    let path = Path::new("/etc/os-release");
    fs::read_to_string(path)
        .map(|content| parse_os_release_id(&content))
        .unwrap_or_default()
}

/// Extract the unquoted `ID=` value from os-release content.
fn parse_os_release_id(content: &str) -> String {
    content
        .lines()
        .find_map(|line| line.strip_prefix("ID="))
        .map(|val| val.trim_matches('"').to_string())
        .unwrap_or_default()
}

fn detect_hostname() -> String {
    if let Ok(name) = std::env::var("HOSTNAME")
        && !name.is_empty()
    {
        return name;
    }
    if let Ok(name) = std::env::var("COMPUTERNAME")
        && !name.is_empty()
    {
        return name;
    }
    fs::read_to_string("/etc/hostname")
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn detect_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default()
}
