//! Pure command construction: decides *what* to run, never runs it.
//!
//! Keeping this free of side effects guarantees that the dry-run preview
//! and the real execution always describe the same command, and lets tests
//! assert exact command lines without spawning processes.
use std::borrow::Cow;
use std::fmt;
use std::path::Path;

use crate::config::package::{GitSpec, InstallerSpec, Package, UrlInstall};
use crate::host::Os;

use super::InstallMethod;
use super::managers::ManagerId;

/// A fully constructed command line, ready to execute or preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    argv: Vec<String>,
}

impl CommandLine {
    fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }

    /// The program to spawn.
    #[must_use]
    pub fn program(&self) -> &str {
        self.argv.first().map_or("", String::as_str)
    }

    /// The arguments following the program.
    #[must_use]
    pub fn args(&self) -> Vec<&str> {
        self.argv.iter().skip(1).map(String::as_str).collect()
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arg in &self.argv {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            f.write_str(&quote(arg))?;
        }
        Ok(())
    }
}

/// Quote an argument for display when it contains whitespace.
fn quote(arg: &str) -> Cow<'_, str> {
    if arg.chars().any(char::is_whitespace) {
        Cow::Owned(format!("'{arg}'"))
    } else {
        Cow::Borrowed(arg)
    }
}

/// Substitute the `{pkg}` placeholder in an argv template.
fn substitute(template: &[&str], pkg: &str) -> Vec<String> {
    template.iter().map(|t| t.replace("{pkg}", pkg)).collect()
}

/// The install command for a package through a traditional manager.
#[must_use]
pub fn manager_install(manager: ManagerId, pkg: &str) -> CommandLine {
    CommandLine::new(substitute(manager.install_args(), pkg))
}

/// The status-check command for a package through a traditional manager.
#[must_use]
pub fn manager_check(manager: ManagerId, pkg: &str) -> CommandLine {
    CommandLine::new(substitute(manager.check_args(), pkg))
}

/// The list-everything-installed command for bulk-listing managers.
#[must_use]
pub fn bulk_list(manager: ManagerId) -> Option<CommandLine> {
    manager
        .bulk_list_args()
        .map(|args| CommandLine::new(substitute(args, "")))
}

/// The git command for a spec: clone, or pull when `update` is set.
///
/// The OS-specific target is tilde-expanded; `None` when the spec defines no
/// target for the requested OS. A spec with `sudo` set has the whole argv
/// re-prefixed as `sudo git …`.
#[must_use]
pub fn git_command(spec: &GitSpec, os: Os, update: bool) -> Option<CommandLine> {
    let target = expanded_git_target(spec, os)?;
    let mut argv: Vec<String> = if spec.sudo {
        vec!["sudo".to_string(), "git".to_string()]
    } else {
        vec!["git".to_string()]
    };
    if update {
        argv.extend(["-C".to_string(), target, "pull".to_string()]);
    } else {
        argv.push("clone".to_string());
        if let Some(branch) = &spec.branch {
            argv.extend(["-b".to_string(), branch.clone()]);
        }
        argv.extend([spec.url.clone(), target]);
    }
    Some(CommandLine::new(argv))
}

/// The tilde-expanded checkout destination for the requested OS.
#[must_use]
pub fn expanded_git_target(spec: &GitSpec, os: Os) -> Option<String> {
    spec.targets
        .get(&os)
        .map(|t| shellexpand::tilde(t).into_owned())
}

/// Wrap a raw command string in the OS-native shell.
#[must_use]
pub fn shell_wrap(command: &str, os: Os) -> CommandLine {
    let argv = if os.is_posix() {
        vec!["sh".to_string(), "-c".to_string(), command.to_string()]
    } else {
        vec![
            "powershell".to_string(),
            "-Command".to_string(),
            command.to_string(),
        ]
    };
    CommandLine::new(argv)
}

/// The shell invocation of an installer spec's command for the OS.
#[must_use]
pub fn installer(spec: &InstallerSpec, os: Os) -> Option<CommandLine> {
    spec.command.get(&os).map(|cmd| shell_wrap(cmd, os))
}

/// The shell invocation of a package's custom command for the OS.
#[must_use]
pub fn custom(pkg: &Package, os: Os) -> Option<CommandLine> {
    pkg.custom.get(&os).map(|cmd| shell_wrap(cmd, os))
}

/// The single download-and-run script for a URL install.
///
/// Built as one literal script string, not separately executed steps, so
/// the whole operation is previewable as a unit. The caller supplies the
/// private artifact path and owns its lifetime; on POSIX the artifact is
/// marked executable before the post-download command runs.
#[must_use]
pub fn url_script(u: &UrlInstall, os: Os, file: &Path) -> CommandLine {
    let file_quoted = format!("'{}'", file.display());
    let run = u.command.replace("{file}", &file_quoted);
    let script = if os.is_posix() {
        format!(
            "curl -fsSL '{}' -o {file_quoted} && chmod +x {file_quoted} && {run}",
            u.url
        )
    } else {
        format!(
            "$ErrorActionPreference = 'Stop'; Invoke-WebRequest -Uri '{}' -OutFile {file_quoted}; {run}",
            u.url
        )
    };
    shell_wrap(&script, os)
}

/// The install command for a package via an already-selected method.
///
/// Deterministic and side-effect-free; `None` when the method does not fit
/// the package on this OS (e.g. a git spec with no target here). The URL
/// method uses `download_path` as the artifact location.
#[must_use]
pub fn build(
    pkg: &Package,
    method: &InstallMethod,
    os: Os,
    download_path: &Path,
) -> Option<CommandLine> {
    match method {
        InstallMethod::Manager(manager) => {
            let value = pkg.managers.get(manager.name())?;
            let payload = value.as_package()?;
            Some(manager_install(*manager, &payload.name))
        }
        InstallMethod::Git => git_command(pkg.managers.git()?, os, false),
        InstallMethod::Installer => installer(pkg.managers.installer()?, os),
        InstallMethod::Custom => custom(pkg, os),
        InstallMethod::Url => pkg.url.get(&os).map(|u| url_script(u, os, download_path)),
    }
}
