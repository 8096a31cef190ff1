//! Declarative environment-provisioning engine.
//!
//! Given a host's observed attributes (OS, distribution, hostname, user) and
//! a declarative catalog of applications/packages, this crate decides which
//! catalog entries apply to the host and how each applicable package gets
//! installed — through whichever detected backend fits, a git checkout, an
//! installer script, a custom command, or a downloaded artifact — producing
//! one pass/fail result per package.
//!
//! The public API is organised into four layers:
//!
//! - **[`config`]** — catalog loading, applicability predicates, and the
//!   normalizer that folds the declared shapes into canonical packages
//! - **[`install`]** — backend detection, method selection, pure command
//!   construction, status checks, and the sequential orchestrator
//! - **[`exec`]** — the subprocess boundary with cancellation support
//! - **[`commands`]** — top-level subcommand orchestration (`install`, `list`)
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod host;
pub mod install;
pub mod logging;
