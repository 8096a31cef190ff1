//! Domain error types for the provisioning engine.
//!
//! Catalog errors are the only fatal class: anything that goes wrong below
//! catalog parsing is folded into a per-package
//! [`InstallResult`](crate::install::InstallResult) instead, so one bad
//! package can never abort the rest of a batch.
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading and decoding the catalog.
///
/// Every variant is fatal: no installation starts with a broken catalog.
/// Command handlers convert these to [`anyhow::Error`] via `?`.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("cannot read catalog {path}: {source}")]
    Io {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The catalog file is not valid YAML or violates the schema.
    ///
    /// Manager-value shape errors surface here with the offending manager
    /// key and the attempted shapes named in the message.
    #[error("invalid catalog {path}: {source}")]
    Parse {
        /// Path to the offending file.
        path: PathBuf,
        /// Underlying decode error.
        source: serde_yaml::Error,
    },

    /// The catalog declares a schema version this build does not understand.
    #[error("unsupported catalog version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// Version declared by the catalog.
        found: u32,
        /// Version this build supports.
        supported: u32,
    },
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_version_display() {
        let e = CatalogError::UnsupportedVersion {
            found: 7,
            supported: 1,
        };
        assert_eq!(e.to_string(), "unsupported catalog version 7 (supported: 1)");
    }

    #[test]
    fn io_error_display_names_path() {
        let e = CatalogError::Io {
            path: PathBuf::from("/etc/provision/catalog.yaml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert!(e.to_string().contains("/etc/provision/catalog.yaml"));
    }

    #[test]
    fn io_error_has_source() {
        use std::error::Error as _;
        let e = CatalogError::Io {
            path: PathBuf::from("catalog.yaml"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(e.source().is_some());
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn catalog_error_is_send_sync() {
        assert_send_sync::<CatalogError>();
    }
}
