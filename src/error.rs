//! Error types for bundle binding operations.
//!
//! Hard failures surface through [`Error`]; diagnostics that must be
//! collected across the whole bind (so every problem in a build is reported
//! together) go through [`crate::message::Messages`] instead.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for binder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for all binder operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// IO error with the operation and path that failed
    #[error("{} ({}): {}", action, .path.display(), source)]
    FileSystem {
        /// What the binder was doing
        action: &'static str,
        /// Path involved in the operation
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Bootstrapper stub errors
    #[error(transparent)]
    Stub(#[from] StubError),

    /// Container packing and extraction errors
    #[error(transparent)]
    Container(#[from] ContainerError),

    /// Package database reader errors
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Manifest reading or writing errors
    #[error("manifest XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Generic errors
    #[error("{0}")]
    GenericError(String),

    /// Errors raised inside extension-owned providers
    #[error("{0}")]
    Extension(#[from] anyhow::Error),
}

/// Errors from the bootstrapper stub control-section codec
#[derive(Error, Debug)]
pub enum StubError {
    /// The file is not a valid portable executable stub
    #[error("{} is not a valid bootstrapper stub executable", .path.display())]
    InvalidStubExe {
        /// Path of the rejected file
        path: PathBuf,
    },

    /// No control section was found in the stub
    #[error("unable to find control section in {}", .path.display())]
    MissingSection {
        /// Path of the stub
        path: PathBuf,
    },

    /// The control section is present but smaller than its fixed header
    #[error("control section in {} is too small: {} bytes", .path.display(), size)]
    SectionTooSmall {
        /// Path of the stub
        path: PathBuf,
        /// Raw size of the section
        size: u32,
    },

    /// The control section does not start with the expected magic value
    #[error("control section magic {:#010x} in {} is not recognized", magic, .path.display())]
    BadSectionMagic {
        /// Path of the stub
        path: PathBuf,
        /// Magic value found in the section
        magic: u32,
    },

    /// The control section version does not match this binder
    #[error("control section version {:#010x} in {} is incompatible", version, .path.display())]
    IncompatibleVersion {
        /// Path of the stub
        path: PathBuf,
        /// Version value found in the section
        version: u32,
    },

    /// The container format tag is not the cabinet family
    #[error("unsupported container format {} in {}", format, .path.display())]
    UnsupportedFormat {
        /// Path of the stub
        path: PathBuf,
        /// Format tag found in the section
        format: u32,
    },

    /// The section size table cannot hold another container entry
    #[error("too many attached containers; the stub can track at most {max}")]
    TooManyContainers {
        /// Maximum entries the section can record
        max: u32,
    },

    /// Containers were appended out of order
    #[error("the UX container must be appended before any attached container")]
    UxContainerNotFirst,

    /// The signature fields were already recorded once
    #[error("stub signature was already recorded and zeroed")]
    SignatureAlreadyRecorded,
}

/// Errors from the container packer
#[derive(Error, Debug)]
pub enum ContainerError {
    /// A cabinet could not be created
    #[error("failed to create container {}: {}", .path.display(), source)]
    Create {
        /// Output cabinet path
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// A cabinet could not be opened or expanded
    #[error("failed to extract container {}: {}", .path.display(), source)]
    Extract {
        /// Cabinet path
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// A payload source file was missing or unreadable
    #[error("failed to read payload {} from {}: {}", name, .path.display(), source)]
    PayloadRead {
        /// Payload name inside the container
        name: String,
        /// Source path on disk
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },
}

/// Errors surfaced by the external installer-database reader.
///
/// The binder never opens an installer database itself; the host supplies an
/// implementation of [`crate::reader::DatabaseOpener`] and failures cross the
/// seam as this type.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// The database could not be opened
    #[error("unable to open package database {}: {}", .path.display(), reason)]
    Open {
        /// Package path
        path: PathBuf,
        /// Reader-supplied reason
        reason: String,
    },

    /// A query against an open database failed
    #[error("query against table {table} failed: {reason}")]
    Query {
        /// Table the query ran against
        table: String,
        /// Reader-supplied reason
        reason: String,
    },

    /// A summary-information stream read failed
    #[error("unable to read summary information: {0}")]
    SummaryInformation(String),
}

/// Extension trait adding filesystem context to IO results.
pub trait ErrorExt<T> {
    /// Wraps an IO error with the action being performed and the path.
    fn fs_context(self, action: &'static str, path: &std::path::Path) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, action: &'static str, path: &std::path::Path) -> Result<T> {
        self.map_err(|source| Error::FileSystem {
            action,
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Returns early with a [`Error::GenericError`] built from a format string.
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::error::Error::GenericError(format!($($arg)*)))
    };
}
