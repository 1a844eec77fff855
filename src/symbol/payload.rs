//! Payload files and their packaging.

use crate::message::SourceLocation;
use crate::symbol::PackageType;
use std::path::PathBuf;

/// How a payload travels with the bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Packaging {
    /// Compressed into a container.
    #[default]
    Embedded,
    /// Carried alongside the bundle or downloaded.
    External,
}

/// A single file contributed to the bundle.
///
/// Embedded payloads always belong to a container (except the layout-only
/// marker); external payloads are verified by hash or, mutually exclusively,
/// by certificate.
#[derive(Debug, Clone)]
pub struct PayloadSymbol {
    /// Payload id, unique across the bundle.
    pub id: String,

    /// Relative name inside the container or layout. Never absolute, never
    /// traversing outside the layout root.
    pub name: String,

    /// Build-time source path.
    pub source_path: PathBuf,

    /// Download location for external payloads.
    pub download_url: Option<String>,

    /// Embedded or external.
    pub packaging: Packaging,

    /// Owning container, required for embedded payloads.
    pub container: Option<String>,

    /// True for the special layout-only marker payload.
    pub layout_only: bool,

    /// Owning package payload, for files synthesized by harvesting.
    pub parent_payload: Option<String>,

    /// SHA-256 content hash, hex-encoded.
    pub hash: Option<String>,

    /// File size in bytes.
    pub file_size: Option<u64>,

    /// File version, when the payload carries one.
    pub version: Option<String>,

    /// Description from file metadata.
    pub description: Option<String>,

    /// Display name from file metadata.
    pub display_name: Option<String>,

    /// Signing certificate thumbprint; excludes hash validation.
    pub certificate_thumbprint: Option<String>,

    /// Signing certificate public key; excludes hash validation.
    pub certificate_public_key: Option<String>,

    /// Authoring location.
    pub source: Option<SourceLocation>,
}

impl PayloadSymbol {
    /// Creates an embedded payload with the given id, name and source.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        source_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            source_path: source_path.into(),
            download_url: None,
            packaging: Packaging::Embedded,
            container: None,
            layout_only: false,
            parent_payload: None,
            hash: None,
            file_size: None,
            version: None,
            description: None,
            display_name: None,
            certificate_thumbprint: None,
            certificate_public_key: None,
            source: None,
        }
    }

    /// True when the payload is verified by certificate instead of hash.
    pub fn uses_certificate(&self) -> bool {
        self.certificate_thumbprint.is_some() || self.certificate_public_key.is_some()
    }
}

/// Declares that a payload is the package payload of some package kind.
///
/// The facade resolver checks the declared kind against the owning package's
/// type tag and rejects mismatches.
#[derive(Debug, Clone)]
pub struct PackagePayloadSymbol {
    /// Payload id this declaration covers.
    pub payload_id: String,
    /// Package id the payload belongs to.
    pub package_id: String,
    /// Kind the payload was declared for.
    pub kind: PackageType,
    /// Authoring location.
    pub source: Option<SourceLocation>,
}
