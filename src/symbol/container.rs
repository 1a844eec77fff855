//! Archive containers.

use crate::message::SourceLocation;
use std::path::PathBuf;

/// Id of the reserved default attached container.
///
/// Embedded payloads that name no explicit container land here. The packer
/// warns rather than silently dropping it when it ends up empty.
pub const DEFAULT_ATTACHED_CONTAINER_ID: &str = "BundleDefaultAttachedContainer";

/// Where a container lives relative to the bundle executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerType {
    /// The mandatory first container holding the UX payloads and manifests.
    Ux,
    /// Appended to the executable after the UX container.
    Attached,
    /// Written alongside the executable, never embedded.
    Detached,
}

/// An archive container holding payloads.
#[derive(Debug, Clone)]
pub struct ContainerSymbol {
    /// Container id.
    pub id: String,

    /// UX, attached or detached.
    pub container_type: ContainerType,

    /// File name of the container (used for detached output).
    pub name: String,

    /// Build-time path of the packed archive.
    pub work_path: PathBuf,

    /// Packed size in bytes; filled by the packer.
    pub size: u64,

    /// SHA-256 hash of the packed archive; filled by the packer.
    pub hash: Option<String>,

    /// Extension owning the archive format, for non-cabinet containers.
    pub extension_id: Option<String>,

    /// Authoring location.
    pub source: Option<SourceLocation>,
}

impl ContainerSymbol {
    /// Creates a container with an empty work path; the packer fills
    /// `work_path`, `size` and `hash` when it builds the archive.
    pub fn new(id: impl Into<String>, container_type: ContainerType) -> Self {
        let id = id.into();
        Self {
            name: format!("{id}.cab"),
            id,
            container_type,
            work_path: PathBuf::new(),
            size: 0,
            hash: None,
            extension_id: None,
            source: None,
        }
    }
}
