//! Extension registry.
//!
//! Bundles can delegate two concerns to host-loaded extensions: archive
//! formats other than cabinets, and searches the engine does not evaluate
//! itself. The host registers providers once during pipeline setup; the
//! binder looks them up by capability id in O(1) instead of scanning at
//! each call site.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One payload as handed to a container provider.
#[derive(Debug, Clone)]
pub struct ContainerPayload {
    /// Name inside the archive (the embedded id).
    pub name: String,
    /// Build-time source path.
    pub source_path: PathBuf,
}

/// An extension-owned archive format.
///
/// Providers own creation and extraction entirely; the binder only records
/// the returned size and hash. Failures cross the boundary as opaque
/// [`anyhow::Error`] values.
pub trait ContainerProvider {
    /// Packs the payloads into `output`, returning (size, sha256 hex).
    fn create_container(
        &self,
        container_id: &str,
        payloads: &[ContainerPayload],
        output: &Path,
    ) -> anyhow::Result<(u64, String)>;

    /// Expands a container into `target`.
    ///
    /// `metadata` is whatever the extension wrote into its own auxiliary
    /// manifest when the container was packed.
    fn extract_container(
        &self,
        container_id: &str,
        source: &Path,
        target: &Path,
        metadata: Option<&str>,
    ) -> anyhow::Result<()>;
}

/// Hook for resolving files referenced by a package but not shipped next to
/// it (e.g. cabinets of an administrative image laid out elsewhere).
pub trait RelatedFileResolver {
    /// Returns the resolved path, or `None` to fall through to the next
    /// resolver and finally the package-relative default.
    fn resolve_related_file(&self, package: &Path, relative_name: &str) -> Option<PathBuf>;
}

/// Capability map built once during pipeline setup.
#[derive(Default)]
pub struct ExtensionRegistry {
    container_providers: HashMap<String, Box<dyn ContainerProvider>>,
    file_resolvers: Vec<Box<dyn RelatedFileResolver>>,
    extension_data: HashMap<String, String>,
}

impl ExtensionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an archive-format provider under its extension id.
    pub fn add_container_provider(
        &mut self,
        extension_id: impl Into<String>,
        provider: Box<dyn ContainerProvider>,
    ) {
        self.container_providers
            .insert(extension_id.into(), provider);
    }

    /// Looks up an archive-format provider.
    pub fn container_provider(&self, extension_id: &str) -> Option<&dyn ContainerProvider> {
        self.container_providers
            .get(extension_id)
            .map(Box::as_ref)
    }

    /// Registers a related-file resolver; resolvers run in registration
    /// order.
    pub fn add_file_resolver(&mut self, resolver: Box<dyn RelatedFileResolver>) {
        self.file_resolvers.push(resolver);
    }

    /// Runs the registered resolvers until one claims the file.
    pub fn resolve_related_file(&self, package: &Path, relative_name: &str) -> Option<PathBuf> {
        self.file_resolvers
            .iter()
            .find_map(|r| r.resolve_related_file(package, relative_name))
    }

    /// Stores an extension's opaque manifest fragment.
    pub fn set_extension_data(&mut self, extension_id: impl Into<String>, fragment: String) {
        self.extension_data.insert(extension_id.into(), fragment);
    }

    /// Opaque manifest fragment for one extension.
    pub fn extension_data(&self, extension_id: &str) -> Option<&str> {
        self.extension_data.get(extension_id).map(String::as_str)
    }
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field(
                "container_providers",
                &self.container_providers.keys().collect::<Vec<_>>(),
            )
            .field("file_resolvers", &self.file_resolvers.len())
            .field(
                "extension_data",
                &self.extension_data.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}
