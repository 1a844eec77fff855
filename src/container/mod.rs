//! Container packing and extraction.
//!
//! Each container symbol becomes one cabinet archive built from its
//! assigned payloads; the packer records the final size and content hash
//! back onto the symbol graph for the manifest serializers. Containers
//! owned by an archive-format extension delegate wholly to the registered
//! provider.

use crate::error::{ContainerError, Result};
use crate::extension::{ContainerPayload, ExtensionRegistry};
use crate::hash::sha256_file;
use crate::message::{self, Messages};
use crate::symbol::{ContainerSymbol, DEFAULT_ATTACHED_CONTAINER_ID};
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::Path;

/// Compression applied to cabinet folders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Store payloads uncompressed.
    None,
    /// MSZIP deflate, the default.
    #[default]
    MsZip,
}

impl Compression {
    fn to_cab(self) -> cab::CompressionType {
        match self {
            Self::None => cab::CompressionType::None,
            Self::MsZip => cab::CompressionType::MsZip,
        }
    }
}

/// Size and hash of a packed container.
#[derive(Debug, Clone)]
pub struct PackedContainer {
    /// Final archive size in bytes.
    pub size: u64,
    /// Hex-encoded SHA-256 of the archive.
    pub hash: String,
}

/// Builds one container archive at `output` from its payload list.
///
/// Returns `None` when the container has no payloads and is skipped; the
/// reserved default attached container additionally warns, since an empty
/// one usually means authoring assigned everything elsewhere by accident.
pub fn pack(
    container: &ContainerSymbol,
    payloads: &[ContainerPayload],
    output: &Path,
    compression: Compression,
    extensions: &ExtensionRegistry,
    messages: &mut Messages,
) -> Result<Option<PackedContainer>> {
    if payloads.is_empty() {
        if container.id == DEFAULT_ATTACHED_CONTAINER_ID {
            messages.report(message::empty_container(
                container.source.clone(),
                &container.id,
            ));
        }
        log::debug!("skipping empty container {}", container.id);
        return Ok(None);
    }

    if let Some(extension_id) = &container.extension_id {
        let Some(provider) = extensions.container_provider(extension_id) else {
            messages.report(message::missing_container_extension(
                container.source.clone(),
                &container.id,
                extension_id,
            ));
            return Ok(None);
        };
        let (size, hash) = provider.create_container(&container.id, payloads, output)?;
        log::debug!(
            "extension {extension_id} packed container {} ({size} bytes)",
            container.id
        );
        return Ok(Some(PackedContainer { size, hash }));
    }

    pack_cabinet(payloads, output, compression)?;
    let (size, hash) = sha256_file(output)?;
    log::debug!("packed container {} ({size} bytes)", container.id);
    Ok(Some(PackedContainer { size, hash }))
}

fn pack_cabinet(
    payloads: &[ContainerPayload],
    output: &Path,
    compression: Compression,
) -> Result<()> {
    let mut sources: HashMap<&str, &Path> = HashMap::with_capacity(payloads.len());
    let mut builder = cab::CabinetBuilder::new();
    let folder = builder.add_folder(compression.to_cab());
    for payload in payloads {
        folder.add_file(payload.name.clone());
        sources.insert(payload.name.as_str(), payload.source_path.as_path());
    }

    let file = File::create(output).map_err(|source| ContainerError::Create {
        path: output.to_path_buf(),
        source,
    })?;
    let mut cab_writer = builder
        .build(file)
        .map_err(|source| ContainerError::Create {
            path: output.to_path_buf(),
            source,
        })?;

    while let Some(mut writer) = cab_writer
        .next_file()
        .map_err(|source| ContainerError::Create {
            path: output.to_path_buf(),
            source,
        })?
    {
        let name = writer.file_name().to_string();
        let source_path = sources
            .get(name.as_str())
            .copied()
            .expect("cabinet writer yields only files the builder added");
        let mut source =
            File::open(source_path).map_err(|source| ContainerError::PayloadRead {
                name: name.clone(),
                path: source_path.to_path_buf(),
                source,
            })?;
        io::copy(&mut source, &mut writer).map_err(|source| ContainerError::PayloadRead {
            name,
            path: source_path.to_path_buf(),
            source,
        })?;
    }

    let mut file = cab_writer
        .finish()
        .map_err(|source| ContainerError::Create {
            path: output.to_path_buf(),
            source,
        })?;
    io::Write::flush(&mut file).map_err(|source| ContainerError::Create {
        path: output.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Expands a container into `target`, returning the entry names.
///
/// Extension-owned containers delegate to their provider, passing along
/// whatever metadata the extension recorded at pack time.
pub fn extract(
    container_id: &str,
    extension_id: Option<&str>,
    source: &Path,
    target: &Path,
    extensions: &ExtensionRegistry,
) -> Result<Vec<String>> {
    if let Some(extension_id) = extension_id {
        let provider = extensions.container_provider(extension_id).ok_or_else(|| {
            crate::error::Error::GenericError(format!(
                "container {container_id} requires extension {extension_id}, which is not loaded"
            ))
        })?;
        let metadata = extensions.extension_data(extension_id);
        provider.extract_container(container_id, source, target, metadata)?;
        return Ok(walkdir::WalkDir::new(target)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                e.path()
                    .strip_prefix(target)
                    .ok()
                    .map(|p| p.to_string_lossy().into_owned())
            })
            .collect());
    }

    extract_cabinet(source, target)
}

fn extract_cabinet(source: &Path, target: &Path) -> Result<Vec<String>> {
    let file = File::open(source).map_err(|e| ContainerError::Extract {
        path: source.to_path_buf(),
        source: e,
    })?;
    let mut cabinet = cab::Cabinet::new(file).map_err(|e| ContainerError::Extract {
        path: source.to_path_buf(),
        source: e,
    })?;

    let names: Vec<String> = cabinet
        .folder_entries()
        .flat_map(|folder| folder.file_entries())
        .map(|entry| entry.name().to_string())
        .collect();

    std::fs::create_dir_all(target).map_err(|e| ContainerError::Extract {
        path: target.to_path_buf(),
        source: e,
    })?;

    for name in &names {
        let out_path = target.join(name);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ContainerError::Extract {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let mut reader = cabinet.read_file(name).map_err(|e| ContainerError::Extract {
            path: source.to_path_buf(),
            source: e,
        })?;
        let mut out = File::create(&out_path).map_err(|e| ContainerError::Extract {
            path: out_path.clone(),
            source: e,
        })?;
        io::copy(&mut reader, &mut out).map_err(|e| ContainerError::Extract {
            path: out_path.clone(),
            source: e,
        })?;
    }

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::ContainerType;
    use std::io::Write;

    fn write_payload(dir: &Path, name: &str, contents: &[u8]) -> ContainerPayload {
        let path = dir.join(name);
        File::create(&path).unwrap().write_all(contents).unwrap();
        ContainerPayload {
            name: name.to_string(),
            source_path: path,
        }
    }

    #[test]
    fn pack_then_extract_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let payloads = vec![
            write_payload(dir.path(), "a0", b"first payload"),
            write_payload(dir.path(), "a1", b"second payload, longer than the first"),
        ];
        let container = ContainerSymbol::new("TestContainer", ContainerType::Attached);
        let output = dir.path().join("test.cab");
        let extensions = ExtensionRegistry::new();
        let mut messages = Messages::new();

        let packed = pack(
            &container,
            &payloads,
            &output,
            Compression::MsZip,
            &extensions,
            &mut messages,
        )
        .unwrap()
        .expect("container with payloads is packed");
        assert_eq!(output.metadata().unwrap().len(), packed.size);
        assert_eq!(64, packed.hash.len());
        assert!(!messages.has_errors());

        let target = dir.path().join("extracted");
        let names = extract("TestContainer", None, &output, &target, &extensions).unwrap();
        assert_eq!(vec!["a0".to_string(), "a1".to_string()], names);
        assert_eq!(
            b"first payload".to_vec(),
            std::fs::read(target.join("a0")).unwrap()
        );
        assert_eq!(
            b"second payload, longer than the first".to_vec(),
            std::fs::read(target.join("a1")).unwrap()
        );
    }

    #[test]
    fn empty_container_is_skipped_silently() {
        let dir = tempfile::tempdir().unwrap();
        let container = ContainerSymbol::new("SideContainer", ContainerType::Attached);
        let mut messages = Messages::new();

        let packed = pack(
            &container,
            &[],
            &dir.path().join("side.cab"),
            Compression::default(),
            &ExtensionRegistry::new(),
            &mut messages,
        )
        .unwrap();
        assert!(packed.is_none());
        assert!(messages.all().is_empty());
    }

    #[test]
    fn empty_default_attached_container_warns() {
        let dir = tempfile::tempdir().unwrap();
        let container =
            ContainerSymbol::new(DEFAULT_ATTACHED_CONTAINER_ID, ContainerType::Attached);
        let mut messages = Messages::new();

        let packed = pack(
            &container,
            &[],
            &dir.path().join("default.cab"),
            Compression::default(),
            &ExtensionRegistry::new(),
            &mut messages,
        )
        .unwrap();
        assert!(packed.is_none());
        assert!(!messages.has_errors());
        assert_eq!(1, messages.all().len());
        assert_eq!(message::EMPTY_CONTAINER, messages.all()[0].id);
    }

    #[test]
    fn missing_extension_provider_is_a_located_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut container = ContainerSymbol::new("ExtContainer", ContainerType::Detached);
        container.extension_id = Some("FancyArchive".into());
        container.source = Some(crate::message::SourceLocation::new("bundle.wxs", 7));
        let payloads = vec![write_payload(dir.path(), "a0", b"payload")];
        let mut messages = Messages::new();

        let packed = pack(
            &container,
            &payloads,
            &dir.path().join("ext.bin"),
            Compression::default(),
            &ExtensionRegistry::new(),
            &mut messages,
        )
        .unwrap();
        assert!(packed.is_none());
        assert!(messages.has_errors());
        assert_eq!(message::MISSING_CONTAINER_EXTENSION, messages.all()[0].id);
        assert!(messages.all()[0].source.is_some());
    }
}
