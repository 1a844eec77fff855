//! Nested-bundle package harvesting.
//!
//! A chained bundle is itself a stub executable: the harvester opens it
//! through the control-section codec, pulls the bundle code and machine
//! type out of the image, extracts the UX container to a scratch directory
//! and reads the child's control manifest for everything else (engine and
//! protocol versions, registration, install-size rollup, related bundles).

use crate::cacheid::CacheIdentity;
use crate::container;
use crate::error::{ErrorExt, Result};
use crate::extension::ExtensionRegistry;
use crate::message::{self, Messages};
use crate::stub::{self, MACHINE_AMD64, MACHINE_ARM64, MACHINE_I386};
use crate::symbol::{PayloadSymbol, RelatedBundleAction, RelatedBundleSymbol, SymbolGraph};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;

/// Embedded id of the control manifest inside a UX container.
const MANIFEST_ENTRY: &str = "u0";

#[derive(Debug, Default)]
struct ChildManifest {
    engine_version: Option<String>,
    protocol_version: Option<u32>,
    win64: Option<bool>,
    per_machine: Option<bool>,
    registration_version: Option<String>,
    display_name: Option<String>,
    install_size: u64,
    related: Vec<(String, String)>,
}

pub(super) fn harvest(
    graph: &mut SymbolGraph,
    package_id: &str,
    payload: &PayloadSymbol,
    extensions: &ExtensionRegistry,
    messages: &mut Messages,
) -> Result<()> {
    let mut stub = stub::open_read(&payload.source_path)?;
    let bundle_code = format!(
        "{{{}}}",
        stub.fields().bundle_code.to_string().to_uppercase()
    );
    let machine = stub.machine();

    // Pull the UX container out to a scratch directory and read the child
    // manifest from it.
    let scratch = tempfile::tempdir().fs_context(
        "creating scratch directory for bundle harvest",
        &payload.source_path,
    )?;
    let ux_path = scratch.path().join("ux.cab");
    {
        let mut ux_file =
            File::create(&ux_path).fs_context("writing extracted UX container", &ux_path)?;
        stub.read_container(0, &mut ux_file)?;
    }
    let ux_dir = scratch.path().join("ux");
    container::extract(package_id, None, &ux_path, &ux_dir, extensions)?;

    let manifest_path = ux_dir.join(MANIFEST_ENTRY);
    let xml = std::fs::read_to_string(&manifest_path)
        .fs_context("reading child bundle manifest", &manifest_path)?;
    let child = parse_child_manifest(&xml)?;

    let package_source = graph
        .packages
        .iter()
        .find(|p| p.id == package_id)
        .and_then(|p| p.source.clone());

    // 32/64-bit comes from the manifest when declared, else from the image.
    let win64 = match child.win64 {
        Some(explicit) => explicit,
        None => match machine {
            MACHINE_AMD64 | MACHINE_ARM64 => true,
            MACHINE_I386 => false,
            other => {
                messages.report(message::unknown_machine_type(
                    package_source.clone(),
                    &payload.source_path,
                    other,
                ));
                false
            }
        },
    };

    super::fill_package_from_payload(graph, package_id, payload);
    if let Some(package) = graph.packages.iter_mut().find(|p| p.id == package_id) {
        if package.version.is_none() {
            package.version = child.registration_version.clone();
        }
        if package.display_name.is_none() {
            package.display_name = child.display_name.clone();
        }
        if package.install_size.is_none() {
            package.install_size = Some(child.install_size);
        }
        if package.per_machine.is_none() {
            package.per_machine = child.per_machine;
        }
        if !package.visible {
            // Chained bundles always register their own entry; hiding it is
            // not supported.
            messages.report(message::hidden_bundle_not_supported(package_source.clone()));
            package.visible = true;
        }
    }

    for (code, action) in &child.related {
        match RelatedBundleAction::parse(action) {
            Some(action) => graph.related_bundles.push(RelatedBundleSymbol {
                code: code.clone(),
                action,
                package_id: Some(package_id.to_string()),
            }),
            None => messages.report(message::unknown_related_bundle_action(
                package_source.clone(),
                code,
                action,
            )),
        }
    }

    let version = graph
        .packages
        .iter()
        .find(|p| p.id == package_id)
        .and_then(|p| p.version.clone())
        .unwrap_or_default();
    super::assign_cache_id(
        graph,
        package_id,
        payload,
        CacheIdentity::GuidVersion {
            guid: &bundle_code,
            version: &version,
        },
        messages,
    );

    if let Some(bundle) = graph.bundle_packages.iter_mut().find(|b| b.id == package_id) {
        bundle.bundle_code = Some(bundle_code);
        bundle.engine_version = child.engine_version;
        // Old engines predate the protocol-version field; they still speak
        // the first protocol.
        bundle.protocol_version = child.protocol_version.or(Some(1));
        bundle.supports_burn_protocol = true;
        bundle.per_machine = child.per_machine;
        bundle.install_size = Some(child.install_size);
        bundle.win64 = Some(win64);
    }
    Ok(())
}

fn parse_child_manifest(xml: &str) -> Result<ChildManifest> {
    let mut reader = Reader::from_str(xml);
    let mut child = ChildManifest::default();

    loop {
        match reader.read_event().map_err(crate::error::Error::Xml)? {
            Event::Start(start) | Event::Empty(start) => {
                let local = start.local_name();
                match local.as_ref() {
                    b"BurnManifest" => {
                        child.engine_version = attr(&start, b"EngineVersion")?;
                        child.protocol_version = attr(&start, b"ProtocolVersion")?
                            .and_then(|v| v.parse().ok());
                        child.win64 = attr(&start, b"Win64")?.map(|v| v == "yes");
                    }
                    b"Registration" => {
                        child.per_machine = attr(&start, b"PerMachine")?.map(|v| v == "yes");
                        child.registration_version = attr(&start, b"Version")?;
                    }
                    b"Arp" => {
                        if child.display_name.is_none() {
                            child.display_name = attr(&start, b"DisplayName")?;
                        }
                    }
                    b"RelatedBundle" => {
                        let code = attr(&start, b"Code")?.or(attr(&start, b"Id")?);
                        let action = attr(&start, b"Action")?;
                        if let (Some(code), Some(action)) = (code, action) {
                            child.related.push((code, action));
                        }
                    }
                    name if name.ends_with(b"Package") => {
                        let size = attr(&start, b"InstallSize")?
                            .or(attr(&start, b"Size")?)
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(0);
                        child.install_size += size;
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(child)
}

fn attr(start: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| {
            crate::error::Error::GenericError(format!("bad manifest attribute: {e}"))
        })?;
        if attribute.key.local_name().as_ref() == name {
            let value = attribute
                .unescape_value()
                .map_err(crate::error::Error::Xml)?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}
