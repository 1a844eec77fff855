//! The install-time control manifest.
//!
//! One document drives the whole engine: bundle registration, variables,
//! ordered searches, containers and payloads, and the chain with one
//! element per package carrying every type-specific attribute. Everything
//! here is read back by the runtime, so ordering and omission rules are
//! contractual, not cosmetic.

use super::{assigned_payloads, Element, ManifestWriter, BURN_NAMESPACE};
use crate::error::Result;
use crate::order::{OrderedSearches, SearchClass};
use crate::resolve::{PackageFacade, PackageFacades};
use crate::symbol::{
    ContainerType, LegacySearchKind, Packaging, PackageType, PayloadSymbol, SymbolGraph,
};
use std::io::Write;

/// Writes the control manifest for the resolved graph.
pub fn write_burn_manifest<W: Write>(
    graph: &SymbolGraph,
    facades: &PackageFacades,
    searches: &OrderedSearches,
    out: &mut W,
) -> Result<()> {
    let mut w = ManifestWriter::new(out);
    w.declaration()?;

    let win64 = graph.msi_packages.iter().any(|m| m.win64)
        || graph
            .bundle_packages
            .iter()
            .any(|b| b.win64 == Some(true));
    w.start(
        Element::new("BurnManifest")
            .attr("xmlns", BURN_NAMESPACE)
            .attr("ProtocolVersion", "1")
            .attr_bool("Win64", win64, false),
    )?;

    if let Some(condition) = &graph.bundle.condition {
        w.start(Element::new("Condition"))?;
        w.text(condition)?;
        w.end("Condition")?;
    }

    if graph.bundle.log_prefix.is_some() || graph.bundle.log_path_variable.is_some() {
        w.empty(
            Element::new("Log")
                .attr_opt("PathVariable", graph.bundle.log_path_variable.as_deref())
                .attr_opt("Prefix", graph.bundle.log_prefix.as_deref())
                .attr_opt("Extension", graph.bundle.log_extension.as_deref()),
        )?;
    }

    if let Some(update) = &graph.update {
        w.empty(Element::new("Update").attr("Location", &update.location))?;
    }

    for related in graph.related_bundles.iter().filter(|r| r.package_id.is_none()) {
        w.empty(
            Element::new("RelatedBundle")
                .attr("Code", &related.code)
                .attr("Action", related.action.as_str()),
        )?;
    }

    for variable in &graph.variables {
        w.empty(
            Element::new("Variable")
                .attr("Id", &variable.id)
                .attr_opt("Value", variable.value.as_deref())
                .attr_opt("Type", variable.variable_type.as_deref())
                .attr_bool("Hidden", variable.hidden, false)
                .attr_bool("Persisted", variable.persisted, false),
        )?;
    }

    write_searches(graph, searches, &mut w)?;
    write_ux(graph, &mut w)?;
    write_containers(graph, &mut w)?;
    write_loose_payloads(graph, &mut w)?;

    for boundary in &graph.rollback_boundaries {
        w.empty(
            Element::new("RollbackBoundary")
                .attr("Id", &boundary.id)
                .attr_bool("Vital", boundary.vital, true)
                .attr_bool("Transaction", boundary.transaction, false),
        )?;
    }

    write_registration(graph, &mut w)?;
    write_chain(graph, facades, &mut w)?;

    if !graph.unspecified_patch_targets {
        for target in &graph.patch_target_codes {
            w.empty(
                Element::new("PatchTargetCode")
                    .attr("TargetCode", &target.target_code)
                    .attr_bool(
                        "Product",
                        target.kind == crate::symbol::PatchTargetKind::Product,
                        false,
                    ),
            )?;
        }
    }

    for approved in &graph.approved_exes {
        w.empty(
            Element::new("ApprovedExeForElevation")
                .attr("Id", &approved.id)
                .attr("Key", &approved.key)
                .attr_opt("ValueName", approved.value_name.as_deref())
                .attr_bool("Win64", approved.win64, false),
        )?;
    }

    for extension in &graph.extensions {
        w.empty(
            Element::new("BootstrapperExtension")
                .attr("Id", &extension.id)
                .attr("EntryPayloadId", &extension.payload_id)
                .attr_bool("Primary", extension.primary, false),
        )?;
    }

    w.end("BurnManifest")?;
    Ok(())
}

fn write_searches<W: Write>(
    graph: &SymbolGraph,
    searches: &OrderedSearches,
    w: &mut ManifestWriter<W>,
) -> Result<()> {
    for ordered in &searches.ordered {
        let Some(search) = graph.searches.iter().find(|s| s.id == ordered.id) else {
            continue;
        };
        match &ordered.class {
            SearchClass::Legacy => {
                let Some(legacy) = graph.legacy_searches.iter().find(|s| s.id == ordered.id)
                else {
                    continue;
                };
                match &legacy.kind {
                    LegacySearchKind::Component { guid, product_code } => {
                        w.empty(
                            Element::new("ComponentSearch")
                                .attr("Id", &search.id)
                                .attr("Variable", &search.variable)
                                .attr_opt("Condition", search.condition.as_deref())
                                .attr("Guid", guid)
                                .attr_opt("ProductCode", product_code.as_deref()),
                        )?;
                    }
                    LegacySearchKind::File { path, want_version } => {
                        w.empty(
                            Element::new("FileSearch")
                                .attr("Id", &search.id)
                                .attr("Variable", &search.variable)
                                .attr_opt("Condition", search.condition.as_deref())
                                .attr("Path", path)
                                .attr("Type", if *want_version { "version" } else { "exists" }),
                        )?;
                    }
                    LegacySearchKind::Registry {
                        root,
                        key,
                        value,
                        win64,
                        expand,
                    } => {
                        w.empty(
                            Element::new("RegistrySearch")
                                .attr("Id", &search.id)
                                .attr("Variable", &search.variable)
                                .attr_opt("Condition", search.condition.as_deref())
                                .attr("Root", root.as_str())
                                .attr("Key", key)
                                .attr_opt("Value", value.as_deref())
                                .attr_bool("Win64", *win64, false)
                                .attr_bool("ExpandEnvironment", *expand, false),
                        )?;
                    }
                    LegacySearchKind::Product {
                        guid,
                        per_upgrade_code,
                    } => {
                        w.empty(
                            Element::new("ProductSearch")
                                .attr("Id", &search.id)
                                .attr("Variable", &search.variable)
                                .attr_opt("Condition", search.condition.as_deref())
                                .attr("Guid", guid)
                                .attr_bool("UpgradeCode", *per_upgrade_code, false),
                        )?;
                    }
                }
            }
            SearchClass::SetVariable => {
                let Some(data) = graph
                    .set_variable_searches
                    .iter()
                    .find(|s| s.id == ordered.id)
                else {
                    continue;
                };
                w.empty(
                    Element::new("SetVariable")
                        .attr("Id", &search.id)
                        .attr("Variable", &search.variable)
                        .attr_opt("Condition", search.condition.as_deref())
                        .attr_opt("Value", data.value.as_deref())
                        .attr_opt("Type", data.variable_type.as_deref()),
                )?;
            }
            SearchClass::Extension { extension_id } => {
                w.empty(
                    Element::new("ExtensionSearch")
                        .attr("Id", &search.id)
                        .attr("Variable", &search.variable)
                        .attr_opt("Condition", search.condition.as_deref())
                        .attr("ExtensionId", extension_id),
                )?;
            }
        }
    }
    Ok(())
}

fn write_ux<W: Write>(graph: &SymbolGraph, w: &mut ManifestWriter<W>) -> Result<()> {
    let Some(ux) = graph
        .containers
        .iter()
        .find(|c| c.container_type == ContainerType::Ux)
    else {
        return Ok(());
    };
    let payloads = assigned_payloads(graph, ux);

    let embedded_id_of = |payload_id: Option<&str>| -> Option<String> {
        payload_id.and_then(|id| {
            payloads
                .iter()
                .find(|(_, p)| p.id == id)
                .map(|(embedded, _)| embedded.clone())
        })
    };
    let primary = embedded_id_of(graph.bundle.primary_ux_payload.as_deref())
        .or_else(|| payloads.first().map(|(id, _)| id.clone()));
    let secondary = embedded_id_of(graph.bundle.secondary_ux_payload.as_deref());

    w.start(
        Element::new("UX")
            .attr_opt("PrimaryPayloadId", primary.as_deref())
            .attr_opt("SecondaryPayloadId", secondary.as_deref()),
    )?;
    for (embedded_id, payload) in &payloads {
        w.empty(
            Element::new("Payload")
                .attr("Id", &payload.id)
                .attr("FilePath", &payload.name)
                .attr("EmbeddedId", embedded_id)
                .attr_nonzero("FileSize", payload.file_size.unwrap_or(0))
                .attr_opt("Hash", payload.hash.as_deref()),
        )?;
    }
    w.end("UX")?;
    Ok(())
}

fn write_containers<W: Write>(graph: &SymbolGraph, w: &mut ManifestWriter<W>) -> Result<()> {
    let mut attached_index = 1u32; // slot 0 is the UX container
    for container in &graph.containers {
        match container.container_type {
            ContainerType::Ux => continue,
            ContainerType::Attached | ContainerType::Detached => {
                if container.size == 0 {
                    continue; // dropped empty container
                }
                let attached = container.container_type == ContainerType::Attached;
                let mut element = Element::new("Container")
                    .attr("Id", &container.id)
                    .attr("FilePath", &container.name)
                    .attr_nonzero("FileSize", container.size)
                    .attr_opt("Hash", container.hash.as_deref())
                    .attr_bool("Attached", attached, false);
                if attached {
                    element = element.attr("AttachedIndex", &attached_index.to_string());
                    attached_index += 1;
                }
                w.empty(element)?;
            }
        }
    }
    Ok(())
}

/// Non-UX payloads: everything embedded in attached/detached containers,
/// external payloads, and layout-only markers.
fn write_loose_payloads<W: Write>(graph: &SymbolGraph, w: &mut ManifestWriter<W>) -> Result<()> {
    let ux_id = graph
        .containers
        .iter()
        .find(|c| c.container_type == ContainerType::Ux)
        .map(|c| c.id.clone());

    for payload in &graph.payloads {
        if payload.container.is_some() && payload.container == ux_id {
            continue;
        }
        write_payload_element(payload, w)?;
    }
    Ok(())
}

fn write_payload_element<W: Write>(
    payload: &PayloadSymbol,
    w: &mut ManifestWriter<W>,
) -> Result<()> {
    w.empty(
        Element::new("Payload")
            .attr("Id", &payload.id)
            .attr("FilePath", &payload.name)
            .attr_nonzero("FileSize", payload.file_size.unwrap_or(0))
            .attr_opt("Hash", payload.hash.as_deref())
            .attr_opt(
                "CertificateRootThumbprint",
                payload.certificate_thumbprint.as_deref(),
            )
            .attr_opt(
                "CertificateRootPublicKeyIdentifier",
                payload.certificate_public_key.as_deref(),
            )
            .attr_bool("LayoutOnly", payload.layout_only, false)
            .attr(
                "Packaging",
                match payload.packaging {
                    Packaging::Embedded => "embedded",
                    Packaging::External => "external",
                },
            )
            .attr_opt("Container", payload.container.as_deref())
            .attr_opt("DownloadUrl", payload.download_url.as_deref()),
    )?;
    Ok(())
}

fn write_registration<W: Write>(graph: &SymbolGraph, w: &mut ManifestWriter<W>) -> Result<()> {
    let bundle = &graph.bundle;
    w.start(
        Element::new("Registration")
            .attr(
                "Code",
                &format!("{{{}}}", bundle.bundle_code.to_string().to_uppercase()),
            )
            .attr("Version", &bundle.version)
            .attr_opt("ProviderKey", bundle.provider_key.as_deref())
            .attr_opt("UpgradeCode", bundle.upgrade_code.as_deref())
            .attr_bool("PerMachine", bundle.per_machine, false),
    )?;

    w.empty(
        Element::new("Arp")
            .attr("DisplayName", &bundle.name)
            .attr("DisplayVersion", &bundle.version)
            .attr_opt("Publisher", bundle.manufacturer.as_deref())
            .attr_opt("HelpLink", bundle.help_url.as_deref())
            .attr_opt("HelpTelephone", bundle.help_telephone.as_deref())
            .attr_opt("AboutUrl", bundle.about_url.as_deref())
            .attr_opt("UpdateUrl", bundle.update_url.as_deref())
            .attr_opt("Comments", bundle.comments.as_deref())
            .attr_opt("DisableModify", bundle.disable_modify.as_deref())
            .attr_bool("DisableRemove", bundle.disable_remove, false),
    )?;

    for tag in &graph.software_tags {
        w.start(
            Element::new("SoftwareTag")
                .attr("Filename", &tag.name)
                .attr("Regid", &tag.regid)
                .attr_opt("Path", tag.path.as_deref()),
        )?;
        w.end("SoftwareTag")?;
    }

    w.end("Registration")?;
    Ok(())
}

fn write_chain<W: Write>(
    graph: &SymbolGraph,
    facades: &PackageFacades,
    w: &mut ManifestWriter<W>,
) -> Result<()> {
    w.start(Element::new("Chain"))?;
    for facade in facades.iter() {
        write_chain_package(graph, facade, w)?;
    }
    w.end("Chain")?;
    Ok(())
}

fn write_chain_package<W: Write>(
    graph: &SymbolGraph,
    facade: &PackageFacade,
    w: &mut ManifestWriter<W>,
) -> Result<()> {
    let Some(package) = graph.packages.iter().find(|p| p.id == facade.package_id) else {
        return Ok(());
    };
    let element_name = format!("{}Package", facade.package_type.as_str());

    let mut element = Element::new(&element_name)
        .attr("Id", &package.id)
        .attr("Cache", package.cache.as_str())
        .attr_opt("CacheId", package.cache_id.as_deref())
        .attr_nonzero("InstallSize", package.install_size.unwrap_or(0))
        .attr_nonzero("Size", package.size)
        .attr_bool("PerMachine", package.per_machine.unwrap_or(false), false)
        .attr_bool("Permanent", package.permanent, false)
        .attr_bool("Vital", package.vital, true)
        .attr_opt("DisplayName", package.display_name.as_deref())
        .attr_opt("Description", package.description.as_deref())
        .attr_opt("Version", package.version.as_deref())
        .attr_opt("Language", package.language.as_deref())
        .attr_opt("LogPathVariable", package.log_path_variable.as_deref())
        .attr_opt(
            "RollbackLogPathVariable",
            package.rollback_log_path_variable.as_deref(),
        )
        .attr_opt("InstallCondition", package.install_condition.as_deref())
        .attr_opt("RepairCondition", package.repair_condition.as_deref())
        .attr_opt(
            "RollbackBoundaryForward",
            package.rollback_boundary_forward.as_deref(),
        )
        .attr_opt(
            "RollbackBoundaryBackward",
            package.rollback_boundary_backward.as_deref(),
        );

    match facade.package_type {
        PackageType::Msi => {
            if let Some(msi) = graph.msi_packages.iter().find(|m| m.id == package.id) {
                element = element
                    .attr_opt("ProductCode", msi.product_code.as_deref())
                    .attr_opt("UpgradeCode", msi.upgrade_code.as_deref())
                    .attr_bool("EnableFeatureSelection", msi.enable_feature_selection, false);
            }
        }
        PackageType::Msp => {
            if let Some(msp) = graph.msp_packages.iter().find(|m| m.id == package.id) {
                element = element
                    .attr_opt("PatchCode", msp.patch_code.as_deref())
                    .attr_opt("Manufacturer", msp.manufacturer.as_deref())
                    .attr_bool("TargetUnspecified", msp.target_unspecified, false);
            }
        }
        PackageType::Msu => {
            if let Some(msu) = graph.msu_packages.iter().find(|m| m.id == package.id) {
                element = element.attr_opt("DetectCondition", msu.detect_condition.as_deref());
            }
        }
        PackageType::Exe => {
            if let Some(exe) = graph.exe_packages.iter().find(|e| e.id == package.id) {
                element = element
                    .attr("DetectionType", exe.detection_type.as_str())
                    .attr_opt("DetectCondition", exe.detect_condition.as_deref())
                    .attr_opt("ArpId", exe.arp_id.as_deref())
                    .attr_opt("ArpDisplayVersion", exe.arp_display_version.as_deref())
                    .attr_bool("ArpWin64", exe.arp_win64, false)
                    .attr_opt("InstallArguments", exe.install_arguments.as_deref())
                    .attr_opt("RepairArguments", exe.repair_arguments.as_deref())
                    .attr_opt("UninstallArguments", exe.uninstall_arguments.as_deref())
                    .attr_bool("Repairable", exe.repair_arguments.is_some(), false)
                    .attr_bool("Uninstallable", exe.uninstall_arguments.is_some(), false);
            }
        }
        PackageType::Bundle => {
            if let Some(bundle) = graph.bundle_packages.iter().find(|b| b.id == package.id) {
                element = element
                    .attr_opt("BundleCode", bundle.bundle_code.as_deref())
                    .attr_opt("EngineVersion", bundle.engine_version.as_deref())
                    .attr_opt(
                        "ProtocolVersion",
                        bundle.protocol_version.map(|v| v.to_string()).as_deref(),
                    )
                    .attr_bool("SupportsBurnProtocol", bundle.supports_burn_protocol, false)
                    .attr_bool("Win64", bundle.win64.unwrap_or(false), false);
            }
        }
    }

    w.start(element)?;

    if facade.package_type == PackageType::Msi {
        let feature_selection = graph
            .msi_packages
            .iter()
            .find(|m| m.id == package.id)
            .is_some_and(|m| m.enable_feature_selection);
        if feature_selection {
            for feature in graph
                .package_features
                .iter()
                .filter(|f| f.package_id == package.id)
            {
                w.empty(Element::new("MsiFeature").attr("Id", &feature.feature))?;
            }
        }
        for slipstream in graph
            .slipstream_msps
            .iter()
            .filter(|s| s.msi_package_id == package.id)
        {
            w.empty(Element::new("SlipstreamMsp").attr("Id", &slipstream.msp_package_id))?;
        }
    }

    for property in graph
        .msi_properties
        .iter()
        .filter(|p| p.package_id == package.id)
    {
        w.empty(
            Element::new("MsiProperty")
                .attr("Id", &property.name)
                .attr("Value", &property.value)
                .attr_opt("Condition", property.condition.as_deref()),
        )?;
    }

    for exit_code in graph
        .exit_codes
        .iter()
        .filter(|e| e.package_id == package.id)
    {
        w.empty(
            Element::new("ExitCode")
                .attr_opt("Code", exit_code.code.map(|c| c.to_string()).as_deref())
                .attr("Type", exit_code.behavior.as_str()),
        )?;
    }

    for command_line in graph
        .command_lines
        .iter()
        .filter(|c| c.package_id == package.id)
    {
        w.empty(
            Element::new("CommandLine")
                .attr_opt("InstallArgument", command_line.install_argument.as_deref())
                .attr_opt(
                    "UninstallArgument",
                    command_line.uninstall_argument.as_deref(),
                )
                .attr_opt("RepairArgument", command_line.repair_argument.as_deref())
                .attr_opt("Condition", command_line.condition.as_deref()),
        )?;
    }

    for provider in graph
        .providers
        .iter()
        .filter(|p| p.package_id == package.id)
    {
        w.empty(
            Element::new("Provides")
                .attr("Key", &provider.provider_key)
                .attr_opt("Version", provider.version.as_deref())
                .attr_opt("DisplayName", provider.display_name.as_deref())
                .attr_bool("Imported", provider.imported, false),
        )?;
    }

    for related in graph
        .related_bundles
        .iter()
        .filter(|r| r.package_id.as_deref() == Some(package.id.as_str()))
    {
        w.empty(
            Element::new("RelatedBundle")
                .attr("Code", &related.code)
                .attr("Action", related.action.as_str()),
        )?;
    }

    for related in graph
        .related_packages
        .iter()
        .filter(|r| r.package_id == package.id)
    {
        let element = Element::new("RelatedPackage")
            .attr("Code", &related.related_code)
            .attr_opt("MinVersion", related.min_version.as_deref())
            .attr_opt("MaxVersion", related.max_version.as_deref())
            .attr_bool("MinInclusive", related.min_inclusive, false)
            .attr_bool("MaxInclusive", related.max_inclusive, false)
            .attr_bool("OnlyDetect", related.only_detect, false)
            .attr_bool("LangInclusive", related.lang_inclusive, false);
        if related.languages.is_empty() {
            w.empty(element)?;
        } else {
            w.start(element)?;
            for language in &related.languages {
                w.empty(Element::new("Language").attr("Id", language))?;
            }
            w.end("RelatedPackage")?;
        }
    }

    // The package payload first, then every harvested child payload.
    w.empty(Element::new("PayloadRef").attr("Id", &facade.payload_id))?;
    for payload in graph
        .payloads
        .iter()
        .filter(|p| p.parent_payload.as_deref() == Some(facade.payload_id.as_str()))
    {
        w.empty(Element::new("PayloadRef").attr("Id", &payload.id))?;
    }

    w.end(&element_name)?;
    Ok(())
}
