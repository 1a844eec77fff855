//! The bootstrapper-application data manifest.
//!
//! The UX reads this document instead of the control manifest: friendlier
//! shapes, display strings, per-feature records and per-payload records
//! with their owning package, without the engine-only plumbing.

use super::{Element, ManifestWriter, BA_DATA_NAMESPACE};
use crate::error::Result;
use crate::resolve::PackageFacades;
use crate::symbol::SymbolGraph;
use std::io::Write;

/// Writes the bootstrapper-application data manifest.
pub fn write_ba_data<W: Write>(
    graph: &SymbolGraph,
    facades: &PackageFacades,
    out: &mut W,
) -> Result<()> {
    let mut w = ManifestWriter::new(out);
    w.declaration()?;
    w.start(Element::new("BootstrapperApplicationData").attr("xmlns", BA_DATA_NAMESPACE))?;

    let bundle = &graph.bundle;
    w.empty(
        Element::new("WixBundleProperties")
            .attr("DisplayName", &bundle.name)
            .attr(
                "BundleCode",
                &format!("{{{}}}", bundle.bundle_code.to_string().to_uppercase()),
            )
            .attr_opt("LogPathVariable", bundle.log_path_variable.as_deref())
            .attr_bool("PerMachine", bundle.per_machine, false)
            .attr_opt("UpgradeCode", bundle.upgrade_code.as_deref()),
    )?;

    for boundary in &graph.rollback_boundaries {
        w.empty(
            Element::new("WixRollbackBoundary")
                .attr("Id", &boundary.id)
                .attr_bool("Vital", boundary.vital, true)
                .attr_bool("Transaction", boundary.transaction, false),
        )?;
    }

    for facade in facades.iter() {
        let Some(package) = graph.packages.iter().find(|p| p.id == facade.package_id) else {
            continue;
        };
        w.empty(
            Element::new("WixPackageProperties")
                .attr("Package", &package.id)
                .attr_opt("DisplayName", package.display_name.as_deref())
                .attr_opt("Description", package.description.as_deref())
                .attr_nonzero("PackageSize", package.size)
                .attr_nonzero("InstalledSize", package.install_size.unwrap_or(0))
                .attr("PackageType", facade.package_type.as_str())
                .attr_bool("Permanent", package.permanent, false)
                .attr_bool("Vital", package.vital, true)
                .attr("Cache", package.cache.as_str())
                .attr_opt("Version", package.version.as_deref())
                .attr_opt("InstallCondition", package.install_condition.as_deref())
                .attr_opt("RepairCondition", package.repair_condition.as_deref()),
        )?;
    }

    for feature in &graph.package_features {
        w.empty(
            Element::new("WixPackageFeatureInfo")
                .attr("Package", &feature.package_id)
                .attr("Feature", &feature.feature)
                .attr_opt("Parent", feature.parent.as_deref())
                .attr_opt("Title", feature.title.as_deref())
                .attr_nonzero("Size", feature.size),
        )?;
    }

    for payload in &graph.payloads {
        let owner = facades
            .by_payload(&payload.id)
            .map(|f| f.package_id.as_str())
            .or_else(|| {
                payload
                    .parent_payload
                    .as_deref()
                    .and_then(|parent| facades.by_payload(parent))
                    .map(|f| f.package_id.as_str())
            });
        w.empty(
            Element::new("WixPayloadProperties")
                .attr("Payload", &payload.id)
                .attr_opt("Package", owner)
                .attr_opt("Container", payload.container.as_deref())
                .attr("Name", &payload.name)
                .attr_nonzero("Size", payload.file_size.unwrap_or(0))
                .attr_opt("DownloadUrl", payload.download_url.as_deref()),
        )?;
    }

    w.end("BootstrapperApplicationData")?;
    Ok(())
}
