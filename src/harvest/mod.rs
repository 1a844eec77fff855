//! Package harvesting.
//!
//! Several package facts cannot be trusted from authoring: product codes,
//! patch targets, per-machine scope, external cabinets referenced by a
//! Media table. Each harvester opens the already-built package on disk,
//! derives the authoritative values, and writes them back onto the symbol
//! graph, synthesizing payload symbols for content the outer tooling does
//! not already know about.
//!
//! Harvesting is idempotent per payload and isolates failures: an
//! unreadable package reports one structured error and the remaining
//! packages continue, so a single build surfaces every broken package.
//!
//! # Module Organization
//!
//! - `msi` - Windows Installer packages (the most involved harvester)
//! - `msp` - Windows Installer patches
//! - `msu` - Windows update standalone packages
//! - `exe` - arbitrary executables
//! - `bundle` - nested bundles, read through the stub codec

mod bundle;
mod exe;
mod msi;
mod msp;
mod msu;

use crate::error::Result;
use crate::extension::ExtensionRegistry;
use crate::message::{self, Messages};
use crate::reader::DatabaseOpener;
use crate::resolve::PackageFacades;
use crate::symbol::{PackageType, PayloadSymbol, SymbolGraph};
use crate::{cacheid, cacheid::CacheIdentity};

/// Harvests every resolved package facade in chain order.
pub fn harvest_packages(
    graph: &mut SymbolGraph,
    facades: &PackageFacades,
    opener: &dyn DatabaseOpener,
    extensions: &ExtensionRegistry,
    messages: &mut Messages,
) {
    let work: Vec<(String, String, PackageType)> = facades
        .iter()
        .map(|f| (f.package_id.clone(), f.payload_id.clone(), f.package_type))
        .collect();

    for (package_id, payload_id, package_type) in work {
        if !graph.harvested_payloads.insert(payload_id.clone()) {
            log::debug!("payload {payload_id} already harvested; skipping");
            continue;
        }

        let Some(payload) = graph.payload(&payload_id).cloned() else {
            let source = package_source(graph, &package_id);
            messages.report(message::unable_to_read_package_information(
                source,
                std::path::Path::new(&payload_id),
                "package payload symbol not found",
            ));
            continue;
        };

        log::debug!(
            "harvesting {package_id} ({}) from {}",
            package_type.as_str(),
            payload.source_path.display()
        );
        let result = match package_type {
            PackageType::Msi => msi::harvest(graph, &package_id, &payload, opener, extensions, messages),
            PackageType::Msp => msp::harvest(graph, &package_id, &payload, opener, messages),
            PackageType::Msu => msu::harvest(graph, &package_id, &payload, messages),
            PackageType::Exe => exe::harvest(graph, &package_id, &payload, messages),
            PackageType::Bundle => {
                bundle::harvest(graph, &package_id, &payload, extensions, messages)
            }
        };

        if let Err(err) = result {
            let source = package_source(graph, &package_id);
            messages.report(message::unable_to_read_package_information(
                source,
                &payload.source_path,
                &err.to_string(),
            ));
        }
    }
}

fn package_source(graph: &SymbolGraph, package_id: &str) -> Option<crate::message::SourceLocation> {
    graph
        .packages
        .iter()
        .find(|p| p.id == package_id)
        .and_then(|p| p.source.clone())
}

/// Fills a package's cache id from its derived identity.
///
/// Certificate-validated payloads have no trustworthy content hash, so the
/// generator refuses to invent an id for them: authoring must supply one,
/// and the missing attribute is reported against whichever certificate
/// attribute was used.
pub(crate) fn assign_cache_id(
    graph: &mut SymbolGraph,
    package_id: &str,
    payload: &PayloadSymbol,
    identity: CacheIdentity<'_>,
    messages: &mut Messages,
) {
    let Some(package) = graph.packages.iter_mut().find(|p| p.id == package_id) else {
        return;
    };
    if package.cache_id.is_some() {
        return;
    }

    if payload.uses_certificate() {
        let because = if payload.certificate_thumbprint.is_some() {
            "CertificateThumbprint"
        } else {
            "CertificatePublicKey"
        };
        messages.report(message::expected_attribute(
            payload.source.clone().or_else(|| package.source.clone()),
            &format!("{}PackagePayload", package.package_type.as_str()),
            "CacheId",
            because,
        ));
        return;
    }

    package.cache_id = Some(cacheid::cache_id(identity));
}

/// Copies payload-derived facts (size, version) onto the package symbol
/// where authoring left them unset.
pub(crate) fn fill_package_from_payload(graph: &mut SymbolGraph, package_id: &str, payload: &PayloadSymbol) {
    if let Some(package) = graph.packages.iter_mut().find(|p| p.id == package_id) {
        if package.size == 0 {
            package.size = payload.file_size.unwrap_or(0);
        }
        if package.version.is_none() {
            package.version = payload.version.clone();
        }
        if package.display_name.is_none() {
            package.display_name = payload.display_name.clone();
        }
        if package.description.is_none() {
            package.description = payload.description.clone();
        }
    }
}

/// Hash identity fallback shared by the EXE and MSU harvesters.
pub(crate) fn hash_identity(payload: &PayloadSymbol) -> Result<String> {
    payload.hash.clone().ok_or_else(|| {
        crate::error::Error::GenericError(format!(
            "payload {} has no content hash to derive a cache id from",
            payload.id
        ))
    })
}
