//! Facade resolution.
//!
//! A chain package is authored as a generic symbol plus a type-specific
//! symbol plus exactly one package payload. The resolver binds the three
//! into a facade, validating the graph as it goes, and builds the lookup
//! indices every later stage shares. The indices are built once here and
//! never mutated downstream.

use crate::message::{self, Messages};
use crate::symbol::{PackageType, SymbolGraph};
use std::collections::HashMap;

/// A resolved package: generic symbol, specific symbol and payload bound.
#[derive(Debug, Clone)]
pub struct PackageFacade {
    /// Package id; also the id of the type-specific symbol.
    pub package_id: String,
    /// The one payload carrying the package.
    pub payload_id: String,
    /// Kind tag of the package.
    pub package_type: PackageType,
}

/// Authoring-ordered facades plus O(1) lookups by package and payload id.
#[derive(Debug, Default)]
pub struct PackageFacades {
    facades: Vec<PackageFacade>,
    by_package: HashMap<String, usize>,
    by_payload: HashMap<String, usize>,
}

impl PackageFacades {
    /// Facades in authoring order.
    pub fn iter(&self) -> impl Iterator<Item = &PackageFacade> {
        self.facades.iter()
    }

    /// Number of resolved facades.
    pub fn len(&self) -> usize {
        self.facades.len()
    }

    /// True when nothing resolved.
    pub fn is_empty(&self) -> bool {
        self.facades.is_empty()
    }

    /// Looks up a facade by its package id.
    pub fn by_package(&self, package_id: &str) -> Option<&PackageFacade> {
        self.by_package.get(package_id).map(|i| &self.facades[*i])
    }

    /// Looks up a facade by its package payload id.
    pub fn by_payload(&self, payload_id: &str) -> Option<&PackageFacade> {
        self.by_payload.get(payload_id).map(|i| &self.facades[*i])
    }

    fn push(&mut self, facade: PackageFacade) {
        let index = self.facades.len();
        self.by_package.insert(facade.package_id.clone(), index);
        self.by_payload.insert(facade.payload_id.clone(), index);
        self.facades.push(facade);
    }
}

/// Binds every chain package to its specific symbol and payload.
///
/// Packages that fail to resolve are reported and left out; the collected
/// errors fail the build after the stage completes, so every bad package in
/// a build surfaces at once.
pub fn resolve_facades(graph: &SymbolGraph, messages: &mut Messages) -> PackageFacades {
    let mut facades = PackageFacades::default();

    for package in &graph.packages {
        let specific_found = match package.package_type {
            PackageType::Msi => graph.msi_packages.iter().any(|s| s.id == package.id),
            PackageType::Msp => graph.msp_packages.iter().any(|s| s.id == package.id),
            PackageType::Msu => graph.msu_packages.iter().any(|s| s.id == package.id),
            PackageType::Exe => graph.exe_packages.iter().any(|s| s.id == package.id),
            PackageType::Bundle => graph.bundle_packages.iter().any(|s| s.id == package.id),
        };
        if !specific_found {
            messages.report(message::identifier_not_found(
                package.source.clone(),
                &format!("{}Package", package.package_type.as_str()),
                &package.id,
            ));
            continue;
        }

        let children: Vec<_> = graph
            .package_payloads
            .iter()
            .filter(|pp| pp.package_id == package.id)
            .collect();

        let mut matching = Vec::new();
        let mut failed = false;
        for child in &children {
            if child.kind == package.package_type {
                matching.push(*child);
            } else {
                messages.report(message::package_payload_unsupported(
                    package.source.clone(),
                    &package.id,
                    package.package_type.as_str(),
                    child.source.clone(),
                ));
                failed = true;
            }
        }

        match matching.as_slice() {
            [] if !failed => {
                messages.report(message::missing_package_payload(
                    package.source.clone(),
                    &package.id,
                ));
            }
            [] => {}
            [payload] => {
                if !failed {
                    facades.push(PackageFacade {
                        package_id: package.id.clone(),
                        payload_id: payload.payload_id.clone(),
                        package_type: package.package_type,
                    });
                }
            }
            [first, second, ..] => {
                messages.report(message::multiple_package_payloads(
                    package.source.clone(),
                    &package.id,
                    first.source.clone(),
                    second.source.clone(),
                ));
            }
        }
    }

    log::debug!(
        "resolved {} of {} package facades",
        facades.len(),
        graph.packages.len()
    );
    facades
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::SourceLocation;
    use crate::symbol::{
        ExePackageSymbol, ExeDetectionType, MsiPackageSymbol, PackagePayloadSymbol, PackageSymbol,
    };

    fn exe_specific(id: &str) -> ExePackageSymbol {
        ExePackageSymbol {
            id: id.to_string(),
            detection_type: ExeDetectionType::None,
            detect_condition: None,
            arp_id: None,
            arp_display_version: None,
            arp_win64: false,
            install_arguments: None,
            repair_arguments: None,
            uninstall_arguments: None,
            source: None,
        }
    }

    fn payload_child(package: &str, payload: &str, kind: PackageType) -> PackagePayloadSymbol {
        PackagePayloadSymbol {
            payload_id: payload.to_string(),
            package_id: package.to_string(),
            kind,
            source: Some(SourceLocation::new("chain.wxs", 10)),
        }
    }

    #[test]
    fn resolves_a_well_formed_package() {
        let mut graph = SymbolGraph::default();
        graph
            .packages
            .push(PackageSymbol::new("Setup", PackageType::Exe));
        graph.exe_packages.push(exe_specific("Setup"));
        graph
            .package_payloads
            .push(payload_child("Setup", "SetupPayload", PackageType::Exe));

        let mut messages = Messages::new();
        let facades = resolve_facades(&graph, &mut messages);

        assert!(!messages.has_errors());
        assert_eq!(1, facades.len());
        let facade = facades.by_package("Setup").unwrap();
        assert_eq!("SetupPayload", facade.payload_id);
        assert!(facades.by_payload("SetupPayload").is_some());
    }

    #[test]
    fn missing_specific_symbol_is_identifier_not_found() {
        let mut graph = SymbolGraph::default();
        graph
            .packages
            .push(PackageSymbol::new("Setup", PackageType::Msi));
        graph
            .package_payloads
            .push(payload_child("Setup", "SetupPayload", PackageType::Msi));

        let mut messages = Messages::new();
        let facades = resolve_facades(&graph, &mut messages);

        assert!(facades.is_empty());
        assert_eq!(message::IDENTIFIER_NOT_FOUND, messages.all()[0].id);
        assert!(messages.all()[0].text.contains("MsiPackage"));
    }

    #[test]
    fn missing_payload_child_is_reported() {
        let mut graph = SymbolGraph::default();
        graph
            .packages
            .push(PackageSymbol::new("Setup", PackageType::Exe));
        graph.exe_packages.push(exe_specific("Setup"));

        let mut messages = Messages::new();
        let facades = resolve_facades(&graph, &mut messages);

        assert!(facades.is_empty());
        assert_eq!(message::MISSING_PACKAGE_PAYLOAD, messages.all()[0].id);
    }

    #[test]
    fn duplicate_payload_children_report_both_sites() {
        let mut graph = SymbolGraph::default();
        graph
            .packages
            .push(PackageSymbol::new("Setup", PackageType::Exe));
        graph.exe_packages.push(exe_specific("Setup"));
        graph
            .package_payloads
            .push(payload_child("Setup", "First", PackageType::Exe));
        graph
            .package_payloads
            .push(payload_child("Setup", "Second", PackageType::Exe));

        let mut messages = Messages::new();
        let facades = resolve_facades(&graph, &mut messages);

        assert!(facades.is_empty());
        let report = &messages.all()[0];
        assert_eq!(message::MULTIPLE_PACKAGE_PAYLOADS, report.id);
        assert_eq!(2, report.related.len());
    }

    #[test]
    fn mismatched_payload_kind_is_unsupported() {
        let mut graph = SymbolGraph::default();
        graph
            .packages
            .push(PackageSymbol::new("Setup", PackageType::Exe));
        graph.exe_packages.push(exe_specific("Setup"));
        graph
            .package_payloads
            .push(payload_child("Setup", "WrongKind", PackageType::Msi));

        let mut messages = Messages::new();
        let facades = resolve_facades(&graph, &mut messages);

        assert!(facades.is_empty());
        assert_eq!(message::PACKAGE_PAYLOAD_UNSUPPORTED, messages.all()[0].id);
    }

    #[test]
    fn sibling_packages_survive_one_bad_package() {
        let mut graph = SymbolGraph::default();
        graph
            .packages
            .push(PackageSymbol::new("Broken", PackageType::Msi));
        graph
            .packages
            .push(PackageSymbol::new("Good", PackageType::Msi));
        graph.msi_packages.push(MsiPackageSymbol {
            id: "Good".into(),
            product_code: None,
            upgrade_code: None,
            product_version: None,
            product_language: None,
            manufacturer: None,
            enable_feature_selection: false,
            force_per_machine: false,
            win64: false,
            source: None,
        });
        graph
            .package_payloads
            .push(payload_child("Good", "GoodPayload", PackageType::Msi));

        let mut messages = Messages::new();
        let facades = resolve_facades(&graph, &mut messages);

        assert!(messages.has_errors());
        assert_eq!(1, facades.len());
        assert!(facades.by_package("Good").is_some());
    }
}
