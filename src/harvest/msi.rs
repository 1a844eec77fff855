//! MSI package harvesting.
//!
//! Windows Installer packages are the richest harvest source: summary
//! information decides defaults, the Property table supplies identity, the
//! Upgrade table becomes related-package records, Feature/FeatureComponents/
//! File roll up per-feature sizes, and the Media and File tables surface
//! externally-carried content the bundle must transport itself.

use crate::cacheid::CacheIdentity;
use crate::error::Result;
use crate::extension::ExtensionRegistry;
use crate::message::{self, Messages};
use crate::reader::{DatabaseOpener, DirectoryRow, FileRow, InstallerDatabase};
use crate::symbol::{
    DependencyProviderSymbol, MsiPropertySymbol, PackageFeatureInfo, PayloadSymbol,
    RelatedPackageSymbol, SymbolGraph,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// msidbUpgradeAttributes bits.
const UPGRADE_ONLY_DETECT: i32 = 0x2;
const UPGRADE_MIN_INCLUSIVE: i32 = 0x100;
const UPGRADE_MAX_INCLUSIVE: i32 = 0x200;
const UPGRADE_LANGUAGES_EXCLUSIVE: i32 = 0x400;

/// Dependency-provider tables, newest schema first.
const PROVIDER_TABLES: [&str; 2] = ["Wix4DependencyProvider", "WixDependencyProvider"];

pub(super) fn harvest(
    graph: &mut SymbolGraph,
    package_id: &str,
    payload: &PayloadSymbol,
    opener: &dyn DatabaseOpener,
    extensions: &ExtensionRegistry,
    messages: &mut Messages,
) -> Result<()> {
    let db = opener.open_package(&payload.source_path)?;
    let summary = db.summary_information()?;
    let compressed = summary.compressed();
    let long_names = summary.long_filenames();

    let product_code = db.property("ProductCode")?;
    let product_version = db.property("ProductVersion")?;
    let upgrade_code = db.property("UpgradeCode")?;
    let product_name = db.property("ProductName")?;
    let manufacturer = db.property("Manufacturer")?;
    let product_language = db.property("ProductLanguage")?;
    let allusers = db.property("ALLUSERS")?;
    let fast_install = db.property("MSIFASTINSTALL")?;
    let arp_system_component = db.property("ARPSYSTEMCOMPONENT")?;
    let arp_comments = db.property("ARPCOMMENTS")?;

    let force_per_machine = graph
        .msi_packages
        .iter()
        .find(|m| m.id == package_id)
        .is_some_and(|m| m.force_per_machine);

    resolve_per_machine(
        graph,
        package_id,
        force_per_machine,
        allusers.as_deref(),
        summary.per_machine(),
        messages,
    );

    // The bundle owns the ARP entry; hide the child's unless authoring
    // opted into visibility or the package already manages it.
    let package_visible = graph
        .packages
        .iter()
        .find(|p| p.id == package_id)
        .is_some_and(|p| p.visible);
    if !package_visible && arp_system_component.is_none() {
        ensure_msi_property(graph, package_id, "ARPSYSTEMCOMPONENT", "1");
    }
    if fast_install.is_none() {
        ensure_msi_property(graph, package_id, "MSIFASTINSTALL", "7");
    }

    super::fill_package_from_payload(graph, package_id, payload);
    if let Some(package) = graph.packages.iter_mut().find(|p| p.id == package_id) {
        if package.display_name.is_none() {
            package.display_name = product_name.clone();
        }
        if package.description.is_none() {
            package.description = arp_comments;
        }
        if package.version.is_none() {
            package.version = product_version.clone();
        }
        if package.language.is_none() {
            package.language = product_language.clone();
        }
    }

    if let Some(msi) = graph.msi_packages.iter_mut().find(|m| m.id == package_id) {
        msi.product_code = product_code.clone();
        msi.upgrade_code = upgrade_code.clone();
        msi.product_version = product_version.clone();
        msi.product_language = product_language;
        msi.manufacturer = manufacturer.clone();
        msi.win64 = summary.win64();
    }

    match (&product_code, &product_version) {
        (Some(code), Some(version)) => {
            super::assign_cache_id(
                graph,
                package_id,
                payload,
                CacheIdentity::GuidVersion {
                    guid: code,
                    version,
                },
                messages,
            );
        }
        _ => {
            let hash = super::hash_identity(payload)?;
            super::assign_cache_id(
                graph,
                package_id,
                payload,
                CacheIdentity::Hash(&hash),
                messages,
            );
        }
    }

    harvest_related_packages(graph, package_id, db.as_ref())?;
    let install_size = harvest_features(graph, package_id, db.as_ref())?;
    if let Some(package) = graph.packages.iter_mut().find(|p| p.id == package_id) {
        if package.install_size.is_none() {
            package.install_size = Some(install_size);
        }
    }

    import_external_payloads(
        graph,
        payload,
        db.as_ref(),
        compressed,
        long_names,
        extensions,
    )?;
    import_providers(
        graph,
        package_id,
        db.as_ref(),
        product_code.as_deref(),
        product_version.as_deref(),
        product_name.as_deref(),
    )?;
    Ok(())
}

/// Derives the final per-machine scope from ForcePerMachine and ALLUSERS.
///
/// The distinct outcomes: forced per-machine (with a warning and an
/// injected ALLUSERS=1), per-machine via ALLUSERS=1 (an error when that
/// conflicts with explicit per-user authoring), an implicit flip to
/// per-user when ALLUSERS is absent, and a warning for the
/// machine-dependent ALLUSERS=2.
fn resolve_per_machine(
    graph: &mut SymbolGraph,
    package_id: &str,
    force_per_machine: bool,
    allusers: Option<&str>,
    summary_per_machine: bool,
    messages: &mut Messages,
) {
    let Some(index) = graph.packages.iter().position(|p| p.id == package_id) else {
        return;
    };
    let authored = graph.packages[index].per_machine;
    let source = graph.packages[index].source.clone();
    let allusers = allusers.map(str::trim).filter(|v| !v.is_empty());

    let resolved = if force_per_machine {
        if authored == Some(false) || allusers.is_none() {
            messages.report(message::forced_per_machine(source, package_id));
        }
        if allusers.is_none() {
            ensure_msi_property(graph, package_id, "ALLUSERS", "1");
        }
        true
    } else {
        match allusers {
            Some("1") => {
                if authored == Some(false) {
                    messages.report(message::per_machine_conflict(source, package_id));
                    false
                } else {
                    true
                }
            }
            Some("2") => {
                messages.report(message::discouraged_allusers(source, package_id));
                authored.unwrap_or(summary_per_machine)
            }
            _ => {
                // ALLUSERS absent (or unusable): the package installs
                // per-user no matter what authoring claimed.
                if authored.unwrap_or(summary_per_machine) {
                    messages.report(message::implicit_per_user(source, package_id));
                }
                false
            }
        }
    };

    graph.packages[index].per_machine = Some(resolved);
}

fn ensure_msi_property(graph: &mut SymbolGraph, package_id: &str, name: &str, value: &str) {
    let authored = graph
        .msi_properties
        .iter()
        .any(|p| p.package_id == package_id && p.name == name);
    if !authored {
        graph.msi_properties.push(MsiPropertySymbol {
            package_id: package_id.to_string(),
            name: name.to_string(),
            value: value.to_string(),
            condition: None,
            source: None,
        });
    }
}

fn harvest_related_packages(
    graph: &mut SymbolGraph,
    package_id: &str,
    db: &dyn InstallerDatabase,
) -> Result<()> {
    for row in db.upgrade_rows()? {
        let languages = row
            .language
            .as_deref()
            .unwrap_or_default()
            .split([',', ';'])
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.trim().to_string())
            .collect();
        graph.related_packages.push(RelatedPackageSymbol {
            package_id: package_id.to_string(),
            related_code: row.upgrade_code,
            min_version: row.version_min,
            max_version: row.version_max,
            min_inclusive: row.attributes & UPGRADE_MIN_INCLUSIVE != 0,
            max_inclusive: row.attributes & UPGRADE_MAX_INCLUSIVE != 0,
            only_detect: row.attributes & UPGRADE_ONLY_DETECT != 0,
            // The table stores an exclusive flag; the manifest wants the
            // inclusive sense.
            lang_inclusive: row.attributes & UPGRADE_LANGUAGES_EXCLUSIVE == 0,
            languages,
        });
    }
    Ok(())
}

/// Walks Feature/FeatureComponents/File, recording one feature record per
/// row with its size rollup. Returns the package's total file size.
fn harvest_features(
    graph: &mut SymbolGraph,
    package_id: &str,
    db: &dyn InstallerDatabase,
) -> Result<u64> {
    let files = db.file_rows()?;
    let mut component_size: HashMap<&str, u64> = HashMap::new();
    let mut total = 0u64;
    for file in &files {
        *component_size.entry(file.component.as_str()).or_default() += file.file_size;
        total += file.file_size;
    }

    let mut feature_size: HashMap<&str, u64> = HashMap::new();
    let feature_components = db.feature_component_rows()?;
    for row in &feature_components {
        *feature_size.entry(row.feature.as_str()).or_default() +=
            component_size.get(row.component.as_str()).copied().unwrap_or(0);
    }

    for feature in db.feature_rows()? {
        let size = feature_size
            .get(feature.feature.as_str())
            .copied()
            .unwrap_or(0);
        graph.package_features.push(PackageFeatureInfo {
            package_id: package_id.to_string(),
            feature: feature.feature,
            parent: feature.parent.filter(|p| !p.is_empty()),
            title: feature.title,
            size,
        });
    }
    Ok(total)
}

/// Imports external cabinets and uncompressed files as payload symbols so
/// the bundle carries them next to the package.
fn import_external_payloads(
    graph: &mut SymbolGraph,
    package_payload: &PayloadSymbol,
    db: &dyn InstallerDatabase,
    compressed: bool,
    long_names: bool,
    extensions: &ExtensionRegistry,
) -> Result<()> {
    let package_dir = package_payload
        .source_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let payload_dir = parent_name_dir(&package_payload.name);

    for row in db.media_rows()? {
        let Some(cabinet) = row.cabinet.filter(|c| !c.is_empty() && !c.starts_with('#')) else {
            continue;
        };
        let source = resolve_related(extensions, &package_payload.source_path, &cabinet)
            .unwrap_or_else(|| package_dir.join(&cabinet));
        let name = join_name(&payload_dir, &cabinet);
        add_harvested_payload(graph, package_payload, name, source);
    }

    let files = db.file_rows()?;
    let externals: Vec<&FileRow> = files.iter().filter(|f| f.is_external(compressed)).collect();
    if externals.is_empty() {
        return Ok(());
    }

    let component_rows = db.component_rows()?;
    let components: HashMap<&str, &str> = component_rows
        .iter()
        .map(|c| (c.component.as_str(), c.directory.as_str()))
        .collect();
    let directories = db.directory_rows()?;
    let directory_map: HashMap<&str, &DirectoryRow> =
        directories.iter().map(|d| (d.directory.as_str(), d)).collect();

    for file in externals {
        let file_name = pick_name(&file.file_name, long_names).to_string();
        let dir_parts = components
            .get(file.component.as_str())
            .map(|dir| directory_source_parts(&directory_map, dir, long_names))
            .unwrap_or_default();

        let mut relative = dir_parts.join("/");
        if relative.is_empty() {
            relative = file_name.clone();
        } else {
            relative = format!("{relative}/{file_name}");
        }

        let source = resolve_related(extensions, &package_payload.source_path, &relative)
            .unwrap_or_else(|| {
                let mut path = package_dir.clone();
                for part in &dir_parts {
                    path.push(part);
                }
                path.push(&file_name);
                path
            });

        let name = join_name(&payload_dir, &relative);
        add_harvested_payload(graph, package_payload, name, source);
    }
    Ok(())
}

/// Walks the Directory table from `start` to the root, collecting source
/// directory names root-first. Root aliases and `.` entries contribute no
/// path segment.
fn directory_source_parts(
    directories: &HashMap<&str, &DirectoryRow>,
    start: &str,
    long_names: bool,
) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = Some(start.to_string());
    let mut depth = 0;
    while let Some(dir) = current {
        depth += 1;
        if depth > 64 {
            break; // malformed table; never loop forever
        }
        let Some(row) = directories.get(dir.as_str()) else {
            break;
        };
        if dir != "TARGETDIR" {
            let name = pick_name(source_half(&row.default_dir), long_names);
            if !name.is_empty() && name != "." {
                parts.push(name.to_string());
            }
        }
        current = row
            .parent
            .clone()
            .filter(|p| !p.is_empty() && *p != dir);
    }
    parts.reverse();
    parts
}

/// DefaultDir is `target:source`; the source half falls back to target.
fn source_half(default_dir: &str) -> &str {
    let mut halves = default_dir.splitn(2, ':');
    let target = halves.next().unwrap_or_default();
    halves.next().unwrap_or(target)
}

/// Picks the long or short half of a `short|long` name pair.
fn pick_name(pair: &str, long: bool) -> &str {
    match pair.split_once('|') {
        Some((short, long_name)) => {
            if long {
                long_name
            } else {
                short
            }
        }
        None => pair,
    }
}

/// Directory portion of a payload name, kept so harvested files land next
/// to their package inside the layout.
fn parent_name_dir(name: &str) -> String {
    match name.rfind('/') {
        Some(index) => name[..index].to_string(),
        None => String::new(),
    }
}

fn join_name(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

fn resolve_related(
    extensions: &ExtensionRegistry,
    package: &Path,
    relative: &str,
) -> Option<PathBuf> {
    extensions.resolve_related_file(package, relative)
}

fn add_harvested_payload(
    graph: &mut SymbolGraph,
    parent: &PayloadSymbol,
    name: String,
    source_path: PathBuf,
) {
    let id = format!("{}_{}", parent.id, sanitize(&name));
    if graph.payload(&id).is_some() {
        return;
    }
    let mut payload = PayloadSymbol::new(id, name, source_path);
    payload.packaging = parent.packaging;
    payload.container = parent.container.clone();
    payload.parent_payload = Some(parent.id.clone());
    payload.source = parent.source.clone();
    graph.payloads.push(payload);
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Imports dependency providers from whichever historical table the
/// package carries, falling back to a default ProductCode provider.
fn import_providers(
    graph: &mut SymbolGraph,
    package_id: &str,
    db: &dyn InstallerDatabase,
    product_code: Option<&str>,
    product_version: Option<&str>,
    product_name: Option<&str>,
) -> Result<()> {
    if let Some(table) = PROVIDER_TABLES.iter().find(|t| db.has_table(t)) {
        for row in db.dependency_rows(table)? {
            let duplicate = graph
                .providers
                .iter()
                .any(|p| p.package_id == package_id && p.provider_key == row.provider_key);
            if duplicate {
                continue;
            }
            graph.providers.push(DependencyProviderSymbol {
                package_id: package_id.to_string(),
                provider_key: row.provider_key,
                version: row.version.or_else(|| product_version.map(String::from)),
                display_name: row.display_name.or_else(|| product_name.map(String::from)),
                imported: true,
            });
        }
    }

    let has_any = graph.providers.iter().any(|p| p.package_id == package_id);
    if !has_any {
        if let Some(code) = product_code {
            graph.providers.push(DependencyProviderSymbol {
                package_id: package_id.to_string(),
                provider_key: code.to_string(),
                version: product_version.map(String::from),
                display_name: product_name.map(String::from),
                imported: false,
            });
        }
    }
    Ok(())
}
