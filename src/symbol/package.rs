//! Chain packages: the generic symbol, its five type-specific companions,
//! and the records harvesting derives from built packages.

use crate::message::SourceLocation;

/// The five package kinds a chain can carry.
///
/// Harvesters and serializers match exhaustively on this tag, so a new kind
/// cannot be added without updating every consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageType {
    /// A nested bundle executable.
    Bundle,
    /// An arbitrary executable package.
    Exe,
    /// A Windows Installer package.
    Msi,
    /// A Windows Installer patch.
    Msp,
    /// A Windows update standalone package.
    Msu,
}

impl PackageType {
    /// Manifest element prefix ("Msi" for `MsiPackage`, etc.).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bundle => "Bundle",
            Self::Exe => "Exe",
            Self::Msi => "Msi",
            Self::Msp => "Msp",
            Self::Msu => "Msu",
        }
    }
}

/// What the engine does with the cached copy of a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Cache during install, remove when no longer needed.
    #[default]
    Remove,
    /// Keep the cached copy after install.
    Keep,
    /// Cache even when the package is not installed.
    Force,
}

impl CachePolicy {
    /// Manifest attribute value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remove => "remove",
            Self::Keep => "keep",
            Self::Force => "force",
        }
    }
}

/// Generic chain member. Exactly one package payload and one type-specific
/// symbol bind to each of these during facade resolution.
#[derive(Debug, Clone)]
pub struct PackageSymbol {
    /// Package id, unique across the chain.
    pub id: String,

    /// Kind tag selecting the type-specific symbol.
    pub package_type: PackageType,

    /// Resolved scope; must be `Some` before emission.
    pub per_machine: Option<bool>,

    /// True when the package is never uninstalled by the bundle.
    pub permanent: bool,

    /// True when failure to install aborts the chain.
    pub vital: bool,

    /// True when the package keeps its own Add/Remove Programs entry
    /// visible alongside the bundle's.
    pub visible: bool,

    /// Cache policy for the package payloads.
    pub cache: CachePolicy,

    /// Stable cache identifier; harvesters fill this when not authored.
    pub cache_id: Option<String>,

    /// Display name shown by the UX.
    pub display_name: Option<String>,

    /// Description shown by the UX.
    pub description: Option<String>,

    /// Package version; harvested when not authored.
    pub version: Option<String>,

    /// Package language.
    pub language: Option<String>,

    /// Total size of the package payloads in bytes.
    pub size: u64,

    /// Estimated installed size in bytes.
    pub install_size: Option<u64>,

    /// Rollback boundary in effect when executing forward.
    pub rollback_boundary_forward: Option<String>,

    /// Rollback boundary in effect when rolling back.
    pub rollback_boundary_backward: Option<String>,

    /// Condition gating install.
    pub install_condition: Option<String>,

    /// Condition gating repair.
    pub repair_condition: Option<String>,

    /// Variable receiving the package log path.
    pub log_path_variable: Option<String>,

    /// Variable receiving the rollback log path.
    pub rollback_log_path_variable: Option<String>,

    /// Authoring location.
    pub source: Option<SourceLocation>,
}

impl PackageSymbol {
    /// Creates a package symbol with safe defaults for the given kind.
    pub fn new(id: impl Into<String>, package_type: PackageType) -> Self {
        Self {
            id: id.into(),
            package_type,
            per_machine: None,
            permanent: false,
            vital: true,
            visible: false,
            cache: CachePolicy::default(),
            cache_id: None,
            display_name: None,
            description: None,
            version: None,
            language: None,
            size: 0,
            install_size: None,
            rollback_boundary_forward: None,
            rollback_boundary_backward: None,
            install_condition: None,
            repair_condition: None,
            log_path_variable: None,
            rollback_log_path_variable: None,
            source: None,
        }
    }
}

/// MSI-specific package data; harvesting fills the authoritative fields.
#[derive(Debug, Clone)]
pub struct MsiPackageSymbol {
    /// Owning package id.
    pub id: String,
    /// ProductCode GUID.
    pub product_code: Option<String>,
    /// UpgradeCode GUID.
    pub upgrade_code: Option<String>,
    /// ProductVersion.
    pub product_version: Option<String>,
    /// ProductLanguage.
    pub product_language: Option<String>,
    /// Manufacturer property.
    pub manufacturer: Option<String>,
    /// True when the UX may select individual features.
    pub enable_feature_selection: bool,
    /// True to force the package to per-machine scope.
    pub force_per_machine: bool,
    /// True when the package targets a 64-bit platform; harvested from
    /// summary information.
    pub win64: bool,
    /// Authoring location.
    pub source: Option<SourceLocation>,
}

/// MSP-specific package data.
#[derive(Debug, Clone)]
pub struct MspPackageSymbol {
    /// Owning package id.
    pub id: String,
    /// Patch code GUID from summary information.
    pub patch_code: Option<String>,
    /// Manufacturer from patch metadata.
    pub manufacturer: Option<String>,
    /// Normalized applicability XML.
    pub patch_xml: Option<String>,
    /// True when the patch could not enumerate real targets.
    pub target_unspecified: bool,
    /// Authoring location.
    pub source: Option<SourceLocation>,
}

/// MSU-specific package data.
#[derive(Debug, Clone)]
pub struct MsuPackageSymbol {
    /// Owning package id.
    pub id: String,
    /// Condition detecting the update is already installed.
    pub detect_condition: Option<String>,
    /// Authoring location.
    pub source: Option<SourceLocation>,
}

/// How an EXE package is detected on the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExeDetectionType {
    /// No detection; the package always runs.
    #[default]
    None,
    /// A detect condition evaluated by the engine.
    Condition,
    /// Add/Remove Programs registration.
    Arp,
}

impl ExeDetectionType {
    /// Manifest attribute value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Condition => "condition",
            Self::Arp => "arp",
        }
    }
}

/// EXE-specific package data.
#[derive(Debug, Clone)]
pub struct ExePackageSymbol {
    /// Owning package id.
    pub id: String,
    /// Detection style.
    pub detection_type: ExeDetectionType,
    /// Detect condition, when detection is condition-based.
    pub detect_condition: Option<String>,
    /// ARP registration id, when detection is ARP-based.
    pub arp_id: Option<String>,
    /// ARP display version, when detection is ARP-based.
    pub arp_display_version: Option<String>,
    /// True to read the 64-bit ARP registry view.
    pub arp_win64: bool,
    /// Install command line.
    pub install_arguments: Option<String>,
    /// Repair command line; `None` means not repairable.
    pub repair_arguments: Option<String>,
    /// Uninstall command line; `None` means not uninstallable.
    pub uninstall_arguments: Option<String>,
    /// Authoring location.
    pub source: Option<SourceLocation>,
}

/// Nested-bundle-specific package data; harvesting fills most of it.
#[derive(Debug, Clone)]
pub struct BundlePackageSymbol {
    /// Owning package id.
    pub id: String,
    /// Bundle code of the nested bundle.
    pub bundle_code: Option<String>,
    /// Engine version of the nested bundle.
    pub engine_version: Option<String>,
    /// Bootstrapper protocol version the nested engine speaks.
    pub protocol_version: Option<u32>,
    /// True when the nested bundle supports the embedded protocol.
    pub supports_burn_protocol: bool,
    /// True when the nested bundle registers per-machine.
    pub per_machine: Option<bool>,
    /// Chain-wide install size rollup read from the nested manifest.
    pub install_size: Option<u64>,
    /// True when the nested image is a 64-bit executable.
    pub win64: Option<bool>,
    /// Authoring location.
    pub source: Option<SourceLocation>,
}

/// Rollback boundary referenced by chain packages.
#[derive(Debug, Clone)]
pub struct RollbackBoundarySymbol {
    /// Boundary id.
    pub id: String,
    /// True when failure to begin the boundary aborts the chain.
    pub vital: bool,
    /// True when the boundary opens an MSI transaction.
    pub transaction: bool,
    /// Authoring location.
    pub source: Option<SourceLocation>,
}

/// Authored MSI property pushed onto a package's command line.
#[derive(Debug, Clone)]
pub struct MsiPropertySymbol {
    /// Owning package id.
    pub package_id: String,
    /// Property name.
    pub name: String,
    /// Property value.
    pub value: String,
    /// Condition gating the property.
    pub condition: Option<String>,
    /// Authoring location.
    pub source: Option<SourceLocation>,
}

/// What the engine does with a specific exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCodeBehavior {
    /// Treat as success.
    Success,
    /// Treat as failure.
    Error,
    /// Success, reboot at the end of the chain.
    ScheduleReboot,
    /// Success, reboot immediately.
    ForceReboot,
}

impl ExitCodeBehavior {
    /// Manifest attribute value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::ScheduleReboot => "scheduleReboot",
            Self::ForceReboot => "forceReboot",
        }
    }
}

/// Exit-code mapping rule for an EXE package.
#[derive(Debug, Clone)]
pub struct ExitCodeSymbol {
    /// Owning package id.
    pub package_id: String,
    /// Exit code the rule matches; `None` matches any code.
    pub code: Option<i32>,
    /// Behavior when matched.
    pub behavior: ExitCodeBehavior,
}

/// Command-line override applied to a package under a condition.
#[derive(Debug, Clone)]
pub struct CommandLineSymbol {
    /// Owning package id.
    pub package_id: String,
    /// Extra install arguments.
    pub install_argument: Option<String>,
    /// Extra uninstall arguments.
    pub uninstall_argument: Option<String>,
    /// Extra repair arguments.
    pub repair_argument: Option<String>,
    /// Condition selecting this override.
    pub condition: Option<String>,
}

/// Slipstream association between a patch and the product it installs with.
#[derive(Debug, Clone)]
pub struct SlipstreamMspSymbol {
    /// MSI package the patch slipstreams into.
    pub msi_package_id: String,
    /// MSP package being slipstreamed.
    pub msp_package_id: String,
    /// Authoring location.
    pub source: Option<SourceLocation>,
}

/// Related-product record harvested from an MSI Upgrade table row.
#[derive(Debug, Clone)]
pub struct RelatedPackageSymbol {
    /// Owning package id.
    pub package_id: String,
    /// UpgradeCode the row relates to.
    pub related_code: String,
    /// Minimum related version.
    pub min_version: Option<String>,
    /// Maximum related version.
    pub max_version: Option<String>,
    /// True when the minimum bound is inclusive.
    pub min_inclusive: bool,
    /// True when the maximum bound is inclusive.
    pub max_inclusive: bool,
    /// True when the row only detects and never removes.
    pub only_detect: bool,
    /// True when the language list is inclusive.
    pub lang_inclusive: bool,
    /// Related languages, when constrained.
    pub languages: Vec<String>,
}

/// Per-feature record harvested from an MSI Feature table.
#[derive(Debug, Clone)]
pub struct PackageFeatureInfo {
    /// Owning package id.
    pub package_id: String,
    /// Feature name.
    pub feature: String,
    /// Parent feature, when nested.
    pub parent: Option<String>,
    /// Feature title.
    pub title: Option<String>,
    /// Rolled-up size of the feature's files in bytes.
    pub size: u64,
}

/// Dependency provider registered by a package.
#[derive(Debug, Clone)]
pub struct DependencyProviderSymbol {
    /// Owning package id.
    pub package_id: String,
    /// Provider key.
    pub provider_key: String,
    /// Provider version.
    pub version: Option<String>,
    /// Provider display name.
    pub display_name: Option<String>,
    /// True when imported from the package instead of authored.
    pub imported: bool,
}

/// Whether a patch target code names a product or an upgrade family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchTargetKind {
    /// Targets a specific ProductCode.
    Product,
    /// Targets every product under an UpgradeCode.
    Upgrade,
}

/// Target code a patch applies to.
#[derive(Debug, Clone)]
pub struct PatchTargetCodeSymbol {
    /// Product or upgrade code.
    pub target_code: String,
    /// Which kind of code this is.
    pub kind: PatchTargetKind,
}
