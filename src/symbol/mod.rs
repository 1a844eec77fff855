//! The resolved bundle symbol graph.
//!
//! Upstream compilation hands the binder a fully-resolved graph of symbols:
//! the bundle itself, its chain of packages, their payloads, the containers
//! that carry them, detection searches and variables. Symbols are created
//! once, filled in (never restructured) during resolution and harvesting,
//! and read back out by the manifest serializers.
//!
//! # Module Organization
//!
//! - `bundle` - bundle-wide symbols (registration, update, tags, extensions)
//! - `package` - chain packages, type-specific symbols, harvest products
//! - `payload` - payload files and their packaging
//! - `container` - archive containers
//! - `search` - detection searches and their ordering relations
//! - `variable` - bundle variables

mod bundle;
mod container;
mod package;
mod payload;
mod search;
mod variable;

pub use bundle::{
    ApprovedExeForElevation, BootstrapperExtensionSymbol, BundleSymbol, RelatedBundleAction,
    RelatedBundleSymbol, SoftwareTagSymbol, UpdateSymbol,
};
pub use container::{ContainerSymbol, ContainerType, DEFAULT_ATTACHED_CONTAINER_ID};
pub use package::{
    CachePolicy, CommandLineSymbol, DependencyProviderSymbol, ExeDetectionType, ExePackageSymbol,
    ExitCodeBehavior, ExitCodeSymbol, MsiPackageSymbol, MsiPropertySymbol, MspPackageSymbol,
    MsuPackageSymbol, BundlePackageSymbol, PackageFeatureInfo, PackageSymbol, PackageType,
    PatchTargetCodeSymbol, PatchTargetKind, RelatedPackageSymbol, RollbackBoundarySymbol,
    SlipstreamMspSymbol,
};
pub use payload::{PackagePayloadSymbol, Packaging, PayloadSymbol};
pub use search::{
    ExtensionSearchSymbol, LegacySearchKind, LegacySearchSymbol, RegistryRoot, SearchRelation,
    SearchSymbol, SetVariableSearchSymbol,
};
pub use variable::VariableSymbol;

/// Owning collection of every symbol the binder works over.
///
/// Construction order is authoring order; the serializers rely on it for the
/// chain and for stable output. Lookups that must be O(1) are built once by
/// the facade resolver, not stored here.
#[derive(Debug, Default)]
pub struct SymbolGraph {
    /// The bundle symbol itself.
    pub bundle: BundleSymbol,

    /// Optional update feed pointer.
    pub update: Option<UpdateSymbol>,

    /// Chain packages in authoring order.
    pub packages: Vec<PackageSymbol>,

    /// Type-specific package symbols, keyed by package id.
    pub msi_packages: Vec<MsiPackageSymbol>,
    /// MSP-specific symbols.
    pub msp_packages: Vec<MspPackageSymbol>,
    /// MSU-specific symbols.
    pub msu_packages: Vec<MsuPackageSymbol>,
    /// EXE-specific symbols.
    pub exe_packages: Vec<ExePackageSymbol>,
    /// Nested-bundle-specific symbols.
    pub bundle_packages: Vec<BundlePackageSymbol>,

    /// Package payload declarations (payload id -> declared package kind).
    pub package_payloads: Vec<PackagePayloadSymbol>,

    /// All payload files contributed to the bundle.
    pub payloads: Vec<PayloadSymbol>,

    /// Archive containers.
    pub containers: Vec<ContainerSymbol>,

    /// Detection searches.
    pub searches: Vec<SearchSymbol>,
    /// Legacy (component/file/registry/product) search data.
    pub legacy_searches: Vec<LegacySearchSymbol>,
    /// Static set-variable search data.
    pub set_variable_searches: Vec<SetVariableSearchSymbol>,
    /// Extension-owned search data.
    pub extension_searches: Vec<ExtensionSearchSymbol>,
    /// Declared "evaluate after" relations between searches.
    pub search_relations: Vec<SearchRelation>,

    /// Bundle variables.
    pub variables: Vec<VariableSymbol>,

    /// Rollback boundaries referenced from the chain.
    pub rollback_boundaries: Vec<RollbackBoundarySymbol>,

    /// Authored MSI properties, per package.
    pub msi_properties: Vec<MsiPropertySymbol>,
    /// Authored exit-code rules, per EXE package.
    pub exit_codes: Vec<ExitCodeSymbol>,
    /// Authored command-line overrides, per package.
    pub command_lines: Vec<CommandLineSymbol>,
    /// Slipstream patch references, per MSI package.
    pub slipstream_msps: Vec<SlipstreamMspSymbol>,

    /// Harvested related-package records.
    pub related_packages: Vec<RelatedPackageSymbol>,
    /// Authored and harvested related-bundle records.
    pub related_bundles: Vec<RelatedBundleSymbol>,
    /// Harvested per-feature records.
    pub package_features: Vec<PackageFeatureInfo>,
    /// Dependency providers, authored and imported.
    pub providers: Vec<DependencyProviderSymbol>,
    /// Patch target codes aggregated across MSP packages.
    pub patch_target_codes: Vec<PatchTargetCodeSymbol>,

    /// Executables approved for elevation by the engine.
    pub approved_exes: Vec<ApprovedExeForElevation>,
    /// Bootstrapper extensions and their payloads.
    pub extensions: Vec<BootstrapperExtensionSymbol>,
    /// Software tags registered with the bundle.
    pub software_tags: Vec<SoftwareTagSymbol>,

    /// Set when any patch could not enumerate its targets; disables
    /// bundle-wide target-code aggregation.
    pub unspecified_patch_targets: bool,

    /// Payload ids that already went through harvesting; makes harvest
    /// idempotent per payload.
    pub harvested_payloads: std::collections::BTreeSet<String>,
}

impl SymbolGraph {
    /// Creates an empty graph around a bundle symbol.
    pub fn new(bundle: BundleSymbol) -> Self {
        Self {
            bundle,
            ..Self::default()
        }
    }

    /// Finds a payload by id.
    pub fn payload(&self, id: &str) -> Option<&PayloadSymbol> {
        self.payloads.iter().find(|p| p.id == id)
    }

    /// Finds a payload by id, mutably.
    pub fn payload_mut(&mut self, id: &str) -> Option<&mut PayloadSymbol> {
        self.payloads.iter_mut().find(|p| p.id == id)
    }

    /// Finds a container by id.
    pub fn container(&self, id: &str) -> Option<&ContainerSymbol> {
        self.containers.iter().find(|c| c.id == id)
    }
}
