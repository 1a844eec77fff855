//! Bundle-wide symbols: registration, update feed, tags and extensions.

use crate::message::SourceLocation;
use std::path::PathBuf;
use uuid::Uuid;

/// The bundle being bound.
///
/// Carries the registration block the runtime engine writes into Add/Remove
/// Programs plus the bundle-level settings every manifest emits.
#[derive(Debug, Clone)]
pub struct BundleSymbol {
    /// Stable bundle code identifying this bundle across builds.
    pub bundle_code: Uuid,

    /// Display name registered in ARP.
    pub name: String,

    /// Four-part bundle version string.
    pub version: String,

    /// Publisher registered in ARP.
    pub manufacturer: Option<String>,

    /// Bundle-level install condition.
    pub condition: Option<String>,

    /// About/info URL registered in ARP.
    pub about_url: Option<String>,

    /// Help URL registered in ARP.
    pub help_url: Option<String>,

    /// Help telephone number registered in ARP.
    pub help_telephone: Option<String>,

    /// Update URL registered in ARP.
    pub update_url: Option<String>,

    /// Comments registered in ARP.
    pub comments: Option<String>,

    /// Disables the Modify button ("yes") or turns it into a single
    /// button ("button").
    pub disable_modify: Option<String>,

    /// Disables the Remove button.
    pub disable_remove: bool,

    /// True when the bundle registers per-machine.
    pub per_machine: bool,

    /// Log file prefix for the engine log.
    pub log_prefix: Option<String>,

    /// Log file extension for the engine log.
    pub log_extension: Option<String>,

    /// Variable the engine publishes the log path into.
    pub log_path_variable: Option<String>,

    /// Icon shown in ARP, as a build-time path.
    pub icon_source: Option<PathBuf>,

    /// Splash screen bitmap, as a build-time path.
    pub splash_screen_source: Option<PathBuf>,

    /// Upgrade code grouping related bundles.
    pub upgrade_code: Option<String>,

    /// Dependency provider key registered for the bundle itself.
    pub provider_key: Option<String>,

    /// Payload id of the primary bootstrapper application.
    pub primary_ux_payload: Option<String>,

    /// Payload id of the secondary bootstrapper application, if any.
    pub secondary_ux_payload: Option<String>,

    /// Authoring location of the bundle element.
    pub source: Option<SourceLocation>,
}

impl Default for BundleSymbol {
    fn default() -> Self {
        Self {
            bundle_code: Uuid::nil(),
            name: String::new(),
            version: String::new(),
            manufacturer: None,
            condition: None,
            about_url: None,
            help_url: None,
            help_telephone: None,
            update_url: None,
            comments: None,
            disable_modify: None,
            disable_remove: false,
            per_machine: true,
            log_prefix: None,
            log_extension: None,
            log_path_variable: None,
            icon_source: None,
            splash_screen_source: None,
            upgrade_code: None,
            provider_key: None,
            primary_ux_payload: None,
            secondary_ux_payload: None,
            source: None,
        }
    }
}

/// Update feed pointer emitted into the manifest `Update` element.
#[derive(Debug, Clone)]
pub struct UpdateSymbol {
    /// Location the engine polls for updates.
    pub location: String,
}

/// How the engine treats a related bundle it detects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelatedBundleAction {
    /// Detect only; never plan.
    Detect,
    /// Upgrade the related bundle.
    Upgrade,
    /// Install alongside as an add-on.
    Addon,
    /// Patch the related bundle.
    Patch,
}

impl RelatedBundleAction {
    /// Parses an action name as found in a child bundle manifest.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Detect" => Some(Self::Detect),
            "Upgrade" => Some(Self::Upgrade),
            "Addon" => Some(Self::Addon),
            "Patch" => Some(Self::Patch),
            _ => None,
        }
    }

    /// Manifest attribute value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Detect => "Detect",
            Self::Upgrade => "Upgrade",
            Self::Addon => "Addon",
            Self::Patch => "Patch",
        }
    }
}

/// A bundle related by upgrade code or explicit reference.
///
/// Bundle-level relations carry no package id; relations harvested out of a
/// chained bundle package belong to that package and serialize under its
/// chain element.
#[derive(Debug, Clone)]
pub struct RelatedBundleSymbol {
    /// Bundle code or upgrade code of the related bundle.
    pub code: String,
    /// Engine action when the related bundle is detected.
    pub action: RelatedBundleAction,
    /// Owning chain package, for harvested relations.
    pub package_id: Option<String>,
}

/// Software identification tag registered by the bundle.
#[derive(Debug, Clone)]
pub struct SoftwareTagSymbol {
    /// Registration id (reverse DNS) owning the tag.
    pub regid: String,
    /// Tag name.
    pub name: String,
    /// Installed tag path relative to the tag folder.
    pub path: Option<String>,
}

/// An executable the engine may launch elevated on behalf of the UX.
#[derive(Debug, Clone)]
pub struct ApprovedExeForElevation {
    /// Symbol id.
    pub id: String,
    /// Registry key holding the approved path.
    pub key: String,
    /// Registry value name, when not the default value.
    pub value_name: Option<String>,
    /// True to read the 64-bit registry view.
    pub win64: bool,
}

/// A bootstrapper extension participating in the bundle.
#[derive(Debug, Clone)]
pub struct BootstrapperExtensionSymbol {
    /// Extension id; also the key for extension-owned searches/containers.
    pub id: String,
    /// UX payload carrying the extension binary.
    pub payload_id: String,
    /// True for the primary extension.
    pub primary: bool,
}
