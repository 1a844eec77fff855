//! Detection searches and their ordering relations.

use crate::message::SourceLocation;

/// Generic search record: which variable to set and when to evaluate.
#[derive(Debug, Clone)]
pub struct SearchSymbol {
    /// Search id, unique across the bundle.
    pub id: String,
    /// Variable the search result is stored into.
    pub variable: String,
    /// Condition gating evaluation.
    pub condition: Option<String>,
    /// Authoring location.
    pub source: Option<SourceLocation>,
}

/// Registry hive a registry search reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryRoot {
    /// HKEY_CLASSES_ROOT.
    ClassesRoot,
    /// HKEY_CURRENT_USER.
    CurrentUser,
    /// HKEY_LOCAL_MACHINE.
    LocalMachine,
    /// HKEY_USERS.
    Users,
}

impl RegistryRoot {
    /// Manifest attribute value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClassesRoot => "HKCR",
            Self::CurrentUser => "HKCU",
            Self::LocalMachine => "HKLM",
            Self::Users => "HKU",
        }
    }
}

/// Type-specific data for the legacy search kinds.
#[derive(Debug, Clone)]
pub enum LegacySearchKind {
    /// Looks up an installed component.
    Component {
        /// Component GUID to look up.
        guid: String,
        /// Product scope for the lookup.
        product_code: Option<String>,
    },
    /// Probes a file on disk.
    File {
        /// Path to probe; may reference variables.
        path: String,
        /// True to capture the file version instead of existence.
        want_version: bool,
    },
    /// Reads a registry value.
    Registry {
        /// Hive to read from.
        root: RegistryRoot,
        /// Key under the hive.
        key: String,
        /// Value name; `None` reads the default value.
        value: Option<String>,
        /// True to read the 64-bit view.
        win64: bool,
        /// True to expand environment strings in the result.
        expand: bool,
    },
    /// Queries installed product state.
    Product {
        /// ProductCode or UpgradeCode being queried.
        guid: String,
        /// True when `guid` is an UpgradeCode.
        per_upgrade_code: bool,
    },
}

/// A legacy (component/file/registry/product) search.
#[derive(Debug, Clone)]
pub struct LegacySearchSymbol {
    /// Owning search id.
    pub id: String,
    /// Which legacy search this is.
    pub kind: LegacySearchKind,
}

/// A static set-variable pseudo-search.
#[derive(Debug, Clone)]
pub struct SetVariableSearchSymbol {
    /// Owning search id.
    pub id: String,
    /// Literal value stored into the variable; `None` unsets it.
    pub value: Option<String>,
    /// Declared value type ("string", "numeric", "version").
    pub variable_type: Option<String>,
}

/// A search owned by a bootstrapper extension.
#[derive(Debug, Clone)]
pub struct ExtensionSearchSymbol {
    /// Owning search id.
    pub id: String,
    /// Extension the search belongs to.
    pub extension_id: String,
}

/// Declares that one search must be evaluated after another.
#[derive(Debug, Clone)]
pub struct SearchRelation {
    /// The search being constrained.
    pub id: String,
    /// The search that must run first.
    pub after: String,
    /// Authoring location.
    pub source: Option<SourceLocation>,
}
