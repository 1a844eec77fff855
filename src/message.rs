//! Collected build diagnostics.
//!
//! The binder reports every problem it finds in a single run instead of
//! stopping at the first one. Components append [`Message`] values to a
//! shared [`Messages`] sink; the caller inspects the sink after each stage
//! and the bind succeeds only when no error-severity message was recorded.
//!
//! Every message carries a stable numeric id so hosts can suppress or
//! elevate individual diagnostics without string matching.

use std::fmt;

/// Message severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    /// Non-fatal; the binder may have mutated the graph to a safe default.
    Warning,
    /// Fatal for the build; remaining stages for the artifact are skipped.
    Error,
}

/// Source location an authored symbol originated from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLocation {
    /// Authoring file.
    pub file: String,
    /// Line within the file, when known.
    pub line: Option<u32>,
}

impl SourceLocation {
    /// Creates a location with a file and line.
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line: Some(line),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}({})", self.file, line),
            None => write!(f, "{}", self.file),
        }
    }
}

/// A single collected diagnostic.
#[derive(Clone, Debug)]
pub struct Message {
    /// Stable numeric id.
    pub id: u32,
    /// Severity of the diagnostic.
    pub severity: Severity,
    /// Rendered message text.
    pub text: String,
    /// Primary source location, when the symbol carried one.
    pub source: Option<SourceLocation>,
    /// Additional locations involved (e.g. both sites of a duplicate).
    pub related: Vec<SourceLocation>,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match &self.source {
            Some(source) => write!(f, "{source}: {kind} BURN{:04}: {}", self.id, self.text),
            None => write!(f, "{kind} BURN{:04}: {}", self.id, self.text),
        }
    }
}

/// Append-only diagnostics sink threaded through every binder stage.
#[derive(Debug, Default)]
pub struct Messages {
    list: Vec<Message>,
    error_count: usize,
}

impl Messages {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message, logging it through the `log` facade as it lands.
    pub fn report(&mut self, message: Message) {
        match message.severity {
            Severity::Warning => log::warn!("{message}"),
            Severity::Error => {
                self.error_count += 1;
                log::error!("{message}");
            }
        }
        self.list.push(message);
    }

    /// All collected messages in report order.
    pub fn all(&self) -> &[Message] {
        &self.list
    }

    /// True if any error-severity message was reported.
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Number of error-severity messages reported so far.
    pub fn error_count(&self) -> usize {
        self.error_count
    }
}

fn error(id: u32, source: Option<SourceLocation>, text: String) -> Message {
    Message {
        id,
        severity: Severity::Error,
        text,
        source,
        related: Vec::new(),
    }
}

fn warning(id: u32, source: Option<SourceLocation>, text: String) -> Message {
    Message {
        id,
        severity: Severity::Warning,
        text,
        source,
        related: Vec::new(),
    }
}

// Structural stub/container failures abort immediately and travel as
// [`crate::error::Error`]; collected diagnostics start at the harvesting
// range.

/// Id of [`unable_to_read_package_information`].
pub const UNABLE_TO_READ_PACKAGE_INFORMATION: u32 = 8100;

/// Harvesting failed for one package; siblings continue.
pub fn unable_to_read_package_information(
    source: Option<SourceLocation>,
    path: &std::path::Path,
    reason: &str,
) -> Message {
    error(
        UNABLE_TO_READ_PACKAGE_INFORMATION,
        source,
        format!(
            "unable to read package information from {}: {reason}",
            path.display()
        ),
    )
}

/// Id of [`identifier_not_found`].
pub const IDENTIFIER_NOT_FOUND: u32 = 8200;

/// A generic package symbol has no matching type-specific symbol.
pub fn identifier_not_found(source: Option<SourceLocation>, kind: &str, id: &str) -> Message {
    error(
        IDENTIFIER_NOT_FOUND,
        source,
        format!("the identifier {id} could not be found as a {kind}"),
    )
}

/// Id of [`missing_package_payload`].
pub const MISSING_PACKAGE_PAYLOAD: u32 = 8201;

/// A package has no payload child.
pub fn missing_package_payload(source: Option<SourceLocation>, package_id: &str) -> Message {
    error(
        MISSING_PACKAGE_PAYLOAD,
        source,
        format!("package {package_id} is missing its package payload"),
    )
}

/// Id of [`multiple_package_payloads`].
pub const MULTIPLE_PACKAGE_PAYLOADS: u32 = 8202;

/// A package has more than one payload child.
pub fn multiple_package_payloads(
    source: Option<SourceLocation>,
    package_id: &str,
    first: Option<SourceLocation>,
    second: Option<SourceLocation>,
) -> Message {
    let mut message = error(
        MULTIPLE_PACKAGE_PAYLOADS,
        source,
        format!("package {package_id} declares multiple package payloads"),
    );
    message.related.extend(first);
    message.related.extend(second);
    message
}

/// Id of [`package_payload_unsupported`].
pub const PACKAGE_PAYLOAD_UNSUPPORTED: u32 = 8203;

/// A payload child's declared kind does not match the package type.
pub fn package_payload_unsupported(
    source: Option<SourceLocation>,
    package_id: &str,
    package_type: &str,
    payload_site: Option<SourceLocation>,
) -> Message {
    let mut message = error(
        PACKAGE_PAYLOAD_UNSUPPORTED,
        source,
        format!("the package payload of {package_id} is unsupported for a {package_type} package"),
    );
    message.related.extend(payload_site);
    message
}

/// Id of [`missing_bundle_search`].
pub const MISSING_BUNDLE_SEARCH: u32 = 8204;

/// An ordered search id matched no known search data.
pub fn missing_bundle_search(source: Option<SourceLocation>, search_id: &str) -> Message {
    error(
        MISSING_BUNDLE_SEARCH,
        source,
        format!("no search data found for bundle search {search_id}"),
    )
}

/// Id of [`circular_search_reference`].
pub const CIRCULAR_SEARCH_REFERENCE: u32 = 8205;

/// A declared search ordering relation loops back on itself.
pub fn circular_search_reference(chain: &str) -> Message {
    error(
        CIRCULAR_SEARCH_REFERENCE,
        None,
        format!("circular search ordering reference: {chain}"),
    )
}

/// Id of [`expected_attribute`].
pub const EXPECTED_ATTRIBUTE: u32 = 8206;

/// An attribute is required because a sibling attribute was authored.
pub fn expected_attribute(
    source: Option<SourceLocation>,
    element: &str,
    attribute: &str,
    because: &str,
) -> Message {
    error(
        EXPECTED_ATTRIBUTE,
        source,
        format!(
            "expected attribute {attribute} on {element} when attribute {because} is specified"
        ),
    )
}

/// Id of [`missing_container_extension`].
pub const MISSING_CONTAINER_EXTENSION: u32 = 8207;

/// A container names an archive-format extension that is not loaded.
pub fn missing_container_extension(
    source: Option<SourceLocation>,
    container_id: &str,
    extension_id: &str,
) -> Message {
    error(
        MISSING_CONTAINER_EXTENSION,
        source,
        format!("container {container_id} requires extension {extension_id}, which is not loaded"),
    )
}

/// Id of [`per_machine_conflict`].
pub const PER_MACHINE_CONFLICT: u32 = 8208;

/// ALLUSERS=1 conflicts with an explicit per-user authoring.
pub fn per_machine_conflict(source: Option<SourceLocation>, package_id: &str) -> Message {
    error(
        PER_MACHINE_CONFLICT,
        source,
        format!(
            "package {package_id} is authored per-user but its ALLUSERS property makes it per-machine"
        ),
    )
}

// Policy warnings: 8300-8399.

/// Id of [`forced_per_machine`].
pub const FORCED_PER_MACHINE: u32 = 8300;

/// A per-user authoring was overridden to per-machine.
pub fn forced_per_machine(source: Option<SourceLocation>, package_id: &str) -> Message {
    warning(
        FORCED_PER_MACHINE,
        source,
        format!("package {package_id} was forced to per-machine; ALLUSERS will be set to 1"),
    )
}

/// Id of [`implicit_per_user`].
pub const IMPLICIT_PER_USER: u32 = 8301;

/// A package without ALLUSERS falls back to per-user scope.
pub fn implicit_per_user(source: Option<SourceLocation>, package_id: &str) -> Message {
    warning(
        IMPLICIT_PER_USER,
        source,
        format!("package {package_id} has no ALLUSERS property and installs per-user"),
    )
}

/// Id of [`discouraged_allusers`].
pub const DISCOURAGED_ALLUSERS: u32 = 8302;

/// ALLUSERS=2 behaves inconsistently across installs.
pub fn discouraged_allusers(source: Option<SourceLocation>, package_id: &str) -> Message {
    warning(
        DISCOURAGED_ALLUSERS,
        source,
        format!("package {package_id} sets ALLUSERS=2, which resolves differently per machine"),
    )
}

/// Id of [`empty_container`].
pub const EMPTY_CONTAINER: u32 = 8303;

/// The reserved default attached container ended up with no payloads.
pub fn empty_container(source: Option<SourceLocation>, container_id: &str) -> Message {
    warning(
        EMPTY_CONTAINER,
        source,
        format!("container {container_id} has no payloads and will not be created"),
    )
}

/// Id of [`unknown_machine_type`].
pub const UNKNOWN_MACHINE_TYPE: u32 = 8304;

/// A child bundle's PE machine type was not recognized.
pub fn unknown_machine_type(source: Option<SourceLocation>, path: &std::path::Path, machine: u16) -> Message {
    warning(
        UNKNOWN_MACHINE_TYPE,
        source,
        format!(
            "unknown machine type {machine:#06x} in {}; assuming 32-bit",
            path.display()
        ),
    )
}

/// Id of [`unknown_related_bundle_action`].
pub const UNKNOWN_RELATED_BUNDLE_ACTION: u32 = 8305;

/// A related-bundle entry carried an unparseable action value.
pub fn unknown_related_bundle_action(
    source: Option<SourceLocation>,
    bundle_code: &str,
    action: &str,
) -> Message {
    warning(
        UNKNOWN_RELATED_BUNDLE_ACTION,
        source,
        format!("ignoring related bundle {bundle_code} with unknown action {action}"),
    )
}

/// Id of [`hidden_bundle_not_supported`].
pub const HIDDEN_BUNDLE_NOT_SUPPORTED: u32 = 8306;

/// Hidden ARP registration is not supported for bundles.
pub fn hidden_bundle_not_supported(source: Option<SourceLocation>) -> Message {
    warning(
        HIDDEN_BUNDLE_NOT_SUPPORTED,
        source,
        "hidden bundle visibility is not supported; the bundle will be visible in Add/Remove Programs"
            .to_string(),
    )
}

// Validation diagnostics: 8400-8499.

/// Id of [`invalid_condition`].
pub const INVALID_CONDITION: u32 = 8400;

/// A condition failed structural validation.
pub fn invalid_condition(
    source: Option<SourceLocation>,
    element: &str,
    condition: &str,
    reason: &str,
) -> Message {
    error(
        INVALID_CONDITION,
        source,
        format!("invalid condition on {element}: {reason}: {condition}"),
    )
}

/// Id of [`invalid_msi_property_name`].
pub const INVALID_MSI_PROPERTY_NAME: u32 = 8401;

/// An MSI property name is malformed.
pub fn invalid_msi_property_name(
    source: Option<SourceLocation>,
    element: &str,
    name: &str,
) -> Message {
    error(
        INVALID_MSI_PROPERTY_NAME,
        source,
        format!("invalid MSI property name {name} on {element}"),
    )
}

/// Id of [`invalid_variable_name`].
pub const INVALID_VARIABLE_NAME: u32 = 8402;

/// A bundle variable name is malformed.
pub fn invalid_variable_name(source: Option<SourceLocation>, name: &str) -> Message {
    error(
        INVALID_VARIABLE_NAME,
        source,
        format!("invalid bundle variable name {name}"),
    )
}

/// Id of [`reserved_variable_name`].
pub const RESERVED_VARIABLE_NAME: u32 = 8403;

/// A bundle variable uses the reserved builtin prefix.
pub fn reserved_variable_name(source: Option<SourceLocation>, name: &str) -> Message {
    error(
        RESERVED_VARIABLE_NAME,
        source,
        format!("bundle variable name {name} is reserved for builtin variables"),
    )
}

/// Id of [`per_machine_unresolved`].
pub const PER_MACHINE_UNRESOLVED: u32 = 8404;

/// A package reached emission without a resolved per-machine scope.
pub fn per_machine_unresolved(source: Option<SourceLocation>, package_id: &str) -> Message {
    error(
        PER_MACHINE_UNRESOLVED,
        source,
        format!("package {package_id} has no resolved per-machine scope"),
    )
}

/// Id of [`payload_name_not_relative`].
pub const PAYLOAD_NAME_NOT_RELATIVE: u32 = 8405;

/// A payload name is absolute or escapes the install root.
pub fn payload_name_not_relative(source: Option<SourceLocation>, name: &str) -> Message {
    error(
        PAYLOAD_NAME_NOT_RELATIVE,
        source,
        format!("payload name {name} must be relative and must not traverse outside the bundle"),
    )
}
