//! Manifest serialization.
//!
//! The binder emits three XML documents: the control manifest the engine
//! parses at install time, the auxiliary data manifest the bootstrapper
//! application reads, and the opaque extension-data manifest. All three are
//! written into the intermediate folder and then packed into the UX
//! container as its leading payloads.
//!
//! Attributes are written only when the underlying value is non-empty and
//! non-default; to the runtime, omission (not an empty string) means
//! "unset".
//!
//! # Module Organization
//!
//! - `burn` - the install-time control manifest
//! - `badata` - the bootstrapper-application data manifest
//! - `extdata` - the extension-owned data manifest

mod badata;
mod burn;
mod extdata;

pub use badata::write_ba_data;
pub use burn::write_burn_manifest;
pub use extdata::write_extension_data;

use crate::error::Result;
use crate::symbol::{ContainerSymbol, ContainerType, Packaging, PayloadSymbol, SymbolGraph};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;

/// Namespace of the control manifest.
pub const BURN_NAMESPACE: &str = "http://wixtoolset.org/schemas/v4/2008/Burn";

/// Namespace of the bootstrapper-application data manifest.
pub const BA_DATA_NAMESPACE: &str = "http://wixtoolset.org/schemas/v4/BootstrapperApplicationData";

/// Namespace of the extension data manifest.
pub const EXTENSION_DATA_NAMESPACE: &str =
    "http://wixtoolset.org/schemas/v4/BootstrapperExtensionData";

/// Payloads assigned to a container, paired with their embedded ids.
///
/// The embedded id doubles as the entry name inside the packed archive, so
/// the manifest and the cabinet agree by construction: `u0, u1, ...` in the
/// UX container, `a0, a1, ...` elsewhere. Order follows the payload symbols'
/// graph order.
pub fn assigned_payloads<'a>(
    graph: &'a SymbolGraph,
    container: &ContainerSymbol,
) -> Vec<(String, &'a PayloadSymbol)> {
    let prefix = match container.container_type {
        ContainerType::Ux => 'u',
        ContainerType::Attached | ContainerType::Detached => 'a',
    };
    graph
        .payloads
        .iter()
        .filter(|p| {
            p.packaging == Packaging::Embedded
                && !p.layout_only
                && p.container.as_deref() == Some(container.id.as_str())
        })
        .enumerate()
        .map(|(index, payload)| (format!("{prefix}{index}"), payload))
        .collect()
}

/// Thin wrapper over the event writer with the conditional-attribute rules
/// all three manifests share.
pub(crate) struct ManifestWriter<W: Write> {
    writer: Writer<W>,
}

impl<W: Write> ManifestWriter<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self {
            writer: Writer::new_with_indent(inner, b' ', 2),
        }
    }

    pub(crate) fn declaration(&mut self) -> Result<()> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        Ok(())
    }

    pub(crate) fn start(&mut self, element: Element<'_>) -> Result<()> {
        self.writer.write_event(Event::Start(element.start))?;
        Ok(())
    }

    pub(crate) fn empty(&mut self, element: Element<'_>) -> Result<()> {
        self.writer.write_event(Event::Empty(element.start))?;
        Ok(())
    }

    pub(crate) fn end(&mut self, name: &str) -> Result<()> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    pub(crate) fn text(&mut self, content: &str) -> Result<()> {
        self.writer
            .write_event(Event::Text(BytesText::new(content)))?;
        Ok(())
    }

    /// Injects an already-serialized XML fragment verbatim.
    pub(crate) fn raw(&mut self, fragment: &str) -> Result<()> {
        self.writer
            .write_event(Event::Text(BytesText::from_escaped(fragment)))?;
        Ok(())
    }
}

/// An element under construction; attribute helpers skip unset values.
pub(crate) struct Element<'a> {
    start: BytesStart<'a>,
}

impl<'a> Element<'a> {
    pub(crate) fn new(name: &'a str) -> Self {
        Self {
            start: BytesStart::new(name),
        }
    }

    /// Writes an attribute unconditionally.
    pub(crate) fn attr(mut self, name: &str, value: &str) -> Self {
        self.start.push_attribute((name, value));
        self
    }

    /// Writes an attribute unless the value is absent or empty.
    pub(crate) fn attr_opt(mut self, name: &str, value: Option<&str>) -> Self {
        if let Some(value) = value {
            if !value.is_empty() {
                self.start.push_attribute((name, value));
            }
        }
        self
    }

    /// Writes a yes/no attribute unless the value equals the default.
    pub(crate) fn attr_bool(mut self, name: &str, value: bool, default: bool) -> Self {
        if value != default {
            self.start
                .push_attribute((name, if value { "yes" } else { "no" }));
        }
        self
    }

    /// Writes a numeric attribute unless the value is zero.
    pub(crate) fn attr_nonzero(mut self, name: &str, value: u64) -> Self {
        if value != 0 {
            self.start.push_attribute((name, value.to_string().as_str()));
        }
        self
    }
}
