//! The extension-owned data manifest.
//!
//! Bootstrapper extensions read their own document at install time. The
//! binder contributes the ordered searches each extension owns; everything
//! else is an opaque fragment supplied by the extension when its container
//! or search data was registered.

use super::{Element, ManifestWriter, EXTENSION_DATA_NAMESPACE};
use crate::error::Result;
use crate::extension::ExtensionRegistry;
use crate::order::OrderedSearches;
use crate::symbol::SymbolGraph;
use std::collections::BTreeSet;
use std::io::Write;

/// Writes the extension data manifest.
///
/// Every extension that owns a search or registered an opaque fragment gets
/// one `BootstrapperExtension` element, ordered by extension id.
pub fn write_extension_data<W: Write>(
    graph: &SymbolGraph,
    searches: &OrderedSearches,
    extensions: &ExtensionRegistry,
    out: &mut W,
) -> Result<()> {
    let mut w = ManifestWriter::new(out);
    w.declaration()?;
    w.start(Element::new("BootstrapperExtensionData").attr("xmlns", EXTENSION_DATA_NAMESPACE))?;

    let mut ids: BTreeSet<&str> = searches
        .extension_groups
        .keys()
        .map(String::as_str)
        .collect();
    for extension in &graph.extensions {
        ids.insert(extension.id.as_str());
    }

    for extension_id in ids {
        let fragment = extensions.extension_data(extension_id);
        let group = searches.extension_groups.get(extension_id);
        if fragment.is_none() && group.is_none() {
            continue;
        }

        w.start(Element::new("BootstrapperExtension").attr("Id", extension_id))?;
        if let Some(fragment) = fragment {
            w.raw(fragment)?;
        }
        for search_id in group.into_iter().flatten() {
            let variable = graph
                .searches
                .iter()
                .find(|s| s.id == *search_id)
                .map(|s| s.variable.as_str());
            w.empty(
                Element::new("Search")
                    .attr("Id", search_id)
                    .attr_opt("Variable", variable),
            )?;
        }
        w.end("BootstrapperExtension")?;
    }

    w.end("BootstrapperExtensionData")?;
    Ok(())
}
