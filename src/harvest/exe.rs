//! EXE package harvesting.
//!
//! Arbitrary executables carry no introspectable database; everything the
//! engine needs is already on the payload. The cache id defaults to the
//! payload's content hash and the version is whatever the payload resolver
//! already read from the file.

use crate::cacheid::CacheIdentity;
use crate::error::Result;
use crate::message::Messages;
use crate::symbol::{PayloadSymbol, SymbolGraph};

pub(super) fn harvest(
    graph: &mut SymbolGraph,
    package_id: &str,
    payload: &PayloadSymbol,
    messages: &mut Messages,
) -> Result<()> {
    super::fill_package_from_payload(graph, package_id, payload);

    if payload.uses_certificate() {
        // The cache-id helper reports the missing CacheId attribute.
        super::assign_cache_id(graph, package_id, payload, CacheIdentity::Code(""), messages);
    } else {
        let hash = super::hash_identity(payload)?;
        super::assign_cache_id(
            graph,
            package_id,
            payload,
            CacheIdentity::Hash(&hash),
            messages,
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{PackageSymbol, PackageType};

    fn graph_with_exe() -> SymbolGraph {
        let mut graph = SymbolGraph::default();
        graph
            .packages
            .push(PackageSymbol::new("Tool", PackageType::Exe));
        graph
    }

    #[test]
    fn cache_id_defaults_to_payload_hash() {
        let mut graph = graph_with_exe();
        let mut payload = PayloadSymbol::new("ToolPayload", "tool.exe", "build/tool.exe");
        payload.hash = Some("ab".repeat(40));
        payload.file_size = Some(1024);
        payload.version = Some("3.1.0.0".into());

        let mut messages = Messages::new();
        harvest(&mut graph, "Tool", &payload, &mut messages).unwrap();

        let package = &graph.packages[0];
        let cache_id = package.cache_id.as_deref().unwrap();
        assert_eq!(64, cache_id.len());
        assert!(payload.hash.as_deref().unwrap().starts_with(cache_id));
        assert_eq!(1024, package.size);
        assert_eq!(Some("3.1.0.0"), package.version.as_deref());
    }

    #[test]
    fn certificate_without_cache_id_is_an_error() {
        let mut graph = graph_with_exe();
        let mut payload = PayloadSymbol::new("ToolPayload", "tool.exe", "build/tool.exe");
        payload.certificate_thumbprint = Some("aabbccdd".into());

        let mut messages = Messages::new();
        harvest(&mut graph, "Tool", &payload, &mut messages).unwrap();

        assert!(messages.has_errors());
        let report = &messages.all()[0];
        assert_eq!(crate::message::EXPECTED_ATTRIBUTE, report.id);
        assert!(report.text.contains("CacheId"));
        assert!(report.text.contains("CertificateThumbprint"));
        assert!(graph.packages[0].cache_id.is_none());
    }

    #[test]
    fn authored_cache_id_survives() {
        let mut graph = graph_with_exe();
        graph.packages[0].cache_id = Some("AuthoredCacheId".into());
        let mut payload = PayloadSymbol::new("ToolPayload", "tool.exe", "build/tool.exe");
        payload.certificate_thumbprint = Some("aabbccdd".into());

        let mut messages = Messages::new();
        harvest(&mut graph, "Tool", &payload, &mut messages).unwrap();

        assert!(!messages.has_errors());
        assert_eq!(Some("AuthoredCacheId"), graph.packages[0].cache_id.as_deref());
    }
}
