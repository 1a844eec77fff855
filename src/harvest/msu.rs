//! MSU package harvesting.
//!
//! Windows update packages install through wusa.exe, which offers no
//! database to introspect. The harvester only derives a cache id and pins
//! the scope: update packages are always per-machine.

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

    if let Some(package) = graph.packages.iter_mut().find(|p| p.id == package_id) {
        package.per_machine = Some(true);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{PackageSymbol, PackageType};

    #[test]
    fn scope_is_always_per_machine() {
        let mut graph = SymbolGraph::default();
        let mut package = PackageSymbol::new("Hotfix", PackageType::Msu);
        package.per_machine = Some(false); // authoring cannot override
        graph.packages.push(package);

        let mut payload = PayloadSymbol::new("HotfixPayload", "kb123.msu", "build/kb123.msu");
        payload.hash = Some("cd".repeat(40));

        let mut messages = Messages::new();
        harvest(&mut graph, "Hotfix", &payload, &mut messages).unwrap();

        assert_eq!(Some(true), graph.packages[0].per_machine);
        assert!(graph.packages[0].cache_id.is_some());
        assert!(!messages.has_errors());
    }
}
