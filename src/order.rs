//! Deterministic ordering of detection searches.
//!
//! Searches may declare "evaluate me after that one" relations. The engine
//! runs them strictly in manifest order, so the binder must produce a
//! dependency-respecting order that is also reproducible: independent
//! searches tie-break lexicographically, never by input iteration order.

use crate::message::{self, Messages};
use crate::symbol::SymbolGraph;
use std::collections::{BTreeMap, BTreeSet};

/// How an ordered search id resolved against the search data symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchClass {
    /// Component, file, registry or product search.
    Legacy,
    /// Static set-variable pseudo-search.
    SetVariable,
    /// Owned by a bootstrapper extension.
    Extension {
        /// The owning extension id.
        extension_id: String,
    },
}

/// One search in its final evaluation position.
#[derive(Debug, Clone)]
pub struct OrderedSearch {
    /// Search id.
    pub id: String,
    /// Which data symbol backs the search.
    pub class: SearchClass,
}

/// The fully ordered and classified search set.
#[derive(Debug, Default)]
pub struct OrderedSearches {
    /// Searches in evaluation order.
    pub ordered: Vec<OrderedSearch>,
    /// Extension-owned search ids grouped per extension, in evaluation
    /// order, for the extensions' own auxiliary manifest.
    pub extension_groups: BTreeMap<String, Vec<String>>,
}

/// Orders every search in the graph, reporting cycles and unmatched ids.
///
/// Returns an empty order when any circular reference exists; the collected
/// error messages fail the build afterwards.
pub fn order_searches(graph: &SymbolGraph, messages: &mut Messages) -> OrderedSearches {
    // Constraint map: id -> ids that must be evaluated first. Every known
    // search gets an entry so unconstrained searches still sort.
    let known: BTreeSet<&str> = graph.searches.iter().map(|s| s.id.as_str()).collect();
    let mut constraints: BTreeMap<String, BTreeSet<String>> = graph
        .searches
        .iter()
        .map(|s| (s.id.clone(), BTreeSet::new()))
        .collect();
    for relation in &graph.search_relations {
        if known.contains(relation.id.as_str()) && known.contains(relation.after.as_str()) {
            constraints
                .get_mut(&relation.id)
                .expect("entry exists for every known search")
                .insert(relation.after.clone());
        }
    }

    // Cycle detection runs for every id so disjoint cycles all surface in
    // one pass.
    let mut found_cycle = false;
    for id in constraints.keys() {
        if let Some(chain) = find_cycle(id, &constraints) {
            messages.report(message::circular_search_reference(&chain.join(" -> ")));
            found_cycle = true;
        }
    }
    if found_cycle {
        return OrderedSearches::default();
    }

    flatten_constraints(&mut constraints);

    // Repeatedly pick the lexicographically smallest id with no remaining
    // constraints; BTreeMap iteration order makes the choice deterministic.
    let mut ordered_ids = Vec::with_capacity(constraints.len());
    while !constraints.is_empty() {
        let next = constraints
            .iter()
            .find(|(_, after)| after.is_empty())
            .map(|(id, _)| id.clone())
            .expect("acyclic constraints always leave a free search");
        constraints.remove(&next);
        for after in constraints.values_mut() {
            after.remove(&next);
        }
        ordered_ids.push(next);
    }

    classify(graph, ordered_ids, messages)
}

/// Walks the constraint graph from `start`; returns the chain when `start`
/// is reachable from itself.
fn find_cycle(start: &str, constraints: &BTreeMap<String, BTreeSet<String>>) -> Option<Vec<String>> {
    let mut stack = vec![(start.to_string(), Vec::new())];
    let mut visited = BTreeSet::new();
    while let Some((current, path)) = stack.pop() {
        let mut path = path;
        path.push(current.clone());
        for after in constraints.get(&current).into_iter().flatten() {
            if after == start {
                path.push(after.clone());
                return Some(path);
            }
            if visited.insert(after.clone()) {
                stack.push((after.clone(), path.clone()));
            }
        }
    }
    None
}

/// Makes every transitive constraint direct, so the sort only consults one
/// level.
fn flatten_constraints(constraints: &mut BTreeMap<String, BTreeSet<String>>) {
    let ids: Vec<String> = constraints.keys().cloned().collect();
    for id in &ids {
        let mut closure = BTreeSet::new();
        let mut pending: Vec<String> = constraints[id].iter().cloned().collect();
        while let Some(ancestor) = pending.pop() {
            if closure.insert(ancestor.clone()) {
                if let Some(upstream) = constraints.get(&ancestor) {
                    pending.extend(upstream.iter().cloned());
                }
            }
        }
        constraints.insert(id.clone(), closure);
    }
}

fn classify(
    graph: &SymbolGraph,
    ordered_ids: Vec<String>,
    messages: &mut Messages,
) -> OrderedSearches {
    let legacy: BTreeSet<&str> = graph
        .legacy_searches
        .iter()
        .map(|s| s.id.as_str())
        .collect();
    let set_variables: BTreeSet<&str> = graph
        .set_variable_searches
        .iter()
        .map(|s| s.id.as_str())
        .collect();
    let extensions: BTreeMap<&str, &str> = graph
        .extension_searches
        .iter()
        .map(|s| (s.id.as_str(), s.extension_id.as_str()))
        .collect();

    let mut result = OrderedSearches::default();
    for id in ordered_ids {
        let class = if legacy.contains(id.as_str()) {
            SearchClass::Legacy
        } else if set_variables.contains(id.as_str()) {
            SearchClass::SetVariable
        } else if let Some(extension_id) = extensions.get(id.as_str()) {
            result
                .extension_groups
                .entry((*extension_id).to_string())
                .or_default()
                .push(id.clone());
            SearchClass::Extension {
                extension_id: (*extension_id).to_string(),
            }
        } else {
            let source = graph
                .searches
                .iter()
                .find(|s| s.id == id)
                .and_then(|s| s.source.clone());
            messages.report(message::missing_bundle_search(source, &id));
            continue;
        };
        result.ordered.push(OrderedSearch { id, class });
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{
        ExtensionSearchSymbol, LegacySearchKind, LegacySearchSymbol, SearchRelation, SearchSymbol,
        SetVariableSearchSymbol,
    };

    fn graph_with(ids: &[&str], relations: &[(&str, &str)]) -> SymbolGraph {
        let mut graph = SymbolGraph::default();
        for id in ids {
            graph.searches.push(SearchSymbol {
                id: (*id).to_string(),
                variable: format!("var{id}"),
                condition: None,
                source: None,
            });
            graph.legacy_searches.push(LegacySearchSymbol {
                id: (*id).to_string(),
                kind: LegacySearchKind::File {
                    path: format!("[ProgramFilesFolder]{id}.exe"),
                    want_version: false,
                },
            });
        }
        for (id, after) in relations {
            graph.search_relations.push(SearchRelation {
                id: (*id).to_string(),
                after: (*after).to_string(),
                source: None,
            });
        }
        graph
    }

    fn ids(result: &OrderedSearches) -> Vec<&str> {
        result.ordered.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn unconstrained_searches_sort_lexicographically() {
        let graph = graph_with(&["Charlie", "alpha", "Bravo"], &[]);
        let mut messages = Messages::new();
        let result = order_searches(&graph, &mut messages);
        assert_eq!(vec!["Bravo", "Charlie", "alpha"], ids(&result));
        assert!(!messages.has_errors());
    }

    #[test]
    fn relations_override_lexicographic_order() {
        // "Apple" must come after "Zebra" despite sorting first.
        let graph = graph_with(&["Apple", "Mango", "Zebra"], &[("Apple", "Zebra")]);
        let mut messages = Messages::new();
        let result = order_searches(&graph, &mut messages);
        assert_eq!(vec!["Mango", "Zebra", "Apple"], ids(&result));
    }

    #[test]
    fn transitive_relations_are_honored() {
        let graph = graph_with(
            &["A", "B", "C"],
            &[("A", "B"), ("B", "C")],
        );
        let mut messages = Messages::new();
        let result = order_searches(&graph, &mut messages);
        assert_eq!(vec!["C", "B", "A"], ids(&result));
    }

    #[test]
    fn repeated_runs_yield_the_same_order() {
        let graph = graph_with(
            &["S4", "S2", "S1", "S3"],
            &[("S1", "S4"), ("S2", "S4")],
        );
        let mut first = Messages::new();
        let first_order = ids(&order_searches(&graph, &mut first))
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();
        for _ in 0..3 {
            let mut messages = Messages::new();
            let again = order_searches(&graph, &mut messages);
            assert_eq!(first_order, ids(&again));
        }
    }

    #[test]
    fn self_cycle_is_detected() {
        let graph = graph_with(&["Loner"], &[("Loner", "Loner")]);
        let mut messages = Messages::new();
        let result = order_searches(&graph, &mut messages);
        assert!(result.ordered.is_empty());
        assert!(messages.has_errors());
        assert!(messages.all()[0].text.contains("Loner -> Loner"));
    }

    #[test]
    fn disjoint_cycles_both_surface() {
        let graph = graph_with(
            &["A", "B", "C", "D"],
            &[("A", "B"), ("B", "A"), ("C", "D"), ("D", "C")],
        );
        let mut messages = Messages::new();
        let result = order_searches(&graph, &mut messages);
        assert!(result.ordered.is_empty());
        let texts: Vec<&str> = messages.all().iter().map(|m| m.text.as_str()).collect();
        assert!(texts.iter().any(|t| t.contains("A -> B -> A")));
        assert!(texts.iter().any(|t| t.contains("C -> D -> C")));
    }

    #[test]
    fn searches_classify_and_group_per_extension() {
        let mut graph = SymbolGraph::default();
        for id in ["LegacyOne", "SetOne", "ExtOne", "ExtTwo", "Orphan"] {
            graph.searches.push(SearchSymbol {
                id: id.to_string(),
                variable: "v".into(),
                condition: None,
                source: None,
            });
        }
        graph.legacy_searches.push(LegacySearchSymbol {
            id: "LegacyOne".into(),
            kind: LegacySearchKind::Product {
                guid: "{00000000-0000-0000-0000-000000000001}".into(),
                per_upgrade_code: false,
            },
        });
        graph.set_variable_searches.push(SetVariableSearchSymbol {
            id: "SetOne".into(),
            value: Some("1".into()),
            variable_type: Some("numeric".into()),
        });
        graph.extension_searches.push(ExtensionSearchSymbol {
            id: "ExtOne".into(),
            extension_id: "FancyExtension".into(),
        });
        graph.extension_searches.push(ExtensionSearchSymbol {
            id: "ExtTwo".into(),
            extension_id: "FancyExtension".into(),
        });

        let mut messages = Messages::new();
        let result = order_searches(&graph, &mut messages);

        assert!(messages.has_errors());
        assert_eq!(message::MISSING_BUNDLE_SEARCH, messages.all()[0].id);
        assert_eq!(4, result.ordered.len());
        assert_eq!(
            vec!["ExtOne".to_string(), "ExtTwo".to_string()],
            result.extension_groups["FancyExtension"]
        );
        assert!(result
            .ordered
            .iter()
            .any(|s| s.id == "SetOne" && s.class == SearchClass::SetVariable));
    }
}
