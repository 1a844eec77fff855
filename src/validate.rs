//! Final graph validation.
//!
//! Runs after resolution and harvesting, before anything is emitted: every
//! condition must tokenize cleanly, MSI property names and bundle variable
//! names must be well-formed, and payload names must stay inside the
//! layout. Violations are collected per occurrence with the originating
//! element name, so one run reports every problem in the graph.

use crate::message::{self, Messages};
use crate::symbol::SymbolGraph;

/// Builtin variable prefix reserved for the engine.
const RESERVED_PREFIX: &str = "WixBundle";

/// Well-known engine variables that authoring may not redefine.
const BUILTIN_VARIABLES: [&str; 6] = [
    "InstallerName",
    "InstallerVersion",
    "NTProductType",
    "ProcessorArchitecture",
    "RebootPending",
    "TerminalServer",
];

/// Validates the fully-resolved graph.
pub fn validate_graph(graph: &SymbolGraph, messages: &mut Messages) {
    if let Some(condition) = &graph.bundle.condition {
        check_condition(condition, "Bundle", graph.bundle.source.clone(), messages);
    }

    for package in &graph.packages {
        let element = format!("{}Package", package.package_type.as_str());
        if let Some(condition) = &package.install_condition {
            check_condition(condition, &element, package.source.clone(), messages);
        }
        if let Some(condition) = &package.repair_condition {
            check_condition(condition, &element, package.source.clone(), messages);
        }
        if package.per_machine.is_none() {
            messages.report(message::per_machine_unresolved(
                package.source.clone(),
                &package.id,
            ));
        }
    }

    for exe in &graph.exe_packages {
        if let Some(condition) = &exe.detect_condition {
            check_condition(condition, "ExePackage", exe.source.clone(), messages);
        }
    }
    for msu in &graph.msu_packages {
        if let Some(condition) = &msu.detect_condition {
            check_condition(condition, "MsuPackage", msu.source.clone(), messages);
        }
    }

    for property in &graph.msi_properties {
        if !is_valid_msi_property_name(&property.name) {
            messages.report(message::invalid_msi_property_name(
                property.source.clone(),
                "MsiProperty",
                &property.name,
            ));
        }
        if let Some(condition) = &property.condition {
            check_condition(condition, "MsiProperty", property.source.clone(), messages);
        }
    }

    for variable in &graph.variables {
        if !is_valid_identifier(&variable.id) {
            messages.report(message::invalid_variable_name(
                variable.source.clone(),
                &variable.id,
            ));
        } else if is_reserved_variable(&variable.id) {
            messages.report(message::reserved_variable_name(
                variable.source.clone(),
                &variable.id,
            ));
        }
    }

    for search in &graph.searches {
        if !is_valid_identifier(&search.variable) {
            messages.report(message::invalid_variable_name(
                search.source.clone(),
                &search.variable,
            ));
        }
        if let Some(condition) = &search.condition {
            check_condition(condition, "Search", search.source.clone(), messages);
        }
    }

    for payload in &graph.payloads {
        if !is_relative_payload_name(&payload.name) {
            messages.report(message::payload_name_not_relative(
                payload.source.clone(),
                &payload.name,
            ));
        }
    }
}

/// Structural condition check: the engine parses the full grammar at
/// install time, but unbalanced quoting or parenthesization is always an
/// authoring bug worth failing the build for.
fn check_condition(
    condition: &str,
    element: &str,
    source: Option<crate::message::SourceLocation>,
    messages: &mut Messages,
) {
    if let Err(reason) = scan_condition(condition) {
        messages.report(message::invalid_condition(
            source, element, condition, reason,
        ));
    }
}

fn scan_condition(condition: &str) -> Result<(), &'static str> {
    if condition.trim().is_empty() {
        return Err("condition is empty");
    }

    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for c in condition.chars() {
        match quote {
            Some(open) => {
                if c == open {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => quote = Some(c),
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth < 0 {
                        return Err("unbalanced parentheses");
                    }
                }
                _ => {}
            },
        }
    }
    if quote.is_some() {
        return Err("unterminated string literal");
    }
    if depth != 0 {
        return Err("unbalanced parentheses");
    }
    Ok(())
}

fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn is_reserved_variable(name: &str) -> bool {
    name.starts_with(RESERVED_PREFIX) || BUILTIN_VARIABLES.contains(&name)
}

/// MSI property names allow letters, digits, underscore and dot, and must
/// contain at least one letter.
fn is_valid_msi_property_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        && name.chars().any(|c| c.is_ascii_alphabetic())
        && !name.chars().next().unwrap_or('0').is_ascii_digit()
}

/// Payload names must be relative and must not traverse outside the layout
/// root.
fn is_relative_payload_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let normalized = name.replace('\\', "/");
    if normalized.starts_with('/') || normalized.contains(':') {
        return false;
    }
    !normalized.split('/').any(|part| part == "..")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{PackageSymbol, PackageType, PayloadSymbol, VariableSymbol};

    fn validated(graph: &SymbolGraph) -> Messages {
        let mut messages = Messages::new();
        validate_graph(graph, &mut messages);
        messages
    }

    #[test]
    fn clean_graph_passes() {
        let mut graph = SymbolGraph::default();
        let mut package = PackageSymbol::new("App", PackageType::Exe);
        package.per_machine = Some(true);
        package.install_condition = Some("VersionNT >= v6.1 AND (x = \"1\")".into());
        graph.packages.push(package);
        graph
            .variables
            .push(VariableSymbol::new("MyVariable", Some("1".into())));
        graph
            .payloads
            .push(PayloadSymbol::new("P", "bin/tool.exe", "build/tool.exe"));

        assert!(!validated(&graph).has_errors());
    }

    #[test]
    fn unbalanced_condition_is_reported_with_element() {
        let mut graph = SymbolGraph::default();
        let mut package = PackageSymbol::new("App", PackageType::Msi);
        package.per_machine = Some(true);
        package.install_condition = Some("(a AND b".into());
        graph.packages.push(package);

        let messages = validated(&graph);
        assert!(messages.has_errors());
        let report = &messages.all()[0];
        assert_eq!(message::INVALID_CONDITION, report.id);
        assert!(report.text.contains("MsiPackage"));
        assert!(report.text.contains("unbalanced parentheses"));
    }

    #[test]
    fn unterminated_quote_is_reported() {
        let mut graph = SymbolGraph::default();
        let mut package = PackageSymbol::new("App", PackageType::Exe);
        package.per_machine = Some(false);
        package.repair_condition = Some("name = \"unclosed".into());
        graph.packages.push(package);

        let messages = validated(&graph);
        assert!(messages
            .all()
            .iter()
            .any(|m| m.text.contains("unterminated string literal")));
    }

    #[test]
    fn reserved_and_malformed_variable_names_are_rejected() {
        let mut graph = SymbolGraph::default();
        graph
            .variables
            .push(VariableSymbol::new("WixBundleSecret", None));
        graph
            .variables
            .push(VariableSymbol::new("1stVariable", None));
        graph
            .variables
            .push(VariableSymbol::new("RebootPending", None));

        let messages = validated(&graph);
        assert_eq!(3, messages.error_count());
        assert!(messages
            .all()
            .iter()
            .any(|m| m.id == message::RESERVED_VARIABLE_NAME));
        assert!(messages
            .all()
            .iter()
            .any(|m| m.id == message::INVALID_VARIABLE_NAME));
    }

    #[test]
    fn unresolved_per_machine_scope_fails() {
        let mut graph = SymbolGraph::default();
        graph.packages.push(PackageSymbol::new("App", PackageType::Exe));

        let messages = validated(&graph);
        assert!(messages
            .all()
            .iter()
            .any(|m| m.id == message::PER_MACHINE_UNRESOLVED));
    }

    #[test]
    fn escaping_payload_names_fail() {
        let mut graph = SymbolGraph::default();
        graph
            .payloads
            .push(PayloadSymbol::new("P1", "../outside.dll", "x"));
        graph
            .payloads
            .push(PayloadSymbol::new("P2", "C:/absolute.dll", "x"));
        graph
            .payloads
            .push(PayloadSymbol::new("P3", "/rooted.dll", "x"));

        let messages = validated(&graph);
        assert_eq!(3, messages.error_count());
        assert!(messages
            .all()
            .iter()
            .all(|m| m.id == message::PAYLOAD_NAME_NOT_RELATIVE));
    }
}
