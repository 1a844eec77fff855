//! MSP package harvesting.
//!
//! Patches identify themselves by the patch code in summary information and
//! carry an applicability blob describing which products they target. The
//! blob is normalized (sequence data stripped) before it lands in the
//! manifest, and target codes only count when the patch explicitly marks
//! them for validation; otherwise the patch is flagged as targeting
//! unspecified products, which disables target aggregation bundle-wide.

use crate::cacheid::CacheIdentity;
use crate::error::Result;
use crate::message::Messages;
use crate::reader::DatabaseOpener;
use crate::symbol::{PatchTargetCodeSymbol, PatchTargetKind, PayloadSymbol, SymbolGraph};
use quick_xml::events::Event;
use quick_xml::{Reader, Writer};
use std::io::Cursor;

pub(super) fn harvest(
    graph: &mut SymbolGraph,
    package_id: &str,
    payload: &PayloadSymbol,
    opener: &dyn DatabaseOpener,
    messages: &mut Messages,
) -> Result<()> {
    let db = opener.open_patch(&payload.source_path)?;
    let summary = db.summary_information()?;
    let patch_code = summary.revision.split(';').next().unwrap_or_default().to_string();

    let display_name = db.patch_metadata("DisplayName")?;
    let description = db.patch_metadata("Description")?;
    let manufacturer = db.patch_metadata("ManufacturerName")?;

    super::fill_package_from_payload(graph, package_id, payload);
    if let Some(package) = graph.packages.iter_mut().find(|p| p.id == package_id) {
        if package.display_name.is_none() {
            package.display_name = display_name;
        }
        if package.description.is_none() {
            package.description = description;
        }
    }

    super::assign_cache_id(
        graph,
        package_id,
        payload,
        CacheIdentity::Code(&patch_code),
        messages,
    );

    let applicability = db.applicability_xml()?;
    let (patch_xml, targets, unspecified) = match applicability.as_deref() {
        Some(xml) => normalize_applicability(xml)?,
        None => (None, Vec::new(), true),
    };

    for target in targets {
        let duplicate = graph
            .patch_target_codes
            .iter()
            .any(|t| t.target_code == target.target_code);
        if !duplicate {
            graph.patch_target_codes.push(target);
        }
    }
    if unspecified {
        log::debug!("patch {package_id} targets unspecified products");
        graph.unspecified_patch_targets = true;
    }

    if let Some(msp) = graph.msp_packages.iter_mut().find(|m| m.id == package_id) {
        msp.patch_code = Some(patch_code);
        msp.manufacturer = manufacturer;
        msp.patch_xml = patch_xml;
        msp.target_unspecified = unspecified;
    }
    Ok(())
}

/// Strips sequence-data nodes from the applicability XML and collects the
/// validated target codes.
///
/// Returns the normalized XML, the target codes, and whether any target
/// product declined validation (making the patch's targets unspecified).
fn normalize_applicability(
    xml: &str,
) -> Result<(Option<String>, Vec<PatchTargetCodeSymbol>, bool)> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut targets = Vec::new();
    let mut unspecified = false;

    // Depth inside a SequenceData subtree; everything below it is dropped.
    let mut sequence_depth = 0u32;
    // Element whose text is being captured, with its validation state.
    let mut capturing: Option<(PatchTargetKind, bool)> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(crate::error::Error::Xml)?;
        match &event {
            Event::Start(start) => {
                let local = start.local_name();
                if local.as_ref() == b"SequenceData" {
                    sequence_depth += 1;
                    continue;
                }
                if sequence_depth > 0 {
                    sequence_depth += 1;
                    continue;
                }
                match local.as_ref() {
                    b"TargetProductCode" => {
                        let validate = attribute_is_true(start, b"Validate")?;
                        capturing = Some((PatchTargetKind::Product, validate));
                    }
                    b"UpgradeCode" => {
                        capturing = Some((PatchTargetKind::Upgrade, true));
                    }
                    _ => {}
                }
                writer.write_event(event.borrow())?;
            }
            Event::Empty(start) => {
                if sequence_depth == 0 && start.local_name().as_ref() != b"SequenceData" {
                    writer.write_event(event.borrow())?;
                }
            }
            Event::End(_) => {
                if sequence_depth > 0 {
                    sequence_depth -= 1;
                    continue;
                }
                capturing = None;
                writer.write_event(event.borrow())?;
            }
            Event::Text(text) => {
                if sequence_depth > 0 {
                    continue;
                }
                if let Some((kind, validate)) = capturing {
                    let code = text
                        .unescape()
                        .map_err(crate::error::Error::Xml)?
                        .trim()
                        .to_string();
                    if !code.is_empty() {
                        if validate {
                            targets.push(PatchTargetCodeSymbol {
                                target_code: code,
                                kind,
                            });
                        } else {
                            unspecified = true;
                        }
                    }
                }
                writer.write_event(event.borrow())?;
            }
            Event::Eof => break,
            _ => {
                if sequence_depth == 0 {
                    writer.write_event(event.borrow())?;
                }
            }
        }
    }

    let bytes = writer.into_inner().into_inner();
    let normalized = String::from_utf8(bytes)
        .map_err(|e| crate::error::Error::GenericError(format!("applicability not UTF-8: {e}")))?;
    Ok((Some(normalized), targets, unspecified))
}

fn attribute_is_true(
    start: &quick_xml::events::BytesStart<'_>,
    name: &[u8],
) -> Result<bool> {
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| {
            crate::error::Error::GenericError(format!("bad applicability attribute: {e}"))
        })?;
        if attribute.key.local_name().as_ref() == name {
            let value = attribute
                .unescape_value()
                .map_err(crate::error::Error::Xml)?;
            return Ok(value.eq_ignore_ascii_case("true"));
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DatabaseError;
    use crate::reader::{DbResult, InstallerDatabase, SummaryInformation};
    use crate::symbol::{MspPackageSymbol, PackageSymbol, PackageType};
    use std::collections::HashMap;
    use std::path::Path;

    const PATCH_CODE: &str = "{AAAAAAAA-BBBB-CCCC-DDDD-EEEEEEEEEEEE}";

    struct FakePatch {
        metadata: HashMap<String, String>,
        applicability: Option<String>,
    }

    impl InstallerDatabase for FakePatch {
        fn summary_information(&self) -> DbResult<SummaryInformation> {
            Ok(SummaryInformation {
                template: String::new(),
                word_count: 0,
                revision: format!("{PATCH_CODE};additional"),
            })
        }
        fn patch_metadata(&self, name: &str) -> DbResult<Option<String>> {
            Ok(self.metadata.get(name).cloned())
        }
        fn applicability_xml(&self) -> DbResult<Option<String>> {
            Ok(self.applicability.clone())
        }
    }

    struct FakeOpener(Option<String>);

    impl DatabaseOpener for FakeOpener {
        fn open_package(&self, path: &Path) -> DbResult<Box<dyn InstallerDatabase + '_>> {
            Err(DatabaseError::Open {
                path: path.to_path_buf(),
                reason: "patches only".into(),
            })
        }
        fn open_patch(&self, _path: &Path) -> DbResult<Box<dyn InstallerDatabase + '_>> {
            let mut metadata = HashMap::new();
            metadata.insert("DisplayName".to_string(), "Sample Hotfix".to_string());
            metadata.insert("ManufacturerName".to_string(), "Sample Co".to_string());
            Ok(Box::new(FakePatch {
                metadata,
                applicability: self.0.clone(),
            }))
        }
    }

    fn graph_with_msp() -> SymbolGraph {
        let mut graph = SymbolGraph::default();
        graph
            .packages
            .push(PackageSymbol::new("Hotfix", PackageType::Msp));
        graph.msp_packages.push(MspPackageSymbol {
            id: "Hotfix".into(),
            patch_code: None,
            manufacturer: None,
            patch_xml: None,
            target_unspecified: false,
            source: None,
        });
        graph
    }

    fn run(applicability: Option<&str>) -> (SymbolGraph, Messages) {
        let mut graph = graph_with_msp();
        let mut messages = Messages::new();
        let payload = PayloadSymbol::new("HotfixPayload", "hotfix.msp", "build/hotfix.msp");
        harvest(
            &mut graph,
            "Hotfix",
            &payload,
            &FakeOpener(applicability.map(String::from)),
            &mut messages,
        )
        .unwrap();
        (graph, messages)
    }

    #[test]
    fn patch_code_becomes_identity_and_cache_id() {
        let xml = format!(
            "<MsiPatch><TargetProduct><TargetProductCode Validate=\"true\">{code}</TargetProductCode></TargetProduct></MsiPatch>",
            code = "{11111111-1111-1111-1111-111111111111}"
        );
        let (graph, messages) = run(Some(&xml));

        assert!(!messages.has_errors());
        let msp = &graph.msp_packages[0];
        assert_eq!(Some(PATCH_CODE), msp.patch_code.as_deref());
        assert_eq!(Some("Sample Co"), msp.manufacturer.as_deref());
        assert!(!msp.target_unspecified);
        assert_eq!(Some(PATCH_CODE), graph.packages[0].cache_id.as_deref());
        assert_eq!(
            Some("Sample Hotfix"),
            graph.packages[0].display_name.as_deref()
        );
    }

    #[test]
    fn validated_targets_are_recorded_and_sequence_data_is_stripped() {
        let xml = "<MsiPatch>\
            <TargetProduct>\
            <TargetProductCode Validate=\"true\">{11111111-1111-1111-1111-111111111111}</TargetProductCode>\
            <UpgradeCode>{22222222-2222-2222-2222-222222222222}</UpgradeCode>\
            <SequenceData><PatchSequence>1.0</PatchSequence></SequenceData>\
            </TargetProduct>\
            </MsiPatch>";
        let (graph, _) = run(Some(xml));

        assert_eq!(2, graph.patch_target_codes.len());
        assert!(graph
            .patch_target_codes
            .iter()
            .any(|t| t.kind == PatchTargetKind::Product
                && t.target_code == "{11111111-1111-1111-1111-111111111111}"));
        assert!(graph
            .patch_target_codes
            .iter()
            .any(|t| t.kind == PatchTargetKind::Upgrade));
        assert!(!graph.unspecified_patch_targets);

        let normalized = graph.msp_packages[0].patch_xml.as_deref().unwrap();
        assert!(!normalized.contains("SequenceData"));
        assert!(!normalized.contains("PatchSequence"));
        assert!(normalized.contains("TargetProductCode"));
    }

    #[test]
    fn unvalidated_target_marks_the_patch_unspecified() {
        let xml = "<MsiPatch>\
            <TargetProduct>\
            <TargetProductCode Validate=\"false\">{11111111-1111-1111-1111-111111111111}</TargetProductCode>\
            </TargetProduct>\
            </MsiPatch>";
        let (graph, _) = run(Some(xml));

        assert!(graph.patch_target_codes.is_empty());
        assert!(graph.unspecified_patch_targets);
        assert!(graph.msp_packages[0].target_unspecified);
    }

    #[test]
    fn missing_applicability_means_unspecified_targets() {
        let (graph, _) = run(None);
        assert!(graph.unspecified_patch_targets);
        assert!(graph.msp_packages[0].patch_xml.is_none());
    }
}
