//! Shared scenario fixtures: a synthetic bootstrapper stub and in-memory
//! installer databases.

use kodegen_bundler_burn::error::DatabaseError;
use kodegen_bundler_burn::reader::{
    DatabaseOpener, DbResult, InstallerDatabase, SummaryInformation,
};
use kodegen_bundler_burn::stub;
use std::collections::HashMap;
use std::path::Path;

/// Builds a minimal PE32+ stub image with a control section sized for
/// eight container entries.
pub fn fake_stub_bytes() -> Vec<u8> {
    let nt_offset = 0x80usize;
    let optional_size = 240usize; // PE32+ with 16 data directories
    let section_table = nt_offset + 24 + optional_size;
    let raw_pointer = 0x200usize;
    let raw_size = 48 + 8 * 4;
    let stub_size = (raw_pointer + raw_size) as u32;

    let mut image = vec![0u8; stub_size as usize];
    image[0] = b'M';
    image[1] = b'Z';
    image[0x3c..0x40].copy_from_slice(&(nt_offset as u32).to_le_bytes());

    image[nt_offset..nt_offset + 4].copy_from_slice(&0x0000_4550u32.to_le_bytes()); // PE\0\0
    image[nt_offset + 4..nt_offset + 6].copy_from_slice(&0x8664u16.to_le_bytes());
    image[nt_offset + 6..nt_offset + 8].copy_from_slice(&1u16.to_le_bytes());
    image[nt_offset + 20..nt_offset + 22].copy_from_slice(&(optional_size as u16).to_le_bytes());

    let opt = nt_offset + 24;
    image[opt..opt + 2].copy_from_slice(&0x020bu16.to_le_bytes());

    image[section_table..section_table + 8].copy_from_slice(stub::SECTION_NAME);
    image[section_table + 16..section_table + 20]
        .copy_from_slice(&(raw_size as u32).to_le_bytes());
    image[section_table + 20..section_table + 24]
        .copy_from_slice(&(raw_pointer as u32).to_le_bytes());

    let section = raw_pointer;
    image[section..section + 4].copy_from_slice(&stub::SECTION_MAGIC.to_le_bytes());
    image[section + 4..section + 8].copy_from_slice(&stub::SECTION_VERSION.to_le_bytes());
    image[section + 24..section + 28].copy_from_slice(&stub_size.to_le_bytes());
    image[section + 40..section + 44].copy_from_slice(&stub::FORMAT_CABINET.to_le_bytes());
    image
}

/// In-memory MSI database.
#[derive(Clone, Default)]
pub struct FakeMsiDb {
    pub properties: HashMap<String, String>,
    pub word_count: i32,
    pub template: String,
}

impl FakeMsiDb {
    pub fn with_identity(product_code: &str, version: &str) -> Self {
        let mut properties = HashMap::new();
        properties.insert("ProductCode".into(), product_code.into());
        properties.insert("ProductVersion".into(), version.into());
        properties.insert("ProductName".into(), "Scenario Product".into());
        properties.insert("ALLUSERS".into(), "1".into());
        Self {
            properties,
            word_count: 2, // compressed source
            template: "x64;1033".into(),
        }
    }
}

impl InstallerDatabase for FakeMsiDb {
    fn summary_information(&self) -> DbResult<SummaryInformation> {
        Ok(SummaryInformation {
            template: self.template.clone(),
            word_count: self.word_count,
            revision: "{00000000-0000-0000-0000-0000000000AA}".into(),
        })
    }
    fn property(&self, name: &str) -> DbResult<Option<String>> {
        Ok(self.properties.get(name).cloned())
    }
}

/// In-memory MSP database.
#[derive(Clone)]
pub struct FakeMspDb {
    pub patch_code: String,
    pub target_product_code: String,
}

impl InstallerDatabase for FakeMspDb {
    fn summary_information(&self) -> DbResult<SummaryInformation> {
        Ok(SummaryInformation {
            template: String::new(),
            word_count: 0,
            revision: self.patch_code.clone(),
        })
    }
    fn patch_metadata(&self, name: &str) -> DbResult<Option<String>> {
        Ok(match name {
            "DisplayName" => Some("Scenario Patch".into()),
            _ => None,
        })
    }
    fn applicability_xml(&self) -> DbResult<Option<String>> {
        Ok(Some(format!(
            "<MsiPatch><TargetProduct><TargetProductCode Validate=\"true\">{}</TargetProductCode></TargetProduct></MsiPatch>",
            self.target_product_code
        )))
    }
}

/// Routes database opens by file name.
#[derive(Default)]
pub struct ScenarioOpener {
    pub packages: HashMap<String, FakeMsiDb>,
    pub patches: HashMap<String, FakeMspDb>,
}

impl ScenarioOpener {
    fn file_name(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl DatabaseOpener for ScenarioOpener {
    fn open_package(&self, path: &Path) -> DbResult<Box<dyn InstallerDatabase + '_>> {
        self.packages
            .get(&Self::file_name(path))
            .map(|db| Box::new(db.clone()) as Box<dyn InstallerDatabase>)
            .ok_or_else(|| DatabaseError::Open {
                path: path.to_path_buf(),
                reason: "no such package fixture".into(),
            })
    }
    fn open_patch(&self, path: &Path) -> DbResult<Box<dyn InstallerDatabase + '_>> {
        self.patches
            .get(&Self::file_name(path))
            .map(|db| Box::new(db.clone()) as Box<dyn InstallerDatabase>)
            .ok_or_else(|| DatabaseError::Open {
                path: path.to_path_buf(),
                reason: "no such patch fixture".into(),
            })
    }
}
