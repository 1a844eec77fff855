//! The installer-database reader seam.
//!
//! Reading rows out of an already-built Windows Installer package requires
//! the native database engine, which lives outside this crate. The binder
//! only ever *pulls rows*: hosts hand it a [`DatabaseOpener`], harvesters
//! query through [`InstallerDatabase`], and every installer-specific
//! semantic (flag decoding, rollups, scope derivation) stays on this side
//! of the seam. Tests drive the harvesters with in-memory fakes.

use crate::error::DatabaseError;
use std::path::Path;

/// Result alias for reader operations.
pub type DbResult<T> = std::result::Result<T, DatabaseError>;

/// Summary-information stream of an installer database.
#[derive(Debug, Clone, Default)]
pub struct SummaryInformation {
    /// Platform and language list, `platform;lang,lang`.
    pub template: String,
    /// Word-count bit flags (filenames, compression, privileges).
    pub word_count: i32,
    /// Revision GUID: package code for MSI, patch code for MSP.
    pub revision: String,
}

impl SummaryInformation {
    /// True when the package source keeps long file names.
    pub fn long_filenames(&self) -> bool {
        self.word_count & 1 == 0
    }

    /// True when the package source is compressed by default.
    pub fn compressed(&self) -> bool {
        self.word_count & 2 == 2
    }

    /// True when the package defaults to per-machine scope.
    pub fn per_machine(&self) -> bool {
        self.word_count & 8 == 0
    }

    /// Platform tag before the first `;` of the template.
    pub fn platform(&self) -> &str {
        self.template.split(';').next().unwrap_or_default()
    }

    /// True when the platform tag names a 64-bit image.
    pub fn win64(&self) -> bool {
        !matches!(self.platform(), "" | "Intel" | "Intel64")
    }
}

/// One row of the Upgrade table.
#[derive(Debug, Clone)]
pub struct UpgradeRow {
    /// UpgradeCode the row relates to.
    pub upgrade_code: String,
    /// Minimum related version.
    pub version_min: Option<String>,
    /// Maximum related version.
    pub version_max: Option<String>,
    /// Semicolon-separated language list.
    pub language: Option<String>,
    /// msidbUpgradeAttributes bit flags.
    pub attributes: i32,
}

/// One row of the Feature table.
#[derive(Debug, Clone)]
pub struct FeatureRow {
    /// Feature id.
    pub feature: String,
    /// Parent feature, when nested.
    pub parent: Option<String>,
    /// Feature title.
    pub title: Option<String>,
}

/// One row of the FeatureComponents table.
#[derive(Debug, Clone)]
pub struct FeatureComponentRow {
    /// Feature id.
    pub feature: String,
    /// Component id.
    pub component: String,
}

/// One row of the File table.
#[derive(Debug, Clone)]
pub struct FileRow {
    /// File id.
    pub file: String,
    /// Owning component id.
    pub component: String,
    /// `short|long` file name.
    pub file_name: String,
    /// File size in bytes.
    pub file_size: u64,
    /// msidbFileAttributes bit flags.
    pub attributes: i32,
}

impl FileRow {
    const NONCOMPRESSED: i32 = 0x2000;
    const COMPRESSED: i32 = 0x4000;

    /// True when the file travels outside the package cabinets, either
    /// explicitly or because the package itself is uncompressed.
    pub fn is_external(&self, package_compressed: bool) -> bool {
        if self.attributes & Self::NONCOMPRESSED != 0 {
            true
        } else if self.attributes & Self::COMPRESSED != 0 {
            false
        } else {
            !package_compressed
        }
    }

    /// Long file name half of the `short|long` pair.
    pub fn long_name(&self) -> &str {
        self.file_name
            .rsplit('|')
            .next()
            .unwrap_or(&self.file_name)
    }
}

/// One row of the Media table.
#[derive(Debug, Clone)]
pub struct MediaRow {
    /// Disk id.
    pub disk_id: i32,
    /// Cabinet name; a leading `#` marks an embedded cabinet.
    pub cabinet: Option<String>,
}

/// One row of the Component table.
#[derive(Debug, Clone)]
pub struct ComponentRow {
    /// Component id.
    pub component: String,
    /// Directory the component installs into.
    pub directory: String,
}

/// One row of the Directory table.
#[derive(Debug, Clone)]
pub struct DirectoryRow {
    /// Directory id.
    pub directory: String,
    /// Parent directory id; `None` or self-reference at the root.
    pub parent: Option<String>,
    /// `short|long` default directory name.
    pub default_dir: String,
}

impl DirectoryRow {
    /// Long source-name half of the DefaultDir column.
    ///
    /// DefaultDir is `target:source`, each half `short|long`; the source
    /// half falls back to the target half when absent.
    pub fn source_name(&self) -> &str {
        let half = self
            .default_dir
            .split(':')
            .nth(1)
            .unwrap_or_else(|| self.default_dir.split(':').next().unwrap_or_default());
        half.rsplit('|').next().unwrap_or(half)
    }
}

/// One row of a dependency-provider table.
#[derive(Debug, Clone)]
pub struct DependencyRow {
    /// Provider key.
    pub provider_key: String,
    /// Provider version.
    pub version: Option<String>,
    /// Provider display name.
    pub display_name: Option<String>,
}

/// Read-only access to one open installer database.
///
/// Default implementations return "absent" so fakes and simple hosts only
/// implement the tables their packages actually carry.
pub trait InstallerDatabase {
    /// Reads the summary-information stream.
    fn summary_information(&self) -> DbResult<SummaryInformation>;

    /// True when the named table exists.
    fn has_table(&self, _table: &str) -> bool {
        false
    }

    /// Reads a value from the Property table.
    fn property(&self, _name: &str) -> DbResult<Option<String>> {
        Ok(None)
    }

    /// Reads a value from the patch metadata table.
    fn patch_metadata(&self, _name: &str) -> DbResult<Option<String>> {
        Ok(None)
    }

    /// Rows of the Upgrade table.
    fn upgrade_rows(&self) -> DbResult<Vec<UpgradeRow>> {
        Ok(Vec::new())
    }

    /// Rows of the Feature table.
    fn feature_rows(&self) -> DbResult<Vec<FeatureRow>> {
        Ok(Vec::new())
    }

    /// Rows of the FeatureComponents table.
    fn feature_component_rows(&self) -> DbResult<Vec<FeatureComponentRow>> {
        Ok(Vec::new())
    }

    /// Rows of the File table.
    fn file_rows(&self) -> DbResult<Vec<FileRow>> {
        Ok(Vec::new())
    }

    /// Rows of the Media table.
    fn media_rows(&self) -> DbResult<Vec<MediaRow>> {
        Ok(Vec::new())
    }

    /// Rows of the Component table.
    fn component_rows(&self) -> DbResult<Vec<ComponentRow>> {
        Ok(Vec::new())
    }

    /// Rows of the Directory table.
    fn directory_rows(&self) -> DbResult<Vec<DirectoryRow>> {
        Ok(Vec::new())
    }

    /// Rows of the named dependency-provider table.
    fn dependency_rows(&self, _table: &str) -> DbResult<Vec<DependencyRow>> {
        Ok(Vec::new())
    }

    /// The patch applicability XML, for patch databases.
    fn applicability_xml(&self) -> DbResult<Option<String>> {
        Ok(None)
    }
}

/// Opens installer databases on behalf of the binder.
pub trait DatabaseOpener {
    /// Opens an installer package read-only.
    fn open_package(&self, path: &Path) -> DbResult<Box<dyn InstallerDatabase + '_>>;

    /// Opens an installer patch read-only.
    fn open_patch(&self, path: &Path) -> DbResult<Box<dyn InstallerDatabase + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_bits_decode() {
        let info = SummaryInformation {
            template: "x64;1033".into(),
            word_count: 2,
            revision: String::new(),
        };
        assert!(info.long_filenames());
        assert!(info.compressed());
        assert!(info.per_machine());
        assert!(info.win64());

        let per_user = SummaryInformation {
            template: "Intel;0".into(),
            word_count: 8 | 1,
            revision: String::new(),
        };
        assert!(!per_user.long_filenames());
        assert!(!per_user.compressed());
        assert!(!per_user.per_machine());
        assert!(!per_user.win64());
    }

    #[test]
    fn file_row_externality_follows_package_default() {
        let plain = FileRow {
            file: "f1".into(),
            component: "c1".into(),
            file_name: "APP~1.EXE|application.exe".into(),
            file_size: 10,
            attributes: 0,
        };
        assert!(!plain.is_external(true));
        assert!(plain.is_external(false));
        assert_eq!("application.exe", plain.long_name());

        let forced = FileRow {
            attributes: 0x2000,
            ..plain.clone()
        };
        assert!(forced.is_external(true));

        let embedded = FileRow {
            attributes: 0x4000,
            ..plain
        };
        assert!(!embedded.is_external(false));
    }

    #[test]
    fn directory_source_name_prefers_source_half() {
        let row = DirectoryRow {
            directory: "BinDir".into(),
            parent: Some("INSTALLDIR".into()),
            default_dir: "BIN|binaries:SRC|source".into(),
        };
        assert_eq!("source", row.source_name());

        let target_only = DirectoryRow {
            directory: "BinDir".into(),
            parent: None,
            default_dir: "BIN|binaries".into(),
        };
        assert_eq!("binaries", target_only.source_name());
    }
}
