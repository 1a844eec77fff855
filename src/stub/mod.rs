//! Bootstrapper stub control-section codec.
//!
//! A bundle executable is a generic PE stub with a fixed-magic section that
//! records the bundle code, the stub's own size, re-signing bookkeeping and
//! a table of appended-container sizes. This module locates that section,
//! decodes and encodes its fields, and appends container bytes to the image,
//! keeping the section table in sync.
//!
//! The codec is stateless over an abstract seekable stream: [`Stub::open`]
//! decodes the fields once, read-only accessors never touch the stream
//! again, and the mutating operations are only available when the stream is
//! also writable. Every offset is validated against the stream length before
//! it is seeked to, so a truncated or hostile image fails cleanly instead of
//! panicking mid-read.

use crate::error::{ErrorExt, Result, StubError};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Name of the control section inside the stub image.
pub const SECTION_NAME: &[u8; 8] = b".wixburn";

/// Magic value opening the control section.
pub const SECTION_MAGIC: u32 = 0x00f1_4300;

/// Control section layout version this binder reads and writes.
pub const SECTION_VERSION: u32 = 0x0000_0002;

/// Container format tag for the cabinet family, the only supported format.
pub const FORMAT_CABINET: u32 = 1;

/// PE machine type for x86.
pub const MACHINE_I386: u16 = 0x014c;
/// PE machine type for x64.
pub const MACHINE_AMD64: u16 = 0x8664;
/// PE machine type for arm64.
pub const MACHINE_ARM64: u16 = 0xaa64;

// Field offsets relative to the start of the section's raw data.
const OFFSET_MAGIC: u64 = 0;
const OFFSET_VERSION: u64 = 4;
const OFFSET_BUNDLE_CODE: u64 = 8;
const OFFSET_STUB_SIZE: u64 = 24;
const OFFSET_ORIGINAL_CHECKSUM: u64 = 28;
const OFFSET_ORIGINAL_SIGNATURE_OFFSET: u64 = 32;
const OFFSET_ORIGINAL_SIGNATURE_SIZE: u64 = 36;
const OFFSET_FORMAT: u64 = 40;
const OFFSET_COUNT: u64 = 44;
const OFFSET_CONTAINERS: u64 = 48;

/// Smallest raw section that can describe a bundle: the fixed header plus
/// the UX container's size entry.
const MIN_SECTION_SIZE: u32 = (OFFSET_CONTAINERS as u32) + 4;

const DOS_MAGIC: u16 = 0x5a4d; // "MZ"
const DOS_NT_OFFSET: u64 = 0x3c;
const NT_SIGNATURE: u32 = 0x0000_4550; // "PE\0\0"
const OPTIONAL_MAGIC_PE32: u16 = 0x010b;
const OPTIONAL_MAGIC_PE32_PLUS: u16 = 0x020b;
const SECTION_HEADER_SIZE: u64 = 40;

/// Which logical slot a container is appended into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerSlot {
    /// Slot 0; must be appended before anything else.
    Ux,
    /// Slots 1..N in append order.
    Attached,
}

/// Decoded control-section fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionFields {
    /// Bundle code stamped into the stub.
    pub bundle_code: Uuid,
    /// Size of the stub image itself, before any appended container.
    pub stub_size: u32,
    /// PE checksum remembered before re-signing.
    pub original_checksum: u32,
    /// Certificate table offset remembered before re-signing.
    pub original_signature_offset: u32,
    /// Certificate table size remembered before re-signing.
    pub original_signature_size: u32,
    /// Sizes of appended containers; the first entry is the UX container.
    pub container_sizes: Vec<u32>,
}

#[derive(Debug, Clone, Copy)]
struct SectionInfo {
    raw_pointer: u64,
    raw_size: u32,
}

#[derive(Debug, Clone, Copy)]
struct PeInfo {
    machine: u16,
    checksum_offset: u64,
    cert_table_offset: u64,
    /// Current certificate table entry (offset, size) from the PE header.
    signature_offset: u32,
    signature_size: u32,
}

/// A stub image with its control section decoded.
///
/// Read-only operations need `S: Read + Seek`; mutations additionally
/// require `S: Write`. Dropping the value releases the stream.
#[derive(Debug)]
pub struct Stub<S> {
    stream: S,
    stream_len: u64,
    path: PathBuf,
    section: SectionInfo,
    pe: PeInfo,
    fields: SectionFields,
}

/// Opens a stub file read-only.
pub fn open_read(path: &Path) -> Result<Stub<File>> {
    let file = File::open(path).fs_context("opening stub executable", path)?;
    Stub::open(file, path)
}

/// Opens a stub file for in-place mutation.
pub fn open_update(path: &Path) -> Result<Stub<File>> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .fs_context("opening stub executable for update", path)?;
    Stub::open(file, path)
}

impl<S: Read + Seek> Stub<S> {
    /// Decodes the control section from an already-open stream.
    ///
    /// `path` is only used in diagnostics; the stream is the source of truth.
    pub fn open(mut stream: S, path: &Path) -> Result<Self> {
        let stream_len = stream.seek(SeekFrom::End(0))?;
        let pe = locate_pe(&mut stream, stream_len, path)?;
        let section = locate_section(&mut stream, stream_len, path, &pe)?;
        let fields = decode_section(&mut stream, path, section)?;

        Ok(Self {
            stream,
            stream_len,
            path: path.to_path_buf(),
            section,
            pe,
            fields,
        })
    }

    /// Decoded section fields.
    pub fn fields(&self) -> &SectionFields {
        &self.fields
    }

    /// Machine type from the PE file header.
    pub fn machine(&self) -> u16 {
        self.pe.machine
    }

    /// True when the image targets a 64-bit machine.
    pub fn is_win64(&self) -> bool {
        self.pe.machine != MACHINE_I386
    }

    /// Number of containers currently appended.
    pub fn container_count(&self) -> u32 {
        self.fields.container_sizes.len() as u32
    }

    /// Offset where appended container bytes begin, past the engine.
    ///
    /// The engine is the stub plus the UX container; when the image was
    /// signed the recorded signature bounds take precedence because the
    /// signature bytes sit between the stub and the attached containers.
    pub fn engine_size(&self) -> u64 {
        if self.fields.original_signature_offset != 0 {
            u64::from(self.fields.original_signature_offset)
                + u64::from(self.fields.original_signature_size)
        } else if self.pe.signature_offset != 0 && self.fields.container_sizes.len() < 2 {
            u64::from(self.pe.signature_offset) + u64::from(self.pe.signature_size)
        } else {
            u64::from(self.fields.stub_size)
                + u64::from(self.fields.container_sizes.first().copied().unwrap_or(0))
        }
    }

    /// File offset of the container in the given slot.
    pub fn container_offset(&self, slot: usize) -> u64 {
        if slot == 0 {
            u64::from(self.fields.stub_size)
        } else {
            let mut offset = self.engine_size();
            for size in self.fields.container_sizes.iter().take(slot).skip(1) {
                offset += u64::from(*size);
            }
            offset
        }
    }

    /// Copies the container in the given slot into `target`.
    pub fn read_container(&mut self, slot: usize, target: &mut impl Write) -> Result<u64> {
        let size = u64::from(
            self.fields
                .container_sizes
                .get(slot)
                .copied()
                .unwrap_or_default(),
        );
        let offset = self.container_offset(slot);
        self.stream.seek(SeekFrom::Start(offset))?;
        let copied = io::copy(&mut (&mut self.stream).take(size), target)?;
        Ok(copied)
    }

    fn seek_section(&mut self, field_offset: u64) -> Result<()> {
        self.stream
            .seek(SeekFrom::Start(self.section.raw_pointer + field_offset))?;
        Ok(())
    }
}

impl<S: Read + Write + Seek> Stub<S> {
    /// Stamps the bundle code into the control section.
    pub fn set_bundle_code(&mut self, bundle_code: Uuid) -> Result<()> {
        self.seek_section(OFFSET_BUNDLE_CODE)?;
        self.stream.write_all(&bundle_code.to_bytes_le())?;
        self.fields.bundle_code = bundle_code;
        Ok(())
    }

    /// Records the current PE checksum and certificate table into the
    /// section, then zeroes both in the header so the image can be
    /// re-signed after mutation. May only be applied once per image.
    pub fn remember_then_zero_signature(&mut self) -> Result<()> {
        if self.fields.original_checksum != 0 || self.fields.original_signature_offset != 0 {
            return Err(StubError::SignatureAlreadyRecorded.into());
        }

        self.stream.seek(SeekFrom::Start(self.pe.checksum_offset))?;
        let checksum = self.stream.read_u32::<LittleEndian>()?;

        self.seek_section(OFFSET_ORIGINAL_CHECKSUM)?;
        self.stream.write_u32::<LittleEndian>(checksum)?;
        self.stream
            .write_u32::<LittleEndian>(self.pe.signature_offset)?;
        self.stream
            .write_u32::<LittleEndian>(self.pe.signature_size)?;

        // Zero the header copies so the stale signature no longer applies.
        self.stream.seek(SeekFrom::Start(self.pe.checksum_offset))?;
        self.stream.write_u32::<LittleEndian>(0)?;
        self.stream
            .seek(SeekFrom::Start(self.pe.cert_table_offset))?;
        self.stream.write_u32::<LittleEndian>(0)?;
        self.stream.write_u32::<LittleEndian>(0)?;

        self.fields.original_checksum = checksum;
        self.fields.original_signature_offset = self.pe.signature_offset;
        self.fields.original_signature_size = self.pe.signature_size;
        self.pe.signature_offset = 0;
        self.pe.signature_size = 0;
        Ok(())
    }

    /// Appends container bytes to the end of the image and records the size
    /// in the section table, returning the assigned slot index.
    ///
    /// The UX container must be appended first; the section's remaining
    /// capacity caps how many attached containers can follow.
    pub fn append_container(
        &mut self,
        slot: ContainerSlot,
        source: &mut impl Read,
        size: u32,
    ) -> Result<u32> {
        let count = self.fields.container_sizes.len() as u32;
        match slot {
            ContainerSlot::Ux if count != 0 => {
                return Err(StubError::UxContainerNotFirst.into());
            }
            ContainerSlot::Attached if count == 0 => {
                return Err(StubError::UxContainerNotFirst.into());
            }
            _ => {}
        }

        let max = (self.section.raw_size - OFFSET_CONTAINERS as u32) / 4;
        if count >= max {
            return Err(StubError::TooManyContainers { max }.into());
        }

        self.stream.seek(SeekFrom::End(0))?;
        let copied = io::copy(&mut source.take(u64::from(size)), &mut self.stream)?;
        if copied != u64::from(size) {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("container truncated: expected {size} bytes, copied {copied}"),
            )
            .into());
        }

        self.seek_section(OFFSET_CONTAINERS + u64::from(count) * 4)?;
        self.stream.write_u32::<LittleEndian>(size)?;
        self.seek_section(OFFSET_COUNT)?;
        self.stream.write_u32::<LittleEndian>(count + 1)?;

        self.fields.container_sizes.push(size);
        self.stream_len += u64::from(size);
        Ok(count)
    }

    /// Flushes pending writes to the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        self.stream.flush()?;
        Ok(())
    }
}

fn invalid_stub(path: &Path) -> crate::error::Error {
    StubError::InvalidStubExe {
        path: path.to_path_buf(),
    }
    .into()
}

fn checked_seek(
    stream: &mut impl Seek,
    stream_len: u64,
    offset: u64,
    need: u64,
    path: &Path,
) -> Result<()> {
    if offset.checked_add(need).is_none_or(|end| end > stream_len) {
        return Err(invalid_stub(path));
    }
    stream.seek(SeekFrom::Start(offset))?;
    Ok(())
}

fn locate_pe(stream: &mut (impl Read + Seek), stream_len: u64, path: &Path) -> Result<PeInfo> {
    checked_seek(stream, stream_len, 0, 2, path)?;
    if stream.read_u16::<LittleEndian>()? != DOS_MAGIC {
        return Err(invalid_stub(path));
    }

    checked_seek(stream, stream_len, DOS_NT_OFFSET, 4, path)?;
    let nt_offset = u64::from(stream.read_u32::<LittleEndian>()?);

    checked_seek(stream, stream_len, nt_offset, 24, path)?;
    if stream.read_u32::<LittleEndian>()? != NT_SIGNATURE {
        return Err(invalid_stub(path));
    }

    let machine = stream.read_u16::<LittleEndian>()?;
    let _section_count = stream.read_u16::<LittleEndian>()?;
    stream.seek(SeekFrom::Current(12))?; // timestamp, symbol table, symbol count
    let optional_size = u64::from(stream.read_u16::<LittleEndian>()?);
    let _characteristics = stream.read_u16::<LittleEndian>()?;

    let optional_offset = nt_offset + 24;
    checked_seek(stream, stream_len, optional_offset, optional_size, path)?;
    let optional_magic = stream.read_u16::<LittleEndian>()?;
    let cert_dir = match optional_magic {
        OPTIONAL_MAGIC_PE32 => 128,
        OPTIONAL_MAGIC_PE32_PLUS => 144,
        _ => return Err(invalid_stub(path)),
    };

    let checksum_offset = optional_offset + 64;
    let cert_table_offset = optional_offset + cert_dir;
    let (signature_offset, signature_size) = if cert_dir + 8 <= optional_size {
        checked_seek(stream, stream_len, cert_table_offset, 8, path)?;
        (
            stream.read_u32::<LittleEndian>()?,
            stream.read_u32::<LittleEndian>()?,
        )
    } else {
        (0, 0)
    };

    Ok(PeInfo {
        machine,
        checksum_offset,
        cert_table_offset,
        signature_offset,
        signature_size,
    })
}

fn locate_section(
    stream: &mut (impl Read + Seek),
    stream_len: u64,
    path: &Path,
    _pe: &PeInfo,
) -> Result<SectionInfo> {
    // Re-read the header geometry; the section table follows the optional
    // header directly.
    stream.seek(SeekFrom::Start(DOS_NT_OFFSET))?;
    let nt_offset = u64::from(stream.read_u32::<LittleEndian>()?);
    checked_seek(stream, stream_len, nt_offset + 6, 2, path)?;
    let section_count = u64::from(stream.read_u16::<LittleEndian>()?);
    checked_seek(stream, stream_len, nt_offset + 20, 2, path)?;
    let optional_size = u64::from(stream.read_u16::<LittleEndian>()?);

    let table_offset = nt_offset + 24 + optional_size;
    for index in 0..section_count {
        let header_offset = table_offset + index * SECTION_HEADER_SIZE;
        checked_seek(stream, stream_len, header_offset, SECTION_HEADER_SIZE, path)?;

        let mut name = [0u8; 8];
        stream.read_exact(&mut name)?;
        if &name != SECTION_NAME {
            continue;
        }

        stream.seek(SeekFrom::Current(8))?; // virtual size, virtual address
        let raw_size = stream.read_u32::<LittleEndian>()?;
        let raw_pointer = u64::from(stream.read_u32::<LittleEndian>()?);

        if raw_size < MIN_SECTION_SIZE {
            return Err(StubError::SectionTooSmall {
                path: path.to_path_buf(),
                size: raw_size,
            }
            .into());
        }
        checked_seek(stream, stream_len, raw_pointer, u64::from(raw_size), path)?;
        return Ok(SectionInfo {
            raw_pointer,
            raw_size,
        });
    }

    Err(StubError::MissingSection {
        path: path.to_path_buf(),
    }
    .into())
}

fn decode_section(
    stream: &mut (impl Read + Seek),
    path: &Path,
    section: SectionInfo,
) -> Result<SectionFields> {
    stream.seek(SeekFrom::Start(section.raw_pointer))?;

    let magic = stream.read_u32::<LittleEndian>()?;
    if magic != SECTION_MAGIC {
        return Err(StubError::BadSectionMagic {
            path: path.to_path_buf(),
            magic,
        }
        .into());
    }

    let version = stream.read_u32::<LittleEndian>()?;
    if version != SECTION_VERSION {
        return Err(StubError::IncompatibleVersion {
            path: path.to_path_buf(),
            version,
        }
        .into());
    }

    let mut guid = [0u8; 16];
    stream.read_exact(&mut guid)?;
    let bundle_code = Uuid::from_bytes_le(guid);

    let stub_size = stream.read_u32::<LittleEndian>()?;
    let original_checksum = stream.read_u32::<LittleEndian>()?;
    let original_signature_offset = stream.read_u32::<LittleEndian>()?;
    let original_signature_size = stream.read_u32::<LittleEndian>()?;

    let format = stream.read_u32::<LittleEndian>()?;
    if format != FORMAT_CABINET {
        return Err(StubError::UnsupportedFormat {
            path: path.to_path_buf(),
            format,
        }
        .into());
    }

    let capacity = (section.raw_size - OFFSET_CONTAINERS as u32) / 4;
    let declared = stream.read_u32::<LittleEndian>()?;
    let count = declared.min(capacity);
    let mut container_sizes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        container_sizes.push(stream.read_u32::<LittleEndian>()?);
    }

    Ok(SectionFields {
        bundle_code,
        stub_size,
        original_checksum,
        original_signature_offset,
        original_signature_size,
        container_sizes,
    })
}

/// Synthetic stub images for tests elsewhere in the crate.
#[cfg(test)]
pub(crate) mod testutil {
    use super::*;

    pub(crate) const STUB_SECTION_CAPACITY: u32 = 8;

    /// Builds a minimal PE32+ image with a control section that has room
    /// for [`STUB_SECTION_CAPACITY`] container size entries.
    pub(crate) fn fake_stub(bundle_code: Uuid) -> Vec<u8> {
        let nt_offset = 0x80u32;
        let optional_size = 240u16; // PE32+ with 16 data directories
        let section_table = nt_offset as usize + 24 + optional_size as usize;
        let raw_pointer = 0x200u32;
        let raw_size = OFFSET_CONTAINERS as u32 + STUB_SECTION_CAPACITY * 4;
        let stub_size = raw_pointer + raw_size;

        let mut image = vec![0u8; stub_size as usize];
        image[0] = b'M';
        image[1] = b'Z';
        image[DOS_NT_OFFSET as usize..DOS_NT_OFFSET as usize + 4]
            .copy_from_slice(&nt_offset.to_le_bytes());

        let nt = nt_offset as usize;
        image[nt..nt + 4].copy_from_slice(&NT_SIGNATURE.to_le_bytes());
        image[nt + 4..nt + 6].copy_from_slice(&MACHINE_AMD64.to_le_bytes());
        image[nt + 6..nt + 8].copy_from_slice(&1u16.to_le_bytes()); // one section
        image[nt + 20..nt + 22].copy_from_slice(&optional_size.to_le_bytes());

        let opt = nt + 24;
        image[opt..opt + 2].copy_from_slice(&OPTIONAL_MAGIC_PE32_PLUS.to_le_bytes());

        image[section_table..section_table + 8].copy_from_slice(SECTION_NAME);
        image[section_table + 16..section_table + 20].copy_from_slice(&raw_size.to_le_bytes());
        image[section_table + 20..section_table + 24].copy_from_slice(&raw_pointer.to_le_bytes());

        let section = raw_pointer as usize;
        image[section..section + 4].copy_from_slice(&SECTION_MAGIC.to_le_bytes());
        image[section + 4..section + 8].copy_from_slice(&SECTION_VERSION.to_le_bytes());
        image[section + 8..section + 24].copy_from_slice(&bundle_code.to_bytes_le());
        image[section + 24..section + 28].copy_from_slice(&stub_size.to_le_bytes());
        image[section + 40..section + 44].copy_from_slice(&FORMAT_CABINET.to_le_bytes());
        image
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::{fake_stub, STUB_SECTION_CAPACITY};
    use super::*;
    use std::io::Cursor;

    fn open_fake(image: Vec<u8>) -> Stub<Cursor<Vec<u8>>> {
        Stub::open(Cursor::new(image), Path::new("test.exe")).expect("open fake stub")
    }

    #[test]
    fn decodes_the_fields_it_encoded() {
        let code = Uuid::from_u128(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef);
        let mut stub = open_fake(fake_stub(code));

        assert_eq!(code, stub.fields().bundle_code);
        assert_eq!(0, stub.container_count());
        assert!(stub.is_win64());

        let other = Uuid::from_u128(0xfeed_face_dead_beef_feed_face_dead_beef);
        stub.set_bundle_code(other).unwrap();
        let stub_size = stub.fields().stub_size;

        // Re-open from the mutated bytes; everything must round-trip.
        let reopened = open_fake(stub.stream.into_inner());
        assert_eq!(other, reopened.fields().bundle_code);
        assert_eq!(stub_size, reopened.fields().stub_size);
    }

    #[test]
    fn rejects_foreign_magic_and_version_distinctly() {
        let code = Uuid::nil();

        let mut bad_magic = fake_stub(code);
        bad_magic[0x200..0x204].copy_from_slice(&0xdead_beefu32.to_le_bytes());
        let err = Stub::open(Cursor::new(bad_magic), Path::new("test.exe")).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Stub(StubError::BadSectionMagic { .. })
        ));

        let mut bad_version = fake_stub(code);
        bad_version[0x204..0x208].copy_from_slice(&9u32.to_le_bytes());
        let err = Stub::open(Cursor::new(bad_version), Path::new("test.exe")).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Stub(StubError::IncompatibleVersion { .. })
        ));
    }

    #[test]
    fn rejects_non_pe_input() {
        let err = Stub::open(Cursor::new(vec![0u8; 64]), Path::new("test.exe")).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Stub(StubError::InvalidStubExe { .. })
        ));
    }

    #[test]
    fn rejects_undersized_section() {
        let code = Uuid::nil();
        let mut image = fake_stub(code);
        // Shrink the recorded raw size below the fixed header.
        let section_table = 0x80 + 24 + 240;
        image[section_table + 16..section_table + 20].copy_from_slice(&16u32.to_le_bytes());
        let err = Stub::open(Cursor::new(image), Path::new("test.exe")).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Stub(StubError::SectionTooSmall { size: 16, .. })
        ));
    }

    #[test]
    fn appends_containers_in_slot_order() {
        let mut stub = open_fake(fake_stub(Uuid::nil()));
        let ux = b"ux-container".to_vec();
        let attached = b"attached".to_vec();

        let err = stub
            .append_container(ContainerSlot::Attached, &mut &attached[..], attached.len() as u32)
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Stub(StubError::UxContainerNotFirst)
        ));

        let slot = stub
            .append_container(ContainerSlot::Ux, &mut &ux[..], ux.len() as u32)
            .unwrap();
        assert_eq!(0, slot);
        let slot = stub
            .append_container(ContainerSlot::Attached, &mut &attached[..], attached.len() as u32)
            .unwrap();
        assert_eq!(1, slot);

        let err = stub
            .append_container(ContainerSlot::Ux, &mut &ux[..], ux.len() as u32)
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Stub(StubError::UxContainerNotFirst)
        ));

        let stub_size = stub.fields().stub_size;
        let mut reopened = open_fake(stub.stream.into_inner());
        assert_eq!(vec![12, 8], reopened.fields().container_sizes);
        assert_eq!(u64::from(stub_size), reopened.container_offset(0));

        let mut read_back = Vec::new();
        reopened.read_container(0, &mut read_back).unwrap();
        assert_eq!(ux, read_back);
        read_back.clear();
        reopened.read_container(1, &mut read_back).unwrap();
        assert_eq!(attached, read_back);
    }

    #[test]
    fn enforces_the_section_capacity() {
        let mut stub = open_fake(fake_stub(Uuid::nil()));
        let body = [0u8; 4];
        stub.append_container(ContainerSlot::Ux, &mut &body[..], 4)
            .unwrap();
        for _ in 1..STUB_SECTION_CAPACITY {
            stub.append_container(ContainerSlot::Attached, &mut &body[..], 4)
                .unwrap();
        }
        let err = stub
            .append_container(ContainerSlot::Attached, &mut &body[..], 4)
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Stub(StubError::TooManyContainers {
                max: STUB_SECTION_CAPACITY
            })
        ));
    }

    #[test]
    fn remember_then_zero_signature_is_one_shot() {
        let code = Uuid::nil();
        let mut image = fake_stub(code);

        // Plant a checksum and certificate table entry in the header.
        let opt = 0x80 + 24;
        image[opt + 64..opt + 68].copy_from_slice(&0x1111_2222u32.to_le_bytes());
        image[opt + 144..opt + 148].copy_from_slice(&0x600u32.to_le_bytes());
        image[opt + 148..opt + 152].copy_from_slice(&0x80u32.to_le_bytes());

        let mut stub = open_fake(image);
        stub.remember_then_zero_signature().unwrap();
        assert_eq!(0x1111_2222, stub.fields().original_checksum);
        assert_eq!(0x600, stub.fields().original_signature_offset);
        assert_eq!(0x80, stub.fields().original_signature_size);

        let err = stub.remember_then_zero_signature().unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Stub(StubError::SignatureAlreadyRecorded)
        ));

        // The header copies are zeroed so the image can be re-signed.
        let reopened = open_fake(stub.stream.into_inner());
        assert_eq!(0, reopened.pe.signature_offset);
        assert_eq!(0x600, reopened.fields().original_signature_offset);
    }

    #[test]
    fn engine_size_prefers_recorded_signature_bounds() {
        let mut stub = open_fake(fake_stub(Uuid::nil()));
        let stub_size = u64::from(stub.fields().stub_size);

        // No signature, no containers: engine is just the stub.
        assert_eq!(stub_size, stub.engine_size());

        let ux = [0u8; 16];
        stub.append_container(ContainerSlot::Ux, &mut &ux[..], 16)
            .unwrap();
        assert_eq!(stub_size + 16, stub.engine_size());

        let signed = open_fake({
            let mut image = fake_stub(Uuid::nil());
            let section = 0x200;
            image[section + 32..section + 36].copy_from_slice(&0x700u32.to_le_bytes());
            image[section + 36..section + 40].copy_from_slice(&0x100u32.to_le_bytes());
            image
        });
        assert_eq!(0x800, signed.engine_size());
    }
}
