//! Archive format detection and extraction.
//!
//! Detection looks at the leading magic bytes first and only falls back to the
//! file name when the content is inconclusive.

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use xz2::read::XzDecoder;

use crate::error::FetchError;
use crate::models::ArchiveFormat;

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const XZ_MAGIC: &[u8] = &[0xfd, b'7', b'z', b'X', b'Z', 0x00];
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const USTAR_OFFSET: usize = 257;
const USTAR_MAGIC: &[u8] = b"ustar";

/// Classify an archive from its leading bytes.
pub fn detect_from_magic(head: &[u8]) -> Option<ArchiveFormat> {
    if head.starts_with(GZIP_MAGIC) {
        Some(ArchiveFormat::TarGz)
    } else if head.starts_with(XZ_MAGIC) {
        Some(ArchiveFormat::TarXz)
    } else if head.starts_with(ZIP_MAGIC) {
        Some(ArchiveFormat::Zip)
    } else if head.len() >= USTAR_OFFSET + USTAR_MAGIC.len()
        && &head[USTAR_OFFSET..USTAR_OFFSET + USTAR_MAGIC.len()] == USTAR_MAGIC
    {
        Some(ArchiveFormat::Tar)
    } else {
        None
    }
}

/// Classify an archive from its file name.
pub fn detect_from_name(path: &Path) -> Option<ArchiveFormat> {
    let name = path.file_name()?.to_string_lossy().to_lowercase();
    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Some(ArchiveFormat::TarGz)
    } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
        Some(ArchiveFormat::TarXz)
    } else if name.ends_with(".zip") {
        Some(ArchiveFormat::Zip)
    } else if name.ends_with(".tar") {
        Some(ArchiveFormat::Tar)
    } else {
        None
    }
}

/// Detect the format of an archive on disk.
pub fn detect_format(archive: &Path) -> Result<ArchiveFormat, FetchError> {
    let mut head = Vec::with_capacity(512);
    File::open(archive)
        .and_then(|f| f.take(512).read_to_end(&mut head))
        .map_err(|e| FetchError::io(archive, e))?;

    detect_from_magic(&head)
        .or_else(|| detect_from_name(archive))
        .ok_or_else(|| FetchError::UnsupportedFormat(archive.to_path_buf()))
}

/// Seam for the extraction stage so callers can observe or replace it.
pub trait Extractor {
    fn extract(&self, archive: &Path, dest: &Path) -> Result<ArchiveFormat, FetchError>;
}

/// Production extractor: tar (plain, gzip, xz) and zip.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchiveExtractor;

impl Extractor for ArchiveExtractor {
    fn extract(&self, archive: &Path, dest: &Path) -> Result<ArchiveFormat, FetchError> {
        let format = detect_format(archive)?;
        fs::create_dir_all(dest).map_err(|e| FetchError::io(dest, e))?;

        log::info!(
            "[Fetch] Extracting {} ({}) -> {}",
            archive.display(),
            format,
            dest.display()
        );

        let file = File::open(archive).map_err(|e| FetchError::io(archive, e))?;
        let reader = BufReader::new(file);
        let result = match format {
            ArchiveFormat::Tar => unpack_tar(reader, dest),
            ArchiveFormat::TarGz => unpack_tar(GzDecoder::new(reader), dest),
            ArchiveFormat::TarXz => unpack_tar(XzDecoder::new(reader), dest),
            ArchiveFormat::Zip => unpack_zip(archive, dest),
        };

        result.map_err(|reason| FetchError::Extraction {
            archive: archive.to_path_buf(),
            reason,
        })?;
        Ok(format)
    }
}

fn unpack_tar<R: Read>(reader: R, dest: &Path) -> Result<(), String> {
    let mut ar = tar::Archive::new(reader);
    ar.set_preserve_permissions(true);
    ar.set_overwrite(true);
    ar.unpack(dest).map_err(|e| e.to_string())
}

fn unpack_zip(archive: &Path, dest: &Path) -> Result<(), String> {
    let file = File::open(archive).map_err(|e| e.to_string())?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| e.to_string())?;
    zip.extract(dest).map_err(|e| e.to_string())
}
