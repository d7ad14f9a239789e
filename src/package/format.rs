//! Container format detection for downloaded assets.
//!
//! Content signatures are checked first, in table order; the file name is
//! only consulted when no signature matches.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;

use crate::error::{Error, Result};

/// Bytes needed to see the `ustar` magic of a tar header.
const SNIFF_LEN: usize = 512;
const USTAR_OFFSET: usize = 257;

/// Compression wrapped around a tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
}

/// What a downloaded asset turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// Not a container; the file is the binary itself.
    None,
    Zip,
    Tar(Compression),
    /// A recognised container this tool cannot open.
    Unsupported(&'static str),
}

const SIGNATURES: &[(&[u8], ArchiveKind)] = &[
    (b"PK\x03\x04", ArchiveKind::Zip),
    (b"PK\x05\x06", ArchiveKind::Zip),
    (b"\x1f\x8b", ArchiveKind::Tar(Compression::Gzip)),
    (b"\xfd7zXZ\x00", ArchiveKind::Unsupported("xz")),
    (b"BZh", ArchiveKind::Unsupported("bzip2")),
    (b"\x28\xb5\x2f\xfd", ArchiveKind::Unsupported("zstd")),
    (b"7z\xbc\xaf\x27\x1c", ArchiveKind::Unsupported("7z")),
    (b"Rar!\x1a\x07", ArchiveKind::Unsupported("rar")),
];

/// Consulted only when no signature matched, so a container name here means
/// the content does not look like that container.
const EXTENSIONS: &[(&str, ArchiveKind)] = &[
    (".zip", ArchiveKind::Unsupported("zip")),
    (".tar", ArchiveKind::Unsupported("tar")),
    (".tar.gz", ArchiveKind::Unsupported("tar.gz")),
    (".tgz", ArchiveKind::Unsupported("tar.gz")),
    (".gz", ArchiveKind::Unsupported("gzip")),
    (".tar.xz", ArchiveKind::Unsupported("xz")),
    (".txz", ArchiveKind::Unsupported("xz")),
    (".xz", ArchiveKind::Unsupported("xz")),
    (".tar.bz2", ArchiveKind::Unsupported("bzip2")),
    (".tbz2", ArchiveKind::Unsupported("bzip2")),
    (".bz2", ArchiveKind::Unsupported("bzip2")),
    (".tar.zst", ArchiveKind::Unsupported("zstd")),
    (".zst", ArchiveKind::Unsupported("zstd")),
    (".7z", ArchiveKind::Unsupported("7z")),
    (".rar", ArchiveKind::Unsupported("rar")),
];

/// Classify the file at `path`.
pub fn detect(path: &Path) -> Result<ArchiveKind> {
    let header = read_header(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if let Some(kind) = by_signature(&header) {
        if kind == ArchiveKind::Tar(Compression::Gzip) && !gzip_holds_tar(path, &name) {
            return Ok(ArchiveKind::Unsupported("gzip"));
        }
        return Ok(kind);
    }
    if is_ustar(&header) {
        return Ok(ArchiveKind::Tar(Compression::None));
    }
    Ok(by_extension(&name))
}

fn read_header(path: &Path) -> Result<Vec<u8>> {
    let file =
        File::open(path).map_err(|e| Error::io(format!("failed to open {}", path.display()), e))?;
    let mut header = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64)
        .read_to_end(&mut header)
        .map_err(|e| Error::io(format!("failed to read {}", path.display()), e))?;
    Ok(header)
}

fn by_signature(header: &[u8]) -> Option<ArchiveKind> {
    SIGNATURES
        .iter()
        .find(|(magic, _)| header.starts_with(magic))
        .map(|&(_, kind)| kind)
}

fn by_extension(name: &str) -> ArchiveKind {
    EXTENSIONS
        .iter()
        .find(|(ext, _)| name.ends_with(ext))
        .map_or(ArchiveKind::None, |&(_, kind)| kind)
}

fn is_ustar(header: &[u8]) -> bool {
    header
        .get(USTAR_OFFSET..USTAR_OFFSET + 5)
        .is_some_and(|magic| magic == b"ustar")
}

/// A gzip stream is a tarball when its payload starts with a tar header or
/// the name says so.
fn gzip_holds_tar(path: &Path, name: &str) -> bool {
    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        return true;
    }
    let Ok(file) = File::open(path) else {
        return false;
    };
    let mut payload = Vec::with_capacity(SNIFF_LEN);
    match GzDecoder::new(file)
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut payload)
    {
        Ok(_) => is_ustar(&payload),
        Err(_) => false,
    }
}
