//! Binary extraction from downloaded release assets
//!
//! Release assets are either the plugin binary itself or a generic container
//! (zip, tar, tar.gz) holding it. Containers are opened, the single relevant
//! member is selected and copied into the scratch directory.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use log::{debug, warn};
use regex::Regex;
use tar::Archive;
use zip::ZipArchive;

use super::format::{self, ArchiveKind, Compression};
use crate::config::AssetPattern;
use crate::error::{Error, Result};

/// Subdirectory of the scratch directory receiving extracted members.
const EXTRACTED_DIR: &str = "extracted";

/// Return the path of the binary to package for `downloaded`.
///
/// Plain files are returned unchanged. For zip and tar containers the member
/// selected by `pattern.archive_member` (or the only eligible member) is
/// written to `<scratch>/extracted/<base name>`.
///
/// A recognised but unsupported container fails with
/// [`Error::UnsupportedArchive`] when a member expression is configured, and
/// is passed through unchanged otherwise.
pub fn prepare_binary(downloaded: &Path, pattern: &AssetPattern, scratch: &Path) -> Result<PathBuf> {
    let member = pattern.archive_member.as_ref();
    match format::detect(downloaded)? {
        ArchiveKind::None => Ok(downloaded.to_path_buf()),
        ArchiveKind::Zip => extract_from_zip(downloaded, member, scratch),
        ArchiveKind::Tar(compression) => extract_from_tar(downloaded, compression, member, scratch),
        ArchiveKind::Unsupported(kind) => {
            if member.is_some() {
                return Err(Error::UnsupportedArchive {
                    archive: downloaded.to_path_buf(),
                    kind,
                });
            }
            warn!(
                "{} looks like a {kind} archive that cannot be opened, packaging it as-is",
                downloaded.display()
            );
            Ok(downloaded.to_path_buf())
        }
    }
}

/// Extract the selected member of a zip archive
fn extract_from_zip(archive_path: &Path, member: Option<&Regex>, scratch: &Path) -> Result<PathBuf> {
    let file = open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;

    let mut indices = Vec::new();
    let mut names = Vec::new();
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        if entry.is_file() {
            indices.push(i);
            names.push(entry.name().to_string());
        }
    }

    let selected = select_member(archive_path, &names, member)?;
    let mut entry = archive.by_index(indices[selected])?;
    write_member(&mut entry, &names[selected], scratch)
}

/// Extract the selected member of a (possibly gzip-compressed) tar archive
///
/// Tar streams cannot seek, so the archive is read twice: once to list
/// entries and once to copy the chosen one.
fn extract_from_tar(
    archive_path: &Path,
    compression: Compression,
    member: Option<&Regex>,
    scratch: &Path,
) -> Result<PathBuf> {
    let read_error = |e: io::Error| Error::io(format!("failed to read {}", archive_path.display()), e);

    let mut positions = Vec::new();
    let mut names = Vec::new();
    let mut archive = open_tar(archive_path, compression)?;
    for (position, entry) in archive.entries().map_err(read_error)?.enumerate() {
        let entry = entry.map_err(read_error)?;
        if entry.header().entry_type().is_file() {
            positions.push(position);
            names.push(entry.path().map_err(read_error)?.to_string_lossy().into_owned());
        }
    }

    let selected = select_member(archive_path, &names, member)?;
    let target = positions[selected];

    let mut archive = open_tar(archive_path, compression)?;
    for (position, entry) in archive.entries().map_err(read_error)?.enumerate() {
        let mut entry = entry.map_err(read_error)?;
        if position == target {
            return write_member(&mut entry, &names[selected], scratch);
        }
    }

    Err(read_error(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("entry {} disappeared on second pass", names[selected]),
    )))
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| Error::io(format!("failed to open {}", path.display()), e))
}

fn open_tar(path: &Path, compression: Compression) -> Result<Archive<Box<dyn Read>>> {
    let file = open(path)?;
    let reader: Box<dyn Read> = match compression {
        Compression::None => Box::new(file),
        Compression::Gzip => Box::new(GzDecoder::new(file)),
    };
    Ok(Archive::new(reader))
}

/// Choose one entry out of `names`, returning its index.
///
/// Hidden entries (base name starting with `.`) are never candidates.
fn select_member(archive: &Path, names: &[String], member: Option<&Regex>) -> Result<usize> {
    let mut candidates = names
        .iter()
        .enumerate()
        .filter(|(_, name)| !is_hidden(name));

    if let Some(regex) = member {
        return candidates
            .find(|(_, name)| regex.is_match(name))
            .map(|(i, _)| i)
            .ok_or_else(|| Error::MemberNotFound {
                archive: archive.to_path_buf(),
                pattern: regex.as_str().to_string(),
            });
    }

    let candidates: Vec<usize> = candidates.map(|(i, _)| i).collect();
    match candidates.as_slice() {
        [only] => Ok(*only),
        _ => Err(Error::AmbiguousMember {
            archive: archive.to_path_buf(),
            candidates: candidates.len(),
        }),
    }
}

fn is_hidden(name: &str) -> bool {
    Path::new(name)
        .file_name()
        .is_some_and(|base| base.to_string_lossy().starts_with('.'))
}

/// Copy a member into `<scratch>/extracted`, dropping its directory components.
fn write_member(reader: &mut impl Read, name: &str, scratch: &Path) -> Result<PathBuf> {
    let base = Path::new(name).file_name().ok_or_else(|| {
        Error::io(
            format!("cannot extract archive entry {name}"),
            io::Error::new(io::ErrorKind::InvalidInput, "entry has no file name"),
        )
    })?;

    let out_dir = scratch.join(EXTRACTED_DIR);
    fs::create_dir_all(&out_dir)
        .map_err(|e| Error::io(format!("failed to create {}", out_dir.display()), e))?;

    let destination = out_dir.join(base);
    let mut output = File::create(&destination)
        .map_err(|e| Error::io(format!("failed to create {}", destination.display()), e))?;
    io::copy(reader, &mut output)
        .map_err(|e| Error::io(format!("failed to extract {name}"), e))?;

    debug!("Extracted {name} to {}", destination.display());
    Ok(destination)
}
