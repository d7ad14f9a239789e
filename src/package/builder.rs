//! Plugin package creation
//!
//! A package is a deflated zip holding the plugin binary under the plugin's
//! binary subdirectory plus a `plugin.json` metadata entry.

use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::{AssetPattern, PluginConfig};
use crate::error::{Error, Result};

/// Name of the metadata entry inside every package.
pub const METADATA_ENTRY: &str = "plugin.json";

/// Package suffixes for the architectures the host application knows.
const KNOWN_EXTENSIONS: &[(&str, &str)] = &[("x86", ".mxt3"), ("x64", ".mxt64")];

#[derive(Serialize)]
struct PluginMetadata<'a> {
    name: &'a str,
    version: &'a str,
    arch: &'a str,
    description: &'a str,
    source_release: Option<&'a str>,
}

/// Suffix appended after `{name}-{version}-{arch}` in package file names.
pub fn archive_extension(arch: &str) -> Cow<'static, str> {
    KNOWN_EXTENSIONS
        .iter()
        .find(|(known, _)| *known == arch)
        .map_or_else(|| Cow::Owned(format!("-{arch}.zip")), |&(_, ext)| Cow::Borrowed(ext))
}

/// File name of the package for one plugin version and architecture.
pub fn archive_name(plugin: &str, version: &str, arch: &str) -> String {
    format!("{plugin}-{version}-{arch}{}", archive_extension(arch))
}

/// Writes plugin packages into an output directory.
#[derive(Debug, Clone)]
pub struct PackageBuilder {
    output_dir: PathBuf,
}

impl PackageBuilder {
    /// Create the builder, creating `output_dir` if needed.
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir).map_err(|e| {
            Error::io(format!("failed to create {}", output_dir.display()), e)
        })?;
        Ok(Self { output_dir })
    }

    /// Package `binary` for `pattern.arch`, returning the package path.
    ///
    /// An existing package with the same name is replaced.
    pub fn build(
        &self,
        plugin: &PluginConfig,
        pattern: &AssetPattern,
        version: &str,
        binary: &Path,
        release_url: Option<&str>,
    ) -> Result<PathBuf> {
        let archive_path = self
            .output_dir
            .join(archive_name(&plugin.name, version, &pattern.arch));
        let binary_entry = binary_entry_name(plugin, pattern, binary)?;
        let metadata = PluginMetadata {
            name: &plugin.name,
            version,
            arch: &pattern.arch,
            description: &plugin.plugin_description,
            source_release: release_url,
        };

        info!("Building package {}", archive_path.display());

        let file = File::create(&archive_path)
            .map_err(|e| Error::io(format!("failed to create {}", archive_path.display()), e))?;
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut source = File::open(binary)
            .map_err(|e| Error::io(format!("failed to open {}", binary.display()), e))?;
        zip.start_file(binary_entry.as_str(), options.unix_permissions(0o755))?;
        io::copy(&mut source, &mut zip)
            .map_err(|e| Error::io(format!("failed to package {}", binary.display()), e))?;

        zip.start_file(METADATA_ENTRY, options.unix_permissions(0o644))?;
        let json = serde_json::to_string_pretty(&metadata)?;
        zip.write_all(json.as_bytes())
            .map_err(|e| Error::io(format!("failed to write {METADATA_ENTRY}"), e))?;

        zip.finish()?;
        Ok(archive_path)
    }
}

/// Path of the binary inside the package: `{binary_subdir}/{rename_to or file name}`.
fn binary_entry_name(plugin: &PluginConfig, pattern: &AssetPattern, binary: &Path) -> Result<String> {
    let internal = match &pattern.rename_to {
        Some(name) => name.clone(),
        None => binary
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::io(
                    format!("cannot package {}", binary.display()),
                    io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
                )
            })?,
    };

    let subdir = plugin.binary_subdir.trim_matches('/');
    Ok(if subdir.is_empty() {
        internal
    } else {
        format!("{subdir}/{internal}")
    })
}
