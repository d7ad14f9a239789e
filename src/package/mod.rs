//! Binary extraction and plugin packaging
//!
//! - `format` - container detection for downloaded assets
//! - `extract` - member selection and extraction (zip, tar, tar.gz)
//! - `builder` - host plugin package creation

mod builder;
mod extract;
mod format;

pub use builder::{METADATA_ENTRY, PackageBuilder, archive_extension, archive_name};
pub use extract::prepare_binary;
pub use format::{ArchiveKind, Compression, detect};
