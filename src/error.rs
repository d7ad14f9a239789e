//! Error types for release resolution and packaging.

use std::path::PathBuf;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while resolving, extracting, packaging or publishing a plugin.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or incomplete plugin configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No upstream release passed the draft/prerelease/branch/prefix filters.
    #[error("no eligible release found in {owner}/{repo}")]
    NoEligibleRelease {
        /// Upstream owner.
        owner: String,
        /// Upstream repository.
        repo: String,
    },

    /// No release asset matched the pattern declared for an architecture.
    #[error("no asset matches pattern `{pattern}` for architecture {arch}")]
    NoMatchingAsset {
        /// Architecture tag of the failing pattern.
        arch: String,
        /// The asset name expression.
        pattern: String,
    },

    /// The archive member expression matched nothing.
    #[error("no entry in {} matches `{pattern}`", .archive.display())]
    MemberNotFound {
        /// Downloaded archive.
        archive: PathBuf,
        /// The member expression.
        pattern: String,
    },

    /// The archive holds zero or several candidate entries and no member expression was given.
    #[error(
        "{} contains {candidates} candidate entries, set `archive_member` in the configuration",
        .archive.display()
    )]
    AmbiguousMember {
        /// Downloaded archive.
        archive: PathBuf,
        /// Number of eligible entries found.
        candidates: usize,
    },

    /// The download looks like an archive this tool cannot open.
    #[error("{} looks like a {kind} archive that cannot be extracted", .archive.display())]
    UnsupportedArchive {
        /// Downloaded archive.
        archive: PathBuf,
        /// Detected container kind.
        kind: &'static str,
    },

    /// A release template holds an unknown placeholder or an unpaired brace.
    #[error("invalid placeholder `{placeholder}` in template `{template}`")]
    Template {
        /// The offending template.
        template: String,
        /// Placeholder name without braces, or the stray brace.
        placeholder: String,
    },

    /// The release record carries no asset upload endpoint.
    #[error("release {tag} has no upload URL")]
    MissingUploadUrl {
        /// Tag of the remote release.
        tag: String,
    },

    /// A git query on the working copy failed or returned an unexpected value.
    #[error("git: {0}")]
    Git(String),

    /// Upstream transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Filesystem failure with the operation that caused it.
    #[error("{context}: {source}")]
    Io {
        /// What was being done.
        context: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Zip reading or writing failed.
    #[error("zip archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// JSON (de)serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap an I/O error with a description of the failed operation.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Failures talking to the upstream release service.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The service answered with a non-success status.
    #[error("GitHub API error {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Status text plus any message from the response body.
        message: String,
    },

    /// The request could not be sent or the response could not be read.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Local file access during a download or upload.
    #[error("transfer i/o error: {0}")]
    Io(#[from] std::io::Error),
}
