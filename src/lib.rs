//! MobaXterm plugin release automation
//!
//! Resolves the latest eligible upstream release of a third-party tool,
//! selects the binary for every declared architecture (unpacking it from a
//! zip or tar archive when needed), repackages each one as a host plugin
//! archive with embedded `plugin.json` metadata and records the processed
//! version so reruns are no-ops until upstream publishes again.
//!
//! ## Module Organization
//!
//! - `config` - plugin configuration loading, validation and release templates
//! - `release` - upstream release API, release resolution and asset matching
//! - `package` - archive detection, member extraction and package creation
//! - `state` - last processed version per plugin
//! - `pipeline` - one run from resolution to optional publication
//! - `git` - branch and origin queries on the working copy

pub mod config;
pub mod error;
pub mod git;
pub mod package;
pub mod pipeline;
pub mod release;
pub mod state;

// Re-export public API
pub use config::{AssetPattern, PluginConfig, PluginSource, Plugins, SourceKind};
pub use error::{Error, Result, TransportError};
pub use pipeline::{Outcome, Paths, Pipeline, RunOptions};
pub use release::{GitHubClient, ReleaseTransport};
pub use state::{ReleaseState, StateStore};
