//! Upstream release discovery
//!
//! - `github` - release API types and the [`ReleaseTransport`] client
//! - `resolve` - latest eligible release and version derivation
//! - `assets` - per-architecture asset selection

mod assets;
mod github;
mod resolve;

pub use assets::{MatchedAsset, match_assets};
pub use github::{Asset, DEFAULT_API_URL, GitHubClient, NewRelease, Release, ReleaseTransport};
pub use resolve::{ResolvedRelease, resolve_latest};
