//! Latest eligible release selection.

use crate::config::PluginSource;
use crate::error::{Error, Result};

use super::github::Release;

/// A release chosen for processing, with the version derived from its tag.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedRelease<'a> {
    pub release: &'a Release,
    pub version: &'a str,
}

/// Pick the first eligible release from `releases` (newest first).
///
/// A release is eligible when it is neither a draft nor a prerelease, targets
/// `source.release_branch` when one is configured, and its tag starts with
/// `source.tag_prefix`. The version is the tag without that prefix.
pub fn resolve_latest<'a>(
    releases: &'a [Release],
    source: &PluginSource,
) -> Result<ResolvedRelease<'a>> {
    releases
        .iter()
        .find_map(|release| {
            eligible_version(release, source).map(|version| ResolvedRelease { release, version })
        })
        .ok_or_else(|| Error::NoEligibleRelease {
            owner: source.owner.clone(),
            repo: source.repo.clone(),
        })
}

fn eligible_version<'a>(release: &'a Release, source: &PluginSource) -> Option<&'a str> {
    if release.draft || release.prerelease {
        return None;
    }
    if let Some(branch) = &source.release_branch
        && release.target_commitish.as_deref() != Some(branch.as_str())
    {
        return None;
    }
    release.tag_name.strip_prefix(source.tag_prefix.as_str())
}
