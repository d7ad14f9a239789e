//! Per-architecture asset selection.

use crate::config::AssetPattern;
use crate::error::{Error, Result};

use super::github::Asset;

/// The asset chosen for one declared pattern.
#[derive(Debug, Clone, Copy)]
pub struct MatchedAsset<'a> {
    pub pattern: &'a AssetPattern,
    pub asset: &'a Asset,
}

/// Select, for every pattern in order, the first asset whose name matches it.
///
/// Patterns are matched independently, so one asset may serve several
/// architectures.
pub fn match_assets<'a>(
    patterns: &'a [AssetPattern],
    assets: &'a [Asset],
) -> Result<Vec<MatchedAsset<'a>>> {
    patterns
        .iter()
        .map(|pattern| {
            assets
                .iter()
                .find(|asset| pattern.pattern.is_match(&asset.name))
                .map(|asset| MatchedAsset { pattern, asset })
                .ok_or_else(|| Error::NoMatchingAsset {
                    arch: pattern.arch.clone(),
                    pattern: pattern.pattern.as_str().to_string(),
                })
        })
        .collect()
}
