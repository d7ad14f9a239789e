//! Release processing pipeline
//!
//! One run handles one plugin: resolve the latest eligible upstream release,
//! skip it if already processed, otherwise download, extract and package the
//! binary for every declared architecture, record the new state and
//! optionally publish the packages as a release of this repository.

mod scratch;

use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::config::PluginConfig;
use crate::error::{Error, Result};
use crate::git::RemoteRepository;
use crate::package::{PackageBuilder, prepare_binary};
use crate::release::{MatchedAsset, NewRelease, ReleaseTransport, ResolvedRelease, match_assets, resolve_latest};
use crate::state::{ReleaseState, StateStore};

pub use scratch::ScratchDir;

/// Content type of uploaded plugin packages.
pub const PACKAGE_CONTENT_TYPE: &str = "application/zip";

/// Filesystem locations used by a run.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Where packages are written.
    pub output_dir: PathBuf,
    /// Where state records live.
    pub state_dir: PathBuf,
    /// Parent of the per-run scratch directory.
    pub scratch_root: PathBuf,
}

/// Per-run switches.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Reprocess even if the resolved version was already recorded.
    pub force: bool,
    /// Publish the packages to this repository after saving state.
    pub publish: Option<RemoteRepository>,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The resolved version was already processed; nothing was done.
    Skipped { version: String },
    /// Packages were built (and published if requested).
    Packaged(ReleaseState),
}

/// Drives one plugin through resolve, package, record and publish.
pub struct Pipeline<'a, T> {
    transport: &'a T,
    state: StateStore,
    output_dir: PathBuf,
    scratch_root: PathBuf,
}

impl<'a, T: ReleaseTransport> Pipeline<'a, T> {
    pub fn new(transport: &'a T, paths: Paths) -> Self {
        Self {
            transport,
            state: StateStore::new(paths.state_dir),
            output_dir: paths.output_dir,
            scratch_root: paths.scratch_root,
        }
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// Process `plugin`. Any error aborts the run.
    pub async fn run(&self, plugin: &PluginConfig, options: &RunOptions) -> Result<Outcome> {
        let source = &plugin.source;
        info!(
            "Checking {} releases of {}/{} for {}",
            source.kind.as_str(),
            source.owner,
            source.repo,
            plugin.name
        );

        let releases = self
            .transport
            .list_releases(&source.owner, &source.repo)
            .await?;
        let resolved = resolve_latest(&releases, source)?;
        info!(
            "Latest eligible release is {} (version {})",
            resolved.release.tag_name, resolved.version
        );

        if let Some(previous) = self.state.load(&plugin.name)?
            && previous.version == resolved.version
            && !options.force
        {
            info!("Version {} of {} is already processed", resolved.version, plugin.name);
            return Ok(Outcome::Skipped {
                version: resolved.version.to_string(),
            });
        }

        let matched = match_assets(&source.asset_patterns, &resolved.release.assets)?;

        let state = {
            let scratch = ScratchDir::create(
                self.scratch_root
                    .join(format!("{}-{}", plugin.name, resolved.version)),
            )?;
            self.package_assets(plugin, &resolved, &matched, scratch.path())
                .await?
        };

        self.state.save(&state)?;
        info!("Saved state for {} version {}", plugin.name, state.version);

        if let Some(target) = &options.publish {
            self.publish(plugin, &state, target).await?;
        }

        info!("Plugin {} updated to version {}", plugin.name, state.version);
        Ok(Outcome::Packaged(state))
    }

    /// Download, extract and package every matched asset in declaration order.
    async fn package_assets(
        &self,
        plugin: &PluginConfig,
        resolved: &ResolvedRelease<'_>,
        matched: &[MatchedAsset<'_>],
        scratch: &Path,
    ) -> Result<ReleaseState> {
        let builder = PackageBuilder::new(&self.output_dir)?;
        let mut state = ReleaseState {
            plugin: plugin.name.clone(),
            version: resolved.version.to_string(),
            assets: Default::default(),
        };

        for &MatchedAsset { pattern, asset } in matched {
            let download = scratch.join(&asset.name);
            info!("Downloading {} for {}", asset.browser_download_url, pattern.arch);
            self.transport.download_asset(asset, &download).await?;

            let binary = prepare_binary(&download, pattern, scratch)?;
            debug!("Prepared binary {} for {}", binary.display(), pattern.arch);

            let package = builder.build(
                plugin,
                pattern,
                resolved.version,
                &binary,
                resolved.release.html_url.as_deref(),
            )?;
            state.assets.insert(pattern.arch.clone(), package);
        }
        Ok(state)
    }

    /// Create or reuse the `{plugin}-v{version}` release and upload every package to it.
    ///
    /// Packages are uploaded in the declared architecture order.
    async fn publish(
        &self,
        plugin: &PluginConfig,
        state: &ReleaseState,
        target: &RemoteRepository,
    ) -> Result<()> {
        let tag = format!("{}-v{}", plugin.name, state.version);
        let name = plugin.release_name(&state.version)?;
        let body = plugin.release_body(&state.version)?;

        let release = match self
            .transport
            .release_by_tag(&target.owner, &target.repo, &tag)
            .await?
        {
            Some(existing) => {
                info!("Release {tag} already exists, uploading packages to it");
                existing
            }
            None => {
                info!("Creating release {tag} in {}/{}", target.owner, target.repo);
                let request = NewRelease {
                    tag_name: tag.clone(),
                    target_commitish: plugin.branch.clone(),
                    name,
                    body,
                    draft: false,
                    prerelease: false,
                };
                self.transport
                    .create_release(&target.owner, &target.repo, &request)
                    .await?
            }
        };

        let upload_url = release
            .upload_url
            .as_deref()
            .ok_or_else(|| Error::MissingUploadUrl { tag: tag.clone() })?;

        let packages = plugin
            .architectures()
            .filter_map(|arch| state.assets.get(arch).map(|package| (arch, package)));
        for (arch, package) in packages {
            info!("Uploading {} package {}", arch, package.display());
            self.transport
                .upload_asset(upload_url, package, PACKAGE_CONTENT_TYPE)
                .await?;
        }
        Ok(())
    }
}
