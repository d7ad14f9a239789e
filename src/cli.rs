//! CLI argument parsing for the release tool

use std::path::PathBuf;

use clap::Parser;
use mxt_plugin_release::release::DEFAULT_API_URL;

/// Check a plugin's upstream project for a new release and package it
#[derive(Parser, Debug, Clone)]
#[command(name = "mxt-plugin-release")]
#[command(version, about = "Check a plugin for upstream updates and build its release packages")]
pub struct Args {
    /// Plugin name from the configuration
    #[arg(long)]
    pub plugin: String,

    /// Path to the plugin configuration (.json or .toml)
    #[arg(long, default_value = "data/plugins.json")]
    pub config: PathBuf,

    /// Directory receiving built packages
    #[arg(long, default_value = "dist")]
    pub output_dir: PathBuf,

    /// Directory holding processed-version records
    #[arg(long, default_value = "state")]
    pub state_dir: PathBuf,

    /// Parent directory for temporary downloads
    #[arg(long, default_value = ".tmp")]
    pub scratch_dir: PathBuf,

    /// Create a release in this repository and upload the packages
    #[arg(long)]
    pub publish: bool,

    /// Process the latest version even if it was already handled
    #[arg(long)]
    pub force: bool,

    /// Don't require the current branch to match the plugin's branch
    #[arg(long)]
    pub ignore_branch: bool,

    /// Verbose logging
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// GitHub token sent as a bearer credential
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// GitHub API base URL
    #[arg(long, default_value = DEFAULT_API_URL)]
    pub api_url: String,
}
