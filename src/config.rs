//! Plugin configuration: typed model, loader and release templates.
//!
//! The configuration document lists plugins under a top-level `plugins` key.
//! It is read as TOML when the file ends in `.toml` and as JSON otherwise.
//! Documents are deserialized into permissive raw structs first and then
//! validated eagerly, so a loaded [`Plugins`] never holds a partial entry.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use log::debug;
use regex::Regex;
use serde::Deserialize;

use crate::error::{Error, Result};

const DEFAULT_RELEASE_NAME: &str = "{name} {version}";
const DEFAULT_RELEASE_BODY: &str =
    "Automatically generated release for {name}.\nUpstream version: {version}.";
const DEFAULT_BINARY_SUBDIR: &str = "bin";

/// Selects the binary for one architecture out of a release.
#[derive(Debug, Clone)]
pub struct AssetPattern {
    /// Architecture tag, unique within a source.
    pub arch: String,
    /// Matched against release asset names.
    pub pattern: Regex,
    /// File name for the binary inside the package.
    pub rename_to: Option<String>,
    /// Selects a member when the asset is itself an archive.
    pub archive_member: Option<Regex>,
}

/// Kind of upstream release source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    GitHub,
}

impl SourceKind {
    fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "github" => Ok(Self::GitHub),
            other => Err(Error::Configuration(format!(
                "unsupported source type '{other}', only 'github' is supported"
            ))),
        }
    }

    /// Configuration tag of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GitHub => "github",
        }
    }
}

/// Where a plugin's upstream releases come from.
#[derive(Debug, Clone)]
pub struct PluginSource {
    pub kind: SourceKind,
    pub owner: String,
    pub repo: String,
    /// Releases must target exactly this branch when set.
    pub release_branch: Option<String>,
    /// Tags must start with this prefix; it is stripped to form the version.
    pub tag_prefix: String,
    pub asset_patterns: Vec<AssetPattern>,
}

/// One plugin entry of the configuration document.
#[derive(Debug, Clone)]
pub struct PluginConfig {
    pub name: String,
    /// Branch of this repository releases are published from.
    pub branch: String,
    pub source: PluginSource,
    pub release_name_template: String,
    pub release_body_template: String,
    pub plugin_description: String,
    /// Directory inside the package that holds the binary.
    pub binary_subdir: String,
}

impl PluginConfig {
    /// Architecture tags in declaration order.
    pub fn architectures(&self) -> impl Iterator<Item = &str> {
        self.source.asset_patterns.iter().map(|p| p.arch.as_str())
    }

    /// Title of the published release for `version`.
    pub fn release_name(&self, version: &str) -> Result<String> {
        render_template(&self.release_name_template, &self.name, version)
    }

    /// Body of the published release for `version`.
    pub fn release_body(&self, version: &str) -> Result<String> {
        render_template(&self.release_body_template, &self.name, version)
    }
}

/// Substitute `{name}` and `{version}` in `template`.
///
/// `{{` and `}}` produce literal braces. Any other placeholder, an
/// unterminated `{` or an unpaired `}` is reported as [`Error::Template`].
pub fn render_template(template: &str, name: &str, version: &str) -> Result<String> {
    let mut out = String::with_capacity(template.len() + name.len() + version.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut key = String::new();
                let mut closed = false;
                for k in chars.by_ref() {
                    if k == '}' {
                        closed = true;
                        break;
                    }
                    key.push(k);
                }
                match (closed, key.as_str()) {
                    (true, "name") => out.push_str(name),
                    (true, "version") => out.push_str(version),
                    _ => {
                        return Err(Error::Template {
                            template: template.to_string(),
                            placeholder: key,
                        });
                    }
                }
            }
            '}' => {
                return Err(Error::Template {
                    template: template.to_string(),
                    placeholder: "}".to_string(),
                });
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

/// All plugins of a configuration document, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Plugins {
    plugins: Vec<PluginConfig>,
}

impl Plugins {
    /// Read and validate the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Configuration(format!(
                "configuration file {} not found",
                path.display()
            )));
        }
        let text = fs::read_to_string(path)
            .map_err(|e| Error::io(format!("failed to read {}", path.display()), e))?;

        let raw: RawDocument = if path.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&text).map_err(|e| {
                Error::Configuration(format!("failed to parse {}: {e}", path.display()))
            })?
        } else {
            serde_json::from_str(&text).map_err(|e| {
                Error::Configuration(format!("failed to parse {}: {e}", path.display()))
            })?
        };

        let plugins = Self::from_raw(raw)?;
        debug!(
            "Loaded {} plugin(s) from {}",
            plugins.plugins.len(),
            path.display()
        );
        Ok(plugins)
    }

    /// Validate a JSON configuration document held in memory.
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: RawDocument = serde_json::from_str(text)
            .map_err(|e| Error::Configuration(format!("failed to parse configuration: {e}")))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawDocument) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut plugins = Vec::with_capacity(raw.plugins.len());
        for item in raw.plugins {
            let plugin = item.validate()?;
            if !seen.insert(plugin.name.clone()) {
                return Err(Error::Configuration(format!(
                    "plugin '{}' is declared more than once",
                    plugin.name
                )));
            }
            plugins.push(plugin);
        }
        Ok(Self { plugins })
    }

    /// Look a plugin up by name.
    pub fn get(&self, name: &str) -> Option<&PluginConfig> {
        self.plugins.iter().find(|p| p.name == name)
    }

    /// Names of all configured plugins.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plugins.iter().map(|p| p.name.as_str())
    }
}

#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    plugins: Vec<RawPlugin>,
}

#[derive(Deserialize)]
struct RawPlugin {
    name: Option<String>,
    branch: Option<String>,
    source: Option<RawSource>,
    release_name_template: Option<String>,
    release_body_template: Option<String>,
    plugin_description: Option<String>,
    binary_subdir: Option<String>,
}

#[derive(Deserialize)]
struct RawSource {
    #[serde(rename = "type")]
    kind: Option<String>,
    owner: Option<String>,
    repo: Option<String>,
    release_branch: Option<String>,
    tag_prefix: Option<String>,
    #[serde(default)]
    asset_patterns: Vec<RawAssetPattern>,
}

#[derive(Deserialize)]
struct RawAssetPattern {
    arch: Option<String>,
    pattern: Option<String>,
    rename_to: Option<String>,
    archive_member: Option<String>,
}

impl RawPlugin {
    fn validate(self) -> Result<PluginConfig> {
        let (Some(name), Some(branch), Some(source)) = (self.name, self.branch, self.source)
        else {
            return Err(Error::Configuration(
                "every plugin requires 'name', 'branch' and 'source'".to_string(),
            ));
        };
        let source = source
            .validate()
            .map_err(|e| prefix_plugin(&name, e))?;

        Ok(PluginConfig {
            name,
            branch,
            source,
            release_name_template: self
                .release_name_template
                .unwrap_or_else(|| DEFAULT_RELEASE_NAME.to_string()),
            release_body_template: self
                .release_body_template
                .unwrap_or_else(|| DEFAULT_RELEASE_BODY.to_string()),
            plugin_description: self.plugin_description.unwrap_or_default(),
            binary_subdir: self
                .binary_subdir
                .unwrap_or_else(|| DEFAULT_BINARY_SUBDIR.to_string()),
        })
    }
}

impl RawSource {
    fn validate(self) -> Result<PluginSource> {
        let mut missing = Vec::new();
        if self.kind.is_none() {
            missing.push("type");
        }
        if self.owner.is_none() {
            missing.push("owner");
        }
        if self.repo.is_none() {
            missing.push("repo");
        }
        let (Some(kind), Some(owner), Some(repo)) = (self.kind, self.owner, self.repo) else {
            missing.sort_unstable();
            return Err(Error::Configuration(format!(
                "source is missing field(s): {}",
                missing.join(", ")
            )));
        };

        let kind = SourceKind::from_tag(&kind)?;

        if self.asset_patterns.is_empty() {
            return Err(Error::Configuration(
                "source declares no asset_patterns".to_string(),
            ));
        }
        let mut arches = HashSet::new();
        let mut asset_patterns = Vec::with_capacity(self.asset_patterns.len());
        for raw in self.asset_patterns {
            let pattern = raw.validate()?;
            if !arches.insert(pattern.arch.clone()) {
                return Err(Error::Configuration(format!(
                    "architecture '{}' is declared more than once",
                    pattern.arch
                )));
            }
            asset_patterns.push(pattern);
        }

        Ok(PluginSource {
            kind,
            owner,
            repo,
            release_branch: self.release_branch,
            tag_prefix: self.tag_prefix.unwrap_or_default(),
            asset_patterns,
        })
    }
}

impl RawAssetPattern {
    fn validate(self) -> Result<AssetPattern> {
        let (Some(arch), Some(pattern)) = (self.arch, self.pattern) else {
            return Err(Error::Configuration(
                "every asset pattern requires 'arch' and 'pattern'".to_string(),
            ));
        };
        let pattern = compile(&arch, "pattern", &pattern)?;
        let archive_member = self
            .archive_member
            .map(|expr| compile(&arch, "archive_member", &expr))
            .transpose()?;

        Ok(AssetPattern {
            arch,
            pattern,
            rename_to: self.rename_to,
            archive_member,
        })
    }
}

fn compile(arch: &str, field: &str, expr: &str) -> Result<Regex> {
    Regex::new(expr).map_err(|e| {
        Error::Configuration(format!("invalid {field} for architecture {arch}: {e}"))
    })
}

fn prefix_plugin(name: &str, error: Error) -> Error {
    match error {
        Error::Configuration(msg) => Error::Configuration(format!("plugin '{name}': {msg}")),
        other => other,
    }
}
