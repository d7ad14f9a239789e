//! Queries against the git working copy the tool runs in.

use std::process::Command;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

static GITHUB_REMOTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"github\.com[:/](?P<owner>[^/]+)/(?P<repo>[^/.]+)(?:\.git)?")
        .expect("remote pattern is valid")
});

/// A GitHub repository packages are published to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRepository {
    pub owner: String,
    pub repo: String,
}

/// Name of the checked-out branch.
pub fn current_branch() -> Result<String> {
    git(&["rev-parse", "--abbrev-ref", "HEAD"])
}

/// Fail unless the working copy is on `expected`.
pub fn ensure_branch(expected: &str) -> Result<()> {
    let branch = current_branch()?;
    if branch != expected {
        return Err(Error::Git(format!(
            "must run on branch {expected}, current branch is {branch}"
        )));
    }
    Ok(())
}

/// GitHub repository behind the `origin` remote.
pub fn origin_repository() -> Result<RemoteRepository> {
    let url = git(&["config", "--get", "remote.origin.url"])?;
    parse_github_remote(&url)
        .ok_or_else(|| Error::Git(format!("cannot parse remote repository URL: {url}")))
}

/// Owner and repository from an HTTPS or SSH GitHub remote URL.
pub fn parse_github_remote(url: &str) -> Option<RemoteRepository> {
    let caps = GITHUB_REMOTE.captures(url)?;
    Some(RemoteRepository {
        owner: caps["owner"].to_string(),
        repo: caps["repo"].to_string(),
    })
}

fn git(args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .output()
        .map_err(|e| Error::Git(format!("failed to run git {}: {e}", args.join(" "))))?;

    if !output.status.success() {
        return Err(Error::Git(format!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(owner: &str, repo: &str) -> Option<RemoteRepository> {
        Some(RemoteRepository {
            owner: owner.into(),
            repo: repo.into(),
        })
    }

    #[test]
    fn parses_https_and_ssh_remotes() {
        assert_eq!(
            parse_github_remote("https://github.com/acme/mxt-plugins.git"),
            remote("acme", "mxt-plugins")
        );
        assert_eq!(
            parse_github_remote("git@github.com:acme/mxt-plugins.git"),
            remote("acme", "mxt-plugins")
        );
        assert_eq!(
            parse_github_remote("https://github.com/acme/mxt-plugins"),
            remote("acme", "mxt-plugins")
        );
    }

    #[test]
    fn rejects_foreign_remotes() {
        assert_eq!(parse_github_remote("https://gitlab.com/acme/plugins.git"), None);
    }
}
