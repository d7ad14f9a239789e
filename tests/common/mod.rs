//! Test helpers for pipeline integration tests

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use mxt_plugin_release::release::{Asset, NewRelease, Release, ReleaseTransport};
use mxt_plugin_release::{Paths, TransportError};
use tempfile::TempDir;

/// Configuration with plugin `foo` packaging a linux x64 tarball from `acme/foo`.
pub const FOO_CONFIG: &str = r#"{
    "plugins": [
        {
            "name": "foo",
            "branch": "main",
            "plugin_description": "Foo helper",
            "source": {
                "type": "github",
                "owner": "acme",
                "repo": "foo",
                "release_branch": "main",
                "tag_prefix": "v",
                "asset_patterns": [
                    {"arch": "x64", "pattern": "linux-x64\\.tar\\.gz$"}
                ]
            }
        }
    ]
}"#;

/// Scratch area for one test: output, state and scratch directories.
pub struct TestDirs {
    root: TempDir,
}

impl TestDirs {
    pub fn new() -> Self {
        Self {
            root: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn paths(&self) -> Paths {
        Paths {
            output_dir: self.path().join("dist"),
            state_dir: self.path().join("state"),
            scratch_root: self.path().join(".tmp"),
        }
    }
}

/// Gzipped tarball with the given regular files.
pub fn tar_gz(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for &(path, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_path(path).unwrap();
        header.set_size(data.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append(&header, data).unwrap();
    }
    let tar_data = builder.into_inner().unwrap();

    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder.write_all(&tar_data).unwrap();
    encoder.finish().unwrap()
}

pub fn asset(name: &str) -> Asset {
    Asset {
        name: name.to_string(),
        browser_download_url: format!("https://downloads.example.invalid/{name}"),
        size: 0,
    }
}

pub fn release(tag: &str, branch: &str, assets: Vec<Asset>) -> Release {
    Release {
        tag_name: tag.to_string(),
        target_commitish: Some(branch.to_string()),
        assets,
        html_url: Some(format!("https://github.com/acme/foo/releases/tag/{tag}")),
        ..Release::default()
    }
}

/// In-memory release service recording every mutating call.
#[derive(Default)]
pub struct FakeTransport {
    pub releases: Vec<Release>,
    /// Download URL to payload.
    pub files: HashMap<String, Vec<u8>>,
    /// Releases of the publish target, by tag.
    pub remote: Mutex<HashMap<String, Release>>,
    pub created: Mutex<Vec<NewRelease>>,
    pub uploads: Mutex<Vec<(String, PathBuf, String)>>,
    pub downloads: AtomicUsize,
}

impl FakeTransport {
    /// Upstream `acme/foo` with one `v2.1.0` release whose tarball holds `foo-bin`.
    pub fn foo_v2_1_0() -> Self {
        let tarball = asset("foo-2.1.0-linux-x64.tar.gz");
        let mut files = HashMap::new();
        files.insert(
            tarball.browser_download_url.clone(),
            tar_gz(&[("foo-bin", b"\x7fELF foo")]),
        );
        Self {
            releases: vec![release(
                "v2.1.0",
                "main",
                vec![asset("foo-2.1.0-windows.zip"), tarball],
            )],
            files,
            ..Self::default()
        }
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

impl ReleaseTransport for FakeTransport {
    async fn list_releases(&self, _owner: &str, _repo: &str) -> Result<Vec<Release>, TransportError> {
        Ok(self.releases.clone())
    }

    async fn release_by_tag(
        &self,
        _owner: &str,
        _repo: &str,
        tag: &str,
    ) -> Result<Option<Release>, TransportError> {
        Ok(self.remote.lock().unwrap().get(tag).cloned())
    }

    async fn create_release(
        &self,
        _owner: &str,
        _repo: &str,
        release: &NewRelease,
    ) -> Result<Release, TransportError> {
        let created = Release {
            tag_name: release.tag_name.clone(),
            target_commitish: Some(release.target_commitish.clone()),
            upload_url: Some(format!(
                "https://uploads.example.invalid/{}/assets{{?name,label}}",
                release.tag_name
            )),
            ..Release::default()
        };
        self.created.lock().unwrap().push(release.clone());
        self.remote
            .lock()
            .unwrap()
            .insert(release.tag_name.clone(), created.clone());
        Ok(created)
    }

    async fn upload_asset(
        &self,
        upload_url: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), TransportError> {
        assert!(path.exists(), "uploaded package {} is missing", path.display());
        self.uploads.lock().unwrap().push((
            upload_url.to_string(),
            path.to_path_buf(),
            content_type.to_string(),
        ));
        Ok(())
    }

    async fn download_asset(&self, asset: &Asset, destination: &Path) -> Result<(), TransportError> {
        let data = self
            .files
            .get(&asset.browser_download_url)
            .ok_or_else(|| TransportError::Status {
                status: 404,
                message: "Not Found".to_string(),
            })?;
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(destination, data)?;
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
