//! GitHub release API interaction

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use log::debug;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, ClientBuilder, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::TransportError;

/// Public GitHub REST endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const USER_AGENT: &str = concat!("mxt-plugin-release/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const RELEASES_PER_PAGE: u32 = 30;

/// GitHub release metadata from API
#[derive(Deserialize, Debug, Clone, Default)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub target_commitish: Option<String>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub html_url: Option<String>,
    /// URI template (`...{?name,label}`) for attaching assets.
    #[serde(default)]
    pub upload_url: Option<String>,
}

/// GitHub release asset metadata
#[derive(Deserialize, Debug, Clone)]
pub struct Asset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
}

/// Payload for creating a release.
#[derive(Serialize, Debug, Clone)]
pub struct NewRelease {
    pub tag_name: String,
    pub target_commitish: String,
    pub name: String,
    pub body: String,
    pub draft: bool,
    pub prerelease: bool,
}

/// Operations the pipeline needs from a release hosting service.
pub trait ReleaseTransport {
    /// Releases of `owner/repo`, newest first.
    fn list_releases(
        &self,
        owner: &str,
        repo: &str,
    ) -> impl Future<Output = Result<Vec<Release>, TransportError>> + Send;

    /// Release with the given tag, or `None` when the service reports it missing.
    fn release_by_tag(
        &self,
        owner: &str,
        repo: &str,
        tag: &str,
    ) -> impl Future<Output = Result<Option<Release>, TransportError>> + Send;

    fn create_release(
        &self,
        owner: &str,
        repo: &str,
        release: &NewRelease,
    ) -> impl Future<Output = Result<Release, TransportError>> + Send;

    /// Attach the file at `path` to the release behind `upload_url`.
    fn upload_asset(
        &self,
        upload_url: &str,
        path: &Path,
        content_type: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Stream an asset to `destination`, creating parent directories.
    fn download_asset(
        &self,
        asset: &Asset,
        destination: &Path,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// [`ReleaseTransport`] backed by the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    api_url: String,
    token: Option<String>,
}

impl GitHubClient {
    /// Client for the API at `api_url`; `token` is sent as a bearer credential when present.
    pub fn with_api_url(api_url: &str, token: Option<String>) -> Result<Self, TransportError> {
        Self::from_builder(Client::builder(), api_url, token)
    }

    fn from_builder(
        builder: ClientBuilder,
        api_url: &str,
        token: Option<String>,
    ) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );

        let client = builder
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, TransportError> {
        let response = self.authorize(request).send().await?;
        check_status(response).await
    }
}

impl ReleaseTransport for GitHubClient {
    async fn list_releases(&self, owner: &str, repo: &str) -> Result<Vec<Release>, TransportError> {
        let url = self.endpoint(&format!("repos/{owner}/{repo}/releases"));
        debug!("GitHub API GET {url}");
        let response = self
            .send(
                self.client
                    .get(&url)
                    .query(&[("per_page", RELEASES_PER_PAGE)]),
            )
            .await?;
        Ok(response.json().await?)
    }

    async fn release_by_tag(
        &self,
        owner: &str,
        repo: &str,
        tag: &str,
    ) -> Result<Option<Release>, TransportError> {
        let url = self.endpoint(&format!("repos/{owner}/{repo}/releases/tags/{tag}"));
        debug!("GitHub API GET {url}");
        let response = self.authorize(self.client.get(&url)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let release = check_status(response).await?.json().await?;
        Ok(Some(release))
    }

    async fn create_release(
        &self,
        owner: &str,
        repo: &str,
        release: &NewRelease,
    ) -> Result<Release, TransportError> {
        let url = self.endpoint(&format!("repos/{owner}/{repo}/releases"));
        debug!("GitHub API POST {url}");
        let response = self.send(self.client.post(&url).json(release)).await?;
        Ok(response.json().await?)
    }

    async fn upload_asset(
        &self,
        upload_url: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), TransportError> {
        let endpoint = upload_url
            .split_once('{')
            .map_or(upload_url, |(base, _)| base);
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("invalid asset file name: {}", path.display()),
                )
            })?
            .to_string();
        let payload = tokio::fs::read(path).await?;

        debug!("GitHub API POST {endpoint}?name={name}");
        self.send(
            self.client
                .post(endpoint)
                .query(&[("name", name.as_str())])
                .header(header::CONTENT_TYPE, content_type)
                .body(payload),
        )
        .await?;
        Ok(())
    }

    async fn download_asset(&self, asset: &Asset, destination: &Path) -> Result<(), TransportError> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let response = self
            .send(
                self.client
                    .get(&asset.browser_download_url)
                    .header(header::ACCEPT, "application/octet-stream"),
            )
            .await?;

        let mut file = tokio::fs::File::create(destination).await?;
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(
            "Downloaded {} ({downloaded} of {} bytes)",
            asset.name, asset.size
        );
        Ok(())
    }
}

/// Turn a non-success response into [`TransportError::Status`].
async fn check_status(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let reason = status.canonical_reason().unwrap_or("unexpected status");
    let message = match api_message(&body) {
        Some(detail) => format!("{reason}: {detail}"),
        None => reason.to_string(),
    };
    Err(TransportError::Status {
        status: status.as_u16(),
        message,
    })
}

fn api_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value.get("message")?.as_str().map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    use super::*;

    /// Answer one connection per canned `(status, body)` and return each request head.
    async fn stub_server(responses: Vec<(u16, &'static str)>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let mut heads = Vec::new();
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                heads.push(read_request(&mut socket).await);
                let response = format!(
                    "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
            heads
        });
        (url, handle)
    }

    /// Read a full request and return its head.
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            assert!(n > 0, "client closed before sending a full request");
            data.extend_from_slice(&buf[..n]);

            let Some(end) = data.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&data[..end]).into_owned();
            let length = head
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().unwrap())
                })
                .unwrap_or(0);
            while data.len() < end + 4 + length {
                let n = socket.read(&mut buf).await.unwrap();
                assert!(n > 0, "client closed before sending the body");
                data.extend_from_slice(&buf[..n]);
            }
            return head;
        }
    }

    fn client(url: &str, token: Option<&str>) -> GitHubClient {
        GitHubClient::from_builder(
            Client::builder().no_proxy(),
            url,
            token.map(String::from),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn missing_tag_is_none() {
        let (url, server) = stub_server(vec![(404, r#"{"message": "Not Found"}"#)]).await;

        let release = client(&url, None)
            .release_by_tag("me", "plugins", "foo-v1.0")
            .await
            .unwrap();

        assert!(release.is_none());
        let heads = server.await.unwrap();
        assert!(
            heads[0].starts_with("GET /repos/me/plugins/releases/tags/foo-v1.0 HTTP/1.1"),
            "{}",
            heads[0]
        );
    }

    #[tokio::test]
    async fn existing_tag_is_returned() {
        let (url, server) = stub_server(vec![(
            200,
            r#"{"tag_name": "foo-v1.0", "upload_url": "https://uploads.example.invalid/1/assets{?name,label}"}"#,
        )])
        .await;

        let release = client(&url, None)
            .release_by_tag("me", "plugins", "foo-v1.0")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(release.tag_name, "foo-v1.0");
        assert!(release.upload_url.is_some());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn error_status_carries_api_message() {
        let (url, server) = stub_server(vec![(401, r#"{"message": "Bad credentials"}"#)]).await;

        let err = client(&url, Some("secret"))
            .list_releases("acme", "foo")
            .await
            .unwrap_err();

        match err {
            TransportError::Status { status, message } => {
                assert_eq!(status, 401);
                assert!(message.contains("Bad credentials"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
        let head = server.await.unwrap().remove(0).to_ascii_lowercase();
        assert!(head.starts_with("get /repos/acme/foo/releases?per_page=30 "), "{head}");
        assert!(head.contains("authorization: bearer secret"), "{head}");
        assert!(head.contains("accept: application/vnd.github+json"), "{head}");
    }

    #[tokio::test]
    async fn tag_lookup_reports_server_errors() {
        let (url, server) = stub_server(vec![(500, "oops")]).await;

        let err = client(&url, None)
            .release_by_tag("me", "plugins", "foo-v1.0")
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Status { status: 500, .. }), "{err}");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn upload_strips_uri_template_and_names_asset() {
        let tmp = tempfile::tempdir().unwrap();
        let package = tmp.path().join("foo-1.0-x64.mxt64");
        std::fs::write(&package, b"PK\x03\x04package").unwrap();
        let (url, server) = stub_server(vec![(201, "{}")]).await;

        client(&url, None)
            .upload_asset(
                &format!("{url}/repos/me/plugins/releases/1/assets{{?name,label}}"),
                &package,
                "application/zip",
            )
            .await
            .unwrap();

        let head = server.await.unwrap().remove(0);
        assert!(
            head.starts_with(
                "POST /repos/me/plugins/releases/1/assets?name=foo-1.0-x64.mxt64 HTTP/1.1"
            ),
            "{head}"
        );
        assert!(head.to_ascii_lowercase().contains("content-type: application/zip"), "{head}");
    }

    #[test]
    fn parses_release_payload() {
        let payload = r#"{
            "tag_name": "v2.1.0",
            "target_commitish": "main",
            "draft": false,
            "prerelease": false,
            "html_url": "https://github.com/acme/foo/releases/tag/v2.1.0",
            "upload_url": "https://uploads.github.com/repos/acme/foo/releases/1/assets{?name,label}",
            "assets": [
                {"name": "foo-linux-x64.tar.gz", "browser_download_url": "https://example.invalid/a", "size": 10}
            ]
        }"#;
        let release: Release = serde_json::from_str(payload).unwrap();
        assert_eq!(release.tag_name, "v2.1.0");
        assert_eq!(release.target_commitish.as_deref(), Some("main"));
        assert_eq!(release.assets.len(), 1);
        assert_eq!(release.assets[0].size, 10);
    }

    #[test]
    fn tolerates_sparse_release_payload() {
        let release: Release = serde_json::from_str(r#"{"tag_name": "1.0"}"#).unwrap();
        assert!(!release.draft);
        assert!(release.assets.is_empty());
        assert!(release.upload_url.is_none());
    }

    #[test]
    fn extracts_api_error_message() {
        assert_eq!(
            api_message(r#"{"message": "Bad credentials"}"#).as_deref(),
            Some("Bad credentials")
        );
        assert_eq!(api_message("<html>"), None);
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let client = GitHubClient::with_api_url("https://ghe.example.com/api/v3/", None).unwrap();
        assert_eq!(
            client.endpoint("/repos/a/b/releases"),
            "https://ghe.example.com/api/v3/repos/a/b/releases"
        );
    }
}
