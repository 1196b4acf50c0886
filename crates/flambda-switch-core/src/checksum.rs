//! Source archive location and checksum resolution.
//!
//! The checksum embedded in a variant's `opam` file is always
//! `sha256=<hex>`. It either comes from the user (normalized, never
//! validated) or is computed by streaming the archive through SHA-256.

use std::fmt;

use futures::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::Reporter;

/// Algorithm tag prefixed to every checksum.
pub const SHA256_PREFIX: &str = "sha256=";

/// Errors while fetching the source archive.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Connection failure or non-2xx status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A GitHub commit archive: `https://<host>/<user>/<repo>/archive/<commit>.tar.gz`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSource {
    /// Host name, e.g. `github.com`.
    pub host: String,
    /// Owning user or organisation.
    pub user: String,
    /// Repository name.
    pub repo: String,
    /// Commit hash (or any ref GitHub accepts).
    pub commit: String,
}

impl ArchiveSource {
    /// Archive of `commit` in `user/repo` on `host`.
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        repo: impl Into<String>,
        commit: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            repo: repo.into(),
            commit: commit.into(),
        }
    }

    /// Full archive URL.
    pub fn url(&self) -> String {
        format!(
            "https://{}/{}/{}/archive/{}.tar.gz",
            self.host, self.user, self.repo, self.commit
        )
    }
}

/// A SHA-256 checksum in opam's `sha256=<hex>` notation.
///
/// # Example
///
/// ```
/// use flambda_switch_core::Checksum;
///
/// assert_eq!(Checksum::from_user("deadbeef").to_string(), "sha256=deadbeef");
/// assert_eq!(Checksum::from_user("sha256=deadbeef").digest(), "deadbeef");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Checksum(String);

impl Checksum {
    /// Wrap a bare hex digest.
    pub fn from_digest(digest: impl AsRef<str>) -> Self {
        Self(digest.as_ref().to_string())
    }

    /// Normalize user input. A leading `sha256=` is stripped once; whatever
    /// remains is taken as the digest verbatim.
    pub fn from_user(input: &str) -> Self {
        let digest = input.strip_prefix(SHA256_PREFIX).unwrap_or(input);
        Self::from_digest(digest)
    }

    /// Always `sha256`.
    pub fn algorithm(&self) -> &'static str {
        "sha256"
    }

    /// Hex digest without the algorithm tag.
    pub fn digest(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SHA256_PREFIX}{}", self.0)
    }
}

/// Stream `url` through SHA-256 without holding the body in memory.
///
/// # Errors
///
/// Returns [`DownloadError::Http`] on connection failures and non-2xx
/// responses.
pub async fn compute_archive_checksum(
    client: &Client,
    url: &str,
    reporter: &dyn Reporter,
) -> Result<Checksum, DownloadError> {
    reporter.info(&format!("Downloading {url} to calculate checksum..."));

    let response = client
        .get(url)
        .send()
        .await?
        .error_for_status()?;

    let total_size = response.content_length();
    let mut stream = response.bytes_stream();
    let mut hasher = Sha256::new();
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        hasher.update(&chunk);
        downloaded += chunk.len() as u64;
    }

    let checksum = Checksum::from_digest(hex::encode(hasher.finalize()));
    tracing::info!(url, downloaded, ?total_size, %checksum, "hashed source archive");
    Ok(checksum)
}

/// Produce the checksum to embed: normalize `user_input` when present,
/// otherwise download and hash `source`.
///
/// # Errors
///
/// Propagates [`DownloadError`] when the archive has to be fetched.
pub async fn resolve_checksum(
    user_input: Option<&str>,
    source: &ArchiveSource,
    client: &Client,
    reporter: &dyn Reporter,
) -> Result<Checksum, DownloadError> {
    if let Some(input) = user_input {
        return Ok(Checksum::from_user(input));
    }
    reporter.info("No checksum provided, calculating...");
    compute_archive_checksum(client, &source.url(), reporter).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullReporter;
    use mockito::Server;

    #[test]
    fn test_archive_url() {
        let source = ArchiveSource::new("github.com", "ocaml-flambda", "flambda-backend", "abc123");
        assert_eq!(
            source.url(),
            "https://github.com/ocaml-flambda/flambda-backend/archive/abc123.tar.gz"
        );

        let fork = ArchiveSource::new("github.com", "someone", "fork", "82e4553f");
        assert_eq!(
            fork.url(),
            "https://github.com/someone/fork/archive/82e4553f.tar.gz"
        );
    }

    #[test]
    fn test_bare_digest_gets_prefix() {
        let checksum = Checksum::from_user("deadbeef");
        assert_eq!(checksum.to_string(), "sha256=deadbeef");
        assert_eq!(checksum.digest(), "deadbeef");
        assert_eq!(checksum.algorithm(), "sha256");
    }

    #[test]
    fn test_prefixed_digest_unchanged() {
        let input = "sha256=c390e80899a92df4b39685987247b202bb0ce992084bd5c6139f1a029f39d43d";
        assert_eq!(Checksum::from_user(input).to_string(), input);
    }

    #[test]
    fn test_user_digest_not_validated() {
        // Anything goes, including other algorithm tags.
        assert_eq!(Checksum::from_user("md5=abc").to_string(), "sha256=md5=abc");
        assert_eq!(Checksum::from_user("").to_string(), "sha256=");
    }

    #[tokio::test]
    async fn test_resolve_prefers_user_input() {
        // Unroutable host: resolving must not touch the network.
        let source = ArchiveSource::new("127.0.0.1:9", "u", "r", "c");
        let checksum = resolve_checksum(
            Some("sha256=deadbeef"),
            &source,
            &Client::new(),
            &NullReporter,
        )
        .await
        .unwrap();
        assert_eq!(checksum.to_string(), "sha256=deadbeef");
    }

    #[tokio::test]
    async fn test_compute_archive_checksum() {
        let mut server = Server::new_async().await;
        let body = vec![7u8; 100_000];
        let _m = server
            .mock("GET", "/ocaml-flambda/flambda-backend/archive/abc123.tar.gz")
            .with_status(200)
            .with_body(&body)
            .create_async()
            .await;

        let url = format!(
            "{}/ocaml-flambda/flambda-backend/archive/abc123.tar.gz",
            server.url()
        );
        let checksum = compute_archive_checksum(&Client::new(), &url, &NullReporter)
            .await
            .unwrap();

        assert_eq!(checksum.digest(), hex::encode(Sha256::digest(&body)));
        assert!(checksum.to_string().starts_with("sha256="));
        assert_eq!(checksum.digest().len(), 64);
    }

    #[tokio::test]
    async fn test_download_uses_client_user_agent() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/archive.tar.gz")
            .match_header("user-agent", crate::USER_AGENT)
            .with_status(200)
            .with_body("abc")
            .expect(1)
            .create_async()
            .await;

        let client = crate::context::http_client().unwrap();
        let url = format!("{}/archive.tar.gz", server.url());
        compute_archive_checksum(&client, &url, &NullReporter)
            .await
            .unwrap();
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_error_is_fatal() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/missing.tar.gz")
            .with_status(404)
            .create_async()
            .await;

        let url = format!("{}/missing.tar.gz", server.url());
        let err = compute_archive_checksum(&Client::new(), &url, &NullReporter)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Http(_)));
    }
}
