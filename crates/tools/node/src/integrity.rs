//! SHA-256 verification of downloaded archives against `SHASUMS256.txt`.

use crate::fetch::Fetcher;
use noderig_core::{Error, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Compute the lowercase hex SHA-256 of a file.
pub async fn compute_hash(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| Error::io(e, Some(path.to_path_buf()), "open"))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        let n = file
            .read(&mut buffer)
            .await
            .map_err(|e| Error::io(e, Some(path.to_path_buf()), "read"))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Find the hash published for `file_name` in manifest text.
///
/// Lines are compared in lowercase; the first line ending with the file name
/// wins and everything before the name is the hash.
#[must_use]
pub fn find_hash(manifest: &str, file_name: &str) -> Option<String> {
    let needle = file_name.to_lowercase();
    manifest
        .lines()
        .map(|line| line.trim_end().to_lowercase())
        .find(|line| line.ends_with(&needle))
        .map(|line| line[..line.len() - needle.len()].trim().to_string())
        .filter(|hash| !hash.is_empty())
}

/// Verifies archives against the mirror's published checksums.
pub struct IntegrityVerifier<'a> {
    fetcher: &'a dyn Fetcher,
}

impl<'a> IntegrityVerifier<'a> {
    /// Create a verifier fetching manifests through `fetcher`.
    #[must_use]
    pub fn new(fetcher: &'a dyn Fetcher) -> Self {
        Self { fetcher }
    }

    /// Look up the published hash of `file_name`.
    ///
    /// The manifest is fetched on every call.
    pub async fn lookup_published_hash(
        &self,
        manifest_url: &str,
        file_name: &str,
    ) -> Result<String> {
        let manifest = self.fetcher.fetch_text(manifest_url).await?;
        find_hash(&manifest, file_name)
            .ok_or_else(|| Error::hash_not_found(file_name, manifest_url))
    }

    /// Whether the file at `path` exists and matches its published hash.
    pub async fn verify(&self, path: &Path, manifest_url: &str, file_name: &str) -> Result<bool> {
        if !exists(path).await? {
            return Ok(false);
        }
        Ok(self.check(path, manifest_url, file_name).await?.is_none())
    }

    /// Compare a file with its published hash.
    ///
    /// Returns `None` when it matches, or `Some((expected, actual))` otherwise.
    /// A missing file reports an empty `actual`.
    pub async fn check(
        &self,
        path: &Path,
        manifest_url: &str,
        file_name: &str,
    ) -> Result<Option<(String, String)>> {
        let present = exists(path).await?;
        let expected = self.lookup_published_hash(manifest_url, file_name).await?;
        if !present {
            return Ok(Some((expected, String::new())));
        }

        let actual = compute_hash(path).await?;
        debug!(file = %file_name, %expected, %actual, "Compared archive hash");
        if actual == expected {
            Ok(None)
        } else {
            Ok(Some((expected, actual)))
        }
    }
}

async fn exists(path: &Path) -> Result<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| Error::io(e, Some(path.to_path_buf()), "stat"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::TempDir;

    const MANIFEST: &str = "\
1111111111111111111111111111111111111111111111111111111111111111  node-v18.0.0-darwin-x64.tar.gz
2222222222222222222222222222222222222222222222222222222222222222  node-v18.0.0-linux-x64.tar.gz
3333333333333333333333333333333333333333333333333333333333333333  node-v18.0.0-linux-x64.tar.xz
";

    struct StaticManifest(String);

    #[async_trait]
    impl Fetcher for StaticManifest {
        async fn fetch_text(&self, _url: &str) -> Result<String> {
            Ok(self.0.clone())
        }

        async fn download_to(&self, url: &str, _dest: &Path) -> Result<u64> {
            Err(Error::download(url, "not served"))
        }
    }

    #[test]
    fn test_find_hash_exact_file() {
        assert_eq!(
            find_hash(MANIFEST, "node-v18.0.0-linux-x64.tar.gz").as_deref(),
            Some("2222222222222222222222222222222222222222222222222222222222222222")
        );
    }

    #[test]
    fn test_find_hash_is_case_insensitive() {
        let manifest = "ABCDEF  NODE-V18.0.0-WIN-X64.ZIP\r\n";
        assert_eq!(
            find_hash(manifest, "node-v18.0.0-win-x64.zip").as_deref(),
            Some("abcdef")
        );
    }

    #[test]
    fn test_find_hash_missing() {
        assert_eq!(find_hash(MANIFEST, "node-v18.0.0-win-x64.zip"), None);
    }

    #[tokio::test]
    async fn test_compute_hash_of_known_content() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hello.txt");
        std::fs::write(&path, b"hello").unwrap();

        assert_eq!(
            compute_hash(&path).await.unwrap(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[tokio::test]
    async fn test_compute_hash_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = compute_hash(&temp.path().join("absent")).await.unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[tokio::test]
    async fn test_verify_matches_and_mismatches() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hello.txt");
        std::fs::write(&path, b"hello").unwrap();

        let good = StaticManifest(
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824  hello.txt\n".into(),
        );
        assert!(IntegrityVerifier::new(&good).verify(&path, "m", "hello.txt").await.unwrap());

        let bad = StaticManifest(format!("{}  hello.txt\n", "0".repeat(64)));
        assert!(!IntegrityVerifier::new(&bad).verify(&path, "m", "hello.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_missing_file_is_false() {
        let temp = TempDir::new().unwrap();
        let fetcher = StaticManifest(MANIFEST.to_string());
        let verifier = IntegrityVerifier::new(&fetcher);

        let ok = verifier
            .verify(
                &temp.path().join("node-v18.0.0-linux-x64.tar.gz"),
                "m",
                "node-v18.0.0-linux-x64.tar.gz",
            )
            .await
            .unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn test_lookup_reports_hash_not_found() {
        let fetcher = StaticManifest(MANIFEST.to_string());
        let err = IntegrityVerifier::new(&fetcher)
            .lookup_published_hash("http://m/SHASUMS256.txt", "node-v18.0.0-win-x64.zip")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HashNotFound { .. }));
    }
}
