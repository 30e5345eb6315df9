//! Canonical URL and on-disk path derivation.
//!
//! One bijection between logical coordinates and locations: upstream URLs
//! live under `{upstream}/archive/{archive}/{timestamp}/{repo_path}`, the
//! local metadata tree mirrors that under `{root}/archive/…`, and payload
//! files have a single physical copy under `{root}/by-hash/` that the
//! timestamped pool paths hard-link to.

use std::path::{Path, PathBuf};

use url::Url;

use crate::error::{MirrorError, MirrorResult};

/// Path derivation for one replica root and upstream.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
    upstream: Url,
}

impl Layout {
    /// Create a layout rooted at the local replica directory.
    pub fn new(root: PathBuf, upstream: Url) -> Self {
        Self { root, upstream }
    }

    /// The local replica root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Upstream URL of the timestamp discovery document.
    pub fn timestamps_url(&self, archive: &str) -> MirrorResult<Url> {
        self.upstream_join(&format!("mr/timestamp/{archive}"))
    }

    /// Upstream URL of a repository file.
    pub fn upstream_url(&self, archive: &str, timestamp: &str, repo_path: &str) -> MirrorResult<Url> {
        self.upstream_join(&format!("archive/{archive}/{timestamp}/{repo_path}"))
    }

    /// Local path of a repository file in the metadata tree.
    pub fn local_path(&self, archive: &str, timestamp: &str, repo_path: &str) -> PathBuf {
        self.root
            .join("archive")
            .join(archive)
            .join(timestamp)
            .join(repo_path)
    }

    /// Physical content-addressed path of a payload file.
    pub fn by_hash_path(&self, sha256: &str) -> PathBuf {
        self.root
            .join("by-hash")
            .join(&sha256[..2.min(sha256.len())])
            .join(sha256)
    }

    /// The advisory lock file of an archive.
    pub fn lock_path(&self, archive: &str) -> PathBuf {
        self.root.join(".locks").join(format!("{archive}.lock"))
    }

    /// Repo-relative directory holding a suite's index files. Archives
    /// using the sentinel timestamp are laid out flat, without the
    /// `dists/` level.
    pub fn suite_dir(timestamp: &str, suite: &str) -> String {
        if timestamp == debsnap_store::SENTINEL_TIMESTAMP {
            suite.to_string()
        } else {
            format!("dists/{suite}")
        }
    }

    /// Repo-relative path of a suite-level file (e.g. `InRelease`).
    pub fn suite_file(timestamp: &str, suite: &str, name: &str) -> String {
        format!("{}/{name}", Self::suite_dir(timestamp, suite))
    }

    /// Release-relative path of the binary package index for one
    /// (component, arch), without compression extension.
    pub fn packages_index(component: &str, arch: &str) -> String {
        format!("{component}/binary-{arch}/Packages")
    }

    /// Release-relative path of the source index for one component,
    /// without compression extension.
    pub fn sources_index(component: &str) -> String {
        format!("{component}/source/Sources")
    }

    /// Release-relative path of the installer checksum list for one
    /// (component, arch).
    pub fn installer_sums(component: &str, arch: &str) -> String {
        format!("{component}/installer-{arch}/current/images/SHA256SUMS")
    }

    fn upstream_join(&self, rest: &str) -> MirrorResult<Url> {
        // treat the upstream root as a directory regardless of a trailing slash
        let base = if self.upstream.path().ends_with('/') {
            self.upstream.clone()
        } else {
            let mut base = self.upstream.clone();
            base.set_path(&format!("{}/", self.upstream.path()));
            base
        };
        base.join(rest)
            .map_err(|e| MirrorError::InvalidArgument(format!("bad URL {rest}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> Layout {
        Layout::new(
            PathBuf::from("/srv/snapshot"),
            Url::parse("http://snapshot.notset.fr").unwrap(),
        )
    }

    #[test]
    fn test_upstream_urls() {
        let l = layout();
        assert_eq!(
            l.timestamps_url("debian").unwrap().as_str(),
            "http://snapshot.notset.fr/mr/timestamp/debian"
        );
        assert_eq!(
            l.upstream_url(
                "debian",
                "20210221T150011Z",
                "dists/bullseye/main/binary-all/Packages.xz"
            )
            .unwrap()
            .as_str(),
            "http://snapshot.notset.fr/archive/debian/20210221T150011Z/dists/bullseye/main/binary-all/Packages.xz"
        );
    }

    #[test]
    fn test_upstream_with_trailing_slash() {
        let l = Layout::new(
            PathBuf::from("/srv/snapshot"),
            Url::parse("http://example.org/base/").unwrap(),
        );
        assert_eq!(
            l.timestamps_url("debian").unwrap().as_str(),
            "http://example.org/base/mr/timestamp/debian"
        );
    }

    #[test]
    fn test_local_paths() {
        let l = layout();
        assert_eq!(
            l.local_path("debian", "20210221T150011Z", "dists/bullseye/Release"),
            PathBuf::from("/srv/snapshot/archive/debian/20210221T150011Z/dists/bullseye/Release")
        );
        assert_eq!(
            l.by_hash_path("aabbccdd"),
            PathBuf::from("/srv/snapshot/by-hash/aa/aabbccdd")
        );
        assert_eq!(
            l.lock_path("debian"),
            PathBuf::from("/srv/snapshot/.locks/debian.lock")
        );
    }

    #[test]
    fn test_suite_layout() {
        assert_eq!(
            Layout::suite_file("20210221T150011Z", "bullseye", "InRelease"),
            "dists/bullseye/InRelease"
        );
        // sentinel archives are laid out flat
        assert_eq!(
            Layout::suite_file(debsnap_store::SENTINEL_TIMESTAMP, "r4.1", "Release"),
            "r4.1/Release"
        );
    }

    #[test]
    fn test_index_paths() {
        assert_eq!(
            Layout::packages_index("main", "amd64"),
            "main/binary-amd64/Packages"
        );
        assert_eq!(Layout::sources_index("main"), "main/source/Sources");
        assert_eq!(
            Layout::installer_sums("main", "amd64"),
            "main/installer-amd64/current/images/SHA256SUMS"
        );
    }
}
