//! The ingestion pipeline.
//!
//! A single driver iterates the selected (archive, timestamp, suite,
//! component, architecture) tuples sequentially; within a tuple, payload
//! downloads fan out to a bounded worker pool. All provenance writes for a
//! tuple happen in one store transaction after its files are on disk.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use apt_index::{BinaryPackage, Compression, ParagraphReader, Release, SourcePackage};
use debsnap_store::{FileRef, PackageFileRecord, Store, TupleKey};

use crate::config::Config;
use crate::error::{FetchError, MirrorError, MirrorResult};
use crate::fetch::Fetcher;
use crate::hasher;
use crate::layout::Layout;
use crate::lock::ArchiveLock;

/// One `--timestamp` value: a literal or a `lo:hi` range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampSelector {
    /// A literal timestamp.
    Literal(String),
    /// A closed range; either bound may be absent.
    Range {
        /// Lower bound, inclusive.
        lo: Option<String>,
        /// Upper bound, inclusive.
        hi: Option<String>,
    },
}

impl TimestampSelector {
    /// Parse one CLI value.
    pub fn parse(value: &str) -> MirrorResult<Self> {
        let selector = if let Some((lo, hi)) = value.split_once(':') {
            let bound = |s: &str| -> MirrorResult<Option<String>> {
                if s.is_empty() {
                    Ok(None)
                } else if debsnap_store::is_valid_timestamp(s) {
                    Ok(Some(s.to_string()))
                } else {
                    Err(MirrorError::InvalidArgument(format!(
                        "invalid timestamp bound: {s}"
                    )))
                }
            };
            TimestampSelector::Range {
                lo: bound(lo)?,
                hi: bound(hi)?,
            }
        } else if debsnap_store::is_valid_timestamp(value) {
            TimestampSelector::Literal(value.to_string())
        } else {
            return Err(MirrorError::InvalidArgument(format!(
                "invalid timestamp: {value}"
            )));
        };
        Ok(selector)
    }

    /// Whether the selector needs the upstream timestamp list.
    pub fn needs_discovery(&self) -> bool {
        matches!(self, TimestampSelector::Range { .. })
    }

    /// Whether a timestamp satisfies the selector.
    pub fn matches(&self, value: &str) -> bool {
        match self {
            TimestampSelector::Literal(l) => l == value,
            TimestampSelector::Range { lo, hi } => {
                lo.as_deref().map_or(true, |lo| value >= lo)
                    && hi.as_deref().map_or(true, |hi| value <= hi)
            }
        }
    }
}

/// What the user asked to ingest.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Archives to mirror.
    pub archives: Vec<String>,
    /// Timestamp selectors; empty means every upstream timestamp.
    pub timestamps: Vec<TimestampSelector>,
    /// Suites to mirror.
    pub suites: Vec<String>,
    /// Components to mirror, intersected with what the Release advertises.
    pub components: Vec<String>,
    /// Architectures to mirror; empty means everything advertised.
    pub architectures: Vec<String>,
}

impl Selection {
    fn wants_arch(&self, arch: &str) -> bool {
        self.architectures.is_empty() || self.architectures.iter().any(|a| a == arch)
    }

    fn wants_source(&self) -> bool {
        self.architectures.is_empty() || self.architectures.iter().any(|a| a == "source")
    }
}

/// Aggregated outcome of a run.
#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    /// Tuples fully ingested.
    pub tuples_ok: usize,
    /// Tuples skipped by policy (already provisioned, not advertised).
    pub tuples_skipped: usize,
    /// Tuples aborted by an error.
    pub tuples_failed: usize,
    /// Payload files newly placed under `by-hash`.
    pub files_downloaded: usize,
    /// Per-file failures (404, hash or size mismatch).
    pub files_failed: usize,
    /// Files whose on-disk content no longer matches the store (`--check-only`).
    pub files_drifted: usize,
}

impl RunSummary {
    /// Exit-code predicate: true when every selected tuple succeeded or
    /// was skipped by policy and no file failed or drifted.
    pub fn success(&self) -> bool {
        self.tuples_failed == 0 && self.files_failed == 0 && self.files_drifted == 0
    }
}

struct TupleStats {
    downloaded: usize,
    failed: usize,
}

/// One file to realize on disk and record in the store.
#[derive(Debug, Clone)]
struct IngestRecord {
    sha256: String,
    /// Declared size; installer checksum lists carry none.
    size: Option<u64>,
    /// Repo-relative directory.
    path: String,
    /// File name.
    name: String,
    /// Architecture for binary packages.
    architecture: Option<String>,
    link: PackageLink,
}

#[derive(Debug, Clone)]
enum PackageLink {
    Source { name: String, version: String },
    Binary { name: String, version: String },
    Bare,
}

/// The pipeline driver.
pub struct Ingester {
    config: Config,
    layout: Layout,
    fetcher: Fetcher,
    store: Option<Store>,
    discovered: Mutex<HashMap<String, Arc<Vec<String>>>>,
}

impl Ingester {
    /// Connect collaborators per the configuration. The store is only
    /// opened when the run reads or writes provenance.
    pub async fn new(config: Config) -> MirrorResult<Self> {
        let layout = Layout::new(config.root.clone(), config.upstream.clone());
        let fetcher = Fetcher::new(&config)?;
        let store = match &config.database_url {
            Some(url) if config.flags.writes_db() || config.flags.check_only => {
                Some(Store::connect(url).await?)
            }
            _ => None,
        };
        Ok(Self {
            config,
            layout,
            fetcher,
            store,
            discovered: Mutex::new(HashMap::new()),
        })
    }

    /// Run the whole selection.
    pub async fn run(&self, selection: &Selection) -> MirrorResult<RunSummary> {
        if self.config.flags.check_only {
            return self.check_only().await;
        }

        let mut summary = RunSummary::default();
        for archive in &selection.archives {
            let _lock = ArchiveLock::acquire(&self.layout.lock_path(archive), archive)?;
            let timestamps = self.timestamps_for(archive, selection).await?;
            info!(%archive, count = timestamps.len(), "timestamps selected");

            for timestamp in timestamps.iter() {
                for suite in &selection.suites {
                    match self
                        .ingest_suite(archive, timestamp, suite, selection, &mut summary)
                        .await
                    {
                        Ok(()) => {}
                        Err(e) => {
                            warn!(%archive, %timestamp, %suite, error = %e, "suite ingestion failed");
                            summary.tuples_failed += 1;
                        }
                    }
                }
            }
        }
        Ok(summary)
    }

    /// `--check-only`: re-hash everything under `by-hash` against its name
    /// and the recorded size.
    async fn check_only(&self) -> MirrorResult<RunSummary> {
        let store = self.store.as_ref().ok_or_else(|| {
            MirrorError::InvalidArgument("--check-only needs SNAPSHOT_DB_URL".to_string())
        })?;
        let mut summary = RunSummary::default();

        let by_hash = self.layout.root().join("by-hash");
        if !by_hash.exists() {
            return Ok(summary);
        }
        let mut shards = tokio::fs::read_dir(&by_hash).await?;
        while let Some(shard) = shards.next_entry().await? {
            if !shard.file_type().await?.is_dir() {
                continue;
            }
            let mut entries = tokio::fs::read_dir(shard.path()).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().to_string();
                if name.ends_with(".part") {
                    continue;
                }
                let written = hasher::sha256_file(&entry.path()).await?;
                let size_ok = match store.file_size(&name).await? {
                    Some(size) => size == written.size,
                    None => {
                        warn!(sha256 = %name, "file on disk but unknown to the store");
                        true
                    }
                };
                if written.sha256 != name || !size_ok {
                    warn!(
                        expected = %name,
                        actual = %written.sha256,
                        size = written.size,
                        "content drift"
                    );
                    summary.files_drifted += 1;
                }
            }
        }
        info!(drifted = summary.files_drifted, "check finished");
        Ok(summary)
    }

    /// Resolve the timestamps to ingest for one archive, hitting the
    /// upstream discovery endpoint once per run when a range or an empty
    /// selection requires it.
    async fn timestamps_for(
        &self,
        archive: &str,
        selection: &Selection,
    ) -> MirrorResult<Vec<String>> {
        let needs_discovery = selection.timestamps.is_empty()
            || selection.timestamps.iter().any(|s| s.needs_discovery());

        let known = if needs_discovery {
            Some(self.discover_timestamps(archive).await?)
        } else {
            None
        };

        let mut timestamps: Vec<String> = if selection.timestamps.is_empty() {
            known.as_ref().expect("discovered above").to_vec()
        } else {
            let mut out = Vec::new();
            for selector in &selection.timestamps {
                match selector {
                    TimestampSelector::Literal(value) => out.push(value.clone()),
                    TimestampSelector::Range { .. } => out.extend(
                        known
                            .as_ref()
                            .expect("discovered above")
                            .iter()
                            .filter(|t| selector.matches(t))
                            .cloned(),
                    ),
                }
            }
            out
        };
        timestamps.sort();
        timestamps.dedup();
        Ok(timestamps)
    }

    async fn discover_timestamps(&self, archive: &str) -> MirrorResult<Arc<Vec<String>>> {
        if let Some(cached) = self.discovered.lock().await.get(archive) {
            return Ok(cached.clone());
        }
        let url = self.layout.timestamps_url(archive)?;
        let body = self.fetcher.fetch_index(&url).await?;
        let value: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|e| MirrorError::Upstream(format!("timestamp list for {archive}: {e}")))?;
        let list = match &value {
            serde_json::Value::Array(list) => list,
            serde_json::Value::Object(map) => map
                .get("result")
                .and_then(|r| r.as_array())
                .ok_or_else(|| {
                    MirrorError::Upstream(format!("timestamp list for {archive}: no result"))
                })?,
            _ => {
                return Err(MirrorError::Upstream(format!(
                    "timestamp list for {archive}: unexpected shape"
                )))
            }
        };
        let timestamps: Vec<String> = list
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::to_string)
            .collect();
        let timestamps = Arc::new(timestamps);
        self.discovered
            .lock()
            .await
            .insert(archive.to_string(), timestamps.clone());
        Ok(timestamps)
    }

    /// Ingest every selected tuple of one (archive, timestamp, suite).
    async fn ingest_suite(
        &self,
        archive: &str,
        timestamp: &str,
        suite: &str,
        selection: &Selection,
        summary: &mut RunSummary,
    ) -> MirrorResult<()> {
        let release = self.fetch_release(archive, timestamp, suite).await?;

        let components: Vec<&String> = selection
            .components
            .iter()
            .filter(|c| release.components.is_empty() || release.components.contains(c))
            .collect();
        let architectures: Vec<String> = release
            .architectures
            .iter()
            .filter(|a| selection.wants_arch(a))
            .cloned()
            .collect();

        for component in components {
            for arch in &architectures {
                let tuple = TupleKey {
                    archive: archive.to_string(),
                    timestamp: timestamp.to_string(),
                    suite: suite.to_string(),
                    component: component.to_string(),
                    architecture: arch.to_string(),
                };
                self.ingest_tuple(&tuple, &release, summary).await;
            }
            if selection.wants_source() {
                let tuple = TupleKey {
                    archive: archive.to_string(),
                    timestamp: timestamp.to_string(),
                    suite: suite.to_string(),
                    component: component.to_string(),
                    architecture: "source".to_string(),
                };
                self.ingest_tuple(&tuple, &release, summary).await;
            }
        }
        Ok(())
    }

    async fn ingest_tuple(&self, tuple: &TupleKey, release: &Release, summary: &mut RunSummary) {
        match self.try_ingest_tuple(tuple, release).await {
            Ok(Some(stats)) => {
                info!(
                    %tuple,
                    downloaded = stats.downloaded,
                    failed = stats.failed,
                    "tuple ingested"
                );
                summary.tuples_ok += 1;
                summary.files_downloaded += stats.downloaded;
                summary.files_failed += stats.failed;
            }
            Ok(None) => summary.tuples_skipped += 1,
            Err(e) => {
                warn!(%tuple, error = %e, "tuple ingestion failed");
                summary.tuples_failed += 1;
            }
        }
    }

    /// The per-tuple worker: index acquisition, file enumeration, download
    /// fan-out, then one provisioning transaction. Returns `None` when the
    /// tuple is skipped by policy.
    async fn try_ingest_tuple(
        &self,
        tuple: &TupleKey,
        release: &Release,
    ) -> MirrorResult<Option<TupleStats>> {
        if !self.config.flags.ignore_provisioned {
            if let Some(store) = &self.store {
                if store.is_provisioned(tuple).await? {
                    debug!(%tuple, "already provisioned");
                    return Ok(None);
                }
            }
        }

        let index_rel = if tuple.architecture == "source" {
            Layout::sources_index(&tuple.component)
        } else {
            Layout::packages_index(&tuple.component, &tuple.architecture)
        };
        let Some(index) = self.acquire_index(tuple, release, &index_rel).await? else {
            debug!(%tuple, "index not advertised by Release");
            return Ok(None);
        };

        let mut records = if tuple.architecture == "source" {
            enumerate_sources(&index)?
        } else {
            enumerate_packages(&index)?
        };

        if tuple.architecture != "source"
            && tuple.architecture != "all"
            && !self.config.flags.skip_installer_files
        {
            records.extend(self.enumerate_installer(tuple, release).await?);
        }

        let (stats, failed) = self.realize_records(tuple, &records).await?;

        if self.config.flags.writes_db() {
            self.provision_tuple(tuple, &records, &failed).await?;
        }

        Ok(Some(stats))
    }

    /// Fetch `InRelease` (falling back to `Release`), store the metadata
    /// copy, and parse it. Failure here is fatal for the (archive,
    /// timestamp, suite).
    async fn fetch_release(
        &self,
        archive: &str,
        timestamp: &str,
        suite: &str,
    ) -> MirrorResult<Release> {
        let mut last_error: Option<MirrorError> = None;
        for name in ["InRelease", "Release"] {
            let repo_path = Layout::suite_file(timestamp, suite, name);
            if !self.config.flags.downloads() {
                // --provision-db-only prefers what an earlier run mirrored
                let local = self.layout.local_path(archive, timestamp, &repo_path);
                if let Ok(body) = tokio::fs::read(&local).await {
                    return Ok(Release::parse(strip_armor(&body))?);
                }
            }
            let url = self.layout.upstream_url(archive, timestamp, &repo_path)?;
            match self.fetcher.fetch_index(&url).await {
                Ok(body) => {
                    if self.config.flags.downloads() {
                        self.store_metadata(archive, timestamp, &repo_path, &body)
                            .await?;
                    }
                    return Ok(Release::parse(strip_armor(&body))?);
                }
                Err(FetchError::NotFound(_)) => continue,
                Err(e) => last_error = Some(e.into()),
            }
        }
        Err(last_error.unwrap_or_else(|| {
            MirrorError::Upstream(format!(
                "no Release file for {archive}/{timestamp}/{suite}"
            ))
        }))
    }

    /// Fetch and verify one index advertised by the Release, preferring the
    /// strongest compression. Returns the decompressed bytes, or `None`
    /// when the Release advertises no variant of it.
    async fn acquire_index(
        &self,
        tuple: &TupleKey,
        release: &Release,
        release_rel: &str,
    ) -> MirrorResult<Option<Vec<u8>>> {
        let candidates = [".xz", ".gz", ".bz2", ""];
        let Some((rel, entry)) = candidates.iter().find_map(|ext| {
            let rel = format!("{release_rel}{ext}");
            release.file(&rel).map(|entry| (rel, entry.clone()))
        }) else {
            return Ok(None);
        };

        let repo_path = format!(
            "{}/{}",
            Layout::suite_dir(&tuple.timestamp, &tuple.suite),
            rel
        );

        let compressed: Vec<u8> = if self.config.flags.downloads() {
            let url = self
                .layout
                .upstream_url(&tuple.archive, &tuple.timestamp, &repo_path)?;
            let body = self.fetcher.fetch_index(&url).await?;
            let digest = hex::encode(<sha2::Sha256 as sha2::Digest>::digest(body.as_slice()));
            if digest != entry.sha256 || body.len() as u64 != entry.size {
                return Err(FetchError::HashMismatch {
                    url: url.to_string(),
                    expected: entry.sha256.clone(),
                    actual: digest,
                }
                .into());
            }
            self.store_metadata(&tuple.archive, &tuple.timestamp, &repo_path, &body)
                .await?;
            body.to_vec()
        } else {
            // --provision-db-only re-parses what an earlier run mirrored
            let local = self
                .layout
                .local_path(&tuple.archive, &tuple.timestamp, &repo_path);
            tokio::fs::read(&local).await?
        };

        let decompressed = Compression::from_name(&rel)?.decompress(&compressed)?;
        Ok(Some(decompressed))
    }

    /// Write an index/metadata file into the timestamped metadata tree.
    async fn store_metadata(
        &self,
        archive: &str,
        timestamp: &str,
        repo_path: &str,
        body: &[u8],
    ) -> MirrorResult<()> {
        let path = self.layout.local_path(archive, timestamp, repo_path);
        let mut writer =
            hasher::PartWriter::create(&path, self.config.flags.no_clean_part_file).await?;
        writer.write(body).await?;
        writer
            .commit(None, None)
            .await?
            .map_err(|_| MirrorError::Upstream("metadata write verification failed".into()))?;
        Ok(())
    }

    /// Fetch and parse the installer `SHA256SUMS` for one (component, arch),
    /// yielding bare-file records for every referenced image.
    async fn enumerate_installer(
        &self,
        tuple: &TupleKey,
        release: &Release,
    ) -> MirrorResult<Vec<IngestRecord>> {
        let rel = Layout::installer_sums(&tuple.component, &tuple.architecture);
        // installer checksum lists are advertised by some releases only
        let advertised = release.file(&rel).is_some();
        let repo_path = format!(
            "{}/{}",
            Layout::suite_dir(&tuple.timestamp, &tuple.suite),
            rel
        );
        let url = self
            .layout
            .upstream_url(&tuple.archive, &tuple.timestamp, &repo_path)?;
        let body = match self.fetcher.fetch_index(&url).await {
            Ok(body) => body,
            Err(FetchError::NotFound(_)) if !advertised => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if self.config.flags.downloads() {
            self.store_metadata(&tuple.archive, &tuple.timestamp, &repo_path, &body)
                .await?;
        }

        let base_dir = repo_path
            .rsplit_once('/')
            .map(|(dir, _)| dir.to_string())
            .unwrap_or_default();
        let text = String::from_utf8_lossy(&body);
        Ok(parse_sha256sums(&text, &base_dir))
    }

    /// Download fan-out over a bounded pool. Per-file failures are counted
    /// and reported back (those records are not provisioned); anything
    /// else aborts the tuple.
    async fn realize_records(
        &self,
        tuple: &TupleKey,
        records: &[IngestRecord],
    ) -> MirrorResult<(TupleStats, HashSet<String>)> {
        let mut stats = TupleStats {
            downloaded: 0,
            failed: 0,
        };
        let mut failed_hashes = HashSet::new();

        let mut results = futures::stream::iter(records.iter())
            .map(|record| async move { (record, self.realize_file(tuple, record).await) })
            .buffer_unordered(self.config.download_workers.max(1));

        let mut fatal: Option<MirrorError> = None;
        while let Some((record, result)) = results.next().await {
            match result {
                Ok(true) => stats.downloaded += 1,
                Ok(false) => {}
                Err(e) if e.is_per_file() => {
                    warn!(sha256 = %record.sha256, name = %record.name, error = %e, "file failed");
                    stats.failed += 1;
                    failed_hashes.insert(record.sha256.clone());
                }
                Err(e) => {
                    fatal.get_or_insert(e.into());
                }
            }
        }
        if let Some(e) = fatal {
            return Err(e);
        }
        Ok((stats, failed_hashes))
    }

    /// Place one file: download into `by-hash` when missing, then hard-link
    /// the canonical timestamped path onto it. Returns whether a download
    /// happened.
    async fn realize_file(&self, tuple: &TupleKey, record: &IngestRecord) -> Result<bool, FetchError> {
        let by_hash = self.layout.by_hash_path(&record.sha256);
        let repo_path = format!("{}/{}", record.path, record.name);

        let mut downloaded = false;
        if !by_hash.exists() {
            if !self.config.flags.downloads() {
                // --provision-db-only records only what is on disk
                return Err(FetchError::NotFound(repo_path));
            }
            let url = self
                .layout
                .upstream_url(&tuple.archive, &tuple.timestamp, &repo_path)
                .map_err(|e| FetchError::Transient {
                    url: repo_path.clone(),
                    reason: e.to_string(),
                })?;
            self.fetcher
                .fetch_to_path(&url, &by_hash, Some(&record.sha256), record.size)
                .await?;
            downloaded = true;
        }

        let canonical = self
            .layout
            .local_path(&tuple.archive, &tuple.timestamp, &repo_path);
        link_into_place(&by_hash, &canonical).map_err(|e| FetchError::Io {
            url: repo_path,
            source: e,
        })?;
        Ok(downloaded)
    }

    /// The tuple's store transaction: upsert entities, packages, files and
    /// observations, mark provisioned, commit.
    async fn provision_tuple(
        &self,
        tuple: &TupleKey,
        records: &[IngestRecord],
        failed: &HashSet<String>,
    ) -> MirrorResult<()> {
        let store = self.store.as_ref().expect("writes_db implies store");
        let mut tx = store.begin_tuple(tuple.clone()).await?;

        for record in records {
            if failed.contains(&record.sha256) {
                continue;
            }
            let Some(size) = self.record_size(record).await else {
                debug!(sha256 = %record.sha256, "skipping unprovisioned file");
                continue;
            };
            let file_record = PackageFileRecord {
                file: FileRef {
                    sha256: record.sha256.clone(),
                    size,
                },
                path: record.path.clone(),
                name: record.name.clone(),
                architecture: record.architecture.clone(),
            };
            match &record.link {
                PackageLink::Source { name, version } => {
                    tx.record_source_package(name, version, std::slice::from_ref(&file_record))
                        .await?
                }
                PackageLink::Binary { name, version } => {
                    tx.record_binary_package(name, version, std::slice::from_ref(&file_record))
                        .await?
                }
                PackageLink::Bare => tx.record_file(&file_record).await?,
            }
        }
        tx.commit().await?;
        Ok(())
    }

    /// The size to record: declared by the index, or measured from the
    /// `by-hash` copy for files whose checksum list carries none.
    async fn record_size(&self, record: &IngestRecord) -> Option<u64> {
        if let Some(size) = record.size {
            return Some(size);
        }
        let by_hash = self.layout.by_hash_path(&record.sha256);
        tokio::fs::metadata(&by_hash).await.ok().map(|m| m.len())
    }
}

/// Hard-link `target` onto the physical `by-hash` copy, replacing nothing.
fn link_into_place(by_hash: &Path, target: &Path) -> std::io::Result<()> {
    if target.exists() {
        return Ok(());
    }
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match std::fs::hard_link(by_hash, target) {
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        other => other,
    }
}

/// Detached-signature armor: an `InRelease` wraps the Release paragraph in
/// a cleartext signature frame; cut the payload out. Plain `Release` files
/// pass through.
fn strip_armor(body: &[u8]) -> &[u8] {
    const HEADER: &[u8] = b"-----BEGIN PGP SIGNED MESSAGE-----";
    const SIGNATURE: &[u8] = b"-----BEGIN PGP SIGNATURE-----";
    if !body.starts_with(HEADER) {
        return body;
    }
    // payload starts after the first blank line, ends at the signature
    let start = find(body, b"\n\n").map(|i| i + 2).unwrap_or(0);
    let end = find(body, SIGNATURE).unwrap_or(body.len());
    &body[start..end]
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Parse a `Packages` index into ingest records, skipping (and logging)
/// broken paragraphs.
fn enumerate_packages(index: &[u8]) -> MirrorResult<Vec<IngestRecord>> {
    let mut records = Vec::new();
    for paragraph in ParagraphReader::new(index) {
        let paragraph = paragraph?;
        match BinaryPackage::from_paragraph(&paragraph) {
            Ok(pkg) => records.push(IngestRecord {
                sha256: pkg.sha256.clone(),
                size: Some(pkg.size),
                path: pkg.pool_directory().to_string(),
                name: pkg.file_name().to_string(),
                architecture: Some(pkg.architecture.clone()),
                link: PackageLink::Binary {
                    name: pkg.name,
                    version: pkg.version,
                },
            }),
            Err(e) => warn!(error = %e, "skipping broken Packages paragraph"),
        }
    }
    Ok(records)
}

/// Parse a `Sources` index into ingest records, one per source file.
fn enumerate_sources(index: &[u8]) -> MirrorResult<Vec<IngestRecord>> {
    let mut records = Vec::new();
    for paragraph in ParagraphReader::new(index) {
        let paragraph = paragraph?;
        match SourcePackage::from_paragraph(&paragraph) {
            Ok(src) => {
                for file in &src.files {
                    records.push(IngestRecord {
                        sha256: file.sha256.clone(),
                        size: Some(file.size),
                        path: src.directory.clone(),
                        name: file.name.clone(),
                        architecture: None,
                        link: PackageLink::Source {
                            name: src.name.clone(),
                            version: src.version.clone(),
                        },
                    });
                }
            }
            Err(e) => warn!(error = %e, "skipping broken Sources paragraph"),
        }
    }
    Ok(records)
}

/// Parse a `SHA256SUMS` file (`hash  ./relative/path` per line) into bare
/// file records under `base_dir`.
fn parse_sha256sums(text: &str, base_dir: &str) -> Vec<IngestRecord> {
    let mut records = Vec::new();
    for line in text.lines() {
        let mut parts = line.split_whitespace();
        let (Some(hash), Some(path)) = (parts.next(), parts.next()) else {
            continue;
        };
        if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            continue;
        }
        let path = path.trim_start_matches("./").trim_start_matches('*');
        let (dir, name) = match path.rsplit_once('/') {
            Some((dir, name)) => (format!("{base_dir}/{dir}"), name),
            None => (base_dir.to_string(), path),
        };
        records.push(IngestRecord {
            sha256: hash.to_lowercase(),
            size: None,
            path: dir,
            name: name.to_string(),
            architecture: None,
            link: PackageLink::Bare,
        });
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_selector_literal() {
        let s = TimestampSelector::parse("20210221T150011Z").unwrap();
        assert!(!s.needs_discovery());
        assert!(s.matches("20210221T150011Z"));
        assert!(!s.matches("20210222T150011Z"));
    }

    #[test]
    fn test_timestamp_selector_ranges() {
        let s = TimestampSelector::parse("20210221T150011Z:20210223T150011Z").unwrap();
        assert!(s.needs_discovery());
        assert!(s.matches("20210221T150011Z"));
        assert!(s.matches("20210222T000000Z"));
        assert!(s.matches("20210223T150011Z"));
        assert!(!s.matches("20210224T000000Z"));

        let open_low = TimestampSelector::parse(":20210223T150011Z").unwrap();
        assert!(open_low.matches("19990101T000000Z"));
        assert!(!open_low.matches("20210224T000000Z"));

        let open_high = TimestampSelector::parse("20210221T150011Z:").unwrap();
        assert!(open_high.matches("29990101T000000Z"));
        assert!(!open_high.matches("20200101T000000Z"));

        let all = TimestampSelector::parse(":").unwrap();
        assert!(all.matches("20210221T150011Z"));
    }

    #[test]
    fn test_timestamp_selector_rejects_garbage() {
        assert!(TimestampSelector::parse("yesterday").is_err());
        assert!(TimestampSelector::parse("2021:x").is_err());
    }

    #[test]
    fn test_parse_sha256sums() {
        let text = format!(
            "{}  ./netboot/mini.iso\n{}  *vmlinuz\nnot-a-hash  junk\n",
            "aa".repeat(32),
            "bb".repeat(32)
        );
        let records = parse_sha256sums(&text, "dists/bullseye/main/installer-amd64/current/images");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sha256, "aa".repeat(32));
        assert_eq!(
            records[0].path,
            "dists/bullseye/main/installer-amd64/current/images/netboot"
        );
        assert_eq!(records[0].name, "mini.iso");
        assert_eq!(records[1].name, "vmlinuz");
        assert_eq!(
            records[1].path,
            "dists/bullseye/main/installer-amd64/current/images"
        );
    }

    #[test]
    fn test_strip_armor_passthrough() {
        let plain = b"Suite: unstable\n";
        assert_eq!(strip_armor(plain), plain);
    }

    #[test]
    fn test_strip_armor_inrelease() {
        let armored = b"-----BEGIN PGP SIGNED MESSAGE-----\nHash: SHA256\n\nSuite: unstable\n-----BEGIN PGP SIGNATURE-----\nabc\n-----END PGP SIGNATURE-----\n";
        assert_eq!(strip_armor(armored), b"Suite: unstable\n");
    }

    #[test]
    fn test_enumerate_packages_skips_broken_paragraphs() {
        let index = b"Package: hello\nVersion: 2.10-2\nArchitecture: all\n\
Filename: pool/main/h/hello/hello_2.10-2_all.deb\nSize: 12345\nSHA256: aa\n\n\
Package: broken\nVersion: 1\n\n";
        let records = enumerate_packages(index).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "hello_2.10-2_all.deb");
        assert_eq!(records[0].path, "pool/main/h/hello");
        assert!(matches!(records[0].link, PackageLink::Binary { .. }));
    }

    #[test]
    fn test_enumerate_sources_expands_files() {
        let index = b"Package: hello\nVersion: 2.10-2\nDirectory: pool/main/h/hello\n\
Checksums-Sha256:\n aa 10 hello_2.10-2.dsc\n bb 20 hello_2.10.orig.tar.gz\n\n";
        let records = enumerate_sources(index).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].path, "pool/main/h/hello");
        assert_eq!(records[0].architecture, None);
        assert!(matches!(records[0].link, PackageLink::Source { .. }));
    }
}
