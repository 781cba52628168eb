use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use futures::{stream, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

#[cfg(feature = "azure")]
use crate::AzureBlobStore;
use crate::path::{self, BlobPath, SEPARATOR};
use crate::report::{BatchFailure, UnitOutcome};
use crate::{
    BatchReport, BlobError, BlobResult, BlobStore, ByteStream, ContentTypes, DownloadMode, GetResult,
    MemoryBlobStore, S3CompatibleStore, StoreConfig, TreeConfig, UploadMode,
};

/// Directory-tree view over a flat blob store.
///
/// The client is bound to a single container for its whole life and keeps no
/// state besides that binding. Tree-scale operations fan out into one store
/// call per file or key, run through a bounded pool
/// (`TreeConfig::concurrency`), and report every unit failure in a
/// [`BatchReport`] instead of stopping at the first one.
#[derive(Clone)]
pub struct BlobDirClient {
    store: Arc<dyn BlobStore>,
    config: TreeConfig,
}

impl BlobDirClient {
    /// Wrap an already-built store
    pub fn new<S: BlobStore + 'static>(store: S, config: TreeConfig) -> Self {
        Self::from_arc(Arc::new(store), config)
    }

    /// Wrap a store that is already shared elsewhere
    pub fn from_arc(store: Arc<dyn BlobStore>, config: TreeConfig) -> Self {
        Self { store, config }
    }

    /// Build the backend named by `store` and check it is reachable.
    ///
    /// Bad credentials, a wrong endpoint or a missing container surface here
    /// as [`BlobError::Connection`].
    pub async fn connect(store: StoreConfig, config: TreeConfig) -> BlobResult<Self> {
        let client = match store {
            StoreConfig::S3(s3) => Self::new(S3CompatibleStore::connect(s3).await?, config),
            #[cfg(feature = "azure")]
            StoreConfig::Azure(azure) => Self::new(AzureBlobStore::connect(azure).await?, config),
            StoreConfig::Memory { container } => Self::new(MemoryBlobStore::new(container), config),
        };
        info!("Blob tree client bound to {}", client.container());
        Ok(client)
    }

    /// Container or bucket this client is bound to
    pub fn container(&self) -> &str {
        self.store.container()
    }

    /// Tree settings this client was built with
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// The underlying store, for calls outside the tree operations
    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    // ---- upload ---------------------------------------------------------

    /// Upload a local file or directory.
    ///
    /// A directory lands under `destination/<dir name>/`, keeping its
    /// relative layout; an empty destination means the container root. A
    /// single file is written to the key `destination` itself.
    #[instrument(skip(self), fields(container = %self.container()))]
    pub async fn upload(&self, source: &Path, destination: &str) -> BlobResult<BatchReport> {
        let metadata = tokio::fs::metadata(source).await?;

        if metadata.is_dir() {
            return self.upload_dir(source, destination).await;
        }

        let key = path::normalize_key(destination);
        if key.is_empty() {
            return Err(BlobError::invalid("A destination key must be provided for a single file"));
        }
        let outcome = self.upload_unit(source.to_path_buf(), key).await;
        Ok(BatchReport::collect([outcome]))
    }

    /// Upload one file to exactly `key`
    #[instrument(skip(self), fields(container = %self.container()))]
    pub async fn upload_file(&self, source: &Path, key: &str) -> BlobResult<()> {
        let key = path::normalize_key(key);
        if key.is_empty() {
            return Err(BlobError::invalid("A destination key must be provided"));
        }
        self.put_file(source, &key).await.map(|_| ())
    }

    async fn upload_dir(&self, source: &Path, destination: &str) -> BlobResult<BatchReport> {
        let root_name = Self::local_dir_name(source).await?;
        let prefix = path::join(destination, &root_name);
        let files = Self::walk_files(source.to_path_buf()).await?;

        info!("Uploading {} files from {} to {}/", files.len(), source.display(), prefix);

        let report = self
            .run_batch(files.into_iter().map(|(local, relative)| {
                let key = path::join(&prefix, &relative);
                self.upload_unit(local, key)
            }))
            .await;

        Self::log_report("upload", &report);
        Ok(report)
    }

    async fn upload_unit(&self, local: PathBuf, key: String) -> UnitOutcome {
        match self.put_file(&local, &key).await {
            Ok(true) => {
                info!("Uploaded {} to {}", local.display(), key);
                UnitOutcome::Done
            }
            Ok(false) => UnitOutcome::Skipped,
            Err(error) => {
                let unit = local.display().to_string();
                warn!("Upload of {} to {} failed: {}", unit, key, error);
                UnitOutcome::Failed(BatchFailure {
                    error: BlobError::upload(unit.clone(), error),
                    unit,
                })
            }
        }
    }

    /// Returns `false` when the key was left alone in skip mode
    async fn put_file(&self, local: &Path, key: &str) -> BlobResult<bool> {
        if self.should_skip(key).await? {
            debug!("Skipping existing {}", key);
            return Ok(false);
        }

        let file = tokio::fs::File::open(local).await?;
        let stream: ByteStream = Box::pin(ReaderStream::new(file));
        let content_type = self.config.guess_content_type.then(|| ContentTypes::guess(local));

        self.store.put(key, content_type, stream).await?;
        Ok(true)
    }

    async fn should_skip(&self, key: &str) -> BlobResult<bool> {
        if self.config.upload_mode != UploadMode::SkipExisting {
            return Ok(false);
        }
        match self.store.head(key).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn local_dir_name(source: &Path) -> BlobResult<String> {
        if let Some(name) = source.file_name() {
            return Ok(name.to_string_lossy().into_owned());
        }
        // `.`, `..` or a trailing component that is not a name
        let canonical = tokio::fs::canonicalize(source).await?;
        Ok(canonical
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default())
    }

    /// Every file under `root` with its `/`-separated relative path.
    /// Symlinks to files are included; symlinked directories are not entered.
    async fn walk_files(root: PathBuf) -> BlobResult<Vec<(PathBuf, String)>> {
        let files = tokio::task::spawn_blocking(move || {
            let mut files = Vec::new();
            for entry in WalkDir::new(&root).follow_links(false).sort_by_file_name() {
                let entry = entry.map_err(std::io::Error::from)?;
                let is_file = if entry.path_is_symlink() {
                    std::fs::metadata(entry.path()).map(|m| m.is_file()).unwrap_or(false)
                } else {
                    entry.file_type().is_file()
                };
                if !is_file {
                    continue;
                }
                let relative = entry
                    .path()
                    .strip_prefix(&root)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
                files.push((entry.path().to_path_buf(), path::key_from_local(relative)));
            }
            Ok::<_, std::io::Error>(files)
        })
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;
        Ok(files)
    }

    // ---- download -------------------------------------------------------

    /// Download a blob or a pseudo-directory to the local filesystem.
    ///
    /// `source` is first treated as a directory: when anything is listed
    /// under it, the tree is written below `destination/<source name>/`.
    /// Otherwise a [`BlobPath::File`] source is fetched as a single blob (see
    /// [`download_file`](Self::download_file)). Files already written are not
    /// rolled back when a later blob fails.
    pub async fn download<P: Into<BlobPath>>(&self, source: P, destination: &Path) -> BlobResult<BatchReport> {
        self.download_path(source.into(), destination).await
    }

    #[instrument(skip(self), fields(container = %self.container()))]
    pub async fn download_path(&self, source: BlobPath, destination: &Path) -> BlobResult<BatchReport> {
        if destination.as_os_str().is_empty() {
            return Err(BlobError::invalid("A destination must be provided"));
        }

        let prefix = source.prefix();
        let keys = self.keys_under(&prefix, false).await?;

        if keys.is_empty() {
            return match source {
                BlobPath::File(key) => {
                    let target = Self::file_target(&key, destination).await;
                    let outcome = self.download_unit(key, target).await;
                    Ok(BatchReport::collect([outcome]))
                }
                BlobPath::Dir(_) => {
                    debug!("Nothing listed under {:?}", prefix);
                    Ok(BatchReport::new())
                }
            };
        }

        let local_root = match source.name() {
            "" => destination.to_path_buf(),
            name => destination.join(name),
        };

        info!("Downloading {} blobs from {:?} to {}", keys.len(), prefix, local_root.display());

        let report = self
            .run_batch(keys.into_iter().map(|key| {
                let local = path::relative_to(&key, &prefix)
                    .ok_or_else(|| BlobError::invalid(format!("{} is outside {:?}", key, prefix)))
                    .and_then(|relative| Self::local_path_for(&local_root, relative));
                self.download_unit(key, local)
            }))
            .await;

        Self::log_report("download", &report);
        Ok(report)
    }

    /// Download one blob.
    ///
    /// `destination` names a directory when it ends with a separator, ends
    /// with `.`, or already exists as a directory; the blob then keeps its
    /// own name inside it. Otherwise `destination` is the file path. Missing
    /// parent directories are created. Returns the local path, which is left
    /// untouched if it exists and the download mode skips existing files.
    #[instrument(skip(self), fields(container = %self.container()))]
    pub async fn download_file(&self, key: &str, destination: &Path) -> BlobResult<PathBuf> {
        let target = Self::file_target(key, destination).await?;

        if let Some(written) = self.fetch(key, &target).await? {
            info!("Downloaded {} to {} ({} bytes)", key, target.display(), written);
        }
        Ok(target)
    }

    async fn file_target(key: &str, destination: &Path) -> BlobResult<PathBuf> {
        if destination.as_os_str().is_empty() {
            return Err(BlobError::invalid("A destination must be provided"));
        }
        if !Self::names_directory(destination).await {
            return Ok(destination.to_path_buf());
        }
        let name = path::basename(key);
        if name.is_empty() {
            return Err(BlobError::invalid(format!("{:?} has no file name", key)));
        }
        Ok(destination.join(name))
    }

    async fn download_unit(&self, key: String, local: BlobResult<PathBuf>) -> UnitOutcome {
        let result = match local {
            Ok(local) => self.fetch(&key, &local).await.map(|written| (local, written)),
            Err(e) => Err(e),
        };

        match result {
            Ok((local, Some(written))) => {
                info!("Downloaded {} to {} ({} bytes)", key, local.display(), written);
                UnitOutcome::Done
            }
            Ok((local, None)) => {
                debug!("Keeping existing {}", local.display());
                UnitOutcome::Skipped
            }
            Err(error) => {
                warn!("Download of {} failed: {}", key, error);
                UnitOutcome::Failed(BatchFailure {
                    error: BlobError::download(key.clone(), error),
                    unit: key,
                })
            }
        }
    }

    /// `None` when an existing local file was kept
    async fn fetch(&self, key: &str, local: &Path) -> BlobResult<Option<u64>> {
        if self.config.download_mode == DownloadMode::SkipExisting && tokio::fs::try_exists(local).await? {
            return Ok(None);
        }
        self.write_blob(key, local).await.map(Some)
    }

    async fn write_blob(&self, key: &str, local: &Path) -> BlobResult<u64> {
        let GetResult { mut stream, .. } = self.store.get(key).await?;

        if let Some(parent) = local.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(local).await?;
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }

    async fn names_directory(destination: &Path) -> bool {
        let raw = destination.to_string_lossy();
        if raw.ends_with(SEPARATOR) || raw.ends_with(std::path::MAIN_SEPARATOR) || raw.ends_with('.') {
            return true;
        }
        tokio::fs::metadata(destination)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Map a relative key below `root`, refusing segments that would climb
    /// out of it
    fn local_path_for(root: &Path, relative: &str) -> BlobResult<PathBuf> {
        let relative = Path::new(relative);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(BlobError::invalid(format!(
                "{} does not map to a path below {}",
                relative.display(),
                root.display()
            )));
        }
        Ok(root.join(relative))
    }

    // ---- listing --------------------------------------------------------

    /// Files under `path`, relative to it. Non-recursive listings keep only
    /// direct children. Order follows the store's listing order.
    #[instrument(skip(self), fields(container = %self.container()))]
    pub async fn list_files(&self, path: &str, recursive: bool) -> BlobResult<Vec<String>> {
        let prefix = path::dir_prefix(path);
        let blobs = self.store.list(&prefix).await?;

        let files: Vec<String> = blobs
            .iter()
            .filter_map(|blob| path::relative_to(&blob.key, &prefix))
            .filter(|relative| !relative.ends_with(SEPARATOR))
            .filter(|relative| recursive || !relative.contains(SEPARATOR))
            .map(str::to_string)
            .collect();

        debug!("{} files under {:?}", files.len(), prefix);
        Ok(files)
    }

    /// Pseudo-directories under `path`, relative to it, each once in
    /// first-seen order. Non-recursive listings return direct subdirectory
    /// names only; recursive ones return every ancestor (`a`, `a/b`, ...).
    #[instrument(skip(self), fields(container = %self.container()))]
    pub async fn list_dirs(&self, path: &str, recursive: bool) -> BlobResult<Vec<String>> {
        let prefix = path::dir_prefix(path);
        let blobs = self.store.list(&prefix).await?;

        let mut dirs: Vec<String> = Vec::new();
        let mut push = |dir: &str| {
            if !dirs.iter().any(|d| d == dir) {
                dirs.push(dir.to_string());
            }
        };

        for relative in blobs.iter().filter_map(|blob| path::relative_to(&blob.key, &prefix)) {
            // "a/b/" is a directory marker for a/b itself
            let dir = match relative.strip_suffix(SEPARATOR) {
                Some(marker) => marker,
                None => path::parent(relative),
            };
            if dir.is_empty() {
                continue;
            }
            if recursive {
                path::ancestors(dir).for_each(&mut push);
            } else if let Some(top) = path::ancestors(dir).next() {
                push(top);
            }
        }

        debug!("{} directories under {:?}", dirs.len(), prefix);
        Ok(dirs)
    }

    /// Full keys under a listing prefix; directory markers only on request.
    /// With markers, the prefix's own marker (`phb/` for `phb/`) is included.
    async fn keys_under(&self, prefix: &str, include_markers: bool) -> BlobResult<Vec<String>> {
        let blobs = self.store.list(prefix).await?;
        Ok(blobs
            .into_iter()
            .map(|blob| blob.key)
            .filter(|key| {
                path::relative_to(key, prefix).is_some() || (include_markers && !prefix.is_empty() && key == prefix)
            })
            .filter(|key| include_markers || !key.ends_with(SEPARATOR))
            .collect())
    }

    // ---- delete ---------------------------------------------------------

    /// Remove one blob, or with `recursive` everything under `path`.
    ///
    /// Deleting a missing key counts as success, so this is safe to call
    /// from cleanup paths.
    #[instrument(skip(self), fields(container = %self.container()))]
    pub async fn remove(&self, path: &str, recursive: bool) -> BlobResult<BatchReport> {
        if recursive {
            return self.rmdir(path).await;
        }
        if path.is_empty() {
            return Err(BlobError::invalid("A key must be provided; use recursive removal for the root"));
        }
        let outcome = self.delete_unit(path.to_string()).await;
        Ok(BatchReport::collect([outcome]))
    }

    /// Delete every blob under `path`, one call per key. An empty listing is
    /// a no-op.
    #[instrument(skip(self), fields(container = %self.container()))]
    pub async fn rmdir(&self, path: &str) -> BlobResult<BatchReport> {
        let prefix = path::dir_prefix(path);
        let keys = self.keys_under(&prefix, true).await?;
        if keys.is_empty() {
            debug!("Nothing to delete under {:?}", prefix);
            return Ok(BatchReport::new());
        }

        info!("Deleting {} blobs under {:?}", keys.len(), prefix);
        let report = self.run_batch(keys.into_iter().map(|key| self.delete_unit(key))).await;

        Self::log_report("delete", &report);
        Ok(report)
    }

    /// Empty the whole container
    pub async fn clear(&self) -> BlobResult<BatchReport> {
        self.rmdir("").await
    }

    async fn delete_unit(&self, key: String) -> UnitOutcome {
        match self.store.delete(&key).await {
            Ok(()) => {
                info!("Deleted {}", key);
                UnitOutcome::Done
            }
            Err(e) if e.is_not_found() => {
                debug!("{} already absent", key);
                UnitOutcome::Done
            }
            Err(error) => {
                warn!("Delete of {} failed: {}", key, error);
                UnitOutcome::Failed(BatchFailure {
                    error: BlobError::delete(key.clone(), error),
                    unit: key,
                })
            }
        }
    }

    // ---- mirroring ------------------------------------------------------

    /// Copy every blob under `prefix` to the same key in `target`'s
    /// container, keeping content types. `target`'s upload mode decides
    /// whether existing keys are overwritten.
    #[instrument(skip(self, target), fields(source = %self.container(), target = %target.container()))]
    pub async fn mirror_to(&self, prefix: &str, target: &BlobDirClient) -> BlobResult<BatchReport> {
        let prefix = path::dir_prefix(prefix);
        let keys = self.keys_under(&prefix, false).await?;

        info!(
            "Mirroring {} blobs under {:?} from {} to {}",
            keys.len(),
            prefix,
            self.container(),
            target.container()
        );

        let report = self
            .run_batch(keys.into_iter().map(|key| self.mirror_unit(key, target)))
            .await;

        Self::log_report("mirror", &report);
        Ok(report)
    }

    async fn mirror_unit(&self, key: String, target: &BlobDirClient) -> UnitOutcome {
        let result = async {
            if target.should_skip(&key).await? {
                return Ok(false);
            }
            let GetResult {
                stream, content_type, ..
            } = self.store.get(&key).await?;
            let content_type = content_type.or_else(|| {
                target
                    .config
                    .guess_content_type
                    .then(|| ContentTypes::guess_key(&key).to_string())
            });
            target.store.put(&key, content_type.as_deref(), stream).await?;
            Ok::<bool, BlobError>(true)
        }
        .await;

        match result {
            Ok(true) => {
                info!("Mirrored {}", key);
                UnitOutcome::Done
            }
            Ok(false) => UnitOutcome::Skipped,
            Err(error) => {
                warn!("Mirror of {} failed: {}", key, error);
                UnitOutcome::Failed(BatchFailure {
                    error: BlobError::mirror(key.clone(), error),
                    unit: key,
                })
            }
        }
    }

    // ---- batching -------------------------------------------------------

    async fn run_batch<I, F>(&self, units: I) -> BatchReport
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = UnitOutcome>,
    {
        let outcomes: Vec<UnitOutcome> = stream::iter(units)
            .buffer_unordered(self.config.effective_concurrency())
            .collect()
            .await;
        BatchReport::collect(outcomes)
    }

    fn log_report(operation: &str, report: &BatchReport) {
        if report.is_complete() {
            info!(
                "{} finished: {} done, {} skipped",
                operation, report.succeeded, report.skipped
            );
        } else {
            warn!(
                "{} finished with failures: {} done, {} skipped, {} failed",
                operation,
                report.succeeded,
                report.skipped,
                report.failures.len()
            );
        }
    }
}
