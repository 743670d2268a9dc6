//! Replay manager
//!
//! Entry point for front ends. Owns the store and the processor and exposes
//! path-addressed operations: ingest, tag editing, notes, forgetting,
//! queries over explicit source sets, tag frequency, and export.

use crate::archive::hash_file;
use crate::db::{ReplayStore, UpdateScope};
use crate::processor::ReplayProcessor;
use crate::query::{tag_frequency_table, ReplayQuery};
use futures::TryStreamExt;
use rtag_common::{Error, Replay, Result};
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Replay files a query or frequency table is restricted to
///
/// Empty sources mean the whole store.
#[derive(Debug, Clone, Default)]
pub struct ReplaySources {
    pub files: Vec<PathBuf>,
    pub dir: Option<PathBuf>,
}

impl ReplaySources {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.dir.is_none()
    }
}

/// Outcome of a bulk reprocessing run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReprocessSummary {
    pub processed: usize,
    pub failed: usize,
}

/// Entry point for ingest, editing, and queries
///
/// Every operation that reads a record, changes it, and writes it back
/// holds `edit_lock` for the whole cycle, so concurrent edits of the same
/// replay all land.
pub struct ReplayManager {
    store: ReplayStore,
    processor: ReplayProcessor,
    edit_lock: Mutex<()>,
}

impl ReplayManager {
    pub fn new(store: ReplayStore, processor: ReplayProcessor) -> Self {
        Self {
            store,
            processor,
            edit_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &ReplayStore {
        &self.store
    }

    pub async fn close(self) {
        self.store.close().await;
    }

    /// Archive and process a replay file
    ///
    /// Returns `Ok(None)` when `expected_digest` is given and does not match.
    pub async fn ingest_file(
        &self,
        path: &Path,
        expected_digest: Option<&str>,
    ) -> Result<Option<Replay>> {
        let _guard = self.edit_lock.lock().await;
        self.ingest_file_locked(path, expected_digest).await
    }

    /// [`ReplayManager::ingest_file`] for callers already holding `edit_lock`
    async fn ingest_file_locked(
        &self,
        path: &Path,
        expected_digest: Option<&str>,
    ) -> Result<Option<Replay>> {
        if !path.is_file() {
            return Err(Error::NotFound(format!("Replay file {}", path.display())));
        }

        match self.store.archive().ingest_file(path, expected_digest).await? {
            Some(archived) => self.finish_ingest(archived).await.map(Some),
            None => Ok(None),
        }
    }

    /// Archive and process replay bytes, e.g. an upload
    ///
    /// Hashing and copying run on the blocking thread pool.
    pub async fn ingest_reader<R>(
        &self,
        mut reader: R,
        expected_digest: Option<&str>,
    ) -> Result<Option<Replay>>
    where
        R: Read + Seek + Send + 'static,
    {
        let archive = self.store.archive().clone();
        let expected = expected_digest.map(str::to_string);
        let archived = tokio::task::spawn_blocking(move || {
            archive.ingest_reader(&mut reader, expected.as_deref())
        })
        .await
        .map_err(|e| Error::Internal(format!("Archive task failed: {}", e)))??;

        match archived {
            Some(archived) => {
                let _guard = self.edit_lock.lock().await;
                self.finish_ingest(archived).await.map(Some)
            }
            None => Ok(None),
        }
    }

    /// Process a freshly archived replay, keeping the stored user data
    ///
    /// Caller holds `edit_lock`.
    async fn finish_ingest(&self, archived: Replay) -> Result<Replay> {
        let base = match self.store.find_by_digest(&archived.digest).await? {
            Some(existing) => existing,
            None => archived,
        };

        match self.processor.process(base.clone(), &self.store).await {
            Ok(processed) => self.store.insert_or_update(&processed, UpdateScope::Full).await,
            Err(e) => {
                warn!(digest = %base.digest, error = %e, "Telemetry unavailable, storing without derived tags");
                self.store.insert_or_update(&base, UpdateScope::TagsAndNotes).await
            }
        }
    }

    /// Ingest `path` if needed, then apply `edit` as a lightweight update
    async fn edit_by_path<F>(&self, path: &Path, edit: F) -> Result<Replay>
    where
        F: FnOnce(&mut Replay),
    {
        let _guard = self.edit_lock.lock().await;
        let mut replay = self
            .ingest_file_locked(path, None)
            .await?
            .ok_or_else(|| Error::Internal(format!("Ingest of {} produced no replay", path.display())))?;

        edit(&mut replay);
        self.store
            .insert_or_update(&replay, UpdateScope::TagsAndNotes)
            .await
    }

    pub async fn tag_replay(&self, path: &Path, tags: &[String]) -> Result<Replay> {
        let replay = self
            .edit_by_path(path, |replay| {
                for tag in tags {
                    replay.add_tag(tag.as_str());
                }
            })
            .await?;
        info!(digest = %replay.digest, ?tags, "Tagged replay");
        Ok(replay)
    }

    pub async fn untag_replay(&self, path: &Path, tags: &[String]) -> Result<Replay> {
        let replay = self
            .edit_by_path(path, |replay| {
                for tag in tags {
                    replay.remove_tag(tag);
                }
            })
            .await?;
        info!(digest = %replay.digest, ?tags, "Untagged replay");
        Ok(replay)
    }

    pub async fn set_notes(&self, path: &Path, notes: &str) -> Result<Replay> {
        self.edit_by_path(path, |replay| replay.notes = notes.to_string())
            .await
    }

    /// Look up a replay by file path or digest without ingesting it
    pub async fn find(&self, selector: &str) -> Result<Option<Replay>> {
        let digest = self.resolve_digest(selector).await?;
        self.store.find_by_digest(&digest).await
    }

    /// Remove a replay's record, addressed by file path or digest
    ///
    /// The archived file is kept. Returns `false` if no record existed.
    pub async fn forget(&self, selector: &str) -> Result<bool> {
        let digest = self.resolve_digest(selector).await?;
        self.store.remove_by_digest(&digest).await
    }

    async fn resolve_digest(&self, selector: &str) -> Result<String> {
        let path = Path::new(selector);
        if path.is_file() {
            hash_file(path).await
        } else {
            Ok(selector.trim().to_lowercase())
        }
    }

    /// Re-run the pipeline on a stored replay
    pub async fn reprocess(&self, digest: &str) -> Result<Option<Replay>> {
        let _guard = self.edit_lock.lock().await;
        match self.store.find_by_digest(digest).await? {
            Some(replay) => self
                .processor
                .process_and_store(replay, &self.store)
                .await
                .map(Some),
            None => Ok(None),
        }
    }

    /// Re-run the pipeline on every stored replay
    ///
    /// Individual failures are logged and counted.
    pub async fn reprocess_all(&self) -> Result<ReprocessSummary> {
        let digests: Vec<String> = self.store.all().map_ok(|r| r.digest).try_collect().await?;
        let mut summary = ReprocessSummary::default();

        for digest in digests {
            match self.reprocess(&digest).await {
                Ok(Some(_)) => summary.processed += 1,
                // Forgotten since the listing
                Ok(None) => {}
                Err(e) => {
                    warn!(digest = %digest, error = %e, "Reprocessing failed");
                    summary.failed += 1;
                }
            }
        }

        info!(processed = summary.processed, failed = summary.failed, "Reprocessed replays");
        Ok(summary)
    }

    /// Expand sources into replay file paths
    ///
    /// # Errors
    /// `InvalidInput` when the source directory is not a directory.
    pub fn collect_sources(&self, sources: &ReplaySources) -> Result<Vec<PathBuf>> {
        let mut files = sources.files.clone();

        if let Some(dir) = &sources.dir {
            if !dir.is_dir() {
                return Err(Error::InvalidInput(format!(
                    "Source {} is not a directory",
                    dir.display()
                )));
            }

            let extension = self.store.archive().extension();
            let mut found: Vec<PathBuf> = WalkDir::new(dir)
                .max_depth(1)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .filter(|path| {
                    path.extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
                })
                .collect();
            found.sort();
            files.extend(found);
        }

        Ok(files)
    }

    /// Ingest every source file, returning their digests
    async fn ingest_sources(&self, sources: &ReplaySources) -> Result<Vec<String>> {
        let mut digests = Vec::new();
        for path in self.collect_sources(sources)? {
            match self.ingest_file(&path, None).await {
                Ok(Some(replay)) => digests.push(replay.digest),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping source replay"),
            }
        }
        debug!(count = digests.len(), "Ingested source replays");
        Ok(digests)
    }

    /// Search the store, restricted to `sources` when any are given
    pub async fn query(&self, query: ReplayQuery, sources: &ReplaySources) -> Result<Vec<Replay>> {
        let query = if sources.is_empty() {
            query
        } else {
            let digests = self.ingest_sources(sources).await?;
            query.restrict_to(digests)
        };
        self.store.search(&query).await
    }

    /// Tag counts over `sources` (or the whole store), most frequent first
    pub async fn tag_frequency(
        &self,
        sources: &ReplaySources,
        ignore: &[String],
    ) -> Result<Vec<(String, usize)>> {
        let replays = self.query(ReplayQuery::new(), sources).await?;
        Ok(tag_frequency_table(&replays, ignore))
    }

    /// Copy the archived files of `replays` into `output_dir`
    ///
    /// # Errors
    /// `InvalidInput` when `output_dir` is not an existing directory.
    pub async fn export(&self, replays: &[Replay], output_dir: &Path) -> Result<Vec<PathBuf>> {
        if !output_dir.is_dir() {
            return Err(Error::InvalidInput(format!(
                "Output {} is not a directory",
                output_dir.display()
            )));
        }

        let mut exported = Vec::with_capacity(replays.len());
        for replay in replays {
            let Some(file_name) = replay.path.file_name() else {
                warn!(digest = %replay.digest, "Replay has no file name, skipping export");
                continue;
            };
            let target = output_dir.join(file_name);
            tokio::fs::copy(&replay.path, &target).await?;
            exported.push(target);
        }

        info!(count = exported.len(), dir = %output_dir.display(), "Exported replays");
        Ok(exported)
    }
}
